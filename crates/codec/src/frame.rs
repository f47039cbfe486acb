//! Captured frame to [`Packet`] decoding.
//!
//! Only the layers the sniffer cares about are lifted out: Ethernet
//! addresses, IPv4 addresses, TCP/UDP headers and the application
//! payload. A frame that is missing layers still produces a packet,
//! with the matching fields left empty.

use std::{net::Ipv4Addr, time::SystemTime};

use etherparse::{IpHeader, PacketHeaders, TransportHeader};

use crate::{ACK, CWR, ECE, FIN, PSH, Packet, RST, SYN, URG};

/// Decode one captured frame into a [`Packet`].
///
/// `capture_len` is the capture length reported by the packet source for
/// this frame; it becomes the payload length for TCP frames that carry
/// application bytes.
pub fn decode(data: &[u8], timestamp: SystemTime, capture_len: usize) -> Packet {
    let mut packet = Packet {
        timestamp,
        ..Default::default()
    };

    let headers = match PacketHeaders::from_ethernet_slice(data) {
        Ok(headers) => headers,
        Err(_) => return packet,
    };

    let mut layers = Vec::new();

    if let Some(link) = &headers.link {
        packet.src_mac = mac_str(link.source);
        packet.dst_mac = mac_str(link.destination);
    }

    if let Some(IpHeader::Version4(ip, _)) = &headers.ip {
        layers.push("IPv4");
        packet.src_ip = Some(Ipv4Addr::from(ip.source));
        packet.dst_ip = Some(Ipv4Addr::from(ip.destination));
    }

    match &headers.transport {
        Some(TransportHeader::Udp(udp)) => {
            layers.push("UDP");
            packet.src_port = Some(udp.source_port);
            packet.dst_port = Some(udp.destination_port);
            packet.checksum = Some(udp.checksum);
            packet.payload = headers.payload.to_vec();
            packet.payload_len = udp.length as usize;
        }
        Some(TransportHeader::Tcp(tcp)) => {
            layers.push("TCP");
            packet.src_port = Some(tcp.source_port);
            packet.dst_port = Some(tcp.destination_port);
            packet.checksum = Some(tcp.checksum);
            packet.sequence = Some(tcp.sequence_number);
            packet.ack = Some(tcp.acknowledgment_number);
            packet.flags = flag_bits(tcp);

            if !headers.payload.is_empty() {
                packet.payload = headers.payload.to_vec();
                packet.payload_len = capture_len;
            }
        }
        _ => {}
    }

    packet.layers = layers.join("/");
    packet
}

fn flag_bits(tcp: &etherparse::TcpHeader) -> u8 {
    let mut flags = 0;
    for (set, bit) in [
        (tcp.fin, FIN),
        (tcp.syn, SYN),
        (tcp.rst, RST),
        (tcp.psh, PSH),
        (tcp.ack, ACK),
        (tcp.urg, URG),
        (tcp.ece, ECE),
        (tcp.cwr, CWR),
    ] {
        if set {
            flags |= bit;
        }
    }

    flags
}

fn mac_str(addr: [u8; 6]) -> String {
    format!(
        "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
        addr[0], addr[1], addr[2], addr[3], addr[4], addr[5]
    )
}
