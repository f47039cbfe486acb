//! Fallback decoder that summarizes the transport header itself.

use crate::{Packet, PayloadDecoder};

pub struct RawDecoder;

impl PayloadDecoder for RawDecoder {
    fn decode(&self, packet: &mut Packet) {
        packet.content = format!(
            "Seq:{} - Ack:{} - {} - PayLen:{}",
            packet.sequence.map(|v| v.to_string()).unwrap_or_default(),
            packet.ack.map(|v| v.to_string()).unwrap_or_default(),
            packet.flag_str(),
            packet.payload_len,
        );
    }
}
