//! ## Traffic summary codec
//!
//! The decoding layer of the sniffer: captured bytes go in, a typed
//! [`Packet`] with a short textual [`Packet::content`] summary comes out.
//! Nothing here performs I/O, and nothing here returns an error. The
//! input is adversarial wire data, so every decoder parses as far as it
//! can and leaves the rest of the record empty.
//!
//! Frame decoding (link/network/transport) lives in [`frame`]; the
//! application payload grammars live in one module per protocol and are
//! selected through [`Protocol::decoder`].

pub mod dns;
pub mod frame;
pub mod http;
pub mod memcached;
pub mod mysql;
pub mod raw;
pub mod redis;

use std::{borrow::Cow, fmt, net::Ipv4Addr, str::FromStr, time::SystemTime};

/// TCP control bits, matching the on-wire flag byte.
pub const FIN: u8 = 0x01;
pub const SYN: u8 = 0x02;
pub const RST: u8 = 0x04;
pub const PSH: u8 = 0x08;
pub const ACK: u8 = 0x10;
pub const URG: u8 = 0x20;
pub const ECE: u8 = 0x40;
pub const CWR: u8 = 0x80;

const FLAG_NAMES: [(u8, &str); 8] = [
    (FIN, "FIN"),
    (SYN, "SYN"),
    (RST, "RST"),
    (PSH, "PSH"),
    (ACK, "ACK"),
    (URG, "URG"),
    (ECE, "ECE"),
    (CWR, "CWR"),
];

/// Names of the bits present in a TCP flag byte, in canonical order.
///
/// # Test
///
/// ```
/// use tapline_codec::{flag_str, ACK, PSH, SYN};
///
/// assert_eq!(flag_str(SYN | ACK), "SYN,ACK");
/// assert_eq!(flag_str(PSH | ACK), "PSH,ACK");
/// assert_eq!(flag_str(0), "");
/// ```
pub fn flag_str(flags: u8) -> String {
    let mut names = Vec::new();
    for (bit, name) in FLAG_NAMES {
        if flags & bit != 0 {
            names.push(name);
        }
    }

    names.join(",")
}

/// One side of a flow, an IPv4 address plus a transport port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Endpoint {
    pub ip: Ipv4Addr,
    pub port: u16,
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.ip, self.port)
    }
}

/// The identity of a pending request, directed from the requester to the
/// responder. Kept as a structured value instead of a formatted string so
/// lookups hash the raw address bytes.
///
/// # Test
///
/// ```
/// use std::net::Ipv4Addr;
///
/// use tapline_codec::{Endpoint, FlowKey};
///
/// let key = FlowKey {
///     from: Endpoint { ip: Ipv4Addr::new(10, 0, 0, 1), port: 50000 },
///     to: Endpoint { ip: Ipv4Addr::new(10, 0, 0, 2), port: 6379 },
/// };
///
/// assert_eq!(key.to_string(), "10.0.0.1:50000 -> 10.0.0.2:6379");
/// assert_eq!(key.reverse().reverse(), key);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FlowKey {
    pub from: Endpoint,
    pub to: Endpoint,
}

impl FlowKey {
    pub fn reverse(&self) -> Self {
        Self {
            from: self.to,
            to: self.from,
        }
    }
}

impl fmt::Display for FlowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.from, self.to)
    }
}

/// One captured frame after layer decoding.
///
/// Fields for layers that were not present stay at their defaults; the
/// rest of the pipeline tolerates partially filled packets.
#[derive(Debug, Clone)]
pub struct Packet {
    /// Slash-joined names of the decoded layers, link layer excluded.
    pub layers: String,
    /// Wall-clock capture time of the frame.
    pub timestamp: SystemTime,
    /// Direction relative to the observed host. Requests are the default
    /// until the classifier or a decoder says otherwise.
    pub request: bool,
    pub src_mac: String,
    pub dst_mac: String,
    pub src_ip: Option<Ipv4Addr>,
    pub dst_ip: Option<Ipv4Addr>,
    pub src_port: Option<u16>,
    pub dst_port: Option<u16>,
    pub checksum: Option<u16>,
    pub sequence: Option<u32>,
    pub ack: Option<u32>,
    /// TCP control bits, zero for non-TCP frames.
    pub flags: u8,
    /// Application payload bytes, possibly empty.
    pub payload: Vec<u8>,
    /// For UDP the length field of the UDP header, for TCP the capture
    /// length of the frame carrying the payload.
    pub payload_len: usize,
    /// Human-readable summary filled in by a payload decoder.
    pub content: String,
    /// Set by a decoder that recognizes a filler packet which must not
    /// enter correlation.
    pub ignore: bool,
}

impl Default for Packet {
    fn default() -> Self {
        Self {
            layers: String::new(),
            timestamp: SystemTime::UNIX_EPOCH,
            request: true,
            src_mac: String::new(),
            dst_mac: String::new(),
            src_ip: None,
            dst_ip: None,
            src_port: None,
            dst_port: None,
            checksum: None,
            sequence: None,
            ack: None,
            flags: 0,
            payload: Vec::new(),
            payload_len: 0,
            content: String::new(),
            ignore: false,
        }
    }
}

impl Packet {
    /// Names of the TCP control bits present, in canonical order.
    pub fn flag_str(&self) -> String {
        flag_str(self.flags)
    }

    pub fn src_endpoint(&self) -> Option<Endpoint> {
        Some(Endpoint {
            ip: self.src_ip?,
            port: self.src_port?,
        })
    }

    pub fn dst_endpoint(&self) -> Option<Endpoint> {
        Some(Endpoint {
            ip: self.dst_ip?,
            port: self.dst_port?,
        })
    }

    /// Flow key from the sender to the receiver of this packet.
    pub fn flow_key(&self) -> Option<FlowKey> {
        Some(FlowKey {
            from: self.src_endpoint()?,
            to: self.dst_endpoint()?,
        })
    }

    /// Flow key of the opposite leg, the one a response answers.
    pub fn reverse_key(&self) -> Option<FlowKey> {
        self.flow_key().map(|key| key.reverse())
    }

    /// Payload interpreted as text, with invalid bytes replaced.
    pub fn payload_text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.payload)
    }
}

/// The application protocol spoken on the captured flows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    Raw,
    Dns,
    Http,
    Redis,
    Memcached,
    Mysql,
}

impl Default for Protocol {
    fn default() -> Self {
        Self::Raw
    }
}

#[derive(Debug)]
pub struct UnknownProtocol(String);

impl std::error::Error for UnknownProtocol {}

impl fmt::Display for UnknownProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown protocol: {}", self.0)
    }
}

impl FromStr for Protocol {
    type Err = UnknownProtocol;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Ok(match value {
            "raw" => Self::Raw,
            "dns" => Self::Dns,
            "http" => Self::Http,
            "redis" => Self::Redis,
            "memcached" => Self::Memcached,
            "mysql" => Self::Mysql,
            _ => return Err(UnknownProtocol(value.to_string())),
        })
    }
}

/// A payload grammar. Decoders fill [`Packet::content`] and may flag the
/// packet as ignorable; they never fail.
pub trait PayloadDecoder {
    fn decode(&self, packet: &mut Packet);
}

impl Protocol {
    /// # Test
    ///
    /// ```
    /// use tapline_codec::{Packet, PayloadDecoder, Protocol};
    ///
    /// let mut packet = Packet {
    ///     payload: b"+PONG\r\n".to_vec(),
    ///     ..Default::default()
    /// };
    ///
    /// "redis".parse::<Protocol>().unwrap().decoder().decode(&mut packet);
    /// assert_eq!(packet.content, "PONG");
    /// ```
    pub fn decoder(&self) -> Box<dyn PayloadDecoder + Send> {
        match self {
            Self::Raw => Box::new(raw::RawDecoder),
            Self::Dns => Box::new(dns::DnsDecoder),
            Self::Http => Box::new(http::HttpDecoder),
            Self::Redis => Box::new(redis::RedisDecoder),
            Self::Memcached => Box::new(memcached::MemcachedDecoder),
            Self::Mysql => Box::new(mysql::MysqlDecoder),
        }
    }
}
