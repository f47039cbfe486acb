//! MySQL client/server protocol summaries.
//!
//! Packet layout, per the protocol documentation: a 3-byte little-endian
//! payload length, a 1-byte sequence id, then the body. Requests carry a
//! command byte followed by its argument; responses start with a status
//! byte.

use crate::{Packet, PayloadDecoder};

// Client command bytes.
const QUIT: u8 = 0x01;
const INIT_DB: u8 = 0x02;
const QUERY: u8 = 0x03;
const FIELD_LIST: u8 = 0x04;
const CREATE_DB: u8 = 0x05;
const DROP_DB: u8 = 0x06;
const REFRESH: u8 = 0x07;
const SHUTDOWN: u8 = 0x08;
const STATISTICS: u8 = 0x09;
const PROCESS_INFO: u8 = 0x0a;
const PROCESS_KILL: u8 = 0x0c;
const PING: u8 = 0x0e;
const CHANGE_USER: u8 = 0x11;
const STMT_PREPARE: u8 = 0x16;
const STMT_EXECUTE: u8 = 0x17;
const STMT_SEND_LONG_DATA: u8 = 0x18;
const STMT_RESET: u8 = 0x1a;

// Server status bytes.
const OK: u8 = 0x00;
const ERROR: u8 = 0xff;
const EOF: u8 = 0xfe;

pub struct MysqlDecoder;

impl PayloadDecoder for MysqlDecoder {
    fn decode(&self, packet: &mut Packet) {
        let body = &packet.payload;
        if body.len() < 5 {
            return;
        }

        let length = u32::from_le_bytes([body[0], body[1], body[2], 0]) as usize;
        let sequence_id = body[3];
        if sequence_id != 0 || body.len() != length + 4 {
            return;
        }

        if packet.request {
            packet.content = match body[4] {
                QUIT | INIT_DB | QUERY | FIELD_LIST | CREATE_DB | DROP_DB | REFRESH | SHUTDOWN
                | STATISTICS | PROCESS_INFO | PROCESS_KILL | PING | CHANGE_USER | STMT_PREPARE => {
                    String::from_utf8_lossy(&body[5..]).into_owned()
                }
                // Binary statement traffic is recognized but not decoded.
                STMT_SEND_LONG_DATA | STMT_RESET | STMT_EXECUTE => String::new(),
                _ => String::new(),
            };
            return;
        }

        packet.content = match body[4] {
            OK => "ok".to_string(),
            ERROR => "error".to_string(),
            EOF => String::new(),
            _ => "not find case".to_string(),
        };
    }
}
