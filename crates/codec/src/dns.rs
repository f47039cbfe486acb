//! DNS payload summaries.
//!
//! [RFC1035]: https://www.ietf.org/rfc/rfc1035.txt
//!
//! The 12-byte header's QR bit decides the direction, overriding the
//! classifier. Questions render as `[TYPE] name`; answers are grouped by
//! record type. Out-of-bounds reads abort the record being parsed and
//! keep whatever was already collected.

use crate::{Packet, PayloadDecoder};

const TYPE_A: u16 = 1;
const TYPE_CNAME: u16 = 5;

const TYPE_NAMES: [(u16, &str); 17] = [
    (1, "A"),
    (2, "NS"),
    (3, "MD"),
    (4, "MF"),
    (5, "CNAME"),
    (6, "SOA"),
    (7, "MB"),
    (8, "MG"),
    (9, "MR"),
    (10, "NULL"),
    (11, "WKS"),
    (12, "PTR"),
    (13, "HINFO"),
    (14, "MINFO"),
    (15, "MX"),
    (16, "TXT"),
    (28, "AAAA"),
];

/// Known record types by name, anything else as its decimal number.
fn type_name(id: u16) -> String {
    TYPE_NAMES
        .iter()
        .find(|(value, _)| *value == id)
        .map(|(_, name)| name.to_string())
        .unwrap_or_else(|| id.to_string())
}

pub struct DnsDecoder;

impl PayloadDecoder for DnsDecoder {
    fn decode(&self, packet: &mut Packet) {
        let meta = &packet.payload;
        if meta.len() < 12 {
            return;
        }

        let code = u16::from_be_bytes([meta[2], meta[3]]);
        let questions = u16::from_be_bytes([meta[4], meta[5]]);
        let answers = u16::from_be_bytes([meta[6], meta[7]]);
        let request = code >> 15 == 0;

        let mut pos = 12;
        let content = if request {
            decode_questions(meta, questions, &mut pos)
        } else {
            skip_questions(meta, questions, &mut pos);
            decode_answers(meta, answers, &mut pos)
        };

        packet.request = request;
        packet.content = content;
    }
}

fn decode_questions(meta: &[u8], count: u16, pos: &mut usize) -> String {
    let mut questions = Vec::new();

    'questions: for _ in 0..count {
        let mut labels = Vec::new();
        loop {
            let Some(&size) = meta.get(*pos) else {
                break 'questions;
            };
            if size == 0 {
                break;
            }
            let next = *pos + 1 + size as usize;
            if meta.len() < next {
                break 'questions;
            }
            labels.push(String::from_utf8_lossy(&meta[*pos + 1..next]).into_owned());
            *pos = next;
        }
        *pos += 1;

        let Some(kind) = read_u16(meta, *pos) else {
            break;
        };
        *pos += 4; // type and class

        questions.push(format!("[{}] {}", type_name(kind), labels.join(".")));
    }

    questions.join(", ")
}

fn skip_questions(meta: &[u8], count: u16, pos: &mut usize) {
    for _ in 0..count {
        loop {
            let Some(&size) = meta.get(*pos) else {
                return;
            };
            if size == 0 {
                break;
            }
            let next = *pos + 1 + size as usize;
            if meta.len() < next {
                return;
            }
            *pos = next;
        }
        *pos += 5; // name terminator, type and class
    }
}

fn decode_answers(meta: &[u8], count: u16, pos: &mut usize) -> String {
    let mut records: Vec<(String, Vec<String>)> = Vec::new();

    for _ in 0..count {
        if meta.len() <= *pos + 10 {
            break;
        }
        *pos += 2; // compressed name pointer

        let Some(kind) = read_u16(meta, *pos) else {
            break;
        };
        *pos += 8; // type, class and ttl

        let Some(data_len) = read_u16(meta, *pos) else {
            break;
        };
        let data_len = data_len as usize;
        *pos += 2;

        let value = match kind {
            TYPE_A => {
                if meta.len() < *pos + 4 {
                    break;
                }
                let value = format!(
                    "{}.{}.{}.{}",
                    meta[*pos],
                    meta[*pos + 1],
                    meta[*pos + 2],
                    meta[*pos + 3]
                );
                *pos += 4;
                value
            }
            TYPE_CNAME => {
                if meta.len() < *pos + data_len {
                    break;
                }
                let size = meta[*pos] as usize;
                if meta.len() < *pos + 1 + size {
                    break;
                }
                // TODO: follow compression pointers instead of cutting the
                // name off after its first label.
                let value = format!(
                    "{}...",
                    String::from_utf8_lossy(&meta[*pos + 1..*pos + 1 + size])
                );
                *pos += data_len;
                value
            }
            _ => {
                *pos += data_len;
                continue;
            }
        };

        let name = type_name(kind);
        match records.iter_mut().find(|(kind, _)| *kind == name) {
            Some((_, values)) => values.push(value),
            None => records.push((name, vec![value])),
        }
    }

    let mut content = String::new();
    for (name, values) in records {
        content.push_str(&format!("[{}] {}; ", name, values.join("/")));
    }

    content
}

fn read_u16(meta: &[u8], pos: usize) -> Option<u16> {
    Some(u16::from_be_bytes([*meta.get(pos)?, *meta.get(pos + 1)?]))
}
