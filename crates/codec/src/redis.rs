//! RESP payload summaries.
//!
//! Replication keepalives ("REPLCONF ACK ...") are flagged as ignorable
//! so they never enter correlation. Everything else is flattened into
//! the command words or the reply value.

use crate::{Packet, PayloadDecoder};

const ERROR: u8 = b'-';
const SIMPLE_STRING: u8 = b'+';
const INTEGER: u8 = b':';
const BULK_STRING: u8 = b'$';
const ARRAY: u8 = b'*';

pub struct RedisDecoder;

impl PayloadDecoder for RedisDecoder {
    fn decode(&self, packet: &mut Packet) {
        if packet.payload.len() > 12 && packet.payload.starts_with(b"REPLCONF ACK") {
            packet.ignore = true;
            return;
        }

        let text = packet.payload_text().into_owned();
        let mut commands: Vec<String> = Vec::new();

        if !text.is_empty() {
            match text.as_bytes()[0] {
                ERROR | SIMPLE_STRING | INTEGER => {
                    let lines: Vec<&str> = text.split("\r\n").collect();
                    if lines.len() == 2 {
                        commands.push(lines[0][1..].to_string());
                    }
                }
                BULK_STRING => {
                    let lines: Vec<&str> = text.split("\r\n").collect();
                    if lines.len() == 3 {
                        commands.push(lines[1].to_string());
                    }
                }
                ARRAY => {
                    // The bulk lengths sit on the odd lines, the argument
                    // values on the even ones. A nested array header in a
                    // pipelined request shifts that phase by one.
                    let lines: Vec<&str> = text.split("\r\n").collect();
                    let mut i = 2;
                    while i < lines.len() {
                        if lines[i].is_empty() || lines[i - 1].is_empty() {
                            i += 2;
                            continue;
                        }
                        if lines[i].as_bytes()[0] == BULK_STRING
                            && lines[i - 1].as_bytes()[0] == ARRAY
                        {
                            i += 1;
                            continue;
                        }
                        commands.push(lines[i].to_string());
                        i += 2;
                    }
                }
                _ => commands.push(text.replace("\r\n", " ")),
            }
        }

        packet.content = commands.join(" ");
    }
}
