//! Memcached text protocol summaries.
//!
//! Write commands sent with "noreply" never get an answer, so they are
//! flagged as ignorable instead of being left to rot in the correlation
//! table.

use crate::{Packet, PayloadDecoder};

const WRITE_COMMANDS: [&str; 11] = [
    "set", "add", "incr", "decr", "delete", "replace", "append", "prepend", "cas", "touch",
    "flushall",
];

pub struct MemcachedDecoder;

impl PayloadDecoder for MemcachedDecoder {
    fn decode(&self, packet: &mut Packet) {
        let text = packet.payload_text().into_owned();

        if WRITE_COMMANDS.iter().any(|command| text.starts_with(command))
            && text.get(7..).is_some_and(|rest| rest.contains("noreply"))
        {
            packet.ignore = true;
            return;
        }

        packet.content = text.replace("\r\n", " ");
    }
}
