use ahash::AHashMap;
use codec::{FlowKey, Packet};

/// Pending requests waiting for their response, keyed by the requester's
/// flow key. Entries own their packet until the matching response (or a
/// connection teardown) takes them out again.
#[derive(Default)]
pub struct PendingTable {
    entries: AHashMap<FlowKey, Box<Packet>>,
}

impl PendingTable {
    pub fn get(&self, key: &FlowKey) -> Option<&Packet> {
        self.entries.get(key).map(Box::as_ref)
    }

    pub fn contains(&self, key: &FlowKey) -> bool {
        self.entries.contains_key(key)
    }

    ///
    /// Install a pending request. A second request on the same key does
    /// not replace the first one: its content is appended instead, so a
    /// request split across transport packets keeps one entry and one
    /// timestamp.
    ///
    pub fn put(&mut self, key: FlowKey, packet: Box<Packet>) {
        match self.entries.get_mut(&key) {
            Some(pending) => {
                pending.content.push(' ');
                pending.content.push_str(&packet.content);
            }
            None => {
                self.entries.insert(key, packet);
            }
        }
    }

    pub fn remove(&mut self, key: &FlowKey) -> Option<Box<Packet>> {
        self.entries.remove(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
