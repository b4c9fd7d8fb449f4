//! Conversation tracking and request/response correlation.
//!
//! A conversation is a flow between two endpoints over one transport. Most
//! flows use a symmetric key (both directions map to the same conversation);
//! protocols whose replies may come from a different address use an
//! anchored key that pins one address and both ports.

mod transaction;

pub use transaction::{
    CallKey, CallPolicy, CallRecord, RequestOutcome, Resolution, TransactionMatcher,
    DEFAULT_WINDOW_US,
};

use std::collections::HashMap;

use crate::address::{Address, Transport};

/// Opaque conversation handle, unique within a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConversationId(pub u64);

/// Lookup key of a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConversationKey {
    /// Normalized endpoint pair: the lower `(address, port)` comes first,
    /// so both directions of a flow share one key.
    Symmetric {
        transport: Transport,
        addr_a: Address,
        port_a: u16,
        addr_b: Address,
        port_b: u16,
    },
    /// One pinned address and port plus the peer's port; any peer address
    /// matches.
    Anchored {
        transport: Transport,
        addr: Address,
        port: u16,
        peer_port: u16,
    },
}

impl ConversationKey {
    /// Create a normalized symmetric key.
    pub fn symmetric(transport: Transport, src: Address, src_port: u16, dst: Address, dst_port: u16) -> Self {
        let ((addr_a, port_a), (addr_b, port_b)) = if (src, src_port) <= (dst, dst_port) {
            ((src, src_port), (dst, dst_port))
        } else {
            ((dst, dst_port), (src, src_port))
        };
        ConversationKey::Symmetric {
            transport,
            addr_a,
            port_a,
            addr_b,
            port_b,
        }
    }

    /// Create a key pinned to `addr:port`, talking to `peer_port` on any
    /// address.
    pub fn anchored(transport: Transport, addr: Address, port: u16, peer_port: u16) -> Self {
        ConversationKey::Anchored {
            transport,
            addr,
            port,
            peer_port,
        }
    }

    pub fn transport(&self) -> Transport {
        match self {
            ConversationKey::Symmetric { transport, .. } | ConversationKey::Anchored { transport, .. } => {
                *transport
            }
        }
    }
}

/// A tracked conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conversation {
    pub id: ConversationId,
    pub key: ConversationKey,
    pub first_frame: u64,
    pub last_frame: u64,
    pub packets: u64,
}

/// All conversations seen in a session.
#[derive(Debug, Default)]
pub struct ConversationTable {
    by_key: HashMap<ConversationKey, ConversationId>,
    conversations: Vec<Conversation>,
}

impl ConversationTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Find an existing conversation without touching it.
    pub fn find(&self, key: &ConversationKey) -> Option<&Conversation> {
        let id = self.by_key.get(key)?;
        self.get(*id)
    }

    /// Find the conversation for `key`, creating it on first sight, and
    /// count `frame` as one of its packets.
    pub fn find_or_create(&mut self, key: ConversationKey, frame: u64) -> ConversationId {
        if let Some(id) = self.by_key.get(&key).copied() {
            if let Some(conv) = self.conversations.get_mut(id.0 as usize) {
                // A frame seen again (second pass) is not a new packet.
                if frame > conv.last_frame {
                    conv.last_frame = frame;
                    conv.packets += 1;
                }
            }
            return id;
        }

        let id = ConversationId(self.conversations.len() as u64);
        self.conversations.push(Conversation {
            id,
            key,
            first_frame: frame,
            last_frame: frame,
            packets: 1,
        });
        self.by_key.insert(key, id);
        id
    }

    pub fn get(&self, id: ConversationId) -> Option<&Conversation> {
        self.conversations.get(id.0 as usize)
    }

    /// All conversations in creation order.
    pub fn iter(&self) -> impl Iterator<Item = &Conversation> {
        self.conversations.iter()
    }

    pub fn len(&self) -> usize {
        self.conversations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conversations.is_empty()
    }

    pub fn reset(&mut self) {
        self.by_key.clear();
        self.conversations.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ip(last: u8) -> Address {
        Address::ipv4(&[10, 0, 0, last])
    }

    #[test]
    fn test_symmetric_key_normalization() {
        let k1 = ConversationKey::symmetric(Transport::Udp, ip(1), 5000, ip(2), 1812);
        let k2 = ConversationKey::symmetric(Transport::Udp, ip(2), 1812, ip(1), 5000);
        assert_eq!(k1, k2);

        let other = ConversationKey::symmetric(Transport::Tcp, ip(1), 5000, ip(2), 1812);
        assert_ne!(k1, other);
    }

    #[test]
    fn test_find_or_create() {
        let mut table = ConversationTable::new();
        let key = ConversationKey::symmetric(Transport::Udp, ip(1), 5000, ip(2), 1812);
        assert!(table.find(&key).is_none());

        let id = table.find_or_create(key, 1);
        let reverse = ConversationKey::symmetric(Transport::Udp, ip(2), 1812, ip(1), 5000);
        assert_eq!(table.find_or_create(reverse, 2), id);

        let conv = table.find(&key).unwrap();
        assert_eq!(conv.first_frame, 1);
        assert_eq!(conv.last_frame, 2);
        assert_eq!(conv.packets, 2);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_anchored_keys_ignore_peer_address() {
        let mut table = ConversationTable::new();
        // Request from 10.0.0.1:5000 to port 1812 on any server
        let request = ConversationKey::anchored(Transport::Udp, ip(1), 5000, 1812);
        let id = table.find_or_create(request, 1);

        // Reply arrives from a different server address; the lookup pins
        // the client side the same way.
        let reply = ConversationKey::anchored(Transport::Udp, ip(1), 5000, 1812);
        assert_eq!(table.find_or_create(reply, 2), id);

        let unrelated = ConversationKey::anchored(Transport::Udp, ip(1), 5001, 1812);
        assert_ne!(table.find_or_create(unrelated, 3), id);
    }

    #[test]
    fn test_reset() {
        let mut table = ConversationTable::new();
        table.find_or_create(ConversationKey::anchored(Transport::Udp, ip(1), 1, 2), 1);
        table.reset();
        assert!(table.is_empty());
        assert_eq!(
            table.find_or_create(ConversationKey::anchored(Transport::Udp, ip(1), 1, 2), 5),
            ConversationId(0)
        );
    }
}
