//! The session layer's pending-request table.

use std::collections::HashMap;

use tgwire_tl::callbacks::{OutgoingLookup, PendingCall};

use crate::message::MessageId;
use crate::outgoing::OutgoingMessage;

/// Outgoing messages keyed by their wire id.
///
/// Owns each [`OutgoingMessage`] exclusively; the codec reaches in through
/// [`OutgoingLookup`] while decoding `rpc_result`s, and the session layer
/// sweeps replied entries with [`PendingMessages::collect_garbage`].
#[derive(Debug, Default)]
pub struct PendingMessages {
    map: HashMap<i64, OutgoingMessage>,
}

impl PendingMessages {
    /// An empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Track a message under the id the session stamped on it.
    ///
    /// Replaces (and returns) any previous entry with the same id.
    pub fn insert(&mut self, mut message: OutgoingMessage, msg_id: MessageId) -> Option<OutgoingMessage> {
        message.set_msg_id(msg_id);
        self.map.insert(msg_id.0, message)
    }

    /// Borrow a tracked message.
    pub fn get(&self, msg_id: MessageId) -> Option<&OutgoingMessage> {
        self.map.get(&msg_id.0)
    }

    /// Mutably borrow a tracked message (to `ack`, `reply`, …).
    pub fn get_mut(&mut self, msg_id: MessageId) -> Option<&mut OutgoingMessage> {
        self.map.get_mut(&msg_id.0)
    }

    /// Stop tracking a message.
    pub fn remove(&mut self, msg_id: MessageId) -> Option<OutgoingMessage> {
        self.map.remove(&msg_id.0)
    }

    /// Drop every entry whose lifecycle allows it; returns how many went.
    pub fn collect_garbage(&mut self) -> usize {
        let before = self.map.len();
        self.map.retain(|_, m| !m.can_garbage_collect());
        before - self.map.len()
    }

    /// Number of tracked messages.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Iterate over tracked messages in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = &OutgoingMessage> {
        self.map.values()
    }
}

impl OutgoingLookup for PendingMessages {
    fn find(&self, msg_id: i64) -> Option<PendingCall> {
        let message = self.map.get(&msg_id)?;
        Some(PendingCall {
            msg_id,
            name: message.constructor().to_owned(),
            ty: message.ty().to_owned(),
        })
    }
}
