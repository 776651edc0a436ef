//! MTProto message identifiers.

use std::time::{SystemTime, UNIX_EPOCH};

/// A 64-bit MTProto message identifier.
///
/// Per the spec: the upper 32 bits are derived from the (server-corrected)
/// Unix time; the least significant two bits must be zero for client
/// messages. Identifiers increase strictly monotonically within a session.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct MessageId(pub i64);

impl MessageId {
    /// The id value `0` — a message that has not been stamped yet.
    pub const UNSET: MessageId = MessageId(0);

    /// Whether the session layer has stamped this message.
    pub fn is_set(self) -> bool {
        self.0 != 0
    }
}

/// Allocates strictly increasing [`MessageId`]s.
///
/// Owned by the session layer; the lifecycle state machine only stores the
/// ids it hands out.
#[derive(Debug, Default)]
pub struct MessageIdGenerator {
    last: i64,
    /// Clock skew in seconds vs. the server.
    time_offset: i32,
}

impl MessageIdGenerator {
    /// A generator with no clock correction.
    pub fn new() -> Self {
        Self::default()
    }

    /// A generator correcting for the given server clock skew.
    pub fn with_offset(time_offset: i32) -> Self {
        Self { last: 0, time_offset }
    }

    /// Update the clock correction (e.g. after a `bad_msg_notification`).
    pub fn set_offset(&mut self, time_offset: i32) {
        self.time_offset = time_offset;
    }

    /// Allocate the next message id.
    pub fn next(&mut self) -> MessageId {
        let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default();
        let secs = (now.as_secs() as i64) + i64::from(self.time_offset);
        let nanos = i64::from(now.subsec_nanos());

        // Seconds in the high half, sub-second entropy shifted to keep the
        // two low bits zero (client-origin marker)
        let mut id = (secs << 32) | ((nanos << 2) & 0xffff_fffc);
        if id <= self.last {
            id = self.last + 4;
        }
        self.last = id;
        MessageId(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_monotonic() {
        let mut gen = MessageIdGenerator::new();
        let mut prev = gen.next();
        for _ in 0..100 {
            let next = gen.next();
            assert!(next > prev);
            prev = next;
        }
    }

    #[test]
    fn low_bits_are_clear() {
        let mut gen = MessageIdGenerator::new();
        for _ in 0..10 {
            assert_eq!(gen.next().0 & 0b11, 0);
        }
    }

    #[test]
    fn unset_marker() {
        assert!(!MessageId::UNSET.is_set());
        assert!(MessageId(4).is_set());
    }
}
