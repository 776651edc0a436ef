//! MTProto outgoing-message lifecycle.
//!
//! This crate tracks what happens to a request after it is handed to the
//! session layer:
//!
//! ```text
//! PENDING --try_send--> PENDING  (send sink allocated, tries++)
//! PENDING --sent------> SENT     (send sink resolved, once)
//! SENT    --ack-------> ACKED
//! ACKED   --reply-----> REPLIED  (result sink resolved, once; caches cleared)
//! SENT    --reply-----> REPLIED  (ack implied)
//! any     --reset_sent-> sent=0  (session resends)
//! ```
//!
//! It is intentionally transport-agnostic and does no I/O of its own: the
//! session layer serializes bodies with `tgwire-tl`, stamps [`MessageId`]s,
//! and drives the transitions; waiters hold only the one-shot receivers.

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod message;
pub mod outgoing;
pub mod pending;

pub use message::{MessageId, MessageIdGenerator};
pub use outgoing::{DoubleReply, OutgoingMessage, RpcFailure, RpcOutcome};
pub use pending::PendingMessages;
