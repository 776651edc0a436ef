//! Per-request lifecycle state: pending → sent → acked → replied.
//!
//! An [`OutgoingMessage`] is owned exclusively by the session layer's
//! pending-table; waiters hold only the one-shot receivers. Both completion
//! sinks are `tokio::sync::oneshot` channels, which enforce at-most-once
//! delivery and hand the value to the waiter on its next poll — replies
//! therefore never re-enter the decode path that produced them.

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use tokio::sync::oneshot;

use tgwire_tl::Value;

use crate::message::MessageId;

/// Constructors that do not advance the content-related sequence number:
/// acks, pings, containers, service notifications, and envelopes.
const NOT_CONTENT_RELATED: &[&str] = &[
    "rpc_result",
    "rpc_error",
    "rpc_drop_answer",
    "rpc_answer_unknown",
    "rpc_answer_dropped_running",
    "rpc_answer_dropped",
    "get_future_salts",
    "future_salt",
    "future_salts",
    "ping",
    "pong",
    "ping_delay_disconnect",
    "destroy_session",
    "destroy_session_ok",
    "destroy_session_none",
    "new_session_created",
    "msg_container",
    "msg_copy",
    "gzip_packed",
    "http_wait",
    "msgs_ack",
    "bad_msg_notification",
    "bad_server_salt",
    "msgs_state_req",
    "msgs_state_info",
    "msgs_all_info",
    "msg_detailed_info",
    "msg_new_detailed_info",
    "msg_resend_req",
    "msg_resend_ans_req",
];

/// How a request ultimately failed.
#[derive(Clone, Debug, PartialEq)]
pub enum RpcFailure {
    /// Telegram answered with an `rpc_error`.
    Error {
        /// Numeric error code (420, 303, …).
        code: i32,
        /// Error text (`FLOOD_WAIT_17`, …).
        message: String,
    },
    /// The session layer abandoned the request.
    Cancelled,
}

impl fmt::Display for RpcFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Error { code, message } => write!(f, "RPC {code}: {message}"),
            Self::Cancelled => write!(f, "request cancelled"),
        }
    }
}

impl std::error::Error for RpcFailure {}

/// What a waiter receives when the request completes.
pub type RpcOutcome = Result<Value, RpcFailure>;

/// A second `reply` on an already-replied message.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DoubleReply;

impl fmt::Display for DoubleReply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "outgoing message replied to twice")
    }
}

impl std::error::Error for DoubleReply {}

const SENT: u8 = 1;
const ACKED: u8 = 2;
const REPLY: u8 = 4;
// A reply implies acknowledgement
const REPLIED: u8 = ACKED | REPLY;

/// One outgoing request (or service message) and everything the session
/// layer tracks about it.
pub struct OutgoingMessage {
    body: Option<Value>,
    serialized: Option<Vec<u8>>,
    constructor: String,
    ty: String,
    method: bool,
    unencrypted: bool,

    state: u8,
    msg_id: MessageId,
    tries: u32,
    sent_at: u64,

    /// Touches user state (affects retry policy on login transitions).
    pub user_related: bool,
    /// Carries file data (routed over media connections).
    pub file_related: bool,
    /// Originates from the bot-API compatibility layer.
    pub bot_api: bool,
    /// Must refresh file references before a retry.
    pub refresh_references: bool,
    content_related: bool,
    /// The call-ordering queue this message belongs to, if any.
    pub queue_id: Option<u64>,
    flood_wait_limit: Option<i32>,

    send_tx: Option<oneshot::Sender<()>>,
    send_rx: Option<oneshot::Receiver<()>>,
    result_tx: Option<oneshot::Sender<RpcOutcome>>,
    result_rx: Option<oneshot::Receiver<RpcOutcome>>,
}

impl OutgoingMessage {
    /// A new message in the PENDING state.
    ///
    /// A result sink exists iff `method` — service messages have no waiter.
    pub fn new(
        body: Value,
        constructor: impl Into<String>,
        ty: impl Into<String>,
        method: bool,
        unencrypted: bool,
    ) -> Self {
        let constructor = constructor.into();
        let content_related = !NOT_CONTENT_RELATED.contains(&constructor.as_str());

        let (result_tx, result_rx) = if method {
            let (tx, rx) = oneshot::channel();
            (Some(tx), Some(rx))
        } else {
            (None, None)
        };

        Self {
            body: Some(body),
            serialized: None,
            constructor,
            ty: ty.into(),
            method,
            unencrypted,
            state: 0,
            msg_id: MessageId::UNSET,
            tries: 0,
            sent_at: 0,
            user_related: false,
            file_related: false,
            bot_api: false,
            refresh_references: false,
            content_related,
            queue_id: None,
            flood_wait_limit: None,
            send_tx: None,
            send_rx: None,
            result_tx,
            result_rx,
        }
    }

    /// The constructor (or method) name this message carries.
    pub fn constructor(&self) -> &str {
        &self.constructor
    }

    /// The declared result type, used by the deserializer to decode the
    /// matching `rpc_result`.
    pub fn ty(&self) -> &str {
        &self.ty
    }

    /// Whether this message is an RPC method call.
    pub fn is_method(&self) -> bool {
        self.method
    }

    /// Whether this message travels outside the encrypted envelope.
    pub fn is_unencrypted(&self) -> bool {
        self.unencrypted
    }

    /// Whether this message advances the content-related sequence number.
    pub fn is_content_related(&self) -> bool {
        self.content_related
    }

    /// The value to serialize; `None` once replied.
    pub fn body(&self) -> Option<&Value> {
        self.body.as_ref()
    }

    /// Cached wire bytes from an earlier serialization.
    pub fn serialized(&self) -> Option<&[u8]> {
        self.serialized.as_deref()
    }

    /// Cache the serialized form so retries skip re-encoding.
    pub fn set_serialized(&mut self, bytes: Vec<u8>) {
        self.serialized = Some(bytes);
    }

    /// The wire id the session layer stamped, `UNSET` before first send.
    pub fn msg_id(&self) -> MessageId {
        self.msg_id
    }

    /// Stamp the wire id.
    pub fn set_msg_id(&mut self, msg_id: MessageId) {
        self.msg_id = msg_id;
    }

    /// Send attempts so far.
    pub fn tries(&self) -> u32 {
        self.tries
    }

    /// Unix time of the last send; 0 when never sent or reset.
    pub fn sent_at(&self) -> u64 {
        self.sent_at
    }

    /// The longest flood wait this request tolerates, if limited.
    pub fn flood_wait_limit(&self) -> Option<i32> {
        self.flood_wait_limit
    }

    /// Limit how long a `FLOOD_WAIT` may postpone this request.
    pub fn set_flood_wait_limit(&mut self, seconds: i32) {
        self.flood_wait_limit = Some(seconds);
    }

    /// Whether the message has been put on the wire at least once.
    pub fn is_sent(&self) -> bool {
        self.state & SENT != 0
    }

    /// Whether the server acknowledged receipt.
    pub fn is_acked(&self) -> bool {
        self.state & ACKED != 0
    }

    /// Whether a reply (or error, or cancellation) has been delivered.
    pub fn is_replied(&self) -> bool {
        self.state & REPLY != 0
    }

    /// Prepare a send attempt: allocate the send sink (first time only) and
    /// count the try.
    pub fn try_send(&mut self) {
        if self.send_tx.is_none() && self.send_rx.is_none() {
            let (tx, rx) = oneshot::channel();
            self.send_tx = Some(tx);
            self.send_rx = Some(rx);
        }
        self.tries += 1;
    }

    /// The one-shot receiver resolved on first send. Takeable once.
    pub fn take_send_receiver(&mut self) -> Option<oneshot::Receiver<()>> {
        self.send_rx.take()
    }

    /// The one-shot receiver resolved with the RPC outcome. Takeable once;
    /// `None` for non-method messages.
    pub fn take_result_receiver(&mut self) -> Option<oneshot::Receiver<RpcOutcome>> {
        self.result_rx.take()
    }

    /// The message hit the wire: record the time and resolve the send sink.
    ///
    /// Only the first call fires the sink; retries merely refresh the
    /// timestamp.
    pub fn sent(&mut self) {
        self.state |= SENT;
        self.sent_at =
            SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs();
        if let Some(tx) = self.send_tx.take() {
            let _ = tx.send(());
        }
    }

    /// The server acknowledged the message (`msgs_ack`).
    pub fn ack(&mut self) {
        self.state |= ACKED;
    }

    /// Deliver the final outcome and release the payload caches.
    ///
    /// The waiter observes the value on its own next poll, never from inside
    /// this call. A second reply fails with [`DoubleReply`] and leaves the
    /// first outcome intact.
    pub fn reply(&mut self, outcome: RpcOutcome) -> Result<(), DoubleReply> {
        if self.is_replied() {
            return Err(DoubleReply);
        }
        self.state |= REPLIED;
        self.body = None;
        self.serialized = None;

        match self.result_tx.take() {
            Some(tx) => {
                // A waiter that dropped its receiver is not an error;
                // the reply is simply unobserved
                let _ = tx.send(outcome);
            }
            None => {
                if self.method {
                    log::debug!(
                        "reply to {} after its waiter was detached",
                        self.constructor,
                    );
                }
            }
        }
        Ok(())
    }

    /// Forget the last send so the session layer resends.
    pub fn reset_sent(&mut self) {
        self.sent_at = 0;
    }

    /// Whether the pending-table may drop this message: it has been replied
    /// to, or nothing will ever wait on it.
    pub fn can_garbage_collect(&self) -> bool {
        self.is_replied() || !self.method
    }
}

impl fmt::Debug for OutgoingMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OutgoingMessage")
            .field("constructor", &self.constructor)
            .field("msg_id", &self.msg_id)
            .field("state", &self.state)
            .field("tries", &self.tries)
            .field("method", &self.method)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_relatedness_is_derived() {
        let ping = OutgoingMessage::new(Value::Null, "ping", "Pong", false, false);
        assert!(!ping.is_content_related());

        let send = OutgoingMessage::new(Value::Null, "messages.sendMessage", "Updates", true, false);
        assert!(send.is_content_related());
    }

    #[test]
    fn result_sink_exists_iff_method() {
        let mut ping = OutgoingMessage::new(Value::Null, "ping", "Pong", false, false);
        assert!(ping.take_result_receiver().is_none());
        assert!(ping.can_garbage_collect());

        let mut call = OutgoingMessage::new(Value::Null, "users.getUsers", "Vector<User>", true, false);
        assert!(call.take_result_receiver().is_some());
        assert!(!call.can_garbage_collect());
    }
}
