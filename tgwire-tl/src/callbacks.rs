//! Named hooks fired at defined points of (de)serialization.
//!
//! Six categories exist. Four accumulate (newest registration runs first);
//! `CONSTRUCTOR_SERIALIZE` and `TYPE_MISMATCH` are last-writer-wins
//! singletons because they *replace* the value rather than observe it.
//!
//! Decode-side hooks run synchronously during the parse and may return a
//! boxed future; the deserializer collects those and the caller awaits them
//! once the parse completes. Serialize-side hooks return futures that the
//! serializer awaits inline, since their result feeds back into the stream.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::errors::{Error, Result};
use crate::value::Value;

/// Deferred work returned by a decode-side hook.
pub type HookFuture = Pin<Box<dyn Future<Output = Result<()>> + Send>>;

/// Future resolving to a replacement value, returned by serialize-side hooks.
pub type ValueFuture = Pin<Box<dyn Future<Output = Result<Value>> + Send>>;

/// Fired around constructor decoding; may mutate the value in place and/or
/// return deferred work.
pub type DecodeHook = Arc<dyn Fn(&mut Value) -> Option<HookFuture> + Send + Sync>;

/// Fired around `rpc_result` dispatch with the originating call's identity.
pub type MethodHook = Arc<dyn Fn(&PendingCall, &mut Value) -> Option<HookFuture> + Send + Sync>;

/// Replaces a value before serialization (`CONSTRUCTOR_SERIALIZE`) or
/// coerces a mis-typed one (`TYPE_MISMATCH`).
pub type SerializeHook = Arc<dyn Fn(Value) -> ValueFuture + Send + Sync>;

/// Identity of an in-flight request, recovered from the session's
/// outgoing-message table while decoding an `rpc_result`.
#[derive(Clone, Debug, PartialEq)]
pub struct PendingCall {
    /// The wire `msg_id` the request was sent under.
    pub msg_id: i64,
    /// The method name (`"users.getUsers"`).
    pub name: String,
    /// The method's declared result type (`"Vector<User>"`).
    pub ty: String,
}

/// The session-layer lookup consumed during `rpc_result` decoding.
pub trait OutgoingLookup {
    /// Resolve a `req_msg_id` to the call that produced it, if still pending.
    fn find(&self, msg_id: i64) -> Option<PendingCall>;
}

/// A source of named hooks; [`CallbackRegistry::rebuild`] collects from every
/// provider in registration order.
///
/// All methods default to empty so providers implement only what they need.
pub trait HookProvider {
    /// Hooks fired after a constructor id is read, before its fields.
    fn constructor_before(&self) -> Vec<(String, DecodeHook)> {
        Vec::new()
    }

    /// Hooks fired once a constructor is fully decoded.
    fn constructor(&self) -> Vec<(String, DecodeHook)> {
        Vec::new()
    }

    /// Value-replacing hooks fired before serializing a predicate.
    fn constructor_serialize(&self) -> Vec<(String, SerializeHook)> {
        Vec::new()
    }

    /// Hooks fired when an `rpc_result`'s request constructor is known,
    /// before its result decodes.
    fn method_before(&self) -> Vec<(String, MethodHook)> {
        Vec::new()
    }

    /// Hooks fired after an `rpc_result`'s result has decoded.
    fn method(&self) -> Vec<(String, MethodHook)> {
        Vec::new()
    }

    /// Coercion hooks keyed by *target type*, fired when a serialize target
    /// expects that type but the value does not carry a predicate of it.
    fn type_mismatch(&self) -> Vec<(String, SerializeHook)> {
        Vec::new()
    }
}

/// The compiled hook maps. Immutable once built; [`CallbackRegistry::rebuild`]
/// replaces all categories wholesale so readers never observe a partial
/// update.
#[derive(Default)]
pub struct CallbackRegistry {
    constructor_before: HashMap<String, Vec<DecodeHook>>,
    constructor: HashMap<String, Vec<DecodeHook>>,
    constructor_serialize: HashMap<String, SerializeHook>,
    method_before: HashMap<String, Vec<MethodHook>>,
    method: HashMap<String, Vec<MethodHook>>,
    type_mismatch: HashMap<String, SerializeHook>,
}

impl CallbackRegistry {
    /// An empty registry (no hooks fire).
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the category maps from `providers`.
    ///
    /// Later providers win: their accumulating hooks run before earlier ones,
    /// and their singleton hooks replace earlier registrations.
    pub fn rebuild(providers: &[&dyn HookProvider]) -> Self {
        let mut built = Self::new();
        for provider in providers {
            for (name, hook) in provider.constructor_before() {
                built.constructor_before.entry(name).or_default().insert(0, hook);
            }
            for (name, hook) in provider.constructor() {
                built.constructor.entry(name).or_default().insert(0, hook);
            }
            for (name, hook) in provider.method_before() {
                built.method_before.entry(name).or_default().insert(0, hook);
            }
            for (name, hook) in provider.method() {
                built.method.entry(name).or_default().insert(0, hook);
            }
            for (name, hook) in provider.constructor_serialize() {
                built.constructor_serialize.insert(name, hook);
            }
            for (name, hook) in provider.type_mismatch() {
                built.type_mismatch.insert(name, hook);
            }
        }
        built
    }

    pub(crate) fn constructor_before_hooks(&self, predicate: &str) -> &[DecodeHook] {
        self.constructor_before.get(predicate).map_or(&[], Vec::as_slice)
    }

    pub(crate) fn constructor_hooks(&self, predicate: &str) -> &[DecodeHook] {
        self.constructor.get(predicate).map_or(&[], Vec::as_slice)
    }

    pub(crate) fn constructor_serialize_hook(&self, predicate: &str) -> Option<&SerializeHook> {
        self.constructor_serialize.get(predicate)
    }

    pub(crate) fn method_before_hooks(&self, method: &str) -> &[MethodHook] {
        self.method_before.get(method).map_or(&[], Vec::as_slice)
    }

    pub(crate) fn method_hooks(&self, method: &str) -> &[MethodHook] {
        self.method.get(method).map_or(&[], Vec::as_slice)
    }

    pub(crate) fn type_mismatch_hook(&self, ty: &str) -> Option<&SerializeHook> {
        self.type_mismatch.get(ty)
    }
}

/// Boxes a plain value into the immediately-ready future the serialize-side
/// hook signatures expect.
pub fn ready(value: Value) -> ValueFuture {
    Box::pin(std::future::ready(Ok(value)))
}

/// Like [`ready`] but for a hook that wants to fail the serialization.
pub fn fail(error: Error) -> ValueFuture {
    Box::pin(std::future::ready(Err(error)))
}
