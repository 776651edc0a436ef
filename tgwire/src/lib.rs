//! # tgwire — schema-driven MTProto wire library
//!
//! `tgwire` speaks Telegram's TL wire format from the schema itself: no code
//! generation, any constructor the schema describes can be built, sent, and
//! decoded at runtime. It consists of three focused sub-crates wired
//! together here for convenience:
//!
//! | Sub-crate          | Role                                              |
//! |--------------------|---------------------------------------------------|
//! | `tgwire-tl-parser` | Parse `.tl` schema files into an AST              |
//! | `tgwire-tl`        | Dynamic values, registries, serializer/deserializer |
//! | `tgwire-mtproto`   | Outgoing-message lifecycle, message ids           |
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use tgwire::tl::{Record, SchemaBundle, Tl, Value};
//! use tgwire::mtproto::{MessageIdGenerator, OutgoingMessage, PendingMessages};
//!
//! # let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
//! # rt.block_on(async {
//! let tl = Tl::init(
//!     SchemaBundle::new()
//!         .api("schemas/api.tl")
//!         .mtproto("schemas/mtproto.tl"),
//! )?;
//!
//! // Serialize a request…
//! let args = Record::untagged().field("id", Value::Vector(Vec::new()));
//! let bytes = tl.serialize_method("users.getUsers", args.into(), -1).await?;
//!
//! // …and track its lifecycle
//! let mut ids = MessageIdGenerator::new();
//! let mut pending = PendingMessages::new();
//! let mut msg = OutgoingMessage::new(Value::Null, "users.getUsers", "Vector<User>", true, false);
//! msg.set_serialized(bytes);
//! msg.try_send();
//! let _reply = msg.take_result_receiver();
//! pending.insert(msg, ids.next());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! # });
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

/// Re-export of [`tgwire_tl`] — dynamic values, schema registries, and the
/// runtime serializer/deserializer.
pub use tgwire_tl as tl;

/// Re-export of [`tgwire_mtproto`] — outgoing-message lifecycle and ids.
pub use tgwire_mtproto as mtproto;

/// Re-export of [`tgwire_tl_parser`] (requires `feature = "parser"`).
#[cfg(feature = "parser")]
pub use tgwire_tl_parser as parser;

// ─── Convenience re-exports ───────────────────────────────────────────────────

pub use tgwire_tl::{Param, Record, Schema, SchemaBundle, Tl, Value};

pub use tgwire_mtproto::{MessageId, MessageIdGenerator, OutgoingMessage, PendingMessages};
