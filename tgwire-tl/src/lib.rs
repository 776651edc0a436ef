//! Schema-driven TL (Type Language) runtime codec.
//!
//! Unlike code-generated bindings, this crate keeps the TL schema around at
//! runtime and (de)serializes *dynamic* values against it: any constructor
//! or method the schema describes can travel the wire without recompiling.
//!
//! # Overview
//!
//! | Module           | Contents                                             |
//! |------------------|------------------------------------------------------|
//! | [`value`]        | The dynamic [`Value`]/[`Record`] tree                |
//! | [`schema`]       | Schema files → [`SchemaEntry`] registries            |
//! | [`registry`]     | Lookup by id, predicate (with layers), and type      |
//! | [`callbacks`]    | Named hooks fired at defined points                  |
//! | [`serialize`]    | Primitive wire encoders                              |
//! | [`deserialize`]  | [`Cursor`] and primitive wire decoders               |
//! | [`serializer`]   | Schema-directed serialization (async)                |
//! | [`deserializer`] | Schema-directed deserialization                      |
//!
//! # Quick start
//!
//! ```rust
//! use tgwire_tl::{Param, Record, Schema, Tl, Origin};
//!
//! let mut schema = Schema::new();
//! schema.add_tl(
//!     "inputPeerUser#dde8a54c user_id:long access_hash:long = InputPeer;",
//!     Origin::Api,
//! ).unwrap();
//! let tl = Tl::new(schema);
//!
//! # let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
//! # rt.block_on(async {
//! let peer = Record::new("inputPeerUser")
//!     .field("user_id", 12345i64)
//!     .field("access_hash", 0i64);
//! let bytes = tl.serialize(&Param::of_type("InputPeer"), peer.into(), -1).await.unwrap();
//! assert_eq!(&bytes[..4], &0xdde8a54cu32.to_le_bytes());
//! # });
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod callbacks;
pub mod deserialize;
pub mod deserializer;
pub mod errors;
pub mod registry;
pub mod schema;
pub mod serialize;
pub mod serializer;
pub mod value;

pub use callbacks::{CallbackRegistry, HookProvider, OutgoingLookup, PendingCall};
pub use deserialize::Cursor;
pub use errors::{Error, Result};
pub use registry::Registry;
pub use schema::{Origin, Param, Schema, SchemaBundle, SchemaEntry};
pub use serializer::{Collaborators, SynthRequest};
pub use value::{Record, Value};

/// `vector#1cb5c415` — the boxed vector constructor.
pub(crate) const VECTOR_ID: u32 = 0x1cb5c415;
/// `boolTrue#997275b5`.
pub(crate) const BOOL_TRUE_ID: u32 = 0x997275b5;
/// `boolFalse#bc799737`.
pub(crate) const BOOL_FALSE_ID: u32 = 0xbc799737;
/// `gzip_packed#3072cfa1` — compressed envelope around any boxed value.
pub(crate) const GZIP_PACKED_ID: u32 = 0x3072cfa1;

/// The runtime codec: a loaded [`Schema`], the hook registry, and the
/// host-provided collaborators.
///
/// The schema is read-only once constructed; hooks are replaced wholesale
/// via [`Tl::update_callbacks`].
pub struct Tl {
    schema: Schema,
    callbacks: CallbackRegistry,
    collaborators: Collaborators,
}

impl Tl {
    /// A codec over an already-loaded schema, with no hooks registered.
    pub fn new(schema: Schema) -> Self {
        Self {
            schema,
            callbacks: CallbackRegistry::new(),
            collaborators: Collaborators::default(),
        }
    }

    /// Load every schema file a bundle names and build the codec.
    pub fn init(bundle: SchemaBundle) -> Result<Self> {
        Ok(Self::new(Schema::load(bundle)?))
    }

    /// The loaded schema.
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub(crate) fn callbacks(&self) -> &CallbackRegistry {
        &self.callbacks
    }

    pub(crate) fn collaborators(&self) -> &Collaborators {
        &self.collaborators
    }

    /// Rebuild all hook categories from `providers`, atomically: readers see
    /// either the old maps or the new ones, never a mixture.
    pub fn update_callbacks(&mut self, providers: &[&dyn HookProvider]) {
        self.callbacks = CallbackRegistry::rebuild(providers);
    }

    /// Install the collaborators consulted during default synthesis.
    pub fn set_collaborators(&mut self, collaborators: Collaborators) {
        self.collaborators = collaborators;
    }
}
