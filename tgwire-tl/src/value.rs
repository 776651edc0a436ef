//! The dynamic value model the runtime codec operates on.
//!
//! Schema-directed serialization cannot use concrete Rust structs (the schema
//! is only known at runtime), so values are a tagged tree: primitives, blobs,
//! vectors, and predicate-tagged [`Record`]s with ordered fields.

use std::fmt;

use num_bigint::BigInt;

/// A dynamic TL value.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    /// Explicit absence (used for optional `DataJSON` arguments).
    Null,
    /// `Bool` — and the decoded form of flag-gated `true` bits.
    Bool(bool),
    /// `int` / `#`.
    Int(i32),
    /// `long` as a host integer.
    Long(i64),
    /// `double`.
    Double(f64),
    /// `string` — decoded UTF-8 text.
    Str(String),
    /// `bytes` — the typed byte wrapper, distinct from text.
    ///
    /// Also the decoded shape of `long` fields that carry raw wire ids
    /// (`msg_id`, `server_salt`, …).
    Bytes(Vec<u8>),
    /// `int128` opaque blob.
    Int128([u8; 16]),
    /// `int256` opaque blob.
    Int256([u8; 32]),
    /// `int512` opaque blob.
    Int512([u8; 64]),
    /// Arbitrary-precision integer, accepted as an alternate `long` form on
    /// serialize. The deserializer never produces this variant.
    BigInt(BigInt),
    /// `Vector<T>` / bare `vector`.
    Vector(Vec<Value>),
    /// A predicate-tagged composite.
    Record(Record),
    /// A JSON tree — the decoded form of `dataJSON` and `JSONValue`.
    Json(serde_json::Value),
    /// Pre-serialized wire bytes, emitted verbatim (`!X` queries, `Object`).
    Raw(Vec<u8>),
}

impl Value {
    /// Host integer view accepting both `int` and `long` shapes.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(i64::from(*v)),
            Self::Long(v) => Some(*v),
            Self::Bytes(b) if b.len() == 8 => {
                Some(i64::from_le_bytes(b.as_slice().try_into().unwrap()))
            }
            _ => None,
        }
    }

    /// Truthiness used for flag computation: only `Null` and `false` clear
    /// a bit, everything else sets it.
    pub fn truthy(&self) -> bool {
        !matches!(self, Self::Null | Self::Bool(false))
    }

    /// Borrow the inner record, if this is a composite.
    pub fn as_record(&self) -> Option<&Record> {
        match self {
            Self::Record(r) => Some(r),
            _ => None,
        }
    }

    /// Mutably borrow the inner record, if this is a composite.
    pub fn as_record_mut(&mut self) -> Option<&mut Record> {
        match self {
            Self::Record(r) => Some(r),
            _ => None,
        }
    }
}

/// A composite value: a predicate tag plus ordered named fields.
///
/// Field order is preserved because serialization side effects (hooks,
/// default synthesis) are observable in declared order. Lookups are linear —
/// real constructors have a handful of fields.
#[derive(Clone, Debug, PartialEq, Default)]
pub struct Record {
    predicate: String,
    fields: Vec<(String, Value)>,
}

impl Record {
    /// A record tagged with `predicate`.
    pub fn new(predicate: impl Into<String>) -> Self {
        Self { predicate: predicate.into(), fields: Vec::new() }
    }

    /// A record with no predicate tag yet (the serializer may auto-tag it
    /// from the target type's representative constructor).
    pub fn untagged() -> Self {
        Self::default()
    }

    /// Builder-style field append.
    ///
    /// ```
    /// use tgwire_tl::value::{Record, Value};
    /// let peer = Record::new("inputPeerUser")
    ///     .field("user_id", 12345i64)
    ///     .field("access_hash", 67890i64);
    /// assert_eq!(peer.get("user_id"), Some(&Value::Long(12345)));
    /// ```
    pub fn field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(name, value);
        self
    }

    /// The predicate tag; empty when untagged.
    pub fn predicate(&self) -> &str {
        &self.predicate
    }

    /// Replace the predicate tag.
    pub fn set_predicate(&mut self, predicate: impl Into<String>) {
        self.predicate = predicate.into();
    }

    /// Field lookup by name.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    /// Mutable field lookup by name.
    pub fn get_mut(&mut self, name: &str) -> Option<&mut Value> {
        self.fields.iter_mut().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    /// Insert or replace a field, preserving its original position on
    /// replacement.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        let name = name.into();
        let value = value.into();
        match self.get_mut(&name) {
            Some(slot) => *slot = value,
            None => self.fields.push((name, value)),
        }
    }

    /// Remove a field, returning its value.
    pub fn remove(&mut self, name: &str) -> Option<Value> {
        let idx = self.fields.iter().position(|(n, _)| n == name)?;
        Some(self.fields.remove(idx).1)
    }

    /// Whether a field exists.
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Iterate fields in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(n, v)| (n.as_str(), v))
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether the record has no fields.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{{", self.predicate)?;
        for (i, (name, value)) in self.fields.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{name}: {value:?}")?;
        }
        write!(f, "}}")
    }
}

// ─── Conversions ─────────────────────────────────────────────────────────────

impl From<bool> for Value {
    fn from(v: bool) -> Self { Self::Bool(v) }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self { Self::Int(v) }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self { Self::Long(v) }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self { Self::Double(v) }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self { Self::Str(v.to_owned()) }
}

impl From<String> for Value {
    fn from(v: String) -> Self { Self::Str(v) }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self { Self::Bytes(v) }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self { Self::Vector(v) }
}

impl From<Record> for Value {
    fn from(v: Record) -> Self { Self::Record(v) }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self { Self::Json(v) }
}

impl From<BigInt> for Value {
    fn from(v: BigInt) -> Self { Self::BigInt(v) }
}
