//! Schema-directed deserialization of wire bytes into dynamic values.
//!
//! The parse itself is synchronous and reads the stream strictly in declared
//! order. Hooks fired along the way may hand back futures; those are
//! collected into the returned list for the caller to await once the parse
//! completes, so decoding never re-enters itself through a hook.

use std::collections::HashMap;
use std::io::Read;
use std::sync::OnceLock;

use crate::callbacks::{HookFuture, OutgoingLookup, PendingCall};
use crate::deserialize::Cursor;
use crate::errors::{Error, Result};
use crate::schema::{compile_type, Param, SchemaEntry};
use crate::value::{Record, Value};
use crate::{Tl, BOOL_FALSE_ID, BOOL_TRUE_ID, GZIP_PACKED_ID, VECTOR_ID};

/// `long` fields that carry raw wire identifiers; their values stay as
/// 8-byte blobs so they survive hosts without 64-bit integers and compare
/// bit-for-bit.
const RAW_LONG_FIELDS: &[&str] = &[
    "msg_id",
    "req_msg_id",
    "bad_msg_id",
    "answer_msg_id",
    "first_msg_id",
    "key_fingerprint",
    "server_salt",
    "new_server_salt",
    "server_public_key_fingerprints",
    "ping_id",
    "exchange_id",
];

/// Fields decoded as text regardless of their declared type.
const FORCE_STRING_FIELDS: &[&str] = &["peer_tag", "file_token", "cdn_key", "cdn_iv"];

impl Tl {
    /// Deserialize one value of the expected type from `cur`.
    ///
    /// Returns the value plus any futures produced by decode-side hooks;
    /// await them after the parse (they run outside the stream).
    pub fn deserialize(&self, cur: &mut Cursor<'_>, ctx: &Param) -> Result<(Value, Vec<HookFuture>)> {
        let mut hooks = Vec::new();
        let value = self.read_value(cur, ctx, None, &mut hooks)?;
        Ok((value, hooks))
    }

    /// Like [`Tl::deserialize`], with the session's outgoing-message table
    /// available for `rpc_result` return-type recovery.
    pub fn deserialize_with(
        &self,
        cur: &mut Cursor<'_>,
        ctx: &Param,
        pending: &dyn OutgoingLookup,
    ) -> Result<(Value, Vec<HookFuture>)> {
        let mut hooks = Vec::new();
        let value = self.read_value(cur, ctx, Some(pending), &mut hooks)?;
        Ok((value, hooks))
    }

    /// The number of bytes one value of `ctx`'s type occupies at the start of
    /// `bytes`.
    pub fn get_length(&self, bytes: &[u8], ctx: &Param) -> Result<usize> {
        let mut cur = Cursor::from_slice(bytes);
        let mut hooks = Vec::new();
        self.read_value(&mut cur, ctx, None, &mut hooks)?;
        Ok(cur.pos())
    }

    fn read_value(
        &self,
        cur: &mut Cursor<'_>,
        ctx: &Param,
        pending: Option<&dyn OutgoingLookup>,
        hooks: &mut Vec<HookFuture>,
    ) -> Result<Value> {
        // Some fields are textual transports whatever their declared type
        if FORCE_STRING_FIELDS.contains(&ctx.name.as_str()) {
            return Ok(bytes_to_text(cur.read_tl_bytes()?));
        }

        match ctx.ty.as_str() {
            "int" | "#" => Ok(Value::Int(cur.read_i32()?)),
            "long" => {
                if RAW_LONG_FIELDS.contains(&ctx.name.as_str()) {
                    Ok(Value::Bytes(cur.read_vec(8)?))
                } else {
                    Ok(Value::Long(cur.read_i64()?))
                }
            }
            "double" => Ok(Value::Double(cur.read_f64()?)),
            "int128" => Ok(Value::Int128(cur.read_array()?)),
            "int256" => Ok(Value::Int256(cur.read_array()?)),
            "int512" => Ok(Value::Int512(cur.read_array()?)),
            "string" => Ok(bytes_to_text(cur.read_tl_bytes()?)),
            "bytes" => Ok(Value::Bytes(cur.read_tl_bytes()?)),
            "Bool" => match cur.read_u32()? {
                BOOL_TRUE_ID => Ok(Value::Bool(true)),
                BOOL_FALSE_ID => Ok(Value::Bool(false)),
                id => Err(Error::UnknownConstructor(id)),
            },
            "true" => Ok(Value::Bool(true)),
            "Vector t" => self.read_boxed_vector(cur, ctx, pending, hooks),
            "vector" => self.read_bare_vector(cur, ctx, pending, hooks),
            ty if ty.starts_with('%') => {
                let target = &ty[1..];
                let entry = self
                    .schema()
                    .registry()
                    .find_by_type(target)
                    .ok_or_else(|| Error::BadPredicate(target.to_owned()))?
                    .clone();
                self.read_composite(cur, &entry, ctx, pending, hooks)
            }
            ty => {
                // A bare constructor named directly by the schema
                if let Some(entry) = self.schema().registry().find_by_predicate(ty, -1) {
                    let entry = entry.clone();
                    return self.read_composite(cur, &entry, ctx, pending, hooks);
                }
                // Discovery: boxed types, `Object`, and the empty type
                self.read_discovered(cur, ctx, pending, hooks)
            }
        }
    }

    /// Read a constructor id and resolve it to a constructor or — failing
    /// that — a method, as replayed queries and `Object` results carry
    /// method ids too.
    fn read_discovered(
        &self,
        cur: &mut Cursor<'_>,
        ctx: &Param,
        pending: Option<&dyn OutgoingLookup>,
        hooks: &mut Vec<HookFuture>,
    ) -> Result<Value> {
        let id = cur.read_u32()?;

        if id == VECTOR_ID {
            return self.read_bare_vector(cur, ctx, pending, hooks);
        }
        if id == BOOL_TRUE_ID {
            return Ok(Value::Bool(true));
        }
        if id == BOOL_FALSE_ID {
            return Ok(Value::Bool(false));
        }

        if let Some(entry) = self.schema().registry().find_by_id(id) {
            let entry = entry.clone();
            return self.read_composite(cur, &entry, ctx, pending, hooks);
        }

        if let Some(method) = self.schema().registry().find_method_by_id(id) {
            let method = method.clone();
            let mut synthetic = method.clone();
            synthetic.name = format!("method_{}", method.name);
            return self.read_fields(cur, &synthetic, pending, hooks);
        }

        Err(Error::UnknownConstructor(id))
    }

    fn read_boxed_vector(
        &self,
        cur: &mut Cursor<'_>,
        ctx: &Param,
        pending: Option<&dyn OutgoingLookup>,
        hooks: &mut Vec<HookFuture>,
    ) -> Result<Value> {
        let id = cur.read_u32()?;
        if id == VECTOR_ID {
            return self.read_bare_vector(cur, ctx, pending, hooks);
        }

        // A compressed envelope may stand in for the vector itself
        if id == GZIP_PACKED_ID
            || self
                .schema()
                .registry()
                .find_by_id(id)
                .is_some_and(|e| e.name == "gzip_packed")
        {
            let packed = cur.read_tl_bytes()?;
            let inflated = gunzip(&packed)?;
            let mut inner = Cursor::from_slice(&inflated);
            // Re-enter with the full vector context so element types survive
            // the envelope
            return self.read_value(&mut inner, ctx, pending, hooks);
        }

        Err(Error::InvalidVectorConstructor(id))
    }

    fn read_bare_vector(
        &self,
        cur: &mut Cursor<'_>,
        ctx: &Param,
        pending: Option<&dyn OutgoingLookup>,
        hooks: &mut Vec<HookFuture>,
    ) -> Result<Value> {
        let count = cur.read_u32()? as usize;
        // Each element consumes stream bytes; a count beyond the remaining
        // input is a malformed (or hostile) stream
        if count > cur.remaining() {
            return Err(Error::UnexpectedEof);
        }

        let (ty, subtype) = compile_type(ctx.subtype.as_deref().unwrap_or(""));
        let elem_ctx = Param { name: ctx.name.clone(), ty, flag: None, subtype, optional: false };

        let mut items = Vec::with_capacity(count.min(1024));
        for _ in 0..count {
            items.push(self.read_value(cur, &elem_ctx, pending, hooks)?);
        }
        Ok(Value::Vector(items))
    }

    fn read_composite(
        &self,
        cur: &mut Cursor<'_>,
        entry: &SchemaEntry,
        expected: &Param,
        pending: Option<&dyn OutgoingLookup>,
        hooks: &mut Vec<HookFuture>,
    ) -> Result<Value> {
        match entry.name.as_str() {
            "gzip_packed" => {
                let packed = cur.read_tl_bytes()?;
                let inflated = gunzip(&packed)?;
                let mut inner = Cursor::from_slice(&inflated);
                self.read_value(&mut inner, expected, pending, hooks)
            }
            "vector" => self.read_bare_vector(cur, expected, pending, hooks),
            "boolTrue" => Ok(Value::Bool(true)),
            "boolFalse" => Ok(Value::Bool(false)),
            _ => self.read_fields(cur, entry, pending, hooks),
        }
    }

    fn read_fields(
        &self,
        cur: &mut Cursor<'_>,
        entry: &SchemaEntry,
        pending: Option<&dyn OutgoingLookup>,
        hooks: &mut Vec<HookFuture>,
    ) -> Result<Value> {
        let mut value = Value::Record(Record::new(&entry.name));
        for hook in self.callbacks().constructor_before_hooks(&entry.name) {
            if let Some(fut) = hook(&mut value) {
                hooks.push(fut);
            }
        }
        let mut record = match value {
            Value::Record(r) => r,
            _ => {
                return Err(Error::Hook(format!(
                    "CONSTRUCTOR_BEFORE hook for {} must keep the record shape",
                    entry.name,
                )))
            }
        };

        let mut flag_fields: HashMap<&str, u32> = HashMap::new();

        for p in &entry.params {
            if p.ty == "#" {
                let bits = cur.read_u32()?;
                flag_fields.insert(p.name.as_str(), bits);
                record.set(&p.name, Value::Int(bits as i32));
                continue;
            }

            if let Some(flag) = &p.flag {
                let set = flag_fields.get(flag.field.as_str()).is_some_and(|v| v & flag.pow != 0);
                if !set {
                    // Absent booleans decode as explicit false; other gated
                    // fields simply stay away
                    if p.ty == "true" || p.ty == "Bool" {
                        record.set(&p.name, Value::Bool(false));
                    }
                    continue;
                }
                if p.ty == "true" {
                    record.set(&p.name, Value::Bool(true));
                    continue;
                }
            }

            if entry.name == "rpc_result" && p.name == "result" {
                let result = self.read_rpc_result(cur, &mut record, pending, hooks)?;
                record.set("result", result);
                continue;
            }

            let v = self.read_value(cur, p, pending, hooks)?;

            if p.name == "random_bytes" {
                // Entropy shorter than 15 bytes is a protocol violation;
                // the padding itself is never surfaced
                match v {
                    Value::Bytes(b) if b.len() >= 15 => continue,
                    Value::Str(s) if s.len() >= 15 => continue,
                    _ => return Err(Error::InsecureRandom),
                }
            }

            record.set(&p.name, v);
        }

        let mut value = self.post_process(record)?;

        for hook in self.callbacks().constructor_hooks(&entry.name) {
            if let Some(fut) = hook(&mut value) {
                hooks.push(fut);
            }
        }

        if let Value::Record(r) = &mut value {
            r.remove("flags");
            r.remove("flags2");
        }

        Ok(value)
    }

    /// Decode an `rpc_result`'s payload, recovering its expected type from
    /// the outgoing-message table so vectors decode with the right subtype.
    fn read_rpc_result(
        &self,
        cur: &mut Cursor<'_>,
        record: &mut Record,
        pending: Option<&dyn OutgoingLookup>,
        hooks: &mut Vec<HookFuture>,
    ) -> Result<Value> {
        let call: Option<PendingCall> = record
            .get("req_msg_id")
            .and_then(Value::as_i64)
            .and_then(|id| pending.and_then(|table| table.find(id)));

        let result_ctx = match &call {
            Some(call) => {
                let mut ctx = Param::of_type(call.ty.clone());
                ctx.name = "result".to_owned();
                ctx
            }
            None => Param::of_type(""),
        };

        if let Some(call) = &call {
            let mut wrapper = Value::Record(std::mem::take(record));
            for hook in self.callbacks().method_before_hooks(&call.name) {
                if let Some(fut) = hook(call, &mut wrapper) {
                    hooks.push(fut);
                }
            }
            match wrapper {
                Value::Record(r) => *record = r,
                _ => {
                    return Err(Error::Hook(format!(
                        "METHOD_BEFORE hook for {} must keep the record shape",
                        call.name,
                    )))
                }
            }
        }

        let mut result = self.read_value(cur, &result_ctx, pending, hooks)?;

        if let Some(call) = &call {
            for hook in self.callbacks().method_hooks(&call.name) {
                if let Some(fut) = hook(call, &mut result) {
                    hooks.push(fut);
                }
            }
        }

        Ok(result)
    }

    /// Shape-level rewrites of well-known constructors.
    fn post_process(&self, mut record: Record) -> Result<Value> {
        match record.predicate() {
            "dataJSON" => {
                let data = match record.get("data") {
                    Some(Value::Str(s)) => s.as_str(),
                    _ => return Err(Error::Json("dataJSON without data".to_owned())),
                };
                let parsed: serde_json::Value =
                    serde_json::from_str(data).map_err(|e| Error::Json(e.to_string()))?;
                Ok(Value::Json(parsed))
            }
            "jsonNull" | "jsonBool" | "jsonNumber" | "jsonString" | "jsonArray" | "jsonObject" => {
                Ok(Value::Json(json_tree(&record)?))
            }
            "photoStrippedSize" => {
                if let Some(Value::Bytes(b)) = record.get("bytes") {
                    let inflated = inflate_stripped(b);
                    record.set("inflated", Value::Bytes(inflated));
                }
                Ok(Value::Record(record))
            }
            "message" => {
                wrap_reply_markup_buttons(&mut record);
                Ok(Value::Record(record))
            }
            _ => Ok(Value::Record(record)),
        }
    }
}

fn bytes_to_text(bytes: Vec<u8>) -> Value {
    match String::from_utf8(bytes) {
        Ok(s) => Value::Str(s),
        Err(e) => Value::Bytes(e.into_bytes()),
    }
}

/// Convert a decoded `JSONValue` constructor into an idiomatic JSON tree.
fn json_tree(record: &Record) -> Result<serde_json::Value> {
    use serde_json::Value as Json;
    match record.predicate() {
        "jsonNull" => Ok(Json::Null),
        "jsonBool" => match record.get("value") {
            Some(Value::Bool(b)) => Ok(Json::Bool(*b)),
            _ => Err(Error::Json("jsonBool without value".to_owned())),
        },
        "jsonNumber" => match record.get("value") {
            Some(Value::Double(v)) => serde_json::Number::from_f64(*v)
                .map(Json::Number)
                .ok_or_else(|| Error::Json("non-finite jsonNumber".to_owned())),
            _ => Err(Error::Json("jsonNumber without value".to_owned())),
        },
        "jsonString" => match record.get("value") {
            Some(Value::Str(s)) => Ok(Json::String(s.clone())),
            _ => Err(Error::Json("jsonString without value".to_owned())),
        },
        "jsonArray" => match record.get("value") {
            Some(Value::Vector(items)) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    match item {
                        Value::Json(j) => out.push(j.clone()),
                        Value::Record(r) => out.push(json_tree(r)?),
                        other => {
                            return Err(Error::Json(format!("unexpected jsonArray item {other:?}")))
                        }
                    }
                }
                Ok(Json::Array(out))
            }
            _ => Err(Error::Json("jsonArray without value".to_owned())),
        },
        "jsonObject" => match record.get("value") {
            Some(Value::Vector(items)) => {
                let mut map = serde_json::Map::with_capacity(items.len());
                for item in items {
                    let pair = item
                        .as_record()
                        .filter(|r| r.predicate() == "jsonObjectValue")
                        .ok_or_else(|| Error::Json("jsonObject item is not a pair".to_owned()))?;
                    let key = match pair.get("key") {
                        Some(Value::Str(s)) => s.clone(),
                        _ => return Err(Error::Json("jsonObjectValue without key".to_owned())),
                    };
                    let value = match pair.get("value") {
                        Some(Value::Json(j)) => j.clone(),
                        Some(Value::Record(r)) => json_tree(r)?,
                        _ => return Err(Error::Json("jsonObjectValue without value".to_owned())),
                    };
                    map.insert(key, value);
                }
                Ok(Json::Object(map))
            }
            _ => Err(Error::Json("jsonObject without value".to_owned())),
        },
        other => Err(Error::Json(format!("not a JSONValue constructor: {other}"))),
    }
}

/// Wrap every button in a `message`'s reply keyboard so consumers deal with
/// one shape regardless of the underlying constructor.
fn wrap_reply_markup_buttons(record: &mut Record) {
    let Some(markup) = record.get_mut("reply_markup").and_then(Value::as_record_mut) else {
        return;
    };
    let Some(Value::Vector(rows)) = markup.get_mut("rows") else { return };
    for row in rows {
        let Some(row) = row.as_record_mut() else { continue };
        let Some(Value::Vector(buttons)) = row.get_mut("buttons") else { continue };
        for slot in buttons.iter_mut() {
            let inner = std::mem::replace(slot, Value::Null);
            *slot = Value::Record(Record::new("button").field("button", inner));
        }
    }
}

/// Decompress a `gzip_packed` payload. Some servers emit raw zlib streams
/// under the same constructor, so that is attempted second.
fn gunzip(data: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    if flate2::read::GzDecoder::new(data).read_to_end(&mut out).is_ok() && !out.is_empty() {
        return Ok(out);
    }
    out.clear();
    flate2::read::ZlibDecoder::new(data)
        .read_to_end(&mut out)
        .map_err(|e| Error::Gzip(e.to_string()))?;
    Ok(out)
}

/// The fixed JPEG envelope shared by every stripped thumbnail; only the
/// dimensions at offsets 164/166 and the scan data vary per photo.
const STRIPPED_HEADER_HEX: &str = concat!(
    "ffd8ffe000104a46494600010100000100010000ffdb004300281c1e231e1928",
    "2321232d2b28303c64413c37373c7b585d4964918099968f808c8aa0b4e6c3a0",
    "aadaad8a8cc8ffcbdaeef5ffffff9bc1fffffffaffe6fdfff8ffdb0043012b2d",
    "2d3c353c76414176f8a58ca5f8f8f8f8f8f8f8f8f8f8f8f8f8f8f8f8f8f8f8f8",
    "f8f8f8f8f8f8f8f8f8f8f8f8f8f8f8f8f8f8f8f8f8f8f8f8f8f8f8f8f8f8ffc0",
    "0011080000000003012200021101031101ffc4001f0000010501010101010100",
    "000000000000000102030405060708090a0bffc400b510000201030302040305",
    "0504040000017d01020300041105122131410613516107227114328191a10823",
    "42b1c11552d1f02433627282090a161718191a25262728292a3435363738393a",
    "434445464748494a535455565758595a636465666768696a737475767778797a",
    "838485868788898a92939495969798999aa2a3a4a5a6a7a8a9aab2b3b4b5b6b7",
    "b8b9bac2c3c4c5c6c7c8c9cad2d3d4d5d6d7d8d9dae1e2e3e4e5e6e7e8e9eaf1",
    "f2f3f4f5f6f7f8f9faffc4001f01000301010101010101010100000000000001",
    "02030405060708090a0bffc400b5110002010204040304070504040001027700",
    "0102031104052131061241510761711322328108144291a1b1c109233352f015",
    "6272d10a162434e125f11718191a262728292a35363738393a43444546474849",
    "4a535455565758595a636465666768696a737475767778797a82838485868788",
    "898a92939495969798999aa2a3a4a5a6a7a8a9aab2b3b4b5b6b7b8b9bac2c3c4",
    "c5c6c7c8c9cad2d3d4d5d6d7d8d9dae2e3e4e5e6e7e8e9eaf2f3f4f5f6f7f8f9",
    "faffda000c03010002110311003f00",
);

const STRIPPED_FOOTER: [u8; 2] = [0xff, 0xd9];

fn stripped_header() -> &'static [u8] {
    static HEADER: OnceLock<Vec<u8>> = OnceLock::new();
    HEADER.get_or_init(|| {
        let hex = STRIPPED_HEADER_HEX.as_bytes();
        hex.chunks(2)
            .map(|pair| {
                let hi = (pair[0] as char).to_digit(16).unwrap_or(0) as u8;
                let lo = (pair[1] as char).to_digit(16).unwrap_or(0) as u8;
                (hi << 4) | lo
            })
            .collect()
    })
}

/// Reconstruct a renderable JPEG from `photoStrippedSize` payload bytes.
///
/// The payload is `[1, height, width, scan-data…]`; anything else passes
/// through untouched.
pub(crate) fn inflate_stripped(data: &[u8]) -> Vec<u8> {
    if data.len() < 3 || data[0] != 1 {
        return data.to_vec();
    }

    let mut jpeg = stripped_header().to_vec();
    jpeg[164] = data[1];
    jpeg[166] = data[2];
    jpeg.extend_from_slice(&data[3..]);
    jpeg.extend_from_slice(&STRIPPED_FOOTER);
    jpeg
}
