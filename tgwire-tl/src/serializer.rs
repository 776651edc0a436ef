//! Schema-directed serialization of dynamic values.
//!
//! Serialization is `async`: `CONSTRUCTOR_SERIALIZE` and `TYPE_MISMATCH`
//! hooks may await external work, and so may the collaborators that
//! synthesize missing `InputFile` / secret-chat `data` / `InputEncryptedChat`
//! arguments. Parameters are emitted strictly in declared order — hook side
//! effects are observable, so the order is part of the contract.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::callbacks::ValueFuture;
use crate::errors::{Error, Result};
use crate::schema::{compile_type, Param, SchemaEntry};
use crate::serialize::{write_blob, write_bytes, write_f64, write_i32, write_i64, write_long, write_u32};
use crate::value::{Record, Value};
use crate::{Tl, BOOL_FALSE_ID, BOOL_TRUE_ID, VECTOR_ID};

/// A request for a collaborator to synthesize a missing argument.
#[derive(Clone, Debug)]
pub struct SynthRequest {
    /// The method being serialized.
    pub method: String,
    /// The missing parameter's name.
    pub param: String,
    /// The arguments supplied so far.
    pub arguments: Record,
}

/// An opaque collaborator callback, set once at construction.
pub type SynthHook = Arc<dyn Fn(SynthRequest) -> ValueFuture + Send + Sync>;

/// The host-provided collaborators consulted during default synthesis.
#[derive(Clone, Default)]
pub struct Collaborators {
    /// Uploads a file and yields an `InputFile` value.
    pub upload: Option<SynthHook>,
    /// Encrypts a secret-chat payload and yields its `data` bytes.
    pub encrypt: Option<SynthHook>,
    /// Resolves an `InputEncryptedChat` from session state.
    pub encrypted_chat: Option<SynthHook>,
}

type WriteFuture<'a> = Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>;

impl Tl {
    /// Serialize `value` against the type context `ctx`.
    ///
    /// `layer` selects among layered constructor versions; pass −1 for "any".
    pub async fn serialize(&self, ctx: &Param, value: Value, layer: i32) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        self.write_value(&mut buf, ctx.clone(), value, layer).await?;
        Ok(buf)
    }

    /// Serialize a method call: the method's constructor id followed by its
    /// arguments.
    pub async fn serialize_method(&self, method: &str, args: Value, layer: i32) -> Result<Vec<u8>> {
        let entry = self
            .schema()
            .registry()
            .find_method(method, layer)
            .ok_or_else(|| Error::BadPredicate(method.to_owned()))?
            .clone();

        let record = match args {
            Value::Record(r) => r,
            Value::Null => Record::untagged(),
            _ => return Err(Error::BadPredicate(method.to_owned())),
        };

        let mut buf = Vec::new();
        buf.extend_from_slice(&entry.id);
        self.write_params(&mut buf, &entry, record, layer, true).await?;
        Ok(buf)
    }

    /// Recursive worker. Boxed because async recursion needs a nameable
    /// future type.
    pub(crate) fn write_value<'a>(
        &'a self,
        buf: &'a mut Vec<u8>,
        ctx: Param,
        value: Value,
        layer: i32,
    ) -> WriteFuture<'a> {
        Box::pin(async move {
            match ctx.ty.as_str() {
                "#" => {
                    let v = value.as_i64().ok_or(Error::NotNumeric)?;
                    write_u32(buf, v as u32);
                }
                "int" => {
                    let v = value.as_i64().ok_or(Error::NotNumeric)?;
                    write_i32(buf, v as i32);
                }
                "long" => write_long(buf, &value)?,
                "double" => match value {
                    Value::Double(v) => write_f64(buf, v),
                    Value::Int(v) => write_f64(buf, f64::from(v)),
                    Value::Long(v) => write_f64(buf, v as f64),
                    _ => return Err(Error::NotNumeric),
                },
                "int128" => write_blob(buf, &value, 128)?,
                "int256" => write_blob(buf, &value, 256)?,
                "int512" => write_blob(buf, &value, 512)?,
                "string" | "bytes" => match &value {
                    Value::Str(s) => write_bytes(buf, s.as_bytes()),
                    Value::Bytes(b) => write_bytes(buf, b),
                    _ => return Err(Error::NotString),
                },
                "Bool" => {
                    let b = match value {
                        Value::Bool(b) => b,
                        other => other.truthy(),
                    };
                    write_u32(buf, if b { BOOL_TRUE_ID } else { BOOL_FALSE_ID });
                }
                // The value of a `true` parameter lives in its flag bit
                "true" => {}
                // Pre-serialized queries (`!X` generics) pass through
                ty if ty.starts_with('!') => match value {
                    Value::Raw(b) | Value::Bytes(b) => buf.extend_from_slice(&b),
                    _ => return Err(Error::NotString),
                },
                "Vector t" => {
                    write_u32(buf, VECTOR_ID);
                    self.write_bare_vector(buf, &ctx, value, layer).await?;
                }
                "vector" => self.write_bare_vector(buf, &ctx, value, layer).await?,
                "Object" => match value {
                    Value::Raw(b) | Value::Bytes(b) => buf.extend_from_slice(&b),
                    other => self.write_composite(buf, &ctx, other, layer).await?,
                },
                _ => self.write_composite(buf, &ctx, value, layer).await?,
            }
            Ok(())
        })
    }

    async fn write_bare_vector(
        &self,
        buf: &mut Vec<u8>,
        ctx: &Param,
        value: Value,
        layer: i32,
    ) -> Result<()> {
        let items = match value {
            Value::Vector(items) => items,
            _ => return Err(Error::ArrayRequired(ctx.name.clone())),
        };

        write_u32(buf, items.len() as u32);

        // Element context keeps the parameter name so name-directed rules
        // (raw longs, random ids) apply to the elements too
        let (ty, subtype) = compile_type(ctx.subtype.as_deref().unwrap_or(""));
        let elem_ctx =
            Param { name: ctx.name.clone(), ty, flag: None, subtype, optional: false };

        for item in items {
            self.write_value(buf, elem_ctx.clone(), item, layer).await?;
        }
        Ok(())
    }

    async fn write_composite(
        &self,
        buf: &mut Vec<u8>,
        ctx: &Param,
        mut value: Value,
        layer: i32,
    ) -> Result<()> {
        let (bare_requested, target) = match ctx.ty.strip_prefix('%') {
            Some(t) => (true, t.to_owned()),
            None => (false, ctx.ty.clone()),
        };

        // Plain JSON arguments are carried inside a `dataJSON` wrapper
        if target == "DataJSON" && !has_predicate(&value, "dataJSON") {
            let json = value_to_json(value)?;
            let encoded =
                serde_json::to_string(&json).map_err(|e| Error::Json(e.to_string()))?;
            value = Record::new("dataJSON").field("data", encoded).into();
        }

        // A value that does not carry a predicate of the target type may be
        // coerced by the TYPE_MISMATCH hook registered for that type
        if !matches_target(self, &value, &target, layer) {
            if let Some(hook) = self.callbacks().type_mismatch_hook(&target) {
                value = hook(value).await?;
            }
        }

        let mut record = match value {
            Value::Record(r) => r,
            _ => return Err(Error::BadPredicate(target)),
        };

        // Untagged records adopt the target type's representative constructor
        if record.predicate().is_empty() {
            match self.schema().registry().find_by_type(&target) {
                Some(rep) => {
                    let name = rep.name.clone();
                    record.set_predicate(name);
                }
                None => return Err(Error::BadPredicate(target)),
            }
        }

        // Client-side mention entities serialize as their input form
        if record.predicate() == "messageEntityMentionName" {
            record.set_predicate("inputMessageEntityMentionName");
        }

        let predicate = record.predicate().to_owned();
        let entry = self
            .schema()
            .registry()
            .find_by_predicate(&predicate, layer)
            .ok_or_else(|| Error::BadPredicate(predicate.clone()))?
            .clone();

        if let Some(hook) = self.callbacks().constructor_serialize_hook(&predicate) {
            record = match hook(Value::Record(record)).await? {
                Value::Record(r) => r,
                _ => return Err(Error::Hook(format!("serialize hook for {predicate} must return a record"))),
            };
        }

        let bare = bare_requested || predicate == target;
        if !bare {
            buf.extend_from_slice(&entry.id);
        }

        self.write_params(buf, &entry, record, layer, false).await
    }

    /// Emit an entry's parameters in declared order.
    ///
    /// Pass one computes every `#` bitfield from the supplied optionals (a
    /// later parameter may set bits an earlier `flags` field must carry, so
    /// this cannot fold into the emission pass). Pass two writes fields and
    /// synthesizes conventional defaults for anything missing.
    pub(crate) async fn write_params(
        &self,
        buf: &mut Vec<u8>,
        entry: &SchemaEntry,
        mut args: Record,
        layer: i32,
        is_method: bool,
    ) -> Result<()> {
        let mut flag_fields: HashMap<String, u32> = entry
            .params
            .iter()
            .filter(|p| p.ty == "#")
            .map(|p| (p.name.clone(), 0))
            .collect();

        for p in &entry.params {
            let Some(flag) = &p.flag else { continue };
            let present = match args.get(&p.name) {
                None | Some(Value::Null) => false,
                Some(Value::Bool(false)) if p.ty == "Bool" => {
                    // An explicit false Bool is carried by the clear bit alone
                    args.remove(&p.name);
                    false
                }
                Some(v) if p.ty == "true" => v.truthy(),
                Some(_) => true,
            };
            if present {
                *flag_fields.entry(flag.field.clone()).or_insert(0) |= flag.pow;
            }
        }

        for p in &entry.params {
            if p.ty == "#" {
                write_u32(buf, flag_fields.get(&p.name).copied().unwrap_or(0));
                continue;
            }

            if let Some(flag) = &p.flag {
                let set = flag_fields.get(&flag.field).is_some_and(|v| v & flag.pow != 0);
                if !set {
                    continue;
                }
                if p.ty == "true" {
                    continue;
                }
            }

            match args.get(&p.name).cloned() {
                Some(v) => self.write_value(buf, p.clone(), v, layer).await?,
                None => self.write_default(buf, entry, p, &args, layer, is_method).await?,
            }
        }

        Ok(())
    }

    async fn write_default(
        &self,
        buf: &mut Vec<u8>,
        entry: &SchemaEntry,
        p: &Param,
        args: &Record,
        layer: i32,
        is_method: bool,
    ) -> Result<()> {
        if p.optional {
            return Ok(());
        }

        match (p.name.as_str(), p.ty.as_str()) {
            ("random_bytes", _) => {
                let mut step = [0u8; 1];
                getrandom::getrandom(&mut step).expect("getrandom");
                let mut random = vec![0u8; 15 + 4 * usize::from(step[0] % 3)];
                getrandom::getrandom(&mut random).expect("getrandom");
                write_bytes(buf, &random);
                return Ok(());
            }
            ("random_id", "long") => {
                let mut id = [0u8; 8];
                getrandom::getrandom(&mut id).expect("getrandom");
                buf.extend_from_slice(&id);
                return Ok(());
            }
            ("random_id", "int") => {
                let mut id = [0u8; 4];
                getrandom::getrandom(&mut id).expect("getrandom");
                buf.extend_from_slice(&id);
                return Ok(());
            }
            ("random_id", "Vector t") => {
                // One random long per message in the sibling `id` vector
                let count = match args.get("id") {
                    Some(Value::Vector(ids)) => ids.len(),
                    _ => return Err(Error::ArrayRequired("id".to_owned())),
                };
                write_u32(buf, VECTOR_ID);
                write_u32(buf, count as u32);
                let mut id = [0u8; 8];
                for _ in 0..count {
                    getrandom::getrandom(&mut id).expect("getrandom");
                    buf.extend_from_slice(&id);
                }
                return Ok(());
            }
            ("hash", "long") => {
                write_i64(buf, 0);
                return Ok(());
            }
            ("hash", "int" | "#") | ("flags", "int") => {
                write_i32(buf, 0);
                return Ok(());
            }
            _ => {}
        }

        if is_method {
            let collaborator = match (p.name.as_str(), p.ty.as_str()) {
                (_, "InputFile") => self.collaborators().upload.clone(),
                (_, "InputEncryptedChat") => self.collaborators().encrypted_chat.clone(),
                ("data", _) if entry.name.starts_with("messages.sendEncrypted") => {
                    self.collaborators().encrypt.clone()
                }
                _ => None,
            };
            if let Some(synth) = collaborator {
                let request = SynthRequest {
                    method: entry.name.clone(),
                    param: p.name.clone(),
                    arguments: args.clone(),
                };
                let v = synth(request).await?;
                return self.write_value(buf, p.clone(), v, layer).await;
            }
        }

        match p.ty.as_str() {
            // Empty string and zero int share the same 4-zero-byte encoding
            "string" | "bytes" => write_bytes(buf, &[]),
            "int" | "#" => write_i32(buf, 0),
            "true" => {}
            "Vector t" => {
                write_u32(buf, VECTOR_ID);
                write_u32(buf, 0);
            }
            "vector" => write_u32(buf, 0),
            "DataJSON" | "%DataJSON" => {
                return self.write_value(buf, p.clone(), Value::Null, layer).await;
            }
            ty => {
                // An `xEmpty` constructor is an acceptable stand-in
                let mut lc = ty.to_owned();
                if let Some(first) = lc.get_mut(..1) {
                    first.make_ascii_lowercase();
                }
                for candidate in [format!("{lc}Empty"), format!("input{ty}Empty")] {
                    if let Some(e) = self.schema().registry().find_by_predicate(&candidate, layer)
                    {
                        buf.extend_from_slice(&e.id);
                        return Ok(());
                    }
                }
                return Err(Error::MissingParam(p.name.clone()));
            }
        }

        Ok(())
    }
}

fn has_predicate(value: &Value, predicate: &str) -> bool {
    value.as_record().is_some_and(|r| r.predicate() == predicate)
}

/// Whether `value` already carries a predicate belonging to `target`.
fn matches_target(tl: &Tl, value: &Value, target: &str, layer: i32) -> bool {
    let Some(record) = value.as_record() else { return false };
    let predicate = record.predicate();
    if predicate.is_empty() {
        return false;
    }
    if predicate == target {
        return true;
    }
    tl.schema()
        .registry()
        .find_by_predicate(predicate, layer)
        .is_some_and(|e| e.ty == target)
}

/// Convert a dynamic value into a JSON tree for `dataJSON` wrapping.
fn value_to_json(value: Value) -> Result<serde_json::Value> {
    use serde_json::Value as Json;
    Ok(match value {
        Value::Json(j) => j,
        Value::Null => Json::Null,
        Value::Bool(b) => Json::Bool(b),
        Value::Int(v) => Json::from(v),
        Value::Long(v) => Json::from(v),
        Value::Double(v) => serde_json::Number::from_f64(v)
            .map(Json::Number)
            .ok_or_else(|| Error::Json("non-finite double".to_owned()))?,
        Value::Str(s) => Json::String(s),
        Value::Vector(items) => {
            Json::Array(items.into_iter().map(value_to_json).collect::<Result<_>>()?)
        }
        other => return Err(Error::Json(format!("cannot JSON-encode {other:?}"))),
    })
}
