//! Schema loading: textual `.tl` and pre-parsed JSON schemas compiled into
//! the constructor/method registries.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use tgwire_tl_parser::errors::ParseError;
use tgwire_tl_parser::parse_tl_file;
use tgwire_tl_parser::tl::{Definition, Parameter, ParameterType};

use crate::errors::{Error, Result};
use crate::registry::Registry;

/// Where a schema entry came from.
///
/// `api`, `mtproto` and `secret` (and any labeled extras) share one registry;
/// `td` entries live in a separate, parallel registry.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Origin {
    /// The main Telegram API schema.
    Api,
    /// The MTProto service schema (acks, pings, containers, …).
    Mtproto,
    /// The secret-chat schema (layered end-to-end constructors).
    Secret,
    /// The TDLib-flavoured schema.
    Td,
    /// Any additional labeled schema.
    Other(String),
}

impl Origin {
    /// Whether signature normalization keeps `bytes` parameter types verbatim
    /// when computing constructor IDs for this origin.
    ///
    /// Telegram's own schemas compute ids over `string`-normalized
    /// signatures; only the TDLib flavour keeps `bytes` as written.
    fn keep_bytes(&self) -> bool {
        matches!(self, Self::Td)
    }
}

/// A flag gate on an optional parameter: the bit `pow` inside the sibling
/// bitfield parameter named `field`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct FlagBit {
    /// Name of the `#`-typed sibling (`flags`, `flags2`).
    pub field: String,
    /// The bit mask, `1 << N`.
    pub pow: u32,
}

/// A compiled parameter descriptor.
///
/// Doubles as the *type context* handed to the serializer and deserializer:
/// an ad-hoc context can be built with [`Param::of_type`].
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Param {
    /// Field name; empty for ad-hoc type contexts.
    pub name: String,
    /// Textual wire type (`"int"`, `"Vector t"`, `"%Message"`, `"!X"`, …).
    pub ty: String,
    /// Present when the parameter is gated by a flag bit.
    pub flag: Option<FlagBit>,
    /// Element type for vector parameters.
    pub subtype: Option<String>,
    /// TDLib-style optionality (derived from "may be null" descriptions).
    pub optional: bool,
}

impl Param {
    /// An ad-hoc type context, e.g. `Param::of_type("Vector<int>")`.
    pub fn of_type(ty: impl Into<String>) -> Self {
        let (ty, subtype) = compile_type(&ty.into());
        Self { name: String::new(), ty, flag: None, subtype, optional: false }
    }

    /// A named parameter compiled from its textual schema type, resolving
    /// `field.N?Inner` flag gates and vector subtypes.
    pub fn from_text(name: impl Into<String>, raw_ty: &str) -> Self {
        let name = name.into();

        // `field.N?Inner` — flag-gated
        if let Some((gate, inner)) = raw_ty.split_once('?') {
            if let Some((field, bit)) = gate.split_once('.') {
                if let Ok(bit) = bit.parse::<u32>() {
                    let (ty, subtype) = compile_type(inner);
                    return Self {
                        name,
                        ty,
                        flag: Some(FlagBit { field: field.to_owned(), pow: 1 << bit }),
                        subtype,
                        optional: false,
                    };
                }
            }
        }

        let (ty, subtype) = compile_type(raw_ty);
        Self { name, ty, flag: None, subtype, optional: false }
    }
}

/// Normalize a textual type into the `(type, subtype)` pair the codec
/// dispatches on: `Vector<long>` → `("Vector t", "long")`, `vector<%Message>`
/// → `("vector", "%Message")`, everything else passes through.
pub fn compile_type(raw: &str) -> (String, Option<String>) {
    if let Some(inner) = raw.strip_prefix("Vector<").and_then(|r| r.strip_suffix('>')) {
        return ("Vector t".to_owned(), Some(inner.to_owned()));
    }
    if let Some(inner) = raw.strip_prefix("vector<").and_then(|r| r.strip_suffix('>')) {
        return ("vector".to_owned(), Some(inner.to_owned()));
    }
    // Already-compiled spellings keep their shape
    if raw == "Vector t" || raw == "vector" {
        return (raw.to_owned(), None);
    }
    (raw.to_owned(), None)
}

/// A single schema entry — a constructor or a method.
#[derive(Clone, Debug, PartialEq)]
pub struct SchemaEntry {
    /// Full dotted name (`"inputPeerUser"`, `"messages.sendMessage"`).
    pub name: String,
    /// 32-bit identifier stored as 4 little-endian bytes, exactly as it
    /// appears on the wire.
    pub id: [u8; 4],
    /// Result/boxed type name.
    pub ty: String,
    /// Subtype when [`SchemaEntry::ty`] is a vector form.
    pub subtype: Option<String>,
    /// Schema layer; −1 means "any".
    pub layer: i32,
    /// Ordered parameter descriptors.
    pub params: Vec<Param>,
    /// Which schema file this entry came from.
    pub origin: Origin,
}

impl SchemaEntry {
    /// The identifier as a host integer.
    pub fn id_u32(&self) -> u32 {
        u32::from_le_bytes(self.id)
    }

    /// Find a parameter by name.
    pub fn param(&self, name: &str) -> Option<&Param> {
        self.params.iter().find(|p| p.name == name)
    }
}

// ─── Bundle ──────────────────────────────────────────────────────────────────

/// Callback applied once after every schema file has loaded, for
/// schema-version migrations.
pub type UpgradeFn = Box<dyn FnOnce(&mut Schema) + Send>;

/// Describes where the schema files live and how to migrate them.
#[derive(Default)]
pub struct SchemaBundle {
    api: Option<PathBuf>,
    mtproto: Option<PathBuf>,
    secret: Option<PathBuf>,
    td: Option<PathBuf>,
    other: Vec<(String, PathBuf)>,
    upgrade: Option<UpgradeFn>,
}

impl SchemaBundle {
    /// An empty bundle.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the main API schema path.
    pub fn api(mut self, path: impl Into<PathBuf>) -> Self {
        self.api = Some(path.into());
        self
    }

    /// Set the MTProto service schema path.
    pub fn mtproto(mut self, path: impl Into<PathBuf>) -> Self {
        self.mtproto = Some(path.into());
        self
    }

    /// Set the secret-chat schema path.
    pub fn secret(mut self, path: impl Into<PathBuf>) -> Self {
        self.secret = Some(path.into());
        self
    }

    /// Set the TDLib schema path.
    pub fn td(mut self, path: impl Into<PathBuf>) -> Self {
        self.td = Some(path.into());
        self
    }

    /// Add an extra labeled schema.
    pub fn other(mut self, label: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        self.other.push((label.into(), path.into()));
        self
    }

    /// Register the one-shot post-load migration hook.
    pub fn on_upgrade(mut self, f: impl FnOnce(&mut Schema) + Send + 'static) -> Self {
        self.upgrade = Some(Box::new(f));
        self
    }

    /// Path of the main API schema, if set.
    pub fn api_schema_path(&self) -> Option<&Path> {
        self.api.as_deref()
    }

    /// Path of the MTProto schema, if set.
    pub fn mtproto_schema_path(&self) -> Option<&Path> {
        self.mtproto.as_deref()
    }

    /// Path of the secret-chat schema, if set.
    pub fn secret_schema_path(&self) -> Option<&Path> {
        self.secret.as_deref()
    }

    /// Path of the TDLib schema, if set.
    pub fn td_schema_path(&self) -> Option<&Path> {
        self.td.as_deref()
    }

    /// The extra labeled schemas.
    pub fn others(&self) -> &[(String, PathBuf)] {
        &self.other
    }
}

// ─── Schema ──────────────────────────────────────────────────────────────────

/// Wire types handled by the primitive codec; re-declarations of these in
/// schema files (including the `vector#1cb5c415` forward declaration) are
/// skipped.
const PRIMITIVE_TYPES: &[&str] = &[
    "int", "#", "long", "double", "string", "bytes", "int128", "int256", "int512", "vector",
];

/// The loaded schema: one registry for api/mtproto/secret/extras, a parallel
/// one for td, and the highest secret-chat layer seen.
pub struct Schema {
    registry: Registry,
    td: Registry,
    secret_layer: i32,
}

impl Default for Schema {
    fn default() -> Self {
        Self::new()
    }
}

impl Schema {
    /// An empty schema; populate with [`Schema::add_tl`] / [`Schema::add_json`].
    pub fn new() -> Self {
        Self { registry: Registry::new(), td: Registry::new(), secret_layer: -1 }
    }

    /// Load every file a [`SchemaBundle`] names, then run its upgrade hook.
    pub fn load(mut bundle: SchemaBundle) -> Result<Self> {
        let mut schema = Self::new();

        let mut files: Vec<(Origin, PathBuf)> = Vec::new();
        if let Some(p) = bundle.api.take() {
            files.push((Origin::Api, p));
        }
        if let Some(p) = bundle.mtproto.take() {
            files.push((Origin::Mtproto, p));
        }
        if let Some(p) = bundle.secret.take() {
            files.push((Origin::Secret, p));
        }
        if let Some(p) = bundle.td.take() {
            files.push((Origin::Td, p));
        }
        for (label, p) in bundle.other.drain(..) {
            files.push((Origin::Other(label), p));
        }

        for (origin, path) in files {
            let src = fs::read_to_string(&path)
                .map_err(|e| Error::SchemaInvalid(format!("{}: {e}", path.display())))?;
            if is_json(&path, &src) {
                schema.add_json(&src, origin)?;
            } else {
                schema.add_tl(&src, origin)?;
            }
        }

        if let Some(upgrade) = bundle.upgrade.take() {
            upgrade(&mut schema);
        }

        Ok(schema)
    }

    /// The shared api/mtproto/secret registry.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// The parallel TDLib registry.
    pub fn td_registry(&self) -> &Registry {
        &self.td
    }

    /// Highest layer among secret-chat entries; −1 when none were loaded.
    pub fn secret_layer(&self) -> i32 {
        self.secret_layer
    }

    /// Compile a textual `.tl` schema into the registries.
    ///
    /// Primitive re-declarations and old-style `? = Type` lines are skipped;
    /// any other malformed declaration aborts the load.
    pub fn add_tl(&mut self, src: &str, origin: Origin) -> Result<()> {
        for parsed in parse_tl_file(src) {
            let def = match parsed {
                Ok(def) => def,
                // `? = Int` style redeclarations of builtins
                Err(ParseError::NotImplemented) => continue,
                Err(e) => return Err(Error::SchemaInvalid(e.to_string())),
            };

            let name = def.full_name();
            if def.namespace.is_empty() && PRIMITIVE_TYPES.contains(&def.name.as_str()) {
                continue;
            }

            let computed = if origin.keep_bytes() {
                def.computed_id_keep_bytes
            } else {
                def.computed_id
            };
            if computed != def.id {
                // Diagnostic only: the declared id is what travels the wire
                log::warn!(
                    "constructor id mismatch for {name}: declared {:#010x}, computed {computed:#010x}",
                    def.id,
                );
            }

            let entry = compile_definition(&def, name, origin.clone());
            self.insert(entry, def.category.is_function());
        }
        Ok(())
    }

    /// Load a pre-parsed JSON schema (`{constructors: [...], methods: [...]}`).
    ///
    /// Numeric ids are packed as signed little-endian `int32`, so negative
    /// ids from JSON dumps round-trip bit-for-bit.
    pub fn add_json(&mut self, src: &str, origin: Origin) -> Result<()> {
        let parsed: JsonSchema =
            serde_json::from_str(src).map_err(|e| Error::Json(e.to_string()))?;

        for c in parsed.constructors {
            let (ty, subtype) = compile_type(&c.ty);
            let entry = SchemaEntry {
                name: c.predicate,
                id: (c.id as i32).to_le_bytes(),
                ty,
                subtype,
                layer: c.layer.unwrap_or(-1),
                params: c.params.iter().map(|p| Param::from_text(&p.name, &p.ty)).collect(),
                origin: origin.clone(),
            };
            self.insert(entry, false);
        }

        for m in parsed.methods {
            let (ty, subtype) = compile_type(&m.ty);
            let entry = SchemaEntry {
                name: m.method,
                id: (m.id as i32).to_le_bytes(),
                ty,
                subtype,
                layer: m.layer.unwrap_or(-1),
                params: m.params.iter().map(|p| Param::from_text(&p.name, &p.ty)).collect(),
                origin: origin.clone(),
            };
            self.insert(entry, true);
        }

        Ok(())
    }

    fn insert(&mut self, entry: SchemaEntry, is_method: bool) {
        if entry.origin == Origin::Secret && entry.layer > self.secret_layer {
            self.secret_layer = entry.layer;
        }

        let registry = if entry.origin == Origin::Td { &mut self.td } else { &mut self.registry };
        if is_method {
            registry.add_method(entry);
        } else {
            registry.add_constructor(entry);
        }
    }
}

fn is_json(path: &Path, src: &str) -> bool {
    path.extension().map_or(false, |e| e == "json") || src.trim_start().starts_with('{')
}

/// Compile one parsed parameter into its runtime descriptor.
fn param_from_ast(p: &Parameter) -> Param {
    match &p.ty {
        ParameterType::Flags => Param {
            name: p.name.clone(),
            ty: "#".to_owned(),
            flag: None,
            subtype: None,
            optional: false,
        },
        ParameterType::Normal { ty, flag } => {
            let (ty, subtype) = compile_type(&ty.to_string());
            Param {
                name: p.name.clone(),
                ty,
                flag: flag.as_ref().map(|f| FlagBit { field: f.name.clone(), pow: f.pow() }),
                subtype,
                optional: false,
            }
        }
    }
}

fn compile_definition(def: &Definition, name: String, origin: Origin) -> SchemaEntry {
    let (ty, subtype) = compile_type(&def.ty.to_string());
    let params = def
        .params
        .iter()
        .map(|p| {
            let mut param = param_from_ast(p);
            // The TDLib schema marks optionality in prose
            if origin == Origin::Td {
                if let Some(desc) = &p.description {
                    if desc.contains("may be null") {
                        param.optional = true;
                    }
                }
            }
            param
        })
        .collect();

    SchemaEntry {
        name,
        id: def.id.to_le_bytes(),
        ty,
        subtype,
        layer: def.layer.unwrap_or(-1),
        params,
        origin,
    }
}

#[derive(Deserialize)]
struct JsonSchema {
    #[serde(default)]
    constructors: Vec<JsonConstructor>,
    #[serde(default)]
    methods: Vec<JsonMethod>,
}

#[derive(Deserialize)]
struct JsonConstructor {
    predicate: String,
    id: i64,
    #[serde(rename = "type")]
    ty: String,
    #[serde(default)]
    params: Vec<JsonParam>,
    #[serde(default)]
    layer: Option<i32>,
}

#[derive(Deserialize)]
struct JsonMethod {
    method: String,
    id: i64,
    #[serde(rename = "type")]
    ty: String,
    #[serde(default)]
    params: Vec<JsonParam>,
    #[serde(default)]
    layer: Option<i32>,
}

#[derive(Deserialize)]
struct JsonParam {
    name: String,
    #[serde(rename = "type")]
    ty: String,
}
