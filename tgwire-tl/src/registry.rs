//! Constructor and method lookup tables built by the schema loader.

use std::collections::{BTreeSet, HashMap};

use crate::schema::SchemaEntry;

/// Indexes over one family of schema entries (api+mtproto+secret share one
/// `Registry`; td gets its own).
///
/// Constructors and methods are indexed separately: both carry 32-bit ids,
/// and discovery-mode decoding probes constructors first, then methods.
pub struct Registry {
    constructors: Vec<SchemaEntry>,
    methods: Vec<SchemaEntry>,

    ctor_by_id: HashMap<u32, usize>,
    ctor_by_name: HashMap<String, Vec<usize>>,
    ctor_by_type: HashMap<String, usize>,

    method_by_id: HashMap<u32, usize>,
    method_by_name: HashMap<String, Vec<usize>>,

    namespaces: BTreeSet<String>,
    namespace_by_method: HashMap<String, String>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    /// An empty registry.
    pub fn new() -> Self {
        Self {
            constructors: Vec::new(),
            methods: Vec::new(),
            ctor_by_id: HashMap::new(),
            ctor_by_name: HashMap::new(),
            ctor_by_type: HashMap::new(),
            method_by_id: HashMap::new(),
            method_by_name: HashMap::new(),
            namespaces: BTreeSet::new(),
            namespace_by_method: HashMap::new(),
        }
    }

    /// Register a constructor.
    pub fn add_constructor(&mut self, entry: SchemaEntry) {
        let idx = self.constructors.len();
        let id = entry.id_u32();

        if let Some(&prev) = self.ctor_by_id.get(&id) {
            if self.constructors[prev].name != entry.name {
                // Ids must be unique per registry; a clash across different
                // names is a broken schema, but the wire still resolves to
                // whichever entry wins, so keep loading.
                log::warn!(
                    "constructor id {id:#010x} reused by {} (was {})",
                    entry.name,
                    self.constructors[prev].name,
                );
            }
        }
        self.ctor_by_id.insert(id, idx);
        self.ctor_by_name.entry(entry.name.clone()).or_default().push(idx);
        self.ctor_by_type.entry(entry.ty.clone()).or_insert(idx);
        self.constructors.push(entry);
    }

    /// Register a method.
    pub fn add_method(&mut self, entry: SchemaEntry) {
        let idx = self.methods.len();
        let id = entry.id_u32();

        if let Some(&prev) = self.method_by_id.get(&id) {
            if self.methods[prev].name != entry.name {
                log::warn!(
                    "method id {id:#010x} reused by {} (was {})",
                    entry.name,
                    self.methods[prev].name,
                );
            }
        }
        self.method_by_id.insert(id, idx);
        self.method_by_name.entry(entry.name.clone()).or_default().push(idx);

        if let Some((ns, _)) = entry.name.split_once('.') {
            self.namespaces.insert(ns.to_owned());
            self.namespace_by_method.insert(entry.name.clone(), ns.to_owned());
        }

        self.methods.push(entry);
    }

    /// Constructor lookup by wire id.
    pub fn find_by_id(&self, id: u32) -> Option<&SchemaEntry> {
        self.ctor_by_id.get(&id).map(|&i| &self.constructors[i])
    }

    /// Method lookup by wire id.
    pub fn find_method_by_id(&self, id: u32) -> Option<&SchemaEntry> {
        self.method_by_id.get(&id).map(|&i| &self.methods[i])
    }

    /// Constructor lookup by predicate name, honoring layers.
    ///
    /// With `layer == -1` any version matches (an unlayered entry preferred,
    /// else the newest). Otherwise the entry with the highest layer `≤ layer`
    /// wins; when every version is newer than requested, the oldest is
    /// returned rather than failing.
    pub fn find_by_predicate(&self, name: &str, layer: i32) -> Option<&SchemaEntry> {
        pick_layer(&self.constructors, self.ctor_by_name.get(name)?, layer)
    }

    /// Method lookup by name, with the same layer tie-breaking as
    /// [`Registry::find_by_predicate`].
    pub fn find_method(&self, name: &str, layer: i32) -> Option<&SchemaEntry> {
        pick_layer(&self.methods, self.method_by_name.get(name)?, layer)
    }

    /// Any constructor whose result type equals `ty` — the representative
    /// used for `%T` bare encoding and untagged-value auto-tagging.
    pub fn find_by_type(&self, ty: &str) -> Option<&SchemaEntry> {
        self.ctor_by_type.get(ty).map(|&i| &self.constructors[i])
    }

    /// All method namespaces seen (`messages`, `users`, …), sorted.
    pub fn method_namespaces(&self) -> impl Iterator<Item = &str> {
        self.namespaces.iter().map(String::as_str)
    }

    /// The namespace a dotted method name belongs to.
    pub fn namespace_of(&self, method: &str) -> Option<&str> {
        self.namespace_by_method.get(method).map(String::as_str)
    }

    /// Every registered constructor, in load order.
    pub fn constructors(&self) -> &[SchemaEntry] {
        &self.constructors
    }

    /// Every registered method, in load order.
    pub fn methods(&self) -> &[SchemaEntry] {
        &self.methods
    }
}

fn pick_layer<'a>(entries: &'a [SchemaEntry], candidates: &[usize], layer: i32) -> Option<&'a SchemaEntry> {
    if candidates.is_empty() {
        return None;
    }
    if candidates.len() == 1 {
        return Some(&entries[candidates[0]]);
    }

    if layer == -1 {
        // Prefer an unlayered entry, else the newest
        if let Some(&i) = candidates.iter().find(|&&i| entries[i].layer == -1) {
            return Some(&entries[i]);
        }
        return candidates.iter().map(|&i| &entries[i]).max_by_key(|e| e.layer);
    }

    // Highest layer not exceeding the request; unlayered entries match any
    let best = candidates
        .iter()
        .map(|&i| &entries[i])
        .filter(|e| e.layer <= layer)
        .max_by_key(|e| e.layer);
    match best {
        Some(e) => Some(e),
        // Every version is newer than requested — fall back to the oldest
        None => candidates.iter().map(|&i| &entries[i]).min_by_key(|e| e.layer),
    }
}
