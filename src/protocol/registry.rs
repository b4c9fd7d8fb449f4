//! Dissector registry: named dispatch tables, decoder handles and
//! heuristic lists.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use compact_str::CompactString;
use tracing::{debug, trace};

use super::Decoder;

/// Key kind a dispatch table accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyKind {
    UInt,
    Str,
}

/// Key inside a dispatch table.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TableKey {
    UInt(u32),
    Str(CompactString),
}

impl TableKey {
    pub fn kind(&self) -> KeyKind {
        match self {
            TableKey::UInt(_) => KeyKind::UInt,
            TableKey::Str(_) => KeyKind::Str,
        }
    }
}

impl fmt::Display for TableKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TableKey::UInt(v) => write!(f, "{v}"),
            TableKey::Str(s) => write!(f, "{s}"),
        }
    }
}

impl From<u8> for TableKey {
    fn from(v: u8) -> Self {
        TableKey::UInt(v as u32)
    }
}

impl From<u16> for TableKey {
    fn from(v: u16) -> Self {
        TableKey::UInt(v as u32)
    }
}

impl From<u32> for TableKey {
    fn from(v: u32) -> Self {
        TableKey::UInt(v)
    }
}

impl From<&str> for TableKey {
    fn from(v: &str) -> Self {
        TableKey::Str(CompactString::new(v))
    }
}

/// One dispatch table, e.g. `udp.port`.
struct DissectorTable {
    kind: KeyKind,
    entries: HashMap<TableKey, Arc<dyn Decoder>>,
}

/// Listing entry returned by [`Registry::tables`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableListing {
    pub name: &'static str,
    pub kind: KeyKind,
    /// `(key, decoder name)`, sorted by key.
    pub entries: Vec<(TableKey, &'static str)>,
}

/// Registry of decoders.
///
/// Lookups hand out `Arc` clones, so a decoder that is running may register
/// or replace entries (including its own) without invalidating anything the
/// caller holds.
#[derive(Default)]
pub struct Registry {
    tables: HashMap<&'static str, DissectorTable>,
    handles: HashMap<&'static str, Arc<dyn Decoder>>,
    heuristics: HashMap<&'static str, Vec<Arc<dyn Decoder>>>,
}

impl Registry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a dispatch table. Declaring an existing table is a no-op.
    pub fn add_table(&mut self, name: &'static str, kind: KeyKind) {
        self.tables.entry(name).or_insert_with(|| DissectorTable {
            kind,
            entries: HashMap::new(),
        });
    }

    /// Register `decoder` under `key` in `table`, returning the decoder it
    /// replaced. An undeclared table is created with the key's kind; a key
    /// of the wrong kind is ignored.
    pub fn register(
        &mut self,
        table: &'static str,
        key: impl Into<TableKey>,
        decoder: Arc<dyn Decoder>,
    ) -> Option<Arc<dyn Decoder>> {
        let key = key.into();
        let entry = self.tables.entry(table).or_insert_with(|| DissectorTable {
            kind: key.kind(),
            entries: HashMap::new(),
        });
        if entry.kind != key.kind() {
            debug!(table, %key, "Rejected registration: key kind mismatch");
            return None;
        }
        debug!(table, %key, decoder = decoder.name(), "Registered decoder");
        entry.entries.insert(key, decoder)
    }

    /// Remove the decoder registered under `key`.
    pub fn deregister(&mut self, table: &str, key: impl Into<TableKey>) -> Option<Arc<dyn Decoder>> {
        let key = key.into();
        let removed = self.tables.get_mut(table)?.entries.remove(&key);
        if let Some(decoder) = &removed {
            debug!(table, %key, decoder = decoder.name(), "Deregistered decoder");
        }
        removed
    }

    /// Find the decoder for `key` in `table`.
    pub fn lookup(&self, table: &str, key: impl Into<TableKey>) -> Option<Arc<dyn Decoder>> {
        let key = key.into();
        let found = self
            .tables
            .get(table)
            .and_then(|t| t.entries.get(&key))
            .cloned();
        if found.is_none() {
            trace!(table, %key, "Registry miss");
        }
        found
    }

    /// Register a decoder that other decoders can call by name.
    pub fn register_handle(&mut self, name: &'static str, decoder: Arc<dyn Decoder>) {
        debug!(name, decoder = decoder.name(), "Registered handle");
        self.handles.insert(name, decoder);
    }

    /// Find a decoder handle by name.
    pub fn find_handle(&self, name: &str) -> Option<Arc<dyn Decoder>> {
        self.handles.get(name).cloned()
    }

    /// Append a decoder to a heuristic list.
    pub fn register_heuristic(&mut self, list: &'static str, decoder: Arc<dyn Decoder>) {
        debug!(list, decoder = decoder.name(), "Registered heuristic");
        self.heuristics.entry(list).or_default().push(decoder);
    }

    /// Snapshot of a heuristic list, in registration order.
    pub fn heuristics(&self, list: &str) -> Vec<Arc<dyn Decoder>> {
        self.heuristics.get(list).cloned().unwrap_or_default()
    }

    /// All tables with their entries, sorted by table name.
    pub fn tables(&self) -> Vec<TableListing> {
        let mut listing: Vec<TableListing> = self
            .tables
            .iter()
            .map(|(name, table)| {
                let mut entries: Vec<_> = table
                    .entries
                    .iter()
                    .map(|(key, decoder)| (key.clone(), decoder.name()))
                    .collect();
                entries.sort();
                TableListing {
                    name: *name,
                    kind: table.kind,
                    entries,
                }
            })
            .collect();
        listing.sort_by(|a, b| a.name.cmp(b.name));
        listing
    }

    /// Names of all registered handles, sorted.
    pub fn handle_names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.handles.keys().copied().collect();
        names.sort_unstable();
        names
    }
}
