//! Symbol metadata
//!
//! The store needs exactly one thing from a symbol service: the minimum
//! price increment, which determines the fixed-point precision of stored
//! prices. [`SymbolCatalog`] is that seam; [`SymbolTable`] is an in-memory
//! implementation, usually filled from configuration.

use crate::error::StoreResult;
use crate::price::Precision;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Integer key identifying a symbol.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct SymbolKey(pub u32);

impl std::fmt::Display for SymbolKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Static description of a tradable symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolInfo {
    /// Integer key
    pub key: SymbolKey,
    /// Display name, also used for the tick file name
    pub name: String,
    /// Minimum price increment
    pub min_tick: f64,
}

impl SymbolInfo {
    /// Create symbol metadata
    pub fn new(key: u32, name: impl Into<String>, min_tick: f64) -> Self {
        SymbolInfo {
            key: SymbolKey(key),
            name: name.into(),
            min_tick,
        }
    }

    /// Price precision derived from the minimum increment
    pub fn precision(&self) -> StoreResult<Precision> {
        Precision::from_min_tick(self.min_tick)
    }
}

/// Lookup of symbol metadata, provided by the host application.
pub trait SymbolCatalog: Send + Sync {
    /// Find a symbol by key
    fn lookup(&self, key: SymbolKey) -> Option<SymbolInfo>;

    /// Find a symbol by name
    fn lookup_name(&self, name: &str) -> Option<SymbolInfo>;
}

/// In-memory symbol catalog.
#[derive(Debug, Clone, Default)]
pub struct SymbolTable {
    by_key: HashMap<SymbolKey, SymbolInfo>,
}

impl SymbolTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a symbol
    pub fn insert(&mut self, info: SymbolInfo) {
        self.by_key.insert(info.key, info);
    }

    /// Number of symbols
    pub fn len(&self) -> usize {
        self.by_key.len()
    }

    /// True if the table has no symbols
    pub fn is_empty(&self) -> bool {
        self.by_key.is_empty()
    }
}

impl FromIterator<SymbolInfo> for SymbolTable {
    fn from_iter<I: IntoIterator<Item = SymbolInfo>>(iter: I) -> Self {
        let mut table = SymbolTable::new();
        for info in iter {
            table.insert(info);
        }
        table
    }
}

impl SymbolCatalog for SymbolTable {
    fn lookup(&self, key: SymbolKey) -> Option<SymbolInfo> {
        self.by_key.get(&key).cloned()
    }

    fn lookup_name(&self, name: &str) -> Option<SymbolInfo> {
        self.by_key.values().find(|s| s.name == name).cloned()
    }
}
