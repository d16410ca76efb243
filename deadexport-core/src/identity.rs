//! Symbol and compilation-unit identities shared by every stage.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::PathBuf;

/// Per-unit sets of referenced symbols, ordered for byte-stable output.
pub type ReferenceMap = BTreeMap<UnitId, BTreeSet<SymbolIdentity>>;

/// Identifier of one compilation unit (module/file).
///
/// The unit is the merge granularity of the manifest cache.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UnitId(String);

impl UnitId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UnitId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for UnitId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// The `(owner, name, arity)` triple identifying one exported function-like entity.
///
/// Ordering is owner, then name, then arity. Serialized as a
/// `[owner, name, arity]` array to keep manifests compact.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "(String, String, u32)", into = "(String, String, u32)")]
pub struct SymbolIdentity {
    pub owner: String,
    pub name: String,
    pub arity: u32,
}

impl SymbolIdentity {
    pub fn new(owner: impl Into<String>, name: impl Into<String>, arity: u32) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
            arity,
        }
    }
}

impl fmt::Display for SymbolIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}/{}", self.owner, self.name, self.arity)
    }
}

impl From<(String, String, u32)> for SymbolIdentity {
    fn from((owner, name, arity): (String, String, u32)) -> Self {
        Self { owner, name, arity }
    }
}

impl From<SymbolIdentity> for (String, String, u32) {
    fn from(id: SymbolIdentity) -> Self {
        (id.owner, id.name, id.arity)
    }
}

/// An exported symbol together with where it is defined.
///
/// Recomputed every session by the symbol table provider, never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExportedSymbol {
    pub identity: SymbolIdentity,
    pub source_file: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_line: Option<u32>,
}

impl ExportedSymbol {
    pub fn new(identity: SymbolIdentity, source_file: impl Into<PathBuf>) -> Self {
        Self {
            identity,
            source_file: source_file.into(),
            source_line: None,
        }
    }

    /// Attach a 1-indexed source line.
    pub fn at_line(mut self, line: u32) -> Self {
        self.source_line = Some(line);
        self
    }
}
