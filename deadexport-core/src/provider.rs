//! Symbol table providers: where exported symbols come from.
//!
//! The core never inspects compiled artifacts itself. A provider lists the
//! compilation units and, per unit, its exports plus the callbacks the unit
//! must define to satisfy a declared contract. Contract callbacks and
//! toolchain-generated symbols are never candidates for "unused".
//!
//! Performance characteristics:
//! - Units are enumerated in parallel via Rayon
//! - A unit whose data cannot be obtained is skipped, not fatal

use rayon::prelude::*;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::error::{DeadexportError, DeadexportResult, IoResultExt};
use crate::identity::{ExportedSymbol, SymbolIdentity, UnitId};

/// Symbols generated by the toolchain for every unit.
const GENERATED: &[(&str, u32)] = &[
    ("__info__", 1),
    ("__struct__", 0),
    ("__struct__", 1),
    ("__impl__", 1),
    ("__protocol__", 1),
    ("module_info", 0),
    ("module_info", 1),
    ("behaviour_info", 1),
];

/// True for symbols the toolchain emits on its own.
pub fn is_generated(name: &str, arity: u32) -> bool {
    if name.len() > 4 && name.starts_with("__") && name.ends_with("__") {
        return true;
    }
    GENERATED.iter().any(|(n, a)| *n == name && *a == arity)
}

/// Exports of one unit and the callbacks it is obliged to define.
#[derive(Debug, Clone, Default)]
pub struct UnitSymbols {
    pub exports: Vec<ExportedSymbol>,
    /// `(name, arity)` pairs required by an implemented contract
    pub required: HashSet<(String, u32)>,
}

/// Source of "what symbols exist and where they live".
pub trait SymbolTableProvider: Sync {
    /// Every unit of the program, recompiled or not.
    fn units(&self) -> DeadexportResult<Vec<UnitId>>;

    /// Symbol data for one unit.
    fn unit_symbols(&self, unit: &UnitId) -> DeadexportResult<UnitSymbols>;
}

/// Candidate exports of the whole program.
#[derive(Debug, Clone, Default)]
pub struct ExportSet {
    /// Exports that may be reported as unused, in unit order
    pub symbols: Vec<ExportedSymbol>,
    /// Units whose data could not be obtained; their symbols are excluded
    pub skipped_units: Vec<UnitId>,
}

/// Collect candidate exports from every unit.
///
/// Fails only if the unit list itself is unavailable.
pub fn enumerate_exports<P>(provider: &P) -> DeadexportResult<ExportSet>
where
    P: SymbolTableProvider + ?Sized,
{
    let mut units = provider.units()?;
    units.sort();
    units.dedup();

    let results: Vec<(UnitId, DeadexportResult<UnitSymbols>)> = units
        .into_par_iter()
        .map(|unit| {
            let symbols = provider.unit_symbols(&unit);
            (unit, symbols)
        })
        .collect();

    let mut set = ExportSet::default();
    for (unit, result) in results {
        match result {
            Ok(symbols) => {
                let before = symbols.exports.len();
                let required = symbols.required;
                set.symbols.extend(symbols.exports.into_iter().filter(|s| {
                    let id = &s.identity;
                    !is_generated(&id.name, id.arity)
                        && !required.contains(&(id.name.clone(), id.arity))
                }));
                debug!(unit = %unit, exports = before, "unit enumerated");
            }
            Err(e) => {
                warn!(unit = %unit, error = %e, "skipping unit with unavailable symbol data");
                set.skipped_units.push(unit);
            }
        }
    }

    Ok(set)
}

/// In-memory provider, for embedders that already hold symbol tables.
#[derive(Debug, Clone, Default)]
pub struct StaticSymbolTable {
    units: BTreeMap<UnitId, Result<UnitSymbols, String>>,
}

impl StaticSymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_unit(mut self, unit: impl Into<UnitId>, symbols: UnitSymbols) -> Self {
        self.units.insert(unit.into(), Ok(symbols));
        self
    }

    /// Register a unit whose symbol data fails to load.
    pub fn with_broken_unit(mut self, unit: impl Into<UnitId>, reason: impl Into<String>) -> Self {
        self.units.insert(unit.into(), Err(reason.into()));
        self
    }
}

impl SymbolTableProvider for StaticSymbolTable {
    fn units(&self) -> DeadexportResult<Vec<UnitId>> {
        Ok(self.units.keys().cloned().collect())
    }

    fn unit_symbols(&self, unit: &UnitId) -> DeadexportResult<UnitSymbols> {
        match self.units.get(unit) {
            Some(Ok(symbols)) => Ok(symbols.clone()),
            Some(Err(reason)) => Err(DeadexportError::provider(unit.as_str(), reason.clone())),
            None => Err(DeadexportError::provider(unit.as_str(), "unknown unit")),
        }
    }
}

#[derive(Debug, Deserialize)]
struct JsonExport {
    name: String,
    arity: u32,
    #[serde(default)]
    line: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct JsonUnit {
    file: Option<PathBuf>,
    #[serde(default)]
    exports: Vec<JsonExport>,
    #[serde(default)]
    required: Vec<(String, u32)>,
}

#[derive(Debug, Deserialize)]
struct JsonDocument {
    units: HashMap<String, serde_json::Value>,
}

/// File-backed provider reading a JSON symbol table.
///
/// ```text
/// { "units": { "MyApp.Repo": { "file": "lib/my_app/repo.ex",
///                              "exports": [{ "name": "all", "arity": 1, "line": 3 }],
///                              "required": [["init", 1]] } } }
/// ```
///
/// The owner of every export is its unit id. A unit entry that does not match
/// the schema is reported as a provider error for that unit only.
#[derive(Debug)]
pub struct JsonSymbolTable {
    path: PathBuf,
    units: HashMap<UnitId, serde_json::Value>,
}

impl JsonSymbolTable {
    pub fn load(path: &Path) -> DeadexportResult<Self> {
        let text = fs::read_to_string(path).with_path(path)?;
        Self::from_json(path, &text)
    }

    fn from_json(path: &Path, text: &str) -> DeadexportResult<Self> {
        let doc: JsonDocument = serde_json::from_str(text).map_err(|e| {
            DeadexportError::config(path, format!("invalid symbol table: {}", e))
        })?;
        Ok(Self {
            path: path.to_path_buf(),
            units: doc.units.into_iter().map(|(k, v)| (UnitId::new(k), v)).collect(),
        })
    }
}

impl SymbolTableProvider for JsonSymbolTable {
    fn units(&self) -> DeadexportResult<Vec<UnitId>> {
        Ok(self.units.keys().cloned().collect())
    }

    fn unit_symbols(&self, unit: &UnitId) -> DeadexportResult<UnitSymbols> {
        let value = self
            .units
            .get(unit)
            .ok_or_else(|| DeadexportError::provider(unit.as_str(), "unknown unit"))?;
        let entry: JsonUnit = serde_json::from_value(value.clone())
            .map_err(|e| DeadexportError::provider(unit.as_str(), e.to_string()))?;

        let file = entry.file.unwrap_or_else(|| self.path.clone());
        let exports = entry
            .exports
            .into_iter()
            .map(|e| ExportedSymbol {
                identity: SymbolIdentity::new(unit.as_str(), e.name, e.arity),
                source_file: file.clone(),
                source_line: e.line,
            })
            .collect();

        Ok(UnitSymbols {
            exports,
            required: entry.required.into_iter().collect(),
        })
    }
}
