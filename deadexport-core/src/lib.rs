//! deadexport-core: incremental unused-export detection
//!
//! Finds exported symbols of a compiled program that nothing in the program
//! itself references, across incremental builds.
//!
//! # Features
//!
//! - **Call collection**: concurrent, idempotent recording of symbol references
//!   per compilation unit while the compiler runs
//! - **Incremental manifest**: per-unit reference sets persisted between builds,
//!   so units that were not recompiled keep their references
//! - **Ignore rules**: `owner[:name[/arity]]` patterns with `_` wildcards for
//!   symbols reached only through dynamic dispatch
//! - **Deterministic reports**: unused exports sorted by identity, one
//!   session-wide severity
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use deadexport_core::prelude::*;
//!
//! let settings = load_settings(project_root)?;
//! let mut session = Deadexport::new("_build/dev").settings(settings).build();
//!
//! let handle = session.begin()?;
//! handle.record(&UnitId::from("MyApp.Web"), SymbolIdentity::new("MyApp.Repo", "all", 1))?;
//! let report = session.finish(recompiled, &provider)?;
//! ```
//!
//! Symbols invoked only through names computed at runtime are invisible to
//! the collector; ignore rules are the way to silence them.
//!
//! # Module Organization
//!
//! - [`collector`]: Concurrent call collector
//! - [`cache`]: Manifest persistence and per-unit merging
//! - [`ignore`]: Ignore rule parsing and matching
//! - [`detect`]: Unused export computation
//! - [`report`]: Severities, diagnostics and output
//! - [`provider`]: Symbol table provider interface and adapters
//! - [`session`]: Compile-session state machine
//! - [`config`]: `deadexport.toml` loading
//! - [`error`]: Typed error handling

pub mod cache;
pub mod collector;
pub mod config;
pub mod detect;
pub mod error;
pub mod identity;
pub mod ignore;
pub mod logging;
pub mod prelude;
pub mod provider;
pub mod report;
pub mod session;

// ============================================================================
// Explicit Re-exports
// ============================================================================

// Error types
pub use error::{CollectorError, DeadexportError, DeadexportResult, IoResultExt};

// Identities
pub use identity::{ExportedSymbol, ReferenceMap, SymbolIdentity, UnitId};

// Call collection
pub use collector::{CallCollector, CollectorHandle};

// Manifest cache
pub use cache::{
    clean_manifest, load_manifest, manifest_path, merge, save_manifest, Manifest,
    ManifestMetadata, MANIFEST_FILE,
};

// Ignore rules
pub use ignore::{ArityEntry, FieldPattern, IgnoreEntry, IgnoreMatcher, IgnoreRule, TableEntry};

// Detection and reporting
pub use detect::compute_unused;
pub use report::{
    format_plain, print_json, print_plain, to_diagnostic, write_plain, Diagnostic, Severity,
};

// Providers
pub use provider::{
    enumerate_exports, is_generated, ExportSet, JsonSymbolTable, StaticSymbolTable,
    SymbolTableProvider, UnitSymbols,
};

// Configuration
pub use config::{load_config, load_settings, DeadexportConfig, SessionSettings, CONFIG_FILE};

// Logging
pub use logging::{init_logging, LogFormat};

// Session
pub use session::{Deadexport, Session, SessionReport, SessionState};

#[cfg(test)]
mod tests;
