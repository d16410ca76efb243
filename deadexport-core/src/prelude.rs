//! Prelude module for convenient imports.
//!
//! ```rust,ignore
//! use deadexport_core::prelude::*;
//! ```

// Errors
pub use crate::error::{DeadexportError, DeadexportResult};

// Identities
pub use crate::identity::{ExportedSymbol, SymbolIdentity, UnitId};

// Session driving
pub use crate::collector::CollectorHandle;
pub use crate::session::{Deadexport, Session, SessionReport};

// Configuration
pub use crate::config::{load_settings, SessionSettings};
pub use crate::ignore::IgnoreMatcher;
pub use crate::report::{Diagnostic, Severity};

// Providers
pub use crate::provider::{StaticSymbolTable, SymbolTableProvider, UnitSymbols};
