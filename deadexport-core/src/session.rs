//! Compile-session orchestration.
//!
//! A session walks `Idle → Collecting → Draining → Merging → Reporting → Idle`:
//!
//! ```rust,ignore
//! use deadexport_core::prelude::*;
//!
//! let mut session = Deadexport::new("_build/dev")
//!     .severity(Severity::Warning)
//!     .build();
//!
//! let handle = session.begin()?;
//! // ... compilation workers call handle.record(&unit, identity) ...
//! let report = session.finish(recompiled_units, &provider)?;
//!
//! for diag in &report.diagnostics {
//!     println!("{}", diag.message);
//! }
//! ```
//!
//! All persistent state lives in the manifest file, so the same `Session`
//! (or a fresh one) can run any number of times.
//!
//! Entries of units that are not recompiled are carried over as they are.
//! That includes units deleted from the program: their last recorded
//! references keep the callee symbols alive until [`Session::clean`] (or
//! `deadexport clean`) drops the manifest.

use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::cache::{clean_manifest, load_manifest, manifest_path, save_manifest};
use crate::collector::{CallCollector, CollectorHandle};
use crate::config::SessionSettings;
use crate::detect::compute_unused;
use crate::error::{DeadexportError, DeadexportResult};
use crate::identity::UnitId;
use crate::ignore::IgnoreMatcher;
use crate::provider::{enumerate_exports, SymbolTableProvider};
use crate::report::{to_diagnostic, Diagnostic, Severity};

/// Builder for configuring a compile session.
#[derive(Debug, Clone)]
pub struct Deadexport {
    /// Build output directory holding the manifest
    build_dir: PathBuf,

    /// Explicit manifest location, overriding `build_dir`
    manifest_path: Option<PathBuf>,

    ignore: IgnoreMatcher,

    severity: Severity,
}

impl Deadexport {
    /// Create a session builder for the given build output directory.
    pub fn new(build_dir: impl Into<PathBuf>) -> Self {
        Self {
            build_dir: build_dir.into(),
            manifest_path: None,
            ignore: IgnoreMatcher::empty(),
            severity: Severity::default(),
        }
    }

    /// Apply validated project settings.
    pub fn settings(mut self, settings: SessionSettings) -> Self {
        self.ignore = settings.ignore;
        self.severity = settings.severity;
        if settings.manifest_path.is_some() {
            self.manifest_path = settings.manifest_path;
        }
        self
    }

    pub fn severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    pub fn ignore(mut self, matcher: IgnoreMatcher) -> Self {
        self.ignore = matcher;
        self
    }

    pub fn manifest_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.manifest_path = Some(path.into());
        self
    }

    pub fn build(self) -> Session {
        let manifest_path = self
            .manifest_path
            .unwrap_or_else(|| manifest_path(&self.build_dir));
        Session {
            manifest_path,
            ignore: self.ignore,
            severity: self.severity,
            collector: CallCollector::new(),
            handle: None,
            state: SessionState::Idle,
        }
    }
}

/// Lifecycle state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Collecting,
    Draining,
    Merging,
    Reporting,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Collecting => "collecting",
            Self::Draining => "draining",
            Self::Merging => "merging",
            Self::Reporting => "reporting",
        };
        f.write_str(s)
    }
}

/// Outcome of one completed session.
#[derive(Debug, Clone, Default)]
pub struct SessionReport {
    /// Unused, non-ignored exports sorted by identity
    pub diagnostics: Vec<Diagnostic>,
    /// Units left out of the unused computation because their data was unavailable
    pub skipped_units: Vec<UnitId>,
    /// Units recorded in the saved manifest
    pub manifest_units: usize,
    /// Candidate exports considered
    pub total_exports: usize,
}

impl SessionReport {
    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(|d| d.severity == Severity::Error)
    }
}

/// One compile session driver.
pub struct Session {
    manifest_path: PathBuf,
    ignore: IgnoreMatcher,
    severity: Severity,
    collector: CallCollector,
    handle: Option<CollectorHandle>,
    state: SessionState,
}

impl Session {
    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn manifest_path(&self) -> &Path {
        &self.manifest_path
    }

    /// Start collecting. Hand clones of the returned handle to every worker.
    pub fn begin(&mut self) -> DeadexportResult<CollectorHandle> {
        if self.state != SessionState::Idle {
            return Err(DeadexportError::session(format!(
                "cannot begin a session while {}",
                self.state
            )));
        }

        let handle = self.collector.start()?;
        self.handle = Some(handle.clone());
        self.state = SessionState::Collecting;
        debug!(manifest = %self.manifest_path.display(), "session collecting");
        Ok(handle)
    }

    /// Drain the collector, update the manifest and compute diagnostics.
    ///
    /// `recompiled` lists the units compiled in this session; units that
    /// recorded calls are added automatically. Call only after every worker
    /// has finished. On error the session is back to `Idle` and no
    /// diagnostics are produced.
    pub fn finish<P, I>(&mut self, recompiled: I, provider: &P) -> DeadexportResult<SessionReport>
    where
        P: SymbolTableProvider + ?Sized,
        I: IntoIterator<Item = UnitId>,
    {
        if self.state != SessionState::Collecting {
            return Err(DeadexportError::session(format!(
                "cannot finish a session while {}",
                self.state
            )));
        }
        let handle = self
            .handle
            .take()
            .ok_or_else(|| DeadexportError::session("collecting without a collector handle"))?;

        let result = self.drain_merge_report(&handle, recompiled, provider);
        self.state = SessionState::Idle;
        result
    }

    /// Begin, run `compile` with the collector handle, then finish.
    ///
    /// If `compile` fails the session is aborted and nothing is persisted.
    pub fn run<P, I, F>(
        &mut self,
        recompiled: I,
        provider: &P,
        compile: F,
    ) -> DeadexportResult<SessionReport>
    where
        P: SymbolTableProvider + ?Sized,
        I: IntoIterator<Item = UnitId>,
        F: FnOnce(&CollectorHandle) -> DeadexportResult<()>,
    {
        let handle = self.begin()?;
        if let Err(e) = compile(&handle) {
            self.abort();
            return Err(e);
        }
        self.finish(recompiled, provider)
    }

    /// Drop collected data without touching the manifest.
    pub fn abort(&mut self) {
        if let Some(handle) = self.handle.take() {
            let _ = handle.stop();
        }
        self.state = SessionState::Idle;
        debug!("session aborted");
    }

    /// Delete the manifest so the next session starts from scratch.
    pub fn clean(&self) -> DeadexportResult<()> {
        clean_manifest(&self.manifest_path)
    }

    fn drain_merge_report<P, I>(
        &mut self,
        handle: &CollectorHandle,
        recompiled: I,
        provider: &P,
    ) -> DeadexportResult<SessionReport>
    where
        P: SymbolTableProvider + ?Sized,
        I: IntoIterator<Item = UnitId>,
    {
        self.state = SessionState::Draining;
        let fresh = handle.stop()?;
        let fresh_units: BTreeSet<UnitId> = recompiled
            .into_iter()
            .chain(fresh.keys().cloned())
            .collect();

        self.state = SessionState::Merging;
        let old = load_manifest(&self.manifest_path);
        let merged = old.merge(&fresh_units, &fresh);
        save_manifest(&self.manifest_path, &merged)?;

        self.state = SessionState::Reporting;
        let exports = enumerate_exports(provider)?;
        let referenced = merged.union();
        let diagnostics: Vec<Diagnostic> =
            compute_unused(&exports.symbols, &referenced, &self.ignore)
                .into_iter()
                .map(|s| to_diagnostic(s, self.severity))
                .collect();

        info!(
            recompiled = fresh_units.len(),
            exports = exports.symbols.len(),
            unused = diagnostics.len(),
            skipped = exports.skipped_units.len(),
            "session finished"
        );

        Ok(SessionReport {
            diagnostics,
            skipped_units: exports.skipped_units,
            manifest_units: merged.len(),
            total_exports: exports.symbols.len(),
        })
    }
}
