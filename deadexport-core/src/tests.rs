//! End-to-end session tests for deadexport-core.

use crate::*;
use rayon::prelude::*;
use std::collections::BTreeSet;
use std::fs;
use tempfile::TempDir;

fn id(owner: &str, name: &str, arity: u32) -> SymbolIdentity {
    SymbolIdentity::new(owner, name, arity)
}

fn unit(owner: &str, exports: &[(&str, u32)]) -> UnitSymbols {
    UnitSymbols {
        exports: exports
            .iter()
            .enumerate()
            .map(|(i, (n, a))| {
                ExportedSymbol::new(id(owner, n, *a), format!("lib/{}.ex", owner.to_lowercase()))
                    .at_line(i as u32 + 1)
            })
            .collect(),
        required: Default::default(),
    }
}

fn units(names: &[&str]) -> Vec<UnitId> {
    names.iter().map(|n| UnitId::from(*n)).collect()
}

fn reported(report: &SessionReport) -> Vec<SymbolIdentity> {
    report.diagnostics.iter().map(|d| d.symbol.clone()).collect()
}

/// Run one session that records `calls` and recompiles `recompiled`.
fn run_session(
    session: &mut Session,
    provider: &StaticSymbolTable,
    recompiled: &[&str],
    calls: &[(&str, SymbolIdentity)],
) -> SessionReport {
    session
        .run(units(recompiled), provider, |handle| {
            for (unit, identity) in calls {
                handle.record(&UnitId::from(*unit), identity.clone())?;
            }
            Ok(())
        })
        .unwrap()
}

// Scenario: one referenced, one unreferenced export
#[test]
fn test_unreferenced_export_reported() {
    let dir = TempDir::new().unwrap();
    let provider = StaticSymbolTable::new().with_unit("M", unit("M", &[("a", 0), ("b", 1)]));
    let mut session = Deadexport::new(dir.path()).build();

    let report = run_session(&mut session, &provider, &["M", "U"], &[("U", id("M", "a", 0))]);

    assert_eq!(reported(&report), vec![id("M", "b", 1)]);
    let diag = &report.diagnostics[0];
    assert_eq!(diag.message, "M.b/1 is unused");
    assert_eq!(diag.severity, Severity::Hint);
    assert_eq!(diag.line, Some(2));
}

// Scenario: owner wildcard rule suppresses everything
#[test]
fn test_owner_ignore_rule_suppresses_all() {
    let dir = TempDir::new().unwrap();
    let provider = StaticSymbolTable::new().with_unit("M", unit("M", &[("a", 0), ("b", 1)]));
    let ignore = IgnoreMatcher::compile(&[IgnoreEntry::from("M")]).unwrap();
    let mut session = Deadexport::new(dir.path()).ignore(ignore).build();

    let report = run_session(&mut session, &provider, &["U"], &[("U", id("M", "a", 0))]);
    assert!(report.diagnostics.is_empty());
}

#[test]
fn test_configured_severity_applies_to_all() {
    let dir = TempDir::new().unwrap();
    let provider = StaticSymbolTable::new().with_unit("M", unit("M", &[("a", 0), ("b", 1)]));
    let mut session = Deadexport::new(dir.path()).severity(Severity::Error).build();

    let report = run_session(&mut session, &provider, &["M"], &[]);
    assert_eq!(report.diagnostics.len(), 2);
    assert!(report.diagnostics.iter().all(|d| d.severity == Severity::Error));
    assert!(report.has_errors());
}

// Merge property: A untouched, B fully replaced
#[test]
fn test_incremental_merge_replaces_only_recompiled_units() {
    let dir = TempDir::new().unwrap();
    let provider = StaticSymbolTable::new().with_unit("M", unit("M", &[("f", 1), ("g", 2), ("h", 1)]));
    let mut session = Deadexport::new(dir.path()).build();

    let first = run_session(
        &mut session,
        &provider,
        &["A", "B", "M"],
        &[("A", id("M", "f", 1)), ("B", id("M", "g", 2))],
    );
    assert_eq!(reported(&first), vec![id("M", "h", 1)]);

    let second = run_session(&mut session, &provider, &["B"], &[("B", id("M", "h", 1))]);
    assert_eq!(reported(&second), vec![id("M", "g", 2)]);

    let manifest = load_manifest(session.manifest_path());
    let expected_a: BTreeSet<_> = [id("M", "f", 1)].into_iter().collect();
    let expected_b: BTreeSet<_> = [id("M", "h", 1)].into_iter().collect();
    assert_eq!(manifest.get(&UnitId::from("A")), Some(&expected_a));
    assert_eq!(manifest.get(&UnitId::from("B")), Some(&expected_b));
}

// A recompiled unit whose last call site disappeared no longer keeps the symbol alive
#[test]
fn test_recompiled_unit_without_calls_drops_references() {
    let dir = TempDir::new().unwrap();
    let provider = StaticSymbolTable::new().with_unit("M", unit("M", &[("f", 1)]));
    let mut session = Deadexport::new(dir.path()).build();

    let first = run_session(&mut session, &provider, &["A"], &[("A", id("M", "f", 1))]);
    assert!(first.diagnostics.is_empty());

    let second = run_session(&mut session, &provider, &["A"], &[]);
    assert_eq!(reported(&second), vec![id("M", "f", 1)]);
}

// Carried-over units keep symbols alive without being retraced
#[test]
fn test_unrecompiled_units_carry_over() {
    let dir = TempDir::new().unwrap();
    let provider = StaticSymbolTable::new().with_unit("M", unit("M", &[("f", 1)]));

    let mut first = Deadexport::new(dir.path()).build();
    run_session(&mut first, &provider, &["A"], &[("A", id("M", "f", 1))]);

    // A fresh session object: everything it needs is on disk
    let mut second = Deadexport::new(dir.path()).build();
    let report = run_session(&mut second, &provider, &["M"], &[]);
    assert!(report.diagnostics.is_empty());
    assert_eq!(report.manifest_units, 2);
}

// A deleted caller keeps its references until the manifest is cleaned
#[test]
fn test_deleted_unit_references_survive_until_clean() {
    let dir = TempDir::new().unwrap();
    let provider = StaticSymbolTable::new().with_unit("M", unit("M", &[("f", 1)]));
    let mut session = Deadexport::new(dir.path()).build();

    run_session(&mut session, &provider, &["Gone"], &[("Gone", id("M", "f", 1))]);

    // "Gone" no longer exists and is never recompiled again
    let carried = run_session(&mut session, &provider, &["M"], &[]);
    assert!(carried.diagnostics.is_empty());
    assert!(load_manifest(session.manifest_path())
        .get(&UnitId::from("Gone"))
        .is_some());

    session.clean().unwrap();
    let rebuilt = run_session(&mut session, &provider, &["M"], &[]);
    assert_eq!(reported(&rebuilt), vec![id("M", "f", 1)]);
}

#[test]
fn test_clean_then_run_matches_first_run() {
    let dir = TempDir::new().unwrap();
    let provider = StaticSymbolTable::new().with_unit("M", unit("M", &[("a", 0), ("b", 1)]));
    let calls = [("U", id("M", "a", 0))];

    let fresh_dir = TempDir::new().unwrap();
    let mut baseline = Deadexport::new(fresh_dir.path()).build();
    let expected = run_session(&mut baseline, &provider, &["U"], &calls);

    let mut session = Deadexport::new(dir.path()).build();
    run_session(&mut session, &provider, &["V"], &[("V", id("M", "b", 1))]);
    session.clean().unwrap();
    session.clean().unwrap();
    let after_clean = run_session(&mut session, &provider, &["U"], &calls);

    assert_eq!(after_clean.diagnostics, expected.diagnostics);
    assert_eq!(after_clean.manifest_units, expected.manifest_units);
}

#[test]
fn test_corrupt_manifest_falls_back_to_empty() {
    let dir = TempDir::new().unwrap();
    fs::write(manifest_path(dir.path()), "\u{0}\u{1}garbage").unwrap();
    let provider = StaticSymbolTable::new().with_unit("M", unit("M", &[("a", 0), ("b", 1)]));
    let mut session = Deadexport::new(dir.path()).build();

    let report = run_session(&mut session, &provider, &["U"], &[("U", id("M", "a", 0))]);
    assert_eq!(reported(&report), vec![id("M", "b", 1)]);
    assert_eq!(load_manifest(session.manifest_path()).len(), 1);
}

// Units whose symbol data is unavailable are excluded, not reported
#[test]
fn test_broken_unit_excluded_from_report() {
    let dir = TempDir::new().unwrap();
    let provider = StaticSymbolTable::new()
        .with_unit("M", unit("M", &[("a", 0)]))
        .with_broken_unit("N", "artifact unreadable");
    let mut session = Deadexport::new(dir.path()).build();

    let report = run_session(&mut session, &provider, &["M"], &[]);
    assert_eq!(reported(&report), vec![id("M", "a", 0)]);
    assert_eq!(report.skipped_units, vec![UnitId::from("N")]);
}

#[test]
fn test_required_callbacks_never_reported() {
    let dir = TempDir::new().unwrap();
    let mut symbols = unit("MyApp.Worker", &[("init", 1), ("handle_call", 3), ("helper", 0)]);
    symbols.required = [("init".to_string(), 1), ("handle_call".to_string(), 3)]
        .into_iter()
        .collect();
    let provider = StaticSymbolTable::new().with_unit("MyApp.Worker", symbols);
    let mut session = Deadexport::new(dir.path()).build();

    let report = run_session(&mut session, &provider, &["MyApp.Worker"], &[]);
    assert_eq!(reported(&report), vec![id("MyApp.Worker", "helper", 0)]);
}

// Every export recorded from many units and many workers is absent from the output
#[test]
fn test_parallel_recording_union_property() {
    let dir = TempDir::new().unwrap();
    let exports: Vec<(String, u32)> = (0..200).map(|i| (format!("f{}", i), i % 3)).collect();
    let export_refs: Vec<(&str, u32)> = exports.iter().map(|(n, a)| (n.as_str(), *a)).collect();
    let provider = StaticSymbolTable::new().with_unit("M", unit("M", &export_refs));
    let mut session = Deadexport::new(dir.path()).build();

    let handle = session.begin().unwrap();
    // Even indices referenced, each from three units, several times
    (0..200u32).into_par_iter().filter(|i| i % 2 == 0).for_each(|i| {
        for u in 0..3 {
            for _ in 0..2 {
                handle
                    .record(&UnitId::new(format!("U{}", u)), id("M", &format!("f{}", i), i % 3))
                    .unwrap();
            }
        }
    });
    let report = session.finish(units(&["M"]), &provider).unwrap();

    let expected: Vec<SymbolIdentity> = {
        let mut v: Vec<_> = (0..200u32)
            .filter(|i| i % 2 == 1)
            .map(|i| id("M", &format!("f{}", i), i % 3))
            .collect();
        v.sort();
        v
    };
    assert_eq!(reported(&report), expected);
}

#[test]
fn test_repeated_runs_are_identical() {
    let dir = TempDir::new().unwrap();
    let provider = StaticSymbolTable::new()
        .with_unit("B", unit("B", &[("z", 0), ("a", 2)]))
        .with_unit("A", unit("A", &[("m", 1), ("m", 0)]));
    let mut session = Deadexport::new(dir.path()).build();

    let first = run_session(&mut session, &provider, &["A", "B"], &[]);
    let second = run_session(&mut session, &provider, &["A", "B"], &[]);

    let shown: Vec<String> = first.diagnostics.iter().map(|d| d.message.clone()).collect();
    assert_eq!(
        shown,
        vec!["A.m/0 is unused", "A.m/1 is unused", "B.a/2 is unused", "B.z/0 is unused"]
    );
    assert_eq!(
        serde_json::to_string(&first.diagnostics).unwrap(),
        serde_json::to_string(&second.diagnostics).unwrap()
    );
}

#[test]
fn test_settings_from_config_drive_session() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join(CONFIG_FILE),
        "severity = \"warning\"\nmanifest = \"out/m.json\"\nignore = [\"M:a\"]\n",
    )
    .unwrap();
    let settings = load_settings(dir.path()).unwrap();
    let provider = StaticSymbolTable::new().with_unit("M", unit("M", &[("a", 0), ("a", 1), ("b", 0)]));
    let mut session = Deadexport::new(dir.path().join("_build")).settings(settings).build();

    let report = run_session(&mut session, &provider, &["M"], &[]);
    assert_eq!(reported(&report), vec![id("M", "b", 0)]);
    assert_eq!(report.diagnostics[0].severity, Severity::Warning);
    assert!(dir.path().join("out/m.json").exists());
}

#[test]
fn test_double_begin_is_loud() {
    let dir = TempDir::new().unwrap();
    let collector = CallCollector::new();
    let _running = collector.start().unwrap();
    assert!(matches!(
        collector.start().map(|_| ()).map_err(DeadexportError::from),
        Err(DeadexportError::Collector(CollectorError::AlreadyRunning))
    ));

    let mut session = Deadexport::new(dir.path()).build();
    session.begin().unwrap();
    assert!(matches!(session.begin(), Err(DeadexportError::Session { .. })));
}
