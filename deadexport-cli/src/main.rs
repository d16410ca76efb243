//! deadexport CLI - report exported symbols nothing in the program references.
//!
//! Drives one compile session from files on disk:
//! - `--symbols`: JSON symbol table (units, exports, required callbacks)
//! - `--calls`: JSON map of unit to the symbols it references, as emitted
//!   by the compiler tracer for the units compiled in this build
//!
//! The manifest under the build directory carries references of units that
//! were not recompiled over to the next run.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use rayon::prelude::*;
use std::collections::BTreeMap;
use std::fs;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};

use deadexport_core::{
    init_logging, load_settings, print_json, print_plain, CollectorError, Deadexport,
    JsonSymbolTable, LogFormat, SessionReport, Severity, SymbolIdentity, SymbolTableProvider,
    UnitId,
};

#[derive(Parser, Debug)]
#[command(author, version, about = "Detect exported symbols that are never referenced")]
pub struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Emit logs as JSON objects on stderr
    #[arg(long, global = true)]
    log_json: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run one session and report unused exports
    Check(CheckArgs),

    /// Delete the manifest so the next check starts from scratch
    Clean(CleanArgs),
}

#[derive(Args, Debug)]
struct CheckArgs {
    /// Project root (holds deadexport.toml)
    #[arg(default_value = ".")]
    path: PathBuf,

    /// Symbol table JSON file
    #[arg(long, value_name = "FILE")]
    symbols: PathBuf,

    /// Recorded calls JSON file
    #[arg(long, value_name = "FILE")]
    calls: PathBuf,

    /// Units compiled in this build (default: every unit in the symbol table)
    #[arg(long, value_name = "UNIT", num_args = 1..)]
    recompiled: Vec<String>,

    /// Build output directory, relative to the project root
    #[arg(long, default_value = "_build")]
    build_dir: PathBuf,

    /// Severity override: hint, information, warning or error
    #[arg(long)]
    severity: Option<String>,

    /// Output results in JSON format
    #[arg(long)]
    json: bool,

    /// Disable colored severity prefixes
    #[arg(long)]
    no_color: bool,
}

#[derive(Args, Debug)]
struct CleanArgs {
    /// Project root (holds deadexport.toml)
    #[arg(default_value = ".")]
    path: PathBuf,

    /// Build output directory, relative to the project root
    #[arg(long, default_value = "_build")]
    build_dir: PathBuf,
}

type RecordedCalls = BTreeMap<UnitId, Vec<SymbolIdentity>>;

/// Reads `{ "<unit>": [[owner, name, arity], ...] }`.
fn load_calls(path: &Path) -> Result<RecordedCalls> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read calls file: {}", path.display()))?;
    serde_json::from_str(&text)
        .with_context(|| format!("Invalid calls file: {}", path.display()))
}

fn session_builder(root: &Path, build_dir: &Path, severity: Option<&str>) -> Result<Deadexport> {
    let mut settings = load_settings(root)?;
    if let Some(level) = severity {
        settings.severity = level.parse::<Severity>()?;
    }
    Ok(Deadexport::new(root.join(build_dir)).settings(settings))
}

fn run_check(args: &CheckArgs) -> Result<SessionReport> {
    let mut session =
        session_builder(&args.path, &args.build_dir, args.severity.as_deref())?.build();

    let provider = JsonSymbolTable::load(&args.symbols)?;
    let calls = load_calls(&args.calls)?;

    let recompiled: Vec<UnitId> = if args.recompiled.is_empty() {
        provider.units()?
    } else {
        args.recompiled.iter().map(|u| UnitId::new(u.as_str())).collect()
    };

    let report = session.run(recompiled, &provider, |handle| {
        calls
            .par_iter()
            .try_for_each(|(unit, ids)| handle.record_all(unit, ids.iter().cloned()))
            .map_err(|e: CollectorError| e.into())
    })?;
    Ok(report)
}

fn run_clean(args: &CleanArgs) -> Result<PathBuf> {
    let session = session_builder(&args.path, &args.build_dir, None)?.build();
    session.clean()?;
    Ok(session.manifest_path().to_path_buf())
}

fn main() -> Result<()> {
    std::panic::set_hook(Box::new(|info| {
        eprintln!("[PANIC] deadexport internal error: {}", info);
        eprintln!("[PANIC] The process will exit with code 101.");
    }));

    let cli = Cli::parse();
    init_logging(if cli.log_json {
        LogFormat::Json
    } else {
        LogFormat::Compact
    });

    match &cli.command {
        Command::Check(args) => {
            let report = run_check(args)?;

            for unit in &report.skipped_units {
                eprintln!("[WARN] symbol data unavailable, skipped unit: {}", unit);
            }

            if args.json {
                print_json(&report.diagnostics);
            } else {
                let color = !args.no_color && std::io::stdout().is_terminal();
                print_plain(&report.diagnostics, color);
            }

            if report.has_errors() {
                std::process::exit(1);
            }
        }
        Command::Clean(args) => {
            let path = run_clean(args)?;
            println!("Removed manifest: {}", path.display());
        }
    }

    Ok(())
}
