//! Diagnostics and output formatting - plaintext and JSON.

use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fmt;
use std::io::{self, Write};
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::DeadexportError;
use crate::identity::{ExportedSymbol, SymbolIdentity};

/// Diagnostic level, ordered `Hint < Information < Warning < Error`.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    #[default]
    Hint,
    Information,
    Warning,
    Error,
}

impl Severity {
    pub const ACCEPTED: &'static [&'static str] = &["hint", "information", "warning", "error"];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hint => "hint",
            Self::Information => "information",
            Self::Warning => "warning",
            Self::Error => "error",
        }
    }

    /// ANSI SGR color code for console prefixes.
    fn color_code(&self) -> &'static str {
        match self {
            Self::Hint => "36",
            Self::Information => "34",
            Self::Warning => "33",
            Self::Error => "31",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = DeadexportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "hint" => Ok(Self::Hint),
            "information" | "info" => Ok(Self::Information),
            "warning" => Ok(Self::Warning),
            "error" => Ok(Self::Error),
            _ => Err(DeadexportError::invalid_argument(format!(
                "unknown severity `{}` (expected one of: {})",
                s,
                Self::ACCEPTED.join(", ")
            ))),
        }
    }
}

/// One unused-export report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub symbol: SymbolIdentity,
    pub message: String,
    pub severity: Severity,
    pub file: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
}

/// Map one unused export to a diagnostic at the session-wide severity.
pub fn to_diagnostic(symbol: &ExportedSymbol, severity: Severity) -> Diagnostic {
    Diagnostic {
        symbol: symbol.identity.clone(),
        message: format!("{} is unused", symbol.identity),
        severity,
        file: symbol.source_file.clone(),
        line: symbol.source_line,
    }
}

/// Render one diagnostic as `<file>[:<line>]: <severity>: <message>`.
pub fn format_plain(diag: &Diagnostic, color: bool) -> String {
    let location = match diag.line {
        Some(line) => format!("{}:{}", diag.file.display(), line),
        None => diag.file.display().to_string(),
    };
    let prefix = if color {
        format!("\x1b[{}m{}\x1b[0m", diag.severity.color_code(), diag.severity)
    } else {
        diag.severity.to_string()
    };
    format!("{}: {}: {}", location, prefix, diag.message)
}

/// Write diagnostics in plain text format.
pub fn write_plain<W: Write>(out: &mut W, diags: &[Diagnostic], color: bool) -> io::Result<()> {
    if diags.is_empty() {
        writeln!(out, "No unused exports found.")?;
        return Ok(());
    }
    for diag in diags {
        writeln!(out, "{}", format_plain(diag, color))?;
    }
    writeln!(out, "{} unused export(s)", diags.len())
}

/// Prints diagnostics in plain text format to stdout.
pub fn print_plain(diags: &[Diagnostic], color: bool) {
    let stdout = io::stdout();
    if let Err(e) = write_plain(&mut stdout.lock(), diags, color) {
        eprintln!("[WARN] writing diagnostics failed: {}", e);
    }
}

/// Prints diagnostics in JSON format.
///
/// Falls back to a line-per-message form if serialization fails.
pub fn print_json(diags: &[Diagnostic]) {
    match serde_json::to_string_pretty(&json!({ "unused": diags })) {
        Ok(json) => println!("{}", json),
        Err(e) => {
            eprintln!("[WARN] JSON serialization failed: {}", e);
            for d in diags {
                println!("{}", d.message);
            }
        }
    }
}
