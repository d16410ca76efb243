//! Incremental manifest cache.
//!
//! Persists, per compilation unit, the set of symbols that unit references,
//! so units that were not recompiled keep contributing their references.
//!
//! # File format
//!
//! A single JSON document under the build directory:
//!
//! ```text
//! { "metadata": { "format_version", "tool_version", "created_at", "checksum" },
//!   "units":    { "<unit>": [[owner, name, arity], ...], ... } }
//! ```
//!
//! `checksum` is the SHA-256 of the compact JSON encoding of `units`. A file
//! that fails to parse, carries another format or major tool version, or whose
//! checksum does not match is discarded and treated as an empty manifest.
//!
//! Load and save happen exactly once per session, on the session thread.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, warn};

use crate::error::{DeadexportError, DeadexportResult, IoResultExt};
use crate::identity::{ReferenceMap, SymbolIdentity, UnitId};

/// File name of the manifest inside the build directory.
pub const MANIFEST_FILE: &str = "deadexport.manifest.json";

/// Maximum manifest size (50MB); larger files are treated as corrupt.
const MAX_MANIFEST_SIZE_BYTES: u64 = 50_000_000;

/// Current manifest format version. Increment when the format changes.
const FORMAT_VERSION: u32 = 1;

/// Tool version for compatibility checking.
const TOOL_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default manifest location for a build directory.
pub fn manifest_path(build_dir: &Path) -> PathBuf {
    build_dir.join(MANIFEST_FILE)
}

/// Mapping from compilation unit to the symbols it references.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Manifest {
    units: ReferenceMap,
}

impl Manifest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_units(units: ReferenceMap) -> Self {
        Self { units }
    }

    pub fn units(&self) -> &ReferenceMap {
        &self.units
    }

    pub fn get(&self, unit: &UnitId) -> Option<&BTreeSet<SymbolIdentity>> {
        self.units.get(unit)
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Replace the entries of recompiled units with their fresh references.
    ///
    /// Every unit in `fresh_units` gets exactly `fresh[unit]` (empty if absent,
    /// e.g. its last call site was deleted). Every other unit is carried over
    /// unchanged. Entries of `fresh` outside `fresh_units` are not applied.
    pub fn merge(&self, fresh_units: &BTreeSet<UnitId>, fresh: &ReferenceMap) -> Manifest {
        let mut units = self.units.clone();
        for unit in fresh_units {
            let refs = fresh.get(unit).cloned().unwrap_or_default();
            units.insert(unit.clone(), refs);
        }

        let carried = self
            .units
            .keys()
            .filter(|u| !fresh_units.contains(*u))
            .count();
        debug!(
            replaced = fresh_units.len(),
            carried,
            "manifest merged"
        );

        Manifest { units }
    }

    /// Flattened set of every symbol referenced by any unit.
    pub fn union(&self) -> BTreeSet<SymbolIdentity> {
        self.units.values().flatten().cloned().collect()
    }
}

/// Free-function form of [`Manifest::merge`].
pub fn merge(old: &Manifest, fresh_units: &BTreeSet<UnitId>, fresh: &ReferenceMap) -> Manifest {
    old.merge(fresh_units, fresh)
}

/// Manifest metadata for version and integrity checking.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ManifestMetadata {
    pub format_version: u32,
    pub tool_version: String,
    /// RFC 3339 timestamp of the save
    #[serde(default)]
    pub created_at: String,
    /// Hex SHA-256 of the compact JSON encoding of the units
    pub checksum: String,
}

impl ManifestMetadata {
    fn for_units(units: &ReferenceMap) -> DeadexportResult<Self> {
        Ok(Self {
            format_version: FORMAT_VERSION,
            tool_version: TOOL_VERSION.to_string(),
            created_at: Utc::now().to_rfc3339(),
            checksum: units_checksum(units)?,
        })
    }

    /// Check if this manifest was written by a compatible version.
    pub fn is_compatible(&self) -> bool {
        if self.format_version != FORMAT_VERSION {
            return false;
        }

        let current_major = TOOL_VERSION.split('.').next().unwrap_or("0");
        let cached_major = self.tool_version.split('.').next().unwrap_or("0");

        current_major == cached_major
    }
}

/// On-disk representation.
#[derive(Debug, Serialize, Deserialize)]
struct ManifestFile {
    metadata: ManifestMetadata,
    units: ReferenceMap,
}

fn units_checksum(units: &ReferenceMap) -> DeadexportResult<String> {
    let canonical = serde_json::to_vec(units)
        .map_err(|e| DeadexportError::cache(format!("manifest encoding failed: {}", e)))?;
    let mut sha = Sha256::new();
    sha.update(&canonical);
    Ok(format!("{:x}", sha.finalize()))
}

/// Read and validate the manifest. `Ok(None)` means no file.
fn read_manifest(path: &Path) -> DeadexportResult<Option<Manifest>> {
    let meta = match fs::metadata(path) {
        Ok(m) => m,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(DeadexportError::io(path, e)),
    };
    if meta.len() > MAX_MANIFEST_SIZE_BYTES {
        return Err(DeadexportError::cache(format!(
            "manifest exceeds {}MB limit",
            MAX_MANIFEST_SIZE_BYTES / 1_000_000
        )));
    }

    let text = fs::read_to_string(path).with_path(path)?;
    let file: ManifestFile = serde_json::from_str(&text)
        .map_err(|e| DeadexportError::cache(format!("malformed manifest: {}", e)))?;

    if !file.metadata.is_compatible() {
        return Err(DeadexportError::cache(format!(
            "manifest version mismatch (manifest: v{} {}, current: v{} {})",
            file.metadata.format_version, file.metadata.tool_version, FORMAT_VERSION, TOOL_VERSION
        )));
    }
    if units_checksum(&file.units)? != file.metadata.checksum {
        return Err(DeadexportError::cache("manifest checksum mismatch"));
    }

    Ok(Some(Manifest::from_units(file.units)))
}

/// Load the manifest at `path`.
///
/// Never fails: a missing, unreadable, corrupt or incompatible manifest yields
/// an empty one so the session can proceed with a full trace.
pub fn load_manifest(path: &Path) -> Manifest {
    match read_manifest(path) {
        Ok(Some(manifest)) => {
            debug!(path = %path.display(), units = manifest.len(), "manifest loaded");
            manifest
        }
        Ok(None) => {
            debug!(path = %path.display(), "no manifest, starting empty");
            Manifest::new()
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "discarding unusable manifest");
            Manifest::new()
        }
    }
}

/// Save the manifest to `path`.
///
/// Uses atomic write pattern (temp file in the same directory + rename) so an
/// interrupted save leaves the previous manifest intact.
pub fn save_manifest(path: &Path, manifest: &Manifest) -> DeadexportResult<()> {
    let dir = match path.parent() {
        Some(d) if !d.as_os_str().is_empty() => d.to_path_buf(),
        _ => PathBuf::from("."),
    };
    if !dir.exists() {
        fs::create_dir_all(&dir).with_path(&dir)?;
    }

    let file = ManifestFile {
        metadata: ManifestMetadata::for_units(&manifest.units)?,
        units: manifest.units.clone(),
    };
    let json = serde_json::to_string_pretty(&file)
        .map_err(|e| DeadexportError::cache(format!("manifest encoding failed: {}", e)))?;

    // PID + nanosecond timestamp keeps concurrent savers off each other's temp file
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| MANIFEST_FILE.to_string());
    let temp_path = dir.join(format!("{}.{}.{}.tmp", file_name, std::process::id(), nanos));

    fs::write(&temp_path, &json).with_path(&temp_path)?;

    if let Err(e) = fs::rename(&temp_path, path) {
        let _ = fs::remove_file(&temp_path);
        return Err(DeadexportError::io(path, e));
    }

    debug!(path = %path.display(), units = manifest.len(), "manifest saved");
    Ok(())
}

/// Delete the manifest. Deleting a missing manifest succeeds.
pub fn clean_manifest(path: &Path) -> DeadexportResult<()> {
    match fs::remove_file(path) {
        Ok(()) => {
            debug!(path = %path.display(), "manifest removed");
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(DeadexportError::io(path, e)),
    }
}
