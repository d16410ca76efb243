//! Unused export detection.

use std::collections::BTreeSet;

use crate::identity::{ExportedSymbol, SymbolIdentity};
use crate::ignore::IgnoreMatcher;

/// Finds exported symbols that are neither referenced nor ignored.
///
/// Output is sorted by identity (owner, name, arity) and holds each identity
/// once, so repeated runs on the same input produce the same sequence.
pub fn compute_unused<'a, I>(
    exported: I,
    referenced: &BTreeSet<SymbolIdentity>,
    ignore: &IgnoreMatcher,
) -> Vec<&'a ExportedSymbol>
where
    I: IntoIterator<Item = &'a ExportedSymbol>,
{
    let mut unused: Vec<&ExportedSymbol> = exported
        .into_iter()
        .filter(|s| !referenced.contains(&s.identity))
        .filter(|s| !ignore.matches(&s.identity))
        .collect();

    // Location breaks ties so duplicates collapse to a stable pick
    unused.sort_by(|a, b| {
        a.identity
            .cmp(&b.identity)
            .then_with(|| a.source_file.cmp(&b.source_file))
            .then_with(|| a.source_line.cmp(&b.source_line))
    });
    unused.dedup_by(|a, b| a.identity == b.identity);
    unused
}
