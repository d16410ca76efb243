//! Ignore rules over symbol identities.
//!
//! Rules are written either as a shorthand string `owner[:name[/arity]]` or as
//! a table `{ owner, name?, arity? }`. Any field may be the wildcard `_`;
//! omitted fields are wildcards. A symbol is ignored if any rule matches it.
//!
//! The shorthand cannot express owners or names containing `:` or `/` (an
//! atom owner like `:crypto`, an operator like `//`). Use the table form for
//! those. Unknown table keys are rejected.

use regex::Regex;
use serde::Deserialize;
use std::fmt;
use std::sync::OnceLock;

use crate::error::{DeadexportError, DeadexportResult};
use crate::identity::SymbolIdentity;

/// Wildcard token accepted in every rule position.
pub const WILDCARD: &str = "_";

fn shorthand_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(?P<owner>[^\s:/]+)(?::(?P<name>[^\s:/]+)(?:/(?P<arity>[^\s:/]+))?)?$")
            .expect("shorthand regex is valid")
    })
}

/// One position of a rule: exact value or wildcard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldPattern<T> {
    Any,
    Exact(T),
}

impl<T: PartialEq> FieldPattern<T> {
    pub fn matches(&self, value: &T) -> bool {
        match self {
            Self::Any => true,
            Self::Exact(expected) => expected == value,
        }
    }
}

impl<T: fmt::Display> fmt::Display for FieldPattern<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Any => f.write_str(WILDCARD),
            Self::Exact(v) => write!(f, "{}", v),
        }
    }
}

/// Arity as written in a table rule: a number or `"_"`.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum ArityEntry {
    Exact(u32),
    Token(String),
}

/// A rule as it appears in configuration, before validation.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum IgnoreEntry {
    Shorthand(String),
    Table(TableEntry),
}

/// Table form of a rule: `{ owner, name?, arity? }`.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct TableEntry {
    pub owner: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub arity: Option<ArityEntry>,
}

impl fmt::Display for IgnoreEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Shorthand(s) => f.write_str(s),
            Self::Table(TableEntry { owner, name, arity }) => {
                write!(f, "{{ owner = {:?}", owner)?;
                if let Some(name) = name {
                    write!(f, ", name = {:?}", name)?;
                }
                match arity {
                    Some(ArityEntry::Exact(n)) => write!(f, ", arity = {}", n)?,
                    Some(ArityEntry::Token(t)) => write!(f, ", arity = {:?}", t)?,
                    None => {}
                }
                f.write_str(" }")
            }
        }
    }
}

impl From<&str> for IgnoreEntry {
    fn from(s: &str) -> Self {
        Self::Shorthand(s.to_string())
    }
}

/// A validated ignore rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IgnoreRule {
    pub owner: FieldPattern<String>,
    pub name: FieldPattern<String>,
    pub arity: FieldPattern<u32>,
}

impl IgnoreRule {
    /// Rule matching exactly one identity.
    pub fn exact(owner: impl Into<String>, name: impl Into<String>, arity: u32) -> Self {
        Self {
            owner: FieldPattern::Exact(owner.into()),
            name: FieldPattern::Exact(name.into()),
            arity: FieldPattern::Exact(arity),
        }
    }

    /// Rule matching every arity of `owner.name`.
    pub fn function(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner: FieldPattern::Exact(owner.into()),
            name: FieldPattern::Exact(name.into()),
            arity: FieldPattern::Any,
        }
    }

    /// Rule matching every symbol of `owner`.
    pub fn owner(owner: impl Into<String>) -> Self {
        Self {
            owner: FieldPattern::Exact(owner.into()),
            name: FieldPattern::Any,
            arity: FieldPattern::Any,
        }
    }

    pub fn matches(&self, identity: &SymbolIdentity) -> bool {
        self.owner.matches(&identity.owner)
            && self.name.matches(&identity.name)
            && self.arity.matches(&identity.arity)
    }

    /// Validate one configuration entry.
    pub fn parse(entry: &IgnoreEntry) -> Result<Self, String> {
        match entry {
            IgnoreEntry::Shorthand(text) => {
                let caps = shorthand_regex()
                    .captures(text)
                    .ok_or_else(|| "expected `owner[:name[/arity]]`".to_string())?;
                let owner = text_field(caps.name("owner").map(|m| m.as_str()));
                let name = text_field(caps.name("name").map(|m| m.as_str()));
                let arity = match caps.name("arity").map(|m| m.as_str()) {
                    None => FieldPattern::Any,
                    Some(token) => arity_token(token)?,
                };
                Ok(Self { owner, name, arity })
            }
            IgnoreEntry::Table(TableEntry { owner, name, arity }) => {
                let owner = table_text(owner, "owner")?;
                let name = match name {
                    Some(n) => table_text(n, "name")?,
                    None => FieldPattern::Any,
                };
                let arity = match arity {
                    None => FieldPattern::Any,
                    Some(ArityEntry::Exact(n)) => FieldPattern::Exact(*n),
                    Some(ArityEntry::Token(t)) => arity_token(t)?,
                };
                Ok(Self { owner, name, arity })
            }
        }
    }
}

impl fmt::Display for IgnoreRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}/{}", self.owner, self.name, self.arity)
    }
}

fn text_field(value: Option<&str>) -> FieldPattern<String> {
    match value {
        None | Some(WILDCARD) => FieldPattern::Any,
        Some(v) => FieldPattern::Exact(v.to_string()),
    }
}

fn table_text(value: &str, field: &str) -> Result<FieldPattern<String>, String> {
    if value.is_empty() || value.chars().any(char::is_whitespace) {
        return Err(format!("`{}` must be a non-empty name without whitespace", field));
    }
    Ok(text_field(Some(value)))
}

fn arity_token(token: &str) -> Result<FieldPattern<u32>, String> {
    if token == WILDCARD {
        return Ok(FieldPattern::Any);
    }
    token
        .parse::<u32>()
        .map(FieldPattern::Exact)
        .map_err(|_| format!("arity `{}` is not a non-negative integer or `_`", token))
}

/// Compiled set of ignore rules.
#[derive(Debug, Clone, Default)]
pub struct IgnoreMatcher {
    rules: Vec<IgnoreRule>,
}

impl IgnoreMatcher {
    /// Matcher that ignores nothing.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_rules(rules: Vec<IgnoreRule>) -> Self {
        Self { rules }
    }

    /// Validate and compile configured entries.
    ///
    /// The first malformed entry fails the whole list; nothing is skipped.
    pub fn compile(entries: &[IgnoreEntry]) -> DeadexportResult<Self> {
        let rules = entries
            .iter()
            .enumerate()
            .map(|(index, entry)| {
                IgnoreRule::parse(entry).map_err(|message| {
                    DeadexportError::invalid_argument(format!(
                        "ignore rule #{} `{}`: {}",
                        index, entry, message
                    ))
                })
            })
            .collect::<DeadexportResult<Vec<_>>>()?;
        Ok(Self { rules })
    }

    /// True iff some rule matches every field of `identity`.
    pub fn matches(&self, identity: &SymbolIdentity) -> bool {
        self.rules.iter().any(|r| r.matches(identity))
    }

    pub fn rules(&self) -> &[IgnoreRule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compile(entries: &[&str]) -> DeadexportResult<IgnoreMatcher> {
        let entries: Vec<IgnoreEntry> = entries.iter().map(|e| IgnoreEntry::from(*e)).collect();
        IgnoreMatcher::compile(&entries)
    }

    fn id(owner: &str, name: &str, arity: u32) -> SymbolIdentity {
        SymbolIdentity::new(owner, name, arity)
    }

    #[test]
    fn test_owner_rule_suppresses_everything_of_owner() {
        let m = compile(&["MyApp.Repo"]).unwrap();
        assert!(m.matches(&id("MyApp.Repo", "all", 1)));
        assert!(m.matches(&id("MyApp.Repo", "get", 3)));
        assert!(!m.matches(&id("MyApp.Other", "all", 1)));
        assert!(!m.matches(&id("MyApp.Repo.Sub", "all", 1)));
    }

    #[test]
    fn test_owner_name_rule_suppresses_every_arity() {
        let m = compile(&["MyApp.Web:call"]).unwrap();
        assert!(m.matches(&id("MyApp.Web", "call", 0)));
        assert!(m.matches(&id("MyApp.Web", "call", 2)));
        assert!(!m.matches(&id("MyApp.Web", "init", 1)));
    }

    #[test]
    fn test_full_triple_is_exact() {
        let m = compile(&["MyApp.Web:init/1"]).unwrap();
        assert!(m.matches(&id("MyApp.Web", "init", 1)));
        assert!(!m.matches(&id("MyApp.Web", "init", 2)));
    }

    #[test]
    fn test_explicit_wildcards() {
        let m = compile(&["_:child_spec/1", "M:_/_"]).unwrap();
        assert!(m.matches(&id("Any.Owner", "child_spec", 1)));
        assert!(!m.matches(&id("Any.Owner", "child_spec", 0)));
        assert!(m.matches(&id("M", "whatever", 7)));
    }

    #[test]
    fn test_rules_are_or_combined() {
        let m = compile(&["A:f/0", "B"]).unwrap();
        assert!(m.matches(&id("A", "f", 0)));
        assert!(m.matches(&id("B", "g", 4)));
        assert!(!m.matches(&id("A", "g", 0)));
        assert_eq!(m.len(), 2);
    }

    #[test]
    fn test_empty_matcher_matches_nothing() {
        let m = IgnoreMatcher::empty();
        assert!(m.is_empty());
        assert!(!m.matches(&id("M", "a", 0)));
    }

    #[test]
    fn test_malformed_shorthand_rejected() {
        for bad in ["", "M:", "M:f/", "M:f/x", "M:f/-1", "M f", "M:f:g", "M:f/1/2", ":f"] {
            let err = compile(&["Ok.Owner", bad]).unwrap_err();
            let msg = err.to_string();
            assert!(msg.contains("#1"), "{} -> {}", bad, msg);
            assert!(matches!(err, DeadexportError::InvalidArgument { .. }));
        }
    }

    #[test]
    fn test_table_entries() {
        let entries: Vec<IgnoreEntry> = serde_json::from_str(
            r#"[
                {"owner": "MyApp.Cli", "name": "main", "arity": 1},
                {"owner": "MyApp.Job", "arity": "_"},
                {"owner": "_", "name": "start_link"}
            ]"#,
        )
        .unwrap();
        let m = IgnoreMatcher::compile(&entries).unwrap();

        assert!(m.matches(&id("MyApp.Cli", "main", 1)));
        assert!(!m.matches(&id("MyApp.Cli", "main", 0)));
        assert!(m.matches(&id("MyApp.Job", "perform", 2)));
        assert!(m.matches(&id("X", "start_link", 3)));
    }

    #[test]
    fn test_table_entry_rejects_bad_arity() {
        let entries = vec![IgnoreEntry::Table(TableEntry {
            owner: "M".into(),
            name: None,
            arity: Some(ArityEntry::Token("two".into())),
        })];
        assert!(IgnoreMatcher::compile(&entries).is_err());
    }

    #[test]
    fn test_table_entry_expresses_separator_names() {
        assert!(compile(&[":crypto:hash/2"]).is_err());

        let entries = vec![
            IgnoreEntry::Table(TableEntry {
                owner: ":crypto".into(),
                name: Some("hash".into()),
                arity: Some(ArityEntry::Exact(2)),
            }),
            IgnoreEntry::Table(TableEntry {
                owner: "Kernel".into(),
                name: Some("//".into()),
                arity: None,
            }),
        ];
        let m = IgnoreMatcher::compile(&entries).unwrap();
        assert!(m.matches(&id(":crypto", "hash", 2)));
        assert!(m.matches(&id("Kernel", "//", 2)));
        assert!(!m.matches(&id(":crypto", "hash", 1)));
    }

    #[test]
    fn test_rule_constructors_match_shorthand() {
        assert_eq!(IgnoreRule::parse(&"M".into()).unwrap(), IgnoreRule::owner("M"));
        assert_eq!(IgnoreRule::parse(&"M:f".into()).unwrap(), IgnoreRule::function("M", "f"));
        assert_eq!(IgnoreRule::parse(&"M:f/2".into()).unwrap(), IgnoreRule::exact("M", "f", 2));
        assert_eq!(IgnoreRule::exact("M", "f", 2).to_string(), "M:f/2");
        assert_eq!(IgnoreRule::owner("M").to_string(), "M:_/_");
    }
}
