//! Backup name patterns
//!
//! Builds the regular expression used by `list` from an optional exact
//! filename, pseudo-folder and prefix/suffix fragments. Fragments are inserted
//! verbatim, so callers may use regular expression syntax inside them.
//!
//! In [`MatchMode::Search`] the expression may match anywhere in an object
//! name and the reported filename is the matched span, which can be a
//! substring of the full name. [`MatchMode::Full`] only accepts names the
//! expression matches from start to end.
//!
//! An empty pattern is the one departure from plain regex search: it matches
//! every name and reports the whole name in both modes, where a regex search
//! would report an empty span. An empty filename cannot identify a backup.

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// How a compiled pattern is applied to object names
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchMode {
    /// Unanchored search, reporting the matched span
    #[default]
    Search,
    /// The whole object name must match
    Full,
}

fn non_empty(s: Option<&str>) -> Option<&str> {
    s.filter(|v| !v.is_empty())
}

/// Normalize a pseudo-folder: trailing `/` are dropped, and a folder made only
/// of separators counts as no folder at all.
pub fn normalize_folder(folder: Option<&str>) -> Option<&str> {
    non_empty(folder.map(|f| f.trim_end_matches('/')))
}

/// Prefix/suffix part of a pattern, `None` when neither is set
fn fuzzy_fragment(prefix: Option<&str>, suffix: Option<&str>) -> Option<String> {
    match (prefix, suffix) {
        (Some(p), Some(s)) => Some(format!("{p}.*{s}")),
        (Some(p), None) => Some(format!("{p}.*")),
        (None, Some(s)) => Some(format!(".*{s}")),
        (None, None) => None,
    }
}

/// Build the name pattern for a backup lookup
///
/// Empty strings are treated like absent values. A filename always wins over
/// prefix/suffix; a pseudo-folder roots whatever follows it.
pub fn build_pattern(
    filename: Option<&str>,
    pseudo_folder: Option<&str>,
    prefix: Option<&str>,
    suffix: Option<&str>,
) -> String {
    let filename = non_empty(filename);
    let folder = normalize_folder(pseudo_folder);
    let fuzzy = fuzzy_fragment(non_empty(prefix), non_empty(suffix));

    match (folder, filename) {
        (Some(folder), Some(filename)) => format!("{folder}/{filename}"),
        (Some(folder), None) => match fuzzy {
            Some(rest) => format!("{folder}/{rest}"),
            None => folder.to_string(),
        },
        (None, Some(filename)) => filename.to_string(),
        (None, None) => fuzzy.unwrap_or_default(),
    }
}

/// A compiled name pattern
#[derive(Debug, Clone)]
pub struct NamePattern {
    source: String,
    regex: Regex,
    mode: MatchMode,
}

impl NamePattern {
    /// Compile a pattern string produced by [`build_pattern`]
    pub fn compile(pattern: &str, mode: MatchMode) -> Result<Self> {
        let regex = match mode {
            MatchMode::Search => Regex::new(pattern)?,
            MatchMode::Full => Regex::new(&format!("^(?:{pattern})$"))?,
        };
        Ok(Self {
            source: pattern.to_string(),
            regex,
            mode,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn mode(&self) -> MatchMode {
        self.mode
    }

    /// Return the part of `name` this pattern reports, if it matches at all
    ///
    /// An empty pattern reports all of `name`, not the empty match.
    pub fn find<'a>(&self, name: &'a str) -> Option<&'a str> {
        if self.source.is_empty() {
            return Some(name);
        }
        self.regex.find(name).map(|m| m.as_str())
    }

    pub fn is_match(&self, name: &str) -> bool {
        self.find(name).is_some()
    }
}
