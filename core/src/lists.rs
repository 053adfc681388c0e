//! Blocklists for WordGuard
//!
//! Word and site lists are plain sets. The engine always works on the union
//! of the bundled defaults and the user's own entries.

use crate::config::ListsConfig;
use crate::error::CoreError;
use std::collections::BTreeSet;
use std::path::Path;
use tracing::{debug, warn};

/// Explicit words shipped with the crate
pub const BUNDLED_WORDS: &str = include_str!("../assets/default_words.txt");

/// Blocked sites shipped with the crate
pub const BUNDLED_SITES: &str = include_str!("../assets/default_sites.txt");

/// Split a newline-delimited list, trimming lines and skipping blanks
pub fn parse_list(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// Read a newline-delimited list file
pub fn read_list_file(path: &Path) -> Result<Vec<String>, CoreError> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| CoreError::List(format!("failed to read {}: {}", path.display(), e)))?;
    Ok(parse_list(&content))
}

/// Normalize a user-supplied word: trimmed and lowercased, `None` if blank
pub fn normalize_word(word: &str) -> Option<String> {
    let word = word.trim();
    if word.is_empty() {
        None
    } else {
        Some(word.to_lowercase())
    }
}

/// Set of lowercase explicit words
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WordList {
    words: BTreeSet<String>,
}

impl WordList {
    /// Build a list, normalizing every entry
    pub fn new<I, S>(words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            words: words
                .into_iter()
                .filter_map(|w| normalize_word(w.as_ref()))
                .collect(),
        }
    }

    /// Combine two lists into one set
    pub fn union(&self, other: &WordList) -> WordList {
        WordList {
            words: self.words.union(&other.words).cloned().collect(),
        }
    }

    pub fn contains(&self, word: &str) -> bool {
        self.words.contains(word)
    }

    pub fn iter(&self) -> impl Iterator<Item = &String> {
        self.words.iter()
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }
}

/// Set of blocked domains or URLs, compared by root domain
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SiteList {
    sites: BTreeSet<String>,
}

impl SiteList {
    /// Build a list from raw entries (trimmed, blanks dropped)
    pub fn new<I, S>(sites: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            sites: sites
                .into_iter()
                .map(|s| s.as_ref().trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
        }
    }

    /// Combine two lists into one set
    pub fn union(&self, other: &SiteList) -> SiteList {
        SiteList {
            sites: self.sites.union(&other.sites).cloned().collect(),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &String> {
        self.sites.iter()
    }

    pub fn len(&self) -> usize {
        self.sites.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sites.is_empty()
    }
}

/// Default lists, loaded once per service lifetime
#[derive(Debug, Clone, Default)]
pub struct DefaultLists {
    pub words: WordList,
    pub sites: SiteList,
}

impl DefaultLists {
    /// The lists compiled into the crate
    pub fn bundled() -> Self {
        Self {
            words: WordList::new(parse_list(BUNDLED_WORDS)),
            sites: SiteList::new(parse_list(BUNDLED_SITES)),
        }
    }

    /// Load defaults, honoring file overrides.
    ///
    /// An override that cannot be read degrades to an empty default list so
    /// filtering continues on the user's entries alone.
    pub fn load(config: &ListsConfig) -> Self {
        let words = match &config.default_words_path {
            Some(path) => load_or_empty(path, "words"),
            None => parse_list(BUNDLED_WORDS),
        };
        let sites = match &config.default_sites_path {
            Some(path) => load_or_empty(path, "sites"),
            None => parse_list(BUNDLED_SITES),
        };

        let lists = Self {
            words: WordList::new(words),
            sites: SiteList::new(sites),
        };
        debug!(
            "Loaded default lists: {} words, {} sites",
            lists.words.len(),
            lists.sites.len()
        );
        lists
    }
}

fn load_or_empty(path: &Path, kind: &str) -> Vec<String> {
    read_list_file(path).unwrap_or_else(|e| {
        warn!("Default {} list unavailable, using empty list: {}", kind, e);
        Vec::new()
    })
}
