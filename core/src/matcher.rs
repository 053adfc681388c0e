//! Match engine for explicit words
//!
//! Matching is case-insensitive and respects word boundaries: a list word
//! only matches when it stands on its own, never as part of a longer token.

use crate::lists::WordList;
use regex::Regex;
use std::collections::BTreeMap;
use tracing::warn;

/// Compiled whole-word matcher over one list snapshot
#[derive(Debug, Clone)]
pub struct WordMatcher {
    patterns: Vec<WordPattern>,
}

impl WordMatcher {
    /// Compile a matcher for every word in the list
    pub fn new(words: &WordList) -> Self {
        let patterns = words
            .iter()
            .filter_map(|word| match WordPattern::new(word) {
                Ok(pattern) => Some(pattern),
                Err(e) => {
                    warn!("Skipping unmatchable word '{}': {}", word, e);
                    None
                }
            })
            .collect();
        Self { patterns }
    }

    /// Number of words the matcher looks for
    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// True if any list word appears as a whole word in `text`
    pub fn contains_explicit_words(&self, text: &str) -> bool {
        let text = text.to_lowercase();
        self.patterns.iter().any(|p| p.occurrences(&text) > 0)
    }

    /// List words present in `text`, sorted
    pub fn matched_words(&self, text: &str) -> Vec<String> {
        let text = text.to_lowercase();
        self.patterns
            .iter()
            .filter(|p| p.occurrences(&text) > 0)
            .map(|p| p.word.clone())
            .collect()
    }

    /// Count non-overlapping whole-word occurrences per list word.
    ///
    /// Words that do not occur are left out of the map.
    pub fn word_frequencies(&self, text: &str) -> BTreeMap<String, usize> {
        let text = text.to_lowercase();
        self.patterns
            .iter()
            .filter_map(|p| {
                let count = p.occurrences(&text);
                (count > 0).then(|| (p.word.clone(), count))
            })
            .collect()
    }

    /// The most frequent word whose count reaches `threshold`
    pub fn over_threshold(&self, text: &str, threshold: usize) -> Option<(String, usize)> {
        self.word_frequencies(text)
            .into_iter()
            .filter(|(_, count)| *count >= threshold.max(1))
            .max_by(|a, b| a.1.cmp(&b.1).then_with(|| b.0.cmp(&a.0)))
    }
}

/// One list word and its compiled regex.
///
/// Word-character edges use `\b`. `\b` next to punctuation would demand a
/// word character on the other side, so punctuation edges are checked by
/// hand instead: the neighbouring character must be a non-word character
/// or the end of the text.
#[derive(Debug, Clone)]
struct WordPattern {
    word: String,
    regex: Regex,
    guard_start: bool,
    guard_end: bool,
}

impl WordPattern {
    fn new(word: &str) -> Result<Self, regex::Error> {
        let leading = word.chars().next().is_some_and(is_word_char);
        let trailing = word.chars().last().is_some_and(is_word_char);
        let regex = Regex::new(&format!(
            "{}{}{}",
            if leading { r"\b" } else { "" },
            regex::escape(word),
            if trailing { r"\b" } else { "" }
        ))?;
        Ok(Self {
            word: word.to_string(),
            regex,
            guard_start: !leading,
            guard_end: !trailing,
        })
    }

    fn occurrences(&self, text: &str) -> usize {
        let mut count = 0;
        let mut at = 0;
        while at <= text.len() {
            let Some(m) = self.regex.find_at(text, at) else {
                break;
            };
            if self.bounded(text, m.start(), m.end()) {
                count += 1;
                at = m.end().max(m.start() + 1);
            } else {
                // Retry one character further in case a shifted match is bounded
                let step = text[m.start()..].chars().next().map_or(1, char::len_utf8);
                at = m.start() + step;
            }
        }
        count
    }

    fn bounded(&self, text: &str, start: usize, end: usize) -> bool {
        let before = text[..start].chars().next_back();
        let after = text[end..].chars().next();
        (!self.guard_start || !before.is_some_and(is_word_char))
            && (!self.guard_end || !after.is_some_and(is_word_char))
    }
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}
