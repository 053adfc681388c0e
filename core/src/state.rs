//! Persistent filter state
//!
//! User lists, recipients, the block state and the heartbeat timestamp are
//! read and written as whole snapshots; the last write wins.

use crate::error::{CoreError, StorageError};
use crate::lists::{normalize_word, SiteList, WordList};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Mutex;

/// Names of the persisted string sets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SetKey {
    UserWords,
    UserSites,
    Recipients,
}

impl SetKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            SetKey::UserWords => "user_words",
            SetKey::UserSites => "user_sites",
            SetKey::Recipients => "recipients",
        }
    }

    /// Normalize an entry for this set, `None` if blank.
    ///
    /// Words are lowercased; sites and recipients are only trimmed.
    pub fn normalize(&self, value: &str) -> Option<String> {
        match self {
            SetKey::UserWords => normalize_word(value),
            SetKey::UserSites | SetKey::Recipients => {
                let value = value.trim();
                (!value.is_empty()).then(|| value.to_string())
            }
        }
    }
}

/// App-level block written when the frequency threshold is crossed
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockState {
    /// Epoch millis at which the block lapses
    pub block_end_time: i64,
    /// Package under block
    pub package: Option<String>,
}

impl BlockState {
    pub fn new(package: impl Into<String>, block_end_time: i64) -> Self {
        Self {
            block_end_time,
            package: Some(package.into()),
        }
    }

    /// Blocked while `now < block_end_time`
    pub fn is_active(&self, now_ms: i64) -> bool {
        self.package.is_some() && now_ms < self.block_end_time
    }

    /// Whether `package` is under an active block at `now_ms`
    pub fn blocks(&self, package: &str, now_ms: i64) -> bool {
        self.is_active(now_ms) && self.package.as_deref() == Some(package)
    }
}

/// Storage the filter reads its lists and state from
pub trait StateStore: Send + Sync {
    fn load_set(&self, key: SetKey) -> Result<BTreeSet<String>, CoreError>;
    /// Replace the whole set
    fn save_set(&self, key: SetKey, values: &BTreeSet<String>) -> Result<(), CoreError>;
    fn load_block_state(&self) -> Result<BlockState, CoreError>;
    fn save_block_state(&self, state: &BlockState) -> Result<(), CoreError>;
    /// Epoch millis of the last heartbeat, 0 if never recorded
    fn load_last_run(&self) -> Result<i64, CoreError>;
    fn save_last_run(&self, epoch_ms: i64) -> Result<(), CoreError>;

    fn user_words(&self) -> Result<WordList, CoreError> {
        Ok(WordList::new(self.load_set(SetKey::UserWords)?))
    }

    fn user_sites(&self) -> Result<SiteList, CoreError> {
        Ok(SiteList::new(self.load_set(SetKey::UserSites)?))
    }

    fn recipients(&self) -> Result<Vec<String>, CoreError> {
        Ok(self.load_set(SetKey::Recipients)?.into_iter().collect())
    }

    /// Add one entry; returns false if it was blank or already present
    fn add_entry(&self, key: SetKey, value: &str) -> Result<bool, CoreError> {
        let Some(value) = key.normalize(value) else {
            return Ok(false);
        };
        let mut set = self.load_set(key)?;
        if !set.insert(value) {
            return Ok(false);
        }
        self.save_set(key, &set)?;
        Ok(true)
    }

    /// Remove one entry; returns false if it was not present
    fn remove_entry(&self, key: SetKey, value: &str) -> Result<bool, CoreError> {
        let Some(value) = key.normalize(value) else {
            return Ok(false);
        };
        let mut set = self.load_set(key)?;
        if !set.remove(&value) {
            return Ok(false);
        }
        self.save_set(key, &set)?;
        Ok(true)
    }
}

#[derive(Debug, Default)]
struct MemoryState {
    sets: std::collections::HashMap<SetKey, BTreeSet<String>>,
    block: BlockState,
    last_run: i64,
}

/// Volatile store, for tests and one-off runs
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store preloaded with user words
    pub fn with_words<I, S>(words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let store = Self::new();
        if let Ok(mut state) = store.state.lock() {
            state
                .sets
                .insert(SetKey::UserWords, words.into_iter().map(Into::into).collect());
        }
        store
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, MemoryState>, CoreError> {
        self.state
            .lock()
            .map_err(|_| CoreError::Storage(StorageError::Poisoned))
    }
}

impl StateStore for MemoryStore {
    fn load_set(&self, key: SetKey) -> Result<BTreeSet<String>, CoreError> {
        Ok(self.lock()?.sets.get(&key).cloned().unwrap_or_default())
    }

    fn save_set(&self, key: SetKey, values: &BTreeSet<String>) -> Result<(), CoreError> {
        self.lock()?.sets.insert(key, values.clone());
        Ok(())
    }

    fn load_block_state(&self) -> Result<BlockState, CoreError> {
        Ok(self.lock()?.block.clone())
    }

    fn save_block_state(&self, state: &BlockState) -> Result<(), CoreError> {
        self.lock()?.block = state.clone();
        Ok(())
    }

    fn load_last_run(&self) -> Result<i64, CoreError> {
        Ok(self.lock()?.last_run)
    }

    fn save_last_run(&self, epoch_ms: i64) -> Result<(), CoreError> {
        self.lock()?.last_run = epoch_ms;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_state_activity() {
        let state = BlockState::new("com.browser", 1_000);
        assert!(state.is_active(999));
        assert!(!state.is_active(1_000));
        assert!(state.blocks("com.browser", 500));
        assert!(!state.blocks("com.other", 500));
        assert!(!BlockState::default().is_active(0));
    }

    #[test]
    fn test_memory_store_sets_replace_whole() {
        let store = MemoryStore::new();
        let first: BTreeSet<String> = ["a", "b"].iter().map(|s| s.to_string()).collect();
        let second: BTreeSet<String> = ["c"].iter().map(|s| s.to_string()).collect();

        store.save_set(SetKey::UserSites, &first).unwrap();
        store.save_set(SetKey::UserSites, &second).unwrap();
        assert_eq!(store.load_set(SetKey::UserSites).unwrap(), second);
        assert!(store.load_set(SetKey::UserWords).unwrap().is_empty());
    }

    #[test]
    fn test_memory_store_block_and_heartbeat() {
        let store = MemoryStore::new();
        assert_eq!(store.load_block_state().unwrap(), BlockState::default());
        assert_eq!(store.load_last_run().unwrap(), 0);

        let state = BlockState::new("com.app", 42);
        store.save_block_state(&state).unwrap();
        store.save_last_run(7).unwrap();
        assert_eq!(store.load_block_state().unwrap(), state);
        assert_eq!(store.load_last_run().unwrap(), 7);
    }

    #[test]
    fn test_with_words_normalized_on_read() {
        let store = MemoryStore::with_words(["Hello", "  "]);
        let words = store.user_words().unwrap();
        assert_eq!(words.len(), 1);
        assert!(words.contains("hello"));
    }

    #[test]
    fn test_add_and_remove_entries() {
        let store = MemoryStore::new();
        assert!(store.add_entry(SetKey::UserWords, "  Forbidden ").unwrap());
        assert!(!store.add_entry(SetKey::UserWords, "forbidden").unwrap());
        assert!(!store.add_entry(SetKey::UserWords, "   ").unwrap());
        assert!(store.user_words().unwrap().contains("forbidden"));

        assert!(store.add_entry(SetKey::UserSites, " Example.com ").unwrap());
        assert_eq!(
            store.load_set(SetKey::UserSites).unwrap().into_iter().collect::<Vec<_>>(),
            vec!["Example.com"]
        );

        assert!(store.remove_entry(SetKey::UserWords, "FORBIDDEN").unwrap());
        assert!(!store.remove_entry(SetKey::UserWords, "forbidden").unwrap());
        assert!(store.user_words().unwrap().is_empty());
    }

    #[test]
    fn test_set_key_names() {
        assert_eq!(SetKey::UserWords.as_str(), "user_words");
        assert_eq!(SetKey::UserSites.as_str(), "user_sites");
        assert_eq!(SetKey::Recipients.as_str(), "recipients");
    }
}
