//! FFI module for UniFFI Kotlin/Swift bindings
//!
//! The platform accessibility shell keeps the UI plumbing and calls into the
//! engine for matching, list management and block decisions.

use crate::config::Config;
use crate::error::CoreError;
use crate::event::{Event, Severity};
use crate::lists::{DefaultLists, WordList};
use crate::matcher::WordMatcher;
use crate::monitor::ServiceMonitor;
use crate::notify::NotificationKind;
use crate::policy::{BlockPolicy, Clock, Decision, Matchers, Reason, SystemClock};
use crate::sqlite_storage::SqliteStore;
use crate::state::{MemoryStore, SetKey, StateStore};
use std::io::BufRead;
use std::path::PathBuf;
use std::sync::Arc;

// ─── FFI Enum Types ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, uniffi::Enum)]
pub enum FfiSeverity {
    Info,
    Warning,
    Block,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, uniffi::Enum)]
pub enum FfiListKind {
    Words,
    Sites,
    Recipients,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, uniffi::Enum)]
pub enum FfiNotificationKind {
    ContentBlocked,
    AccessibilityOff,
    AppForceStopped,
}

#[derive(Debug, Clone, PartialEq, Eq, uniffi::Enum)]
pub enum FfiDecision {
    Allow,
    ActiveBlock {
        expires_at_ms: i64,
    },
    FrequencyBlock {
        word: String,
        count: u32,
        expires_at_ms: i64,
    },
    Words {
        words: Vec<String>,
    },
    Site {
        url: String,
        root: String,
    },
}

// ─── FFI Record Types ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, uniffi::Record)]
pub struct FfiWordCount {
    pub word: String,
    pub count: u32,
}

#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiEvent {
    pub id: String,
    pub timestamp_ms: i64,
    pub timestamp_str: String,
    pub kind: String,
    pub package: String,
    pub severity: FfiSeverity,
    pub alert: bool,
    pub details_json: String,
}

#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiFilterConfig {
    pub own_package: String,
    pub text_debounce_ms: u64,
    pub content_debounce_ms: u64,
    pub frequency_threshold: u32,
    pub block_duration_secs: u64,
    pub back_attempts: u32,
    pub back_pacing_ms: u64,
    pub notify_enabled: bool,
}

#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiBlockState {
    pub package: Option<String>,
    pub block_end_time: i64,
    pub active: bool,
}

// ─── FFI Error Type ───────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error, uniffi::Error)]
pub enum FfiError {
    #[error("Config error: {message}")]
    Config { message: String },
    #[error("Storage error: {message}")]
    Storage { message: String },
    #[error("IO error: {message}")]
    Io { message: String },
    #[error("{message}")]
    Other { message: String },
}

// ─── From Conversions ─────────────────────────────────────────────────────────

impl From<Severity> for FfiSeverity {
    fn from(severity: Severity) -> Self {
        match severity {
            Severity::Info => FfiSeverity::Info,
            Severity::Warning => FfiSeverity::Warning,
            Severity::Block => FfiSeverity::Block,
        }
    }
}

impl From<FfiListKind> for SetKey {
    fn from(kind: FfiListKind) -> Self {
        match kind {
            FfiListKind::Words => SetKey::UserWords,
            FfiListKind::Sites => SetKey::UserSites,
            FfiListKind::Recipients => SetKey::Recipients,
        }
    }
}

impl From<NotificationKind> for FfiNotificationKind {
    fn from(kind: NotificationKind) -> Self {
        match kind {
            NotificationKind::ContentBlocked => FfiNotificationKind::ContentBlocked,
            NotificationKind::AccessibilityOff => FfiNotificationKind::AccessibilityOff,
            NotificationKind::AppForceStopped => FfiNotificationKind::AppForceStopped,
        }
    }
}

impl From<Decision> for FfiDecision {
    fn from(decision: Decision) -> Self {
        match decision {
            Decision::Allow => FfiDecision::Allow,
            Decision::Enforce(Reason::ActiveBlock { expires_at_ms }) => {
                FfiDecision::ActiveBlock { expires_at_ms }
            }
            Decision::Enforce(Reason::Frequency {
                word,
                count,
                expires_at_ms,
            }) => FfiDecision::FrequencyBlock {
                word,
                count: saturating_u32(count),
                expires_at_ms,
            },
            Decision::Enforce(Reason::Words { words }) => FfiDecision::Words { words },
            Decision::Enforce(Reason::Site { url, root }) => FfiDecision::Site { url, root },
        }
    }
}

impl From<Event> for FfiEvent {
    fn from(event: Event) -> Self {
        let details = serde_json::to_value(&event.event_type).unwrap_or_default();
        let kind = details
            .get("type")
            .and_then(|t| t.as_str())
            .unwrap_or_default()
            .to_string();
        FfiEvent {
            id: event.id.to_string(),
            timestamp_ms: event.timestamp.timestamp_millis(),
            timestamp_str: event.timestamp.to_rfc3339(),
            kind,
            package: event.package,
            severity: event.severity.into(),
            alert: event.alert,
            details_json: details.to_string(),
        }
    }
}

impl From<Config> for FfiFilterConfig {
    fn from(config: Config) -> Self {
        FfiFilterConfig {
            own_package: config.general.own_package,
            text_debounce_ms: config.filter.text_debounce_ms,
            content_debounce_ms: config.filter.content_debounce_ms,
            frequency_threshold: saturating_u32(config.filter.frequency_threshold),
            block_duration_secs: config.filter.block_duration_secs,
            back_attempts: config.enforcement.back_attempts,
            back_pacing_ms: config.enforcement.back_pacing_ms,
            notify_enabled: config.notify.enabled,
        }
    }
}

/// Counts cross the FFI as `u32`; larger values clamp instead of wrapping
fn saturating_u32(value: usize) -> u32 {
    u32::try_from(value).unwrap_or(u32::MAX)
}

impl From<CoreError> for FfiError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Config(e) => FfiError::Config {
                message: e.to_string(),
            },
            CoreError::Storage(e) => FfiError::Storage {
                message: e.to_string(),
            },
            CoreError::Io(e) => FfiError::Io {
                message: e.to_string(),
            },
            other => FfiError::Other {
                message: other.to_string(),
            },
        }
    }
}

// ─── Exported Functions ───────────────────────────────────────────────────────

#[uniffi::export]
pub fn get_version() -> String {
    crate::VERSION.to_string()
}

#[uniffi::export]
pub fn load_config() -> Result<FfiFilterConfig, FfiError> {
    let config = Config::load().map_err(FfiError::from)?;
    Ok(config.into())
}

/// Reduce a URL to its root-domain key
#[uniffi::export]
pub fn root_domain(url: String) -> String {
    crate::site::root_domain(&url)
}

/// Whole-word, case-insensitive check of `text` against `words`
#[uniffi::export]
pub fn contains_explicit_words(text: String, words: Vec<String>) -> bool {
    WordMatcher::new(&WordList::new(words)).contains_explicit_words(&text)
}

/// Occurrence counts of every word in `words` that appears in `text`
#[uniffi::export]
pub fn word_frequencies(text: String, words: Vec<String>) -> Vec<FfiWordCount> {
    WordMatcher::new(&WordList::new(words))
        .word_frequencies(&text)
        .into_iter()
        .map(|(word, count)| FfiWordCount {
            word,
            count: saturating_u32(count),
        })
        .collect()
}

#[uniffi::export]
pub fn read_session_log(path: String) -> Result<Vec<FfiEvent>, FfiError> {
    let file = std::fs::File::open(&path).map_err(|e| FfiError::Io {
        message: format!("Failed to open {}: {}", path, e),
    })?;
    let reader = std::io::BufReader::new(file);
    let mut events = Vec::new();

    for line in reader.lines() {
        let line = line.map_err(|e| FfiError::Io {
            message: format!("Failed to read line: {}", e),
        })?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        // Session header/footer lines are not events
        if let Ok(event) = serde_json::from_str::<Event>(trimmed) {
            events.push(event.into());
        }
    }

    Ok(events)
}

// ─── FfiFilterEngine Object ───────────────────────────────────────────────────

/// Decision engine for a platform accessibility shell.
///
/// The shell extracts text and performs the actions itself; the engine owns
/// the lists, the block state and the health checks.
#[derive(uniffi::Object)]
pub struct FfiFilterEngine {
    store: Arc<dyn StateStore>,
    defaults: DefaultLists,
    policy: BlockPolicy,
    monitor: ServiceMonitor,
    clock: Arc<dyn Clock>,
}

impl FfiFilterEngine {
    fn with_store(store: Arc<dyn StateStore>, config: &Config, clock: Arc<dyn Clock>) -> Self {
        FfiFilterEngine {
            store,
            defaults: DefaultLists::load(&config.lists),
            policy: BlockPolicy::from(&config.filter),
            monitor: ServiceMonitor::new(config.notify.force_stop_threshold_ms()),
            clock,
        }
    }
}

#[uniffi::export]
impl FfiFilterEngine {
    /// Open the engine over a SQLite database, or the configured default
    /// when `db_path` is `None`.
    #[uniffi::constructor]
    pub fn new(db_path: Option<String>) -> Result<Arc<Self>, FfiError> {
        let config = Config::load().map_err(FfiError::from)?;
        let path = match db_path {
            Some(path) => PathBuf::from(path),
            None => config.storage.effective_db_path().map_err(FfiError::from)?,
        };
        let store = SqliteStore::new(&path).map_err(FfiError::from)?;
        Ok(Arc::new(Self::with_store(
            Arc::new(store),
            &config,
            Arc::new(SystemClock),
        )))
    }

    /// Engine with volatile state and default configuration
    #[uniffi::constructor]
    pub fn in_memory() -> Arc<Self> {
        Arc::new(Self::with_store(
            Arc::new(MemoryStore::new()),
            &Config::default(),
            Arc::new(SystemClock),
        ))
    }

    /// Decide on text seen in `package`; `urls` are address-bar contents
    pub fn evaluate(
        &self,
        package: String,
        text: String,
        urls: Vec<String>,
    ) -> Result<FfiDecision, FfiError> {
        let matchers =
            Matchers::build(&self.defaults, self.store.as_ref()).map_err(FfiError::from)?;
        let decision = self
            .policy
            .evaluate(
                &package,
                &text,
                &urls,
                self.clock.now_ms(),
                self.store.as_ref(),
                &matchers,
            )
            .map_err(FfiError::from)?;
        Ok(decision.into())
    }

    pub fn add_entry(&self, kind: FfiListKind, value: String) -> Result<bool, FfiError> {
        self.store
            .add_entry(kind.into(), &value)
            .map_err(FfiError::from)
    }

    pub fn remove_entry(&self, kind: FfiListKind, value: String) -> Result<bool, FfiError> {
        self.store
            .remove_entry(kind.into(), &value)
            .map_err(FfiError::from)
    }

    pub fn list_entries(&self, kind: FfiListKind) -> Result<Vec<String>, FfiError> {
        Ok(self
            .store
            .load_set(kind.into())
            .map_err(FfiError::from)?
            .into_iter()
            .collect())
    }

    pub fn block_state(&self) -> Result<FfiBlockState, FfiError> {
        let state = self.store.load_block_state().map_err(FfiError::from)?;
        Ok(FfiBlockState {
            active: state.is_active(self.clock.now_ms()),
            package: state.package,
            block_end_time: state.block_end_time,
        })
    }

    /// Returns the notification to send, if any
    pub fn on_accessibility_state(&self, enabled: bool) -> Option<FfiNotificationKind> {
        self.monitor.on_accessibility_state(enabled).map(Into::into)
    }

    /// Record a heartbeat; returns the notification to send if the gap
    /// since the last one means the app was killed
    pub fn check_for_force_stop(&self) -> Result<Option<FfiNotificationKind>, FfiError> {
        Ok(self
            .monitor
            .check_for_force_stop(self.store.as_ref(), self.clock.now_ms())
            .map_err(FfiError::from)?
            .map(Into::into))
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::CheckCategory;
    use crate::event::EventType;
    use crate::policy::ManualClock;
    use crate::storage::{EventStorage, SessionLogger};
    use tempfile::TempDir;

    fn words(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn engine(clock: Arc<ManualClock>) -> FfiFilterEngine {
        FfiFilterEngine::with_store(Arc::new(MemoryStore::new()), &Config::default(), clock)
    }

    #[test]
    fn test_root_domain_export() {
        assert_eq!(root_domain("https://www.Example.com/page".to_string()), "example");
        assert_eq!(root_domain("example.com".to_string()), "example");
    }

    #[test]
    fn test_contains_explicit_words_export() {
        assert!(contains_explicit_words(
            "what an ASS".to_string(),
            words(&["ass"])
        ));
        assert!(!contains_explicit_words(
            "a classic".to_string(),
            words(&["ass"])
        ));
    }

    #[test]
    fn test_word_frequencies_export() {
        let counts = word_frequencies("xxx and xxx".to_string(), words(&["xxx", "nsfw"]));
        assert_eq!(
            counts,
            vec![FfiWordCount {
                word: "xxx".to_string(),
                count: 2
            }]
        );
    }

    #[test]
    fn test_severity_conversion() {
        assert_eq!(FfiSeverity::from(Severity::Info), FfiSeverity::Info);
        assert_eq!(FfiSeverity::from(Severity::Warning), FfiSeverity::Warning);
        assert_eq!(FfiSeverity::from(Severity::Block), FfiSeverity::Block);
    }

    #[test]
    fn test_decision_conversion() {
        let decision = Decision::Enforce(Reason::Frequency {
            word: "porn".to_string(),
            count: 5,
            expires_at_ms: 10,
        });
        assert_eq!(
            FfiDecision::from(decision),
            FfiDecision::FrequencyBlock {
                word: "porn".to_string(),
                count: 5,
                expires_at_ms: 10,
            }
        );
        assert_eq!(FfiDecision::from(Decision::Allow), FfiDecision::Allow);
    }

    #[test]
    fn test_engine_lists_and_decisions() {
        let clock = Arc::new(ManualClock::new(1_000_000));
        let engine = engine(clock.clone());

        assert!(engine
            .add_entry(FfiListKind::Words, "Forbidden".to_string())
            .unwrap());
        assert_eq!(
            engine.list_entries(FfiListKind::Words).unwrap(),
            vec!["forbidden"]
        );

        let decision = engine
            .evaluate("com.chat".to_string(), "so forbidden".to_string(), vec![])
            .unwrap();
        assert_eq!(
            decision,
            FfiDecision::Words {
                words: words(&["forbidden"])
            }
        );

        assert!(engine
            .remove_entry(FfiListKind::Words, "forbidden".to_string())
            .unwrap());
        assert_eq!(
            engine
                .evaluate("com.chat".to_string(), "so forbidden".to_string(), vec![])
                .unwrap(),
            FfiDecision::Allow
        );
    }

    #[test]
    fn test_engine_block_state() {
        let clock = Arc::new(ManualClock::new(1_000_000));
        let engine = engine(clock.clone());

        let decision = engine
            .evaluate("com.chat".to_string(), "porn ".repeat(5), vec![])
            .unwrap();
        assert!(matches!(decision, FfiDecision::FrequencyBlock { count: 5, .. }));

        let state = engine.block_state().unwrap();
        assert!(state.active);
        assert_eq!(state.package.as_deref(), Some("com.chat"));

        clock.advance(300_000);
        assert!(!engine.block_state().unwrap().active);
    }

    #[test]
    fn test_engine_health_checks() {
        let clock = Arc::new(ManualClock::new(1_000_000));
        let engine = engine(clock.clone());

        assert_eq!(
            engine.on_accessibility_state(false),
            Some(FfiNotificationKind::AccessibilityOff)
        );
        assert_eq!(engine.on_accessibility_state(false), None);

        assert_eq!(engine.check_for_force_stop().unwrap(), None);
        clock.advance(600_000);
        assert_eq!(
            engine.check_for_force_stop().unwrap(),
            Some(FfiNotificationKind::AppForceStopped)
        );
    }

    #[test]
    fn test_read_session_log_skips_markers() {
        let temp_dir = TempDir::new().unwrap();
        let mut logger =
            SessionLogger::new(&temp_dir.path().to_path_buf(), Some("ffi".to_string())).unwrap();
        logger.write_session_header("test").unwrap();
        logger
            .write_event(&Event::classification("com.chat", CheckCategory::Text, 1, 3))
            .unwrap();
        logger.write_session_footer().unwrap();

        let events = read_session_log(logger.path().to_string_lossy().to_string()).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, "classification");
        assert_eq!(events[0].package, "com.chat");
        assert!(events[0].details_json.contains("\"category\":\"text\""));
    }

    #[test]
    fn test_event_kind_from_type_tag() {
        let event = Event::new(
            EventType::SiteMatch {
                url: "a.com".to_string(),
                root: "a".to_string(),
            },
            "com.browser",
            Severity::Warning,
        );
        let ffi: FfiEvent = event.into();
        assert_eq!(ffi.kind, "site_match");
        assert!(ffi.alert);
    }

    #[test]
    fn test_read_session_log_missing_file() {
        assert!(matches!(
            read_session_log("/nonexistent/session.jsonl".to_string()),
            Err(FfiError::Io { .. })
        ));
    }

    #[test]
    fn test_counts_clamp_instead_of_wrapping() {
        assert_eq!(saturating_u32(7), 7);
        assert_eq!(saturating_u32(u32::MAX as usize), u32::MAX);
        #[cfg(target_pointer_width = "64")]
        assert_eq!(saturating_u32(u32::MAX as usize + 2), u32::MAX);
    }
}
