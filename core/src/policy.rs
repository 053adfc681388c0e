//! Block policy
//!
//! Turns a classified snapshot into a decision. The only persistent state is
//! the app-level block written when a word crosses the frequency threshold;
//! it lapses on its own and is cleared the first time it is seen expired.
//!
//! Decision order: active block, frequency, direct word, site.

use crate::config::FilterConfig;
use crate::error::CoreError;
use crate::event::Severity;
use crate::lists::DefaultLists;
use crate::matcher::WordMatcher;
use crate::site::{root_domain, SiteMatcher};
use crate::state::{BlockState, StateStore};
use chrono::{DateTime, TimeZone, Utc};
use std::sync::atomic::{AtomicI64, Ordering};
use tracing::debug;

/// Source of wall-clock time in epoch millis
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> i64;
}

/// The system clock
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        Utc::now().timestamp_millis()
    }
}

/// Clock moved by hand, for tests and replays
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicI64,
}

impl ManualClock {
    pub fn new(now_ms: i64) -> Self {
        Self {
            now: AtomicI64::new(now_ms),
        }
    }

    pub fn set(&self, now_ms: i64) {
        self.now.store(now_ms, Ordering::SeqCst);
    }

    pub fn advance(&self, delta_ms: i64) {
        self.now.fetch_add(delta_ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}

impl<C: Clock + ?Sized> Clock for std::sync::Arc<C> {
    fn now_ms(&self) -> i64 {
        (**self).now_ms()
    }
}

/// Convert epoch millis to a UTC timestamp, clamping out-of-range values
pub fn millis_to_datetime(ms: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(ms)
        .single()
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// Matchers over default and user lists
#[derive(Debug, Clone)]
pub struct Matchers {
    pub words: WordMatcher,
    pub sites: SiteMatcher,
}

impl Matchers {
    /// Union the defaults with the user's current lists
    pub fn build(defaults: &DefaultLists, store: &dyn StateStore) -> Result<Self, CoreError> {
        let words = defaults.words.union(&store.user_words()?);
        let sites = defaults.sites.union(&store.user_sites()?);
        Ok(Self {
            words: WordMatcher::new(&words),
            sites: SiteMatcher::new(&sites),
        })
    }

    /// Matchers over the defaults alone
    pub fn defaults(defaults: &DefaultLists) -> Self {
        Self {
            words: WordMatcher::new(&defaults.words),
            sites: SiteMatcher::new(&defaults.sites),
        }
    }
}

/// Why a snapshot has to be enforced
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reason {
    /// The package is under a block that has not expired
    ActiveBlock { expires_at_ms: i64 },
    /// A word reached the frequency threshold; a new block was written
    Frequency {
        word: String,
        count: usize,
        expires_at_ms: i64,
    },
    /// List words appear in the text
    Words { words: Vec<String> },
    /// A blocked site is on screen
    Site { url: String, root: String },
}

impl Reason {
    pub fn severity(&self) -> Severity {
        match self {
            Reason::ActiveBlock { .. } | Reason::Frequency { .. } => Severity::Block,
            Reason::Words { .. } | Reason::Site { .. } => Severity::Warning,
        }
    }

    /// One-line description used in notifications
    pub fn describe(&self, package: &str) -> String {
        match self {
            Reason::ActiveBlock { .. } => format!("{} is blocked", package),
            Reason::Frequency { word, count, .. } => format!(
                "'{}' appeared {} times in {}; app blocked",
                word, count, package
            ),
            Reason::Words { words } => {
                format!("Explicit words in {}: {}", package, words.join(", "))
            }
            Reason::Site { root, .. } => format!("Blocked site '{}' opened in {}", root, package),
        }
    }

    /// Whether the reason should be reported to recipients
    pub fn notifies(&self) -> bool {
        !matches!(self, Reason::ActiveBlock { .. })
    }
}

/// Outcome of one evaluation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Enforce(Reason),
}

impl Decision {
    pub fn is_enforce(&self) -> bool {
        matches!(self, Decision::Enforce(_))
    }

    pub fn reason(&self) -> Option<&Reason> {
        match self {
            Decision::Allow => None,
            Decision::Enforce(reason) => Some(reason),
        }
    }
}

/// Block state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockPolicy {
    frequency_threshold: usize,
    block_duration_ms: i64,
}

impl Default for BlockPolicy {
    fn default() -> Self {
        Self::from(&FilterConfig::default())
    }
}

impl From<&FilterConfig> for BlockPolicy {
    fn from(config: &FilterConfig) -> Self {
        Self {
            frequency_threshold: config.frequency_threshold.max(1),
            block_duration_ms: config.block_duration_ms(),
        }
    }
}

impl BlockPolicy {
    pub fn frequency_threshold(&self) -> usize {
        self.frequency_threshold
    }

    /// Decide what to do with `text` (and the address-bar `urls`) seen in
    /// `package` at `now_ms`.
    pub fn evaluate(
        &self,
        package: &str,
        text: &str,
        urls: &[String],
        now_ms: i64,
        store: &dyn StateStore,
        matchers: &Matchers,
    ) -> Result<Decision, CoreError> {
        let state = store.load_block_state()?;
        if state.blocks(package, now_ms) {
            return Ok(Decision::Enforce(Reason::ActiveBlock {
                expires_at_ms: state.block_end_time,
            }));
        }
        if state.package.is_some() && !state.is_active(now_ms) {
            debug!(
                "Block on {:?} expired at {}, clearing",
                state.package, state.block_end_time
            );
            store.save_block_state(&BlockState::default())?;
        }

        if let Some((word, count)) = matchers.words.over_threshold(text, self.frequency_threshold)
        {
            let expires_at_ms = now_ms.saturating_add(self.block_duration_ms);
            store.save_block_state(&BlockState::new(package, expires_at_ms))?;
            return Ok(Decision::Enforce(Reason::Frequency {
                word,
                count,
                expires_at_ms,
            }));
        }

        let words = matchers.words.matched_words(text);
        if !words.is_empty() {
            return Ok(Decision::Enforce(Reason::Words { words }));
        }

        if let Some(url) = matchers
            .sites
            .first_blocked(urls.iter().map(String::as_str))
        {
            return Ok(Decision::Enforce(Reason::Site {
                url: url.to_string(),
                root: root_domain(url),
            }));
        }

        Ok(Decision::Allow)
    }
}
