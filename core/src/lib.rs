//! WordGuard Core Library
//!
//! Decision engine for an accessibility-driven explicit content filter.
//!
//! # Features
//!
//! - **Event Routing**: Classify UI events and debounce checks per category
//! - **Tree Extraction**: Bounded walks that flatten on-screen text and URLs
//! - **Matching**: Whole-word explicit word matching and root-domain site blocking
//! - **Block Policy**: Frequency-triggered app blocks that lapse on their own
//! - **Enforcement**: Clear input, close tabs, and navigate away through the host
//! - **Event Logging**: Structured logging in multiple formats (Pretty, JSON, Compact)
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use wordguard_core::{FilterService, MemoryStore, SimulatedHost};
//!
//! # async fn run() {
//! let host = Arc::new(SimulatedHost::new());
//! let store = Arc::new(MemoryStore::new());
//! let service = FilterService::builder(host, store).build();
//! service.start();
//! # }
//! ```

uniffi::setup_scaffolding!();

pub mod classifier;
pub mod config;
pub mod enforce;
pub mod error;
pub mod event;
pub mod extract;
pub mod ffi;
pub mod host;
pub mod lists;
pub mod logger;
pub mod matcher;
pub mod monitor;
pub mod notify;
pub mod policy;
pub mod service;
pub mod site;
pub mod sqlite_storage;
pub mod state;
pub mod storage;
pub mod ui;

// Re-export commonly used types
pub use classifier::{CheckCategory, EventClassifier, Route};
pub use config::{
    Config, EnforcementConfig, FilterConfig, GeneralConfig, ListsConfig, LoggingConfig,
    NotifyConfig, StorageConfig,
};
pub use enforce::{EnforcementReport, Enforcer};
pub use error::{ActionError, ConfigError, CoreError, StorageError};
pub use event::{Event, EventSink, EventType, MemorySink, NullSink, ServiceAction, Severity};
pub use extract::{extract_text, extract_urls, Extraction, WalkLimits};
pub use host::{AccessibilityHost, GlobalAction, NodeAction, RecordedAction, SimulatedHost};
pub use lists::{DefaultLists, SiteList, WordList};
pub use logger::{LogDestination, LogFormat, Logger, LoggerConfig};
pub use matcher::WordMatcher;
pub use monitor::ServiceMonitor;
pub use notify::{NotificationKind, Notifier, NullNotifier, OutboxNotifier, WebhookPayload};
pub use policy::{BlockPolicy, Clock, Decision, ManualClock, Matchers, Reason, SystemClock};
pub use service::{CheckOutcome, FilterService, FilterServiceBuilder};
pub use site::{root_domain, SiteMatcher};
pub use sqlite_storage::{EventQuery, SqliteStore};
pub use state::{BlockState, MemoryStore, SetKey, StateStore};
pub use storage::{cleanup_old_logs, EventStorage, SessionLogger, StorageSink};
pub use ui::{SnapshotNode, UiEvent, UiEventKind, UiNode};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
