//! Filter service
//!
//! Owns the event pipeline: UI events are routed by the classifier, checks
//! are debounced per category on the tokio runtime, and each check runs
//! extraction, the block policy, enforcement and notification in turn.
//!
//! A check never fails outward. Storage and host errors are logged and the
//! pipeline carries on with the next event.

use crate::classifier::{CheckCategory, EventClassifier, Route};
use crate::config::Config;
use crate::enforce::{EnforcementReport, Enforcer};
use crate::event::{Event, EventSink, EventType, ServiceAction, Severity};
use crate::extract::{
    extract_text, extract_urls, input_text, is_address_bar, Extraction, WalkLimits, URL_MARKER,
};
use crate::host::AccessibilityHost;
use crate::lists::DefaultLists;
use crate::monitor::ServiceMonitor;
use crate::notify::{NotificationKind, Notifier, NullNotifier};
use crate::policy::{
    millis_to_datetime, BlockPolicy, Clock, Decision, Matchers, Reason, SystemClock,
};
use crate::state::StateStore;
use crate::ui::{UiEvent, UiNode};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Package name used for the service's own lifecycle events
pub const SERVICE_PACKAGE: &str = "wordguard";

/// Result of one check
#[derive(Debug, Clone)]
pub struct CheckOutcome {
    pub category: CheckCategory,
    pub package: String,
    pub extraction: Extraction,
    pub decision: Decision,
    pub report: Option<EnforcementReport>,
}

struct Inner<H: AccessibilityHost> {
    host: Arc<H>,
    config: Config,
    store: Arc<dyn StateStore>,
    defaults: DefaultLists,
    classifier: EventClassifier,
    policy: BlockPolicy,
    enforcer: Enforcer,
    limits: WalkLimits,
    sinks: Vec<Arc<dyn EventSink>>,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
    monitor: ServiceMonitor,
}

/// Builder for [`FilterService`]
pub struct FilterServiceBuilder<H: AccessibilityHost> {
    host: Arc<H>,
    store: Arc<dyn StateStore>,
    config: Config,
    defaults: Option<DefaultLists>,
    sinks: Vec<Arc<dyn EventSink>>,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
}

impl<H: AccessibilityHost> FilterServiceBuilder<H> {
    pub fn config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// Use these default lists instead of loading them from config
    pub fn defaults(mut self, defaults: DefaultLists) -> Self {
        self.defaults = Some(defaults);
        self
    }

    pub fn sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn build(self) -> FilterService<H> {
        let config = self.config;
        let limits = WalkLimits::from(&config.filter);
        let defaults = self
            .defaults
            .unwrap_or_else(|| DefaultLists::load(&config.lists));

        let inner = Inner {
            host: self.host,
            store: self.store,
            classifier: EventClassifier::new(config.general.own_package.clone(), &config.filter),
            policy: BlockPolicy::from(&config.filter),
            enforcer: Enforcer::new(config.enforcement.clone(), limits),
            monitor: ServiceMonitor::new(config.notify.force_stop_threshold_ms()),
            limits,
            defaults,
            sinks: self.sinks,
            notifier: self.notifier,
            clock: self.clock,
            config,
        };

        FilterService {
            inner: Arc::new(inner),
            pending: Mutex::new(HashMap::new()),
        }
    }
}

/// The filter pipeline bound to one host
pub struct FilterService<H: AccessibilityHost> {
    inner: Arc<Inner<H>>,
    pending: Mutex<HashMap<CheckCategory, JoinHandle<()>>>,
}

impl<H: AccessibilityHost> FilterService<H> {
    pub fn builder(host: Arc<H>, store: Arc<dyn StateStore>) -> FilterServiceBuilder<H> {
        FilterServiceBuilder {
            host,
            store,
            config: Config::default(),
            defaults: None,
            sinks: Vec::new(),
            notifier: Arc::new(NullNotifier),
            clock: Arc::new(SystemClock),
        }
    }

    pub fn host(&self) -> &Arc<H> {
        &self.inner.host
    }

    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// Service came up: check for a force stop since the last heartbeat.
    pub fn start(&self) {
        self.inner
            .emit(Event::service(SERVICE_PACKAGE, ServiceAction::Start));

        let now = self.inner.clock.now_ms();
        match self
            .inner
            .monitor
            .check_for_force_stop(self.inner.store.as_ref(), now)
        {
            Ok(Some(kind)) => {
                self.inner.emit(Event::service(
                    SERVICE_PACKAGE,
                    ServiceAction::ForceStopDetected,
                ));
                self.inner
                    .notify(kind, "The filter was stopped or crashed", SERVICE_PACKAGE);
            }
            Ok(None) => {}
            Err(e) => warn!("Force-stop check failed: {}", e),
        }
    }

    /// Record a heartbeat so the next start can tell a force stop apart
    pub fn heartbeat(&self) {
        let now = self.inner.clock.now_ms();
        if let Err(e) = self.inner.store.save_last_run(now) {
            warn!("Failed to record heartbeat: {}", e);
        }
    }

    /// Host reports whether the accessibility service is enabled
    pub fn on_accessibility_state(&self, enabled: bool) {
        if let Some(kind) = self.inner.monitor.on_accessibility_state(enabled) {
            self.inner.emit(Event::service(
                SERVICE_PACKAGE,
                ServiceAction::AccessibilityOff,
            ));
            self.inner
                .notify(kind, "The accessibility service was disabled", SERVICE_PACKAGE);
        } else if enabled {
            self.inner.emit(Event::service(
                SERVICE_PACKAGE,
                ServiceAction::AccessibilityOn,
            ));
        }
    }

    /// Service is going down: drop pending checks.
    pub fn stop(&self) {
        self.abort_all();
        self.inner
            .emit(Event::service(SERVICE_PACKAGE, ServiceAction::Stop));
    }

    /// Feed one UI event into the pipeline.
    ///
    /// Must be called from within a tokio runtime. Returns how the event was
    /// routed.
    pub fn on_event(&self, event: UiEvent<H::Node>) -> Route {
        let route = self.inner.classifier.route(&event);
        let package = event.package.clone();
        let source = event.source;

        match route {
            Route::Ignore => {}
            Route::Debounced { category, delay } => {
                let inner = Arc::clone(&self.inner);
                let handle = tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    // Detached so a newer event cannot cancel a running check
                    tokio::spawn(async move {
                        inner.run_check(category, package, source).await;
                    });
                });
                if let Some(previous) = self.pending().insert(category, handle) {
                    previous.abort();
                }
            }
            Route::Immediate => {
                if let Some(previous) = self.pending().remove(&CheckCategory::Text) {
                    previous.abort();
                }
                let inner = Arc::clone(&self.inner);
                tokio::spawn(async move {
                    inner
                        .run_check(CheckCategory::Immediate, package, source)
                        .await;
                });
            }
        }
        route
    }

    /// Run a check right away, bypassing debouncing
    pub async fn check_now(
        &self,
        category: CheckCategory,
        package: Option<String>,
        source: Option<H::Node>,
    ) -> Option<CheckOutcome> {
        self.inner.run_check(category, package, source).await
    }

    /// Number of debounced checks still waiting
    pub fn pending_checks(&self) -> usize {
        self.pending()
            .values()
            .filter(|handle| !handle.is_finished())
            .count()
    }

    fn pending(&self) -> std::sync::MutexGuard<'_, HashMap<CheckCategory, JoinHandle<()>>> {
        self.pending
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn abort_all(&self) {
        for (_, handle) in self.pending().drain() {
            handle.abort();
        }
    }
}

impl<H: AccessibilityHost> Drop for FilterService<H> {
    fn drop(&mut self) {
        self.abort_all();
    }
}

impl<H: AccessibilityHost> Inner<H> {
    fn emit(&self, event: Event) {
        for sink in &self.sinks {
            sink.emit(&event);
        }
    }

    fn notify(&self, kind: NotificationKind, details: &str, package: &str) {
        if !self.config.notify.enabled {
            return;
        }
        let recipients = match self.store.recipients() {
            Ok(recipients) => recipients,
            Err(e) => {
                warn!("Failed to load recipients: {}", e);
                return;
            }
        };
        let queued = self.notifier.notify(kind, details, &recipients);
        if queued > 0 {
            self.emit(Event::new(
                EventType::Notification {
                    kind,
                    recipients: queued,
                },
                package,
                Severity::Info,
            ));
        }
    }

    fn extract(&self, category: CheckCategory, source: Option<&H::Node>) -> Extraction {
        match category {
            CheckCategory::Content => extract_text(self.host.active_root().as_ref(), self.limits),
            CheckCategory::Text | CheckCategory::Immediate => {
                let mut text = input_text(source, self.limits);
                if text.is_none() && category == CheckCategory::Immediate {
                    // Send buttons carry no input; use the window's first editable field
                    text = self
                        .host
                        .active_root()
                        .and_then(|root| input_text(Some(&root), self.limits));
                }
                let text = text.unwrap_or_default().trim().to_string();
                let address_bar = source
                    .and_then(|node| node.view_id())
                    .is_some_and(|id| is_address_bar(&id));
                Extraction {
                    nodes_visited: usize::from(source.is_some()),
                    truncated: false,
                    text: if address_bar && !text.is_empty() {
                        format!("{} {}", URL_MARKER, text)
                    } else {
                        text
                    },
                }
            }
        }
    }

    async fn run_check(
        &self,
        category: CheckCategory,
        package: Option<String>,
        source: Option<H::Node>,
    ) -> Option<CheckOutcome> {
        let Some(package) = package.or_else(|| self.host.foreground_package()) else {
            debug!("No package for {} check, skipping", category);
            return None;
        };
        if package == self.config.general.own_package {
            debug!("Skipping {} check of own package", category);
            return None;
        }

        let matchers = match Matchers::build(&self.defaults, self.store.as_ref()) {
            Ok(matchers) => matchers,
            Err(e) => {
                warn!("Failed to load lists: {}", e);
                return None;
            }
        };

        let extraction = self.extract(category, source.as_ref());
        self.emit(Event::classification(
            &package,
            category,
            extraction.nodes_visited,
            extraction.text.len(),
        ));
        if extraction.truncated {
            debug!(
                "Walk of {} truncated after {} nodes",
                package, extraction.nodes_visited
            );
        }

        let urls = extract_urls(&extraction.text);
        let now = self.clock.now_ms();
        let decision = match self.policy.evaluate(
            &package,
            &extraction.text,
            &urls,
            now,
            self.store.as_ref(),
            &matchers,
        ) {
            Ok(decision) => decision,
            Err(e) => {
                warn!("Policy evaluation failed for {}: {}", package, e);
                return None;
            }
        };

        let report = match decision.reason() {
            Some(reason) => Some(self.act(&package, reason, source.as_ref()).await),
            None => None,
        };

        Some(CheckOutcome {
            category,
            package,
            extraction,
            decision,
            report,
        })
    }

    async fn act(
        &self,
        package: &str,
        reason: &Reason,
        source: Option<&H::Node>,
    ) -> EnforcementReport {
        let event_type = match reason {
            Reason::ActiveBlock { expires_at_ms } => EventType::ActiveBlock {
                expires_at: millis_to_datetime(*expires_at_ms),
            },
            Reason::Frequency {
                word,
                count,
                expires_at_ms,
            } => EventType::FrequencyBlock {
                word: word.clone(),
                count: *count,
                expires_at: millis_to_datetime(*expires_at_ms),
            },
            Reason::Words { words } => EventType::WordMatch {
                words: words.clone(),
            },
            Reason::Site { url, root } => EventType::SiteMatch {
                url: url.clone(),
                root: root.clone(),
            },
        };
        self.emit(Event::new(event_type, package, reason.severity()));

        let report = self
            .enforcer
            .enforce(self.host.as_ref(), package, source)
            .await;
        self.emit(Event::new(
            EventType::Enforcement {
                cleared_input: report.cleared_input,
                tabs_closed: report.tabs_closed,
                back_presses: report.back_presses,
                went_home: report.went_home,
                failures: report.failures,
            },
            package,
            reason.severity(),
        ));

        if reason.notifies() {
            self.notify(
                NotificationKind::ContentBlocked,
                &reason.describe(package),
                package,
            );
        }
        report
    }
}
