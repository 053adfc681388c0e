//! Logging module for WordGuard
//!
//! Formats filter events for terminals and machines, and writes them to a
//! chosen destination.

use crate::classifier::CheckCategory;
use crate::event::{Event, EventSink, EventType, Severity};
use colored::Colorize;
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::PathBuf;
use std::str::FromStr;

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable format for terminal
    #[default]
    Pretty,
    /// JSON Lines format for machine processing
    JsonLines,
    /// Compact single-line format
    Compact,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pretty" => Ok(LogFormat::Pretty),
            "json" | "jsonl" | "json-lines" => Ok(LogFormat::JsonLines),
            "compact" => Ok(LogFormat::Compact),
            other => Err(format!("unknown log format '{}'", other)),
        }
    }
}

/// Log destination
#[derive(Debug, Clone, Default)]
pub enum LogDestination {
    /// Standard output
    #[default]
    Stdout,
    /// Standard error
    Stderr,
    /// File path, appended to
    File(PathBuf),
}

/// Logger configuration
#[derive(Debug, Clone)]
pub struct LoggerConfig {
    /// Output format
    pub format: LogFormat,
    /// Minimum severity to log
    pub min_severity: Severity,
    /// Whether to show timestamps
    pub show_timestamps: bool,
    /// Whether to use colors (for Pretty format)
    pub use_colors: bool,
    /// Where [`EventSink::emit`] writes
    pub destination: LogDestination,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::Pretty,
            min_severity: Severity::Info,
            show_timestamps: true,
            use_colors: true,
            destination: LogDestination::Stdout,
        }
    }
}

/// Event logger
#[derive(Debug, Clone)]
pub struct Logger {
    config: LoggerConfig,
}

impl Default for Logger {
    fn default() -> Self {
        Self::new(LoggerConfig::default())
    }
}

impl Logger {
    /// Create a new logger with the given configuration
    pub fn new(config: LoggerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &LoggerConfig {
        &self.config
    }

    /// Format an event according to the logger configuration
    pub fn format(&self, event: &Event) -> String {
        match self.config.format {
            LogFormat::Pretty => self.format_pretty(event),
            LogFormat::JsonLines => self.format_json(event),
            LogFormat::Compact => self.format_compact(event),
        }
    }

    /// Log an event to the given writer
    pub fn log<W: Write>(&self, event: &Event, writer: &mut W) -> io::Result<()> {
        if event.severity < self.config.min_severity {
            return Ok(());
        }

        let formatted = self.format(event);
        writeln!(writer, "{}", formatted)
    }

    fn write_to_destination(&self, event: &Event) -> io::Result<()> {
        match &self.config.destination {
            LogDestination::Stdout => self.log(event, &mut io::stdout().lock()),
            LogDestination::Stderr => self.log(event, &mut io::stderr().lock()),
            LogDestination::File(path) => {
                let mut file = OpenOptions::new().create(true).append(true).open(path)?;
                self.log(event, &mut file)
            }
        }
    }

    fn paint(&self, text: String, severity: Severity) -> String {
        if !self.config.use_colors {
            return text;
        }
        match severity {
            Severity::Block => text.red().bold().to_string(),
            Severity::Warning => text.yellow().to_string(),
            Severity::Info => text,
        }
    }

    fn format_pretty(&self, event: &Event) -> String {
        let mut parts = Vec::new();

        if self.config.show_timestamps {
            let time = event.timestamp.format("%H:%M:%S").to_string();
            parts.push(if self.config.use_colors {
                time.dimmed().to_string()
            } else {
                time
            });
        }

        parts.push(event.severity.emoji().to_string());
        parts.push(format!("[{}]", event.package));

        let details = match &event.event_type {
            EventType::Classification {
                category,
                nodes_visited,
                text_len,
            } => {
                let msg = format!(
                    "checked {} ({} nodes, {} chars)",
                    category_label(*category),
                    nodes_visited,
                    text_len
                );
                if self.config.use_colors {
                    msg.dimmed().to_string()
                } else {
                    msg
                }
            }
            EventType::WordMatch { words } => {
                self.paint(format!("explicit words: {}", words.join(", ")), event.severity)
            }
            EventType::SiteMatch { url, root } => {
                self.paint(format!("blocked site {} ({})", root, url), event.severity)
            }
            EventType::FrequencyBlock {
                word,
                count,
                expires_at,
            } => self.paint(
                format!(
                    "'{}' x{}: blocked until {}",
                    word,
                    count,
                    expires_at.format("%H:%M:%S")
                ),
                event.severity,
            ),
            EventType::ActiveBlock { expires_at } => self.paint(
                format!("still blocked until {}", expires_at.format("%H:%M:%S")),
                event.severity,
            ),
            EventType::Enforcement {
                cleared_input,
                tabs_closed,
                back_presses,
                went_home,
                failures,
            } => {
                let mut steps = Vec::new();
                if *cleared_input {
                    steps.push("input cleared".to_string());
                }
                if *tabs_closed > 0 {
                    steps.push(format!("{} tab(s) closed", tabs_closed));
                }
                if *back_presses > 0 {
                    steps.push(format!("back x{}", back_presses));
                }
                if *went_home {
                    steps.push("home".to_string());
                }
                if *failures > 0 {
                    steps.push(format!("{} failed", failures));
                }
                if steps.is_empty() {
                    steps.push("nothing to do".to_string());
                }
                format!("[enforce] {}", steps.join(", "))
            }
            EventType::Notification { kind, recipients } => {
                let msg = format!("[notify] {} -> {} recipient(s)", kind, recipients);
                if self.config.use_colors {
                    msg.blue().to_string()
                } else {
                    msg
                }
            }
            EventType::Service { action } => {
                let msg = format!("[service] {:?}", action);
                if self.config.use_colors {
                    msg.cyan().to_string()
                } else {
                    msg
                }
            }
        };

        parts.push(details);

        if event.alert {
            let alert = "⚠️  ALERT";
            parts.push(if self.config.use_colors {
                alert.red().bold().to_string()
            } else {
                alert.to_string()
            });
        }

        parts.join("  ")
    }

    fn format_json(&self, event: &Event) -> String {
        serde_json::to_string(event).unwrap_or_else(|e| format!("{{\"error\": \"{}\"}}", e))
    }

    fn format_compact(&self, event: &Event) -> String {
        let time = event.timestamp.format("%H:%M:%S");
        let level = match event.severity {
            Severity::Block => "BLCK",
            Severity::Warning => "WARN",
            Severity::Info => "INFO",
        };

        let details = match &event.event_type {
            EventType::Classification {
                category,
                nodes_visited,
                ..
            } => format!("check:{}:{}", category_label(*category), nodes_visited),
            EventType::WordMatch { words } => format!("words:{}", words.join(",")),
            EventType::SiteMatch { root, .. } => format!("site:{}", root),
            EventType::FrequencyBlock { word, count, .. } => format!("freq:{}:{}", word, count),
            EventType::ActiveBlock { .. } => "blocked".to_string(),
            EventType::Enforcement {
                back_presses,
                went_home,
                ..
            } => format!("enforce:back={}:home={}", back_presses, went_home),
            EventType::Notification { kind, recipients } => {
                format!("notify:{}:{}", kind, recipients)
            }
            EventType::Service { action } => format!("service:{:?}", action),
        };

        format!("{} [{}] {} {}", time, level, event.package, details)
    }
}

fn category_label(category: CheckCategory) -> &'static str {
    match category {
        CheckCategory::Text => "text",
        CheckCategory::Content => "content",
        CheckCategory::Immediate => "submit",
    }
}

impl EventSink for Logger {
    fn emit(&self, event: &Event) {
        if let Err(e) = self.write_to_destination(event) {
            tracing::warn!("Failed to write event: {}", e);
        }
    }
}
