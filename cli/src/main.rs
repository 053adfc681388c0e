//! WordGuard CLI
//!
//! Command-line interface for the explicit content filter: test text and
//! URLs, manage the user lists, inspect state, and replay recorded UI
//! sessions through the full pipeline.

mod i18n;
mod replay;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use i18n::{t, t_args};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use wordguard_core::policy::millis_to_datetime;
use wordguard_core::{
    cleanup_old_logs, extract_urls, root_domain, BlockPolicy, Clock, Config, DefaultLists,
    EventQuery, EventType, FilterService, LogFormat, Logger, LoggerConfig, ManualClock, Matchers,
    MemorySink, MemoryStore, Notifier, NullNotifier, OutboxNotifier, Reason, SessionLogger, SetKey,
    Severity, SimulatedHost, SqliteStore, StateStore, StorageSink, SystemClock,
};

/// Package name reported for text checked from the command line
const CLI_PACKAGE: &str = "cli";

/// WordGuard - explicit content filter
#[derive(Parser)]
#[command(name = "wordguard")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Output format
    #[arg(short, long, value_enum, default_value = "pretty", global = true)]
    format: OutputFormat,

    /// Minimum severity of events to display
    #[arg(short = 's', long, value_enum, default_value = "info", global = true)]
    min_severity: SeverityArg,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    /// Hide timestamps
    #[arg(long, global = true)]
    no_timestamps: bool,

    /// Configuration file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// State database path (overrides the configured one)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Clone)]
enum Commands {
    /// Show version information
    Version,
    /// Run text through the decision engine without enforcing anything
    Check {
        /// Text to check; `URL: <url>` tokens are matched against blocked sites
        text: String,
    },
    /// Show the root domain of a URL and whether it is blocked
    Domain {
        url: String,
    },
    /// Manage the user's explicit words
    Words {
        #[command(subcommand)]
        action: ListAction,
    },
    /// Manage the user's blocked sites
    Sites {
        #[command(subcommand)]
        action: ListAction,
    },
    /// Manage notification recipients
    Recipients {
        #[command(subcommand)]
        action: ListAction,
    },
    /// Show block state, last heartbeat and list sizes
    Status,
    /// Feed a recorded UI session through the filter service
    Replay {
        /// JSON Lines file of recorded events
        file: PathBuf,
        /// Run against the state database and record events into it
        #[arg(long)]
        record: bool,
    },
    /// Show events recorded in the state database
    History {
        /// Only events for this package
        #[arg(short, long)]
        package: Option<String>,
        /// Only events of this severity
        #[arg(long, value_enum)]
        severity: Option<SeverityArg>,
        /// Maximum number of events
        #[arg(short = 'n', long, default_value = "20")]
        limit: usize,
    },
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
enum ListAction {
    /// Add an entry
    Add { value: String },
    /// Remove an entry
    Remove { value: String },
    /// List all entries
    List,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Pretty,
    Json,
    Compact,
}

impl From<OutputFormat> for LogFormat {
    fn from(f: OutputFormat) -> Self {
        match f {
            OutputFormat::Pretty => LogFormat::Pretty,
            OutputFormat::Json => LogFormat::JsonLines,
            OutputFormat::Compact => LogFormat::Compact,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, ValueEnum)]
enum SeverityArg {
    Info,
    Warning,
    Block,
}

impl From<SeverityArg> for Severity {
    fn from(s: SeverityArg) -> Self {
        match s {
            SeverityArg::Info => Severity::Info,
            SeverityArg::Warning => Severity::Warning,
            SeverityArg::Block => Severity::Block,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    if cli.no_color {
        colored::control::set_override(false);
    }

    let Some(command) = cli.command.clone() else {
        print_usage();
        return Ok(());
    };

    let config = load_config(cli.config.as_deref());
    match command {
        Commands::Version => {
            print_version();
            Ok(())
        }
        Commands::Check { text } => {
            let store = open_store(&cli, &config)?;
            check_text(&text, &config, &store, cli.format)
        }
        Commands::Domain { url } => {
            let store = open_store(&cli, &config)?;
            check_domain(&url, &config, &store, cli.format)
        }
        Commands::Words { action } => manage_list(&cli, &config, SetKey::UserWords, action),
        Commands::Sites { action } => manage_list(&cli, &config, SetKey::UserSites, action),
        Commands::Recipients { action } => {
            manage_list(&cli, &config, SetKey::Recipients, action)
        }
        Commands::Status => print_status(&cli, &config),
        Commands::Replay { file, record } => run_replay(&cli, config, &file, record).await,
        Commands::History {
            package,
            severity,
            limit,
        } => print_history(&cli, &config, package, severity, limit),
    }
}

fn load_config(path: Option<&Path>) -> Config {
    let loaded = match path {
        Some(path) => Config::load_from_path(path),
        None => Config::load(),
    };
    loaded.unwrap_or_else(|e| {
        eprintln!(
            "{}",
            t_args("error-config-fallback", &[("error", &e.to_string())]).yellow()
        );
        Config::default()
    })
}

fn db_path(cli: &Cli, config: &Config) -> Result<PathBuf> {
    match &cli.db {
        Some(path) => Ok(path.clone()),
        None => Ok(config.storage.effective_db_path()?),
    }
}

fn open_store(cli: &Cli, config: &Config) -> Result<SqliteStore> {
    let path = db_path(cli, config)?;
    SqliteStore::new(&path)
        .with_context(|| format!("{}: {}", t("error-open-store"), path.display()))
}

fn logger_config(cli: &Cli) -> LoggerConfig {
    LoggerConfig {
        format: cli.format.into(),
        min_severity: cli.min_severity.into(),
        show_timestamps: !cli.no_timestamps,
        use_colors: !cli.no_color,
        ..LoggerConfig::default()
    }
}

fn print_version() {
    println!(
        "{} v{}",
        t("version-title").cyan().bold(),
        wordguard_core::VERSION
    );
    println!("{}", t("version-subtitle"));
    println!();
    println!("{}: {}", t("version-core-label"), wordguard_core::NAME);
}

fn print_usage() {
    println!("{}", t("usage-title").cyan().bold());
    println!("{}", t("usage-subtitle"));
    println!();
    println!("{}", t("usage-label").yellow());
    println!("    {}", t("usage-line1"));
    println!("    {}", t("usage-line2"));
    println!();
    println!("{}", t("examples-label").yellow());
    println!("    {}", t("example-check"));
    println!("    {}", t("example-domain"));
    println!("    {}", t("example-words"));
    println!("    {}", t("example-replay"));
    println!();
    println!("{}", t("usage-help-hint"));
}

fn check_text(
    text: &str,
    config: &Config,
    store: &dyn StateStore,
    format: OutputFormat,
) -> Result<()> {
    let defaults = DefaultLists::load(&config.lists);
    let matchers = Matchers::build(&defaults, store)?;
    let policy = BlockPolicy::from(&config.filter);
    let urls = extract_urls(text);

    // Evaluate against scratch state so a check never blocks anything
    let scratch = MemoryStore::new();
    let decision = policy.evaluate(
        CLI_PACKAGE,
        text,
        &urls,
        SystemClock.now_ms(),
        &scratch,
        &matchers,
    )?;
    let words = matchers.words.matched_words(text);
    let frequencies = matchers.words.word_frequencies(text);

    match format {
        OutputFormat::Pretty => {
            println!();
            println!("{}", t("check-title").cyan().bold());
            println!("{}", "\u{2500}".repeat(50));
            println!();
            println!("  {} {}", t("check-text-label").dimmed(), text);

            let verdict = if decision.is_enforce() {
                format!("\u{1f6ab} {}", t("check-blocked").red().bold())
            } else {
                format!("\u{2705} {}", t("check-allowed").green())
            };
            println!("  {} {}", t("check-decision-label").dimmed(), verdict);

            if !words.is_empty() {
                println!("  {} {}", t("check-words-label").dimmed(), words.join(", "));
                let counts: Vec<String> = frequencies
                    .iter()
                    .map(|(word, count)| format!("{}={}", word, count))
                    .collect();
                println!(
                    "  {} {}",
                    t("check-frequencies-label").dimmed(),
                    counts.join(", ")
                );
            }
            match decision.reason() {
                Some(Reason::Frequency { word, count, .. }) => {
                    let count = count.to_string();
                    let threshold = policy.frequency_threshold().to_string();
                    println!(
                        "  {}",
                        t_args(
                            "check-frequency-block",
                            &[("word", word), ("count", &count), ("threshold", &threshold)]
                        )
                        .red()
                    );
                }
                Some(Reason::Site { root, .. }) => {
                    println!("  {} {}", t("check-site-label").dimmed(), root.red());
                }
                _ => {}
            }
            println!();
        }
        OutputFormat::Json => {
            let result = serde_json::json!({
                "text": text,
                "blocked": decision.is_enforce(),
                "reason": decision.reason().map(|r| r.describe(CLI_PACKAGE)),
                "words": words,
                "frequencies": frequencies,
                "urls": urls,
            });
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        OutputFormat::Compact => {
            let verdict = if decision.is_enforce() {
                t("check-blocked")
            } else {
                t("check-allowed")
            };
            let reason = decision
                .reason()
                .map(|r| r.describe(CLI_PACKAGE))
                .unwrap_or_default();
            println!("[{}] {}", verdict, reason);
        }
    }

    Ok(())
}

fn check_domain(
    url: &str,
    config: &Config,
    store: &dyn StateStore,
    format: OutputFormat,
) -> Result<()> {
    let defaults = DefaultLists::load(&config.lists);
    let matchers = Matchers::build(&defaults, store)?;
    let root = root_domain(url);
    let blocked = matchers.sites.is_site_blocked(url);

    match format {
        OutputFormat::Json => {
            let result = serde_json::json!({
                "url": url,
                "root": root,
                "blocked": blocked,
            });
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        OutputFormat::Pretty | OutputFormat::Compact => {
            let verdict = if blocked {
                t("domain-blocked").red().bold().to_string()
            } else {
                t("domain-not-blocked").green().to_string()
            };
            println!("{} {} ({})", t("domain-root-label").dimmed(), root, verdict);
        }
    }

    Ok(())
}

fn list_label(key: SetKey) -> String {
    match key {
        SetKey::UserWords => t("list-words"),
        SetKey::UserSites => t("list-sites"),
        SetKey::Recipients => t("list-recipients"),
    }
}

fn manage_list(cli: &Cli, config: &Config, key: SetKey, action: ListAction) -> Result<()> {
    let store = open_store(cli, config)?;
    let label = list_label(key);

    match action {
        ListAction::Add { value } => {
            let added = store.add_entry(key, &value)?;
            let id = if added { "list-added" } else { "list-exists" };
            println!("{}", t_args(id, &[("value", &value), ("list", &label)]));
        }
        ListAction::Remove { value } => {
            let removed = store.remove_entry(key, &value)?;
            let id = if removed {
                "list-removed"
            } else {
                "list-missing"
            };
            println!("{}", t_args(id, &[("value", &value), ("list", &label)]));
        }
        ListAction::List => {
            let entries = store.load_set(key)?;
            match cli.format {
                OutputFormat::Json => {
                    println!("{}", serde_json::to_string_pretty(&entries)?);
                }
                OutputFormat::Pretty | OutputFormat::Compact => {
                    if entries.is_empty() {
                        println!("{}", t_args("list-empty", &[("list", &label)]).dimmed());
                    }
                    for entry in &entries {
                        println!("{}", entry);
                    }
                }
            }
        }
    }

    Ok(())
}

fn print_status(cli: &Cli, config: &Config) -> Result<()> {
    let path = db_path(cli, config)?;
    let store = open_store(cli, config)?;
    let state = store.load_block_state()?;
    let last_run = store.load_last_run()?;
    let now = SystemClock.now_ms();

    let counts = [SetKey::UserWords, SetKey::UserSites, SetKey::Recipients]
        .into_iter()
        .map(|key| -> Result<(SetKey, usize)> { Ok((key, store.load_set(key)?.len())) })
        .collect::<Result<Vec<_>>>()?;

    if cli.format == OutputFormat::Json {
        let result = serde_json::json!({
            "db_path": path,
            "block_package": state.package,
            "block_end_time": state.block_end_time,
            "block_active": state.is_active(now),
            "last_run_time": last_run,
            "user_words": counts[0].1,
            "user_sites": counts[1].1,
            "recipients": counts[2].1,
        });
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    println!();
    println!("{}", t("status-title").cyan().bold());
    println!("{}", "\u{2500}".repeat(50));
    println!();
    println!("  {} {}", t("status-db-label").dimmed(), path.display());

    let block = match &state.package {
        None => t("status-block-none"),
        Some(package) if state.is_active(now) => {
            let until = millis_to_datetime(state.block_end_time)
                .format("%Y-%m-%d %H:%M:%S")
                .to_string();
            t_args(
                "status-block-active",
                &[("package", package), ("until", &until)],
            )
            .red()
            .to_string()
        }
        Some(package) => t_args("status-block-expired", &[("package", package)]),
    };
    println!("  {} {}", t("status-block-label").dimmed(), block);

    let last = if last_run == 0 {
        t("status-never")
    } else {
        millis_to_datetime(last_run)
            .format("%Y-%m-%d %H:%M:%S")
            .to_string()
    };
    println!("  {} {}", t("status-last-run-label").dimmed(), last);

    println!("  {}", t("status-lists-label").dimmed());
    for (key, count) in counts {
        let count = count.to_string();
        println!(
            "    {}",
            t_args("list-count", &[("count", &count), ("list", &list_label(key))])
        );
    }
    println!();

    Ok(())
}

fn print_history(
    cli: &Cli,
    config: &Config,
    package: Option<String>,
    severity: Option<SeverityArg>,
    limit: usize,
) -> Result<()> {
    let store = open_store(cli, config)?;
    let events = store.query_events(&EventQuery {
        package,
        severity: severity.map(Into::into),
        limit: Some(limit),
        ..EventQuery::default()
    })?;

    if events.is_empty() {
        println!("{}", t("history-empty").dimmed());
        return Ok(());
    }

    let logger = Logger::new(logger_config(cli));
    let mut stdout = std::io::stdout().lock();
    for event in events.iter().rev() {
        logger.log(event, &mut stdout)?;
    }

    Ok(())
}

/// Copy the persistent lists and block state into a throwaway store
fn scratch_store(source: &dyn StateStore) -> Result<MemoryStore> {
    let scratch = MemoryStore::new();
    for key in [SetKey::UserWords, SetKey::UserSites, SetKey::Recipients] {
        scratch.save_set(key, &source.load_set(key)?)?;
    }
    scratch.save_block_state(&source.load_block_state()?)?;
    Ok(scratch)
}

async fn run_replay(cli: &Cli, config: Config, file: &Path, record: bool) -> Result<()> {
    let records = replay::read_records(file)?;
    let path = db_path(cli, &config)?;
    let persistent = open_store(cli, &config)?;

    let counter = Arc::new(MemorySink::new());
    let clock = Arc::new(ManualClock::new(SystemClock.now_ms()));
    let host = Arc::new(SimulatedHost::new());

    let notifier: Arc<dyn Notifier> = if config.notify.enabled {
        Arc::new(OutboxNotifier::new(
            config.notify.effective_outbox_path()?,
            config.notify.secret.clone(),
        ))
    } else {
        Arc::new(NullNotifier)
    };

    let session = if config.logging.enabled {
        let log_dir = config.logging.effective_log_dir()?;
        match cleanup_old_logs(&log_dir, config.logging.retention_days) {
            Ok(removed) if removed > 0 => info!("Removed {} expired session logs", removed),
            Ok(_) => {}
            Err(e) => warn!("Log cleanup failed: {}", e),
        }
        let mut logger = SessionLogger::new(&log_dir, None)?;
        logger.write_session_header("replay")?;
        Some(Arc::new(StorageSink::new(logger)))
    } else {
        None
    };

    let mut builder = if record {
        let events = SqliteStore::new(&path)?;
        FilterService::builder(host, Arc::new(persistent))
            .sink(Arc::new(StorageSink::new(events)))
    } else {
        FilterService::builder(host, Arc::new(scratch_store(&persistent)?))
    };
    builder = builder
        .config(config)
        .sink(Arc::new(Logger::new(logger_config(cli))))
        .sink(counter.clone())
        .notifier(notifier)
        .clock(clock.clone());
    if let Some(session) = &session {
        builder = builder.sink(session.clone());
    }
    let service: FilterService<SimulatedHost> = builder.build();

    let count = records.len().to_string();
    eprintln!("{}", t_args("replay-started", &[("count", &count)]).dimmed());

    service.start();
    let base_ms = clock.now_ms();
    replay::run(&service, &clock, &records, base_ms).await;
    service.stop();

    if let Some(session) = &session {
        session.with_storage(|logger| logger.write_session_footer())?;
    }

    let checks = counter
        .count(|t| matches!(t, EventType::Classification { .. }))
        .to_string();
    let enforcements = counter
        .count(|t| matches!(t, EventType::Enforcement { .. }))
        .to_string();
    eprintln!(
        "{}",
        t_args(
            "replay-finished",
            &[("checks", &checks), ("enforcements", &enforcements)]
        )
        .green()
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parse_no_command() {
        let cli = Cli::parse_from(["wordguard"]);
        assert!(cli.command.is_none());
        assert_eq!(cli.format, OutputFormat::Pretty);
        assert_eq!(cli.min_severity, SeverityArg::Info);
    }

    #[test]
    fn test_cli_parse_check() {
        let cli = Cli::parse_from(["wordguard", "check", "some text"]);
        match cli.command {
            Some(Commands::Check { text }) => assert_eq!(text, "some text"),
            _ => panic!("Expected Check command"),
        }
    }

    #[test]
    fn test_cli_parse_global_options_after_subcommand() {
        let cli = Cli::parse_from(["wordguard", "status", "--format", "json", "--db", "/tmp/x.db"]);
        assert_eq!(cli.format, OutputFormat::Json);
        assert_eq!(cli.db, Some(PathBuf::from("/tmp/x.db")));
        assert!(matches!(cli.command, Some(Commands::Status)));
    }

    #[test]
    fn test_cli_parse_list_actions() {
        let cli = Cli::parse_from(["wordguard", "words", "add", "forbidden"]);
        match cli.command {
            Some(Commands::Words { action }) => assert_eq!(
                action,
                ListAction::Add {
                    value: "forbidden".to_string()
                }
            ),
            _ => panic!("Expected Words command"),
        }

        let cli = Cli::parse_from(["wordguard", "recipients", "list"]);
        assert!(matches!(
            cli.command,
            Some(Commands::Recipients {
                action: ListAction::List
            })
        ));
    }

    #[test]
    fn test_cli_parse_replay() {
        let cli = Cli::parse_from(["wordguard", "replay", "session.jsonl", "--record"]);
        match cli.command {
            Some(Commands::Replay { file, record }) => {
                assert_eq!(file, PathBuf::from("session.jsonl"));
                assert!(record);
            }
            _ => panic!("Expected Replay command"),
        }
    }

    #[test]
    fn test_cli_parse_history() {
        let cli = Cli::parse_from([
            "wordguard", "history", "-p", "com.chat", "--severity", "block", "-n", "5",
        ]);
        match cli.command {
            Some(Commands::History {
                package,
                severity,
                limit,
            }) => {
                assert_eq!(package.as_deref(), Some("com.chat"));
                assert_eq!(severity, Some(SeverityArg::Block));
                assert_eq!(limit, 5);
            }
            _ => panic!("Expected History command"),
        }
    }

    #[test]
    fn test_output_format_conversion() {
        assert_eq!(LogFormat::from(OutputFormat::Pretty), LogFormat::Pretty);
        assert_eq!(LogFormat::from(OutputFormat::Json), LogFormat::JsonLines);
        assert_eq!(LogFormat::from(OutputFormat::Compact), LogFormat::Compact);
    }

    #[test]
    fn test_severity_conversion() {
        assert_eq!(Severity::from(SeverityArg::Info), Severity::Info);
        assert_eq!(Severity::from(SeverityArg::Block), Severity::Block);
    }

    #[test]
    fn test_scratch_store_copies_lists() {
        let source = MemoryStore::new();
        source.add_entry(SetKey::UserWords, "Forbidden").unwrap();
        source.add_entry(SetKey::Recipients, "a@example.com").unwrap();

        let scratch = scratch_store(&source).unwrap();
        assert!(scratch.load_set(SetKey::UserWords).unwrap().contains("forbidden"));
        assert_eq!(scratch.recipients().unwrap(), vec!["a@example.com".to_string()]);

        // Writes to the copy leave the source alone
        scratch.add_entry(SetKey::UserWords, "other").unwrap();
        assert_eq!(source.load_set(SetKey::UserWords).unwrap().len(), 1);
    }

    #[test]
    fn test_user_word_blocks_check() {
        let store = MemoryStore::new();
        store.add_entry(SetKey::UserWords, "forbidden").unwrap();
        let defaults = DefaultLists::load(&Default::default());
        let matchers = Matchers::build(&defaults, &store).unwrap();

        let decision = BlockPolicy::default()
            .evaluate(CLI_PACKAGE, "a forbidden thing", &[], 0, &MemoryStore::new(), &matchers)
            .unwrap();
        assert!(decision.is_enforce());
    }
}
