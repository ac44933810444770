use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tabled::{Table, Tabled};
use uuid::Uuid;

use apsentry::alerts::{AlertRecord, Severity};
use apsentry::config::Config;
use apsentry::models::{AccessPointRecord, Bssid, NetworkStatus, OverrideKind};
use apsentry::session::ScanTrigger;
use apsentry::sources::JsonScanSource;
use apsentry::whitelist::{watch_whitelist_file, FileWhitelistSource, WhitelistSource};
use apsentry::{ApSentry, ScanOutcome, ScanReport};

#[derive(Parser)]
#[command(name = "apsentry")]
#[command(author, version, about = "Evil-twin detection for Wi-Fi access points")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    pub fn load_config(&self) -> Result<Config> {
        match &self.config {
            Some(path) => Config::load(path),
            None => Config::load_or_default(),
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run one scan pass over recorded observations
    Scan {
        /// JSON array of access point observations
        #[arg(short, long)]
        observations: PathBuf,

        /// JSON whitelist file (overrides the configured one)
        #[arg(short, long)]
        whitelist: Option<PathBuf>,

        /// Treat the pass as a background scan (no summary alert)
        #[arg(long)]
        background: bool,

        /// Output format (table, json)
        #[arg(short, long, default_value = "table")]
        format: String,
    },

    /// Rescan an observations file periodically as background passes
    Monitor {
        /// JSON array of access point observations
        #[arg(short, long)]
        observations: PathBuf,

        /// Seconds between passes
        #[arg(short, long, default_value = "30")]
        interval: u64,
    },

    /// Trust an access point
    Trust {
        bssid: Bssid,

        /// Network name to store with the override
        #[arg(short, long)]
        ssid: Option<String>,
    },

    /// Flag an access point for review
    Flag {
        bssid: Bssid,

        #[arg(short, long)]
        ssid: Option<String>,
    },

    /// Block an access point
    Block {
        bssid: Bssid,

        #[arg(short, long)]
        ssid: Option<String>,
    },

    /// Remove trust from an access point
    Untrust { bssid: Bssid },

    /// Remove a flag from an access point
    Unflag { bssid: Bssid },

    /// Unblock an access point
    Unblock { bssid: Bssid },

    /// List override bindings
    Overrides,

    /// List alerts
    Alerts {
        /// Include archived alerts
        #[arg(short, long)]
        all: bool,

        /// Output format (table, json)
        #[arg(short, long, default_value = "table")]
        format: String,
    },

    /// Update one alert
    Alert {
        #[command(subcommand)]
        action: AlertCommand,
    },

    /// Show recent activity logs
    Logs {
        /// Number of entries to show
        #[arg(short, long, default_value = "20")]
        limit: u32,
    },

    /// Generate default configuration file
    GenConfig {
        /// Output path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
pub enum AlertCommand {
    /// Mark an alert as read
    Read { id: Uuid },

    /// Archive an alert
    Archive { id: Uuid },

    /// Mark a threat alert as reported
    Report { id: Uuid },
}

/// Table row for access points
#[derive(Tabled)]
struct RecordRow {
    #[tabled(rename = "SSID")]
    ssid: String,
    #[tabled(rename = "BSSID")]
    bssid: String,
    #[tabled(rename = "Signal")]
    signal: i32,
    #[tabled(rename = "Security")]
    security: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Score")]
    score: String,
}

/// Table row for overrides
#[derive(Tabled)]
struct OverrideRow {
    #[tabled(rename = "BSSID")]
    bssid: String,
    #[tabled(rename = "SSID")]
    ssid: String,
    #[tabled(rename = "Override")]
    kind: String,
    #[tabled(rename = "Applied")]
    applied: String,
}

/// Table row for alerts
#[derive(Tabled)]
struct AlertRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Severity")]
    severity: String,
    #[tabled(rename = "Kind")]
    kind: String,
    #[tabled(rename = "Message")]
    message: String,
    #[tabled(rename = "Report")]
    report: String,
    #[tabled(rename = "Time")]
    time: String,
}

/// Table row for activity log
#[derive(Tabled)]
struct ActivityRow {
    #[tabled(rename = "Time")]
    time: String,
    #[tabled(rename = "Action")]
    action: String,
    #[tabled(rename = "BSSID")]
    bssid: String,
    #[tabled(rename = "Details")]
    details: String,
}

pub async fn run_command(cli: Cli, config: Config) -> Result<()> {
    match cli.command {
        Commands::Scan {
            observations,
            whitelist,
            background,
            format,
        } => cmd_scan(config, observations, whitelist, background, format).await,
        Commands::Monitor {
            observations,
            interval,
        } => cmd_monitor(config, observations, interval).await,
        Commands::Trust { bssid, ssid } => cmd_override(config, bssid, OverrideKind::Trusted, ssid),
        Commands::Flag { bssid, ssid } => cmd_override(config, bssid, OverrideKind::Flagged, ssid),
        Commands::Block { bssid, ssid } => cmd_override(config, bssid, OverrideKind::Blocked, ssid),
        Commands::Untrust { bssid } => cmd_revoke(config, bssid, OverrideKind::Trusted),
        Commands::Unflag { bssid } => cmd_revoke(config, bssid, OverrideKind::Flagged),
        Commands::Unblock { bssid } => cmd_revoke(config, bssid, OverrideKind::Blocked),
        Commands::Overrides => cmd_overrides(config),
        Commands::Alerts { all, format } => cmd_alerts(config, all, format),
        Commands::Alert { action } => cmd_alert(config, action),
        Commands::Logs { limit } => cmd_logs(config, limit),
        Commands::GenConfig { output } => cmd_gen_config(output),
    }
}

fn open(config: Config) -> Result<ApSentry> {
    let db_path = config.db_path();
    ApSentry::open(config)
        .with_context(|| format!("Failed to open database: {}", db_path.display()))
}

fn whitelist_source(config: &Config, path: Option<PathBuf>) -> Option<FileWhitelistSource> {
    path.or_else(|| config.whitelist.path.as_ref().map(PathBuf::from))
        .map(FileWhitelistSource::new)
}

async fn cmd_scan(
    config: Config,
    observations: PathBuf,
    whitelist: Option<PathBuf>,
    background: bool,
    format: String,
) -> Result<()> {
    let whitelist = whitelist_source(&config, whitelist);
    let sentry = open(config)?;
    let source = JsonScanSource::new(&observations);
    let trigger = if background {
        ScanTrigger::Background
    } else {
        ScanTrigger::User
    };

    let report = sentry
        .run_scan(
            trigger,
            &source,
            whitelist.as_ref().map(|w| w as &dyn WhitelistSource),
        )
        .await?;

    if format == "json" {
        println!("{}", serde_json::to_string_pretty(&report.records)?);
        return Ok(());
    }

    print_report(&report);
    Ok(())
}

async fn cmd_monitor(config: Config, observations: PathBuf, interval: u64) -> Result<()> {
    let whitelist = whitelist_source(&config, None).map(Arc::new);
    let watch = config.whitelist.watch;
    let sentry = open(config)?;
    let source = JsonScanSource::new(&observations);

    if let (Some(whitelist), true) = (&whitelist, watch) {
        let watched = Arc::clone(whitelist);
        let cache = sentry.whitelist_cache();
        tokio::spawn(async move {
            if let Err(e) = watch_whitelist_file(watched, cache).await {
                tracing::error!("Whitelist watcher stopped: {}", e);
            }
        });
    }

    println!(
        "Monitoring {} every {}s (Ctrl+C to stop)",
        observations.display(),
        interval
    );

    let mut ticker = tokio::time::interval(Duration::from_secs(interval.max(1)));
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let report = sentry
                    .run_scan(
                        ScanTrigger::Background,
                        &source,
                        whitelist.as_deref().map(|w| w as &dyn WhitelistSource),
                    )
                    .await?;
                if report.alerts_emitted > 0 || !report.is_completed() {
                    print_report(&report);
                }
            }
            _ = tokio::signal::ctrl_c() => {
                println!("\nShutting down...");
                break;
            }
        }
    }

    Ok(())
}

fn print_report(report: &ScanReport) {
    match &report.outcome {
        ScanOutcome::Completed => {}
        ScanOutcome::ScanFailed(reason) => {
            println!("{} {}", "Scan failed:".red().bold(), reason);
            println!("Showing results from the previous scan");
        }
        ScanOutcome::Superseded { latest } => {
            println!(
                "{} pass {} replaced by pass {}",
                "Superseded:".yellow().bold(),
                report.session_id,
                latest
            );
        }
    }

    if report.records.is_empty() {
        println!("No access points");
    } else {
        let rows: Vec<RecordRow> = report.records.iter().map(record_row).collect();
        println!("{}", Table::new(rows));
    }

    println!(
        "{} networks, {} threats, {} alerts",
        report.records.len(),
        report.threats.to_string().red(),
        report.alerts_emitted.to_string().cyan()
    );
}

fn record_row(record: &AccessPointRecord) -> RecordRow {
    RecordRow {
        ssid: record.ssid().to_string(),
        bssid: record.bssid().to_string(),
        signal: record.observation.signal_strength,
        security: record.observation.security_type.to_string(),
        status: colored_status(record.status),
        score: record
            .assessment
            .as_ref()
            .map(|a| a.score.to_string())
            .unwrap_or_default(),
    }
}

fn colored_status(status: NetworkStatus) -> String {
    let label = status.to_string();
    match status {
        NetworkStatus::Suspicious => label.red().bold().to_string(),
        NetworkStatus::Blocked => label.red().to_string(),
        NetworkStatus::Flagged => label.yellow().to_string(),
        NetworkStatus::Trusted | NetworkStatus::Verified => label.green().to_string(),
        NetworkStatus::Unknown => label,
    }
}

fn cmd_override(config: Config, bssid: Bssid, kind: OverrideKind, ssid: Option<String>) -> Result<()> {
    let sentry = open(config)?;
    let change = sentry.apply_override(&bssid, kind, ssid.as_deref())?;

    let verb = match kind {
        OverrideKind::Trusted => "Trusted:",
        OverrideKind::Flagged => "Flagged:",
        OverrideKind::Blocked => "Blocked:",
    };
    println!("{} {}", verb.green().bold(), bssid);
    if let Some(origin) = change.origin_status {
        println!("Status before override: {}", origin);
    }

    Ok(())
}

fn cmd_revoke(config: Config, bssid: Bssid, kind: OverrideKind) -> Result<()> {
    let sentry = open(config)?;

    match sentry.revoke_override(&bssid, kind)? {
        Some(change) => {
            println!(
                "{} {} ({} -> {})",
                "Removed override:".green().bold(),
                bssid,
                change.previous,
                change.current
            );
        }
        None => {
            println!("{} {} is not {}", "Note:".yellow().bold(), bssid, kind);
        }
    }

    Ok(())
}

fn cmd_overrides(config: Config) -> Result<()> {
    let sentry = open(config)?;
    let bindings = sentry.overrides()?;

    if bindings.is_empty() {
        println!("No overrides");
        return Ok(());
    }

    let rows: Vec<OverrideRow> = bindings
        .iter()
        .map(|b| OverrideRow {
            bssid: b.bssid.to_string(),
            ssid: b.ssid.clone(),
            kind: b.kind.to_string(),
            applied: b.applied_at.format("%Y-%m-%d %H:%M").to_string(),
        })
        .collect();

    println!("{}", Table::new(rows));
    Ok(())
}

fn cmd_alerts(config: Config, all: bool, format: String) -> Result<()> {
    let sentry = open(config)?;
    let alerts = sentry.alerts(all)?;

    if alerts.is_empty() {
        println!("No alerts");
        return Ok(());
    }

    if format == "json" {
        println!("{}", serde_json::to_string_pretty(&alerts)?);
        return Ok(());
    }

    let rows: Vec<AlertRow> = alerts.iter().map(alert_row).collect();
    println!("{}", Table::new(rows));
    Ok(())
}

fn alert_row(alert: &AlertRecord) -> AlertRow {
    let severity = alert.severity.to_string();
    let severity = match alert.severity {
        Severity::Critical | Severity::High => severity.red().bold().to_string(),
        Severity::Medium => severity.yellow().to_string(),
        Severity::Low | Severity::Info => severity,
    };

    let mut message = alert.message.clone();
    if !alert.is_read {
        message = message.bold().to_string();
    }

    AlertRow {
        id: alert.id.to_string(),
        severity,
        kind: alert.kind.to_string(),
        message,
        report: alert.report_status.to_string(),
        time: alert.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
    }
}

fn cmd_alert(config: Config, action: AlertCommand) -> Result<()> {
    let sentry = open(config)?;

    let (id, done, label) = match action {
        AlertCommand::Read { id } => (id, sentry.mark_alert_read(&id)?, "Marked read:"),
        AlertCommand::Archive { id } => (id, sentry.archive_alert(&id)?, "Archived:"),
        AlertCommand::Report { id } => (id, sentry.report_alert(&id)?, "Reported:"),
    };

    if done {
        println!("{} {}", label.green().bold(), id);
    } else {
        println!("{} no matching alert {}", "Note:".yellow().bold(), id);
    }

    Ok(())
}

fn cmd_logs(config: Config, limit: u32) -> Result<()> {
    let sentry = open(config)?;
    let logs = sentry.activity(limit)?;

    if logs.is_empty() {
        println!("No activity logs");
        return Ok(());
    }

    let rows: Vec<ActivityRow> = logs
        .iter()
        .map(|l| ActivityRow {
            time: l.timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
            action: l.action.to_string(),
            bssid: l.bssid.as_ref().map(|b| b.to_string()).unwrap_or_default(),
            details: l.details.clone(),
        })
        .collect();

    println!("{}", Table::new(rows));
    Ok(())
}

fn cmd_gen_config(output: Option<PathBuf>) -> Result<()> {
    let config = Config::default();

    match output {
        Some(path) => {
            config.save(&path)?;
            println!("Configuration written to {}", path.display());
        }
        None => {
            println!("{}", toml::to_string_pretty(&config)?);
        }
    }

    Ok(())
}
