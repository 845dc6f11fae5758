//! HERALD - headless notification and presence daemon
//!
//! Runs the notification core of the team notes workspace outside the
//! browser: polls for deadline crossings, listens for push events, and
//! surfaces alerts on the terminal.
//!
//! ## Usage
//!
//! ```bash
//! # Run the daemon for a user
//! herald --user me@example.com
//!
//! # One-shot: check deadlines now and print the feed
//! herald --user me@example.com --check
//!
//! # With verbose logging
//! herald --user me@example.com -v
//! ```

use std::io::Write;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info};

use herald_core::{FileStateStore, LogGuard, SystemClock, init_logging};
use herald_notify::presenter::{AlertSink, PermissionState};
use herald_notify::record::{NotificationKind, NotificationRecord};
use herald_notify::sources::{RestChatApi, RestTaskSource};
use herald_notify::{NotificationService, NotifierConfig, ServiceDeps};
use herald_transport::EventTransport;

/// HERALD notification daemon
///
/// Watches task deadlines and chat activity for a user of the team notes
/// workspace and raises terminal alerts.
#[derive(Parser, Debug)]
#[command(name = "herald")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Push-event server address (host:port); overrides the config file
    #[arg(long)]
    server: Option<String>,

    /// REST API base URL; overrides the config file
    #[arg(long)]
    api: Option<String>,

    /// User email the feed runs for; overrides the config file
    #[arg(long)]
    user: Option<String>,

    /// Run one deadline check, print the feed, and exit
    #[arg(long)]
    check: bool,

    /// Enable verbose logging (increases log level)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Directory for log files (defaults to ~/.herald/logs/)
    #[arg(long)]
    log_dir: Option<std::path::PathBuf>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let _guard = match setup_logging(&cli) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {}", e);
            return ExitCode::from(1);
        }
    };

    match run(cli).await {
        Ok(()) => {
            info!("herald exited normally");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("herald error: {:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::from(1)
        }
    }
}

/// Set up logging based on CLI arguments.
fn setup_logging(cli: &Cli) -> herald_core::Result<LogGuard> {
    init_logging(cli.log_dir.clone(), cli.verbose > 0)
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = match NotifierConfig::default_path() {
        Some(path) => NotifierConfig::load(&path)?,
        None => NotifierConfig::default(),
    };
    if let Some(server) = cli.server {
        config.server_addr = server;
    }
    if let Some(api) = cli.api {
        config.api_base_url = api;
    }
    if let Some(user) = cli.user {
        config.user_email = user;
    }
    if config.user_email.is_empty() {
        anyhow::bail!(
            "no user configured; pass --user or set user_email in ~/.herald/config.yaml"
        );
    }

    let state = Arc::new(FileStateStore::open_default()?);
    let transport = Arc::new(EventTransport::with_config(
        config.server_addr.clone(),
        config.transport_config(),
    ));

    let service = NotificationService::new(
        config.clone(),
        ServiceDeps {
            transport,
            source: Arc::new(RestTaskSource::new(config.api_base_url.clone())),
            chat_api: Arc::new(RestChatApi::new(config.api_base_url.clone())),
            sink: Arc::new(TerminalAlertSink),
            state,
            clock: Arc::new(SystemClock),
        },
    );

    if cli.check {
        service.check_deadlines().await;
        print_feed(&service.notifications());
        return Ok(());
    }

    service.start();
    info!(user = %config.user_email, server = %config.server_addr, "herald running");
    println!("herald running for {} (Ctrl-C to stop)", config.user_email);

    tokio::signal::ctrl_c().await?;
    service.stop();

    Ok(())
}

fn print_feed(records: &[NotificationRecord]) {
    if records.is_empty() {
        println!("No notifications.");
        return;
    }
    for record in records {
        println!("{}", format_record(record));
    }
}

fn format_record(record: &NotificationRecord) -> String {
    let read_marker = if record.read { " " } else { "*" };
    format!(
        "{}{} [{}] {} - {}",
        read_marker,
        kind_marker(record.kind),
        record.timestamp.format("%H:%M:%S"),
        record.title,
        record.message
    )
}

fn kind_marker(kind: NotificationKind) -> &'static str {
    match kind {
        NotificationKind::DeadlineTask | NotificationKind::DeadlineAiTask => "⏰",
        NotificationKind::ChatMessage => "✉",
        NotificationKind::ChangeEvent => "✨",
    }
}

/// Alert sink for the terminal.
///
/// Toasts become stdout lines, platform notifications become stderr lines
/// (always "granted" here), and the chime rings the terminal bell. The
/// terminal bell has a single pitch, so one BEL stands in for the two-tone
/// chime.
struct TerminalAlertSink;

impl AlertSink for TerminalAlertSink {
    fn toast(&self, record: &NotificationRecord) {
        println!("{}", format_record(record));
    }

    fn notify_system(&self, title: &str, body: &str) -> bool {
        eprintln!("[notify] {}: {}", title, body);
        true
    }

    fn permission(&self) -> PermissionState {
        PermissionState::Granted
    }

    fn request_permission(&self) -> PermissionState {
        PermissionState::Granted
    }

    fn play_tone(&self) {
        print!("\x07");
        let _ = std::io::stdout().flush();
    }
}
