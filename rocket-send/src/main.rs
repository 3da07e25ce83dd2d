//! rocket-send - Background daemon for scheduled posting
//!
//! Runs the scheduler loop and prints a timestamped line for every event
//! until it receives SIGINT or SIGTERM.

use chrono::{Local, Utc};
use clap::Parser;
use libsocialrocket::logging::LoggingConfig;
use libsocialrocket::service::events::{Event, EventReceiver};
use libsocialrocket::{Config, RocketError, RocketService};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::time::{sleep, Duration};
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "rocket-send")]
#[command(version)]
#[command(about = "Background daemon for scheduled posting")]
#[command(long_about = "\
rocket-send - Background daemon for scheduled posting

DESCRIPTION:
    rocket-send is a long-running daemon that scans the SocialRocket queue
    and publishes every post whose scheduled time has come.

    Each due post is published to all of its platforms at once, then moved
    to the posted directory together with its per-platform results. Failed
    platforms are recorded, not retried.

USAGE:
    # Run in foreground (events on stdout, logs on stderr)
    rocket-send

    # Scan every 10 seconds and really publish
    rocket-send --poll-interval 10 --live

    # Enable verbose logging
    rocket-send --verbose

SIGNALS:
    SIGTERM, SIGINT - Graceful shutdown (finishes the current scan)

CONFIGURATION:
    Configuration file: ~/.config/socialrocket/config.toml
    Data directory:     ~/.local/share/socialrocket

    [scheduling]
    poll_interval = 30          # seconds between scans
    dry_run = true              # log instead of publishing
    default_platforms = [\"X\"]  # for posts queued without platforms

EXIT CODES:
    0 - Clean shutdown
    1 - Runtime error
    3 - Invalid input
")]
struct Cli {
    /// Poll interval in seconds (overrides config)
    #[arg(long, value_name = "SECONDS")]
    #[arg(help = "How often to scan for due posts (default: 30)")]
    poll_interval: Option<u64>,

    /// Simulate publishing without opening a browser
    #[arg(long, conflicts_with = "live")]
    dry_run: bool,

    /// Really publish, overriding scheduling.dry_run
    #[arg(long)]
    live: bool,

    /// Enable verbose logging to stderr
    #[arg(short, long)]
    #[arg(help = "Enable verbose logging (useful for debugging)")]
    verbose: bool,

    /// Run once and exit (for testing)
    #[arg(long, hide = true)]
    #[arg(help = "Publish due posts once and exit (for testing)")]
    once: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    LoggingConfig::from_env(cli.verbose).init();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {:#}", e);
        let code = e
            .downcast_ref::<RocketError>()
            .map(RocketError::exit_code)
            .unwrap_or(1);
        std::process::exit(code);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = Config::load()?;
    if let Some(poll_interval) = cli.poll_interval {
        if poll_interval == 0 {
            return Err(RocketError::InvalidInput(
                "Poll interval must be at least 1 second".to_string(),
            )
            .into());
        }
        config.scheduling.poll_interval = poll_interval;
    }

    let (service, mut events) = RocketService::from_config(config)?;
    if cli.dry_run {
        service.set_dry_run(true);
    } else if cli.live {
        service.set_dry_run(false);
    }

    info!(
        "rocket-send starting ({} mode)",
        if service.registry().is_dry_run() { "dry run" } else { "live" }
    );

    if cli.once {
        let report = service.run_scheduler_once(Utc::now()).await;
        drain_events(&mut events);
        for (id, error) in &report.failed {
            warn!("Post {} could not be processed: {}", id, error);
        }
        info!("rocket-send: processed {} post(s) once, exiting", report.posted.len());
        return Ok(());
    }

    let shutdown = Arc::new(AtomicBool::new(false));
    setup_signal_handlers(shutdown.clone())?;

    service.start_scheduler();
    run_daemon_loop(&mut events, shutdown).await;
    service.stop_scheduler().await;
    drain_events(&mut events);

    info!("rocket-send daemon stopped");
    Ok(())
}

/// Set up signal handlers for graceful shutdown
#[cfg(unix)]
fn setup_signal_handlers(shutdown: Arc<AtomicBool>) -> anyhow::Result<()> {
    use anyhow::Context;
    use signal_hook::consts::{SIGINT, SIGTERM};
    use signal_hook::iterator::Signals;

    let mut signals = Signals::new([SIGINT, SIGTERM]).context("Signal setup failed")?;

    std::thread::spawn(move || {
        if signals.forever().next().is_some() {
            info!("Received shutdown signal, stopping gracefully...");
            shutdown.store(true, Ordering::Relaxed);
        }
    });

    Ok(())
}

#[cfg(not(unix))]
fn setup_signal_handlers(shutdown: Arc<AtomicBool>) -> anyhow::Result<()> {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received Ctrl-C, stopping gracefully...");
            shutdown.store(true, Ordering::Relaxed);
        }
    });
    Ok(())
}

/// Print events as they arrive until shutdown is requested
async fn run_daemon_loop(events: &mut EventReceiver, shutdown: Arc<AtomicBool>) {
    while !shutdown.load(Ordering::Relaxed) {
        tokio::select! {
            Some(event) = events.recv() => print_event(&event),
            _ = sleep(Duration::from_secs(1)) => {}
        }
    }
    info!("Shutdown requested, stopping scheduler");
}

fn drain_events(events: &mut EventReceiver) {
    while let Ok(event) = events.try_recv() {
        print_event(&event);
    }
}

/// One line of the running log
fn print_event(event: &Event) {
    println!("[{}] {}", Local::now().format("%H:%M:%S"), event);
}
