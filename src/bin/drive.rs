//! safe-drive binary
//!
//! Compares routes, simulates a drive on the chosen one and talks to the
//! assistant, all against a running Smart Drive server.
//!
//! ## Configuration (env / TOML via `config` crate)
//!
//! | Key                               | Default                 | Description                   |
//! |-----------------------------------|-------------------------|-------------------------------|
//! | `SAFE_DRIVE_CONFIG`               | *(none)*                | Optional TOML file            |
//! | `SAFE_DRIVE_SERVER_URL`           | `http://localhost:8080` | Smart Drive server            |
//! | `SAFE_DRIVE_TICK_INTERVAL_MS`     | `3000`                  | Pause between checkpoints     |
//! | `SAFE_DRIVE_ANNOUNCEMENT`         | `current`               | `current` or `lookahead`      |
//! | `SAFE_DRIVE_STREAM_TIMEOUT_SECS`  | `30`                    | Enrichment stream timeout     |
//! | `SAFE_DRIVE_REQUEST_TIMEOUT_SECS` | `60`                    | Analyze / chat timeout        |

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use safe_drive::{
    AnnouncementPolicy, DriveObserver, NavigatorConfig, NavigatorSession, RoutePoint,
    SimulationStats, VoicePacket,
};
use std::path::PathBuf;
use tokio::sync::oneshot;

// ---------------------------------------------------------------------------
// CLI
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(name = "safe-drive", about = "Safe Drive navigator", version)]
struct Args {
    /// TOML configuration file
    #[arg(long, env = "SAFE_DRIVE_CONFIG")]
    config: Option<PathBuf>,

    /// Smart Drive server URL (overrides configuration)
    #[arg(long)]
    server: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Compare routes, pick one and simulate the drive
    Drive {
        /// Start location
        start: String,
        /// Destination
        end: String,

        /// 1-based route to drive instead of the safest
        #[arg(long)]
        route: Option<usize>,

        /// Pause between checkpoints in milliseconds
        #[arg(long)]
        tick_ms: Option<u64>,

        /// Which checkpoint to announce on each tick
        #[arg(long, value_enum)]
        announcement: Option<AnnouncementPolicy>,

        /// Start immediately with fallback packets instead of waiting for the enriched stream
        #[arg(long)]
        no_wait: bool,
    },

    /// Send one message to the assistant
    Chat {
        #[arg(required = true)]
        message: Vec<String>,
    },

    /// Forget the assistant conversation
    ClearChat,
}

// ---------------------------------------------------------------------------
// Observer
// ---------------------------------------------------------------------------

struct ConsoleObserver {
    done: Option<oneshot::Sender<SimulationStats>>,
}

impl DriveObserver for ConsoleObserver {
    fn on_advance(&mut self, index: usize, point: RoutePoint) {
        println!("  [{:>3}] at {}", index + 1, point);
    }

    fn on_announce(&mut self, packet: &VoicePacket) {
        println!("  >> {}", packet.text);
    }

    fn on_completed(&mut self, stats: &SimulationStats) {
        if let Some(tx) = self.done.take() {
            if tx.send(stats.clone()).is_err() {
                log::debug!("Completion receiver already dropped");
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    // Initialise logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("safe_drive=info".parse()?),
        )
        .init();

    let args = Args::parse();

    let mut config =
        NavigatorConfig::load(args.config.as_deref()).context("Failed to load configuration")?;
    if let Some(server) = args.server {
        config.server_url = server;
    }

    match args.command {
        Command::Drive {
            start,
            end,
            route,
            tick_ms,
            announcement,
            no_wait,
        } => {
            if let Some(ms) = tick_ms {
                config.tick_interval_ms = ms;
            }
            if let Some(policy) = announcement {
                config.announcement = policy;
            }
            drive(config, &start, &end, route, !no_wait).await
        }
        Command::Chat { message } => {
            let session = NavigatorSession::new(config)?;
            let reply = session
                .chat(&message.join(" "))
                .await
                .context("Chat request failed")?;
            println!("{reply}");
            Ok(())
        }
        Command::ClearChat => {
            let session = NavigatorSession::new(config)?;
            session.clear_chat().await.context("Failed to clear session")?;
            println!("Conversation cleared");
            Ok(())
        }
    }
}

async fn drive(
    config: NavigatorConfig,
    start: &str,
    end: &str,
    route: Option<usize>,
    wait_for_enrichment: bool,
) -> Result<()> {
    log::info!(
        "Starting safe-drive (server='{}', tick={}ms, announcement={:?})",
        config.server_url,
        config.tick_interval_ms,
        config.announcement,
    );

    let mut session = NavigatorSession::new(config)?;
    let safest = session
        .analyze(start, end)
        .await
        .context("Route analysis failed")?;

    for (i, details) in session.details().iter().enumerate() {
        let star = if i == safest { "★ " } else { "" };
        println!("{star}Route {}: {details}", i + 1);
    }

    if let Some(n) = route {
        let index = n.checked_sub(1).context("Routes are numbered from 1")?;
        session
            .select_route(index)
            .with_context(|| format!("Cannot drive route {n}"))?;
    }

    if let Ok(overview) = session.overview() {
        if let Some(bounds) = overview.bounds {
            log::info!(
                "Route spans {} points around {}",
                overview.path.len(),
                bounds.center()
            );
        }
    }

    if wait_for_enrichment && session.wait_for_enrichment().await {
        log::info!("Using enriched voice packets");
    }

    let (tx, rx) = oneshot::channel();
    session.simulate(ConsoleObserver { done: Some(tx) })?;

    tokio::select! {
        stats = rx => {
            if let Ok(stats) = stats {
                log::info!(
                    "Arrived: {} checkpoints, {} announcements, {} repeats suppressed",
                    stats.advances,
                    stats.announcements,
                    stats.suppressed_repeats
                );
            }
        }
        _ = tokio::signal::ctrl_c() => {
            log::info!("Stopping simulation (SIGINT)");
            session.stop();
        }
    }

    Ok(())
}
