// Copyright (c) 2026 cueclock project
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/cueclock/cueclock-rs

//! cueclock - camera-driven billiards shot clock
//!
//! Runs the appliance: shared frame source, game registry, event bus and
//! WebSocket broadcaster. The HTTP control API lives in a separate
//! service and talks to the registry; the demo mode drives a simulated
//! table so the whole control loop can be watched end to end.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tokio::sync::broadcast;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use cueclock::core::{AlarmSink, BusAlarm, EventBus};
use cueclock::game::{GameRegistry, Ruleset};
use cueclock::streaming::StreamingManager;
use cueclock::vision::TableSimulator;
use cueclock::{Config, VERSION};

/// cueclock - camera-driven billiards shot clock
#[derive(Parser, Debug)]
#[command(name = "cueclock")]
#[command(author = "cueclock project")]
#[command(version = VERSION)]
#[command(about = "Billiards shot clock driven by table-side motion detection")]
struct Args {
    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Enable trace-level logging
    #[arg(long)]
    trace: bool,

    /// Demo mode with a simulated table camera
    #[arg(long)]
    demo: bool,

    /// WebSocket server port
    #[arg(long)]
    ws_port: Option<u16>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.trace {
        Level::TRACE
    } else if args.debug {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(args.debug)
        .with_line_number(args.debug)
        .with_ansi(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("cueclock v{} - camera-driven shot clock", VERSION);

    // Load or create configuration
    let config_path = args.config.unwrap_or_else(Config::default_path);
    let mut config = Config::load_or_create(&config_path)?;

    // Override with command line args
    if args.demo {
        config.demo_mode = true;
    }
    if let Some(port) = args.ws_port {
        config.streaming.websocket_port = port;
    }

    info!("Configuration loaded from {:?}", config_path);
    info!("Demo mode: {}", config.demo_mode);

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(run(config))
}

async fn run(config: Config) -> Result<()> {
    let events = Arc::new(EventBus::new(1000));
    let alarm: Arc<dyn AlarmSink> = Arc::new(BusAlarm::new(events.clone()));

    // One shared frame source for every consumer, built once here.
    let source = if config.demo_mode {
        Arc::new(TableSimulator::new(&config.video).with_noise(1.0))
    } else {
        anyhow::bail!("no camera backend is wired in yet; run with --demo");
    };

    let registry = GameRegistry::new(&config, events.clone(), alarm, source.clone());

    let (shutdown_tx, _) = broadcast::channel(1);
    let mut streaming = StreamingManager::new(config.streaming.clone(), events.clone());
    streaming.start(shutdown_tx.subscribe()).await?;

    // Demo match on the simulated table
    let game = registry.create_game(Ruleset::wpa(), source.preset(), "Player 1", "Player 2");
    game.start()?;

    // Scripted shots so the demo has movement to detect
    let sim = source.clone();
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(Duration::from_secs(25)).await;
            sim.set_velocity(1, (4.0, 2.0));
            tokio::time::sleep(Duration::from_millis(1500)).await;
            sim.stop_all();
        }
    });

    info!("cueclock running, press Ctrl+C to shut down");
    tokio::signal::ctrl_c().await?;

    info!("Shutdown signal received, cleaning up...");
    let _ = shutdown_tx.send(());
    let _ = registry.end_game();

    info!("cueclock shutdown complete");
    Ok(())
}
