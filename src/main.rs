//! lewei-stream daemon: drives the drone session and writes decoded frames
//!
//! One receive/dispatch loop owns the socket and all protocol state; a
//! second thread consumes completed frames (codec validation, salvage,
//! persistence). Ctrl-C stops both.

use lewei_stream::config::Config;
use lewei_stream::error::{Error, Result};
use lewei_stream::session::SessionDriver;
use lewei_stream::sink::FrameWriter;
use lewei_stream::transport::UdpTransport;
use std::env;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

/// Completed frames buffered between the session loop and the writer.
/// Small on purpose: when the writer falls behind, stale video is worthless.
const FRAME_QUEUE_DEPTH: usize = 8;

/// Parse config path from command line arguments.
///
/// Supports:
/// - `lewei-stream <path>` (positional)
/// - `lewei-stream --config <path>` (flag-based)
/// - `lewei-stream -c <path>` (short flag)
///
/// Defaults to `lewei-stream.toml` if not specified.
fn parse_config_path() -> String {
    let args: Vec<String> = env::args().collect();

    // Look for --config or -c flag
    for i in 1..args.len() {
        if (args[i] == "--config" || args[i] == "-c") && i + 1 < args.len() {
            return args[i + 1].clone();
        }
    }

    // Fall back to first positional argument (if it doesn't start with -)
    if args.len() > 1 && !args[1].starts_with('-') {
        return args[1].clone();
    }

    // Default path
    "lewei-stream.toml".to_string()
}

fn main() -> Result<()> {
    let config_path = parse_config_path();
    let (config, config_loaded) = if Path::new(&config_path).exists() {
        (Config::from_file(&config_path)?, true)
    } else {
        (Config::default(), false)
    };

    // RUST_LOG still wins over the configured level
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(config.logging.level.as_str()),
    )
    .init();

    log::info!("lewei-stream v{} starting...", env!("CARGO_PKG_VERSION"));
    if config_loaded {
        log::info!("Using config: {}", config_path);
    } else {
        log::info!("No config at {}, using U61W defaults", config_path);
    }
    log::info!(
        "Drone at {} (local port {})",
        config.drone.command_addr(),
        config.drone.local_port
    );

    // Set up shutdown signal handler
    let running = Arc::new(AtomicBool::new(true));
    let r = Arc::clone(&running);
    ctrlc::set_handler(move || {
        log::info!("Received shutdown signal");
        r.store(false, Ordering::Relaxed);
    })
    .map_err(|e| Error::Other(format!("Error setting Ctrl-C handler: {}", e)))?;

    // Bind failure is the one fatal startup error
    let transport = UdpTransport::bind(config.drone.local_port, config.drone.command_addr())?;

    let (frames_tx, frames_rx) = crossbeam_channel::bounded(FRAME_QUEUE_DEPTH);
    let mut driver = SessionDriver::new(
        transport,
        config.drone.heartbeat_interval(),
        frames_tx,
        Arc::clone(&running),
    );

    if config.capture.enabled {
        let file = File::create(&config.capture.path)?;
        log::info!("Raw capture -> {}", config.capture.path.display());
        driver = driver.with_capture(Box::new(BufWriter::new(file)));
    }

    // Frame writer thread: codec validation, salvage, persistence
    let stats = driver.stats();
    let writer_running = Arc::clone(&running);
    let writer_stats = Arc::clone(&stats);
    let policy = config.repair.policy();
    let frames_dir = config.output.frames_dir.clone();
    let writer_handle = thread::Builder::new()
        .name("frame-writer".to_string())
        .spawn(move || {
            FrameWriter::new(frames_rx, policy, frames_dir, writer_running, writer_stats).run();
        })
        .map_err(|e| Error::Other(format!("Failed to spawn frame writer: {}", e)))?;

    // The session loop runs on the main thread until Ctrl-C
    let result = driver.run();

    running.store(false, Ordering::Relaxed);
    if let Err(e) = writer_handle.join() {
        log::error!("Frame writer panicked: {:?}", e);
    }

    log::info!("lewei-stream stopped");
    result
}
