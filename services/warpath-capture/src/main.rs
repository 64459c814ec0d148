//! Warpath Capture - 802.11 monitor-mode sniffer
//!
//! Captures beacon and probe frames from a wireless interface, estimates the
//! distance to each transmitter and appends the decoded frames to a
//! JSON-lines file.

use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::Parser;
use crossbeam_channel::RecvTimeoutError;
use tracing::{debug, error, info, warn};

use warpath_capture::capture::{hw_addr_of, CaptureEngine, EngineControl, PcapProbe};
use warpath_capture::config::Config;
use warpath_capture::filter::FrameFilter;
use warpath_capture::hwaddr::{HwAddr, HwAddrIndex};
use warpath_capture::logging;
use warpath_capture::sink::{FrameSink, JsonLinesSink};

const STATS_INTERVAL: Duration = Duration::from_secs(10);

#[derive(Debug, Parser)]
#[command(name = "warpath-capture", version, about = "802.11 beacon and probe capture")]
struct Cli {
    /// Wireless interface to capture on (overrides config and environment)
    #[arg(short, long)]
    device: Option<String>,

    /// Stop after this many frames; negative captures until interrupted
    #[arg(short, long, default_value_t = -1, allow_negative_numbers = true)]
    count: i64,

    /// Configuration file
    #[arg(long, default_value = "config.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;
    if let Some(device) = cli.device {
        config.device = device;
    }

    logging::init(&config.logging)?;

    info!("===========================================");
    info!("   Warpath Capture - 802.11 monitor mode");
    info!("===========================================");

    let filter = FrameFilter::from_name(&config.filter);
    let session_config = config.session_config();

    info!("Configuration:");
    info!("  Config file: {}", cli.config.display());
    info!(
        "  Device: {}",
        if config.device.is_empty() { "(auto)" } else { config.device.as_str() }
    );
    info!("  Snapshot length: {} bytes", session_config.snaplen);
    info!("  Read timeout: {:?}", session_config.timeout);
    info!("  Filter: {}", filter.expression());
    info!("  Output: {}", config.output.path.display());

    let mut engine = CaptureEngine::open(&PcapProbe, Some(&config.device), &session_config)
        .context("failed to open capture device")?;
    match hw_addr_of(engine.device()) {
        Some(addr) => info!("  Hardware address: {}", addr),
        None => debug!("Hardware address of {} unavailable", engine.device()),
    }

    let mut sink = JsonLinesSink::create(&config.output.path)?;

    tokio::spawn(stop_on_signal(engine.controller()));

    engine
        .start(filter.expression())
        .context("failed to start capture")?;

    info!("===========================================");
    info!("  Capturing on {}", engine.device());
    info!("  Press Ctrl+C to stop.");
    info!("===========================================");

    let limit = u64::try_from(cli.count).ok();
    let output = engine.output();
    let devices = HwAddrIndex::new();
    let mut frames_consumed = 0u64;
    let mut last_stats_report = Instant::now();

    loop {
        if limit.is_some_and(|limit| frames_consumed >= limit) {
            info!("Frame limit of {} reached", frames_consumed);
            break;
        }

        match output.recv_timeout(Duration::from_millis(500)) {
            Ok(frame) => {
                frames_consumed += 1;

                if frame.source != 0 {
                    let addr = HwAddr::from_packed(frame.source);
                    if devices.get(&addr).1 != Some(addr) {
                        devices.set(addr);
                        debug!(
                            "New device {}{} ({}, {:.1} m)",
                            addr,
                            if addr.is_local() { " [randomized]" } else { "" },
                            frame.frame_type,
                            frame.distance
                        );
                    }
                }

                if let Err(e) = sink.save(&frame) {
                    error!("Failed to save frame: {}", e);
                }
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => {
                debug!("Capture output closed");
                break;
            }
        }

        if last_stats_report.elapsed() >= STATS_INTERVAL {
            let stats = engine.stats();
            info!(
                "[Capture] packets={} frames={} timeouts={} consumed={} devices={}",
                stats.packets_read.load(Ordering::Relaxed),
                stats.frames_emitted.load(Ordering::Relaxed),
                stats.read_timeouts.load(Ordering::Relaxed),
                frames_consumed,
                devices.len()
            );
            last_stats_report = Instant::now();
        }
    }

    engine.stop()?;
    let emitted = engine.wait().context("capture loop failed")?;
    engine.close()?;

    info!(
        "Shutdown complete. Frames emitted: {}, consumed: {}, devices seen: {}",
        emitted,
        frames_consumed,
        devices.len()
    );
    Ok(())
}

/// Stop the engine on Ctrl-C or SIGTERM
async fn stop_on_signal(control: EngineControl) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Ctrl-C handler unavailable: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("SIGTERM handler unavailable: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl-C"),
        _ = terminate => info!("Received SIGTERM"),
    }

    if let Err(e) = control.stop() {
        warn!("Failed to stop capture: {}", e);
    }
}
