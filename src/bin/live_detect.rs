//! live_detect - continuous detection on camera frames

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use std::io::IsTerminal;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::time::{Duration, Instant};

use detection_overlay::live::FrameApplied;
use detection_overlay::{
    AppConfig, CameraFacing, CameraSource, DetectionCapability, DetectorBackend, LiveDetection,
    LiveEvent, LiveHandle, LiveSession, LiveTicket, ViewportSize,
};

#[path = "../ui.rs"]
mod ui;

const POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Stop after this many seconds (default: run until Ctrl-C).
    #[arg(long)]
    seconds: Option<u64>,
    /// Start with the front camera.
    #[arg(long)]
    front: bool,
    /// Switch between back and front camera every N seconds.
    #[arg(long, value_name = "N")]
    switch_every: Option<u64>,
    /// Viewport size the frames are displayed in, e.g. 1080x1920.
    #[arg(long, value_name = "WxH")]
    viewport: Option<String>,
    /// Detector backend (http|stub). Overrides the configuration.
    #[arg(long)]
    backend: Option<String>,
    /// UI mode for stderr progress (auto|plain|pretty)
    #[arg(long, default_value = "auto", value_name = "MODE")]
    ui: String,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    let is_tty = std::io::stderr().is_terminal();
    let stdout_is_tty = std::io::stdout().is_terminal();
    let ui = ui::Ui::from_args(Some(&args.ui), is_tty, !stdout_is_tty);

    let mut cfg = {
        let _stage = ui.stage("Load configuration");
        AppConfig::load()?
    };
    if let Some(backend) = args.backend.as_deref() {
        cfg.detector.backend = backend.parse::<DetectorBackend>()?;
    }
    let viewport = match args.viewport.as_deref() {
        Some(value) => ViewportSize::parse(value)
            .filter(ViewportSize::is_laid_out)
            .ok_or_else(|| anyhow!("--viewport must look like WIDTHxHEIGHT, got '{}'", value))?,
        None => cfg.viewport,
    };
    if args.switch_every == Some(0) {
        return Err(anyhow!("--switch-every must be >= 1"));
    }

    let detector = {
        let _stage = ui.stage("Prepare detector");
        let registry = cfg.detector_registry()?;
        let detector = registry.client_for_capability(DetectionCapability::LiveFrames)?;
        detector.warm_up()?;
        detector
    };

    let running = Arc::new(AtomicBool::new(true));
    let running_handler = running.clone();
    ctrlc::set_handler(move || {
        running_handler.store(false, Ordering::SeqCst);
    })
    .context("set Ctrl-C handler")?;

    let initial_facing = if args.front {
        CameraFacing::Front
    } else {
        cfg.live.facing
    };
    let mut session = LiveSession::new(initial_facing).with_fallback_frame(cfg.live.frame_size());
    session.layout_ready(viewport);

    let (tx, rx) = mpsc::channel::<LiveEvent>();
    let spawn_run = |ticket: LiveTicket, facing: CameraFacing| -> Result<LiveHandle> {
        let camera = CameraSource::new(cfg.camera_config(facing))?;
        LiveDetection::spawn(camera, Arc::clone(&detector), ticket, tx.clone())
    };

    let started = Instant::now();
    let deadline = args.seconds.map(|s| started + Duration::from_secs(s));
    let switch_every = args.switch_every.map(Duration::from_secs);
    let mut last_switch = started;
    let mut rendered_frames = 0u64;
    let mut failed_frames = 0u64;

    log::info!("live detection running; press Ctrl-C to stop");
    let mut status = ui.status_line();
    let ticket = session.start(initial_facing);
    let mut handle = spawn_run(ticket, initial_facing)?;
    status.set(&session.status().to_string());

    while running.load(Ordering::SeqCst) && deadline.is_none_or(|d| Instant::now() < d) {
        if let Some(every) = switch_every {
            if last_switch.elapsed() >= every {
                handle.stop()?;
                let ticket = session
                    .switch_camera()
                    .ok_or_else(|| anyhow!("live session is not running"))?;
                handle = spawn_run(ticket, session.facing())?;
                last_switch = Instant::now();
                log::info!(
                    "switched to {} camera (run {})",
                    session.facing(),
                    handle.ticket().generation()
                );
            }
        }

        match rx.recv_timeout(POLL_INTERVAL) {
            Ok(event) => match session.frame_result(event) {
                FrameApplied::Rendered => rendered_frames += 1,
                FrameApplied::Failed => failed_frames += 1,
                FrameApplied::Stale | FrameApplied::AwaitingLayout => {}
            },
            Err(mpsc::RecvTimeoutError::Timeout) => {}
            Err(mpsc::RecvTimeoutError::Disconnected) => break,
        }
        status.set(&session.status().to_string());
    }

    handle.stop()?;
    session.stop();
    status.set(&session.status().to_string());
    drop(status);

    println!(
        "{} frames rendered, {} failed in {:.1}s",
        rendered_frames,
        failed_frames,
        started.elapsed().as_secs_f64()
    );
    Ok(())
}
