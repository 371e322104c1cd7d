//! detect_image - run object detection on one image and print the overlay

use anyhow::{anyhow, Result};
use clap::Parser;
use std::io::IsTerminal;
use std::path::PathBuf;
use std::time::Duration;

use detection_overlay::{
    AppConfig, Applied, DetectionSession, DetectorBackend, ImageRequest, Pipeline, Presentation,
    ViewportSize,
};

#[path = "../ui.rs"]
mod ui;

/// Extra time allowed on top of the detector timeout for loading the image.
const DRIVE_SLACK: Duration = Duration::from_secs(5);

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Local image file to analyse.
    #[arg(long, conflicts_with = "url", required_unless_present = "url")]
    image: Option<PathBuf>,
    /// Remote image URL; the detection service fetches it itself.
    #[arg(long)]
    url: Option<String>,
    /// Viewport size the image is displayed in, e.g. 1080x1920.
    #[arg(long, value_name = "WxH")]
    viewport: Option<String>,
    /// Detector backend (http|stub). Overrides the configuration.
    #[arg(long)]
    backend: Option<String>,
    /// Print the presentation as JSON on stdout.
    #[arg(long)]
    json: bool,
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
    let request = match (args.image, args.url.as_deref()) {
        (Some(path), _) => ImageRequest::LocalFile(path),
        (None, Some(url)) => ImageRequest::parse(url)?,
        (None, None) => return Err(anyhow!("either --image or --url is required")),
    };

    let pipeline = Pipeline::new(cfg.detector_registry()?, cfg.detector.timeout);
    log::info!(
        "detector backend {} ({})",
        cfg.detector.backend,
        pipeline.registry().list().join(", ")
    );

    let mut session = DetectionSession::new();
    session.layout_ready(viewport);
    let applied = {
        let _stage = ui.stage("Detect objects");
        pipeline.submit(&mut session, request)?;
        pipeline.drive(&mut session, cfg.detector.timeout + DRIVE_SLACK)?
    };

    match applied {
        Applied::Rendered => {}
        Applied::Failed(err) => return Err(anyhow!(err.user_message())),
        other => return Err(anyhow!("request did not finish: {:?}", other)),
    }
    let presentation = session
        .presentation()
        .ok_or_else(|| anyhow!("rendered request has no presentation"))?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&presentation)?);
    } else {
        print_presentation(&presentation);
    }
    Ok(())
}

fn print_presentation(p: &Presentation) {
    println!("{}", p.list.summary.objects_line());
    println!("{}", p.list.summary.processing_line());
    println!(
        "image {}x{} shown at {}x{} +{}+{} in {}x{} viewport",
        p.content.width,
        p.content.height,
        p.geometry.displayed_width,
        p.geometry.displayed_height,
        p.geometry.offset_x,
        p.geometry.offset_y,
        p.viewport.width,
        p.viewport.height
    );
    if p.list.is_empty() {
        println!("No objects detected");
        return;
    }
    println!();
    for (rank, object) in p.list.objects.iter().enumerate() {
        println!(
            "{:>3}. {:<20} {:>4}",
            rank + 1,
            object.label,
            object.confidence_percent()
        );
    }
    println!();
    for overlay in &p.overlay {
        println!(
            "{} {:<24} x={:.1} y={:.1} w={:.1} h={:.1}",
            overlay.color.hex(),
            overlay.caption(),
            overlay.rect.x,
            overlay.rect.y,
            overlay.rect.width,
            overlay.rect.height
        );
    }
}
