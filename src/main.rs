//! liveproc: live capture, process and display with overlapped processing

use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use color_eyre::Result;
use tracing::{info, warn};

use liveproc::display::open_viewer;
use liveproc::transforms::{self, ChangeDetector};
use liveproc::{utils, Config, DisplayBackend, Hooks, PipelineEngine, PipelineError};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Mode {
    /// Default hooks: identity with simulated work
    Passthrough,
    /// Grayscale and a wide Gaussian blur
    Blur,
    /// Grayscale, denoise and Prewitt edges
    Edge,
    /// Temporal change detection against a filtered reference
    Change,
}

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Source: device index, /dev/videoN, `auto`, image directory, URL or `pattern[:n]`
    #[arg(short, long)]
    source: Option<String>,

    #[arg(long)]
    width: Option<u32>,

    #[arg(long)]
    height: Option<u32>,

    #[arg(short, long, value_enum, default_value_t = Mode::Passthrough)]
    mode: Mode,

    /// Stop after this many frames
    #[arg(long)]
    frames: Option<u64>,

    /// Render nothing, only log
    #[arg(long, default_value_t = false)]
    headless: bool,

    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,
}

fn hooks_for(mode: Mode) -> Hooks {
    match mode {
        Mode::Passthrough => Hooks::new(),
        Mode::Blur => Hooks::new()
            .convert(transforms::grayscale)
            .process(|input, _| transforms::gaussian_blur(input, 8.0)),
        Mode::Edge => Hooks::new()
            .convert(transforms::grayscale)
            .process(|input, _| transforms::edge_detect(input)),
        Mode::Change => ChangeDetector::default().into_hooks(),
    }
}

fn main() -> Result<()> {
    // Initialize error handling and logging
    color_eyre::install()?;
    utils::init_logging("liveproc=info");

    let args = Args::parse();
    let mut config = Config::load(args.config.as_deref())?;
    if let Some(source) = args.source {
        config.source.identifier = source;
    }
    if args.width.is_some() {
        config.source.width = args.width;
    }
    if args.height.is_some() {
        config.source.height = args.height;
    }
    if args.frames.is_some() {
        config.pipeline.max_frames = args.frames;
    }
    if args.headless {
        config.display.backend = DisplayBackend::Headless;
    }
    info!("Configuration: {:?}", config);

    let viewer = open_viewer(&config.display)?;
    let engine = PipelineEngine::open(&config, hooks_for(args.mode), viewer)?;
    let _signals = utils::quit_on_ctrl_c(engine.quit_signal())?;

    info!("Press 'q' (or Ctrl-C) to exit.");
    match engine.run() {
        Ok(summary) => {
            info!(
                "Processed {} frames in {:.1?} ({} fps)",
                summary.frames, summary.elapsed, summary.fps
            );
            Ok(())
        }
        Err(report) => match report.downcast_ref::<PipelineError>() {
            Some(PipelineError::FrameReadFailure { identifier }) => {
                warn!("Source {} stopped delivering frames", identifier);
                Ok(())
            }
            _ => Err(report),
        },
    }
}
