use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use firesmoke::AppConfig;
use firesmoke::detection::{Annotator, YoloSegDetector, detect_image, load_upload};
use firesmoke::pipeline::TrainPipeline;
use firesmoke::stream::{
    CancelFlag, FailurePolicy, FrameDirSink, FrameLimit, FrameSource, NetworkCamera, run_camera,
};

#[derive(Parser)]
#[command(name = "firesmoke")]
#[command(about = "Train and run a fire and smoke segmentation model")]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// JSON configuration file
    #[arg(long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Root directory for every stage's artifacts
    #[arg(long, value_name = "DIR", global = true)]
    artifacts_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Download, validate and train
    Train {
        /// Dataset archive link (Google Drive share link or direct .zip)
        #[arg(long)]
        url: Option<String>,
    },
    /// Detect fire and smoke in one image
    Detect {
        #[arg(value_name = "IMAGE")]
        image: PathBuf,

        /// Where to write the side-by-side result (PNG)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
    /// Stream a local camera through the detector
    Webcam {
        #[arg(long)]
        index: Option<i32>,

        #[command(flatten)]
        output: StreamOutput,
    },
    /// Stream an IP webcam (RTSP/MJPEG stream or .jpg snapshot URL) through the detector
    IpWebcam {
        #[arg(value_name = "URL")]
        url: String,

        #[command(flatten)]
        output: StreamOutput,
    },
    /// Launch the desktop application
    Gui,
}

#[derive(clap::Args)]
struct StreamOutput {
    /// Directory for annotated frames (default: <artifacts>/streams/<timestamp>)
    #[arg(long, value_name = "DIR")]
    output_dir: Option<PathBuf>,

    /// Stop after this many frames
    #[arg(long, value_name = "N", value_parser = clap::value_parser!(u64).range(1..))]
    max_frames: Option<u64>,
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose { "firesmoke=debug" } else { "firesmoke=info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn load_config(cli: &Cli) -> anyhow::Result<AppConfig> {
    let mut config = match &cli.config {
        Some(path) => AppConfig::from_file(path)?,
        None => AppConfig::default(),
    };
    if let Some(dir) = &cli.artifacts_dir {
        config = config.with_artifacts_dir(dir.clone());
    }
    Ok(config)
}

/// Raise `cancel` on Ctrl-C
fn cancel_on_ctrl_c(cancel: CancelFlag) -> anyhow::Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to start signal handler")?;
    std::thread::spawn(move || {
        runtime.block_on(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Ctrl-C received, stopping");
                cancel.cancel();
            }
        })
    });
    Ok(())
}

fn train(config: AppConfig, url: Option<String>) -> anyhow::Result<()> {
    let config = match url {
        Some(url) => config.with_download_url(url),
        None => config,
    };
    let result = TrainPipeline::new(Arc::new(config))?.run_pipeline()?;

    println!("\n=== Training Complete ===");
    println!("Weights: {}", result.trained_weights_path.display());
    match &result.exported_model_path {
        Some(path) => println!("Detector model: {}", path.display()),
        None => println!("Detector model: not exported"),
    }
    Ok(())
}

fn default_output(image: &Path) -> PathBuf {
    let stem = image.file_stem().and_then(|s| s.to_str()).unwrap_or("image");
    image.with_file_name(format!("{}_detected.png", stem))
}

fn detect(config: &AppConfig, image: &Path, output: Option<PathBuf>) -> anyhow::Result<()> {
    let bytes = std::fs::read(image).with_context(|| format!("Failed to read {:?}", image))?;
    let input = load_upload(&bytes)?;

    let detection = config.detection();
    let annotator = Annotator::from_font_option(detection.label_font.as_deref())?;
    let mut detector = YoloSegDetector::load(detection)?;
    let result = detect_image(&mut detector, &annotator, input)?;

    let output = output.unwrap_or_else(|| default_output(image));
    result
        .side_by_side()
        .save(&output)
        .with_context(|| format!("Failed to write {:?}", output))?;

    println!("\n=== Fire & Smoke Detection Results ===");
    println!("Total detections: {}", result.detections.len());
    for det in &result.detections {
        println!(
            "  {} {:.2} at ({:.0}, {:.0})-({:.0}, {:.0})",
            det.label, det.confidence, det.bbox.x1, det.bbox.y1, det.bbox.x2, det.bbox.y2
        );
    }
    println!("Saved to {}", output.display());
    Ok(())
}

/// Set up the sink and Ctrl-C handler, then open the camera and stream it
fn stream<S, F>(
    open: F,
    policy: FailurePolicy,
    config: &AppConfig,
    output: StreamOutput,
) -> anyhow::Result<()>
where
    S: FrameSource,
    F: FnOnce() -> anyhow::Result<S>,
{
    let cancel = CancelFlag::new();
    cancel_on_ctrl_c(cancel.clone())?;

    let mut frames = match output.output_dir {
        Some(dir) => FrameDirSink::create(dir)?,
        None => FrameDirSink::timestamped(&config.artifacts_dir.join("streams"))?,
    };
    let dir = frames.dir().to_path_buf();
    let mut camera = open()?;

    let summary = match output.max_frames {
        Some(limit) => {
            let mut limited = FrameLimit::new(frames, limit, cancel.clone());
            run_camera(&mut camera, policy, config, cancel, &mut limited)?
        }
        None => run_camera(&mut camera, policy, config, cancel, &mut frames)?,
    };

    println!("\n=== Stream Summary ===");
    println!("Stopped: {:?}", summary.reason);
    println!("Frames shown: {}", summary.frames_shown);
    if summary.frames_skipped > 0 {
        println!("Frames skipped: {}", summary.frames_skipped);
    }
    println!("Frames written to {}", dir.display());
    Ok(())
}

#[cfg(feature = "webcam")]
fn webcam(config: &AppConfig, index: Option<i32>, output: StreamOutput) -> anyhow::Result<()> {
    let stream_config = config.stream();
    let index = index.unwrap_or(stream_config.webcam_index);
    stream(
        || firesmoke::stream::LocalCamera::open_index(index, &stream_config),
        FailurePolicy::local_camera(),
        config,
        output,
    )
}

#[cfg(not(feature = "webcam"))]
fn webcam(_config: &AppConfig, _index: Option<i32>, _output: StreamOutput) -> anyhow::Result<()> {
    anyhow::bail!("webcam support is not compiled in; rebuild with `--features webcam`")
}

#[cfg(feature = "gui")]
fn gui(config: AppConfig) -> anyhow::Result<()> {
    firesmoke::gui::run(config)
}

#[cfg(not(feature = "gui"))]
fn gui(_config: AppConfig) -> anyhow::Result<()> {
    anyhow::bail!("the desktop application is not compiled in; rebuild with `--features gui`")
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let config = load_config(&cli)?;

    match cli.command {
        Command::Train { url } => train(config, url),
        Command::Detect { image, output } => detect(&config, &image, output),
        Command::Webcam { index, output } => webcam(&config, index, output),
        Command::IpWebcam { url, output } => {
            let policy = FailurePolicy::network_camera_from(&config.stream());
            stream(|| NetworkCamera::open(&url), policy, &config, output)
        }
        Command::Gui => gui(config),
    }
}
