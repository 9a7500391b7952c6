// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// cardcrop — detect and crop trading cards from photos.
//
// Entry point. Initialises logging, loads the optional configuration file,
// and dispatches to the detect, crop, and batch subcommands.

use std::fs;
use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand, ValueEnum};

use cardcrop_core::{BoundsSource, CardCropConfig, CropBounds, OutputFormat};
use cardcrop_vision::crop::bounds_from_rectangle;
use cardcrop_vision::{BatchInput, CardDetector, Cropper, DetectionSession};

type CliError = Box<dyn std::error::Error>;
type CliResult<T> = Result<T, CliError>;

#[derive(Debug, Parser)]
#[command(name = "cardcrop")]
#[command(about = "Detect trading cards in photos and crop them to a fixed card canvas")]
#[command(version)]
struct Cli {
    /// JSON configuration file overriding the built-in defaults.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Detect card rectangles and print them as JSON.
    Detect(DetectArgs),

    /// Crop one card out of an image.
    Crop(CropArgs),

    /// Detect and crop every image, writing one card per input.
    Batch(BatchArgs),
}

#[derive(Debug, Clone, Args)]
struct DetectArgs {
    /// Path to the input image.
    #[arg(long)]
    image: PathBuf,

    /// Write the detection result here instead of stdout.
    #[arg(long)]
    out: Option<PathBuf>,

    /// Save the analysis edge map as a PNG.
    #[arg(long)]
    edges: Option<PathBuf>,
}

#[derive(Debug, Clone, Args)]
struct CropArgs {
    /// Path to the input image.
    #[arg(long)]
    image: PathBuf,

    /// Path to write the cropped card.
    #[arg(long)]
    out: PathBuf,

    /// Crop origin x in source pixels. Give all four bounds or none.
    #[arg(long)]
    x: Option<f64>,

    #[arg(long)]
    y: Option<f64>,

    #[arg(long)]
    width: Option<f64>,

    #[arg(long)]
    height: Option<f64>,

    /// Output encoding. Defaults to the configured format.
    #[arg(long, value_enum)]
    format: Option<FormatArg>,

    /// JPEG quality (1-100).
    #[arg(long, value_parser = clap::value_parser!(u8).range(1..=100))]
    quality: Option<u8>,

    /// Fail instead of writing the original image when the crop cannot be rendered.
    #[arg(long)]
    strict: bool,
}

#[derive(Debug, Clone, Args)]
struct BatchArgs {
    /// Directory for card images and summary.json.
    #[arg(long)]
    out_dir: PathBuf,

    /// Input images, processed in order.
    #[arg(required = true)]
    images: Vec<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum FormatArg {
    Jpeg,
    Png,
}

impl FormatArg {
    fn to_core(self, quality: Option<u8>, configured: OutputFormat) -> OutputFormat {
        let configured_quality = configured
            .jpeg_quality()
            .unwrap_or(OutputFormat::DEFAULT_JPEG_QUALITY);
        match self {
            Self::Jpeg => OutputFormat::Jpeg {
                quality: quality.unwrap_or(configured_quality),
            },
            Self::Png => OutputFormat::Png,
        }
    }
}

fn main() -> CliResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Detect(args) => run_detect(&args, config),
        Commands::Crop(args) => run_crop(&args, config),
        Commands::Batch(args) => run_batch(&args, config),
    }
}

fn load_config(path: Option<&Path>) -> CliResult<CardCropConfig> {
    match path {
        Some(path) => {
            let config = CardCropConfig::load(path)?;
            tracing::info!("Configuration loaded from {}", path.display());
            Ok(config)
        }
        None => Ok(CardCropConfig::default()),
    }
}

fn read_image(path: &Path) -> CliResult<Vec<u8>> {
    fs::read(path).map_err(|e| -> CliError { format!("Failed to read image {}: {}", path.display(), e).into() })
}

// ── detect ─────────────────────────────────────────────────────────────

fn run_detect(args: &DetectArgs, config: CardCropConfig) -> CliResult<()> {
    tracing::info!("Loading image: {}", args.image.display());
    let data = read_image(&args.image)?;
    let image = cardcrop_vision::image::decode(&data)?;

    let detector = CardDetector::new(config);
    let result = detector.detect_image(&image)?;
    tracing::info!(
        "Detected {} rectangle(s) after {} window evaluations",
        result.rectangles.len(),
        result.windows_evaluated
    );

    let json = serde_json::to_string_pretty(&result)?;
    match &args.out {
        Some(out) => {
            fs::write(out, &json)?;
            tracing::info!("Results written to {}", out.display());
        }
        None => println!("{json}"),
    }

    if let Some(edges_path) = &args.edges {
        detector
            .edge_map(&image)
            .into_image()
            .save_with_format(edges_path, image::ImageFormat::Png)?;
        tracing::info!("Edge map written to {}", edges_path.display());
    }

    Ok(())
}

// ── crop ───────────────────────────────────────────────────────────────

fn run_crop(args: &CropArgs, config: CardCropConfig) -> CliResult<()> {
    let data = read_image(&args.image)?;

    let (bounds, source) = match explicit_bounds(args)? {
        Some(bounds) => (bounds, BoundsSource::Manual),
        None => {
            let image = cardcrop_vision::image::decode(&data)?;
            let detection = CardDetector::new(config.clone()).detect_image(&image)?;
            match detection.best() {
                Some(best) => (
                    bounds_from_rectangle(best),
                    BoundsSource::Detected {
                        confidence: best.confidence,
                    },
                ),
                None => (Cropper::new(config.clone()).smart_bounds(&image), BoundsSource::Smart),
            }
        }
    };
    tracing::info!("Crop bounds {:?} ({:?})", bounds, source);

    let format = match args.format {
        Some(arg) => arg.to_core(args.quality, config.crop.format),
        None => match (config.crop.format, args.quality) {
            (OutputFormat::Jpeg { .. }, Some(quality)) => OutputFormat::Jpeg { quality },
            (format, _) => format,
        },
    };
    let (out_w, out_h) = (config.crop.output_width, config.crop.output_height);

    let cropper = Cropper::new(config);
    let output = if args.strict {
        cropper.try_crop(&data, bounds, out_w, out_h, format)?
    } else {
        cropper.crop(&data, bounds, out_w, out_h, format)?
    };

    fs::write(&args.out, &output.bytes)?;
    if output.fell_back {
        tracing::warn!("Crop failed; original image written to {}", args.out.display());
    } else {
        tracing::info!("Card written to {}", args.out.display());
    }
    Ok(())
}

fn explicit_bounds(args: &CropArgs) -> CliResult<Option<CropBounds>> {
    match (args.x, args.y, args.width, args.height) {
        (Some(x), Some(y), Some(width), Some(height)) => Ok(Some(CropBounds::new(x, y, width, height))),
        (None, None, None, None) => Ok(None),
        _ => Err("--x, --y, --width and --height must be given together".into()),
    }
}

// ── batch ──────────────────────────────────────────────────────────────

fn run_batch(args: &BatchArgs, config: CardCropConfig) -> CliResult<()> {
    let mut inputs = Vec::with_capacity(args.images.len());
    for path in &args.images {
        let name = path.display().to_string();
        // Unreadable files still enter the session so they show up as skipped.
        let bytes = fs::read(path).unwrap_or_else(|e| {
            tracing::warn!("Failed to read {}: {}", name, e);
            Vec::new()
        });
        inputs.push(BatchInput::new(name, bytes));
    }

    let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build()?;
    let mut session = DetectionSession::new(config);
    let summary = runtime.block_on(session.process_async(inputs));

    fs::create_dir_all(&args.out_dir)?;
    for card in session.cards() {
        let path = args.out_dir.join(card_file_name(card.index, card.format, &card.name));
        fs::write(&path, &card.output)?;
        tracing::debug!("Wrote {}", path.display());
    }

    let summary_path = args.out_dir.join("summary.json");
    let json = serde_json::to_string_pretty(&serde_json::json!({
        "summary": summary,
        "cards": session.cards(),
    }))?;
    fs::write(&summary_path, json)?;

    tracing::info!(
        "Session {}: {} of {} image(s) cropped, {} kept uncropped, {} skipped; summary at {}",
        summary.session_id,
        summary.succeeded - summary.degraded.len(),
        summary.processed,
        summary.degraded.len(),
        summary.skipped.len(),
        summary_path.display()
    );
    Ok(())
}

/// `card-<index>.<ext>`. When the original was kept, the extension comes
/// from the input file name.
fn card_file_name(index: usize, format: Option<OutputFormat>, source_name: &str) -> String {
    let ext = match format {
        Some(format) => format.extension().to_string(),
        None => Path::new(source_name)
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_else(|| "bin".to_string()),
    };
    format!("card-{index}.{ext}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_detect_with_global_config() {
        let cli = Cli::try_parse_from([
            "cardcrop", "detect", "--image", "photo.jpg", "--config", "cfg.json",
        ])
        .expect("parse");
        assert_eq!(cli.config, Some(PathBuf::from("cfg.json")));
        assert!(matches!(cli.command, Commands::Detect(ref a) if a.out.is_none()));
    }

    #[test]
    fn crop_bounds_must_be_complete() {
        let partial = Cli::try_parse_from([
            "cardcrop", "crop", "--image", "a.png", "--out", "b.png", "--x", "10",
        ])
        .expect("parse");
        let Commands::Crop(args) = partial.command else {
            panic!("expected crop");
        };
        assert!(explicit_bounds(&args).is_err());

        let cli = Cli::try_parse_from([
            "cardcrop", "crop", "--image", "a.png", "--out", "b.png", "--x", "10", "--y", "20",
            "--width", "50", "--height", "70", "--format", "png",
        ])
        .expect("parse");
        let Commands::Crop(args) = cli.command else {
            panic!("expected crop");
        };
        let bounds = explicit_bounds(&args).expect("complete bounds");
        assert_eq!(bounds, Some(CropBounds::new(10.0, 20.0, 50.0, 70.0)));
        assert_eq!(args.format, Some(FormatArg::Png));
    }

    #[test]
    fn quality_is_range_checked() {
        let result = Cli::try_parse_from([
            "cardcrop", "crop", "--image", "a.png", "--out", "b.jpg", "--quality", "0",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn batch_requires_images() {
        assert!(Cli::try_parse_from(["cardcrop", "batch", "--out-dir", "out"]).is_err());
    }

    #[test]
    fn format_arg_keeps_configured_quality() {
        let configured = OutputFormat::Jpeg { quality: 75 };
        assert_eq!(FormatArg::Jpeg.to_core(None, configured), OutputFormat::Jpeg { quality: 75 });
        assert_eq!(FormatArg::Jpeg.to_core(Some(60), configured), OutputFormat::Jpeg { quality: 60 });
        assert_eq!(FormatArg::Png.to_core(Some(60), configured), OutputFormat::Png);
        assert_eq!(FormatArg::Jpeg.to_core(None, OutputFormat::Png), OutputFormat::default());
    }

    #[test]
    fn card_file_names() {
        assert_eq!(card_file_name(3, Some(OutputFormat::Png), "x.jpg"), "card-3.png");
        assert_eq!(card_file_name(0, None, "dir/photo.JPEG"), "card-0.jpeg");
        assert_eq!(card_file_name(1, None, "noext"), "card-1.bin");
    }

    #[test]
    fn missing_config_file_is_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        assert!(load_config(Some(dir.path().join("absent.json").as_path())).is_err());
        assert!(load_config(None).is_ok());
    }
}
