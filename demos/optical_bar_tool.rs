//! Optical Bar Model Inspection Tool
//!
//! Loads an optical-bar camera model, prints its parameters and checks that
//! the ground-to-pixel solver inverts the pixel-to-ray mapping across the
//! image. The model can be written back out in either file format.
//!
//! Usage:
//! ```bash
//! cargo run --example optical_bar_tool -- \
//!   --input-path samples/optical_bar.tsai \
//!   --num-points 200 \
//!   --output-path output/optical_bar.yaml
//! ```

use clap::Parser;
use log::info;
use optical_bar_tools::camera::{CameraModel, OpticalBarModel};
use optical_bar_tools::geometry::{compute_round_trip_error, sample_pixels};
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Optical bar camera model tool
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the input model (.tsai text file or .yaml)
    #[arg(short = 'p', long)]
    input_path: PathBuf,

    /// Number of sample pixels for the round-trip check (default: 100)
    #[arg(short = 'n', long, default_value = "100")]
    num_points: usize,

    /// Optional path to write the model to (.yaml for YAML, text otherwise)
    #[arg(short = 'o', long)]
    output_path: Option<PathBuf>,

    /// Print the round-trip statistics as JSON
    #[arg(long)]
    json: bool,

    /// Disable atmospheric refraction and velocity aberration corrections
    #[arg(long)]
    no_corrections: bool,
}

fn is_yaml(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|ext| ext.to_str()),
        Some("yaml") | Some("yml")
    )
}

fn load_model(path: &Path) -> Result<OpticalBarModel, Box<dyn std::error::Error>> {
    let path_str = path.to_str().ok_or("Invalid input path string")?;
    let model = if is_yaml(path) {
        info!("Loading YAML optical bar model from: {}", path_str);
        OpticalBarModel::load_from_yaml(path_str)?
    } else {
        info!("Loading optical bar model file from: {}", path_str);
        OpticalBarModel::from_file(path_str)?
    };
    Ok(model)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logger
    env_logger::init();

    let cli = Cli::parse();

    println!("🛰️  OPTICAL BAR MODEL TOOL");
    println!("=========================");
    println!("Input file: {:?}", cli.input_path);
    println!("Sample pixels: {}\n", cli.num_points);

    let mut model = load_model(&cli.input_path)?;
    if cli.no_corrections {
        model.set_correct_atmospheric_refraction(false);
        model.set_correct_velocity_aberration(false);
    }
    println!("{model}\n");

    let pixels = sample_pixels(&model.get_resolution(), cli.num_points);
    let ground_radius = model.mean_earth_radius() + model.mean_surface_elevation();

    println!("🔄 Pixel → Ground → Pixel round trip");
    println!("Generated {} sample pixels", pixels.len());

    let start = Instant::now();
    let stats = compute_round_trip_error(&model, &pixels, ground_radius)?;
    let elapsed = start.elapsed();

    info!("Round trip finished in {:.2?}", elapsed);
    if cli.json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
    } else {
        println!("{stats:?}");
        println!("Elapsed: {:.2?}", elapsed);
    }

    if let Some(output_path) = &cli.output_path {
        let path_str = output_path.to_str().ok_or("Invalid output path string")?;
        if is_yaml(output_path) {
            model.save_to_yaml(path_str)?;
        } else {
            model.write(path_str)?;
        }
        println!("\n💾 Model written to {path_str}");
    }

    Ok(())
}
