// ============================================================================
// PixelPad CLI — headless raster processing via command-line arguments
// ============================================================================
//
// Usage examples:
//   pixelpad --input photo.jpg --output pixels.png --size 256
//   pixelpad -i photo.png --grayscale                (writes photo_out.png)
//
// No GUI is opened in CLI mode. The input image is fit into a square grid
// exactly the way an in-app import is, optionally converted to grayscale,
// and written out as PNG.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;

use clap::Parser;

use crate::canvas::RasterCanvas;
use crate::io;
use crate::storage::MemoryStore;

/// PixelPad headless raster processor.
///
/// Fit an image into a fixed-resolution pixel grid without opening the GUI.
#[derive(Parser, Debug)]
#[command(
    name = "pixelpad",
    about = "PixelPad headless pixel-grid renderer",
    long_about = "Fit an image into a square pixel grid (aspect-preserving,\n\
                  nearest-neighbor) and write the result as PNG, without\n\
                  opening the GUI.\n\n\
                  Example:\n  \
                  pixelpad --input photo.jpg --output pixels.png --size 128"
)]
pub struct CliArgs {
    /// Input image file (PNG, JPEG, WEBP, BMP, ...).
    #[arg(short, long)]
    pub input: PathBuf,

    /// Output PNG path. Defaults to the input stem with `_out.png` appended.
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Grid resolution: the output is SIZE × SIZE logical pixels.
    #[arg(short, long, default_value_t = 256, value_name = "SIZE")]
    pub size: u32,

    /// Convert the placed image to grayscale before writing.
    #[arg(long)]
    pub grayscale: bool,

    /// Print timing information.
    #[arg(short, long)]
    pub verbose: bool,
}

impl CliArgs {
    /// Returns `true` when a CLI-mode flag is present in the real process
    /// arguments. Used by `main()` to route before creating a window.
    pub fn is_cli_mode() -> bool {
        std::env::args().any(|a| a == "--input" || a == "-i")
    }
}

/// Run the headless pipeline and return an OS exit code.
pub fn run(args: CliArgs) -> ExitCode {
    if args.size == 0 {
        eprintln!("error: --size must be a positive integer.");
        return ExitCode::FAILURE;
    }

    let output = match &args.output {
        Some(path) => path.clone(),
        None => default_output_path(&args.input),
    };

    let start = Instant::now();
    match run_one(&args.input, &output, args.size, args.grayscale) {
        Ok(()) => {
            if args.verbose {
                println!(
                    "{} → {} ({:.0}ms)",
                    args.input.display(),
                    output.display(),
                    start.elapsed().as_secs_f64() * 1000.0
                );
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run_one(input: &Path, output: &Path, size: u32, grayscale: bool) -> Result<(), String> {
    let src = io::decode_file(input).map_err(|e| format!("load failed: {}", e))?;

    // Headless runs use a throwaway store — no session state is touched.
    let mut canvas = RasterCanvas::new(size, Box::new(MemoryStore::new()));
    canvas.place_image(&src);

    if grayscale {
        canvas
            .redraw_in_black_and_white()
            .map_err(|e| format!("grayscale failed: {}", e))?;
    }

    canvas
        .grid()
        .save(output)
        .map_err(|e| format!("save failed: {}", e))?;
    Ok(())
}

/// Write next to the input file, avoiding silent overwrite of the input.
fn default_output_path(input: &Path) -> PathBuf {
    let parent = input.parent().unwrap_or(Path::new("."));
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "canvas".to_string());
    parent.join(format!("{}_out.png", stem))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    fn scratch(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("pixelpad-cli-{}-{}", std::process::id(), name))
    }

    #[test]
    fn default_output_appends_out_suffix() {
        assert_eq!(
            default_output_path(Path::new("/tmp/photo.png")),
            PathBuf::from("/tmp/photo_out.png")
        );
        assert_eq!(
            default_output_path(Path::new("shot.jpg")),
            PathBuf::from("shot_out.png")
        );
    }

    #[test]
    fn pipeline_fits_and_writes_png() {
        let input = scratch("in.png");
        let output = scratch("out.png");
        RgbaImage::from_pixel(20, 10, Rgba([0, 0, 200, 255]))
            .save(&input)
            .unwrap();

        run_one(&input, &output, 16, false).unwrap();

        let result = image::open(&output).unwrap().to_rgba8();
        assert_eq!(result.dimensions(), (16, 16));
        // 20×10 into 16×16: scaled to 16×8, bands of background above/below.
        assert_eq!(result.get_pixel(8, 8), &Rgba([0, 0, 200, 255]));
        assert_eq!(result.get_pixel(8, 1), &Rgba([255, 255, 255, 255]));

        let _ = std::fs::remove_file(&input);
        let _ = std::fs::remove_file(&output);
    }

    #[test]
    fn pipeline_reports_missing_input() {
        let err = run_one(
            Path::new("/definitely/not/here.png"),
            Path::new("/tmp/never.png"),
            16,
            false,
        )
        .unwrap_err();
        assert!(err.starts_with("load failed"));
    }
}
