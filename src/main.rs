use clap::Parser;
use image::imageops::{self, FilterType};
use image::{ImageReader, Rgb, RgbImage};
use rgif::{EncoderOptions, Frame, GifEncoder, Palette, Repeat};
use std::error::Error;
use std::fs;
use std::path::PathBuf;

/// Encode a sequence of images into an animated GIF
#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Args {
    /// Input frames, in playback order
    #[arg(required = true)]
    frames: Vec<PathBuf>,

    /// Output path
    #[arg(short, long, default_value = "out.gif")]
    output: PathBuf,

    /// Delay between frames in centiseconds
    #[arg(short, long, default_value_t = 10)]
    delay: u16,

    /// Play the animation once instead of looping
    #[arg(long)]
    once: bool,

    /// Palette size, 1 to 256
    #[arg(long, default_value_t = 256)]
    colors: usize,

    /// Quantizer sample factor; 1 is slowest and most accurate
    #[arg(long, default_value_t = 10)]
    sample: i32,
}

fn run(args: &Args) -> Result<(), Box<dyn Error>> {
    let mut images: Vec<RgbImage> = Vec::with_capacity(args.frames.len());
    for path in &args.frames {
        images.push(ImageReader::open(path)?.decode()?.to_rgb8());
    }

    let (width, height) = images[0].dimensions();
    for img in images.iter_mut().skip(1) {
        if img.dimensions() != (width, height) {
            *img = imageops::resize(img, width, height, FilterType::Triangle);
        }
    }

    // train one global palette over every frame
    let pixels: Vec<Rgb<u8>> = images
        .iter()
        .flat_map(|img| img.pixels().copied())
        .collect();
    let palette = Palette::from_pixels(&pixels, args.colors, args.sample)?;

    let options = EncoderOptions {
        repeat: if args.once {
            Repeat::Never
        } else {
            Repeat::Infinite
        },
        palette: Some(palette),
        ..Default::default()
    };
    let mut encoder = GifEncoder::new(width, height, options)?;
    encoder.expect_frames(images.len());
    encoder.start()?;
    for img in images {
        encoder.add_frame(&Frame::new(img, args.delay))?;
    }
    fs::write(&args.output, encoder.finish()?)?;
    Ok(())
}

fn main() {
    let args = Args::parse();
    if let Err(e) = run(&args) {
        eprintln!("rgif: {e}");
        std::process::exit(1);
    }
}
