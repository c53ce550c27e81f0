use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use env_logger::Builder;
use image::imageops::{self, FilterType};
use image::{Rgba, RgbaImage};
use indicatif::{ParallelProgressIterator, ProgressBar, ProgressStyle};
use log::{error, info, warn, LevelFilter};
use minimp4::Mp4Muxer;
use openh264::encoder::{BitRate, Encoder, EncoderConfig, FrameRate};
use openh264::formats::YUVBuffer;
use rayon::prelude::*;
use slime_common::Snapshot;
use std::fs::{self, File};
use std::io::{BufReader, Cursor, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::time::Instant;

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum OutputFormat {
    /// One PNG per snapshot in the output directory
    Png,
    /// A single H.264 MP4 video
    Mp4,
}

/// Command-line arguments for the visualizer
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Input snapshot file path (.bin, written with `format = "bincode"`)
    #[arg(short, long)]
    input: PathBuf,

    /// Output video file (mp4) or frame directory (png)
    #[arg(short, long, default_value = "slime_video.mp4")]
    output: PathBuf,

    #[arg(long, value_enum, default_value_t = OutputFormat::Mp4)]
    format: OutputFormat,

    /// Width of the output frames in pixels (defaults to the first snapshot's width)
    #[arg(long)]
    width: Option<u32>,

    /// Height of the output frames in pixels (defaults to the first snapshot's height)
    #[arg(long)]
    height: Option<u32>,

    /// Frames per second for the output video
    #[arg(long, default_value_t = 30)]
    fps: u32,

    /// Mark agent positions (when recorded) on top of the colored field
    #[arg(long)]
    draw_agents: bool,
}

/// Turns one snapshot into an image of the requested size.
///
/// Snapshots recorded before and after a viewport resize have different
/// dimensions, so every frame is scaled to the output size.
fn render_snapshot(snapshot: &Snapshot, width: u32, height: u32, draw_agents: bool) -> RgbaImage {
    let mut image = snapshot
        .colored_rgba8
        .as_ref()
        .and_then(|bytes| RgbaImage::from_raw(snapshot.width, snapshot.height, bytes.clone()))
        .unwrap_or_else(|| RgbaImage::from_pixel(snapshot.width.max(1), snapshot.height.max(1), Rgba([0, 0, 0, 255])));

    if draw_agents {
        if let Some(positions) = &snapshot.positions {
            let (w, h) = image.dimensions();
            for &(x, y) in positions {
                let px = (x.max(0.0) as u32).min(w - 1);
                let py = (y.max(0.0) as u32).min(h - 1);
                image.put_pixel(px, py, Rgba([255, 255, 255, 255]));
            }
        }
    }

    if image.dimensions() == (width, height) {
        image
    } else {
        imageops::resize(&image, width, height, FilterType::Nearest)
    }
}

/// RGB to YUV conversion for video encoding
fn rgb_to_yuv420(image: &RgbaImage) -> Vec<u8> {
    let width = image.width() as usize;
    let height = image.height() as usize;

    // Y plane is full size, U and V are quarter size
    let y_plane_size = width * height;
    let mut yuv = vec![0u8; y_plane_size + y_plane_size / 2];

    for y in 0..height {
        for x in 0..width {
            let pixel = image.get_pixel(x as u32, y as u32);
            let r = pixel[0] as f32;
            let g = pixel[1] as f32;
            let b = pixel[2] as f32;

            // BT.601
            yuv[y * width + x] = (0.299 * r + 0.587 * g + 0.114 * b).round() as u8;
        }
    }

    let u_plane_offset = y_plane_size;
    let v_plane_offset = y_plane_size + y_plane_size / 4;
    let uv_width = width / 2;

    // Average U and V over each 2x2 block
    for y in (0..height).step_by(2) {
        for x in (0..width).step_by(2) {
            let mut sum_u = 0f32;
            let mut sum_v = 0f32;
            let mut count = 0;

            for dy in 0..2 {
                for dx in 0..2 {
                    if y + dy < height && x + dx < width {
                        let pixel = image.get_pixel((x + dx) as u32, (y + dy) as u32);
                        let r = pixel[0] as f32;
                        let g = pixel[1] as f32;
                        let b = pixel[2] as f32;

                        sum_u += -0.169 * r - 0.331 * g + 0.5 * b + 128.0;
                        sum_v += 0.5 * r - 0.419 * g - 0.081 * b + 128.0;
                        count += 1;
                    }
                }
            }

            let uv_index = (y / 2) * uv_width + x / 2;
            yuv[u_plane_offset + uv_index] = (sum_u / count as f32).round() as u8;
            yuv[v_plane_offset + uv_index] = (sum_v / count as f32).round() as u8;
        }
    }

    yuv
}

fn progress_bar(len: u64, template: &str) -> Result<ProgressBar> {
    let bar = ProgressBar::new(len);
    bar.set_style(ProgressStyle::default_bar().template(template)?.progress_chars("#>-"));
    Ok(bar)
}

fn load_snapshots(path: &Path) -> Result<Vec<Snapshot>> {
    let input_file = File::open(path)
        .with_context(|| format!("Failed to open input file: {}", path.display()))?;
    let snapshots: Vec<Snapshot> = bincode::deserialize_from(BufReader::new(input_file))
        .with_context(|| format!("Failed to read snapshots from {}", path.display()))?;
    Ok(snapshots)
}

fn write_png_frames(snapshots: &[Snapshot], dir: &Path, width: u32, height: u32, draw_agents: bool) -> Result<usize> {
    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create output directory {}", dir.display()))?;

    let bar = progress_bar(
        snapshots.len() as u64,
        "[{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} frames ({percent}%) [{eta}]",
    )?;
    let failures = snapshots
        .par_iter()
        .progress_with(bar.clone())
        .filter(|snapshot| {
            let filename = dir.join(format!("frame_{:06}.png", snapshot.frame));
            let image = render_snapshot(snapshot, width, height, draw_agents);
            match image.save(&filename) {
                Ok(()) => false,
                Err(e) => {
                    error!("Error writing {}: {}", filename.display(), e);
                    true
                }
            }
        })
        .count();
    bar.finish_with_message("Frames written");

    if failures > 0 {
        warn!("{} frames could not be written.", failures);
    }
    Ok(snapshots.len() - failures)
}

fn write_mp4(snapshots: &[Snapshot], output: &Path, width: u32, height: u32, fps: u32, draw_agents: bool) -> Result<usize> {
    let mut encoder = Encoder::with_api_config(
        openh264::OpenH264API::from_source(),
        EncoderConfig::new()
            .max_frame_rate(FrameRate::from_hz(fps as f32))
            .bitrate(BitRate::from_bps(5_000_000)),
    )
    .context("Failed to initialize H.264 encoder")?;

    let bar = progress_bar(
        snapshots.len() as u64,
        "[{elapsed_precise}] [{bar:40.green/blue}] {pos}/{len} encoded ({percent}%) [{eta}]",
    )?;

    const ENCODE_BATCH_SIZE: usize = 30;
    let mut h264_data = Vec::new();
    let mut frame_count = 0;

    // Rendering runs in parallel per batch; encoding stays sequential to keep frame order.
    for batch in snapshots.chunks(ENCODE_BATCH_SIZE) {
        let yuv_frames: Vec<_> = batch
            .par_iter()
            .map(|snapshot| (snapshot.frame, rgb_to_yuv420(&render_snapshot(snapshot, width, height, draw_agents))))
            .collect();

        for (frame, yuv_data) in yuv_frames {
            let yuv_source = YUVBuffer::from_vec(yuv_data, width as usize, height as usize);
            match encoder.encode(&yuv_source) {
                Ok(bitstream) => {
                    bitstream.write_vec(&mut h264_data);
                    frame_count += 1;
                }
                Err(e) => error!("Error encoding frame {}: {}", frame, e),
            }
            bar.inc(1);
        }
    }
    bar.finish_with_message(format!("Encoded {} frames", frame_count));

    info!("Creating MP4 file...");
    let mut video_buffer = Cursor::new(Vec::new());
    let mut mp4muxer = Mp4Muxer::new(&mut video_buffer);
    mp4muxer.init_video(width as i32, height as i32, false, "Slime mold simulation");
    mp4muxer.write_video(&h264_data);
    mp4muxer.close();

    video_buffer.seek(SeekFrom::Start(0))?;
    let mut video_bytes = Vec::new();
    video_buffer.read_to_end(&mut video_bytes)?;
    fs::write(output, &video_bytes)
        .with_context(|| format!("Failed to write video file to {}", output.display()))?;

    Ok(frame_count)
}

fn main() -> Result<()> {
    let args = Args::parse();

    Builder::from_default_env()
        .filter(None, LevelFilter::Info)
        .init();

    run_with_args(args)
}

fn run_with_args(args: Args) -> Result<()> {
    info!("Starting Slime Visualizer...");
    info!("Input file: {}", args.input.display());

    let snapshots = load_snapshots(&args.input)?;
    info!("Found {} snapshots in the file", snapshots.len());
    let Some(first) = snapshots.first() else {
        warn!("Input file contains no snapshots. Exiting.");
        return Ok(());
    };

    let without_frames = snapshots.iter().filter(|s| s.colored_rgba8.is_none()).count();
    if without_frames > 0 {
        warn!(
            "{} of {} snapshots carry no colored frame (set save_colored_frames = true); they render black.",
            without_frames,
            snapshots.len()
        );
    }

    let mut width = args.width.unwrap_or(first.width);
    let mut height = args.height.unwrap_or(first.height);
    if args.format == OutputFormat::Mp4 && (width % 2 != 0 || height % 2 != 0) {
        // YUV 4:2:0 needs even dimensions.
        width += width % 2;
        height += height % 2;
        info!("Rounded video dimensions up to {}x{}", width, height);
    }
    info!("Output dimensions: {}x{}", width, height);

    let start_time = Instant::now();
    let frame_count = match args.format {
        OutputFormat::Png => write_png_frames(&snapshots, &args.output, width, height, args.draw_agents)?,
        OutputFormat::Mp4 => write_mp4(&snapshots, &args.output, width, height, args.fps, args.draw_agents)?,
    };

    let duration = start_time.elapsed();
    info!(
        "Wrote {} frames in {:.2?} ({:.1} frames per second)",
        frame_count,
        duration,
        frame_count as f64 / duration.as_secs_f64()
    );
    info!("Output saved to: {}", args.output.display());

    Ok(())
}
