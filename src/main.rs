mod util;
mod video;

use block_track::*;
use block_track::synthetic::DriftSequence;
use video::VideoInput;

use anyhow::{bail, Context, Result};
use clap::Parser;
use log::LevelFilter;
use std::path::PathBuf;

#[derive(Parser)]
#[clap(about = "Tracks one point through a video by block matching.")]
struct Args {
  // Video file, decoded with ffmpeg. A synthetic sequence is used without it.
  #[clap(short, long)]
  input: Option<PathBuf>,
  // Frames are scaled to this size.
  #[clap(long, default_value_t = 640)]
  width: usize,
  #[clap(long, default_value_t = 360)]
  height: usize,
  // Seed point, defaults to the target of the synthetic sequence or the
  // middle of the frame.
  #[clap(short)]
  x: Option<i32>,
  #[clap(short)]
  y: Option<i32>,
  #[clap(long, default_value_t = 100)]
  frames: usize,
  // Timestamp increment between frames.
  #[clap(long, default_value_t = 40)]
  frame_interval: i64,
  // Track record as JSON, printed to stdout without it.
  #[clap(short, long)]
  output: Option<PathBuf>,
  // Writes each frame with the tracker overlay as PPM.
  #[clap(long)]
  overlay_folder: Option<PathBuf>,
  // JSON parameters, replacing the ones given on the command line.
  #[clap(long)]
  parameters_file: Option<PathBuf>,
  #[clap(short, long, parse(from_occurrences))]
  verbose: usize,
  #[clap(flatten)]
  parameters: Parameters,
}

enum FrameSource {
  Video(VideoInput),
  Synthetic(DriftSequence, usize),
}

impl FrameSource {
  fn next(&mut self) -> Result<Option<Image>> {
    match self {
      FrameSource::Video(input) => input.read(),
      FrameSource::Synthetic(sequence, k) => {
        let frame = sequence.frame(*k);
        *k += 1;
        Ok(Some(frame))
      },
    }
  }
}

fn handle_error(err: &anyhow::Error) {
  for (i, e) in err.chain().enumerate() {
    println!("  {}: {}", i + 1, e);
  }
}

fn main() {
  if let Err(err) = run() {
    handle_error(&err);
    std::process::exit(1);
  }
}

fn write_overlay(args: &Args, track: &Track, image: &Image, k: usize) -> Result<()> {
  let folder = match &args.overlay_folder {
    Some(folder) => folder,
    None => return Ok(()),
  };
  let mut image = image.clone();
  draw_track(&mut image, track);
  let path = folder.join(format!("frame-{:05}.ppm", k));
  std::fs::write(&path, encode_ppm(&image)?)
    .with_context(|| format!("Failed to write {}.", path.display()))?;
  Ok(())
}

fn run() -> Result<()> {
  let args = Args::parse();
  env_logger::Builder::new()
    .filter_level(match args.verbose {
      0 => LevelFilter::Info,
      1 => LevelFilter::Debug,
      _ => LevelFilter::Trace,
    })
    .format(util::format_log)
    .init();

  let parameters = match &args.parameters_file {
    Some(path) => {
      let json = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}.", path.display()))?;
      Parameters::from_json(&json).context("Invalid parameters file.")?
    },
    None => args.parameters.clone(),
  };
  if args.frames == 0 { bail!("Need at least one frame.") }
  if args.frame_interval <= 0 { bail!("Frame interval must be positive.") }
  if let Some(folder) = &args.overlay_folder {
    std::fs::create_dir_all(folder)?;
  }

  let (mut source, default_seed) = match &args.input {
    Some(path) => {
      let input = VideoInput::new(path, args.width, args.height)?;
      (FrameSource::Video(input), Pixel::new(args.width as i32 / 2, args.height as i32 / 2))
    },
    None => {
      let start = Pixel::new(args.width as i32 / 4, args.height as i32 / 2);
      let sequence = DriftSequence::new(args.width, args.height, start, 1);
      (FrameSource::Synthetic(sequence, 0), start)
    },
  };
  let seed = Pixel::new(args.x.unwrap_or(default_seed[0]), args.y.unwrap_or(default_seed[1]));

  let first = source.next()?.context("The video has no frames.")?;
  let mut track = Track::new(&first, seed[0], seed[1], 0, &parameters)
    .context("Pick a seed point further from the image border.")?;
  write_overlay(&args, &track, &first, 0)?;

  for k in 1..args.frames {
    let image = match source.next()? {
      Some(image) => image,
      None => break,
    };
    let step = track.advance_to(&image, k as i64 * args.frame_interval)?;
    write_overlay(&args, &track, &image, k)?;
    if !step.matched {
      log::warn!("Lost the target at frame {}, score {:.3}.", k, step.score);
      break;
    }
  }
  log::info!("Tracked {} points, trajectory extent {:.1} px.", track.len(), track.flat_distance());

  let json = track.to_record().to_json()?;
  match &args.output {
    Some(path) => std::fs::write(path, json)
      .with_context(|| format!("Failed to write {}.", path.display()))?,
    None => println!("{}", json),
  }
  Ok(())
}
