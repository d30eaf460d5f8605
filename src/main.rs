use std::collections::HashMap;
use std::fs;

use anyhow::{Context, Result};
use clap::Parser;
use log::info;

use nes_core::controller::ButtonSet;
use nes_core::engine::{Engine, Player};
use nes_core::logger;

/// Headless runner: emulates a ROM for a fixed number of frames and
/// reports a hash of the final frame, for golden-image comparisons and
/// scripted regression runs.
#[derive(Parser, Debug)]
#[clap(about, version)]
struct Args {
  /// iNES ROM image to run
  rom_path: String,

  /// Number of frames to emulate
  #[clap(short, long, default_value = "60")]
  frames: u32,

  /// Write the final frame to this path as PNG
  #[clap(long)]
  dump_frame: Option<String>,

  /// JSON input script: frame number to [player1, player2] button bytes
  #[clap(long)]
  input_script: Option<String>,

  /// Log level: error, warn, info, debug or trace
  #[clap(short, long, default_value = "warn")]
  log_level: String,
}

fn frame_hash(frame: &image::RgbaImage) -> u64 {
  // FNV-1a over the raw pixels.
  let mut hash: u64 = 0xcbf29ce484222325;
  for byte in frame.as_raw() {
    hash ^= *byte as u64;
    hash = hash.wrapping_mul(0x100000001b3);
  }
  hash
}

fn main() -> Result<()> {
  let args = Args::parse();
  let level = args
    .log_level
    .parse::<log::Level>()
    .with_context(|| format!("bad log level {:?}", args.log_level))?;
  logger::init(Some(level)).context("logger already installed")?;

  let rom = fs::read(&args.rom_path).with_context(|| format!("reading {}", args.rom_path))?;
  let mut engine = Engine::load(&rom).with_context(|| format!("loading {}", args.rom_path))?;

  let script: HashMap<u32, [u8; 2]> = match &args.input_script {
    Some(path) => {
      let text = fs::read_to_string(path).with_context(|| format!("reading {}", path))?;
      serde_json::from_str(&text).with_context(|| format!("parsing {}", path))?
    }
    None => HashMap::new(),
  };

  let mut samples_total = 0usize;
  for frame in 0..args.frames {
    if let Some([p1, p2]) = script.get(&frame) {
      engine.set_controller_state(Player::One, ButtonSet::from_bits(*p1));
      engine.set_controller_state(Player::Two, ButtonSet::from_bits(*p2));
    }
    let output = engine.step_frame();
    samples_total += output.samples.len();
    info!("frame {}: hash {:016x}", frame, frame_hash(&output.frame));
  }

  let output = engine.last_frame();
  println!(
    "{} frames, {} audio samples, final hash {:016x}",
    args.frames,
    samples_total,
    frame_hash(&output.frame)
  );

  if let Some(path) = &args.dump_frame {
    output
      .frame
      .save(path)
      .with_context(|| format!("writing {}", path))?;
    println!("final frame written to {}", path);
  }

  Ok(())
}
