use std::fmt;

use image::RgbaImage;
use log::info;

use crate::bus::MainBus;
use crate::cartridge::{Cartridge, LoadError};
use crate::common::{Address, Byte};
use crate::controller::ButtonSet;
use crate::cpu::Cpu;
use crate::mapper::Mapper;
use crate::ppu::{Ppu, SCANLINE_VISIBLE_DOTS, VISIBLE_SCANLINES};

const STATE_MAGIC: &[u8; 4] = b"NESS";
const STATE_VERSION: u32 = 1;

/// Reasons a save-state blob cannot be applied. A failed load leaves the
/// engine exactly as it was.
#[derive(Debug)]
pub enum StateError {
  /// The blob does not begin with the `NESS` tag.
  BadMagic,
  /// The blob was produced by an incompatible engine revision.
  UnsupportedVersion(u32),
  /// The blob captures a different cartridge board.
  MapperMismatch { expected: Byte, found: Byte },
  /// The body failed to decode.
  Corrupt(String),
}

impl fmt::Display for StateError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      StateError::BadMagic => write!(f, "not a save state (missing NESS tag)"),
      StateError::UnsupportedVersion(v) => {
        write!(f, "save state version {} is not supported", v)
      }
      StateError::MapperMismatch { expected, found } => write!(
        f,
        "save state is for mapper {}, engine runs mapper {}",
        found, expected
      ),
      StateError::Corrupt(reason) => write!(f, "corrupt save state: {}", reason),
    }
  }
}

impl std::error::Error for StateError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Player {
  One,
  Two,
}

/// One finished frame: the 256x240 pixel buffer and the audio samples
/// synthesized while it was rendered.
pub struct FrameOutput {
  pub frame: RgbaImage,
  pub samples: Vec<f32>,
}

/// The console. Owns the CPU, which owns the bus, which owns everything
/// else; the whole machine state is one ownership tree, so snapshots and
/// stepping never fight a borrow.
///
/// `step_frame` is the scheduler: one CPU instruction at a time, then
/// 3 PPU dots and 1 APU cycle per CPU cycle the instruction consumed.
/// The host may also single-step instructions and stop between any two
/// of them without corrupting state.
pub struct Engine {
  cpu: Cpu,
  joypads: [Byte; 2],
  output: FrameOutput,
}

impl Engine {
  /// Parses the ROM image and builds the machine in its power-on state.
  /// Nothing is constructed if the image or its mapper id is bad.
  pub fn load(rom: &[u8]) -> Result<Self, LoadError> {
    let cartridge = Cartridge::load(rom)?;
    let mapper = Mapper::new(cartridge)?;
    let mut cpu = Cpu::new(MainBus::new(mapper));
    cpu.reset();
    info!("engine ready, PC at 0x{:04X}", cpu.pc());
    Ok(Self {
      cpu,
      joypads: [0; 2],
      output: FrameOutput {
        frame: RgbaImage::new(SCANLINE_VISIBLE_DOTS, VISIBLE_SCANLINES),
        samples: Vec::new(),
      },
    })
  }

  /// Console reset: CPU, PPU and APU return to power-on values, the
  /// cartridge keeps its banks and RAM.
  pub fn reset(&mut self) {
    let bus = self.cpu.main_bus_mut();
    bus.ppu_mut().reset();
    let mirroring = bus.mapper().mirroring();
    bus.ppu_mut().update_mirroring(mirroring);
    bus.apu_mut().reset();
    self.cpu.reset();
  }

  pub fn set_controller_state(&mut self, player: Player, buttons: ButtonSet) {
    let slot = match player {
      Player::One => 0,
      Player::Two => 1,
    };
    self.joypads[slot] = buttons.bits();
    let [p1, p2] = self.joypads;
    self.cpu.main_bus_mut().update_joypads(p1, p2);
  }

  /// Executes one instruction (or one interrupt service) and catches the
  /// PPU and APU up, returning the CPU cycles consumed.
  pub fn step_instruction(&mut self) -> u32 {
    self.cpu.poll_interrupt_lines();
    let mut total = 0;
    let mut pending = self.cpu.step();
    while pending > 0 {
      total += pending;
      for _ in 0..pending {
        self.cpu.main_bus_mut().step_ppu();
        self.cpu.main_bus_mut().step_ppu();
        self.cpu.main_bus_mut().step_ppu();
        self.cpu.main_bus_mut().step_apu();
      }
      // DMC fetches during the catch-up stall the CPU; bill them and
      // let the other units run through the stall too.
      pending = self.cpu.main_bus_mut().take_dmc_stall();
      self.cpu.stall(pending);
    }
    total
  }

  /// Runs until the frame in flight completes and returns it together
  /// with the audio produced along the way. Partial frames are never
  /// exposed.
  pub fn step_frame(&mut self) -> &FrameOutput {
    let start = self.cpu.main_bus().ppu().frame_count();
    while self.cpu.main_bus().ppu().frame_count() == start {
      self.step_instruction();
    }
    self.output.frame.clone_from(self.cpu.main_bus().ppu().frame());
    self.output.samples = self.cpu.main_bus_mut().apu_mut().drain_samples();
    &self.output
  }

  /// The most recently completed frame.
  pub fn last_frame(&self) -> &FrameOutput {
    &self.output
  }

  pub fn ppu(&self) -> &Ppu {
    self.cpu.main_bus().ppu()
  }

  pub fn pc(&self) -> Address {
    self.cpu.pc()
  }

  pub fn cycle_count(&self) -> u64 {
    self.cpu.cycle_count()
  }

  /// Debug read on the CPU bus. Side effects are the same as a CPU read,
  /// so registers with read triggers do fire.
  pub fn peek(&mut self, addr: Address) -> Byte {
    self.cpu.main_bus_mut().read(addr)
  }

  /// Debug write on the CPU bus.
  pub fn poke(&mut self, addr: Address, value: Byte) {
    self.cpu.main_bus_mut().write(addr, value);
  }

  /// Serializes every register, counter and RAM byte needed for a
  /// bit-exact resume: `NESS`, a version word, then the CBOR body.
  pub fn save_state(&self) -> Vec<u8> {
    let mut blob = Vec::new();
    blob.extend_from_slice(STATE_MAGIC);
    blob.extend_from_slice(&STATE_VERSION.to_le_bytes());
    // Writing to a Vec cannot fail and every component serializes.
    ciborium::ser::into_writer(&self.cpu, &mut blob)
      .unwrap_or_else(|e| unreachable!("state encoding failed: {}", e));
    info!("saved state, {} bytes", blob.len());
    blob
  }

  /// Applies a blob from `save_state`. The body is decoded completely
  /// before anything is touched; on any error the engine keeps running
  /// from its current state.
  pub fn load_state(&mut self, blob: &[u8]) -> Result<(), StateError> {
    if blob.len() < 8 || &blob[..4] != STATE_MAGIC {
      return Err(StateError::BadMagic);
    }
    let version = u32::from_le_bytes([blob[4], blob[5], blob[6], blob[7]]);
    if version != STATE_VERSION {
      return Err(StateError::UnsupportedVersion(version));
    }
    let cpu: Cpu =
      ciborium::de::from_reader(&blob[8..]).map_err(|e| StateError::Corrupt(e.to_string()))?;
    let expected = self.cpu.main_bus().mapper().mapper_id();
    let found = cpu.main_bus().mapper().mapper_id();
    if expected != found {
      return Err(StateError::MapperMismatch { expected, found });
    }
    self.cpu = cpu;
    info!("loaded state, PC at 0x{:04X}", self.cpu.pc());
    Ok(())
  }
}
