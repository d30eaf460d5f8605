//! Cycle-accurate NES console core: 6502 interpreter, dot-accurate PPU,
//! five-channel APU, mapper framework and versioned save states, driven
//! in lock-step by [`Engine::step_frame`]. Headless by design; video,
//! audio output and input binding belong to the host.

pub mod apu;
pub mod bus;
pub mod cartridge;
pub mod common;
pub mod controller;
pub mod cpu;
pub mod engine;
pub mod logger;
pub mod mapper;
pub mod ppu;
pub mod types;

pub use cartridge::{Cartridge, LoadError};
pub use controller::{Button, ButtonSet};
pub use engine::{Engine, FrameOutput, Player, StateError};
