use nes_core::{Button, ButtonSet, Engine, LoadError, Player, StateError};

const HEADER_SIZE: usize = 0x10;
const PRG_BANK: usize = 0x4000;
const CHR_BANK: usize = 0x2000;

/// 32KB PRG / 8KB CHR mapper-0 image with `program` at the reset target
/// 0x8000 and `nmi_handler` at 0x9000.
fn build_rom(program: &[u8], nmi_handler: &[u8]) -> Vec<u8> {
  let mut image = vec![0u8; HEADER_SIZE + 2 * PRG_BANK + CHR_BANK];
  image[0..8].copy_from_slice(&[0x4E, 0x45, 0x53, 0x1A, 0x02, 0x01, 0x00, 0x00]);
  image[HEADER_SIZE..HEADER_SIZE + program.len()].copy_from_slice(program);
  let handler = HEADER_SIZE + 0x1000;
  image[handler..handler + nmi_handler.len()].copy_from_slice(nmi_handler);
  image[HEADER_SIZE + 0x7FFA] = 0x00; // NMI -> 0x9000
  image[HEADER_SIZE + 0x7FFB] = 0x90;
  image[HEADER_SIZE + 0x7FFC] = 0x00; // RESET -> 0x8000
  image[HEADER_SIZE + 0x7FFD] = 0x80;
  image[HEADER_SIZE + 0x7FFE] = 0x00; // IRQ -> 0xA000
  image[HEADER_SIZE + 0x7FFF] = 0xA0;
  image
}

/// Busy loop, rendering and interrupts left off.
fn idle_rom() -> Vec<u8> {
  build_rom(&[0x4C, 0x00, 0x80], &[0x40])
}

/// Enables NMI, then loops; the handler counts frames into 0x0010.
fn nmi_counter_rom() -> Vec<u8> {
  build_rom(
    &[0xA9, 0x80, 0x8D, 0x00, 0x20, 0x4C, 0x05, 0x80],
    &[0xE6, 0x10, 0x40], // INC $10; RTI
  )
}

#[test]
fn load_rejects_bad_magic() {
  let mut rom = idle_rom();
  rom[0] = 0x4D;
  assert!(matches!(Engine::load(&rom), Err(LoadError::BadMagic)));
}

#[test]
fn load_rejects_truncated_image() {
  let mut rom = idle_rom();
  rom.truncate(rom.len() - 0x100);
  assert!(matches!(
    Engine::load(&rom),
    Err(LoadError::Truncated { .. })
  ));
}

#[test]
fn load_rejects_unsupported_mapper() {
  let mut rom = idle_rom();
  rom[6] = 0x90; // mapper 9
  assert!(matches!(
    Engine::load(&rom),
    Err(LoadError::UnsupportedMapper(9))
  ));
}

#[test]
fn reset_loads_pc_from_the_reset_vector() {
  let mut engine = Engine::load(&idle_rom()).unwrap();
  engine.reset();
  let vector = engine.peek(0xFFFC) as u16 | (engine.peek(0xFFFD) as u16) << 8;
  assert_eq!(vector, 0x8000);
  assert_eq!(engine.pc(), vector);
}

#[test]
fn step_frame_produces_a_full_frame() {
  let mut engine = Engine::load(&idle_rom()).unwrap();
  engine.reset();
  let output = engine.step_frame();
  assert_eq!(output.frame.width(), 256);
  assert_eq!(output.frame.height(), 240);
}

#[test]
fn step_frame_produces_one_frame_of_audio() {
  let mut engine = Engine::load(&idle_rom()).unwrap();
  // The power-on frame is partial; measure a steady-state one.
  engine.step_frame();
  let samples = engine.step_frame().samples.len();
  // 44100 Hz / 60.1 fps, give or take the frame boundary.
  assert!((730..=740).contains(&samples), "got {} samples", samples);
}

#[test]
fn vblank_flag_tracks_the_documented_window() {
  let mut engine = Engine::load(&idle_rom()).unwrap();
  engine.step_frame();
  let target = engine.ppu().frame_count() + 1;
  while engine.ppu().frame_count() < target {
    engine.step_instruction();
    let scanline = engine.ppu().scanline();
    if (1..=240).contains(&scanline) {
      assert!(!engine.ppu().in_vblank(), "vblank set at line {}", scanline);
    }
    if (242..=260).contains(&scanline) {
      assert!(engine.ppu().in_vblank(), "vblank clear at line {}", scanline);
    }
  }
}

#[test]
fn nmi_fires_exactly_once_per_frame() {
  let mut engine = Engine::load(&nmi_counter_rom()).unwrap();
  for _ in 0..3 {
    engine.step_frame();
  }
  let after_three = engine.peek(0x0010);
  assert!(after_three >= 2, "handler never ran");
  engine.step_frame();
  assert_eq!(engine.peek(0x0010), after_three + 1);
  engine.step_frame();
  assert_eq!(engine.peek(0x0010), after_three + 2);
}

#[test]
fn nmi_does_not_fire_when_disabled() {
  let mut engine = Engine::load(&idle_rom()).unwrap();
  for _ in 0..3 {
    engine.step_frame();
  }
  assert_eq!(engine.peek(0x0010), 0);
}

#[test]
fn save_load_round_trip_is_a_no_op() {
  let rom = nmi_counter_rom();
  let mut saved = Engine::load(&rom).unwrap();
  let mut control = Engine::load(&rom).unwrap();
  saved.step_frame();
  control.step_frame();

  let blob = saved.save_state();
  saved.load_state(&blob).unwrap();

  let a = saved.step_frame();
  let b = control.step_frame();
  assert_eq!(a.frame.as_raw(), b.frame.as_raw());
  assert_eq!(a.samples, b.samples);
  assert_eq!(saved.pc(), control.pc());
  assert_eq!(saved.cycle_count(), control.cycle_count());
}

#[test]
fn load_state_rejects_bad_blobs_and_keeps_running() {
  let mut engine = Engine::load(&nmi_counter_rom()).unwrap();
  engine.step_frame();
  let pc_before = engine.pc();

  assert!(matches!(
    engine.load_state(b"not a state"),
    Err(StateError::BadMagic)
  ));

  let mut wrong_version = engine.save_state();
  wrong_version[4] = 0xFF;
  assert!(matches!(
    engine.load_state(&wrong_version),
    Err(StateError::UnsupportedVersion(_))
  ));

  let mut truncated = engine.save_state();
  truncated.truncate(truncated.len() / 2);
  assert!(matches!(
    engine.load_state(&truncated),
    Err(StateError::Corrupt(_))
  ));

  assert_eq!(engine.pc(), pc_before);
  engine.step_frame();
}

#[test]
fn load_state_rejects_a_different_mapper() {
  let mut nrom = Engine::load(&idle_rom()).unwrap();
  let mut uxrom_image = idle_rom();
  uxrom_image[6] = 0x20; // mapper 2
  let mut uxrom = Engine::load(&uxrom_image).unwrap();

  let blob = nrom.save_state();
  assert!(matches!(
    uxrom.load_state(&blob),
    Err(StateError::MapperMismatch {
      expected: 2,
      found: 0
    })
  ));
}

#[test]
fn controller_state_is_visible_on_the_bus() {
  let mut engine = Engine::load(&idle_rom()).unwrap();
  engine.set_controller_state(
    Player::One,
    ButtonSet::new().with(Button::A).with(Button::Right),
  );
  engine.poke(0x4016, 1);
  engine.poke(0x4016, 0);
  let bits: Vec<u8> = (0..8).map(|_| engine.peek(0x4016) & 1).collect();
  assert_eq!(bits, vec![1, 0, 0, 0, 0, 0, 0, 1]);

  // Player two is untouched.
  engine.poke(0x4016, 1);
  engine.poke(0x4016, 0);
  assert_eq!(engine.peek(0x4017) & 1, 0);
}
