use lazy_static::lazy_static;
use log::warn;
use serde::{Deserialize, Serialize};

pub mod channel;
pub mod filter;

use crate::common::{bit_eq, Address, Byte};

use self::channel::{Dmc, Noise, Pulse, Triangle};
use self::filter::{Filter, FilterChain, FirstOrderFilter};

/// NTSC 2A03 clock.
pub const CPU_FREQUENCY: u32 = 1_789_773;
/// Fixed output rate; hosts resample if their device wants another one.
pub const SAMPLE_RATE: u32 = 44_100;

const FRAME_COUNTER_RATE: f64 = CPU_FREQUENCY as f64 / 240.0;
const SAMPLE_PERIOD: f64 = CPU_FREQUENCY as f64 / SAMPLE_RATE as f64;

lazy_static! {
  static ref PULSE_TABLE: [f32; 31] = {
    let mut table = [0.0; 31];
    for (i, entry) in table.iter_mut().enumerate().skip(1) {
      *entry = 95.52 / (8128.0 / (i as f32) + 100.0);
    }
    table
  };
  static ref TND_TABLE: [f32; 203] = {
    let mut table = [0.0; 203];
    for (i, entry) in table.iter_mut().enumerate().skip(1) {
      *entry = 163.67 / (24329.0 / (i as f32) + 100.0);
    }
    table
  };
}

/// The five sound channels behind the 0x4000-0x4017 register file.
///
/// `step` advances one CPU cycle. The 240 Hz frame counter clocks
/// envelopes every step and sweeps/lengths every other step; in 4-step
/// mode it raises the frame IRQ on the last step unless inhibited.
/// Mixed output runs through the 90/440 Hz high-pass and 14 kHz
/// low-pass chain into a buffer the frame loop drains.
#[derive(Serialize, Deserialize)]
pub struct Apu {
  cycle: u64,
  frame_period: Byte,
  frame_value: Byte,
  frame_irq_enabled: bool,
  frame_irq_flag: bool,

  pulse1: Pulse,
  pulse2: Pulse,
  triangle: Triangle,
  noise: Noise,
  dmc: Dmc,

  filter_chain: FilterChain,
  #[serde(skip)]
  samples: Vec<f32>,
}

impl Apu {
  pub fn new() -> Self {
    Self {
      cycle: 0,
      frame_period: 4,
      frame_value: 0,
      frame_irq_enabled: true,
      frame_irq_flag: false,
      pulse1: Pulse::new(1),
      pulse2: Pulse::new(2),
      triangle: Triangle::new(),
      noise: Noise::new(),
      dmc: Dmc::new(),
      filter_chain: vec![
        FirstOrderFilter::high_pass(SAMPLE_RATE as f32, 90.),
        FirstOrderFilter::high_pass(SAMPLE_RATE as f32, 440.),
        FirstOrderFilter::low_pass(SAMPLE_RATE as f32, 14_000.),
      ],
      samples: Vec::new(),
    }
  }

  pub fn reset(&mut self) {
    *self = Self::new();
  }

  /// Address of the sample byte the DMC wants next, if its buffer ran
  /// dry. The owner performs the read and answers with `dmc_supply`.
  pub fn dmc_fetch_request(&self) -> Option<Address> {
    self.dmc.fetch_request()
  }

  pub fn dmc_supply(&mut self, value: Byte) {
    self.dmc.supply(value);
  }

  /// Level of the APU side of the IRQ line.
  pub fn irq_asserted(&self) -> bool {
    self.frame_irq_flag || self.dmc.irq_flag()
  }

  /// Samples produced since the last drain, at `SAMPLE_RATE`.
  pub fn drain_samples(&mut self) -> Vec<f32> {
    std::mem::take(&mut self.samples)
  }

  /// Advances one CPU cycle.
  pub fn step(&mut self) {
    let cycle1 = self.cycle as f64;
    self.cycle += 1;
    let cycle2 = self.cycle as f64;
    self.step_timer();
    let f1 = (cycle1 / FRAME_COUNTER_RATE) as u32;
    let f2 = (cycle2 / FRAME_COUNTER_RATE) as u32;
    if f1 != f2 {
      self.step_frame_counter();
    }
    let s1 = (cycle1 / SAMPLE_PERIOD) as u32;
    let s2 = (cycle2 / SAMPLE_PERIOD) as u32;
    if s1 != s2 {
      self.collect_sample();
    }
  }

  fn collect_sample(&mut self) {
    let pulse1 = self.pulse1.output();
    let pulse2 = self.pulse2.output();
    let triangle = self.triangle.output();
    let noise = self.noise.output();
    let dmc = self.dmc.output();
    // Nonlinear mixing; straight summation gets the loudness balance
    // between the pulse pair and the TND group wrong.
    let sample = PULSE_TABLE[(pulse1 + pulse2) as usize]
      + TND_TABLE[(3 * triangle + 2 * noise + dmc) as usize];
    let filtered = self.filter_chain.step(sample);
    self.samples.push(filtered);
  }

  // mode 0:    mode 1:       function
  // ---------  -----------  -----------------------------
  //  - - - f    - - - - -    IRQ (if bit 6 is clear)
  //  - l - l    - l - - l    Length counter and sweep
  //  e e e e    e e e - e    Envelope and linear counter
  fn step_frame_counter(&mut self) {
    if self.frame_period == 4 {
      self.frame_value = self.frame_value % 4 + 1;
      self.step_envelope();
      if self.frame_value == 2 || self.frame_value == 4 {
        self.step_sweep();
        self.step_length();
      }
      if self.frame_value == 4 && self.frame_irq_enabled {
        self.frame_irq_flag = true;
      }
    } else {
      self.frame_value = self.frame_value % 5 + 1;
      match self.frame_value {
        1 | 3 => self.step_envelope(),
        2 | 5 => {
          self.step_envelope();
          self.step_sweep();
          self.step_length();
        }
        _ => {}
      }
    }
  }

  fn step_timer(&mut self) {
    if self.cycle % 2 == 0 {
      self.pulse1.step_timer();
      self.pulse2.step_timer();
      self.noise.step_timer();
      self.dmc.step_timer();
    }
    self.triangle.step_timer();
  }

  fn step_envelope(&mut self) {
    self.pulse1.step_envelope();
    self.pulse2.step_envelope();
    self.triangle.step_counter();
    self.noise.step_envelope();
  }

  fn step_sweep(&mut self) {
    self.pulse1.step_sweep();
    self.pulse2.step_sweep();
  }

  fn step_length(&mut self) {
    self.pulse1.step_length();
    self.pulse2.step_length();
    self.triangle.step_length();
    self.noise.step_length();
  }

  /// 0x4015 read: channel length states plus the two IRQ flags. Reading
  /// acknowledges the frame IRQ but not the DMC one.
  pub fn read_status(&mut self) -> Byte {
    let mut result = 0;
    if self.pulse1.length_value() > 0 {
      result |= 0x01;
    }
    if self.pulse2.length_value() > 0 {
      result |= 0x02;
    }
    if self.triangle.length_value() > 0 {
      result |= 0x04;
    }
    if self.noise.length_value() > 0 {
      result |= 0x08;
    }
    if self.dmc.bytes_remaining() > 0 {
      result |= 0x10;
    }
    if self.frame_irq_flag {
      result |= 0x40;
    }
    if self.dmc.irq_flag() {
      result |= 0x80;
    }
    self.frame_irq_flag = false;
    result
  }

  pub fn write_register(&mut self, address: Address, value: Byte) {
    match address {
      0x4000 => self.pulse1.write_control(value),
      0x4001 => self.pulse1.write_sweep(value),
      0x4002 => self.pulse1.write_timer_low(value),
      0x4003 => self.pulse1.write_timer_high(value),
      0x4004 => self.pulse2.write_control(value),
      0x4005 => self.pulse2.write_sweep(value),
      0x4006 => self.pulse2.write_timer_low(value),
      0x4007 => self.pulse2.write_timer_high(value),
      0x4008 => self.triangle.write_control(value),
      0x4009 => (),
      0x400A => self.triangle.write_timer_low(value),
      0x400B => self.triangle.write_timer_high(value),
      0x400C => self.noise.write_control(value),
      0x400D => (),
      0x400E => self.noise.write_period(value),
      0x400F => self.noise.write_length(value),
      0x4010 => self.dmc.write_control(value),
      0x4011 => self.dmc.write_value(value),
      0x4012 => self.dmc.write_address(value),
      0x4013 => self.dmc.write_length(value),
      0x4015 => self.write_control(value),
      0x4017 => self.write_frame_counter(value),
      _ => warn!("unhandled apu register write at address 0x{:04X}", address),
    }
  }

  fn write_control(&mut self, value: Byte) {
    self.pulse1.set_enabled(bit_eq(value, 0x01));
    self.pulse2.set_enabled(bit_eq(value, 0x02));
    self.triangle.set_enabled(bit_eq(value, 0x04));
    self.noise.set_enabled(bit_eq(value, 0x08));
    self.dmc.set_enabled(bit_eq(value, 0x10));
    self.dmc.clear_irq();
  }

  //  mi-- ----       mode, IRQ inhibit
  fn write_frame_counter(&mut self, value: Byte) {
    self.frame_period = if bit_eq(value, 0x80) { 5 } else { 4 };
    self.frame_value = 0;
    self.frame_irq_enabled = !bit_eq(value, 0x40);
    if !self.frame_irq_enabled {
      self.frame_irq_flag = false;
    }
    // 5-step mode clocks everything immediately.
    if self.frame_period == 5 {
      self.step_envelope();
      self.step_sweep();
      self.step_length();
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  // Four frame-counter steps plus slack.
  const FOUR_STEPS: u32 = 29_831;

  fn run(apu: &mut Apu, cycles: u32) {
    for _ in 0..cycles {
      apu.step();
    }
  }

  #[test]
  fn mixer_tables_are_nonlinear() {
    assert_eq!(PULSE_TABLE[0], 0.0);
    assert!((PULSE_TABLE[30] - 0.2575).abs() < 1e-3);
    // Two channels at half volume are louder than one at full.
    assert!(PULSE_TABLE[15] * 2.0 > PULSE_TABLE[30]);
  }

  #[test]
  fn status_reports_active_lengths() {
    let mut apu = Apu::new();
    apu.write_register(0x4015, 0x0F);
    apu.write_register(0x4003, 0x08);
    apu.write_register(0x400B, 0x08);
    assert_eq!(apu.read_status() & 0x0F, 0x05);
  }

  #[test]
  fn disabling_a_channel_clears_its_length() {
    let mut apu = Apu::new();
    apu.write_register(0x4015, 0x01);
    apu.write_register(0x4003, 0x08);
    assert_eq!(apu.read_status() & 0x01, 0x01);
    apu.write_register(0x4015, 0x00);
    assert_eq!(apu.read_status() & 0x01, 0x00);
  }

  #[test]
  fn four_step_mode_raises_the_frame_irq() {
    let mut apu = Apu::new();
    run(&mut apu, FOUR_STEPS);
    assert!(apu.irq_asserted());
    // Reading 0x4015 acknowledges it.
    assert_eq!(apu.read_status() & 0x40, 0x40);
    assert!(!apu.irq_asserted());
  }

  #[test]
  fn irq_inhibit_suppresses_and_clears_the_flag() {
    let mut apu = Apu::new();
    run(&mut apu, FOUR_STEPS);
    assert!(apu.irq_asserted());
    apu.write_register(0x4017, 0x40);
    assert!(!apu.irq_asserted());
    run(&mut apu, FOUR_STEPS);
    assert!(!apu.irq_asserted());
  }

  #[test]
  fn five_step_mode_never_raises_the_frame_irq() {
    let mut apu = Apu::new();
    apu.write_register(0x4017, 0x80);
    run(&mut apu, 2 * FOUR_STEPS);
    assert!(!apu.irq_asserted());
  }

  #[test]
  fn five_step_write_clocks_the_lengths_immediately() {
    let mut apu = Apu::new();
    apu.write_register(0x4015, 0x01);
    apu.write_register(0x4003, 0x18); // length 0x02
    apu.write_register(0x4017, 0x80);
    assert_eq!(apu.read_status() & 0x01, 0x01);
    apu.write_register(0x4017, 0x80);
    assert_eq!(apu.read_status() & 0x01, 0x00);
  }

  #[test]
  fn sample_cadence_matches_the_divider() {
    let mut apu = Apu::new();
    run(&mut apu, CPU_FREQUENCY / 60);
    let samples = apu.drain_samples();
    let expected = SAMPLE_RATE / 60;
    assert!(samples.len() as u32 >= expected - 1 && samples.len() as u32 <= expected + 1);
    assert!(apu.drain_samples().is_empty());
  }

  #[test]
  fn frame_counter_clocks_lengths_at_120_hz() {
    let mut apu = Apu::new();
    apu.write_register(0x4017, 0x40); // keep the IRQ out of the way
    apu.write_register(0x4015, 0x01);
    apu.write_register(0x4000, 0x00); // halt clear
    apu.write_register(0x4003, 0x18); // length 0x02
    // Steps 2 and 4 each take one off the counter, emptying it within
    // a single four-step sequence.
    run(&mut apu, FOUR_STEPS);
    assert_eq!(apu.read_status() & 0x01, 0x00);
  }
}
