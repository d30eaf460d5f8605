use serde::{Deserialize, Serialize};

use crate::common::{bit_eq, Address, Byte};

pub(super) const LENGTH_TABLE: [Byte; 32] = [
  0x0A, 0xFE, 0x14, 0x02, 0x28, 0x04, 0x80, 0x06, 0xA0, 0x08, 0x3C, 0x0A, 0x0E, 0x0C, 0x1A, 0x0E,
  0x0C, 0x10, 0x18, 0x12, 0x30, 0x14, 0x60, 0x16, 0xC0, 0x18, 0x48, 0x1A, 0x10, 0x1C, 0x20, 0x1E,
];

const DUTY_TABLE: [[Byte; 8]; 4] = [
  [0, 1, 0, 0, 0, 0, 0, 0],
  [0, 1, 1, 0, 0, 0, 0, 0],
  [0, 1, 1, 1, 1, 0, 0, 0],
  [1, 0, 0, 1, 1, 1, 1, 1],
];

#[rustfmt::skip]
const TRIANGLE_TABLE: [Byte; 32] = [
  15, 14, 13, 12, 11, 10, 9, 8, 7, 6, 5, 4, 3, 2, 1, 0,
  0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15,
];

// Periods in half-CPU-cycle units; pulse, noise and DMC timers are
// clocked every other CPU cycle.
const NOISE_TABLE: [Address; 16] = [
  4, 8, 16, 32, 64, 96, 128, 160, 202, 254, 380, 508, 762, 1016, 2034, 4068,
];

const DMC_TABLE: [Byte; 16] = [
  214, 190, 170, 160, 143, 127, 113, 107, 95, 80, 71, 64, 53, 42, 36, 27,
];

/// Length counter plus volume envelope, shared by the pulse and noise
/// channels.
#[derive(Serialize, Deserialize)]
struct Envelope {
  enabled: bool,
  length_enabled: bool,
  length_value: Byte,
  envelope_enabled: bool,
  envelope_loop: bool,
  envelope_start: bool,
  envelope_period: Byte,
  envelope_value: Byte,
  envelope_volume: Byte,
  constant_volume: Byte,
}

impl Default for Envelope {
  // A zeroed control register has the halt bit clear, so the length
  // counter runs at power-on.
  fn default() -> Self {
    Self {
      enabled: false,
      length_enabled: true,
      length_value: 0,
      envelope_enabled: false,
      envelope_loop: false,
      envelope_start: false,
      envelope_period: 0,
      envelope_value: 0,
      envelope_volume: 0,
      constant_volume: 0,
    }
  }
}

impl Envelope {
  fn length_value(&self) -> Byte {
    self.length_value
  }

  fn set_enabled(&mut self, value: bool) {
    self.enabled = value;
    if !value {
      self.length_value = 0;
    }
  }

  fn output(&self) -> Byte {
    if !self.enabled || self.length_value == 0 {
      return 0;
    }
    if self.envelope_enabled {
      self.envelope_volume
    } else {
      self.constant_volume
    }
  }

  fn step_length(&mut self) {
    if self.length_enabled && self.length_value > 0 {
      self.length_value -= 1;
    }
  }

  fn step_envelope(&mut self) {
    if self.envelope_start {
      self.envelope_volume = 15;
      self.envelope_value = self.envelope_period;
      self.envelope_start = false;
    } else if self.envelope_value > 0 {
      self.envelope_value -= 1;
    } else {
      if self.envelope_volume > 0 {
        self.envelope_volume -= 1;
      } else if self.envelope_loop {
        self.envelope_volume = 15;
      }
      self.envelope_value = self.envelope_period;
    }
  }

  fn write_length(&mut self, value: Byte) {
    if self.enabled {
      self.length_value = LENGTH_TABLE[(value >> 3) as usize];
    }
    self.envelope_start = true;
  }

  fn write_control(&mut self, value: Byte) {
    self.length_enabled = !bit_eq(value, 0x20);
    self.envelope_loop = !self.length_enabled;
    self.envelope_enabled = !bit_eq(value, 0x10);
    self.envelope_period = value & 0x0F;
    self.constant_volume = value & 0x0F;
    self.envelope_start = true;
  }
}

#[derive(Default, Serialize, Deserialize)]
pub(super) struct Pulse {
  channel: Byte,
  sweep_reload: bool,
  sweep_enabled: bool,
  sweep_negate: bool,
  sweep_period: Byte,
  sweep_value: Byte,
  sweep_shift: Byte,
  timer_period: Address,
  timer_value: Address,
  duty_mode: Byte,
  duty_value: Byte,
  envelope: Envelope,
}

impl Pulse {
  pub(super) fn new(channel: Byte) -> Self {
    Self {
      channel,
      ..Self::default()
    }
  }

  pub(super) fn length_value(&self) -> Byte {
    self.envelope.length_value()
  }

  pub(super) fn output(&self) -> Byte {
    if DUTY_TABLE[self.duty_mode as usize][self.duty_value as usize] == 0 {
      return 0;
    }
    if self.timer_period < 8 || self.timer_period > 0x7FF {
      return 0;
    }
    self.envelope.output()
  }

  pub(super) fn set_enabled(&mut self, enable: bool) {
    self.envelope.set_enabled(enable);
  }

  fn sweep(&mut self) {
    let delta = self.timer_period >> self.sweep_shift;
    if self.sweep_negate {
      self.timer_period = self.timer_period.wrapping_sub(delta);
      // Pulse 1 uses one's-complement negation, so it lands one lower.
      if self.channel == 1 {
        self.timer_period = self.timer_period.wrapping_sub(1);
      }
    } else {
      self.timer_period = self.timer_period.wrapping_add(delta);
    }
  }

  pub(super) fn step_length(&mut self) {
    self.envelope.step_length();
  }

  pub(super) fn step_sweep(&mut self) {
    if self.sweep_reload {
      if self.sweep_enabled && self.sweep_value == 0 {
        self.sweep();
      }
      self.sweep_value = self.sweep_period;
      self.sweep_reload = false;
    } else if self.sweep_value > 0 {
      self.sweep_value -= 1;
    } else {
      if self.sweep_enabled {
        self.sweep();
      }
      self.sweep_value = self.sweep_period;
    }
  }

  pub(super) fn step_envelope(&mut self) {
    self.envelope.step_envelope();
  }

  pub(super) fn step_timer(&mut self) {
    if self.timer_value > 0 {
      self.timer_value -= 1;
    } else {
      self.timer_value = self.timer_period;
      self.duty_value = (self.duty_value + 1) % 8;
    }
  }

  pub(super) fn write_control(&mut self, value: Byte) {
    self.duty_mode = (value >> 6) & 3;
    self.envelope.write_control(value);
  }

  pub(super) fn write_sweep(&mut self, value: Byte) {
    self.sweep_enabled = bit_eq(value, 0x80);
    self.sweep_period = (value >> 4 & 7) + 1;
    self.sweep_negate = bit_eq(value, 0x08);
    self.sweep_shift = value & 7;
    self.sweep_reload = true;
  }

  pub(super) fn write_timer_low(&mut self, value: Byte) {
    self.timer_period = (self.timer_period & 0xFF00) | value as Address;
  }

  pub(super) fn write_timer_high(&mut self, value: Byte) {
    self.envelope.write_length(value);
    self.timer_period = (self.timer_period & 0xFF) | ((value as Address & 7) << 8);
    self.duty_value = 0;
  }
}

#[derive(Default, Serialize, Deserialize)]
pub(super) struct Triangle {
  enabled: bool,
  length_enabled: bool,
  length_value: Byte,
  timer_period: Address,
  timer_value: Address,
  duty_value: Byte,
  counter_period: Byte,
  counter_value: Byte,
  counter_reload: bool,
}

impl Triangle {
  pub(super) fn new() -> Self {
    Self {
      // Halt bit clear at power-on, same as the envelope channels.
      length_enabled: true,
      ..Self::default()
    }
  }

  pub(super) fn length_value(&self) -> Byte {
    self.length_value
  }

  pub(super) fn set_enabled(&mut self, enable: bool) {
    self.enabled = enable;
    if !enable {
      self.length_value = 0;
    }
  }

  pub(super) fn output(&self) -> Byte {
    if !self.enabled || self.length_value == 0 || self.counter_value == 0 {
      return 0;
    }
    // Ultrasonic periods would pop; mute them instead.
    if self.timer_period < 3 {
      return 0;
    }
    TRIANGLE_TABLE[self.duty_value as usize]
  }

  pub(super) fn step_counter(&mut self) {
    if self.counter_reload {
      self.counter_value = self.counter_period;
    } else if self.counter_value > 0 {
      self.counter_value -= 1;
    }
    if self.length_enabled {
      self.counter_reload = false;
    }
  }

  pub(super) fn step_length(&mut self) {
    if self.length_enabled && self.length_value > 0 {
      self.length_value -= 1;
    }
  }

  pub(super) fn step_timer(&mut self) {
    if self.timer_value == 0 {
      self.timer_value = self.timer_period;
      // The waveform only advances while both counters are live.
      if self.length_value > 0 && self.counter_value > 0 {
        self.duty_value = (self.duty_value + 1) % 32;
      }
    } else {
      self.timer_value -= 1;
    }
  }

  pub(super) fn write_control(&mut self, value: Byte) {
    self.length_enabled = !bit_eq(value, 0x80);
    self.counter_period = value & 0x7F;
  }

  pub(super) fn write_timer_low(&mut self, value: Byte) {
    self.timer_period = (self.timer_period & 0xFF00) | value as Address;
  }

  pub(super) fn write_timer_high(&mut self, value: Byte) {
    if self.enabled {
      self.length_value = LENGTH_TABLE[value as usize >> 3];
    }
    self.timer_period = (self.timer_period & 0xFF) | ((value as Address & 7) << 8);
    self.timer_value = self.timer_period;
    self.counter_reload = true;
  }
}

#[derive(Default, Serialize, Deserialize)]
pub(super) struct Noise {
  timer_period: Address,
  timer_value: Address,
  timer_mode: bool,
  shift_register: Address,
  envelope: Envelope,
}

impl Noise {
  pub(super) fn new() -> Self {
    Self {
      shift_register: 1,
      ..Self::default()
    }
  }

  pub(super) fn length_value(&self) -> Byte {
    self.envelope.length_value()
  }

  pub(super) fn set_enabled(&mut self, enable: bool) {
    self.envelope.set_enabled(enable);
  }

  pub(super) fn output(&self) -> Byte {
    if bit_eq(self.shift_register, 1) {
      return 0;
    }
    self.envelope.output()
  }

  pub(super) fn step_envelope(&mut self) {
    self.envelope.step_envelope();
  }

  pub(super) fn step_length(&mut self) {
    self.envelope.step_length();
  }

  pub(super) fn step_timer(&mut self) {
    if self.timer_value != 0 {
      self.timer_value -= 1;
      return;
    }
    self.timer_value = self.timer_period;
    // 15-bit LFSR, feedback from bit 1 or bit 6 depending on the mode.
    let shift = if self.timer_mode { 6 } else { 1 };
    let b1 = self.shift_register & 1;
    let b2 = (self.shift_register >> shift) & 1;
    self.shift_register = ((b1 ^ b2) << 14) | (self.shift_register >> 1);
  }

  pub(super) fn write_control(&mut self, value: Byte) {
    self.envelope.write_control(value);
  }

  pub(super) fn write_period(&mut self, value: Byte) {
    // m--- iiii       mode, period index
    self.timer_mode = bit_eq(value, 0x80);
    self.timer_period = NOISE_TABLE[value as usize & 0x0F];
  }

  pub(super) fn write_length(&mut self, value: Byte) {
    self.envelope.write_length(value);
  }
}

/// Delta modulation channel. It never touches the bus itself: the owner
/// polls `fetch_request` for the address of the next sample byte and
/// feeds the value back through `supply`, paying the fetch stall on the
/// CPU side.
#[derive(Default, Serialize, Deserialize)]
pub(super) struct Dmc {
  enabled: bool,
  value: Byte,
  sample_address: Address,
  sample_length: Address,
  current_address: Address,
  current_length: Address,
  sample_buffer: Option<Byte>,
  shift_register: Byte,
  bits_remaining: Byte,
  tick_period: Byte,
  tick_value: Byte,
  loop_enable: bool,
  irq_enabled: bool,
  irq_flag: bool,
}

impl Dmc {
  pub(super) fn new() -> Self {
    Self::default()
  }

  pub(super) fn bytes_remaining(&self) -> Address {
    self.current_length
  }

  pub(super) fn irq_flag(&self) -> bool {
    self.irq_flag
  }

  pub(super) fn clear_irq(&mut self) {
    self.irq_flag = false;
  }

  pub(super) fn set_enabled(&mut self, enable: bool) {
    self.enabled = enable;
    if !enable {
      self.current_length = 0;
    } else if self.current_length == 0 {
      self.restart();
    }
  }

  pub(super) fn output(&self) -> Byte {
    self.value
  }

  pub(super) fn fetch_request(&self) -> Option<Address> {
    if self.enabled && self.sample_buffer.is_none() && self.current_length > 0 {
      Some(self.current_address)
    } else {
      None
    }
  }

  pub(super) fn supply(&mut self, value: Byte) {
    self.sample_buffer = Some(value);
    // The address counter wraps from the top of memory back to 0x8000.
    self.current_address = if self.current_address == 0xFFFF {
      0x8000
    } else {
      self.current_address + 1
    };
    self.current_length -= 1;
    if self.current_length == 0 {
      if self.loop_enable {
        self.restart();
      } else if self.irq_enabled {
        self.irq_flag = true;
      }
    }
  }

  fn step_shifter(&mut self) {
    if self.bits_remaining == 0 {
      // Output cycle boundary; an empty buffer silences the shifter.
      match self.sample_buffer.take() {
        Some(byte) => {
          self.shift_register = byte;
          self.bits_remaining = 8;
        }
        None => return,
      }
    }
    if bit_eq(self.shift_register, 1) {
      if self.value <= 125 {
        self.value += 2;
      }
    } else if self.value >= 2 {
      self.value -= 2;
    }
    self.shift_register >>= 1;
    self.bits_remaining -= 1;
  }

  pub(super) fn step_timer(&mut self) {
    if !self.enabled {
      return;
    }
    if self.tick_value == 0 {
      self.tick_value = self.tick_period;
      self.step_shifter();
    } else {
      self.tick_value -= 1;
    }
  }

  fn restart(&mut self) {
    self.current_address = self.sample_address;
    self.current_length = self.sample_length;
  }

  pub(super) fn write_control(&mut self, value: Byte) {
    self.irq_enabled = bit_eq(value, 0x80);
    if !self.irq_enabled {
      self.irq_flag = false;
    }
    self.loop_enable = bit_eq(value, 0x40);
    self.tick_period = DMC_TABLE[value as usize & 0xF];
  }

  pub(super) fn write_value(&mut self, value: Byte) {
    self.value = value & 0x7F;
  }

  pub(super) fn write_address(&mut self, value: Byte) {
    self.sample_address = 0xC000 | ((value as Address) << 6);
  }

  pub(super) fn write_length(&mut self, value: Byte) {
    self.sample_length = ((value as Address) << 4) | 1;
  }
}
