use num_enum::IntoPrimitive;
use serde::{Deserialize, Serialize};

use crate::common::{bit_eq, Byte};

/// Buttons of the standard controller, in shift-out order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive)]
#[repr(u8)]
pub enum Button {
  A = 0,
  B,
  Select,
  Start,
  Up,
  Down,
  Left,
  Right,
}

/// One byte of button state, bit n = `Button` with discriminant n.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ButtonSet(Byte);

impl ButtonSet {
  pub fn new() -> Self {
    Self(0)
  }

  pub fn from_bits(bits: Byte) -> Self {
    Self(bits)
  }

  pub fn bits(self) -> Byte {
    self.0
  }

  pub fn with(self, button: Button) -> Self {
    Self(self.0 | 1 << u8::from(button))
  }

  pub fn contains(self, button: Button) -> bool {
    bit_eq(self.0, 1 << u8::from(button))
  }
}

impl From<Button> for ButtonSet {
  fn from(button: Button) -> Self {
    Self::new().with(button)
  }
}

/// Standard controller: while the strobe bit is high the shift register
/// follows the live button states, on the falling edge it latches them,
/// and each read shifts one bit out A-first. The upper bus lines read
/// back high, hence the `0x40`.
#[derive(Default, Serialize, Deserialize)]
pub struct Controller {
  enable_strobe: bool,
  shift: Byte,
  key_states: Byte,
}

impl Controller {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn set_button_states(&mut self, states: Byte) {
    self.key_states = states;
  }

  pub fn strobe(&mut self, b: Byte) {
    self.enable_strobe = bit_eq(b, 1);
    if !self.enable_strobe {
      self.shift = self.key_states;
    }
  }

  pub fn read(&mut self) -> Byte {
    let bit = if self.enable_strobe {
      self.key_states & 1
    } else {
      let bit = self.shift & 1;
      // Reads past the eighth report 1 on hardware.
      self.shift = 0x80 | (self.shift >> 1);
      bit
    };
    bit | 0x40
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn button_set_builds_the_hardware_bit_layout() {
    let set = ButtonSet::new().with(Button::A).with(Button::Start);
    assert_eq!(set.bits(), 0b0000_1001);
    assert!(set.contains(Button::A));
    assert!(!set.contains(Button::B));
  }

  #[test]
  fn latched_buttons_shift_out_a_first() {
    let mut pad = Controller::new();
    pad.set_button_states(ButtonSet::from_bits(0b1000_0010).bits());
    pad.strobe(1);
    pad.strobe(0);
    let bits: Vec<Byte> = (0..8).map(|_| pad.read() & 1).collect();
    assert_eq!(bits, vec![0, 1, 0, 0, 0, 0, 0, 1]);
  }

  #[test]
  fn reads_past_the_eighth_return_one() {
    let mut pad = Controller::new();
    pad.strobe(1);
    pad.strobe(0);
    for _ in 0..8 {
      pad.read();
    }
    assert_eq!(pad.read() & 1, 1);
  }

  #[test]
  fn strobe_high_repeats_the_a_button() {
    let mut pad = Controller::new();
    pad.set_button_states(1);
    pad.strobe(1);
    assert_eq!(pad.read(), 0x41);
    assert_eq!(pad.read(), 0x41);
  }

  #[test]
  fn upper_bits_read_back_high() {
    let mut pad = Controller::new();
    pad.strobe(1);
    pad.strobe(0);
    assert_eq!(pad.read() & 0xC0, 0x40);
  }
}
