use std::f32::consts::PI;

use serde::{Deserialize, Serialize};

pub trait Filter {
  fn step(&mut self, x: f32) -> f32;
}

/// First-order IIR section, `y = b0*x + b1*x' - a1*y'`.
#[derive(Serialize, Deserialize)]
pub struct FirstOrderFilter {
  b0: f32,
  b1: f32,
  a1: f32,

  prev_x: f32,
  prev_y: f32,
}

impl FirstOrderFilter {
  pub fn low_pass(sample_rate: f32, cut_off_freq: f32) -> Self {
    let c = sample_rate / PI / cut_off_freq;
    let a0i = 1.0 / (1.0 + c);

    Self {
      b0: a0i,
      b1: a0i,
      a1: (1. - c) * a0i,

      prev_x: 0.,
      prev_y: 0.,
    }
  }

  pub fn high_pass(sample_rate: f32, cut_off_freq: f32) -> Self {
    let c = sample_rate / PI / cut_off_freq;
    let a0i = 1.0 / (1.0 + c);

    Self {
      b0: c * a0i,
      b1: -c * a0i,
      a1: (1. - c) * a0i,

      prev_x: 0.,
      prev_y: 0.,
    }
  }
}

impl Filter for FirstOrderFilter {
  fn step(&mut self, x: f32) -> f32 {
    let y = self.b0 * x + self.b1 * self.prev_x - self.a1 * self.prev_y;
    self.prev_x = x;
    self.prev_y = y;
    y
  }
}

pub type FilterChain = Vec<FirstOrderFilter>;

impl Filter for FilterChain {
  fn step(&mut self, x: f32) -> f32 {
    let mut y = x;
    for filter in self.iter_mut() {
      y = filter.step(y);
    }
    y
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn high_pass_rejects_a_constant_signal() {
    let mut filter = FirstOrderFilter::high_pass(44_100., 90.);
    let mut y = 0.;
    for _ in 0..44_100 {
      y = filter.step(1.0);
    }
    assert!(y.abs() < 1e-3);
  }

  #[test]
  fn low_pass_passes_a_constant_signal() {
    let mut filter = FirstOrderFilter::low_pass(44_100., 14_000.);
    let mut y = 0.;
    for _ in 0..44_100 {
      y = filter.step(1.0);
    }
    assert!((y - 1.0).abs() < 1e-3);
  }

  #[test]
  fn chain_applies_sections_in_order() {
    let mut chain: FilterChain = vec![
      FirstOrderFilter::high_pass(44_100., 90.),
      FirstOrderFilter::high_pass(44_100., 440.),
      FirstOrderFilter::low_pass(44_100., 14_000.),
    ];
    // A step input decays towards zero through the high-pass sections.
    let first = chain.step(1.0);
    let mut last = first;
    for _ in 0..4_410 {
      last = chain.step(1.0);
    }
    assert!(last.abs() < first.abs());
  }
}
