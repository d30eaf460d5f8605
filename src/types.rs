pub type Byte = u8;
pub type Address = u16;

/// True when every bit set in `b` is also set in `a`.
#[inline]
pub fn bit_eq<T: std::ops::BitAnd<Output = T> + PartialEq + Copy>(a: T, b: T) -> bool {
  (a & b) == b
}

#[cfg(test)]
mod test {
  use super::bit_eq;

  #[test]
  fn bit_eq_single_and_multi_bit() {
    assert!(bit_eq(0b1010_0001u8, 0b1000_0000));
    assert!(bit_eq(0b1010_0001u8, 0b0010_0001));
    assert!(!bit_eq(0b1010_0001u8, 0b0100_0000));
    assert!(!bit_eq(0b1010_0001u8, 0b1100_0000));
  }

  #[test]
  fn byte_arithmetic_wraps() {
    assert!(bit_eq(0u8.overflowing_sub(1).0, 1 << 7));
    assert!(0u8.overflowing_sub(1).1);
    let left: u8 = 1 << 7;
    let right: u8 = 1 << 7;
    assert!(bit_eq(0x100u16, (left as u16) + (right as u16)));
  }

  #[test]
  fn relative_offset_is_signed() {
    let offset = i8::from_be_bytes([0xfb]);
    let pc = 32783 as i32;
    assert_eq!((offset as i32).wrapping_add(pc), 32778);
  }
}
