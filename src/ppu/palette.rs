use image::Rgba;

use crate::common::{bit_eq, Byte};

/// The 2C02 master palette, indexed by the 6-bit color values held in
/// palette RAM.
pub static COLORS: [Rgba<u8>; 64] = [
  Rgba([0x66, 0x66, 0x66, 0xFF]),
  Rgba([0x00, 0x2a, 0x88, 0xFF]),
  Rgba([0x14, 0x12, 0xa7, 0xFF]),
  Rgba([0x3b, 0x00, 0xa4, 0xFF]),
  Rgba([0x5c, 0x00, 0x7e, 0xFF]),
  Rgba([0x6e, 0x00, 0x40, 0xFF]),
  Rgba([0x6c, 0x06, 0x00, 0xFF]),
  Rgba([0x56, 0x1d, 0x00, 0xFF]),
  Rgba([0x33, 0x35, 0x00, 0xFF]),
  Rgba([0x0b, 0x48, 0x00, 0xFF]),
  Rgba([0x00, 0x52, 0x00, 0xFF]),
  Rgba([0x00, 0x4f, 0x08, 0xFF]),
  Rgba([0x00, 0x40, 0x4d, 0xFF]),
  Rgba([0x00, 0x00, 0x00, 0xFF]),
  Rgba([0x00, 0x00, 0x00, 0xFF]),
  Rgba([0x00, 0x00, 0x00, 0xFF]),
  Rgba([0xad, 0xad, 0xad, 0xFF]),
  Rgba([0x15, 0x5f, 0xd9, 0xFF]),
  Rgba([0x42, 0x40, 0xff, 0xFF]),
  Rgba([0x75, 0x27, 0xfe, 0xFF]),
  Rgba([0xa0, 0x1a, 0xcc, 0xFF]),
  Rgba([0xb7, 0x1e, 0x7b, 0xFF]),
  Rgba([0xb5, 0x31, 0x20, 0xFF]),
  Rgba([0x99, 0x4e, 0x00, 0xFF]),
  Rgba([0x6b, 0x6d, 0x00, 0xFF]),
  Rgba([0x38, 0x87, 0x00, 0xFF]),
  Rgba([0x0c, 0x93, 0x00, 0xFF]),
  Rgba([0x00, 0x8f, 0x32, 0xFF]),
  Rgba([0x00, 0x7c, 0x8d, 0xFF]),
  Rgba([0x00, 0x00, 0x00, 0xFF]),
  Rgba([0x00, 0x00, 0x00, 0xFF]),
  Rgba([0x00, 0x00, 0x00, 0xFF]),
  Rgba([0xff, 0xfe, 0xff, 0xFF]),
  Rgba([0x64, 0xb0, 0xff, 0xFF]),
  Rgba([0x92, 0x90, 0xff, 0xFF]),
  Rgba([0xc6, 0x76, 0xff, 0xFF]),
  Rgba([0xf3, 0x6a, 0xff, 0xFF]),
  Rgba([0xfe, 0x6e, 0xcc, 0xFF]),
  Rgba([0xfe, 0x81, 0x70, 0xFF]),
  Rgba([0xea, 0x9e, 0x22, 0xFF]),
  Rgba([0xbc, 0xbe, 0x00, 0xFF]),
  Rgba([0x88, 0xd8, 0x00, 0xFF]),
  Rgba([0x5c, 0xe4, 0x30, 0xFF]),
  Rgba([0x45, 0xe0, 0x82, 0xFF]),
  Rgba([0x48, 0xcd, 0xde, 0xFF]),
  Rgba([0x4f, 0x4f, 0x4f, 0xFF]),
  Rgba([0x00, 0x00, 0x00, 0xFF]),
  Rgba([0x00, 0x00, 0x00, 0xFF]),
  Rgba([0xff, 0xfe, 0xff, 0xFF]),
  Rgba([0xc0, 0xdf, 0xff, 0xFF]),
  Rgba([0xd3, 0xd2, 0xff, 0xFF]),
  Rgba([0xe8, 0xc8, 0xff, 0xFF]),
  Rgba([0xfb, 0xc2, 0xff, 0xFF]),
  Rgba([0xfe, 0xc4, 0xea, 0xFF]),
  Rgba([0xfe, 0xcc, 0xc5, 0xFF]),
  Rgba([0xf7, 0xd8, 0xa5, 0xFF]),
  Rgba([0xe4, 0xe5, 0x94, 0xFF]),
  Rgba([0xcf, 0xef, 0x96, 0xFF]),
  Rgba([0xbd, 0xf4, 0xab, 0xFF]),
  Rgba([0xb3, 0xf3, 0xcc, 0xFF]),
  Rgba([0xb5, 0xeb, 0xf2, 0xFF]),
  Rgba([0xb8, 0xb8, 0xb8, 0xFF]),
  Rgba([0x00, 0x00, 0x00, 0xFF]),
  Rgba([0x00, 0x00, 0x00, 0xFF]),
];

/// Color emphasis from PPUMASK bits 5-7. Each bit dims the two channels
/// it does not name by a quarter.
pub fn apply_emphasis(color: Rgba<u8>, emphasis: Byte) -> Rgba<u8> {
  let dim = |c: u8| (c as u16 * 3 / 4) as u8;
  let [mut r, mut g, mut b, a] = color.0;
  if bit_eq(emphasis, 0x20) {
    g = dim(g);
    b = dim(b);
  }
  if bit_eq(emphasis, 0x40) {
    r = dim(r);
    b = dim(b);
  }
  if bit_eq(emphasis, 0x80) {
    r = dim(r);
    g = dim(g);
  }
  Rgba([r, g, b, a])
}
