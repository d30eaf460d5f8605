use image::{GenericImage, RgbaImage};
use serde::{Deserialize, Serialize};

pub mod palette;

use crate::bus::picture_bus::PictureBus;
use crate::common::serializer::{rgba_deser, rgba_ser};
use crate::common::{bit_eq, Address, Byte};
use crate::mapper::{Mapper, NameTableMirroring};

#[derive(Copy, Clone, PartialEq, Serialize, Deserialize)]
enum CharacterPage {
  Low,
  High,
}

impl CharacterPage {
  fn base(self) -> Address {
    match self {
      CharacterPage::Low => 0x0000,
      CharacterPage::High => 0x1000,
    }
  }
}

pub const SCANLINE_VISIBLE_DOTS: u32 = 256;
pub const VISIBLE_SCANLINES: u32 = 240;
const SCANLINE_END_CYCLE: u32 = 340;
const VBLANK_SCANLINE: u32 = 241;
const FRAME_END_SCANLINE: u32 = 261;

/// Pixel processing unit. One `step` per dot, 341 dots per scanline and
/// 262 scanlines per frame, scanline 261 being the pre-render line.
///
/// The background runs the stock two-tile fetch pipeline: name table,
/// attribute and the two pattern planes on dots 1/3/5/7 of each 8-dot
/// group, shifted out through 16-bit registers sampled at `fine_x`.
/// Sprites for a scanline are latched from OAM before its first dot;
/// the overflow flag is produced separately by the incremental scan that
/// reproduces the diagonal OAM-read bug of the 2C02.
#[derive(Serialize, Deserialize)]
pub struct Ppu {
  bus: PictureBus,
  #[serde(with = "serde_bytes")]
  sprite_memory: Vec<Byte>,

  cycle: u32,
  scanline: u32,
  even_frame: bool,
  frame_count: u64,

  vblank: bool,
  suppress_vblank: bool,
  sprite_zero_hit: bool,
  sprite_overflow: bool,

  // Loopy registers
  data_address: Address,
  temp_address: Address,
  fine_x_scroll: Byte,
  first_write: bool,
  data_buffer: Byte,

  sprite_data_address: usize,

  // PPUCTRL
  long_sprites: bool,
  generate_interrupt: bool,
  background_page: CharacterPage,
  sprite_page: CharacterPage,
  data_address_increment: Address,

  // PPUMASK
  greyscale_mode: bool,
  show_sprites: bool,
  show_background: bool,
  hide_edge_sprites: bool,
  hide_edge_background: bool,
  emphasis: Byte,

  // NMI output: level follows vblank AND enable, the edge stays latched
  // until the CPU polls it.
  nmi_line: bool,
  nmi_edge: bool,

  // Background fetch pipeline
  next_tile_id: Byte,
  next_tile_attribute: Byte,
  next_tile_low: Byte,
  next_tile_high: Byte,
  bg_shift_low: u16,
  bg_shift_high: u16,
  attribute_shift_low: u16,
  attribute_shift_high: u16,

  // Sprites latched for the scanline in flight
  sprite_count: usize,
  sprite_shift_low: [Byte; 8],
  sprite_shift_high: [Byte; 8],
  sprite_attributes: [Byte; 8],
  sprite_counters: [Byte; 8],
  sprite_indices: [Byte; 8],

  // Overflow-flag scan state
  overflow_n: usize,
  overflow_m: usize,
  overflow_found: usize,
  overflow_active: bool,
  overflow_bug_mode: bool,

  #[serde(serialize_with = "rgba_ser", deserialize_with = "rgba_deser")]
  image: RgbaImage,
}

impl Ppu {
  pub fn new() -> Self {
    Self {
      bus: PictureBus::new(),
      sprite_memory: vec![0; 64 * 4],

      cycle: 0,
      scanline: FRAME_END_SCANLINE,
      even_frame: true,
      frame_count: 0,

      vblank: false,
      suppress_vblank: false,
      sprite_zero_hit: false,
      sprite_overflow: false,

      data_address: 0,
      temp_address: 0,
      fine_x_scroll: 0,
      first_write: true,
      data_buffer: 0,

      sprite_data_address: 0,

      long_sprites: false,
      generate_interrupt: false,
      background_page: CharacterPage::Low,
      sprite_page: CharacterPage::Low,
      data_address_increment: 1,

      greyscale_mode: false,
      show_sprites: false,
      show_background: false,
      hide_edge_sprites: false,
      hide_edge_background: false,
      emphasis: 0,

      nmi_line: false,
      nmi_edge: false,

      next_tile_id: 0,
      next_tile_attribute: 0,
      next_tile_low: 0,
      next_tile_high: 0,
      bg_shift_low: 0,
      bg_shift_high: 0,
      attribute_shift_low: 0,
      attribute_shift_high: 0,

      sprite_count: 0,
      sprite_shift_low: [0; 8],
      sprite_shift_high: [0; 8],
      sprite_attributes: [0; 8],
      sprite_counters: [0; 8],
      sprite_indices: [0; 8],

      overflow_n: 0,
      overflow_m: 0,
      overflow_found: 0,
      overflow_active: false,
      overflow_bug_mode: false,

      image: RgbaImage::new(SCANLINE_VISIBLE_DOTS, VISIBLE_SCANLINES),
    }
  }

  pub fn reset(&mut self) {
    *self = Self::new();
  }

  pub fn frame(&self) -> &RgbaImage {
    &self.image
  }

  /// Bumped at every VBlank start; the frame buffer is complete when
  /// this changes.
  pub fn frame_count(&self) -> u64 {
    self.frame_count
  }

  pub fn scanline(&self) -> u32 {
    self.scanline
  }

  /// Raw VBlank flag, without the read side effects of PPUSTATUS.
  pub fn in_vblank(&self) -> bool {
    self.vblank
  }

  pub fn dot(&self) -> u32 {
    self.cycle
  }

  /// Consumes the latched NMI edge.
  pub fn poll_nmi(&mut self) -> bool {
    let edge = self.nmi_edge;
    self.nmi_edge = false;
    edge
  }

  pub fn update_mirroring(&mut self, mirroring: NameTableMirroring) {
    self.bus.update_mirroring(mirroring);
  }

  fn rendering_enabled(&self) -> bool {
    self.show_background || self.show_sprites
  }

  fn update_nmi_line(&mut self) {
    let line = self.generate_interrupt && self.vblank;
    if line && !self.nmi_line {
      self.nmi_edge = true;
    }
    self.nmi_line = line;
  }

  pub fn step(&mut self, mapper: &mut Mapper) {
    let visible_line = self.scanline < VISIBLE_SCANLINES;
    let pre_render = self.scanline == FRAME_END_SCANLINE;
    let render_line = visible_line || pre_render;
    let rendering = self.rendering_enabled();

    if pre_render && self.cycle == 1 {
      self.vblank = false;
      self.sprite_zero_hit = false;
      self.sprite_overflow = false;
      self.suppress_vblank = false;
      self.update_nmi_line();
    }

    if self.scanline == VBLANK_SCANLINE && self.cycle == 1 {
      if !self.suppress_vblank {
        self.vblank = true;
      }
      self.suppress_vblank = false;
      self.frame_count += 1;
      self.update_nmi_line();
    }

    if visible_line {
      if self.cycle == 0 {
        if rendering {
          self.latch_scanline_sprites(mapper);
        } else {
          self.sprite_count = 0;
        }
      }
      if self.cycle == 65 {
        self.begin_overflow_scan(rendering);
      }
      if (65..=256).contains(&self.cycle) {
        self.clock_overflow_scan(rendering);
      }
    }

    if render_line && rendering {
      // Background fetch cadence, including the prefetch of the next
      // line's first two tiles at 321..=337.
      if (2..=257).contains(&self.cycle) || (321..=337).contains(&self.cycle) {
        self.bg_shift_low <<= 1;
        self.bg_shift_high <<= 1;
        self.attribute_shift_low <<= 1;
        self.attribute_shift_high <<= 1;

        match (self.cycle - 1) & 0x7 {
          0 => {
            self.reload_background_shifters();
            self.next_tile_id = self.bus.read(0x2000 | (self.data_address & 0x0FFF), mapper);
          }
          2 => {
            let addr = 0x23C0
              | (self.data_address & 0x0C00)
              | ((self.data_address >> 4) & 0x38)
              | ((self.data_address >> 2) & 0x07);
            let attribute = self.bus.read(addr, mapper);
            let shift = ((self.data_address >> 4) & 0x4) | (self.data_address & 0x2);
            self.next_tile_attribute = (attribute >> shift) & 0x3;
          }
          4 => {
            let addr = self.background_page.base()
              + self.next_tile_id as Address * 16
              + ((self.data_address >> 12) & 0x7);
            self.next_tile_low = self.bus.read(addr, mapper);
          }
          6 => {
            let addr = self.background_page.base()
              + self.next_tile_id as Address * 16
              + ((self.data_address >> 12) & 0x7)
              + 8;
            self.next_tile_high = self.bus.read(addr, mapper);
          }
          7 => self.increment_coarse_x(),
          _ => {}
        }
      }

      if self.cycle == SCANLINE_VISIBLE_DOTS {
        self.increment_y();
      }
      if self.cycle == SCANLINE_VISIBLE_DOTS + 1 {
        self.copy_horizontal_bits();
      }
      if pre_render && (280..=304).contains(&self.cycle) {
        self.copy_vertical_bits();
      }
      // Dummy name table fetches closing out the line
      if self.cycle == 338 || self.cycle == 340 {
        self.next_tile_id = self.bus.read(0x2000 | (self.data_address & 0x0FFF), mapper);
      }
      // Stand-in for the A12 rise the sprite fetches would cause
      if self.cycle == 260 {
        mapper.notify_scanline();
      }
    }

    if visible_line && (1..=SCANLINE_VISIBLE_DOTS).contains(&self.cycle) {
      self.render_pixel();
      if rendering {
        self.shift_sprites();
      }
    }

    // Odd frames drop the last pre-render dot while the background is on
    if pre_render && self.cycle == SCANLINE_END_CYCLE - 1 && !self.even_frame && self.show_background
    {
      self.cycle = 0;
      self.scanline = 0;
      self.even_frame = !self.even_frame;
      return;
    }

    self.cycle += 1;
    if self.cycle > SCANLINE_END_CYCLE {
      self.cycle = 0;
      self.scanline += 1;
      if self.scanline > FRAME_END_SCANLINE {
        self.scanline = 0;
        self.even_frame = !self.even_frame;
      }
    }
  }

  fn render_pixel(&mut self) {
    let x = (self.cycle - 1) as usize;
    let y = self.scanline;

    let (bg_pixel, bg_palette) = self.background_pixel(x);
    let (spr_pixel, spr_palette, behind, is_sprite_zero) = self.sprite_pixel(x);

    let bg_opaque = bg_pixel != 0;
    let spr_opaque = spr_pixel != 0;

    if is_sprite_zero && bg_opaque && x < 255 {
      self.sprite_zero_hit = true;
    }

    let palette_addr = if spr_opaque && (!bg_opaque || !behind) {
      0x10 | (spr_palette << 2) | spr_pixel
    } else if bg_opaque {
      (bg_palette << 2) | bg_pixel
    } else {
      0
    };

    let mut color_index = self.bus.read_palette(palette_addr) & 0x3F;
    if self.greyscale_mode {
      color_index &= 0x30;
    }
    let mut color = palette::COLORS[color_index as usize];
    if self.emphasis != 0 {
      color = palette::apply_emphasis(color, self.emphasis);
    }
    // x < 256 and y < 240 by the caller's range checks
    unsafe { self.image.unsafe_put_pixel(x as u32, y, color) }
  }

  fn background_pixel(&self, x: usize) -> (Byte, Byte) {
    if !self.show_background || (x < 8 && self.hide_edge_background) {
      return (0, 0);
    }
    let bit = 0x8000u16 >> self.fine_x_scroll;
    let p0 = ((self.bg_shift_low & bit) != 0) as Byte;
    let p1 = ((self.bg_shift_high & bit) != 0) as Byte;
    let a0 = ((self.attribute_shift_low & bit) != 0) as Byte;
    let a1 = ((self.attribute_shift_high & bit) != 0) as Byte;
    ((p1 << 1) | p0, (a1 << 1) | a0)
  }

  /// First opaque sprite pixel wins; returns (pixel, palette, behind
  /// background, came from OAM slot 0).
  fn sprite_pixel(&self, x: usize) -> (Byte, Byte, bool, bool) {
    if !self.show_sprites || (x < 8 && self.hide_edge_sprites) {
      return (0, 0, false, false);
    }
    for i in 0..self.sprite_count {
      if self.sprite_counters[i] != 0 {
        continue;
      }
      let p0 = (self.sprite_shift_low[i] >> 7) & 1;
      let p1 = (self.sprite_shift_high[i] >> 7) & 1;
      let pixel = (p1 << 1) | p0;
      if pixel == 0 {
        continue;
      }
      let attribute = self.sprite_attributes[i];
      return (
        pixel,
        attribute & 0x3,
        bit_eq(attribute, 0x20),
        self.sprite_indices[i] == 0,
      );
    }
    (0, 0, false, false)
  }

  fn shift_sprites(&mut self) {
    for i in 0..self.sprite_count {
      if self.sprite_counters[i] > 0 {
        self.sprite_counters[i] -= 1;
      } else {
        self.sprite_shift_low[i] <<= 1;
        self.sprite_shift_high[i] <<= 1;
      }
    }
  }

  fn reload_background_shifters(&mut self) {
    self.bg_shift_low = (self.bg_shift_low & 0xFF00) | self.next_tile_low as u16;
    self.bg_shift_high = (self.bg_shift_high & 0xFF00) | self.next_tile_high as u16;
    let attr_low = if bit_eq(self.next_tile_attribute, 0x1) {
      0xFF
    } else {
      0x00
    };
    let attr_high = if bit_eq(self.next_tile_attribute, 0x2) {
      0xFF
    } else {
      0x00
    };
    self.attribute_shift_low = (self.attribute_shift_low & 0xFF00) | attr_low;
    self.attribute_shift_high = (self.attribute_shift_high & 0xFF00) | attr_high;
  }

  fn increment_coarse_x(&mut self) {
    if self.data_address & 0x1F == 31 {
      // coarse X wraps into the horizontally adjacent name table
      self.data_address &= !0x1F;
      self.data_address ^= 0x0400;
    } else {
      self.data_address += 1;
    }
  }

  fn increment_y(&mut self) {
    if self.data_address & 0x7000 != 0x7000 {
      self.data_address += 0x1000;
    } else {
      self.data_address &= !0x7000;
      let mut y = (self.data_address & 0x03E0) >> 5;
      if y == 29 {
        y = 0;
        self.data_address ^= 0x0800;
      } else if y == 31 {
        // rows 30/31 hold attribute data; wrap without switching tables
        y = 0;
      } else {
        y += 1;
      }
      self.data_address = (self.data_address & !0x03E0) | (y << 5);
    }
  }

  fn copy_horizontal_bits(&mut self) {
    self.data_address = (self.data_address & !0x041F) | (self.temp_address & 0x041F);
  }

  fn copy_vertical_bits(&mut self) {
    self.data_address = (self.data_address & !0x7BE0) | (self.temp_address & 0x7BE0);
  }

  fn sprite_height(&self) -> u32 {
    if self.long_sprites {
      16
    } else {
      8
    }
  }

  /// Fills the per-scanline sprite latches from OAM. The pattern reads
  /// happen through the picture bus like any other fetch.
  fn latch_scanline_sprites(&mut self, mapper: &mut Mapper) {
    self.sprite_count = 0;
    let height = self.sprite_height();

    for i in 0..64 {
      let base = i * 4;
      // OAM stores y - 1
      let top = self.sprite_memory[base] as u32 + 1;
      if self.scanline < top || self.scanline >= top + height {
        continue;
      }
      if self.sprite_count >= 8 {
        break;
      }

      let tile = self.sprite_memory[base + 1];
      let attribute = self.sprite_memory[base + 2];
      let x = self.sprite_memory[base + 3];

      let mut row = self.scanline - top;
      if bit_eq(attribute, 0x80) {
        row = height - 1 - row;
      }

      let addr = if self.long_sprites {
        // bit 0 selects the pattern table, the rest the even tile pair
        let table = ((tile & 0x1) as Address) << 12;
        let tile = (tile & 0xFE) as Address + (row / 8) as Address;
        table + tile * 16 + (row & 0x7) as Address
      } else {
        self.sprite_page.base() + tile as Address * 16 + row as Address
      };

      let mut low = self.bus.read(addr, mapper);
      let mut high = self.bus.read(addr + 8, mapper);
      if bit_eq(attribute, 0x40) {
        low = low.reverse_bits();
        high = high.reverse_bits();
      }

      let slot = self.sprite_count;
      self.sprite_shift_low[slot] = low;
      self.sprite_shift_high[slot] = high;
      self.sprite_attributes[slot] = attribute;
      self.sprite_counters[slot] = x;
      self.sprite_indices[slot] = i as Byte;
      self.sprite_count += 1;
    }

    for slot in self.sprite_count..8 {
      self.sprite_shift_low[slot] = 0;
      self.sprite_shift_high[slot] = 0;
      self.sprite_attributes[slot] = 0;
      self.sprite_counters[slot] = 0xFF;
      self.sprite_indices[slot] = 0xFF;
    }
  }

  fn begin_overflow_scan(&mut self, rendering: bool) {
    self.overflow_n = 0;
    self.overflow_m = 0;
    self.overflow_found = 0;
    self.overflow_bug_mode = false;
    self.overflow_active = rendering;
  }

  /// One evaluation step every other dot of 65..=256. Once eight sprites
  /// are in range the scan goes diagonal: `m` keeps advancing with `n`,
  /// so tile, attribute and x bytes get tested as y coordinates. That is
  /// the hardware bug behind the unreliable overflow flag.
  fn clock_overflow_scan(&mut self, rendering: bool) {
    if !self.overflow_active || !rendering {
      self.overflow_active = false;
      return;
    }
    if (self.cycle - 65) & 1 != 0 {
      return;
    }
    if self.overflow_n >= 64 {
      self.overflow_active = false;
      return;
    }

    let target = self.scanline + 1;
    let byte = self.sprite_memory[self.overflow_n * 4 + self.overflow_m];
    let top = byte as u32 + 1;
    let in_range = target >= top && target < top + self.sprite_height();

    if !self.overflow_bug_mode {
      if in_range {
        if self.overflow_found < 8 {
          self.overflow_found += 1;
          self.overflow_n += 1;
        } else {
          self.sprite_overflow = true;
          self.overflow_active = false;
        }
        return;
      }
      if self.overflow_found < 8 {
        self.overflow_n += 1;
      } else {
        self.overflow_bug_mode = true;
        self.overflow_m = 1;
        self.overflow_n += 1;
      }
    } else {
      if in_range {
        self.sprite_overflow = true;
        self.overflow_active = false;
        return;
      }
      self.overflow_n += 1;
      self.overflow_m = (self.overflow_m + 1) & 0x3;
    }
    if self.overflow_n >= 64 {
      self.overflow_active = false;
    }
  }

  // Register access, wired up by the main bus.

  /// 0x2002 PPUSTATUS. Reading clears VBlank and the write toggle; a read
  /// racing VBlank start keeps both the flag and the NMI from firing.
  pub fn get_status(&mut self) -> Byte {
    let status = ((self.vblank as Byte) << 7)
      | ((self.sprite_zero_hit as Byte) << 6)
      | ((self.sprite_overflow as Byte) << 5);
    self.vblank = false;
    self.first_write = true;
    if self.scanline == VBLANK_SCANLINE && self.cycle <= 1 {
      self.suppress_vblank = true;
      self.nmi_edge = false;
    }
    self.update_nmi_line();
    status
  }

  /// 0x2007 PPUDATA (read). Buffered below the palette range; palette
  /// reads return directly while the buffer grabs the name table byte
  /// underneath.
  pub fn get_data(&mut self, mapper: &mut Mapper) -> Byte {
    let addr = self.data_address & 0x3FFF;
    let mut data = self.bus.read(addr, mapper);
    if addr >= 0x3F00 {
      self.data_buffer = self.bus.read(addr - 0x1000, mapper);
    } else {
      std::mem::swap(&mut self.data_buffer, &mut data);
    }
    self.increment_data_address();
    data
  }

  /// 0x2004 OAMDATA (read)
  pub fn get_oam_data(&self) -> Byte {
    self.sprite_memory[self.sprite_data_address]
  }

  /// 0x2000 PPUCTRL
  pub fn control(&mut self, ctrl: Byte) {
    self.generate_interrupt = bit_eq(ctrl, 0x80);
    self.long_sprites = bit_eq(ctrl, 0x20);
    self.background_page = if bit_eq(ctrl, 0x10) {
      CharacterPage::High
    } else {
      CharacterPage::Low
    };
    self.sprite_page = if bit_eq(ctrl, 0x8) {
      CharacterPage::High
    } else {
      CharacterPage::Low
    };
    self.data_address_increment = if bit_eq(ctrl, 0x4) { 0x20 } else { 1 };
    // The name table selection lands in the temp address and reaches the
    // live address through the rendering copies.
    self.temp_address = (self.temp_address & !0xC00) | ((ctrl as Address & 0x3) << 10);
    // Turning NMI on while VBlank is already set fires the edge at once.
    self.update_nmi_line();
  }

  /// 0x2001 PPUMASK
  pub fn set_mask(&mut self, mask: Byte) {
    self.greyscale_mode = bit_eq(mask, 0x1);
    self.hide_edge_background = !bit_eq(mask, 0x2);
    self.hide_edge_sprites = !bit_eq(mask, 0x4);
    self.show_background = bit_eq(mask, 0x8);
    self.show_sprites = bit_eq(mask, 0x10);
    self.emphasis = mask & 0xE0;
  }

  /// 0x2003 OAMADDR
  pub fn set_oam_address(&mut self, addr: Byte) {
    self.sprite_data_address = addr as usize;
  }

  /// 0x2004 OAMDATA (write)
  pub fn set_oam_data(&mut self, value: Byte) {
    self.sprite_memory[self.sprite_data_address] = value;
    self.sprite_data_address = (self.sprite_data_address + 1) & 0xFF;
  }

  /// 0x2005 PPUSCROLL, two writes through the shared toggle
  pub fn set_scroll(&mut self, scroll: Byte) {
    let scroll = scroll as Address;
    if self.first_write {
      self.temp_address = (self.temp_address & !0x001F) | ((scroll >> 3) & 0x1F);
      self.fine_x_scroll = scroll as Byte & 0x7;
    } else {
      self.temp_address = (self.temp_address & !0x73E0) | ((scroll & 0x7) << 12) | ((scroll & 0xF8) << 2);
    }
    self.first_write = !self.first_write;
  }

  /// 0x2006 PPUADDR, two writes; the second copies temp into the live
  /// address
  pub fn set_data_address(&mut self, value: Byte) {
    let value = value as Address;
    if self.first_write {
      self.temp_address = (self.temp_address & 0x00FF) | ((value & 0x3F) << 8);
    } else {
      self.temp_address = (self.temp_address & 0xFF00) | value;
      self.data_address = self.temp_address;
    }
    self.first_write = !self.first_write;
  }

  /// 0x2007 PPUDATA (write)
  pub fn set_data(&mut self, value: Byte, mapper: &mut Mapper) {
    self.bus.write(self.data_address & 0x3FFF, value, mapper);
    self.increment_data_address();
  }

  fn increment_data_address(&mut self) {
    // While rendering, a 0x2007 access clocks the scroll counters
    // instead of stepping linearly.
    if self.rendering_enabled()
      && (self.scanline < VISIBLE_SCANLINES || self.scanline == FRAME_END_SCANLINE)
    {
      self.increment_coarse_x();
      self.increment_y();
    } else {
      self.data_address = self.data_address.wrapping_add(self.data_address_increment);
    }
  }

  /// 0x4014 OAMDMA: a full page copied in through OAMDATA semantics,
  /// starting at the current OAM address and wrapping.
  pub fn do_dma(&mut self, page: &[Byte; 256]) {
    for (i, value) in page.iter().enumerate() {
      self.sprite_memory[(self.sprite_data_address + i) & 0xFF] = *value;
    }
  }
}
