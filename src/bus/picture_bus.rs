use log::info;
use serde::{Deserialize, Serialize};

use crate::common::{Address, Byte};
use crate::mapper::{Mapper, NameTableMirroring};

/// PPU-side address space: pattern tables on the cartridge, name tables
/// in local VRAM, and the palette indices.
///
/// VRAM is a flat 4KB vector; the four logical name tables are start
/// offsets into it, recomputed whenever the mapper reports a different
/// mirroring layout. Four-screen boards use all 4KB, everything else
/// lives in the first 2KB.
#[derive(Serialize, Deserialize)]
pub struct PictureBus {
  #[serde(with = "serde_bytes")]
  ram: Vec<Byte>,
  mirroring: NameTableMirroring,
  // Indices where each logical name table starts in the RAM vector.
  name_table0: usize,
  name_table1: usize,
  name_table2: usize,
  name_table3: usize,
  #[serde(with = "serde_bytes")]
  palette: Vec<Byte>,
}

// Entries 0x10/0x14/0x18/0x1C alias their background counterparts.
fn palette_index(addr: Address) -> usize {
  let index = (addr & 0x1F) as usize;
  match index {
    0x10 | 0x14 | 0x18 | 0x1C => index - 0x10,
    _ => index,
  }
}

impl PictureBus {
  pub fn new() -> Self {
    Self {
      ram: vec![0; 0x1000],
      mirroring: NameTableMirroring::Horizontal,
      name_table0: 0,
      name_table1: 0,
      name_table2: 0x400,
      name_table3: 0x400,
      palette: vec![0; 0x20],
    }
  }

  fn get_name_table(&self, addr: Address) -> usize {
    if addr < 0x2400 {
      self.name_table0
    } else if addr < 0x2800 {
      self.name_table1
    } else if addr < 0x2C00 {
      self.name_table2
    } else {
      self.name_table3
    }
  }

  pub fn read(&self, addr: Address, mapper: &Mapper) -> Byte {
    let addr = addr & 0x3FFF;
    if addr < 0x2000 {
      mapper.read_chr(addr)
    } else if addr < 0x3F00 {
      // 0x3000..=0x3EFF mirrors the name tables below it
      let addr = addr & 0x2FFF;
      self.ram[self.get_name_table(addr) + (addr & 0x3FF) as usize]
    } else {
      self.palette[palette_index(addr)]
    }
  }

  pub fn write(&mut self, addr: Address, value: Byte, mapper: &mut Mapper) {
    let addr = addr & 0x3FFF;
    if addr < 0x2000 {
      mapper.write_chr(addr, value);
    } else if addr < 0x3F00 {
      let addr = addr & 0x2FFF;
      let index = self.get_name_table(addr) + (addr & 0x3FF) as usize;
      self.ram[index] = value;
    } else {
      self.palette[palette_index(addr)] = value;
    }
  }

  /// Palette lookup for the renderer, bypassing the address decode.
  pub fn read_palette(&self, palette_addr: Byte) -> Byte {
    self.palette[palette_index(palette_addr as Address)]
  }

  pub fn update_mirroring(&mut self, mirroring: NameTableMirroring) {
    if self.mirroring == mirroring {
      return;
    }
    self.mirroring = mirroring;
    match mirroring {
      NameTableMirroring::Horizontal => {
        self.name_table0 = 0;
        self.name_table1 = 0;
        self.name_table2 = 0x400;
        self.name_table3 = 0x400;
        info!("Horizontal Name Table mirroring set. (Vertical Scrolling)");
      }
      NameTableMirroring::Vertical => {
        self.name_table0 = 0;
        self.name_table1 = 0x400;
        self.name_table2 = 0;
        self.name_table3 = 0x400;
        info!("Vertical Name Table mirroring set. (Horizontal Scrolling)");
      }
      NameTableMirroring::FourScreen => {
        self.name_table0 = 0;
        self.name_table1 = 0x400;
        self.name_table2 = 0x800;
        self.name_table3 = 0xC00;
        info!("Four-screen Name Table mirroring set.");
      }
      NameTableMirroring::OneScreenLower => {
        self.name_table0 = 0;
        self.name_table1 = 0;
        self.name_table2 = 0;
        self.name_table3 = 0;
        info!("Single Screen mirroring set with lower bank.");
      }
      NameTableMirroring::OneScreenHigher => {
        self.name_table0 = 0x400;
        self.name_table1 = 0x400;
        self.name_table2 = 0x400;
        self.name_table3 = 0x400;
        info!("Single Screen mirroring set with higher bank.");
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cartridge::Cartridge;

  // Mapper 0 with CHR-RAM so pattern table writes land somewhere.
  fn chr_ram_mapper() -> Mapper {
    let mut data = vec![0u8; 0x10 + 0x4000];
    data[0..4].copy_from_slice(b"NES\x1A");
    data[4] = 1;
    Mapper::new(Cartridge::load(&data).unwrap()).unwrap()
  }

  #[test]
  fn horizontal_mirroring_pairs_the_top_tables() {
    let mut bus = PictureBus::new();
    let mut mapper = chr_ram_mapper();
    bus.write(0x2005, 0x77, &mut mapper);
    assert_eq!(bus.read(0x2405, &mapper), 0x77);
    assert_eq!(bus.read(0x2805, &mapper), 0x00);
  }

  #[test]
  fn vertical_mirroring_pairs_across() {
    let mut bus = PictureBus::new();
    let mut mapper = chr_ram_mapper();
    bus.update_mirroring(NameTableMirroring::Vertical);
    bus.write(0x2005, 0x77, &mut mapper);
    assert_eq!(bus.read(0x2805, &mapper), 0x77);
    assert_eq!(bus.read(0x2405, &mapper), 0x00);
  }

  #[test]
  fn four_screen_keeps_all_tables_distinct() {
    let mut bus = PictureBus::new();
    let mut mapper = chr_ram_mapper();
    bus.update_mirroring(NameTableMirroring::FourScreen);
    for (i, base) in [0x2000u16, 0x2400, 0x2800, 0x2C00].iter().enumerate() {
      bus.write(*base, i as Byte + 1, &mut mapper);
    }
    for (i, base) in [0x2000u16, 0x2400, 0x2800, 0x2C00].iter().enumerate() {
      assert_eq!(bus.read(*base, &mapper), i as Byte + 1);
    }
  }

  #[test]
  fn the_top_page_mirrors_the_name_tables() {
    let mut bus = PictureBus::new();
    let mut mapper = chr_ram_mapper();
    bus.write(0x3123, 0x55, &mut mapper);
    assert_eq!(bus.read(0x2123, &mapper), 0x55);
  }

  #[test]
  fn sprite_backdrop_entries_alias_the_background() {
    let mut bus = PictureBus::new();
    let mut mapper = chr_ram_mapper();
    bus.write(0x3F10, 0x2A, &mut mapper);
    assert_eq!(bus.read(0x3F00, &mapper), 0x2A);
    assert_eq!(bus.read_palette(0x10), 0x2A);
    bus.write(0x3F04, 0x11, &mut mapper);
    assert_eq!(bus.read(0x3F04, &mapper), 0x11);
  }

  #[test]
  fn pattern_space_routes_to_the_mapper() {
    let mut bus = PictureBus::new();
    let mut mapper = chr_ram_mapper();
    bus.write(0x1234, 0x99, &mut mapper);
    assert_eq!(bus.read(0x1234, &mapper), 0x99);
  }
}
