use log::info;
use num_enum::{FromPrimitive, IntoPrimitive};
use serde::{Deserialize, Serialize};

use crate::cartridge::{Cartridge, LoadError};
use crate::common::{Address, Byte};

pub mod cn_rom;
pub mod n_rom;
pub mod sx_rom;
pub mod tx_rom;
pub mod ux_rom;

pub use self::cn_rom::CnRom;
pub use self::n_rom::NRom;
pub use self::sx_rom::SxRom;
pub use self::tx_rom::TxRom;
pub use self::ux_rom::UxRom;

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, IntoPrimitive, FromPrimitive,
)]
#[repr(u8)]
pub enum NameTableMirroring {
  #[num_enum(default)]
  Horizontal = 0,
  Vertical = 1,
  FourScreen = 8,
  OneScreenLower = 9,
  OneScreenHigher = 10,
}

/// The supported boards as a closed set. Bank state lives inside the
/// variant and every access goes through a plain match, so the busses never
/// pay for a virtual call and snapshots capture the whole mapper by value.
#[derive(Serialize, Deserialize)]
pub enum Mapper {
  NRom(NRom),
  SxRom(SxRom),
  UxRom(UxRom),
  CnRom(CnRom),
  TxRom(TxRom),
}

impl Mapper {
  /// Builds the board for the cartridge, failing fast on ids outside the
  /// supported set.
  pub fn new(cart: Cartridge) -> Result<Self, LoadError> {
    let id = cart.get_mapper();
    info!("Creating mapper {}", id);
    match id {
      0 => Ok(Mapper::NRom(NRom::new(cart))),
      1 => Ok(Mapper::SxRom(SxRom::new(cart))),
      2 => Ok(Mapper::UxRom(UxRom::new(cart))),
      3 => Ok(Mapper::CnRom(CnRom::new(cart))),
      4 => Ok(Mapper::TxRom(TxRom::new(cart))),
      id => Err(LoadError::UnsupportedMapper(id)),
    }
  }

  pub fn mapper_id(&self) -> Byte {
    match self {
      Mapper::NRom(_) => 0,
      Mapper::SxRom(_) => 1,
      Mapper::UxRom(_) => 2,
      Mapper::CnRom(_) => 3,
      Mapper::TxRom(_) => 4,
    }
  }

  pub fn cartridge(&self) -> &Cartridge {
    match self {
      Mapper::NRom(m) => m.cartridge(),
      Mapper::SxRom(m) => m.cartridge(),
      Mapper::UxRom(m) => m.cartridge(),
      Mapper::CnRom(m) => m.cartridge(),
      Mapper::TxRom(m) => m.cartridge(),
    }
  }

  /// PRG space read, `addr` in 0x8000..=0xFFFF.
  pub fn read_prg(&self, addr: Address) -> Byte {
    match self {
      Mapper::NRom(m) => m.read_prg(addr),
      Mapper::SxRom(m) => m.read_prg(addr),
      Mapper::UxRom(m) => m.read_prg(addr),
      Mapper::CnRom(m) => m.read_prg(addr),
      Mapper::TxRom(m) => m.read_prg(addr),
    }
  }

  /// PRG space write, `addr` in 0x8000..=0xFFFF. Boards treat these as
  /// register writes.
  pub fn write_prg(&mut self, addr: Address, value: Byte) {
    match self {
      Mapper::NRom(m) => m.write_prg(addr, value),
      Mapper::SxRom(m) => m.write_prg(addr, value),
      Mapper::UxRom(m) => m.write_prg(addr, value),
      Mapper::CnRom(m) => m.write_prg(addr, value),
      Mapper::TxRom(m) => m.write_prg(addr, value),
    }
  }

  /// Pattern table read, `addr` below 0x2000.
  pub fn read_chr(&self, addr: Address) -> Byte {
    match self {
      Mapper::NRom(m) => m.read_chr(addr),
      Mapper::SxRom(m) => m.read_chr(addr),
      Mapper::UxRom(m) => m.read_chr(addr),
      Mapper::CnRom(m) => m.read_chr(addr),
      Mapper::TxRom(m) => m.read_chr(addr),
    }
  }

  pub fn write_chr(&mut self, addr: Address, value: Byte) {
    match self {
      Mapper::NRom(m) => m.write_chr(addr, value),
      Mapper::SxRom(m) => m.write_chr(addr, value),
      Mapper::UxRom(m) => m.write_chr(addr, value),
      Mapper::CnRom(m) => m.write_chr(addr, value),
      Mapper::TxRom(m) => m.write_chr(addr, value),
    }
  }

  pub fn mirroring(&self) -> NameTableMirroring {
    match self {
      Mapper::NRom(m) => m.mirroring(),
      Mapper::SxRom(m) => m.mirroring(),
      Mapper::UxRom(m) => m.mirroring(),
      Mapper::CnRom(m) => m.mirroring(),
      Mapper::TxRom(m) => m.mirroring(),
    }
  }

  pub fn has_extended_ram(&self) -> bool {
    match self {
      // Boards that commonly carry work RAM always expose it; the rest
      // only when the header flags a battery.
      Mapper::SxRom(_) | Mapper::TxRom(_) => true,
      _ => self.cartridge().has_battery(),
    }
  }

  /// Rendered-scanline notification, a stand-in for the PPU A12 rise the
  /// MMC3 counts. Other boards ignore it.
  pub fn notify_scanline(&mut self) {
    if let Mapper::TxRom(m) = self {
      m.notify_scanline();
    }
  }

  /// Level state of the board IRQ line.
  pub fn irq_pending(&self) -> bool {
    match self {
      Mapper::TxRom(m) => m.irq_pending(),
      _ => false,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn cart_with_mapper(id: u8) -> Cartridge {
    let mut data = vec![0u8; 0x10 + 2 * 0x4000 + 0x2000];
    data[0..4].copy_from_slice(b"NES\x1A");
    data[4] = 2;
    data[5] = 1;
    data[6] = (id & 0xF) << 4;
    data[7] = id & 0xF0;
    Cartridge::load(&data).unwrap()
  }

  #[test]
  fn unsupported_mapper_fails_fast() {
    let result = Mapper::new(cart_with_mapper(7));
    assert!(matches!(result, Err(LoadError::UnsupportedMapper(7))));
  }

  #[test]
  fn supported_set_resolves_by_id() {
    for id in 0..=4u8 {
      let mapper = Mapper::new(cart_with_mapper(id)).unwrap();
      assert_eq!(mapper.mapper_id(), id);
    }
  }

  #[test]
  fn mirroring_falls_back_to_horizontal_on_unknown_values() {
    assert_eq!(NameTableMirroring::from(0u8), NameTableMirroring::Horizontal);
    assert_eq!(NameTableMirroring::from(1u8), NameTableMirroring::Vertical);
    assert_eq!(NameTableMirroring::from(8u8), NameTableMirroring::FourScreen);
    assert_eq!(NameTableMirroring::from(3u8), NameTableMirroring::Horizontal);
  }
}
