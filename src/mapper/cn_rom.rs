use serde::{Deserialize, Serialize};

use log::warn;

use crate::cartridge::Cartridge;
use crate::common::{Address, Byte};
use crate::mapper::NameTableMirroring;

/// Mapper 3 (CNROM). PRG is wired like mapper 0; writing anywhere in
/// PRG space selects one of four 8KB CHR-ROM banks.
#[derive(Serialize, Deserialize)]
pub struct CnRom {
  cart: Cartridge,
  #[serde(with = "serde_bytes")]
  character_ram: Option<Vec<Byte>>,
  one_bank: bool,
  select_chr: Byte,
}

impl CnRom {
  pub fn new(cart: Cartridge) -> Self {
    let ram = if cart.get_vrom().is_empty() {
      Some(vec![0; 0x2000])
    } else {
      None
    };
    Self {
      one_bank: cart.get_rom().len() == 0x4000,
      character_ram: ram,
      select_chr: 0,
      cart,
    }
  }

  pub fn cartridge(&self) -> &Cartridge {
    &self.cart
  }

  pub fn read_prg(&self, addr: Address) -> Byte {
    let offset = if self.one_bank {
      (addr & 0x3FFF) as usize
    } else {
      (addr & 0x7FFF) as usize
    };
    self.cart.get_rom()[offset]
  }

  pub fn write_prg(&mut self, _: Address, value: Byte) {
    self.select_chr = value & 0x3;
  }

  pub fn read_chr(&self, addr: Address) -> Byte {
    match &self.character_ram {
      Some(ram) => ram[(addr & 0x1FFF) as usize],
      None => {
        let vrom = self.cart.get_vrom();
        let offset = (self.select_chr as usize * 0x2000 + (addr & 0x1FFF) as usize) % vrom.len();
        vrom[offset]
      }
    }
  }

  pub fn write_chr(&mut self, addr: Address, value: Byte) {
    match &mut self.character_ram {
      Some(ram) => ram[(addr & 0x1FFF) as usize] = value,
      None => warn!("Attempting to write read-only CHR memory on {:#x}", addr),
    }
  }

  pub fn mirroring(&self) -> NameTableMirroring {
    NameTableMirroring::from(self.cart.get_name_table_mirroring())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn cnrom(vbanks: u8) -> CnRom {
    let mut data = vec![0u8; 0x10];
    data[0..4].copy_from_slice(b"NES\x1A");
    data[4] = 1;
    data[5] = vbanks;
    data[6] = 0x30; // mapper 3
    data.resize(0x10 + 0x4000 + vbanks as usize * 0x2000, 0);
    for bank in 0..vbanks as usize {
      data[0x10 + 0x4000 + bank * 0x2000] = 0xC0 + bank as u8;
    }
    CnRom::new(Cartridge::load(&data).unwrap())
  }

  #[test]
  fn chr_bank_select_uses_the_low_two_bits() {
    let mut rom = cnrom(4);
    assert_eq!(rom.read_chr(0x0000), 0xC0);
    rom.write_prg(0x8000, 0xFE);
    assert_eq!(rom.read_chr(0x0000), 0xC2);
  }

  #[test]
  fn select_wraps_on_small_chr() {
    let mut rom = cnrom(2);
    rom.write_prg(0x8000, 0x3);
    assert_eq!(rom.read_chr(0x0000), 0xC1);
  }

  #[test]
  fn zero_chr_banks_fall_back_to_ram() {
    let mut rom = cnrom(0);
    assert_eq!(rom.read_chr(0x0000), 0);
    rom.write_chr(0x1234, 0x5A);
    assert_eq!(rom.read_chr(0x1234), 0x5A);
    rom.write_prg(0x8000, 0x2);
    assert_eq!(rom.read_chr(0x1234), 0x5A);
  }
}
