use log::warn;
use serde::{Deserialize, Serialize};

use crate::cartridge::{Cartridge, CHR_BANK_SIZE, PRG_BANK_SIZE};
use crate::common::*;
use crate::mapper::NameTableMirroring;

/// Mapper 0. No registers at all; 16KB images mirror their single bank
/// into both halves of PRG space.
#[derive(Serialize, Deserialize)]
pub struct NRom {
  one_bank: bool,
  #[serde(with = "serde_bytes")]
  character_ram: Option<Vec<Byte>>,
  cart: Cartridge,
}

impl NRom {
  pub fn new(cart: Cartridge) -> Self {
    let ram = if cart.get_vrom().is_empty() {
      Some(vec![0; CHR_BANK_SIZE])
    } else {
      None
    };
    Self {
      one_bank: cart.get_rom().len() == PRG_BANK_SIZE,
      character_ram: ram,
      cart,
    }
  }

  pub fn cartridge(&self) -> &Cartridge {
    &self.cart
  }

  #[inline]
  pub fn read_prg(&self, addr: Address) -> Byte {
    if self.one_bank {
      self.cart.get_rom()[((addr - 0x8000) & 0x3FFF) as usize]
    } else {
      self.cart.get_rom()[(addr - 0x8000) as usize]
    }
  }

  #[inline]
  pub fn write_prg(&mut self, addr: Address, _: Byte) {
    warn!("ROM memory write attempt at {:#x}", addr);
  }

  #[inline]
  pub fn read_chr(&self, addr: Address) -> Byte {
    match &self.character_ram {
      Some(ram) => ram[addr as usize],
      None => self.cart.get_vrom()[addr as usize],
    }
  }

  #[inline]
  pub fn write_chr(&mut self, addr: Address, value: Byte) {
    match &mut self.character_ram {
      Some(ram) => ram[addr as usize] = value,
      None => warn!("Attempting to write read-only CHR memory on {:#x}", addr),
    }
  }

  #[inline]
  pub fn mirroring(&self) -> NameTableMirroring {
    NameTableMirroring::from(self.cart.get_name_table_mirroring())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn cart(banks: u8, vbanks: u8) -> Cartridge {
    let mut data = vec![0u8; 0x10];
    data[0..4].copy_from_slice(b"NES\x1A");
    data[4] = banks;
    data[5] = vbanks;
    data.resize(
      0x10 + banks as usize * PRG_BANK_SIZE + vbanks as usize * CHR_BANK_SIZE,
      0,
    );
    // Tag the first byte of each PRG bank with its index.
    for bank in 0..banks as usize {
      data[0x10 + bank * PRG_BANK_SIZE] = bank as u8 + 1;
    }
    Cartridge::load(&data).unwrap()
  }

  #[test]
  fn single_bank_mirrors_into_both_halves() {
    let rom = NRom::new(cart(1, 1));
    assert_eq!(rom.read_prg(0x8000), 1);
    assert_eq!(rom.read_prg(0xC000), 1);
  }

  #[test]
  fn two_banks_map_linearly() {
    let rom = NRom::new(cart(2, 1));
    assert_eq!(rom.read_prg(0x8000), 1);
    assert_eq!(rom.read_prg(0xC000), 2);
  }

  #[test]
  fn chr_ram_is_writable_when_no_vrom_present() {
    let mut rom = NRom::new(cart(1, 0));
    rom.write_chr(0x1234, 0xAB);
    assert_eq!(rom.read_chr(0x1234), 0xAB);
  }
}
