use serde::{Deserialize, Serialize};

use log::warn;

use crate::cartridge::Cartridge;
use crate::common::{Address, Byte};
use crate::mapper::NameTableMirroring;

/// Mapper 2 (UxROM). One switchable 16KB PRG bank at 0x8000, the last
/// bank fixed at 0xC000, CHR is a single unbanked 8KB space.
#[derive(Serialize, Deserialize)]
pub struct UxRom {
  cart: Cartridge,
  #[serde(with = "serde_bytes")]
  character_ram: Option<Vec<Byte>>,
  select_prg: Byte,
}

impl UxRom {
  pub fn new(cart: Cartridge) -> Self {
    let ram = if cart.get_vrom().is_empty() {
      Some(vec![0; 0x2000])
    } else {
      None
    };
    Self {
      cart,
      character_ram: ram,
      select_prg: 0,
    }
  }

  pub fn cartridge(&self) -> &Cartridge {
    &self.cart
  }

  pub fn read_prg(&self, addr: Address) -> Byte {
    let rom = self.cart.get_rom();
    let base = if addr < 0xC000 {
      (self.select_prg as usize * 0x4000) % rom.len()
    } else {
      rom.len() - 0x4000
    };
    rom[base + (addr & 0x3FFF) as usize]
  }

  pub fn write_prg(&mut self, _: Address, value: Byte) {
    self.select_prg = value;
  }

  pub fn read_chr(&self, addr: Address) -> Byte {
    match &self.character_ram {
      Some(ram) => ram[addr as usize],
      None => self.cart.get_vrom()[addr as usize],
    }
  }

  pub fn write_chr(&mut self, addr: Address, value: Byte) {
    match &mut self.character_ram {
      Some(ram) => ram[addr as usize] = value,
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

  fn uxrom(banks: u8) -> UxRom {
    let mut data = vec![0u8; 0x10];
    data[0..4].copy_from_slice(b"NES\x1A");
    data[4] = banks;
    data[6] = 0x20; // mapper 2
    data.resize(0x10 + banks as usize * 0x4000, 0);
    for bank in 0..banks as usize {
      data[0x10 + bank * 0x4000] = bank as u8 + 1;
    }
    UxRom::new(Cartridge::load(&data).unwrap())
  }

  #[test]
  fn last_bank_stays_fixed_while_the_first_switches() {
    let mut rom = uxrom(4);
    assert_eq!(rom.read_prg(0x8000), 1);
    assert_eq!(rom.read_prg(0xC000), 4);
    rom.write_prg(0x8000, 2);
    assert_eq!(rom.read_prg(0x8000), 3);
    assert_eq!(rom.read_prg(0xC000), 4);
  }

  #[test]
  fn bank_select_wraps_past_the_end_of_rom() {
    let mut rom = uxrom(2);
    rom.write_prg(0x8000, 5);
    assert_eq!(rom.read_prg(0x8000), 2);
  }

  #[test]
  fn chr_ram_round_trips() {
    let mut rom = uxrom(1);
    rom.write_chr(0x123, 0x7E);
    assert_eq!(rom.read_chr(0x123), 0x7E);
  }
}
