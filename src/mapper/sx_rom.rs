use serde::{Deserialize, Serialize};

use log::warn;

use crate::cartridge::Cartridge;
use crate::common::{bit_eq, Address, Byte};
use crate::mapper::NameTableMirroring;

const BANK_SIZE: usize = 0x1000;

/// Mapper 1 (MMC1). All registers are loaded through a single serial port:
/// five writes of one bit each, LSB first, routed by the address of the
/// fifth write. A write with bit 7 set resets the shifter and forces PRG
/// mode 3.
#[derive(Serialize, Deserialize)]
pub struct SxRom {
  cart: Cartridge,
  #[serde(with = "serde_bytes")]
  character_ram: Option<Vec<Byte>>,
  mirroring: NameTableMirroring,

  mode_chr: Byte,
  mode_prg: Byte,

  temp_register: Byte,
  write_counter: i32,

  reg_prg: Byte,
  reg_chr0: Byte,
  reg_chr1: Byte,

  first_bank_prg: usize,  // offset into rom
  second_bank_prg: usize, // offset into rom

  first_bank_chr: usize,  // offset into vrom
  second_bank_chr: usize, // offset into vrom
}

impl SxRom {
  pub fn new(cart: Cartridge) -> Self {
    let ram = if cart.get_vrom().is_empty() {
      Some(vec![0; 0x2000])
    } else {
      None
    };
    let rom_len = cart.get_rom().len();
    Self {
      character_ram: ram,
      cart,
      mirroring: NameTableMirroring::Horizontal,
      mode_chr: 0,
      mode_prg: 3,
      temp_register: 0,
      write_counter: 0,
      reg_prg: 0,
      reg_chr0: 0,
      reg_chr1: 0,
      first_bank_prg: 0,
      second_bank_prg: rom_len - 0x4000,
      first_bank_chr: 0,
      second_bank_chr: BANK_SIZE,
    }
  }

  pub fn cartridge(&self) -> &Cartridge {
    &self.cart
  }

  fn prg_offset(&self, bank_16k: usize) -> usize {
    (bank_16k * 0x4000) % self.cart.get_rom().len()
  }

  fn chr_offset(&self, bank_4k: usize) -> usize {
    let len = self.cart.get_vrom().len();
    if len == 0 {
      0
    } else {
      (bank_4k * BANK_SIZE) % len
    }
  }

  fn calculate_prg_pointers(&mut self) {
    if self.mode_prg <= 1 {
      // 32KB switched as a pair
      self.first_bank_prg = self.prg_offset((self.reg_prg >> 1) as usize * 2);
      self.second_bank_prg = self.prg_offset((self.reg_prg >> 1) as usize * 2 + 1);
    } else if self.mode_prg == 2 {
      // first fixed, second switched
      self.first_bank_prg = 0;
      self.second_bank_prg = self.prg_offset(self.reg_prg as usize);
    } else {
      // first switched, second fixed to the last bank
      self.first_bank_prg = self.prg_offset(self.reg_prg as usize);
      self.second_bank_prg = self.cart.get_rom().len() - 0x4000;
    }
  }

  fn calculate_chr_pointers(&mut self) {
    if self.mode_chr == 0 {
      // one 8KB bank, low bit of the register ignored
      self.first_bank_chr = self.chr_offset((self.reg_chr0 & !1) as usize);
      self.second_bank_chr = self.first_bank_chr + BANK_SIZE;
    } else {
      // two independent 4KB banks
      self.first_bank_chr = self.chr_offset(self.reg_chr0 as usize);
      self.second_bank_chr = self.chr_offset(self.reg_chr1 as usize);
    }
  }

  pub fn write_prg(&mut self, addr: Address, value: Byte) {
    if bit_eq(value, 0x80) {
      // reset
      self.temp_register = 0;
      self.write_counter = 0;
      self.mode_prg = 3;
      self.calculate_prg_pointers();
      return;
    }

    self.temp_register = (self.temp_register >> 1) | ((value & 1) << 4);
    self.write_counter += 1;
    if self.write_counter < 5 {
      return;
    }

    let register = self.temp_register;
    self.temp_register = 0;
    self.write_counter = 0;

    if addr <= 0x9FFF {
      self.mirroring = match register & 0x3 {
        0 => NameTableMirroring::OneScreenLower,
        1 => NameTableMirroring::OneScreenHigher,
        2 => NameTableMirroring::Vertical,
        _ => NameTableMirroring::Horizontal,
      };
      self.mode_chr = (register & 0x10) >> 4;
      self.mode_prg = (register & 0xC) >> 2;
      self.calculate_prg_pointers();
      self.calculate_chr_pointers();
    } else if addr <= 0xBFFF {
      self.reg_chr0 = register;
      self.calculate_chr_pointers();
    } else if addr <= 0xDFFF {
      self.reg_chr1 = register;
      self.calculate_chr_pointers();
    } else {
      // bit 4 is the PRG-RAM disable line, not modeled
      self.reg_prg = register & 0xF;
      self.calculate_prg_pointers();
    }
  }

  pub fn read_prg(&self, addr: Address) -> Byte {
    let base = if addr < 0xC000 {
      self.first_bank_prg
    } else {
      self.second_bank_prg
    };
    self.cart.get_rom()[base + (addr & 0x3FFF) as usize]
  }

  pub fn write_chr(&mut self, addr: Address, value: Byte) {
    match &mut self.character_ram {
      Some(ram) => ram[addr as usize] = value,
      None => warn!("Attempting to write read-only CHR memory on {:#x}", addr),
    }
  }

  pub fn read_chr(&self, addr: Address) -> Byte {
    match &self.character_ram {
      Some(ram) => ram[addr as usize],
      None => self.cart.get_vrom()[if addr < BANK_SIZE as Address {
        self.first_bank_chr + addr as usize
      } else {
        self.second_bank_chr + (addr & 0xFFF) as usize
      }],
    }
  }

  pub fn mirroring(&self) -> NameTableMirroring {
    self.mirroring
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn mmc1(banks: u8, vbanks: u8) -> SxRom {
    let mut data = vec![0u8; 0x10];
    data[0..4].copy_from_slice(b"NES\x1A");
    data[4] = banks;
    data[5] = vbanks;
    data[6] = 0x10; // mapper 1
    data.resize(
      0x10 + banks as usize * 0x4000 + vbanks as usize * 0x2000,
      0,
    );
    for bank in 0..banks as usize {
      data[0x10 + bank * 0x4000] = bank as u8 + 1;
    }
    SxRom::new(Cartridge::load(&data).unwrap())
  }

  fn serial_write(rom: &mut SxRom, addr: Address, value: Byte) {
    for i in 0..5 {
      rom.write_prg(addr, value >> i);
    }
  }

  #[test]
  fn powers_on_with_last_bank_fixed() {
    let rom = mmc1(4, 1);
    assert_eq!(rom.read_prg(0x8000), 1);
    assert_eq!(rom.read_prg(0xC000), 4);
  }

  #[test]
  fn serial_write_switches_the_first_bank() {
    let mut rom = mmc1(4, 1);
    serial_write(&mut rom, 0xE000, 0x2);
    assert_eq!(rom.read_prg(0x8000), 3);
    assert_eq!(rom.read_prg(0xC000), 4);
  }

  #[test]
  fn reset_bit_clears_the_shifter() {
    let mut rom = mmc1(4, 1);
    // Three bits in, then a reset, then a full bank-2 sequence.
    rom.write_prg(0xE000, 1);
    rom.write_prg(0xE000, 1);
    rom.write_prg(0xE000, 1);
    rom.write_prg(0xE000, 0x80);
    serial_write(&mut rom, 0xE000, 0x1);
    assert_eq!(rom.read_prg(0x8000), 2);
  }

  #[test]
  fn control_register_switches_mirroring() {
    let mut rom = mmc1(2, 1);
    serial_write(&mut rom, 0x8000, 0x0E); // vertical, fix-last PRG mode
    assert_eq!(rom.mirroring(), NameTableMirroring::Vertical);
    serial_write(&mut rom, 0x8000, 0x0F);
    assert_eq!(rom.mirroring(), NameTableMirroring::Horizontal);
  }

  #[test]
  fn thirty_two_k_mode_wraps_on_a_single_bank() {
    let mut rom = mmc1(1, 1);
    serial_write(&mut rom, 0x8000, 0x0); // 32KB PRG mode
    assert_eq!(rom.read_prg(0x8000), 1);
    assert_eq!(rom.read_prg(0xC000), 1);
  }

  #[test]
  fn chr_ram_cart_ignores_banking() {
    let mut rom = mmc1(2, 0);
    rom.write_chr(0x1000, 0x42);
    serial_write(&mut rom, 0xA000, 0x3);
    assert_eq!(rom.read_chr(0x1000), 0x42);
  }
}
