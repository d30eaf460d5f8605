use serde::{Deserialize, Serialize};

use log::warn;

use crate::cartridge::Cartridge;
use crate::common::{bit_eq, Address, Byte};
use crate::mapper::NameTableMirroring;

/// Mapper 4 (MMC3). Eight bank registers behind a single address/data
/// register pair, plus a scanline counter that drives the IRQ line.
///
/// The counter is clocked from the PPU once per rendered scanline, which
/// stands in for watching A12 rise. The flag raised here stays asserted
/// until a write to an even address in 0xE000..=0xFFFF.
#[derive(Serialize, Deserialize)]
pub struct TxRom {
  cart: Cartridge,
  #[serde(with = "serde_bytes")]
  character_ram: Option<Vec<Byte>>,
  mirroring: NameTableMirroring,

  target_register: usize,
  prg_bank_mode: bool,
  chr_inversion: bool,

  bank_register: [Byte; 8],

  irq_enabled: bool,
  irq_counter: Byte,
  irq_latch: Byte,
  irq_reload_pending: bool,
  irq_flag: bool,

  prg_banks: [usize; 4], // offsets into rom, one per 8KB slot
  chr_banks: [usize; 8], // offsets into vrom, one per 1KB slot
}

impl TxRom {
  pub fn new(cart: Cartridge) -> Self {
    let ram = if cart.get_vrom().is_empty() {
      Some(vec![0; 0x2000])
    } else {
      None
    };
    let rom_len = cart.get_rom().len();
    let mirroring = NameTableMirroring::from(cart.get_name_table_mirroring());
    let mut rom = Self {
      character_ram: ram,
      cart,
      mirroring,
      target_register: 0,
      prg_bank_mode: false,
      chr_inversion: false,
      bank_register: [0; 8],
      irq_enabled: false,
      irq_counter: 0,
      irq_latch: 0,
      irq_reload_pending: false,
      irq_flag: false,
      prg_banks: [
        rom_len - 0x4000,
        rom_len - 0x2000,
        rom_len - 0x4000,
        rom_len - 0x2000,
      ],
      chr_banks: [0; 8],
    };
    rom.update_banks();
    rom
  }

  pub fn cartridge(&self) -> &Cartridge {
    &self.cart
  }

  fn chr_offset(&self, bank_1k: Byte) -> usize {
    let len = match &self.character_ram {
      Some(ram) => ram.len(),
      None => self.cart.get_vrom().len(),
    };
    (bank_1k as usize * 0x400) % len
  }

  fn update_banks(&mut self) {
    // R0/R1 address 2KB pairs, so their low bit is ignored.
    let r = self.bank_register;
    let ordered = [
      r[0] & 0xFE,
      (r[0] & 0xFE) + 1,
      r[1] & 0xFE,
      (r[1] & 0xFE) + 1,
      r[2],
      r[3],
      r[4],
      r[5],
    ];
    for (slot, &bank) in ordered.iter().enumerate() {
      let slot = if self.chr_inversion { slot ^ 4 } else { slot };
      self.chr_banks[slot] = self.chr_offset(bank);
    }

    let rom_len = self.cart.get_rom().len();
    let bank6 = ((r[6] & 0x3F) as usize * 0x2000) % rom_len;
    let bank7 = ((r[7] & 0x3F) as usize * 0x2000) % rom_len;
    self.prg_banks = if self.prg_bank_mode {
      [rom_len - 0x4000, bank7, bank6, rom_len - 0x2000]
    } else {
      [bank6, bank7, rom_len - 0x4000, rom_len - 0x2000]
    };
  }

  pub fn write_prg(&mut self, addr: Address, value: Byte) {
    let even = !bit_eq(addr, 0x1);
    match addr {
      0x8000..=0x9FFF => {
        if even {
          self.target_register = (value & 0x7) as usize;
          self.prg_bank_mode = bit_eq(value, 0x40);
          self.chr_inversion = bit_eq(value, 0x80);
        } else {
          self.bank_register[self.target_register] = value;
        }
        self.update_banks();
      }
      0xA000..=0xBFFF => {
        // The odd register is PRG-RAM protect, not modeled.
        // Four-screen boards hard-wire their mirroring.
        if even && self.mirroring != NameTableMirroring::FourScreen {
          self.mirroring = if bit_eq(value, 0x1) {
            NameTableMirroring::Horizontal
          } else {
            NameTableMirroring::Vertical
          };
        }
      }
      0xC000..=0xDFFF => {
        if even {
          self.irq_latch = value;
        } else {
          self.irq_counter = 0;
          self.irq_reload_pending = true;
        }
      }
      _ => {
        self.irq_enabled = !even;
        if !self.irq_enabled {
          self.irq_flag = false;
        }
      }
    }
  }

  pub fn read_prg(&self, addr: Address) -> Byte {
    debug_assert!(addr >= 0x8000);
    let slot = ((addr - 0x8000) >> 13) as usize;
    self.cart.get_rom()[self.prg_banks[slot] + (addr & 0x1FFF) as usize]
  }

  pub fn write_chr(&mut self, addr: Address, value: Byte) {
    let slot = (addr >> 10) as usize;
    let offset = self.chr_banks[slot] + (addr & 0x3FF) as usize;
    match &mut self.character_ram {
      Some(ram) => ram[offset] = value,
      None => warn!("Attempting to write read-only CHR memory on {:#x}", addr),
    }
  }

  pub fn read_chr(&self, addr: Address) -> Byte {
    let slot = (addr >> 10) as usize;
    let offset = self.chr_banks[slot] + (addr & 0x3FF) as usize;
    match &self.character_ram {
      Some(ram) => ram[offset],
      None => self.cart.get_vrom()[offset],
    }
  }

  pub fn mirroring(&self) -> NameTableMirroring {
    self.mirroring
  }

  pub fn notify_scanline(&mut self) {
    if self.irq_counter == 0 || self.irq_reload_pending {
      self.irq_counter = self.irq_latch;
      self.irq_reload_pending = false;
    } else {
      self.irq_counter -= 1;
    }
    if self.irq_counter == 0 && self.irq_enabled {
      self.irq_flag = true;
    }
  }

  pub fn irq_pending(&self) -> bool {
    self.irq_flag
  }
}
