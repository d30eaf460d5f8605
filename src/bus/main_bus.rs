use log::warn;
use serde::{Deserialize, Serialize};

use crate::apu::Apu;
use crate::common::{Address, Byte};
use crate::controller::Controller;
use crate::mapper::Mapper;
use crate::ppu::Ppu;

pub type IORegister = u16;

pub const PPU_CTRL: IORegister = 0x2000;
pub const PPU_MASK: IORegister = 0x2001;
pub const PPU_STATUS: IORegister = 0x2002;
pub const OAM_ADDR: IORegister = 0x2003;
pub const OAM_DATA: IORegister = 0x2004;
pub const PPU_SCROLL: IORegister = 0x2005;
pub const PPU_ADDR: IORegister = 0x2006;
pub const PPU_DATA: IORegister = 0x2007;
pub const OAM_DMA: IORegister = 0x4014;
pub const APU_STATUS: IORegister = 0x4015;
pub const JOY1: IORegister = 0x4016;
pub const JOY2: IORegister = 0x4017;

/// CPU-side address space. Owns every device the CPU can talk to, so a
/// read or write is a plain method call all the way down.
///
/// Reads of unmapped or write-only locations return the last value seen
/// on the bus. The latch is refreshed by every CPU read and write; decay
/// is not modeled.
#[derive(Serialize, Deserialize)]
pub struct MainBus {
  #[serde(with = "serde_bytes")]
  ram: Vec<Byte>,
  #[serde(with = "serde_bytes")]
  ext_ram: Vec<Byte>,
  ppu: Ppu,
  apu: Apu,
  control1: Controller,
  control2: Controller,
  mapper: Mapper,
  open_bus: Byte,

  skip_dma_cycles: bool,
  dmc_stall: u32,
}

impl MainBus {
  pub fn new(mapper: Mapper) -> Self {
    let mut ppu = Ppu::new();
    ppu.update_mirroring(mapper.mirroring());
    Self {
      ram: vec![0; 0x800],
      ext_ram: vec![0; 0x2000],
      ppu,
      apu: Apu::new(),
      control1: Controller::new(),
      control2: Controller::new(),
      mapper,
      open_bus: 0,
      skip_dma_cycles: false,
      dmc_stall: 0,
    }
  }

  pub fn ppu(&self) -> &Ppu {
    &self.ppu
  }

  pub fn ppu_mut(&mut self) -> &mut Ppu {
    &mut self.ppu
  }

  pub fn apu(&self) -> &Apu {
    &self.apu
  }

  pub fn apu_mut(&mut self) -> &mut Apu {
    &mut self.apu
  }

  pub fn mapper(&self) -> &Mapper {
    &self.mapper
  }

  pub fn update_joypads(&mut self, p1: Byte, p2: Byte) {
    self.control1.set_button_states(p1);
    self.control2.set_button_states(p2);
  }

  /// Advances the PPU by one dot.
  pub fn step_ppu(&mut self) {
    self.ppu.step(&mut self.mapper);
  }

  /// Advances the APU by one CPU cycle, feeding the DMC a sample byte
  /// first when its buffer ran dry. Each fetch costs the CPU four
  /// cycles, billed through the stall counter.
  pub fn step_apu(&mut self) {
    if let Some(addr) = self.apu.dmc_fetch_request() {
      let value = self.read(addr);
      self.apu.dmc_supply(value);
      self.dmc_stall += 4;
    }
    self.apu.step();
  }

  /// Current state of the two interrupt lines: NMI is an edge consumed
  /// by the caller, IRQ is the OR of every device holding the line low.
  pub fn interrupt_lines(&mut self) -> (bool, bool) {
    let nmi = self.ppu.poll_nmi();
    let irq = self.apu.irq_asserted() || self.mapper.irq_pending();
    (nmi, irq)
  }

  pub fn check_and_reset_dma(&mut self) -> bool {
    let ret = self.skip_dma_cycles;
    self.skip_dma_cycles = false;
    ret
  }

  pub fn take_dmc_stall(&mut self) -> u32 {
    let ret = self.dmc_stall;
    self.dmc_stall = 0;
    ret
  }

  pub fn write(&mut self, addr: Address, value: Byte) {
    self.open_bus = value;
    match addr {
      0x0000..=0x1FFF => self.ram[(addr & 0x07FF) as usize] = value,
      0x2000..=0x3FFF => {
        // PPU registers, mirrored
        match addr & PPU_DATA {
          PPU_CTRL => self.ppu.control(value),
          PPU_MASK => self.ppu.set_mask(value),
          OAM_ADDR => self.ppu.set_oam_address(value),
          OAM_DATA => self.ppu.set_oam_data(value),
          PPU_SCROLL => self.ppu.set_scroll(value),
          PPU_ADDR => self.ppu.set_data_address(value),
          PPU_DATA => self.ppu.set_data(value, &mut self.mapper),
          _ => {} // PPU_STATUS is read-only
        }
      }
      0x4000..=0x4013 | APU_STATUS => self.apu.write_register(addr, value),
      OAM_DMA => {
        self.skip_dma_cycles = true;
        let base = (value as Address) << 8;
        let mut page = [0; 256];
        for (i, slot) in page.iter_mut().enumerate() {
          *slot = self.read(base + i as Address);
        }
        self.ppu.do_dma(&page);
      }
      JOY1 => {
        self.control1.strobe(value);
        self.control2.strobe(value);
      }
      JOY2 => self.apu.write_register(addr, value),
      0x4018..=0x401F => {} // CPU test registers
      0x4020..=0x5FFF => {
        warn!("Expansion ROM write attempted. This currently unsupported");
      }
      0x6000..=0x7FFF => {
        if self.mapper.has_extended_ram() {
          self.ext_ram[(addr - 0x6000) as usize] = value;
        }
      }
      _ => {
        self.mapper.write_prg(addr, value);
        // Bank register writes can retarget the name tables on MMC1/MMC3.
        self.ppu.update_mirroring(self.mapper.mirroring());
      }
    }
  }

  pub fn read(&mut self, addr: Address) -> Byte {
    let value = match addr {
      0x0000..=0x1FFF => self.ram[(addr & 0x07FF) as usize],
      0x2000..=0x3FFF => {
        // PPU registers, mirrored
        match addr & PPU_DATA {
          // The PPU only drives the top three status bits.
          PPU_STATUS => (self.ppu.get_status() & 0xE0) | (self.open_bus & 0x1F),
          OAM_DATA => self.ppu.get_oam_data(),
          PPU_DATA => self.ppu.get_data(&mut self.mapper),
          _ => self.open_bus, // write-only registers
        }
      }
      APU_STATUS => self.apu.read_status(),
      JOY1 => self.control1.read(),
      JOY2 => self.control2.read(),
      0x4000..=0x401F => self.open_bus, // write-only IO, including OAM DMA
      0x4020..=0x5FFF => {
        warn!("Expansion ROM read attempted. This currently unsupported");
        self.open_bus
      }
      0x6000..=0x7FFF => {
        if self.mapper.has_extended_ram() {
          self.ext_ram[(addr - 0x6000) as usize]
        } else {
          self.open_bus
        }
      }
      _ => self.mapper.read_prg(addr),
    };
    self.open_bus = value;
    value
  }

  pub fn read_addr(&mut self, addr: Address) -> Address {
    self.read(addr) as Address
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cartridge::Cartridge;

  fn bus_for_mapper(flags6: u8) -> MainBus {
    let mut data = vec![0u8; 0x10 + 0x4000];
    data[0..4].copy_from_slice(b"NES\x1A");
    data[4] = 1;
    data[6] = flags6;
    let mapper = Mapper::new(Cartridge::load(&data).unwrap()).unwrap();
    MainBus::new(mapper)
  }

  #[test]
  fn ram_mirrors_every_2k() {
    let mut bus = bus_for_mapper(0);
    bus.write(0x0042, 0x99);
    assert_eq!(bus.read(0x0842), 0x99);
    assert_eq!(bus.read(0x1842), 0x99);
  }

  #[test]
  fn unmapped_reads_return_the_open_bus_latch() {
    let mut bus = bus_for_mapper(0);
    bus.write(0x0000, 0x5A);
    assert_eq!(bus.read(0x4020), 0x5A);
    bus.read(0x0000);
    assert_eq!(bus.read(0x4000), 0x5A);
  }

  #[test]
  fn write_only_ppu_registers_read_as_open_bus() {
    let mut bus = bus_for_mapper(0);
    bus.write(0x0000, 0xAB);
    bus.read(0x0000);
    assert_eq!(bus.read(PPU_CTRL), 0xAB);
    assert_eq!(bus.read(PPU_SCROLL), 0xAB);
  }

  #[test]
  fn work_ram_needs_mapper_support() {
    // Mapper 0 without a battery leaves 0x6000 floating.
    let mut bus = bus_for_mapper(0);
    bus.write(0x6000, 0x33);
    bus.write(0x0000, 0x44);
    bus.read(0x0000);
    assert_eq!(bus.read(0x6000), 0x44);

    // MMC1 carts get the full 8KB.
    let mut bus = bus_for_mapper(0x10);
    bus.write(0x6000, 0x33);
    assert_eq!(bus.read(0x6000), 0x33);
  }

  #[test]
  fn oam_dma_raises_the_stall_flag_once() {
    let mut bus = bus_for_mapper(0);
    bus.write(OAM_DMA, 0x02);
    assert!(bus.check_and_reset_dma());
    assert!(!bus.check_and_reset_dma());
  }

  #[test]
  fn oam_dma_copies_a_page_into_sprite_memory() {
    let mut bus = bus_for_mapper(0);
    for i in 0..256u16 {
      bus.write(0x0200 + i, i as Byte);
    }
    bus.write(OAM_ADDR, 0);
    bus.write(OAM_DMA, 0x02);
    bus.write(OAM_ADDR, 5);
    assert_eq!(bus.read(OAM_DATA), 5);
  }

  #[test]
  fn controller_reads_report_buttons_serially() {
    let mut bus = bus_for_mapper(0);
    bus.update_joypads(0b1010_0001, 0);
    bus.write(JOY1, 1);
    bus.write(JOY1, 0);
    let bits: Vec<Byte> = (0..8).map(|_| bus.read(JOY1) & 1).collect();
    assert_eq!(bits, vec![1, 0, 0, 0, 0, 1, 0, 1]);
  }
}
