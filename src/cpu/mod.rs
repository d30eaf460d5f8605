use serde::{Deserialize, Serialize};

use crate::bus::main_bus::MainBus;
use crate::common::*;

pub mod opcodes;

use self::opcodes::{AddrMode, OpInfo, Operation, DECODE_TABLE};

pub const NMI_VECTOR: Address = 0xFFFA;
pub const RESET_VECTOR: Address = 0xFFFC;
pub const IRQ_VECTOR: Address = 0xFFFE;

// 256 read + 256 write + 1 dummy read
const DMA_CYCLES: u32 = 513;
const INTERRUPT_CYCLES: u32 = 7;

mod flag_const {
  use crate::common::Byte;
  // 7 6 5 4 3 2 1 0
  // N V - B D I Z C

  pub const NEGATIVE: Byte = 1 << 7;
  pub const OVERFLOW: Byte = 1 << 6;
  pub const DECIMAL: Byte = 1 << 3;
  pub const INTERRUPT: Byte = 1 << 2;
  pub const ZERO: Byte = 1 << 1;
  pub const CARRY: Byte = 1;
  pub const ALL: Byte = NEGATIVE | OVERFLOW | (1 << 5) | DECIMAL | INTERRUPT | ZERO | CARRY;
}

// Bits 4 and 5 are not stored; 5 reads back set, 4 only appears on the
// stack copies pushed by PHP and BRK.
#[derive(Copy, Clone, Serialize, Deserialize)]
struct Flag(Byte);

impl Flag {
  pub fn clear(&mut self) {
    self.0 = 1 << 5;
  }

  pub fn set_at(&mut self, pos: Byte, v: bool) {
    if v {
      self.0 |= pos;
    } else {
      self.0 &= flag_const::ALL - pos;
    }
  }

  pub fn get_at(&self, pos: Byte) -> bool {
    bit_eq(self.0, pos)
  }

  pub fn set_by_check(&mut self, pos: Byte, v: Byte) {
    self.set_at(pos, bit_eq(v, pos));
  }

  pub fn set_all(&mut self, v: Byte) {
    self.0 = (v | (1 << 5)) & !(1 << 4);
  }
}

impl Into<Byte> for Flag {
  fn into(self) -> Byte {
    self.0
  }
}

#[derive(Serialize, Deserialize)]
pub struct Cpu {
  skip_cycles: u32,
  cycles: u64,

  // registers
  r_pc: Address, // program counter
  r_sp: Byte,    // stack pointer
  r_a: Byte,     // accumulator
  r_x: Byte,     // index register
  r_y: Byte,     // index register

  // status flag.
  flag: Flag,

  // Interrupt lines as sampled at the last instruction boundary. The
  // producers (PPU, APU, mapper) only flip booleans on their side; nothing
  // ever calls into the CPU mid-instruction.
  pending_nmi: bool,
  pending_irq: bool,

  main_bus: MainBus,
}

impl Cpu {
  pub fn new(main_bus: MainBus) -> Self {
    Self {
      skip_cycles: 0,
      cycles: 0,
      r_pc: 0,
      r_sp: 0,
      r_a: 0,
      r_x: 0,
      r_y: 0,
      flag: Flag(0),
      pending_nmi: false,
      pending_irq: false,
      main_bus,
    }
  }

  pub fn main_bus(&self) -> &MainBus {
    &self.main_bus
  }

  pub fn main_bus_mut(&mut self) -> &mut MainBus {
    &mut self.main_bus
  }

  pub fn reset(&mut self) {
    let reset_vector = self.read_address(RESET_VECTOR);
    self.reset_at(reset_vector)
  }

  fn reset_at(&mut self, start_addr: Address) {
    self.cycles = 0;
    self.skip_cycles = 0;
    self.r_a = 0;
    self.r_x = 0;
    self.r_y = 0;
    self.flag.clear();
    self.flag.set_at(flag_const::INTERRUPT, true);
    self.r_pc = start_addr;
    // documented startup state
    self.r_sp = 0xFD;
    self.pending_nmi = false;
    self.pending_irq = false;
  }

  pub fn pc(&self) -> Address {
    self.r_pc
  }

  pub fn cycle_count(&self) -> u64 {
    self.cycles
  }

  fn get_flag(&self) -> Byte {
    self.flag.into()
  }

  /// Samples the NMI edge and the level IRQ lines from the bus. Called by
  /// the driving loop once per instruction boundary.
  pub fn poll_interrupt_lines(&mut self) {
    let (nmi, irq) = self.main_bus.interrupt_lines();
    if nmi {
      self.pending_nmi = true;
    }
    self.pending_irq = irq;
  }

  /// Credits stall cycles taken from the CPU by DMC sample fetches.
  pub fn stall(&mut self, cycles: u32) {
    self.cycles = self.cycles.wrapping_add(cycles as u64);
  }

  /// Runs the interrupt sequence or exactly one instruction and returns the
  /// cycles it consumed, including penalties and any OAM-DMA stall.
  pub fn step(&mut self) -> u32 {
    self.skip_cycles = 0;

    if self.pending_nmi {
      self.pending_nmi = false;
      self.service_interrupt(NMI_VECTOR, false);
      self.skip_cycles += INTERRUPT_CYCLES;
    } else if self.pending_irq && !self.flag.get_at(flag_const::INTERRUPT) {
      self.service_interrupt(IRQ_VECTOR, false);
      self.skip_cycles += INTERRUPT_CYCLES;
    } else {
      let opcode = self.read_and_forward_pc() as Byte;
      let info = DECODE_TABLE[opcode as usize];
      self.skip_cycles += info.cycles as u32;
      self.execute(info);
    }

    if self.main_bus.check_and_reset_dma() {
      self.skip_dma_cycles();
    }

    self.cycles = self.cycles.wrapping_add(self.skip_cycles as u64);
    self.skip_cycles
  }

  // The pushed status has B clear for NMI/IRQ and set for BRK. The caller
  // accounts for the 7 service cycles.
  fn service_interrupt(&mut self, vector: Address, from_brk: bool) {
    self.push_stack((self.r_pc >> 8) as Byte);
    self.push_stack(self.r_pc as Byte);
    let flags = self.get_flag() | if from_brk { 1 << 4 } else { 0 };
    self.push_stack(flags);
    self.flag.set_at(flag_const::INTERRUPT, true);
    self.r_pc = self.read_address(vector);
  }

  #[inline]
  fn push_stack(&mut self, value: Byte) {
    self.main_bus.write(0x100 | self.r_sp as Address, value);
    // Hardware stacks grow downward!
    self.r_sp = self.r_sp.wrapping_sub(1);
  }

  #[inline]
  fn pull_stack(&mut self) -> Byte {
    self.r_sp = self.r_sp.wrapping_add(1);
    self.main_bus.read(0x100 | self.r_sp as Address)
  }

  #[inline]
  fn pull_stack_16(&mut self) -> Address {
    self.pull_stack() as Address | (self.pull_stack() as Address) << 8
  }

  #[inline]
  fn set_zn(&mut self, value: Byte) {
    self.flag.set_at(flag_const::ZERO, value == 0);
    self
      .flag
      .set_at(flag_const::NEGATIVE, bit_eq(value, flag_const::NEGATIVE));
  }

  #[inline]
  fn set_page_crossed(&mut self, addr_a: Address, addr_b: Address, inc: u32) {
    if (addr_a & 0xFF00) != (addr_b & 0xFF00) {
      self.skip_cycles += inc;
    }
  }

  #[inline]
  fn skip_dma_cycles(&mut self) {
    // +1 when the transfer begins on an odd cycle
    let started_at = self.cycles.wrapping_add(self.skip_cycles as u64);
    self.skip_cycles += DMA_CYCLES + (started_at & 1) as u32;
  }

  #[inline]
  fn read_address(&mut self, addr: Address) -> Address {
    self.main_bus.read_addr(addr) | self.main_bus.read_addr(addr.wrapping_add(1)) << 8
  }

  #[inline]
  fn read_and_forward_pc(&mut self) -> Address {
    let res = self.main_bus.read_addr(self.r_pc);
    self.r_pc = self.r_pc.wrapping_add(1);
    res
  }

  /// Effective address for every operand-carrying mode. Page-cross
  /// penalties are charged here when the decode entry allows them.
  fn resolve(&mut self, info: OpInfo) -> Address {
    match info.mode {
      AddrMode::Immediate => {
        let addr = self.r_pc;
        self.r_pc = self.r_pc.wrapping_add(1);
        addr
      }
      AddrMode::ZeroPage => self.read_and_forward_pc(),
      AddrMode::ZeroPageX => (self.read_and_forward_pc() + self.r_x as Address) & 0xFF,
      AddrMode::ZeroPageY => (self.read_and_forward_pc() + self.r_y as Address) & 0xFF,
      AddrMode::Absolute => {
        let addr = self.read_address(self.r_pc);
        self.r_pc = self.r_pc.wrapping_add(2);
        addr
      }
      AddrMode::AbsoluteX => self.absolute_indexed(self.r_x, info.page_penalty),
      AddrMode::AbsoluteY => self.absolute_indexed(self.r_y, info.page_penalty),
      AddrMode::IndexedIndirect => {
        // The pointer wraps inside the zero page
        let zero_addr = (self.read_and_forward_pc() + self.r_x as Address) & 0xFF;
        self.main_bus.read_addr(zero_addr) | self.main_bus.read_addr((zero_addr + 1) & 0xFF) << 8
      }
      AddrMode::IndirectIndexed => {
        let zero_addr = self.read_and_forward_pc();
        let base =
          self.main_bus.read_addr(zero_addr) | self.main_bus.read_addr((zero_addr + 1) & 0xFF) << 8;
        let addr = base.wrapping_add(self.r_y as Address);
        if info.page_penalty {
          self.set_page_crossed(base, addr, 1);
        }
        addr
      }
      AddrMode::Implied | AddrMode::Accumulator | AddrMode::Relative | AddrMode::Indirect => {
        debug_assert!(false, "mode {:?} carries no operand address", info.mode);
        0
      }
    }
  }

  fn absolute_indexed(&mut self, index: Byte, page_penalty: bool) -> Address {
    let base = self.read_address(self.r_pc);
    self.r_pc = self.r_pc.wrapping_add(2);
    let addr = base.wrapping_add(index as Address);
    if page_penalty {
      self.set_page_crossed(base, addr, 1);
    }
    addr
  }

  fn read_operand(&mut self, info: OpInfo) -> Byte {
    let addr = self.resolve(info);
    self.main_bus.read(addr)
  }

  fn branch(&mut self, flag_bit: Byte, taken_when_set: bool) {
    let offset = self.read_and_forward_pc() as Byte;
    if self.flag.get_at(flag_bit) == taken_when_set {
      let offset = i8::from_le_bytes([offset]) as i32;
      let new_pc = (self.r_pc as i32).wrapping_add(offset) as Address;
      // +1 taken, +1 more when the target sits on another page
      self.skip_cycles += 1;
      self.set_page_crossed(self.r_pc, new_pc, 1);
      self.r_pc = new_pc;
    }
  }

  fn adc(&mut self, operand: Byte) {
    let a = self.r_a as Address;
    let operand = operand as Address;
    let sum = a + operand + self.flag.get_at(flag_const::CARRY) as Address;
    // Carry forward or UNSIGNED overflow
    self.flag.set_at(flag_const::CARRY, bit_eq(sum, 0x100));
    // SIGNED overflow, would only happen if the sign of sum is
    // different from BOTH the operands
    self
      .flag
      .set_at(flag_const::OVERFLOW, bit_eq((a ^ sum) & (operand ^ sum), 0x80));
    self.r_a = sum as Byte;
    self.set_zn(self.r_a);
  }

  // A + !M + C is exactly A - M - !C with the right flags.
  fn sbc(&mut self, operand: Byte) {
    self.adc(!operand);
  }

  fn compare(&mut self, a: Byte, b: Byte) {
    let diff = a.overflowing_sub(b);
    self.flag.set_at(flag_const::CARRY, !diff.1);
    self.set_zn(diff.0);
  }

  fn shift_left(&mut self, rotate: bool, value: Byte) -> Byte {
    let prev_c = self.flag.get_at(flag_const::CARRY) as Byte;
    self.flag.set_at(flag_const::CARRY, bit_eq(value, 0x80));
    let mut result = value << 1;
    if rotate {
      // If rotating, set the bit-0 to the previous carry
      result |= prev_c;
    }
    result
  }

  fn shift_right(&mut self, rotate: bool, value: Byte) -> Byte {
    let prev_c = self.flag.get_at(flag_const::CARRY) as Byte;
    self.flag.set_at(flag_const::CARRY, bit_eq(value, 1));
    let mut result = value >> 1;
    if rotate {
      // If rotating, set the bit-7 to the previous carry
      result |= prev_c << 7;
    }
    result
  }

  fn rmw_shift(&mut self, info: OpInfo, left: bool, rotate: bool) -> Byte {
    if info.mode == AddrMode::Accumulator {
      let result = if left {
        self.shift_left(rotate, self.r_a)
      } else {
        self.shift_right(rotate, self.r_a)
      };
      self.r_a = result;
      result
    } else {
      let addr = self.resolve(info);
      let value = self.main_bus.read(addr);
      let result = if left {
        self.shift_left(rotate, value)
      } else {
        self.shift_right(rotate, value)
      };
      self.main_bus.write(addr, result);
      result
    }
  }

  fn execute(&mut self, info: OpInfo) {
    use Operation::*;
    match info.op {
      Lda => {
        self.r_a = self.read_operand(info);
        self.set_zn(self.r_a);
      }
      Ldx => {
        self.r_x = self.read_operand(info);
        self.set_zn(self.r_x);
      }
      Ldy => {
        self.r_y = self.read_operand(info);
        self.set_zn(self.r_y);
      }
      Sta => {
        let addr = self.resolve(info);
        self.main_bus.write(addr, self.r_a);
      }
      Stx => {
        let addr = self.resolve(info);
        self.main_bus.write(addr, self.r_x);
      }
      Sty => {
        let addr = self.resolve(info);
        self.main_bus.write(addr, self.r_y);
      }

      Adc => {
        let operand = self.read_operand(info);
        self.adc(operand);
      }
      Sbc => {
        let operand = self.read_operand(info);
        self.sbc(operand);
      }
      And => {
        self.r_a &= self.read_operand(info);
        self.set_zn(self.r_a);
      }
      Ora => {
        self.r_a |= self.read_operand(info);
        self.set_zn(self.r_a);
      }
      Eor => {
        self.r_a ^= self.read_operand(info);
        self.set_zn(self.r_a);
      }
      Cmp => {
        let operand = self.read_operand(info);
        self.compare(self.r_a, operand);
      }
      Cpx => {
        let operand = self.read_operand(info);
        self.compare(self.r_x, operand);
      }
      Cpy => {
        let operand = self.read_operand(info);
        self.compare(self.r_y, operand);
      }
      Bit => {
        let operand = self.read_operand(info);
        self
          .flag
          .set_at(flag_const::ZERO, (self.r_a & operand) == 0);
        self.flag.set_by_check(flag_const::OVERFLOW, operand);
        self.flag.set_by_check(flag_const::NEGATIVE, operand);
      }

      Inc => {
        let addr = self.resolve(info);
        let result = self.main_bus.read(addr).wrapping_add(1);
        self.main_bus.write(addr, result);
        self.set_zn(result);
      }
      Dec => {
        let addr = self.resolve(info);
        let result = self.main_bus.read(addr).wrapping_sub(1);
        self.main_bus.write(addr, result);
        self.set_zn(result);
      }
      Inx => {
        self.r_x = self.r_x.wrapping_add(1);
        self.set_zn(self.r_x);
      }
      Iny => {
        self.r_y = self.r_y.wrapping_add(1);
        self.set_zn(self.r_y);
      }
      Dex => {
        self.r_x = self.r_x.wrapping_sub(1);
        self.set_zn(self.r_x);
      }
      Dey => {
        self.r_y = self.r_y.wrapping_sub(1);
        self.set_zn(self.r_y);
      }

      Asl => {
        let result = self.rmw_shift(info, true, false);
        self.set_zn(result);
      }
      Rol => {
        let result = self.rmw_shift(info, true, true);
        self.set_zn(result);
      }
      Lsr => {
        let result = self.rmw_shift(info, false, false);
        self.set_zn(result);
      }
      Ror => {
        let result = self.rmw_shift(info, false, true);
        self.set_zn(result);
      }

      Tax => {
        self.r_x = self.r_a;
        self.set_zn(self.r_x);
      }
      Tay => {
        self.r_y = self.r_a;
        self.set_zn(self.r_y);
      }
      Txa => {
        self.r_a = self.r_x;
        self.set_zn(self.r_a);
      }
      Tya => {
        self.r_a = self.r_y;
        self.set_zn(self.r_a);
      }
      Tsx => {
        self.r_x = self.r_sp;
        self.set_zn(self.r_x);
      }
      Txs => {
        self.r_sp = self.r_x;
      }

      Pha => self.push_stack(self.r_a),
      Php => self.push_stack(self.get_flag() | (1 << 4)),
      Pla => {
        self.r_a = self.pull_stack();
        self.set_zn(self.r_a);
      }
      Plp => {
        let flag = self.pull_stack();
        self.flag.set_all(flag);
      }

      Jmp => match info.mode {
        AddrMode::Indirect => {
          let location = self.read_address(self.r_pc);
          // When the pointer starts at the last byte of a page the high
          // byte is fetched from the beginning of that same page rather
          // than the next one. Recreating here:
          let page = location & 0xFF00;
          self.r_pc = self.main_bus.read_addr(location)
            | self.main_bus.read_addr(page | ((location + 1) & 0xFF)) << 8;
        }
        _ => self.r_pc = self.read_address(self.r_pc),
      },
      Jsr => {
        // Push address of next instruction - 1, r_pc + 1 instead of
        // r_pc + 2, since r_pc and r_pc + 1 hold the subroutine address
        let target = self.read_address(self.r_pc);
        let ret = self.r_pc.wrapping_add(1);
        self.push_stack((ret >> 8) as Byte);
        self.push_stack(ret as Byte);
        self.r_pc = target;
      }
      Rts => {
        self.r_pc = self.pull_stack_16().wrapping_add(1);
      }
      Rti => {
        let flag = self.pull_stack();
        self.flag.set_all(flag);
        self.r_pc = self.pull_stack_16();
      }
      Brk => {
        // BRK skips its padding byte and pushes the status with B set
        self.r_pc = self.r_pc.wrapping_add(1);
        self.service_interrupt(IRQ_VECTOR, true);
      }

      Bcc => self.branch(flag_const::CARRY, false),
      Bcs => self.branch(flag_const::CARRY, true),
      Bne => self.branch(flag_const::ZERO, false),
      Beq => self.branch(flag_const::ZERO, true),
      Bpl => self.branch(flag_const::NEGATIVE, false),
      Bmi => self.branch(flag_const::NEGATIVE, true),
      Bvc => self.branch(flag_const::OVERFLOW, false),
      Bvs => self.branch(flag_const::OVERFLOW, true),

      Clc => self.flag.set_at(flag_const::CARRY, false),
      Sec => self.flag.set_at(flag_const::CARRY, true),
      Cli => self.flag.set_at(flag_const::INTERRUPT, false),
      Sei => self.flag.set_at(flag_const::INTERRUPT, true),
      Cld => self.flag.set_at(flag_const::DECIMAL, false),
      Sed => self.flag.set_at(flag_const::DECIMAL, true),
      Clv => self.flag.set_at(flag_const::OVERFLOW, false),

      Nop => {
        // The multi-byte NOPs still perform their operand read
        if info.mode != AddrMode::Implied {
          let addr = self.resolve(info);
          self.main_bus.read(addr);
        }
      }

      Lax => {
        let value = self.read_operand(info);
        self.r_a = value;
        self.r_x = value;
        self.set_zn(value);
      }
      Sax => {
        let addr = self.resolve(info);
        self.main_bus.write(addr, self.r_a & self.r_x);
      }
      Dcp => {
        let addr = self.resolve(info);
        let result = self.main_bus.read(addr).wrapping_sub(1);
        self.main_bus.write(addr, result);
        self.compare(self.r_a, result);
      }
      Isb => {
        let addr = self.resolve(info);
        let result = self.main_bus.read(addr).wrapping_add(1);
        self.main_bus.write(addr, result);
        self.sbc(result);
      }
      Slo => {
        let addr = self.resolve(info);
        let value = self.main_bus.read(addr);
        let shifted = self.shift_left(false, value);
        self.main_bus.write(addr, shifted);
        self.r_a |= shifted;
        self.set_zn(self.r_a);
      }
      Rla => {
        let addr = self.resolve(info);
        let value = self.main_bus.read(addr);
        let shifted = self.shift_left(true, value);
        self.main_bus.write(addr, shifted);
        self.r_a &= shifted;
        self.set_zn(self.r_a);
      }
      Sre => {
        let addr = self.resolve(info);
        let value = self.main_bus.read(addr);
        let shifted = self.shift_right(false, value);
        self.main_bus.write(addr, shifted);
        self.r_a ^= shifted;
        self.set_zn(self.r_a);
      }
      Rra => {
        let addr = self.resolve(info);
        let value = self.main_bus.read(addr);
        let shifted = self.shift_right(true, value);
        self.main_bus.write(addr, shifted);
        self.adc(shifted);
      }

      Ill => {
        self.r_pc = self.r_pc.wrapping_add(info.mode.operand_length());
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cartridge::Cartridge;
  use crate::mapper::Mapper;

  // Two 16KB PRG banks mapped linearly at 0x8000, one CHR bank. The reset
  // vector points at 0x8000, NMI at 0x9000, IRQ at 0xA000.
  fn test_rom(program: &[u8]) -> Vec<u8> {
    let mut image = vec![0u8; 0x10 + 2 * 0x4000 + 0x2000];
    image[0..4].copy_from_slice(b"NES\x1A");
    image[4] = 2;
    image[5] = 1;
    image[0x10..0x10 + program.len()].copy_from_slice(program);
    image[0x10 + 0x7FFA] = 0x00; // NMI
    image[0x10 + 0x7FFB] = 0x90;
    image[0x10 + 0x7FFC] = 0x00; // RESET
    image[0x10 + 0x7FFD] = 0x80;
    image[0x10 + 0x7FFE] = 0x00; // IRQ
    image[0x10 + 0x7FFF] = 0xA0;
    image
  }

  fn cpu_with_program(program: &[u8]) -> Cpu {
    let cartridge = Cartridge::load(&test_rom(program)).unwrap();
    let mapper = Mapper::new(cartridge).unwrap();
    let mut cpu = Cpu::new(MainBus::new(mapper));
    cpu.reset();
    cpu
  }

  #[test]
  fn power_on_state() {
    let cpu = cpu_with_program(&[]);
    assert_eq!(cpu.r_pc, 0x8000);
    assert_eq!(cpu.r_sp, 0xFD);
    assert_eq!(cpu.r_a, 0);
    assert_eq!(cpu.r_x, 0);
    assert_eq!(cpu.r_y, 0);
    assert_eq!(cpu.get_flag(), 0x24);
  }

  #[test]
  fn lda_immediate_sets_flags() {
    let mut cpu = cpu_with_program(&[0xA9, 0x00, 0xA9, 0x80]);
    assert_eq!(cpu.step(), 2);
    assert_eq!(cpu.r_a, 0);
    assert!(cpu.flag.get_at(flag_const::ZERO));
    assert_eq!(cpu.step(), 2);
    assert_eq!(cpu.r_a, 0x80);
    assert!(cpu.flag.get_at(flag_const::NEGATIVE));
    assert!(!cpu.flag.get_at(flag_const::ZERO));
  }

  #[test]
  fn loads_take_the_page_cross_penalty_stores_do_not() {
    // LDX #$20; LDA $00F0,X; STA $00F0,X
    let mut cpu = cpu_with_program(&[0xA2, 0x20, 0xBD, 0xF0, 0x00, 0x9D, 0xF0, 0x00]);
    assert_eq!(cpu.step(), 2);
    assert_eq!(cpu.step(), 5);
    assert_eq!(cpu.step(), 5);
  }

  #[test]
  fn branch_cycle_accounting() {
    // BNE +0 not taken (Z set after LDA #0), then BNE taken to next page.
    let mut cpu = cpu_with_program(&[0xA9, 0x00, 0xD0, 0x10, 0xA9, 0x01, 0xD0, 0x02]);
    cpu.step();
    assert_eq!(cpu.step(), 2); // not taken
    cpu.step();
    assert_eq!(cpu.step(), 3); // taken, same page
    assert_eq!(cpu.r_pc, 0x800A);
  }

  #[test]
  fn branch_to_another_page_costs_one_more() {
    // BNE -5 from 0x8002 lands at 0x7FFF, one page below.
    let mut cpu = cpu_with_program(&[0xA9, 0x01, 0xD0, 0xFB]);
    cpu.step();
    assert_eq!(cpu.step(), 4);
    assert_eq!(cpu.r_pc, 0x7FFF);
  }

  #[test]
  fn jmp_indirect_wraps_inside_the_page() {
    let mut cpu = cpu_with_program(&[0x6C, 0xFF, 0x02]);
    cpu.main_bus.write(0x02FF, 0x34);
    cpu.main_bus.write(0x0200, 0x12);
    cpu.main_bus.write(0x0300, 0x77); // must not be used
    assert_eq!(cpu.step(), 5);
    assert_eq!(cpu.r_pc, 0x1234);
  }

  #[test]
  fn adc_signed_overflow() {
    let mut cpu = cpu_with_program(&[0xA9, 0x50, 0x69, 0x50]);
    cpu.step();
    cpu.step();
    assert_eq!(cpu.r_a, 0xA0);
    assert!(cpu.flag.get_at(flag_const::OVERFLOW));
    assert!(cpu.flag.get_at(flag_const::NEGATIVE));
    assert!(!cpu.flag.get_at(flag_const::CARRY));
  }

  #[test]
  fn sbc_borrow_clears_carry() {
    // SEC; LDA #$40; SBC #$41
    let mut cpu = cpu_with_program(&[0x38, 0xA9, 0x40, 0xE9, 0x41]);
    cpu.step();
    cpu.step();
    cpu.step();
    assert_eq!(cpu.r_a, 0xFF);
    assert!(!cpu.flag.get_at(flag_const::CARRY));
    assert!(cpu.flag.get_at(flag_const::NEGATIVE));
  }

  #[test]
  fn brk_pushes_status_with_b_set() {
    // BRK lands on the IRQ vector with B set on the pushed copy only.
    let mut cpu = cpu_with_program(&[0x00, 0xEA, 0xEA]);
    assert_eq!(cpu.step(), 7);
    assert_eq!(cpu.r_pc, 0xA000);
    assert!(cpu.flag.get_at(flag_const::INTERRUPT));
    let pushed_flags = cpu.main_bus.read(0x0100 | (cpu.r_sp as Address + 1));
    assert!(bit_eq(pushed_flags, 1 << 4));
    // Stored status never carries B.
    assert!(!bit_eq(cpu.get_flag(), 1 << 4));
  }

  #[test]
  fn nmi_takes_priority_and_costs_seven_cycles() {
    let mut cpu = cpu_with_program(&[0xEA]);
    cpu.pending_nmi = true;
    cpu.pending_irq = true;
    assert_eq!(cpu.step(), 7);
    assert_eq!(cpu.r_pc, 0x9000);
    assert!(cpu.flag.get_at(flag_const::INTERRUPT));
  }

  #[test]
  fn irq_respects_the_interrupt_disable_flag() {
    let mut cpu = cpu_with_program(&[0xEA, 0x58, 0xEA]);
    cpu.pending_irq = true;
    cpu.step(); // NOP, I still set from reset
    assert_eq!(cpu.r_pc, 0x8001);
    cpu.step(); // CLI
    cpu.pending_irq = true;
    assert_eq!(cpu.step(), 7);
    assert_eq!(cpu.r_pc, 0xA000);
  }

  #[test]
  fn lax_loads_both_registers() {
    let mut cpu = cpu_with_program(&[0xA7, 0x10]);
    cpu.main_bus.write(0x0010, 0x55);
    assert_eq!(cpu.step(), 3);
    assert_eq!(cpu.r_a, 0x55);
    assert_eq!(cpu.r_x, 0x55);
  }

  #[test]
  fn dcp_decrements_then_compares() {
    // LDA #$40; DCP $10 with mem = $41 -> mem $40, Z and C set.
    let mut cpu = cpu_with_program(&[0xA9, 0x40, 0xC7, 0x10]);
    cpu.main_bus.write(0x0010, 0x41);
    cpu.step();
    assert_eq!(cpu.step(), 5);
    assert_eq!(cpu.main_bus.read(0x0010), 0x40);
    assert!(cpu.flag.get_at(flag_const::ZERO));
    assert!(cpu.flag.get_at(flag_const::CARRY));
  }

  #[test]
  fn unimplemented_opcodes_advance_pc_by_operand_width() {
    // $8B is a two-byte no-op, $9C a three-byte one.
    let mut cpu = cpu_with_program(&[0x8B, 0xFF, 0x9C, 0xAA, 0xBB, 0xA9, 0x07]);
    assert_eq!(cpu.step(), 2);
    assert_eq!(cpu.r_pc, 0x8002);
    assert_eq!(cpu.step(), 5);
    assert_eq!(cpu.r_pc, 0x8005);
    cpu.step();
    assert_eq!(cpu.r_a, 0x07);
  }

  #[test]
  fn oam_dma_costs_513_or_514_cycles() {
    // LDA #$02; STA $4014 from an even cycle, then again after the odd
    // 513-cycle stall has flipped the running parity.
    let mut cpu = cpu_with_program(&[
      0xA9, 0x02, 0x8D, 0x14, 0x40, //
      0xEA, //
      0xA9, 0x02, 0x8D, 0x14, 0x40,
    ]);
    cpu.step();
    let even_start = cpu.step();
    assert_eq!(even_start, 4 + 513);
    cpu.step();
    cpu.step();
    let odd_start = cpu.step();
    assert_eq!(odd_start, 4 + 514);
  }
}
