use crate::common::Byte;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddrMode {
  Implied,
  Accumulator,
  Immediate,
  ZeroPage,
  ZeroPageX,
  ZeroPageY,
  Absolute,
  AbsoluteX,
  AbsoluteY,
  Indirect,
  IndexedIndirect,
  IndirectIndexed,
  Relative,
}

impl AddrMode {
  /// Operand bytes following the opcode byte.
  pub const fn operand_length(self) -> u16 {
    match self {
      AddrMode::Implied | AddrMode::Accumulator => 0,
      AddrMode::Immediate
      | AddrMode::ZeroPage
      | AddrMode::ZeroPageX
      | AddrMode::ZeroPageY
      | AddrMode::IndexedIndirect
      | AddrMode::IndirectIndexed
      | AddrMode::Relative => 1,
      AddrMode::Absolute | AddrMode::AbsoluteX | AddrMode::AbsoluteY | AddrMode::Indirect => 2,
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
  Adc,
  And,
  Asl,
  Bcc,
  Bcs,
  Beq,
  Bit,
  Bmi,
  Bne,
  Bpl,
  Brk,
  Bvc,
  Bvs,
  Clc,
  Cld,
  Cli,
  Clv,
  Cmp,
  Cpx,
  Cpy,
  Dec,
  Dex,
  Dey,
  Eor,
  Inc,
  Inx,
  Iny,
  Jmp,
  Jsr,
  Lda,
  Ldx,
  Ldy,
  Lsr,
  Nop,
  Ora,
  Pha,
  Php,
  Pla,
  Plp,
  Rol,
  Ror,
  Rti,
  Rts,
  Sbc,
  Sec,
  Sed,
  Sei,
  Sta,
  Stx,
  Sty,
  Tax,
  Tay,
  Tsx,
  Txa,
  Txs,
  Tya,
  // Undocumented opcodes with stable, widely relied-on behavior.
  Lax,
  Sax,
  Dcp,
  Isb,
  Slo,
  Rla,
  Sre,
  Rra,
  // Everything else undocumented: consumes its operand bytes, does nothing.
  Ill,
}

#[derive(Debug, Clone, Copy)]
pub struct OpInfo {
  pub op: Operation,
  pub mode: AddrMode,
  pub cycles: Byte,
  pub page_penalty: bool,
}

impl OpInfo {
  const fn new(op: Operation, mode: AddrMode, cycles: Byte, page_penalty: bool) -> Self {
    Self {
      op,
      mode,
      cycles,
      page_penalty,
    }
  }

  const fn ill(mode: AddrMode, cycles: Byte) -> Self {
    Self::new(Operation::Ill, mode, cycles, false)
  }
}

// Undocumented-opcode policy: opcodes with stable behavior that instruction
// test ROMs exercise (the extra NOPs, LAX, SAX, SBC $EB, DCP, ISB, SLO,
// RLA, SRE, RRA) execute with that documented behavior. The rest, the JAM
// group and the unstable arithmetic ones ($0B/$2B/$4B/$6B/$8B/$AB/$CB,
// $93/$9B/$9C/$9E/$9F, $BB), decode as fixed-cost no-ops of the correct
// byte length so the instruction stream stays aligned. JAM opcodes do not
// halt; they behave as one-byte two-cycle no-ops.
pub const DECODE_TABLE: [OpInfo; 0x100] = {
  use AddrMode::*;
  use Operation::*;
  let mut t = [OpInfo::ill(Implied, 2); 0x100];
  // 0x00
  t[0x00] = OpInfo::new(Brk, Implied, 7, false);
  t[0x01] = OpInfo::new(Ora, IndexedIndirect, 6, false);
  t[0x03] = OpInfo::new(Slo, IndexedIndirect, 8, false);
  t[0x04] = OpInfo::new(Nop, ZeroPage, 3, false);
  t[0x05] = OpInfo::new(Ora, ZeroPage, 3, false);
  t[0x06] = OpInfo::new(Asl, ZeroPage, 5, false);
  t[0x07] = OpInfo::new(Slo, ZeroPage, 5, false);
  t[0x08] = OpInfo::new(Php, Implied, 3, false);
  t[0x09] = OpInfo::new(Ora, Immediate, 2, false);
  t[0x0A] = OpInfo::new(Asl, Accumulator, 2, false);
  t[0x0B] = OpInfo::ill(Immediate, 2);
  t[0x0C] = OpInfo::new(Nop, Absolute, 4, false);
  t[0x0D] = OpInfo::new(Ora, Absolute, 4, false);
  t[0x0E] = OpInfo::new(Asl, Absolute, 6, false);
  t[0x0F] = OpInfo::new(Slo, Absolute, 6, false);
  // 0x10
  t[0x10] = OpInfo::new(Bpl, Relative, 2, false);
  t[0x11] = OpInfo::new(Ora, IndirectIndexed, 5, true);
  t[0x13] = OpInfo::new(Slo, IndirectIndexed, 8, false);
  t[0x14] = OpInfo::new(Nop, ZeroPageX, 4, false);
  t[0x15] = OpInfo::new(Ora, ZeroPageX, 4, false);
  t[0x16] = OpInfo::new(Asl, ZeroPageX, 6, false);
  t[0x17] = OpInfo::new(Slo, ZeroPageX, 6, false);
  t[0x18] = OpInfo::new(Clc, Implied, 2, false);
  t[0x19] = OpInfo::new(Ora, AbsoluteY, 4, true);
  t[0x1A] = OpInfo::new(Nop, Implied, 2, false);
  t[0x1B] = OpInfo::new(Slo, AbsoluteY, 7, false);
  t[0x1C] = OpInfo::new(Nop, AbsoluteX, 4, true);
  t[0x1D] = OpInfo::new(Ora, AbsoluteX, 4, true);
  t[0x1E] = OpInfo::new(Asl, AbsoluteX, 7, false);
  t[0x1F] = OpInfo::new(Slo, AbsoluteX, 7, false);
  // 0x20
  t[0x20] = OpInfo::new(Jsr, Absolute, 6, false);
  t[0x21] = OpInfo::new(And, IndexedIndirect, 6, false);
  t[0x23] = OpInfo::new(Rla, IndexedIndirect, 8, false);
  t[0x24] = OpInfo::new(Bit, ZeroPage, 3, false);
  t[0x25] = OpInfo::new(And, ZeroPage, 3, false);
  t[0x26] = OpInfo::new(Rol, ZeroPage, 5, false);
  t[0x27] = OpInfo::new(Rla, ZeroPage, 5, false);
  t[0x28] = OpInfo::new(Plp, Implied, 4, false);
  t[0x29] = OpInfo::new(And, Immediate, 2, false);
  t[0x2A] = OpInfo::new(Rol, Accumulator, 2, false);
  t[0x2B] = OpInfo::ill(Immediate, 2);
  t[0x2C] = OpInfo::new(Bit, Absolute, 4, false);
  t[0x2D] = OpInfo::new(And, Absolute, 4, false);
  t[0x2E] = OpInfo::new(Rol, Absolute, 6, false);
  t[0x2F] = OpInfo::new(Rla, Absolute, 6, false);
  // 0x30
  t[0x30] = OpInfo::new(Bmi, Relative, 2, false);
  t[0x31] = OpInfo::new(And, IndirectIndexed, 5, true);
  t[0x33] = OpInfo::new(Rla, IndirectIndexed, 8, false);
  t[0x34] = OpInfo::new(Nop, ZeroPageX, 4, false);
  t[0x35] = OpInfo::new(And, ZeroPageX, 4, false);
  t[0x36] = OpInfo::new(Rol, ZeroPageX, 6, false);
  t[0x37] = OpInfo::new(Rla, ZeroPageX, 6, false);
  t[0x38] = OpInfo::new(Sec, Implied, 2, false);
  t[0x39] = OpInfo::new(And, AbsoluteY, 4, true);
  t[0x3A] = OpInfo::new(Nop, Implied, 2, false);
  t[0x3B] = OpInfo::new(Rla, AbsoluteY, 7, false);
  t[0x3C] = OpInfo::new(Nop, AbsoluteX, 4, true);
  t[0x3D] = OpInfo::new(And, AbsoluteX, 4, true);
  t[0x3E] = OpInfo::new(Rol, AbsoluteX, 7, false);
  t[0x3F] = OpInfo::new(Rla, AbsoluteX, 7, false);
  // 0x40
  t[0x40] = OpInfo::new(Rti, Implied, 6, false);
  t[0x41] = OpInfo::new(Eor, IndexedIndirect, 6, false);
  t[0x43] = OpInfo::new(Sre, IndexedIndirect, 8, false);
  t[0x44] = OpInfo::new(Nop, ZeroPage, 3, false);
  t[0x45] = OpInfo::new(Eor, ZeroPage, 3, false);
  t[0x46] = OpInfo::new(Lsr, ZeroPage, 5, false);
  t[0x47] = OpInfo::new(Sre, ZeroPage, 5, false);
  t[0x48] = OpInfo::new(Pha, Implied, 3, false);
  t[0x49] = OpInfo::new(Eor, Immediate, 2, false);
  t[0x4A] = OpInfo::new(Lsr, Accumulator, 2, false);
  t[0x4B] = OpInfo::ill(Immediate, 2);
  t[0x4C] = OpInfo::new(Jmp, Absolute, 3, false);
  t[0x4D] = OpInfo::new(Eor, Absolute, 4, false);
  t[0x4E] = OpInfo::new(Lsr, Absolute, 6, false);
  t[0x4F] = OpInfo::new(Sre, Absolute, 6, false);
  // 0x50
  t[0x50] = OpInfo::new(Bvc, Relative, 2, false);
  t[0x51] = OpInfo::new(Eor, IndirectIndexed, 5, true);
  t[0x53] = OpInfo::new(Sre, IndirectIndexed, 8, false);
  t[0x54] = OpInfo::new(Nop, ZeroPageX, 4, false);
  t[0x55] = OpInfo::new(Eor, ZeroPageX, 4, false);
  t[0x56] = OpInfo::new(Lsr, ZeroPageX, 6, false);
  t[0x57] = OpInfo::new(Sre, ZeroPageX, 6, false);
  t[0x58] = OpInfo::new(Cli, Implied, 2, false);
  t[0x59] = OpInfo::new(Eor, AbsoluteY, 4, true);
  t[0x5A] = OpInfo::new(Nop, Implied, 2, false);
  t[0x5B] = OpInfo::new(Sre, AbsoluteY, 7, false);
  t[0x5C] = OpInfo::new(Nop, AbsoluteX, 4, true);
  t[0x5D] = OpInfo::new(Eor, AbsoluteX, 4, true);
  t[0x5E] = OpInfo::new(Lsr, AbsoluteX, 7, false);
  t[0x5F] = OpInfo::new(Sre, AbsoluteX, 7, false);
  // 0x60
  t[0x60] = OpInfo::new(Rts, Implied, 6, false);
  t[0x61] = OpInfo::new(Adc, IndexedIndirect, 6, false);
  t[0x63] = OpInfo::new(Rra, IndexedIndirect, 8, false);
  t[0x64] = OpInfo::new(Nop, ZeroPage, 3, false);
  t[0x65] = OpInfo::new(Adc, ZeroPage, 3, false);
  t[0x66] = OpInfo::new(Ror, ZeroPage, 5, false);
  t[0x67] = OpInfo::new(Rra, ZeroPage, 5, false);
  t[0x68] = OpInfo::new(Pla, Implied, 4, false);
  t[0x69] = OpInfo::new(Adc, Immediate, 2, false);
  t[0x6A] = OpInfo::new(Ror, Accumulator, 2, false);
  t[0x6B] = OpInfo::ill(Immediate, 2);
  t[0x6C] = OpInfo::new(Jmp, Indirect, 5, false);
  t[0x6D] = OpInfo::new(Adc, Absolute, 4, false);
  t[0x6E] = OpInfo::new(Ror, Absolute, 6, false);
  t[0x6F] = OpInfo::new(Rra, Absolute, 6, false);
  // 0x70
  t[0x70] = OpInfo::new(Bvs, Relative, 2, false);
  t[0x71] = OpInfo::new(Adc, IndirectIndexed, 5, true);
  t[0x73] = OpInfo::new(Rra, IndirectIndexed, 8, false);
  t[0x74] = OpInfo::new(Nop, ZeroPageX, 4, false);
  t[0x75] = OpInfo::new(Adc, ZeroPageX, 4, false);
  t[0x76] = OpInfo::new(Ror, ZeroPageX, 6, false);
  t[0x77] = OpInfo::new(Rra, ZeroPageX, 6, false);
  t[0x78] = OpInfo::new(Sei, Implied, 2, false);
  t[0x79] = OpInfo::new(Adc, AbsoluteY, 4, true);
  t[0x7A] = OpInfo::new(Nop, Implied, 2, false);
  t[0x7B] = OpInfo::new(Rra, AbsoluteY, 7, false);
  t[0x7C] = OpInfo::new(Nop, AbsoluteX, 4, true);
  t[0x7D] = OpInfo::new(Adc, AbsoluteX, 4, true);
  t[0x7E] = OpInfo::new(Ror, AbsoluteX, 7, false);
  t[0x7F] = OpInfo::new(Rra, AbsoluteX, 7, false);
  // 0x80
  t[0x80] = OpInfo::new(Nop, Immediate, 2, false);
  t[0x81] = OpInfo::new(Sta, IndexedIndirect, 6, false);
  t[0x82] = OpInfo::new(Nop, Immediate, 2, false);
  t[0x83] = OpInfo::new(Sax, IndexedIndirect, 6, false);
  t[0x84] = OpInfo::new(Sty, ZeroPage, 3, false);
  t[0x85] = OpInfo::new(Sta, ZeroPage, 3, false);
  t[0x86] = OpInfo::new(Stx, ZeroPage, 3, false);
  t[0x87] = OpInfo::new(Sax, ZeroPage, 3, false);
  t[0x88] = OpInfo::new(Dey, Implied, 2, false);
  t[0x89] = OpInfo::new(Nop, Immediate, 2, false);
  t[0x8A] = OpInfo::new(Txa, Implied, 2, false);
  t[0x8B] = OpInfo::ill(Immediate, 2);
  t[0x8C] = OpInfo::new(Sty, Absolute, 4, false);
  t[0x8D] = OpInfo::new(Sta, Absolute, 4, false);
  t[0x8E] = OpInfo::new(Stx, Absolute, 4, false);
  t[0x8F] = OpInfo::new(Sax, Absolute, 4, false);
  // 0x90
  t[0x90] = OpInfo::new(Bcc, Relative, 2, false);
  t[0x91] = OpInfo::new(Sta, IndirectIndexed, 6, false);
  t[0x93] = OpInfo::ill(IndirectIndexed, 6);
  t[0x94] = OpInfo::new(Sty, ZeroPageX, 4, false);
  t[0x95] = OpInfo::new(Sta, ZeroPageX, 4, false);
  t[0x96] = OpInfo::new(Stx, ZeroPageY, 4, false);
  t[0x97] = OpInfo::new(Sax, ZeroPageY, 4, false);
  t[0x98] = OpInfo::new(Tya, Implied, 2, false);
  t[0x99] = OpInfo::new(Sta, AbsoluteY, 5, false);
  t[0x9A] = OpInfo::new(Txs, Implied, 2, false);
  t[0x9B] = OpInfo::ill(AbsoluteY, 5);
  t[0x9C] = OpInfo::ill(AbsoluteX, 5);
  t[0x9D] = OpInfo::new(Sta, AbsoluteX, 5, false);
  t[0x9E] = OpInfo::ill(AbsoluteY, 5);
  t[0x9F] = OpInfo::ill(AbsoluteY, 5);
  // 0xA0
  t[0xA0] = OpInfo::new(Ldy, Immediate, 2, false);
  t[0xA1] = OpInfo::new(Lda, IndexedIndirect, 6, false);
  t[0xA2] = OpInfo::new(Ldx, Immediate, 2, false);
  t[0xA3] = OpInfo::new(Lax, IndexedIndirect, 6, false);
  t[0xA4] = OpInfo::new(Ldy, ZeroPage, 3, false);
  t[0xA5] = OpInfo::new(Lda, ZeroPage, 3, false);
  t[0xA6] = OpInfo::new(Ldx, ZeroPage, 3, false);
  t[0xA7] = OpInfo::new(Lax, ZeroPage, 3, false);
  t[0xA8] = OpInfo::new(Tay, Implied, 2, false);
  t[0xA9] = OpInfo::new(Lda, Immediate, 2, false);
  t[0xAA] = OpInfo::new(Tax, Implied, 2, false);
  t[0xAB] = OpInfo::ill(Immediate, 2);
  t[0xAC] = OpInfo::new(Ldy, Absolute, 4, false);
  t[0xAD] = OpInfo::new(Lda, Absolute, 4, false);
  t[0xAE] = OpInfo::new(Ldx, Absolute, 4, false);
  t[0xAF] = OpInfo::new(Lax, Absolute, 4, false);
  // 0xB0
  t[0xB0] = OpInfo::new(Bcs, Relative, 2, false);
  t[0xB1] = OpInfo::new(Lda, IndirectIndexed, 5, true);
  t[0xB3] = OpInfo::new(Lax, IndirectIndexed, 5, true);
  t[0xB4] = OpInfo::new(Ldy, ZeroPageX, 4, false);
  t[0xB5] = OpInfo::new(Lda, ZeroPageX, 4, false);
  t[0xB6] = OpInfo::new(Ldx, ZeroPageY, 4, false);
  t[0xB7] = OpInfo::new(Lax, ZeroPageY, 4, false);
  t[0xB8] = OpInfo::new(Clv, Implied, 2, false);
  t[0xB9] = OpInfo::new(Lda, AbsoluteY, 4, true);
  t[0xBA] = OpInfo::new(Tsx, Implied, 2, false);
  t[0xBB] = OpInfo::ill(AbsoluteY, 4);
  t[0xBC] = OpInfo::new(Ldy, AbsoluteX, 4, true);
  t[0xBD] = OpInfo::new(Lda, AbsoluteX, 4, true);
  t[0xBE] = OpInfo::new(Ldx, AbsoluteY, 4, true);
  t[0xBF] = OpInfo::new(Lax, AbsoluteY, 4, true);
  // 0xC0
  t[0xC0] = OpInfo::new(Cpy, Immediate, 2, false);
  t[0xC1] = OpInfo::new(Cmp, IndexedIndirect, 6, false);
  t[0xC2] = OpInfo::new(Nop, Immediate, 2, false);
  t[0xC3] = OpInfo::new(Dcp, IndexedIndirect, 8, false);
  t[0xC4] = OpInfo::new(Cpy, ZeroPage, 3, false);
  t[0xC5] = OpInfo::new(Cmp, ZeroPage, 3, false);
  t[0xC6] = OpInfo::new(Dec, ZeroPage, 5, false);
  t[0xC7] = OpInfo::new(Dcp, ZeroPage, 5, false);
  t[0xC8] = OpInfo::new(Iny, Implied, 2, false);
  t[0xC9] = OpInfo::new(Cmp, Immediate, 2, false);
  t[0xCA] = OpInfo::new(Dex, Implied, 2, false);
  t[0xCB] = OpInfo::ill(Immediate, 2);
  t[0xCC] = OpInfo::new(Cpy, Absolute, 4, false);
  t[0xCD] = OpInfo::new(Cmp, Absolute, 4, false);
  t[0xCE] = OpInfo::new(Dec, Absolute, 6, false);
  t[0xCF] = OpInfo::new(Dcp, Absolute, 6, false);
  // 0xD0
  t[0xD0] = OpInfo::new(Bne, Relative, 2, false);
  t[0xD1] = OpInfo::new(Cmp, IndirectIndexed, 5, true);
  t[0xD3] = OpInfo::new(Dcp, IndirectIndexed, 8, false);
  t[0xD4] = OpInfo::new(Nop, ZeroPageX, 4, false);
  t[0xD5] = OpInfo::new(Cmp, ZeroPageX, 4, false);
  t[0xD6] = OpInfo::new(Dec, ZeroPageX, 6, false);
  t[0xD7] = OpInfo::new(Dcp, ZeroPageX, 6, false);
  t[0xD8] = OpInfo::new(Cld, Implied, 2, false);
  t[0xD9] = OpInfo::new(Cmp, AbsoluteY, 4, true);
  t[0xDA] = OpInfo::new(Nop, Implied, 2, false);
  t[0xDB] = OpInfo::new(Dcp, AbsoluteY, 7, false);
  t[0xDC] = OpInfo::new(Nop, AbsoluteX, 4, true);
  t[0xDD] = OpInfo::new(Cmp, AbsoluteX, 4, true);
  t[0xDE] = OpInfo::new(Dec, AbsoluteX, 7, false);
  t[0xDF] = OpInfo::new(Dcp, AbsoluteX, 7, false);
  // 0xE0
  t[0xE0] = OpInfo::new(Cpx, Immediate, 2, false);
  t[0xE1] = OpInfo::new(Sbc, IndexedIndirect, 6, false);
  t[0xE2] = OpInfo::new(Nop, Immediate, 2, false);
  t[0xE3] = OpInfo::new(Isb, IndexedIndirect, 8, false);
  t[0xE4] = OpInfo::new(Cpx, ZeroPage, 3, false);
  t[0xE5] = OpInfo::new(Sbc, ZeroPage, 3, false);
  t[0xE6] = OpInfo::new(Inc, ZeroPage, 5, false);
  t[0xE7] = OpInfo::new(Isb, ZeroPage, 5, false);
  t[0xE8] = OpInfo::new(Inx, Implied, 2, false);
  t[0xE9] = OpInfo::new(Sbc, Immediate, 2, false);
  t[0xEA] = OpInfo::new(Nop, Implied, 2, false);
  t[0xEB] = OpInfo::new(Sbc, Immediate, 2, false);
  t[0xEC] = OpInfo::new(Cpx, Absolute, 4, false);
  t[0xED] = OpInfo::new(Sbc, Absolute, 4, false);
  t[0xEE] = OpInfo::new(Inc, Absolute, 6, false);
  t[0xEF] = OpInfo::new(Isb, Absolute, 6, false);
  // 0xF0
  t[0xF0] = OpInfo::new(Beq, Relative, 2, false);
  t[0xF1] = OpInfo::new(Sbc, IndirectIndexed, 5, true);
  t[0xF3] = OpInfo::new(Isb, IndirectIndexed, 8, false);
  t[0xF4] = OpInfo::new(Nop, ZeroPageX, 4, false);
  t[0xF5] = OpInfo::new(Sbc, ZeroPageX, 4, false);
  t[0xF6] = OpInfo::new(Inc, ZeroPageX, 6, false);
  t[0xF7] = OpInfo::new(Isb, ZeroPageX, 6, false);
  t[0xF8] = OpInfo::new(Sed, Implied, 2, false);
  t[0xF9] = OpInfo::new(Sbc, AbsoluteY, 4, true);
  t[0xFA] = OpInfo::new(Nop, Implied, 2, false);
  t[0xFB] = OpInfo::new(Isb, AbsoluteY, 7, false);
  t[0xFC] = OpInfo::new(Nop, AbsoluteX, 4, true);
  t[0xFD] = OpInfo::new(Sbc, AbsoluteX, 4, true);
  t[0xFE] = OpInfo::new(Inc, AbsoluteX, 7, false);
  t[0xFF] = OpInfo::new(Isb, AbsoluteX, 7, false);
  t
};
