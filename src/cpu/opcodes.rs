//! Opcode dispatch.
//!
//! The regular instruction families are decoded from their bit patterns
//! over the register vector {B, C, D, E, H, L, (HL), A}; the irregular
//! remainder gets individual arms. Every arm returns the T-cycles consumed,
//! including the branch-taken penalties of conditional control flow.

use super::{Cpu, FLAG_C, FLAG_H, FLAG_N, FLAG_Z};
use crate::memory::Memory;

impl Cpu {
    pub(super) fn execute(&mut self, opcode: u8, memory: &mut Memory) -> u32 {
        match opcode {
            0x00 => 4, // NOP

            // STOP: the operand byte is consumed, nothing else is modeled
            0x10 => {
                self.fetch(memory);
                4
            }

            // LD rr, d16
            0x01 | 0x11 | 0x21 | 0x31 => {
                let value = self.fetch_word(memory);
                self.set_pair(opcode >> 4, value);
                12
            }

            // LD (BC/DE), A and LD A, (BC/DE)
            0x02 => {
                memory.write(self.bc(), self.a);
                8
            }
            0x12 => {
                memory.write(self.de(), self.a);
                8
            }
            0x0A => {
                self.a = memory.read(self.bc());
                8
            }
            0x1A => {
                self.a = memory.read(self.de());
                8
            }

            // LD (HL+/-), A and LD A, (HL+/-)
            0x22 => {
                let hl = self.hl();
                memory.write(hl, self.a);
                self.set_hl(hl.wrapping_add(1));
                8
            }
            0x32 => {
                let hl = self.hl();
                memory.write(hl, self.a);
                self.set_hl(hl.wrapping_sub(1));
                8
            }
            0x2A => {
                let hl = self.hl();
                self.a = memory.read(hl);
                self.set_hl(hl.wrapping_add(1));
                8
            }
            0x3A => {
                let hl = self.hl();
                self.a = memory.read(hl);
                self.set_hl(hl.wrapping_sub(1));
                8
            }

            // INC rr / DEC rr (no flags)
            0x03 | 0x13 | 0x23 | 0x33 => {
                let index = opcode >> 4;
                self.set_pair(index, self.pair(index).wrapping_add(1));
                8
            }
            0x0B | 0x1B | 0x2B | 0x3B => {
                let index = opcode >> 4;
                self.set_pair(index, self.pair(index).wrapping_sub(1));
                8
            }

            // INC r / DEC r
            0x04 | 0x0C | 0x14 | 0x1C | 0x24 | 0x2C | 0x34 | 0x3C => {
                let index = (opcode >> 3) & 0x07;
                let value = self.get_reg(index, memory);
                let result = self.inc(value);
                self.set_reg(index, result, memory);
                if index == 6 {
                    12
                } else {
                    4
                }
            }
            0x05 | 0x0D | 0x15 | 0x1D | 0x25 | 0x2D | 0x35 | 0x3D => {
                let index = (opcode >> 3) & 0x07;
                let value = self.get_reg(index, memory);
                let result = self.dec(value);
                self.set_reg(index, result, memory);
                if index == 6 {
                    12
                } else {
                    4
                }
            }

            // LD r, d8
            0x06 | 0x0E | 0x16 | 0x1E | 0x26 | 0x2E | 0x36 | 0x3E => {
                let index = (opcode >> 3) & 0x07;
                let value = self.fetch(memory);
                self.set_reg(index, value, memory);
                if index == 6 {
                    12
                } else {
                    8
                }
            }

            // Accumulator rotates; unlike the CB forms, Z is forced clear
            0x07 => {
                self.a = self.rlc(self.a);
                self.set_flag(FLAG_Z, false);
                4
            }
            0x0F => {
                self.a = self.rrc(self.a);
                self.set_flag(FLAG_Z, false);
                4
            }
            0x17 => {
                self.a = self.rl(self.a);
                self.set_flag(FLAG_Z, false);
                4
            }
            0x1F => {
                self.a = self.rr(self.a);
                self.set_flag(FLAG_Z, false);
                4
            }

            // LD (a16), SP
            0x08 => {
                let addr = self.fetch_word(memory);
                memory.write(addr, self.sp as u8);
                memory.write(addr.wrapping_add(1), (self.sp >> 8) as u8);
                20
            }

            // ADD HL, rr
            0x09 | 0x19 | 0x29 | 0x39 => {
                self.add_hl(self.pair(opcode >> 4));
                8
            }

            // JR e8
            0x18 => {
                let offset = self.fetch(memory) as i8;
                self.pc = self.pc.wrapping_add(offset as u16);
                12
            }
            // JR cc, e8
            0x20 | 0x28 | 0x30 | 0x38 => {
                let offset = self.fetch(memory) as i8;
                if self.condition((opcode >> 3) & 0x03) {
                    self.pc = self.pc.wrapping_add(offset as u16);
                    12
                } else {
                    8
                }
            }

            0x27 => {
                self.daa();
                4
            }
            0x2F => {
                // CPL
                self.a = !self.a;
                self.set_flag(FLAG_N, true);
                self.set_flag(FLAG_H, true);
                4
            }
            0x37 => {
                // SCF
                self.set_flag(FLAG_N, false);
                self.set_flag(FLAG_H, false);
                self.set_flag(FLAG_C, true);
                4
            }
            0x3F => {
                // CCF
                self.set_flag(FLAG_N, false);
                self.set_flag(FLAG_H, false);
                let carry = self.flag(FLAG_C);
                self.set_flag(FLAG_C, !carry);
                4
            }

            0x76 => {
                // HALT: suspend until an enabled interrupt is requested
                self.halted = true;
                4
            }

            // LD r, r'
            0x40..=0x7F => {
                let dest = (opcode >> 3) & 0x07;
                let src = opcode & 0x07;
                let value = self.get_reg(src, memory);
                self.set_reg(dest, value, memory);
                if src == 6 || dest == 6 {
                    8
                } else {
                    4
                }
            }

            // ADD/ADC/SUB/SBC/AND/XOR/OR/CP A, r
            0x80..=0xBF => {
                let src = opcode & 0x07;
                let value = self.get_reg(src, memory);
                self.alu_op((opcode >> 3) & 0x07, value);
                if src == 6 {
                    8
                } else {
                    4
                }
            }
            // The same eight operations with an immediate operand
            0xC6 | 0xCE | 0xD6 | 0xDE | 0xE6 | 0xEE | 0xF6 | 0xFE => {
                let value = self.fetch(memory);
                self.alu_op((opcode >> 3) & 0x07, value);
                8
            }

            // RET / RETI / RET cc
            0xC9 => {
                self.pc = self.pop_word(memory);
                16
            }
            0xD9 => {
                self.ime = true;
                self.pc = self.pop_word(memory);
                16
            }
            0xC0 | 0xC8 | 0xD0 | 0xD8 => {
                if self.condition((opcode >> 3) & 0x03) {
                    self.pc = self.pop_word(memory);
                    20
                } else {
                    8
                }
            }

            // POP rr / PUSH rr (AF in the SP slot)
            0xC1 | 0xD1 | 0xE1 | 0xF1 => {
                let value = self.pop_word(memory);
                match (opcode >> 4) & 0x03 {
                    0 => self.set_bc(value),
                    1 => self.set_de(value),
                    2 => self.set_hl(value),
                    _ => self.set_af(value),
                }
                12
            }
            0xC5 | 0xD5 | 0xE5 | 0xF5 => {
                let value = match (opcode >> 4) & 0x03 {
                    0 => self.bc(),
                    1 => self.de(),
                    2 => self.hl(),
                    _ => self.af(),
                };
                self.push_word(memory, value);
                16
            }

            // JP a16 / JP cc, a16 / JP (HL)
            0xC3 => {
                self.pc = self.fetch_word(memory);
                16
            }
            0xC2 | 0xCA | 0xD2 | 0xDA => {
                let addr = self.fetch_word(memory);
                if self.condition((opcode >> 3) & 0x03) {
                    self.pc = addr;
                    16
                } else {
                    12
                }
            }
            0xE9 => {
                self.pc = self.hl();
                4
            }

            // CALL a16 / CALL cc, a16
            0xCD => {
                let addr = self.fetch_word(memory);
                self.push_word(memory, self.pc);
                self.pc = addr;
                24
            }
            0xC4 | 0xCC | 0xD4 | 0xDC => {
                let addr = self.fetch_word(memory);
                if self.condition((opcode >> 3) & 0x03) {
                    self.push_word(memory, self.pc);
                    self.pc = addr;
                    24
                } else {
                    12
                }
            }

            // RST: the vector is encoded in the opcode
            0xC7 | 0xCF | 0xD7 | 0xDF | 0xE7 | 0xEF | 0xF7 | 0xFF => {
                self.push_word(memory, self.pc);
                self.pc = (opcode & 0x38) as u16;
                16
            }

            // LDH (a8), A / LDH A, (a8) / LD (C), A / LD A, (C)
            0xE0 => {
                let offset = self.fetch(memory);
                memory.write(0xFF00 | offset as u16, self.a);
                12
            }
            0xF0 => {
                let offset = self.fetch(memory);
                self.a = memory.read(0xFF00 | offset as u16);
                12
            }
            0xE2 => {
                memory.write(0xFF00 | self.c as u16, self.a);
                8
            }
            0xF2 => {
                self.a = memory.read(0xFF00 | self.c as u16);
                8
            }

            // LD (a16), A / LD A, (a16)
            0xEA => {
                let addr = self.fetch_word(memory);
                memory.write(addr, self.a);
                16
            }
            0xFA => {
                let addr = self.fetch_word(memory);
                self.a = memory.read(addr);
                16
            }

            // ADD SP, e8: flags come from 8-bit carry out of the low byte
            0xE8 => {
                let offset = self.fetch(memory) as i8 as i16 as u16;
                self.set_sp_offset_flags(offset);
                self.sp = self.sp.wrapping_add(offset);
                16
            }
            // LD HL, SP + e8: same flag semantics
            0xF8 => {
                let offset = self.fetch(memory) as i8 as i16 as u16;
                self.set_sp_offset_flags(offset);
                self.set_hl(self.sp.wrapping_add(offset));
                12
            }
            0xF9 => {
                self.sp = self.hl();
                8
            }

            0xF3 => {
                // DI takes effect immediately
                self.ime = false;
                self.ime_pending = false;
                4
            }
            0xFB => {
                // EI takes effect after the next instruction
                self.ime_pending = true;
                4
            }

            0xCB => {
                let cb_opcode = self.fetch(memory);
                self.execute_cb(cb_opcode, memory)
            }

            _ => {
                // 0xD3, 0xDB, 0xDD, 0xE3, 0xE4, 0xEB-0xED, 0xF4, 0xFC, 0xFD
                log::warn!(
                    "unknown opcode {:#04X} at {:#06X}",
                    opcode,
                    self.pc.wrapping_sub(1)
                );
                4
            }
        }
    }

    /// CB-prefixed instructions: rotate/shift, BIT, RES, SET over the
    /// register vector.
    fn execute_cb(&mut self, opcode: u8, memory: &mut Memory) -> u32 {
        let reg = opcode & 0x07;
        let op_type = opcode >> 3;
        let value = self.get_reg(reg, memory);
        let is_hl = reg == 6;

        let result = match op_type {
            0x00 => self.rlc(value),
            0x01 => self.rrc(value),
            0x02 => self.rl(value),
            0x03 => self.rr(value),
            0x04 => self.sla(value),
            0x05 => self.sra(value),
            0x06 => self.swap(value),
            0x07 => self.srl(value),
            0x08..=0x0F => {
                // BIT n: test only, C preserved, no writeback
                let bit = op_type - 0x08;
                self.set_flag(FLAG_Z, value & (1 << bit) == 0);
                self.set_flag(FLAG_N, false);
                self.set_flag(FLAG_H, true);
                return if is_hl { 12 } else { 8 };
            }
            0x10..=0x17 => value & !(1 << (op_type - 0x10)), // RES n
            _ => value | (1 << (op_type - 0x18)),            // SET n
        };

        self.set_reg(reg, result, memory);
        if is_hl {
            16
        } else {
            8
        }
    }

    /// ALU operation over the accumulator, selected by bits 5..3 of the
    /// opcode: ADD, ADC, SUB, SBC, AND, XOR, OR, CP.
    #[inline]
    fn alu_op(&mut self, index: u8, value: u8) {
        match index & 0x07 {
            0 => self.add(value),
            1 => self.adc(value),
            2 => self.sub(value),
            3 => self.sbc(value),
            4 => self.and(value),
            5 => self.xor(value),
            6 => self.or(value),
            _ => self.cp(value),
        }
    }

    /// Branch condition selected by bits 4..3: NZ, Z, NC, C.
    #[inline]
    fn condition(&self, index: u8) -> bool {
        match index & 0x03 {
            0 => !self.flag(FLAG_Z),
            1 => self.flag(FLAG_Z),
            2 => !self.flag(FLAG_C),
            _ => self.flag(FLAG_C),
        }
    }

    /// Register pair selected by bits 5..4: BC, DE, HL, SP.
    #[inline]
    fn pair(&self, index: u8) -> u16 {
        match index & 0x03 {
            0 => self.bc(),
            1 => self.de(),
            2 => self.hl(),
            _ => self.sp,
        }
    }

    #[inline]
    fn set_pair(&mut self, index: u8, value: u16) {
        match index & 0x03 {
            0 => self.set_bc(value),
            1 => self.set_de(value),
            2 => self.set_hl(value),
            _ => self.sp = value,
        }
    }

    /// Z and N clear; H/C from the 8-bit add of the SP low byte and the
    /// (sign-extended) offset.
    #[inline]
    fn set_sp_offset_flags(&mut self, offset: u16) {
        self.set_flag(FLAG_Z, false);
        self.set_flag(FLAG_N, false);
        self.set_flag(FLAG_H, (self.sp & 0x0F) + (offset & 0x0F) > 0x0F);
        self.set_flag(FLAG_C, (self.sp & 0xFF) + (offset & 0xFF) > 0xFF);
    }
}
