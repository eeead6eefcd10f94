// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! MOS 6502 instruction set and operand encoding.
//!
//! The table covers the 56 documented instructions. Operand text decides
//! the address mode by shape, first match wins: immediate `#`, the three
//! indirect forms, relative for branch instructions, then indexed and
//! direct forms where a zero page encoding is preferred when the operand
//! value fits one byte.
//!
//! References:
//! <https://en.wikipedia.org/wiki/MOS_Technology_6502>
//! <https://www.masswerk.at/6502/6502_instruction_set.html>

use crate::core::context::Context;
use crate::core::eval;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressMode {
    Absolute,
    AbsoluteX,
    AbsoluteY,
    Accumulator,
    Immediate,
    Implied,
    Indirect,
    IndirectX,
    IndirectY,
    Relative,
    ZeroPage,
    ZeroPageX,
    ZeroPageY,
}

pub struct InstructionEntry {
    pub mnemonic: &'static str,
    pub mode: AddressMode,
    pub opcode: u8,
}

/// Instruction table for the documented 6502 instructions.
///
/// The table is small enough that linear search is sufficient.
pub static INSTRUCTION_TABLE: &[InstructionEntry] = &[
    // ADC - Add with Carry
    InstructionEntry {
        mnemonic: "ADC",
        mode: AddressMode::Absolute,
        opcode: 0x6d,
    },
    InstructionEntry {
        mnemonic: "ADC",
        mode: AddressMode::AbsoluteX,
        opcode: 0x7d,
    },
    InstructionEntry {
        mnemonic: "ADC",
        mode: AddressMode::AbsoluteY,
        opcode: 0x79,
    },
    InstructionEntry {
        mnemonic: "ADC",
        mode: AddressMode::Immediate,
        opcode: 0x69,
    },
    InstructionEntry {
        mnemonic: "ADC",
        mode: AddressMode::IndirectX,
        opcode: 0x61,
    },
    InstructionEntry {
        mnemonic: "ADC",
        mode: AddressMode::IndirectY,
        opcode: 0x71,
    },
    InstructionEntry {
        mnemonic: "ADC",
        mode: AddressMode::ZeroPage,
        opcode: 0x65,
    },
    InstructionEntry {
        mnemonic: "ADC",
        mode: AddressMode::ZeroPageX,
        opcode: 0x75,
    },
    // AND - Logical AND
    InstructionEntry {
        mnemonic: "AND",
        mode: AddressMode::Absolute,
        opcode: 0x2d,
    },
    InstructionEntry {
        mnemonic: "AND",
        mode: AddressMode::AbsoluteX,
        opcode: 0x3d,
    },
    InstructionEntry {
        mnemonic: "AND",
        mode: AddressMode::AbsoluteY,
        opcode: 0x39,
    },
    InstructionEntry {
        mnemonic: "AND",
        mode: AddressMode::Immediate,
        opcode: 0x29,
    },
    InstructionEntry {
        mnemonic: "AND",
        mode: AddressMode::IndirectX,
        opcode: 0x21,
    },
    InstructionEntry {
        mnemonic: "AND",
        mode: AddressMode::IndirectY,
        opcode: 0x31,
    },
    InstructionEntry {
        mnemonic: "AND",
        mode: AddressMode::ZeroPage,
        opcode: 0x25,
    },
    InstructionEntry {
        mnemonic: "AND",
        mode: AddressMode::ZeroPageX,
        opcode: 0x35,
    },
    // ASL - Arithmetic Shift Left
    InstructionEntry {
        mnemonic: "ASL",
        mode: AddressMode::Absolute,
        opcode: 0x0e,
    },
    InstructionEntry {
        mnemonic: "ASL",
        mode: AddressMode::AbsoluteX,
        opcode: 0x1e,
    },
    InstructionEntry {
        mnemonic: "ASL",
        mode: AddressMode::Accumulator,
        opcode: 0x0a,
    },
    InstructionEntry {
        mnemonic: "ASL",
        mode: AddressMode::ZeroPage,
        opcode: 0x06,
    },
    InstructionEntry {
        mnemonic: "ASL",
        mode: AddressMode::ZeroPageX,
        opcode: 0x16,
    },
    // BCC - Branch if Carry Clear
    InstructionEntry {
        mnemonic: "BCC",
        mode: AddressMode::Relative,
        opcode: 0x90,
    },
    // BCS - Branch if Carry Set
    InstructionEntry {
        mnemonic: "BCS",
        mode: AddressMode::Relative,
        opcode: 0xb0,
    },
    // BEQ - Branch if Equal
    InstructionEntry {
        mnemonic: "BEQ",
        mode: AddressMode::Relative,
        opcode: 0xf0,
    },
    // BIT - Bit Test
    InstructionEntry {
        mnemonic: "BIT",
        mode: AddressMode::Absolute,
        opcode: 0x2c,
    },
    InstructionEntry {
        mnemonic: "BIT",
        mode: AddressMode::ZeroPage,
        opcode: 0x24,
    },
    // BMI - Branch if Minus
    InstructionEntry {
        mnemonic: "BMI",
        mode: AddressMode::Relative,
        opcode: 0x30,
    },
    // BNE - Branch if Not Equal
    InstructionEntry {
        mnemonic: "BNE",
        mode: AddressMode::Relative,
        opcode: 0xd0,
    },
    // BPL - Branch if Plus
    InstructionEntry {
        mnemonic: "BPL",
        mode: AddressMode::Relative,
        opcode: 0x10,
    },
    // BRK - Force Interrupt
    InstructionEntry {
        mnemonic: "BRK",
        mode: AddressMode::Implied,
        opcode: 0x00,
    },
    // BVC - Branch if Overflow Clear
    InstructionEntry {
        mnemonic: "BVC",
        mode: AddressMode::Relative,
        opcode: 0x50,
    },
    // BVS - Branch if Overflow Set
    InstructionEntry {
        mnemonic: "BVS",
        mode: AddressMode::Relative,
        opcode: 0x70,
    },
    // CLC - Clear Carry Flag
    InstructionEntry {
        mnemonic: "CLC",
        mode: AddressMode::Implied,
        opcode: 0x18,
    },
    // CLD - Clear Decimal Mode
    InstructionEntry {
        mnemonic: "CLD",
        mode: AddressMode::Implied,
        opcode: 0xd8,
    },
    // CLI - Clear Interrupt Disable
    InstructionEntry {
        mnemonic: "CLI",
        mode: AddressMode::Implied,
        opcode: 0x58,
    },
    // CLV - Clear Overflow Flag
    InstructionEntry {
        mnemonic: "CLV",
        mode: AddressMode::Implied,
        opcode: 0xb8,
    },
    // CMP - Compare
    InstructionEntry {
        mnemonic: "CMP",
        mode: AddressMode::Absolute,
        opcode: 0xcd,
    },
    InstructionEntry {
        mnemonic: "CMP",
        mode: AddressMode::AbsoluteX,
        opcode: 0xdd,
    },
    InstructionEntry {
        mnemonic: "CMP",
        mode: AddressMode::AbsoluteY,
        opcode: 0xd9,
    },
    InstructionEntry {
        mnemonic: "CMP",
        mode: AddressMode::Immediate,
        opcode: 0xc9,
    },
    InstructionEntry {
        mnemonic: "CMP",
        mode: AddressMode::IndirectX,
        opcode: 0xc1,
    },
    InstructionEntry {
        mnemonic: "CMP",
        mode: AddressMode::IndirectY,
        opcode: 0xd1,
    },
    InstructionEntry {
        mnemonic: "CMP",
        mode: AddressMode::ZeroPage,
        opcode: 0xc5,
    },
    InstructionEntry {
        mnemonic: "CMP",
        mode: AddressMode::ZeroPageX,
        opcode: 0xd5,
    },
    // CPX - Compare X Register
    InstructionEntry {
        mnemonic: "CPX",
        mode: AddressMode::Absolute,
        opcode: 0xec,
    },
    InstructionEntry {
        mnemonic: "CPX",
        mode: AddressMode::Immediate,
        opcode: 0xe0,
    },
    InstructionEntry {
        mnemonic: "CPX",
        mode: AddressMode::ZeroPage,
        opcode: 0xe4,
    },
    // CPY - Compare Y Register
    InstructionEntry {
        mnemonic: "CPY",
        mode: AddressMode::Absolute,
        opcode: 0xcc,
    },
    InstructionEntry {
        mnemonic: "CPY",
        mode: AddressMode::Immediate,
        opcode: 0xc0,
    },
    InstructionEntry {
        mnemonic: "CPY",
        mode: AddressMode::ZeroPage,
        opcode: 0xc4,
    },
    // DEC - Decrement Memory
    InstructionEntry {
        mnemonic: "DEC",
        mode: AddressMode::Absolute,
        opcode: 0xce,
    },
    InstructionEntry {
        mnemonic: "DEC",
        mode: AddressMode::AbsoluteX,
        opcode: 0xde,
    },
    InstructionEntry {
        mnemonic: "DEC",
        mode: AddressMode::ZeroPage,
        opcode: 0xc6,
    },
    InstructionEntry {
        mnemonic: "DEC",
        mode: AddressMode::ZeroPageX,
        opcode: 0xd6,
    },
    // DEX - Decrement X Register
    InstructionEntry {
        mnemonic: "DEX",
        mode: AddressMode::Implied,
        opcode: 0xca,
    },
    // DEY - Decrement Y Register
    InstructionEntry {
        mnemonic: "DEY",
        mode: AddressMode::Implied,
        opcode: 0x88,
    },
    // EOR - Exclusive OR
    InstructionEntry {
        mnemonic: "EOR",
        mode: AddressMode::Absolute,
        opcode: 0x4d,
    },
    InstructionEntry {
        mnemonic: "EOR",
        mode: AddressMode::AbsoluteX,
        opcode: 0x5d,
    },
    InstructionEntry {
        mnemonic: "EOR",
        mode: AddressMode::AbsoluteY,
        opcode: 0x59,
    },
    InstructionEntry {
        mnemonic: "EOR",
        mode: AddressMode::Immediate,
        opcode: 0x49,
    },
    InstructionEntry {
        mnemonic: "EOR",
        mode: AddressMode::IndirectX,
        opcode: 0x41,
    },
    InstructionEntry {
        mnemonic: "EOR",
        mode: AddressMode::IndirectY,
        opcode: 0x51,
    },
    InstructionEntry {
        mnemonic: "EOR",
        mode: AddressMode::ZeroPage,
        opcode: 0x45,
    },
    InstructionEntry {
        mnemonic: "EOR",
        mode: AddressMode::ZeroPageX,
        opcode: 0x55,
    },
    // INC - Increment Memory
    InstructionEntry {
        mnemonic: "INC",
        mode: AddressMode::Absolute,
        opcode: 0xee,
    },
    InstructionEntry {
        mnemonic: "INC",
        mode: AddressMode::AbsoluteX,
        opcode: 0xfe,
    },
    InstructionEntry {
        mnemonic: "INC",
        mode: AddressMode::ZeroPage,
        opcode: 0xe6,
    },
    InstructionEntry {
        mnemonic: "INC",
        mode: AddressMode::ZeroPageX,
        opcode: 0xf6,
    },
    // INX - Increment X Register
    InstructionEntry {
        mnemonic: "INX",
        mode: AddressMode::Implied,
        opcode: 0xe8,
    },
    // INY - Increment Y Register
    InstructionEntry {
        mnemonic: "INY",
        mode: AddressMode::Implied,
        opcode: 0xc8,
    },
    // JMP - Jump
    InstructionEntry {
        mnemonic: "JMP",
        mode: AddressMode::Absolute,
        opcode: 0x4c,
    },
    InstructionEntry {
        mnemonic: "JMP",
        mode: AddressMode::Indirect,
        opcode: 0x6c,
    },
    // JSR - Jump to Subroutine
    InstructionEntry {
        mnemonic: "JSR",
        mode: AddressMode::Absolute,
        opcode: 0x20,
    },
    // LDA - Load Accumulator
    InstructionEntry {
        mnemonic: "LDA",
        mode: AddressMode::Absolute,
        opcode: 0xad,
    },
    InstructionEntry {
        mnemonic: "LDA",
        mode: AddressMode::AbsoluteX,
        opcode: 0xbd,
    },
    InstructionEntry {
        mnemonic: "LDA",
        mode: AddressMode::AbsoluteY,
        opcode: 0xb9,
    },
    InstructionEntry {
        mnemonic: "LDA",
        mode: AddressMode::Immediate,
        opcode: 0xa9,
    },
    InstructionEntry {
        mnemonic: "LDA",
        mode: AddressMode::IndirectX,
        opcode: 0xa1,
    },
    InstructionEntry {
        mnemonic: "LDA",
        mode: AddressMode::IndirectY,
        opcode: 0xb1,
    },
    InstructionEntry {
        mnemonic: "LDA",
        mode: AddressMode::ZeroPage,
        opcode: 0xa5,
    },
    InstructionEntry {
        mnemonic: "LDA",
        mode: AddressMode::ZeroPageX,
        opcode: 0xb5,
    },
    // LDX - Load X Register
    InstructionEntry {
        mnemonic: "LDX",
        mode: AddressMode::Absolute,
        opcode: 0xae,
    },
    InstructionEntry {
        mnemonic: "LDX",
        mode: AddressMode::AbsoluteY,
        opcode: 0xbe,
    },
    InstructionEntry {
        mnemonic: "LDX",
        mode: AddressMode::Immediate,
        opcode: 0xa2,
    },
    InstructionEntry {
        mnemonic: "LDX",
        mode: AddressMode::ZeroPage,
        opcode: 0xa6,
    },
    InstructionEntry {
        mnemonic: "LDX",
        mode: AddressMode::ZeroPageY,
        opcode: 0xb6,
    },
    // LDY - Load Y Register
    InstructionEntry {
        mnemonic: "LDY",
        mode: AddressMode::Absolute,
        opcode: 0xac,
    },
    InstructionEntry {
        mnemonic: "LDY",
        mode: AddressMode::AbsoluteX,
        opcode: 0xbc,
    },
    InstructionEntry {
        mnemonic: "LDY",
        mode: AddressMode::Immediate,
        opcode: 0xa0,
    },
    InstructionEntry {
        mnemonic: "LDY",
        mode: AddressMode::ZeroPage,
        opcode: 0xa4,
    },
    InstructionEntry {
        mnemonic: "LDY",
        mode: AddressMode::ZeroPageX,
        opcode: 0xb4,
    },
    // LSR - Logical Shift Right
    InstructionEntry {
        mnemonic: "LSR",
        mode: AddressMode::Absolute,
        opcode: 0x4e,
    },
    InstructionEntry {
        mnemonic: "LSR",
        mode: AddressMode::AbsoluteX,
        opcode: 0x5e,
    },
    InstructionEntry {
        mnemonic: "LSR",
        mode: AddressMode::Accumulator,
        opcode: 0x4a,
    },
    InstructionEntry {
        mnemonic: "LSR",
        mode: AddressMode::ZeroPage,
        opcode: 0x46,
    },
    InstructionEntry {
        mnemonic: "LSR",
        mode: AddressMode::ZeroPageX,
        opcode: 0x56,
    },
    // NOP - No Operation
    InstructionEntry {
        mnemonic: "NOP",
        mode: AddressMode::Implied,
        opcode: 0xea,
    },
    // ORA - Logical Inclusive OR
    InstructionEntry {
        mnemonic: "ORA",
        mode: AddressMode::Absolute,
        opcode: 0x0d,
    },
    InstructionEntry {
        mnemonic: "ORA",
        mode: AddressMode::AbsoluteX,
        opcode: 0x1d,
    },
    InstructionEntry {
        mnemonic: "ORA",
        mode: AddressMode::AbsoluteY,
        opcode: 0x19,
    },
    InstructionEntry {
        mnemonic: "ORA",
        mode: AddressMode::Immediate,
        opcode: 0x09,
    },
    InstructionEntry {
        mnemonic: "ORA",
        mode: AddressMode::IndirectX,
        opcode: 0x01,
    },
    InstructionEntry {
        mnemonic: "ORA",
        mode: AddressMode::IndirectY,
        opcode: 0x11,
    },
    InstructionEntry {
        mnemonic: "ORA",
        mode: AddressMode::ZeroPage,
        opcode: 0x05,
    },
    InstructionEntry {
        mnemonic: "ORA",
        mode: AddressMode::ZeroPageX,
        opcode: 0x15,
    },
    // PHA - Push Accumulator
    InstructionEntry {
        mnemonic: "PHA",
        mode: AddressMode::Implied,
        opcode: 0x48,
    },
    // PHP - Push Processor Status
    InstructionEntry {
        mnemonic: "PHP",
        mode: AddressMode::Implied,
        opcode: 0x08,
    },
    // PLA - Pull Accumulator
    InstructionEntry {
        mnemonic: "PLA",
        mode: AddressMode::Implied,
        opcode: 0x68,
    },
    // PLP - Pull Processor Status
    InstructionEntry {
        mnemonic: "PLP",
        mode: AddressMode::Implied,
        opcode: 0x28,
    },
    // ROL - Rotate Left
    InstructionEntry {
        mnemonic: "ROL",
        mode: AddressMode::Absolute,
        opcode: 0x2e,
    },
    InstructionEntry {
        mnemonic: "ROL",
        mode: AddressMode::AbsoluteX,
        opcode: 0x3e,
    },
    InstructionEntry {
        mnemonic: "ROL",
        mode: AddressMode::Accumulator,
        opcode: 0x2a,
    },
    InstructionEntry {
        mnemonic: "ROL",
        mode: AddressMode::ZeroPage,
        opcode: 0x26,
    },
    InstructionEntry {
        mnemonic: "ROL",
        mode: AddressMode::ZeroPageX,
        opcode: 0x36,
    },
    // ROR - Rotate Right
    InstructionEntry {
        mnemonic: "ROR",
        mode: AddressMode::Absolute,
        opcode: 0x6e,
    },
    InstructionEntry {
        mnemonic: "ROR",
        mode: AddressMode::AbsoluteX,
        opcode: 0x7e,
    },
    InstructionEntry {
        mnemonic: "ROR",
        mode: AddressMode::Accumulator,
        opcode: 0x6a,
    },
    InstructionEntry {
        mnemonic: "ROR",
        mode: AddressMode::ZeroPage,
        opcode: 0x66,
    },
    InstructionEntry {
        mnemonic: "ROR",
        mode: AddressMode::ZeroPageX,
        opcode: 0x76,
    },
    // RTI - Return from Interrupt
    InstructionEntry {
        mnemonic: "RTI",
        mode: AddressMode::Implied,
        opcode: 0x40,
    },
    // RTS - Return from Subroutine
    InstructionEntry {
        mnemonic: "RTS",
        mode: AddressMode::Implied,
        opcode: 0x60,
    },
    // SBC - Subtract with Carry
    InstructionEntry {
        mnemonic: "SBC",
        mode: AddressMode::Absolute,
        opcode: 0xed,
    },
    InstructionEntry {
        mnemonic: "SBC",
        mode: AddressMode::AbsoluteX,
        opcode: 0xfd,
    },
    InstructionEntry {
        mnemonic: "SBC",
        mode: AddressMode::AbsoluteY,
        opcode: 0xf9,
    },
    InstructionEntry {
        mnemonic: "SBC",
        mode: AddressMode::Immediate,
        opcode: 0xe9,
    },
    InstructionEntry {
        mnemonic: "SBC",
        mode: AddressMode::IndirectX,
        opcode: 0xe1,
    },
    InstructionEntry {
        mnemonic: "SBC",
        mode: AddressMode::IndirectY,
        opcode: 0xf1,
    },
    InstructionEntry {
        mnemonic: "SBC",
        mode: AddressMode::ZeroPage,
        opcode: 0xe5,
    },
    InstructionEntry {
        mnemonic: "SBC",
        mode: AddressMode::ZeroPageX,
        opcode: 0xf5,
    },
    // SEC - Set Carry Flag
    InstructionEntry {
        mnemonic: "SEC",
        mode: AddressMode::Implied,
        opcode: 0x38,
    },
    // SED - Set Decimal Flag
    InstructionEntry {
        mnemonic: "SED",
        mode: AddressMode::Implied,
        opcode: 0xf8,
    },
    // SEI - Set Interrupt Disable
    InstructionEntry {
        mnemonic: "SEI",
        mode: AddressMode::Implied,
        opcode: 0x78,
    },
    // STA - Store Accumulator
    InstructionEntry {
        mnemonic: "STA",
        mode: AddressMode::Absolute,
        opcode: 0x8d,
    },
    InstructionEntry {
        mnemonic: "STA",
        mode: AddressMode::AbsoluteX,
        opcode: 0x9d,
    },
    InstructionEntry {
        mnemonic: "STA",
        mode: AddressMode::AbsoluteY,
        opcode: 0x99,
    },
    InstructionEntry {
        mnemonic: "STA",
        mode: AddressMode::IndirectX,
        opcode: 0x81,
    },
    InstructionEntry {
        mnemonic: "STA",
        mode: AddressMode::IndirectY,
        opcode: 0x91,
    },
    InstructionEntry {
        mnemonic: "STA",
        mode: AddressMode::ZeroPage,
        opcode: 0x85,
    },
    InstructionEntry {
        mnemonic: "STA",
        mode: AddressMode::ZeroPageX,
        opcode: 0x95,
    },
    // STX - Store X Register
    InstructionEntry {
        mnemonic: "STX",
        mode: AddressMode::Absolute,
        opcode: 0x8e,
    },
    InstructionEntry {
        mnemonic: "STX",
        mode: AddressMode::ZeroPage,
        opcode: 0x86,
    },
    InstructionEntry {
        mnemonic: "STX",
        mode: AddressMode::ZeroPageY,
        opcode: 0x96,
    },
    // STY - Store Y Register
    InstructionEntry {
        mnemonic: "STY",
        mode: AddressMode::Absolute,
        opcode: 0x8c,
    },
    InstructionEntry {
        mnemonic: "STY",
        mode: AddressMode::ZeroPage,
        opcode: 0x84,
    },
    InstructionEntry {
        mnemonic: "STY",
        mode: AddressMode::ZeroPageX,
        opcode: 0x94,
    },
    // TAX - Transfer Accumulator to X
    InstructionEntry {
        mnemonic: "TAX",
        mode: AddressMode::Implied,
        opcode: 0xaa,
    },
    // TAY - Transfer Accumulator to Y
    InstructionEntry {
        mnemonic: "TAY",
        mode: AddressMode::Implied,
        opcode: 0xa8,
    },
    // TSX - Transfer Stack Pointer to X
    InstructionEntry {
        mnemonic: "TSX",
        mode: AddressMode::Implied,
        opcode: 0xba,
    },
    // TXA - Transfer X to Accumulator
    InstructionEntry {
        mnemonic: "TXA",
        mode: AddressMode::Implied,
        opcode: 0x8a,
    },
    // TXS - Transfer X to Stack Pointer
    InstructionEntry {
        mnemonic: "TXS",
        mode: AddressMode::Implied,
        opcode: 0x9a,
    },
    // TYA - Transfer Y to Accumulator
    InstructionEntry {
        mnemonic: "TYA",
        mode: AddressMode::Implied,
        opcode: 0x98,
    },
];

/// Opcode for a mnemonic in a given address mode. Mnemonics match case
/// insensitively.
pub fn opcode(mnemonic: &str, mode: AddressMode) -> Option<u8> {
    INSTRUCTION_TABLE
        .iter()
        .find(|entry| entry.mode == mode && entry.mnemonic.eq_ignore_ascii_case(mnemonic))
        .map(|entry| entry.opcode)
}

pub fn is_mnemonic(text: &str) -> bool {
    INSTRUCTION_TABLE
        .iter()
        .any(|entry| entry.mnemonic.eq_ignore_ascii_case(text))
}

fn lo(v: u16) -> u8 {
    (v & 0xff) as u8
}

fn hi(v: u16) -> u8 {
    (v >> 8) as u8
}

/// Encode one instruction and store its bytes at the current address.
/// `operand` is the joined operand text after the mnemonic.
pub fn assemble_instruction(mnemonic: &str, operand: &str, ctx: &mut Context) {
    let has = |mode: AddressMode| opcode(mnemonic, mode).is_some();
    let with = |mode: AddressMode| opcode(mnemonic, mode).unwrap_or(0);

    let mut bytes: Vec<u8> = Vec::new();

    if has(AddressMode::Accumulator) && operand.is_empty() {
        bytes.push(with(AddressMode::Accumulator));
    } else if has(AddressMode::Implied) && operand.is_empty() {
        bytes.push(with(AddressMode::Implied));
    } else if has(AddressMode::Immediate) && operand.starts_with('#') {
        let v = eval::byte_expression(&operand[1..], ctx);
        bytes.extend([with(AddressMode::Immediate), v]);
    } else if has(AddressMode::IndirectX) && wrapped(operand, ",x)").is_some() {
        let v = eval::byte_expression(wrapped(operand, ",x)").unwrap_or(""), ctx);
        bytes.extend([with(AddressMode::IndirectX), v]);
    } else if has(AddressMode::IndirectY) && wrapped(operand, "),y").is_some() {
        let v = eval::byte_expression(wrapped(operand, "),y").unwrap_or(""), ctx);
        bytes.extend([with(AddressMode::IndirectY), v]);
    } else if has(AddressMode::Indirect) && wrapped(operand, ")").is_some() {
        let v = eval::word_expression(wrapped(operand, ")").unwrap_or(""), ctx);
        if lo(v) == 0xff {
            // The CPU fetches the high vector byte from the start of the
            // same page.
            ctx.report_warning(format!("Indirect address located on page boundary: ${v:04x}"));
        }
        bytes.extend([with(AddressMode::Indirect), lo(v), hi(v)]);
    } else if has(AddressMode::Relative) {
        let target = eval::word_expression(operand, ctx) as i64;
        let mut distance = target - ctx.location() - 2;
        if !(-128..=127).contains(&distance) {
            ctx.report_error(format!(
                "Branch destination out of range [-128..127]: {distance}"
            ));
            distance = 0;
        }
        bytes.extend([with(AddressMode::Relative), (distance & 0xff) as u8]);
    } else if (has(AddressMode::ZeroPageX) || has(AddressMode::AbsoluteX))
        && operand.ends_with(",x")
    {
        let v = eval::word_expression(&operand[..operand.len() - 2], ctx);
        if has(AddressMode::ZeroPageX) && hi(v) == 0 {
            bytes.extend([with(AddressMode::ZeroPageX), lo(v)]);
        } else if has(AddressMode::AbsoluteX) {
            bytes.extend([with(AddressMode::AbsoluteX), lo(v), hi(v)]);
        }
    } else if (has(AddressMode::ZeroPageY) || has(AddressMode::AbsoluteY))
        && operand.ends_with(",y")
    {
        let v = eval::word_expression(&operand[..operand.len() - 2], ctx);
        if has(AddressMode::ZeroPageY) && hi(v) == 0 {
            bytes.extend([with(AddressMode::ZeroPageY), lo(v)]);
        } else if has(AddressMode::AbsoluteY) {
            bytes.extend([with(AddressMode::AbsoluteY), lo(v), hi(v)]);
        }
    } else if (has(AddressMode::ZeroPage) || has(AddressMode::Absolute)) && !operand.is_empty() {
        let v = eval::word_expression(operand, ctx);
        if has(AddressMode::ZeroPage) && hi(v) == 0 {
            bytes.extend([with(AddressMode::ZeroPage), lo(v)]);
        } else if has(AddressMode::Absolute) {
            bytes.extend([with(AddressMode::Absolute), lo(v), hi(v)]);
        }
    }

    if bytes.is_empty() {
        ctx.report_error(format!(
            "Unknown instruction or address mode: {mnemonic} {operand}"
        ));
    }
    for byte in bytes {
        ctx.store(byte);
    }
}

/// Text between a leading '(' and the given suffix, if both are present.
fn wrapped<'a>(operand: &'a str, suffix: &str) -> Option<&'a str> {
    operand.strip_prefix('(')?.strip_suffix(suffix)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::context::Context;

    fn ctx_at(origin: i64) -> Context {
        let mut ctx = Context::new(Default::default(), Default::default());
        ctx.set_location(origin);
        ctx
    }

    fn emitted(ctx: &Context, origin: u16, count: usize) -> Vec<u8> {
        (0..count as u16)
            .map(|i| ctx.memory.get(&(origin + i)).copied().unwrap_or(0))
            .collect()
    }

    #[test]
    fn table_covers_all_mnemonics() {
        let mut mnemonics: Vec<&str> =
            INSTRUCTION_TABLE.iter().map(|entry| entry.mnemonic).collect();
        mnemonics.dedup();
        assert_eq!(mnemonics.len(), 56);
        assert!(is_mnemonic("lda"));
        assert!(is_mnemonic("LDA"));
        assert!(!is_mnemonic("xxx"));
        assert!(!is_mnemonic(""));
    }

    #[test]
    fn immediate_mode() {
        let mut ctx = ctx_at(0x1000);
        assemble_instruction("lda", "#10", &mut ctx);
        assert_eq!(emitted(&ctx, 0x1000, 2), vec![0xa9, 10]);
        assert!(ctx.errors.is_empty());
    }

    #[test]
    fn zero_page_preferred_over_absolute() {
        let mut ctx = ctx_at(0x1000);
        assemble_instruction("lda", "0x0010", &mut ctx);
        assert_eq!(emitted(&ctx, 0x1000, 2), vec![0xa5, 0x10]);
    }

    #[test]
    fn absolute_when_value_exceeds_zero_page() {
        let mut ctx = ctx_at(0x1000);
        assemble_instruction("lda", "0x1234", &mut ctx);
        assert_eq!(emitted(&ctx, 0x1000, 3), vec![0xad, 0x34, 0x12]);
    }

    #[test]
    fn indexed_and_indirect_modes() {
        let mut ctx = ctx_at(0x1000);
        assemble_instruction("lda", "0x1234,x", &mut ctx);
        assert_eq!(emitted(&ctx, 0x1000, 3), vec![0xbd, 0x34, 0x12]);

        let mut ctx = ctx_at(0x1000);
        assemble_instruction("lda", "(0x20,x)", &mut ctx);
        assert_eq!(emitted(&ctx, 0x1000, 2), vec![0xa1, 0x20]);

        let mut ctx = ctx_at(0x1000);
        assemble_instruction("lda", "(0x20),y", &mut ctx);
        assert_eq!(emitted(&ctx, 0x1000, 2), vec![0xb1, 0x20]);

        let mut ctx = ctx_at(0x1000);
        assemble_instruction("jmp", "(0x1234)", &mut ctx);
        assert_eq!(emitted(&ctx, 0x1000, 3), vec![0x6c, 0x34, 0x12]);
        assert!(ctx.warnings.is_empty());
    }

    #[test]
    fn indirect_on_page_boundary_warns() {
        let mut ctx = ctx_at(0x1000);
        assemble_instruction("jmp", "(0x12ff)", &mut ctx);
        assert_eq!(ctx.warnings.len(), 1);
    }

    #[test]
    fn accumulator_and_implied() {
        let mut ctx = ctx_at(0x1000);
        assemble_instruction("asl", "", &mut ctx);
        assert_eq!(emitted(&ctx, 0x1000, 1), vec![0x0a]);

        let mut ctx = ctx_at(0x1000);
        assemble_instruction("rts", "", &mut ctx);
        assert_eq!(emitted(&ctx, 0x1000, 1), vec![0x60]);
    }

    #[test]
    fn relative_branch_backward() {
        let mut ctx = ctx_at(0x1000);
        assemble_instruction("bne", "0x1000", &mut ctx);
        assert_eq!(emitted(&ctx, 0x1000, 2), vec![0xd0, 0xfe]);
        assert!(ctx.errors.is_empty());
    }

    #[test]
    fn relative_branch_out_of_range() {
        let mut ctx = ctx_at(0x1000);
        assemble_instruction("bne", "0x2000", &mut ctx);
        assert_eq!(emitted(&ctx, 0x1000, 2), vec![0xd0, 0x00]);
        assert_eq!(ctx.errors.len(), 1);
    }

    #[test]
    fn unknown_mode_reports_error() {
        let mut ctx = ctx_at(0x1000);
        assemble_instruction("rts", "5", &mut ctx);
        assert!(ctx.memory.is_empty());
        assert_eq!(ctx.errors.len(), 1);
        assert!(ctx.errors[0].contains("Unknown instruction or address mode"));
    }
}
