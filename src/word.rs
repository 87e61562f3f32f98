use std::fmt;

use serde::{Deserialize, Serialize};

/// Bit layout of a machine word, most significant first:
/// opcode(4) . rd(6) . rs(6) . rt(6) . imm(10) = 32 bits.
pub const OPCODE_SHIFT: u32 = 28;
pub const RD_SHIFT: u32 = 22;
pub const RS_SHIFT: u32 = 16;
pub const RT_SHIFT: u32 = 10;

pub const REG_MASK: u32 = 0x3F;
pub const OPCODE_MASK: u32 = 0xF;
pub const IMM_MASK: u32 = 0x3FF;

pub const REG_MAX: i64 = 63;
pub const IMM_MIN: i64 = -512;
pub const IMM_MAX: i64 = 511;

/// Branch targets travel in a 6-bit register slot, stored two's-complement.
pub const TARGET_MIN: i64 = -32;
pub const TARGET_MAX: i64 = 31;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Field {
    Opcode,
    Rd,
    Rs,
    Rt,
    Imm,
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Field::Opcode => "opcode",
            Field::Rd => "rd",
            Field::Rs => "rs",
            Field::Rt => "rt",
            Field::Imm => "imm",
        };
        f.write_str(name)
    }
}

#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("value {value} does not fit in the {field} field")]
pub struct FieldOverflow {
    pub field: Field,
    pub value: i64,
}

/// The four operand fields plus opcode of one machine word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fields {
    pub opcode: u8,
    pub rd: u8,
    pub rs: u8,
    pub rt: u8,
    pub imm: i16,
}

impl Fields {
    pub fn with_opcode(opcode: u8) -> Self {
        Self {
            opcode,
            rd: 0,
            rs: 0,
            rt: 0,
            imm: 0,
        }
    }
}

/// Packs the fields into one 32-bit word. Out-of-range fields are an
/// error, never truncated.
pub fn encode(f: Fields) -> Result<u32, FieldOverflow> {
    let check = |field, value: i64, min: i64, max: i64| {
        if value < min || value > max {
            Err(FieldOverflow { field, value })
        } else {
            Ok(())
        }
    };
    check(Field::Opcode, f.opcode as i64, 0, OPCODE_MASK as i64)?;
    check(Field::Rd, f.rd as i64, 0, REG_MAX)?;
    check(Field::Rs, f.rs as i64, 0, REG_MAX)?;
    check(Field::Rt, f.rt as i64, 0, REG_MAX)?;
    check(Field::Imm, f.imm as i64, IMM_MIN, IMM_MAX)?;

    Ok(((f.opcode as u32) << OPCODE_SHIFT)
        | ((f.rd as u32) << RD_SHIFT)
        | ((f.rs as u32) << RS_SHIFT)
        | ((f.rt as u32) << RT_SHIFT)
        | ((f.imm as u32) & IMM_MASK))
}

/// Pure bit-field extraction, the exact inverse of [`encode`].
pub fn decode(word: u32) -> Fields {
    Fields {
        opcode: ((word >> OPCODE_SHIFT) & OPCODE_MASK) as u8,
        rd: ((word >> RD_SHIFT) & REG_MASK) as u8,
        rs: ((word >> RS_SHIFT) & REG_MASK) as u8,
        rt: ((word >> RT_SHIFT) & REG_MASK) as u8,
        imm: sign_extend(word & IMM_MASK, 10) as i16,
    }
}

/// Reads a 6-bit register slot as a signed branch displacement.
pub fn signed_target(raw: u8) -> i32 {
    sign_extend(raw as u32, 6)
}

#[inline]
fn sign_extend(v: u32, bits: u32) -> i32 {
    let s = 32 - bits;
    (v << s) as i32 >> s
}
