use serde::{Deserialize, Serialize};

use crate::word::{
    Field, FieldOverflow, Fields, IMM_MAX, IMM_MIN, REG_MAX, TARGET_MAX, TARGET_MIN,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Op {
    Nop,
    Add,
    Sub,
    Inc,
    Neg,
    Ldpc,
    Ld,
    St,
    J,
    Brz,
    Jm,
    Brn,
}

/// What an operand position accepts in source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperandKind {
    Reg,
    Value,
}

/// A parsed operand. Labels arrive here already resolved to a
/// PC-relative displacement, so they are plain `Imm` values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operand {
    Reg(u32),
    Imm(i64),
}

impl Operand {
    fn value(self) -> i64 {
        match self {
            Operand::Reg(r) => r as i64,
            Operand::Imm(v) => v,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct InstrDesc {
    pub op: Op,
    pub mnemonic: &'static str,
    pub opcode: u8,
    pub operands: &'static [OperandKind],
}

use OperandKind::{Reg, Value};

pub const TABLE: &[InstrDesc] = &[
    InstrDesc {
        op: Op::Nop,
        mnemonic: "nop",
        opcode: 0b0000,
        operands: &[],
    },
    InstrDesc {
        op: Op::Add,
        mnemonic: "add",
        opcode: 0b0100,
        operands: &[Reg, Reg, Reg],
    },
    InstrDesc {
        op: Op::Sub,
        mnemonic: "sub",
        opcode: 0b0111,
        operands: &[Reg, Reg, Reg],
    },
    InstrDesc {
        op: Op::Inc,
        mnemonic: "inc",
        opcode: 0b0101,
        operands: &[Reg, Reg],
    },
    InstrDesc {
        op: Op::Neg,
        mnemonic: "neg",
        opcode: 0b0110,
        operands: &[Reg, Reg],
    },
    InstrDesc {
        op: Op::Ldpc,
        mnemonic: "ldpc",
        opcode: 0b1111,
        operands: &[Reg, Value],
    },
    InstrDesc {
        op: Op::Ld,
        mnemonic: "ld",
        opcode: 0b1110,
        operands: &[Reg, Reg],
    },
    InstrDesc {
        op: Op::St,
        mnemonic: "st",
        opcode: 0b0011,
        operands: &[Reg, Reg],
    },
    InstrDesc {
        op: Op::J,
        mnemonic: "j",
        opcode: 0b1000,
        operands: &[Value],
    },
    InstrDesc {
        op: Op::Brz,
        mnemonic: "brz",
        opcode: 0b1001,
        operands: &[Value],
    },
    InstrDesc {
        op: Op::Jm,
        mnemonic: "jm",
        opcode: 0b1010,
        operands: &[Value],
    },
    InstrDesc {
        op: Op::Brn,
        mnemonic: "brn",
        opcode: 0b1011,
        operands: &[Value],
    },
];

pub fn by_mnemonic(name: &str) -> Option<&'static InstrDesc> {
    TABLE.iter().find(|d| d.mnemonic.eq_ignore_ascii_case(name))
}

pub fn by_opcode(opcode: u8) -> Option<&'static InstrDesc> {
    TABLE.iter().find(|d| d.opcode == opcode)
}

impl InstrDesc {
    /// Maps source-order operands onto word fields. Not positional for
    /// every entry: `st` puts its first operand (the value register) in
    /// rt and its second (the address register) in rs, and the
    /// branch/jump family carries its target in rs.
    ///
    /// Callers must have checked arity against [`InstrDesc::operands`].
    pub fn map_fields(&self, args: &[Operand]) -> Result<Fields, FieldOverflow> {
        let mut f = Fields::with_opcode(self.opcode);
        match self.op {
            Op::Nop => {}
            Op::Add | Op::Sub => {
                f.rd = reg(args[0], Field::Rd)?;
                f.rs = reg(args[1], Field::Rs)?;
                f.rt = reg(args[2], Field::Rt)?;
            }
            Op::Inc | Op::Neg | Op::Ld => {
                f.rd = reg(args[0], Field::Rd)?;
                f.rs = reg(args[1], Field::Rs)?;
            }
            Op::Ldpc => {
                f.rd = reg(args[0], Field::Rd)?;
                f.imm = imm(args[1])?;
            }
            Op::St => {
                f.rt = reg(args[0], Field::Rt)?;
                f.rs = reg(args[1], Field::Rs)?;
            }
            Op::J | Op::Brz | Op::Jm | Op::Brn => {
                f.rs = target(args[0], Field::Rs)?;
            }
        }
        Ok(f)
    }

    /// Whether [`crate::cpu::Cpu::step`] has defined semantics for this
    /// instruction. The control-flow and memory entries encode fine but
    /// their execution model was never pinned down upstream.
    pub fn executable(&self) -> bool {
        !matches!(
            self.op,
            Op::Ld | Op::St | Op::J | Op::Brz | Op::Jm | Op::Brn
        )
    }
}

fn reg(arg: Operand, field: Field) -> Result<u8, FieldOverflow> {
    let value = arg.value();
    if (0..=REG_MAX).contains(&value) {
        Ok(value as u8)
    } else {
        Err(FieldOverflow { field, value })
    }
}

fn imm(arg: Operand) -> Result<i16, FieldOverflow> {
    let value = arg.value();
    if (IMM_MIN..=IMM_MAX).contains(&value) {
        Ok(value as i16)
    } else {
        Err(FieldOverflow {
            field: Field::Imm,
            value,
        })
    }
}

// Displacements are signed but live in an unsigned 6-bit slot; store
// the two's-complement bit pattern.
fn target(arg: Operand, field: Field) -> Result<u8, FieldOverflow> {
    let value = arg.value();
    if (TARGET_MIN..=TARGET_MAX).contains(&value) {
        Ok((value as i8 as u8) & 0x3F)
    } else {
        Err(FieldOverflow { field, value })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn mnemonic_lookup_is_case_insensitive() {
        assert_eq!(by_mnemonic("ADD").map(|d| d.op), Some(Op::Add));
        assert_eq!(by_mnemonic("LdPc").map(|d| d.op), Some(Op::Ldpc));
        assert!(by_mnemonic("frobnicate").is_none());
    }

    #[test]
    fn opcode_lookup_covers_table() {
        for desc in TABLE {
            assert_eq!(by_opcode(desc.opcode).map(|d| d.op), Some(desc.op));
        }
        for unused in [0b0001, 0b0010, 0b1100, 0b1101] {
            assert!(by_opcode(unused).is_none());
        }
    }

    #[test]
    fn st_swaps_value_and_address_registers() {
        let desc = by_mnemonic("st").unwrap();
        let f = desc
            .map_fields(&[Operand::Reg(2), Operand::Reg(3)])
            .unwrap();
        assert_eq!((f.rd, f.rs, f.rt), (0, 3, 2));
    }

    #[test]
    fn jump_target_lands_in_rs_twos_complement() {
        let desc = by_mnemonic("j").unwrap();
        let f = desc.map_fields(&[Operand::Imm(-2)]).unwrap();
        assert_eq!(f.rs, 0b111110);
        assert_eq!((f.rd, f.rt, f.imm), (0, 0, 0));
    }

    #[test]
    fn jump_target_out_of_range_overflows() {
        let desc = by_mnemonic("brz").unwrap();
        let err = desc.map_fields(&[Operand::Imm(40)]).unwrap_err();
        assert_eq!(err.field, Field::Rs);
        assert_eq!(err.value, 40);
    }

    #[test]
    fn register_index_out_of_range_overflows() {
        let desc = by_mnemonic("inc").unwrap();
        let err = desc
            .map_fields(&[Operand::Reg(64), Operand::Reg(0)])
            .unwrap_err();
        assert_eq!(err.field, Field::Rd);
        assert_eq!(err.value, 64);
    }
}
