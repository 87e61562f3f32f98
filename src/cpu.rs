use serde::Serialize;
use tracing::trace;

use crate::isa::{self, Op};
use crate::word;

pub const NUM_REGISTERS: usize = 64;

/// Register machine state: a program counter in instruction-index units
/// and 64 signed general-purpose registers. Only defined semantics
/// mutate the register file; the assembler never touches this.
#[derive(Debug, Clone, Serialize)]
pub struct Cpu {
    pub pc: u32,
    #[serde(serialize_with = "<[i32]>::serialize")]
    pub gpr: [i32; NUM_REGISTERS],
}

impl Default for Cpu {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trap {
    #[error("unknown opcode in word {word:#010x}")]
    UnknownOpcode { word: u32 },
}

/// What a step did. Instructions whose execution model was never
/// defined upstream (`ld`, `st` and the branch family) come back as
/// `Unexecuted` without mutating anything; wiring them up needs a
/// condition/addressing model that does not exist yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Executed,
    Unexecuted(&'static str),
}

impl Cpu {
    pub fn new() -> Self {
        Self {
            pc: 0,
            gpr: [0; NUM_REGISTERS],
        }
    }

    pub fn reset(&mut self, pc: u32) {
        self.pc = pc;
        self.gpr = [0; NUM_REGISTERS];
    }

    /// Decodes one word and applies its semantics. The pc advances
    /// before execution, so `ldpc` observes the index of the next
    /// instruction. All arithmetic is wrapping 32-bit signed.
    pub fn step(&mut self, word: u32) -> Result<Outcome, Trap> {
        let f = word::decode(word);
        let desc = isa::by_opcode(f.opcode).ok_or(Trap::UnknownOpcode { word })?;
        self.pc = self.pc.wrapping_add(1);
        trace!(pc = self.pc, mnemonic = desc.mnemonic, "step");

        let (rd, rs, rt) = (f.rd as usize, f.rs as usize, f.rt as usize);
        match desc.op {
            Op::Nop => {}
            Op::Add => self.gpr[rd] = self.gpr[rs].wrapping_add(self.gpr[rt]),
            Op::Sub => self.gpr[rd] = self.gpr[rs].wrapping_sub(self.gpr[rt]),
            Op::Inc => self.gpr[rd] = self.gpr[rs].wrapping_add(1),
            Op::Neg => self.gpr[rd] = self.gpr[rs].wrapping_neg(),
            Op::Ldpc => self.gpr[rd] = (self.pc as i32).wrapping_add(f.imm as i32),
            Op::Ld | Op::St | Op::J | Op::Brz | Op::Jm | Op::Brn => {
                return Ok(Outcome::Unexecuted(desc.mnemonic));
            }
        }
        Ok(Outcome::Executed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asm::assemble;
    use pretty_assertions::assert_eq;

    fn one(source: &str) -> u32 {
        let words = assemble(source).unwrap();
        assert_eq!(words.len(), 1);
        words[0]
    }

    #[test]
    fn add_sub_inc_neg() {
        let mut cpu = Cpu::new();
        cpu.gpr[2] = 7;
        cpu.gpr[3] = 5;
        assert_eq!(cpu.step(one("add r1, r2, r3")), Ok(Outcome::Executed));
        assert_eq!(cpu.gpr[1], 12);
        assert_eq!(cpu.step(one("sub r4, r2, r3")), Ok(Outcome::Executed));
        assert_eq!(cpu.gpr[4], 2);
        assert_eq!(cpu.step(one("inc r5, r2")), Ok(Outcome::Executed));
        assert_eq!(cpu.gpr[5], 8);
        assert_eq!(cpu.step(one("neg r6, r3")), Ok(Outcome::Executed));
        assert_eq!(cpu.gpr[6], -5);
    }

    #[test]
    fn arithmetic_wraps_on_overflow() {
        let mut cpu = Cpu::new();
        cpu.gpr[1] = i32::MAX;
        cpu.step(one("inc r2, r1")).unwrap();
        assert_eq!(cpu.gpr[2], i32::MIN);

        cpu.gpr[3] = i32::MIN;
        cpu.step(one("neg r4, r3")).unwrap();
        assert_eq!(cpu.gpr[4], i32::MIN);
    }

    #[test]
    fn ldpc_adds_immediate_to_advanced_pc() {
        let mut cpu = Cpu::new();
        cpu.pc = 9;
        cpu.step(one("ldpc r1, -3")).unwrap();
        assert_eq!(cpu.pc, 10);
        assert_eq!(cpu.gpr[1], 7);
    }

    #[test]
    fn nop_mutates_nothing_but_pc() {
        let mut cpu = Cpu::new();
        cpu.gpr[0] = 42;
        let before = cpu.gpr;
        cpu.step(one("nop")).unwrap();
        assert_eq!(cpu.gpr, before);
        assert_eq!(cpu.pc, 1);
    }

    #[test]
    fn undefined_instructions_come_back_unexecuted() {
        let mut cpu = Cpu::new();
        cpu.gpr[1] = 11;
        let before = cpu.gpr;
        for (source, mnemonic) in [
            ("ld r2, r1", "ld"),
            ("st r1, r2", "st"),
            ("j -1", "j"),
            ("brz 3", "brz"),
            ("jm 0", "jm"),
            ("brn -2", "brn"),
        ] {
            let outcome = cpu.step(one(source)).unwrap();
            assert_eq!(outcome, Outcome::Unexecuted(mnemonic));
        }
        assert_eq!(cpu.gpr, before);
    }

    #[test]
    fn unknown_opcode_traps() {
        let mut cpu = Cpu::new();
        let word = 0b0001u32 << 28;
        assert_eq!(cpu.step(word), Err(Trap::UnknownOpcode { word }));
        assert_eq!(cpu.pc, 0);
    }
}
