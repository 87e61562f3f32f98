use crate::isa::{self, Op};
use crate::word::{self, signed_target};

/// Renders a word back to source-order assembly text, or `None` when
/// the opcode has no table entry. Branch targets print as signed
/// displacements; `st` prints value register first, matching the
/// source syntax rather than the field order.
pub fn fmt_word(word: u32) -> Option<String> {
    let f = word::decode(word);
    let desc = isa::by_opcode(f.opcode)?;
    let text = match desc.op {
        Op::Nop => desc.mnemonic.to_string(),
        Op::Add | Op::Sub => format!("{} r{}, r{}, r{}", desc.mnemonic, f.rd, f.rs, f.rt),
        Op::Inc | Op::Neg | Op::Ld => format!("{} r{}, r{}", desc.mnemonic, f.rd, f.rs),
        Op::Ldpc => format!("{} r{}, {}", desc.mnemonic, f.rd, f.imm),
        Op::St => format!("{} r{}, r{}", desc.mnemonic, f.rt, f.rs),
        Op::J | Op::Brz | Op::Jm | Op::Brn => {
            format!("{} {:+}", desc.mnemonic, signed_target(f.rs))
        }
    };
    Some(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asm::assemble;
    use pretty_assertions::assert_eq;

    fn round(source: &str) -> String {
        fmt_word(assemble(source).unwrap()[0]).unwrap()
    }

    #[test]
    fn renders_source_order() {
        assert_eq!(round("add r1, r2, r3"), "add r1, r2, r3");
        assert_eq!(round("st r2, r3"), "st r2, r3");
        assert_eq!(round("ldpc r4, -7"), "ldpc r4, -7");
        assert_eq!(round("nop"), "nop");
    }

    #[test]
    fn renders_branch_displacements_signed() {
        assert_eq!(round("l: j l"), "j -1");
        assert_eq!(round("brz 3"), "brz +3");
    }

    #[test]
    fn unknown_opcode_renders_nothing() {
        assert_eq!(fmt_word(0b0010u32 << 28), None);
    }
}
