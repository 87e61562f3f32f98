use std::collections::BTreeMap;

use serde::Serialize;
use tracing::debug;

use crate::isa::{self, Operand};
use crate::word;

pub const REGISTER_PREFIX: char = 'r';
pub const LABEL_TERMINATOR: char = ':';

/// Every assembly failure is fatal; the first one in line order wins.
/// Lines are 1-based source lines, operand positions 1-based.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum AsmError {
    #[error("line {line}: label `{name}` already defined")]
    DuplicateLabel { name: String, line: usize },
    #[error("line {line}: empty operand {position}")]
    EmptyOperand { line: usize, position: usize },
    #[error("line {line}: operand {position}: malformed register `{token}`")]
    MalformedRegister {
        line: usize,
        position: usize,
        token: String,
    },
    #[error("line {line}: operand {position}: cannot parse `{token}`")]
    MalformedOperand {
        line: usize,
        position: usize,
        token: String,
    },
    #[error("line {line}: unknown mnemonic `{name}`")]
    UnknownMnemonic { line: usize, name: String },
    #[error("line {line}: `{mnemonic}` takes {expected} operand(s), found {found}")]
    WrongOperandCount {
        line: usize,
        mnemonic: String,
        expected: usize,
        found: usize,
    },
    #[error("line {line}: {source}")]
    FieldOverflow {
        line: usize,
        #[source]
        source: word::FieldOverflow,
    },
}

/// One source line after label stripping. `number` is the 1-based
/// position in the original, unfiltered input.
#[derive(Debug, Clone, Serialize)]
pub struct SourceLine {
    pub number: usize,
    pub text: String,
}

/// Pass 1 output: label-stripped lines plus the completed label table
/// (lowercased name -> 1-based line of definition).
#[derive(Debug, Clone, Serialize)]
pub struct FirstPass {
    pub lines: Vec<SourceLine>,
    pub labels: BTreeMap<String, usize>,
}

/// One parsed instruction. `index` is the 0-based position among
/// non-blank lines, the unit branch displacements are measured in.
#[derive(Debug, Clone, Serialize)]
pub struct Instr {
    pub line: usize,
    pub index: usize,
    pub mnemonic: String,
    pub operands: Vec<Operand>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Program {
    pub instructions: Vec<Instr>,
    pub words: Vec<u32>,
}

/// Scans the source, strips `label:` prefixes, and records each label
/// against its line. Labels may be referenced before they are defined,
/// so pass 2 must not start until this completes.
pub fn first_pass(source: &str) -> Result<FirstPass, AsmError> {
    let mut lines = Vec::new();
    let mut labels = BTreeMap::new();

    for (idx, raw) in source.lines().enumerate() {
        let number = idx + 1;
        let mut text = raw.trim();
        if let Some(colon) = text.find(LABEL_TERMINATOR) {
            let name = text[..colon].trim().to_ascii_lowercase();
            if labels.contains_key(&name) {
                return Err(AsmError::DuplicateLabel { name, line: number });
            }
            labels.insert(name, number);
            text = text[colon + 1..].trim();
        }
        lines.push(SourceLine {
            number,
            text: text.to_string(),
        });
    }

    debug!(lines = lines.len(), labels = labels.len(), "first pass done");
    Ok(FirstPass { lines, labels })
}

/// Tokenizes and encodes every non-blank line against the completed
/// label table, strictly in line order.
pub fn second_pass(fp: &FirstPass) -> Result<Program, AsmError> {
    let kept: Vec<&SourceLine> = fp.lines.iter().filter(|l| !l.text.is_empty()).collect();

    // A label names the first instruction at or after its line, as a
    // 0-based index into the filtered sequence. A label past the last
    // instruction points one past the end.
    let targets: BTreeMap<&str, usize> = fp
        .labels
        .iter()
        .map(|(name, line)| {
            let index = kept.iter().filter(|l| l.number < *line).count();
            (name.as_str(), index)
        })
        .collect();

    let mut instructions = Vec::with_capacity(kept.len());
    let mut words = Vec::with_capacity(kept.len());

    for (index, src) in kept.iter().enumerate() {
        let instr = parse_line(src, index, &targets)?;
        words.push(encode_instr(&instr)?);
        instructions.push(instr);
    }

    debug!(words = words.len(), "second pass done");
    Ok(Program {
        instructions,
        words,
    })
}

/// Runs both passes over `source` and returns the machine words in
/// program order.
pub fn assemble(source: &str) -> Result<Vec<u32>, AsmError> {
    let fp = first_pass(source)?;
    Ok(second_pass(&fp)?.words)
}

fn parse_line(
    src: &SourceLine,
    index: usize,
    targets: &BTreeMap<&str, usize>,
) -> Result<Instr, AsmError> {
    let lowered = src.text.to_ascii_lowercase();
    let (mnemonic, rest) = match lowered.split_once(' ') {
        Some((m, r)) => (m, Some(r)),
        None => (lowered.as_str(), None),
    };

    let mut operands = Vec::new();
    if let Some(rest) = rest {
        for (i, token) in rest.split(',').enumerate() {
            let position = i + 1;
            let token = token.trim();
            if token.is_empty() {
                return Err(AsmError::EmptyOperand {
                    line: src.number,
                    position,
                });
            }
            operands.push(classify_token(token, src.number, position, index, targets)?);
        }
    }

    Ok(Instr {
        line: src.number,
        index,
        mnemonic: mnemonic.to_string(),
        operands,
    })
}

/// Token classification order: known label, then register, then
/// integer literal. A label reference becomes the displacement from
/// the instruction after this one to the labelled instruction.
fn classify_token(
    token: &str,
    line: usize,
    position: usize,
    index: usize,
    targets: &BTreeMap<&str, usize>,
) -> Result<Operand, AsmError> {
    if let Some(&target) = targets.get(token) {
        return Ok(Operand::Imm(target as i64 - index as i64 - 1));
    }
    if let Some(digits) = token.strip_prefix(REGISTER_PREFIX) {
        return digits
            .parse::<u32>()
            .map(Operand::Reg)
            .map_err(|_| AsmError::MalformedRegister {
                line,
                position,
                token: token.to_string(),
            });
    }
    token
        .parse::<i64>()
        .map(Operand::Imm)
        .map_err(|_| AsmError::MalformedOperand {
            line,
            position,
            token: token.to_string(),
        })
}

fn encode_instr(instr: &Instr) -> Result<u32, AsmError> {
    let desc = isa::by_mnemonic(&instr.mnemonic).ok_or_else(|| AsmError::UnknownMnemonic {
        line: instr.line,
        name: instr.mnemonic.clone(),
    })?;
    if instr.operands.len() != desc.operands.len() {
        return Err(AsmError::WrongOperandCount {
            line: instr.line,
            mnemonic: instr.mnemonic.clone(),
            expected: desc.operands.len(),
            found: instr.operands.len(),
        });
    }
    let fields = desc
        .map_fields(&instr.operands)
        .map_err(|source| AsmError::FieldOverflow {
            line: instr.line,
            source,
        })?;
    word::encode(fields).map_err(|source| AsmError::FieldOverflow {
        line: instr.line,
        source,
    })
}
