use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

use djvm_rs::{disasm, Cpu, Outcome};

#[derive(Parser, Debug)]
#[command(author, version, about = "Run an assembled DJ machine word file")]
struct Opts {
    /// Word format of the input file
    #[arg(short, long, value_enum, default_value_t = Format::Bin)]
    format: Format,
    /// Stop before executing this instruction index
    #[arg(short = 'b', long = "break-at")]
    break_at: Option<u32>,
    /// Assembled word file, one word per line
    input: PathBuf,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Format {
    Bin,
    Dec,
    Hex,
}

impl Format {
    fn parse_word(self, line: &str) -> Result<u32> {
        let radix = match self {
            Format::Bin => 2,
            Format::Dec => 10,
            Format::Hex => 16,
        };
        u32::from_str_radix(line.trim(), radix).with_context(|| format!("bad word `{line}`"))
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let opts = Opts::parse();
    let text = fs::read_to_string(&opts.input)
        .with_context(|| format!("cannot read input file {}", opts.input.display()))?;
    let program: Vec<u32> = text
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(|l| opts.format.parse_word(l))
        .collect::<Result<_>>()?;

    let mut cpu = Cpu::new();
    // Step cap in case a future control-flow model makes this loop.
    for _ in 0..1_000_000u64 {
        let Some(&word) = program.get(cpu.pc as usize) else {
            break;
        };
        if opts.break_at == Some(cpu.pc) {
            break;
        }
        if let Some(text) = disasm::fmt_word(word) {
            debug!(pc = cpu.pc, %text, "exec");
        }
        match cpu.step(word) {
            Ok(Outcome::Executed) => {}
            Ok(Outcome::Unexecuted(mnemonic)) => {
                warn!(mnemonic, "no defined execution semantics, skipped");
            }
            Err(trap) => {
                eprintln!("TRAP: {trap}");
                break;
            }
        }
    }

    for (i, v) in cpu.gpr.iter().enumerate() {
        if *v != 0 {
            println!("r{i} = {v}");
        }
    }
    println!("pc = {}", cpu.pc);
    Ok(())
}
