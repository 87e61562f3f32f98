use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use tracing_subscriber::EnvFilter;

use djvm_rs::asm::{first_pass, second_pass};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Assemble DJ machine source into 32-bit words"
)]
struct Opts {
    /// Output text format, one word per line
    #[arg(short, long, value_enum, default_value_t = Format::Bin)]
    format: Format,
    /// Dump intermediate assembler state
    #[arg(short, long)]
    verbose: bool,
    /// Assembly source file
    input: PathBuf,
    /// Output file
    #[arg(default_value = "out.bin")]
    output: PathBuf,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Format {
    Bin,
    Dec,
    Hex,
}

impl Format {
    fn render(self, word: u32) -> String {
        match self {
            Format::Bin => format!("{word:032b}"),
            Format::Dec => format!("{word:09}"),
            Format::Hex => format!("{word:08x}"),
        }
    }
}

fn main() -> Result<()> {
    let opts = Opts::parse();
    let filter = if opts.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env()
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let source = fs::read_to_string(&opts.input)
        .with_context(|| format!("cannot read input file {}", opts.input.display()))?;

    let fp = first_pass(&source)?;
    if opts.verbose {
        eprintln!("first pass: {}", serde_json::to_string_pretty(&fp)?);
    }
    let program = second_pass(&fp)?;
    if opts.verbose {
        eprintln!(
            "instructions: {}",
            serde_json::to_string_pretty(&program.instructions)?
        );
    }

    let rendered: Vec<String> = program.words.iter().map(|&w| opts.format.render(w)).collect();
    fs::write(&opts.output, rendered.join("\n"))
        .with_context(|| format!("cannot write output file {}", opts.output.display()))?;
    Ok(())
}
