pub mod asm;
pub mod cpu;
pub mod disasm;
pub mod isa;
pub mod word;

pub use asm::{assemble, AsmError};
pub use cpu::{Cpu, Outcome, Trap};
