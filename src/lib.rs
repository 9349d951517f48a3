//! An emulator for the LS-8, a tiny 8-bit register machine.
//!
//! Programs are byte images loaded at address `0` of a 256 byte [`Ram`],
//! then run by a [`Processor`] until they fetch `HLT`.
//!
//! [`Ram`]: memory::Ram
//! [`Processor`]: processor::Processor

pub mod alu;
pub mod config;
pub mod memory;
pub mod processor;
pub mod registers;

use memory::Byte;
use processor::Instruction;

/// An error that stops the machine
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("illegal instruction 0x{opcode:02X} at address 0x{address:02X}")]
    IllegalInstruction { opcode: Byte, address: usize },

    #[error("the ALU does not support {0}")]
    UnsupportedOperation(Instruction),

    #[error("address 0x{address:X} is outside of memory")]
    OutOfBounds { address: usize },

    #[error("there is no register R{0}")]
    InvalidRegister(Byte),

    #[error("stack overflow: the stack pointer is already at address 0x00")]
    StackOverflow,

    #[error("stack underflow: the stack pointer is already at address 0xFF")]
    StackUnderflow,

    #[error("program did not halt within {steps} steps")]
    BudgetExhausted { steps: u64 },

    #[error("failed to write program output")]
    Output(#[from] std::io::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
