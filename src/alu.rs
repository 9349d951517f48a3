//! Register to register arithmetic. Results wrap around at 256.

use crate::memory::Byte;
use crate::processor::Instruction;
use crate::registers::{Flags, Registers};
use crate::{Error, Result};

/// Applies the ALU instruction `op` to registers `a` and `b`.
///
/// `ADD`, `SUB` and `MUL` store their result in `a`. `CMP` only updates `flags`.
///
/// # Errors
///
/// [`Error::UnsupportedOperation`] for any instruction that is not handled by
/// the ALU, whatever its operands. [`Error::InvalidRegister`] if `a` or `b`
/// is not a register.
pub fn apply(
    op: Instruction,
    a: Byte,
    b: Byte,
    registers: &mut Registers,
    flags: &mut Flags,
) -> Result<()> {
    let operation: fn(Byte, Byte) -> Byte = match op {
        Instruction::ADD => Byte::wrapping_add,
        Instruction::SUB => Byte::wrapping_sub,
        Instruction::MUL => Byte::wrapping_mul,
        Instruction::CMP => {
            let equal = registers.read(a)? == registers.read(b)?;
            flags.set_equal(equal);
            return Ok(());
        }
        _ => return Err(Error::UnsupportedOperation(op)),
    };

    let result = operation(registers.read(a)?, registers.read(b)?);
    registers.write(a, result)
}
