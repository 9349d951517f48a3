use crate::memory::Byte;
use crate::{Error, Result};

/// Number of general purpose registers
pub const REGISTER_COUNT: usize = 8;

/// Register reserved as the stack pointer
pub const SP: Byte = 7;

/// Initial value of the stack pointer. The stack grows down from here.
pub const STACK_START: Byte = 0xF4;

/// The general purpose registers `R0`-`R7`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Registers([Byte; REGISTER_COUNT]);

impl Default for Registers {
    /// All registers start at zero, except the stack pointer
    fn default() -> Self {
        let mut registers = [0; REGISTER_COUNT];
        registers[SP as usize] = STACK_START;
        Self(registers)
    }
}

impl Registers {
    /// Reads register `index`, as found in an instruction operand
    pub fn read(&self, index: Byte) -> Result<Byte> {
        self.0
            .get(index as usize)
            .copied()
            .ok_or(Error::InvalidRegister(index))
    }

    /// Writes register `index`, as found in an instruction operand
    pub fn write(&mut self, index: Byte, value: Byte) -> Result<()> {
        let register = self
            .0
            .get_mut(index as usize)
            .ok_or(Error::InvalidRegister(index))?;
        *register = value;

        Ok(())
    }

    /// Current stack pointer
    pub fn sp(&self) -> Byte {
        self.0[SP as usize]
    }

    /// Sets the stack pointer
    pub fn set_sp(&mut self, value: Byte) {
        self.0[SP as usize] = value;
    }

    pub fn as_slice(&self) -> &[Byte] {
        &self.0
    }
}

/// The flags register. Only the lowest bit is in use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Flags(Byte);

impl Flags {
    /// Set by `CMP` when both operands were equal
    pub const EQUAL: Byte = 0b0000_0001;

    pub fn equal(&self) -> bool {
        self.0 & Self::EQUAL != 0
    }

    /// Replaces the whole register. The unused bits stay zero.
    pub fn set_equal(&mut self, equal: bool) {
        self.0 = if equal { Self::EQUAL } else { 0 };
    }

    pub fn bits(&self) -> Byte {
        self.0
    }
}
