use std::fs;
use std::path::Path;
use std::str::FromStr;

use color_eyre::eyre::{eyre, Result as EyreResult, WrapErr};

use crate::{Error, Result};

pub mod parse;

pub type Byte = u8; // 1 byte

/// Size of the LS-8 address space
pub const RAM_SIZE: usize = 256;

/// Default memory
pub type Ram = Memory<RAM_SIZE>;

/// Emulates memory for use with the CPU. Holds both code and data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Memory<const S: usize> {
    /// The actual data of the memory
    pub data: [Byte; S],
}

impl<const S: usize> Default for Memory<S> {
    /// Initializes the memory
    fn default() -> Self {
        Memory { data: [0; S] }
    }
}

impl<const S: usize> Memory<S> {
    /// Reads a byte from the memory
    pub fn read_byte(&self, position: usize) -> Result<Byte> {
        self.data
            .get(position)
            .copied()
            .ok_or(Error::OutOfBounds { address: position })
    }

    /// Writes a byte to the memory
    pub fn write_byte(&mut self, position: usize, value: Byte) -> Result<()> {
        let cell = self
            .data
            .get_mut(position)
            .ok_or(Error::OutOfBounds { address: position })?;
        *cell = value;

        Ok(())
    }

    /// Writes an array of bytes to the memory
    pub fn write_array(&mut self, position: usize, data: &[Byte]) -> Result<()> {
        let end = position + data.len();
        if end > S {
            return Err(Error::OutOfBounds { address: end - 1 });
        }

        self.data[position..end].copy_from_slice(data);

        Ok(())
    }

    /// Places a program image at address `0`. Every cell after the image is zeroed.
    pub fn load(&mut self, program: &[Byte]) -> Result<()> {
        *self = Self::default();
        self.write_array(0, program)
    }

    /// Builds a memory holding `program` at address `0`
    pub fn with_program(program: &[Byte]) -> Result<Self> {
        let mut memory = Self::default();
        memory.load(program)?;
        Ok(memory)
    }

    /// Parses the program file at `path` into a fresh memory
    pub fn from_file<P: AsRef<Path>>(path: P) -> EyreResult<Self> {
        let path = path.as_ref();
        let data = fs::read_to_string(path)
            .wrap_err_with(|| format!("Failed to read program `{}`", path.display()))?;

        data.parse::<Self>().map_err(|errors: Vec<parse::ParseError>| {
            let errors = errors
                .iter()
                .map(|err| err.to_string())
                .collect::<Vec<_>>()
                .join("\n");
            eyre!("Failed to parse program `{}`:\n{}", path.display(), errors)
        })
    }

    /// Logs the memory as rows of 16 bytes, skipping rows that are all zero
    pub fn dump(&self) {
        for (row, chunk) in self.data.chunks(16).enumerate() {
            if chunk.iter().all(|&byte| byte == 0) {
                continue;
            }

            let bytes = chunk
                .iter()
                .map(|byte| format!("{:02X}", byte))
                .collect::<Vec<_>>()
                .join(" ");
            log::debug!("{:02X}: {}", row * 16, bytes);
        }
    }
}

impl<const S: usize> FromStr for Memory<S> {
    type Err = Vec<parse::ParseError>;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        parse::Parser::new(s, Self::default()).parse()
    }
}

/// Writes a block of instructions directly into the memory
#[macro_export]
macro_rules! write_instructions {
    ( $mem:ident : $pos:expr => $( $byte:expr ),+ ) => {
        $mem.write_array($pos, &[
            $(
                $byte as $crate::memory::Byte,
            )+
        ])
    };
}
