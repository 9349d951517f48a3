//! Program files hold one byte per line, written in base 2:
//!
//! ```text
//! # print8.ls8
//! 10000010 # LDI R0,8
//! 00000000
//! 00001000
//! 01000111 # PRN R0
//! 00000000
//! 00000001 # HLT
//! ```

use std::borrow::Cow;
use std::error;
use std::{fmt, str::Lines};

use super::{Byte, Memory};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseErrorKind {
    InvalidAddress { address: usize },
    InvalidNumber { radix: u32 },
}

impl fmt::Display for ParseErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseErrorKind::InvalidAddress { address } => {
                write!(f, "memory has no address `0x{:x}`", address)
            }
            ParseErrorKind::InvalidNumber { radix } => {
                write!(f, "failed to parse number with radix `{}`", radix)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    kind: ParseErrorKind,
    context: Option<Cow<'static, str>>,
    line_nr: usize,
}

impl ParseError {
    fn new<C, S>(kind: ParseErrorKind, context: C, line_nr: usize) -> Self
    where
        C: Into<Option<S>>,
        S: Into<Cow<'static, str>>,
    {
        Self {
            kind,
            context: context.into().map(|inner| inner.into()),
            line_nr,
        }
    }

    pub fn kind(&self) -> ParseErrorKind {
        self.kind
    }

    pub fn line_nr(&self) -> usize {
        self.line_nr
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(context) = &self.context {
            write!(
                f,
                "error [ln: {}]: {} - {}",
                self.line_nr, self.kind, context
            )
        } else {
            write!(f, "error [ln: {}]: {}", self.line_nr, self.kind)
        }
    }
}

impl error::Error for ParseError {}

pub type Result<T, E = ParseError> = std::result::Result<T, E>;

const RADIX: u32 = 2;

#[derive(Debug, Clone)]
pub struct Parser<'a, const S: usize> {
    lines: Lines<'a>,
    line_nr: usize,
    position: usize,
    memory: Memory<S>,
}

impl<'a, const S: usize> Parser<'a, S> {
    /// Creates a new parser for `data` which will try to populate `memory`
    /// starting at address `0`.
    pub fn new(data: &'a str, memory: Memory<S>) -> Self {
        Self {
            lines: data.lines(),
            line_nr: 0,
            position: 0,
            memory,
        }
    }

    /// Consumes `self` and tries to parse all lines into memory.
    ///
    /// # Errors
    ///
    /// All errors which may occur are collected and returned at the end.
    pub fn parse(mut self) -> Result<Memory<S>, Vec<ParseError>> {
        let mut errors = Vec::new();

        while let Some(res) = self.parse_next_line() {
            if let Err(err) = res {
                log::error!("{}", err);
                errors.push(err);
            }
        }

        if errors.is_empty() {
            log::debug!("Parsed {} bytes", self.position);
            Ok(self.memory)
        } else {
            Err(errors)
        }
    }

    /// Tries to parse the next line. Everything after a `#` is a comment,
    /// lines left empty are skipped.
    fn parse_next_line(&mut self) -> Option<Result<()>> {
        let line = self.lines.next()?;
        self.line_nr += 1;

        let line = match line.find('#') {
            Some(start) => &line[..start],
            None => line,
        }
        .trim();

        if line.is_empty() {
            Some(Ok(()))
        } else {
            Some(self.parse_byte(line))
        }
    }

    /// Tries to parse `line` as one base 2 byte literal.
    ///
    /// # Examples
    ///
    /// - `10000010`
    /// - `1`
    fn parse_byte(&mut self, line: &str) -> Result<()> {
        let byte = Byte::from_str_radix(line, RADIX).map_err(|_| {
            ParseError::new(
                ParseErrorKind::InvalidNumber { radix: RADIX },
                format!("`{}` is not an 8 bit binary literal", line),
                self.line_nr,
            )
        })?;

        log::debug!("[{}] Found byte 0b{:08b}", self.line_nr, byte);

        self.write_byte(byte)
    }

    /// Writes `byte` into memory at [`Parser::position`], then moves the
    /// position on by one.
    ///
    /// # Errors
    ///
    /// This will return an error if the program does not fit into memory.
    fn write_byte(&mut self, byte: Byte) -> Result<()> {
        if self.position >= S {
            return Err(ParseError::new(
                ParseErrorKind::InvalidAddress {
                    address: self.position,
                },
                "program is larger than memory",
                self.line_nr,
            ));
        }

        self.memory.data[self.position] = byte;
        self.position += 1;

        Ok(())
    }
}
