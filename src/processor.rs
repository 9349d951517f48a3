use std::convert::TryFrom;
use std::io::Write;

use crate::alu;
use crate::memory::{Byte, Memory};
use crate::registers::{Flags, Registers};
use crate::{Error, Result};
use log::*;
use num_enum::IntoPrimitive;
use num_enum::TryFromPrimitive;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum State {
    Running,
    Halted,
}

/// Where execution continues after an instruction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    /// Fall through to the instruction after the operands
    Next,
    /// Continue at an absolute address
    Jump(usize),
    Halt,
}

/// Emulates the LS-8 CPU
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Processor {
    /// Program counter
    pub pc: usize,
    /// General purpose registers, `R7` is the stack pointer
    pub registers: Registers,
    /// Flags register, written by `CMP`
    pub flags: Flags,
    pub state: State,
}

impl Default for Processor {
    /// Initializes a new CPU
    fn default() -> Self {
        Self::new()
    }
}

impl Processor {
    /// Initializes a new CPU that starts executing at address `0`
    pub fn new() -> Self {
        Self {
            pc: 0,
            registers: Registers::default(),
            flags: Flags::default(),
            state: State::Running,
        }
    }

    pub fn is_halted(&self) -> bool {
        self.state == State::Halted
    }

    /// Reads the `n`th operand byte of the instruction at `pc`
    fn operand<const S: usize>(&self, memory: &Memory<S>, n: usize) -> Result<Byte> {
        memory.read_byte(self.pc + n)
    }

    /// Reads the register named by the `n`th operand
    fn register_operand<const S: usize>(&self, memory: &Memory<S>, n: usize) -> Result<Byte> {
        let index = self.operand(memory, n)?;
        self.registers.read(index)
    }

    /// Decrements the stack pointer, then writes the byte picked by `value`
    /// to the new top of the stack. `value` sees the registers after the
    /// decrement, so pushing `R7` stores the new stack pointer.
    fn push<const S: usize, F>(&mut self, memory: &mut Memory<S>, value: F) -> Result<Byte>
    where
        F: FnOnce(&Registers) -> Result<Byte>,
    {
        let mut registers = self.registers;
        let sp = registers.sp().checked_sub(1).ok_or(Error::StackOverflow)?;
        registers.set_sp(sp);

        let value = value(&registers)?;
        memory.write_byte(sp as usize, value)?;
        self.registers = registers;

        Ok(value)
    }

    /// Hands the top of the stack to `store`, then increments the stack
    /// pointer. Popping into `R7` therefore leaves it one past the popped byte.
    fn pop<const S: usize, F>(&mut self, memory: &Memory<S>, store: F) -> Result<Byte>
    where
        F: FnOnce(&mut Registers, Byte) -> Result<()>,
    {
        let mut registers = self.registers;
        let value = memory.read_byte(registers.sp() as usize)?;
        store(&mut registers, value)?;

        let sp = registers.sp().checked_add(1).ok_or(Error::StackUnderflow)?;
        registers.set_sp(sp);
        self.registers = registers;

        Ok(value)
    }

    /// Executes a single instruction. On error neither `pc` nor the
    /// registers have moved.
    pub fn execute_instruction<const S: usize, W: Write>(
        &mut self,
        instruction: Instruction,
        memory: &mut Memory<S>,
        out: &mut W,
    ) -> Result<()> {
        let flow = match instruction {
            Instruction::NOP => {
                debug!("NOP");
                Flow::Next
            }
            Instruction::HLT => {
                debug!("HLT");
                Flow::Halt
            }
            Instruction::LDI => {
                let reg = self.operand(memory, 1)?;
                let value = self.operand(memory, 2)?;
                self.registers.write(reg, value)?;

                debug!("LDI R{},{}", reg, value);
                Flow::Next
            }
            Instruction::PRN => {
                let reg = self.operand(memory, 1)?;
                let value = self.registers.read(reg)?;
                writeln!(out, "{}", value)?;

                debug!("PRN R{}: {}", reg, value);
                Flow::Next
            }
            Instruction::ADD | Instruction::SUB | Instruction::MUL | Instruction::CMP => {
                let a = self.operand(memory, 1)?;
                let b = self.operand(memory, 2)?;
                alu::apply(instruction, a, b, &mut self.registers, &mut self.flags)?;

                debug!("{} R{},R{}", instruction, a, b);
                Flow::Next
            }
            Instruction::PUSH => {
                let reg = self.operand(memory, 1)?;
                let value = self.push(memory, |registers| registers.read(reg))?;

                debug!("PUSH R{}: {} (sp 0x{:02X})", reg, value, self.registers.sp());
                Flow::Next
            }
            Instruction::POP => {
                let reg = self.operand(memory, 1)?;
                let value = self.pop(memory, |registers, value| registers.write(reg, value))?;

                debug!("POP R{}: {} (sp 0x{:02X})", reg, value, self.registers.sp());
                Flow::Next
            }
            Instruction::CALL => {
                let target = self.register_operand(memory, 1)?;
                let return_address = self.pc + instruction.size();
                let value = Byte::try_from(return_address).map_err(|_| Error::OutOfBounds {
                    address: return_address,
                })?;
                self.push(memory, |_| Ok(value))?;

                debug!("CALL 0x{:02X} (return to 0x{:02X})", target, return_address);
                Flow::Jump(target as usize)
            }
            Instruction::RET => {
                let target = self.pop(memory, |_, _| Ok(()))?;

                debug!("RET 0x{:02X}", target);
                Flow::Jump(target as usize)
            }
            Instruction::JMP => {
                let target = self.register_operand(memory, 1)?;

                debug!("JMP 0x{:02X}", target);
                Flow::Jump(target as usize)
            }
            Instruction::JEQ | Instruction::JNE => {
                let target = self.register_operand(memory, 1)?;
                let taken = match instruction {
                    Instruction::JEQ => self.flags.equal(),
                    _ => !self.flags.equal(),
                };

                debug!("{} 0x{:02X}: {}", instruction, target, taken);
                if taken {
                    Flow::Jump(target as usize)
                } else {
                    Flow::Next
                }
            }
        };

        match flow {
            Flow::Next => self.pc += instruction.size(),
            Flow::Jump(address) => self.pc = address,
            Flow::Halt => self.state = State::Halted,
        }

        Ok(())
    }

    /// Runs one execution step
    pub fn execute<const S: usize, W: Write>(
        &mut self,
        memory: &mut Memory<S>,
        out: &mut W,
    ) -> Result<()> {
        let opcode = memory.read_byte(self.pc)?; // Read opcode where PC is
        let instruction = Instruction::try_from(opcode).map_err(|_| Error::IllegalInstruction {
            opcode,
            address: self.pc,
        })?;
        self.execute_instruction(instruction, memory, out)
    }

    /// Runs the program until it halts. Returns the number of executed steps,
    /// including the final `HLT`.
    pub fn execute_until_hlt<const S: usize, W: Write>(
        &mut self,
        memory: &mut Memory<S>,
        out: &mut W,
    ) -> Result<u64> {
        self.execute_with_budget(memory, out, None)
    }

    /// Runs the program until it halts or `max_steps` instructions were
    /// executed without reaching `HLT`.
    pub fn execute_with_budget<const S: usize, W: Write>(
        &mut self,
        memory: &mut Memory<S>,
        out: &mut W,
        max_steps: Option<u64>,
    ) -> Result<u64> {
        let mut steps = 0;

        while !self.is_halted() {
            if let Some(max_steps) = max_steps {
                if steps >= max_steps {
                    return Err(Error::BudgetExhausted { steps });
                }
            }

            if let Err(err) = self.execute(memory, out) {
                error!("Stopped at 0x{:02X} after {} steps: {}", self.pc, steps, err);
                return Err(err);
            }
            steps += 1;
        }

        info!(
            "Program halted at 0x{:02X} after {} steps",
            self.pc, steps
        );

        Ok(steps)
    }
}

macro_rules! instructions {
    ( $( $( #[doc = $doc:expr] )+ $name:ident = $repr:literal , )+ ) => {
        /// The LS-8 instruction set. The two highest bits of an opcode
        /// are the number of operand bytes that follow it.
        #[repr(u8)]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        #[derive(TryFromPrimitive, IntoPrimitive)]
        pub enum Instruction {
            $(
                $( #[doc = $doc] )+
                $name = $repr,
            )+
        }

        impl Instruction {
            pub const ALL: &'static [Self] = &[
                $( Self::$name , )+
            ];

            pub fn name(&self) -> &'static str {
                match self {
                    $( Self::$name => stringify!($name) , )+
                }
            }
        }

        impl ::std::fmt::Display for Instruction {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                f.write_str(self.name())
            }
        }
    }
}

instructions! {
    /// No operation
    NOP = 0x00,
    /// Stop the execution of the program
    HLT = 0x01,
    /// Return from a subroutine
    RET = 0x11,
    /// Push a register onto the stack
    /// @param reg The register to push
    PUSH = 0x45,
    /// Pop the top of the stack into a register
    /// @param reg The register to pop into
    POP = 0x46,
    /// Prints the decimal value of a register
    /// @param reg The register to print
    PRN = 0x47,
    /// Push the return address and jump to a subroutine
    /// @param reg The register holding the subroutine address
    CALL = 0x50,
    /// Jump to an address
    /// @param reg The register holding the address
    JMP = 0x54,
    /// Jump if the last `CMP` found its operands equal
    /// @param reg The register holding the address
    JEQ = 0x55,
    /// Jump if the last `CMP` found its operands not equal
    /// @param reg The register holding the address
    JNE = 0x56,
    /// Load an immediate value into a register
    /// @param reg The register to write
    /// @param value The value to load
    LDI = 0x82,
    /// `a = a + b`
    ADD = 0xA0,
    /// `a = a - b`
    SUB = 0xA1,
    /// `a = a * b`
    MUL = 0xA2,
    /// Compare two registers and set the equal flag
    CMP = 0xA7,
}

impl Instruction {
    /// Number of operand bytes following the opcode
    pub fn operands(&self) -> usize {
        (*self as Byte >> 6) as usize
    }

    /// Size of the encoded instruction in bytes
    pub fn size(&self) -> usize {
        1 + self.operands()
    }
}

#[cfg(test)]
mod tests {
    use crate::memory::Ram;
    use crate::registers::STACK_START;
    use crate::write_instructions;

    use super::*;
    use color_eyre::eyre::Result;

    fn step(cpu: &mut Processor, mem: &mut Ram) -> crate::Result<Vec<u8>> {
        let mut out = Vec::new();
        cpu.execute(mem, &mut out)?;
        Ok(out)
    }

    #[test]
    fn test_operand_counts() -> Result<()> {
        for instruction in Instruction::ALL {
            let expected = match instruction {
                Instruction::NOP | Instruction::HLT | Instruction::RET => 0,
                Instruction::LDI
                | Instruction::ADD
                | Instruction::SUB
                | Instruction::MUL
                | Instruction::CMP => 2,
                _ => 1,
            };
            assert_eq!(instruction.operands(), expected, "{}", instruction);
        }

        Ok(())
    }

    #[test]
    fn test_no_operation() -> Result<()> {
        let mut mem = Ram::default();
        let mut cpu = Processor::default();

        mem.data[0] = Instruction::NOP as Byte;
        step(&mut cpu, &mut mem)?;

        assert_eq!(mem, Ram::default());
        let mut cpu2 = Processor::default();
        cpu2.pc += 1;
        assert_eq!(cpu, cpu2);

        Ok(())
    }

    #[test]
    fn test_halt() -> Result<()> {
        let mut mem = Ram::default();
        let mut cpu = Processor::default();

        mem.data[0] = Instruction::HLT as Byte;
        step(&mut cpu, &mut mem)?;

        assert!(cpu.is_halted());
        assert_eq!(cpu.pc, 0);

        Ok(())
    }

    #[test]
    fn test_load_immediate() -> Result<()> {
        let mut mem = Ram::default();
        let mut cpu = Processor::default();

        write_instructions!(mem : 0 => Instruction::LDI, 4, 42)?;
        step(&mut cpu, &mut mem)?;

        assert_eq!(cpu.registers.read(4)?, 42);
        assert_eq!(cpu.pc, 3);

        Ok(())
    }

    #[test]
    fn test_print() -> Result<()> {
        let mut mem = Ram::default();
        let mut cpu = Processor::default();

        write_instructions!(mem : 0 => Instruction::PRN, 7)?;
        let out = step(&mut cpu, &mut mem)?;

        assert_eq!(String::from_utf8(out)?, "244\n");
        assert_eq!(cpu.pc, 2);

        Ok(())
    }

    #[test]
    fn test_add() -> Result<()> {
        let mut mem = Ram::default();
        let mut cpu = Processor::default();

        cpu.registers.write(2, 250)?;
        cpu.registers.write(5, 10)?;
        write_instructions!(mem : 0 => Instruction::ADD, 2, 5)?;
        step(&mut cpu, &mut mem)?;

        assert_eq!(cpu.registers.read(2)?, 4);
        assert_eq!(cpu.registers.read(5)?, 10);
        assert_eq!(cpu.pc, 3);

        Ok(())
    }

    #[test]
    fn test_push_pop() -> Result<()> {
        let mut mem = Ram::default();
        let mut cpu = Processor::default();

        cpu.registers.write(0, 99)?;
        write_instructions!(mem : 0 => Instruction::PUSH, 0, Instruction::POP, 3)?;

        step(&mut cpu, &mut mem)?;
        assert_eq!(cpu.registers.sp(), STACK_START - 1);
        assert_eq!(mem.data[(STACK_START - 1) as usize], 99);
        assert_eq!(cpu.pc, 2);

        step(&mut cpu, &mut mem)?;
        assert_eq!(cpu.registers.read(3)?, 99);
        assert_eq!(cpu.registers.sp(), STACK_START);
        assert_eq!(cpu.pc, 4);

        Ok(())
    }

    #[test]
    fn test_push_stack_pointer_after_decrement() -> Result<()> {
        let mut mem = Ram::default();
        let mut cpu = Processor::default();

        write_instructions!(mem : 0 => Instruction::PUSH, 7)?;
        step(&mut cpu, &mut mem)?;

        assert_eq!(cpu.registers.sp(), STACK_START - 1);
        assert_eq!(mem.data[(STACK_START - 1) as usize], STACK_START - 1);

        Ok(())
    }

    #[test]
    fn test_pop_into_stack_pointer_then_increment() -> Result<()> {
        let mut mem = Ram::default();
        let mut cpu = Processor::default();

        write_instructions!(mem : 0 =>
            Instruction::LDI, 0, 0x80,
            Instruction::PUSH, 0,
            Instruction::POP, 7
        )?;
        for _ in 0..3 {
            step(&mut cpu, &mut mem)?;
        }

        assert_eq!(cpu.registers.sp(), 0x81);
        assert_eq!(cpu.pc, 7);

        Ok(())
    }

    #[test]
    fn test_pop_into_stack_pointer_underflow() -> Result<()> {
        let mut mem = Ram::default();
        let mut cpu = Processor::default();

        mem.data[(STACK_START - 1) as usize] = 0xFF;
        cpu.registers.set_sp(STACK_START - 1);
        write_instructions!(mem : 0 => Instruction::POP, 7)?;
        let before = cpu;

        let err = step(&mut cpu, &mut mem).unwrap_err();
        assert!(matches!(err, Error::StackUnderflow));
        assert_eq!(cpu, before);

        Ok(())
    }

    #[test]
    fn test_call_ret() -> Result<()> {
        let mut mem = Ram::default();
        let mut cpu = Processor::default();

        cpu.pc = 0x10;
        cpu.registers.write(1, 0x40)?;
        write_instructions!(mem : 0x10 => Instruction::CALL, 1)?;
        write_instructions!(mem : 0x40 => Instruction::RET)?;

        step(&mut cpu, &mut mem)?;
        assert_eq!(cpu.pc, 0x40);
        assert_eq!(cpu.registers.sp(), STACK_START - 1);
        assert_eq!(mem.data[(STACK_START - 1) as usize], 0x12);

        step(&mut cpu, &mut mem)?;
        assert_eq!(cpu.pc, 0x12);
        assert_eq!(cpu.registers.sp(), STACK_START);

        Ok(())
    }

    #[test]
    fn test_jump() -> Result<()> {
        let mut mem = Ram::default();
        let mut cpu = Processor::default();

        cpu.registers.write(0, 0)?;
        cpu.pc = 0x20;
        write_instructions!(mem : 0x20 => Instruction::JMP, 0)?;
        step(&mut cpu, &mut mem)?;

        assert_eq!(cpu.pc, 0);

        Ok(())
    }

    #[test]
    fn test_conditional_jumps() -> Result<()> {
        let mut mem = Ram::default();
        write_instructions!(mem : 0 => Instruction::JEQ, 6, Instruction::JNE, 6)?;

        for &equal in &[true, false] {
            let mut cpu = Processor::default();
            cpu.registers.write(6, 0x80)?;
            cpu.flags.set_equal(equal);
            step(&mut cpu, &mut mem)?;
            assert_eq!(cpu.pc, if equal { 0x80 } else { 2 });

            let mut cpu = Processor::default();
            cpu.registers.write(6, 0x80)?;
            cpu.flags.set_equal(equal);
            cpu.pc = 2;
            step(&mut cpu, &mut mem)?;
            assert_eq!(cpu.pc, if equal { 4 } else { 0x80 });
        }

        Ok(())
    }

    #[test]
    fn test_illegal_instruction() -> Result<()> {
        let mut mem = Ram::default();
        let mut cpu = Processor::default();

        cpu.pc = 3;
        mem.data[3] = 0xFF;
        let before = (cpu, mem);

        let err = step(&mut cpu, &mut mem).unwrap_err();
        assert!(matches!(
            err,
            Error::IllegalInstruction {
                opcode: 0xFF,
                address: 3
            }
        ));
        assert_eq!((cpu, mem), before);

        Ok(())
    }

    #[test]
    fn test_invalid_register_does_not_advance() -> Result<()> {
        let mut mem = Ram::default();
        let mut cpu = Processor::default();

        write_instructions!(mem : 0 => Instruction::LDI, 8, 1)?;
        let err = step(&mut cpu, &mut mem).unwrap_err();

        assert!(matches!(err, Error::InvalidRegister(8)));
        assert_eq!(cpu, Processor::default());

        Ok(())
    }

    #[test]
    fn test_stack_overflow() -> Result<()> {
        let mut mem = Ram::default();
        let mut cpu = Processor::default();

        cpu.registers.set_sp(0);
        write_instructions!(mem : 0 => Instruction::PUSH, 0)?;
        let err = step(&mut cpu, &mut mem).unwrap_err();

        assert!(matches!(err, Error::StackOverflow));
        assert_eq!(cpu.registers.sp(), 0);
        assert_eq!(cpu.pc, 0);

        Ok(())
    }

    #[test]
    fn test_stack_underflow() -> Result<()> {
        let mut mem = Ram::default();
        let mut cpu = Processor::default();

        cpu.registers.set_sp(0xFF);
        write_instructions!(mem : 0 => Instruction::POP, 0, Instruction::RET)?;
        let err = step(&mut cpu, &mut mem).unwrap_err();
        assert!(matches!(err, Error::StackUnderflow));

        cpu.pc = 2;
        let err = step(&mut cpu, &mut mem).unwrap_err();
        assert!(matches!(err, Error::StackUnderflow));
        assert_eq!(cpu.pc, 2);

        Ok(())
    }

    #[test]
    fn test_operand_past_end_of_memory() -> Result<()> {
        let mut mem = Ram::default();
        let mut cpu = Processor::default();

        cpu.pc = 0xFF;
        mem.data[0xFF] = Instruction::PRN as Byte;
        let err = step(&mut cpu, &mut mem).unwrap_err();

        assert!(matches!(err, Error::OutOfBounds { address: 0x100 }));

        Ok(())
    }

    #[test]
    fn test_budget_exhausted() -> Result<()> {
        let mut mem = Ram::default();
        let mut cpu = Processor::default();

        // R0 = 0; JMP R0
        write_instructions!(mem : 0 => Instruction::JMP, 0)?;
        let err = cpu
            .execute_with_budget(&mut mem, &mut std::io::sink(), Some(100))
            .unwrap_err();

        assert!(matches!(err, Error::BudgetExhausted { steps: 100 }));
        assert!(!cpu.is_halted());

        Ok(())
    }
}
