use color_eyre::eyre::Result;

use ls8::memory::Ram;
use ls8::processor::Processor;
use ls8::write_instructions;
use simple_logger::SimpleLogger;

/// Address of the subroutine
const SQUARE: u8 = 0x40;

fn main() -> Result<()> {
    color_eyre::install()?; // rust error handling
    SimpleLogger::new().init().unwrap(); // logging

    let mut mem = Ram::default();
    let mut cpu = Processor::new();

    use ls8::processor::Instruction::*;
    write_instructions!(mem : 0 =>
        LDI, 1, SQUARE,
        LDI, 0, 12,
        CALL, 1,
        PRN, 0,
        HLT
    )?;
    write_instructions!(mem : SQUARE as usize =>
        MUL, 0, 0,
        RET
    )?;

    cpu.execute_until_hlt(&mut mem, &mut std::io::stdout())?;

    Ok(())
}
