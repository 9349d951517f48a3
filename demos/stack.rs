use color_eyre::eyre::Result;

use ls8::memory::Ram;
use ls8::processor::Processor;
use ls8::write_instructions;
use log::LevelFilter;
use simple_logger::SimpleLogger;

fn main() -> Result<()> {
    color_eyre::install()?; // rust error handling
    SimpleLogger::new()
        .with_level(LevelFilter::Info)
        .init()
        .unwrap(); // logging

    let mut mem = Ram::default();
    let mut cpu = Processor::new();

    // swaps R0 and R1 through the stack
    use ls8::processor::Instruction::*;
    write_instructions!(mem : 0 =>
        LDI, 0, 1,
        LDI, 1, 2,
        PUSH, 0,
        PUSH, 1,
        POP, 0,
        POP, 1,
        PRN, 0,
        PRN, 1,
        HLT
    )?;

    cpu.execute_until_hlt(&mut mem, &mut std::io::stdout())?;

    Ok(())
}
