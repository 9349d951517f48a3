use color_eyre::eyre::Result;

use ls8::memory::Ram;
use ls8::processor::Processor;
use simple_logger::SimpleLogger;

fn main() -> Result<()> {
    color_eyre::install()?; // rust error handling
    SimpleLogger::new().init().unwrap(); // logging

    let mut mem = Ram::from_file("programs/call.ls8")?;
    mem.dump();
    let mut cpu = Processor::new();

    cpu.execute_until_hlt(&mut mem, &mut std::io::stdout())?;

    Ok(())
}
