use std::io::{self, BufWriter, Write};

use clap::Parser;
use color_eyre::eyre::{Result, WrapErr};
use ls8::config::Config;
use ls8::memory::Ram;
use ls8::processor::Processor;
use simple_logger::SimpleLogger;

fn main() -> Result<()> {
    color_eyre::install()?; // rust error handling

    let config = Config::parse();

    SimpleLogger::new()
        .with_level(config.log_level())
        .init()
        .wrap_err("Failed to install the logger")?; // logging

    let mut mem = Ram::from_file(&config.program)?;
    mem.dump();
    let mut cpu = Processor::new();

    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    let result = cpu.execute_with_budget(&mut mem, &mut out, config.max_steps);
    out.flush()?;

    result.wrap_err_with(|| format!("`{}` crashed", config.program.display()))?;

    Ok(())
}
