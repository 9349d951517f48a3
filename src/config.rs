use std::path::PathBuf;

use clap::Parser;
use log::LevelFilter;

/// Runs an LS-8 program file
#[derive(Debug, Clone, PartialEq, Eq, Parser)]
#[command(version, arg_required_else_help(true))]
pub struct Config {
    /// Program file to run, one base 2 byte per line
    pub program: PathBuf,

    /// Log every executed instruction
    #[arg(short, long, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Only log errors
    #[arg(short, long)]
    pub quiet: bool,

    /// Stop with an error after this many steps. Runs forever if unset.
    #[arg(long)]
    pub max_steps: Option<u64>,
}

impl Config {
    pub fn log_level(&self) -> LevelFilter {
        if self.verbose {
            LevelFilter::Debug
        } else if self.quiet {
            LevelFilter::Error
        } else {
            LevelFilter::Warn
        }
    }
}
