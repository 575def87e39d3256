//! nvgdb - gdb/Neovim source sync
//!
//! This is the main entry point. It parses CLI arguments and delegates
//! to the session runner.

mod cli;
mod run;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = cli::Cli::parse()?;
    run::run(cli)
}
