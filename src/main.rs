//! `mse` binary entry point.

use clap::Parser;

use monitor_state_engine::cli_app::{Cli, run};

fn main() {
    let cli = Cli::parse();
    match run(&cli) {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("mse: {err}");
            std::process::exit(2);
        }
    }
}
