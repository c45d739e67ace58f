use clap::Parser;
use pulltrader::cli::{Cli, run};

fn main() -> std::process::ExitCode {
    run(Cli::parse())
}
