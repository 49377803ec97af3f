#[macro_use]
mod loc;

mod cli;
mod fs;
mod exec;
mod glob;
mod eval;
mod line;
mod mode;
mod text;
mod util;
mod vars;
mod graph;
mod scope;
mod shell;
mod types;
mod error;
mod config;
mod consts;
mod driver;
mod expand;
mod pattern;
mod resolve;

use cli::Cli;
use config::Config;

use std::io;
use std::process::ExitCode;

use clap::Parser;
use tracing::Level;

fn main() -> ExitCode {
    let config = Config::new(Cli::parse());

    let level = if config.mode.trace() { Level::DEBUG } else { Level::WARN };
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_max_level(level)
        .without_time()
        .with_target(false)
        .init();

    loc::set_prog(config.level);
    ExitCode::from(driver::run(&config))
}
