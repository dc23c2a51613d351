mod cli;
mod commands;
mod common;
mod config;
mod corpus;
mod pipeline;
mod scheduler;
mod ui;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use std::io::IsTerminal;

use crate::cli::Cli;
use crate::config::Config;
use crate::scheduler::SchedulerError;
use crate::ui::prelude::*;

fn run(cli: Cli) -> Result<()> {
    let Some(command) = cli.command else {
        Cli::command().print_help()?;
        return Ok(());
    };
    let config = Config::load(cli.config.as_deref())?;
    commands::handle_command(command, &config)
}

fn main() {
    let cli = Cli::parse();

    let color = !cli.no_color && std::io::stdout().is_terminal();
    ui::init(cli.output, color);
    ui::set_debug_mode(cli.debug);

    if let Err(e) = run(cli) {
        let code = e
            .downcast_ref::<SchedulerError>()
            .map(SchedulerError::code)
            .unwrap_or("error");
        emit(Level::Error, code, &format!("Error: {:#}", e), None);
        std::process::exit(1);
    }
}
