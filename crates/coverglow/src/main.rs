mod cli;
mod commands;
mod paths;
mod run;

use anyhow::Result;
use cli::Command;

fn main() -> Result<()> {
    let cli = cli::parse();
    run::initialise_tracing();

    let config = cli.config.as_deref();
    match cli.command {
        Some(Command::Palette(args)) => commands::palette(args, config),
        Some(Command::Still(args)) => commands::still(args, config),
        Some(Command::Config(command)) => commands::config(command.action, config),
        None => run::run(cli.run, config),
    }
}
