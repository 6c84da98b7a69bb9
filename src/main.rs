use clap::Parser;
use varprobe::{
    cli::{init_verbose, Cli, Command, FULL_VERSION},
    commands::{annotate, stats},
    utils::{handle_error_and_exit, Result},
};

fn runner() -> Result<()> {
    let cli = Cli::parse();
    init_verbose(&cli);
    let subcommand_name = match cli.command {
        Command::Annotate(_) => "annotate",
        Command::Stats(_) => "stats",
    };

    log::info!(
        "Running {}-{} [{}]",
        env!("CARGO_PKG_NAME"),
        *FULL_VERSION,
        subcommand_name
    );
    match cli.command {
        Command::Annotate(args) => annotate::annotate(args)?,
        Command::Stats(args) => stats::stats(args)?,
    }
    log::info!("{} end", env!("CARGO_PKG_NAME"));
    Ok(())
}

fn main() {
    if let Err(e) = runner() {
        handle_error_and_exit(e);
    }
}
