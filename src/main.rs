//! Stride CLI entry point.

use clap::Parser;
use stride::cli::commands;
use stride::cli::{Cli, Commands};
use stride::config::default_actor;
use stride::error::Error;
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up tracing based on verbosity
    init_tracing(cli.verbose, cli.quiet);

    // Resolve effective JSON mode: --json OR non-TTY stdout
    let json = cli.json || !std::io::IsTerminal::is_terminal(&std::io::stdout());

    match run(&cli, json) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if json {
                eprintln!("{}", e.to_structured_json());
            } else if !cli.quiet {
                if let Some(hint) = e.hint() {
                    eprintln!("Error: {e}\n  Hint: {hint}");
                } else {
                    eprintln!("Error: {e}");
                }
            }
            ExitCode::from(e.exit_code())
        }
    }
}

fn init_tracing(verbose: u8, quiet: bool) {
    use tracing_subscriber::EnvFilter;

    if quiet {
        return;
    }

    // Honor RUST_LOG if set, otherwise use verbosity flag
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        match verbose {
            0 => EnvFilter::new("warn"),
            1 => EnvFilter::new("info"),
            2 => EnvFilter::new("debug,rusqlite=info"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}

fn run(cli: &Cli, json: bool) -> Result<(), Error> {
    let actor = cli.actor.clone().unwrap_or_else(default_actor);

    match &cli.command {
        Commands::Progress { command } => {
            commands::progress::execute(command, cli.db.as_ref(), &actor, json)
        }

        Commands::Dispatch {
            user,
            action,
            content_type,
            content_id,
        } => commands::reward::execute_dispatch(
            user,
            action,
            content_type,
            content_id,
            cli.db.as_ref(),
            &actor,
            json,
        ),

        Commands::Streak { user } => {
            commands::reward::execute_streak(user, cli.db.as_ref(), &actor, json)
        }

        Commands::Ledger { user, limit } => {
            commands::reward::execute_ledger(user, *limit, cli.db.as_ref(), &actor, json)
        }
    }
}
