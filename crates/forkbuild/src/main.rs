//! forkbuild CLI entry point.

// The CLI prints the composed workflow and next steps on stdout.
#![allow(clippy::print_stdout, clippy::print_stderr)]

use forkbuild::cli::{self, Cli};
use forkbuild::commands::{self, Command, Context, prepare::PrepareOutcome};
use forkbuild::tracing::{TracingConfig, init_tracing};
use tracing::instrument;

#[tokio::main]
async fn main() {
    std::panic::set_hook(Box::new(|panic_info| {
        eprintln!("Application panicked: {panic_info}");
        eprintln!("Internal error occurred. Run with RUST_LOG=debug for more information.");
    }));

    if let Err(error) = run(cli::parse()).await {
        eprintln!("{error:?}");
        std::process::exit(1);
    }
}

#[instrument(name = "forkbuild", skip_all)]
async fn run(cli: Cli) -> miette::Result<()> {
    init_tracing(TracingConfig {
        format: cli.log_format,
        level: cli.level.into(),
        ..Default::default()
    })?;

    let context = Context::load(&cli.config, ".")?;

    match Command::from(cli.command) {
        Command::Compose { tag, output } => {
            if let Some(yaml) =
                commands::compose::execute(&context, &tag, output.as_deref()).await?
            {
                print!("{yaml}");
            }
        }
        Command::Prepare(options) => {
            let outcome = commands::prepare::execute(&context, &options).await?;
            print_prepare_summary(&outcome);
        }
        Command::Dispatch { tag } => {
            let request = commands::dispatch::execute(&context, &tag).await?;
            println!(
                "Dispatched {} on {}@{}",
                request.workflow, request.repository, request.reference
            );
        }
    }

    Ok(())
}

fn print_prepare_summary(outcome: &PrepareOutcome) {
    println!("Branch: {}", outcome.branch);
    for file in &outcome.files {
        println!("  {}", file.display());
    }
    if outcome.warnings > 0 {
        println!("{} job(s) run without checkout redirection", outcome.warnings);
    }

    if outcome.dispatched {
        println!("Dispatched {}", outcome.dispatch.workflow);
    } else if outcome.pushed {
        println!("\nTo trigger the build:\n  {}", outcome.dispatch.gh_command());
    } else {
        println!(
            "\nTo push manually: git push {} {}",
            outcome.remote, outcome.branch
        );
    }
}
