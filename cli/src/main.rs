use clap::{Args, Parser, Subcommand, ValueEnum};
use duetimer_cli::CliContext;
use duetimer_cli::commands;
use duetimer_cli::logging;
use duetimer_cli::readline;
use duetimer_core::{ExpressionKind, OwnerScope};
use std::io::Write;

#[tokio::main]
async fn main() -> Result<(), String> {
    let ctx = CliContext::load();
    let _log_guard = logging::init(&ctx.config.read().await.logging);

    // one-shot mode: `duetimer-cli run scenario.toml`
    let args: Vec<String> = std::env::args().collect();
    if args.len() > 1 {
        let line = shlex::try_join(args[1..].iter().map(String::as_str)).map_err(|e| e.to_string())?;
        respond(&line, &ctx).await?;
        commands::exit(&ctx).await;
        return Ok(());
    }

    loop {
        let line = readline()?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match respond(line, &ctx).await {
            Ok(quit) => {
                if quit {
                    break;
                }
            }
            Err(err) => {
                writeln!(std::io::stdout(), "{err}").map_err(|e| e.to_string())?;
                std::io::stdout().flush().map_err(|e| e.to_string())?;
            }
        }
    }

    Ok(())
}

#[derive(Parser)]
#[command(version, about = "due-date timer engine simulator")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Clone, Copy, ValueEnum)]
enum Kind {
    Duration,
    DateTime,
    Cycle,
}

impl From<Kind> for ExpressionKind {
    fn from(kind: Kind) -> Self {
        match kind {
            Kind::Duration => ExpressionKind::Duration,
            Kind::DateTime => ExpressionKind::DateTime,
            Kind::Cycle => ExpressionKind::Cycle,
        }
    }
}

#[derive(Args)]
struct Owner {
    #[arg(short, long)]
    instance: u64,
    #[arg(short, long)]
    element: u64,
}

impl Owner {
    fn scope(&self) -> OwnerScope {
        OwnerScope::element(self.instance, self.element)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Create a catch-point timer, e.g. `create -i 1 -e 2 -t wait PT10S`
    Create {
        #[command(flatten)]
        owner: Owner,
        #[arg(short, long)]
        target: String,
        #[arg(short, long, value_enum, default_value = "duration")]
        kind: Kind,
        definition: String,
    },
    /// Deploy a process version, optionally with one timer start event
    Deploy {
        process: String,
        #[arg(short, long, requires = "definition")]
        start: Option<String>,
        #[arg(short, long, value_enum, default_value = "cycle")]
        kind: Kind,
        definition: Option<String>,
    },
    Undeploy {
        process: String,
    },
    /// Cancel one timer (with --target) or every timer of an element
    Cancel {
        #[command(flatten)]
        owner: Owner,
        #[arg(short, long)]
        target: Option<String>,
    },
    /// Set a variable visible to `=name` expressions
    Set {
        name: String,
        value: String,
    },
    /// Move the simulated clock forward by an ISO-8601 duration and tick
    Advance {
        by: String,
    },
    Tick,
    List,
    Journal,
    Processes,
    FailNext,
    Run {
        path: String,
    },
    /// Tick in the background at the configured interval
    Serve,
    Stop,
    Config,
    Exit,
}

async fn respond(line: &str, ctx: &CliContext) -> Result<bool, String> {
    let mut args = shlex::split(line).ok_or("error: Invalid quoting")?;
    args.insert(0, "duetimer".to_string());
    let cli = Cli::try_parse_from(args).map_err(|e| e.to_string())?;

    match &cli.command {
        Some(Commands::Create {
            owner,
            target,
            kind,
            definition,
        }) => commands::create(ctx, owner.scope(), target, (*kind).into(), definition).await?,
        Some(Commands::Deploy {
            process,
            start,
            kind,
            definition,
        }) => {
            let start = match (start, definition) {
                (Some(target), Some(text)) => Some((target.as_str(), (*kind).into(), text.as_str())),
                _ => None,
            };
            commands::deploy(ctx, process, start).await?
        }
        Some(Commands::Undeploy { process }) => commands::undeploy(ctx, process).await?,
        Some(Commands::Cancel { owner, target }) => {
            commands::cancel(ctx, owner.scope(), target.as_deref()).await
        }
        Some(Commands::Set { name, value }) => commands::set_variable(ctx, name, value).await,
        Some(Commands::Advance { by }) => commands::advance(ctx, by).await?,
        Some(Commands::Tick) => commands::tick(ctx).await?,
        Some(Commands::List) => commands::list(ctx).await,
        Some(Commands::Journal) => commands::journal(ctx).await,
        Some(Commands::Processes) => commands::processes(ctx).await,
        Some(Commands::FailNext) => commands::fail_next(ctx).await,
        Some(Commands::Run { path }) => commands::run_scenario(ctx, path).await?,
        Some(Commands::Serve) => commands::serve(ctx).await?,
        Some(Commands::Stop) => commands::stop(ctx).await,
        Some(Commands::Config) => commands::show_config(ctx).await,
        Some(Commands::Exit) => {
            commands::exit(ctx).await;
            return Ok(true);
        }
        None => {}
    }
    Ok(false)
}
