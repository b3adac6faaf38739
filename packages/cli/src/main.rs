mod commands;
mod config;

use clap::{Parser, Subcommand};
use colored::Colorize;
use commands::{
    commands, dump, init, outline, roundtrip, CommandsArgs, Context, DumpArgs, InitArgs, OutlineArgs, RoundtripArgs,
};
use config::{Config, EngineKind};
use tracing_subscriber::EnvFilter;

/// Folio CLI - rich document editing core, from the command line
#[derive(Parser, Debug)]
#[command(name = "folio")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Conversion engine (overrides folio.config.json)
    #[arg(long, global = true, value_enum)]
    engine: Option<EngineKind>,

    /// Markup format, e.g. markdown, rmarkdown, gfm
    #[arg(long, global = true)]
    format: Option<String>,

    /// More logging (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Load a document and write it back out
    Roundtrip(RoundtripArgs),

    /// Print a document's heading outline
    Outline(OutlineArgs),

    /// List editor commands and their key bindings
    Commands(CommandsArgs),

    /// Print the intermediate document as JSON
    Dump(DumpArgs),

    /// Create a folio.config.json
    Init(InitArgs),
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let cwd = std::env::current_dir()?;

    if let Command::Init(args) = cli.command {
        return init(args, cli.engine, &cwd);
    }

    let ctx = Context::new(Config::load(&cwd)?, cli.engine, cli.format);
    match cli.command {
        Command::Roundtrip(args) => roundtrip(args, &ctx).await,
        Command::Outline(args) => outline(args, &ctx).await,
        Command::Commands(args) => commands(args, &ctx).await,
        Command::Dump(args) => dump(args, &ctx).await,
        Command::Init(_) => Ok(()),
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(err) = run(cli).await {
        eprintln!();
        eprintln!("{} {}", "Error:".red().bold(), err);
        eprintln!();
        std::process::exit(1);
    }
}
