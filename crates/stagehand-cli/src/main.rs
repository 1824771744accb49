mod cmd;
mod output;
mod root;

use clap::{Parser, Subcommand};
use cmd::config::ConfigSubcommand;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "stagehand",
    about = "Run presentation actions against a workbench: open files, run commands, check results",
    version,
    propagate_version = true
)]
struct Cli {
    /// Workspace root (default: auto-detect from .stagehand/ or .git/)
    #[arg(long, global = true, env = "STAGEHAND_ROOT")]
    root: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    /// Log engine activity at debug level
    #[arg(long, global = true, short = 'v')]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the registered action types
    Actions,

    /// Run a single action
    Run {
        /// Action type, e.g. file.open or terminal.run
        action_type: String,
        /// Parameter as key=value (repeatable); values are coerced like compact steps
        #[arg(long = "param", short = 'p', value_name = "KEY=VALUE")]
        params: Vec<String>,
        /// Allow actions that execute code
        #[arg(long)]
        trusted: bool,
        /// Override the action's time budget
        #[arg(long, value_name = "MS")]
        timeout_ms: Option<u64>,
    },

    /// Run a sequence given in compact form or as JSON
    Sequence {
        /// e.g. "file.open?path=a.rs,validate.file?path=a.rs"
        steps: String,
        /// Only parse and validate the steps
        #[arg(long)]
        check: bool,
        /// Allow steps that execute code
        #[arg(long)]
        trusted: bool,
        /// Keep going after a failed step
        #[arg(long)]
        continue_on_error: bool,
    },

    /// Walk every slide of a deck manifest, running its actions
    Present {
        /// Deck manifest (default: deck.yaml in the root)
        deck: Option<PathBuf>,
        /// Allow actions that execute code
        #[arg(long)]
        trusted: bool,
    },

    /// Inspect and validate engine configuration
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },
}

fn main() {
    let cli = Cli::parse();

    let default_level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let root = root::resolve_root(cli.root.as_deref());

    let result = match cli.command {
        Commands::Actions => cmd::actions::run(cli.json),
        Commands::Run {
            action_type,
            params,
            trusted,
            timeout_ms,
        } => cmd::run::run(&root, &action_type, &params, trusted, timeout_ms, cli.json),
        Commands::Sequence {
            steps,
            check,
            trusted,
            continue_on_error,
        } => cmd::sequence::run(&root, &steps, check, trusted, continue_on_error, cli.json),
        Commands::Present { deck, trusted } => {
            cmd::present::run(&root, deck.as_deref(), trusted, cli.json)
        }
        Commands::Config { subcommand } => cmd::config::run(&root, subcommand, cli.json),
    };

    if let Err(e) = result {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
