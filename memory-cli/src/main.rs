use clap::{Parser, Subcommand};

use memory_cli::commands::graph::{handle_edge, handle_node, EdgeCommands, NodeCommands};
use memory_cli::commands::health;
use memory_cli::config::initialize_storage;
use memory_cli::output::OutputFormat;
use memory_core::config::AppConfig;

#[derive(Parser)]
#[command(name = "memory-cli")]
#[command(about = "Operator CLI for the cognitive memory service")]
#[command(version, long_about = None)]
struct Cli {
    /// Output format.
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Human)]
    format: OutputFormat,

    /// Enable verbose (debug-level) logging.
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run schema migrations against the configured storage backends.
    Migrate,
    /// Probe connectivity to both storage backends.
    Health,
    /// Node inspection and mutation.
    Node {
        #[command(subcommand)]
        command: NodeCommands,
    },
    /// Edge inspection and mutation.
    Edge {
        #[command(subcommand)]
        command: EdgeCommands,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { tracing::Level::DEBUG } else { tracing::Level::INFO };
    tracing_subscriber::fmt().with_max_level(level).init();

    let config = AppConfig::from_env()?;
    let stores = initialize_storage(&config).await?;

    match cli.command {
        // `initialize_storage` already runs migrations unconditionally, so
        // this exists purely for operators who want a dedicated step.
        Commands::Migrate => {
            println!("schema is up to date");
            Ok(())
        }
        Commands::Health => health::run(&stores, cli.format).await,
        Commands::Node { command } => handle_node(command, &stores, cli.format).await,
        Commands::Edge { command } => handle_edge(command, &stores, cli.format).await,
    }
}
