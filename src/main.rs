use anyhow::Result;
use clap::{Parser, Subcommand};

/// formgate - contact and quote form intake
#[derive(Parser)]
#[command(name = "formgate")]
#[command(about = "Validates, deduplicates and delivers website form submissions", long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server
    Serve {
        /// Server host address (overrides config file)
        #[arg(long)]
        host: Option<String>,

        /// Server port (overrides config file)
        #[arg(long)]
        port: Option<u16>,
    },
    /// Run database migrations
    Migrate,
    /// Drop database if exists and recreate with migrations
    Reset,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = formgate::config::Config::load(cli.config.clone())?;
    config.validate().map_err(|e| anyhow::anyhow!(e))?;

    formgate::observability::init_observability(
        "formgate",
        env!("CARGO_PKG_VERSION"),
        &config.observability.log_level,
    )?;

    match cli.command {
        Commands::Serve { host, port } => formgate::cli::serve(config, host, port).await,
        Commands::Migrate => formgate::cli::migrate(&config).await,
        Commands::Reset => formgate::cli::reset(&config).await,
    }
}
