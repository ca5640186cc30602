use clap::{Parser, Subcommand};
use tripwire::{
    config::AppConfig,
    supervisor::{Supervisor, WorkerMode},
};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Directory holding `app.yaml`.
    #[arg(long, global = true)]
    config_dir: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Runs the merge worker, turning rule matches into alerts.
    Merge,
    /// Runs the delivery worker, sending alerts to their destinations.
    Deliver,
    /// Runs both workers in one process.
    Run,
}

impl From<&Commands> for WorkerMode {
    fn from(command: &Commands) -> Self {
        match command {
            Commands::Merge => WorkerMode::Merge,
            Commands::Deliver => WorkerMode::Deliver,
            Commands::Run => WorkerMode::All,
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let subscriber =
        FmtSubscriber::builder().with_env_filter(EnvFilter::from_default_env()).finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    let cli = Cli::parse();

    tracing::debug!("Loading application configuration...");
    let config = AppConfig::new(cli.config_dir.as_deref())?;
    tracing::debug!(
        database_url = %config.database_url,
        alert_queue_url = ?config.alert_queue_url,
        "Configuration loaded."
    );

    let supervisor =
        Supervisor::builder().config(config).mode(WorkerMode::from(&cli.command)).build().await?;
    supervisor.run().await?;

    tracing::info!("Tripwire has shut down.");
    Ok(())
}
