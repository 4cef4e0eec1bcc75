use clap::Parser;
use tracing_subscriber::EnvFilter;

use civicdesk::config::{Config, StorageConfig};
use civicdesk::daemon;
use civicdesk::error::Result;

#[derive(Parser, Debug)]
#[command(name = "civicdeskd")]
#[command(about = "Civic document Q&A daemon")]
struct Cli {
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    #[arg(long, default_value_t = 7878)]
    port: u16,

    #[arg(long, help = "Path to a JSON config file")]
    config: Option<String>,

    #[arg(long, default_value = "./data/civicdesk.db")]
    db: String,

    #[arg(long, env = "CIVICDESK_TOKEN", default_value = "")]
    token: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,civicdesk=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();
    let mut config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };
    config.storage = Some(StorageConfig {
        sqlite_path: Some(cli.db.clone()),
    });

    daemon::run(&cli.host, cli.port, config, &cli.token).await
}
