use clap::Parser;
use tracing_subscriber::EnvFilter;

use civicdesk::client::CivicDesk;
use civicdesk::config::{Config, StorageConfig};
use civicdesk::error::{CivicDeskError, Result};
use civicdesk::services::ingest::UploadInput;

#[derive(Parser, Debug)]
#[command(name = "civicdesk")]
#[command(about = "Civic document Q&A CLI")]
struct Cli {
    #[arg(long, help = "Path to a JSON config file")]
    config: Option<String>,

    #[arg(long, default_value = "./data/civicdesk.db")]
    db: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    Serve {
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        #[arg(long, default_value_t = 7878)]
        port: u16,

        #[arg(long, env = "CIVICDESK_TOKEN", default_value = "")]
        token: String,
    },
    Upload {
        #[arg(long)]
        file: String,

        #[arg(long)]
        title: Option<String>,

        #[arg(long)]
        folder: Option<String>,
    },
    List {
        #[arg(long)]
        folder: Option<String>,
    },
    Delete {
        #[arg(long)]
        document: i32,
    },
    Move {
        #[arg(long)]
        document: i32,

        #[arg(long)]
        folder: Option<String>,
    },
    Ask {
        #[arg(long)]
        document: i32,

        #[arg(long)]
        question: String,
    },
    Search {
        #[arg(long)]
        query: String,

        #[arg(long)]
        document: Option<i32>,

        #[arg(long, default_value_t = 5)]
        limit: usize,
    },
    Analyze {
        #[arg(long)]
        document: i32,
    },
    Compare {
        #[arg(long)]
        left: i32,

        #[arg(long)]
        right: i32,
    },
}

fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };
    config.storage = Some(StorageConfig {
        sqlite_path: Some(cli.db.clone()),
    });
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,civicdesk=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();
    let config = load_config(&cli)?;

    if let Commands::Serve { host, port, token } = &cli.command {
        return civicdesk::daemon::run(host, *port, config, token).await;
    }

    let desk = CivicDesk::from_config(config).await?;
    match cli.command {
        Commands::Serve { .. } => unreachable!(),
        Commands::Upload {
            file,
            title,
            folder,
        } => {
            let content = tokio::fs::read_to_string(&file)
                .await
                .map_err(|e| CivicDeskError::Runtime(e.to_string()))?;
            let title = title.unwrap_or_else(|| {
                std::path::Path::new(&file)
                    .file_stem()
                    .and_then(|stem| stem.to_str())
                    .unwrap_or("Untitled")
                    .to_string()
            });
            let document = desk
                .upload_document(UploadInput {
                    title,
                    content,
                    folder,
                    source_name: Some(file),
                })
                .await?;
            print_json(&document)?;
        }
        Commands::List { folder } => {
            let documents = desk.list_documents(folder.as_deref()).await?;
            print_json(&documents)?;
        }
        Commands::Delete { document } => {
            desk.delete_document(document).await?;
            println!("deleted document {document}");
        }
        Commands::Move { document, folder } => {
            let document = desk.move_document(document, folder.as_deref()).await?;
            print_json(&document)?;
        }
        Commands::Ask { document, question } => {
            let answer = desk.ask(document, &question).await?;
            println!("{}", answer.answer);
        }
        Commands::Search {
            query,
            document,
            limit,
        } => {
            let results = desk.search(&query, document, limit).await?;
            print_json(&results)?;
        }
        Commands::Analyze { document } => {
            let analysis = desk.analyze_document(document).await?;
            print_json(&analysis)?;
        }
        Commands::Compare { left, right } => {
            let comparison = desk.compare_documents(left, right).await?;
            print_json(&comparison)?;
        }
    }

    Ok(())
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    let rendered = serde_json::to_string_pretty(value)
        .map_err(|e| CivicDeskError::Serialization(e.to_string()))?;
    println!("{rendered}");
    Ok(())
}
