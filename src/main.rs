use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod cli;
mod config;
mod s3;

#[derive(Parser)]
#[command(name = "s3courier")]
#[command(version, about = "Signed uploads, downloads and deletes against S3-compatible storage", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path (falls back to environment variables)
    #[arg(long, global = true)]
    config: Option<String>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true, default_value = "info")]
    log_level: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Upload a local file
    Put {
        /// Local file to upload
        file: String,

        /// Object key (defaults to the file name)
        #[arg(long)]
        key: Option<String>,
    },

    /// Fetch an object and print it
    Get {
        /// Object key
        key: String,

        /// Pin the read to a specific content tag
        #[arg(long)]
        etag: Option<String>,

        /// Write into the configured download directory instead of stdout
        #[arg(long)]
        download: bool,
    },

    /// Delete an object
    Rm {
        /// Object key
        key: String,
    },

    /// Print a presigned retrieval URL
    Presign {
        /// Object key
        key: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| cli.log_level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    // Sequential one-shot operations; a single-threaded runtime is enough
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async_main(cli))
}

async fn async_main(cli: Cli) -> Result<()> {
    let settings = config::load_config(cli.config.as_deref())?;
    let client = s3::client::ObjectStorageClient::new(settings)?;

    match cli.command {
        Commands::Put { file, key } => {
            cli::commands::cmd_put(&client, &file, key.as_deref()).await?;
        }
        Commands::Get {
            key,
            etag,
            download,
        } => {
            cli::commands::cmd_get(&client, &key, etag.as_deref(), download).await?;
        }
        Commands::Rm { key } => {
            cli::commands::cmd_rm(&client, &key).await?;
        }
        Commands::Presign { key } => {
            cli::commands::cmd_presign(&client, &key).await?;
        }
    }

    Ok(())
}
