//! Command line front end for the repository store.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use repostore_client::{
    FetchOptions, FileContent, FileCredentialStore, RepoClient, SaveOptions, StoreConfig,
};

#[derive(Parser)]
#[command(name = "repostore")]
#[command(about = "Use a Git repository as a JSON document store", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Repository as owner/name
    #[arg(short, long, global = true, env = "REPOSTORE_REPOSITORY")]
    repo: Option<String>,

    /// Branch to read and write
    #[arg(short, long, global = true, env = "REPOSTORE_BRANCH")]
    branch: Option<String>,

    /// Credential store file
    #[arg(
        long,
        global = true,
        env = "REPOSTORE_CREDENTIALS",
        default_value = ".repostore/credentials.json"
    )]
    credentials: PathBuf,
}

#[derive(Subcommand)]
enum Commands {
    /// Print a file
    Fetch {
        path: String,

        /// Bypass the cache
        #[arg(long)]
        fresh: bool,
    },

    /// Create or overwrite a file
    Save {
        path: String,

        /// Local file to upload ("-" for stdin)
        #[arg(short, long, default_value = "-")]
        input: String,

        /// Commit message
        #[arg(short, long)]
        message: String,
    },

    /// Delete a file
    Delete {
        path: String,

        /// Commit message
        #[arg(short, long)]
        message: String,
    },

    /// List commits touching a file
    History { path: String },

    /// Print a file as of a revision
    Show { path: String, revision: String },

    /// Compare a file between two revisions
    Diff {
        path: String,
        revision_a: String,
        revision_b: String,
    },

    /// Show the last observed rate limit quota
    Quota,

    /// Store a credential for later writes
    Login { token: String },

    /// Forget the stored credential
    Logout,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing()?;

    let cli = Cli::parse();

    let mut config = StoreConfig::from_env();
    if let Some(repo) = cli.repo {
        config.repository = Some(repo);
    }
    if let Some(branch) = cli.branch {
        config.branch = branch;
    }
    info!(
        "Store config: api={}, repository={}, branch={}",
        config.api_url,
        config.repository.as_deref().unwrap_or("<unset>"),
        config.branch
    );

    let client = RepoClient::builder(config)
        .credentials(Arc::new(FileCredentialStore::new(&cli.credentials)))
        .build()
        .await
        .context("Failed to create repository client")?;

    match cli.command {
        Commands::Fetch { path, fresh } => {
            let options = if fresh {
                FetchOptions::fresh()
            } else {
                FetchOptions::default()
            };
            match client.fetch_file(&path, options).await? {
                Some(content) => print_content(&content)?,
                None => bail!("{} not found", path),
            }
        }
        Commands::Save {
            path,
            input,
            message,
        } => {
            let content = read_content(&input)?;
            let result = client
                .save_file(&path, &content, &message, SaveOptions::default())
                .await?;
            print_json(&result)?;
        }
        Commands::Delete { path, message } => {
            let result = client
                .delete_file(&path, &message, SaveOptions::default())
                .await?;
            print_json(&result)?;
        }
        Commands::History { path } => {
            let history = client.get_file_history(&path).await?;
            print_json(&history)?;
        }
        Commands::Show { path, revision } => {
            match client.get_file_at_revision(&path, &revision).await? {
                Some(content) => print_content(&content)?,
                None => bail!("{} not found at {}", path, revision),
            }
        }
        Commands::Diff {
            path,
            revision_a,
            revision_b,
        } => {
            let diff = client.get_diff(&path, &revision_a, &revision_b).await?;
            print_json(&diff)?;
        }
        Commands::Quota => {
            let quota = client.quota().await;
            println!(
                "remaining={} total={} reset_at={} throttling={}",
                display_or_unknown(quota.remaining),
                display_or_unknown(quota.total),
                display_or_unknown(quota.reset_at),
                quota.throttling
            );
        }
        Commands::Login { token } => {
            client.set_credential(token).await?;
            println!("Credential stored in {}", cli.credentials.display());
        }
        Commands::Logout => {
            client.clear_credential().await?;
            println!("Credential removed");
        }
    }

    Ok(())
}

/// Colored output for terminals, JSON when `LOG_FORMAT=json`.
fn init_tracing() -> Result<()> {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::from_default_env().add_directive("repostore=info".parse()?);

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_writer(std::io::stderr),
            )
            .with(env_filter)
            .init();
    }
    Ok(())
}

/// Read upload content from a file, or stdin for "-".
fn read_content(input: &str) -> Result<FileContent> {
    let text = if input == "-" {
        std::io::read_to_string(std::io::stdin()).context("Failed to read stdin")?
    } else {
        std::fs::read_to_string(Path::new(input))
            .with_context(|| format!("Failed to read {}", input))?
    };
    Ok(FileContent::parse(text))
}

fn print_content(content: &FileContent) -> Result<()> {
    match content {
        FileContent::Json(value) => println!("{}", serde_json::to_string_pretty(value)?),
        FileContent::Text(text) => print!("{}", text),
    }
    Ok(())
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn display_or_unknown<T: std::fmt::Display>(value: Option<T>) -> String {
    value
        .map(|v| v.to_string())
        .unwrap_or_else(|| "unknown".to_string())
}
