use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use confstore::config::StoreSettings;
use confstore::document::codec;
use confstore::logging::init_tracing;
use confstore::{ConfigNode, ConfigStore};

#[derive(Parser)]
#[command(name = "confstore")]
#[command(about = "Inspect and edit a revisioned configuration store", long_about = None)]
struct Cli {
    /// Settings file (defaults to ~/.config/confstore/settings.toml)
    #[arg(short, long)]
    settings: Option<PathBuf>,

    /// Override the data directory from the settings file
    #[arg(short, long)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the node at a path
    Get {
        path: String,
        /// JSON printed when the path is absent
        #[arg(long)]
        default: Option<String>,
    },
    /// Set a value and commit
    Set {
        path: String,
        /// JSON value; anything that doesn't parse is stored as a string
        value: String,
        #[arg(short, long)]
        message: Option<String>,
    },
    /// Delete a node and commit
    Delete {
        path: String,
        #[arg(short, long)]
        message: Option<String>,
    },
    /// List retained revisions
    Revisions,
    /// Print the document stored in a revision
    Show { sequence: u64 },
    /// Commit an older revision as the current document
    Restore { sequence: u64 },
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let mut settings = match &cli.settings {
        Some(path) => StoreSettings::load_from(path)?,
        None => StoreSettings::load()?,
    };
    if let Some(dir) = cli.data_dir {
        settings.data_dir = dir;
    }

    let store = ConfigStore::open(settings).context("Failed to open configuration store")?;

    match cli.command {
        Commands::Get { path, default } => {
            let default = match default {
                Some(raw) => codec::decode(raw.as_bytes()).context("--default is not valid JSON")?,
                None => ConfigNode::from(""),
            };
            let node = store.get(&path, default);
            print!("{}", String::from_utf8_lossy(&codec::encode(&node)?));
        }
        Commands::Set {
            path,
            value,
            message,
        } => {
            let value = codec::decode(value.as_bytes()).unwrap_or_else(|_| ConfigNode::from(value));
            store.set(&path, value)?;
            let description = message.unwrap_or_else(|| format!("Set {}", path));
            let revision = store.commit(&description)?;
            println!("Committed revision {}", revision.sequence);
        }
        Commands::Delete { path, message } => {
            store.delete(&path)?;
            let description = message.unwrap_or_else(|| format!("Deleted {}", path));
            let revision = store.commit(&description)?;
            println!("Committed revision {}", revision.sequence);
        }
        Commands::Revisions => {
            let current = store.current_sequence();
            for info in store.revisions()? {
                let marker = if info.sequence == current { "*" } else { " " };
                println!(
                    "{} {:>6}  {:>10}  {}",
                    marker, info.sequence, info.timestamp, info.description
                );
            }
        }
        Commands::Show { sequence } => {
            let revision = store.revision(sequence)?;
            print!("{}", String::from_utf8_lossy(&revision.content));
        }
        Commands::Restore { sequence } => {
            let revision = store.restore(sequence)?;
            println!(
                "Restored revision {} as revision {}",
                sequence, revision.sequence
            );
        }
    }

    store.close();
    Ok(())
}
