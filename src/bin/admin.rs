//! logrelay Admin CLI
//!
//! Offline inspection and maintenance of a logrelay data directory.
//! Do not point it at a directory a running server is using.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use logrelay::{KvStore, RelayError, User, UserReader, UserRepository, UserWriter};
use tracing_subscriber::{fmt, EnvFilter};

/// logrelay Admin
#[derive(Parser, Debug)]
#[command(name = "logrelay-admin")]
#[command(about = "Inspect and maintain a logrelay database")]
#[command(version)]
struct Args {
    /// Data directory
    #[arg(short, long, default_value = "./logrelay_data")]
    data_dir: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List every registered user as JSON
    List,

    /// Show one user
    Get {
        /// The user ID
        id: String,
    },

    /// Delete one user
    Delete {
        /// The user ID
        id: String,
    },

    /// Delete every user registered from a chat
    PurgeChat {
        /// The Telegram chat ID
        chat_id: i64,
    },

    /// Register a new user for a chat, replacing any existing ones
    Add {
        /// The Telegram chat ID
        chat_id: i64,
    },

    /// Merge all SSTables into one
    Compact,
}

fn main() -> ExitCode {
    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("logrelay-admin: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> logrelay::Result<()> {
    let store = Arc::new(KvStore::open(&args.data_dir)?);
    let users = UserRepository::new(Arc::clone(&store));

    let outcome = execute(&store, &users, args.command);
    store.close()?;
    outcome
}

fn execute(store: &KvStore, users: &UserRepository, command: Commands) -> logrelay::Result<()> {
    match command {
        Commands::List => print_json(&users.get_all()?),
        Commands::Get { id } => print_json(&users.get(&id)?),
        Commands::Delete { id } => {
            users.delete(&id)?;
            println!("deleted {}", id);
            Ok(())
        }
        Commands::PurgeChat { chat_id } => {
            users.delete_all_by_external_chat_id(chat_id)?;
            println!("removed chat {}", chat_id);
            Ok(())
        }
        Commands::Add { chat_id } => {
            users.delete_all_by_external_chat_id(chat_id)?;
            let user = User::register(chat_id);
            users.create(&user)?;
            print_json(&user)
        }
        Commands::Compact => {
            store.compact()?;
            println!("compaction finished");
            Ok(())
        }
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> logrelay::Result<()> {
    let rendered =
        serde_json::to_string_pretty(value).map_err(|e| RelayError::Serialization(e.to_string()))?;
    println!("{}", rendered);
    Ok(())
}
