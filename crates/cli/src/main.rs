//! Printdrop CLI - database migrations and store management.
//!
//! # Usage
//!
//! ```bash
//! # Run database migrations
//! pd-cli migrate
//!
//! # Remove expired orders and their files once
//! pd-cli reap
//!
//! # Create a store
//! pd-cli store create -n "Corner Print" -o "Sam" -e sam@corner.example \
//!     -p secret1 -a "1 Main St" --phone 555-0100
//!
//! # Deactivate or reactivate a store
//! pd-cli store status CORNE123 inactive
//!
//! # Print a store's QR payload
//! pd-cli store qr CORNE123
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "pd-cli")]
#[command(author, version, about = "Printdrop CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Delete expired orders and their stored files once
    Reap,
    /// Manage stores
    Store {
        #[command(subcommand)]
        action: StoreAction,
    },
}

#[derive(Subcommand)]
enum StoreAction {
    /// Register a new store
    Create {
        /// Store display name
        #[arg(short, long)]
        name: String,

        /// Owner's name
        #[arg(short, long)]
        owner: String,

        /// Login email address
        #[arg(short, long)]
        email: String,

        /// Login password
        #[arg(short, long)]
        password: String,

        /// Street address
        #[arg(short, long)]
        address: String,

        /// Contact phone number
        #[arg(long)]
        phone: String,
    },
    /// Activate or deactivate a store
    Status {
        /// Store ID (e.g. `CORNE123`)
        store_id: String,

        /// `active` or `inactive`
        status: String,
    },
    /// Print a store's QR payload
    Qr {
        /// Store ID (e.g. `CORNE123`)
        store_id: String,
    },
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Migrate => commands::migrate::run().await?,
        Commands::Reap => commands::reap::run().await?,
        Commands::Store { action } => match action {
            StoreAction::Create {
                name,
                owner,
                email,
                password,
                address,
                phone,
            } => {
                commands::store::create(commands::store::NewStoreArgs {
                    name,
                    owner,
                    email,
                    password,
                    address,
                    phone,
                })
                .await?;
            }
            StoreAction::Status { store_id, status } => {
                commands::store::set_status(&store_id, &status).await?;
            }
            StoreAction::Qr { store_id } => commands::store::qr(&store_id).await?,
        },
    }
    Ok(())
}
