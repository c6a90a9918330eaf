//! Kedai CLI - database migrations and management tools.
//!
//! # Usage
//!
//! ```bash
//! # Apply schema and session store migrations
//! kedai-cli migrate
//!
//! # Create a back-office account
//! kedai-cli user create -e owner@example.com -n "Store Owner" -r admin
//!
//! # Change an account's role
//! kedai-cli user set-role -e helper@example.com -r staff
//!
//! # Load categories, products and variants
//! kedai-cli seed catalog.yaml
//! ```
//!
//! All commands read `DATABASE_URL` (a `.env` file is honoured).

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "kedai-cli")]
#[command(author, version, about = "Kedai CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Manage user accounts
    User {
        #[command(subcommand)]
        action: UserAction,
    },
    /// Upsert catalog data from a YAML file
    Seed {
        /// Path to the seed file
        file: PathBuf,
    },
}

#[derive(Subcommand)]
enum UserAction {
    /// Create a new account
    Create {
        /// Email address
        #[arg(short, long)]
        email: String,

        /// Display name
        #[arg(short, long)]
        name: String,

        /// Role (`customer`, `staff`, `admin`)
        #[arg(short, long, default_value = "staff")]
        role: String,

        /// Password; falls back to `KEDAI_USER_PASSWORD`
        #[arg(short, long)]
        password: Option<String>,
    },
    /// Change the role of an existing account
    SetRole {
        /// Email address
        #[arg(short, long)]
        email: String,

        /// New role (`customer`, `staff`, `admin`)
        #[arg(short, long)]
        role: String,
    },
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

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
        Commands::User { action } => match action {
            UserAction::Create {
                email,
                name,
                role,
                password,
            } => {
                commands::user::create(&email, &name, &role, password).await?;
            }
            UserAction::SetRole { email, role } => {
                commands::user::set_role(&email, &role).await?;
            }
        },
        Commands::Seed { file } => {
            commands::seed::run(&file).await?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parses_user_create() {
        let cli = Cli::try_parse_from([
            "kedai-cli", "user", "create", "-e", "a@b.test", "-n", "A", "-r", "admin",
        ]);
        assert!(matches!(
            cli.map(|c| c.command),
            Ok(Commands::User {
                action: UserAction::Create { password: None, .. }
            })
        ));
    }
}
