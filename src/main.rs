use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use content_factory::api::{self, AppState};
use content_factory::db::Database;
use content_factory::environment::Settings;
use content_factory::logging::configure_logging;
use tracing::info;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP API (default)
    Serve {
        /// Port to listen on, overrides PORT
        #[arg(short, long)]
        port: Option<u16>,

        /// SQLite database file, overrides DATABASE_PATH
        #[arg(short, long)]
        database: Option<String>,
    },

    /// Create the database schema and exit
    InitDb {
        /// SQLite database file, overrides DATABASE_PATH
        #[arg(short, long)]
        database: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    configure_logging();
    let cli = Cli::parse();
    let mut settings = Settings::from_env();

    match cli.command.unwrap_or(Commands::Serve {
        port: None,
        database: None,
    }) {
        Commands::Serve { port, database } => {
            if let Some(port) = port {
                settings.port = port;
            }
            if let Some(database) = database {
                settings.database_path = database;
            }

            let db = Database::connect(&settings.database_path)
                .await
                .with_context(|| format!("Failed to open database {}", settings.database_path))?;
            let port = settings.port;
            let state = AppState::new(db, settings)?;
            api::serve(state, port).await?;
        }
        Commands::InitDb { database } => {
            let path = database.unwrap_or(settings.database_path);
            Database::connect(&path)
                .await
                .with_context(|| format!("Failed to initialize database {}", path))?;
            info!("Database schema ready at {}", path);
        }
    }

    Ok(())
}
