use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, bail};
use chrono::Utc;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use studytrack::auth::issue_token;
use studytrack::config::ServerConfig;
use studytrack::server::validation::validate_email;
use studytrack::server::{AppState, create_router};
use studytrack::store::{SeedSyllabus, SqliteStore, Store};
use studytrack::types::{Role, User};

const NOT_INITIALIZED: &str =
    "Server not initialized. Run 'studytrack admin init' first to create the database and admin token.";

#[cfg(unix)]
fn set_restrictive_permissions(path: &Path) {
    use std::os::unix::fs::PermissionsExt;
    if let Err(e) = fs::set_permissions(path, fs::Permissions::from_mode(0o600)) {
        tracing::warn!("Failed to set permissions on {}: {e}", path.display());
    }
}

#[derive(Parser)]
#[command(name = "studytrack")]
#[command(about = "A self-hostable study tracker", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Administrative commands
    Admin {
        #[command(subcommand)]
        command: AdminCommands,
    },

    /// Start the server
    Serve {
        /// TOML config file; flags given here take precedence over it
        #[arg(long, short)]
        config: Option<PathBuf>,

        /// Host to bind to
        #[arg(long)]
        host: Option<String>,

        /// Port to bind to
        #[arg(long, short)]
        port: Option<u16>,

        /// Data directory for the database and admin token
        #[arg(long)]
        data_dir: Option<PathBuf>,

        /// Treat this email as an admin (repeatable)
        #[arg(long = "admin-email")]
        admin_emails: Vec<String>,
    },
}

#[derive(Subcommand)]
enum AdminCommands {
    /// Initialize the server (create database, syllabus and admin account)
    Init {
        /// TOML config file to read the data directory from
        #[arg(long, short)]
        config: Option<PathBuf>,

        /// Data directory for the database and admin token
        #[arg(long)]
        data_dir: Option<PathBuf>,

        /// Email of the admin account
        #[arg(long)]
        email: String,

        /// Display name of the admin account
        #[arg(long)]
        username: Option<String>,
    },
}

fn load_config(path: Option<&Path>) -> anyhow::Result<ServerConfig> {
    match path {
        Some(path) => ServerConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display())),
        None => Ok(ServerConfig::default()),
    }
}

fn run_init(config: &ServerConfig, email: &str, username: Option<String>) -> anyhow::Result<()> {
    let email = email.trim().to_lowercase();
    if validate_email(&email).is_err() {
        bail!("Invalid admin email: {email}");
    }

    fs::create_dir_all(&config.data_dir)?;

    let store = SqliteStore::new(config.db_path())?;
    store.initialize()?;

    let token_file = config.admin_token_path();
    if store.has_admin_user()? || token_file.exists() {
        bail!(
            "Server already initialized. Admin token exists at: {}",
            token_file.display()
        );
    }

    if store.seed_syllabus_if_empty(&SeedSyllabus::canonical()?)? {
        info!("Seeded the canonical syllabus");
    }

    let now = Utc::now();
    let admin = User {
        id: Uuid::new_v4().to_string(),
        email,
        username,
        role: Role::Admin,
        current_level: None,
        created_at: now,
        updated_at: now,
    };
    store.create_user(&admin)?;

    let (raw_token, _) = issue_token(&store, &admin.id, None)?;
    fs::write(&token_file, &raw_token)?;

    #[cfg(unix)]
    set_restrictive_permissions(&token_file);

    println!();
    println!("========================================");
    println!("Admin account: {}", admin.email);
    println!("Admin token (save this, it won't be shown again):");
    println!();
    println!("  {raw_token}");
    println!();
    println!("Token also written to: {}", token_file.display());
    println!("========================================");
    println!();

    Ok(())
}

async fn run_serve(config: ServerConfig) -> anyhow::Result<()> {
    let token_file = config.admin_token_path();
    if !token_file.exists() {
        bail!(NOT_INITIALIZED);
    }

    let store = SqliteStore::new(config.db_path())?;
    store.initialize()?;
    if !store.has_admin_user()? {
        bail!(NOT_INITIALIZED);
    }

    info!("Admin token available at {}", token_file.display());

    let state = Arc::new(AppState::new(Arc::new(store), config.admin_emails.clone()));

    let app = create_router(state);
    let addr = config.socket_addr()?;

    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("studytrack=info".parse()?))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Admin { command } => match command {
            AdminCommands::Init {
                config,
                data_dir,
                email,
                username,
            } => {
                let mut config = load_config(config.as_deref())?;
                if let Some(data_dir) = data_dir {
                    config.data_dir = data_dir;
                }
                run_init(&config, &email, username)?;
            }
        },
        Commands::Serve {
            config,
            host,
            port,
            data_dir,
            admin_emails,
        } => {
            let mut config = load_config(config.as_deref())?;
            if let Some(host) = host {
                config.host = host;
            }
            if let Some(port) = port {
                config.port = port;
            }
            if let Some(data_dir) = data_dir {
                config.data_dir = data_dir;
            }
            config.admin_emails.extend(admin_emails);

            run_serve(config).await?;
        }
    }

    Ok(())
}
