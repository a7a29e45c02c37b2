//! hospital-server binary.
//!
//! Reads `config.toml` (or the path given with `--config`), opens the SQLite
//! store, starts the notification dispatcher and serves the JSON API.
//!
//! # Bootstrapping the first admin
//!
//! ```text
//! hospital-server create-user --email admin@example.org \
//!   --given-name Ada --family-name Admin --role admin
//! ```

use std::{path::PathBuf, sync::Arc};

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use hospital_api::auth::hash_password;
use hospital_core::{
  access::Role,
  store::HospitalStore,
  user::{NewUser, validate_password},
};
use hospital_server::{
  ServerConfig,
  dispatch::Dispatcher,
  mailer::{DisabledMailer, SmtpMailer},
};
use hospital_store_sqlite::SqliteStore;
use tokio::net::TcpListener;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Hospital administration API server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,

  #[command(subcommand)]
  command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
  /// Serve the HTTP API (default).
  Serve,
  /// Create a staff account; the password is read from stdin.
  CreateUser {
    #[arg(long)]
    email:       String,
    #[arg(long)]
    given_name:  String,
    #[arg(long)]
    family_name: String,
    /// One of admin, medecin, rh, infirmier.
    #[arg(long)]
    role:        String,
  },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  // Initialise tracing.
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();
  let config = ServerConfig::load(&cli.config)?;

  let store = SqliteStore::open(&config.store_path)
    .await
    .with_context(|| format!("failed to open store at {:?}", config.store_path))?;

  match cli.command.unwrap_or(Command::Serve) {
    Command::Serve => serve(config, store).await,
    Command::CreateUser { email, given_name, family_name, role } => {
      let role: Role = role.parse()?;
      let password = read_password()?;
      validate_password(&password)?;
      let user = store
        .create_user(NewUser {
          family_name,
          given_name,
          email,
          password_hash: hash_password(&password)?,
          role,
        })
        .await
        .context("failed to create user")?;
      println!("{} {} ({})", user.user_id, user.email, user.role);
      Ok(())
    }
  }
}

async fn serve(config: ServerConfig, store: SqliteStore) -> anyhow::Result<()> {
  let store = Arc::new(store);
  let state = config.app_state(store.clone())?;

  match &config.smtp {
    Some(smtp) => {
      let mailer = SmtpMailer::new(smtp).context("invalid smtp configuration")?;
      tracing::info!(relay = %smtp.host, "patient email enabled");
      let dispatcher = Dispatcher::new(store.clone(), Arc::new(mailer), config.outbox.clone());
      tokio::spawn(dispatcher.run());
    }
    None => {
      tracing::warn!("no [smtp] section; patient notices will not be emailed");
      let dispatcher = Dispatcher::new(store.clone(), Arc::new(DisabledMailer), config.outbox.clone());
      tokio::spawn(dispatcher.run());
    }
  }

  let app = hospital_api::router(state);
  let address = config.address();

  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app).await.context("server error")?;

  Ok(())
}

/// Read a password from stdin.
fn read_password() -> anyhow::Result<String> {
  use std::io::{self, BufRead, Write};
  let stdin = io::stdin();
  print!("Password: ");
  io::stdout().flush().ok();
  let mut line = String::new();
  stdin.lock().read_line(&mut line)?;
  Ok(
    line
      .trim_end_matches('\n')
      .trim_end_matches('\r')
      .to_string(),
  )
}
