//! mentor-match server binary.
//!
//! Reads `config.toml` (or the path given with `--config`) layered under
//! `MATCH__*` environment variables, connects to Salesforce and serves the
//! backend over HTTP. Sessions live in memory unless `session.store_path`
//! names a SQLite file.

use std::{
  path::{Path, PathBuf},
  sync::Arc,
  time::Duration,
};

use anyhow::Context as _;
use clap::Parser;
use mentor_core::session::{MemorySessionStore, SessionStore};
use mentor_salesforce::SalesforceConnector;
use mentor_server::{AppState, ServerConfig};
use mentor_store_sqlite::SqliteSessionStore;
use tokio::net::TcpListener;
use tracing::{info, level_filters::LevelFilter, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Match backend server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,

  /// Seconds between sweeps that drop expired sessions.
  #[arg(long, default_value_t = 300)]
  purge_interval_secs: u64,
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

  // Load configuration.
  let settings = config::Config::builder()
    .add_source(config::File::from(cli.config).required(false))
    .add_source(
      config::Environment::with_prefix("MATCH")
        .separator("__")
        .try_parsing(true),
    )
    .build()
    .context("failed to read config file")?;

  let server_cfg: ServerConfig = settings
    .try_deserialize()
    .context("failed to deserialise ServerConfig")?;

  let connector = SalesforceConnector::new(server_cfg.salesforce_config())
    .context("failed to set up the Salesforce connector")?;

  let purge_every = Duration::from_secs(cli.purge_interval_secs.max(1));
  let ttl = server_cfg.session.ttl();

  match server_cfg.session.store_path.as_deref().map(expand_tilde) {
    Some(path) => {
      let sessions = SqliteSessionStore::open(&path, ttl)
        .await
        .with_context(|| format!("failed to open session store at {path:?}"))?;
      info!(?path, "sessions stored in SQLite");
      serve(server_cfg, connector, sessions, purge_every).await
    }
    None => {
      info!("sessions stored in memory");
      serve(server_cfg, connector, MemorySessionStore::new(ttl), purge_every).await
    }
  }
}

async fn serve<S: SessionStore>(
  server_cfg:  ServerConfig,
  connector:   SalesforceConnector,
  sessions:    S,
  purge_every: Duration,
) -> anyhow::Result<()> {
  let address = format!("{}:{}", server_cfg.host, server_cfg.port);
  let state = AppState::new(connector, sessions, server_cfg);

  spawn_purge(Arc::clone(&state.sessions), purge_every);

  let app = mentor_server::router(state);

  info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app).await.context("server error")?;

  Ok(())
}

/// Periodically drop expired sessions for the life of the process.
fn spawn_purge<S: SessionStore>(sessions: Arc<S>, every: Duration) {
  tokio::spawn(async move {
    let mut tick = tokio::time::interval(every);
    loop {
      tick.tick().await;
      match sessions.purge_expired().await {
        Ok(0) => {}
        Ok(removed) => info!(removed, "purged expired sessions"),
        Err(e) => warn!(error = %e, "session purge failed"),
      }
    }
  });
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
