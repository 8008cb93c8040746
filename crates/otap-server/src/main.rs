//! otapd — OTAP fleet provisioning server.
//!
//! Devices check in over HTTP to learn whether a firmware upgrade is
//! pending; operators drive the registry and artifact store through the
//! authenticated `/rpc` control surface.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing::info;

use otap_crypto::Verifier;
use otap_server::artifacts::ArtifactStore;
use otap_server::catalog::Catalog;
use otap_server::notify::Notifier;
use otap_server::routes::{AppState, build_router};
use otap_server::storage::Database;

#[derive(Parser, Debug)]
#[command(name = "otapd")]
#[command(version, about = "OTAP fleet provisioning server")]
struct Args {
    /// Address to listen on.
    #[arg(long, default_value = "0.0.0.0:8810", env = "OTAP_LISTEN")]
    addr: SocketAddr,

    /// Path to the SQLite registry database.
    #[arg(long, default_value = "otap.db", env = "OTAP_DB")]
    db_path: PathBuf,

    /// Directory holding version-named firmware artifacts.
    #[arg(long, default_value = "jars", env = "OTAP_JARDIR")]
    jar_dir: PathBuf,

    /// Shared control secret (same value the operator CLI uses).
    #[arg(long, env = "OTC_KEY", hide_env_values = true)]
    secret: String,

    /// External base URL devices are configured against.
    #[arg(long, default_value = "http://localhost:8810", env = "OTAP_BASE_URL")]
    base_url: String,

    /// Notification sink endpoint (disabled when unset).
    #[arg(long, env = "OTAP_NOTIFY_URL")]
    notify_url: Option<String>,

    /// Also record check-ins from identities that are not registered.
    #[arg(long)]
    log_unknown: bool,

    /// Output logs as JSON (for structured log aggregation).
    #[arg(long)]
    log_json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    otap_core::tracing_init::init_tracing("otapd=info", args.log_json);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        addr = %args.addr,
        jar_dir = %args.jar_dir.display(),
        "Starting otapd"
    );

    let db = Database::open(&args.db_path).await?;
    let verifier = Verifier::new(&args.secret)?;
    let store = ArtifactStore::new(Catalog::new(args.jar_dir));
    let notifier = Notifier::new(args.notify_url);

    let state = AppState {
        db,
        store,
        verifier: Arc::new(verifier),
        notifier,
        base_url: args.base_url.trim_end_matches('/').to_string(),
        log_unknown: args.log_unknown,
    };

    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(args.addr).await?;
    info!(addr = %args.addr, "Listening");
    axum::serve(listener, app).await?;
    Ok(())
}
