//! HTTP surface of the provisioning server.
//!
//! Three unauthenticated device-facing paths (check-in, descriptor,
//! download), the delivery-result callback, the authenticated multipart
//! upload, and the authenticated operator control surface on `/rpc`.

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use tower_http::trace::TraceLayer;

use otap_crypto::Verifier;

use crate::artifacts::ArtifactStore;
use crate::notify::Notifier;
use crate::storage::Database;

pub mod device;
pub mod rpc;
pub mod upload;

/// Shared application state, constructed once in `main` and cloned into
/// every handler.
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub store: ArtifactStore,
    pub verifier: Arc<Verifier>,
    pub notifier: Notifier,
    /// External base URL devices are configured against (no trailing `/`).
    pub base_url: String,
    /// Also write audit rows for check-ins from unregistered identities.
    pub log_unknown: bool,
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/otap/{custid}/version", post(device::version_check))
        .route("/otap/{custid}/version.php", post(device::version_check))
        .route("/otap/{custid}/otap.jad", get(device::descriptor))
        .route("/otap/result/{tid}", post(device::delivery_result))
        .route("/jars/{file}", get(device::download))
        .route("/up", post(upload::upload))
        .route("/rpc", post(rpc::dispatch))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn index() -> &'static str {
    "OTAP provisioning server\n"
}
