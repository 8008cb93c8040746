//! Operator control surface: `POST /rpc`.
//!
//! A single endpoint accepting named calls, each carrying the credential
//! proof. Requests and responses are explicit tagged types; there is no
//! stringly-typed catch-all. Failed authentication always answers with the
//! fixed `unauthorized` sentinel, never an exception past this boundary.
//!
//! This is an operator tool, not a hardened public API: error responses
//! carry human-readable text, but never the shared secret.

use axum::Json;
use axum::extract::State;
use axum::http::HeaderMap;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::storage::Device;

use super::AppState;

/// Identity sentinel addressing every device in `block`.
const ALL_DEVICES: &str = "ALL";

/// A named control call. `auth` is the hex-encoded credential proof.
#[derive(Debug, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum RpcCall {
    Ping {
        auth: String,
    },
    Jars {
        auth: String,
    },
    Add {
        auth: String,
        imei: String,
        custid: String,
        #[serde(default)]
        tid: Option<String>,
    },
    Deliver {
        auth: String,
        imei: String,
        version: String,
    },
    Purge {
        auth: String,
        version: String,
    },
    Block {
        auth: String,
        imei: String,
        block: bool,
    },
    Show {
        auth: String,
        #[serde(default)]
        imei: Option<String>,
    },
    Find {
        auth: String,
        tid: String,
    },
    Config {
        auth: String,
        custid: String,
    },
}

impl RpcCall {
    fn auth(&self) -> &str {
        match self {
            Self::Ping { auth }
            | Self::Jars { auth }
            | Self::Add { auth, .. }
            | Self::Deliver { auth, .. }
            | Self::Purge { auth, .. }
            | Self::Block { auth, .. }
            | Self::Show { auth, .. }
            | Self::Find { auth, .. }
            | Self::Config { auth, .. } => auth,
        }
    }

    const fn method_name(&self) -> &'static str {
        match self {
            Self::Ping { .. } => "ping",
            Self::Jars { .. } => "jars",
            Self::Add { .. } => "add",
            Self::Deliver { .. } => "deliver",
            Self::Purge { .. } => "purge",
            Self::Block { .. } => "block",
            Self::Show { .. } => "show",
            Self::Find { .. } => "find",
            Self::Config { .. } => "config",
        }
    }
}

/// Operator-visible device snapshot.
#[derive(Debug, Serialize)]
pub struct DeviceView {
    pub imei: String,
    pub custid: String,
    pub tid: Option<String>,
    pub reported: Option<String>,
    pub deliver: Option<String>,
    pub block: bool,
    pub settings: Option<String>,
}

impl From<Device> for DeviceView {
    fn from(d: Device) -> Self {
        Self {
            block: d.is_blocked(),
            imei: d.imei,
            custid: d.custid,
            tid: d.tid,
            reported: d.reported,
            deliver: d.deliver,
            settings: d.settings,
        }
    }
}

/// Tagged per-operation response.
#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RpcResponse {
    /// Fixed sentinel for failed authentication, shared by every method.
    Unauthorized,
    /// Operation-level failure with operator-readable text.
    Error { message: String },
    Pong,
    Jars { versions: Vec<String> },
    Added { imei: String },
    Delivering { imei: String, version: String },
    Purged { version: String },
    Blocked { updated: u64, block: bool },
    Devices { devices: Vec<DeviceView> },
    Config { lines: Vec<String> },
}

fn err(message: impl Into<String>) -> RpcResponse {
    RpcResponse::Error {
        message: message.into(),
    }
}

/// `POST /rpc` — verify the proof, then dispatch by method.
pub async fn dispatch(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(call): Json<RpcCall>,
) -> Json<RpcResponse> {
    if !state.verifier.verify(call.auth()) {
        warn!(method = call.method_name(), "Unauthorized control call");
        return Json(RpcResponse::Unauthorized);
    }
    info!(method = call.method_name(), "Control call");

    let response = match call {
        RpcCall::Ping { .. } => RpcResponse::Pong,

        RpcCall::Jars { .. } => match state.store.catalog().list_versions() {
            Ok(versions) => RpcResponse::Jars {
                versions: versions.iter().map(ToString::to_string).collect(),
            },
            Err(e) => err(e.to_string()),
        },

        RpcCall::Add {
            imei, custid, tid, ..
        } => {
            // Best-effort by contract: a storage fault is logged but the
            // operator still gets a success-shaped answer.
            if let Err(e) = state.db.upsert_device(&imei, &custid, tid.as_deref()).await {
                error!(imei = %imei, error = %e, "Device upsert failed");
            }
            RpcResponse::Added { imei }
        }

        RpcCall::Deliver { imei, version, .. } => {
            match state.store.catalog().resolve(&version) {
                Ok(resolved) => match state.db.set_deliver(&imei, Some(&resolved)).await {
                    Ok(true) => RpcResponse::Delivering {
                        imei,
                        version: resolved,
                    },
                    Ok(false) => err(format!("device {imei} not found")),
                    Err(e) => err(e.to_string()),
                },
                Err(e) => err(e.to_string()),
            }
        }

        RpcCall::Purge { version, .. } => match state.store.purge(&state.db, &version).await {
            Ok(()) => RpcResponse::Purged { version },
            Err(e) => err(e.to_string()),
        },

        RpcCall::Block { imei, block, .. } => {
            if imei == ALL_DEVICES {
                match state.db.set_block_all(block).await {
                    Ok(updated) => RpcResponse::Blocked { updated, block },
                    Err(e) => err(e.to_string()),
                }
            } else {
                match state.db.set_block(&imei, block).await {
                    Ok(true) => RpcResponse::Blocked { updated: 1, block },
                    Ok(false) => err(format!("device {imei} not found")),
                    Err(e) => err(e.to_string()),
                }
            }
        }

        RpcCall::Show { imei, .. } => match state.db.list_devices(imei.as_deref()).await {
            Ok(devices) => RpcResponse::Devices {
                devices: devices.into_iter().map(DeviceView::from).collect(),
            },
            Err(e) => err(e.to_string()),
        },

        RpcCall::Find { tid, .. } => match state.db.find_by_tid(&tid).await {
            Ok(devices) => RpcResponse::Devices {
                devices: devices.into_iter().map(DeviceView::from).collect(),
            },
            Err(e) => err(e.to_string()),
        },

        RpcCall::Config { custid, .. } => RpcResponse::Config {
            lines: config_lines(&base_url(&headers, &state), &custid),
        },
    };

    Json(response)
}

/// Provisioning base URL as seen by the caller: prefer the request's Host
/// header, fall back to the configured external base URL.
fn base_url(headers: &HeaderMap, state: &AppState) -> String {
    headers
        .get(axum::http::header::HOST)
        .and_then(|v| v.to_str().ok())
        .map_or_else(|| state.base_url.clone(), |host| format!("http://{host}"))
}

/// The three URI lines a device must be configured with.
fn config_lines(base: &str, custid: &str) -> Vec<String> {
    vec![
        format!("versionURI={base}/otap/{custid}/version"),
        format!("otapURI={base}/otap/{custid}/otap.jad"),
        format!("notifyURI={base}/otap/result/@"),
    ]
}
