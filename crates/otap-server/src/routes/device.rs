//! Device-facing endpoints: check-in, descriptor fetch, binary download,
//! and the delivery-result callback.
//!
//! These paths are unauthenticated and never return internal error text:
//! every failure mode maps to a fixed sentinel body or a plain 404. Storage
//! faults on the read path fail closed (no upgrade), never open.

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use tracing::{info, warn};

use otap_core::db::unix_timestamp;
use otap_core::settings::Setting;

use crate::delivery;
use crate::notify::NotifyEvent;
use crate::storage::{Device, NewVersionCheck};

use super::AppState;

/// Longest identity accepted from the user-agent convention.
const MAX_IMEI_LEN: usize = 15;

/// Display name advertised in descriptors.
const MIDLET_NAME: &str = "OwnTracks";

/// Extract the device identity from a `<model>/<imei>` user-agent string.
pub(super) fn imei_from_user_agent(ua: &str) -> Option<String> {
    let (_, imei) = ua.rsplit_once('/')?;
    let imei = imei.trim();
    if imei.is_empty() || imei.len() > MAX_IMEI_LEN {
        return None;
    }
    if !imei.chars().all(|c| c.is_ascii_alphanumeric()) {
        return None;
    }
    Some(imei.to_string())
}

fn user_agent_imei(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .and_then(imei_from_user_agent)
}

/// Check-in response body. `new_version` is empty when no upgrade is
/// offered; the device only inspects it when `upgrade` is 1.
#[derive(Debug, Serialize)]
pub struct CheckinResponse {
    pub upgrade: u8,
    pub new_version: String,
    pub settings: Vec<Setting>,
}

impl CheckinResponse {
    fn no_upgrade() -> Self {
        Self {
            upgrade: 0,
            new_version: String::new(),
            settings: Vec::new(),
        }
    }
}

/// `POST /otap/{custid}/version` — periodic device version check.
///
/// Identity comes from the user-agent convention, the raw body is the
/// self-reported version string.
pub async fn version_check(
    Path(custid): Path<String>,
    State(state): State<AppState>,
    headers: HeaderMap,
    body: String,
) -> Json<CheckinResponse> {
    let Some(imei) = user_agent_imei(&headers) else {
        warn!("Check-in without usable user-agent identity");
        return Json(CheckinResponse::no_upgrade());
    };
    let reported = body.trim().to_string();

    let device = match state.db.get_device_scoped(&imei, &custid).await {
        Ok(device) => device,
        Err(e) => {
            // Fail closed: on storage doubt, never leak upgrade eligibility.
            warn!(imei = %imei, error = %e, "Registry read failed during check-in");
            return Json(CheckinResponse::no_upgrade());
        }
    };

    let Some(mut device) = device else {
        info!(imei = %imei, custid = %custid, "Check-in from unknown device");
        if state.log_unknown {
            audit(
                &state,
                &NewVersionCheck {
                    imei,
                    custid: Some(custid),
                    tid: None,
                    reported: Some(reported),
                    upgrade_offered: false,
                    offered_version: None,
                },
            )
            .await;
        }
        return Json(CheckinResponse::no_upgrade());
    };

    // Persist the self-report first so the next decision sees it even if
    // this one is interrupted.
    if let Err(e) = state.db.set_reported(&imei, &reported).await {
        warn!(imei = %imei, error = %e, "Failed to persist reported version");
    }
    device.reported = Some(reported.clone());

    let decision = delivery::decide(Some(&device), state.store.catalog());

    audit(
        &state,
        &NewVersionCheck {
            imei: device.imei.clone(),
            custid: Some(device.custid.clone()),
            tid: device.tid.clone(),
            reported: Some(reported.clone()),
            upgrade_offered: decision.upgrade,
            offered_version: decision.new_version.clone(),
        },
    )
    .await;

    state.notifier.publish(NotifyEvent::Checkin {
        imei: device.imei.clone(),
        custid: device.custid.clone(),
        tid: device.tid.clone(),
        reported,
        upgrade: decision.upgrade,
        offered_version: decision.new_version.clone(),
        tstamp: unix_timestamp(),
    });

    Json(CheckinResponse {
        upgrade: u8::from(decision.upgrade),
        new_version: decision.new_version.unwrap_or_default(),
        settings: decision.settings,
    })
}

/// Append an audit row; insert failures must never fail the check-in.
async fn audit(state: &AppState, check: &NewVersionCheck) {
    if let Err(e) = state.db.insert_versioncheck(check).await {
        warn!(imei = %check.imei, error = %e, "Audit log insert failed");
    }
}

/// `GET /otap/{custid}/otap.jad` — upgrade descriptor.
///
/// Eligibility is re-derived here at fetch time; registry state may have
/// changed since the check-in that led the device here. Unknown and
/// ineligible devices both get a plain 404 so this unauthenticated path
/// leaks no registry existence information.
pub async fn descriptor(
    Path(custid): Path<String>,
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Response {
    let Some(imei) = user_agent_imei(&headers) else {
        return StatusCode::NOT_FOUND.into_response();
    };

    let device = match state.db.get_device_scoped(&imei, &custid).await {
        Ok(Some(device)) => device,
        Ok(None) => return StatusCode::NOT_FOUND.into_response(),
        Err(e) => {
            warn!(imei = %imei, error = %e, "Registry read failed during descriptor fetch");
            return StatusCode::NOT_FOUND.into_response();
        }
    };

    let Some(version) = eligible_target(&device, &state) else {
        return StatusCode::NOT_FOUND.into_response();
    };

    let Ok(size) = state.store.size_of(&version) else {
        warn!(version = %version, "Descriptor requested for missing artifact");
        return StatusCode::NOT_FOUND.into_response();
    };

    let body = format!(
        "MIDlet-Jar-URL: {base}/jars/{version}.jar\r\n\
         MIDlet-Jar-Size: {size}\r\n\
         MIDlet-Version: {version}\r\n\
         MIDlet-Name: {MIDLET_NAME}\r\n\
         MIDlet-Vendor: {MIDLET_NAME}\r\n\
         MicroEdition-Profile: MIDP-2.0\r\n\
         MicroEdition-Configuration: CLDC-1.1\r\n",
        base = state.base_url,
    );

    (
        [
            (header::CONTENT_TYPE, "text/vnd.sun.j2me.app-descriptor"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"otap.jad\"",
            ),
        ],
        body,
    )
        .into_response()
}

/// A device is descriptor-eligible when it is unblocked, has a target, and
/// is not already running it.
fn eligible_target(device: &Device, state: &AppState) -> Option<String> {
    let target = delivery::resolve_target(device, state.store.catalog())?;
    if device.reported.as_deref() == Some(target.as_str()) {
        return None;
    }
    Some(target)
}

/// `GET /jars/{file}` — raw artifact bytes by `<version>.jar` convention.
///
/// Unauthenticated; 404 when the file does not exist regardless of whether
/// the version is known to any device.
pub async fn download(
    Path(file): Path<String>,
    State(state): State<AppState>,
) -> Response {
    // Filename convention only: no separators, no hidden files.
    if file.contains('/') || file.contains('\\') || file.starts_with('.') {
        return StatusCode::NOT_FOUND.into_response();
    }

    let path = state.store.catalog().jar_dir().join(&file);
    match tokio::fs::read(&path).await {
        Ok(bytes) => (
            [
                (header::CONTENT_TYPE, "application/java-archive".to_string()),
                (header::CONTENT_LENGTH, bytes.len().to_string()),
            ],
            bytes,
        )
            .into_response(),
        Err(_) => StatusCode::NOT_FOUND.into_response(),
    }
}

/// `POST /otap/result/{tid}` — delivery-result callback.
///
/// Free-text body describing the outcome of an attempted upgrade. Audit
/// and notification only; no registry state changes. The insert failure
/// is swallowed like every other telemetry write on a device path.
pub async fn delivery_result(
    Path(tid): Path<String>,
    State(state): State<AppState>,
    body: String,
) -> &'static str {
    let result = body.trim().to_string();
    info!(tid = %tid, result = %result, "Delivery result reported");

    if let Err(e) = state.db.insert_delivery_result(&tid, &result).await {
        warn!(tid = %tid, error = %e, "Delivery result insert failed");
    }

    state.notifier.publish(NotifyEvent::DeliveryResult {
        tid,
        result,
        tstamp: unix_timestamp(),
    });

    "OK\n"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_identity_from_user_agent() {
        assert_eq!(
            imei_from_user_agent("XAK/123456789012345").as_deref(),
            Some("123456789012345")
        );
    }

    #[test]
    fn rejects_missing_or_oversized_identity() {
        assert!(imei_from_user_agent("curl/8.5.0 (x86_64)").is_none());
        assert!(imei_from_user_agent("no-slash-here").is_none());
        assert!(imei_from_user_agent("XAK/").is_none());
        assert!(imei_from_user_agent("XAK/1234567890123456").is_none());
    }

    #[test]
    fn takes_the_last_path_segment() {
        assert_eq!(
            imei_from_user_agent("Vendor/Model/42").as_deref(),
            Some("42")
        );
    }
}
