//! Authenticated artifact upload: `POST /up`.
//!
//! Multipart form with a `auth` credential field, a `jar` binary field,
//! and an optional `overwrite` flag. The artifact is stored under its
//! embedded manifest version; the uploaded filename is ignored.

use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use tracing::{error, warn};

use crate::artifacts::ArtifactError;

use super::AppState;

pub async fn upload(State(state): State<AppState>, mut multipart: Multipart) -> Response {
    let mut auth: Option<String> = None;
    let mut jar: Option<Vec<u8>> = None;
    let mut overwrite = false;

    while let Ok(Some(field)) = multipart.next_field().await {
        match field.name() {
            Some("auth") => auth = field.text().await.ok(),
            Some("jar") => jar = field.bytes().await.ok().map(|b| b.to_vec()),
            Some("overwrite") => {
                overwrite = matches!(
                    field.text().await.as_deref(),
                    Ok("1") | Ok("true") | Ok("yes")
                );
            }
            _ => {}
        }
    }

    let authorized = auth.as_deref().is_some_and(|proof| state.verifier.verify(proof));
    if !authorized {
        warn!("Unauthorized upload attempt");
        return (StatusCode::UNAUTHORIZED, "unauthorized\n").into_response();
    }

    let Some(jar) = jar else {
        return (StatusCode::BAD_REQUEST, "missing jar field\n").into_response();
    };

    match state.store.store(&jar, overwrite) {
        Ok((version, path)) => (
            StatusCode::OK,
            format!("stored version {version} at {}\n", path.display()),
        )
            .into_response(),
        Err(e @ ArtifactError::VersionExtraction(_)) => {
            (StatusCode::BAD_REQUEST, format!("{e}\n")).into_response()
        }
        Err(e @ ArtifactError::ArtifactExists(_)) => {
            (StatusCode::CONFLICT, format!("{e}\n")).into_response()
        }
        Err(e) => {
            error!(error = %e, "Artifact store failed");
            (StatusCode::INTERNAL_SERVER_ERROR, "storage failure\n").into_response()
        }
    }
}
