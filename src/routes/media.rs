use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};

use crate::state::AppState;

/// GET /static/{*path}: uploaded files and the bundled defaults.
pub async fn serve(State(state): State<AppState>, Path(path): Path<String>) -> Response {
    let Some(local) = state.media.resolve(&path) else {
        return StatusCode::NOT_FOUND.into_response();
    };

    match tokio::fs::read(&local).await {
        Ok(data) => {
            let mime = mime_guess::from_path(&local).first_or_octet_stream();
            (
                StatusCode::OK,
                [
                    (header::CONTENT_TYPE, mime.as_ref().to_string()),
                    (header::CACHE_CONTROL, "public, max-age=86400".to_string()),
                ],
                data,
            )
                .into_response()
        }
        Err(e) => {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!("Failed to read {}: {}", local.display(), e);
            }
            StatusCode::NOT_FOUND.into_response()
        }
    }
}
