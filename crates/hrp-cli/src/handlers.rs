//! Route handlers

use axum::extract::{Multipart, Path, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};

use crate::error::ApiError;
use crate::server::AppState;

/// Multipart field carrying the uploaded chart
const CHART_FIELD: &str = "chart";

pub async fn health() -> StatusCode {
    StatusCode::OK
}

pub async fn get_index(State(state): State<AppState>) -> Result<Response, ApiError> {
    let index = state.backend.get_index().await?;
    Ok(([(header::CONTENT_TYPE, "text/yaml")], index).into_response())
}

pub async fn get_chart(
    State(state): State<AppState>,
    Path(chart): Path<String>,
) -> Result<Response, ApiError> {
    let data = state.backend.get_chart(&chart).await?;
    Ok(([(header::CONTENT_TYPE, "application/gzip")], data).into_response())
}

/// Store the file sent in the `chart` field, then reindex
pub async fn put_chart(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<StatusCode, ApiError> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(CHART_FIELD) {
            continue;
        }
        let filename = field
            .file_name()
            .map(base_name)
            .ok_or(ApiError::MissingField(CHART_FIELD))?;
        let data = field.bytes().await?;

        tracing::info!(chart = %filename, bytes = data.len(), "putting chart");
        state.backend.put_chart(&filename, data).await?;
        return Ok(StatusCode::OK);
    }
    Err(ApiError::MissingField(CHART_FIELD))
}

pub async fn reindex(State(state): State<AppState>) -> Result<StatusCode, ApiError> {
    state.backend.reindex().await?;
    Ok(StatusCode::OK)
}

/// Clients may send a full path as the filename; only the last segment counts
fn base_name(filename: &str) -> String {
    filename
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(filename)
        .to_string()
}
