use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::Utc;
use tracing::error;

use crate::metrics;
use crate::model::{DevicesResponse, DeviceView};
use crate::table::MetricsTable;

const EXPOSITION_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

#[derive(Debug, Clone)]
struct AppState {
    table: Arc<MetricsTable>,
}

/// Scrape endpoint plus a JSON view of the same table.
pub fn create_router(table: Arc<MetricsTable>) -> Router {
    let state = AppState { table };

    Router::new()
        .route("/metrics", get(metrics_handler))
        .route("/api/v1/devices", get(get_devices))
        .with_state(state)
}

async fn metrics_handler(State(state): State<AppState>) -> Result<Response, AppError> {
    let body = metrics::render(&state.table.snapshot())?;
    Ok(([(header::CONTENT_TYPE, EXPOSITION_CONTENT_TYPE)], body).into_response())
}

async fn get_devices(State(state): State<AppState>) -> Json<DevicesResponse> {
    let now = Utc::now();
    let mut snapshot = state.table.snapshot();
    snapshot.sort_by_key(|(key, _)| *key);

    let data: Vec<DeviceView> = snapshot
        .iter()
        .map(|(key, device)| DeviceView::new(key, device, now))
        .collect();

    Json(DevicesResponse {
        total: data.len(),
        data,
    })
}

struct AppError(anyhow::Error);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        error!("API error: {}", self.0);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Internal server error: {}", self.0),
        )
            .into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}
