use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};

use crate::api::server::AppState;
use crate::storage::{self, entity::Model as NodeEvent};

const DEFAULT_LIMIT: u64 = 100;

#[derive(Serialize)]
pub struct HealthStatus {
    pub version: &'static str,
    pub status: &'static str,
}

#[derive(Debug, Deserialize)]
pub struct EventsQuery {
    pub limit: Option<u64>,
}

pub async fn get_health() -> Json<HealthStatus> {
    Json(HealthStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: "operational",
    })
}

/// Most recent node events, newest first.
pub async fn get_events(
    State(state): State<AppState>,
    Query(query): Query<EventsQuery>,
) -> Result<Json<Vec<NodeEvent>>, StatusCode> {
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT);
    storage::recent_events(&state.db, limit)
        .await
        .map(Json)
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to load node events");
            StatusCode::INTERNAL_SERVER_ERROR
        })
}
