use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;

use crate::state::AppState;

// ── GET /health ──

pub async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let elapsed = state.started_at.elapsed();
    let hours = elapsed.as_secs() / 3600;
    let minutes = (elapsed.as_secs() % 3600) / 60;
    let uptime = format!("{}h {}m", hours, minutes);

    let storage_ok = tokio::fs::metadata(&state.storage_root)
        .await
        .map(|m| m.is_dir())
        .unwrap_or(false);

    let (status, label, storage) = if storage_ok {
        (StatusCode::OK, "ok", "ok")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "degraded", "unavailable")
    };

    (
        status,
        Json(serde_json::json!({
            "status": label,
            "storage": storage,
            "version": env!("CARGO_PKG_VERSION"),
            "uptime": uptime,
            "started_at": state.started_at_utc.to_rfc3339(),
        })),
    )
}
