// [apps/orchestrator/src/handlers/health.rs]
/*!
 * =================================================================
 * APARATO: HEALTH & READINESS PROBES
 * CLASIFICACIÓN: API ADAPTER LAYER (ESTRATO L3)
 * RESPONSABILIDAD: LIVENESS Y READINESS PARA EL PLANO DE DESPLIEGUE
 * =================================================================
 */

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::warn;

use crate::state::AppState;

/// GET /health — liveness plano.
pub async fn handle_health() -> &'static str {
    "STATUS_OK"
}

/**
 * GET /ready — readiness real: Ledger alcanzable y bóveda armada.
 * Durante el drenado de apagado el probe degrada a 503.
 */
pub async fn handle_ready(State(state): State<AppState>) -> Response {
    if !state.is_operational() {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "ready": false, "reason": "DRAINING" })),
        )
            .into_response();
    }

    // Sonda mínima del Ledger (conexión + consulta trivial).
    let ledger_ready = match state.database_client.get_connection() {
        Ok(connection) => connection.query("SELECT 1", ()).await.is_ok(),
        Err(probe_fault) => {
            warn!("⚠️ [READY]: Ledger probe failed: {}", probe_fault);
            false
        }
    };

    let vault_armed = !state.config.encryption_key.is_empty();

    if ledger_ready && vault_armed {
        (
            StatusCode::OK,
            Json(json!({ "ready": true, "ledger": true, "vault": true })),
        )
            .into_response()
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "ready": false, "ledger": ledger_ready, "vault": vault_armed })),
        )
            .into_response()
    }
}
