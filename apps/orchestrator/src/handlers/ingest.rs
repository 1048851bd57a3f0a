// [apps/orchestrator/src/handlers/ingest.rs]
/*!
 * =================================================================
 * APARATO: PLANNING WEBHOOK INGEST
 * CLASIFICACIÓN: API ADAPTER LAYER (ESTRATO L3)
 * RESPONSABILIDAD: INGESTA FIRMADA DE EVENTOS DEL MOTOR P
 *
 * Disciplina del endpoint: verificación HMAC de tiempo constante,
 * trabajo exclusivamente corto sobre el Ledger (presupuesto < 500 ms)
 * y ni un byte de trabajo de etapa. Los duplicados los absorbe la
 * unicidad de planning_page_id (409). Tipos de evento desconocidos se
 * reconocen y descartan: el Motor P reintenta con agresividad y un
 * 4xx provocaría tormenta de reenvíos.
 * =================================================================
 */

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use hmac::{Hmac, Mac};
use serde_json::json;
use sha2::Sha256;
use tracing::{info, warn};

use crate::state::AppState;
use showrunner_domain_models::PlanningEvent;
use showrunner_infra_db::DbError;

type PlanningSignature = Hmac<Sha256>;

/// Cabecera de firma del Motor P: `X-Plan-Signature: sha256=<hex>`.
const SIGNATURE_HEADER: &str = "x-plan-signature";

/**
 * POST /webhook/plan — ingesta firmada.
 *
 * Respuestas: 200 aceptado/ignorado, 401 firma inválida,
 * 409 duplicado activo o arista vetada, 404 ancla desconocida,
 * 422 cuerpo o canal inválido.
 */
pub async fn handle_planning_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    // --- 1. VERIFICACIÓN DE FIRMA (TIEMPO CONSTANTE) ---
    if let Err(rejection) = verify_signature(
        &headers,
        &body,
        state.config.planning_webhook_secret.as_bytes(),
    ) {
        warn!("❌ [INGEST]: Signature rejected: {}", rejection);
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "error": "INVALID_SIGNATURE" })),
        )
            .into_response();
    }

    // --- 2. DECODIFICACIÓN DEL EVENTO ---
    let raw_event: serde_json::Value = match serde_json::from_slice(&body) {
        Ok(value) => value,
        Err(decode_fault) => {
            return (
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(json!({ "error": "MALFORMED_EVENT", "detail": decode_fault.to_string() })),
            )
                .into_response();
        }
    };

    const KNOWN_EVENT_KINDS: [&str; 5] = [
        "task.submitted",
        "task.draft",
        "task.cancelled",
        "task.rereview",
        "review.decision",
    ];

    let event: PlanningEvent = match serde_json::from_value(raw_event.clone()) {
        Ok(event) => event,
        Err(decode_fault) => {
            let event_kind = raw_event
                .get("kind")
                .and_then(serde_json::Value::as_str)
                .unwrap_or("<missing>");

            // Un tipo conocido malformado es un 422; un tipo desconocido
            // se reconoce y descarta.
            if KNOWN_EVENT_KINDS.contains(&event_kind) {
                return (
                    StatusCode::UNPROCESSABLE_ENTITY,
                    Json(json!({
                        "error": "MALFORMED_EVENT",
                        "kind": event_kind,
                        "detail": decode_fault.to_string(),
                    })),
                )
                    .into_response();
            }

            info!(kind = event_kind, "🕳️ [INGEST]: Unknown event kind acknowledged and dropped.");
            return (
                StatusCode::OK,
                Json(json!({ "accepted": false, "ignored_kind": event_kind })),
            )
                .into_response();
        }
    };

    // --- 3. DESPACHO CORTO SOBRE EL LEDGER ---
    let verdict = match event {
        PlanningEvent::TaskSubmitted { task } => {
            state.tasks.enqueue(&task).await.map(|accepted| {
                state.queue_waker.notify_waiters();
                json!({
                    "accepted": true,
                    "task_id": accepted.id,
                    "status": accepted.status.as_str(),
                })
            })
        }
        PlanningEvent::TaskDrafted { task } => {
            state.tasks.register_draft(&task).await.map(|draft| {
                json!({
                    "accepted": true,
                    "task_id": draft.id,
                    "status": draft.status.as_str(),
                })
            })
        }
        PlanningEvent::TaskCancelled { planning_page_id } => {
            state.tasks.cancel(&planning_page_id).await.map(|cancelled| {
                json!({
                    "accepted": true,
                    "task_id": cancelled.id,
                    "status": cancelled.status.as_str(),
                })
            })
        }
        PlanningEvent::TaskRereview { planning_page_id } => state
            .tasks
            .reopen_final_review(&planning_page_id)
            .await
            .map(|reopened| {
                json!({
                    "accepted": true,
                    "task_id": reopened.id,
                    "status": reopened.status.as_str(),
                })
            }),
        PlanningEvent::ReviewDecision {
            planning_page_id,
            gate,
            approved,
            reason,
        } => state
            .tasks
            .record_review_decision(&planning_page_id, gate, approved, reason)
            .await
            .map(|reviewed| {
                state.queue_waker.notify_waiters();
                json!({
                    "accepted": true,
                    "task_id": reviewed.id,
                    "status": reviewed.status.as_str(),
                })
            }),
    };

    match verdict {
        Ok(payload) => (StatusCode::OK, Json(payload)).into_response(),
        Err(ledger_fault) => map_ledger_fault(ledger_fault),
    }
}

fn verify_signature(
    headers: &HeaderMap,
    body: &[u8],
    shared_secret: &[u8],
) -> Result<(), &'static str> {
    let signature_header = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok())
        .ok_or("SIGNATURE_HEADER_MISSING")?;

    let hex_signature = signature_header
        .strip_prefix("sha256=")
        .ok_or("SIGNATURE_SCHEME_UNKNOWN")?;

    let claimed_signature = hex::decode(hex_signature).map_err(|_| "SIGNATURE_HEX_MALFORMED")?;

    let mut mac = PlanningSignature::new_from_slice(shared_secret)
        .map_err(|_| "SIGNATURE_KEY_REJECTED")?;
    mac.update(body);

    // verify_slice compara en tiempo constante (CtOutput).
    mac.verify_slice(&claimed_signature)
        .map_err(|_| "SIGNATURE_MISMATCH")
}

fn map_ledger_fault(fault: DbError) -> Response {
    match fault {
        DbError::DuplicateTask { planning_page_id } => (
            StatusCode::CONFLICT,
            Json(json!({ "error": "DUPLICATE_TASK", "planning_page_id": planning_page_id })),
        )
            .into_response(),
        DbError::IllegalTransition(transition_fault) => (
            StatusCode::CONFLICT,
            Json(json!({ "error": "ILLEGAL_TRANSITION", "detail": transition_fault.to_string() })),
        )
            .into_response(),
        DbError::TaskNotFound => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "TASK_NOT_FOUND" })),
        )
            .into_response(),
        DbError::ChannelNotFound(channel_key) => (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({ "error": "CHANNEL_NOT_FOUND", "channel_key": channel_key })),
        )
            .into_response(),
        other => {
            warn!("❌ [INGEST]: Ledger fault during dispatch: {}", other);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "LEDGER_FAULT" })),
            )
                .into_response()
        }
    }
}
