// [libs/domain/models-rs/src/sync.rs]
/*!
 * =================================================================
 * APARATO: PLANNING SYNC CONTRACTS
 * CLASIFICACIÓN: DOMAIN MODELS (ESTRATO L2)
 * RESPONSABILIDAD: MENSAJES DE SINCRONÍA SALIENTE Y EVENTOS ENTRANTES
 * =================================================================
 */

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::channel::ReviewGate;
use crate::status::TaskStatus;
use crate::task::TaskSeed;

/// Mensaje estructural hacia el planning store (patrón Outbox).
/// El Ledger local permanece como única fuente de verdad: la sincronía
/// es best-effort y jamás bloquea el avance del pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncPayload {
    pub planning_page_id: String,
    pub status: TaskStatus,
    /// Campos adicionales a reflejar (publish_url, last_error...).
    #[serde(default)]
    pub fields: serde_json::Map<String, serde_json::Value>,
}

/// Fila durable de la cola de sincronía saliente.
#[derive(Debug, Clone)]
pub struct SyncJob {
    pub id: Uuid,
    pub planning_page_id: String,
    pub payload: SyncPayload,
    pub attempts: u32,
    pub next_attempt_at: DateTime<Utc>,
    pub last_error: Option<String>,
}

/// Evento entrante del planning store (webhook firmado).
///
/// Los tipos desconocidos se reconocen y descartan: el planning store
/// reintenta con agresividad y un 4xx provocaría tormenta de reenvíos.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum PlanningEvent {
    /// Tarea lista para producción: ingesta idempotente hacia la cola.
    #[serde(rename = "task.submitted")]
    TaskSubmitted { task: TaskSeed },

    /// Tarea en borrador: se materializa en DRAFT sin encolar.
    #[serde(rename = "task.draft")]
    TaskDrafted { task: TaskSeed },

    /// Cancelación autorizada desde el planning store.
    #[serde(rename = "task.cancelled")]
    TaskCancelled { planning_page_id: String },

    /// Re-revisión operador de una subida fallida: la fila regresa a la
    /// compuerta final sin re-producción (arista UPLOAD_ERROR -> FINAL_REVIEW).
    #[serde(rename = "task.rereview")]
    TaskRereview { planning_page_id: String },

    /// Veredicto humano sobre una compuerta de revisión.
    #[serde(rename = "review.decision")]
    ReviewDecision {
        planning_page_id: String,
        gate: ReviewGate,
        approved: bool,
        #[serde(default)]
        reason: Option<String>,
    },
}
