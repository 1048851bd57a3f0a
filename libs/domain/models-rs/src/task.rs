// [libs/domain/models-rs/src/task.rs]
/*!
 * =================================================================
 * APARATO: TASK DOMAIN CONTRACTS
 * CLASIFICACIÓN: DOMAIN MODELS (ESTRATO L2)
 * RESPONSABILIDAD: ENTIDAD TAREA Y SEMILLA DE INGESTA
 *
 * La fila de tarea es propiedad exclusiva del worker que la reclama
 * mientras el estado sea worker-held; la única vía de liberación es
 * una transición validada fuera de esa familia.
 * =================================================================
 */

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::status::TaskStatus;

/// Prioridad de despacho dentro de un canal. Jamás preempta la equidad
/// round-robin entre canales.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskPriority {
    High,
    Normal,
    Low,
}

impl TaskPriority {
    /// Peso numérico persistido: mayor peso, mayor urgencia (ORDER BY DESC).
    pub fn weight(&self) -> i64 {
        match self {
            TaskPriority::High => 2,
            TaskPriority::Normal => 1,
            TaskPriority::Low => 0,
        }
    }

    pub fn from_weight(weight: i64) -> TaskPriority {
        match weight {
            2 => TaskPriority::High,
            0 => TaskPriority::Low,
            _ => TaskPriority::Normal,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskPriority::High => "high",
            TaskPriority::Normal => "normal",
            TaskPriority::Low => "low",
        }
    }
}

impl Default for TaskPriority {
    fn default() -> Self {
        TaskPriority::Normal
    }
}

/// Unidad soberana de producción de contenido (un video).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: Uuid,
    pub channel_id: Uuid,
    /// Clave corta del canal, desnormalizada para las consultas calientes
    /// de la cola (evita joins en el camino de reclamo).
    pub channel_key: String,
    /// Ancla de idempotencia hacia el planning store. Única a nivel global.
    pub planning_page_id: String,
    pub title: String,
    pub topic: String,
    pub story_direction: String,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// No nulo exactamente mientras un worker posee la fila.
    pub claimed_at: Option<DateTime<Utc>>,
    pub retry_count: u32,
    /// No nulo sólo en terminales de error con reintento programado.
    pub next_retry_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub publish_url: Option<String>,
    /// Sello del revisor para la compuerta FINAL_REVIEW. Se limpia en
    /// cada entrada a FINAL_REVIEW.
    pub review_approved_at: Option<DateTime<Utc>>,
    /// Etapa de reanudación de un reintento promovido: el reclamo desde
    /// QUEUED abre esta etapa en lugar de la primera. El re-encolado
    /// operador la limpia (reproducción completa).
    pub resume_stage: Option<crate::stage::PipelineStage>,
}

/// Semilla de ingesta: el material mínimo para materializar una tarea.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskSeed {
    pub planning_page_id: String,
    pub channel_key: String,
    pub title: String,
    pub topic: String,
    #[serde(default)]
    pub story_direction: String,
    #[serde(default)]
    pub priority: TaskPriority,
}
