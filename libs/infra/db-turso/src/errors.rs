// [libs/infra/db-turso/src/errors.rs]
/*!
 * =================================================================
 * APARATO: DATABASE ERROR CATALOG
 * CLASIFICACIÓN: INFRASTRUCTURE CORE (ESTRATO L3)
 * RESPONSABILIDAD: CATALOGACIÓN SEMÁNTICA DE FALLOS DE PERSISTENCIA
 *
 * Los mensajes portan prefijos de estrato para su triage cromático
 * en el colector de observabilidad.
 * =================================================================
 */

use showrunner_domain_models::InvalidStateTransition;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    /// Error de enlace físico o de red con el cluster de Turso.
    #[error("[L3_DB_NET_FAULT]: DATABASE_UPLINK_SEVERED -> {0}")]
    ConnectionError(String),

    /// Fallo en la configuración del entorno (variables vacías o malformadas).
    #[error("[L3_DB_CONFIG_FAULT]: STRATEGIC_ENV_VOID -> {0}")]
    ConfigurationError(String),

    /// Error de sintaxis o ejecución devuelto por el motor libSQL.
    #[error("[L3_DB_QUERY_FAULT]: SQL_QUERY_REJECTED -> {0}")]
    QueryError(#[from] libsql::Error),

    /// Fallo en la transformación de tipos entre SQLite y el Dominio Rust.
    #[error("[L3_DB_MAPPING_FAULT]: DATA_MAPPING_VIOLATION -> {0}")]
    MappingError(String),

    /// Error al comprometer cambios en una secuencia multi-tabla.
    #[error("[L3_DB_FAULT]: TRANSACTION_COLLAPSE")]
    TransactionError,

    // --- ESTRATO DE CONTROL DE TAREAS (L2/L3) ---

    /// La tarea solicitada no existe en el Ledger.
    #[error("[L3_TASK_FAULT]: IDENTIFIER_NOT_FOUND")]
    TaskNotFound,

    /// El canal referenciado no existe o está archivado.
    #[error("[L3_TASK_FAULT]: CHANNEL_NOT_FOUND -> {0}")]
    ChannelNotFound(String),

    /// Ingesta duplicada: ya existe una tarea activa con esa ancla.
    #[error("[L3_TASK_FAULT]: DUPLICATE_TASK -> {planning_page_id}")]
    DuplicateTask { planning_page_id: String },

    /// Conflicto de propiedad: la fila cambió bajo los pies del worker.
    #[error("[L3_TASK_FAULT]: OWNERSHIP_VIOLATION")]
    OwnershipConflict,

    /// Arista de ciclo de vida vetada por el validador soberano.
    #[error("[L3_TASK_FAULT]: {0}")]
    IllegalTransition(#[from] InvalidStateTransition),
}
