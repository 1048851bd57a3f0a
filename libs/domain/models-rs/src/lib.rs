// [libs/domain/models-rs/src/lib.rs]
/*!
 * =================================================================
 * APARATO: SHOWRUNNER DOMAIN MODELS (PRODUCTION MASTER)
 * CLASIFICACIÓN: DOMAIN MODELS (ESTRATO L2)
 * RESPONSABILIDAD: CONTRATOS SOBERANOS DEL PIPELINE DE PRODUCCIÓN
 *
 * Single Source of Truth del dominio: el resto de los estratos
 * (Ledger, Provider Mesh, Orquestador) consumen estos tipos sin
 * redefinirlos. Ningún módulo de este aparato toca red ni disco.
 * =================================================================
 */

pub mod channel;
pub mod stage;
pub mod status;
pub mod sync;
pub mod task;

pub use channel::{Channel, ChannelSeed, ReviewGate, StorageStrategy, DEFAULT_MAX_CONCURRENT};
pub use stage::{ExternalService, PipelineStage};
pub use status::{InvalidStateTransition, TaskStatus};
pub use sync::{PlanningEvent, SyncJob, SyncPayload};
pub use task::{Task, TaskPriority, TaskSeed};
