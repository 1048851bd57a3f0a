// [apps/orchestrator/src/services/mod.rs]
/*!
 * =================================================================
 * APARATO: SERVICE REGISTRY
 * CLASIFICACIÓN: BACKGROUND INFRASTRUCTURE (ESTRATO L4)
 * RESPONSABILIDAD: REGISTRO DE DAEMONS Y MOTORES DEL ORQUESTADOR
 * =================================================================
 */

pub mod alert;
pub mod credentials;
pub mod reaper;
pub mod retry_marshal;
pub mod stages;
pub mod sync_relay;
pub mod worker_pool;
