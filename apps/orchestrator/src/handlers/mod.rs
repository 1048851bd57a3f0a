// [apps/orchestrator/src/handlers/mod.rs]
/*!
 * =================================================================
 * APARATO: HANDLER REGISTRY
 * CLASIFICACIÓN: API ADAPTER LAYER (ESTRATO L3)
 * RESPONSABILIDAD: REGISTRO DE ADAPTADORES HTTP DEL ORQUESTADOR
 * =================================================================
 */

pub mod health;
pub mod ingest;
