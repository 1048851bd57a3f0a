// [apps/orchestrator/src/lib.rs]
/*!
 * =================================================================
 * APARATO: ORCHESTRATOR LIBRARY ROOT
 * CLASIFICACIÓN: APPLICATION SHELL (ESTRATO L3)
 * RESPONSABILIDAD: REGISTRO NOMINAL DE MÓDULOS DEL ORQUESTADOR
 * =================================================================
 */

pub mod config;
pub mod handlers;
pub mod kernel;
pub mod routes;
pub mod services;
pub mod state;

pub mod prelude {
    pub use crate::config::OrchestratorConfig;
    pub use crate::kernel::OrchestratorKernel;
    pub use crate::state::{AppState, StageServices};
}
