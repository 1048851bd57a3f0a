// [libs/infra/db-turso/src/lib.rs]
/*!
 * =================================================================
 * APARATO: TACTICAL PERSISTENCE ADAPTER (MOTOR A)
 * CLASIFICACIÓN: INFRASTRUCTURE LAYER (ESTRATO L3)
 * RESPONSABILIDAD: FACHADA DEL LEDGER DE PRODUCCIÓN
 * =================================================================
 */

pub mod client;
pub mod errors;
pub mod repositories;
pub mod schema;

pub use client::TursoClient;
pub use errors::DbError;
