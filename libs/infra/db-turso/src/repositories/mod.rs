// [libs/infra/db-turso/src/repositories/mod.rs]
/*!
 * =================================================================
 * APARATO: REPOSITORY REGISTRY
 * CLASIFICACIÓN: INFRASTRUCTURE LAYER (ESTRATO L3)
 * RESPONSABILIDAD: REGISTRO DE AUTORIDADES DE PERSISTENCIA
 * =================================================================
 */

pub mod channel;
pub mod credential;
pub mod queue;
pub mod rate_limit;
pub mod sync_outbox;

pub use channel::ChannelRepository;
pub use credential::{CredentialRecord, CredentialRepository};
pub use queue::{ClaimedWork, StageFinalize, TaskRepository};
pub use rate_limit::{GateDecision, GatePolicy, RateLimitRepository, WindowRule, GLOBAL_SCOPE};
pub use sync_outbox::SyncOutboxRepository;

/// Codificación temporal e identidades compartida entre repositorios.
/// Convención: RFC3339 UTC en toda columna comparable del Ledger.
pub(crate) mod codec {
    use crate::errors::DbError;
    use chrono::{DateTime, Utc};
    use uuid::Uuid;

    pub fn to_wire(timestamp: DateTime<Utc>) -> String {
        timestamp.to_rfc3339()
    }

    pub fn parse_wire(raw: &str) -> Result<DateTime<Utc>, DbError> {
        DateTime::parse_from_rfc3339(raw)
            .map(|parsed| parsed.with_timezone(&Utc))
            .map_err(|fault| {
                DbError::MappingError(format!("TIMESTAMP_DECODE [{raw}]: {fault}"))
            })
    }

    pub fn parse_wire_optional(raw: Option<String>) -> Result<Option<DateTime<Utc>>, DbError> {
        raw.map(|value| parse_wire(&value)).transpose()
    }

    pub fn parse_uuid(raw: &str) -> Result<Uuid, DbError> {
        Uuid::parse_str(raw)
            .map_err(|fault| DbError::MappingError(format!("UUID_DECODE [{raw}]: {fault}")))
    }

    /// Texto opcional hacia el Ledger: None se persiste como NULL.
    pub fn opt_text(value: Option<String>) -> libsql::Value {
        match value {
            Some(text) => libsql::Value::Text(text),
            None => libsql::Value::Null,
        }
    }
}
