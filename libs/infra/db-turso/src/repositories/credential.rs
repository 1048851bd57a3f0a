// [libs/infra/db-turso/src/repositories/credential.rs]
/*!
 * =================================================================
 * APARATO: CREDENTIAL REPOSITORY
 * CLASIFICACIÓN: INFRASTRUCTURE LAYER (ESTRATO L3)
 * RESPONSABILIDAD: CUSTODIA CIPHERTEXT-ONLY DE BUNDLES DE TOKENS
 *
 * El Ledger jamás ve material en claro: este repositorio transporta
 * exclusivamente el sellado Base64 del motor de bóveda (L1).
 * =================================================================
 */

use chrono::{DateTime, Utc};
use libsql::params;
use tracing::instrument;
use uuid::Uuid;

use crate::client::TursoClient;
use crate::errors::DbError;
use crate::repositories::codec;
use showrunner_domain_models::ExternalService;

const UPSERT_CREDENTIAL: &str = r#"
    INSERT INTO credentials (channel_id, service, ciphertext, refreshed_at, expires_at)
    VALUES (?1, ?2, ?3, ?4, ?5)
    ON CONFLICT(channel_id, service) DO UPDATE SET
        ciphertext = excluded.ciphertext,
        refreshed_at = excluded.refreshed_at,
        expires_at = excluded.expires_at
"#;

const FIND_CREDENTIAL: &str = r#"
    SELECT ciphertext, refreshed_at, expires_at
    FROM credentials
    WHERE channel_id = ?1 AND service = ?2
"#;

const REVOKE_CREDENTIAL: &str = r#"
    DELETE FROM credentials WHERE channel_id = ?1 AND service = ?2
"#;

/// Fila de custodia tal como reposa en el Ledger.
#[derive(Debug, Clone)]
pub struct CredentialRecord {
    pub ciphertext: String,
    pub refreshed_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
}

pub struct CredentialRepository {
    database_client: TursoClient,
}

impl CredentialRepository {
    pub fn new(database_client: TursoClient) -> Self {
        Self { database_client }
    }

    #[instrument(skip(self, sealed_ciphertext))]
    pub async fn store(
        &self,
        channel_id: Uuid,
        service: ExternalService,
        sealed_ciphertext: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), DbError> {
        let connection = self.database_client.get_connection()?;
        connection
            .execute(
                UPSERT_CREDENTIAL,
                params![
                    channel_id.to_string(),
                    service.as_str(),
                    sealed_ciphertext,
                    codec::to_wire(Utc::now()),
                    codec::to_wire(expires_at)
                ],
            )
            .await?;
        Ok(())
    }

    pub async fn fetch(
        &self,
        channel_id: Uuid,
        service: ExternalService,
    ) -> Result<Option<CredentialRecord>, DbError> {
        let connection = self.database_client.get_connection()?;
        let mut rows = connection
            .query(
                FIND_CREDENTIAL,
                params![channel_id.to_string(), service.as_str()],
            )
            .await?;

        match rows.next().await? {
            Some(row) => {
                let ciphertext: String = row.get(0)?;
                let refreshed_raw: Option<String> = row.get::<String>(1).ok();
                let expires_raw: Option<String> = row.get::<String>(2).ok();
                Ok(Some(CredentialRecord {
                    ciphertext,
                    refreshed_at: codec::parse_wire_optional(refreshed_raw)?,
                    expires_at: codec::parse_wire_optional(expires_raw)?,
                }))
            }
            None => Ok(None),
        }
    }

    /// Revocación de operador: la fila desaparece y la próxima etapa
    /// que la requiera fallará con CredentialExpired.
    #[instrument(skip(self))]
    pub async fn revoke(
        &self,
        channel_id: Uuid,
        service: ExternalService,
    ) -> Result<bool, DbError> {
        let connection = self.database_client.get_connection()?;
        let revoked = connection
            .execute(
                REVOKE_CREDENTIAL,
                params![channel_id.to_string(), service.as_str()],
            )
            .await?;
        Ok(revoked > 0)
    }
}
