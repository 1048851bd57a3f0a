// [libs/infra/db-turso/src/repositories/channel.rs]
/*!
 * =================================================================
 * APARATO: CHANNEL REPOSITORY
 * CLASIFICACIÓN: INFRASTRUCTURE LAYER (ESTRATO L3)
 * RESPONSABILIDAD: CICLO DE VIDA DE TENANTS (ALTA, NIVELACIÓN, ARCHIVO)
 *
 * Un canal jamás se destruye: el archivado se expresa con active = 0
 * para preservar la integridad referencial de las tareas históricas.
 * =================================================================
 */

use chrono::Utc;
use libsql::{params, Connection, Row};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::client::TursoClient;
use crate::errors::DbError;
use crate::repositories::codec;
use showrunner_domain_models::{Channel, ChannelSeed, ReviewGate, StorageStrategy};

const UPSERT_CHANNEL: &str = r#"
    INSERT INTO channels (
        id, key, display_name, active, voice_id, branding_json,
        storage_strategy, max_concurrent, publish_binding, auto_approve_json,
        created_at, updated_at
    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?11)
    ON CONFLICT(key) DO UPDATE SET
        display_name = excluded.display_name,
        active = excluded.active,
        voice_id = excluded.voice_id,
        branding_json = excluded.branding_json,
        storage_strategy = excluded.storage_strategy,
        max_concurrent = excluded.max_concurrent,
        publish_binding = excluded.publish_binding,
        auto_approve_json = excluded.auto_approve_json,
        updated_at = excluded.updated_at
"#;

const FIND_CHANNEL_BY_KEY: &str = r#"
    SELECT id, key, display_name, active, voice_id, branding_json,
           storage_strategy, max_concurrent, publish_binding, auto_approve_json,
           last_claimed_at
    FROM channels
    WHERE key = ?1
"#;

const FIND_CHANNEL_BY_ID: &str = r#"
    SELECT id, key, display_name, active, voice_id, branding_json,
           storage_strategy, max_concurrent, publish_binding, auto_approve_json,
           last_claimed_at
    FROM channels
    WHERE id = ?1
"#;

const LIST_ACTIVE_CHANNELS: &str = r#"
    SELECT id, key, display_name, active, voice_id, branding_json,
           storage_strategy, max_concurrent, publish_binding, auto_approve_json,
           last_claimed_at
    FROM channels
    WHERE active = 1
    ORDER BY key ASC
"#;

pub struct ChannelRepository {
    database_client: TursoClient,
}

impl ChannelRepository {
    pub fn new(database_client: TursoClient) -> Self {
        Self { database_client }
    }

    /**
     * Nivela un canal declarado en `channels.yaml` contra el Ledger.
     * La identidad (id) se preserva entre nivelaciones vía conflicto
     * sobre la clave humana única.
     */
    #[instrument(skip(self, seed), fields(channel_key = %seed.key))]
    pub async fn upsert_from_seed(&self, seed: &ChannelSeed) -> Result<Channel, DbError> {
        let connection = self.database_client.get_connection()?;
        let now_wire = codec::to_wire(Utc::now());

        let branding_json = serde_json::to_string(&seed.branding)
            .map_err(|fault| DbError::MappingError(format!("BRANDING_ENCODE: {fault}")))?;
        let auto_approve_json = serde_json::to_string(&seed.auto_approve)
            .map_err(|fault| DbError::MappingError(format!("AUTO_APPROVE_ENCODE: {fault}")))?;

        connection
            .execute(
                UPSERT_CHANNEL,
                params![
                    Uuid::new_v4().to_string(),
                    seed.key.clone(),
                    seed.display_name.clone(),
                    seed.active as i64,
                    seed.voice_id.clone(),
                    branding_json,
                    seed.storage_strategy.as_str(),
                    seed.max_concurrent as i64,
                    seed.publish_binding.clone(),
                    auto_approve_json,
                    now_wire
                ],
            )
            .await?;

        let leveled = self
            .find_by_key(&seed.key)
            .await?
            .ok_or(DbError::ChannelNotFound(seed.key.clone()))?;

        info!(
            channel_key = %leveled.key,
            max_concurrent = leveled.max_concurrent,
            "📡 [CHANNEL]: Tenant leveled in ledger."
        );
        Ok(leveled)
    }

    /// Archiva los canales activos ausentes del inventario declarado.
    #[instrument(skip(self, declared_keys))]
    pub async fn archive_missing(&self, declared_keys: &[String]) -> Result<u64, DbError> {
        let connection = self.database_client.get_connection()?;
        let now_wire = codec::to_wire(Utc::now());

        let mut archived = 0u64;
        for channel in self.list_active().await? {
            if declared_keys.iter().any(|key| key == &channel.key) {
                continue;
            }
            archived += connection
                .execute(
                    "UPDATE channels SET active = 0, updated_at = ?1 WHERE key = ?2",
                    params![now_wire.clone(), channel.key.clone()],
                )
                .await?;
        }

        if archived > 0 {
            info!(archived, "🗄️ [CHANNEL]: Undeclared tenants archived.");
        }
        Ok(archived)
    }

    pub async fn find_by_key(&self, key: &str) -> Result<Option<Channel>, DbError> {
        let connection = self.database_client.get_connection()?;
        let mut rows = connection.query(FIND_CHANNEL_BY_KEY, params![key]).await?;
        match rows.next().await? {
            Some(row) => Ok(Some(map_row_to_channel(&row)?)),
            None => Ok(None),
        }
    }

    pub async fn find_by_id(&self, channel_id: Uuid) -> Result<Option<Channel>, DbError> {
        let connection = self.database_client.get_connection()?;
        let mut rows = connection
            .query(FIND_CHANNEL_BY_ID, params![channel_id.to_string()])
            .await?;
        match rows.next().await? {
            Some(row) => Ok(Some(map_row_to_channel(&row)?)),
            None => Ok(None),
        }
    }

    pub async fn list_active(&self) -> Result<Vec<Channel>, DbError> {
        let connection = self.database_client.get_connection()?;
        let mut rows = connection.query(LIST_ACTIVE_CHANNELS, ()).await?;
        let mut channels = Vec::new();
        while let Some(row) = rows.next().await? {
            channels.push(map_row_to_channel(&row)?);
        }
        Ok(channels)
    }
}

/// Transforma una fila del Ledger en la entidad de dominio.
/// El orden de columnas es el contrato de las proyecciones SELECT.
pub(crate) fn map_row_to_channel(row: &Row) -> Result<Channel, DbError> {
    let id_raw: String = row.get(0)?;
    let key: String = row.get(1)?;
    let display_name: String = row.get(2)?;
    let active: i64 = row.get(3)?;
    let voice_id: String = row.get(4)?;
    let branding_json: String = row.get(5)?;
    let storage_raw: String = row.get(6)?;
    let max_concurrent: i64 = row.get(7)?;
    let publish_binding: String = row.get(8)?;
    let auto_approve_json: String = row.get(9)?;
    let last_claimed_raw: Option<String> = row.get::<String>(10).ok();

    let branding = serde_json::from_str(&branding_json)
        .map_err(|fault| DbError::MappingError(format!("BRANDING_DECODE: {fault}")))?;
    let auto_approve: Vec<ReviewGate> = serde_json::from_str(&auto_approve_json)
        .map_err(|fault| DbError::MappingError(format!("AUTO_APPROVE_DECODE: {fault}")))?;
    let storage_strategy = StorageStrategy::parse(&storage_raw)
        .ok_or_else(|| DbError::MappingError(format!("STORAGE_STRATEGY_DECODE [{storage_raw}]")))?;

    Ok(Channel {
        id: codec::parse_uuid(&id_raw)?,
        key,
        display_name,
        active: active != 0,
        voice_id,
        branding,
        storage_strategy,
        max_concurrent: max_concurrent as u32,
        publish_binding,
        auto_approve,
        last_claimed_at: codec::parse_wire_optional(last_claimed_raw)?,
    })
}
