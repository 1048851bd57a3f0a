// [libs/infra/db-turso/src/repositories/sync_outbox.rs]
/*!
 * =================================================================
 * APARATO: PLANNING SYNC OUTBOX
 * CLASIFICACIÓN: INFRASTRUCTURE LAYER (ESTRATO L3)
 * RESPONSABILIDAD: COLA DURABLE DE SINCRONÍA SALIENTE (PATRÓN OUTBOX)
 *
 * La fila de outbox se inserta dentro de la MISMA transacción que
 * sella el cambio de estado: si el sellado comete, la sincronía
 * existe; si aborta, no hay mensaje fantasma. El relay drena con
 * reintentos acotados y descarta con advertencia al agotarse.
 * =================================================================
 */

use chrono::{DateTime, Utc};
use libsql::{params, Connection};
use tracing::{instrument, warn};
use uuid::Uuid;

use crate::client::TursoClient;
use crate::errors::DbError;
use crate::repositories::codec;
use showrunner_domain_models::{SyncJob, SyncPayload};

const INSERT_SYNC_JOB: &str = r#"
    INSERT INTO sync_jobs (id, planning_page_id, payload_json, attempts, next_attempt_at, created_at)
    VALUES (?1, ?2, ?3, 0, ?4, ?4)
"#;

const FIND_DUE_SYNC_JOBS: &str = r#"
    SELECT id, planning_page_id, payload_json, attempts, next_attempt_at, last_error
    FROM sync_jobs
    WHERE next_attempt_at <= ?1
    ORDER BY next_attempt_at ASC
    LIMIT ?2
"#;

const RESCHEDULE_SYNC_JOB: &str = r#"
    UPDATE sync_jobs
    SET attempts = ?1, next_attempt_at = ?2, last_error = ?3
    WHERE id = ?4
"#;

const DELETE_SYNC_JOB: &str = r#"
    DELETE FROM sync_jobs WHERE id = ?1
"#;

const COUNT_PENDING_SYNC_JOBS: &str = r#"
    SELECT COUNT(*) FROM sync_jobs
"#;

/**
 * Inserción tx-scoped: el sellador de fase 3 la invoca con su propia
 * transacción abierta para que el outbox sea atómico con el estado.
 */
pub(crate) async fn push_sync_job_tx(
    connection: &Connection,
    payload: &SyncPayload,
    now: DateTime<Utc>,
) -> Result<(), DbError> {
    let payload_json = serde_json::to_string(payload)
        .map_err(|fault| DbError::MappingError(format!("SYNC_PAYLOAD_ENCODE: {fault}")))?;

    connection
        .execute(
            INSERT_SYNC_JOB,
            params![
                Uuid::new_v4().to_string(),
                payload.planning_page_id.clone(),
                payload_json,
                codec::to_wire(now)
            ],
        )
        .await?;
    Ok(())
}

pub struct SyncOutboxRepository {
    database_client: TursoClient,
}

impl SyncOutboxRepository {
    pub fn new(database_client: TursoClient) -> Self {
        Self { database_client }
    }

    /// Encola un mensaje de sincronía fuera de un sellado (usos manuales).
    pub async fn push(&self, payload: &SyncPayload) -> Result<(), DbError> {
        let connection = self.database_client.get_connection()?;
        push_sync_job_tx(&connection, payload, Utc::now()).await
    }

    /// Ráfaga de mensajes vencidos, ordenados por vencimiento.
    #[instrument(skip(self))]
    pub async fn fetch_due(&self, limit: u32, now: DateTime<Utc>) -> Result<Vec<SyncJob>, DbError> {
        let connection = self.database_client.get_connection()?;
        let mut rows = connection
            .query(FIND_DUE_SYNC_JOBS, params![codec::to_wire(now), limit as i64])
            .await?;

        let mut due_jobs = Vec::new();
        while let Some(row) = rows.next().await? {
            let id_raw: String = row.get(0)?;
            let planning_page_id: String = row.get(1)?;
            let payload_json: String = row.get(2)?;
            let attempts: i64 = row.get(3)?;
            let next_attempt_raw: String = row.get(4)?;
            let last_error: Option<String> = row.get::<String>(5).ok();

            let payload: SyncPayload = serde_json::from_str(&payload_json)
                .map_err(|fault| DbError::MappingError(format!("SYNC_PAYLOAD_DECODE: {fault}")))?;

            due_jobs.push(SyncJob {
                id: codec::parse_uuid(&id_raw)?,
                planning_page_id,
                payload,
                attempts: attempts as u32,
                next_attempt_at: codec::parse_wire(&next_attempt_raw)?,
                last_error,
            });
        }

        Ok(due_jobs)
    }

    /// Reprograma un mensaje tras un fallo transitorio del planning store.
    pub async fn reschedule(
        &self,
        job_id: Uuid,
        attempts: u32,
        next_attempt_at: DateTime<Utc>,
        error_detail: &str,
    ) -> Result<(), DbError> {
        let connection = self.database_client.get_connection()?;
        connection
            .execute(
                RESCHEDULE_SYNC_JOB,
                params![
                    attempts as i64,
                    codec::to_wire(next_attempt_at),
                    error_detail,
                    job_id.to_string()
                ],
            )
            .await?;
        Ok(())
    }

    /// Elimina un mensaje entregado (o descartado tras agotamiento).
    pub async fn complete(&self, job_id: Uuid) -> Result<(), DbError> {
        let connection = self.database_client.get_connection()?;
        connection
            .execute(DELETE_SYNC_JOB, params![job_id.to_string()])
            .await?;
        Ok(())
    }

    /// Descarte con advertencia: el Ledger local sigue siendo la verdad.
    pub async fn drop_exhausted(&self, job: &SyncJob, final_error: &str) -> Result<(), DbError> {
        warn!(
            planning_page_id = %job.planning_page_id,
            attempts = job.attempts,
            "🗑️ [SYNC_DROPPED]: Outbound sync exhausted retries. Local ledger remains authoritative. Detail: {}",
            final_error
        );
        self.complete(job.id).await
    }

    pub async fn count_pending(&self) -> Result<u64, DbError> {
        let connection = self.database_client.get_connection()?;
        let mut rows = connection.query(COUNT_PENDING_SYNC_JOBS, ()).await?;
        match rows.next().await? {
            Some(row) => {
                let pending: i64 = row.get(0)?;
                Ok(pending as u64)
            }
            None => Ok(0),
        }
    }
}
