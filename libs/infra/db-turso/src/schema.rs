// [libs/infra/db-turso/src/schema.rs]
/**
 * =================================================================
 * APARATO: PRODUCTION LEDGER SCHEMA
 * CLASIFICACIÓN: INFRASTRUCTURE LAYER (ESTRATO L3)
 * RESPONSABILIDAD: GOBERNANZA ESTRUCTURAL E IDEMPOTENCIA TOTAL
 *
 * Convención temporal: toda columna comparable se escribe desde Rust
 * en RFC3339 UTC; el esquema jamás confía en CURRENT_TIMESTAMP para
 * columnas que participan en ORDER BY o comparaciones de ventana.
 * =================================================================
 */

use anyhow::{Context, Result};
use libsql::Connection;
use tracing::{debug, info, instrument, warn};

/**
 * ESTRATO 1: SOLIDIFICACIÓN (Génesis de Tablas)
 * Define las entidades base del ecosistema Showrunner.
 */
const TACTICAL_TABLES: &[(&str, &str)] = &[
    ("TABLE_CHANNELS", r#"
        CREATE TABLE IF NOT EXISTS channels (
            id TEXT PRIMARY KEY,
            key TEXT NOT NULL UNIQUE,
            display_name TEXT NOT NULL,
            active INTEGER NOT NULL DEFAULT 1,
            voice_id TEXT NOT NULL DEFAULT '',
            branding_json TEXT NOT NULL DEFAULT '{}',
            storage_strategy TEXT NOT NULL DEFAULT 'inline',
            max_concurrent INTEGER NOT NULL DEFAULT 2,
            publish_binding TEXT NOT NULL DEFAULT '',
            auto_approve_json TEXT NOT NULL DEFAULT '[]',
            last_claimed_at TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );
    "#),
    ("TABLE_TASKS", r#"
        CREATE TABLE IF NOT EXISTS tasks (
            id TEXT PRIMARY KEY,
            channel_id TEXT NOT NULL,
            channel_key TEXT NOT NULL,
            planning_page_id TEXT NOT NULL UNIQUE,
            title TEXT NOT NULL,
            topic TEXT NOT NULL DEFAULT '',
            story_direction TEXT NOT NULL DEFAULT '',
            status TEXT NOT NULL DEFAULT 'QUEUED',
            priority INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            claimed_at TEXT,
            retry_count INTEGER NOT NULL DEFAULT 0,
            next_retry_at TEXT,
            last_error TEXT,
            publish_url TEXT,
            review_approved_at TEXT,
            resume_stage TEXT
        );
    "#),
    ("TABLE_CREDENTIALS", r#"
        CREATE TABLE IF NOT EXISTS credentials (
            channel_id TEXT NOT NULL,
            service TEXT NOT NULL,
            ciphertext TEXT NOT NULL,
            refreshed_at TEXT,
            expires_at TEXT,
            PRIMARY KEY (channel_id, service)
        );
    "#),
    ("TABLE_RATE_COUNTERS", r#"
        CREATE TABLE IF NOT EXISTS rate_counters (
            channel_id TEXT NOT NULL,
            service TEXT NOT NULL,
            window_start TEXT NOT NULL,
            count INTEGER NOT NULL DEFAULT 0,
            cap INTEGER NOT NULL,
            window_seconds INTEGER NOT NULL DEFAULT 1,
            PRIMARY KEY (channel_id, service)
        );
    "#),
    ("TABLE_GLOBAL_CONCURRENCY", r#"
        CREATE TABLE IF NOT EXISTS global_concurrency (
            service TEXT PRIMARY KEY,
            count INTEGER NOT NULL DEFAULT 0,
            cap INTEGER NOT NULL
        );
    "#),
    ("TABLE_SYNC_JOBS", r#"
        CREATE TABLE IF NOT EXISTS sync_jobs (
            id TEXT PRIMARY KEY,
            planning_page_id TEXT NOT NULL,
            payload_json TEXT NOT NULL,
            attempts INTEGER NOT NULL DEFAULT 0,
            next_attempt_at TEXT NOT NULL,
            last_error TEXT,
            created_at TEXT NOT NULL
        );
    "#),
];

/**
 * ESTRATO 2: EVOLUCIÓN (Mutaciones de Columna)
 * Asegura que instalaciones previas adquieran las columnas nuevas.
 */
const EVOLUTIONARY_STRATA: &[(&str, &str)] = &[
    ("TASK_REVIEW_STAMP", "ALTER TABLE tasks ADD COLUMN review_approved_at TEXT"),
    ("TASK_RESUME_STAGE", "ALTER TABLE tasks ADD COLUMN resume_stage TEXT"),
    ("CHANNEL_AUTO_APPROVE", "ALTER TABLE channels ADD COLUMN auto_approve_json TEXT NOT NULL DEFAULT '[]'"),
    ("RATE_WINDOW_SECONDS", "ALTER TABLE rate_counters ADD COLUMN window_seconds INTEGER NOT NULL DEFAULT 1"),
];

/**
 * ESTRATO 3: ENDURECIMIENTO (Índices de Aceleración)
 * Índices parciales para el camino caliente de reclamo y reintento.
 */
const ACCELERATION_INDEXES: &[(&str, &str)] = &[
    ("IDX_TASKS_READY", r#"
        CREATE INDEX IF NOT EXISTS idx_tasks_ready
        ON tasks(status, channel_id, priority DESC, created_at ASC)
        WHERE status = 'QUEUED';
    "#),
    ("IDX_TASKS_RETRY", r#"
        CREATE INDEX IF NOT EXISTS idx_tasks_retry
        ON tasks(next_retry_at)
        WHERE next_retry_at IS NOT NULL;
    "#),
    ("IDX_TASKS_HELD", r#"
        CREATE INDEX IF NOT EXISTS idx_tasks_held
        ON tasks(claimed_at)
        WHERE claimed_at IS NOT NULL;
    "#),
    ("IDX_TASKS_CHANNEL_STATUS", r#"
        CREATE INDEX IF NOT EXISTS idx_tasks_channel_status
        ON tasks(channel_id, status);
    "#),
    ("IDX_SYNC_DUE", r#"
        CREATE INDEX IF NOT EXISTS idx_sync_due
        ON sync_jobs(next_attempt_at);
    "#),
];

/**
 * Ejecuta la secuencia maestra de sincronización del esquema.
 *
 * # Errors:
 * Retorna error si alguna tabla base falla en solidificarse, indicando
 * un colapso en el enlace con Turso.
 */
#[instrument(skip(database_connection))]
pub async fn apply_full_production_schema(database_connection: &Connection) -> Result<()> {
    info!("🏗️ [SCHEMA_ENGINE]: Initiating structural synchronization...");

    solidify_base_strata(database_connection).await?;
    execute_evolutionary_repair(database_connection).await?;
    harden_access_layer(database_connection).await?;

    info!("✅ [SCHEMA_ENGINE]: Production Ledger level and certified.");
    Ok(())
}

async fn solidify_base_strata(db: &Connection) -> Result<()> {
    for (identifier, sql) in TACTICAL_TABLES {
        debug!("  ↳ Solidifying: {}", identifier);
        db.execute(*sql, ())
            .await
            .with_context(|| format!("CRITICAL_SOLIDIFICATION_FAULT: {}", identifier))?;
    }
    Ok(())
}

async fn execute_evolutionary_repair(db: &Connection) -> Result<()> {
    for (identifier, sql) in EVOLUTIONARY_STRATA {
        match db.execute(*sql, ()).await {
            Ok(_) => debug!("  🟢 [REPAIR_OK]: Applied evolutionary stratum {}", identifier),
            Err(e) => {
                let message = e.to_string();
                if message.contains("duplicate column name") {
                    debug!("  ⚪ [REPAIR_SKIP]: {} already level.", identifier);
                } else {
                    warn!("  ⚠️ [REPAIR_BYPASS]: {} check incomplete: {}", identifier, message);
                }
            }
        }
    }
    Ok(())
}

async fn harden_access_layer(db: &Connection) -> Result<()> {
    for (identifier, sql) in ACCELERATION_INDEXES {
        debug!("  ↳ Hardening: {}", identifier);
        db.execute(*sql, ())
            .await
            .with_context(|| format!("CRITICAL_HARDENING_FAULT: {}", identifier))?;
    }
    Ok(())
}
