// [libs/infra/db-turso/src/repositories/rate_limit.rs]
/*!
 * =================================================================
 * APARATO: RATE & CONCURRENCY GATE LEDGER
 * CLASIFICACIÓN: INFRASTRUCTURE LAYER (ESTRATO L3)
 * RESPONSABILIDAD: COMPUERTAS DURABLES DE CUPO GLOBAL Y VENTANA
 *
 * # Mathematical Proof (Atomic Slot Accounting):
 * El cupo global se adquiere con una única sentencia condicional
 * (count < cap) cuyo rows_affected decide el veredicto; al residir
 * los contadores en filas durables, la semántica sobrevive a
 * despliegues multi-proceso sin primitivas en RAM. El orden de
 * adquisición es fijo (global antes que ventana de canal) para
 * imposibilitar interbloqueos.
 * =================================================================
 */

use chrono::{DateTime, Utc};
use libsql::{params, Connection};
use std::collections::HashMap;
use tracing::{debug, instrument};

use crate::client::TursoClient;
use crate::errors::DbError;
use crate::repositories::codec;
use showrunner_domain_models::ExternalService;

// --- SENTENCIAS DEL LEDGER DE COMPUERTAS ---

const CONFIGURE_GLOBAL_CAP: &str = r#"
    INSERT INTO global_concurrency (service, count, cap)
    VALUES (?1, 0, ?2)
    ON CONFLICT(service) DO UPDATE SET cap = excluded.cap
"#;

const ACQUIRE_GLOBAL_SLOT: &str = r#"
    UPDATE global_concurrency
    SET count = count + 1
    WHERE service = ?1 AND count < cap
"#;

const RELEASE_GLOBAL_SLOT: &str = r#"
    UPDATE global_concurrency
    SET count = CASE WHEN count > 0 THEN count - 1 ELSE 0 END
    WHERE service = ?1
"#;

const SERVICE_HAS_GLOBAL_CAP: &str = r#"
    SELECT cap FROM global_concurrency WHERE service = ?1
"#;

const RESET_GLOBAL_COUNT: &str = r#"
    UPDATE global_concurrency SET count = ?2 WHERE service = ?1
"#;

const READ_GLOBAL_STATE: &str = r#"
    SELECT count, cap FROM global_concurrency WHERE service = ?1
"#;

const SEED_WINDOW_ROW: &str = r#"
    INSERT INTO rate_counters (channel_id, service, window_start, count, cap, window_seconds)
    VALUES (?1, ?2, ?3, 0, ?4, ?5)
    ON CONFLICT(channel_id, service)
    DO UPDATE SET cap = excluded.cap, window_seconds = excluded.window_seconds
"#;

const READ_WINDOW_ROW: &str = r#"
    SELECT window_start, count, cap, window_seconds
    FROM rate_counters
    WHERE channel_id = ?1 AND service = ?2
"#;

const ROLL_WINDOW: &str = r#"
    UPDATE rate_counters
    SET window_start = ?3, count = 1
    WHERE channel_id = ?1 AND service = ?2
"#;

const BUMP_WINDOW: &str = r#"
    UPDATE rate_counters
    SET count = count + 1
    WHERE channel_id = ?1 AND service = ?2 AND count < cap
"#;

/// Identificador de alcance para límites de ventana sin canal (p. ej.
/// el cupo global de escritura del planning store).
pub const GLOBAL_SCOPE: &str = "GLOBAL";

/// Regla de ventana por canal para un servicio.
#[derive(Debug, Clone, Copy)]
pub struct WindowRule {
    pub cap: u32,
    pub window_seconds: i64,
}

/// Perfil de compuertas que la función de elección consulta por servicio.
#[derive(Debug, Clone, Default)]
pub struct GatePolicy {
    pub channel_windows: HashMap<ExternalService, WindowRule>,
}

impl GatePolicy {
    pub fn window_for(&self, service: ExternalService) -> Option<WindowRule> {
        self.channel_windows.get(&service).copied()
    }
}

/// Veredicto de adquisición. Busy jamás es un error: el scheduler
/// simplemente salta al siguiente candidato.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    /// Compuertas abiertas; `held_global` indica si hay slot que devolver.
    Granted { held_global: bool },
    Busy,
}

// --- FUNCIONES TX-SCOPED (consumidas por la transacción de reclamo) ---

/**
 * Adquiere las compuertas de una etapa en orden fijo: cupo global del
 * servicio primero, ventana del canal después. Si la ventana niega,
 * el slot global recién tomado se devuelve dentro de la misma
 * transacción (sin fuga posible).
 */
pub(crate) async fn acquire_stage_gates(
    connection: &Connection,
    channel_scope: &str,
    service: ExternalService,
    policy: &GatePolicy,
    now: DateTime<Utc>,
) -> Result<GateDecision, DbError> {
    // 1. CUPO GLOBAL DEL SERVICIO
    let mut held_global = false;
    let mut cap_rows = connection
        .query(SERVICE_HAS_GLOBAL_CAP, params![service.as_str()])
        .await?;

    if cap_rows.next().await?.is_some() {
        let granted = connection
            .execute(ACQUIRE_GLOBAL_SLOT, params![service.as_str()])
            .await?;
        if granted == 0 {
            debug!(service = %service, "🚧 [GATE]: Global concurrency saturated.");
            return Ok(GateDecision::Busy);
        }
        held_global = true;
    }

    // 2. VENTANA DEL CANAL (si el perfil la define)
    if let Some(rule) = policy.window_for(service) {
        let granted =
            acquire_window_slot(connection, channel_scope, service, rule, now).await?;
        if !granted {
            if held_global {
                connection
                    .execute(RELEASE_GLOBAL_SLOT, params![service.as_str()])
                    .await?;
            }
            debug!(service = %service, scope = channel_scope, "🚧 [GATE]: Channel window saturated.");
            return Ok(GateDecision::Busy);
        }
    }

    Ok(GateDecision::Granted { held_global })
}

/**
 * Token-bucket sobre fila durable: si la ventana expiró se reinicia
 * con el token solicitado; si no, incrementa bajo el cap.
 */
pub(crate) async fn acquire_window_slot(
    connection: &Connection,
    scope: &str,
    service: ExternalService,
    rule: WindowRule,
    now: DateTime<Utc>,
) -> Result<bool, DbError> {
    let now_wire = codec::to_wire(now);

    connection
        .execute(
            SEED_WINDOW_ROW,
            params![
                scope,
                service.as_str(),
                now_wire.clone(),
                rule.cap as i64,
                rule.window_seconds
            ],
        )
        .await?;

    let mut window_rows = connection
        .query(READ_WINDOW_ROW, params![scope, service.as_str()])
        .await?;
    let window_row = window_rows
        .next()
        .await?
        .ok_or_else(|| DbError::MappingError("RATE_WINDOW_ROW_EVAPORATED".into()))?;

    let window_start_raw: String = window_row.get(0)?;
    let window_seconds: i64 = window_row.get(3)?;
    let window_start = codec::parse_wire(&window_start_raw)?;

    let window_is_stale = (now - window_start).num_seconds() >= window_seconds;

    if window_is_stale {
        connection
            .execute(ROLL_WINDOW, params![scope, service.as_str(), now_wire])
            .await?;
        return Ok(true);
    }

    let granted = connection
        .execute(BUMP_WINDOW, params![scope, service.as_str()])
        .await?;
    Ok(granted == 1)
}

pub(crate) async fn release_global_slot_tx(
    connection: &Connection,
    service: ExternalService,
) -> Result<(), DbError> {
    connection
        .execute(RELEASE_GLOBAL_SLOT, params![service.as_str()])
        .await?;
    Ok(())
}

// --- REPOSITORIO PÚBLICO (uso fuera de la transacción de reclamo) ---

pub struct RateLimitRepository {
    database_client: TursoClient,
}

impl RateLimitRepository {
    pub fn new(database_client: TursoClient) -> Self {
        Self { database_client }
    }

    /// Declara (o nivela) el cupo global de un servicio sin tocar el
    /// contador vigente.
    #[instrument(skip(self))]
    pub async fn configure_global_cap(
        &self,
        service: ExternalService,
        cap: u32,
    ) -> Result<(), DbError> {
        let connection = self.database_client.get_connection()?;
        connection
            .execute(CONFIGURE_GLOBAL_CAP, params![service.as_str(), cap as i64])
            .await?;
        Ok(())
    }

    /// Adquisición puntual de un slot global (relay de sincronía, etc.).
    pub async fn try_acquire_global(&self, service: ExternalService) -> Result<bool, DbError> {
        let connection = self.database_client.get_connection()?;
        let granted = connection
            .execute(ACQUIRE_GLOBAL_SLOT, params![service.as_str()])
            .await?;
        Ok(granted == 1)
    }

    pub async fn release_global(&self, service: ExternalService) -> Result<(), DbError> {
        let connection = self.database_client.get_connection()?;
        connection
            .execute(RELEASE_GLOBAL_SLOT, params![service.as_str()])
            .await?;
        Ok(())
    }

    /// Adquisición de ventana fuera del reclamo (p. ej. planning GLOBAL).
    pub async fn try_acquire_window(
        &self,
        scope: &str,
        service: ExternalService,
        rule: WindowRule,
    ) -> Result<bool, DbError> {
        let connection = self.database_client.get_connection()?;
        acquire_window_slot(&connection, scope, service, rule, Utc::now()).await
    }

    /// Estado observable del cupo global (diagnóstico y auditorías).
    pub async fn read_global_state(
        &self,
        service: ExternalService,
    ) -> Result<Option<(u32, u32)>, DbError> {
        let connection = self.database_client.get_connection()?;
        let mut rows = connection
            .query(READ_GLOBAL_STATE, params![service.as_str()])
            .await?;
        match rows.next().await? {
            Some(row) => {
                let count: i64 = row.get(0)?;
                let cap: i64 = row.get(1)?;
                Ok(Some((count as u32, cap as u32)))
            }
            None => Ok(None),
        }
    }

    /**
     * Reconciliación post-colapso: nivela el contador global de cada
     * servicio con las filas realmente en posesión física. Invocada por
     * el Reaper para recuperar slots fugados por workers muertos.
     */
    #[instrument(skip(self))]
    pub async fn reconcile_global_counters(&self) -> Result<(), DbError> {
        const HELD_BY_SERVICE: &[(&str, &str)] = &[
            ("image", "('CLAIMED', 'GENERATING_ASSETS')"),
            ("video", "('GENERATING_VIDEO')"),
            ("audio", "('GENERATING_AUDIO')"),
            ("sfx", "('GENERATING_SFX')"),
            ("assembler", "('ASSEMBLING')"),
            ("upload", "('UPLOADING')"),
        ];

        let connection = self.database_client.get_connection()?;

        for (service_key, held_statuses) in HELD_BY_SERVICE {
            let census_sql = format!(
                "SELECT COUNT(*) FROM tasks WHERE status IN {}",
                held_statuses
            );
            let mut census_rows = connection.query(&census_sql, ()).await?;
            let held_count: i64 = match census_rows.next().await? {
                Some(row) => row.get(0)?,
                None => 0,
            };

            connection
                .execute(RESET_GLOBAL_COUNT, params![*service_key, held_count])
                .await?;
        }

        debug!("♻️  [GATE]: Global concurrency counters reconciled against held rows.");
        Ok(())
    }
}
