// [apps/orchestrator/src/services/reaper.rs]
/**
 * =================================================================
 * APARATO: THE REAPER SYSTEM SERVICE
 * CLASIFICACIÓN: BACKGROUND INFRASTRUCTURE (ESTRATO L4)
 * RESPONSABILIDAD: EXPROPIACIÓN DE RECLAMOS HUÉRFANOS Y RECONCILIACIÓN
 *
 * Sin handshake explícito: un worker que muere en fase 2 deja su fila
 * en posesión vencida. Cada ciclo el Reaper la transiciona al terminal
 * de error de su etapa con rastro "worker timeout", programa el
 * reintento (transitorio) y nivela los contadores globales de cupo
 * contra las filas realmente en posesión.
 * =================================================================
 */

use chrono::{Duration as ChronoDuration, Utc};
use std::time::Duration;
use tokio::time::interval;
use tracing::{error, info, warn};

use crate::services::alert::{AlertEvent, AlertKind};
use crate::state::AppState;

/// Ciclo de escrutinio del daemon.
const REAPER_SCAN_INTERVAL: Duration = Duration::from_secs(60);
/// Umbral de posesión vencida (custodia sin señales de vida).
const STALE_CLAIM_THRESHOLD_MINUTES: i64 = 15;

/// Inicia el servicio de expropiación perpetua en el runtime de Tokio.
pub fn spawn_reaper(state: AppState) {
    tokio::spawn(async move {
        let mut maintenance_ticker = interval(REAPER_SCAN_INTERVAL);
        info!("💀 [REAPER_ACTIVE]: Stale-claim expropriation daemon initiated.");

        loop {
            maintenance_ticker.tick().await;

            if *state.shutdown_signal.borrow() {
                info!("💀 [REAPER]: Shutdown observed. Daemon sealed.");
                break;
            }

            // 1. EXPROPIACIÓN DE FILAS EN POSESIÓN VENCIDA
            let abandoned_before =
                Utc::now() - ChronoDuration::minutes(STALE_CLAIM_THRESHOLD_MINUTES);

            match state
                .tasks
                .recover_stale_claims(abandoned_before, &state.retry_policy)
                .await
            {
                Ok(recovered_tasks) => {
                    for recovered in &recovered_tasks {
                        warn!(
                            task_id = %recovered.id,
                            status = %recovered.status,
                            retry_count = recovered.retry_count,
                            "💀 [REAPER_RECOVERY]: Orphaned claim expropriated."
                        );
                        state
                            .alerts
                            .dispatch(AlertEvent {
                                kind: AlertKind::StaleClaimRecovered,
                                severity: AlertKind::StaleClaimRecovered.severity(),
                                task_id: recovered.id,
                                channel_key: recovered.channel_key.clone(),
                                planning_page_id: recovered.planning_page_id.clone(),
                                stage: None,
                                reason: "WorkerTimeout".to_string(),
                                final_error: "worker timeout".to_string(),
                            })
                            .await;
                    }
                    if !recovered_tasks.is_empty() {
                        state.queue_waker.notify_waiters();
                    }
                }
                Err(reap_fault) => {
                    error!("💀 [REAPER_FAULT]: Expropriation sweep failed: {}", reap_fault);
                }
            }

            // 2. RECONCILIACIÓN DE CUPOS GLOBALES (slots fugados)
            if let Err(reconcile_fault) = state.rate_limits.reconcile_global_counters().await {
                error!(
                    "💀 [REAPER_FAULT]: Gate counter reconciliation failed: {}",
                    reconcile_fault
                );
            }
        }
    });
}
