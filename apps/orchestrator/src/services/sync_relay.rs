// [apps/orchestrator/src/services/sync_relay.rs]
/*!
 * =================================================================
 * APARATO: PLANNING SYNC RELAY
 * CLASIFICACIÓN: BACKGROUND INFRASTRUCTURE (ESTRATO L4)
 * RESPONSABILIDAD: DRENADO BEST-EFFORT DEL OUTBOX HACIA EL MOTOR P
 *
 * Fire-and-forget con reintento acotado: el pipeline jamás espera a
 * esta sincronía. Tras agotar el presupuesto el mensaje se descarta
 * con advertencia (SyncDropped) y el Ledger local sigue siendo la
 * única verdad. Dos relays concurrentes pueden duplicar un envío:
 * el Motor P lo absorbe como paridad (409 = éxito).
 * =================================================================
 */

use chrono::{Duration as ChronoDuration, Utc};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::state::AppState;
use showrunner_domain_models::ExternalService;
use showrunner_domain_workflow::{RetryVerdict, StageFailure};
use showrunner_infra_db::repositories::GLOBAL_SCOPE;

/// Ráfaga de drenado por ciclo.
const RELAY_BATCH_SIZE: u32 = 8;
/// Reposo entre ciclos de drenado.
const RELAY_IDLE_SLEEP: Duration = Duration::from_secs(2);
/// Reintentos de compuerta antes de ceder el turno del ciclo.
const GATE_PROBE_BUDGET: u32 = 8;

/// Despliega el pool de relays de sincronía.
pub fn spawn_sync_relays(state: &AppState) {
    for relay_index in 0..state.config.sync_worker_count {
        let relay_state = state.clone();
        let relay_id = format!("sync-relay-{relay_index:02}");
        tokio::spawn(async move {
            run_relay_loop(relay_state, relay_id).await;
        });
    }
}

async fn run_relay_loop(state: AppState, relay_id: String) {
    info!(relay_id, "📮 [SYNC_RELAY]: Outbox drain loop initiated.");
    let planning_rule = state.config.planning_window_rule();

    loop {
        if *state.shutdown_signal.borrow() {
            info!(relay_id, "📮 [SYNC_RELAY]: Shutdown observed. Relay sealed.");
            break;
        }

        let due_jobs = match state.sync_outbox.fetch_due(RELAY_BATCH_SIZE, Utc::now()).await {
            Ok(jobs) => jobs,
            Err(fetch_fault) => {
                error!(relay_id, "❌ [SYNC_RELAY]: Outbox fetch failed: {}", fetch_fault);
                sleep(RELAY_IDLE_SLEEP).await;
                continue;
            }
        };

        if due_jobs.is_empty() {
            sleep(RELAY_IDLE_SLEEP).await;
            continue;
        }

        for job in due_jobs {
            if *state.shutdown_signal.borrow() {
                break;
            }

            // Cupo GLOBAL del planning store (3 req/s por defecto).
            let mut gate_granted = false;
            for _ in 0..GATE_PROBE_BUDGET {
                match state
                    .rate_limits
                    .try_acquire_window(GLOBAL_SCOPE, ExternalService::Planning, planning_rule)
                    .await
                {
                    Ok(true) => {
                        gate_granted = true;
                        break;
                    }
                    Ok(false) => sleep(Duration::from_millis(250)).await,
                    Err(gate_fault) => {
                        error!(relay_id, "❌ [SYNC_RELAY]: Planning gate probe failed: {}", gate_fault);
                        break;
                    }
                }
            }
            if !gate_granted {
                // Ventana saturada: el mensaje sigue vencido y volverá.
                continue;
            }

            let delivery = state
                .services
                .planning
                .update_status(
                    &job.payload.planning_page_id,
                    job.payload.status,
                    &job.payload.fields,
                )
                .await;

            match delivery {
                Ok(()) => {
                    debug!(
                        relay_id,
                        planning_page_id = %job.planning_page_id,
                        status = %job.payload.status,
                        "📤 [SYNC_RELAY]: Page leveled."
                    );
                    if let Err(complete_fault) = state.sync_outbox.complete(job.id).await {
                        warn!(relay_id, "⚠️ [SYNC_RELAY]: Delivered job not sealed: {}", complete_fault);
                    }
                }
                Err(provider_fault) => {
                    let failure: StageFailure = provider_fault.into();
                    let verdict = state.retry_policy.assess(&failure, job.attempts);

                    match (failure.is_transient(), verdict) {
                        (true, RetryVerdict::Reschedule { retry_count, delay }) => {
                            let next_attempt = Utc::now()
                                + ChronoDuration::from_std(delay)
                                    .unwrap_or_else(|_| ChronoDuration::seconds(60));
                            if let Err(reschedule_fault) = state
                                .sync_outbox
                                .reschedule(job.id, retry_count, next_attempt, failure.detail())
                                .await
                            {
                                warn!(relay_id, "⚠️ [SYNC_RELAY]: Reschedule failed: {}", reschedule_fault);
                            }
                        }
                        _ => {
                            // Permanente o presupuesto agotado: descarte con rastro.
                            if let Err(drop_fault) = state
                                .sync_outbox
                                .drop_exhausted(&job, failure.detail())
                                .await
                            {
                                warn!(relay_id, "⚠️ [SYNC_RELAY]: Drop failed: {}", drop_fault);
                            }
                        }
                    }
                }
            }
        }
    }
}
