// [apps/orchestrator/src/services/worker_pool.rs]
/*!
 * =================================================================
 * APARATO: WORKER FLEET & PIPELINE DRIVER
 * CLASIFICACIÓN: PIPELINE DRIVER (ESTRATO L4)
 * RESPONSABILIDAD: CICLO RECLAMO -> EJECUCIÓN -> SELLADO POR WORKER
 *
 * # Mathematical Proof (Three-Phase Discipline):
 * Fase 1 (reclamo) y fase 3 (sellado) son transacciones cortas del
 * Ledger; la fase 2 (llamada externa) transcurre sin transacción
 * abierta. Un worker suspendido en fase 2 no retiene conexiones; un
 * worker muerto en fase 2 deja la fila en posesión vencida y el
 * Reaper la gobierna. El apagado cooperativo abandona la fase 2 SIN
 * sellar: la consistencia la restituye el Reaper, jamás un sellado
 * parcial.
 * =================================================================
 */

use chrono::{Duration as ChronoDuration, Utc};
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::services::alert::{AlertEvent, AlertKind};
use crate::services::stages::{execute_stage, StageArtifacts};
use crate::state::AppState;
use showrunner_domain_models::{
    Channel, ExternalService, PipelineStage, ReviewGate, Task, TaskStatus,
};
use showrunner_domain_workflow::{
    PermanentKind, RetryVerdict, StageFailure, TransientKind,
};
use showrunner_infra_db::repositories::{ClaimedWork, StageFinalize};

/// Piso de liveness: sin campana, el worker re-intenta reclamar cada 5s.
const IDLE_POLL_INTERVAL: Duration = Duration::from_secs(5);
/// Espera máxima por la compuerta del ensamblador en la cadena SFX.
const ASSEMBLER_GATE_PATIENCE: Duration = Duration::from_secs(60);
/// Longitud máxima del rastro de error persistido.
const ERROR_TRAIL_MAX_CHARS: usize = 1000;

/// Despliega la flota de workers del proceso.
pub fn spawn_worker_fleet(state: &AppState) -> Vec<JoinHandle<()>> {
    (0..state.config.worker_count)
        .map(|worker_index| {
            let worker_state = state.clone();
            let worker_id = format!("worker-{worker_index:02}");
            tokio::spawn(async move {
                run_worker_loop(worker_state, worker_id).await;
            })
        })
        .collect()
}

/// Bucle soberano de un worker: reclama, ejecuta, sella, repite.
pub async fn run_worker_loop(state: AppState, worker_id: String) {
    info!(worker_id, "👷 [WORKER]: Unit online. Entering claim loop.");
    let mut shutdown_signal = state.shutdown_signal.clone();

    loop {
        if *shutdown_signal.borrow() {
            break;
        }

        match state.tasks.claim_next(&worker_id, &state.gate_policy).await {
            Ok(Some(claimed_work)) => {
                drive_claimed_work(&state, claimed_work, &worker_id).await;
                state.queue_waker.notify_waiters();
            }
            Ok(None) => {
                // Dormir hasta campana, piso de liveness o apagado.
                tokio::select! {
                    _ = state.queue_waker.notified() => {},
                    _ = tokio::time::sleep(IDLE_POLL_INTERVAL) => {},
                    _ = shutdown_signal.changed() => {},
                }
            }
            Err(claim_fault) => {
                // Un fallo de mapeo delata una fila que contradice la
                // máquina de estados: continuar corrompería filas vecinas.
                if matches!(claim_fault, showrunner_infra_db::DbError::MappingError(_)) {
                    showrunner_shared_heimdall::fatal_invariant_collapse(
                        "worker_pool",
                        &claim_fault.to_string(),
                    );
                }
                error!(worker_id, "❌ [WORKER]: Claim cycle collapsed: {}", claim_fault);
                tokio::time::sleep(Duration::from_secs(1)).await;
            }
        }
    }

    info!(worker_id, "🏁 [WORKER]: Unit drained and offline.");
}

/**
 * Conduce una fila reclamada a través de las tres fases del driver.
 * Toda salida de esta función deja la fila en un estado gobernado:
 * sellada, o en posesión vencida bajo jurisdicción del Reaper.
 */
pub async fn drive_claimed_work(state: &AppState, claimed_work: ClaimedWork, worker_id: &str) {
    let ClaimedWork {
        mut task,
        stage,
        gate_service,
        holds_global_slot,
    } = claimed_work;

    // Cierre de fase 1: apertura de etapa para filas recién encoladas
    // (o reanudadas: CLAIMED abre la etapa que el reclamo resolvió).
    if task.status == TaskStatus::Claimed {
        let opening_status = stage.in_progress_status();
        if let Err(open_fault) = state
            .tasks
            .begin_stage(task.id, TaskStatus::Claimed, opening_status)
            .await
        {
            error!(task_id = %task.id, "❌ [DRIVER]: Stage opening rejected: {}", open_fault);
            release_gate(state, gate_service, holds_global_slot).await;
            return;
        }
        task.status = opening_status;
    }

    let channel = match state.channels.find_by_id(task.channel_id).await {
        Ok(Some(channel)) => channel,
        other => {
            error!(
                task_id = %task.id,
                "❌ [DRIVER]: Channel evaporated mid-claim ({other:?}). Leaving row to the reaper."
            );
            release_gate(state, gate_service, holds_global_slot).await;
            return;
        }
    };

    // --- FASE 2: LLAMADA EXTERNA (sin transacción abierta) ---
    let stage_budget = Duration::from_secs(stage.default_timeout_seconds());
    let phase_start = Instant::now();
    let mut shutdown_signal = state.shutdown_signal.clone();

    let outcome = tokio::select! {
        executed = tokio::time::timeout(stage_budget, execute_stage(state, &task, &channel, stage)) => {
            match executed {
                Ok(stage_result) => stage_result,
                Err(_) => Err(StageFailure::transient(
                    TransientKind::NetworkTimeout,
                    format!("stage budget exhausted after {}s", stage_budget.as_secs()),
                )),
            }
        }
        _ = shutdown_signal.changed() => {
            // Cancelación cooperativa: sin fase 3. El Reaper re-gobierna.
            warn!(
                task_id = %task.id,
                stage = %stage,
                "⚠️ [DRIVER]: Shutdown mid-stage. Row left claimed for the reaper."
            );
            release_gate(state, gate_service, holds_global_slot).await;
            return;
        }
    };

    release_gate(state, gate_service, holds_global_slot).await;

    let elapsed_ms = phase_start.elapsed().as_millis() as u64;
    debug!(
        task_id = %task.id,
        channel_id = %task.channel_id,
        stage = %stage,
        attempt = task.retry_count + 1,
        elapsed_ms,
        worker_id,
        "⏱️ [DRIVER]: Phase-2 call concluded."
    );

    // --- FASE 3: SELLADO ---
    match outcome {
        Ok(artifacts) => {
            finalize_success(state, &mut task, &channel, stage, artifacts).await;
        }
        Err(failure) => {
            finalize_failure(state, &task, stage, failure).await;
        }
    }
}

async fn finalize_success(
    state: &AppState,
    task: &mut Task,
    channel: &Channel,
    stage: PipelineStage,
    artifacts: StageArtifacts,
) {
    let from_status = stage.in_progress_status();
    let to_status = stage.success_status();

    let mut directive = StageFinalize::new(task, from_status, to_status);
    directive.publish_url = artifacts.publish_url.clone();
    directive.sync_fields = artifacts.sync_fields;

    let final_status = match state.tasks.finalize_stage(directive).await {
        Ok(final_status) => final_status,
        Err(seal_fault) => {
            error!(
                task_id = %task.id,
                stage = %stage,
                "❌ [DRIVER]: Success finalize rejected: {}",
                seal_fault
            );
            return;
        }
    };

    info!(
        task_id = %task.id,
        channel_id = %task.channel_id,
        stage = %stage,
        from = %from_status,
        to = %final_status,
        attempt = task.retry_count + 1,
        "✅ [DRIVER]: Stage sealed."
    );

    // Publicación terminal: purga del workspace particionado.
    if final_status == TaskStatus::Published {
        if let Err(purge_fault) = state
            .workspace
            .purge_project(task.channel_id, task.id)
            .await
        {
            warn!(task_id = %task.id, "⚠️ [DRIVER]: Workspace purge incomplete: {}", purge_fault);
        }
        return;
    }

    // Cadena SFX -> ensamblado dentro del mismo reclamo.
    if stage == PipelineStage::Sfx && final_status == TaskStatus::Assembling {
        task.status = TaskStatus::Assembling;
        Box::pin(run_assembly_chain(state, task, channel)).await;
        return;
    }

    auto_advance_gate(state, task, channel, final_status).await;
}

/**
 * Segunda etapa del reclamo SFX: el ensamblado corre con la fila aún
 * en posesión, tras adquirir su propia compuerta global.
 */
async fn run_assembly_chain(state: &AppState, task: &mut Task, channel: &Channel) {
    // Adquisición de la compuerta del ensamblador (paciencia acotada).
    let mut holds_assembler_slot = false;
    match state
        .rate_limits
        .read_global_state(ExternalService::Assembler)
        .await
    {
        Ok(Some(_)) => {
            let patience_deadline = Instant::now() + ASSEMBLER_GATE_PATIENCE;
            loop {
                if *state.shutdown_signal.borrow() {
                    warn!(task_id = %task.id, "⚠️ [DRIVER]: Shutdown while queueing for assembler. Reaper takes over.");
                    return;
                }
                match state
                    .rate_limits
                    .try_acquire_global(ExternalService::Assembler)
                    .await
                {
                    Ok(true) => {
                        holds_assembler_slot = true;
                        break;
                    }
                    Ok(false) if Instant::now() < patience_deadline => {
                        tokio::time::sleep(Duration::from_millis(500)).await;
                    }
                    Ok(false) => {
                        finalize_failure(
                            state,
                            task,
                            PipelineStage::Assembly,
                            StageFailure::transient(
                                TransientKind::UpstreamBusy,
                                "assembler saturated beyond patience window",
                            ),
                        )
                        .await;
                        return;
                    }
                    Err(gate_fault) => {
                        error!(task_id = %task.id, "❌ [DRIVER]: Assembler gate probe failed: {}", gate_fault);
                        return;
                    }
                }
            }
        }
        Ok(None) => {} // servicio sin cupo declarado: paso libre
        Err(gate_fault) => {
            error!(task_id = %task.id, "❌ [DRIVER]: Assembler gate probe failed: {}", gate_fault);
            return;
        }
    }

    let assembly_budget =
        Duration::from_secs(PipelineStage::Assembly.default_timeout_seconds());
    let mut shutdown_signal = state.shutdown_signal.clone();

    let outcome = tokio::select! {
        executed = tokio::time::timeout(
            assembly_budget,
            execute_stage(state, task, channel, PipelineStage::Assembly),
        ) => {
            match executed {
                Ok(stage_result) => stage_result,
                Err(_) => Err(StageFailure::transient(
                    TransientKind::StepTimeout,
                    format!("assembly budget exhausted after {}s", assembly_budget.as_secs()),
                )),
            }
        }
        _ = shutdown_signal.changed() => {
            warn!(task_id = %task.id, "⚠️ [DRIVER]: Shutdown mid-assembly. Row left claimed for the reaper.");
            release_gate(state, ExternalService::Assembler, holds_assembler_slot).await;
            return;
        }
    };

    release_gate(state, ExternalService::Assembler, holds_assembler_slot).await;

    match outcome {
        Ok(artifacts) => {
            finalize_success(state, task, channel, PipelineStage::Assembly, artifacts).await;
        }
        Err(failure) => {
            finalize_failure(state, task, PipelineStage::Assembly, failure).await;
        }
    }
}

/// Auto-aprobación de compuertas configurada por canal: la máquina de
/// estados no cambia, el veredicto simplemente llega sin humano.
async fn auto_advance_gate(
    state: &AppState,
    task: &Task,
    channel: &Channel,
    final_status: TaskStatus,
) {
    let pending_gate = match final_status {
        TaskStatus::AssetsReady => Some(ReviewGate::Assets),
        TaskStatus::VideoReady => Some(ReviewGate::Video),
        TaskStatus::AudioReady => Some(ReviewGate::Audio),
        TaskStatus::FinalReview => Some(ReviewGate::Final),
        _ => None,
    };

    let Some(gate) = pending_gate else { return };
    if !channel.auto_approve.contains(&gate) {
        return;
    }

    match state
        .tasks
        .record_review_decision(&task.planning_page_id, gate, true, None)
        .await
    {
        Ok(_) => info!(
            task_id = %task.id,
            gate = gate.as_str(),
            "🟢 [DRIVER]: Gate auto-approved by channel policy."
        ),
        Err(gate_fault) => warn!(
            task_id = %task.id,
            gate = gate.as_str(),
            "⚠️ [DRIVER]: Auto-approval rejected: {}",
            gate_fault
        ),
    }
}

async fn finalize_failure(
    state: &AppState,
    task: &Task,
    stage: PipelineStage,
    failure: StageFailure,
) {
    let from_status = stage.in_progress_status();
    let error_status = stage.error_status();
    let verdict = state.retry_policy.assess(&failure, task.retry_count);

    let mut error_trail: String = failure.detail().chars().take(ERROR_TRAIL_MAX_CHARS).collect();
    if error_trail.is_empty() {
        error_trail = "stage failed without detail".to_string();
    }

    let mut directive = StageFinalize::new(task, from_status, error_status);
    directive.last_error = Some(error_trail.clone());

    match &verdict {
        RetryVerdict::Reschedule { retry_count, delay } => {
            directive.retry_count = Some(*retry_count);
            directive.next_retry_at = Some(
                Utc::now()
                    + ChronoDuration::from_std(*delay)
                        .unwrap_or_else(|_| ChronoDuration::seconds(60)),
            );
        }
        RetryVerdict::Exhausted { retry_count } => {
            directive.retry_count = Some(*retry_count);
        }
    }

    if let Err(seal_fault) = state.tasks.finalize_stage(directive).await {
        error!(
            task_id = %task.id,
            stage = %stage,
            "❌ [DRIVER]: Failure finalize rejected: {}",
            seal_fault
        );
        return;
    }

    match verdict {
        RetryVerdict::Reschedule { retry_count, delay } => {
            info!(
                task_id = %task.id,
                channel_id = %task.channel_id,
                stage = %stage,
                attempt = retry_count,
                backoff_seconds = delay.as_secs(),
                "🔁 [DRIVER]: Transient failure rescheduled."
            );
        }
        RetryVerdict::Exhausted { retry_count } => {
            let (alert_kind, reason) = match &failure {
                StageFailure::Permanent {
                    kind: PermanentKind::CredentialExpired,
                    ..
                } => (AlertKind::CredentialRefreshFailed, "CredentialExpired"),
                StageFailure::Permanent { .. } => {
                    (AlertKind::RetryExhausted, "PermanentStageFailure")
                }
                StageFailure::Transient { .. } => (AlertKind::RetryExhausted, "retry_exhausted"),
            };

            state
                .alerts
                .dispatch(AlertEvent {
                    kind: alert_kind,
                    severity: alert_kind.severity(),
                    task_id: task.id,
                    channel_key: task.channel_key.clone(),
                    planning_page_id: task.planning_page_id.clone(),
                    stage: Some(stage.as_str()),
                    reason: reason.to_string(),
                    final_error: error_trail,
                })
                .await;

            info!(
                task_id = %task.id,
                stage = %stage,
                attempt = retry_count,
                "🛑 [DRIVER]: Terminal stage failure sealed."
            );
        }
    }
}

async fn release_gate(state: &AppState, service: ExternalService, holds_slot: bool) {
    if !holds_slot {
        return;
    }
    if let Err(release_fault) = state.rate_limits.release_global(service).await {
        warn!(service = %service, "⚠️ [DRIVER]: Gate release failed (reaper reconciles): {}", release_fault);
    } else {
        debug!(service = %service, "🔓 [DRIVER]: Global slot returned.");
    }
}
