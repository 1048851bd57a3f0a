// [libs/infra/db-turso/src/repositories/queue/mod.rs]
/*!
 * =================================================================
 * APARATO: PRODUCTION QUEUE REPOSITORY
 * CLASIFICACIÓN: INFRASTRUCTURE LAYER (ESTRATO L3)
 * RESPONSABILIDAD: COLA DURABLE, RECLAMO ATÓMICO Y SELLADO DE FASES
 *
 * # Mathematical Proof (Transactional Exclusivity):
 * El reclamo completo (elección de canal, compuertas de tasa y
 * transición de la fila) vive dentro de una única transacción
 * inmediata sobre el Ledger. Las guardias de estado en cada UPDATE
 * hacen que dos workers concurrentes jamás posean la misma fila:
 * el perdedor observa rows_affected = 0 y continúa con el siguiente
 * candidato. Ninguna transacción abraza una llamada externa.
 * =================================================================
 */

pub mod queries;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use libsql::{params, Row, TransactionBehavior};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::client::TursoClient;
use crate::errors::DbError;
use crate::repositories::codec;
use crate::repositories::rate_limit::{
    acquire_stage_gates, release_global_slot_tx, GateDecision, GatePolicy,
};
use crate::repositories::sync_outbox::push_sync_job_tx;
use showrunner_domain_models::{
    ExternalService, PipelineStage, ReviewGate, SyncPayload, Task, TaskPriority, TaskSeed,
    TaskStatus,
};
use showrunner_domain_workflow::{RetryPolicy, RetryVerdict, StageFailure, TransientKind};

/// Resultado de un reclamo exitoso: la fila, su etapa y la compuerta
/// global que el driver debe devolver al concluir la llamada externa.
#[derive(Debug, Clone)]
pub struct ClaimedWork {
    pub task: Task,
    pub stage: PipelineStage,
    pub gate_service: ExternalService,
    pub holds_global_slot: bool,
}

/// Directiva de sellado de fase 3. El repositorio valida la arista,
/// muta la fila y deposita el mensaje de sincronía en el outbox dentro
/// de la misma transacción.
#[derive(Debug, Clone)]
pub struct StageFinalize {
    pub task_id: Uuid,
    pub planning_page_id: String,
    pub from_status: TaskStatus,
    pub to_status: TaskStatus,
    /// Some = fija el rastro de error; None = lo limpia (éxito).
    pub last_error: Option<String>,
    /// Some = sobrescribe el contador; None = lo conserva.
    pub retry_count: Option<u32>,
    pub next_retry_at: Option<DateTime<Utc>>,
    pub publish_url: Option<String>,
    /// Campos adicionales a reflejar en el planning store.
    pub sync_fields: serde_json::Map<String, serde_json::Value>,
}

impl StageFinalize {
    pub fn new(task: &Task, from_status: TaskStatus, to_status: TaskStatus) -> Self {
        Self {
            task_id: task.id,
            planning_page_id: task.planning_page_id.clone(),
            from_status,
            to_status,
            last_error: None,
            retry_count: None,
            next_retry_at: None,
            publish_url: None,
            sync_fields: serde_json::Map::new(),
        }
    }
}

/// Autoridad única sobre el inventario de tareas del Ledger.
pub struct TaskRepository {
    database_client: TursoClient,
}

impl TaskRepository {
    pub fn new(database_client: TursoClient) -> Self {
        Self { database_client }
    }

    // --- ESTRATO DE INGESTA ---

    /**
     * Ingesta idempotente anclada en planning_page_id:
     * - ausente: materializa la fila en QUEUED;
     * - terminal: re-encolado en sitio (contador a cero, rastro limpio);
     * - activa: DuplicateTask (el webhook responde 409).
     */
    #[instrument(skip(self, seed), fields(planning_page_id = %seed.planning_page_id))]
    pub async fn enqueue(&self, seed: &TaskSeed) -> Result<Task, DbError> {
        let connection = self.database_client.get_connection()?;
        let transaction = connection
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .await
            .map_err(|_| DbError::TransactionError)?;

        let now = Utc::now();
        let now_wire = codec::to_wire(now);

        // Resolución del tenant declarado.
        let mut channel_rows = transaction
            .query(
                "SELECT id, key FROM channels WHERE key = ?1 AND active = 1",
                params![seed.channel_key.clone()],
            )
            .await?;
        let channel_row = channel_rows
            .next()
            .await?
            .ok_or_else(|| DbError::ChannelNotFound(seed.channel_key.clone()))?;
        let channel_id_raw: String = channel_row.get(0)?;

        let existing = fetch_task_in_tx(&transaction, &seed.planning_page_id).await?;

        let task_id = match existing {
            None => {
                let fresh_id = Uuid::new_v4();
                transaction
                    .execute(
                        queries::INSERT_TASK,
                        params![
                            fresh_id.to_string(),
                            channel_id_raw,
                            seed.channel_key.clone(),
                            seed.planning_page_id.clone(),
                            seed.title.clone(),
                            seed.topic.clone(),
                            seed.story_direction.clone(),
                            TaskStatus::Queued.as_str(),
                            seed.priority.weight(),
                            now_wire.clone()
                        ],
                    )
                    .await?;
                info!(task_id = %fresh_id, "📥 [QUEUE]: Fresh task crystallized in QUEUED.");
                fresh_id
            }
            Some(task) if task.status.is_active() => {
                return Err(DbError::DuplicateTask {
                    planning_page_id: seed.planning_page_id.clone(),
                });
            }
            Some(task) => {
                // Re-encolado operador desde un terminal (arista única de salida).
                TaskStatus::validate_transition(task.status, TaskStatus::Queued)?;
                let requeued = transaction
                    .execute(
                        queries::REQUEUE_TERMINAL_TASK,
                        params![
                            seed.title.clone(),
                            seed.topic.clone(),
                            seed.story_direction.clone(),
                            seed.priority.weight(),
                            now_wire.clone(),
                            task.id.to_string(),
                            task.status.as_str()
                        ],
                    )
                    .await?;
                if requeued == 0 {
                    return Err(DbError::OwnershipConflict);
                }
                info!(task_id = %task.id, from = %task.status, "♻️  [QUEUE]: Terminal task re-queued in place.");
                task.id
            }
        };

        push_sync_job_tx(
            &transaction,
            &SyncPayload {
                planning_page_id: seed.planning_page_id.clone(),
                status: TaskStatus::Queued,
                fields: serde_json::Map::new(),
            },
            now,
        )
        .await?;

        transaction
            .commit()
            .await
            .map_err(|_| DbError::TransactionError)?;

        self.find_by_id(task_id).await?.ok_or(DbError::TaskNotFound)
    }

    /// Materializa un borrador sin encolar. Idempotente: una fila
    /// existente (en cualquier estado) se devuelve intacta.
    #[instrument(skip(self, seed), fields(planning_page_id = %seed.planning_page_id))]
    pub async fn register_draft(&self, seed: &TaskSeed) -> Result<Task, DbError> {
        if let Some(existing) = self.find_by_planning_page(&seed.planning_page_id).await? {
            return Ok(existing);
        }

        let connection = self.database_client.get_connection()?;
        let now_wire = codec::to_wire(Utc::now());

        let mut channel_rows = connection
            .query(
                "SELECT id FROM channels WHERE key = ?1 AND active = 1",
                params![seed.channel_key.clone()],
            )
            .await?;
        let channel_row = channel_rows
            .next()
            .await?
            .ok_or_else(|| DbError::ChannelNotFound(seed.channel_key.clone()))?;
        let channel_id_raw: String = channel_row.get(0)?;

        let fresh_id = Uuid::new_v4();
        connection
            .execute(
                queries::INSERT_TASK,
                params![
                    fresh_id.to_string(),
                    channel_id_raw,
                    seed.channel_key.clone(),
                    seed.planning_page_id.clone(),
                    seed.title.clone(),
                    seed.topic.clone(),
                    seed.story_direction.clone(),
                    TaskStatus::Draft.as_str(),
                    seed.priority.weight(),
                    now_wire
                ],
            )
            .await?;

        self.find_by_id(fresh_id).await?.ok_or(DbError::TaskNotFound)
    }

    /// Cancelación autorizada (sólo aristas DRAFT/QUEUED -> CANCELLED).
    #[instrument(skip(self))]
    pub async fn cancel(&self, planning_page_id: &str) -> Result<Task, DbError> {
        let connection = self.database_client.get_connection()?;
        let transaction = connection
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .await
            .map_err(|_| DbError::TransactionError)?;

        let now = Utc::now();
        let task = fetch_task_in_tx(&transaction, planning_page_id)
            .await?
            .ok_or(DbError::TaskNotFound)?;

        TaskStatus::validate_transition(task.status, TaskStatus::Cancelled)?;

        let cancelled = transaction
            .execute(
                queries::CANCEL_TASK,
                params![
                    codec::to_wire(now),
                    task.id.to_string(),
                    task.status.as_str()
                ],
            )
            .await?;
        if cancelled == 0 {
            return Err(DbError::OwnershipConflict);
        }

        push_sync_job_tx(
            &transaction,
            &SyncPayload {
                planning_page_id: planning_page_id.to_string(),
                status: TaskStatus::Cancelled,
                fields: serde_json::Map::new(),
            },
            now,
        )
        .await?;

        transaction
            .commit()
            .await
            .map_err(|_| DbError::TransactionError)?;

        self.find_by_id(task.id).await?.ok_or(DbError::TaskNotFound)
    }

    // --- ESTRATO DE RECLAMO (FUNCIÓN DE ELECCIÓN) ---

    /**
     * Reclamo atómico con equidad round-robin:
     * 1. canales con trabajo reclamable bajo su cupo de posesión;
     * 2. mejor tarea del canal (prioridad, antigüedad);
     * 3. compuertas del servicio de la etapa (global -> ventana);
     * 4. transición guardada + sello round-robin del canal.
     *
     * Una compuerta saturada NO es un error: el canal se salta.
     */
    #[instrument(skip(self, policy, worker_id), fields(worker_id = %worker_id))]
    pub async fn claim_next(
        &self,
        worker_id: &str,
        policy: &GatePolicy,
    ) -> Result<Option<ClaimedWork>, DbError> {
        let connection = self.database_client.get_connection()?;
        let transaction = connection
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .await
            .map_err(|_| DbError::TransactionError)?;

        let now = Utc::now();
        let now_wire = codec::to_wire(now);

        let mut channel_rows = transaction
            .query(
                queries::FIND_CLAIM_CANDIDATE_CHANNELS,
                params![now_wire.clone()],
            )
            .await?;

        let mut candidate_channel_ids: Vec<String> = Vec::new();
        while let Some(row) = channel_rows.next().await? {
            candidate_channel_ids.push(row.get(0)?);
        }

        for channel_id_raw in candidate_channel_ids {
            let mut task_rows = transaction
                .query(
                    queries::FIND_BEST_CLAIMABLE_TASK,
                    params![now_wire.clone(), channel_id_raw.clone()],
                )
                .await?;
            let Some(task_row) = task_rows.next().await? else {
                continue;
            };
            let mut task = map_row_to_task(&task_row)?;

            // Resolución de etapa: una fila QUEUED promovida por reintento
            // reanuda en su etapa de origen, no en la primera.
            let stage = match task.status {
                TaskStatus::Queued => task.resume_stage.unwrap_or(PipelineStage::Assets),
                other_status => match PipelineStage::for_claim_source(other_status) {
                    Some(stage) => stage,
                    None => continue,
                },
            };
            let gate_service = stage.service();

            // Compuertas en orden fijo, dentro de la misma transacción.
            let decision =
                acquire_stage_gates(&transaction, &channel_id_raw, gate_service, policy, now)
                    .await?;
            let holds_global_slot = match decision {
                GateDecision::Busy => continue,
                GateDecision::Granted { held_global } => held_global,
            };

            // Transición guardada según la fuente del reclamo.
            let (claimed_status, reserved) = match task.status {
                TaskStatus::Queued => {
                    TaskStatus::validate_transition(TaskStatus::Queued, TaskStatus::Claimed)?;
                    let affected = transaction
                        .execute(
                            queries::CLAIM_FROM_QUEUED,
                            params![now_wire.clone(), task.id.to_string()],
                        )
                        .await?;
                    (TaskStatus::Claimed, affected)
                }
                TaskStatus::FinalReview => {
                    TaskStatus::validate_transition(
                        TaskStatus::FinalReview,
                        TaskStatus::Uploading,
                    )?;
                    let affected = transaction
                        .execute(
                            queries::CLAIM_UPLOAD_FROM_REVIEW,
                            params![now_wire.clone(), task.id.to_string()],
                        )
                        .await?;
                    (TaskStatus::Uploading, affected)
                }
                approved_source => {
                    let in_progress = stage.in_progress_status();
                    TaskStatus::validate_transition(approved_source, in_progress)?;
                    let affected = transaction
                        .execute(
                            queries::CLAIM_INTO_STAGE,
                            params![
                                in_progress.as_str(),
                                now_wire.clone(),
                                task.id.to_string(),
                                approved_source.as_str()
                            ],
                        )
                        .await?;
                    (in_progress, affected)
                }
            };

            if reserved == 0 {
                // Carrera perdida contra otro proceso: devolver el slot y seguir.
                if holds_global_slot {
                    release_global_slot_tx(&transaction, gate_service).await?;
                }
                continue;
            }

            transaction
                .execute(
                    queries::TOUCH_CHANNEL_CLAIM,
                    params![now_wire.clone(), channel_id_raw],
                )
                .await?;

            transaction
                .commit()
                .await
                .map_err(|_| DbError::TransactionError)?;

            task.status = claimed_status;
            task.claimed_at = Some(now);
            if claimed_status == TaskStatus::Uploading {
                task.review_approved_at = None;
            }

            info!(
                task_id = %task.id,
                channel_key = %task.channel_key,
                stage = %stage,
                worker_id,
                "🎬 [QUEUE]: Task claimed for stage execution."
            );
            return Ok(Some(ClaimedWork {
                task,
                stage,
                gate_service,
                holds_global_slot,
            }));
        }

        transaction.rollback().await.ok();
        Ok(None)
    }

    /// Avance guardado dentro de la familia worker-held
    /// (p. ej. CLAIMED -> GENERATING_ASSETS al abrir la etapa).
    pub async fn begin_stage(
        &self,
        task_id: Uuid,
        from_status: TaskStatus,
        to_status: TaskStatus,
    ) -> Result<(), DbError> {
        TaskStatus::validate_transition(from_status, to_status)?;

        let connection = self.database_client.get_connection()?;
        let advanced = connection
            .execute(
                queries::ADVANCE_HELD_STAGE,
                params![
                    to_status.as_str(),
                    codec::to_wire(Utc::now()),
                    task_id.to_string(),
                    from_status.as_str()
                ],
            )
            .await?;

        if advanced == 0 {
            return Err(DbError::OwnershipConflict);
        }
        Ok(())
    }

    /**
     * Sellado de fase 3: valida la arista, muta la fila y deposita la
     * sincronía saliente en el outbox, todo en una transacción corta.
     * ASSEMBLED se encadena de inmediato a FINAL_REVIEW (compuerta).
     */
    #[instrument(skip(self, directive), fields(task_id = %directive.task_id, to = %directive.to_status))]
    pub async fn finalize_stage(&self, directive: StageFinalize) -> Result<TaskStatus, DbError> {
        TaskStatus::validate_transition(directive.from_status, directive.to_status)?;

        let connection = self.database_client.get_connection()?;
        let transaction = connection
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .await
            .map_err(|_| DbError::TransactionError)?;

        let now = Utc::now();
        let now_wire = codec::to_wire(now);

        let keep_possession: i64 = if directive.to_status.is_worker_held() { 1 } else { 0 };
        let retry_override: i64 = directive
            .retry_count
            .map(|count| count as i64)
            .unwrap_or(-1);
        let next_retry_wire = directive.next_retry_at.map(codec::to_wire);

        let sealed = transaction
            .execute(
                queries::FINALIZE_STAGE,
                params![
                    directive.to_status.as_str(),
                    now_wire.clone(),
                    keep_possession,
                    retry_override,
                    codec::opt_text(next_retry_wire),
                    codec::opt_text(directive.last_error.clone()),
                    codec::opt_text(directive.publish_url.clone()),
                    directive.task_id.to_string(),
                    directive.from_status.as_str()
                ],
            )
            .await?;
        if sealed == 0 {
            return Err(DbError::OwnershipConflict);
        }

        // Encadenamiento inmediato del ensamblado hacia la compuerta final.
        let mut final_status = directive.to_status;
        if final_status == TaskStatus::Assembled {
            TaskStatus::validate_transition(TaskStatus::Assembled, TaskStatus::FinalReview)?;
            let chained = transaction
                .execute(
                    queries::ADVANCE_HELD_STAGE,
                    params![
                        TaskStatus::FinalReview.as_str(),
                        now_wire.clone(),
                        directive.task_id.to_string(),
                        TaskStatus::Assembled.as_str()
                    ],
                )
                .await?;
            if chained == 0 {
                return Err(DbError::OwnershipConflict);
            }
            final_status = TaskStatus::FinalReview;
        }

        let mut sync_fields = directive.sync_fields;
        if let Some(error_detail) = &directive.last_error {
            sync_fields.insert("last_error".into(), error_detail.clone().into());
        }
        if let Some(url) = &directive.publish_url {
            sync_fields.insert("publish_url".into(), url.clone().into());
        }

        push_sync_job_tx(
            &transaction,
            &SyncPayload {
                planning_page_id: directive.planning_page_id.clone(),
                status: final_status,
                fields: sync_fields,
            },
            now,
        )
        .await?;

        transaction
            .commit()
            .await
            .map_err(|_| DbError::TransactionError)?;

        debug!(
            task_id = %directive.task_id,
            from = %directive.from_status,
            to = %final_status,
            "🧾 [QUEUE]: Stage finalize sealed with outbox sync."
        );
        Ok(final_status)
    }

    // --- ESTRATO DE COMPUERTAS DE REVISIÓN ---

    /**
     * Aplica un veredicto humano (o auto-aprobación de canal) sobre la
     * compuerta indicada. Aprobación: *_READY -> *_APPROVED, o sello
     * de FINAL_REVIEW. Rechazo: la compuerta desemboca en el terminal
     * de error de su etapa con el motivo como rastro.
     */
    #[instrument(skip(self, reason))]
    pub async fn record_review_decision(
        &self,
        planning_page_id: &str,
        gate: ReviewGate,
        approved: bool,
        reason: Option<String>,
    ) -> Result<Task, DbError> {
        let connection = self.database_client.get_connection()?;
        let transaction = connection
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .await
            .map_err(|_| DbError::TransactionError)?;

        let now = Utc::now();
        let now_wire = codec::to_wire(now);

        let task = fetch_task_in_tx(&transaction, planning_page_id)
            .await?
            .ok_or(DbError::TaskNotFound)?;

        let (expected_status, approved_status, rejected_status) = match gate {
            ReviewGate::Assets => (
                TaskStatus::AssetsReady,
                TaskStatus::AssetsApproved,
                TaskStatus::AssetError,
            ),
            ReviewGate::Video => (
                TaskStatus::VideoReady,
                TaskStatus::VideoApproved,
                TaskStatus::VideoError,
            ),
            ReviewGate::Audio => (
                TaskStatus::AudioReady,
                TaskStatus::AudioApproved,
                TaskStatus::AudioError,
            ),
            ReviewGate::Final => (
                TaskStatus::FinalReview,
                TaskStatus::FinalReview,
                TaskStatus::UploadError,
            ),
        };

        let sync_status = if approved {
            if gate == ReviewGate::Final {
                // El sello no muta el estado: habilita el reclamo de subida.
                if task.status != TaskStatus::FinalReview {
                    return Err(TaskStatus::validate_transition(
                        task.status,
                        TaskStatus::Uploading,
                    )
                    .unwrap_err()
                    .into());
                }
                let stamped = transaction
                    .execute(
                        queries::STAMP_FINAL_APPROVAL,
                        params![now_wire.clone(), task.id.to_string()],
                    )
                    .await?;
                if stamped == 0 {
                    return Err(DbError::OwnershipConflict);
                }
                TaskStatus::FinalReview
            } else {
                TaskStatus::validate_transition(task.status, approved_status)?;
                let advanced = transaction
                    .execute(
                        queries::APPROVE_READY_GATE,
                        params![
                            approved_status.as_str(),
                            now_wire.clone(),
                            task.id.to_string(),
                            expected_status.as_str()
                        ],
                    )
                    .await?;
                if advanced == 0 {
                    return Err(DbError::OwnershipConflict);
                }
                approved_status
            }
        } else {
            TaskStatus::validate_transition(task.status, rejected_status)?;
            let rejection_detail =
                reason.unwrap_or_else(|| "review rejected without stated reason".to_string());
            let rejected = transaction
                .execute(
                    queries::REJECT_GATE,
                    params![
                        rejected_status.as_str(),
                        rejection_detail,
                        now_wire.clone(),
                        task.id.to_string(),
                        expected_status.as_str()
                    ],
                )
                .await?;
            if rejected == 0 {
                return Err(DbError::OwnershipConflict);
            }
            rejected_status
        };

        let mut sync_fields = serde_json::Map::new();
        if gate == ReviewGate::Final && approved {
            sync_fields.insert("review_approved".into(), true.into());
        }

        push_sync_job_tx(
            &transaction,
            &SyncPayload {
                planning_page_id: planning_page_id.to_string(),
                status: sync_status,
                fields: sync_fields,
            },
            now,
        )
        .await?;

        transaction
            .commit()
            .await
            .map_err(|_| DbError::TransactionError)?;

        info!(
            task_id = %task.id,
            gate = gate.as_str(),
            approved,
            "🚦 [REVIEW_GATE]: Decision recorded."
        );
        self.find_by_id(task.id).await?.ok_or(DbError::TaskNotFound)
    }

    /**
     * Re-revisión operador de una subida fallida: ejecuta la arista
     * UPLOAD_ERROR -> FINAL_REVIEW (re-revisión sin re-producción).
     */
    #[instrument(skip(self))]
    pub async fn reopen_final_review(&self, planning_page_id: &str) -> Result<Task, DbError> {
        let connection = self.database_client.get_connection()?;
        let transaction = connection
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .await
            .map_err(|_| DbError::TransactionError)?;

        let now = Utc::now();
        let task = fetch_task_in_tx(&transaction, planning_page_id)
            .await?
            .ok_or(DbError::TaskNotFound)?;

        TaskStatus::validate_transition(task.status, TaskStatus::FinalReview)?;

        let reopened = transaction
            .execute(
                queries::REOPEN_FINAL_REVIEW,
                params![codec::to_wire(now), task.id.to_string()],
            )
            .await?;
        if reopened == 0 {
            return Err(DbError::OwnershipConflict);
        }

        push_sync_job_tx(
            &transaction,
            &SyncPayload {
                planning_page_id: planning_page_id.to_string(),
                status: TaskStatus::FinalReview,
                fields: serde_json::Map::new(),
            },
            now,
        )
        .await?;

        transaction
            .commit()
            .await
            .map_err(|_| DbError::TransactionError)?;

        info!(task_id = %task.id, "🔎 [REVIEW_GATE]: Failed upload reopened for final review.");
        self.find_by_id(task.id).await?.ok_or(DbError::TaskNotFound)
    }

    // --- ESTRATO DE RESILIENCIA ---

    /**
     * Promoción de reintentos vencidos: ejecuta la arista
     * *_ERROR -> QUEUED conservando el contador. Devuelve el número
     * de filas promovidas (el llamador despierta a los workers).
     */
    #[instrument(skip(self))]
    pub async fn promote_due_retries(&self, now: DateTime<Utc>) -> Result<u32, DbError> {
        let connection = self.database_client.get_connection()?;
        let transaction = connection
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .await
            .map_err(|_| DbError::TransactionError)?;

        let now_wire = codec::to_wire(now);
        let mut due_rows = transaction
            .query(queries::FIND_DUE_RETRIES, params![now_wire.clone()])
            .await?;

        let mut due_tasks = Vec::new();
        while let Some(row) = due_rows.next().await? {
            due_tasks.push(map_row_to_task(&row)?);
        }

        let mut promoted = 0u32;
        for task in due_tasks {
            TaskStatus::validate_transition(task.status, TaskStatus::Queued)?;
            let resume_stage = PipelineStage::for_error_status(task.status)
                .map(|stage| stage.as_str().to_string());
            let advanced = transaction
                .execute(
                    queries::PROMOTE_RETRY_TO_QUEUED,
                    params![
                        now_wire.clone(),
                        task.id.to_string(),
                        task.status.as_str(),
                        codec::opt_text(resume_stage)
                    ],
                )
                .await?;
            if advanced == 0 {
                continue; // otra instancia la promovió primero
            }

            push_sync_job_tx(
                &transaction,
                &SyncPayload {
                    planning_page_id: task.planning_page_id.clone(),
                    status: TaskStatus::Queued,
                    fields: serde_json::Map::new(),
                },
                now,
            )
            .await?;

            debug!(
                task_id = %task.id,
                retry_count = task.retry_count,
                "⏫ [RETRY_MARSHAL]: Error terminal promoted back to QUEUED."
            );
            promoted += 1;
        }

        transaction
            .commit()
            .await
            .map_err(|_| DbError::TransactionError)?;
        Ok(promoted)
    }

    /**
     * Expropiación de reclamos huérfanos: toda fila worker-held con
     * custodia vencida transiciona a su terminal de error con rastro
     * "worker timeout" y veredicto del motor de reintentos (el timeout
     * de worker es transitorio). CLAIMED usa la pareja de aristas
     * legales CLAIMED -> GENERATING_ASSETS -> ASSET_ERROR.
     *
     * Devuelve las filas recuperadas para que el Reaper alerte.
     */
    #[instrument(skip(self, retry_policy))]
    pub async fn recover_stale_claims(
        &self,
        abandoned_before: DateTime<Utc>,
        retry_policy: &RetryPolicy,
    ) -> Result<Vec<Task>, DbError> {
        let connection = self.database_client.get_connection()?;
        let transaction = connection
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .await
            .map_err(|_| DbError::TransactionError)?;

        let now = Utc::now();
        let now_wire = codec::to_wire(now);

        let mut stale_rows = transaction
            .query(
                queries::FIND_STALE_CLAIMS,
                params![codec::to_wire(abandoned_before)],
            )
            .await?;
        let mut stale_tasks = Vec::new();
        while let Some(row) = stale_rows.next().await? {
            stale_tasks.push(map_row_to_task(&row)?);
        }

        let timeout_failure =
            StageFailure::transient(TransientKind::WorkerTimeout, "worker timeout");
        let mut recovered = Vec::new();

        for mut task in stale_tasks {
            // Una fila CLAIMED muerta antes de abrir etapa conserva su
            // destino en resume_stage (reanudaciones) o es de la primera.
            let error_status = if task.status == TaskStatus::Claimed {
                let pending_stage = task.resume_stage.unwrap_or(PipelineStage::Assets);
                TaskStatus::validate_transition(
                    TaskStatus::Claimed,
                    pending_stage.in_progress_status(),
                )?;
                let error_status = pending_stage.error_status();
                TaskStatus::validate_transition(
                    pending_stage.in_progress_status(),
                    error_status,
                )?;
                error_status
            } else {
                let Some(error_status) = PipelineStage::error_status_for_held(task.status)
                else {
                    continue;
                };
                TaskStatus::validate_transition(task.status, error_status)?;
                error_status
            };

            let (final_retry_count, next_retry_at) =
                match retry_policy.assess(&timeout_failure, task.retry_count) {
                    RetryVerdict::Reschedule { retry_count, delay } => {
                        let scheduled = now
                            + ChronoDuration::from_std(delay)
                                .unwrap_or_else(|_| ChronoDuration::seconds(60));
                        (retry_count, Some(scheduled))
                    }
                    RetryVerdict::Exhausted { retry_count } => (retry_count, None),
                };

            let expired = transaction
                .execute(
                    queries::EXPIRE_STALE_CLAIM,
                    params![
                        error_status.as_str(),
                        now_wire.clone(),
                        final_retry_count as i64,
                        codec::opt_text(next_retry_at.map(codec::to_wire)),
                        "worker timeout",
                        task.id.to_string(),
                        task.status.as_str()
                    ],
                )
                .await?;
            if expired == 0 {
                continue;
            }

            push_sync_job_tx(
                &transaction,
                &SyncPayload {
                    planning_page_id: task.planning_page_id.clone(),
                    status: error_status,
                    fields: serde_json::Map::new(),
                },
                now,
            )
            .await?;

            warn!(
                task_id = %task.id,
                from = %task.status,
                to = %error_status,
                retry_count = final_retry_count,
                "💀 [REAPER]: Stale claim expropriated after worker silence."
            );

            task.status = error_status;
            task.claimed_at = None;
            task.retry_count = final_retry_count;
            task.next_retry_at = next_retry_at;
            task.last_error = Some("worker timeout".to_string());
            recovered.push(task);
        }

        transaction
            .commit()
            .await
            .map_err(|_| DbError::TransactionError)?;
        Ok(recovered)
    }

    // --- ESTRATO DE CONSULTA ---

    pub async fn find_by_planning_page(
        &self,
        planning_page_id: &str,
    ) -> Result<Option<Task>, DbError> {
        let connection = self.database_client.get_connection()?;
        let mut rows = connection
            .query(queries::FIND_TASK_BY_PLANNING_PAGE, params![planning_page_id])
            .await?;
        match rows.next().await? {
            Some(row) => Ok(Some(map_row_to_task(&row)?)),
            None => Ok(None),
        }
    }

    pub async fn find_by_id(&self, task_id: Uuid) -> Result<Option<Task>, DbError> {
        let connection = self.database_client.get_connection()?;
        let mut rows = connection
            .query(queries::FIND_TASK_BY_ID, params![task_id.to_string()])
            .await?;
        match rows.next().await? {
            Some(row) => Ok(Some(map_row_to_task(&row)?)),
            None => Ok(None),
        }
    }

    pub async fn count_with_status(&self, status: TaskStatus) -> Result<u64, DbError> {
        let connection = self.database_client.get_connection()?;
        let mut rows = connection
            .query(queries::COUNT_TASKS_WITH_STATUS, params![status.as_str()])
            .await?;
        match rows.next().await? {
            Some(row) => {
                let count: i64 = row.get(0)?;
                Ok(count as u64)
            }
            None => Ok(0),
        }
    }
}

// --- MAPEO DE FILAS ---

/// Búsqueda por ancla dentro de una transacción abierta.
async fn fetch_task_in_tx(
    transaction: &libsql::Transaction,
    planning_page_id: &str,
) -> Result<Option<Task>, DbError> {
    let mut rows = transaction
        .query(queries::FIND_TASK_BY_PLANNING_PAGE, params![planning_page_id])
        .await?;
    match rows.next().await? {
        Some(row) => Ok(Some(map_row_to_task(&row)?)),
        None => Ok(None),
    }
}

/// Transforma una fila del Ledger en la entidad de dominio.
/// El orden de columnas es el contrato de TASK_COLUMNS.
pub(crate) fn map_row_to_task(row: &Row) -> Result<Task, DbError> {
    let id_raw: String = row.get(0)?;
    let channel_id_raw: String = row.get(1)?;
    let channel_key: String = row.get(2)?;
    let planning_page_id: String = row.get(3)?;
    let title: String = row.get(4)?;
    let topic: String = row.get(5)?;
    let story_direction: String = row.get(6)?;
    let status_raw: String = row.get(7)?;
    let priority_weight: i64 = row.get(8)?;
    let created_raw: String = row.get(9)?;
    let updated_raw: String = row.get(10)?;
    let claimed_raw: Option<String> = row.get::<String>(11).ok();
    let retry_count: i64 = row.get(12)?;
    let next_retry_raw: Option<String> = row.get::<String>(13).ok();
    let last_error: Option<String> = row.get::<String>(14).ok();
    let publish_url: Option<String> = row.get::<String>(15).ok();
    let review_approved_raw: Option<String> = row.get::<String>(16).ok();
    let resume_stage_raw: Option<String> = row.get::<String>(17).ok();

    let status = TaskStatus::parse(&status_raw)
        .ok_or_else(|| DbError::MappingError(format!("STATUS_DECODE [{status_raw}]")))?;
    let resume_stage = resume_stage_raw.and_then(|raw| PipelineStage::parse(&raw));

    Ok(Task {
        id: codec::parse_uuid(&id_raw)?,
        channel_id: codec::parse_uuid(&channel_id_raw)?,
        channel_key,
        planning_page_id,
        title,
        topic,
        story_direction,
        status,
        priority: TaskPriority::from_weight(priority_weight),
        created_at: codec::parse_wire(&created_raw)?,
        updated_at: codec::parse_wire(&updated_raw)?,
        claimed_at: codec::parse_wire_optional(claimed_raw)?,
        retry_count: retry_count as u32,
        next_retry_at: codec::parse_wire_optional(next_retry_raw)?,
        last_error,
        publish_url,
        review_approved_at: codec::parse_wire_optional(review_approved_raw)?,
        resume_stage,
    })
}
