// [libs/infra/db-turso/src/repositories/queue/queries.rs]
/*!
 * =================================================================
 * APARATO: PRODUCTION QUEUE SQL STORE
 * CLASIFICACIÓN: INFRASTRUCTURE SQL (ESTRATO L3)
 * RESPONSABILIDAD: SENTENCIAS ATÓMICAS DE LA COLA DURABLE
 *
 * # Mathematical Proof (ACID Claim Consistency):
 * Toda mutación de propiedad usa guardias de estado
 * (WHERE id = ? AND status = ?) dentro de una transacción inmediata;
 * un rows_affected = 0 delata que otra unidad ganó la carrera y la
 * operación se aborta sin efectos secundarios.
 * =================================================================
 */

/// Proyección canónica de la entidad tarea. El orden de columnas es
/// contrato del mapeador de filas: no reordenar sin nivelarlo.
pub const TASK_COLUMNS: &str = "id, channel_id, channel_key, planning_page_id, title, topic, \
     story_direction, status, priority, created_at, updated_at, claimed_at, \
     retry_count, next_retry_at, last_error, publish_url, review_approved_at, \
     resume_stage";

// --- ESTRATO DE INGESTA (GÉNESIS E IDEMPOTENCIA) ---

pub const FIND_TASK_BY_PLANNING_PAGE: &str = r#"
    SELECT id, channel_id, channel_key, planning_page_id, title, topic,
           story_direction, status, priority, created_at, updated_at, claimed_at,
           retry_count, next_retry_at, last_error, publish_url, review_approved_at,
           resume_stage
    FROM tasks
    WHERE planning_page_id = ?1
"#;

pub const FIND_TASK_BY_ID: &str = r#"
    SELECT id, channel_id, channel_key, planning_page_id, title, topic,
           story_direction, status, priority, created_at, updated_at, claimed_at,
           retry_count, next_retry_at, last_error, publish_url, review_approved_at,
           resume_stage
    FROM tasks
    WHERE id = ?1
"#;

/// Materializa una tarea nueva en el estado indicado (QUEUED o DRAFT).
pub const INSERT_TASK: &str = r#"
    INSERT INTO tasks (
        id, channel_id, channel_key, planning_page_id, title, topic,
        story_direction, status, priority, created_at, updated_at, retry_count
    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?10, 0)
"#;

/// Re-encolado en sitio de una fila terminal: refresca el material
/// editorial, resetea el presupuesto de reintentos y limpia el rastro.
pub const REQUEUE_TERMINAL_TASK: &str = r#"
    UPDATE tasks
    SET status = 'QUEUED',
        title = ?1,
        topic = ?2,
        story_direction = ?3,
        priority = ?4,
        retry_count = 0,
        next_retry_at = NULL,
        last_error = NULL,
        claimed_at = NULL,
        review_approved_at = NULL,
        resume_stage = NULL,
        updated_at = ?5
    WHERE id = ?6 AND status = ?7
"#;

// --- ESTRATO DE RECLAMO (FUNCIÓN DE ELECCIÓN) ---

/**
 * Canales con trabajo reclamable, bajo su cupo de posesión física y
 * ordenados por equidad round-robin (reclamo más antiguo primero,
 * vírgenes al frente, empates por id).
 *
 * ?1 = instante actual en RFC3339.
 */
pub const FIND_CLAIM_CANDIDATE_CHANNELS: &str = r#"
    SELECT c.id, c.key, c.max_concurrent, c.last_claimed_at
    FROM channels c
    WHERE c.active = 1
      AND EXISTS (
          SELECT 1 FROM tasks t
          WHERE t.channel_id = c.id
            AND (
                (t.status = 'QUEUED' AND (t.next_retry_at IS NULL OR t.next_retry_at <= ?1))
                OR t.status IN ('ASSETS_APPROVED', 'VIDEO_APPROVED', 'AUDIO_APPROVED')
                OR (t.status = 'FINAL_REVIEW' AND t.review_approved_at IS NOT NULL)
            )
      )
      AND (
          SELECT COUNT(*) FROM tasks h
          WHERE h.channel_id = c.id
            AND h.status IN (
                'CLAIMED', 'GENERATING_ASSETS', 'GENERATING_VIDEO',
                'GENERATING_AUDIO', 'GENERATING_SFX', 'ASSEMBLING', 'UPLOADING'
            )
      ) < c.max_concurrent
    ORDER BY (c.last_claimed_at IS NOT NULL) ASC, c.last_claimed_at ASC, c.id ASC
    LIMIT 8
"#;

/**
 * Mejor tarea reclamable de un canal: prioridad descendente,
 * antigüedad ascendente, empates por id.
 *
 * ?1 = instante actual RFC3339, ?2 = channel_id.
 */
pub const FIND_BEST_CLAIMABLE_TASK: &str = r#"
    SELECT id, channel_id, channel_key, planning_page_id, title, topic,
           story_direction, status, priority, created_at, updated_at, claimed_at,
           retry_count, next_retry_at, last_error, publish_url, review_approved_at,
           resume_stage
    FROM tasks
    WHERE channel_id = ?2
      AND (
          (status = 'QUEUED' AND (next_retry_at IS NULL OR next_retry_at <= ?1))
          OR status IN ('ASSETS_APPROVED', 'VIDEO_APPROVED', 'AUDIO_APPROVED')
          OR (status = 'FINAL_REVIEW' AND review_approved_at IS NOT NULL)
      )
    ORDER BY priority DESC, created_at ASC, id ASC
    LIMIT 1
"#;

/// Reserva atómica de una fila QUEUED (arista QUEUED -> CLAIMED).
pub const CLAIM_FROM_QUEUED: &str = r#"
    UPDATE tasks
    SET status = 'CLAIMED', claimed_at = ?1, updated_at = ?1
    WHERE id = ?2 AND status = 'QUEUED'
"#;

/// Reserva atómica de una fila aprobada hacia su estado de producción.
pub const CLAIM_INTO_STAGE: &str = r#"
    UPDATE tasks
    SET status = ?1, claimed_at = ?2, updated_at = ?2
    WHERE id = ?3 AND status = ?4
"#;

/// Reserva de subida: exige el sello vigente del revisor y lo consume.
pub const CLAIM_UPLOAD_FROM_REVIEW: &str = r#"
    UPDATE tasks
    SET status = 'UPLOADING', claimed_at = ?1, updated_at = ?1,
        review_approved_at = NULL
    WHERE id = ?2 AND status = 'FINAL_REVIEW' AND review_approved_at IS NOT NULL
"#;

/// Sella la marca round-robin del canal ganador.
pub const TOUCH_CHANNEL_CLAIM: &str = r#"
    UPDATE channels
    SET last_claimed_at = ?1, updated_at = ?1
    WHERE id = ?2
"#;

// --- ESTRATO DE EJECUCIÓN (FASES DEL DRIVER) ---

/// Avance guardado dentro de la familia worker-held (p. ej. CLAIMED -> GENERATING_ASSETS).
pub const ADVANCE_HELD_STAGE: &str = r#"
    UPDATE tasks
    SET status = ?1, updated_at = ?2
    WHERE id = ?3 AND status = ?4
"#;

/// Sellado de fase 3: estado final, custodia y rastro en una sentencia.
/// ?3 = 1 conserva la posesión (destino worker-held); ?4 < 0 conserva
/// el contador de reintentos vigente.
pub const FINALIZE_STAGE: &str = r#"
    UPDATE tasks
    SET status = ?1,
        updated_at = ?2,
        claimed_at = CASE WHEN ?3 = 1 THEN claimed_at ELSE NULL END,
        retry_count = CASE WHEN ?4 < 0 THEN retry_count ELSE ?4 END,
        next_retry_at = ?5,
        last_error = ?6,
        publish_url = COALESCE(?7, publish_url),
        review_approved_at = NULL,
        resume_stage = NULL
    WHERE id = ?8 AND status = ?9
"#;

// --- ESTRATO DE COMPUERTAS DE REVISIÓN ---

/// Aprobación humana de una compuerta *_READY.
pub const APPROVE_READY_GATE: &str = r#"
    UPDATE tasks
    SET status = ?1, updated_at = ?2
    WHERE id = ?3 AND status = ?4
"#;

/// Sello de aprobación de la revisión final (la fila sigue en FINAL_REVIEW).
pub const STAMP_FINAL_APPROVAL: &str = r#"
    UPDATE tasks
    SET review_approved_at = ?1, updated_at = ?1
    WHERE id = ?2 AND status = 'FINAL_REVIEW'
"#;

/// Re-revisión operador: UPLOAD_ERROR regresa a la compuerta final
/// sin re-producción. El sello del revisor nace limpio.
pub const REOPEN_FINAL_REVIEW: &str = r#"
    UPDATE tasks
    SET status = 'FINAL_REVIEW', updated_at = ?1, next_retry_at = NULL,
        resume_stage = NULL, review_approved_at = NULL
    WHERE id = ?2 AND status = 'UPLOAD_ERROR'
"#;

/// Rechazo humano: la compuerta desemboca en el terminal de error de su etapa.
pub const REJECT_GATE: &str = r#"
    UPDATE tasks
    SET status = ?1, last_error = ?2, updated_at = ?3,
        claimed_at = NULL, review_approved_at = NULL
    WHERE id = ?4 AND status = ?5
"#;

// --- ESTRATO DE RESILIENCIA (REAPER Y MARSHAL) ---

/// Filas en posesión física cuya custodia expiró (worker desaparecido).
pub const FIND_STALE_CLAIMS: &str = r#"
    SELECT id, channel_id, channel_key, planning_page_id, title, topic,
           story_direction, status, priority, created_at, updated_at, claimed_at,
           retry_count, next_retry_at, last_error, publish_url, review_approved_at,
           resume_stage
    FROM tasks
    WHERE claimed_at IS NOT NULL
      AND claimed_at < ?1
      AND status IN (
          'CLAIMED', 'GENERATING_ASSETS', 'GENERATING_VIDEO',
          'GENERATING_AUDIO', 'GENERATING_SFX', 'ASSEMBLING', 'UPLOADING'
      )
"#;

/// Expropiación de una fila huérfana hacia su terminal de error.
pub const EXPIRE_STALE_CLAIM: &str = r#"
    UPDATE tasks
    SET status = ?1, claimed_at = NULL, updated_at = ?2,
        retry_count = ?3, next_retry_at = ?4, last_error = ?5
    WHERE id = ?6 AND status = ?7
"#;

/// Terminales de error con reintento vencido, listos para promoción.
pub const FIND_DUE_RETRIES: &str = r#"
    SELECT id, channel_id, channel_key, planning_page_id, title, topic,
           story_direction, status, priority, created_at, updated_at, claimed_at,
           retry_count, next_retry_at, last_error, publish_url, review_approved_at,
           resume_stage
    FROM tasks
    WHERE next_retry_at IS NOT NULL
      AND next_retry_at <= ?1
      AND status IN (
          'ASSET_ERROR', 'VIDEO_ERROR', 'AUDIO_ERROR',
          'SFX_ERROR', 'ASSEMBLY_ERROR', 'UPLOAD_ERROR'
      )
    LIMIT 32
"#;

/// Ejecución de la arista *_ERROR -> QUEUED conservando el contador y
/// sellando la etapa de reanudación (?4) que el reclamo consumirá.
pub const PROMOTE_RETRY_TO_QUEUED: &str = r#"
    UPDATE tasks
    SET status = 'QUEUED', next_retry_at = NULL, updated_at = ?1,
        resume_stage = ?4
    WHERE id = ?2 AND status = ?3
"#;

// --- ESTRATO DE CANCELACIÓN Y MÉTRICAS ---

pub const CANCEL_TASK: &str = r#"
    UPDATE tasks
    SET status = 'CANCELLED', updated_at = ?1, claimed_at = NULL,
        next_retry_at = NULL, review_approved_at = NULL, resume_stage = NULL
    WHERE id = ?2 AND status = ?3
"#;

pub const COUNT_TASKS_WITH_STATUS: &str = r#"
    SELECT COUNT(*) FROM tasks WHERE status = ?1
"#;
