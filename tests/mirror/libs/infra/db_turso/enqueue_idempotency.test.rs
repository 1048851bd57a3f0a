// [tests/mirror/libs/infra/db_turso/enqueue_idempotency.test.rs]
/*!
 * =================================================================
 * APARATO: CERTIFICADOR DE INGESTA IDEMPOTENTE
 * CLASIFICACIÓN: TRINITY EVIDENCE // ESTRATO L3-MIRROR
 * RESPONSABILIDAD: ANCLA planning_page_id, DUPLICADOS Y RE-ENCOLADO
 *
 * # Mathematical Proof (Idempotent Ingest):
 * Para cualquier ancla, el número de filas activas no canceladas es
 * <= 1 en todo instante: el duplicado activo produce DuplicateTask y
 * el terminal se re-encola EN SITIO (misma fila, contador a cero).
 * =================================================================
 */

use libsql::params;
use showrunner_domain_models::{ChannelSeed, TaskPriority, TaskSeed, TaskStatus};
use showrunner_infra_db::repositories::{ChannelRepository, TaskRepository};
use showrunner_infra_db::{DbError, TursoClient};

fn tenant(key: &str) -> ChannelSeed {
    ChannelSeed {
        key: key.to_string(),
        display_name: format!("Channel {key}"),
        active: true,
        voice_id: "voz-nova".to_string(),
        branding: serde_json::Value::Null,
        storage_strategy: Default::default(),
        max_concurrent: 2,
        publish_binding: format!("yt-{key}"),
        auto_approve: vec![],
    }
}

fn seed(page: &str, channel_key: &str, title: &str) -> TaskSeed {
    TaskSeed {
        planning_page_id: page.to_string(),
        channel_key: channel_key.to_string(),
        title: title.to_string(),
        topic: "idempotency drill".to_string(),
        story_direction: String::new(),
        priority: TaskPriority::Normal,
    }
}

#[tokio::test]
async fn certify_active_duplicate_is_vetoed() {
    let database_client =
        TursoClient::connect("file:mem_idem_dup?mode=memory&cache=shared", None)
            .await
            .expect("CRITICAL_FAULT: Failed to anchor in-memory ledger.");

    let channels = ChannelRepository::new(database_client.clone());
    let tasks = TaskRepository::new(database_client.clone());

    channels.upsert_from_seed(&tenant("idem")).await.expect("CHANNEL_FAULT");

    let original = tasks
        .enqueue(&seed("PG-IDEM-01", "idem", "Original"))
        .await
        .expect("ENQUEUE_FAULT");

    // Replay del webhook con la fila aún activa: veto 409.
    let replay = tasks.enqueue(&seed("PG-IDEM-01", "idem", "Replayed")).await;
    assert!(matches!(
        replay,
        Err(DbError::DuplicateTask { ref planning_page_id }) if planning_page_id == "PG-IDEM-01"
    ));

    // Exactamente una fila por ancla, intacta.
    let survivor = tasks
        .find_by_planning_page("PG-IDEM-01")
        .await
        .expect("FETCH_FAULT")
        .expect("Fila evaporada");
    assert_eq!(survivor.id, original.id);
    assert_eq!(survivor.title, "Original");
    assert_eq!(tasks.count_with_status(TaskStatus::Queued).await.expect("COUNT_FAULT"), 1);
}

#[tokio::test]
async fn certify_terminal_requeue_in_place() {
    let database_client =
        TursoClient::connect("file:mem_idem_requeue?mode=memory&cache=shared", None)
            .await
            .expect("CRITICAL_FAULT: Failed to anchor in-memory ledger.");

    let channels = ChannelRepository::new(database_client.clone());
    let tasks = TaskRepository::new(database_client.clone());

    channels.upsert_from_seed(&tenant("requeue")).await.expect("CHANNEL_FAULT");

    let original = tasks
        .enqueue(&seed("PG-REQ-01", "requeue", "First cut"))
        .await
        .expect("ENQUEUE_FAULT");

    // Simulación de ciclo concluido: la fila reposa en PUBLISHED con rastro.
    let raw_connection = database_client.get_connection().expect("POOL_FAULT");
    raw_connection
        .execute(
            r#"UPDATE tasks
               SET status = 'PUBLISHED', claimed_at = NULL, retry_count = 3,
                   last_error = 'historic noise', publish_url = 'https://tube/v/demo'
               WHERE id = ?1"#,
            params![original.id.to_string()],
        )
        .await
        .expect("RAW_UPDATE_FAULT");

    // Re-encolado operador vía la MISMA ancla: arista PUBLISHED -> QUEUED.
    let requeued = tasks
        .enqueue(&seed("PG-REQ-01", "requeue", "Director's cut"))
        .await
        .expect("REQUEUE_FAULT");

    assert_eq!(requeued.id, original.id, "El re-encolado creó una fila nueva");
    assert_eq!(requeued.status, TaskStatus::Queued);
    assert_eq!(requeued.retry_count, 0, "Contador no reseteado");
    assert!(requeued.last_error.is_none(), "Rastro de error no limpiado");
    assert_eq!(requeued.title, "Director's cut", "Material editorial no refrescado");
    assert!(requeued.resume_stage.is_none(), "Re-encolado operador debe reproducir completo");
}

#[tokio::test]
async fn certify_upload_error_supports_rereview_edge() {
    let database_client =
        TursoClient::connect("file:mem_idem_rereview?mode=memory&cache=shared", None)
            .await
            .expect("CRITICAL_FAULT: Failed to anchor in-memory ledger.");

    let channels = ChannelRepository::new(database_client.clone());
    let tasks = TaskRepository::new(database_client.clone());

    channels.upsert_from_seed(&tenant("replay")).await.expect("CHANNEL_FAULT");
    let task = tasks
        .enqueue(&seed("PG-RR-01", "replay", "Upload casualty"))
        .await
        .expect("ENQUEUE_FAULT");

    // Subida fallida simulada, con rastro y sello de revisor residual.
    let raw_connection = database_client.get_connection().expect("POOL_FAULT");
    raw_connection
        .execute(
            r#"UPDATE tasks
               SET status = 'UPLOAD_ERROR', claimed_at = NULL,
                   last_error = 'publish quota', resume_stage = 'upload'
               WHERE id = ?1"#,
            params![task.id.to_string()],
        )
        .await
        .expect("RAW_UPDATE_FAULT");

    // Arista de re-revisión: regreso a la compuerta sin re-producción.
    let reopened = tasks.reopen_final_review("PG-RR-01").await.expect("REREVIEW_FAULT");
    assert_eq!(reopened.status, TaskStatus::FinalReview);
    assert!(reopened.review_approved_at.is_none(), "El sello debe nacer limpio");
    assert!(reopened.resume_stage.is_none());

    // La arista sólo existe desde UPLOAD_ERROR.
    let double_reopen = tasks.reopen_final_review("PG-RR-01").await;
    assert!(matches!(double_reopen, Err(DbError::IllegalTransition(_))));
}

#[tokio::test]
async fn certify_draft_registration_and_cancellation_edges() {
    let database_client =
        TursoClient::connect("file:mem_idem_draft?mode=memory&cache=shared", None)
            .await
            .expect("CRITICAL_FAULT: Failed to anchor in-memory ledger.");

    let channels = ChannelRepository::new(database_client.clone());
    let tasks = TaskRepository::new(database_client.clone());

    channels.upsert_from_seed(&tenant("draft")).await.expect("CHANNEL_FAULT");

    // Borrador idempotente: dos registros, una fila.
    let draft = tasks
        .register_draft(&seed("PG-DRAFT-01", "draft", "Sketch"))
        .await
        .expect("DRAFT_FAULT");
    assert_eq!(draft.status, TaskStatus::Draft);

    let repeated = tasks
        .register_draft(&seed("PG-DRAFT-01", "draft", "Sketch v2"))
        .await
        .expect("DRAFT_FAULT");
    assert_eq!(repeated.id, draft.id);
    assert_eq!(repeated.title, "Sketch", "El borrador repetido debe ser no-op");

    // Cancelación legal desde DRAFT.
    let cancelled = tasks.cancel("PG-DRAFT-01").await.expect("CANCEL_FAULT");
    assert_eq!(cancelled.status, TaskStatus::Cancelled);

    // Cancelar un terminal es una arista vetada.
    let double_cancel = tasks.cancel("PG-DRAFT-01").await;
    assert!(matches!(double_cancel, Err(DbError::IllegalTransition(_))));

    // Y el terminal cancelado acepta el re-encolado operador.
    let revived = tasks
        .enqueue(&seed("PG-DRAFT-01", "draft", "Sketch revived"))
        .await
        .expect("REVIVE_FAULT");
    assert_eq!(revived.id, draft.id);
    assert_eq!(revived.status, TaskStatus::Queued);
}
