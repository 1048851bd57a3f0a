// [tests/mirror/libs/infra/db_turso/queue_claim.test.rs]
/*!
 * =================================================================
 * APARATO: CERTIFICADOR DEL CICLO DE RECLAMO
 * CLASIFICACIÓN: TRINITY EVIDENCE // ESTRATO L3-MIRROR
 * RESPONSABILIDAD: AUDITORÍA QUEUED -> CLAIMED -> SELLADO -> COMPUERTA
 *
 * # Mathematical Proof (ACID Claim Lifecycle):
 * El test certifica que el Ledger actúa como semáforo atómico: una
 * fila reclamada desaparece del espacio reclamable, el sellado exige
 * la guardia de estado exacta y la compuerta de revisión re-habilita
 * el reclamo de la siguiente etapa.
 * =================================================================
 */

use showrunner_domain_models::{
    ChannelSeed, PipelineStage, ReviewGate, TaskPriority, TaskSeed, TaskStatus,
};
use showrunner_infra_db::repositories::{
    ChannelRepository, GatePolicy, StageFinalize, TaskRepository,
};
use showrunner_infra_db::{DbError, TursoClient};

fn demo_channel(key: &str) -> ChannelSeed {
    ChannelSeed {
        key: key.to_string(),
        display_name: format!("Channel {key}"),
        active: true,
        voice_id: "voz-nova".to_string(),
        branding: serde_json::json!({ "visual_style": "retro documentary" }),
        storage_strategy: Default::default(),
        max_concurrent: 2,
        publish_binding: format!("yt-{key}"),
        auto_approve: vec![],
    }
}

fn demo_task(page: &str, channel_key: &str) -> TaskSeed {
    TaskSeed {
        planning_page_id: page.to_string(),
        channel_key: channel_key.to_string(),
        title: "Volcanoes of Io".to_string(),
        topic: "astronomy".to_string(),
        story_direction: "wonder, slow pans".to_string(),
        priority: TaskPriority::Normal,
    }
}

#[tokio::test]
async fn certify_claim_lifecycle_integrity() {
    let database_client =
        TursoClient::connect("file:mem_queue_claim?mode=memory&cache=shared", None)
            .await
            .expect("CRITICAL_FAULT: Failed to anchor in-memory ledger.");

    let channels = ChannelRepository::new(database_client.clone());
    let tasks = TaskRepository::new(database_client.clone());
    let policy = GatePolicy::default();

    channels
        .upsert_from_seed(&demo_channel("nova"))
        .await
        .expect("CHANNEL_FAULT");

    // 1. INGESTA: la fila nace QUEUED y visible.
    let queued = tasks
        .enqueue(&demo_task("PG-CLAIM-01", "nova"))
        .await
        .expect("ENQUEUE_FAULT");
    assert_eq!(queued.status, TaskStatus::Queued);
    assert_eq!(queued.retry_count, 0);
    assert!(queued.claimed_at.is_none());

    // 2. RECLAMO: atómico, con posesión sellada.
    let claimed = tasks
        .claim_next("WORKER_ALPHA", &policy)
        .await
        .expect("CLAIM_FAULT")
        .expect("Reclamo vacío con trabajo listo");
    assert_eq!(claimed.task.status, TaskStatus::Claimed);
    assert_eq!(claimed.stage, PipelineStage::Assets);
    assert!(claimed.task.claimed_at.is_some());

    // El espacio reclamable quedó vacío: un segundo worker no roba.
    let theft_attempt = tasks
        .claim_next("WORKER_BETA", &policy)
        .await
        .expect("CLAIM_FAULT");
    assert!(theft_attempt.is_none(), "Doble asignación de fila activa");

    // 3. APERTURA Y SELLADO DE ETAPA.
    tasks
        .begin_stage(
            claimed.task.id,
            TaskStatus::Claimed,
            TaskStatus::GeneratingAssets,
        )
        .await
        .expect("BEGIN_FAULT");

    let sealed_status = tasks
        .finalize_stage(StageFinalize::new(
            &claimed.task,
            TaskStatus::GeneratingAssets,
            TaskStatus::AssetsReady,
        ))
        .await
        .expect("FINALIZE_FAULT");
    assert_eq!(sealed_status, TaskStatus::AssetsReady);

    let resting = tasks
        .find_by_id(claimed.task.id)
        .await
        .expect("FETCH_FAULT")
        .expect("Fila evaporada");
    assert_eq!(resting.status, TaskStatus::AssetsReady);
    assert!(resting.claimed_at.is_none(), "Posesión no liberada al salir de worker-held");

    // 4. GUARDIA DE ESTADO: un sellado con 'from' obsoleto es vetado.
    let stale_seal = tasks
        .finalize_stage(StageFinalize::new(
            &claimed.task,
            TaskStatus::GeneratingAssets,
            TaskStatus::AssetError,
        ))
        .await;
    assert!(matches!(stale_seal, Err(DbError::OwnershipConflict)));

    // 5. COMPUERTA HUMANA: la aprobación re-habilita el reclamo (video).
    tasks
        .record_review_decision("PG-CLAIM-01", ReviewGate::Assets, true, None)
        .await
        .expect("GATE_FAULT");

    let video_claim = tasks
        .claim_next("WORKER_ALPHA", &policy)
        .await
        .expect("CLAIM_FAULT")
        .expect("Fila aprobada no reclamable");
    assert_eq!(video_claim.stage, PipelineStage::Video);
    assert_eq!(video_claim.task.status, TaskStatus::GeneratingVideo);
}

#[tokio::test]
async fn certify_review_gates_are_invisible_to_claims() {
    let database_client =
        TursoClient::connect("file:mem_queue_gates?mode=memory&cache=shared", None)
            .await
            .expect("CRITICAL_FAULT: Failed to anchor in-memory ledger.");

    let channels = ChannelRepository::new(database_client.clone());
    let tasks = TaskRepository::new(database_client.clone());
    let policy = GatePolicy::default();

    channels
        .upsert_from_seed(&demo_channel("gated"))
        .await
        .expect("CHANNEL_FAULT");

    let task = tasks
        .enqueue(&demo_task("PG-GATE-01", "gated"))
        .await
        .expect("ENQUEUE_FAULT");

    // Conducción manual hasta la compuerta ASSETS_READY.
    let claimed = tasks
        .claim_next("WORKER_ALPHA", &policy)
        .await
        .expect("CLAIM_FAULT")
        .expect("Reclamo vacío");
    tasks
        .begin_stage(task.id, TaskStatus::Claimed, TaskStatus::GeneratingAssets)
        .await
        .expect("BEGIN_FAULT");
    tasks
        .finalize_stage(StageFinalize::new(
            &claimed.task,
            TaskStatus::GeneratingAssets,
            TaskStatus::AssetsReady,
        ))
        .await
        .expect("FINALIZE_FAULT");

    // La compuerta es invisible para el pipeline: nada que reclamar.
    let gate_claim = tasks
        .claim_next("WORKER_BETA", &policy)
        .await
        .expect("CLAIM_FAULT");
    assert!(gate_claim.is_none(), "El driver reclamó una compuerta de revisión");

    // El rechazo humano desemboca en el terminal de error con rastro.
    let rejected = tasks
        .record_review_decision(
            "PG-GATE-01",
            ReviewGate::Assets,
            false,
            Some("palette off-brand".to_string()),
        )
        .await
        .expect("GATE_FAULT");
    assert_eq!(rejected.status, TaskStatus::AssetError);
    assert_eq!(rejected.last_error.as_deref(), Some("palette off-brand"));
    assert!(rejected.next_retry_at.is_none(), "Un rechazo humano no agenda reintento");
}
