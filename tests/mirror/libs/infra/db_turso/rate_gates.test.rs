// [tests/mirror/libs/infra/db_turso/rate_gates.test.rs]
/*!
 * =================================================================
 * APARATO: CERTIFICADOR DE COMPUERTAS DE TASA Y CONCURRENCIA
 * CLASIFICACIÓN: TRINITY EVIDENCE // ESTRATO L3-MIRROR
 * RESPONSABILIDAD: CUPO GLOBAL, VENTANA TOKEN-BUCKET Y RECONCILIACIÓN
 * =================================================================
 */

use showrunner_domain_models::{ChannelSeed, ExternalService, TaskPriority, TaskSeed};
use showrunner_infra_db::repositories::{
    ChannelRepository, GatePolicy, RateLimitRepository, TaskRepository, WindowRule, GLOBAL_SCOPE,
};
use showrunner_infra_db::TursoClient;

fn tenant(key: &str) -> ChannelSeed {
    ChannelSeed {
        key: key.to_string(),
        display_name: format!("Channel {key}"),
        active: true,
        voice_id: "voz-nova".to_string(),
        branding: serde_json::Value::Null,
        storage_strategy: Default::default(),
        max_concurrent: 50,
        publish_binding: format!("yt-{key}"),
        auto_approve: vec![],
    }
}

fn seed(page: &str, channel_key: &str) -> TaskSeed {
    TaskSeed {
        planning_page_id: page.to_string(),
        channel_key: channel_key.to_string(),
        title: format!("Production {page}"),
        topic: "gate drill".to_string(),
        story_direction: String::new(),
        priority: TaskPriority::Normal,
    }
}

#[tokio::test]
async fn certify_global_slot_accounting() {
    let database_client =
        TursoClient::connect("file:mem_gate_global?mode=memory&cache=shared", None)
            .await
            .expect("CRITICAL_FAULT: Failed to anchor in-memory ledger.");

    let gates = RateLimitRepository::new(database_client);
    gates
        .configure_global_cap(ExternalService::Video, 2)
        .await
        .expect("GATE_FAULT");

    // Dos slots entran, el tercero es Busy (jamás un error).
    assert!(gates.try_acquire_global(ExternalService::Video).await.expect("GATE_FAULT"));
    assert!(gates.try_acquire_global(ExternalService::Video).await.expect("GATE_FAULT"));
    assert!(!gates.try_acquire_global(ExternalService::Video).await.expect("GATE_FAULT"));

    assert_eq!(
        gates.read_global_state(ExternalService::Video).await.expect("GATE_FAULT"),
        Some((2, 2))
    );

    // Liberación con piso en cero.
    gates.release_global(ExternalService::Video).await.expect("GATE_FAULT");
    assert!(gates.try_acquire_global(ExternalService::Video).await.expect("GATE_FAULT"));
}

#[tokio::test]
async fn certify_window_token_bucket_semantics() {
    let database_client =
        TursoClient::connect("file:mem_gate_window?mode=memory&cache=shared", None)
            .await
            .expect("CRITICAL_FAULT: Failed to anchor in-memory ledger.");

    let gates = RateLimitRepository::new(database_client);

    // Ventana larga: el cap manda dentro de la misma ventana.
    let tight_rule = WindowRule { cap: 3, window_seconds: 3600 };
    for _ in 0..3 {
        assert!(gates
            .try_acquire_window(GLOBAL_SCOPE, ExternalService::Planning, tight_rule)
            .await
            .expect("GATE_FAULT"));
    }
    assert!(!gates
        .try_acquire_window(GLOBAL_SCOPE, ExternalService::Planning, tight_rule)
        .await
        .expect("GATE_FAULT"));

    // Ventana de cero segundos: el rollover re-arma el token siempre.
    let rolling_rule = WindowRule { cap: 1, window_seconds: 0 };
    for _ in 0..5 {
        assert!(gates
            .try_acquire_window("channel-roll", ExternalService::Image, rolling_rule)
            .await
            .expect("GATE_FAULT"));
    }
}

/**
 * Integración con la función de elección: un cupo global saturado hace
 * que el reclamo salte el canal (None) y la liberación lo re-habilita.
 */
#[tokio::test]
async fn certify_claim_respects_global_gate() {
    let database_client =
        TursoClient::connect("file:mem_gate_claim?mode=memory&cache=shared", None)
            .await
            .expect("CRITICAL_FAULT: Failed to anchor in-memory ledger.");

    let channels = ChannelRepository::new(database_client.clone());
    let tasks = TaskRepository::new(database_client.clone());
    let gates = RateLimitRepository::new(database_client.clone());
    let policy = GatePolicy::default();

    channels.upsert_from_seed(&tenant("gatey")).await.expect("CHANNEL_FAULT");
    gates
        .configure_global_cap(ExternalService::Image, 1)
        .await
        .expect("GATE_FAULT");

    tasks.enqueue(&seed("PG-G-1", "gatey")).await.expect("ENQUEUE_FAULT");
    tasks.enqueue(&seed("PG-G-2", "gatey")).await.expect("ENQUEUE_FAULT");

    let first = tasks
        .claim_next("W1", &policy)
        .await
        .expect("CLAIM_FAULT")
        .expect("Primer reclamo vetado con cupo libre");
    assert!(first.holds_global_slot, "El reclamo no retiene su slot global");
    assert_eq!(
        gates.read_global_state(ExternalService::Image).await.expect("GATE_FAULT"),
        Some((1, 1))
    );

    // Cupo saturado: el scheduler salta el canal sin error.
    assert!(tasks.claim_next("W2", &policy).await.expect("CLAIM_FAULT").is_none());

    // Liberación del slot (fase 3) re-habilita el despacho.
    gates.release_global(ExternalService::Image).await.expect("GATE_FAULT");
    assert!(tasks.claim_next("W2", &policy).await.expect("CLAIM_FAULT").is_some());
}

/**
 * Reconciliación post-colapso: contadores fugados se nivelan contra
 * las filas realmente en posesión física.
 */
#[tokio::test]
async fn certify_reconciliation_against_held_rows() {
    let database_client =
        TursoClient::connect("file:mem_gate_reconcile?mode=memory&cache=shared", None)
            .await
            .expect("CRITICAL_FAULT: Failed to anchor in-memory ledger.");

    let channels = ChannelRepository::new(database_client.clone());
    let tasks = TaskRepository::new(database_client.clone());
    let gates = RateLimitRepository::new(database_client.clone());
    let policy = GatePolicy::default();

    channels.upsert_from_seed(&tenant("reco")).await.expect("CHANNEL_FAULT");
    gates
        .configure_global_cap(ExternalService::Image, 4)
        .await
        .expect("GATE_FAULT");

    tasks.enqueue(&seed("PG-R-1", "reco")).await.expect("ENQUEUE_FAULT");
    tasks.claim_next("W1", &policy).await.expect("CLAIM_FAULT").expect("Reclamo vacío");

    // Fuga simulada: un proceso muerto devolvió el slot dos veces.
    gates.release_global(ExternalService::Image).await.expect("GATE_FAULT");
    gates.release_global(ExternalService::Image).await.expect("GATE_FAULT");
    assert_eq!(
        gates.read_global_state(ExternalService::Image).await.expect("GATE_FAULT"),
        Some((0, 4))
    );

    // La reconciliación restituye la verdad: 1 fila CLAIMED = 1 slot.
    gates.reconcile_global_counters().await.expect("GATE_FAULT");
    assert_eq!(
        gates.read_global_state(ExternalService::Image).await.expect("GATE_FAULT"),
        Some((1, 4))
    );
}
