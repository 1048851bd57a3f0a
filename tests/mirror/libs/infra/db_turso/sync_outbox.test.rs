// [tests/mirror/libs/infra/db_turso/sync_outbox.test.rs]
/*!
 * =================================================================
 * APARATO: CERTIFICADOR DEL OUTBOX DE SINCRONÍA
 * CLASIFICACIÓN: TRINITY EVIDENCE // ESTRATO L3-MIRROR
 * RESPONSABILIDAD: ATOMICIDAD ESTADO+MENSAJE Y CICLO DE REINTENTO
 * =================================================================
 */

use chrono::{Duration as ChronoDuration, Utc};
use showrunner_domain_models::{ChannelSeed, SyncPayload, TaskPriority, TaskSeed, TaskStatus};
use showrunner_infra_db::repositories::{
    ChannelRepository, SyncOutboxRepository, TaskRepository,
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
        max_concurrent: 2,
        publish_binding: format!("yt-{key}"),
        auto_approve: vec![],
    }
}

#[tokio::test]
async fn certify_state_changes_deposit_outbox_messages() {
    let database_client =
        TursoClient::connect("file:mem_outbox_atomic?mode=memory&cache=shared", None)
            .await
            .expect("CRITICAL_FAULT: Failed to anchor in-memory ledger.");

    let channels = ChannelRepository::new(database_client.clone());
    let tasks = TaskRepository::new(database_client.clone());
    let outbox = SyncOutboxRepository::new(database_client.clone());

    channels.upsert_from_seed(&tenant("synced")).await.expect("CHANNEL_FAULT");

    assert_eq!(outbox.count_pending().await.expect("COUNT_FAULT"), 0);

    tasks
        .enqueue(&TaskSeed {
            planning_page_id: "PG-SYNC-01".to_string(),
            channel_key: "synced".to_string(),
            title: "Sync drill".to_string(),
            topic: "outbox".to_string(),
            story_direction: String::new(),
            priority: TaskPriority::Normal,
        })
        .await
        .expect("ENQUEUE_FAULT");

    // La ingesta depositó su mensaje en la misma transacción.
    assert_eq!(outbox.count_pending().await.expect("COUNT_FAULT"), 1);

    let due = outbox.fetch_due(16, Utc::now()).await.expect("FETCH_FAULT");
    assert_eq!(due.len(), 1);
    assert_eq!(due[0].payload.planning_page_id, "PG-SYNC-01");
    assert_eq!(due[0].payload.status, TaskStatus::Queued);
    assert_eq!(due[0].attempts, 0);
}

#[tokio::test]
async fn certify_reschedule_and_drop_cycle() {
    let database_client =
        TursoClient::connect("file:mem_outbox_cycle?mode=memory&cache=shared", None)
            .await
            .expect("CRITICAL_FAULT: Failed to anchor in-memory ledger.");

    let outbox = SyncOutboxRepository::new(database_client);

    outbox
        .push(&SyncPayload {
            planning_page_id: "PG-SYNC-02".to_string(),
            status: TaskStatus::VideoReady,
            fields: serde_json::Map::new(),
        })
        .await
        .expect("PUSH_FAULT");

    let due = outbox.fetch_due(16, Utc::now()).await.expect("FETCH_FAULT");
    assert_eq!(due.len(), 1);
    let job = &due[0];

    // Fallo transitorio del Motor P: reprogramación con rastro.
    let next_attempt = Utc::now() + ChronoDuration::seconds(120);
    outbox
        .reschedule(job.id, 1, next_attempt, "502 from planning store")
        .await
        .expect("RESCHEDULE_FAULT");

    // Aún no vencido: invisible para el relay.
    assert!(outbox.fetch_due(16, Utc::now()).await.expect("FETCH_FAULT").is_empty());

    // Vencido: regresa con el contador y el rastro sellados.
    let retried = outbox
        .fetch_due(16, Utc::now() + ChronoDuration::seconds(180))
        .await
        .expect("FETCH_FAULT");
    assert_eq!(retried.len(), 1);
    assert_eq!(retried[0].attempts, 1);
    assert_eq!(retried[0].last_error.as_deref(), Some("502 from planning store"));

    // Agotamiento: descarte con advertencia, el Ledger sigue siendo verdad.
    outbox
        .drop_exhausted(&retried[0], "final 502")
        .await
        .expect("DROP_FAULT");
    assert_eq!(outbox.count_pending().await.expect("COUNT_FAULT"), 0);
}

#[tokio::test]
async fn certify_delivery_completion_removes_job() {
    let database_client =
        TursoClient::connect("file:mem_outbox_done?mode=memory&cache=shared", None)
            .await
            .expect("CRITICAL_FAULT: Failed to anchor in-memory ledger.");

    let outbox = SyncOutboxRepository::new(database_client);

    outbox
        .push(&SyncPayload {
            planning_page_id: "PG-SYNC-03".to_string(),
            status: TaskStatus::Published,
            fields: {
                let mut fields = serde_json::Map::new();
                fields.insert("publish_url".into(), "https://tube/v/demo".into());
                fields
            },
        })
        .await
        .expect("PUSH_FAULT");

    let due = outbox.fetch_due(16, Utc::now()).await.expect("FETCH_FAULT");
    outbox.complete(due[0].id).await.expect("COMPLETE_FAULT");

    assert_eq!(outbox.count_pending().await.expect("COUNT_FAULT"), 0);
}
