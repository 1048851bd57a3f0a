// [tests/mirror/libs/infra/db_turso/queue_fairness.test.rs]
/*!
 * =================================================================
 * APARATO: CERTIFICADOR DE EQUIDAD MULTI-TENANT DEL LEDGER
 * CLASIFICACIÓN: TRINITY EVIDENCE // ESTRATO L3-MIRROR
 * RESPONSABILIDAD: ROUND-ROBIN ENTRE CANALES Y PRIORIDAD INTRA-CANAL
 * =================================================================
 */

use std::collections::HashMap;

use showrunner_domain_models::{ChannelSeed, TaskPriority, TaskSeed, TaskStatus};
use showrunner_infra_db::repositories::{ChannelRepository, GatePolicy, TaskRepository};
use showrunner_infra_db::TursoClient;

fn tenant(key: &str, max_concurrent: u32) -> ChannelSeed {
    ChannelSeed {
        key: key.to_string(),
        display_name: format!("Channel {key}"),
        active: true,
        voice_id: "voz-nova".to_string(),
        branding: serde_json::Value::Null,
        storage_strategy: Default::default(),
        max_concurrent,
        publish_binding: format!("yt-{key}"),
        auto_approve: vec![],
    }
}

fn seed(page: &str, channel_key: &str, priority: TaskPriority) -> TaskSeed {
    TaskSeed {
        planning_page_id: page.to_string(),
        channel_key: channel_key.to_string(),
        title: format!("Production {page}"),
        topic: "fairness drill".to_string(),
        story_direction: String::new(),
        priority,
    }
}

/**
 * Escenario nominal: dos canales saturados, reclamos alternados.
 * Tras 2N reclamos cada canal fue atendido exactamente N veces y
 * ningún canal pasó 5 reclamos sin ser atendido.
 */
#[tokio::test]
async fn certify_round_robin_across_saturated_channels() {
    let database_client =
        TursoClient::connect("file:mem_fairness?mode=memory&cache=shared", None)
            .await
            .expect("CRITICAL_FAULT: Failed to anchor in-memory ledger.");

    let channels = ChannelRepository::new(database_client.clone());
    let tasks = TaskRepository::new(database_client.clone());
    let policy = GatePolicy::default();

    // Cupos altos: la equidad se mide sin interferencia de posesión.
    channels.upsert_from_seed(&tenant("alpha", 500)).await.expect("CHANNEL_FAULT");
    channels.upsert_from_seed(&tenant("beta", 500)).await.expect("CHANNEL_FAULT");

    const PER_CHANNEL: usize = 25;
    for index in 0..PER_CHANNEL {
        tasks
            .enqueue(&seed(&format!("PG-A-{index:03}"), "alpha", TaskPriority::Normal))
            .await
            .expect("ENQUEUE_FAULT");
        tasks
            .enqueue(&seed(&format!("PG-B-{index:03}"), "beta", TaskPriority::Normal))
            .await
            .expect("ENQUEUE_FAULT");
    }

    let mut tally: HashMap<String, usize> = HashMap::new();
    let mut starvation_gap: HashMap<String, usize> = HashMap::new();

    for _ in 0..(PER_CHANNEL * 2) {
        let claimed = tasks
            .claim_next("WORKER_FAIR", &policy)
            .await
            .expect("CLAIM_FAULT")
            .expect("Espacio reclamable seco antes de tiempo");

        let winner_key = claimed.task.channel_key.clone();
        *tally.entry(winner_key.clone()).or_default() += 1;

        for channel_key in ["alpha", "beta"] {
            let gap = starvation_gap.entry(channel_key.to_string()).or_default();
            if channel_key == winner_key {
                *gap = 0;
            } else {
                *gap += 1;
                assert!(
                    *gap < 5,
                    "Canal {channel_key} alcanzó {gap} reclamos de hambruna"
                );
            }
        }
    }

    assert_eq!(tally.get("alpha"), Some(&PER_CHANNEL));
    assert_eq!(tally.get("beta"), Some(&PER_CHANNEL));
}

/**
 * Prioridad intra-canal: High antes que Normal antes que Low a igual
 * disponibilidad, con antigüedad como desempate.
 */
#[tokio::test]
async fn certify_priority_order_within_a_channel() {
    let database_client =
        TursoClient::connect("file:mem_priority?mode=memory&cache=shared", None)
            .await
            .expect("CRITICAL_FAULT: Failed to anchor in-memory ledger.");

    let channels = ChannelRepository::new(database_client.clone());
    let tasks = TaskRepository::new(database_client.clone());
    let policy = GatePolicy::default();

    channels.upsert_from_seed(&tenant("solo", 500)).await.expect("CHANNEL_FAULT");

    // Sembradas en orden adverso al esperado de despacho.
    tasks.enqueue(&seed("PG-LOW", "solo", TaskPriority::Low)).await.expect("ENQUEUE_FAULT");
    tasks.enqueue(&seed("PG-NORMAL", "solo", TaskPriority::Normal)).await.expect("ENQUEUE_FAULT");
    tasks.enqueue(&seed("PG-HIGH", "solo", TaskPriority::High)).await.expect("ENQUEUE_FAULT");

    let mut claimed_pages = Vec::new();
    for _ in 0..3 {
        let claimed = tasks
            .claim_next("WORKER_PRIO", &policy)
            .await
            .expect("CLAIM_FAULT")
            .expect("Espacio reclamable seco");
        assert_eq!(claimed.task.status, TaskStatus::Claimed);
        claimed_pages.push(claimed.task.planning_page_id.clone());
    }

    assert_eq!(claimed_pages, vec!["PG-HIGH", "PG-NORMAL", "PG-LOW"]);
}

/// El cupo de posesión por canal acota los reclamos simultáneos.
#[tokio::test]
async fn certify_channel_possession_cap_blocks_claims() {
    let database_client =
        TursoClient::connect("file:mem_chan_cap?mode=memory&cache=shared", None)
            .await
            .expect("CRITICAL_FAULT: Failed to anchor in-memory ledger.");

    let channels = ChannelRepository::new(database_client.clone());
    let tasks = TaskRepository::new(database_client.clone());
    let policy = GatePolicy::default();

    channels.upsert_from_seed(&tenant("capped", 2)).await.expect("CHANNEL_FAULT");

    for index in 0..4 {
        tasks
            .enqueue(&seed(&format!("PG-CAP-{index}"), "capped", TaskPriority::Normal))
            .await
            .expect("ENQUEUE_FAULT");
    }

    // Dos posesiones entran; la tercera queda vetada por el cupo.
    assert!(tasks.claim_next("W1", &policy).await.expect("CLAIM_FAULT").is_some());
    assert!(tasks.claim_next("W2", &policy).await.expect("CLAIM_FAULT").is_some());
    assert!(
        tasks.claim_next("W3", &policy).await.expect("CLAIM_FAULT").is_none(),
        "El cupo de posesión del canal fue ignorado"
    );
}
