// [tests/mirror/apps/orchestrator/services/pipeline_lifecycle.test.rs]
/*!
 * =================================================================
 * APARATO: CERTIFICADOR DEL CICLO FELIZ DEL PIPELINE
 * CLASIFICACIÓN: TRINITY EVIDENCE // ESTRATO L4-MIRROR
 * RESPONSABILIDAD: QUEUED -> ... -> PUBLISHED CON AUTO-APROBACIÓN,
 *                  PURGA DE WORKSPACE Y OUTBOX POR TRANSICIÓN
 * =================================================================
 */

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use tokio::sync::watch;

use showrunner_core_vault::TokenBundle;
use showrunner_domain_models::{
    ChannelSeed, ExternalService, ReviewGate, TaskPriority, TaskSeed, TaskStatus,
};
use showrunner_infra_db::repositories::{ChannelRepository, GatePolicy};
use showrunner_infra_db::TursoClient;
use showrunner_infra_providers::{
    AudioServicePort, CredentialIssuerPort, ImageServicePort, PlanningStorePort, ProviderError,
    SfxServicePort, UploadMetadata, UploadTargetPort, VideoServicePort,
};
use showrunner_orchestrator::config::{OrchestratorConfig, ProviderEndpoints, ServiceCaps};
use showrunner_orchestrator::services::worker_pool::drive_claimed_work;
use showrunner_orchestrator::state::{AppState, StageServices};

// --- DOBLES GUIONADOS: escriben artefactos reales sobre el workspace ---

struct FileWriterMesh;

#[async_trait]
impl ImageServicePort for FileWriterMesh {
    async fn generate(&self, _prompt: &str, output_path: &Path) -> Result<(), ProviderError> {
        tokio::fs::write(output_path, b"png-bytes").await.expect("STUB_IO_FAULT");
        Ok(())
    }
}
#[async_trait]
impl VideoServicePort for FileWriterMesh {
    async fn generate(
        &self,
        composite_path: &Path,
        _motion: &str,
        output_path: &Path,
    ) -> Result<(), ProviderError> {
        assert!(composite_path.exists(), "El compuesto de assets no precede al video");
        tokio::fs::write(output_path, b"mp4-bytes").await.expect("STUB_IO_FAULT");
        Ok(())
    }
}
#[async_trait]
impl AudioServicePort for FileWriterMesh {
    async fn generate(&self, _t: &str, voice_id: &str, output_path: &Path) -> Result<(), ProviderError> {
        assert_eq!(voice_id, "voz-lumen", "La voz del canal no llegó a la etapa de audio");
        tokio::fs::write(output_path, b"mp3-bytes").await.expect("STUB_IO_FAULT");
        Ok(())
    }
}
#[async_trait]
impl SfxServicePort for FileWriterMesh {
    async fn generate(&self, _p: &str, _v: &str, output_path: &Path) -> Result<(), ProviderError> {
        tokio::fs::write(output_path, b"sfx-bytes").await.expect("STUB_IO_FAULT");
        Ok(())
    }
}
#[async_trait]
impl UploadTargetPort for FileWriterMesh {
    async fn upload(
        &self,
        credentials: &TokenBundle,
        video_path: &Path,
        metadata: &UploadMetadata,
    ) -> Result<String, ProviderError> {
        assert_eq!(credentials.access_token, "at-lumen");
        assert!(video_path.exists(), "El master no existe al publicar");
        Ok(format!("https://tube/v/{}", metadata.idempotency_key))
    }
}
#[async_trait]
impl PlanningStorePort for FileWriterMesh {
    async fn update_status(
        &self,
        _: &str,
        _: TaskStatus,
        _: &serde_json::Map<String, serde_json::Value>,
    ) -> Result<(), ProviderError> {
        Ok(())
    }
}
#[async_trait]
impl CredentialIssuerPort for FileWriterMesh {
    async fn refresh(&self, refresh_token: &str, _: &str) -> Result<TokenBundle, ProviderError> {
        Ok(TokenBundle {
            access_token: "at-lumen".to_string(),
            refresh_token: refresh_token.to_string(),
            expires_at: Utc::now() + ChronoDuration::hours(6),
        })
    }
}

fn scripted_services() -> StageServices {
    StageServices {
        image: Arc::new(FileWriterMesh),
        video: Arc::new(FileWriterMesh),
        audio: Arc::new(FileWriterMesh),
        sfx: Arc::new(FileWriterMesh),
        upload: Arc::new(FileWriterMesh),
        planning: Arc::new(FileWriterMesh),
        issuer: Arc::new(FileWriterMesh),
    }
}

/// Ejecutable de ensamblado guionado: materializa --output y sale 0.
fn forge_assembly_script(sandbox: &Path) -> PathBuf {
    let script_path = sandbox.join("assemble.sh");
    let script_body = "#!/bin/sh\nwhile [ $# -gt 1 ]; do\n  if [ \"$1\" = \"--output\" ]; then : > \"$2\"; fi\n  shift\ndone\nexit 0\n";
    std::fs::write(&script_path, script_body).expect("STUB_IO_FAULT");

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&script_path, std::fs::Permissions::from_mode(0o755))
            .expect("STUB_CHMOD_FAULT");
    }
    script_path
}

fn test_config(workspace_root: PathBuf, assembly_binary: PathBuf) -> OrchestratorConfig {
    let dummy = "http://127.0.0.1:9".to_string();
    OrchestratorConfig {
        database_url: "file:unused?mode=memory".to_string(),
        database_token: None,
        listening_port: 0,
        worker_count: 0,
        sync_worker_count: 0,
        encryption_key: "test-master-key".to_string(),
        planning_webhook_secret: "plan-secret".to_string(),
        alert_webhook: None,
        workspace_root,
        assembly_binary,
        shutdown_grace: Duration::from_secs(5),
        service_caps: ServiceCaps::default(),
        providers: ProviderEndpoints {
            planning_url: dummy.clone(),
            planning_token: "t".into(),
            image_url: dummy.clone(),
            image_token: "t".into(),
            video_url: dummy.clone(),
            video_token: "t".into(),
            audio_url: dummy.clone(),
            audio_token: "t".into(),
            sfx_url: dummy.clone(),
            sfx_token: "t".into(),
            upload_url: dummy.clone(),
            issuer_url: dummy,
        },
        channel_seeds: vec![],
    }
}

/**
 * Escenario nominal completo: una tarea atraviesa las siete etapas con
 * las cuatro compuertas auto-aprobadas por política de canal, termina
 * PUBLISHED con URL, workspace purgado y una sincronía por transición.
 */
#[tokio::test]
async fn certify_full_happy_path_to_published() {
    let database_client =
        TursoClient::connect("file:mem_pipeline_happy?mode=memory&cache=shared", None)
            .await
            .expect("CRITICAL_FAULT: Failed to anchor in-memory ledger.");

    let sandbox = tempfile::tempdir().expect("INFRA_FAULT");
    let assembly_script = forge_assembly_script(sandbox.path());
    let workspace_root = sandbox.path().join("workspace");

    let channel = ChannelRepository::new(database_client.clone())
        .upsert_from_seed(&ChannelSeed {
            key: "lumen".to_string(),
            display_name: "Lumen Shorts".to_string(),
            active: true,
            voice_id: "voz-lumen".to_string(),
            branding: serde_json::json!({ "visual_style": "neon minimal" }),
            storage_strategy: Default::default(),
            max_concurrent: 2,
            publish_binding: "yt-lumen".to_string(),
            auto_approve: vec![
                ReviewGate::Assets,
                ReviewGate::Video,
                ReviewGate::Audio,
                ReviewGate::Final,
            ],
        })
        .await
        .expect("CHANNEL_FAULT");

    let (_shutdown_guard, shutdown_rx) = {
        let (tx, rx) = watch::channel(false);
        (tx, rx)
    };
    let mut state = AppState::new(
        database_client,
        test_config(workspace_root, assembly_script),
        scripted_services(),
        shutdown_rx,
    );
    // Ventanas de canal neutralizadas: aquí se audita el ciclo feliz,
    // no el limitador (certificado en su propio aparato).
    state.gate_policy = Arc::new(GatePolicy::default());

    // Credencial de publicación sellada en la bóveda del Ledger.
    state
        .custodian
        .store(
            channel.id,
            ExternalService::Upload,
            &TokenBundle {
                access_token: "at-lumen".to_string(),
                refresh_token: "rt-lumen".to_string(),
                expires_at: Utc::now() + ChronoDuration::hours(6),
            },
        )
        .await
        .expect("VAULT_FAULT");

    let task = state
        .tasks
        .enqueue(&TaskSeed {
            planning_page_id: "PG-HAPPY-01".to_string(),
            channel_key: "lumen".to_string(),
            title: "Volcanoes of Io".to_string(),
            topic: "astronomy".to_string(),
            story_direction: "wonder, slow pans".to_string(),
            priority: TaskPriority::Normal,
        })
        .await
        .expect("ENQUEUE_FAULT");

    // Conducción: cinco reclamos (assets, video, audio, sfx+assembly, upload).
    for _ in 0..8 {
        match state
            .tasks
            .claim_next("WORKER_HAPPY", &state.gate_policy)
            .await
            .expect("CLAIM_FAULT")
        {
            Some(claimed_work) => {
                drive_claimed_work(&state, claimed_work, "WORKER_HAPPY").await;
            }
            None => break,
        }
    }

    let published = state
        .tasks
        .find_by_id(task.id)
        .await
        .expect("FETCH_FAULT")
        .expect("Fila evaporada");

    assert_eq!(published.status, TaskStatus::Published);
    assert_eq!(published.retry_count, 0);
    assert!(published.last_error.is_none());
    let publish_url = published.publish_url.expect("publish_url vacío tras publicar");
    assert!(publish_url.contains("https://tube/v/"));

    // El subárbol de la tarea fue purgado en la publicación terminal.
    assert!(
        !state.workspace.project_exists(published.channel_id, published.id).await,
        "Workspace residual tras PUBLISHED"
    );

    // Una sincronía por cambio de estado quedó en el outbox
    // (ingesta + 5 sellados + 4 veredictos de compuerta).
    let pending_syncs = state.sync_outbox.count_pending().await.expect("COUNT_FAULT");
    assert!(
        pending_syncs >= 6,
        "Outbox incompleto: {pending_syncs} sincronías para un ciclo completo"
    );
}
