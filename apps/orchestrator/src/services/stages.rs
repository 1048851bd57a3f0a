// [apps/orchestrator/src/services/stages.rs]
/*!
 * =================================================================
 * APARATO: STAGE EXECUTION WIRING
 * CLASIFICACIÓN: PIPELINE DRIVER (ESTRATO L4)
 * RESPONSABILIDAD: FASE 2 DEL DRIVER — LA LLAMADA EXTERNA DE CADA ETAPA
 *
 * Ninguna función de este módulo abre transacciones: recibe la tarea
 * reclamada, produce artefactos sobre el workspace particionado y
 * devuelve un veredicto tipado. El presupuesto temporal lo impone el
 * worker que la envuelve.
 * =================================================================
 */

use serde_json::Value;
use std::time::Duration;
use tracing::debug;

use crate::state::AppState;
use showrunner_domain_models::{Channel, ExternalService, PipelineStage, Task};
use showrunner_domain_workflow::{PermanentKind, StageFailure, TransientKind};
use showrunner_infra_executor::{StepError, StepInvocation};
use showrunner_infra_workspace::{WorkspaceArea, WorkspaceError};
use showrunner_infra_providers::UploadMetadata;

/// Resultado material de una etapa exitosa.
#[derive(Debug, Default)]
pub struct StageArtifacts {
    pub publish_url: Option<String>,
    /// Campos adicionales hacia el planning store (rutas, duraciones).
    pub sync_fields: serde_json::Map<String, Value>,
}

/**
 * Ejecuta la llamada externa de la etapa indicada.
 * Los artefactos quedan en el subárbol exclusivo de la tarea; los
 * ejecutables de etapa reciben sus rutas como argumentos.
 */
pub async fn execute_stage(
    state: &AppState,
    task: &Task,
    channel: &Channel,
    stage: PipelineStage,
) -> Result<StageArtifacts, StageFailure> {
    debug!(task_id = %task.id, stage = %stage, "⚙️ [STAGE]: Phase-2 external call engaged.");
    match stage {
        PipelineStage::Assets => run_assets_stage(state, task, channel).await,
        PipelineStage::Video => run_video_stage(state, task).await,
        PipelineStage::Audio => run_audio_stage(state, task, channel).await,
        PipelineStage::Sfx => run_sfx_stage(state, task, channel).await,
        PipelineStage::Assembly => run_assembly_stage(state, task).await,
        PipelineStage::Upload => run_upload_stage(state, task, channel).await,
    }
}

// --- ETAPAS DE GENERACIÓN ---

async fn run_assets_stage(
    state: &AppState,
    task: &Task,
    channel: &Channel,
) -> Result<StageArtifacts, StageFailure> {
    let composites_dir = ensure_area(state, task, WorkspaceArea::Composites).await?;
    let composite_path = composites_dir.join("composite_01.png");

    let branding_style = channel
        .branding
        .get("visual_style")
        .and_then(Value::as_str)
        .unwrap_or("cinematic, clean composition");

    let prompt = format!(
        "{title}. Tema: {topic}. Dirección: {direction}. Estilo: {style}.",
        title = task.title,
        topic = task.topic,
        direction = task.story_direction,
        style = branding_style,
    );

    state
        .services
        .image
        .generate(&prompt, &composite_path)
        .await?;

    let mut artifacts = StageArtifacts::default();
    artifacts.sync_fields.insert(
        "composite_path".into(),
        composite_path.to_string_lossy().into_owned().into(),
    );
    Ok(artifacts)
}

async fn run_video_stage(state: &AppState, task: &Task) -> Result<StageArtifacts, StageFailure> {
    let composites_dir = ensure_area(state, task, WorkspaceArea::Composites).await?;
    let videos_dir = ensure_area(state, task, WorkspaceArea::Videos).await?;

    let composite_path = composites_dir.join("composite_01.png");
    let clip_path = videos_dir.join("clip_01.mp4");

    state
        .services
        .video
        .generate(&composite_path, &task.story_direction, &clip_path)
        .await?;

    Ok(StageArtifacts::default())
}

async fn run_audio_stage(
    state: &AppState,
    task: &Task,
    channel: &Channel,
) -> Result<StageArtifacts, StageFailure> {
    let audio_dir = ensure_area(state, task, WorkspaceArea::Audio).await?;
    let narration_path = audio_dir.join("narration.mp3");

    let narration_script = format!("{}. {}", task.title, task.topic);

    state
        .services
        .audio
        .generate(&narration_script, &channel.voice_id, &narration_path)
        .await?;

    Ok(StageArtifacts::default())
}

async fn run_sfx_stage(
    state: &AppState,
    task: &Task,
    channel: &Channel,
) -> Result<StageArtifacts, StageFailure> {
    let sfx_dir = ensure_area(state, task, WorkspaceArea::Sfx).await?;
    let ambience_path = sfx_dir.join("ambience.mp3");

    let effect_prompt = format!("ambience for: {}", task.topic);

    state
        .services
        .sfx
        .generate(&effect_prompt, &channel.voice_id, &ambience_path)
        .await?;

    Ok(StageArtifacts::default())
}

// --- ETAPA DE ENSAMBLADO (SUBPROCESO) ---

async fn run_assembly_stage(state: &AppState, task: &Task) -> Result<StageArtifacts, StageFailure> {
    let videos_dir = ensure_area(state, task, WorkspaceArea::Videos).await?;
    let audio_dir = ensure_area(state, task, WorkspaceArea::Audio).await?;
    let sfx_dir = ensure_area(state, task, WorkspaceArea::Sfx).await?;
    let final_dir = ensure_area(state, task, WorkspaceArea::Final).await?;

    let master_path = final_dir.join("master.mp4");
    let assembly_budget =
        Duration::from_secs(PipelineStage::Assembly.default_timeout_seconds());

    let invocation = StepInvocation::new(&state.config.assembly_binary, assembly_budget)
        .flag("--video", videos_dir.join("clip_01.mp4").to_string_lossy())
        .flag("--narration", audio_dir.join("narration.mp3").to_string_lossy())
        .flag("--sfx", sfx_dir.join("ambience.mp3").to_string_lossy())
        .flag("--output", master_path.to_string_lossy());

    match invocation.run().await {
        Ok(output) => {
            debug!(
                task_id = %task.id,
                elapsed_ms = output.elapsed.as_millis() as u64,
                "🧩 [ASSEMBLY]: Master sealed by stage binary."
            );
            let mut artifacts = StageArtifacts::default();
            artifacts.sync_fields.insert(
                "master_path".into(),
                master_path.to_string_lossy().into_owned().into(),
            );
            Ok(artifacts)
        }
        // Contrato del ejecutor: timeout transitorio, exit != 0 permanente.
        Err(StepError::StepTimeout(budget)) => Err(StageFailure::transient(
            TransientKind::StepTimeout,
            format!("assembly exceeded {}s budget", budget.as_secs()),
        )),
        Err(StepError::StepFailed { exit_code, stderr }) => Err(StageFailure::permanent(
            PermanentKind::StepFailed,
            format!("assembly exit={exit_code}: {stderr}"),
        )),
        Err(StepError::SpawnFault(fault)) => Err(StageFailure::permanent(
            PermanentKind::StepFailed,
            format!("assembly binary unlaunchable: {fault}"),
        )),
    }
}

// --- ETAPA DE PUBLICACIÓN ---

async fn run_upload_stage(
    state: &AppState,
    task: &Task,
    channel: &Channel,
) -> Result<StageArtifacts, StageFailure> {
    let final_dir = ensure_area(state, task, WorkspaceArea::Final).await?;
    let master_path = final_dir.join("master.mp4");

    // El custodio refresca proactivamente antes de entregar el token.
    let credentials = state
        .custodian
        .get(channel, ExternalService::Upload)
        .await?;

    let metadata = UploadMetadata {
        idempotency_key: task.id.to_string(),
        title: task.title.clone(),
        description: task.topic.clone(),
        publish_binding: channel.publish_binding.clone(),
    };

    let publish_url = state
        .services
        .upload
        .upload(&credentials, &master_path, &metadata)
        .await?;

    let mut artifacts = StageArtifacts {
        publish_url: Some(publish_url.clone()),
        sync_fields: serde_json::Map::new(),
    };
    artifacts
        .sync_fields
        .insert("publish_url".into(), publish_url.into());
    Ok(artifacts)
}

// --- SOPORTE ---

async fn ensure_area(
    state: &AppState,
    task: &Task,
    area: WorkspaceArea,
) -> Result<std::path::PathBuf, StageFailure> {
    state
        .workspace
        .ensure_area(task.channel_id, task.id, area)
        .await
        .map_err(|fault: WorkspaceError| {
            StageFailure::transient(
                TransientKind::UpstreamUnavailable,
                format!("workspace unavailable: {fault}"),
            )
        })
}
