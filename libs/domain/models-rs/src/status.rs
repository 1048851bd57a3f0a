// [libs/domain/models-rs/src/status.rs]
/*!
 * =================================================================
 * APARATO: SOVEREIGN STATUS MACHINE
 * CLASIFICACIÓN: DOMAIN CORE (ESTRATO L2)
 * RESPONSABILIDAD: CATÁLOGO DE ESTADOS Y VALIDADOR DE TRANSICIONES
 *
 * # Mathematical Proof (Transition Closure):
 * La tabla 'allowed_transitions' es la única fuente de aristas
 * legales del ciclo de vida. Toda mutación de estado del Ledger
 * pasa por 'validate_transition'; una arista fuera de la tabla
 * produce 'InvalidStateTransition' y jamás se persiste. Los estados
 * terminales exponen una única arista de salida hacia QUEUED
 * (re-encolado operador), con la excepción documentada de
 * UPLOAD_ERROR -> FINAL_REVIEW (re-revisión sin re-producción).
 * =================================================================
 */

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Arista de ciclo de vida no registrada en la tabla soberana.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("[L2_STATUS_FAULT]: ILLEGAL_TRANSITION -> {from} => {to}")]
pub struct InvalidStateTransition {
    pub from: TaskStatus,
    pub to: TaskStatus,
}

/// Estados soberanos de una tarea de producción.
///
/// Particionados en exactamente dos familias: ACTIVE (consume un slot
/// de concurrencia del canal) y TERMINAL (en reposo, auditable).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    // --- ESTRATO DE CONTROL ---
    Draft,
    Queued,
    Claimed,
    Cancelled,
    Published,

    // --- ESTRATO DE PRODUCCIÓN (IN-PROGRESS) ---
    GeneratingAssets,
    AssetsReady,
    AssetsApproved,
    GeneratingVideo,
    VideoReady,
    VideoApproved,
    GeneratingAudio,
    AudioReady,
    AudioApproved,
    GeneratingSfx,
    Assembling,
    Assembled,
    FinalReview,
    Uploading,

    // --- ESTRATO DE ERRORES RECUPERABLES (TERMINALES) ---
    AssetError,
    VideoError,
    AudioError,
    SfxError,
    AssemblyError,
    UploadError,
}

impl TaskStatus {
    /// Inventario completo, en orden de declaración.
    pub const ALL: [TaskStatus; 25] = [
        TaskStatus::Draft,
        TaskStatus::Queued,
        TaskStatus::Claimed,
        TaskStatus::Cancelled,
        TaskStatus::Published,
        TaskStatus::GeneratingAssets,
        TaskStatus::AssetsReady,
        TaskStatus::AssetsApproved,
        TaskStatus::GeneratingVideo,
        TaskStatus::VideoReady,
        TaskStatus::VideoApproved,
        TaskStatus::GeneratingAudio,
        TaskStatus::AudioReady,
        TaskStatus::AudioApproved,
        TaskStatus::GeneratingSfx,
        TaskStatus::Assembling,
        TaskStatus::Assembled,
        TaskStatus::FinalReview,
        TaskStatus::Uploading,
        TaskStatus::AssetError,
        TaskStatus::VideoError,
        TaskStatus::AudioError,
        TaskStatus::SfxError,
        TaskStatus::AssemblyError,
        TaskStatus::UploadError,
    ];

    /// Representación canónica persistida en el Ledger Táctico.
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Draft => "DRAFT",
            TaskStatus::Queued => "QUEUED",
            TaskStatus::Claimed => "CLAIMED",
            TaskStatus::Cancelled => "CANCELLED",
            TaskStatus::Published => "PUBLISHED",
            TaskStatus::GeneratingAssets => "GENERATING_ASSETS",
            TaskStatus::AssetsReady => "ASSETS_READY",
            TaskStatus::AssetsApproved => "ASSETS_APPROVED",
            TaskStatus::GeneratingVideo => "GENERATING_VIDEO",
            TaskStatus::VideoReady => "VIDEO_READY",
            TaskStatus::VideoApproved => "VIDEO_APPROVED",
            TaskStatus::GeneratingAudio => "GENERATING_AUDIO",
            TaskStatus::AudioReady => "AUDIO_READY",
            TaskStatus::AudioApproved => "AUDIO_APPROVED",
            TaskStatus::GeneratingSfx => "GENERATING_SFX",
            TaskStatus::Assembling => "ASSEMBLING",
            TaskStatus::Assembled => "ASSEMBLED",
            TaskStatus::FinalReview => "FINAL_REVIEW",
            TaskStatus::Uploading => "UPLOADING",
            TaskStatus::AssetError => "ASSET_ERROR",
            TaskStatus::VideoError => "VIDEO_ERROR",
            TaskStatus::AudioError => "AUDIO_ERROR",
            TaskStatus::SfxError => "SFX_ERROR",
            TaskStatus::AssemblyError => "ASSEMBLY_ERROR",
            TaskStatus::UploadError => "UPLOAD_ERROR",
        }
    }

    /// Rehidrata un estado desde su forma persistida.
    pub fn parse(raw: &str) -> Option<TaskStatus> {
        TaskStatus::ALL.into_iter().find(|s| s.as_str() == raw)
    }

    /**
     * Tabla soberana de aristas legales.
     *
     * Cualquier par (from, to) ausente de esta tabla es ilegal.
     * Los terminales (PUBLISHED, CANCELLED y todos los *_ERROR)
     * aceptan únicamente el re-encolado hacia QUEUED; UPLOAD_ERROR
     * añade la arista de re-revisión hacia FINAL_REVIEW.
     */
    pub fn allowed_transitions(&self) -> &'static [TaskStatus] {
        match self {
            TaskStatus::Draft => &[TaskStatus::Queued, TaskStatus::Cancelled],
            TaskStatus::Queued => &[TaskStatus::Claimed, TaskStatus::Cancelled],
            // CLAIMED abre la etapa que corresponda: la primera en filas
            // frescas, la etapa de origen en reanudaciones post-reintento.
            TaskStatus::Claimed => &[
                TaskStatus::GeneratingAssets,
                TaskStatus::GeneratingVideo,
                TaskStatus::GeneratingAudio,
                TaskStatus::GeneratingSfx,
                TaskStatus::Assembling,
                TaskStatus::Uploading,
            ],
            TaskStatus::GeneratingAssets => &[TaskStatus::AssetsReady, TaskStatus::AssetError],
            TaskStatus::AssetsReady => &[TaskStatus::AssetsApproved, TaskStatus::AssetError],
            TaskStatus::AssetsApproved => &[TaskStatus::GeneratingVideo],
            TaskStatus::GeneratingVideo => &[TaskStatus::VideoReady, TaskStatus::VideoError],
            TaskStatus::VideoReady => &[TaskStatus::VideoApproved, TaskStatus::VideoError],
            TaskStatus::VideoApproved => &[TaskStatus::GeneratingAudio],
            TaskStatus::GeneratingAudio => &[TaskStatus::AudioReady, TaskStatus::AudioError],
            TaskStatus::AudioReady => &[TaskStatus::AudioApproved, TaskStatus::AudioError],
            TaskStatus::AudioApproved => &[TaskStatus::GeneratingSfx],
            TaskStatus::GeneratingSfx => &[TaskStatus::Assembling, TaskStatus::SfxError],
            TaskStatus::Assembling => &[TaskStatus::Assembled, TaskStatus::AssemblyError],
            TaskStatus::Assembled => &[TaskStatus::FinalReview],
            TaskStatus::FinalReview => &[TaskStatus::Uploading, TaskStatus::UploadError],
            TaskStatus::Uploading => &[TaskStatus::Published, TaskStatus::UploadError],
            TaskStatus::AssetError
            | TaskStatus::VideoError
            | TaskStatus::AudioError
            | TaskStatus::SfxError
            | TaskStatus::AssemblyError => &[TaskStatus::Queued],
            TaskStatus::UploadError => &[TaskStatus::Queued, TaskStatus::FinalReview],
            TaskStatus::Cancelled => &[TaskStatus::Queued],
            TaskStatus::Published => &[TaskStatus::Queued],
        }
    }

    /// Único punto de validación de aristas del sistema.
    pub fn validate_transition(
        from: TaskStatus,
        to: TaskStatus,
    ) -> Result<(), InvalidStateTransition> {
        if from.allowed_transitions().contains(&to) {
            Ok(())
        } else {
            Err(InvalidStateTransition { from, to })
        }
    }

    /// ACTIVE: en cola o en producción. Consume slot de concurrencia del canal.
    pub fn is_active(&self) -> bool {
        !self.is_terminal()
    }

    /// TERMINAL: en reposo. DRAFT, CANCELLED, PUBLISHED y todos los *_ERROR.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskStatus::Draft
                | TaskStatus::Cancelled
                | TaskStatus::Published
                | TaskStatus::AssetError
                | TaskStatus::VideoError
                | TaskStatus::AudioError
                | TaskStatus::SfxError
                | TaskStatus::AssemblyError
                | TaskStatus::UploadError
        )
    }

    /// Estados en producción (todo ACTIVE excepto la cola de espera).
    pub fn is_in_progress(&self) -> bool {
        self.is_active() && *self != TaskStatus::Queued
    }

    /// Estados con propietario físico: 'claimed_at' no nulo exactamente aquí.
    /// El Reaper sólo recupera filas de esta familia.
    pub fn is_worker_held(&self) -> bool {
        matches!(
            self,
            TaskStatus::Claimed
                | TaskStatus::GeneratingAssets
                | TaskStatus::GeneratingVideo
                | TaskStatus::GeneratingAudio
                | TaskStatus::GeneratingSfx
                | TaskStatus::Assembling
                | TaskStatus::Uploading
        )
    }

    /// Compuertas de revisión humana: el pipeline no las reclama jamás.
    pub fn is_review_gate(&self) -> bool {
        matches!(
            self,
            TaskStatus::AssetsReady
                | TaskStatus::VideoReady
                | TaskStatus::AudioReady
                | TaskStatus::FinalReview
        )
    }

    /// Terminales de error de etapa (recuperables vía re-encolado).
    pub fn is_stage_error(&self) -> bool {
        matches!(
            self,
            TaskStatus::AssetError
                | TaskStatus::VideoError
                | TaskStatus::AudioError
                | TaskStatus::SfxError
                | TaskStatus::AssemblyError
                | TaskStatus::UploadError
        )
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.as_str())
    }
}
