// [libs/domain/models-rs/src/stage.rs]
/*!
 * =================================================================
 * APARATO: PIPELINE STAGE CATALOG
 * CLASIFICACIÓN: DOMAIN CORE (ESTRATO L2)
 * RESPONSABILIDAD: MAPEO ETAPA <-> ESTADOS <-> SERVICIO EXTERNO
 * =================================================================
 */

use serde::{Deserialize, Serialize};

use crate::status::TaskStatus;

/// Servicios externos gobernados por el limitador de tasa.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExternalService {
    /// Planning store (Motor P): escrituras de sincronía saliente.
    Planning,
    Image,
    Video,
    Audio,
    Sfx,
    /// Ensamblador local (subproceso); gobernado sólo por cupo global.
    Assembler,
    Upload,
    /// Emisor de credenciales (refresh de tokens).
    CredentialIssuer,
}

impl ExternalService {
    pub const ALL: [ExternalService; 8] = [
        ExternalService::Planning,
        ExternalService::Image,
        ExternalService::Video,
        ExternalService::Audio,
        ExternalService::Sfx,
        ExternalService::Assembler,
        ExternalService::Upload,
        ExternalService::CredentialIssuer,
    ];

    /// Clave canónica persistida en los contadores del Ledger.
    pub fn as_str(&self) -> &'static str {
        match self {
            ExternalService::Planning => "planning",
            ExternalService::Image => "image",
            ExternalService::Video => "video",
            ExternalService::Audio => "audio",
            ExternalService::Sfx => "sfx",
            ExternalService::Assembler => "assembler",
            ExternalService::Upload => "upload",
            ExternalService::CredentialIssuer => "credential_issuer",
        }
    }

    pub fn parse(raw: &str) -> Option<ExternalService> {
        ExternalService::ALL.into_iter().find(|s| s.as_str() == raw)
    }
}

impl std::fmt::Display for ExternalService {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Las siete etapas lineales del pipeline de producción.
///
/// La revisión final no figura aquí: es una compuerta humana, no una
/// etapa ejecutable por workers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    Assets,
    Video,
    Audio,
    Sfx,
    Assembly,
    Upload,
}

impl PipelineStage {
    pub const ALL: [PipelineStage; 6] = [
        PipelineStage::Assets,
        PipelineStage::Video,
        PipelineStage::Audio,
        PipelineStage::Sfx,
        PipelineStage::Assembly,
        PipelineStage::Upload,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineStage::Assets => "assets",
            PipelineStage::Video => "video",
            PipelineStage::Audio => "audio",
            PipelineStage::Sfx => "sfx",
            PipelineStage::Assembly => "assembly",
            PipelineStage::Upload => "upload",
        }
    }

    /**
     * Resuelve la etapa que un worker debe ejecutar al reclamar una
     * tarea en el estado dado. Sólo los estados reclamables resuelven;
     * FINAL_REVIEW exige además el sello de aprobación del revisor
     * (verificado por la consulta de reclamo, no aquí).
     */
    pub fn for_claim_source(status: TaskStatus) -> Option<PipelineStage> {
        match status {
            TaskStatus::Queued => Some(PipelineStage::Assets),
            TaskStatus::AssetsApproved => Some(PipelineStage::Video),
            TaskStatus::VideoApproved => Some(PipelineStage::Audio),
            TaskStatus::AudioApproved => Some(PipelineStage::Sfx),
            TaskStatus::FinalReview => Some(PipelineStage::Upload),
            _ => None,
        }
    }

    /// Estado en-producción que la fase de reclamo debe fijar.
    pub fn in_progress_status(&self) -> TaskStatus {
        match self {
            PipelineStage::Assets => TaskStatus::GeneratingAssets,
            PipelineStage::Video => TaskStatus::GeneratingVideo,
            PipelineStage::Audio => TaskStatus::GeneratingAudio,
            PipelineStage::Sfx => TaskStatus::GeneratingSfx,
            PipelineStage::Assembly => TaskStatus::Assembling,
            PipelineStage::Upload => TaskStatus::Uploading,
        }
    }

    /// Estado de éxito que la fase de sellado debe fijar.
    ///
    /// La etapa SFX desemboca directamente en ASSEMBLING (sin compuerta);
    /// el ensamblado sella en ASSEMBLED y el driver lo avanza de inmediato
    /// a FINAL_REVIEW en la misma transacción corta.
    pub fn success_status(&self) -> TaskStatus {
        match self {
            PipelineStage::Assets => TaskStatus::AssetsReady,
            PipelineStage::Video => TaskStatus::VideoReady,
            PipelineStage::Audio => TaskStatus::AudioReady,
            PipelineStage::Sfx => TaskStatus::Assembling,
            PipelineStage::Assembly => TaskStatus::Assembled,
            PipelineStage::Upload => TaskStatus::Published,
        }
    }

    /// Terminal de error propio de la etapa.
    pub fn error_status(&self) -> TaskStatus {
        match self {
            PipelineStage::Assets => TaskStatus::AssetError,
            PipelineStage::Video => TaskStatus::VideoError,
            PipelineStage::Audio => TaskStatus::AudioError,
            PipelineStage::Sfx => TaskStatus::SfxError,
            PipelineStage::Assembly => TaskStatus::AssemblyError,
            PipelineStage::Upload => TaskStatus::UploadError,
        }
    }

    /// Terminal de error para un estado en posesión de worker (Reaper).
    pub fn error_status_for_held(status: TaskStatus) -> Option<TaskStatus> {
        match status {
            TaskStatus::Claimed | TaskStatus::GeneratingAssets => Some(TaskStatus::AssetError),
            TaskStatus::GeneratingVideo => Some(TaskStatus::VideoError),
            TaskStatus::GeneratingAudio => Some(TaskStatus::AudioError),
            TaskStatus::GeneratingSfx => Some(TaskStatus::SfxError),
            TaskStatus::Assembling => Some(TaskStatus::AssemblyError),
            TaskStatus::Uploading => Some(TaskStatus::UploadError),
            _ => None,
        }
    }

    /// Etapa de origen de un terminal de error (para la reanudación).
    pub fn for_error_status(status: TaskStatus) -> Option<PipelineStage> {
        match status {
            TaskStatus::AssetError => Some(PipelineStage::Assets),
            TaskStatus::VideoError => Some(PipelineStage::Video),
            TaskStatus::AudioError => Some(PipelineStage::Audio),
            TaskStatus::SfxError => Some(PipelineStage::Sfx),
            TaskStatus::AssemblyError => Some(PipelineStage::Assembly),
            TaskStatus::UploadError => Some(PipelineStage::Upload),
            _ => None,
        }
    }

    /// Rehidrata una etapa desde su clave persistida.
    pub fn parse(raw: &str) -> Option<PipelineStage> {
        PipelineStage::ALL.into_iter().find(|s| s.as_str() == raw)
    }

    /// Servicio externo cuya compuerta de tasa gobierna la etapa.
    pub fn service(&self) -> ExternalService {
        match self {
            PipelineStage::Assets => ExternalService::Image,
            PipelineStage::Video => ExternalService::Video,
            PipelineStage::Audio => ExternalService::Audio,
            PipelineStage::Sfx => ExternalService::Sfx,
            PipelineStage::Assembly => ExternalService::Assembler,
            PipelineStage::Upload => ExternalService::Upload,
        }
    }

    /// Presupuesto temporal por defecto de la llamada externa.
    pub fn default_timeout_seconds(&self) -> u64 {
        match self {
            PipelineStage::Assets => 60,
            PipelineStage::Video => 600,
            PipelineStage::Audio => 120,
            PipelineStage::Sfx => 120,
            PipelineStage::Assembly => 300,
            PipelineStage::Upload => 900,
        }
    }
}

impl std::fmt::Display for PipelineStage {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.as_str())
    }
}
