// [libs/domain/models-rs/src/channel.rs]
/*!
 * =================================================================
 * APARATO: CHANNEL DOMAIN CONTRACTS
 * CLASIFICACIÓN: DOMAIN MODELS (ESTRATO L2)
 * RESPONSABILIDAD: ENTIDAD CANAL (TENANT) Y SU SEMILLA YAML
 * =================================================================
 */

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Cupo de producción simultánea por canal cuando el YAML lo omite.
pub const DEFAULT_MAX_CONCURRENT: u32 = 2;

/// Estrategia de custodia de artefactos del canal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageStrategy {
    /// Artefactos bajo el workspace raíz del orquestador.
    Inline,
    /// Artefactos delegados a un almacén externo del canal.
    External,
}

impl StorageStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageStrategy::Inline => "inline",
            StorageStrategy::External => "external",
        }
    }

    pub fn parse(raw: &str) -> Option<StorageStrategy> {
        match raw {
            "inline" => Some(StorageStrategy::Inline),
            "external" => Some(StorageStrategy::External),
            _ => None,
        }
    }
}

impl Default for StorageStrategy {
    fn default() -> Self {
        StorageStrategy::Inline
    }
}

/// Compuertas de revisión humana susceptibles de auto-aprobación.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewGate {
    Assets,
    Video,
    Audio,
    Final,
}

impl ReviewGate {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReviewGate::Assets => "assets",
            ReviewGate::Video => "video",
            ReviewGate::Audio => "audio",
            ReviewGate::Final => "final",
        }
    }
}

/// Tenant soberano: un canal de publicación.
///
/// Jamás se destruye mientras exista una tarea que lo referencie;
/// el archivado se expresa con 'active = false'.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Channel {
    pub id: Uuid,
    /// Clave humana corta (única), usada en configuración y telemetría.
    pub key: String,
    pub display_name: String,
    pub active: bool,
    /// Etiqueta de estilo de voz para los servicios de audio/sfx.
    pub voice_id: String,
    /// Activos de marca serializados (paleta, watermark, intro...).
    pub branding: serde_json::Value,
    pub storage_strategy: StorageStrategy,
    pub max_concurrent: u32,
    /// Vinculación con el destino de publicación (identidad de cuenta).
    pub publish_binding: String,
    /// Compuertas que el canal auto-aprueba sin intervención humana.
    pub auto_approve: Vec<ReviewGate>,
    /// Marca del reclamo más reciente; llave del round-robin de equidad.
    pub last_claimed_at: Option<DateTime<Utc>>,
}

/// Semilla declarativa de canal (archivo `channels.yaml`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelSeed {
    pub key: String,
    pub display_name: String,
    #[serde(default = "default_active")]
    pub active: bool,
    pub voice_id: String,
    #[serde(default)]
    pub branding: serde_json::Value,
    #[serde(default)]
    pub storage_strategy: StorageStrategy,
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: u32,
    pub publish_binding: String,
    #[serde(default)]
    pub auto_approve: Vec<ReviewGate>,
}

fn default_active() -> bool {
    true
}

fn default_max_concurrent() -> u32 {
    DEFAULT_MAX_CONCURRENT
}
