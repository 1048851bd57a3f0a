// [apps/orchestrator/src/config.rs]
/*!
 * =================================================================
 * APARATO: ORCHESTRATOR CONFIG SURFACE
 * CLASIFICACIÓN: APPLICATION SHELL (ESTRATO L3)
 * RESPONSABILIDAD: CAPTURA DE ENTORNO + INVENTARIO YAML DE CANALES
 *
 * Una configuración inválida es un fallo de arranque: el proceso
 * termina con exit code 1 antes de abrir el socket o tocar la cola.
 * =================================================================
 */

use anyhow::{bail, Context, Result};
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::time::Duration;

use showrunner_domain_models::{ChannelSeed, ExternalService};
use showrunner_infra_db::repositories::{GatePolicy, WindowRule};

/// Cupos globales de concurrencia por servicio (filas durables).
#[derive(Debug, Clone)]
pub struct ServiceCaps {
    pub image_global: u32,
    pub video_global: u32,
    pub audio_global: u32,
    pub sfx_global: u32,
    pub assembler_global: u32,
    pub upload_global: u32,
    /// Cupo de escritura del planning store (ventana GLOBAL, req/s).
    pub planning_per_second: u32,
}

impl Default for ServiceCaps {
    fn default() -> Self {
        Self {
            image_global: 8,
            video_global: 5,
            audio_global: 6,
            sfx_global: 6,
            assembler_global: 2,
            upload_global: 2,
            planning_per_second: 3,
        }
    }
}

/// Endpoints y tokens de los colaboradores externos.
#[derive(Debug, Clone)]
pub struct ProviderEndpoints {
    pub planning_url: String,
    pub planning_token: String,
    pub image_url: String,
    pub image_token: String,
    pub video_url: String,
    pub video_token: String,
    pub audio_url: String,
    pub audio_token: String,
    pub sfx_url: String,
    pub sfx_token: String,
    pub upload_url: String,
    pub issuer_url: String,
}

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub database_url: String,
    pub database_token: Option<String>,
    pub listening_port: u16,
    pub worker_count: usize,
    pub sync_worker_count: usize,
    pub encryption_key: String,
    pub planning_webhook_secret: String,
    pub alert_webhook: Option<String>,
    pub workspace_root: PathBuf,
    pub assembly_binary: PathBuf,
    pub shutdown_grace: Duration,
    pub service_caps: ServiceCaps,
    pub providers: ProviderEndpoints,
    pub channel_seeds: Vec<ChannelSeed>,
}

impl OrchestratorConfig {
    /**
     * Hidrata la configuración completa desde el entorno del proceso
     * y el inventario YAML de canales.
     *
     * # Errors:
     * Cualquier variable crítica ausente o inventario malformado
     * aborta el arranque (el llamador sella el proceso con exit 1).
     */
    pub fn from_env() -> Result<Self> {
        let database_url = required_env("DB_URL")?;
        let encryption_key = required_env("ENCRYPTION_KEY")?;
        let planning_webhook_secret = required_env("PLANNING_WEBHOOK_SECRET")?;

        let channels_file: PathBuf = std::env::var("CHANNELS_CONFIG")
            .unwrap_or_else(|_| "channels.yaml".to_string())
            .into();
        let channel_seeds = load_channel_inventory(&channels_file)?;

        let providers = ProviderEndpoints {
            planning_url: required_env("PLANNING_STORE_URL")?,
            planning_token: required_env("PLANNING_STORE_TOKEN")?,
            image_url: required_env("IMAGE_SERVICE_URL")?,
            image_token: required_env("IMAGE_SERVICE_TOKEN")?,
            video_url: required_env("VIDEO_SERVICE_URL")?,
            video_token: required_env("VIDEO_SERVICE_TOKEN")?,
            audio_url: required_env("AUDIO_SERVICE_URL")?,
            audio_token: required_env("AUDIO_SERVICE_TOKEN")?,
            sfx_url: required_env("SFX_SERVICE_URL")?,
            sfx_token: required_env("SFX_SERVICE_TOKEN")?,
            upload_url: required_env("UPLOAD_TARGET_URL")?,
            issuer_url: required_env("CREDENTIAL_ISSUER_URL")?,
        };

        Ok(Self {
            database_url,
            database_token: std::env::var("TURSO_AUTH_TOKEN").ok(),
            listening_port: parsed_env("PORT", 3000)?,
            worker_count: parsed_env("WORKER_COUNT", 4)?,
            sync_worker_count: parsed_env("SYNC_WORKER_COUNT", 2)?,
            encryption_key,
            planning_webhook_secret,
            alert_webhook: std::env::var("ALERT_WEBHOOK").ok().filter(|v| !v.is_empty()),
            workspace_root: std::env::var("WORKSPACE_ROOT")
                .unwrap_or_else(|_| "workspace".to_string())
                .into(),
            assembly_binary: std::env::var("ASSEMBLY_BINARY")
                .unwrap_or_else(|_| "showrunner-assemble".to_string())
                .into(),
            shutdown_grace: Duration::from_secs(parsed_env("SHUTDOWN_GRACE_SECONDS", 30)?),
            service_caps: ServiceCaps {
                image_global: parsed_env("IMAGE_GLOBAL_CAP", 8)?,
                video_global: parsed_env("VIDEO_GLOBAL_CAP", 5)?,
                audio_global: parsed_env("AUDIO_GLOBAL_CAP", 6)?,
                sfx_global: parsed_env("SFX_GLOBAL_CAP", 6)?,
                assembler_global: parsed_env("ASSEMBLER_GLOBAL_CAP", 2)?,
                upload_global: parsed_env("UPLOAD_GLOBAL_CAP", 2)?,
                planning_per_second: parsed_env("PLANNING_RATE_PER_SECOND", 3)?,
            },
            providers,
            channel_seeds,
        })
    }

    /// Perfil de ventanas por canal que consulta la función de elección.
    pub fn gate_policy(&self) -> GatePolicy {
        let mut channel_windows = HashMap::new();
        channel_windows.insert(
            ExternalService::Image,
            WindowRule { cap: 6, window_seconds: 60 },
        );
        channel_windows.insert(
            ExternalService::Video,
            WindowRule { cap: 2, window_seconds: 60 },
        );
        channel_windows.insert(
            ExternalService::Audio,
            WindowRule { cap: 4, window_seconds: 60 },
        );
        channel_windows.insert(
            ExternalService::Sfx,
            WindowRule { cap: 4, window_seconds: 60 },
        );
        GatePolicy { channel_windows }
    }

    /// Regla de la ventana GLOBAL del planning store.
    pub fn planning_window_rule(&self) -> WindowRule {
        WindowRule {
            cap: self.service_caps.planning_per_second,
            window_seconds: 1,
        }
    }
}

fn required_env(name: &str) -> Result<String> {
    let value = std::env::var(name)
        .with_context(|| format!("CRITICAL_CONFIG_VOID: {name} not defined in runtime environment"))?;
    if value.trim().is_empty() {
        bail!("CRITICAL_CONFIG_VOID: {name} is empty");
    }
    Ok(value)
}

fn parsed_env<T: std::str::FromStr>(name: &str, default: T) -> Result<T> {
    match std::env::var(name) {
        Err(_) => Ok(default),
        Ok(raw) => raw
            .parse()
            .map_err(|_| anyhow::anyhow!("CONFIG_PARSE_FAULT: {name}=[{raw}] is malformed")),
    }
}

/**
 * Carga y valida el inventario declarativo de canales.
 * Reglas: claves únicas y no vacías, cupos positivos, voz declarada.
 */
pub fn load_channel_inventory(channels_file: &PathBuf) -> Result<Vec<ChannelSeed>> {
    let raw_inventory = std::fs::read_to_string(channels_file).with_context(|| {
        format!(
            "CRITICAL_CONFIG_VOID: channel inventory unreadable at {}",
            channels_file.display()
        )
    })?;

    let seeds: Vec<ChannelSeed> = serde_yaml::from_str(&raw_inventory)
        .with_context(|| "CONFIG_PARSE_FAULT: channel inventory YAML malformed")?;

    if seeds.is_empty() {
        bail!("CONFIG_FAULT: channel inventory declares zero tenants");
    }

    let mut seen_keys = HashSet::new();
    for seed in &seeds {
        if seed.key.trim().is_empty() {
            bail!("CONFIG_FAULT: channel with empty key");
        }
        if !seen_keys.insert(seed.key.clone()) {
            bail!("CONFIG_FAULT: duplicated channel key [{}]", seed.key);
        }
        if seed.max_concurrent == 0 {
            bail!("CONFIG_FAULT: channel [{}] declares max_concurrent = 0", seed.key);
        }
        if seed.voice_id.trim().is_empty() {
            bail!("CONFIG_FAULT: channel [{}] declares no voice style", seed.key);
        }
    }

    Ok(seeds)
}
