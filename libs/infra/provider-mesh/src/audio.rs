// [libs/infra/provider-mesh/src/audio.rs]
/*!
 * =================================================================
 * APARATO: AUDIO & SFX GENERATION UPLINKS
 * CLASIFICACIÓN: INFRASTRUCTURE LAYER (ESTRATO L3)
 * RESPONSABILIDAD: SÍNTESIS DE NARRACIÓN Y EFECTOS (HASTA 2 MIN)
 * =================================================================
 */

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde::Deserialize;
use serde_json::json;
use std::path::Path;
use std::time::Duration;
use tracing::debug;

use crate::build_hardened_client;
use crate::errors::ProviderError;

#[derive(Deserialize)]
struct SynthesisResponse {
    audio_base64: String,
}

/// Núcleo compartido de síntesis: narración y SFX difieren en servicio,
/// endpoint y cupos, no en protocolo.
async fn synthesize(
    service_label: &'static str,
    network_client: &reqwest::Client,
    endpoint: String,
    api_token: &str,
    prompt: &str,
    voice_id: &str,
    output_path: &Path,
) -> Result<(), ProviderError> {
    let response = network_client
        .post(endpoint)
        .bearer_auth(api_token)
        .json(&json!({
            "input": prompt,
            "voice_id": voice_id,
        }))
        .send()
        .await
        .map_err(|fault| ProviderError::from_transport(service_label, fault))?;

    let http_status = response.status();
    if !http_status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(ProviderError::from_status(service_label, http_status, &body));
    }

    let payload: SynthesisResponse = response
        .json()
        .await
        .map_err(|fault| ProviderError::malformed(service_label, fault.to_string()))?;

    let audio_bytes = BASE64
        .decode(payload.audio_base64)
        .map_err(|fault| ProviderError::malformed(service_label, fault.to_string()))?;

    tokio::fs::write(output_path, audio_bytes)
        .await
        .map_err(|fault| ProviderError::malformed(service_label, fault.to_string()))?;

    debug!(output = %output_path.display(), service = service_label, "🔊 [SYNTH]: Track crystallized.");
    Ok(())
}

// --- PUERTO DE NARRACIÓN ---

#[async_trait]
pub trait AudioServicePort: Send + Sync {
    async fn generate(
        &self,
        narration_text: &str,
        voice_id: &str,
        output_path: &Path,
    ) -> Result<(), ProviderError>;
}

pub struct HttpAudioServiceClient {
    network_client: reqwest::Client,
    base_url: String,
    api_token: String,
}

impl HttpAudioServiceClient {
    pub fn new(base_url: impl Into<String>, api_token: impl Into<String>) -> Self {
        Self {
            network_client: build_hardened_client(Duration::from_secs(120)),
            base_url: base_url.into(),
            api_token: api_token.into(),
        }
    }
}

#[async_trait]
impl AudioServicePort for HttpAudioServiceClient {
    async fn generate(
        &self,
        narration_text: &str,
        voice_id: &str,
        output_path: &Path,
    ) -> Result<(), ProviderError> {
        synthesize(
            "audio",
            &self.network_client,
            format!("{}/v1/speech/synthesize", self.base_url),
            &self.api_token,
            narration_text,
            voice_id,
            output_path,
        )
        .await
    }
}

// --- PUERTO DE EFECTOS ---

#[async_trait]
pub trait SfxServicePort: Send + Sync {
    async fn generate(
        &self,
        effect_prompt: &str,
        voice_id: &str,
        output_path: &Path,
    ) -> Result<(), ProviderError>;
}

pub struct HttpSfxServiceClient {
    network_client: reqwest::Client,
    base_url: String,
    api_token: String,
}

impl HttpSfxServiceClient {
    pub fn new(base_url: impl Into<String>, api_token: impl Into<String>) -> Self {
        Self {
            network_client: build_hardened_client(Duration::from_secs(120)),
            base_url: base_url.into(),
            api_token: api_token.into(),
        }
    }
}

#[async_trait]
impl SfxServicePort for HttpSfxServiceClient {
    async fn generate(
        &self,
        effect_prompt: &str,
        voice_id: &str,
        output_path: &Path,
    ) -> Result<(), ProviderError> {
        synthesize(
            "sfx",
            &self.network_client,
            format!("{}/v1/sfx/generate", self.base_url),
            &self.api_token,
            effect_prompt,
            voice_id,
            output_path,
        )
        .await
    }
}
