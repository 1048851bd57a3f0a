// [libs/infra/provider-mesh/src/image.rs]
/*!
 * =================================================================
 * APARATO: IMAGE GENERATION UPLINK
 * CLASIFICACIÓN: INFRASTRUCTURE LAYER (ESTRATO L3)
 * RESPONSABILIDAD: GENERACIÓN DE ACTIVOS VISUALES (HASTA 60s)
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

const SERVICE_LABEL: &str = "image";

#[async_trait]
pub trait ImageServicePort: Send + Sync {
    /// Genera una imagen desde el prompt y la escribe en output_path.
    async fn generate(&self, prompt: &str, output_path: &Path) -> Result<(), ProviderError>;
}

#[derive(Deserialize)]
struct ImageGenerationResponse {
    image_base64: String,
}

pub struct HttpImageServiceClient {
    network_client: reqwest::Client,
    base_url: String,
    api_token: String,
}

impl HttpImageServiceClient {
    pub fn new(base_url: impl Into<String>, api_token: impl Into<String>) -> Self {
        Self {
            // Presupuesto de transporte alineado con la etapa (60s).
            network_client: build_hardened_client(Duration::from_secs(60)),
            base_url: base_url.into(),
            api_token: api_token.into(),
        }
    }
}

#[async_trait]
impl ImageServicePort for HttpImageServiceClient {
    async fn generate(&self, prompt: &str, output_path: &Path) -> Result<(), ProviderError> {
        let endpoint = format!("{}/v1/images/generate", self.base_url);

        let response = self
            .network_client
            .post(endpoint)
            .bearer_auth(&self.api_token)
            .json(&json!({ "prompt": prompt }))
            .send()
            .await
            .map_err(|fault| ProviderError::from_transport(SERVICE_LABEL, fault))?;

        let http_status = response.status();
        if !http_status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::from_status(SERVICE_LABEL, http_status, &body));
        }

        let payload: ImageGenerationResponse = response
            .json()
            .await
            .map_err(|fault| ProviderError::malformed(SERVICE_LABEL, fault.to_string()))?;

        let image_bytes = BASE64
            .decode(payload.image_base64)
            .map_err(|fault| ProviderError::malformed(SERVICE_LABEL, fault.to_string()))?;

        tokio::fs::write(output_path, image_bytes)
            .await
            .map_err(|fault| ProviderError::malformed(SERVICE_LABEL, fault.to_string()))?;

        debug!(output = %output_path.display(), "🖼️ [IMAGE]: Asset crystallized on workspace.");
        Ok(())
    }
}
