// [libs/infra/provider-mesh/src/upload.rs]
/*!
 * =================================================================
 * APARATO: PUBLISH TARGET UPLINK
 * CLASIFICACIÓN: INFRASTRUCTURE LAYER (ESTRATO L3)
 * RESPONSABILIDAD: SUBIDA AT-LEAST-ONCE CON LLAVE DE IDEMPOTENCIA
 *
 * La publicación es at-least-once: la llave de idempotencia (id de
 * tarea) viaja en cabecera para que el destino absorba reintentos
 * sin duplicar videos.
 * =================================================================
 */

use async_trait::async_trait;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tracing::info;

use crate::build_hardened_client;
use crate::errors::ProviderError;
use showrunner_core_vault::TokenBundle;

const SERVICE_LABEL: &str = "upload";

/// Metadatos editoriales del video a publicar.
#[derive(Debug, Clone)]
pub struct UploadMetadata {
    pub idempotency_key: String,
    pub title: String,
    pub description: String,
    /// Vinculación de cuenta del canal en el destino.
    pub publish_binding: String,
}

#[async_trait]
pub trait UploadTargetPort: Send + Sync {
    /// Publica el master y devuelve la URL pública resultante.
    async fn upload(
        &self,
        channel_credentials: &TokenBundle,
        video_path: &Path,
        metadata: &UploadMetadata,
    ) -> Result<String, ProviderError>;
}

#[derive(Deserialize)]
struct UploadResponse {
    publish_url: String,
}

pub struct HttpUploadTargetClient {
    network_client: reqwest::Client,
    base_url: String,
}

impl HttpUploadTargetClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            // Presupuesto de transporte alineado con la etapa (15 min).
            network_client: build_hardened_client(Duration::from_secs(900)),
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl UploadTargetPort for HttpUploadTargetClient {
    async fn upload(
        &self,
        channel_credentials: &TokenBundle,
        video_path: &Path,
        metadata: &UploadMetadata,
    ) -> Result<String, ProviderError> {
        let master_bytes = tokio::fs::read(video_path)
            .await
            .map_err(|fault| ProviderError::malformed(SERVICE_LABEL, fault.to_string()))?;

        let endpoint = format!("{}/v1/videos", self.base_url);
        let response = self
            .network_client
            .post(endpoint)
            .bearer_auth(&channel_credentials.access_token)
            .header("Idempotency-Key", &metadata.idempotency_key)
            .header("X-Publish-Binding", &metadata.publish_binding)
            .header("X-Video-Title", &metadata.title)
            .header("X-Video-Description", &metadata.description)
            .header(reqwest::header::CONTENT_TYPE, "video/mp4")
            .body(master_bytes)
            .send()
            .await
            .map_err(|fault| ProviderError::from_transport(SERVICE_LABEL, fault))?;

        let http_status = response.status();
        if !http_status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::from_status(SERVICE_LABEL, http_status, &body));
        }

        let payload: UploadResponse = response
            .json()
            .await
            .map_err(|fault| ProviderError::malformed(SERVICE_LABEL, fault.to_string()))?;

        info!(
            publish_url = %payload.publish_url,
            idempotency_key = %metadata.idempotency_key,
            "📡 [UPLOAD]: Master published."
        );
        Ok(payload.publish_url)
    }
}
