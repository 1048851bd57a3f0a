// [libs/infra/provider-mesh/src/video.rs]
/*!
 * =================================================================
 * APARATO: VIDEO GENERATION UPLINK
 * CLASIFICACIÓN: INFRASTRUCTURE LAYER (ESTRATO L3)
 * RESPONSABILIDAD: SUBMIT + POLL DE TRABAJOS DE VIDEO (HASTA 10 MIN)
 *
 * El servicio opera por trabajo diferido: submit devuelve un job_id y
 * el cliente sondea hasta el veredicto. El presupuesto total lo
 * impone el driver (timeout de etapa); este cliente sondea sin
 * deadline propio y muere con la cancelación del futuro.
 * =================================================================
 */

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::path::Path;
use std::time::Duration;
use tracing::debug;

use crate::build_hardened_client;
use crate::errors::{ProviderError, ProviderErrorKind};

const SERVICE_LABEL: &str = "video";
const POLL_INTERVAL: Duration = Duration::from_secs(10);

#[async_trait]
pub trait VideoServicePort: Send + Sync {
    /// Anima el compuesto con el prompt de movimiento y escribe el
    /// clip resultante en output_path.
    async fn generate(
        &self,
        composite_path: &Path,
        motion_prompt: &str,
        output_path: &Path,
    ) -> Result<(), ProviderError>;
}

#[derive(Deserialize)]
struct SubmitResponse {
    job_id: String,
}

#[derive(Deserialize)]
struct JobStatusResponse {
    status: String,
    #[serde(default)]
    artifact_url: Option<String>,
    #[serde(default)]
    failure_detail: Option<String>,
}

pub struct HttpVideoServiceClient {
    network_client: reqwest::Client,
    base_url: String,
    api_token: String,
}

impl HttpVideoServiceClient {
    pub fn new(base_url: impl Into<String>, api_token: impl Into<String>) -> Self {
        Self {
            network_client: build_hardened_client(Duration::from_secs(30)),
            base_url: base_url.into(),
            api_token: api_token.into(),
        }
    }

    async fn poll_job(&self, job_id: &str) -> Result<String, ProviderError> {
        loop {
            tokio::time::sleep(POLL_INTERVAL).await;

            let endpoint = format!("{}/v1/jobs/{}", self.base_url, job_id);
            let response = self
                .network_client
                .get(endpoint)
                .bearer_auth(&self.api_token)
                .send()
                .await
                .map_err(|fault| ProviderError::from_transport(SERVICE_LABEL, fault))?;

            let http_status = response.status();
            if !http_status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(ProviderError::from_status(SERVICE_LABEL, http_status, &body));
            }

            let verdict: JobStatusResponse = response
                .json()
                .await
                .map_err(|fault| ProviderError::malformed(SERVICE_LABEL, fault.to_string()))?;

            match verdict.status.as_str() {
                "succeeded" => {
                    return verdict.artifact_url.ok_or_else(|| {
                        ProviderError::malformed(SERVICE_LABEL, "succeeded without artifact_url")
                    });
                }
                "failed" => {
                    let detail = verdict
                        .failure_detail
                        .unwrap_or_else(|| "render job failed".to_string());
                    return Err(ProviderError::new(
                        SERVICE_LABEL,
                        ProviderErrorKind::RequestRejected,
                        detail,
                    ));
                }
                other => {
                    debug!(job_id, phase = other, "🎞️ [VIDEO]: Render job still cooking.");
                }
            }
        }
    }
}

#[async_trait]
impl VideoServicePort for HttpVideoServiceClient {
    async fn generate(
        &self,
        composite_path: &Path,
        motion_prompt: &str,
        output_path: &Path,
    ) -> Result<(), ProviderError> {
        // 1. SUBMIT: el compuesto viaja como referencia de ruta montada.
        let submit_endpoint = format!("{}/v1/jobs", self.base_url);
        let response = self
            .network_client
            .post(submit_endpoint)
            .bearer_auth(&self.api_token)
            .json(&json!({
                "composite_path": composite_path.to_string_lossy(),
                "motion_prompt": motion_prompt,
            }))
            .send()
            .await
            .map_err(|fault| ProviderError::from_transport(SERVICE_LABEL, fault))?;

        let http_status = response.status();
        if !http_status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::from_status(SERVICE_LABEL, http_status, &body));
        }

        let submitted: SubmitResponse = response
            .json()
            .await
            .map_err(|fault| ProviderError::malformed(SERVICE_LABEL, fault.to_string()))?;

        // 2. POLL hasta veredicto (cancelable por el presupuesto de etapa).
        let artifact_url = self.poll_job(&submitted.job_id).await?;

        // 3. DESCARGA del artefacto al workspace.
        let artifact_response = self
            .network_client
            .get(&artifact_url)
            .bearer_auth(&self.api_token)
            .send()
            .await
            .map_err(|fault| ProviderError::from_transport(SERVICE_LABEL, fault))?;

        let artifact_status = artifact_response.status();
        if !artifact_status.is_success() {
            let body = artifact_response.text().await.unwrap_or_default();
            return Err(ProviderError::from_status(SERVICE_LABEL, artifact_status, &body));
        }

        let clip_bytes = artifact_response
            .bytes()
            .await
            .map_err(|fault| ProviderError::from_transport(SERVICE_LABEL, fault))?;

        tokio::fs::write(output_path, &clip_bytes)
            .await
            .map_err(|fault| ProviderError::malformed(SERVICE_LABEL, fault.to_string()))?;

        debug!(output = %output_path.display(), "🎬 [VIDEO]: Clip crystallized on workspace.");
        Ok(())
    }
}
