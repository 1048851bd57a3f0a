// [libs/infra/provider-mesh/src/planning.rs]
/*!
 * =================================================================
 * APARATO: PLANNING STORE UPLINK
 * CLASIFICACIÓN: INFRASTRUCTURE LAYER (ESTRATO L3)
 * RESPONSABILIDAD: ESCRITURAS BEST-EFFORT HACIA EL MOTOR P
 *
 * El cupo global de 3 req/s lo gobierna el limitador durable; este
 * cliente sólo transporta. Un 409 del Motor P se considera paridad
 * exitosa (la página ya refleja el estado).
 * =================================================================
 */

use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::json;
use std::time::Duration;
use tracing::debug;

use crate::build_hardened_client;
use crate::errors::ProviderError;
use showrunner_domain_models::TaskStatus;

const SERVICE_LABEL: &str = "planning";

#[async_trait]
pub trait PlanningStorePort: Send + Sync {
    /// Refleja un estado del Ledger en la página de planificación.
    async fn update_status(
        &self,
        planning_page_id: &str,
        status: TaskStatus,
        fields: &serde_json::Map<String, serde_json::Value>,
    ) -> Result<(), ProviderError>;
}

pub struct HttpPlanningStoreClient {
    network_client: reqwest::Client,
    base_url: String,
    api_token: String,
}

impl HttpPlanningStoreClient {
    pub fn new(base_url: impl Into<String>, api_token: impl Into<String>) -> Self {
        Self {
            network_client: build_hardened_client(Duration::from_secs(15)),
            base_url: base_url.into(),
            api_token: api_token.into(),
        }
    }
}

#[async_trait]
impl PlanningStorePort for HttpPlanningStoreClient {
    async fn update_status(
        &self,
        planning_page_id: &str,
        status: TaskStatus,
        fields: &serde_json::Map<String, serde_json::Value>,
    ) -> Result<(), ProviderError> {
        let endpoint = format!("{}/v1/pages/{}/status", self.base_url, planning_page_id);

        let response = self
            .network_client
            .patch(endpoint)
            .bearer_auth(&self.api_token)
            .json(&json!({
                "status": status.as_str(),
                "fields": fields,
            }))
            .send()
            .await
            .map_err(|fault| ProviderError::from_transport(SERVICE_LABEL, fault))?;

        let http_status = response.status();

        // 2xx o 409 (la página ya está nivelada) certifican la paridad.
        if http_status.is_success() || http_status == StatusCode::CONFLICT {
            debug!(
                planning_page_id,
                status = status.as_str(),
                "📤 [PLANNING_SYNC]: Page leveled in Motor P."
            );
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Err(ProviderError::from_status(SERVICE_LABEL, http_status, &body))
    }
}
