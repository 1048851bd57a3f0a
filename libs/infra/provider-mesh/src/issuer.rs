// [libs/infra/provider-mesh/src/issuer.rs]
/*!
 * =================================================================
 * APARATO: CREDENTIAL ISSUER UPLINK
 * CLASIFICACIÓN: INFRASTRUCTURE LAYER (ESTRATO L3)
 * RESPONSABILIDAD: REFRESH DE TOKEN BUNDLES POR CANAL
 * =================================================================
 */

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::info;

use crate::build_hardened_client;
use crate::errors::ProviderError;
use showrunner_core_vault::TokenBundle;

const SERVICE_LABEL: &str = "credential_issuer";

#[async_trait]
pub trait CredentialIssuerPort: Send + Sync {
    /// Canjea el refresh token por un bundle fresco.
    async fn refresh(
        &self,
        refresh_token: &str,
        publish_binding: &str,
    ) -> Result<TokenBundle, ProviderError>;
}

#[derive(Deserialize)]
struct RefreshResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    expires_at: DateTime<Utc>,
}

pub struct HttpCredentialIssuerClient {
    network_client: reqwest::Client,
    base_url: String,
}

impl HttpCredentialIssuerClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            network_client: build_hardened_client(Duration::from_secs(20)),
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl CredentialIssuerPort for HttpCredentialIssuerClient {
    async fn refresh(
        &self,
        refresh_token: &str,
        publish_binding: &str,
    ) -> Result<TokenBundle, ProviderError> {
        let endpoint = format!("{}/oauth/token", self.base_url);

        let response = self
            .network_client
            .post(endpoint)
            .json(&json!({
                "grant_type": "refresh_token",
                "refresh_token": refresh_token,
                "binding": publish_binding,
            }))
            .send()
            .await
            .map_err(|fault| ProviderError::from_transport(SERVICE_LABEL, fault))?;

        let http_status = response.status();
        if !http_status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::from_status(SERVICE_LABEL, http_status, &body));
        }

        let payload: RefreshResponse = response
            .json()
            .await
            .map_err(|fault| ProviderError::malformed(SERVICE_LABEL, fault.to_string()))?;

        info!(binding = publish_binding, "🔑 [ISSUER]: Token bundle refreshed.");

        Ok(TokenBundle {
            access_token: payload.access_token,
            // El emisor puede rotar el refresh token; si no, se conserva.
            refresh_token: payload
                .refresh_token
                .unwrap_or_else(|| refresh_token.to_string()),
            expires_at: payload.expires_at,
        })
    }
}
