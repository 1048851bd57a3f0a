// [libs/infra/provider-mesh/src/errors.rs]
/*!
 * =================================================================
 * APARATO: PROVIDER ERROR TRIAGE
 * CLASIFICACIÓN: INFRASTRUCTURE CORE (ESTRATO L3)
 * RESPONSABILIDAD: TRIAGE HTTP -> FAMILIAS TRANSITORIA/PERMANENTE
 *
 * Reglas de clasificación:
 * - timeout de red, 5xx, 429, "busy" del upstream -> transitorio;
 * - agotamiento de cuota diaria -> transitorio de backoff largo;
 * - 4xx restantes, fallos de autenticación y validación -> permanente.
 * =================================================================
 */

use reqwest::StatusCode;
use showrunner_domain_workflow::{PermanentKind, StageFailure, TransientKind};
use thiserror::Error;

/// Familias de fallo observables en un colaborador externo.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderErrorKind {
    Timeout,
    Network,
    UpstreamUnavailable,
    Throttled,
    UpstreamBusy,
    QuotaExhausted,
    RequestRejected,
    AuthRejected,
    ValidationRejected,
    MalformedResponse,
}

#[derive(Error, Debug)]
#[error("[L3_PROVIDER_FAULT]: {service} {kind:?} -> {detail}")]
pub struct ProviderError {
    pub service: &'static str,
    pub kind: ProviderErrorKind,
    pub detail: String,
}

impl ProviderError {
    pub fn new(service: &'static str, kind: ProviderErrorKind, detail: impl Into<String>) -> Self {
        Self {
            service,
            kind,
            detail: detail.into(),
        }
    }

    /// Triage de un fallo de transporte reqwest.
    pub fn from_transport(service: &'static str, fault: reqwest::Error) -> Self {
        let kind = if fault.is_timeout() {
            ProviderErrorKind::Timeout
        } else {
            ProviderErrorKind::Network
        };
        Self::new(service, kind, fault.to_string())
    }

    /**
     * Triage de una respuesta HTTP no exitosa. El cuerpo se inspecciona
     * en busca de los marcadores de cuota diaria que los servicios de
     * generación reportan como 403/429 enriquecido.
     */
    pub fn from_status(service: &'static str, status: StatusCode, body: &str) -> Self {
        let body_lower = body.to_ascii_lowercase();
        let quota_markers = ["daily quota", "quota_exhausted", "dailylimitexceeded"];
        if quota_markers.iter().any(|marker| body_lower.contains(marker)) {
            return Self::new(
                service,
                ProviderErrorKind::QuotaExhausted,
                format!("{status}: {body}"),
            );
        }

        let kind = match status {
            StatusCode::TOO_MANY_REQUESTS => ProviderErrorKind::Throttled,
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ProviderErrorKind::AuthRejected,
            StatusCode::CONFLICT if body_lower.contains("busy") => ProviderErrorKind::UpstreamBusy,
            status if status.is_server_error() => ProviderErrorKind::UpstreamUnavailable,
            status if status.is_client_error() => ProviderErrorKind::RequestRejected,
            _ => ProviderErrorKind::UpstreamUnavailable,
        };
        Self::new(service, kind, format!("{status}: {body}"))
    }

    pub fn malformed(service: &'static str, detail: impl Into<String>) -> Self {
        Self::new(service, ProviderErrorKind::MalformedResponse, detail)
    }
}

/// Proyección al veredicto tipado que consume el driver.
impl From<ProviderError> for StageFailure {
    fn from(fault: ProviderError) -> Self {
        let detail = format!("{}: {}", fault.service, fault.detail);
        match fault.kind {
            ProviderErrorKind::Timeout => {
                StageFailure::transient(TransientKind::NetworkTimeout, detail)
            }
            ProviderErrorKind::Network => {
                StageFailure::transient(TransientKind::NetworkTimeout, detail)
            }
            ProviderErrorKind::UpstreamUnavailable => {
                StageFailure::transient(TransientKind::UpstreamUnavailable, detail)
            }
            ProviderErrorKind::Throttled => {
                StageFailure::transient(TransientKind::Throttled, detail)
            }
            ProviderErrorKind::UpstreamBusy => {
                StageFailure::transient(TransientKind::UpstreamBusy, detail)
            }
            ProviderErrorKind::QuotaExhausted => {
                StageFailure::transient(TransientKind::QuotaExhausted, detail)
            }
            ProviderErrorKind::RequestRejected => {
                StageFailure::permanent(PermanentKind::RequestRejected, detail)
            }
            ProviderErrorKind::AuthRejected => {
                StageFailure::permanent(PermanentKind::AuthRejected, detail)
            }
            ProviderErrorKind::ValidationRejected | ProviderErrorKind::MalformedResponse => {
                StageFailure::permanent(PermanentKind::ValidationRejected, detail)
            }
        }
    }
}
