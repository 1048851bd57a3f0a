// [apps/orchestrator/src/services/alert.rs]
/*!
 * =================================================================
 * APARATO: ALERT DISPATCHER
 * CLASIFICACIÓN: BACKGROUND INFRASTRUCTURE (ESTRATO L4)
 * RESPONSABILIDAD: EMISIÓN ACCIONABLE HACIA EL WEBHOOK DE GUARDIA
 *
 * Disciplina de alertas: se emite UNA alerta por (a) agotamiento de
 * reintentos de etapa, (b) fallo de refresh de credencial, (c)
 * recuperación de reclamo huérfano (advertencia). Todo lo demás es
 * telemetría, no alerta. Un fallo del propio webhook jamás se
 * propaga al pipeline.
 * =================================================================
 */

use serde::Serialize;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Familias de alerta con severidad implícita.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    RetryExhausted,
    CredentialRefreshFailed,
    StaleClaimRecovered,
}

impl AlertKind {
    pub fn severity(&self) -> &'static str {
        match self {
            AlertKind::RetryExhausted | AlertKind::CredentialRefreshFailed => "critical",
            AlertKind::StaleClaimRecovered => "warning",
        }
    }
}

/// Payload accionable: identidad, etapa, motivo y enlace de regreso.
#[derive(Debug, Clone, Serialize)]
pub struct AlertEvent {
    pub kind: AlertKind,
    pub severity: &'static str,
    pub task_id: Uuid,
    pub channel_key: String,
    pub planning_page_id: String,
    pub stage: Option<&'static str>,
    pub reason: String,
    pub final_error: String,
}

/// Profundidad del buffer de diagnóstico de alertas recientes.
const RECENT_ALERTS_DEPTH: usize = 100;

pub struct AlertDispatcher {
    webhook_url: Option<String>,
    network_client: reqwest::Client,
    /// Últimas alertas emitidas, para diagnóstico de guardia.
    recent_events: Mutex<VecDeque<AlertEvent>>,
}

impl AlertDispatcher {
    pub fn new(webhook_url: Option<String>) -> Self {
        Self {
            webhook_url,
            network_client: reqwest::Client::builder()
                .timeout(Duration::from_secs(10))
                .user_agent("Showrunner-Alert-Dispatcher/0.4")
                .build()
                .expect("FATAL: Failed to initialize alert network client."),
            recent_events: Mutex::new(VecDeque::with_capacity(RECENT_ALERTS_DEPTH)),
        }
    }

    /**
     * Emite la alerta al webhook de guardia (best-effort) y la retiene
     * en el buffer de diagnóstico.
     */
    pub async fn dispatch(&self, event: AlertEvent) {
        match event.kind.severity() {
            "warning" => warn!(
                task_id = %event.task_id,
                channel = %event.channel_key,
                reason = %event.reason,
                "🔔 [ALERT]: {:?}",
                event.kind
            ),
            _ => error!(
                task_id = %event.task_id,
                channel = %event.channel_key,
                reason = %event.reason,
                "🚨 [ALERT]: {:?}",
                event.kind
            ),
        }

        {
            let mut recent_guard = self
                .recent_events
                .lock()
                .expect("FATAL: Alert diagnostics lock poisoned.");
            if recent_guard.len() == RECENT_ALERTS_DEPTH {
                recent_guard.pop_front();
            }
            recent_guard.push_back(event.clone());
        }

        let Some(webhook_url) = &self.webhook_url else {
            info!("🔕 [ALERT]: No webhook bound; alert retained in diagnostics buffer only.");
            return;
        };

        let delivery = self
            .network_client
            .post(webhook_url)
            .json(&event)
            .send()
            .await;

        match delivery {
            Ok(response) if response.status().is_success() => {}
            Ok(response) => warn!(
                status = %response.status(),
                "⚠️ [ALERT_DELIVERY]: Guard webhook rejected the alert."
            ),
            Err(fault) => warn!(
                "⚠️ [ALERT_DELIVERY]: Guard webhook unreachable: {}",
                fault
            ),
        }
    }

    /// Copia del buffer de alertas recientes (diagnóstico y auditorías).
    pub fn recent(&self) -> Vec<AlertEvent> {
        self.recent_events
            .lock()
            .expect("FATAL: Alert diagnostics lock poisoned.")
            .iter()
            .cloned()
            .collect()
    }
}
