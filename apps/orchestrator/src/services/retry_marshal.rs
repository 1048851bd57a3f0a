// [apps/orchestrator/src/services/retry_marshal.rs]
/*!
 * =================================================================
 * APARATO: RETRY MARSHAL DAEMON
 * CLASIFICACIÓN: BACKGROUND INFRASTRUCTURE (ESTRATO L4)
 * RESPONSABILIDAD: PROMOCIÓN *_ERROR -> QUEUED DE REINTENTOS VENCIDOS
 * =================================================================
 */

use chrono::Utc;
use std::time::Duration;
use tokio::time::interval;
use tracing::{debug, error, info};

use crate::state::AppState;

/// Cadencia de promoción: suficientemente fina para honrar backoffs
/// de 60s sin castigar el Ledger.
const MARSHAL_SCAN_INTERVAL: Duration = Duration::from_secs(5);

/// Inicia el marshal de reintentos en el runtime de Tokio.
pub fn spawn_retry_marshal(state: AppState) {
    tokio::spawn(async move {
        let mut promotion_ticker = interval(MARSHAL_SCAN_INTERVAL);
        info!("⏫ [RETRY_MARSHAL]: Promotion daemon initiated.");

        loop {
            promotion_ticker.tick().await;

            if *state.shutdown_signal.borrow() {
                info!("⏫ [RETRY_MARSHAL]: Shutdown observed. Daemon sealed.");
                break;
            }

            match state.tasks.promote_due_retries(Utc::now()).await {
                Ok(0) => {}
                Ok(promoted) => {
                    debug!(promoted, "⏫ [RETRY_MARSHAL]: Due retries promoted to QUEUED.");
                    state.queue_waker.notify_waiters();
                }
                Err(promotion_fault) => {
                    error!(
                        "❌ [RETRY_MARSHAL]: Promotion sweep failed: {}",
                        promotion_fault
                    );
                }
            }
        }
    });
}
