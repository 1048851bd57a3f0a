// [libs/domain/workflow/src/retry.rs]
/*!
 * =================================================================
 * APARATO: RETRY POLICY ENGINE
 * CLASIFICACIÓN: DOMAIN POLICY (ESTRATO L2)
 * RESPONSABILIDAD: CLASIFICACIÓN DE FALLOS Y CALENDARIO DE BACKOFF
 *
 * # Mathematical Proof (Bounded Backoff):
 * El reintento N espera min(max_delay, base * 2^(N-1)) * jitter con
 * jitter uniforme en [0.75, 1.25]. Con base 60s y techo 3600s la
 * serie es estrictamente creciente hasta saturar el techo, y el
 * agotamiento ocurre en el intento max_attempts exacto: ninguna
 * tarea reintenta para siempre.
 * =================================================================
 */

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Familias de fallo transitorio: el motor reprograma la tarea.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransientKind {
    NetworkTimeout,
    /// 5xx del servicio externo.
    UpstreamUnavailable,
    /// 429 del servicio externo.
    Throttled,
    /// "Busy" explícito del upstream (trabajo en curso, reintentar).
    UpstreamBusy,
    /// Cuota diaria agotada: backoff largo obligatorio.
    QuotaExhausted,
    /// Subproceso excedió su presupuesto temporal.
    StepTimeout,
    /// Fila huérfana recuperada por el Reaper.
    WorkerTimeout,
}

/// Familias de fallo permanente: sin reintento, terminal inmediato.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermanentKind {
    /// 4xx distinto de 429: la petición jamás prosperará tal cual.
    RequestRejected,
    AuthRejected,
    ValidationRejected,
    /// Subproceso de etapa con exit code distinto de cero.
    StepFailed,
    /// Refresh de credencial fallido: alerta dedicada.
    CredentialExpired,
}

/// Veredicto tipado de una llamada de etapa fallida.
/// El driver hace match cerrado: ningún estrato traga fallos en silencio.
#[derive(Error, Debug, Clone)]
pub enum StageFailure {
    #[error("[L2_STAGE_TRANSIENT]: {kind:?} -> {detail}")]
    Transient { kind: TransientKind, detail: String },

    #[error("[L2_STAGE_PERMANENT]: {kind:?} -> {detail}")]
    Permanent { kind: PermanentKind, detail: String },
}

impl StageFailure {
    pub fn transient(kind: TransientKind, detail: impl Into<String>) -> Self {
        StageFailure::Transient {
            kind,
            detail: detail.into(),
        }
    }

    pub fn permanent(kind: PermanentKind, detail: impl Into<String>) -> Self {
        StageFailure::Permanent {
            kind,
            detail: detail.into(),
        }
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, StageFailure::Transient { .. })
    }

    pub fn detail(&self) -> &str {
        match self {
            StageFailure::Transient { detail, .. } => detail,
            StageFailure::Permanent { detail, .. } => detail,
        }
    }
}

/// Veredicto del motor para la fila tras un fallo de etapa.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryVerdict {
    /// Reprogramar: nuevo retry_count y espera antes del re-encolado.
    Reschedule { retry_count: u32, delay: Duration },
    /// Presupuesto agotado o fallo permanente: terminal con alerta.
    Exhausted { retry_count: u32 },
}

/// Calendario soberano de reintentos.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// Intentos totales (inicial + reintentos).
    pub max_attempts: u32,
    /// Banda multiplicativa de jitter; None la anula (tests deterministas).
    pub jitter_band: Option<(f64, f64)>,
    /// Piso obligatorio tras agotamiento de cuota diaria.
    pub quota_floor: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(60),
            max_delay: Duration::from_secs(3600),
            max_attempts: 4,
            jitter_band: Some((0.75, 1.25)),
            quota_floor: Duration::from_secs(3600),
        }
    }
}

impl RetryPolicy {
    /// Variante sin jitter para auditorías bit-perfectas.
    pub fn deterministic() -> Self {
        Self {
            jitter_band: None,
            ..Self::default()
        }
    }

    /// Espera cruda (sin jitter) del reintento N, con N >= 1.
    pub fn raw_delay(&self, retry_number: u32) -> Duration {
        let exponent = retry_number.saturating_sub(1).min(20);
        let scaled = self
            .base_delay
            .as_secs()
            .saturating_mul(1u64 << exponent);
        Duration::from_secs(scaled.min(self.max_delay.as_secs()))
    }

    /// Espera efectiva del reintento N con la banda de jitter aplicada.
    pub fn backoff_delay(&self, retry_number: u32) -> Duration {
        let raw = self.raw_delay(retry_number);
        match self.jitter_band {
            Some((low, high)) => {
                let factor = rand::thread_rng().gen_range(low..=high);
                Duration::from_secs_f64(raw.as_secs_f64() * factor)
            }
            None => raw,
        }
    }

    /**
     * Emite el veredicto para una fila con 'retry_count' fallos previos
     * que acaba de fallar otra vez.
     *
     * Invariante: retry_count <= max_attempts - 1 permite reintentar;
     * el veredicto Exhausted porta el contador final persistible.
     */
    pub fn assess(&self, failure: &StageFailure, retry_count: u32) -> RetryVerdict {
        match failure {
            StageFailure::Permanent { .. } => RetryVerdict::Exhausted { retry_count },
            StageFailure::Transient { kind, .. } => {
                let bumped = retry_count.saturating_add(1);
                if bumped >= self.max_attempts {
                    return RetryVerdict::Exhausted { retry_count: bumped };
                }
                let mut delay = self.backoff_delay(bumped);
                if *kind == TransientKind::QuotaExhausted {
                    delay = delay.max(self.quota_floor);
                }
                RetryVerdict::Reschedule {
                    retry_count: bumped,
                    delay,
                }
            }
        }
    }
}
