// [libs/infra/stage-executor/src/lib.rs]
/*!
 * =================================================================
 * APARATO: STAGE STEP EXECUTOR
 * CLASIFICACIÓN: INFRASTRUCTURE LAYER (ESTRATO L3)
 * RESPONSABILIDAD: CONTRATO DE SUBPROCESO DE UN SOLO DISPARO
 *
 * Contrato del ejecutable de etapa: recibe su trabajo íntegramente
 * por argumentos (jamás escanea stdin ni archivos de cola), escribe
 * artefactos en las rutas recibidas, exit 0 en éxito sin garantía
 * de forma en stdout, exit != 0 con stderr legible en fallo.
 * =================================================================
 */

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, warn};

#[derive(Error, Debug)]
pub enum StepError {
    /// El binario no pudo lanzarse (ruta inexistente, permisos).
    #[error("[L3_STEP_FAULT]: SPAWN_REJECTED -> {0}")]
    SpawnFault(#[from] std::io::Error),

    /// El subproceso terminó con exit code distinto de cero.
    #[error("[L3_STEP_FAULT]: STEP_FAILED exit={exit_code} -> {stderr}")]
    StepFailed { exit_code: i32, stderr: String },

    /// El subproceso excedió su presupuesto temporal (transitorio).
    #[error("[L3_STEP_FAULT]: STEP_TIMEOUT after {0:?}")]
    StepTimeout(Duration),
}

/// Salida capturada de un paso exitoso.
#[derive(Debug, Clone)]
pub struct StepOutput {
    pub stdout: String,
    pub stderr: String,
    pub elapsed: Duration,
}

/// Invocación declarativa de un ejecutable de etapa.
#[derive(Debug, Clone)]
pub struct StepInvocation {
    program: PathBuf,
    arguments: Vec<String>,
    timeout: Duration,
}

impl StepInvocation {
    pub fn new(program: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            arguments: Vec::new(),
            timeout,
        }
    }

    /// Añade un par bandera/valor. Sólo argumentos: sin stdin, sin config.
    pub fn flag(mut self, name: &str, value: impl AsRef<str>) -> Self {
        self.arguments.push(name.to_string());
        self.arguments.push(value.as_ref().to_string());
        self
    }

    pub fn arg(mut self, value: impl AsRef<str>) -> Self {
        self.arguments.push(value.as_ref().to_string());
        self
    }

    /**
     * Lanza el subproceso sin bloquear el scheduler, captura stdout y
     * stderr completos y aplica el presupuesto temporal.
     *
     * # Errors:
     * - `StepTimeout`: la espera expiró; el hijo muere con el handle
     *   (kill_on_drop) y el Reaper gobierna la consistencia de la fila.
     * - `StepFailed`: exit != 0 con el stderr como diagnóstico.
     */
    pub async fn run(self) -> Result<StepOutput, StepError> {
        let launch_instant = std::time::Instant::now();

        debug!(
            program = %self.program.display(),
            argument_count = self.arguments.len(),
            "🚀 [STEP_EXECUTOR]: Launching single-shot stage binary."
        );

        let child_future = Command::new(&self.program)
            .args(&self.arguments)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output();

        let output = match tokio::time::timeout(self.timeout, child_future).await {
            Ok(result) => result?,
            Err(_) => {
                warn!(
                    program = %self.program.display(),
                    budget_seconds = self.timeout.as_secs(),
                    "⏱️ [STEP_EXECUTOR]: Temporal budget exhausted. Child sealed."
                );
                return Err(StepError::StepTimeout(self.timeout));
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

        if output.status.success() {
            Ok(StepOutput {
                stdout,
                stderr,
                elapsed: launch_instant.elapsed(),
            })
        } else {
            Err(StepError::StepFailed {
                exit_code: output.status.code().unwrap_or(-1),
                stderr,
            })
        }
    }
}
