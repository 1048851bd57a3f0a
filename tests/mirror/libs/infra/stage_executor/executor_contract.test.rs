// [tests/mirror/libs/infra/stage_executor/executor_contract.test.rs]
/*!
 * =================================================================
 * APARATO: CERTIFICADOR DEL CONTRATO DE SUBPROCESO
 * CLASIFICACIÓN: TRINITY EVIDENCE // ESTRATO L3-MIRROR
 * RESPONSABILIDAD: AUDITORÍA DE EXIT CODES, CAPTURA Y TIMEOUT
 * =================================================================
 */

use showrunner_infra_executor::{StepError, StepInvocation};
use std::time::Duration;

#[tokio::test]
async fn certify_exit_zero_maps_to_success_with_captured_output() {
    let output = StepInvocation::new("/bin/sh", Duration::from_secs(5))
        .flag("-c", "echo artifact-ok; echo diagnostics >&2")
        .run()
        .await
        .expect("STEP_FAULT: nominal binary rejected");

    assert!(output.stdout.contains("artifact-ok"));
    assert!(output.stderr.contains("diagnostics"));
}

#[tokio::test]
async fn certify_nonzero_exit_maps_to_step_failed_with_stderr() {
    let verdict = StepInvocation::new("/bin/sh", Duration::from_secs(5))
        .flag("-c", "echo render collapsed >&2; exit 17")
        .run()
        .await;

    match verdict {
        Err(StepError::StepFailed { exit_code, stderr }) => {
            assert_eq!(exit_code, 17);
            assert!(stderr.contains("render collapsed"));
        }
        other => panic!("StepFailed esperado, se obtuvo {other:?}"),
    }
}

#[tokio::test]
async fn certify_budget_exhaustion_maps_to_step_timeout() {
    let budget = Duration::from_millis(200);
    let verdict = StepInvocation::new("/bin/sh", budget)
        .flag("-c", "sleep 30")
        .run()
        .await;

    match verdict {
        Err(StepError::StepTimeout(elapsed_budget)) => {
            assert_eq!(elapsed_budget, budget);
        }
        other => panic!("StepTimeout esperado, se obtuvo {other:?}"),
    }
}

#[tokio::test]
async fn certify_missing_binary_maps_to_spawn_fault() {
    let verdict = StepInvocation::new("/nonexistent/stage-binary", Duration::from_secs(1))
        .arg("--noop")
        .run()
        .await;

    assert!(matches!(verdict, Err(StepError::SpawnFault(_))));
}
