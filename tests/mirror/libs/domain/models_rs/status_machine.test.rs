// [tests/mirror/libs/domain/models_rs/status_machine.test.rs]
/*!
 * =================================================================
 * APARATO: CERTIFICADOR DE LA MÁQUINA DE ESTADOS
 * CLASIFICACIÓN: TRINITY EVIDENCE // ESTRATO L2-MIRROR
 * RESPONSABILIDAD: AUDITORÍA DE LA TABLA DE TRANSICIONES Y SUS LEYES
 *
 * # Mathematical Proof (Status Partition):
 * Todo estado pertenece a exactamente una de las familias
 * {ACTIVE, TERMINAL}; la familia worker-held es un subconjunto
 * estricto de ACTIVE. Las leyes se certifican por enumeración
 * exhaustiva y por barrido proptest del producto cartesiano.
 * =================================================================
 */

use proptest::prelude::*;
use showrunner_domain_models::{PipelineStage, TaskStatus};

/// Aristas del pipeline lineal, en el orden físico de producción.
const HAPPY_PATH: [(TaskStatus, TaskStatus); 18] = [
    (TaskStatus::Draft, TaskStatus::Queued),
    (TaskStatus::Queued, TaskStatus::Claimed),
    (TaskStatus::Claimed, TaskStatus::GeneratingAssets),
    (TaskStatus::GeneratingAssets, TaskStatus::AssetsReady),
    (TaskStatus::AssetsReady, TaskStatus::AssetsApproved),
    (TaskStatus::AssetsApproved, TaskStatus::GeneratingVideo),
    (TaskStatus::GeneratingVideo, TaskStatus::VideoReady),
    (TaskStatus::VideoReady, TaskStatus::VideoApproved),
    (TaskStatus::VideoApproved, TaskStatus::GeneratingAudio),
    (TaskStatus::GeneratingAudio, TaskStatus::AudioReady),
    (TaskStatus::AudioReady, TaskStatus::AudioApproved),
    (TaskStatus::AudioApproved, TaskStatus::GeneratingSfx),
    (TaskStatus::GeneratingSfx, TaskStatus::Assembling),
    (TaskStatus::Assembling, TaskStatus::Assembled),
    (TaskStatus::Assembled, TaskStatus::FinalReview),
    (TaskStatus::FinalReview, TaskStatus::Uploading),
    (TaskStatus::Uploading, TaskStatus::Published),
    (TaskStatus::Published, TaskStatus::Queued),
];

#[test]
fn certify_happy_path_is_fully_legal() {
    for (from, to) in HAPPY_PATH {
        TaskStatus::validate_transition(from, to)
            .unwrap_or_else(|fault| panic!("Arista nominal rechazada: {fault}"));
    }
}

#[test]
fn certify_status_partition_is_exact() {
    // Ley I: ACTIVE y TERMINAL particionan el inventario completo.
    for status in TaskStatus::ALL {
        assert_ne!(
            status.is_active(),
            status.is_terminal(),
            "{status} viola la partición ACTIVE/TERMINAL"
        );
    }

    // Ley II: worker-held y compuertas de revisión viven dentro de ACTIVE.
    for status in TaskStatus::ALL {
        if status.is_worker_held() || status.is_review_gate() {
            assert!(status.is_active(), "{status} worker-held/gate fuera de ACTIVE");
        }
    }

    let active_count = TaskStatus::ALL.iter().filter(|s| s.is_active()).count();
    assert_eq!(active_count, 16);
    assert_eq!(TaskStatus::ALL.len() - active_count, 9);
}

#[test]
fn certify_error_terminals_schedule_requeue_only() {
    for status in TaskStatus::ALL.into_iter().filter(|s| s.is_stage_error()) {
        assert!(status.is_terminal());
        assert!(status.allowed_transitions().contains(&TaskStatus::Queued));
    }
    // Arista especial: re-revisión sin re-producción completa.
    assert!(TaskStatus::UploadError
        .allowed_transitions()
        .contains(&TaskStatus::FinalReview));
}

#[test]
fn certify_review_gates_are_never_claim_sources_for_generation() {
    // Las compuertas *_READY no resuelven etapa: el driver no las toca.
    for gate in [
        TaskStatus::AssetsReady,
        TaskStatus::VideoReady,
        TaskStatus::AudioReady,
    ] {
        assert_eq!(PipelineStage::for_claim_source(gate), None);
    }
    // FINAL_REVIEW sí resuelve (upload), condicionado al sello del revisor
    // que la consulta de reclamo verifica aparte.
    assert_eq!(
        PipelineStage::for_claim_source(TaskStatus::FinalReview),
        Some(PipelineStage::Upload)
    );
}

#[test]
fn certify_stage_catalog_closes_over_the_table() {
    // Toda etapa produce aristas legales: claim, éxito y error.
    for stage in PipelineStage::ALL {
        let in_progress = stage.in_progress_status();
        assert!(in_progress.is_worker_held(), "{stage} sin posesión física");

        TaskStatus::validate_transition(in_progress, stage.success_status())
            .unwrap_or_else(|fault| panic!("Éxito ilegal: {fault}"));
        TaskStatus::validate_transition(in_progress, stage.error_status())
            .unwrap_or_else(|fault| panic!("Error ilegal: {fault}"));
    }
}

fn any_status() -> impl Strategy<Value = TaskStatus> {
    prop::sample::select(TaskStatus::ALL.to_vec())
}

proptest! {
    /// Ley de clausura: validate_transition acepta exactamente la tabla.
    #[test]
    fn law_transition_closure(from in any_status(), to in any_status()) {
        let verdict = TaskStatus::validate_transition(from, to);
        prop_assert_eq!(
            verdict.is_ok(),
            from.allowed_transitions().contains(&to)
        );
        if let Err(fault) = verdict {
            prop_assert_eq!(fault.from, from);
            prop_assert_eq!(fault.to, to);
        }
    }

    /// Ley de custodia: sólo las familias declaradas portan claimed_at.
    #[test]
    fn law_worker_held_is_in_progress(status in any_status()) {
        if status.is_worker_held() {
            prop_assert!(status.is_in_progress());
        }
    }

    /// Ley de persistencia: el texto del Ledger rehidrata bit-perfecto.
    #[test]
    fn law_persisted_form_roundtrip(status in any_status()) {
        prop_assert_eq!(TaskStatus::parse(status.as_str()), Some(status));
    }
}
