// [libs/domain/workflow/src/lib.rs]
/*!
 * =================================================================
 * APARATO: WORKFLOW POLICY ENGINE
 * CLASIFICACIÓN: DOMAIN POLICY (ESTRATO L2)
 * RESPONSABILIDAD: POLÍTICAS PURAS DE REINTENTO Y EQUIDAD
 *
 * Este aparato no toca red, disco ni Ledger: recibe hechos y emite
 * veredictos deterministas (salvo el jitter, acotado y configurable).
 * =================================================================
 */

pub mod retry;
pub mod scheduler;

pub use retry::{
    PermanentKind, RetryPolicy, RetryVerdict, StageFailure, TransientKind,
};
pub use scheduler::{claim_order, fairness_order, ChannelCandidate, TaskCandidate};
