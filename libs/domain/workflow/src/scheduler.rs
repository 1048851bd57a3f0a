// [libs/domain/workflow/src/scheduler.rs]
/*!
 * =================================================================
 * APARATO: SCHEDULER ORDERING LAWS
 * CLASIFICACIÓN: DOMAIN POLICY (ESTRATO L2)
 * RESPONSABILIDAD: CLAVES PURAS DE EQUIDAD ROUND-ROBIN Y PRIORIDAD
 *
 * La función de elección vive dentro de la transacción de reclamo
 * del Ledger; aquí se definen (y certifican) las claves de orden
 * que esa consulta materializa en SQL. Un canal jamás monopoliza:
 * la prioridad sólo arbitra DENTRO de un canal.
 * =================================================================
 */

use chrono::{DateTime, Utc};
use std::cmp::Ordering;
use uuid::Uuid;

/// Canal con trabajo listo, visto por la función de elección.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelCandidate {
    pub channel_id: Uuid,
    /// Marca del reclamo más reciente; None = jamás reclamado (va primero).
    pub last_claimed_at: Option<DateTime<Utc>>,
}

/// Tarea lista dentro de un canal, vista por la función de elección.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskCandidate {
    pub task_id: Uuid,
    /// Peso numérico de prioridad (mayor = más urgente).
    pub priority_weight: i64,
    pub created_at: DateTime<Utc>,
}

/**
 * Orden de visita de canales: el reclamado hace más tiempo primero;
 * los vírgenes (sin reclamo histórico) preceden a todos; empates por
 * channel_id para un orden total estable.
 */
pub fn fairness_order(a: &ChannelCandidate, b: &ChannelCandidate) -> Ordering {
    match (a.last_claimed_at, b.last_claimed_at) {
        (None, None) => a.channel_id.cmp(&b.channel_id),
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(left), Some(right)) => left
            .cmp(&right)
            .then_with(|| a.channel_id.cmp(&b.channel_id)),
    }
}

/**
 * Orden de despacho dentro de un canal: prioridad descendente,
 * antigüedad ascendente, empates por task_id.
 */
pub fn claim_order(a: &TaskCandidate, b: &TaskCandidate) -> Ordering {
    b.priority_weight
        .cmp(&a.priority_weight)
        .then_with(|| a.created_at.cmp(&b.created_at))
        .then_with(|| a.task_id.cmp(&b.task_id))
}
