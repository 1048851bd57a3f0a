// INICIO DEL ARCHIVO [apps/orchestrator/src/routes.rs]
/*!
 * =================================================================
 * APARATO: PRODUCTION ROUTING MATRIX
 * CLASIFICACIÓN: API ADAPTER LAYER (ESTRATO L3)
 * RESPONSABILIDAD: TOPOLOGÍA HTTP DEL ORQUESTADOR
 *
 * Superficie mínima deliberada: la autoría vive en el planning store;
 * el orquestador sólo expone la ingesta firmada y los probes.
 * =================================================================
 */

use crate::handlers::{health, ingest};
use crate::state::AppState;
use axum::{
    http::{header, Method},
    routing::{get, post},
    Router,
};
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};

pub fn create_production_router(application_shared_state: AppState) -> Router {
    // Escudo de Red: CORS para las herramientas de operación.
    let network_security_shield = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .max_age(Duration::from_secs(3600));

    Router::new()
        // Probes del plano de despliegue
        .route("/health", get(health::handle_health))
        .route("/ready", get(health::handle_ready))
        // Ingesta firmada del Motor P
        .route("/webhook/plan", post(ingest::handle_planning_webhook))
        .layer(network_security_shield)
        .with_state(application_shared_state)
}
// FIN DEL ARCHIVO [apps/orchestrator/src/routes.rs]
