// INICIO DEL ARCHIVO [apps/orchestrator/src/kernel.rs]
/**
 * =================================================================
 * APARATO: ORCHESTRATOR SOVEREIGN KERNEL
 * CLASIFICACIÓN: COMPOSITION ROOT (ESTRATO L1-APP)
 * RESPONSABILIDAD: BOOTSTRAP DE INFRAESTRUCTURA E IGNICIÓN SEGURA
 *
 * Actúa como la placa base donde se conectan todos los servicios:
 * Ledger, inventario de canales, cupos durables, daemons de
 * resiliencia, flota de workers y transporte HTTP con apagado
 * cooperativo (grace window, filas huérfanas al Reaper).
 * =================================================================
 */

use anyhow::{Context, Result};
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::config::OrchestratorConfig;
use crate::routes::create_production_router;
use crate::services::reaper::spawn_reaper;
use crate::services::retry_marshal::spawn_retry_marshal;
use crate::services::sync_relay::spawn_sync_relays;
use crate::services::worker_pool::spawn_worker_fleet;
use crate::state::{AppState, StageServices};
use showrunner_domain_models::ExternalService;
use showrunner_infra_db::TursoClient;
use showrunner_infra_providers::{
    HttpAudioServiceClient, HttpCredentialIssuerClient, HttpImageServiceClient,
    HttpPlanningStoreClient, HttpSfxServiceClient, HttpUploadTargetClient, HttpVideoServiceClient,
};

pub struct OrchestratorKernel {
    pub listening_port: u16,
    pub application_shared_state: AppState,
    shutdown_transmitter: watch::Sender<bool>,
}

impl OrchestratorKernel {
    /**
     * Realiza la ignición del cliente táctico y el estado neural:
     * enlace al Ledger, nivelación de canales y cupos, malla de
     * proveedores. Establece todo ANTES de levantar servicios.
     */
    pub async fn ignite(config: OrchestratorConfig) -> Result<Self> {
        let database_client =
            TursoClient::connect(&config.database_url, config.database_token.clone())
                .await
                .context("FATAL: Database link collapse. Ignition aborted.")?;

        let (shutdown_transmitter, shutdown_receiver) = watch::channel(false);

        let provider_mesh = build_provider_mesh(&config);
        let listening_port = config.listening_port;

        let application_shared_state = AppState::new(
            database_client,
            config,
            provider_mesh,
            shutdown_receiver,
        );

        bootstrap_ledger_inventory(&application_shared_state).await?;

        Ok(Self {
            listening_port,
            application_shared_state,
            shutdown_transmitter,
        })
    }

    /**
     * Lanza los daemons de resiliencia, la flota de workers y el
     * transporte HTTP. Bloquea hasta el apagado cooperativo completo.
     */
    pub async fn launch_production_operations(self) -> Result<()> {
        let state = self.application_shared_state.clone();

        // --- 1. DAEMONS DE RESILIENCIA ---
        spawn_reaper(state.clone());
        spawn_retry_marshal(state.clone());
        spawn_sync_relays(&state);

        // --- 2. FLOTA DE WORKERS DEL PIPELINE ---
        let worker_handles = spawn_worker_fleet(&state);
        info!(
            worker_count = worker_handles.len(),
            "👷 [KERNEL]: Worker fleet deployed."
        );

        // --- 3. CENTINELA DE SEÑALES (SIGTERM / CTRL-C) ---
        spawn_signal_sentinel(self.shutdown_transmitter.clone());

        // --- 4. TRANSPORTE HTTP CON APAGADO COOPERATIVO ---
        let production_router = create_production_router(state.clone());
        let bind_address = SocketAddr::new(
            "0.0.0.0".parse::<IpAddr>().expect("static address"),
            self.listening_port,
        );

        info!("🚀 [KERNEL_ONLINE]: Showrunner Control Center listening at {}", bind_address);

        let tcp_listener = tokio::net::TcpListener::bind(bind_address)
            .await
            .context("CRITICAL_FAULT: Failed to bind network port.")?;

        let mut shutdown_observer = state.shutdown_signal.clone();
        axum::serve(tcp_listener, production_router)
            .with_graceful_shutdown(async move {
                let _ = shutdown_observer.changed().await;
            })
            .await
            .context("KERNEL_COLLAPSE: HTTP runtime failure")?;

        // --- 5. DRENADO DE LA FLOTA (GRACE WINDOW) ---
        let grace_window = state.config.shutdown_grace;
        info!(
            grace_seconds = grace_window.as_secs(),
            "🧯 [KERNEL]: Draining worker fleet."
        );

        let drain_verdict = tokio::time::timeout(
            grace_window,
            futures::future::join_all(worker_handles),
        )
        .await;

        match drain_verdict {
            Ok(_) => info!("🏁 [KERNEL]: Fleet drained clean. Orphan-free shutdown."),
            Err(_) => warn!(
                "⚠️ [KERNEL]: Grace window elapsed with workers mid-flight. Claimed rows left to the reaper."
            ),
        }

        Ok(())
    }
}

/// Forja la malla de clientes HTTP hacia los colaboradores externos.
fn build_provider_mesh(config: &OrchestratorConfig) -> StageServices {
    let endpoints = &config.providers;
    StageServices {
        image: Arc::new(HttpImageServiceClient::new(
            endpoints.image_url.clone(),
            endpoints.image_token.clone(),
        )),
        video: Arc::new(HttpVideoServiceClient::new(
            endpoints.video_url.clone(),
            endpoints.video_token.clone(),
        )),
        audio: Arc::new(HttpAudioServiceClient::new(
            endpoints.audio_url.clone(),
            endpoints.audio_token.clone(),
        )),
        sfx: Arc::new(HttpSfxServiceClient::new(
            endpoints.sfx_url.clone(),
            endpoints.sfx_token.clone(),
        )),
        upload: Arc::new(HttpUploadTargetClient::new(endpoints.upload_url.clone())),
        planning: Arc::new(HttpPlanningStoreClient::new(
            endpoints.planning_url.clone(),
            endpoints.planning_token.clone(),
        )),
        issuer: Arc::new(HttpCredentialIssuerClient::new(endpoints.issuer_url.clone())),
    }
}

/**
 * Nivelación de arranque del Ledger: canales declarados (alta y
 * archivo de ausentes) y cupos globales durables por servicio.
 */
async fn bootstrap_ledger_inventory(state: &AppState) -> Result<()> {
    // 1. CANALES DECLARADOS EN YAML
    let mut declared_keys = Vec::new();
    for seed in &state.config.channel_seeds {
        state
            .channels
            .upsert_from_seed(seed)
            .await
            .with_context(|| format!("CHANNEL_BOOTSTRAP_FAULT: [{}]", seed.key))?;
        declared_keys.push(seed.key.clone());
    }
    state
        .channels
        .archive_missing(&declared_keys)
        .await
        .context("CHANNEL_ARCHIVE_FAULT")?;

    // 2. CUPOS GLOBALES DURABLES
    let caps = &state.config.service_caps;
    let cap_profile = [
        (ExternalService::Image, caps.image_global),
        (ExternalService::Video, caps.video_global),
        (ExternalService::Audio, caps.audio_global),
        (ExternalService::Sfx, caps.sfx_global),
        (ExternalService::Assembler, caps.assembler_global),
        (ExternalService::Upload, caps.upload_global),
    ];
    for (service, cap) in cap_profile {
        state
            .rate_limits
            .configure_global_cap(service, cap)
            .await
            .with_context(|| format!("GATE_BOOTSTRAP_FAULT: [{service}]"))?;
    }

    info!(
        channels = declared_keys.len(),
        "🏗️ [KERNEL]: Ledger inventory leveled (tenants + durable gates)."
    );
    Ok(())
}

/// Centinela de terminación: SIGTERM o Ctrl-C activan el drenado.
fn spawn_signal_sentinel(shutdown_transmitter: watch::Sender<bool>) {
    tokio::spawn(async move {
        let ctrl_c_signal = tokio::signal::ctrl_c();

        #[cfg(unix)]
        {
            let mut sigterm_stream =
                tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                    .expect("FATAL: SIGTERM stream unavailable.");
            tokio::select! {
                _ = ctrl_c_signal => {},
                _ = sigterm_stream.recv() => {},
            }
        }

        #[cfg(not(unix))]
        {
            let _ = ctrl_c_signal.await;
        }

        warn!("⚠️ [SIGNAL]: Termination requested by host. Draining claims and sealing strata...");
        if shutdown_transmitter.send(true).is_err() {
            error!("❌ [SIGNAL]: Shutdown flag had no observers.");
        }
    });
}
// FIN DEL ARCHIVO [apps/orchestrator/src/kernel.rs]
