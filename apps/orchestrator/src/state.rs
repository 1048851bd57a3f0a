// [apps/orchestrator/src/state.rs]
/*!
 * =================================================================
 * APARATO: SOVEREIGN STATE ORCHESTRATOR
 * CLASIFICACIÓN: APPLICATION STATE (ESTRATO L1-APP)
 * RESPONSABILIDAD: PLACA BASE DE REPOSITORIOS, PUERTOS Y SEÑALES
 *
 * Contenedor de estado compartido (Thread-Safe) del orquestador:
 * todos los daemons, workers y handlers HTTP operan sobre clones
 * baratos de esta estructura.
 * =================================================================
 */

use std::sync::Arc;
use tokio::sync::{watch, Notify};

use crate::config::OrchestratorConfig;
use crate::services::alert::AlertDispatcher;
use crate::services::credentials::CredentialCustodian;
use showrunner_domain_workflow::RetryPolicy;
use showrunner_infra_db::repositories::{
    ChannelRepository, GatePolicy, RateLimitRepository, SyncOutboxRepository, TaskRepository,
};
use showrunner_infra_db::TursoClient;
use showrunner_infra_providers::{
    AudioServicePort, CredentialIssuerPort, ImageServicePort, PlanningStorePort, SfxServicePort,
    UploadTargetPort, VideoServicePort,
};
use showrunner_infra_workspace::WorkspaceManager;

/// Puertos hacia los colaboradores externos. El bootstrap inyecta los
/// clientes HTTP reales; los proving grounds inyectan dobles guionados.
pub struct StageServices {
    pub image: Arc<dyn ImageServicePort>,
    pub video: Arc<dyn VideoServicePort>,
    pub audio: Arc<dyn AudioServicePort>,
    pub sfx: Arc<dyn SfxServicePort>,
    pub upload: Arc<dyn UploadTargetPort>,
    pub planning: Arc<dyn PlanningStorePort>,
    pub issuer: Arc<dyn CredentialIssuerPort>,
}

/// Placa base neural del orquestador.
#[derive(Clone)]
pub struct AppState {
    /// Cliente táctico del Ledger de producción (Motor A).
    pub database_client: TursoClient,
    pub config: Arc<OrchestratorConfig>,

    // --- AUTORIDADES DE PERSISTENCIA (L3) ---
    pub tasks: Arc<TaskRepository>,
    pub channels: Arc<ChannelRepository>,
    pub rate_limits: Arc<RateLimitRepository>,
    pub sync_outbox: Arc<SyncOutboxRepository>,

    // --- POLÍTICAS Y PUERTOS ---
    pub gate_policy: Arc<GatePolicy>,
    pub retry_policy: Arc<RetryPolicy>,
    pub services: Arc<StageServices>,
    pub workspace: Arc<WorkspaceManager>,
    pub custodian: Arc<CredentialCustodian>,
    pub alerts: Arc<AlertDispatcher>,

    // --- SEÑALES DE COORDINACIÓN ---
    /// Campana de la cola: ingesta, promociones y sellados la tocan
    /// para despertar a los workers dormidos.
    pub queue_waker: Arc<Notify>,
    /// Bandera cooperativa de apagado (true = drenar y salir).
    pub shutdown_signal: watch::Receiver<bool>,
}

impl AppState {
    pub fn new(
        database_client: TursoClient,
        config: OrchestratorConfig,
        services: StageServices,
        shutdown_signal: watch::Receiver<bool>,
    ) -> Self {
        let gate_policy = Arc::new(config.gate_policy());
        let workspace = Arc::new(WorkspaceManager::new(config.workspace_root.clone()));
        let alerts = Arc::new(AlertDispatcher::new(config.alert_webhook.clone()));
        let services = Arc::new(services);

        let custodian = Arc::new(CredentialCustodian::new(
            database_client.clone(),
            &config.encryption_key,
            services.issuer.clone(),
        ));

        Self {
            tasks: Arc::new(TaskRepository::new(database_client.clone())),
            channels: Arc::new(ChannelRepository::new(database_client.clone())),
            rate_limits: Arc::new(RateLimitRepository::new(database_client.clone())),
            sync_outbox: Arc::new(SyncOutboxRepository::new(database_client.clone())),
            database_client,
            config: Arc::new(config),
            gate_policy,
            retry_policy: Arc::new(RetryPolicy::default()),
            services,
            workspace,
            custodian,
            alerts,
            queue_waker: Arc::new(Notify::new()),
            shutdown_signal,
        }
    }

    /// Verdadero mientras el proceso no haya iniciado el drenado.
    pub fn is_operational(&self) -> bool {
        !*self.shutdown_signal.borrow()
    }
}
