// [apps/orchestrator/src/services/credentials.rs]
/*!
 * =================================================================
 * APARATO: CREDENTIAL CUSTODIAN
 * CLASIFICACIÓN: BACKGROUND INFRASTRUCTURE (ESTRATO L4)
 * RESPONSABILIDAD: ENTREGA DE TOKENS CON REFRESH PROACTIVO SERIALIZADO
 *
 * # Mathematical Proof (Refresh Storm Suppression):
 * El refresh se serializa por (canal, servicio) con un mutex asíncrono
 * por llave: el primer worker refresca, los demás esperan y releen el
 * Ledger, de modo que una expiración produce exactamente una llamada
 * al emisor por llave sin importar cuántas etapas la requieran.
 * =================================================================
 */

use chrono::Duration as ChronoDuration;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use showrunner_core_vault::{TokenBundle, VaultCryptoEngine};
use showrunner_domain_models::{Channel, ExternalService};
use showrunner_domain_workflow::{PermanentKind, StageFailure};
use showrunner_infra_db::repositories::CredentialRepository;
use showrunner_infra_db::TursoClient;
use showrunner_infra_providers::CredentialIssuerPort;

/// Ventana de protección: un token que expira dentro de este margen se
/// refresca ANTES de entregarse, blindando la llamada de etapa posterior.
const REFRESH_PROTECTION_MINUTES: i64 = 10;

type RefreshKey = (Uuid, ExternalService);

pub struct CredentialCustodian {
    repository: CredentialRepository,
    vault_engine: VaultCryptoEngine,
    issuer: Arc<dyn CredentialIssuerPort>,
    /// Cerrojos de serialización de refresh por llave.
    refresh_locks: Mutex<HashMap<RefreshKey, Arc<Mutex<()>>>>,
}

impl CredentialCustodian {
    pub fn new(
        database_client: TursoClient,
        master_key_phrase: &str,
        issuer: Arc<dyn CredentialIssuerPort>,
    ) -> Self {
        Self {
            repository: CredentialRepository::new(database_client),
            vault_engine: VaultCryptoEngine::new(master_key_phrase),
            issuer,
            refresh_locks: Mutex::new(HashMap::new()),
        }
    }

    /**
     * Entrega el bundle vigente del (canal, servicio); si expira dentro
     * de la ventana de protección ejecuta el refresh antes de entregar.
     *
     * # Errors:
     * Toda imposibilidad de entregar un token utilizable se proyecta a
     * `PermanentKind::CredentialExpired` (alerta dedicada aguas arriba).
     */
    #[instrument(skip(self, channel, service), fields(channel_key = %channel.key, service = %service))]
    pub async fn get(
        &self,
        channel: &Channel,
        service: ExternalService,
    ) -> Result<TokenBundle, StageFailure> {
        let bundle = self.read_sealed_bundle(channel.id, service).await?;

        if !bundle.expires_within(ChronoDuration::minutes(REFRESH_PROTECTION_MINUTES)) {
            return Ok(bundle);
        }

        // Serialización del refresh por llave (supresión de tormentas).
        let key_lock = self.lock_for((channel.id, service)).await;
        let _refresh_guard = key_lock.lock().await;

        // Releer: otro worker pudo refrescar mientras esperábamos el cerrojo.
        let bundle = self.read_sealed_bundle(channel.id, service).await?;
        if !bundle.expires_within(ChronoDuration::minutes(REFRESH_PROTECTION_MINUTES)) {
            return Ok(bundle);
        }

        info!(channel_key = %channel.key, "🔁 [CUSTODIAN]: Proactive token refresh engaged.");

        let refreshed = self
            .issuer
            .refresh(&bundle.refresh_token, &channel.publish_binding)
            .await
            .map_err(|fault| {
                warn!(channel_key = %channel.key, "❌ [CUSTODIAN]: Issuer vetoed the refresh.");
                StageFailure::permanent(
                    PermanentKind::CredentialExpired,
                    format!("credential refresh failed: {fault}"),
                )
            })?;

        self.store(channel.id, service, &refreshed).await?;
        Ok(refreshed)
    }

    /// Sella y persiste un bundle (alta de operador o post-refresh).
    pub async fn store(
        &self,
        channel_id: Uuid,
        service: ExternalService,
        bundle: &TokenBundle,
    ) -> Result<(), StageFailure> {
        let sealed = self.vault_engine.seal_bundle(bundle).map_err(|fault| {
            StageFailure::permanent(
                PermanentKind::CredentialExpired,
                format!("vault seal failed: {fault}"),
            )
        })?;

        self.repository
            .store(channel_id, service, &sealed, bundle.expires_at)
            .await
            .map_err(|fault| {
                StageFailure::permanent(
                    PermanentKind::CredentialExpired,
                    format!("credential persistence failed: {fault}"),
                )
            })
    }

    async fn read_sealed_bundle(
        &self,
        channel_id: Uuid,
        service: ExternalService,
    ) -> Result<TokenBundle, StageFailure> {
        let record = self
            .repository
            .fetch(channel_id, service)
            .await
            .map_err(|fault| {
                StageFailure::permanent(
                    PermanentKind::CredentialExpired,
                    format!("credential fetch failed: {fault}"),
                )
            })?
            .ok_or_else(|| {
                StageFailure::permanent(
                    PermanentKind::CredentialExpired,
                    "no credential on file for channel/service",
                )
            })?;

        self.vault_engine
            .open_bundle(&record.ciphertext)
            .map_err(|fault| {
                StageFailure::permanent(
                    PermanentKind::CredentialExpired,
                    format!("vault open failed: {fault}"),
                )
            })
    }

    async fn lock_for(&self, key: RefreshKey) -> Arc<Mutex<()>> {
        let mut locks_guard = self.refresh_locks.lock().await;
        locks_guard
            .entry(key)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}
