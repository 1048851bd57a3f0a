// [libs/infra/db-turso/src/client.rs]
/*!
 * =================================================================
 * APARATO: PRODUCTION LEDGER CLIENT
 * CLASIFICACIÓN: INFRASTRUCTURE LAYER (ESTRATO L3)
 * RESPONSABILIDAD: APERTURA DEL ENLACE AL LEDGER Y NIVELACIÓN PREVIA
 *
 * # Mathematical Proof (Schema-Before-Traffic):
 * El cliente nivela el esquema sobre una conexión dedicada ANTES de
 * entregarse a los repositorios: ninguna transacción de reclamo puede
 * observar tablas a medio forjar. En modo efímero (RAM compartida)
 * esa misma conexión queda anclada de por vida; si se cerrara, SQLite
 * descartaría el segmento con las tablas recién forjadas y cada test
 * vería un Ledger vacío.
 * =================================================================
 */

use crate::errors::DbError;
use crate::schema::apply_full_production_schema;
use libsql::{Builder, Connection, Database};
use std::sync::Arc;
use tracing::{error, info};

/// Ubicación física del Ledger, resuelta desde la URL de conexión.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LedgerLocation {
    /// Cluster remoto de Turso: exige token de acceso.
    RemoteCluster,
    /// Archivo local en disco (despliegues single-node).
    LocalFile,
    /// Segmento de RAM compartida (tests y entornos desechables).
    Ephemeral,
}

impl LedgerLocation {
    fn resolve(connection_url: &str) -> LedgerLocation {
        if connection_url.starts_with("libsql://") || connection_url.starts_with("https://") {
            LedgerLocation::RemoteCluster
        } else if connection_url.contains(":memory:") || connection_url.contains("mode=memory") {
            LedgerLocation::Ephemeral
        } else {
            LedgerLocation::LocalFile
        }
    }
}

#[derive(Clone)]
pub struct TursoClient {
    ledger_engine: Arc<Database>,
    /// Ancla vitalicia del segmento de RAM compartida (sólo efímero).
    _ram_anchor: Option<Arc<Connection>>,
}

impl TursoClient {
    /**
     * Abre el enlace al Ledger de producción y nivela su esquema.
     *
     * # Errors:
     * - `ConfigurationError`: URL vacía, o cluster remoto sin token.
     * - `ConnectionError`: el motor no arranca o la nivelación falla.
     */
    pub async fn connect(
        connection_url: &str,
        access_token: Option<String>,
    ) -> Result<Self, DbError> {
        if connection_url.trim().is_empty() {
            return Err(DbError::ConfigurationError("DB_URL_EMPTY".into()));
        }

        let location = LedgerLocation::resolve(connection_url);
        info!(
            location = ?location,
            "🗄️ [LEDGER]: Opening production ledger at [{}].",
            connection_url
        );

        let raw_engine = match location {
            LedgerLocation::RemoteCluster => {
                let token = access_token.ok_or_else(|| {
                    DbError::ConfigurationError("REMOTE_LEDGER_WITHOUT_TOKEN".into())
                })?;
                Builder::new_remote(connection_url.to_string(), token)
                    .build()
                    .await
            }
            LedgerLocation::LocalFile | LedgerLocation::Ephemeral => {
                Builder::new_local(connection_url).build().await
            }
        }
        .map_err(|fault| DbError::ConnectionError(format!("LEDGER_ENGINE_FORGE: {fault}")))?;

        let ledger_engine = Arc::new(raw_engine);

        // Nivelación previa al tráfico, sobre una conexión dedicada.
        let leveling_connection = ledger_engine
            .connect()
            .map_err(|fault| DbError::ConnectionError(format!("LEDGER_LEVELING_LINK: {fault}")))?;
        apply_full_production_schema(&leveling_connection)
            .await
            .map_err(|fault| DbError::ConnectionError(format!("LEDGER_SCHEMA_LEVELING: {fault}")))?;

        // En RAM la conexión de nivelación se convierte en ancla vitalicia;
        // en disco/remoto se suelta y el pool la recicla.
        let ram_anchor = match location {
            LedgerLocation::Ephemeral => {
                info!("📌 [LEDGER]: Ephemeral segment pinned by the leveling connection.");
                Some(Arc::new(leveling_connection))
            }
            LedgerLocation::RemoteCluster | LedgerLocation::LocalFile => None,
        };

        Ok(Self {
            ledger_engine,
            _ram_anchor: ram_anchor,
        })
    }

    /// Acuña una conexión fresca del motor para una operación corta.
    pub fn get_connection(&self) -> Result<Connection, DbError> {
        self.ledger_engine.connect().map_err(|fault| {
            error!("🗄️ [LEDGER]: Connection mint rejected: {}", fault);
            DbError::ConnectionError(fault.to_string())
        })
    }
}
