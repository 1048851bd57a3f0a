// [libs/infra/provider-mesh/src/lib.rs]
/*!
 * =================================================================
 * APARATO: EXTERNAL PROVIDER MESH
 * CLASIFICACIÓN: INFRASTRUCTURE LAYER (ESTRATO L3)
 * RESPONSABILIDAD: PUERTOS Y CLIENTES DE LOS COLABORADORES EXTERNOS
 *
 * Cada colaborador se modela como un puerto (trait) más un cliente
 * HTTP endurecido. El driver y los tests consumen los puertos; sólo
 * el bootstrap conoce los clientes concretos.
 * =================================================================
 */

pub mod audio;
pub mod errors;
pub mod image;
pub mod issuer;
pub mod planning;
pub mod upload;
pub mod video;

pub use audio::{AudioServicePort, HttpAudioServiceClient, HttpSfxServiceClient, SfxServicePort};
pub use errors::{ProviderError, ProviderErrorKind};
pub use image::{HttpImageServiceClient, ImageServicePort};
pub use issuer::{CredentialIssuerPort, HttpCredentialIssuerClient};
pub use planning::{HttpPlanningStoreClient, PlanningStorePort};
pub use upload::{HttpUploadTargetClient, UploadMetadata, UploadTargetPort};
pub use video::{HttpVideoServiceClient, VideoServicePort};

use std::time::Duration;

/// Forja el cliente de red endurecido estándar de la malla.
pub(crate) fn build_hardened_client(timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(timeout)
        .tcp_keepalive(Some(Duration::from_secs(60)))
        .user_agent("Showrunner-Provider-Mesh/0.2")
        .build()
        .expect("FATAL: Failed to initialize hardened network client.")
}
