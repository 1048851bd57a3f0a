// [libs/shared/heimdall/src/lib.rs]
/*!
 * =================================================================
 * APARATO: HEIMDALL NEURAL OBSERVER
 * CLASIFICACIÓN: SHARED UTILITY (ESTRATO L4/L6)
 * RESPONSABILIDAD: TELEMETRÍA DEL PIPELINE, CENTINELA DE PÁNICOS Y
 *                  SELLADO DE INVARIANTES
 *
 * # Mathematical Proof (Observability Integrity):
 * Cada transición de estado, adquisición de compuerta, veredicto de
 * reintento y sincronía emite exactamente un evento estructurado.
 * El filtro por defecto abre el rastro de las crates del pipeline al
 * nivel del servicio y silencia el ruido de transporte (hyper, h2,
 * reqwest de la malla de proveedores) y del driver libSQL, de modo
 * que un `RUST_LOG` vacío produce un rastro legible de producción.
 * =================================================================
 */

use std::panic;
use tracing::{error, info};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Código de salida del proceso ante una violación de invariante detectada.
pub const EXIT_CODE_INVARIANT_COLLAPSE: i32 = 2;

/// Crates del pipeline cuyo rastro viaja al nivel del servicio.
const PIPELINE_CRATE_PREFIXES: &[&str] = &[
    "showrunner_domain_models",
    "showrunner_domain_workflow",
    "showrunner_infra_db",
    "showrunner_infra_providers",
    "showrunner_infra_executor",
    "showrunner_infra_workspace",
];

/// Ruido de infraestructura silenciado por defecto: transporte HTTP
/// (servidor y malla de proveedores) y el driver del Ledger.
const INFRA_NOISE_DIRECTIVES: &[&str] = &[
    "hyper=warn",
    "tower_http=warn",
    "reqwest=warn",
    "h2=error",
    "rustls=error",
    "libsql=error",
];

/// Forja la directiva de filtrado cuando RUST_LOG no dicta otra cosa.
fn forge_default_directives(service_slug: &str) -> String {
    let floor_level = if cfg!(debug_assertions) { "debug" } else { "info" };

    let mut directives = Vec::with_capacity(
        1 + PIPELINE_CRATE_PREFIXES.len() + INFRA_NOISE_DIRECTIVES.len(),
    );
    directives.push(format!("{service_slug}={floor_level}"));
    for crate_prefix in PIPELINE_CRATE_PREFIXES {
        directives.push(format!("{crate_prefix}={floor_level}"));
    }
    directives.extend(INFRA_NOISE_DIRECTIVES.iter().map(|noise| noise.to_string()));

    directives.join(",")
}

/// Inicializa la telemetría Heimdall y arma el centinela de pánicos.
///
/// # Comportamiento:
/// - Debug: rastro compacto sin targets para el operador local.
/// - Release: tramas JSON aplanadas para la ingesta del colector.
///
/// # Errors:
/// Provoca pánico si otro suscriptor global ya fue inicializado.
pub fn init_tracing(service_slug: &str) {
    let telemetry_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(forge_default_directives(service_slug)));

    if cfg!(debug_assertions) {
        tracing_subscriber::registry()
            .with(telemetry_filter)
            .with(fmt::layer().compact().with_target(false))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(telemetry_filter)
            .with(fmt::layer().json().flatten_event(true))
            .init();
    }

    arm_panic_sentinel(service_slug);

    info!(
        "👁️  [HEIMDALL]: Telemetry lattice armed for [{}]. Panic sentinel on watch.",
        service_slug
    );
}

/// Centinela global: un colapso en cualquier tarea del runtime (workers,
/// daemons, relays) deja rastro estructurado antes de morir el hilo.
fn arm_panic_sentinel(service_slug: &str) {
    let service_badge = service_slug.to_string();

    panic::set_hook(Box::new(move |panic_report| {
        let collapse_site = panic_report
            .location()
            .map(|site| format!("{}:{}", site.file(), site.line()))
            .unwrap_or_else(|| "<sitio no reportado>".to_string());

        let collapse_cause = panic_report
            .payload()
            .downcast_ref::<&str>()
            .copied()
            .or_else(|| {
                panic_report
                    .payload()
                    .downcast_ref::<String>()
                    .map(String::as_str)
            })
            .unwrap_or("<causa no tipada>");

        error!(
            target: "panic_sentinel",
            service = %service_badge,
            site = %collapse_site,
            "💥 [PANIC_SENTINEL]: Task collapsed mid-flight. Cause: {}",
            collapse_cause
        );
    }));
}

/// Sella el proceso ante una violación de invariante del Ledger.
///
/// Último recurso: el estado observado contradice la máquina de estados
/// y continuar podría corromper filas adyacentes. Exit code 2.
pub fn fatal_invariant_collapse(component: &str, detail: &str) -> ! {
    error!(
        target: "invariant_monitor",
        component = %component,
        "💀 [INVARIANT_COLLAPSE]: {}. Sealing process to protect ledger integrity.",
        detail
    );
    std::process::exit(EXIT_CODE_INVARIANT_COLLAPSE);
}
