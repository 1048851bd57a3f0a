// [apps/orchestrator/src/main.rs]
/*!
 * =================================================================
 * APARATO: ORCHESTRATOR MAIN ENTRY POINT
 * CLASIFICACIÓN: APPLICATION SHELL (ESTRATO L3)
 * RESPONSABILIDAD: BOOTSTRAP DE INFRAESTRUCTURA E IGNICIÓN SEGURA
 *
 * Contrato de exit codes: 0 apagado limpio, 1 fallo de arranque
 * (configuración, llave o Ledger), 2 violación de invariante en
 * runtime (sellada por Heimdall).
 * =================================================================
 */

use showrunner_orchestrator::prelude::*;

use dotenvy::dotenv;
use showrunner_shared_heimdall::init_tracing;
use tracing::{error, info};

fn main() {
    // 1. CARGA DE ENTORNO
    // Hidrata las variables de .env en el espacio de nombres del proceso.
    dotenv().ok();

    // 2. INICIALIZACIÓN DE OBSERVABILIDAD NEURAL (HEIMDALL)
    init_tracing("showrunner_orchestrator");

    // 3. CAPTURA Y VALIDACIÓN DE CONFIGURACIÓN (pre-runtime)
    let config = match OrchestratorConfig::from_env() {
        Ok(config) => config,
        Err(config_fault) => {
            error!("❌ [IGNITION_ABORTED]: Configuration rejected: {:#}", config_fault);
            std::process::exit(1);
        }
    };

    // 4. CONSTRUCCIÓN DEL RUNTIME SOBERANO
    let runtime_orchestrator = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(runtime_fault) => {
            error!("❌ [IGNITION_ABORTED]: Runtime forge failed: {}", runtime_fault);
            std::process::exit(1);
        }
    };

    let verdict = runtime_orchestrator.block_on(async {
        info!("🛰️  [COMMAND_CENTER]: Global ignition sequence starting...");

        // 5. CONSTRUCCIÓN DEL KERNEL SOBERANO (ESTRATO L1-APP)
        let kernel_instance = match OrchestratorKernel::ignite(config).await {
            Ok(kernel) => kernel,
            Err(ignition_fault) => {
                error!("❌ [IGNITION_ABORTED]: {:#}", ignition_fault);
                return 1;
            }
        };

        // 6. IGNICIÓN DE OPERACIONES DE PRODUCCIÓN
        info!(
            "🚀 [SHOWRUNNER_ONLINE]: System fully operational on port {}.",
            kernel_instance.listening_port
        );
        match kernel_instance.launch_production_operations().await {
            Ok(()) => {
                info!("🏁 [COMMAND_CENTER]: Clean shutdown sealed.");
                0
            }
            Err(runtime_fault) => {
                error!("💀 [KERNEL_COLLAPSE]: {:#}", runtime_fault);
                1
            }
        }
    });

    std::process::exit(verdict);
}
