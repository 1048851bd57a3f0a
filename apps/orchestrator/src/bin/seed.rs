// [apps/orchestrator/src/bin/seed.rs]
/*!
 * =================================================================
 * APARATO: LEDGER SEED SHELL
 * CLASIFICACIÓN: OPS TOOLING (ESTRATO L6)
 * RESPONSABILIDAD: SIEMBRA LOCAL DE CANALES Y TAREAS DEMO
 * =================================================================
 */

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing::info;

use showrunner_domain_models::{TaskPriority, TaskSeed};
use showrunner_infra_db::repositories::{ChannelRepository, TaskRepository};
use showrunner_infra_db::TursoClient;
use showrunner_orchestrator::config::load_channel_inventory;

/// Directivas de siembra para entornos locales.
#[derive(Parser, Debug)]
#[command(about = "Showrunner Ledger Seeder // siembra de canales y tareas demo")]
struct SeedDirectives {
    /// Inventario YAML de canales a nivelar.
    #[arg(long, env = "CHANNELS_CONFIG", default_value = "channels.yaml")]
    channels_file: PathBuf,

    /// URL del Ledger táctico.
    #[arg(long, env = "DB_URL")]
    database_url: String,

    /// Token de acceso remoto (Turso Cloud).
    #[arg(long, env = "TURSO_AUTH_TOKEN")]
    database_token: Option<String>,

    /// Siembra una tarea demo encolada por canal.
    #[arg(long, default_value_t = false)]
    with_demo_tasks: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    let directives = SeedDirectives::parse();

    let channel_seeds = load_channel_inventory(&directives.channels_file)
        .context("SEED_FAULT: channel inventory rejected")?;

    let database_client =
        TursoClient::connect(&directives.database_url, directives.database_token.clone())
            .await
            .context("SEED_FAULT: ledger unreachable")?;

    let channels = ChannelRepository::new(database_client.clone());
    let tasks = TaskRepository::new(database_client);

    let mut seeded_channels = 0usize;
    let mut seeded_tasks = 0usize;

    for seed in &channel_seeds {
        let leveled = channels.upsert_from_seed(seed).await?;
        seeded_channels += 1;

        if directives.with_demo_tasks {
            let demo_task = TaskSeed {
                planning_page_id: format!("SEED-{}-001", leveled.key),
                channel_key: leveled.key.clone(),
                title: format!("Demo production for {}", leveled.display_name),
                topic: "pipeline smoke run".to_string(),
                story_direction: "short, upbeat, single scene".to_string(),
                priority: TaskPriority::Normal,
            };

            match tasks.enqueue(&demo_task).await {
                Ok(task) => {
                    seeded_tasks += 1;
                    info!(task_id = %task.id, channel = %leveled.key, "🌱 [SEED]: Demo task queued.");
                }
                Err(showrunner_infra_db::DbError::DuplicateTask { .. }) => {
                    info!(channel = %leveled.key, "🌱 [SEED]: Demo task already active; skipped.");
                }
                Err(other) => return Err(other.into()),
            }
        }
    }

    info!(
        seeded_channels,
        seeded_tasks, "🏁 [SEED]: Ledger seeding sequence concluded."
    );
    Ok(())
}
