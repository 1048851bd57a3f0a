// [libs/infra/workspace/src/lib.rs]
/*!
 * =================================================================
 * APARATO: TASK WORKSPACE MANAGER
 * CLASIFICACIÓN: INFRASTRUCTURE LAYER (ESTRATO L3)
 * RESPONSABILIDAD: TRAZADO DETERMINISTA Y PURGA DEL ÁRBOL POR TAREA
 *
 * El árbol se particiona por tarea: ningún cerrojo de archivo es
 * necesario porque dos workers jamás comparten un subárbol. Los
 * ejecutables de etapa reciben sus rutas como argumentos.
 * =================================================================
 */

use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum WorkspaceError {
    #[error("[L3_WORKSPACE_FAULT]: IO_FAULT at {path} -> {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Áreas del subárbol de una tarea, en orden de producción.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkspaceArea {
    Assets,
    Composites,
    Videos,
    Audio,
    Sfx,
    Final,
}

impl WorkspaceArea {
    pub const ALL: [WorkspaceArea; 6] = [
        WorkspaceArea::Assets,
        WorkspaceArea::Composites,
        WorkspaceArea::Videos,
        WorkspaceArea::Audio,
        WorkspaceArea::Sfx,
        WorkspaceArea::Final,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            WorkspaceArea::Assets => "assets",
            WorkspaceArea::Composites => "composites",
            WorkspaceArea::Videos => "videos",
            WorkspaceArea::Audio => "audio",
            WorkspaceArea::Sfx => "sfx",
            WorkspaceArea::Final => "final",
        }
    }
}

/// Gestor del árbol de trabajo bajo la raíz configurada.
#[derive(Debug, Clone)]
pub struct WorkspaceManager {
    workspace_root: PathBuf,
}

impl WorkspaceManager {
    pub fn new(workspace_root: impl Into<PathBuf>) -> Self {
        Self {
            workspace_root: workspace_root.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.workspace_root
    }

    /// Ruta determinista del proyecto de una tarea.
    /// `<root>/channels/<channel_id>/projects/<task_id>`
    pub fn project_dir(&self, channel_id: Uuid, task_id: Uuid) -> PathBuf {
        self.workspace_root
            .join("channels")
            .join(channel_id.to_string())
            .join("projects")
            .join(task_id.to_string())
    }

    /// Ruta de un área concreta dentro del proyecto (sin materializar).
    pub fn area_dir(&self, channel_id: Uuid, task_id: Uuid, area: WorkspaceArea) -> PathBuf {
        self.project_dir(channel_id, task_id).join(area.as_str())
    }

    /**
     * Materializa perezosamente el área solicitada y devuelve su ruta.
     * Idempotente: un área ya existente no es un fallo.
     */
    pub async fn ensure_area(
        &self,
        channel_id: Uuid,
        task_id: Uuid,
        area: WorkspaceArea,
    ) -> Result<PathBuf, WorkspaceError> {
        let area_path = self.area_dir(channel_id, task_id, area);
        tokio::fs::create_dir_all(&area_path)
            .await
            .map_err(|source| WorkspaceError::Io {
                path: area_path.clone(),
                source,
            })?;
        debug!(
            task_id = %task_id,
            area = area.as_str(),
            "📂 [WORKSPACE]: Area strata materialized."
        );
        Ok(area_path)
    }

    /**
     * Purga el subárbol completo de la tarea tras la publicación.
     * Un proyecto inexistente no es un fallo (purga ya ejecutada).
     */
    pub async fn purge_project(&self, channel_id: Uuid, task_id: Uuid) -> Result<(), WorkspaceError> {
        let project_path = self.project_dir(channel_id, task_id);
        match tokio::fs::remove_dir_all(&project_path).await {
            Ok(()) => {
                info!(
                    task_id = %task_id,
                    channel_id = %channel_id,
                    "🧹 [WORKSPACE]: Project strata purged after publication."
                );
                Ok(())
            }
            Err(source) if source.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(WorkspaceError::Io {
                path: project_path,
                source,
            }),
        }
    }

    /// Verdadero si el proyecto conserva material en disco.
    pub async fn project_exists(&self, channel_id: Uuid, task_id: Uuid) -> bool {
        tokio::fs::try_exists(self.project_dir(channel_id, task_id))
            .await
            .unwrap_or(false)
    }
}
