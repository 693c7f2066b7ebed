//! Project store - durable project and wallet state
//!
//! One directory per project named `{project_id}_{slug}` holding
//! `project.json` (full state) and `wallets.json` (wallet-list mirror).
//! Every load→modify→persist sequence runs under a per-project-id mutex so
//! concurrent mutators of the same project cannot lose updates.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::model::{Project, WalletExport};

use super::backups::{backup_project, backup_wallet, move_to_trash};
use super::fileio::{atomic_write_json, ensure_dir, read_json};

/// Mirror document written next to project.json
#[derive(Debug, Serialize, Deserialize)]
struct WalletsDoc {
    wallets: Vec<WalletExport>,
}

/// File-backed store rooted at one data directory
pub struct ProjectStore {
    data_dir: PathBuf,
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl ProjectStore {
    pub fn new(data_dir: impl Into<PathBuf>) -> Result<Self> {
        let data_dir = data_dir.into();
        ensure_dir(&data_dir)?;
        Ok(Self {
            data_dir,
            locks: DashMap::new(),
        })
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    fn backups_dir(&self) -> PathBuf {
        self.data_dir.join("backups")
    }

    /// Single-writer serialization per project id
    fn lock_for(&self, project_id: &str) -> Arc<Mutex<()>> {
        self.locks
            .entry(project_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Create a new project and persist it eagerly
    pub fn create_project(&self, name: &str) -> Result<Project> {
        let project = Project::new(name);
        self.save_project(&project)?;
        info!(
            "Created project {} ({})",
            project.project_id, project.slug
        );
        Ok(project)
    }

    /// All project directories under the data dir (trash and backups excluded)
    pub fn project_dirs(&self) -> Result<Vec<PathBuf>> {
        let mut dirs = Vec::new();
        let entries = match std::fs::read_dir(&self.data_dir) {
            Ok(entries) => entries,
            Err(e) => return Err(Error::Io(format!("list {}: {e}", self.data_dir.display()))),
        };
        for entry in entries.flatten() {
            let path = entry.path();
            let name = entry.file_name().to_string_lossy().to_string();
            if path.is_dir() && !name.starts_with('.') && name != "backups" {
                dirs.push(path);
            }
        }
        dirs.sort();
        Ok(dirs)
    }

    /// Find a project directory by exact project id (directory name prefix
    /// before the first underscore)
    pub fn find_project_dir(&self, project_id: &str) -> Result<Option<PathBuf>> {
        for dir in self.project_dirs()? {
            let name = dir.file_name().map(|n| n.to_string_lossy().to_string());
            if let Some(name) = name {
                if name.split('_').next() == Some(project_id) {
                    return Ok(Some(dir));
                }
            }
        }
        Ok(None)
    }

    /// Load one project from its directory, normalizing legacy records
    pub fn load_project_dir(dir: &Path) -> Result<Project> {
        let mut project: Project = read_json(&dir.join("project.json"))?;
        if project.normalize() {
            debug!(
                "Normalized legacy wallet records in project {}",
                project.project_id
            );
        }
        Ok(project)
    }

    /// Load a project by id
    pub fn load_project(&self, project_id: &str) -> Result<Project> {
        let dir = self
            .find_project_dir(project_id)?
            .ok_or_else(|| Error::ProjectNotFound(project_id.to_string()))?;
        Self::load_project_dir(&dir)
    }

    /// Load every readable project with its directory; unreadable ones are
    /// skipped with a warning
    pub fn load_all(&self) -> Result<Vec<(Project, PathBuf)>> {
        let mut projects = Vec::new();
        for dir in self.project_dirs()? {
            match Self::load_project_dir(&dir) {
                Ok(project) => projects.push((project, dir)),
                Err(e) => warn!("Skipping unreadable project dir {}: {}", dir.display(), e),
            }
        }
        Ok(projects)
    }

    /// Persist full state plus the wallets.json mirror, both atomically
    pub fn save_project(&self, project: &Project) -> Result<PathBuf> {
        let dir = self.data_dir.join(project.dir_name());
        ensure_dir(&dir)?;
        atomic_write_json(&dir.join("project.json"), project)?;
        atomic_write_json(
            &dir.join("wallets.json"),
            &WalletsDoc {
                wallets: project.wallets.clone(),
            },
        )?;
        debug!("Saved project {}", project.project_id);
        Ok(dir)
    }

    /// Run one load→modify→persist sequence under the project's lock
    pub fn with_project<T>(
        &self,
        project_id: &str,
        f: impl FnOnce(&mut Project) -> Result<T>,
    ) -> Result<T> {
        let lock = self.lock_for(project_id);
        let _guard = lock.lock().unwrap_or_else(|e| e.into_inner());

        let mut project = self.load_project(project_id)?;
        let out = f(&mut project)?;
        self.save_project(&project)?;
        Ok(out)
    }

    /// Remove one wallet (exact id or address match) from a project.
    ///
    /// A backup document is written first; if that write fails the wallet
    /// stays untouched.
    pub fn remove_wallet(&self, project_id: &str, identifier: &str) -> Result<WalletExport> {
        let backups_dir = self.backups_dir();
        self.with_project(project_id, |project| {
            let idx = project
                .wallets
                .iter()
                .position(|w| w.id == identifier || w.address == identifier)
                .ok_or_else(|| Error::WalletNotFound(identifier.to_string()))?;

            backup_wallet(project, &project.wallets[idx], &backups_dir)?;
            let removed = project.wallets.remove(idx);
            info!(
                "Removed wallet {} from project {}",
                removed.id, project.project_id
            );
            Ok(removed)
        })
    }

    /// Delete a whole project: backup first, then rename into `.trash`
    pub fn delete_project(&self, project_id: &str) -> Result<PathBuf> {
        let lock = self.lock_for(project_id);
        let _guard = lock.lock().unwrap_or_else(|e| e.into_inner());

        let dir = self
            .find_project_dir(project_id)?
            .ok_or_else(|| Error::ProjectNotFound(project_id.to_string()))?;
        let project = Self::load_project_dir(&dir)?;

        backup_project(&project, &self.backups_dir())?;
        let trashed = move_to_trash(&dir, &self.data_dir)?;
        info!("Deleted project {} -> {}", project_id, trashed.display());
        Ok(trashed)
    }
}
