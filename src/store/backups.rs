//! Pre-destruction backups and trash
//!
//! Every destructive operation writes a timestamped backup document,
//! including recoverable key material, before the live state is touched. If
//! the backup write fails the destructive operation must abort. Project
//! deletion renames the directory into `.trash` so recovery stays possible.

use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{Error, Result};
use crate::model::{Project, WalletExport};

use super::fileio::{atomic_write_json, ensure_dir};

fn timestamp() -> String {
    Utc::now().format("%Y%m%d_%H%M%S").to_string()
}

/// Project identity carried in every backup document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectRef {
    pub project_id: String,
    pub name: String,
    pub slug: String,
}

impl From<&Project> for ProjectRef {
    fn from(p: &Project) -> Self {
        Self {
            project_id: p.project_id.clone(),
            name: p.name.clone(),
            slug: p.slug.clone(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct WalletBackup {
    #[serde(rename = "type")]
    pub kind: String,
    pub timestamp: String,
    pub project: ProjectRef,
    pub wallet: WalletExport,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ProjectBackup {
    #[serde(rename = "type")]
    pub kind: String,
    pub timestamp: String,
    pub project: ProjectRef,
    pub wallets: Vec<WalletExport>,
}

/// Write a single-wallet backup to `backups/wallets/{ts}_{slug}_{id}.json`
pub fn backup_wallet(
    project: &Project,
    wallet: &WalletExport,
    backups_dir: &Path,
) -> Result<PathBuf> {
    let ts = timestamp();
    let path = backups_dir
        .join("wallets")
        .join(format!("{}_{}_{}.json", ts, project.slug, wallet.id));

    let payload = WalletBackup {
        kind: "wallet_backup".to_string(),
        timestamp: ts,
        project: ProjectRef::from(project),
        wallet: wallet.clone(),
    };
    atomic_write_json(&path, &payload).map_err(|e| Error::BackupFailed(e.to_string()))?;
    info!("Wallet backup written: {}", path.display());
    Ok(path)
}

/// Write a whole-project backup to `backups/projects/{ts}_{slug}_{id}.json`
pub fn backup_project(project: &Project, backups_dir: &Path) -> Result<PathBuf> {
    let ts = timestamp();
    let path = backups_dir
        .join("projects")
        .join(format!("{}_{}_{}.json", ts, project.slug, project.project_id));

    let payload = ProjectBackup {
        kind: "project_backup".to_string(),
        timestamp: ts,
        project: ProjectRef::from(project),
        wallets: project.wallets.clone(),
    };
    atomic_write_json(&path, &payload).map_err(|e| Error::BackupFailed(e.to_string()))?;
    info!("Project backup written: {}", path.display());
    Ok(path)
}

/// Move a project directory into `.trash`, suffixing `-N` on collisions.
/// Rename, not unlink: trashed projects remain recoverable.
pub fn move_to_trash(project_dir: &Path, data_dir: &Path) -> Result<PathBuf> {
    let trash = data_dir.join(".trash");
    ensure_dir(&trash)?;

    let base_name = project_dir
        .file_name()
        .ok_or_else(|| Error::Io(format!("bad project dir: {}", project_dir.display())))?
        .to_string_lossy()
        .to_string();

    let mut target = trash.join(&base_name);
    let mut i = 1;
    while target.exists() {
        target = trash.join(format!("{base_name}-{i}"));
        i += 1;
    }

    std::fs::rename(project_dir, &target)
        .map_err(|e| Error::Io(format!("trash {}: {e}", project_dir.display())))?;
    info!("Project moved to trash: {}", target.display());
    Ok(target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::fileio::read_json;
    use tempfile::tempdir;

    #[test]
    fn test_wallet_backup_contains_recoverable_key_material() {
        let dir = tempdir().unwrap();
        let mut project = Project::new("Backup Test");
        project.generate_wallets(1);
        let wallet = project.wallets[0].clone();

        let path = backup_wallet(&project, &wallet, dir.path()).unwrap();
        assert!(path.starts_with(dir.path().join("wallets")));

        let restored: WalletBackup = read_json(&path).unwrap();
        assert_eq!(restored.kind, "wallet_backup");
        assert_eq!(restored.wallet.secret_base58, wallet.secret_base58);
        assert_eq!(restored.wallet.address, wallet.address);
        // Keypair can be rebuilt from the backup alone
        restored.wallet.keypair().unwrap();
    }

    #[test]
    fn test_project_backup_covers_all_wallets() {
        let dir = tempdir().unwrap();
        let mut project = Project::new("Backup Test");
        project.generate_wallets(3);

        let path = backup_project(&project, dir.path()).unwrap();
        let restored: ProjectBackup = read_json(&path).unwrap();
        assert_eq!(restored.wallets.len(), 3);
        assert_eq!(restored.project.project_id, project.project_id);
    }

    #[test]
    fn test_trash_rename_keeps_content_and_avoids_collisions() {
        let data = tempdir().unwrap();
        for expected in ["p1_test", "p1_test-1", "p1_test-2"] {
            let pdir = data.path().join("p1_test");
            std::fs::create_dir_all(&pdir).unwrap();
            std::fs::write(pdir.join("project.json"), "{}").unwrap();

            let target = move_to_trash(&pdir, data.path()).unwrap();
            assert_eq!(target, data.path().join(".trash").join(expected));
            assert!(target.join("project.json").exists());
            assert!(!pdir.exists());
        }
    }
}
