//! Exact-match wallet resolution
//!
//! An identifier matches a wallet only when it equals, character for
//! character, the wallet's stable `id` or its full base58 `address`. Prefix,
//! suffix, and substring matches are forbidden: truncated matching would let
//! an operation aimed at one wallet land on another that happens to share a
//! short prefix.

use std::path::PathBuf;

use tracing::debug;

use crate::error::{Error, Result};
use crate::model::{Project, WalletExport};
use crate::store::ProjectStore;

/// A wallet located in durable storage
#[derive(Debug, Clone)]
pub struct ResolvedWallet {
    pub project: Project,
    pub wallet: WalletExport,
    pub project_dir: PathBuf,
}

/// Resolves opaque wallet identifiers against the store
pub struct WalletResolver<'a> {
    store: &'a ProjectStore,
}

impl<'a> WalletResolver<'a> {
    pub fn new(store: &'a ProjectStore) -> Self {
        Self { store }
    }

    /// Look up a wallet by exact id or exact address, optionally scoped to
    /// one project. Returns `Ok(None)` when nothing in scope matches.
    pub fn resolve(
        &self,
        identifier: &str,
        project_scope: Option<&str>,
    ) -> Result<Option<ResolvedWallet>> {
        let candidates: Vec<(Project, PathBuf)> = match project_scope {
            Some(project_id) => {
                let dir = self
                    .store
                    .find_project_dir(project_id)?
                    .ok_or_else(|| Error::ProjectNotFound(project_id.to_string()))?;
                vec![(ProjectStore::load_project_dir(&dir)?, dir)]
            }
            None => self.store.load_all()?,
        };

        for (project, dir) in candidates {
            if let Some(wallet) = project
                .wallets
                .iter()
                .find(|w| w.id == identifier || w.address == identifier)
            {
                debug!(
                    "Resolved wallet {} in project {}",
                    wallet.id, project.project_id
                );
                let wallet = wallet.clone();
                return Ok(Some(ResolvedWallet {
                    wallet,
                    project,
                    project_dir: dir,
                }));
            }
        }
        Ok(None)
    }

    /// Like `resolve`, but a missing wallet is an error
    pub fn require(
        &self,
        identifier: &str,
        project_scope: Option<&str>,
    ) -> Result<ResolvedWallet> {
        self.resolve(identifier, project_scope)?
            .ok_or_else(|| Error::WalletNotFound(identifier.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn fixture() -> (tempfile::TempDir, ProjectStore, Project, Project) {
        let dir = tempdir().unwrap();
        let store = ProjectStore::new(dir.path()).unwrap();
        let mut a = store.create_project("Alpha").unwrap();
        a.generate_wallets(2);
        store.save_project(&a).unwrap();
        let mut b = store.create_project("Beta").unwrap();
        b.generate_wallets(1);
        store.save_project(&b).unwrap();
        (dir, store, a, b)
    }

    #[test]
    fn test_resolves_by_id_and_by_address() {
        let (_dir, store, a, _b) = fixture();
        let resolver = WalletResolver::new(&store);
        let target = &a.wallets[1];

        let by_id = resolver.resolve(&target.id, None).unwrap().unwrap();
        assert_eq!(by_id.wallet.address, target.address);
        assert_eq!(by_id.project.project_id, a.project_id);

        let by_addr = resolver.resolve(&target.address, None).unwrap().unwrap();
        assert_eq!(by_addr.wallet.id, target.id);
    }

    #[test]
    fn test_never_matches_prefix_or_suffix() {
        let (_dir, store, a, _b) = fixture();
        let resolver = WalletResolver::new(&store);
        let target = &a.wallets[0];

        let addr_prefix = &target.address[..target.address.len() - 1];
        let addr_suffix = &target.address[1..];
        let id_prefix = &target.id[..target.id.len() - 1];

        assert!(resolver.resolve(addr_prefix, None).unwrap().is_none());
        assert!(resolver.resolve(addr_suffix, None).unwrap().is_none());
        assert!(resolver.resolve(id_prefix, None).unwrap().is_none());
    }

    #[test]
    fn test_scope_limits_the_search() {
        let (_dir, store, a, b) = fixture();
        let resolver = WalletResolver::new(&store);
        let target = &b.wallets[0];

        // In scope
        assert!(resolver
            .resolve(&target.id, Some(&b.project_id))
            .unwrap()
            .is_some());
        // Out of scope
        assert!(resolver
            .resolve(&target.id, Some(&a.project_id))
            .unwrap()
            .is_none());
        // Unknown scope is an error, not a silent miss
        assert!(matches!(
            resolver.resolve(&target.id, Some("nope1234")),
            Err(Error::ProjectNotFound(_))
        ));
    }

    #[test]
    fn test_require_reports_wallet_not_found() {
        let (_dir, store, _a, _b) = fixture();
        let resolver = WalletResolver::new(&store);
        assert!(matches!(
            resolver.require("doesnotexist", None),
            Err(Error::WalletNotFound(_))
        ));
    }
}
