//! Project and wallet data model
//!
//! A `Project` owns an ordered set of `WalletExport` entries. The canonical
//! key encoding is the base58 64-byte secret (private + public halves); every
//! other encoding is derived from it on demand. Legacy documents used
//! several alias keys for the secret and address; serde aliases collapse
//! them here so no consumer ever re-implements alias resolution.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use solana_sdk::signature::Keypair;
use solana_sdk::signer::Signer;
use uuid::Uuid;

use crate::error::{Error, Result};

/// Opaque short identifier for projects and wallets.
///
/// Never derived from key material: ids and addresses are two independent
/// exact lookup keys, not truncations of each other.
pub fn new_short_id() -> String {
    Uuid::new_v4().simple().to_string()[..8].to_string()
}

/// UTC timestamp with seconds precision, `2025-01-01T00:00:00Z` style
pub fn now_timestamp() -> String {
    Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

/// URL-safe slug derived from a project name
pub fn slugify(name: &str) -> String {
    let mut slug = String::new();
    let mut last_dash = true;
    for c in name.trim().to_lowercase().chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c);
            last_dash = false;
        } else if !last_dash {
            slug.push('-');
            last_dash = true;
        }
    }
    let slug = slug.trim_end_matches('-').to_string();
    if slug.is_empty() {
        "project".to_string()
    } else {
        slug
    }
}

/// One custodied keypair inside a project
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletExport {
    /// Stable identifier, assigned once at creation/import
    #[serde(default, alias = "wallet_id")]
    pub id: String,

    /// Base58 public key; always the public half of the stored secret
    #[serde(alias = "pubkey")]
    pub address: String,

    /// Canonical secret: base58 encoding of the raw 64-byte keypair
    #[serde(
        rename = "private_key_base58_64",
        alias = "private_key",
        alias = "secret"
    )]
    pub secret_base58: String,

    /// Optional human label; the only mutable field
    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub created_at: String,
}

impl WalletExport {
    /// Generate a fresh keypair wallet
    pub fn generate(name: Option<String>) -> Self {
        let keypair = Keypair::new();
        Self::from_keypair(&keypair, name)
    }

    fn from_keypair(keypair: &Keypair, name: Option<String>) -> Self {
        Self {
            id: new_short_id(),
            address: keypair.pubkey().to_string(),
            secret_base58: bs58::encode(keypair.to_bytes()).into_string(),
            name,
            created_at: now_timestamp(),
        }
    }

    /// Import one wallet from an external line.
    ///
    /// Accepted forms:
    /// - base58 64-byte secret
    /// - JSON array of 64 integers
    /// - `address;base58_secret` (address cross-checked against the secret)
    pub fn import(line: &str) -> Result<Self> {
        let s = line.trim();
        if s.is_empty() {
            return Err(Error::InvalidKeyMaterial("empty import line".to_string()));
        }

        let (declared_address, secret_part) = match s.split_once(';') {
            Some((addr, rest)) => (Some(addr.trim()), rest.trim()),
            None => (None, s),
        };

        let bytes = decode_secret_text(secret_part)?;
        let keypair = keypair_from_secret_bytes(&bytes)?;
        let wallet = Self::from_keypair(&keypair, None);

        // The address is always re-derived from the secret; a conflicting
        // declared address means corrupted input
        if let Some(addr) = declared_address {
            if addr != wallet.address {
                return Err(Error::InvalidKeyMaterial(format!(
                    "declared address {} does not match secret-derived {}",
                    addr, wallet.address
                )));
            }
        }
        Ok(wallet)
    }

    /// Raw 64-byte secret decoded from the canonical encoding
    pub fn secret_bytes(&self) -> Result<[u8; 64]> {
        let decoded = bs58::decode(&self.secret_base58)
            .into_vec()
            .map_err(|e| Error::InvalidKeyMaterial(format!("stored secret: {e}")))?;
        decoded
            .try_into()
            .map_err(|_| Error::InvalidKeyMaterial("stored secret is not 64 bytes".to_string()))
    }

    /// Secret as a 64-int JSON array (solana-cli keypair file format)
    pub fn secret_json(&self) -> Result<Vec<u8>> {
        Ok(self.secret_bytes()?.to_vec())
    }

    /// Signing keypair for this wallet
    pub fn keypair(&self) -> Result<Keypair> {
        keypair_from_secret_bytes(&self.secret_bytes()?)
    }

    /// Fill id and timestamp on records loaded from legacy documents.
    /// Returns true when anything changed.
    pub fn normalize(&mut self) -> bool {
        let mut changed = false;
        if self.id.is_empty() {
            self.id = new_short_id();
            changed = true;
        }
        if self.created_at.is_empty() {
            self.created_at = now_timestamp();
            changed = true;
        }
        changed
    }
}

/// Decode secret text: JSON 64-int array or base58 64-byte string
pub(crate) fn decode_secret_text(s: &str) -> Result<Vec<u8>> {
    if s.starts_with('[') {
        let ints: Vec<u8> = serde_json::from_str(s)
            .map_err(|e| Error::InvalidKeyMaterial(format!("byte array: {e}")))?;
        Ok(ints)
    } else {
        bs58::decode(s)
            .into_vec()
            .map_err(|e| Error::InvalidKeyMaterial(format!("base58: {e}")))
    }
}

/// Build a keypair from exactly 64 secret bytes
pub fn keypair_from_secret_bytes(bytes: &[u8]) -> Result<Keypair> {
    if bytes.len() != 64 {
        return Err(Error::InvalidKeyMaterial(format!(
            "expected 64 secret bytes, got {}",
            bytes.len()
        )));
    }
    Keypair::from_bytes(bytes).map_err(|e| Error::InvalidKeyMaterial(e.to_string()))
}

/// One custodied project: metadata plus its wallet set
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    /// Immutable after creation
    pub project_id: String,
    pub name: String,
    /// Derived from name; kept consistent with on-disk directory naming
    pub slug: String,
    pub created_at: String,
    #[serde(default)]
    pub wallets: Vec<WalletExport>,
}

impl Project {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            project_id: new_short_id(),
            slug: slugify(&name),
            name,
            created_at: now_timestamp(),
            wallets: Vec::new(),
        }
    }

    /// On-disk directory name: `{project_id}_{slug}`
    pub fn dir_name(&self) -> String {
        format!("{}_{}", self.project_id, self.slug)
    }

    /// Normalize legacy wallet records after load. Returns true when any
    /// record changed and the document should be re-persisted.
    pub fn normalize(&mut self) -> bool {
        let mut changed = false;
        for wallet in &mut self.wallets {
            changed |= wallet.normalize();
        }
        changed
    }

    /// Generate `n` fresh wallets, labelled `Wallet N` continuing from the
    /// current count
    pub fn generate_wallets(&mut self, n: usize) -> Vec<WalletExport> {
        let existing = self.wallets.len();
        let new_wallets: Vec<WalletExport> = (0..n)
            .map(|i| WalletExport::generate(Some(format!("Wallet {}", existing + i + 1))))
            .collect();
        self.wallets.extend(new_wallets.clone());
        new_wallets
    }

    /// Import wallets from external secret lines; blank lines are skipped
    pub fn import_wallets(&mut self, lines: &[String]) -> Result<Vec<WalletExport>> {
        let mut imported = Vec::new();
        for line in lines {
            if line.trim().is_empty() {
                continue;
            }
            imported.push(WalletExport::import(line)?);
        }
        self.wallets.extend(imported.clone());
        Ok(imported)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("My Meme Project"), "my-meme-project");
        assert_eq!(slugify("  Rug/Pull 2 !"), "rug-pull-2");
        assert_eq!(slugify("???"), "project");
    }

    #[test]
    fn test_generated_wallet_roundtrips_its_secret() {
        let wallet = WalletExport::generate(Some("Wallet 1".to_string()));
        let keypair = wallet.keypair().unwrap();
        assert_eq!(keypair.pubkey().to_string(), wallet.address);
        assert_eq!(wallet.secret_bytes().unwrap().len(), 64);
        assert_eq!(wallet.id.len(), 8);
    }

    #[test]
    fn test_import_base58_and_json_agree() {
        let source = WalletExport::generate(None);
        let b58_line = source.secret_base58.clone();
        let json_line = serde_json::to_string(&source.secret_json().unwrap()).unwrap();

        let from_b58 = WalletExport::import(&b58_line).unwrap();
        let from_json = WalletExport::import(&json_line).unwrap();

        // Same secret, same derived public key, same signatures
        assert_eq!(from_b58.address, source.address);
        assert_eq!(from_json.address, source.address);
        let msg = b"probe";
        assert_eq!(
            from_b58.keypair().unwrap().sign_message(msg),
            from_json.keypair().unwrap().sign_message(msg)
        );
        // Fresh ids per import, never reused
        assert_ne!(from_b58.id, source.id);
    }

    #[test]
    fn test_import_rejects_mismatched_declared_address() {
        let a = WalletExport::generate(None);
        let b = WalletExport::generate(None);
        let line = format!("{};{}", b.address, a.secret_base58);
        assert!(matches!(
            WalletExport::import(&line),
            Err(Error::InvalidKeyMaterial(_))
        ));
    }

    #[test]
    fn test_import_rejects_wrong_length() {
        assert!(WalletExport::import("[1,2,3]").is_err());
        assert!(WalletExport::import("notbase58!!!").is_err());
    }

    #[test]
    fn test_legacy_aliases_normalize_to_canonical_shape() {
        let source = WalletExport::generate(None);
        let legacy = format!(
            r#"{{"pubkey": "{}", "secret": "{}"}}"#,
            source.address, source.secret_base58
        );
        let mut wallet: WalletExport = serde_json::from_str(&legacy).unwrap();
        assert!(wallet.normalize());
        assert_eq!(wallet.address, source.address);
        assert_eq!(wallet.secret_base58, source.secret_base58);
        assert_eq!(wallet.id.len(), 8);
        // The assigned id is not an address truncation
        assert_ne!(wallet.id, &wallet.address[..8.min(wallet.address.len())]);
    }

    #[test]
    fn test_generate_wallets_labels_continue() {
        let mut project = Project::new("Test");
        project.generate_wallets(2);
        let more = project.generate_wallets(1);
        assert_eq!(more[0].name.as_deref(), Some("Wallet 3"));
        assert_eq!(project.wallets.len(), 3);
    }
}
