//! Single-transfer preflight and broadcast
//!
//! Builds, preflights, signs, and sends one SOL transfer. Every failure
//! before broadcast (key decoding, address validity, self-transfer,
//! insufficient funds) is synchronous and side-effect-free; once a signature
//! comes back from the node, confirmation is best effort only.

use std::path::Path;
use std::str::FromStr;
use std::sync::{Arc, Mutex};

use dashmap::DashMap;
use serde::Deserialize;
use solana_sdk::message::Message;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::{Keypair, Signature};
use solana_sdk::signer::Signer;
use solana_sdk::system_instruction;
use solana_sdk::transaction::Transaction;
use tracing::{debug, info};

use crate::amount::{lamports_to_sol, sol_to_lamports};
use crate::error::{Error, Result};
use crate::model::{decode_secret_text, keypair_from_secret_bytes};
use crate::rpc::LedgerClient;

/// Fixed fee estimate when the node cannot quote one
pub const FALLBACK_FEE_LAMPORTS: u64 = 5_000;

/// Extra lamports required beyond amount + fee, so a transfer never drains
/// an account to exactly zero
pub const SAFETY_MARGIN_LAMPORTS: u64 = 5_000;

/// Rent-exempt minimum for a plain SOL transfer (no account data)
pub const RENT_EXEMPT_MIN_LAMPORTS: u64 = 0;

/// Sender secret in any accepted form: base58 64-byte string, 64-element
/// byte array, or a path to a JSON keypair file
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum SecretInput {
    Text(String),
    Bytes(Vec<u8>),
}

impl From<&str> for SecretInput {
    fn from(s: &str) -> Self {
        SecretInput::Text(s.to_string())
    }
}

/// Decode a sender secret into a signing keypair
pub fn keypair_from_any(input: &SecretInput) -> Result<Keypair> {
    match input {
        SecretInput::Bytes(bytes) => keypair_from_secret_bytes(bytes),
        SecretInput::Text(text) => {
            let s = text.trim();
            if Path::new(s).is_file() {
                let content = std::fs::read_to_string(s)
                    .map_err(|e| Error::InvalidKeyMaterial(format!("keypair file {s}: {e}")))?;
                let bytes: Vec<u8> = serde_json::from_str(content.trim())
                    .map_err(|e| Error::InvalidKeyMaterial(format!("keypair file {s}: {e}")))?;
                keypair_from_secret_bytes(&bytes)
            } else {
                keypair_from_secret_bytes(&decode_secret_text(s)?)
            }
        }
    }
}

/// Lamports the sender must hold for a transfer to go out
fn required_lamports(amount: u64, fee: u64) -> Result<u64> {
    amount
        .checked_add(fee)
        .and_then(|v| v.checked_add(RENT_EXEMPT_MIN_LAMPORTS))
        .and_then(|v| v.checked_add(SAFETY_MARGIN_LAMPORTS))
        .ok_or_else(|| Error::InvalidAmount("amount overflows lamports".to_string()))
}

/// Builds, preflights, and broadcasts single transfers
pub struct TransferEngine {
    rpc: LedgerClient,
    /// One signing operation per wallet at a time: overlapping sends would
    /// race the same blockhash window and can double-spend
    signing_locks: DashMap<String, Arc<Mutex<()>>>,
}

impl TransferEngine {
    pub fn new(rpc: LedgerClient) -> Self {
        Self {
            rpc,
            signing_locks: DashMap::new(),
        }
    }

    pub fn rpc(&self) -> &LedgerClient {
        &self.rpc
    }

    /// Balance of a base58 address, in lamports
    pub fn balance_lamports(&self, address: &str) -> Result<u64> {
        let pubkey =
            Pubkey::from_str(address).map_err(|e| Error::InvalidAddress(format!("{address}: {e}")))?;
        self.rpc.balance(&pubkey)
    }

    /// Balance in SOL, display precision only
    pub fn balance_sol(&self, address: &str) -> Result<f64> {
        Ok(lamports_to_sol(self.balance_lamports(address)?))
    }

    /// Transfer a decimal SOL amount from a caller-supplied secret
    pub fn transfer(
        &self,
        sender_secret: &SecretInput,
        recipient: &str,
        amount_sol: &str,
    ) -> Result<Signature> {
        let sender = keypair_from_any(sender_secret)?;
        let to = Pubkey::from_str(recipient)
            .map_err(|e| Error::InvalidAddress(format!("{recipient}: {e}")))?;
        // Self-transfer is rejected before the amount is even parsed
        if sender.pubkey() == to {
            return Err(Error::SelfTransferRejected);
        }
        let lamports = sol_to_lamports(amount_sol)?;
        self.transfer_lamports(&sender, &to, lamports)
    }

    /// Transfer an exact lamport amount with a ready keypair
    pub fn transfer_lamports(
        &self,
        sender: &Keypair,
        recipient: &Pubkey,
        lamports: u64,
    ) -> Result<Signature> {
        let from = sender.pubkey();
        if from == *recipient {
            return Err(Error::SelfTransferRejected);
        }
        if lamports == 0 {
            return Err(Error::InvalidAmount("amount must be > 0".to_string()));
        }

        let lock = self.signing_lock(&from);
        let _guard = lock.lock().unwrap_or_else(|e| e.into_inner());

        let balance = self.rpc.balance(&from)?;
        let fee = self.estimate_fee(&from, recipient, lamports);
        let required = required_lamports(lamports, fee)?;
        if balance < required {
            return Err(Error::InsufficientFunds {
                available_sol: lamports_to_sol(balance),
                required_sol: lamports_to_sol(required),
                fee_sol: lamports_to_sol(fee),
            });
        }

        // Blockhashes expire fast; fetch right before signing
        let blockhash = self
            .rpc
            .latest_blockhash()
            .map_err(|e| Error::TransactionBuild(format!("blockhash: {e}")))?;
        let instruction = system_instruction::transfer(&from, recipient, lamports);
        let transaction = Transaction::new_signed_with_payer(
            &[instruction],
            Some(&from),
            &[sender],
            blockhash,
        );

        let signature = self.rpc.send_transaction(&transaction)?;
        info!(
            "Transfer sent: {} lamports {} -> {} (sig: {})",
            lamports, from, recipient, signature
        );

        // The signature above is already valid; confirmation may lag or fail
        self.rpc.confirm_best_effort(&signature);
        Ok(signature)
    }

    /// Estimated network fee for a skeleton transfer, with a fixed fallback
    fn estimate_fee(&self, from: &Pubkey, to: &Pubkey, lamports: u64) -> u64 {
        let probe = system_instruction::transfer(from, to, lamports.clamp(1, 1_000));
        let quoted = self
            .rpc
            .latest_blockhash()
            .and_then(|blockhash| {
                let message = Message::new_with_blockhash(&[probe], Some(from), &blockhash);
                self.rpc.fee_for_message(&message)
            });
        match quoted {
            Ok(fee) => fee,
            Err(e) => {
                debug!(
                    "Fee estimation failed ({}), using fallback {} lamports",
                    e, FALLBACK_FEE_LAMPORTS
                );
                FALLBACK_FEE_LAMPORTS
            }
        }
    }

    fn signing_lock(&self, address: &Pubkey) -> Arc<Mutex<()>> {
        self.signing_locks
            .entry(address.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::WalletExport;
    use crate::rpc::RetryPolicy;
    use std::io::Write;
    use std::time::Duration;

    fn offline_engine() -> TransferEngine {
        // Unroutable endpoint: only preflight paths may be exercised
        TransferEngine::new(LedgerClient::new(
            "http://127.0.0.1:1",
            Duration::from_millis(100),
            RetryPolicy {
                max_attempts: 1,
                base_delay: Duration::from_millis(1),
                max_delay: Duration::from_millis(1),
            },
        ))
    }

    #[test]
    fn test_all_secret_encodings_yield_the_same_signer() {
        let wallet = WalletExport::generate(None);
        let bytes = wallet.secret_bytes().unwrap().to_vec();

        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{}", serde_json::to_string(&bytes).unwrap()).unwrap();

        let from_b58 = keypair_from_any(&SecretInput::Text(wallet.secret_base58.clone())).unwrap();
        let from_array = keypair_from_any(&SecretInput::Bytes(bytes.clone())).unwrap();
        let from_json_text =
            keypair_from_any(&SecretInput::Text(serde_json::to_string(&bytes).unwrap())).unwrap();
        let from_file = keypair_from_any(&SecretInput::Text(
            file.path().to_string_lossy().to_string(),
        ))
        .unwrap();

        let msg = b"identical signatures";
        let expected = from_b58.sign_message(msg);
        for kp in [&from_array, &from_json_text, &from_file] {
            assert_eq!(kp.pubkey(), from_b58.pubkey());
            assert_eq!(kp.sign_message(msg), expected);
        }
    }

    #[test]
    fn test_invalid_key_material_is_rejected() {
        assert!(matches!(
            keypair_from_any(&SecretInput::Bytes(vec![1; 32])),
            Err(Error::InvalidKeyMaterial(_))
        ));
        assert!(matches!(
            keypair_from_any(&"not-valid-base58-!!!".into()),
            Err(Error::InvalidKeyMaterial(_))
        ));
        assert!(matches!(
            keypair_from_any(&"[1,2,3]".into()),
            Err(Error::InvalidKeyMaterial(_))
        ));
    }

    #[test]
    fn test_secret_input_deserializes_untagged() {
        let text: SecretInput = serde_json::from_str(r#""abc""#).unwrap();
        assert!(matches!(text, SecretInput::Text(_)));
        let bytes: SecretInput = serde_json::from_str("[1,2,3]").unwrap();
        assert!(matches!(bytes, SecretInput::Bytes(_)));
    }

    #[test]
    fn test_self_transfer_rejected_before_any_network_call() {
        let engine = offline_engine();
        let wallet = WalletExport::generate(None);
        let keypair = wallet.keypair().unwrap();
        let self_addr = keypair.pubkey();

        let start = std::time::Instant::now();
        let result = engine.transfer_lamports(&keypair, &self_addr, 1_000);
        assert!(matches!(result, Err(Error::SelfTransferRejected)));
        // No connection attempt against the dead endpoint
        assert!(start.elapsed() < Duration::from_millis(50));
    }

    #[test]
    fn test_self_transfer_rejected_before_amount_parsing() {
        let engine = offline_engine();
        let wallet = WalletExport::generate(None);
        // Amount is invalid too; the self-transfer rejection must win
        let result = engine.transfer(
            &SecretInput::Text(wallet.secret_base58.clone()),
            &wallet.address,
            "0",
        );
        assert!(matches!(result, Err(Error::SelfTransferRejected)));
    }

    #[test]
    fn test_transfer_validates_inputs_before_touching_the_node() {
        let engine = offline_engine();
        let wallet = WalletExport::generate(None);
        let other = WalletExport::generate(None);

        assert!(matches!(
            engine.transfer(&"bogus".into(), &other.address, "0.1"),
            Err(Error::InvalidKeyMaterial(_))
        ));
        assert!(matches!(
            engine.transfer(
                &SecretInput::Text(wallet.secret_base58.clone()),
                "not-an-address",
                "0.1"
            ),
            Err(Error::InvalidAddress(_))
        ));
        assert!(matches!(
            engine.transfer(
                &SecretInput::Text(wallet.secret_base58.clone()),
                &other.address,
                "0"
            ),
            Err(Error::InvalidAmount(_))
        ));
    }

    #[test]
    fn test_required_lamports_includes_fee_and_margin() {
        let required = required_lamports(1_000_000, 5_000).unwrap();
        assert_eq!(
            required,
            1_000_000 + 5_000 + RENT_EXEMPT_MIN_LAMPORTS + SAFETY_MARGIN_LAMPORTS
        );
        assert!(required_lamports(u64::MAX, 1).is_err());
    }
}
