//! Blocking ledger-node client
//!
//! Thin wrapper over the blocking `RpcClient` with fixed timeouts, confirmed
//! commitment, node-error classification, and one shared bounded
//! retry-with-backoff primitive used everywhere the engine talks to a node.

use std::time::Duration;

use backoff::ExponentialBackoff;
use lazy_static::lazy_static;
use regex::Regex;
use solana_client::client_error::{ClientError, ClientErrorKind};
use solana_client::rpc_client::RpcClient;
use solana_client::rpc_request::RpcError;
use solana_sdk::commitment_config::CommitmentConfig;
use solana_sdk::hash::Hash;
use solana_sdk::message::Message;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use solana_sdk::transaction::Transaction;
use tracing::{debug, warn};

use crate::error::{Error, Result};

lazy_static! {
    static ref RATE_LIMIT_RE: Regex = Regex::new(r"(?i)rate|limit|too many").unwrap();
}

/// JSON-RPC code some nodes return when the faucet or endpoint throttles
const RATE_LIMIT_RPC_CODE: i64 = -32005;

/// Bounded retry policy shared by all node-facing call sites
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(4),
        }
    }
}

impl RetryPolicy {
    fn to_backoff(&self) -> ExponentialBackoff {
        // max_elapsed_time is a secondary wall-clock ceiling; the attempt
        // count itself is enforced in with_retry.
        let ceiling = self.max_delay * self.max_attempts.max(1);
        ExponentialBackoff {
            initial_interval: self.base_delay,
            max_interval: self.max_delay,
            max_elapsed_time: Some(ceiling),
            ..Default::default()
        }
    }
}

/// Run `op` under the retry policy. Only transient node errors
/// (`Error::is_retryable`) are retried; everything else surfaces
/// immediately. At most `max_attempts` calls are made, whatever the
/// backoff schedule allows.
pub fn with_retry<T>(policy: &RetryPolicy, mut op: impl FnMut() -> Result<T>) -> Result<T> {
    let max_attempts = policy.max_attempts.max(1);
    let mut attempts: u32 = 0;
    let result = backoff::retry(policy.to_backoff(), || {
        attempts += 1;
        match op() {
            Ok(v) => Ok(v),
            Err(e) if e.is_retryable() && attempts < max_attempts => {
                warn!("Retryable RPC error (attempt {}): {}", attempts, e);
                Err(backoff::Error::transient(e))
            }
            Err(e) => Err(backoff::Error::permanent(e)),
        }
    });

    result.map_err(|e| match e {
        backoff::Error::Permanent(err) => err,
        backoff::Error::Transient { err, .. } => err,
    })
}

/// Classify a solana-client error into the engine taxonomy
pub fn classify_client_error(e: &ClientError) -> Error {
    match &e.kind {
        ClientErrorKind::RpcError(RpcError::RpcResponseError { code, message, .. }) => {
            if is_rate_limited(message, Some(*code)) {
                Error::RateLimited(message.clone())
            } else {
                Error::Rpc(format!("node error {code}: {message}"))
            }
        }
        ClientErrorKind::RpcError(rpc_err) => Error::Rpc(rpc_err.to_string()),
        ClientErrorKind::Io(io_err) => Error::RpcUnavailable(io_err.to_string()),
        ClientErrorKind::Reqwest(req_err) if req_err.is_timeout() => {
            Error::RpcTimeout(req_err.to_string())
        }
        ClientErrorKind::Reqwest(req_err) if req_err.is_connect() => {
            Error::RpcUnavailable(req_err.to_string())
        }
        _ => Error::Rpc(e.to_string()),
    }
}

/// Throttling heuristic over node error text and JSON-RPC code
pub fn is_rate_limited(message: &str, code: Option<i64>) -> bool {
    RATE_LIMIT_RE.is_match(message) || code == Some(RATE_LIMIT_RPC_CODE)
}

/// Blocking client bound to one resolved endpoint
pub struct LedgerClient {
    client: RpcClient,
    url: String,
    retry: RetryPolicy,
}

impl LedgerClient {
    /// Create a client with a fixed request timeout and confirmed commitment
    pub fn new(url: impl Into<String>, timeout: Duration, retry: RetryPolicy) -> Self {
        let url = url.into();
        let client = RpcClient::new_with_timeout_and_commitment(
            url.clone(),
            timeout,
            CommitmentConfig::confirmed(),
        );
        Self { client, url, retry }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Balance in lamports, retried on transient node failure
    pub fn balance(&self, address: &Pubkey) -> Result<u64> {
        with_retry(&self.retry, || {
            self.client.get_balance(address).map_err(Error::from)
        })
    }

    /// Balance read without retries, for tight polling loops that manage
    /// their own deadline
    pub fn balance_once(&self, address: &Pubkey) -> Result<u64> {
        self.client.get_balance(address).map_err(Error::from)
    }

    pub fn latest_blockhash(&self) -> Result<Hash> {
        with_retry(&self.retry, || {
            self.client.get_latest_blockhash().map_err(Error::from)
        })
    }

    /// Fee for a compiled message. Errors surface to the caller, which is
    /// expected to fall back to a fixed estimate.
    pub fn fee_for_message(&self, message: &Message) -> Result<u64> {
        self.client.get_fee_for_message(message).map_err(Error::from)
    }

    /// Single faucet request; no retries here, the airdrop state machine
    /// owns its own attempt schedule
    pub fn request_airdrop(&self, address: &Pubkey, lamports: u64) -> Result<Signature> {
        self.client
            .request_airdrop(address, lamports)
            .map_err(Error::from)
    }

    /// Broadcast a signed transaction (preflight enabled, no confirmation)
    pub fn send_transaction(&self, transaction: &Transaction) -> Result<Signature> {
        self.client.send_transaction(transaction).map_err(|e| {
            let classified = classify_client_error(&e);
            match classified {
                Error::RateLimited(_) => classified,
                other => Error::TransactionSend(other.to_string()),
            }
        })
    }

    /// Best-effort confirmation. A failure here never invalidates a
    /// signature that was already returned by the node.
    pub fn confirm_best_effort(&self, signature: &Signature) {
        match self.client.confirm_transaction(signature) {
            Ok(confirmed) => debug!("Confirmation for {}: {}", signature, confirmed),
            Err(e) => debug!("Confirmation attempt for {} failed: {}", signature, e),
        }
    }
}
