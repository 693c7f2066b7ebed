//! Devnet airdrop confirmation state machine
//!
//! Requests a faucet credit and confirms it by observed balance delta within
//! a bounded wall-clock window. The machine always terminates into one of
//! three outcomes inside the hard 60-second ceiling, whatever the retry and
//! backoff settings; it refuses to run against anything that is not a
//! devnet/testnet/localhost endpoint.

use std::str::FromStr;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use solana_sdk::pubkey::Pubkey;
use tracing::{debug, info, warn};

use crate::amount::{lamports_to_sol, LAMPORTS_PER_SOL};
use crate::config::is_dev_endpoint;
use crate::error::{Error, Result};
use crate::rpc::{is_rate_limited, LedgerClient};

/// Hard ceiling on the whole confirmation window
pub const MAX_CONFIRM_SECONDS: f64 = 60.0;
/// Growth factor for the backoff between faucet attempts
const BACKOFF_GROWTH: f64 = 1.6;

#[derive(Debug, Clone, Deserialize)]
pub struct AirdropRequest {
    pub address: String,

    #[serde(default = "default_sol")]
    pub sol: f64,

    /// Total confirmation window in seconds, clamped to [0, 60]
    #[serde(default = "default_confirm_seconds")]
    pub confirm_seconds: f64,

    /// Balance poll interval in seconds, clamped to [0.2, 5]
    #[serde(default = "default_poll_interval")]
    pub poll_interval: f64,

    /// Extra faucet attempts after the first, clamped to [0, 10]
    #[serde(default = "default_retries")]
    pub retries: u32,

    /// Backoff base in seconds, clamped to [0.2, 10]
    #[serde(default = "default_backoff_seconds")]
    pub backoff_seconds: f64,
}

fn default_sol() -> f64 {
    1.0
}
fn default_confirm_seconds() -> f64 {
    60.0
}
fn default_poll_interval() -> f64 {
    1.0
}
fn default_retries() -> u32 {
    3
}
fn default_backoff_seconds() -> f64 {
    1.5
}

/// Effective parameters after clamping to safe ranges
#[derive(Debug, Clone, PartialEq)]
pub struct ClampedParams {
    pub confirm_seconds: f64,
    pub poll_interval: f64,
    pub retries: u32,
    pub backoff_seconds: f64,
}

impl AirdropRequest {
    pub fn new(address: impl Into<String>, sol: f64) -> Self {
        Self {
            address: address.into(),
            sol,
            confirm_seconds: default_confirm_seconds(),
            poll_interval: default_poll_interval(),
            retries: default_retries(),
            backoff_seconds: default_backoff_seconds(),
        }
    }

    pub fn clamped(&self) -> ClampedParams {
        let confirm = if self.confirm_seconds.is_finite() {
            self.confirm_seconds.clamp(0.0, MAX_CONFIRM_SECONDS)
        } else {
            MAX_CONFIRM_SECONDS
        };
        let interval = if self.poll_interval.is_finite() {
            self.poll_interval.clamp(0.2, 5.0)
        } else {
            1.0
        };
        let backoff = if self.backoff_seconds.is_finite() {
            self.backoff_seconds.clamp(0.2, 10.0)
        } else {
            1.5
        };
        ClampedParams {
            confirm_seconds: confirm,
            poll_interval: interval,
            retries: self.retries.min(10),
            backoff_seconds: backoff,
        }
    }
}

/// Terminal state of one airdrop run
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "confirmed", rename_all = "snake_case")]
pub enum AirdropOutcome {
    /// Credit observed as a balance delta within the window
    BalanceDelta {
        /// May be absent when the credit landed without the faucet ever
        /// returning a signature
        signature: Option<String>,
        pre_balance_sol: f64,
        post_balance_sol: f64,
        delta_sol: f64,
        attempts_airdrop: u32,
        attempts_poll: u32,
        waited_seconds: f64,
    },
    /// A signature was obtained but no delta showed up in time; treated as
    /// optimistic success
    SignatureOnly {
        signature: String,
        pre_balance_sol: f64,
        post_balance_sol: f64,
        delta_sol: f64,
        attempts_airdrop: u32,
        waited_seconds: f64,
    },
    /// No signature and no delta before the deadline
    #[serde(rename = "none")]
    Pending {
        pending: bool,
        rate_limited: bool,
        pre_balance_sol: f64,
        post_balance_sol: f64,
        delta_sol: f64,
        attempts_airdrop: u32,
        waited_seconds: f64,
        #[serde(skip_serializing_if = "Option::is_none")]
        last_error: Option<String>,
    },
}

/// Run the airdrop state machine against one endpoint.
///
/// Errors only on the devnet guard, a bad address, an invalid amount, or an
/// unreadable pre-balance; after that every path ends in an
/// `AirdropOutcome`.
pub fn run_airdrop(rpc: &LedgerClient, request: &AirdropRequest) -> Result<AirdropOutcome> {
    if !is_dev_endpoint(rpc.url()) {
        return Err(Error::AirdropNotAllowed(format!(
            "airdrop allowed only on devnet/testnet/localhost, endpoint is {}",
            rpc.url()
        )));
    }
    if !(request.sol > 0.0) || !request.sol.is_finite() {
        return Err(Error::InvalidAmount(format!(
            "airdrop amount must be > 0, got {}",
            request.sol
        )));
    }
    let address = Pubkey::from_str(&request.address)
        .map_err(|e| Error::InvalidAddress(format!("{}: {e}", request.address)))?;

    let params = request.clamped();
    let lamports = (request.sol * LAMPORTS_PER_SOL as f64) as u64;

    let pre_balance = rpc.balance(&address)?;
    info!(
        "Airdrop of {} SOL to {} (window {}s, retries {})",
        request.sol, address, params.confirm_seconds, params.retries
    );

    let start = Instant::now();
    let deadline = start + Duration::from_secs_f64(params.confirm_seconds);
    let poll_interval = Duration::from_secs_f64(params.poll_interval);

    let mut signature: Option<String> = None;
    let mut last_error: Option<String> = None;
    let mut rate_limited = false;
    let mut attempts_airdrop: u32 = 0;
    let mut attempts_poll: u32 = 0;
    let mut latest_balance = pre_balance;

    for attempt in 0..=params.retries {
        if Instant::now() >= deadline {
            break;
        }

        attempts_airdrop += 1;
        match rpc.request_airdrop(&address, lamports) {
            Ok(sig) => {
                debug!("Faucet returned signature {}", sig);
                signature = Some(sig.to_string());
            }
            Err(e) => {
                rate_limited = matches!(e, Error::RateLimited(_))
                    || is_rate_limited(&e.to_string(), None);
                warn!("Faucet request failed (attempt {}): {}", attempt + 1, e);
                last_error = Some(e.to_string());
            }
        }

        // Poll the balance until the credit shows up or the window closes
        while Instant::now() < deadline {
            attempts_poll += 1;
            // Transient read failures are ignored; the deadline bounds us
            if let Ok(balance) = rpc.balance_once(&address) {
                latest_balance = balance;
            }
            let delta = latest_balance.saturating_sub(pre_balance);
            if delta >= lamports {
                let waited = round3(start.elapsed().as_secs_f64());
                info!(
                    "Airdrop confirmed by balance delta after {:.3}s ({} polls)",
                    waited, attempts_poll
                );
                return Ok(AirdropOutcome::BalanceDelta {
                    signature,
                    pre_balance_sol: lamports_to_sol(pre_balance),
                    post_balance_sol: lamports_to_sol(latest_balance),
                    delta_sol: lamports_to_sol(delta),
                    attempts_airdrop,
                    attempts_poll,
                    waited_seconds: waited,
                });
            }
            sleep_until_at_most(poll_interval, deadline);
        }

        if Instant::now() >= deadline {
            break;
        }
        let backoff =
            Duration::from_secs_f64(params.backoff_seconds * BACKOFF_GROWTH.powi(attempt as i32));
        sleep_until_at_most(backoff, deadline);
    }

    // Window closed without an observed delta
    if let Ok(balance) = rpc.balance_once(&address) {
        latest_balance = balance;
    }
    let delta = latest_balance.saturating_sub(pre_balance);
    let waited = round3(start.elapsed().as_secs_f64());

    if let Some(sig) = signature {
        info!("Airdrop signature obtained but credit not observed in window");
        return Ok(AirdropOutcome::SignatureOnly {
            signature: sig,
            pre_balance_sol: lamports_to_sol(pre_balance),
            post_balance_sol: lamports_to_sol(latest_balance),
            delta_sol: lamports_to_sol(delta),
            attempts_airdrop,
            waited_seconds: waited,
        });
    }

    warn!(
        "Airdrop pending after {:.3}s (rate_limited: {})",
        waited, rate_limited
    );
    Ok(AirdropOutcome::Pending {
        pending: true,
        rate_limited,
        pre_balance_sol: lamports_to_sol(pre_balance),
        post_balance_sol: lamports_to_sol(latest_balance),
        delta_sol: lamports_to_sol(delta),
        attempts_airdrop,
        waited_seconds: waited,
        last_error,
    })
}

fn sleep_until_at_most(wanted: Duration, deadline: Instant) {
    let remaining = deadline.saturating_duration_since(Instant::now());
    let nap = wanted.min(remaining);
    if !nap.is_zero() {
        std::thread::sleep(nap);
    }
}

fn round3(seconds: f64) -> f64 {
    (seconds * 1000.0).round() / 1000.0
}
