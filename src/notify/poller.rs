//! Periodic update checks for the worker script
//!
//! [`run_update_poller`] checks once at start, then on every interval tick
//! and whenever the host signals that the app regained focus. A change in
//! the script's SHA-256 digest is reported on a channel. Failed checks are
//! logged and never stop the loop.

use crate::error::{BharatError, Result};
use async_trait::async_trait;
use reqwest::Client;
use sha2::{Digest, Sha256};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

/// Source of the current worker script digest
#[async_trait]
pub trait UpdateChecker: Send + Sync {
    /// Hex-encoded digest of the remote script
    async fn current_digest(&self) -> Result<String>;
}

/// Hex-encoded SHA-256 of `body`
///
/// # Examples
///
/// ```
/// use bharat_ai::notify::script_digest;
///
/// assert_eq!(
///     script_digest(b"abc"),
///     "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
/// );
/// ```
pub fn script_digest(body: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(body);
    format!("{:x}", hasher.finalize())
}

/// Fetches the worker script over HTTP, bypassing caches
pub struct HttpUpdateChecker {
    client: Client,
    script_url: String,
}

impl HttpUpdateChecker {
    /// Create a checker for `script_url`
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be built
    pub fn new(script_url: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(concat!("bharat-ai/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| BharatError::Config(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self {
            client,
            script_url: script_url.into(),
        })
    }
}

#[async_trait]
impl UpdateChecker for HttpUpdateChecker {
    async fn current_digest(&self) -> Result<String> {
        let response = self
            .client
            .get(&self.script_url)
            .header(reqwest::header::CACHE_CONTROL, "no-cache")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(BharatError::Provider(format!(
                "Worker script fetch failed: {}",
                status.as_u16()
            ))
            .into());
        }

        let body = response.bytes().await?;
        Ok(script_digest(&body))
    }
}

/// A new script version was detected
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateDetected {
    pub previous: String,
    pub current: String,
}

/// Poll `checker` until `cancellation` fires
///
/// The first successful check records the baseline digest. Each later
/// digest that differs from the last one seen is sent on `updates`.
/// Check failures are logged with `warn` and the loop continues.
///
/// # Arguments
///
/// * `checker` - Digest source
/// * `interval` - Time between periodic checks
/// * `focus` - Receives a unit each time the app regains focus
/// * `updates` - Receives detected updates
/// * `cancellation` - Stops the loop
///
/// # Returns
///
/// Number of checks performed
pub async fn run_update_poller<C: UpdateChecker + ?Sized>(
    checker: &C,
    interval: Duration,
    mut focus: mpsc::Receiver<()>,
    updates: mpsc::Sender<UpdateDetected>,
    cancellation: CancellationToken,
) -> usize {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut focus_open = true;
    let mut known: Option<String> = None;
    let mut checks = 0usize;

    tracing::info!(interval_secs = interval.as_secs(), "Update poller started");

    loop {
        tokio::select! {
            biased;

            _ = cancellation.cancelled() => break,

            _ = ticker.tick() => {}

            signal = focus.recv(), if focus_open => {
                if signal.is_none() {
                    focus_open = false;
                    continue;
                }
                tracing::debug!("Focus regained, checking for updates");
            }
        }

        checks += 1;
        match checker.current_digest().await {
            Ok(digest) => match known.replace(digest.clone()) {
                Some(previous) if previous != digest => {
                    tracing::info!("New worker version detected");
                    metrics::increment_counter!("bharat_worker_updates_total");
                    let update = UpdateDetected {
                        previous,
                        current: digest,
                    };
                    if updates.send(update).await.is_err() {
                        tracing::debug!("Update receiver dropped; stopping poller");
                        break;
                    }
                }
                _ => {}
            },
            Err(e) => tracing::warn!("Update check failed: {}", e),
        }
    }

    tracing::info!(checks, "Update poller stopped");
    checks
}
