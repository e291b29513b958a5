//! Readiness verification over HTTPS.
//!
//! The site counts as up once its secure URL answers `200`. Non-200 answers
//! are retried on a fixed budget; a transport error ends polling at once.
//!
//! ```text
//!            ┌─────────┐   200    ┌───────────┐
//!    ───────▶│ Polling │─────────▶│ Succeeded │
//!            └────┬────┘          └───────────┘
//!        non-200  │  │ transport error
//!   (budget left) │  └──────────────▶ FailedError
//!            ◀────┘
//!      budget spent ─────────────────▶ FailedTimeout
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

/// Requests made before giving up on non-200 answers.
pub const VERIFY_ATTEMPTS: u32 = 30;

/// Delay between requests.
pub const VERIFY_INTERVAL: Duration = Duration::from_secs(1);

/// Transport-level failure of a single probe request.
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct ProbeError(pub String);

/// Errors from readiness verification.
#[derive(Debug, Error)]
pub enum VerifyError {
    /// The root certificate could not be loaded.
    #[error("Unable to load root certificate {path}: {reason}")]
    Certificate {
        /// Certificate path.
        path: PathBuf,
        /// Reason for failure.
        reason: String,
    },

    /// The request itself failed.
    #[error("Unable to reach {url}: {reason}")]
    Transport {
        /// URL that was polled.
        url: String,
        /// Reason for failure.
        reason: String,
    },

    /// The site never answered 200 within the retry budget.
    #[error("Timeout reached. {url} did not come up after {attempts} attempts")]
    Timeout {
        /// URL that was polled.
        url: String,
        /// Requests made.
        attempts: u32,
    },
}

/// One HTTP status check.
#[async_trait]
pub trait Probe: Send + Sync {
    /// Status code of a GET to `url`.
    async fn status(&self, url: &str) -> Result<u16, ProbeError>;
}

/// [`Probe`] over HTTPS trusting the development root certificate.
pub struct HttpProbe {
    client: reqwest::Client,
}

impl HttpProbe {
    /// Build a client that trusts the PEM root certificate at `root_cert`.
    ///
    /// Chain and hostname checks are relaxed for the loopback development
    /// certificate.
    pub fn new(root_cert: &Path) -> Result<Self, VerifyError> {
        let cert_error = |reason: String| VerifyError::Certificate {
            path: root_cert.to_path_buf(),
            reason,
        };

        let pem = std::fs::read(root_cert).map_err(|e| cert_error(e.to_string()))?;
        let cert = reqwest::Certificate::from_pem(&pem).map_err(|e| cert_error(e.to_string()))?;

        let client = reqwest::Client::builder()
            .add_root_certificate(cert)
            .danger_accept_invalid_certs(true)
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| cert_error(e.to_string()))?;

        Ok(Self { client })
    }
}

#[async_trait]
impl Probe for HttpProbe {
    async fn status(&self, url: &str) -> Result<u16, ProbeError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| ProbeError(e.to_string()))?;
        Ok(response.status().as_u16())
    }
}

/// Verifier states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    Polling,
    Succeeded,
    FailedTimeout,
    FailedError,
}

/// Polls a URL until it answers 200.
pub struct ReadinessVerifier<'a> {
    probe: &'a dyn Probe,
    attempts: u32,
    interval: Duration,
    state: Readiness,
}

impl<'a> ReadinessVerifier<'a> {
    pub fn new(probe: &'a dyn Probe) -> Self {
        Self {
            probe,
            attempts: VERIFY_ATTEMPTS,
            interval: VERIFY_INTERVAL,
            state: Readiness::Polling,
        }
    }

    /// Override the retry budget.
    pub fn with_budget(mut self, attempts: u32, interval: Duration) -> Self {
        self.attempts = attempts.max(1);
        self.interval = interval;
        self
    }

    pub fn state(&self) -> Readiness {
        self.state
    }

    /// Poll `url`. Returns the number of requests it took to see a 200.
    pub async fn verify(&mut self, url: &str) -> Result<u32, VerifyError> {
        self.state = Readiness::Polling;

        for attempt in 1..=self.attempts {
            match self.probe.status(url).await {
                Ok(200) => {
                    self.state = Readiness::Succeeded;
                    tracing::debug!("{} answered 200 after {} attempt(s)", url, attempt);
                    return Ok(attempt);
                }
                Ok(status) => {
                    tracing::debug!("{} answered {} (attempt {})", url, status, attempt);
                }
                Err(e) => {
                    self.state = Readiness::FailedError;
                    return Err(VerifyError::Transport {
                        url: url.to_string(),
                        reason: e.to_string(),
                    });
                }
            }

            if attempt < self.attempts {
                tokio::time::sleep(self.interval).await;
            }
        }

        self.state = Readiness::FailedTimeout;
        Err(VerifyError::Timeout {
            url: url.to_string(),
            attempts: self.attempts,
        })
    }
}
