//! Client configuration with builder pattern.
//!
//! Covers:
//! - Program address
//! - Commitment level and confirmation timing
//! - Retry policy for idempotent reads

use std::time::Duration;

use solana_program::pubkey::Pubkey;

use crate::error::{ClientError, Result};
use crate::ledger::Commitment;

/// Default confirmation deadline (30 seconds).
const DEFAULT_CONFIRM_TIMEOUT: Duration = Duration::from_secs(30);

/// Default status poll interval, roughly one slot.
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(400);

/// Configuration for [`TwitterClient`](crate::TwitterClient).
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub(crate) program_id: Pubkey,
    pub(crate) commitment: Commitment,
    pub(crate) confirm_timeout: Duration,
    pub(crate) poll_interval: Duration,
    pub(crate) retry_policy: RetryPolicy,
}

impl ClientConfig {
    /// Creates a new configuration builder.
    #[must_use]
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::default()
    }

    /// Returns the address of the twitter program.
    #[must_use]
    pub fn program_id(&self) -> Pubkey {
        self.program_id
    }

    /// Returns the commitment level `create` waits for.
    #[must_use]
    pub fn commitment(&self) -> Commitment {
        self.commitment
    }

    /// Returns how long `create` waits for confirmation.
    #[must_use]
    pub fn confirm_timeout(&self) -> Duration {
        self.confirm_timeout
    }

    /// Returns the delay between status polls.
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Returns the retry policy for reads.
    #[must_use]
    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry_policy
    }

    pub(crate) fn confirm_options(&self) -> ConfirmOptions {
        ConfirmOptions {
            commitment: self.commitment,
            timeout: self.confirm_timeout,
            poll_interval: self.poll_interval,
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            program_id: solana_twitter::ID,
            commitment: Commitment::default(),
            confirm_timeout: DEFAULT_CONFIRM_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
            retry_policy: RetryPolicy::default(),
        }
    }
}

/// Builder for [`ClientConfig`].
#[derive(Debug, Default)]
pub struct ClientConfigBuilder {
    program_id: Option<Pubkey>,
    commitment: Option<Commitment>,
    confirm_timeout: Option<Duration>,
    poll_interval: Option<Duration>,
    retry_policy: Option<RetryPolicy>,
}

impl ClientConfigBuilder {
    /// Sets the program address.
    ///
    /// Default: the address the program is deployed at.
    #[must_use]
    pub fn with_program_id(mut self, program_id: Pubkey) -> Self {
        self.program_id = Some(program_id);
        self
    }

    /// Sets the commitment level to wait for.
    ///
    /// Default: [`Commitment::Finalized`].
    #[must_use]
    pub fn with_commitment(mut self, commitment: Commitment) -> Self {
        self.commitment = Some(commitment);
        self
    }

    /// Sets the confirmation deadline.
    ///
    /// Default: 30 seconds.
    #[must_use]
    pub fn with_confirm_timeout(mut self, timeout: Duration) -> Self {
        self.confirm_timeout = Some(timeout);
        self
    }

    /// Sets the delay between status polls.
    ///
    /// Default: 400 milliseconds.
    #[must_use]
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = Some(interval);
        self
    }

    /// Sets the retry policy for reads.
    ///
    /// Default: [`RetryPolicy::default()`].
    #[must_use]
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = Some(policy);
        self
    }

    /// Builds the configuration, validating all settings.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Config` if:
    /// - The poll interval is zero
    /// - The confirmation timeout is shorter than the poll interval
    /// - The retry policy is invalid
    pub fn build(self) -> Result<ClientConfig> {
        let defaults = ClientConfig::default();
        let config = ClientConfig {
            program_id: self.program_id.unwrap_or(defaults.program_id),
            commitment: self.commitment.unwrap_or(defaults.commitment),
            confirm_timeout: self.confirm_timeout.unwrap_or(defaults.confirm_timeout),
            poll_interval: self.poll_interval.unwrap_or(defaults.poll_interval),
            retry_policy: self.retry_policy.unwrap_or(defaults.retry_policy),
        };

        if config.poll_interval.is_zero() {
            return Err(config_error("poll interval must be greater than zero"));
        }
        if config.confirm_timeout < config.poll_interval {
            return Err(config_error(format!(
                "confirm timeout ({:?}) is shorter than the poll interval ({:?})",
                config.confirm_timeout, config.poll_interval
            )));
        }
        config.retry_policy.validate()?;

        Ok(config)
    }
}

/// How [`await_confirmation`](crate::transaction::await_confirmation) waits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfirmOptions {
    pub commitment: Commitment,
    pub timeout: Duration,
    pub poll_interval: Duration,
}

impl Default for ConfirmOptions {
    fn default() -> Self {
        ClientConfig::default().confirm_options()
    }
}

/// Retry policy for idempotent reads.
///
/// Submissions are never retried: a resubmission needs a new identity.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(5),
            multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// A policy that makes a single attempt.
    #[must_use]
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    fn validate(&self) -> Result<()> {
        if self.max_attempts == 0 {
            return Err(config_error("max_attempts must be at least 1"));
        }
        if self.initial_backoff > self.max_backoff {
            return Err(config_error(format!(
                "initial_backoff ({:?}) exceeds max_backoff ({:?})",
                self.initial_backoff, self.max_backoff
            )));
        }
        if !(self.multiplier >= 1.0) {
            return Err(config_error(format!(
                "multiplier must be >= 1.0, got {}",
                self.multiplier
            )));
        }
        Ok(())
    }
}

fn config_error(message: impl Into<String>) -> ClientError {
    ClientError::Config {
        message: message.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ClientConfig::builder().build().unwrap();
        assert_eq!(config.program_id(), solana_twitter::ID);
        assert_eq!(config.commitment(), Commitment::Finalized);
        assert_eq!(config.confirm_timeout(), Duration::from_secs(30));
        assert_eq!(config.poll_interval(), Duration::from_millis(400));
        assert_eq!(config.retry_policy(), &RetryPolicy::default());
    }

    #[test]
    fn test_builder_overrides() {
        let program_id = Pubkey::new_unique();
        let config = ClientConfig::builder()
            .with_program_id(program_id)
            .with_commitment(Commitment::Confirmed)
            .with_confirm_timeout(Duration::from_secs(5))
            .with_poll_interval(Duration::from_millis(10))
            .with_retry_policy(RetryPolicy::no_retry())
            .build()
            .unwrap();

        assert_eq!(config.program_id(), program_id);
        assert_eq!(config.commitment(), Commitment::Confirmed);
        assert_eq!(config.retry_policy().max_attempts, 1);

        let options = config.confirm_options();
        assert_eq!(options.timeout, Duration::from_secs(5));
        assert_eq!(options.poll_interval, Duration::from_millis(10));
    }

    #[test]
    fn test_rejects_zero_poll_interval() {
        let err = ClientConfig::builder()
            .with_poll_interval(Duration::ZERO)
            .build()
            .unwrap_err();
        assert!(matches!(err, ClientError::Config { .. }));
    }

    #[test]
    fn test_rejects_timeout_below_poll_interval() {
        let result = ClientConfig::builder()
            .with_confirm_timeout(Duration::from_millis(100))
            .with_poll_interval(Duration::from_secs(1))
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_rejects_invalid_retry_policy() {
        let zero_attempts = RetryPolicy {
            max_attempts: 0,
            ..RetryPolicy::default()
        };
        assert!(ClientConfig::builder()
            .with_retry_policy(zero_attempts)
            .build()
            .is_err());

        let inverted = RetryPolicy {
            initial_backoff: Duration::from_secs(10),
            max_backoff: Duration::from_secs(1),
            ..RetryPolicy::default()
        };
        assert!(ClientConfig::builder()
            .with_retry_policy(inverted)
            .build()
            .is_err());

        let shrinking = RetryPolicy {
            multiplier: 0.5,
            ..RetryPolicy::default()
        };
        assert!(ClientConfig::builder()
            .with_retry_policy(shrinking)
            .build()
            .is_err());
    }
}
