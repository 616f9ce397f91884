//! Bounded retry for fallible async operations
//!
//! Only errors that classify themselves as retryable are retried; anything
//! else fails fast. The operation is a closure re-invoked per attempt, so
//! each attempt rebuilds its request from scratch.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tracing::{info, warn};

use crate::domain::errors::FetchError;
use crate::infrastructure::config::RetryConfig;

/// Error classification used by [`RetryingRunner`]
pub trait Retryable {
    fn is_retryable(&self) -> bool;
}

impl Retryable for FetchError {
    /// Timeouts only; network and status failures are final
    fn is_retryable(&self) -> bool {
        self.is_timeout()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            delay: Duration::from_secs(config.delay_secs),
        }
    }
}

/// How a retried operation ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryOutcome<T, E> {
    Succeeded { value: T, attempts: u32 },
    /// Every attempt hit a retryable error
    Exhausted { attempts: u32, last_error: E },
    /// A non-retryable error stopped the loop
    Failed { attempts: u32, error: E },
}

impl<T, E> RetryOutcome<T, E> {
    pub fn attempts(&self) -> u32 {
        match self {
            Self::Succeeded { attempts, .. } | Self::Exhausted { attempts, .. } | Self::Failed { attempts, .. } => {
                *attempts
            }
        }
    }

    pub fn into_value(self) -> Option<T> {
        match self {
            Self::Succeeded { value, .. } => Some(value),
            Self::Exhausted { .. } | Self::Failed { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RetryingRunner {
    policy: RetryPolicy,
}

impl RetryingRunner {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Run `operation`, `None` when it never succeeded
    pub async fn run<T, E, F, Fut>(&self, label: &str, operation: F) -> Option<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Retryable + Display,
    {
        self.execute(label, operation).await.into_value()
    }

    /// Run `operation` and report how it ended
    pub async fn execute<T, E, F, Fut>(&self, label: &str, mut operation: F) -> RetryOutcome<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Retryable + Display,
    {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match operation().await {
                Ok(value) => {
                    if attempt > 1 {
                        info!("✅ {} succeeded on attempt {}/{}", label, attempt, max_attempts);
                    }
                    return RetryOutcome::Succeeded { value, attempts: attempt };
                }
                Err(error) if !error.is_retryable() => {
                    warn!("❌ {} failed, not retrying: {}", label, error);
                    return RetryOutcome::Failed { attempts: attempt, error };
                }
                Err(error) if attempt >= max_attempts => {
                    warn!("❌ {} gave up after {} attempts: {}", label, attempt, error);
                    return RetryOutcome::Exhausted { attempts: attempt, last_error: error };
                }
                Err(error) => {
                    warn!(
                        "🔄 {} attempt {}/{} failed: {}; retrying in {:?}",
                        label, attempt, max_attempts, error, self.policy.delay
                    );
                    tokio::time::sleep(self.policy.delay).await;
                    attempt += 1;
                }
            }
        }
    }
}
