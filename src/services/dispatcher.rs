//! Fallback-chain request dispatcher
//!
//! Sends one payload to a remote service, walking the credential pool in
//! order and, for every credential, the endpoint list in order, until an
//! attempt succeeds or everything is exhausted.
//!
//! Outcome handling:
//! - `Success` returns immediately.
//! - `RateLimited` / `TransientError` move on to the next endpoint, then the
//!   next credential, without delay.
//! - `FatalError` skips the remaining endpoints of the credential.
//!
//! After one full pass, if the last credential failed only with retryable
//! outcomes, it is retried up to `max_backoff_rounds` times with a bounded
//! exponential delay before each round. When every attempt is rate limited
//! the dispatcher therefore makes exactly
//! `(pool.len() + max_backoff_rounds) * endpoints.len()` attempts.

use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

use crate::services::composer::RequestPayload;
use crate::services::credential_pool::{Credential, CredentialPool};
use crate::utils::backoff::BackoffPolicy;

// ============================================================================
// Service Boundary
// ============================================================================

/// Classified failure of a single remote call
///
/// Service clients decide the class once, from status codes and transport
/// errors; nothing downstream re-parses messages.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ServiceError {
    #[error("rate limited: {message}")]
    RateLimited {
        message: String,
        retry_after: Option<Duration>,
    },

    #[error("transient error: {0}")]
    Transient(String),

    #[error("fatal error: {0}")]
    Fatal(String),
}

impl ServiceError {
    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::RateLimited {
            message: message.into(),
            retry_after: None,
        }
    }

    /// Whether the failure may clear up by waiting or switching credential
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::Fatal(_))
    }

    /// Retry-After hint reported by the service, if any
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after, .. } => *retry_after,
            _ => None,
        }
    }

    pub fn outcome(&self) -> AttemptOutcome {
        match self {
            Self::RateLimited { .. } => AttemptOutcome::RateLimited,
            Self::Transient(_) => AttemptOutcome::TransientError,
            Self::Fatal(_) => AttemptOutcome::FatalError,
        }
    }
}

/// A remote text or image service reachable with a credential
#[async_trait]
pub trait RemoteService: Send + Sync {
    type Output: Send;

    /// Service name for logs
    fn name(&self) -> &str;

    /// Endpoint used when the caller supplies no endpoint list
    fn default_endpoint(&self) -> &str;

    /// Perform one attempt. The credential is passed explicitly; clients
    /// must not store it between calls.
    async fn call(
        &self,
        credential: &Credential,
        endpoint: &str,
        payload: &RequestPayload,
    ) -> Result<Self::Output, ServiceError>;
}

// ============================================================================
// Dispatch Records
// ============================================================================

/// Classification of one attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptOutcome {
    Success,
    RateLimited,
    TransientError,
    FatalError,
}

/// One credential/endpoint attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DispatchAttempt {
    pub credential_index: usize,
    pub endpoint: String,
    pub outcome: AttemptOutcome,
    /// Set for attempts made during a backoff round
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backoff_round: Option<u32>,
}

/// Trace of a whole dispatch
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DispatchReport {
    pub attempts: Vec<DispatchAttempt>,
    pub backoff_rounds: u32,
    pub total_backoff_ms: u64,
}

impl DispatchReport {
    pub fn attempt_count(&self) -> usize {
        self.attempts.len()
    }

    /// Whether any attempt failed in a way that waiting could clear
    pub fn had_retryable_failure(&self) -> bool {
        self.attempts.iter().any(|attempt| {
            matches!(
                attempt.outcome,
                AttemptOutcome::RateLimited | AttemptOutcome::TransientError
            )
        })
    }
}

/// Successful dispatch
#[derive(Debug)]
pub struct Dispatched<T> {
    pub value: T,
    pub credential_index: usize,
    pub endpoint: String,
    pub report: DispatchReport,
}

/// Terminal failure of a dispatch
#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("{service} exhausted after {} attempts: {last_error}", .report.attempts.len())]
    Exhausted {
        service: String,
        last_error: ServiceError,
        report: DispatchReport,
    },

    #[error("dispatch cancelled after {} attempts", .report.attempts.len())]
    Cancelled { report: DispatchReport },
}

impl DispatchError {
    pub fn report(&self) -> &DispatchReport {
        match self {
            Self::Exhausted { report, .. } | Self::Cancelled { report } => report,
        }
    }
}

enum PassOutcome<T> {
    Success(Dispatched<T>),
    Failed(ServiceError),
    Cancelled,
}

// ============================================================================
// Fallback Dispatcher
// ============================================================================

/// Sequential fallback across credentials and endpoints
#[derive(Debug, Clone, Default)]
pub struct FallbackDispatcher {
    policy: BackoffPolicy,
}

impl FallbackDispatcher {
    pub fn new(policy: BackoffPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &BackoffPolicy {
        &self.policy
    }

    /// Dispatch `payload` to `service`
    ///
    /// An empty `endpoints` slice means the service's default endpoint.
    /// `cancel` is checked before every attempt and raced against every
    /// backoff sleep.
    pub async fn dispatch<S>(
        &self,
        service: &S,
        payload: &RequestPayload,
        pool: &CredentialPool,
        endpoints: &[String],
        cancel: &CancellationToken,
    ) -> Result<Dispatched<S::Output>, DispatchError>
    where
        S: RemoteService + ?Sized,
    {
        let default_endpoints = [service.default_endpoint().to_string()];
        let endpoints: &[String] = if endpoints.is_empty() {
            &default_endpoints
        } else {
            endpoints
        };

        let mut report = DispatchReport::default();
        let mut last_error: Option<ServiceError> = None;

        for credential in pool.iterate() {
            match self
                .run_pass(service, payload, credential, endpoints, None, cancel, &mut report)
                .await
            {
                PassOutcome::Success(mut dispatched) => {
                    dispatched.report = report;
                    return Ok(dispatched);
                }
                PassOutcome::Failed(err) => last_error = Some(err),
                PassOutcome::Cancelled => return Err(DispatchError::Cancelled { report }),
            }
        }

        let last_credential = pool.last();
        let mut round = 0;

        while round < self.policy.max_backoff_rounds {
            let retryable = last_error.as_ref().map_or(false, ServiceError::is_retryable);
            if !retryable {
                break;
            }

            let hint = last_error.as_ref().and_then(ServiceError::retry_after);
            let delay = self.policy.delay_with_hint(round, hint);

            tracing::warn!(
                service = %service.name(),
                credential = %last_credential,
                round = round + 1,
                max_rounds = self.policy.max_backoff_rounds,
                delay_ms = delay.as_millis() as u64,
                "All credentials failed, backing off before retrying the last one"
            );

            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!(service = %service.name(), "Dispatch cancelled during backoff");
                    return Err(DispatchError::Cancelled { report });
                }
                _ = sleep(delay) => {}
            }

            report.backoff_rounds += 1;
            report.total_backoff_ms += delay.as_millis() as u64;

            match self
                .run_pass(
                    service,
                    payload,
                    last_credential,
                    endpoints,
                    Some(round),
                    cancel,
                    &mut report,
                )
                .await
            {
                PassOutcome::Success(mut dispatched) => {
                    dispatched.report = report;
                    return Ok(dispatched);
                }
                PassOutcome::Failed(err) => last_error = Some(err),
                PassOutcome::Cancelled => return Err(DispatchError::Cancelled { report }),
            }

            round += 1;
        }

        let last_error =
            last_error.unwrap_or_else(|| ServiceError::Fatal("no attempt was made".to_string()));

        tracing::error!(
            service = %service.name(),
            attempts = report.attempts.len(),
            backoff_rounds = report.backoff_rounds,
            error = %last_error,
            "Dispatch exhausted"
        );

        Err(DispatchError::Exhausted {
            service: service.name().to_string(),
            last_error,
            report,
        })
    }

    /// Try every endpoint once with a single credential
    #[allow(clippy::too_many_arguments)]
    async fn run_pass<S>(
        &self,
        service: &S,
        payload: &RequestPayload,
        credential: &Credential,
        endpoints: &[String],
        backoff_round: Option<u32>,
        cancel: &CancellationToken,
        report: &mut DispatchReport,
    ) -> PassOutcome<S::Output>
    where
        S: RemoteService + ?Sized,
    {
        let mut last_error = None;

        for endpoint in endpoints {
            if cancel.is_cancelled() {
                return PassOutcome::Cancelled;
            }

            let result = service.call(credential, endpoint, payload).await;
            let outcome = match &result {
                Ok(_) => AttemptOutcome::Success,
                Err(err) => err.outcome(),
            };

            report.attempts.push(DispatchAttempt {
                credential_index: credential.index(),
                endpoint: endpoint.clone(),
                outcome,
                backoff_round,
            });

            match result {
                Ok(value) => {
                    tracing::debug!(
                        service = %service.name(),
                        credential = %credential,
                        endpoint = %endpoint,
                        attempt = report.attempts.len(),
                        "Attempt succeeded"
                    );
                    return PassOutcome::Success(Dispatched {
                        value,
                        credential_index: credential.index(),
                        endpoint: endpoint.clone(),
                        report: DispatchReport::default(),
                    });
                }
                Err(err @ ServiceError::Fatal(_)) => {
                    tracing::warn!(
                        service = %service.name(),
                        credential = %credential,
                        endpoint = %endpoint,
                        error = %err,
                        "Fatal error, skipping credential"
                    );
                    return PassOutcome::Failed(err);
                }
                Err(err @ ServiceError::RateLimited { .. }) => {
                    tracing::warn!(
                        service = %service.name(),
                        credential = %credential,
                        endpoint = %endpoint,
                        "Rate limited"
                    );
                    last_error = Some(err);
                }
                Err(err @ ServiceError::Transient(_)) => {
                    tracing::warn!(
                        service = %service.name(),
                        credential = %credential,
                        endpoint = %endpoint,
                        error = %err,
                        "Transient failure"
                    );
                    last_error = Some(err);
                }
            }
        }

        match last_error {
            Some(err) => PassOutcome::Failed(err),
            None => PassOutcome::Failed(ServiceError::Fatal("empty endpoint list".to_string())),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
