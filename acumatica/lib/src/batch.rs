//! Concurrent execution of many generated service calls.
//!
//! A [`Batch`] runs its calls with bounded concurrency and reports one
//! [`BatchCallResult`] per call, in the order the calls were given, along
//! with [`BatchStats`] for the whole run. Calls that fail with a transient
//! error (5xx, 429, timeouts) are retried with exponential backoff.
//!
//! ```rust,ignore
//! use acumatica_client::batch::{BatchOptions, batch_from_ids};
//!
//! let contacts = client.service("Contact")?;
//! let outcome = batch_from_ids(contacts, ["1", "2", "3"])?
//!     .options(BatchOptions::default().max_concurrency(4))
//!     .execute()
//!     .await;
//! println!("{}/{} fetched", outcome.stats.succeeded, outcome.stats.total);
//! ```

use std::time::{Duration, Instant};

use futures::stream::{self, StreamExt};
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use crate::error::{AcumaticaError, ModelError};
use crate::odata::QueryOptions;
use crate::service::{EntityId, Invocation, OperationKind, Service};

/// Concurrency used when none is configured.
pub const DEFAULT_MAX_CONCURRENCY: usize = 10;

/// One deferred call of a generated method.
#[derive(Debug, Clone)]
pub struct BatchCall {
    service: Service,
    method: String,
    invocation: Invocation,
    api_version: Option<String>,
}

impl BatchCall {
    pub fn new(service: &Service, method: impl Into<String>, invocation: Invocation) -> Self {
        Self {
            service: service.clone(),
            method: method.into(),
            invocation,
            api_version: None,
        }
    }

    /// Sends this call against another endpoint version.
    pub fn api_version(mut self, version: impl Into<String>) -> Self {
        self.api_version = Some(version.into());
        self
    }

    /// `Service.method`, used in logs and results.
    pub fn description(&self) -> String {
        format!("{}.{}", self.service.entity_name(), self.method)
    }

    async fn run(&self) -> Result<Option<Value>, AcumaticaError> {
        self.service
            .call(&self.method, self.invocation.clone(), self.api_version.as_deref())
            .await
    }
}

/// Tuning for a batch run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchOptions {
    /// Calls in flight at once. Zero is treated as one.
    pub max_concurrency: usize,
    /// Extra attempts for a call that failed with a retryable error.
    pub max_retries: u32,
    /// Delay before the first retry; doubles on each further retry.
    pub retry_delay: Duration,
    /// Upper bound for the retry delay.
    pub max_retry_delay: Duration,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            max_retries: 2,
            retry_delay: Duration::from_millis(500),
            max_retry_delay: Duration::from_secs(10),
        }
    }
}

impl BatchOptions {
    pub fn max_concurrency(mut self, max: usize) -> Self {
        self.max_concurrency = max;
        self
    }

    pub fn max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    pub fn retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    fn backoff(&self, retry: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry);
        self.retry_delay
            .saturating_mul(factor)
            .min(self.max_retry_delay)
    }
}

/// What happened to one call of a batch.
#[derive(Debug)]
pub struct BatchCallResult {
    /// Position of the call in the batch.
    pub index: usize,
    pub description: String,
    pub outcome: Result<Option<Value>, AcumaticaError>,
    /// Attempts made, including the first.
    pub attempts: u32,
    /// Time spent on the call across all attempts.
    pub elapsed: Duration,
}

impl BatchCallResult {
    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }
}

/// Aggregate figures for a batch run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchStats {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Calls that needed more than one attempt.
    pub retried: usize,
    /// Wall-clock time of the whole run.
    pub elapsed: Duration,
    pub average_call: Duration,
    pub fastest_call: Duration,
    pub slowest_call: Duration,
    /// Concurrency actually used: the configured bound capped by the call count.
    pub concurrency: usize,
}

impl BatchStats {
    fn from_results(results: &[BatchCallResult], elapsed: Duration, concurrency: usize) -> Self {
        let succeeded = results.iter().filter(|r| r.is_success()).count();
        let times = || results.iter().map(|r| r.elapsed);
        let average_call = match u32::try_from(results.len()) {
            Ok(count) if count > 0 => times().sum::<Duration>() / count,
            _ => Duration::ZERO,
        };
        Self {
            total: results.len(),
            succeeded,
            failed: results.len() - succeeded,
            retried: results.iter().filter(|r| r.attempts > 1).count(),
            elapsed,
            average_call,
            fastest_call: times().min().unwrap_or_default(),
            slowest_call: times().max().unwrap_or_default(),
            concurrency,
        }
    }

    /// Share of calls that succeeded, from 0.0 to 1.0.
    pub fn success_rate(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.succeeded as f64 / self.total as f64
    }
}

/// Results of a batch run, in input order.
#[derive(Debug)]
pub struct BatchOutcome {
    pub results: Vec<BatchCallResult>,
    pub stats: BatchStats,
}

impl BatchOutcome {
    /// Bodies of the calls that succeeded, in input order.
    pub fn successes(&self) -> impl Iterator<Item = &Option<Value>> {
        self.results.iter().filter_map(|r| r.outcome.as_ref().ok())
    }

    /// Results of the calls that failed.
    pub fn failures(&self) -> impl Iterator<Item = &BatchCallResult> {
        self.results.iter().filter(|r| !r.is_success())
    }

    /// One outcome per call, in input order.
    pub fn into_outcomes(self) -> Vec<Result<Option<Value>, AcumaticaError>> {
        self.results.into_iter().map(|r| r.outcome).collect()
    }
}

/// A set of calls executed together.
#[derive(Debug, Clone, Default)]
pub struct Batch {
    calls: Vec<BatchCall>,
    options: BatchOptions,
}

impl Batch {
    pub fn new(calls: impl IntoIterator<Item = BatchCall>) -> Self {
        Self {
            calls: calls.into_iter().collect(),
            options: BatchOptions::default(),
        }
    }

    pub fn options(mut self, options: BatchOptions) -> Self {
        self.options = options;
        self
    }

    pub fn push(&mut self, call: BatchCall) {
        self.calls.push(call);
    }

    pub fn calls(&self) -> &[BatchCall] {
        &self.calls
    }

    pub fn len(&self) -> usize {
        self.calls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }

    /// Runs every call and collects the results in input order.
    ///
    /// Failed calls never abort the batch; inspect
    /// [`BatchOutcome::failures`] or the per-call outcomes.
    #[instrument(skip(self), fields(calls = self.calls.len()))]
    pub async fn execute(&self) -> BatchOutcome {
        let started = Instant::now();
        let concurrency = self.options.max_concurrency.max(1).min(self.calls.len().max(1));
        info!(concurrency, "starting batch");

        let mut results: Vec<BatchCallResult> = stream::iter(self.calls.iter().enumerate())
            .map(|(index, call)| run_with_retries(index, call, &self.options))
            .buffer_unordered(concurrency)
            .collect()
            .await;
        results.sort_by_key(|r| r.index);

        let stats = BatchStats::from_results(&results, started.elapsed(), concurrency);
        info!(
            succeeded = stats.succeeded,
            failed = stats.failed,
            elapsed_ms = stats.elapsed.as_millis() as u64,
            "batch finished"
        );
        BatchOutcome { results, stats }
    }

    /// A new batch holding only the calls that failed in `outcome`.
    pub fn retry_failed(&self, outcome: &BatchOutcome) -> Batch {
        let calls = outcome
            .failures()
            .filter_map(|r| self.calls.get(r.index).cloned())
            .collect();
        Batch {
            calls,
            options: self.options.clone(),
        }
    }
}

async fn run_with_retries(index: usize, call: &BatchCall, options: &BatchOptions) -> BatchCallResult {
    let started = Instant::now();
    let description = call.description();
    let mut attempts = 0;

    let outcome = loop {
        attempts += 1;
        match call.run().await {
            Err(e) if e.is_retryable() && attempts <= options.max_retries => {
                let delay = options.backoff(attempts - 1);
                warn!(call = %description, attempt = attempts, error = %e, ?delay, "retrying batch call");
                tokio::time::sleep(delay).await;
            }
            outcome => break outcome,
        }
    };

    if let Err(e) = &outcome {
        debug!(call = %description, error = %e, "batch call failed");
    }
    BatchCallResult {
        index,
        description,
        outcome,
        attempts,
        elapsed: started.elapsed(),
    }
}

/// One `get_by_id` call per id.
///
/// ## Errors
///
/// Returns [`ModelError::UnknownMethod`] when the service cannot fetch by id.
pub fn batch_from_ids<I>(service: &Service, ids: I) -> Result<Batch, ModelError>
where
    I: IntoIterator,
    I::Item: Into<EntityId>,
{
    let method = method_of_kind(service, OperationKind::GetById)?;
    let calls = ids.into_iter().map(|id| {
        let invocation = Invocation::Get {
            id: id.into(),
            options: None,
        };
        BatchCall::new(service, method.clone(), invocation)
    });
    Ok(Batch::new(calls))
}

/// One `get_list` call per set of query options.
///
/// ## Errors
///
/// Returns [`ModelError::UnknownMethod`] when the service cannot list.
pub fn batch_from_filters(
    service: &Service,
    filters: impl IntoIterator<Item = QueryOptions>,
) -> Result<Batch, ModelError> {
    let method = method_of_kind(service, OperationKind::GetList)?;
    let calls = filters.into_iter().map(|options| {
        let invocation = Invocation::List {
            options: Some(options),
        };
        BatchCall::new(service, method.clone(), invocation)
    });
    Ok(Batch::new(calls))
}

fn method_of_kind(service: &Service, kind: OperationKind) -> Result<String, ModelError> {
    service
        .methods()
        .find(|op| op.kind == kind)
        .map(|op| op.method_name.clone())
        .ok_or_else(|| ModelError::UnknownMethod {
            service: service.entity_name().to_string(),
            method: kind.to_string(),
        })
}
