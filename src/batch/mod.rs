//! Concurrent verification of address lists.
//!
//! A [`BatchRunner`] owns a dedicated `rayon` pool sized by
//! [`BatchOptions::workers`]; results come back in input order whatever the
//! completion order was.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use rayon::prelude::*;
use thiserror::Error;

use crate::syntax::normalize_address;
use crate::verifier::{Status, VerificationResult, Verifier};

pub const DEFAULT_WORKERS: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchOptions {
    /// Upper bound on concurrently running verifications.
    pub workers: usize,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
        }
    }
}

#[derive(Debug, Error)]
pub enum BatchError {
    #[error("batch worker count must be at least 1")]
    NoWorkers,
    #[error("failed to build worker pool: {source}")]
    Pool {
        #[source]
        source: rayon::ThreadPoolBuildError,
    },
}

/// Shared stop flag. Items not yet started when it is set come back as
/// [`Status::Cancelled`].
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

pub struct BatchRunner {
    verifier: Arc<Verifier>,
    pool: rayon::ThreadPool,
    workers: usize,
    cancel: CancellationToken,
}

impl std::fmt::Debug for BatchRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchRunner")
            .field("workers", &self.workers)
            .field("cancelled", &self.cancel.is_cancelled())
            .finish_non_exhaustive()
    }
}

impl BatchRunner {
    pub fn new(verifier: Arc<Verifier>, options: BatchOptions) -> Result<Self, BatchError> {
        if options.workers == 0 {
            return Err(BatchError::NoWorkers);
        }
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(options.workers)
            .thread_name(|index| format!("mailprobe-worker-{index}"))
            .build()
            .map_err(|source| BatchError::Pool { source })?;
        Ok(Self {
            verifier,
            pool,
            workers: options.workers,
            cancel: CancellationToken::new(),
        })
    }

    /// Replace the runner's token, e.g. with one shared with a signal handler.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn verifier(&self) -> &Arc<Verifier> {
        &self.verifier
    }

    /// One result per input, same order as `addresses`.
    pub fn verify_batch<S>(&self, addresses: &[S]) -> Vec<VerificationResult>
    where
        S: AsRef<str> + Sync,
    {
        tracing::info!(
            total = addresses.len(),
            workers = self.workers,
            "starting batch"
        );
        let cancelled = AtomicUsize::new(0);

        let results: Vec<VerificationResult> = self.pool.install(|| {
            addresses
                .par_iter()
                .map(|raw| {
                    let raw = raw.as_ref();
                    if self.cancel.is_cancelled() {
                        cancelled.fetch_add(1, Ordering::Relaxed);
                        return VerificationResult::new(normalize_address(raw), Status::Cancelled);
                    }
                    self.verifier.verify_one(raw)
                })
                .collect()
        });

        let valid = results.iter().filter(|r| r.status.is_valid()).count();
        tracing::info!(
            total = results.len(),
            valid,
            cancelled = cancelled.load(Ordering::Relaxed),
            "batch complete"
        );
        results
    }
}

impl Verifier {
    /// Run `addresses` through a fresh runner with [`DEFAULT_WORKERS`].
    pub fn verify_batch<S>(
        self: &Arc<Self>,
        addresses: &[S],
    ) -> Result<Vec<VerificationResult>, BatchError>
    where
        S: AsRef<str> + Sync,
    {
        let runner = BatchRunner::new(Arc::clone(self), BatchOptions::default())?;
        Ok(runner.verify_batch(addresses))
    }
}
