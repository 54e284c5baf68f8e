//! Job gate: admits one gated job (analyze, suggest, chat, render) at a time.
//!
//! The inference endpoint and the document compiler are both expensive, and the
//! compiler shares one working directory across requests. Every gated handler
//! runs its body while holding a [`GateGuard`]; the guard releases on drop, so
//! release happens on every exit path including cancellation.
//!
//! Waiters are not ordered. A waiter whose future is dropped while queued
//! (e.g. an outer `tokio::time::timeout` fired) leaves the wait set without
//! ever running its body.

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::{Mutex, MutexGuard};
use tracing::debug;

/// Process-wide serialization primitive. Cheap to clone; all clones share the
/// same underlying lock.
#[derive(Clone, Default)]
pub struct JobGate {
    inner: Arc<Mutex<()>>,
}

/// Held for the duration of a gated job body. Dropping it releases the gate.
pub struct GateGuard<'a> {
    job: &'static str,
    acquired_at: Instant,
    _permit: MutexGuard<'a, ()>,
}

impl JobGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Suspends until the gate is free, then returns the guard.
    pub async fn acquire(&self, job: &'static str) -> GateGuard<'_> {
        let queued_at = Instant::now();
        let permit = self.inner.lock().await;
        debug!(
            job,
            waited_ms = queued_at.elapsed().as_millis() as u64,
            "job gate acquired"
        );
        GateGuard {
            job,
            acquired_at: Instant::now(),
            _permit: permit,
        }
    }

    /// Runs `body` while holding the gate.
    pub async fn run<F, T>(&self, job: &'static str, body: F) -> T
    where
        F: Future<Output = T>,
    {
        let _guard = self.acquire(job).await;
        body.await
    }

    /// True when no job currently holds the gate.
    #[cfg(test)]
    pub fn is_idle(&self) -> bool {
        self.inner.try_lock().is_ok()
    }
}

impl Drop for GateGuard<'_> {
    fn drop(&mut self) {
        debug!(
            job = self.job,
            held_ms = self.acquired_at.elapsed().as_millis() as u64,
            "job gate released"
        );
    }
}
