//! Bounded fan-out for independent per-resource mutations.
//!
//! Each task returns its own result; Success/Failed identifier lists are
//! merged only after every task has finished, so no collection is shared
//! across concurrent workers. One resource's failure never aborts siblings.

use futures::stream::{FuturesUnordered, StreamExt};
use std::fmt;
use std::future::Future;

/// How many mutating calls run at once within a single fail_az invocation.
pub const DEFAULT_CONCURRENCY: usize = 8;

/// Per-batch outcome: identifiers that mutated successfully and identifiers
/// whose mutation failed, for operator inspection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchOutcome<I = String> {
    pub success: Vec<I>,
    pub failed: Vec<I>,
}

impl<I> Default for BatchOutcome<I> {
    fn default() -> Self {
        Self {
            success: Vec::new(),
            failed: Vec::new(),
        }
    }
}

impl<I> BatchOutcome<I> {
    pub fn is_empty(&self) -> bool {
        self.success.is_empty() && self.failed.is_empty()
    }
}

/// Runs `op` for every identifier with at most `limit` in flight, collecting
/// each identifier into `success` or `failed`. Failures are logged and
/// recorded, never propagated: partial failure is a reported semantic here.
pub async fn join_bounded<I, F, Fut, E>(limit: usize, ids: Vec<I>, op: F) -> BatchOutcome<I>
where
    I: fmt::Display,
    F: Fn(I) -> Fut,
    Fut: Future<Output = Result<I, (I, E)>>,
    E: fmt::Display,
{
    let limit = limit.max(1);
    let mut outcome = BatchOutcome::default();
    let mut pending = ids.into_iter();
    let mut in_flight = FuturesUnordered::new();

    loop {
        while in_flight.len() < limit {
            match pending.next() {
                Some(id) => in_flight.push(op(id)),
                None => break,
            }
        }
        match in_flight.next().await {
            Some(Ok(id)) => outcome.success.push(id),
            Some(Err((id, e))) => {
                tracing::error!(id = %id, error = %e, "Resource mutation failed");
                outcome.failed.push(id);
            }
            None => break,
        }
    }

    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn failures_do_not_abort_siblings() {
        let ids = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let outcome = join_bounded(2, ids, |id| async move {
            if id == "b" {
                Err((id, "boom"))
            } else {
                Ok(id)
            }
        })
        .await;

        let mut success = outcome.success.clone();
        success.sort();
        assert_eq!(success, vec!["a", "c"]);
        assert_eq!(outcome.failed, vec!["b"]);
    }

    #[tokio::test]
    async fn concurrency_stays_bounded() {
        let live = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let ids: Vec<String> = (0..20).map(|i| i.to_string()).collect();

        let outcome = join_bounded(3, ids, |id| {
            let live = live.clone();
            let peak = peak.clone();
            async move {
                let now = live.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(std::time::Duration::from_millis(2)).await;
                live.fetch_sub(1, Ordering::SeqCst);
                Ok::<_, (String, String)>(id)
            }
        })
        .await;

        assert_eq!(outcome.success.len(), 20);
        assert!(peak.load(Ordering::SeqCst) <= 3);
    }
}
