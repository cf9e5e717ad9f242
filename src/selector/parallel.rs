//! Chunked minimum search across blocking worker threads.
//!
//! The space is split into contiguous chunks, each scanned on the blocking
//! pool. All workers are joined under a single deadline; a timeout or a
//! panicked worker fails the whole evaluation so the caller can fall through
//! to another strategy. Workers poll a shared cancel flag and stop once the
//! evaluation is abandoned.

use super::scan::MinTracker;
use crate::config::ParallelConfig;
use crate::errors::StrategyError;
use crate::games::CombinationSpace;
use crate::ledger::LiabilitySnapshot;
use futures::future::join_all;
use rand::Rng;
use std::ops::Range;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Outcomes scanned between checks of the cancel flag
const CANCEL_CHECK_INTERVAL: u32 = 256;

/// Raises the flag when the evaluation returns or is dropped
struct CancelOnDrop(Arc<AtomicBool>);

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        self.0.store(true, Ordering::Relaxed);
    }
}

/// Scan `range`, giving up with `None` once `cancelled` is set
fn scan_chunk<R: Rng + ?Sized>(
    snapshot: &LiabilitySnapshot,
    space: &CombinationSpace,
    range: Range<u32>,
    cancelled: &AtomicBool,
    rng: &mut R,
) -> Option<MinTracker> {
    let mut tracker = MinTracker::new();
    for index in range.clone() {
        if (index - range.start) % CANCEL_CHECK_INTERVAL == 0 && cancelled.load(Ordering::Relaxed) {
            return None;
        }
        tracker.offer(index, snapshot.liability(space, index), rng);
    }
    Some(tracker)
}

#[derive(Debug, Clone)]
pub struct ParallelEvaluator {
    workers: usize,
    timeout: Duration,
}

impl ParallelEvaluator {
    pub fn new(config: &ParallelConfig) -> Self {
        Self {
            workers: config.worker_count().max(1),
            timeout: config.timeout(),
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Minimum-liability outcome over the whole space
    pub async fn evaluate(
        &self,
        space: Arc<CombinationSpace>,
        snapshot: Arc<LiabilitySnapshot>,
    ) -> Result<(u32, f64), StrategyError> {
        let len = space.len();
        if len == 0 {
            return Err(StrategyError::SpaceExhausted);
        }
        let chunk = len.div_ceil(self.workers as u32).max(1);
        let cancelled = Arc::new(AtomicBool::new(false));
        let _cancel = CancelOnDrop(cancelled.clone());

        let handles: Vec<_> = (0..len)
            .step_by(chunk as usize)
            .map(|start| {
                let end = (start + chunk).min(len);
                let space = space.clone();
                let snapshot = snapshot.clone();
                let cancelled = cancelled.clone();
                tokio::task::spawn_blocking(move || {
                    let mut rng = rand::thread_rng();
                    scan_chunk(&snapshot, &space, start..end, &cancelled, &mut rng)
                })
            })
            .collect();
        let chunks = handles.len();

        let joined = match tokio::time::timeout(self.timeout, join_all(handles)).await {
            Ok(joined) => joined,
            Err(_) => {
                cancelled.store(true, Ordering::Relaxed);
                tracing::warn!(round = %snapshot.round, timeout = ?self.timeout, "Parallel evaluation timed out, cancelling workers");
                return Err(StrategyError::Timeout(self.timeout));
            }
        };

        let mut rng = rand::thread_rng();
        let mut total = MinTracker::new();
        for result in joined {
            let tracker = result
                .map_err(|e| StrategyError::WorkerFailed(e.to_string()))?
                .ok_or(StrategyError::Timeout(self.timeout))?;
            total.merge(tracker, &mut rng);
        }

        tracing::debug!(
            round = %snapshot.round,
            chunks,
            evaluated = total.evaluated(),
            "Parallel evaluation finished"
        );
        total.best().ok_or(StrategyError::SpaceExhausted)
    }
}
