//! Minimum-liability scanning with uniform tie-breaking.

use crate::games::CombinationSpace;
use crate::ledger::LiabilitySnapshot;
use rand::Rng;

/// Relative tolerance for liability comparisons, absolute below 1.0
pub const LIABILITY_EPSILON: f64 = 1e-9;

fn tolerance(a: f64, b: f64) -> f64 {
    LIABILITY_EPSILON * a.abs().max(b.abs()).max(1.0)
}

/// Equal up to float rounding at their magnitude
pub fn liabilities_equal(a: f64, b: f64) -> bool {
    (a - b).abs() <= tolerance(a, b)
}

fn strictly_below(a: f64, b: f64) -> bool {
    a < b - tolerance(a, b)
}

/// Running minimum over a stream of `(index, liability)` pairs.
///
/// Ties are resolved by reservoir sampling so every minimal outcome is equally
/// likely, and two trackers can be merged without losing that property.
#[derive(Debug, Clone, Default)]
pub struct MinTracker {
    best: Option<(u32, f64)>,
    ties: u64,
    evaluated: u64,
}

impl MinTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn offer<R: Rng + ?Sized>(&mut self, index: u32, liability: f64, rng: &mut R) {
        self.evaluated += 1;
        match self.best {
            None => {
                self.best = Some((index, liability));
                self.ties = 1;
            }
            Some((_, best)) if strictly_below(liability, best) => {
                self.best = Some((index, liability));
                self.ties = 1;
            }
            Some((_, best)) if liabilities_equal(liability, best) => {
                self.ties += 1;
                if rng.gen_range(0..self.ties) == 0 {
                    self.best = Some((index, liability));
                }
            }
            Some(_) => {}
        }
    }

    /// Fold another tracker in, weighting equal minima by their tie counts
    pub fn merge<R: Rng + ?Sized>(&mut self, other: MinTracker, rng: &mut R) {
        self.evaluated += other.evaluated;
        let Some((other_index, other_liability)) = other.best else {
            return;
        };
        match self.best {
            None => {
                self.best = other.best;
                self.ties = other.ties;
            }
            Some((_, best)) if strictly_below(other_liability, best) => {
                self.best = other.best;
                self.ties = other.ties;
            }
            Some((_, best)) if liabilities_equal(other_liability, best) => {
                let total = self.ties + other.ties;
                if rng.gen_range(0..total) < other.ties {
                    self.best = Some((other_index, other_liability));
                }
                self.ties = total;
            }
            Some(_) => {}
        }
    }

    pub fn best(&self) -> Option<(u32, f64)> {
        self.best
    }

    /// Number of outcomes sharing the current minimum
    pub fn ties(&self) -> u64 {
        self.ties
    }

    pub fn evaluated(&self) -> u64 {
        self.evaluated
    }
}

/// Evaluate `candidates` against the snapshot
pub fn scan<I, R>(
    snapshot: &LiabilitySnapshot,
    space: &CombinationSpace,
    candidates: I,
    rng: &mut R,
) -> MinTracker
where
    I: IntoIterator<Item = u32>,
    R: Rng + ?Sized,
{
    let mut tracker = MinTracker::new();
    for index in candidates {
        tracker.offer(index, snapshot.liability(space, index), rng);
    }
    tracker
}
