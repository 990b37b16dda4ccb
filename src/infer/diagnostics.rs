//! Loss history and fit results
//!
//! Statistics over the sequence of losses returned by SVI steps.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

/// Losses recorded by successive SVI steps
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LossHistory {
    losses: VecDeque<f64>,
    capacity: Option<usize>,
    total_steps: usize,
}

impl LossHistory {
    /// Create an unbounded history
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a history keeping only the most recent `capacity` losses
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            losses: VecDeque::with_capacity(capacity),
            capacity: Some(capacity),
            total_steps: 0,
        }
    }

    /// Record one loss
    pub fn record(&mut self, loss: f64) {
        if let Some(capacity) = self.capacity {
            if self.losses.len() >= capacity {
                self.losses.pop_front();
            }
        }
        self.losses.push_back(loss);
        self.total_steps += 1;
    }

    /// Retained losses, oldest first
    pub fn losses(&self) -> Vec<f64> {
        self.losses.iter().copied().collect()
    }

    /// Iterate over the retained losses, oldest first
    pub fn iter(&self) -> impl Iterator<Item = f64> + '_ {
        self.losses.iter().copied()
    }

    /// Number of retained losses
    pub fn len(&self) -> usize {
        self.losses.len()
    }

    /// Whether nothing was recorded
    pub fn is_empty(&self) -> bool {
        self.losses.is_empty()
    }

    /// Number of losses ever recorded, including evicted ones
    pub fn total_steps(&self) -> usize {
        self.total_steps
    }

    /// Most recent loss
    pub fn last(&self) -> Option<f64> {
        self.losses.back().copied()
    }

    /// Smallest retained loss
    pub fn min(&self) -> Option<f64> {
        self.losses.iter().copied().reduce(f64::min)
    }

    /// Mean of the retained losses
    pub fn mean(&self) -> Option<f64> {
        if self.losses.is_empty() {
            return None;
        }
        Some(self.losses.iter().sum::<f64>() / self.losses.len() as f64)
    }

    /// Mean of the last `window` losses
    pub fn moving_average(&self, window: usize) -> Option<f64> {
        if window == 0 || self.losses.len() < window {
            return None;
        }
        Some(self.window_mean(self.losses.len() - window, window))
    }

    /// Relative decrease of the mean loss between the two most recent
    /// windows of `window` steps. Positive means the loss went down.
    pub fn relative_improvement(&self, window: usize) -> Option<f64> {
        let span = window.checked_mul(2)?;
        if window == 0 || self.losses.len() < span {
            return None;
        }
        let n = self.losses.len();
        let previous = self.window_mean(n - span, window);
        let recent = self.window_mean(n - window, window);
        let scale = previous.abs().max(f64::EPSILON);
        Some((previous - recent) / scale)
    }

    fn window_mean(&self, start: usize, window: usize) -> f64 {
        self.losses.range(start..start + window).sum::<f64>() / window as f64
    }
}

/// Outcome of [`Svi::fit`](super::Svi::fit)
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FitResult {
    /// Steps taken by this fit
    pub steps: usize,
    /// Loss of the last step
    pub final_loss: Option<f64>,
    /// Why fitting stopped
    pub reason: String,
    /// Losses of the whole run
    pub history: LossHistory,
}
