//! Learning-rate schedules
//!
//! Schedules give the learning rate as a function of how many updates a
//! parameter has received so far.

use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

/// Learning rate as a function of the update count
pub trait LearningRateSchedule {
    /// Learning rate for update number `step` (starting at 0), given the
    /// configured base rate
    fn lr_at(&self, base_lr: f64, step: usize) -> f64;
}

/// Exponential decay: lr(t) = lr₀ * γ^t, floored at `minimum`
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExponentialDecay {
    /// Multiplicative decay per step (γ)
    pub gamma: f64,
    /// Minimum learning rate (floor)
    pub minimum: f64,
}

impl ExponentialDecay {
    /// Create a new exponential decay schedule
    pub fn new(gamma: f64) -> Self {
        Self {
            gamma,
            minimum: 0.0,
        }
    }

    /// Set the minimum learning rate
    pub fn with_minimum(mut self, minimum: f64) -> Self {
        self.minimum = minimum;
        self
    }
}

impl LearningRateSchedule for ExponentialDecay {
    fn lr_at(&self, base_lr: f64, step: usize) -> f64 {
        (base_lr * self.gamma.powf(step as f64)).max(self.minimum)
    }
}

/// Step decay: the rate is multiplied by `gamma` every `step_size` updates
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StepDecay {
    /// Updates between decays
    pub step_size: usize,
    /// Multiplicative decay
    pub gamma: f64,
}

impl StepDecay {
    /// Create a new step decay schedule
    pub fn new(step_size: usize, gamma: f64) -> Self {
        Self { step_size, gamma }
    }
}

impl LearningRateSchedule for StepDecay {
    fn lr_at(&self, base_lr: f64, step: usize) -> f64 {
        if self.step_size == 0 {
            return base_lr;
        }
        base_lr * self.gamma.powi((step / self.step_size) as i32)
    }
}

/// Cosine annealing from the base rate down to `min_lr` over `period`
/// updates, with optional warm restarts
///
/// lr(t) = lr_min + 0.5 * (lr₀ - lr_min) * (1 + cos(π * t / T))
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CosineAnnealing {
    /// Length of one annealing cycle
    pub period: usize,
    /// Learning rate at the end of a cycle
    pub min_lr: f64,
    /// Restart at the base rate after each cycle
    pub warm_restarts: bool,
}

impl CosineAnnealing {
    /// Create a new cosine annealing schedule
    pub fn new(period: usize, min_lr: f64) -> Self {
        Self {
            period,
            min_lr,
            warm_restarts: false,
        }
    }

    /// Enable warm restarts
    pub fn with_warm_restarts(mut self) -> Self {
        self.warm_restarts = true;
        self
    }
}

impl LearningRateSchedule for CosineAnnealing {
    fn lr_at(&self, base_lr: f64, step: usize) -> f64 {
        if self.period == 0 {
            return base_lr;
        }
        let t = if self.warm_restarts {
            step % self.period
        } else {
            step.min(self.period)
        };
        let t = t as f64 / self.period as f64;
        self.min_lr + 0.5 * (base_lr - self.min_lr) * (1.0 + (PI * t).cos())
    }
}

/// Enum-based schedule so optimizer configs stay plain serializable data
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub enum LrSchedule {
    /// Keep the base rate
    #[default]
    Constant,
    Exponential(ExponentialDecay),
    Step(StepDecay),
    Cosine(CosineAnnealing),
}

impl LearningRateSchedule for LrSchedule {
    fn lr_at(&self, base_lr: f64, step: usize) -> f64 {
        match self {
            Self::Constant => base_lr,
            Self::Exponential(s) => s.lr_at(base_lr, step),
            Self::Step(s) => s.lr_at(base_lr, step),
            Self::Cosine(s) => s.lr_at(base_lr, step),
        }
    }
}

impl From<ExponentialDecay> for LrSchedule {
    fn from(s: ExponentialDecay) -> Self {
        Self::Exponential(s)
    }
}

impl From<StepDecay> for LrSchedule {
    fn from(s: StepDecay) -> Self {
        Self::Step(s)
    }
}

impl From<CosineAnnealing> for LrSchedule {
    fn from(s: CosineAnnealing) -> Self {
        Self::Cosine(s)
    }
}
