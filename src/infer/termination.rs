//! Termination criteria
//!
//! This module provides stopping rules for [`Svi::fit`](super::Svi::fit).

use super::diagnostics::LossHistory;

/// Fitting state for termination checking
#[derive(Clone, Copy, Debug)]
pub struct SviState<'a> {
    /// Steps taken by the current fit
    pub step: usize,
    /// Losses recorded so far
    pub history: &'a LossHistory,
}

/// Termination criterion trait
pub trait TerminationCriterion {
    /// Check if fitting should stop
    fn should_terminate(&self, state: &SviState<'_>) -> bool;

    /// Get a description of why fitting stopped
    fn reason(&self) -> &'static str;
}

/// Stop after a fixed number of steps
#[derive(Clone, Debug)]
pub struct MaxSteps(pub usize);

impl MaxSteps {
    /// Create a new max steps criterion
    pub fn new(max: usize) -> Self {
        Self(max)
    }
}

impl TerminationCriterion for MaxSteps {
    fn should_terminate(&self, state: &SviState<'_>) -> bool {
        state.step >= self.0
    }

    fn reason(&self) -> &'static str {
        "Maximum steps reached"
    }
}

/// Stop when the smoothed loss stops moving.
///
/// Compares the mean loss of the last `window` steps with the mean of the
/// `window` steps before them; single-sample ELBO estimates are too noisy
/// to compare step by step.
#[derive(Clone, Debug)]
pub struct LossPlateau {
    /// Steps per averaging window
    pub window: usize,
    /// Minimum relative improvement
    pub epsilon: f64,
}

impl LossPlateau {
    /// Create a new loss plateau criterion
    pub fn new(window: usize, epsilon: f64) -> Self {
        Self { window, epsilon }
    }
}

impl TerminationCriterion for LossPlateau {
    fn should_terminate(&self, state: &SviState<'_>) -> bool {
        state
            .history
            .relative_improvement(self.window)
            .is_some_and(|improvement| improvement.abs() < self.epsilon)
    }

    fn reason(&self) -> &'static str {
        "Loss plateau detected"
    }
}

/// Stop once the loss is at or below a target
#[derive(Clone, Debug)]
pub struct TargetLoss {
    /// Target loss value
    pub target: f64,
    /// Tolerance for reaching the target
    pub tolerance: f64,
}

impl TargetLoss {
    /// Create a new target loss criterion
    pub fn new(target: f64) -> Self {
        Self {
            target,
            tolerance: 0.0,
        }
    }

    /// Create with a tolerance
    pub fn with_tolerance(target: f64, tolerance: f64) -> Self {
        Self { target, tolerance }
    }
}

impl TerminationCriterion for TargetLoss {
    fn should_terminate(&self, state: &SviState<'_>) -> bool {
        state
            .history
            .last()
            .is_some_and(|loss| loss <= self.target + self.tolerance)
    }

    fn reason(&self) -> &'static str {
        "Target loss reached"
    }
}

/// Combine criteria with OR logic (any one triggers termination)
pub struct AnyOf {
    criteria: Vec<Box<dyn TerminationCriterion>>,
}

impl AnyOf {
    /// Create a new AnyOf combinator
    pub fn new(criteria: Vec<Box<dyn TerminationCriterion>>) -> Self {
        Self { criteria }
    }

    /// The first criterion that fires
    pub fn triggered(&self, state: &SviState<'_>) -> Option<&dyn TerminationCriterion> {
        self.criteria
            .iter()
            .find(|c| c.should_terminate(state))
            .map(|c| c.as_ref())
    }
}

impl TerminationCriterion for AnyOf {
    fn should_terminate(&self, state: &SviState<'_>) -> bool {
        self.criteria.iter().any(|c| c.should_terminate(state))
    }

    fn reason(&self) -> &'static str {
        "One of multiple criteria met"
    }
}

/// Combine criteria with AND logic (all must trigger for termination)
pub struct AllOf {
    criteria: Vec<Box<dyn TerminationCriterion>>,
}

impl AllOf {
    /// Create a new AllOf combinator
    pub fn new(criteria: Vec<Box<dyn TerminationCriterion>>) -> Self {
        Self { criteria }
    }
}

impl TerminationCriterion for AllOf {
    fn should_terminate(&self, state: &SviState<'_>) -> bool {
        !self.criteria.is_empty() && self.criteria.iter().all(|c| c.should_terminate(state))
    }

    fn reason(&self) -> &'static str {
        "All criteria met"
    }
}
