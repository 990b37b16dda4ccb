//! Variational inference
//!
//! The ELBO is computed by running the guide under a trace and then the
//! model under a trace that replays the guide's values. [`Svi`] drives the
//! optimization: loss, backward pass, parameter update, gradient reset.

mod diagnostics;
mod elbo;
mod svi;
pub mod termination;

pub use diagnostics::{FitResult, LossHistory};
pub use elbo::{elbo, Loss, Model, TraceElbo};
pub use svi::{Svi, SviConfig};
pub use termination::{
    AllOf, AnyOf, LossPlateau, MaxSteps, SviState, TargetLoss, TerminationCriterion,
};

pub mod prelude {
    pub use super::termination::*;
    pub use super::{elbo, FitResult, Loss, LossHistory, Model, Svi, SviConfig, TraceElbo};
}
