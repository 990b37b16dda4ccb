//! Probability distributions
//!
//! The interpreter only relies on the narrow [`Distribution`] contract:
//! a batch shape, sampling, log-density and broadcasting via `expand`.
//! Sampling is reparameterized wherever possible, so drawn values stay
//! differentiable with respect to the distribution's parameters.

pub mod constraints;
mod log_normal;
mod normal;

use std::fmt;
use std::rc::Rc;

use rand::rngs::StdRng;

use crate::error::PplResult;
use crate::tensor::Tensor;

pub use constraints::{transform_to, Constraint, Transform};
pub use log_normal::LogNormal;
pub use normal::Normal;

/// A batched probability distribution
pub trait Distribution: fmt::Debug {
    /// Shape of the independent batch of distributions
    fn batch_shape(&self) -> Vec<usize>;

    /// Draw a value of shape `batch_shape`
    fn sample(&self, rng: &mut StdRng) -> PplResult<Tensor>;

    /// Element-wise log-density of `value`
    fn log_prob(&self, value: &Tensor) -> PplResult<Tensor>;

    /// The same distribution broadcast to a larger batch shape
    fn expand(&self, batch_shape: &[usize]) -> PplResult<Rc<dyn Distribution>>;

    /// Whether [`Distribution::sample`] is differentiable in the parameters
    fn has_rsample(&self) -> bool {
        false
    }
}

pub mod prelude {
    pub use super::constraints::*;
    pub use super::{Distribution, LogNormal, Normal};
}
