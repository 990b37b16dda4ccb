//! Gradient-based optimizers
//!
//! Optimizers act on one parameter at a time. [`ParamOptimizer`] wraps a
//! configuration and lazily builds one optimizer per distinct parameter,
//! memoized by tensor identity, so that parameters created on the fly by a
//! model get their own state the first time they are optimized.

mod adam;
pub mod schedules;
mod sgd;

use std::collections::HashMap;

use tracing::debug;

use crate::error::PplResult;
use crate::tensor::{Tensor, TensorId, WeakTensor};

pub use adam::{AdamConfig, AdamState};
pub use schedules::{LearningRateSchedule, LrSchedule};
pub use sgd::{SgdConfig, SgdState};

/// Optimizer for a single parameter
pub trait Optimizer {
    /// Apply one update using the parameter's accumulated gradient.
    ///
    /// Parameters without a gradient are left untouched.
    fn step(&mut self, param: &Tensor);
}

/// Configuration object that builds per-parameter optimizers
pub trait OptimizerFactory {
    /// Optimizer built for each parameter
    type Optim: Optimizer;

    /// Check the configuration
    fn validate(&self) -> PplResult<()> {
        Ok(())
    }

    /// Build a fresh optimizer for `param`
    fn build(&self, param: &Tensor) -> Self::Optim;
}

/// Lazily allocates one optimizer per distinct parameter
pub struct ParamOptimizer<F: OptimizerFactory> {
    config: F,
    optim_objs: HashMap<TensorId, (WeakTensor, F::Optim)>,
}

/// Adam over every parameter it is stepped with
pub type Adam = ParamOptimizer<AdamConfig>;

/// SGD over every parameter it is stepped with
pub type Sgd = ParamOptimizer<SgdConfig>;

impl<F: OptimizerFactory> ParamOptimizer<F> {
    /// Create the wrapper; fails if the configuration is invalid
    pub fn new(config: F) -> PplResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            optim_objs: HashMap::new(),
        })
    }

    /// The configuration new optimizers are built from
    pub fn config(&self) -> &F {
        &self.config
    }

    /// Number of parameters that have an optimizer
    pub fn num_optimizers(&self) -> usize {
        self.optim_objs.len()
    }

    /// Optimizer state of a parameter, if it has been stepped
    pub fn state(&self, param: &Tensor) -> Option<&F::Optim> {
        self.optim_objs
            .get(&param.id())
            .filter(|(weak, _)| weak.upgrade().is_some_and(|p| p.ptr_eq(param)))
            .map(|(_, optim)| optim)
    }

    /// Apply one update to each parameter with its own optimizer
    pub fn step(&mut self, params: &[Tensor]) {
        for param in params {
            let live = self
                .optim_objs
                .get(&param.id())
                .is_some_and(|(weak, _)| weak.upgrade().is_some_and(|p| p.ptr_eq(param)));
            // an identity reused by a new tensor gets fresh state
            if !live {
                debug!(id = ?param.id(), shape = ?param.shape(), "allocated optimizer for parameter");
                let optim = self.config.build(param);
                self.optim_objs.insert(param.id(), (param.downgrade(), optim));
            }
            if let Some((_, optim)) = self.optim_objs.get_mut(&param.id()) {
                optim.step(param);
            }
        }
    }
}

pub mod prelude {
    pub use super::schedules::*;
    pub use super::{Adam, AdamConfig, Optimizer, OptimizerFactory, ParamOptimizer, Sgd, SgdConfig};
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tracked(value: f64) -> Tensor {
        let p = Tensor::scalar(value);
        p.requires_grad_();
        p
    }

    #[test]
    fn test_optimizer_memoized_per_parameter() {
        let a = tracked(1.0);
        let b = tracked(2.0);
        let mut optim = Adam::new(AdamConfig::new(0.1)).unwrap();

        for _ in 0..3 {
            a.add(&b).unwrap().sum().backward().unwrap();
            optim.step(&[a.clone(), b.clone()]);
            a.zero_grad();
            b.zero_grad();
        }
        assert_eq!(optim.num_optimizers(), 2);
        assert_eq!(optim.state(&a).unwrap().step_count(), 3);
        assert_eq!(optim.state(&b).unwrap().step_count(), 3);

        let c = tracked(0.0);
        assert!(optim.state(&c).is_none());
        c.sum().backward().unwrap();
        optim.step(&[c.clone()]);
        assert_eq!(optim.num_optimizers(), 3);
        assert_eq!(optim.state(&c).unwrap().step_count(), 1);
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        assert!(Sgd::new(SgdConfig::new(0.0)).is_err());
    }

    #[test]
    fn test_wrapper_updates_parameters() {
        let p = tracked(1.0);
        p.mul_scalar(2.0).sum().backward().unwrap();
        let mut optim = Sgd::new(SgdConfig::new(0.5)).unwrap();
        optim.step(std::slice::from_ref(&p));
        approx::assert_relative_eq!(p.item().unwrap(), 0.0, epsilon = 1e-12);
    }
}
