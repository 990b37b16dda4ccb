//! Stochastic gradient descent with optional momentum
//!
//! Update rule (no momentum):  `param -= lr * grad`
//! Update rule (momentum):     `v = momentum * v + grad; param -= lr * v`

use serde::{Deserialize, Serialize};

use super::schedules::{LearningRateSchedule, LrSchedule};
use super::{Optimizer, OptimizerFactory};
use crate::error::{PplError, PplResult};
use crate::tensor::Tensor;

/// SGD configuration
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SgdConfig {
    /// Base learning rate
    pub lr: f64,
    /// Momentum factor; 0 disables momentum
    pub momentum: f64,
    /// Learning-rate schedule
    pub schedule: LrSchedule,
}

impl Default for SgdConfig {
    fn default() -> Self {
        Self {
            lr: 1e-2,
            momentum: 0.0,
            schedule: LrSchedule::Constant,
        }
    }
}

impl SgdConfig {
    /// Plain SGD with the given learning rate
    pub fn new(lr: f64) -> Self {
        Self {
            lr,
            ..Self::default()
        }
    }

    /// Set the momentum factor
    pub fn with_momentum(mut self, momentum: f64) -> Self {
        self.momentum = momentum;
        self
    }

    /// Set the learning-rate schedule
    pub fn with_schedule(mut self, schedule: impl Into<LrSchedule>) -> Self {
        self.schedule = schedule.into();
        self
    }
}

/// Per-parameter SGD state
#[derive(Clone, Debug)]
pub struct SgdState {
    config: SgdConfig,
    step_count: usize,
    velocity: Vec<f64>,
}

impl Optimizer for SgdState {
    fn step(&mut self, param: &Tensor) {
        let Some(grad) = param.grad() else {
            return;
        };
        let grad = grad.to_vec();
        let lr = self.config.schedule.lr_at(self.config.lr, self.step_count);
        self.step_count += 1;
        let momentum = self.config.momentum;
        let velocity = &mut self.velocity;

        param.update_data(|data| {
            for i in 0..data.len() {
                if momentum == 0.0 {
                    data[i] -= lr * grad[i];
                } else {
                    velocity[i] = momentum * velocity[i] + grad[i];
                    data[i] -= lr * velocity[i];
                }
            }
        });
    }
}

impl OptimizerFactory for SgdConfig {
    type Optim = SgdState;

    fn validate(&self) -> PplResult<()> {
        if !(self.lr > 0.0) || self.momentum < 0.0 {
            return Err(PplError::InvalidConfiguration(format!(
                "SGD needs lr > 0 and momentum >= 0, got lr = {}, momentum = {}",
                self.lr, self.momentum
            )));
        }
        Ok(())
    }

    fn build(&self, param: &Tensor) -> SgdState {
        SgdState {
            config: self.clone(),
            step_count: 0,
            velocity: vec![0.0; param.numel()],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_plain_step() {
        let p = Tensor::from_vec(vec![1.0, 2.0]);
        p.requires_grad_();
        p.square().sum().backward().unwrap();
        let mut state = SgdConfig::new(0.1).build(&p);
        state.step(&p);
        // grad = 2p
        assert_relative_eq!(p.to_vec()[0], 0.8, epsilon = 1e-12);
        assert_relative_eq!(p.to_vec()[1], 1.6, epsilon = 1e-12);
    }

    #[test]
    fn test_momentum_accumulates() {
        let p = Tensor::scalar(0.0);
        p.requires_grad_();
        let mut state = SgdConfig::new(1.0).with_momentum(0.5).build(&p);
        for _ in 0..2 {
            p.mul_scalar(1.0).sum().backward().unwrap();
            state.step(&p);
            p.zero_grad();
        }
        // v1 = 1, v2 = 1.5
        assert_relative_eq!(p.item().unwrap(), -2.5, epsilon = 1e-12);
    }

    #[test]
    fn test_validate() {
        assert!(SgdConfig::default().validate().is_ok());
        assert!(SgdConfig::new(-1.0).validate().is_err());
    }
}
