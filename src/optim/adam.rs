//! Adam (Kingma & Ba, 2014)

use serde::{Deserialize, Serialize};

use super::schedules::{LearningRateSchedule, LrSchedule};
use super::{Optimizer, OptimizerFactory};
use crate::error::{PplError, PplResult};
use crate::tensor::Tensor;

/// Adam configuration
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AdamConfig {
    /// Base learning rate
    pub lr: f64,
    /// Decay rates of the first and second moment estimates
    pub betas: (f64, f64),
    /// Term added to the denominator for numerical stability
    pub eps: f64,
    /// L2 penalty added to the gradient
    pub weight_decay: f64,
    /// Learning-rate schedule
    pub schedule: LrSchedule,
}

impl Default for AdamConfig {
    fn default() -> Self {
        Self {
            lr: 1e-3,
            betas: (0.9, 0.999),
            eps: 1e-8,
            weight_decay: 0.0,
            schedule: LrSchedule::Constant,
        }
    }
}

impl AdamConfig {
    /// Default configuration with the given learning rate
    pub fn new(lr: f64) -> Self {
        Self {
            lr,
            ..Self::default()
        }
    }

    /// Set the moment decay rates
    pub fn with_betas(mut self, beta1: f64, beta2: f64) -> Self {
        self.betas = (beta1, beta2);
        self
    }

    /// Set the numerical-stability term
    pub fn with_eps(mut self, eps: f64) -> Self {
        self.eps = eps;
        self
    }

    /// Set the L2 penalty
    pub fn with_weight_decay(mut self, weight_decay: f64) -> Self {
        self.weight_decay = weight_decay;
        self
    }

    /// Set the learning-rate schedule
    pub fn with_schedule(mut self, schedule: impl Into<LrSchedule>) -> Self {
        self.schedule = schedule.into();
        self
    }
}

/// Per-parameter Adam state
#[derive(Clone, Debug)]
pub struct AdamState {
    config: AdamConfig,
    step_count: usize,
    m: Vec<f64>,
    v: Vec<f64>,
}

impl AdamState {
    /// Number of updates applied so far
    pub fn step_count(&self) -> usize {
        self.step_count
    }
}

impl Optimizer for AdamState {
    fn step(&mut self, param: &Tensor) {
        let Some(grad) = param.grad() else {
            return;
        };
        let grad = grad.to_vec();

        let (b1, b2) = self.config.betas;
        let lr = self.config.schedule.lr_at(self.config.lr, self.step_count);
        self.step_count += 1;
        let t = self.step_count as f64;
        let bc1 = 1.0 - b1.powf(t);
        let bc2 = 1.0 - b2.powf(t);
        let eps = self.config.eps;
        let weight_decay = self.config.weight_decay;
        let (m, v) = (&mut self.m, &mut self.v);

        param.update_data(|data| {
            for i in 0..data.len() {
                let g = grad[i] + weight_decay * data[i];
                m[i] = b1 * m[i] + (1.0 - b1) * g;
                v[i] = b2 * v[i] + (1.0 - b2) * g * g;
                let m_hat = m[i] / bc1;
                let v_hat = v[i] / bc2;
                data[i] -= lr * m_hat / (v_hat.sqrt() + eps);
            }
        });
    }
}

impl OptimizerFactory for AdamConfig {
    type Optim = AdamState;

    fn validate(&self) -> PplResult<()> {
        let (b1, b2) = self.betas;
        if !(self.lr > 0.0) {
            return Err(PplError::InvalidConfiguration(format!(
                "Adam learning rate must be positive, got {}",
                self.lr
            )));
        }
        if !(0.0..1.0).contains(&b1) || !(0.0..1.0).contains(&b2) {
            return Err(PplError::InvalidConfiguration(format!(
                "Adam betas must lie in [0, 1), got ({b1}, {b2})"
            )));
        }
        if self.eps < 0.0 || self.weight_decay < 0.0 {
            return Err(PplError::InvalidConfiguration(
                "Adam eps and weight_decay must be non-negative".to_string(),
            ));
        }
        Ok(())
    }

    fn build(&self, param: &Tensor) -> AdamState {
        AdamState {
            config: self.clone(),
            step_count: 0,
            m: vec![0.0; param.numel()],
            v: vec![0.0; param.numel()],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn leaf_with_grad(value: f64, grad_scale: f64) -> Tensor {
        let p = Tensor::scalar(value);
        p.requires_grad_();
        p.mul_scalar(grad_scale).sum().backward().unwrap();
        p
    }

    #[test]
    fn test_first_step_moves_by_lr() {
        // bias-corrected first step is lr * g / |g|
        let p = leaf_with_grad(1.0, 3.0);
        let mut state = AdamConfig::new(0.1).build(&p);
        state.step(&p);
        assert_relative_eq!(p.item().unwrap(), 0.9, epsilon = 1e-6);
        assert_eq!(state.step_count(), 1);
    }

    #[test]
    fn test_step_without_grad_is_noop() {
        let p = Tensor::scalar(1.0);
        p.requires_grad_();
        let mut state = AdamConfig::new(0.1).build(&p);
        state.step(&p);
        assert_eq!(p.item().unwrap(), 1.0);
        assert_eq!(state.step_count(), 0);
    }

    #[test]
    fn test_converges_on_quadratic() {
        let p = Tensor::scalar(5.0);
        p.requires_grad_();
        let mut state = AdamConfig::new(0.1).build(&p);
        for _ in 0..500 {
            p.square().sum().backward().unwrap();
            state.step(&p);
            p.zero_grad();
        }
        assert!(p.item().unwrap().abs() < 0.05);
    }

    #[test]
    fn test_validate() {
        assert!(AdamConfig::default().validate().is_ok());
        assert!(AdamConfig::new(0.0).validate().is_err());
        assert!(AdamConfig::new(0.1).with_betas(1.0, 0.5).validate().is_err());
    }

    #[test]
    fn test_config_serialization() {
        let config = AdamConfig::new(0.01).with_schedule(super::super::schedules::StepDecay::new(10, 0.5));
        let json = serde_json::to_string(&config).unwrap();
        let back: AdamConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
    }
}
