//! Stochastic variational inference
//!
//! Each step computes the loss with every `sample` site hidden from an
//! outer trace, so that trace captures exactly the `param` sites touched by
//! the model and the guide. Their unconstrained leaves are what the
//! optimizer updates.

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use super::diagnostics::{FitResult, LossHistory};
use super::elbo::{Loss, Model, TraceElbo};
use super::termination::{SviState, TerminationCriterion};
use crate::error::{PplError, PplResult};
use crate::optim::{AdamConfig, OptimizerFactory, ParamOptimizer};
use crate::params;
use crate::poutine::{BlockMessenger, Messenger, SiteKind, TraceMessenger};
use crate::tensor::{no_grad, Tensor};

/// SVI configuration
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SviConfig {
    /// Keep only this many recent losses (None = keep all)
    pub history_capacity: Option<usize>,
    /// Emit a debug event every this many steps (0 = never)
    pub log_interval: usize,
}

impl Default for SviConfig {
    fn default() -> Self {
        Self {
            history_capacity: None,
            log_interval: 100,
        }
    }
}

impl SviConfig {
    /// Set the loss-history capacity
    pub fn with_history_capacity(mut self, capacity: usize) -> Self {
        self.history_capacity = Some(capacity);
        self
    }

    /// Set the logging interval
    pub fn with_log_interval(mut self, interval: usize) -> Self {
        self.log_interval = interval;
        self
    }

    /// Check the configuration
    pub fn validate(&self) -> PplResult<()> {
        if self.history_capacity == Some(0) {
            return Err(PplError::InvalidConfiguration(
                "history capacity must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// SVI driver: fits the parameters of `guide` (and `model`) by minimizing
/// `loss` with the optimizer
pub struct Svi<M, G, F: OptimizerFactory = AdamConfig, L = TraceElbo> {
    model: M,
    guide: G,
    optim: ParamOptimizer<F>,
    loss: L,
    config: SviConfig,
    history: LossHistory,
}

impl<M, G, F: OptimizerFactory, L> Svi<M, G, F, L> {
    /// Create a driver with the default configuration
    pub fn new(model: M, guide: G, optim: ParamOptimizer<F>, loss: L) -> Self {
        Self {
            model,
            guide,
            optim,
            loss,
            config: SviConfig::default(),
            history: LossHistory::new(),
        }
    }

    /// Replace the configuration; resets the loss history
    pub fn with_config(mut self, config: SviConfig) -> PplResult<Self> {
        config.validate()?;
        self.history = match config.history_capacity {
            Some(capacity) => LossHistory::with_capacity(capacity),
            None => LossHistory::new(),
        };
        self.config = config;
        Ok(self)
    }

    /// Losses of all steps taken so far
    pub fn history(&self) -> &LossHistory {
        &self.history
    }

    /// Number of steps taken so far
    pub fn steps(&self) -> usize {
        self.history.total_steps()
    }

    /// The optimizer wrapper
    pub fn optim(&self) -> &ParamOptimizer<F> {
        &self.optim
    }

    /// Take one gradient step and return the loss before the update
    pub fn step<A>(&mut self, args: &A) -> PplResult<f64>
    where
        A: ?Sized,
        M: Model<A>,
        G: Model<A>,
        L: Loss<A>,
    {
        let (capture, loss) = TraceMessenger::new().run(|| {
            BlockMessenger::hide_types(&[SiteKind::Sample])
                .run(|| self.loss.loss(&self.model, &self.guide, args))
                .1
        });
        let loss = loss?;
        let param_capture = capture.into_trace();

        loss.backward()?;

        let params = param_capture
            .param_sites()
            .map(|site| {
                site.value
                    .as_ref()
                    .and_then(params::unconstrained_of)
                    .ok_or_else(|| PplError::UnknownParameter(site.name.clone()))
            })
            .collect::<PplResult<Vec<Tensor>>>()?;

        self.optim.step(&params);
        for param in &params {
            param.zero_grad();
        }

        let value = loss.item()?;
        self.history.record(value);
        let step = self.history.total_steps();
        trace!(step, loss = value, params = params.len(), "svi step");
        if self.config.log_interval > 0 && step % self.config.log_interval == 0 {
            debug!(step, loss = value, "svi progress");
        }
        Ok(value)
    }

    /// Estimate the loss without taking a step or recording gradients
    pub fn evaluate_loss<A>(&self, args: &A) -> PplResult<f64>
    where
        A: ?Sized,
        M: Model<A>,
        G: Model<A>,
        L: Loss<A>,
    {
        let loss = no_grad(|| self.loss.loss(&self.model, &self.guide, args))?;
        Ok(loss.item()?)
    }

    /// Step until `criterion` fires
    pub fn fit<A>(&mut self, args: &A, criterion: &dyn TerminationCriterion) -> PplResult<FitResult>
    where
        A: ?Sized,
        M: Model<A>,
        G: Model<A>,
        L: Loss<A>,
    {
        let mut steps = 0;
        loop {
            let state = SviState {
                step: steps,
                history: &self.history,
            };
            if criterion.should_terminate(&state) {
                break;
            }
            self.step(args)?;
            steps += 1;
        }

        debug!(steps, reason = criterion.reason(), "fit finished");
        Ok(FitResult {
            steps,
            final_loss: self.history.last(),
            reason: criterion.reason().to_string(),
            history: self.history.clone(),
        })
    }
}
