use std::rc::Rc;

use rand::rngs::StdRng;

use super::{Distribution, Normal};
use crate::error::PplResult;
use crate::tensor::Tensor;

/// Distribution of `exp(x)` for `x ~ Normal(loc, scale)`
#[derive(Clone, Debug)]
pub struct LogNormal {
    base: Normal,
}

impl LogNormal {
    /// Create a log-normal distribution from the parameters of the
    /// underlying normal
    pub fn new(loc: impl Into<Tensor>, scale: impl Into<Tensor>) -> PplResult<Self> {
        Ok(Self {
            base: Normal::new(loc, scale)?,
        })
    }

    /// The underlying normal distribution
    pub fn base(&self) -> &Normal {
        &self.base
    }
}

impl Distribution for LogNormal {
    fn batch_shape(&self) -> Vec<usize> {
        self.base.batch_shape()
    }

    fn sample(&self, rng: &mut StdRng) -> PplResult<Tensor> {
        Ok(self.base.sample(rng)?.exp())
    }

    fn log_prob(&self, value: &Tensor) -> PplResult<Tensor> {
        let log_value = value.ln();
        Ok(self.base.log_prob(&log_value)?.sub(&log_value)?)
    }

    fn expand(&self, batch_shape: &[usize]) -> PplResult<Rc<dyn Distribution>> {
        Ok(Rc::new(LogNormal {
            base: self.base.expanded(batch_shape)?,
        }))
    }

    fn has_rsample(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::SeedableRng;
    use std::f64::consts::PI;

    #[test]
    fn test_samples_are_positive() {
        let d = LogNormal::new(0.0, 1.0).unwrap().expand(&[50]).unwrap();
        let x = d.sample(&mut StdRng::seed_from_u64(11)).unwrap();
        assert!(x.data().iter().all(|&v| v > 0.0));
    }

    #[test]
    fn test_log_prob_at_one() {
        // log-density at 1 equals the base normal's log-density at 0
        let d = LogNormal::new(0.0, 1.0).unwrap();
        let lp = d.log_prob(&Tensor::scalar(1.0)).unwrap();
        assert_relative_eq!(lp.item().unwrap(), -0.5 * (2.0 * PI).ln(), epsilon = 1e-12);
    }
}
