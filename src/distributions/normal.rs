use std::f64::consts::PI;
use std::rc::Rc;

use rand::rngs::StdRng;
use rand::Rng;
use rand_distr::StandardNormal;

use super::Distribution;
use crate::error::{PplError, PplResult};
use crate::tensor::shape::{broadcast_shapes, numel};
use crate::tensor::Tensor;

/// Normal distribution parameterized by location and scale
#[derive(Clone, Debug)]
pub struct Normal {
    loc: Tensor,
    scale: Tensor,
    batch_shape: Vec<usize>,
}

impl Normal {
    /// Create a normal distribution; `loc` and `scale` broadcast together
    pub fn new(loc: impl Into<Tensor>, scale: impl Into<Tensor>) -> PplResult<Self> {
        let (loc, scale) = (loc.into(), scale.into());
        if scale.data().iter().any(|&s| s <= 0.0 || !s.is_finite()) {
            return Err(PplError::InvalidConfiguration(
                "Normal scale must be positive".to_string(),
            ));
        }
        let batch_shape = broadcast_shapes(loc.shape(), scale.shape())?;
        Ok(Self {
            loc,
            scale,
            batch_shape,
        })
    }

    /// Location parameter
    pub fn loc(&self) -> &Tensor {
        &self.loc
    }

    /// Scale parameter
    pub fn scale(&self) -> &Tensor {
        &self.scale
    }

    pub(crate) fn expanded(&self, batch_shape: &[usize]) -> PplResult<Normal> {
        Ok(Normal {
            loc: self.loc.expand(batch_shape)?,
            scale: self.scale.expand(batch_shape)?,
            batch_shape: batch_shape.to_vec(),
        })
    }
}

impl Distribution for Normal {
    fn batch_shape(&self) -> Vec<usize> {
        self.batch_shape.clone()
    }

    fn sample(&self, rng: &mut StdRng) -> PplResult<Tensor> {
        let eps: Vec<f64> = (0..numel(&self.batch_shape))
            .map(|_| rng.sample(StandardNormal))
            .collect();
        let eps = Tensor::leaf(eps, self.batch_shape.clone());
        Ok(self.loc.add(&self.scale.mul(&eps)?)?)
    }

    fn log_prob(&self, value: &Tensor) -> PplResult<Tensor> {
        let z = value.sub(&self.loc)?.div(&self.scale)?;
        let log_norm = self.scale.ln().add_scalar(0.5 * (2.0 * PI).ln());
        Ok(z.square().mul_scalar(-0.5).sub(&log_norm)?)
    }

    fn expand(&self, batch_shape: &[usize]) -> PplResult<Rc<dyn Distribution>> {
        Ok(Rc::new(self.expanded(batch_shape)?))
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

    #[test]
    fn test_log_prob_standard_normal() {
        let d = Normal::new(0.0, 1.0).unwrap();
        let lp = d.log_prob(&Tensor::scalar(0.0)).unwrap();
        assert_relative_eq!(lp.item().unwrap(), -0.5 * (2.0 * PI).ln(), epsilon = 1e-12);

        let d = Normal::new(1.0, 2.0).unwrap();
        let lp = d.log_prob(&Tensor::scalar(3.0)).unwrap();
        let expected = -0.5 - 2.0f64.ln() - 0.5 * (2.0 * PI).ln();
        assert_relative_eq!(lp.item().unwrap(), expected, epsilon = 1e-12);
    }

    #[test]
    fn test_invalid_scale() {
        assert!(Normal::new(0.0, 0.0).is_err());
        assert!(Normal::new(0.0, -1.0).is_err());
    }

    #[test]
    fn test_sample_shape_and_reproducibility() {
        let d = Normal::new(Tensor::from_vec(vec![0.0, 10.0]), 1.0).unwrap();
        assert_eq!(d.batch_shape(), vec![2]);
        let a = d.sample(&mut StdRng::seed_from_u64(3)).unwrap();
        let b = d.sample(&mut StdRng::seed_from_u64(3)).unwrap();
        assert_eq!(a.shape(), &[2]);
        assert_eq!(a.to_vec(), b.to_vec());
    }

    #[test]
    fn test_sample_is_reparameterized() {
        let loc = Tensor::scalar(0.5);
        loc.requires_grad_();
        let d = Normal::new(loc.clone(), 2.0).unwrap();
        let x = d.sample(&mut StdRng::seed_from_u64(0)).unwrap();
        x.backward().unwrap();
        assert_relative_eq!(loc.grad().unwrap().item().unwrap(), 1.0);
    }

    #[test]
    fn test_expand() {
        let d = Normal::new(0.0, 1.0).unwrap();
        let e = d.expand(&[3]).unwrap();
        assert_eq!(e.batch_shape(), vec![3]);
        assert_eq!(e.sample(&mut StdRng::seed_from_u64(1)).unwrap().shape(), &[3]);
        assert!(Normal::new(Tensor::from_vec(vec![0.0, 1.0]), 1.0)
            .unwrap()
            .expand(&[3])
            .is_err());
    }
}
