//! Constraints and the transforms that map onto them
//!
//! Parameters are optimized in an unconstrained space. [`transform_to`]
//! yields, for each constraint, a bijection whose forward map takes an
//! unconstrained tensor into the constrained domain and whose inverse maps
//! back.

use serde::{Deserialize, Serialize};

use crate::error::PplResult;
use crate::tensor::Tensor;

/// Domain of a parameter
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub enum Constraint {
    /// The whole real line
    #[default]
    Real,
    /// Strictly positive reals
    Positive,
    /// Reals strictly greater than a bound
    GreaterThan(f64),
    /// The open interval (0, 1)
    UnitInterval,
    /// The open interval (lower, upper)
    Interval { lower: f64, upper: f64 },
}

impl Constraint {
    /// Whether every element of `value` lies in the domain
    pub fn check(&self, value: &Tensor) -> bool {
        value.data().iter().all(|&x| match self {
            Constraint::Real => x.is_finite(),
            Constraint::Positive => x > 0.0,
            Constraint::GreaterThan(lower) => x > *lower,
            Constraint::UnitInterval => x > 0.0 && x < 1.0,
            Constraint::Interval { lower, upper } => x > *lower && x < *upper,
        })
    }
}

/// Bijection from the real line onto a constrained domain
#[derive(Clone, Debug, PartialEq)]
pub enum Transform {
    /// `y = x`
    Identity,
    /// `y = lower + exp(x)`
    ExpShift { lower: f64 },
    /// `y = lower + (upper - lower) * sigmoid(x)`
    ScaledSigmoid { lower: f64, upper: f64 },
}

/// Look up the transform for a constraint
pub fn transform_to(constraint: &Constraint) -> Transform {
    match constraint {
        Constraint::Real => Transform::Identity,
        Constraint::Positive => Transform::ExpShift { lower: 0.0 },
        Constraint::GreaterThan(lower) => Transform::ExpShift { lower: *lower },
        Constraint::UnitInterval => Transform::ScaledSigmoid {
            lower: 0.0,
            upper: 1.0,
        },
        Constraint::Interval { lower, upper } => Transform::ScaledSigmoid {
            lower: *lower,
            upper: *upper,
        },
    }
}

impl Transform {
    /// Map an unconstrained tensor into the constrained domain.
    ///
    /// The result stays connected to `x` in the gradient graph. The identity
    /// transform returns `x` itself.
    pub fn forward(&self, x: &Tensor) -> PplResult<Tensor> {
        Ok(match self {
            Transform::Identity => x.clone(),
            Transform::ExpShift { lower } if *lower == 0.0 => x.exp(),
            Transform::ExpShift { lower } => x.exp().add_scalar(*lower),
            Transform::ScaledSigmoid { lower, upper } => {
                x.sigmoid().mul_scalar(upper - lower).add_scalar(*lower)
            }
        })
    }

    /// Map a constrained tensor back to the real line, as a constant
    pub fn inv(&self, y: &Tensor) -> Tensor {
        let data = y
            .data()
            .iter()
            .map(|&v| match self {
                Transform::Identity => v,
                Transform::ExpShift { lower } => (v - lower).ln(),
                Transform::ScaledSigmoid { lower, upper } => {
                    let p = (v - lower) / (upper - lower);
                    (p / (1.0 - p)).ln()
                }
            })
            .collect();
        Tensor::leaf(data, y.shape().to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_forward_inverts_inv() {
        let constraints = [
            Constraint::Real,
            Constraint::Positive,
            Constraint::GreaterThan(-2.0),
            Constraint::UnitInterval,
            Constraint::Interval {
                lower: 1.0,
                upper: 5.0,
            },
        ];
        for constraint in &constraints {
            let value = match constraint {
                Constraint::Interval { lower, upper } => {
                    Tensor::from_vec(vec![lower + 0.25 * (upper - lower), lower + 0.75 * (upper - lower)])
                }
                _ => Tensor::from_vec(vec![0.25, 0.75]),
            };
            assert!(constraint.check(&value));
            let t = transform_to(constraint);
            let back = t.forward(&t.inv(&value)).unwrap();
            for (a, b) in back.to_vec().iter().zip(value.to_vec().iter()) {
                assert_relative_eq!(a, b, epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn test_forward_lands_in_domain() {
        let x = Tensor::from_vec(vec![-30.0, 0.0, 4.0]);
        assert!(Constraint::Positive.check(&transform_to(&Constraint::Positive).forward(&x).unwrap()));
        let interval = Constraint::Interval {
            lower: -1.0,
            upper: 1.0,
        };
        assert!(interval.check(&transform_to(&interval).forward(&x).unwrap()));
    }

    #[test]
    fn test_identity_forward_is_same_node() {
        let x = Tensor::scalar(1.0);
        let y = Transform::Identity.forward(&x).unwrap();
        assert!(y.ptr_eq(&x));
    }

    #[test]
    fn test_forward_is_differentiable() {
        let x = Tensor::scalar(0.0);
        x.requires_grad_();
        let y = transform_to(&Constraint::Positive).forward(&x).unwrap();
        y.backward().unwrap();
        assert_relative_eq!(x.grad().unwrap().item().unwrap(), 1.0);
    }

    #[test]
    fn test_constraint_serde() {
        let c = Constraint::Interval {
            lower: 0.0,
            upper: 2.0,
        };
        let json = serde_json::to_string(&c).unwrap();
        let back: Constraint = serde_json::from_str(&json).unwrap();
        assert_eq!(c, back);
    }
}
