//! Differentiable operations and their vector-Jacobian products.

use super::shape::{self, broadcast_map, broadcast_shapes};
use super::{is_grad_enabled, Tensor};
use crate::error::ShapeError;

/// Operation that produced a tensor
#[derive(Debug)]
pub enum Op {
    Leaf,
    Add(Tensor, Tensor),
    Sub(Tensor, Tensor),
    Mul(Tensor, Tensor),
    Div(Tensor, Tensor),
    Neg(Tensor),
    Exp(Tensor),
    Log(Tensor),
    Sigmoid(Tensor),
    Sum(Tensor),
    Expand(Tensor),
}

impl Op {
    pub(crate) fn inputs(&self) -> Vec<&Tensor> {
        match self {
            Op::Leaf => Vec::new(),
            Op::Add(a, b) | Op::Sub(a, b) | Op::Mul(a, b) | Op::Div(a, b) => vec![a, b],
            Op::Neg(a) | Op::Exp(a) | Op::Log(a) | Op::Sigmoid(a) | Op::Sum(a) | Op::Expand(a) => {
                vec![a]
            }
        }
    }

    /// Gradients of the inputs given the gradient of `output`
    pub(crate) fn backward(&self, output: &Tensor, grad: &[f64]) -> Vec<(Tensor, Vec<f64>)> {
        let out_shape = output.shape();
        match self {
            Op::Leaf => Vec::new(),
            Op::Add(a, b) => binary_grads(out_shape, a, b, grad, |_, _| (1.0, 1.0)),
            Op::Sub(a, b) => binary_grads(out_shape, a, b, grad, |_, _| (1.0, -1.0)),
            Op::Mul(a, b) => binary_grads(out_shape, a, b, grad, |x, y| (y, x)),
            Op::Div(a, b) => binary_grads(out_shape, a, b, grad, |x, y| (1.0 / y, -x / (y * y))),
            Op::Neg(a) => vec![(a.clone(), grad.iter().map(|g| -g).collect())],
            Op::Exp(a) => {
                let out = output.data();
                vec![(a.clone(), grad.iter().zip(out.iter()).map(|(g, y)| g * y).collect())]
            }
            Op::Log(a) => {
                let x = a.data();
                vec![(a.clone(), grad.iter().zip(x.iter()).map(|(g, x)| g / x).collect())]
            }
            Op::Sigmoid(a) => {
                let out = output.data();
                let g = grad
                    .iter()
                    .zip(out.iter())
                    .map(|(g, s)| g * s * (1.0 - s))
                    .collect();
                vec![(a.clone(), g)]
            }
            Op::Sum(a) => vec![(a.clone(), vec![grad[0]; a.numel()])],
            Op::Expand(a) => {
                let map = broadcast_map(out_shape, a.shape());
                let mut g = vec![0.0; a.numel()];
                for (i, &j) in map.iter().enumerate() {
                    g[j] += grad[i];
                }
                vec![(a.clone(), g)]
            }
        }
    }
}

fn binary_grads(
    out_shape: &[usize],
    a: &Tensor,
    b: &Tensor,
    grad: &[f64],
    local: impl Fn(f64, f64) -> (f64, f64),
) -> Vec<(Tensor, Vec<f64>)> {
    let map_a = broadcast_map(out_shape, a.shape());
    let map_b = broadcast_map(out_shape, b.shape());
    let (xa, xb) = (a.data(), b.data());
    let mut ga = vec![0.0; a.numel()];
    let mut gb = vec![0.0; b.numel()];
    for (i, g) in grad.iter().enumerate() {
        let (ia, ib) = (map_a[i], map_b[i]);
        let (da, db) = local(xa[ia], xb[ib]);
        ga[ia] += g * da;
        gb[ib] += g * db;
    }
    vec![(a.clone(), ga), (b.clone(), gb)]
}

fn tracks(inputs: &[&Tensor]) -> bool {
    is_grad_enabled() && inputs.iter().any(|t| t.requires_grad())
}

impl Tensor {
    fn binary(
        &self,
        other: &Tensor,
        f: impl Fn(f64, f64) -> f64,
        op: fn(Tensor, Tensor) -> Op,
    ) -> Result<Tensor, ShapeError> {
        let out_shape = broadcast_shapes(self.shape(), other.shape())?;
        let map_a = broadcast_map(&out_shape, self.shape());
        let map_b = broadcast_map(&out_shape, other.shape());
        let data = {
            let (xa, xb) = (self.data(), other.data());
            map_a
                .iter()
                .zip(map_b.iter())
                .map(|(&i, &j)| f(xa[i], xb[j]))
                .collect()
        };
        Ok(self.record(data, out_shape, &[self, other], || {
            op(self.clone(), other.clone())
        }))
    }

    fn unary(&self, f: impl Fn(f64) -> f64, op: fn(Tensor) -> Op) -> Tensor {
        let data = self.data().iter().map(|&x| f(x)).collect();
        self.record(data, self.shape().to_vec(), &[self], || op(self.clone()))
    }

    fn record(
        &self,
        data: Vec<f64>,
        shape: Vec<usize>,
        inputs: &[&Tensor],
        op: impl FnOnce() -> Op,
    ) -> Tensor {
        if tracks(inputs) {
            Tensor::from_node(data, shape, op(), true)
        } else {
            Tensor::leaf(data, shape)
        }
    }

    /// Element-wise sum with broadcasting
    pub fn add(&self, other: &Tensor) -> Result<Tensor, ShapeError> {
        self.binary(other, |a, b| a + b, Op::Add)
    }

    /// Element-wise difference with broadcasting
    pub fn sub(&self, other: &Tensor) -> Result<Tensor, ShapeError> {
        self.binary(other, |a, b| a - b, Op::Sub)
    }

    /// Element-wise product with broadcasting
    pub fn mul(&self, other: &Tensor) -> Result<Tensor, ShapeError> {
        self.binary(other, |a, b| a * b, Op::Mul)
    }

    /// Element-wise quotient with broadcasting
    pub fn div(&self, other: &Tensor) -> Result<Tensor, ShapeError> {
        self.binary(other, |a, b| a / b, Op::Div)
    }

    /// Add a constant
    pub fn add_scalar(&self, value: f64) -> Tensor {
        // broadcasting against a scalar cannot fail
        self.binary(&Tensor::scalar(value), |a, b| a + b, Op::Add)
            .unwrap_or_else(|_| unreachable!())
    }

    /// Multiply by a constant
    pub fn mul_scalar(&self, value: f64) -> Tensor {
        self.binary(&Tensor::scalar(value), |a, b| a * b, Op::Mul)
            .unwrap_or_else(|_| unreachable!())
    }

    /// Element-wise square
    pub fn square(&self) -> Tensor {
        self.binary(self, |a, b| a * b, Op::Mul)
            .unwrap_or_else(|_| unreachable!())
    }

    /// Element-wise negation
    pub fn neg(&self) -> Tensor {
        self.unary(|x| -x, Op::Neg)
    }

    /// Element-wise exponential
    pub fn exp(&self) -> Tensor {
        self.unary(f64::exp, Op::Exp)
    }

    /// Element-wise natural logarithm
    pub fn ln(&self) -> Tensor {
        self.unary(f64::ln, Op::Log)
    }

    /// Element-wise logistic sigmoid
    pub fn sigmoid(&self) -> Tensor {
        self.unary(|x| 1.0 / (1.0 + (-x).exp()), Op::Sigmoid)
    }

    /// Sum of all elements, as a zero-dimensional tensor
    pub fn sum(&self) -> Tensor {
        let total = self.data().iter().sum();
        self.record(vec![total], Vec::new(), &[self], || Op::Sum(self.clone()))
    }

    /// Broadcast to a larger shape
    pub fn expand(&self, shape: &[usize]) -> Result<Tensor, ShapeError> {
        if !shape::can_expand(self.shape(), shape) {
            return Err(ShapeError::Expand {
                from: self.shape().to_vec(),
                to: shape.to_vec(),
            });
        }
        if self.shape() == shape {
            return Ok(self.clone());
        }
        let map = broadcast_map(shape, self.shape());
        let data = {
            let x = self.data();
            map.iter().map(|&j| x[j]).collect()
        };
        Ok(self.record(data, shape.to_vec(), &[self], || Op::Expand(self.clone())))
    }
}
