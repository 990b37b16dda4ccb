//! Differentiable tensors
//!
//! A minimal dynamic reverse-mode autograd engine over dense `f64` buffers.
//! Every [`Tensor`] is a reference-counted node of a computation graph:
//! operations on tensors that track gradients record their inputs, and
//! [`Tensor::backward`] walks the recorded graph in reverse topological order
//! accumulating gradients into the gradient-tracking leaves.
//!
//! Only what the inference core needs is provided: element-wise arithmetic
//! with broadcasting, `exp`/`ln`/`sigmoid`, sum reduction and `expand`.

mod ops;
pub mod shape;

use std::cell::{Cell, Ref, RefCell};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::rc::{Rc, Weak};

use crate::error::ShapeError;

pub use ops::Op;

thread_local! {
    static GRAD_ENABLED: Cell<bool> = const { Cell::new(true) };
}

/// Stable identity of a tensor node, valid while the node is alive
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TensorId(usize);

pub(crate) struct Node {
    data: RefCell<Vec<f64>>,
    shape: Vec<usize>,
    requires_grad: Cell<bool>,
    grad: RefCell<Option<Vec<f64>>>,
    op: Op,
}

/// A dense `f64` tensor participating in reverse-mode differentiation
#[derive(Clone)]
pub struct Tensor(Rc<Node>);

/// Non-owning handle to a tensor
#[derive(Clone, Debug)]
pub struct WeakTensor(Weak<Node>);

impl WeakTensor {
    /// Upgrade to a strong handle if the tensor is still alive
    pub fn upgrade(&self) -> Option<Tensor> {
        self.0.upgrade().map(Tensor)
    }
}

/// Disables graph recording on this thread until dropped
pub struct NoGradGuard {
    previous: bool,
}

impl NoGradGuard {
    /// Disable graph recording
    pub fn new() -> Self {
        let previous = GRAD_ENABLED.with(|g| g.replace(false));
        Self { previous }
    }
}

impl Default for NoGradGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for NoGradGuard {
    fn drop(&mut self) {
        GRAD_ENABLED.with(|g| g.set(self.previous));
    }
}

/// Run `f` without recording any computation graph
pub fn no_grad<R>(f: impl FnOnce() -> R) -> R {
    let _guard = NoGradGuard::new();
    f()
}

/// Whether operations on this thread currently record a graph
pub fn is_grad_enabled() -> bool {
    GRAD_ENABLED.with(|g| g.get())
}

impl Tensor {
    /// Create a constant tensor from a row-major buffer
    pub fn new(data: Vec<f64>, shape: Vec<usize>) -> Result<Self, ShapeError> {
        if data.len() != shape::numel(&shape) {
            return Err(ShapeError::DataLength {
                len: data.len(),
                shape,
            });
        }
        Ok(Self::leaf(data, shape))
    }

    /// Create a zero-dimensional tensor
    pub fn scalar(value: f64) -> Self {
        Self::leaf(vec![value], Vec::new())
    }

    /// Create a one-dimensional tensor
    pub fn from_vec(data: Vec<f64>) -> Self {
        let len = data.len();
        Self::leaf(data, vec![len])
    }

    /// Tensor filled with a single value
    pub fn full(shape: &[usize], value: f64) -> Self {
        Self::leaf(vec![value; shape::numel(shape)], shape.to_vec())
    }

    /// Tensor of zeros
    pub fn zeros(shape: &[usize]) -> Self {
        Self::full(shape, 0.0)
    }

    /// Tensor of ones
    pub fn ones(shape: &[usize]) -> Self {
        Self::full(shape, 1.0)
    }

    pub(crate) fn leaf(data: Vec<f64>, shape: Vec<usize>) -> Self {
        Self::from_node(data, shape, Op::Leaf, false)
    }

    pub(crate) fn from_node(data: Vec<f64>, shape: Vec<usize>, op: Op, requires_grad: bool) -> Self {
        Tensor(Rc::new(Node {
            data: RefCell::new(data),
            shape,
            requires_grad: Cell::new(requires_grad),
            grad: RefCell::new(None),
            op,
        }))
    }

    /// Shape of the tensor
    pub fn shape(&self) -> &[usize] {
        &self.0.shape
    }

    /// Number of dimensions
    pub fn ndim(&self) -> usize {
        self.0.shape.len()
    }

    /// Number of elements
    pub fn numel(&self) -> usize {
        shape::numel(&self.0.shape)
    }

    /// Borrow the underlying buffer
    pub fn data(&self) -> Ref<'_, Vec<f64>> {
        self.0.data.borrow()
    }

    /// Copy of the underlying buffer
    pub fn to_vec(&self) -> Vec<f64> {
        self.0.data.borrow().clone()
    }

    /// Value of a single-element tensor
    pub fn item(&self) -> Result<f64, ShapeError> {
        if self.numel() != 1 {
            return Err(ShapeError::NotScalar(self.shape().to_vec()));
        }
        Ok(self.0.data.borrow()[0])
    }

    /// Identity of this node
    pub fn id(&self) -> TensorId {
        TensorId(Rc::as_ptr(&self.0) as usize)
    }

    /// Whether two handles point to the same node
    pub fn ptr_eq(&self, other: &Tensor) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Non-owning handle to this node
    pub fn downgrade(&self) -> WeakTensor {
        WeakTensor(Rc::downgrade(&self.0))
    }

    /// Whether this tensor takes part in gradient computation
    pub fn requires_grad(&self) -> bool {
        self.0.requires_grad.get()
    }

    /// Mark a leaf tensor as tracking gradients
    pub fn requires_grad_(&self) -> &Self {
        self.0.requires_grad.set(true);
        self
    }

    /// Whether this tensor was created directly rather than by an operation
    pub fn is_leaf(&self) -> bool {
        matches!(self.0.op, Op::Leaf)
    }

    /// Accumulated gradient, if any
    pub fn grad(&self) -> Option<Tensor> {
        self.0
            .grad
            .borrow()
            .as_ref()
            .map(|g| Tensor::leaf(g.clone(), self.0.shape.clone()))
    }

    /// Replace the accumulated gradient with zeros
    pub fn zero_grad(&self) {
        *self.0.grad.borrow_mut() = Some(vec![0.0; self.numel()]);
    }

    /// Drop the accumulated gradient
    pub fn clear_grad(&self) {
        *self.0.grad.borrow_mut() = None;
    }

    /// A constant copy of this tensor, cut off from the graph
    pub fn detach(&self) -> Tensor {
        Tensor::leaf(self.to_vec(), self.0.shape.clone())
    }

    /// Modify the buffer in place.
    ///
    /// Intended for optimizers updating leaf parameters; the graph is not
    /// notified.
    pub fn update_data(&self, f: impl FnOnce(&mut [f64])) {
        f(&mut self.0.data.borrow_mut());
    }

    /// Back-propagate from this single-element tensor, accumulating
    /// `d self / d leaf` into every gradient-tracking leaf
    pub fn backward(&self) -> Result<(), ShapeError> {
        if self.numel() != 1 {
            return Err(ShapeError::NotScalar(self.shape().to_vec()));
        }
        if !self.requires_grad() {
            return Ok(());
        }

        let order = self.topological_order();
        let mut grads: HashMap<TensorId, Vec<f64>> = HashMap::new();
        grads.insert(self.id(), vec![1.0]);

        for node in order.iter().rev() {
            let Some(grad_output) = grads.remove(&node.id()) else {
                continue;
            };
            if node.is_leaf() {
                let mut slot = node.0.grad.borrow_mut();
                match slot.as_mut() {
                    Some(existing) => {
                        for (e, g) in existing.iter_mut().zip(grad_output.iter()) {
                            *e += g;
                        }
                    }
                    None => *slot = Some(grad_output),
                }
                continue;
            }
            for (input, grad) in node.0.op.backward(node, &grad_output) {
                if !input.requires_grad() {
                    continue;
                }
                match grads.get_mut(&input.id()) {
                    Some(existing) => {
                        for (e, g) in existing.iter_mut().zip(grad.iter()) {
                            *e += g;
                        }
                    }
                    None => {
                        grads.insert(input.id(), grad);
                    }
                }
            }
        }
        Ok(())
    }

    /// Nodes reachable from `self` through gradient-tracking edges, inputs
    /// before the nodes that consume them
    fn topological_order(&self) -> Vec<Tensor> {
        let mut order = Vec::new();
        let mut visited = HashSet::new();
        let mut stack = vec![(self.clone(), false)];

        while let Some((node, expanded)) = stack.pop() {
            if expanded {
                order.push(node);
                continue;
            }
            if !visited.insert(node.id()) {
                continue;
            }
            stack.push((node.clone(), true));
            for input in node.0.op.inputs() {
                if input.requires_grad() && !visited.contains(&input.id()) {
                    stack.push((input.clone(), false));
                }
            }
        }
        order
    }
}

impl fmt::Debug for Tensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tensor")
            .field("shape", &self.0.shape)
            .field("data", &*self.0.data.borrow())
            .field("requires_grad", &self.requires_grad())
            .finish()
    }
}

impl From<f64> for Tensor {
    fn from(value: f64) -> Self {
        Tensor::scalar(value)
    }
}

impl From<Vec<f64>> for Tensor {
    fn from(data: Vec<f64>) -> Self {
        Tensor::from_vec(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_constructors() {
        let t = Tensor::new(vec![1.0, 2.0, 3.0, 4.0], vec![2, 2]).unwrap();
        assert_eq!(t.shape(), &[2, 2]);
        assert_eq!(t.numel(), 4);
        assert!(Tensor::new(vec![1.0], vec![2]).is_err());
        assert_eq!(Tensor::scalar(3.0).item().unwrap(), 3.0);
        assert!(Tensor::from_vec(vec![1.0, 2.0]).item().is_err());
    }

    #[test]
    fn test_backward_accumulates_into_leaves() {
        let x = Tensor::scalar(3.0);
        x.requires_grad_();
        // y = x * x + x  => dy/dx = 2x + 1
        let y = x.mul(&x).unwrap().add(&x).unwrap();
        y.backward().unwrap();
        assert_relative_eq!(x.grad().unwrap().item().unwrap(), 7.0);

        // A second backward accumulates
        let y = x.mul(&x).unwrap().add(&x).unwrap();
        y.backward().unwrap();
        assert_relative_eq!(x.grad().unwrap().item().unwrap(), 14.0);

        x.zero_grad();
        assert_eq!(x.grad().unwrap().item().unwrap(), 0.0);
    }

    #[test]
    fn test_backward_through_broadcast_and_sum() {
        let loc = Tensor::scalar(1.0);
        loc.requires_grad_();
        let data = Tensor::from_vec(vec![1.0, 2.0, 3.0]);
        // sum((data - loc)^2), d/dloc = -2 * sum(data - loc) = -6
        let diff = data.sub(&loc).unwrap();
        let loss = diff.mul(&diff).unwrap().sum();
        loss.backward().unwrap();
        assert_relative_eq!(loc.grad().unwrap().item().unwrap(), -6.0);
    }

    #[test]
    fn test_backward_requires_scalar() {
        let x = Tensor::from_vec(vec![1.0, 2.0]);
        x.requires_grad_();
        assert!(x.exp().backward().is_err());
    }

    #[test]
    fn test_no_grad_records_nothing() {
        let x = Tensor::scalar(2.0);
        x.requires_grad_();
        let y = no_grad(|| x.exp());
        assert!(!y.requires_grad());
        assert!(is_grad_enabled());
    }

    #[test]
    fn test_detach_is_constant_copy() {
        let x = Tensor::scalar(2.0);
        x.requires_grad_();
        let d = x.detach();
        assert!(!d.requires_grad());
        assert!(!d.ptr_eq(&x));
        assert_eq!(d.to_vec(), x.to_vec());
    }

    #[test]
    fn test_weak_handle() {
        let x = Tensor::scalar(1.0);
        let weak = x.downgrade();
        assert!(weak.upgrade().unwrap().ptr_eq(&x));
        drop(x);
        assert!(weak.upgrade().is_none());
    }
}
