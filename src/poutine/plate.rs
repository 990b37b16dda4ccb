//! Broadcasting over a batch dimension

use std::ops::Range;

use super::message::{Message, SiteFn};
use super::messenger::Messenger;
use crate::error::{PplError, PplResult};

/// Broadcasts every `sample` site inside it to `size` along `dim`
#[derive(Clone, Debug)]
pub struct PlateMessenger {
    name: String,
    size: usize,
    dim: isize,
}

impl PlateMessenger {
    /// Create a plate of `size` independent copies along the negative
    /// dimension `dim`
    pub fn new(name: impl Into<String>, size: usize, dim: isize) -> PplResult<Self> {
        if dim >= 0 {
            return Err(PplError::InvalidPlateDim(dim));
        }
        Ok(Self {
            name: name.into(),
            size,
            dim,
        })
    }

    /// Plate name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of independent copies
    pub fn size(&self) -> usize {
        self.size
    }

    /// Batch dimension, counted from the right
    pub fn dim(&self) -> isize {
        self.dim
    }

    /// Indices `0..size`, for manual batching
    pub fn indices(&self) -> Range<usize> {
        0..self.size
    }

    /// Batch shape a distribution with `batch_shape` is expanded to, or
    /// `None` if it already has `size` at `dim`
    pub fn broadcast_shape(&self, batch_shape: &[usize]) -> Option<Vec<usize>> {
        let d = self.dim.unsigned_abs();
        let len = batch_shape.len();
        if len >= d && batch_shape[len - d] == self.size {
            return None;
        }
        let mut shape = vec![1; d.saturating_sub(len)];
        shape.extend_from_slice(batch_shape);
        let at = shape.len() - d;
        shape[at] = self.size;
        Some(shape)
    }
}

impl Messenger for PlateMessenger {
    fn process_message(&mut self, msg: &mut Message) -> PplResult<()> {
        if let SiteFn::Sample(dist) = &msg.site_fn {
            if let Some(shape) = self.broadcast_shape(&dist.batch_shape()) {
                msg.site_fn = SiteFn::Sample(dist.expand(&shape)?);
            }
        }
        Ok(())
    }
}

impl IntoIterator for &PlateMessenger {
    type Item = usize;
    type IntoIter = Range<usize>;

    fn into_iter(self) -> Self::IntoIter {
        self.indices()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distributions::{Constraint, Normal};
    use crate::poutine::TraceMessenger;
    use crate::primitives::{param, sample};
    use crate::tensor::Tensor;

    #[test]
    fn test_non_negative_dim_is_rejected() {
        assert_eq!(
            PlateMessenger::new("data", 3, 0).unwrap_err(),
            PplError::InvalidPlateDim(0)
        );
    }

    #[test]
    fn test_broadcast_shape() {
        let plate = PlateMessenger::new("data", 5, -1).unwrap();
        assert_eq!(plate.broadcast_shape(&[]), Some(vec![5]));
        assert_eq!(plate.broadcast_shape(&[5]), None);
        assert_eq!(plate.broadcast_shape(&[1]), Some(vec![5]));

        let plate = PlateMessenger::new("data", 4, -2).unwrap();
        assert_eq!(plate.broadcast_shape(&[]), Some(vec![4, 1]));
        assert_eq!(plate.broadcast_shape(&[3]), Some(vec![4, 3]));
        assert_eq!(plate.broadcast_shape(&[4, 3]), None);
        assert_eq!(plate.broadcast_shape(&[2, 1, 3]), Some(vec![2, 4, 3]));
    }

    #[test]
    fn test_plate_expands_samples() {
        let plate = PlateMessenger::new("data", 10, -1).unwrap();
        let (_, x) = plate.run(|| sample("x", Normal::new(0.0, 1.0)?, None));
        assert_eq!(x.unwrap().shape(), &[10]);
    }

    #[test]
    fn test_plate_ignores_params() {
        let trace = TraceMessenger::new()
            .get_trace(|| {
                PlateMessenger::new("data", 3, -1)?
                    .run(|| param("loc", Some(Tensor::scalar(0.5)), Constraint::Real))
                    .1
            })
            .unwrap();
        assert_eq!(trace.value("loc").unwrap().shape(), &[] as &[usize]);
    }

    #[test]
    fn test_plate_indices() {
        let plate = PlateMessenger::new("data", 3, -1).unwrap();
        assert_eq!(plate.indices().collect::<Vec<_>>(), vec![0, 1, 2]);
        let mut seen = Vec::new();
        for i in &plate {
            seen.push(i);
        }
        assert_eq!(seen, vec![0, 1, 2]);
        assert_eq!(plate.name(), "data");
    }
}
