//! Shape arithmetic for NumPy-style broadcasting.

use crate::error::ShapeError;

/// Number of elements in a tensor of the given shape.
pub fn numel(shape: &[usize]) -> usize {
    shape.iter().product()
}

/// Row-major strides for a shape.
pub fn strides(shape: &[usize]) -> Vec<usize> {
    let mut strides = vec![0; shape.len()];
    let mut acc = 1;
    for (stride, &dim) in strides.iter_mut().zip(shape.iter()).rev() {
        *stride = acc;
        acc *= dim;
    }
    strides
}

/// Broadcast two shapes together, aligning dimensions from the right.
pub fn broadcast_shapes(left: &[usize], right: &[usize]) -> Result<Vec<usize>, ShapeError> {
    let ndim = left.len().max(right.len());
    let mut out = vec![1; ndim];
    for i in 0..ndim {
        let l = dim_from_right(left, ndim - 1 - i);
        let r = dim_from_right(right, ndim - 1 - i);
        out[i] = match (l, r) {
            (a, b) if a == b => a,
            (1, b) => b,
            (a, 1) => a,
            _ => {
                return Err(ShapeError::Broadcast {
                    left: left.to_vec(),
                    right: right.to_vec(),
                })
            }
        };
    }
    Ok(out)
}

/// Whether `from` can be broadcast to exactly `to`.
pub fn can_expand(from: &[usize], to: &[usize]) -> bool {
    matches!(broadcast_shapes(from, to), Ok(shape) if shape == to)
}

/// For every flat index of `out_shape`, the flat index of the element of a
/// tensor of `in_shape` that is broadcast into it.
///
/// `in_shape` must be broadcast-compatible with `out_shape`.
pub fn broadcast_map(out_shape: &[usize], in_shape: &[usize]) -> Vec<usize> {
    let n = numel(out_shape);
    if in_shape == out_shape {
        return (0..n).collect();
    }
    if numel(in_shape) == 1 {
        return vec![0; n];
    }

    let offset = out_shape.len() - in_shape.len();
    let out_strides = strides(out_shape);
    let in_strides = strides(in_shape);

    (0..n)
        .map(|flat| {
            let mut rem = flat;
            let mut in_flat = 0;
            for (d, &stride) in out_strides.iter().enumerate() {
                let idx = rem / stride;
                rem %= stride;
                if d >= offset {
                    let k = d - offset;
                    if in_shape[k] != 1 {
                        in_flat += idx * in_strides[k];
                    }
                }
            }
            in_flat
        })
        .collect()
}

fn dim_from_right(shape: &[usize], pos: usize) -> usize {
    if pos < shape.len() {
        shape[shape.len() - 1 - pos]
    } else {
        1
    }
}
