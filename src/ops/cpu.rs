//! Parallel CPU tensor kernels
//!
//! # CPU Backend
//!
//! Elementwise, broadcasting and reduction kernels used by the metric and
//! loss layers. Every kernel returns a fresh tensor; inputs are never mutated.
//!
//! ## Features
//!
//! - Parallel execution using [`rayon`](https://docs.rs/rayon)
//! - Numpy-style broadcasting (shapes aligned on trailing axes)
//! - Row-wise helpers for `(batch, features)` matrices
//!
//! ## Design Goals
//!
//! - Deterministic results: reductions run sequentially inside each lane, so
//!   the summation order never depends on thread scheduling
//! - Shape errors are reported, never panicked on

use crate::error::{LayerError, Result};
use crate::tensors::{Ten64, Tensor};
use rayon::prelude::*;

/// Resulting shape of broadcasting `a` against `b`, or `None` if incompatible.
pub fn broadcast_shape(a: &[usize], b: &[usize]) -> Option<Vec<usize>> {
    let rank = a.len().max(b.len());
    let mut out = vec![0; rank];
    for i in 0..rank {
        let da = if i < rank - a.len() { 1 } else { a[i - (rank - a.len())] };
        let db = if i < rank - b.len() { 1 } else { b[i - (rank - b.len())] };
        out[i] = match (da, db) {
            (x, y) if x == y => x,
            (1, y) => y,
            (x, 1) => x,
            _ => return None,
        };
    }
    Some(out)
}

/// Maps a flat index of the broadcast output back to the flat index in `src`.
fn source_index(mut flat: usize, out_shape: &[usize], src_shape: &[usize]) -> usize {
    let offset = out_shape.len() - src_shape.len();
    let mut idx = 0;
    let mut stride = 1;
    for axis in (0..out_shape.len()).rev() {
        let coord = flat % out_shape[axis];
        flat /= out_shape[axis];
        if axis >= offset {
            let d = src_shape[axis - offset];
            if d != 1 {
                idx += coord * stride;
            }
            stride *= d;
        }
    }
    idx
}

/// Combines two tensors elementwise with broadcasting.
///
/// # Errors
/// [`LayerError::ShapeMismatch`] if the shapes cannot be broadcast together.
pub fn zip_with<F>(a: &Ten64, b: &Ten64, op: &'static str, f: F) -> Result<Ten64>
where
    F: Fn(f64, f64) -> f64 + Sync + Send,
{
    a.check()?;
    b.check()?;

    if a.shape == b.shape {
        let data = a
            .data
            .par_iter()
            .zip(b.data.par_iter())
            .map(|(&x, &y)| f(x, y))
            .collect();
        return Ok(Tensor::new(a.shape.clone(), data));
    }

    let shape = broadcast_shape(&a.shape, &b.shape).ok_or_else(|| LayerError::ShapeMismatch {
        op,
        lhs: a.shape.clone(),
        rhs: b.shape.clone(),
    })?;
    let n: usize = shape.iter().product();

    let data = (0..n)
        .into_par_iter()
        .map(|i| {
            let x = a.data[source_index(i, &shape, &a.shape)];
            let y = b.data[source_index(i, &shape, &b.shape)];
            f(x, y)
        })
        .collect();

    Ok(Tensor::new(shape, data))
}

/// Applies `f` to every element in parallel.
pub fn map<F>(t: &Ten64, f: F) -> Ten64
where
    F: Fn(f64) -> f64 + Sync + Send,
{
    Tensor::new(t.shape.clone(), t.data.par_iter().map(|&x| f(x)).collect())
}

/// Reduces the lanes along `axis` with `f`.
///
/// Each lane is gathered into a contiguous buffer before `f` sees it.
///
/// # Errors
/// [`LayerError::ShapeMismatch`] if `axis` is out of range.
pub fn reduce_axis<F>(
    t: &Ten64,
    axis: usize,
    keepdims: bool,
    op: &'static str,
    f: F,
) -> Result<Ten64>
where
    F: Fn(&[f64]) -> f64 + Sync + Send,
{
    t.check()?;
    if axis >= t.rank() {
        return Err(LayerError::ShapeMismatch {
            op,
            lhs: t.shape.clone(),
            rhs: vec![axis],
        });
    }

    let outer: usize = t.shape[..axis].iter().product();
    let len = t.shape[axis];
    let inner: usize = t.shape[axis + 1..].iter().product();

    let data = (0..outer * inner)
        .into_par_iter()
        .map(|flat| {
            let o = flat / inner;
            let i = flat % inner;
            let lane: Vec<f64> = (0..len).map(|k| t.data[(o * len + k) * inner + i]).collect();
            f(&lane)
        })
        .collect();

    let mut shape = t.shape.clone();
    if keepdims {
        shape[axis] = 1;
    } else {
        shape.remove(axis);
    }

    Ok(Tensor::new(shape, data))
}

/// Index of the first maximum in `lane`.
pub fn argmax(lane: &[f64]) -> f64 {
    let mut best = 0;
    for (i, &x) in lane.iter().enumerate() {
        if x > lane[best] {
            best = i;
        }
    }
    best as f64
}

/// Copies columns `[start, end)` of the last axis.
///
/// # Errors
/// [`LayerError::ShapeMismatch`] on rank-0 input or an out-of-bounds range.
pub fn slice_last(t: &Ten64, start: usize, end: usize) -> Result<Ten64> {
    let axis = t.last_axis("slice_last")?;
    let width = t.shape[axis];
    if start > end || end > width {
        return Err(LayerError::ShapeMismatch {
            op: "slice_last",
            lhs: t.shape.clone(),
            rhs: vec![start, end],
        });
    }

    let data = t
        .data
        .par_chunks(width.max(1))
        .flat_map_iter(|row| row[start..end].iter().copied())
        .collect();

    let mut shape = t.shape.clone();
    shape[axis] = end - start;
    Ok(Tensor::new(shape, data))
}

/// Euclidean norm of every row of a `(batch, features)` matrix.
pub fn row_norms(t: &Ten64) -> Vec<f64> {
    let width = t.shape.last().copied().unwrap_or(1).max(1);
    t.data
        .par_chunks(width)
        .map(|row| row.iter().map(|x| x * x).sum::<f64>().sqrt())
        .collect()
}

/// Divides every row by the matching entry of `norms`.
pub fn scale_rows(t: &Ten64, norms: &[f64]) -> Ten64 {
    let width = t.shape.last().copied().unwrap_or(1).max(1);
    let data = t
        .data
        .par_chunks(width)
        .zip(norms.par_iter())
        .flat_map_iter(|(row, &n)| row.iter().map(move |x| x / n))
        .collect();
    Tensor::new(t.shape.clone(), data)
}

/// Squared Euclidean distance between matching rows of `a` and `b`.
pub fn row_sq_dist(a: &Ten64, b: &Ten64) -> Vec<f64> {
    let width = a.shape.last().copied().unwrap_or(1).max(1);
    a.data
        .par_chunks(width)
        .zip(b.data.par_chunks(width))
        .map(|(ra, rb)| ra.iter().zip(rb).map(|(x, y)| (x - y) * (x - y)).sum::<f64>())
        .collect()
}
