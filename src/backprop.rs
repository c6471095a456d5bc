//! Differentiable operations.
//!
//! # Autograd Pattern
//!
//! Each operation follows the same shape:
//! 1. **Inputs** are references to `WithGrad<Ten64>`.
//! 2. **Forward Pass** computes an output `Ten64`.
//! 3. **Backward Pass** returns a closure capturing the minimal cloned data
//!    needed to map `dL/d(out)` to `dL/d(input)`.
//!
//! ## Usage Guidelines
//!
//! - Forward passes report shape problems as errors.
//! - Backward closures assume `dL/d(out)` has the forward output's shape and
//!   panic otherwise.
//! - Closures implement `Fn`, so they can be invoked more than once.
//!
//! ## Example
//!
//! ```rust
//! use metric_layers::backprop::triplet_loss;
//! use metric_layers::tensors::{Tensor, WithGrad};
//!
//! // anchor = positive = [1, 0], negative = [0, 1]
//! let x = WithGrad::new(Tensor::new(vec![1, 6], vec![1.0, 0.0, 1.0, 0.0, 0.0, 1.0]));
//! let (loss, back) = triplet_loss(&x, 2).unwrap();
//! assert_eq!(loss.data, vec![2.0]);
//! let grad = back(&Tensor::new(vec![1, 1], vec![1.0]));
//! assert_eq!(grad.shape, vec![1, 6]);
//! ```

use crate::error::{LayerError, Result};
use crate::ops::cpu;
use crate::tensors::{Ten64, Tensor, WithGrad};
use rayon::prelude::*;
use tracing::warn;

/// A backward closure mapping `dL/d(out)` to `dL/d(input)`.
pub type BackFn<'a> = Box<dyn Fn(&Ten64) -> Ten64 + 'a>;

/// Gradient of `u = x / ||x||` for one row: `(g - u (u . g)) / ||x||`.
fn normalize_backward(u: &[f64], g: &[f64], norm: f64, out: &mut [f64]) {
    let dot: f64 = u.iter().zip(g).map(|(a, b)| a * b).sum();
    for ((o, &ui), &gi) in out.iter_mut().zip(u).zip(g) {
        *o = (gi - ui * dot) / norm;
    }
}

fn require_matrix(t: &Ten64, op: &'static str) -> Result<(usize, usize)> {
    t.check()?;
    match t.shape.as_slice() {
        &[rows, cols] => Ok((rows, cols)),
        _ => Err(LayerError::ShapeMismatch {
            op,
            lhs: t.shape.clone(),
            rhs: Vec::new(),
        }),
    }
}

/// Divides every row of a `(batch, features)` matrix by its Euclidean norm.
///
/// Zero rows are not guarded and come out as NaN.
///
/// # Errors
/// [`LayerError::ShapeMismatch`] unless the input is rank 2.
pub fn l2_normalize(input: &WithGrad<Ten64>) -> Result<(Ten64, BackFn<'static>)> {
    let (_, width) = require_matrix(&input.value, "l2_normalize")?;
    let norms = cpu::row_norms(&input.value);
    let out = cpu::scale_rows(&input.value, &norms);

    let unit = out.clone();
    let back = move |grad_output: &Ten64| {
        assert_eq!(grad_output.shape, unit.shape, "gradient shape mismatch");
        let mut grad = vec![0.0; unit.len()];
        grad.par_chunks_mut(width.max(1))
            .zip(unit.data.par_chunks(width.max(1)))
            .zip(grad_output.data.par_chunks(width.max(1)))
            .zip(norms.par_iter())
            .for_each(|(((g_in, u), g_out), &norm)| normalize_backward(u, g_out, norm, g_in));
        Tensor::new(unit.shape.clone(), grad)
    };

    Ok((out, Box::new(back)))
}

/// Intermediate values of the triplet loss forward pass.
pub(crate) struct TripletForward {
    pub out: Ten64,
    anchor: Ten64,
    positive: Ten64,
    negative: Ten64,
    norms: [Vec<f64>; 3],
}

/// Forward pass of [`triplet_loss`] without building a backward closure.
pub(crate) fn triplet_forward(input: &Ten64, n: usize) -> Result<TripletForward> {
    let (batch, width) = require_matrix(input, "triplet_loss")?;
    if n == 0 || 3 * n > width {
        return Err(LayerError::ShapeMismatch {
            op: "triplet_loss",
            lhs: input.shape.clone(),
            rhs: vec![3 * n],
        });
    }

    let unit = |k: usize| -> Result<(Ten64, Vec<f64>)> {
        let slice = input.slice_last(k * n, (k + 1) * n)?;
        let norms = cpu::row_norms(&slice);
        Ok((cpu::scale_rows(&slice, &norms), norms))
    };
    let (anchor, anchor_norms) = unit(0)?;
    let (positive, positive_norms) = unit(1)?;
    let (negative, negative_norms) = unit(2)?;
    let norms = [anchor_norms, positive_norms, negative_norms];

    if norms.iter().flatten().any(|&r| r == 0.0) {
        warn!("zero-norm embedding in triplet input; loss will be NaN");
    }

    let dn = cpu::row_sq_dist(&anchor, &negative);
    let dp = cpu::row_sq_dist(&anchor, &positive);
    let data = dn.iter().zip(&dp).map(|(neg, pos)| neg - pos).collect();

    Ok(TripletForward {
        out: Tensor::new(vec![batch, 1], data),
        anchor,
        positive,
        negative,
        norms,
    })
}

/// Triplet loss with L2 normalisation on a concatenated `(batch, 3N)` input.
///
/// The input holds the anchor, positive and negative embeddings side by side,
/// each `n` wide. Every slice is normalised per sample, then
///
/// `out = ||a - neg||^2 - ||a - pos||^2`
///
/// with shape `(batch, 1)`.
///
/// # Returns
/// - Output tensor `(batch, 1)`
/// - Closure mapping `dL/d(out)` to `dL/d(x)` of shape `(batch, width)`;
///   columns past `3n` get zero gradient
///
/// # Errors
/// [`LayerError::ShapeMismatch`] unless the input is rank 2 with at least `3n` columns.
pub fn triplet_loss(x: &WithGrad<Ten64>, n: usize) -> Result<(Ten64, BackFn<'static>)> {
    let TripletForward {
        out,
        anchor,
        positive,
        negative,
        norms,
    } = triplet_forward(&x.value, n)?;

    let shape = x.value.shape.clone();
    let width = shape[1];

    let back = move |grad_output: &Ten64| {
        assert_eq!(
            grad_output.len(),
            shape[0],
            "gradient must have one entry per sample"
        );
        let mut grad = vec![0.0; shape[0] * width];

        grad.par_chunks_mut(width)
            .enumerate()
            .for_each(|(b, row)| {
                let g = grad_output.data[b];
                let a = &anchor.data[b * n..(b + 1) * n];
                let p = &positive.data[b * n..(b + 1) * n];
                let q = &negative.data[b * n..(b + 1) * n];

                let ga: Vec<f64> = p.iter().zip(q).map(|(p, q)| 2.0 * g * (p - q)).collect();
                let gp: Vec<f64> = a.iter().zip(p).map(|(a, p)| 2.0 * g * (a - p)).collect();
                let gq: Vec<f64> = a.iter().zip(q).map(|(a, q)| -2.0 * g * (a - q)).collect();

                let (ra, rest) = row.split_at_mut(n);
                let (rp, rest) = rest.split_at_mut(n);
                normalize_backward(a, &ga, norms[0][b], ra);
                normalize_backward(p, &gp, norms[1][b], rp);
                normalize_backward(q, &gq, norms[2][b], &mut rest[..n]);
            });

        Tensor::new(shape.clone(), grad)
    };

    Ok((out, Box::new(back)))
}
