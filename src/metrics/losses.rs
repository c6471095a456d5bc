//! Per-sample regression and cross-entropy metrics.
//!
//! Each reduces over the last axis; clipping bounds come from
//! [`config::epsilon`](crate::config::epsilon).

use crate::config::epsilon;
use crate::error::Result;
use crate::tensors::Ten64;

fn mean_last(t: Ten64, op: &'static str) -> Result<Ten64> {
    let axis = t.last_axis(op)?;
    t.mean_axis(axis, false)
}

fn sum_last(t: Ten64, op: &'static str) -> Result<Ten64> {
    let axis = t.last_axis(op)?;
    t.sum_axis(axis, false)
}

pub fn mean_squared_error(y_true: &Ten64, y_pred: &Ten64) -> Result<Ten64> {
    let diff = y_pred.sub(y_true)?;
    mean_last(diff.map(|d| d * d), "mean_squared_error")
}

pub fn mean_absolute_error(y_true: &Ten64, y_pred: &Ten64) -> Result<Ten64> {
    let diff = y_pred.sub(y_true)?;
    mean_last(diff.map(f64::abs), "mean_absolute_error")
}

/// `100 * mean(|(t - p) / max(|t|, eps)|)`.
pub fn mean_absolute_percentage_error(y_true: &Ten64, y_pred: &Ten64) -> Result<Ten64> {
    let eps = epsilon();
    let scale = y_true.map(move |t| t.abs().max(eps));
    let ratio = y_true.sub(y_pred)?.div(&scale)?;
    Ok(mean_last(ratio.map(f64::abs), "mean_absolute_percentage_error")?.map(|x| 100.0 * x))
}

pub fn mean_squared_logarithmic_error(y_true: &Ten64, y_pred: &Ten64) -> Result<Ten64> {
    let eps = epsilon();
    let log_p = y_pred.map(move |p| (p.max(eps) + 1.0).ln());
    let log_t = y_true.map(move |t| (t.max(eps) + 1.0).ln());
    let diff = log_p.sub(&log_t)?;
    mean_last(diff.map(|d| d * d), "mean_squared_logarithmic_error")
}

/// Mean binary cross-entropy with `y_pred` clipped into `[eps, 1 - eps]`.
pub fn binary_crossentropy(y_true: &Ten64, y_pred: &Ten64) -> Result<Ten64> {
    let eps = epsilon();
    let p = y_pred.clip(eps, 1.0 - eps);
    let terms = bce_terms(y_true, &p)?;
    mean_last(terms, "binary_crossentropy")
}

fn bce_terms(y_true: &Ten64, p: &Ten64) -> Result<Ten64> {
    crate::ops::cpu::zip_with(y_true, p, "binary_crossentropy", |t, p| {
        -(t * p.ln() + (1.0 - t) * (1.0 - p).ln())
    })
}

/// Cross-entropy against one-hot `y_true`; `y_pred` is renormalised to sum to
/// one along the last axis before clipping.
pub fn categorical_crossentropy(y_true: &Ten64, y_pred: &Ten64) -> Result<Ten64> {
    let eps = epsilon();
    let axis = y_pred.last_axis("categorical_crossentropy")?;
    let total = y_pred.sum_axis(axis, true)?;
    let p = y_pred.div(&total)?.clip(eps, 1.0 - eps);
    let terms = y_true.mul(&p.map(f64::ln))?;
    Ok(sum_last(terms, "categorical_crossentropy")?.map(|x| -x))
}

/// `mean(max(1 - t * p, 0))` for labels in `{-1, 1}`.
pub fn hinge(y_true: &Ten64, y_pred: &Ten64) -> Result<Ten64> {
    let margin = y_true.mul(y_pred)?.map(|m| (1.0 - m).max(0.0));
    mean_last(margin, "hinge")
}

/// Negative cosine similarity of the L2-normalised rows.
pub fn cosine_proximity(y_true: &Ten64, y_pred: &Ten64) -> Result<Ten64> {
    let t = l2_normalize_last(y_true, "cosine_proximity")?;
    let p = l2_normalize_last(y_pred, "cosine_proximity")?;
    Ok(sum_last(t.mul(&p)?, "cosine_proximity")?.map(|x| -x))
}

fn l2_normalize_last(t: &Ten64, op: &'static str) -> Result<Ten64> {
    let axis = t.last_axis(op)?;
    let norm = t
        .map(|x| x * x)
        .sum_axis(axis, true)?
        .map(|s| s.max(1e-12).sqrt());
    t.div(&norm)
}
