use crate::config::epsilon;
use crate::error::{LayerError, Result};
use crate::tensors::Ten64;

/// Matthews correlation coefficient for binary classification.
///
/// Scores and labels are clipped into `[0, 1]` and rounded, so anything above
/// one half counts as positive. Confusion counts are summed over the whole
/// batch and the result is a rank-0 tensor:
///
/// `(tp*tn - fp*fn) / (sqrt((tp+fp)(tp+fn)(tn+fp)(tn+fn)) + eps)`
///
/// This is a batch-level metric. Averaging it over samples is meaningless, so
/// a [`MetricLayer`](crate::layers::MetricLayer) must list it among its batch
/// metrics for the value to survive the per-sample mean.
///
/// # Errors
/// [`LayerError::ShapeMismatch`] if `y_true` and `y_pred` differ in shape.
pub fn matthews_correlation(y_true: &Ten64, y_pred: &Ten64) -> Result<Ten64> {
    y_true.check()?;
    y_pred.check()?;
    if y_true.shape != y_pred.shape {
        return Err(LayerError::ShapeMismatch {
            op: "matthews_correlation",
            lhs: y_true.shape.clone(),
            rhs: y_pred.shape.clone(),
        });
    }

    let pred_pos = y_pred.clip(0.0, 1.0).round();
    let pos = y_true.clip(0.0, 1.0).round();

    let (mut tp, mut tn, mut fp, mut fn_) = (0.0, 0.0, 0.0, 0.0);
    for (&y, &p) in pos.data.iter().zip(&pred_pos.data) {
        tp += y * p;
        tn += (1.0 - y) * (1.0 - p);
        fp += (1.0 - y) * p;
        fn_ += y * (1.0 - p);
    }

    let numerator = tp * tn - fp * fn_;
    let denominator = ((tp + fp) * (tp + fn_) * (tn + fp) * (tn + fn_)).sqrt();

    Ok(Ten64::scalar(numerator / (denominator + epsilon())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tensors::Tensor;

    #[test]
    fn degenerate_batch_is_zero_not_nan() {
        // every label and prediction positive: denominator collapses to zero
        let y = Tensor::new(vec![3, 1], vec![1.0, 1.0, 1.0]);
        let out = matthews_correlation(&y, &y).unwrap();
        assert_eq!(out.shape, Vec::<usize>::new());
        assert_eq!(out.data, vec![0.0]);
    }

    #[test]
    fn rejects_mismatched_shapes() {
        let a = Ten64::zeros(vec![4, 1]);
        let b = Ten64::zeros(vec![2, 2]);
        assert!(matches!(
            matthews_correlation(&a, &b),
            Err(LayerError::ShapeMismatch { .. })
        ));
    }
}
