use super::{InputShape, Layer};
use crate::error::{LayerError, Result};
use crate::metrics::{generic_accuracy, Metric, MetricFunc};
use crate::tensors::Ten64;
use tracing::{debug, trace, warn};

/// A layer that evaluates a metric on `(y_true, y_pred)` while honouring masks.
///
/// The output is always `(batch, 1)`: whatever per-sample shape the metric
/// produces is averaged down, with masked positions excluded from the
/// average rather than counted as zeros.
///
/// Metrics named in `batch_metrics` (those only meaningful over a whole batch,
/// like [`matthews_correlation`](crate::metrics::matthews_correlation)) are
/// broadcast back to every sample, so a later mean over samples reproduces
/// the batch value unchanged.
///
/// # Example
///
/// ```
/// use metric_layers::layers::{InputShape, Layer, MetricLayer};
/// use metric_layers::tensor;
///
/// let mut layer = MetricLayer::new("accuracy", &[]);
/// layer.build(&InputShape::List(vec![vec![2, 1], vec![2, 1]])).unwrap();
///
/// let y_true = tensor!([[1.0], [0.0]]);
/// let y_pred = tensor!([[0.9], [0.8]]);
/// let out = layer.call(&[y_true, y_pred], &[]).unwrap();
/// assert_eq!(out.shape, vec![2, 1]);
/// assert_eq!(out.data, vec![1.0, 0.0]);
/// ```
#[derive(Debug, Clone)]
pub struct MetricLayer {
    name: String,
    metric_func: MetricFunc,
    repeat: bool,
    metric: Option<Metric>,
}

impl MetricLayer {
    /// Creates an unbuilt layer for `metric_func`.
    ///
    /// The repeat flag is set when the metric's name matches any entry of
    /// `batch_metrics`. String identifiers match by their literal name before
    /// alias resolution, so `"mse"` does not match `"mean_squared_error"`.
    pub fn new(metric_func: impl Into<MetricFunc>, batch_metrics: &[MetricFunc]) -> Self {
        let metric_func = metric_func.into();
        let repeat = batch_metrics.iter().any(|m| m.name() == metric_func.name());
        Self {
            name: format!("metric_layer_{}", metric_func.name()),
            metric_func,
            repeat,
            metric: None,
        }
    }

    /// Overrides the generated layer name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// The metric identifier as given at construction.
    pub fn metric_func(&self) -> &MetricFunc {
        &self.metric_func
    }

    /// Whether the metric is treated as batch-level.
    pub fn repeat(&self) -> bool {
        self.repeat
    }

    /// Name of the function `build` resolved, if built.
    pub fn resolved_name(&self) -> Option<&str> {
        self.metric.as_ref().map(Metric::name)
    }

    /// Resolves the identifier and wraps the result so its output always
    /// carries a trailing singleton axis.
    fn resolve(&self) -> Result<Metric> {
        let inner = match &self.metric_func {
            // names like "acc" or "accuracy" get shape-based dispatch
            MetricFunc::Name(name) if name.contains("acc") => {
                Metric::new("generic_accuracy", generic_accuracy)
            }
            other => other.resolve()?,
        };
        let name = inner.name().to_owned();
        Ok(Metric::new(name, move |y_true, y_pred| {
            inner.compute(y_true, y_pred).map(Ten64::expand_last)
        }))
    }
}

/// Multiplies every present mask together; `None` when there are none.
fn combine_masks(masks: &[Option<Ten64>]) -> Result<Option<Ten64>> {
    let mut present = masks.iter().flatten();
    let Some(first) = present.next() else {
        return Ok(None);
    };
    present
        .try_fold(first.clone(), |acc, m| acc.mul(m))
        .map(Some)
}

/// Zeroes masked positions and rescales by the fraction of valid positions
/// along the mask's last axis.
///
/// A mask of higher rank than the metric loses trailing singleton axes first,
/// the same squeeze the metric went through.
fn apply_mask(metric: Ten64, mut mask: Ten64) -> Result<Ten64> {
    while mask.rank() > metric.rank() && mask.shape.last() == Some(&1) {
        mask = mask.squeeze_last();
    }
    if mask.rank() > metric.rank() {
        return Err(LayerError::ShapeMismatch {
            op: "apply_mask",
            lhs: metric.shape,
            rhs: mask.shape,
        });
    }

    let axis = mask.last_axis("apply_mask")?;
    let coverage = mask.mean_axis(axis, true)?;
    if coverage.data.iter().any(|&c| c == 0.0) {
        warn!("mask row with no valid positions; its metric will be NaN");
    }

    let rank = metric.rank();
    let mask = mask.align_leading(rank);
    let coverage = coverage.align_leading(rank);
    metric.mul(&mask)?.div(&coverage)
}

impl Layer for MetricLayer {
    fn name(&self) -> &str {
        &self.name
    }

    fn supports_masking(&self) -> bool {
        true
    }

    fn build(&mut self, input_shape: &InputShape) -> Result<()> {
        let metric = self.resolve()?;
        debug!(
            layer = %self.name,
            metric = metric.name(),
            repeat = self.repeat,
            inputs = input_shape.count(),
            "built metric layer"
        );
        self.metric = Some(metric);
        Ok(())
    }

    fn is_built(&self) -> bool {
        self.metric.is_some()
    }

    fn compute_output_shape(&self, input_shape: &InputShape) -> Result<Vec<usize>> {
        match input_shape {
            InputShape::List(shapes) if shapes.len() == 2 => {
                let batch = shapes[0].first().copied().ok_or(LayerError::ShapeMismatch {
                    op: "compute_output_shape",
                    lhs: shapes[0].clone(),
                    rhs: shapes[1].clone(),
                })?;
                Ok(vec![batch, 1])
            }
            other => Err(LayerError::InputArity {
                expected: 2,
                got: other.count(),
            }),
        }
    }

    fn call(&self, inputs: &[Ten64], masks: &[Option<Ten64>]) -> Result<Ten64> {
        let metric_fn = self.metric.as_ref().ok_or(LayerError::NotBuilt("MetricLayer"))?;
        let [y_true, y_pred] = inputs else {
            return Err(LayerError::InputArity {
                expected: 2,
                got: inputs.len(),
            });
        };

        let mut metric = metric_fn.compute(y_true, y_pred)?;

        if self.repeat {
            metric = Ten64::zeros_like(y_true).add(&metric)?;
        }

        metric = metric.squeeze_last();

        if let Some(mask) = combine_masks(masks)? {
            metric = apply_mask(metric, mask)?;
        }

        if metric.rank() > 1 {
            metric = metric.mean_trailing()?;
        }

        trace!(layer = %self.name, shape = ?metric.shape, "metric layer call");
        Ok(metric.expand_last())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tensors::Tensor;

    #[test]
    fn combine_masks_skips_missing_entries() {
        let a = Tensor::new(vec![2, 2], vec![1.0, 1.0, 0.0, 1.0]);
        let b = Tensor::new(vec![2, 2], vec![1.0, 0.0, 1.0, 1.0]);
        let combined = combine_masks(&[Some(a), None, Some(b)]).unwrap().unwrap();
        assert_eq!(combined.data, vec![1.0, 0.0, 0.0, 1.0]);
        assert_eq!(combine_masks(&[None, None]).unwrap(), None);
        assert_eq!(combine_masks(&[]).unwrap(), None);
    }

    #[test]
    fn lower_rank_mask_aligns_on_leading_axes() {
        // metric (batch=2, T=2, F=2), mask (batch, T)
        let metric = Tensor::new(vec![2, 2, 2], vec![1.0; 8]);
        let mask = Tensor::new(vec![2, 2], vec![1.0, 0.0, 1.0, 1.0]);
        let out = apply_mask(metric, mask).unwrap();
        assert_eq!(out.shape, vec![2, 2, 2]);
        assert_eq!(out.data, vec![2.0, 2.0, 0.0, 0.0, 1.0, 1.0, 1.0, 1.0]);
    }

    #[test]
    fn column_mask_squeezes_to_metric_rank() {
        let metric = Tensor::new(vec![4], vec![1.0, 2.0, 3.0, 4.0]);
        let mask = Tensor::new(vec![4, 1], vec![1.0, 1.0, 0.0, 0.0]);
        let out = apply_mask(metric, mask).unwrap();
        assert_eq!(out.shape, vec![4]);
        assert_eq!(out.data, vec![2.0, 4.0, 0.0, 0.0]);
    }

    #[test]
    fn higher_rank_mask_without_singleton_axes_is_rejected() {
        let metric = Tensor::new(vec![2], vec![1.0, 1.0]);
        let mask = Tensor::new(vec![2, 2], vec![1.0; 4]);
        assert!(matches!(
            apply_mask(metric, mask),
            Err(LayerError::ShapeMismatch { op: "apply_mask", .. })
        ));
    }

    #[test]
    fn accuracy_substring_selects_dispatcher() {
        let mut layer = MetricLayer::new("val_acc", &[]);
        layer.build(&InputShape::List(vec![vec![1, 1], vec![1, 1]])).unwrap();
        assert_eq!(layer.resolved_name(), Some("generic_accuracy"));
    }

    #[test]
    fn callables_never_take_the_accuracy_branch() {
        let m = Metric::new("my_accuracy", |t: &Ten64, _: &Ten64| t.mean_trailing());
        let mut layer = MetricLayer::new(m, &[]);
        layer.build(&InputShape::List(vec![vec![1, 1], vec![1, 1]])).unwrap();
        assert_eq!(layer.resolved_name(), Some("my_accuracy"));
    }
}
