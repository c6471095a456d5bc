//! Metric functions and the name registry.
//!
//! A metric maps `(y_true, y_pred)` to per-sample values reduced over the last
//! axis, or to a rank-0 scalar for batch-level metrics such as
//! [`matthews_correlation`]. Metrics are referred to either by name, resolved
//! through [`get`], or by a named callable ([`Metric`]).
//!
//! ```
//! use metric_layers::{metrics, tensor};
//!
//! let mse = metrics::get("mse").unwrap();
//! assert_eq!(mse.name(), "mean_squared_error");
//!
//! let y_true = tensor!([[1.0, 0.0], [0.0, 1.0]]);
//! let y_pred = tensor!([[1.0, 0.0], [1.0, 1.0]]);
//! assert_eq!(mse.compute(&y_true, &y_pred).unwrap().data, vec![0.0, 0.5]);
//! ```

mod accuracy;
mod correlation;
mod losses;

pub use self::accuracy::{
    binary_accuracy, categorical_accuracy, generic_accuracy, sparse_categorical_accuracy,
    top_k_categorical_accuracy,
};
pub use self::correlation::matthews_correlation;
pub use self::losses::{
    binary_crossentropy, categorical_crossentropy, cosine_proximity, hinge, mean_absolute_error,
    mean_absolute_percentage_error, mean_squared_error, mean_squared_logarithmic_error,
};

use crate::error::{LayerError, Result};
use crate::tensors::Ten64;
use std::fmt;
use std::sync::Arc;

/// Signature shared by every metric: `(y_true, y_pred) -> values`.
pub type MetricFn = dyn Fn(&Ten64, &Ten64) -> Result<Ten64> + Send + Sync;

/// A metric function together with the name it is known by.
#[derive(Clone)]
pub struct Metric {
    name: String,
    func: Arc<MetricFn>,
}

impl Metric {
    /// Wraps `func` under `name`.
    pub fn new<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&Ten64, &Ten64) -> Result<Ten64> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            func: Arc::new(func),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Evaluates the metric.
    ///
    /// # Errors
    /// Whatever the wrapped function reports, typically [`LayerError::ShapeMismatch`].
    pub fn compute(&self, y_true: &Ten64, y_pred: &Ten64) -> Result<Ten64> {
        (self.func)(y_true, y_pred)
    }
}

impl fmt::Debug for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Metric").field("name", &self.name).finish_non_exhaustive()
    }
}

/// How a caller identifies a metric: by registry name or by callable.
#[derive(Debug, Clone)]
pub enum MetricFunc {
    Name(String),
    Func(Metric),
}

impl MetricFunc {
    /// The identifying name; strings are their own name.
    pub fn name(&self) -> &str {
        match self {
            Self::Name(name) => name,
            Self::Func(metric) => metric.name(),
        }
    }

    /// Resolves to a callable metric.
    ///
    /// # Errors
    /// [`LayerError::UnknownMetric`] for names missing from the registry.
    pub fn resolve(&self) -> Result<Metric> {
        match self {
            Self::Name(name) => get(name),
            Self::Func(metric) => Ok(metric.clone()),
        }
    }
}

impl From<&str> for MetricFunc {
    fn from(name: &str) -> Self {
        Self::Name(name.to_owned())
    }
}

impl From<String> for MetricFunc {
    fn from(name: String) -> Self {
        Self::Name(name)
    }
}

impl From<Metric> for MetricFunc {
    fn from(metric: Metric) -> Self {
        Self::Func(metric)
    }
}

/// Canonical names known to [`get`], aliases excluded.
pub const REGISTERED: &[&str] = &[
    "binary_accuracy",
    "categorical_accuracy",
    "sparse_categorical_accuracy",
    "top_k_categorical_accuracy",
    "mean_squared_error",
    "mean_absolute_error",
    "mean_absolute_percentage_error",
    "mean_squared_logarithmic_error",
    "binary_crossentropy",
    "categorical_crossentropy",
    "hinge",
    "cosine_proximity",
    "matthews_correlation",
];

/// Looks a metric up by name or alias.
///
/// The returned [`Metric`] carries the canonical name, so `get("mse")` is
/// named `mean_squared_error`.
///
/// # Errors
/// [`LayerError::UnknownMetric`] if nothing is registered under `name`.
pub fn get(name: &str) -> Result<Metric> {
    let (canonical, func): (&str, fn(&Ten64, &Ten64) -> Result<Ten64>) = match name {
        "binary_accuracy" => ("binary_accuracy", binary_accuracy),
        "categorical_accuracy" => ("categorical_accuracy", categorical_accuracy),
        "sparse_categorical_accuracy" => {
            ("sparse_categorical_accuracy", sparse_categorical_accuracy)
        }
        "top_k_categorical_accuracy" => ("top_k_categorical_accuracy", top_k_categorical_accuracy),
        "mean_squared_error" | "mse" => ("mean_squared_error", mean_squared_error),
        "mean_absolute_error" | "mae" => ("mean_absolute_error", mean_absolute_error),
        "mean_absolute_percentage_error" | "mape" => {
            ("mean_absolute_percentage_error", mean_absolute_percentage_error)
        }
        "mean_squared_logarithmic_error" | "msle" => {
            ("mean_squared_logarithmic_error", mean_squared_logarithmic_error)
        }
        "binary_crossentropy" => ("binary_crossentropy", binary_crossentropy),
        "categorical_crossentropy" => ("categorical_crossentropy", categorical_crossentropy),
        "hinge" => ("hinge", hinge),
        "cosine_proximity" | "cosine" => ("cosine_proximity", cosine_proximity),
        "matthews_correlation" => ("matthews_correlation", matthews_correlation),
        _ => return Err(LayerError::UnknownMetric(name.to_owned())),
    };
    Ok(Metric::new(canonical, func))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_registered_name_resolves_to_itself() {
        for &name in REGISTERED {
            assert_eq!(get(name).unwrap().name(), name);
        }
    }

    #[test]
    fn aliases_resolve_to_canonical_names() {
        assert_eq!(get("mae").unwrap().name(), "mean_absolute_error");
        assert_eq!(get("cosine").unwrap().name(), "cosine_proximity");
    }

    #[test]
    fn unknown_names_are_rejected() {
        assert_eq!(
            get("f1_score").unwrap_err(),
            LayerError::UnknownMetric("f1_score".into())
        );
    }

    #[test]
    fn metric_func_names() {
        assert_eq!(MetricFunc::from("acc").name(), "acc");
        let m = Metric::new("custom", |t, _| Ok(t.clone()));
        assert_eq!(MetricFunc::from(m).name(), "custom");
    }
}
