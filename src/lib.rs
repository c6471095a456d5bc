//! metric_layers: masked metrics and triplet loss as graph-node layers.
//!
//! Small numeric leaves that sit at the end of a model graph: they consume
//! `y_true`/`y_pred` (or a concatenated embedding) and emit one value per
//! sample for the training loop to aggregate.
//!
//! # Features
//!
//! - [`layers::MetricLayer`]: wraps any metric, honours masks, and keeps
//!   batch-level metrics intact through per-sample averaging.
//! - [`layers::TripletLossLayer`]: L2-normalised triplet loss with an analytic
//!   backward pass.
//! - [`metrics::matthews_correlation`] and a registry of per-sample metrics.
//!
//! # Modules
//!
//! - [`tensors`]: Row-major tensors, broadcasting arithmetic, reductions.
//! - [`backprop`]: Differentiable ops returning backward closures.
//! - [`metrics`]: Metric functions and name resolution.
//! - [`layers`]: The `Layer` lifecycle and the layers themselves.
//! - [`config`]: Global numeric settings (epsilon).
//! - [`approx`]: Tolerance-graded float comparison.
//!
//! # Example
//!
//! ```rust
//! use metric_layers::prelude::*;
//!
//! let batch_metrics = [MetricFunc::from("matthews_correlation")];
//! let mut layer = MetricLayer::new("matthews_correlation", &batch_metrics);
//! layer.build(&InputShape::List(vec![vec![4, 1], vec![4, 1]])).unwrap();
//!
//! let y_true = Tensor::new(vec![4, 1], vec![1.0, 0.0, 1.0, 0.0]);
//! let y_pred = Tensor::new(vec![4, 1], vec![0.9, 0.2, 0.7, 0.1]);
//! let out = layer.call(&[y_true, y_pred], &[]).unwrap();
//!
//! // every sample carries the batch-wide coefficient
//! assert_eq!(out.shape, vec![4, 1]);
//! assert!(out.data.iter().all(|&v| (v - 1.0).abs() < 1e-6));
//! ```

pub mod approx;
pub mod backprop;
pub mod config;
pub mod error;
pub mod layers;
pub mod metrics;
pub mod ops;
pub mod tensors;

/// Everything needed to build and call the layers.
pub mod prelude {
    pub use crate::error::{LayerError, Result};
    pub use crate::layers::{InputShape, Layer, MetricLayer, TripletLossLayer};
    pub use crate::metrics::{Metric, MetricFunc};
    pub use crate::tensors::{Ten64, Tensor, WithGrad};
}
