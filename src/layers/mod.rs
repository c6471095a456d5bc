//! Graph-node layers.
//!
//! Layers follow a two-phase lifecycle: `build` once the input shapes are
//! known, then `call` for every batch. Shapes passed to `build` and
//! `compute_output_shape` are either one shape or a list, because some layers
//! take several tensors (`y_true`, `y_pred`) and others exactly one.

mod metric;
mod triplet;

pub use self::metric::MetricLayer;
pub use self::triplet::TripletLossLayer;

use crate::error::Result;
use crate::tensors::Ten64;

/// Input shape(s) of a layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputShape {
    /// A single input tensor.
    Single(Vec<usize>),
    /// Several input tensors, in call order.
    List(Vec<Vec<usize>>),
}

impl InputShape {
    /// Number of input tensors described.
    pub fn count(&self) -> usize {
        match self {
            Self::Single(_) => 1,
            Self::List(shapes) => shapes.len(),
        }
    }
}

impl From<Vec<usize>> for InputShape {
    fn from(shape: Vec<usize>) -> Self {
        Self::Single(shape)
    }
}

impl From<Vec<Vec<usize>>> for InputShape {
    fn from(shapes: Vec<Vec<usize>>) -> Self {
        Self::List(shapes)
    }
}

/// An abstraction over the lifecycle every layer shares.
pub trait Layer {
    /// The layer's name, used in logs.
    fn name(&self) -> &str;

    /// Whether the layer accepts input masks.
    fn supports_masking(&self) -> bool {
        false
    }

    /// Fixes shape-dependent state. Must be called before [`Layer::call`].
    ///
    /// # Errors
    /// Layer-specific; typically a wrong input arity or an unresolvable setting.
    fn build(&mut self, input_shape: &InputShape) -> Result<()>;

    /// Whether [`Layer::build`] has succeeded.
    fn is_built(&self) -> bool;

    /// Output shape for the given input shape(s).
    ///
    /// # Errors
    /// Layer-specific arity checks.
    fn compute_output_shape(&self, input_shape: &InputShape) -> Result<Vec<usize>>;

    /// Mask handed to downstream layers. The layers in this crate consume masks
    /// and never propagate them.
    fn compute_mask(&self, _inputs: &[Ten64], _masks: &[Option<Ten64>]) -> Option<Ten64> {
        None
    }

    /// Runs the layer on a batch.
    ///
    /// `masks` holds one optional mask per input (or a single mask); pass an
    /// empty slice when there are none.
    ///
    /// # Errors
    /// Layer-specific; see each implementation.
    fn call(&self, inputs: &[Ten64], masks: &[Option<Ten64>]) -> Result<Ten64>;
}
