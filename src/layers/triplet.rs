use super::{InputShape, Layer};
use crate::backprop::{triplet_forward, triplet_loss, BackFn};
use crate::error::{LayerError, Result};
use crate::tensors::{Ten64, WithGrad};
use tracing::{debug, trace};

/// Triplet loss with L2 normalisation over one concatenated input.
///
/// The input `x = concat(x_a, x_p, x_n)` has shape `(batch, 3N)`; the layer
/// returns `||x_a - x_n||^2 - ||x_a - x_p||^2` per sample after normalising
/// each slice to unit length. No margin is applied and there are no weights.
#[derive(Debug, Clone)]
pub struct TripletLossLayer {
    name: String,
    n: Option<usize>,
}

impl Default for TripletLossLayer {
    fn default() -> Self {
        Self::new()
    }
}

impl TripletLossLayer {
    /// Creates an unbuilt layer named `triplet_loss_layer`.
    pub fn new() -> Self {
        Self {
            name: "triplet_loss_layer".to_owned(),
            n: None,
        }
    }

    /// Overrides the default layer name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Width of each embedding slice, once built.
    pub fn slice_width(&self) -> Option<usize> {
        self.n
    }

    /// Runs the loss and returns a closure for `dL/dx`.
    ///
    /// # Errors
    /// [`LayerError::NotBuilt`] before `build`, [`LayerError::ShapeMismatch`]
    /// if `x` is narrower than the built width.
    pub fn forward(&self, x: &WithGrad<Ten64>) -> Result<(Ten64, BackFn<'static>)> {
        let n = self.n.ok_or(LayerError::NotBuilt("TripletLossLayer"))?;
        triplet_loss(x, n)
    }
}

fn single_shape(input_shape: &InputShape) -> Result<&[usize]> {
    match input_shape {
        InputShape::Single(shape) => Ok(shape.as_slice()),
        InputShape::List(shapes) => Err(LayerError::InputArity {
            expected: 1,
            got: shapes.len(),
        }),
    }
}

impl Layer for TripletLossLayer {
    fn name(&self) -> &str {
        &self.name
    }

    fn build(&mut self, input_shape: &InputShape) -> Result<()> {
        let shape = single_shape(input_shape)?;
        let n = match shape {
            &[_, width] if width >= 3 => width / 3,
            _ => {
                return Err(LayerError::ShapeMismatch {
                    op: "TripletLossLayer::build",
                    lhs: shape.to_vec(),
                    rhs: Vec::new(),
                });
            }
        };
        debug!(layer = %self.name, n, "built triplet loss layer");
        self.n = Some(n);
        Ok(())
    }

    fn is_built(&self) -> bool {
        self.n.is_some()
    }

    fn compute_output_shape(&self, input_shape: &InputShape) -> Result<Vec<usize>> {
        let shape = single_shape(input_shape)?;
        let batch = shape.first().copied().ok_or(LayerError::ShapeMismatch {
            op: "TripletLossLayer::compute_output_shape",
            lhs: shape.to_vec(),
            rhs: Vec::new(),
        })?;
        Ok(vec![batch, 1])
    }

    fn call(&self, inputs: &[Ten64], masks: &[Option<Ten64>]) -> Result<Ten64> {
        let n = self.n.ok_or(LayerError::NotBuilt("TripletLossLayer"))?;
        if masks.iter().any(Option::is_some) {
            return Err(LayerError::MaskingUnsupported("TripletLossLayer"));
        }
        let [x] = inputs else {
            return Err(LayerError::InputArity {
                expected: 1,
                got: inputs.len(),
            });
        };

        let out = triplet_forward(x, n)?.out;
        trace!(layer = %self.name, batch = out.shape[0], "triplet loss call");
        Ok(out)
    }
}
