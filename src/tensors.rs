//! Core tensor data structures.
//!
//! # Core Tensor Utilities
//!
//! A tensor is a shape plus a flat, row-major buffer. Everything numeric in
//! this crate (metric values, masks, embeddings) flows through [`Ten64`].
//!
//! It supports:
//! - Construction of N-dimensional tensors, including rank-0 scalars
//! - Broadcasting elementwise arithmetic (numpy trailing alignment)
//! - Axis reductions with optional `keepdims`
//! - Shape helpers: squeeze/expand of the trailing axis, last-axis slicing
//! - `WithGrad` pairing of a value with its gradient
//! - The `tensor!` literal macro
//!
//! ## Limitations
//! - Row-major only
//! - Kernels are `f64` only; `Tensor<T>` itself is generic so masks or labels
//!   of other element types can be carried and converted with [`Tensor::cast`]
//!
//! ## Example
//!
//! ```rust
//! use metric_layers::tensors::Tensor;
//! let t = Tensor::new(vec![2, 3], vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
//! assert_eq!(t.shape, vec![2, 3]);
//! let m = t.mean_axis(1, false).unwrap();
//! assert_eq!(m.data, vec![2.0, 5.0]);
//! ```

use crate::error::{LayerError, Result};
use crate::ops::cpu;
use briny::prelude::{TrustedData, Validate, ValidationError};

/// Represents an N-dimensional tensor with a shape and flat row-major data.
///
/// - `shape` defines the structure, e.g. `[2, 3]` for a 2x3 matrix; `[]` is a scalar.
/// - `data` holds the flattened content in row-major order.
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor<T> {
    pub shape: Vec<usize>,
    pub data: Vec<T>,
}

/// The tensor type every kernel operates on.
pub type Ten64 = Tensor<f64>;

impl<T> Tensor<T> {
    /// Creates a new tensor with the given shape and flat data.
    ///
    /// # Panics
    /// Panics if the number of elements in `data` does not match the shape product.
    pub fn new(shape: impl Into<Vec<usize>>, data: Vec<T>) -> Self {
        let shape = shape.into();
        assert_eq!(
            shape.iter().product::<usize>(),
            data.len(),
            "shape {:?} is incompatible with {} data elements",
            shape,
            data.len()
        );
        Self { shape, data }
    }

    /// Number of axes.
    pub fn rank(&self) -> usize {
        self.shape.len()
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Size of `axis`; negative values count from the end like `-1` for the last axis.
    pub fn dim(&self, axis: isize) -> Option<usize> {
        let rank = self.rank() as isize;
        let axis = if axis < 0 { rank + axis } else { axis };
        if (0..rank).contains(&axis) {
            Some(self.shape[axis as usize])
        } else {
            None
        }
    }

    /// Runs the tensor through briny's validation gate.
    ///
    /// Fields are public, so a tensor built with a struct literal can carry a
    /// shape that disagrees with its buffer.
    ///
    /// # Errors
    /// [`LayerError::InvalidTensor`] if shape and data disagree.
    pub fn validated(self) -> Result<Self> {
        TrustedData::new(self)
            .map(|trusted| trusted.into_inner())
            .map_err(|_| LayerError::InvalidTensor)
    }

    /// Validates in place without taking ownership.
    ///
    /// # Errors
    /// [`LayerError::InvalidTensor`] if shape and data disagree.
    pub fn check(&self) -> Result<()> {
        self.validate().map_err(|_| LayerError::InvalidTensor)
    }

    /// Converts every element to `f64`, e.g. a boolean mask into `0.0`/`1.0`.
    pub fn cast(&self) -> Ten64
    where
        T: Copy + IntoF64,
    {
        Tensor {
            shape: self.shape.clone(),
            data: self.data.iter().map(|&x| x.into_f64()).collect(),
        }
    }
}

impl<T> Validate for Tensor<T> {
    fn validate(&self) -> core::result::Result<(), ValidationError> {
        if self.shape.iter().product::<usize>() != self.data.len() {
            return Err(ValidationError);
        }
        Ok(())
    }
}

/// Lossless-enough conversion into the kernel float.
pub trait IntoF64 {
    fn into_f64(self) -> f64;
}

impl IntoF64 for f64 {
    fn into_f64(self) -> f64 {
        self
    }
}

impl IntoF64 for f32 {
    fn into_f64(self) -> f64 {
        f64::from(self)
    }
}

impl IntoF64 for bool {
    fn into_f64(self) -> f64 {
        if self { 1.0 } else { 0.0 }
    }
}

impl IntoF64 for u8 {
    fn into_f64(self) -> f64 {
        f64::from(self)
    }
}

impl IntoF64 for i32 {
    fn into_f64(self) -> f64 {
        f64::from(self)
    }
}

impl Ten64 {
    /// Tensor of zeros with the given shape.
    pub fn zeros(shape: impl Into<Vec<usize>>) -> Self {
        let shape = shape.into();
        let n = shape.iter().product();
        Self::new(shape, vec![0.0; n])
    }

    /// Tensor of zeros shaped like `other`.
    pub fn zeros_like<T>(other: &Tensor<T>) -> Self {
        Self::zeros(other.shape.clone())
    }

    /// Rank-0 tensor holding `value`.
    pub fn scalar(value: f64) -> Self {
        Self::new(Vec::new(), vec![value])
    }

    /// Index of the last axis.
    ///
    /// # Errors
    /// Fails on rank-0 tensors, which have no axes.
    pub fn last_axis(&self, op: &'static str) -> Result<usize> {
        self.rank().checked_sub(1).ok_or(LayerError::ShapeMismatch {
            op,
            lhs: self.shape.clone(),
            rhs: Vec::new(),
        })
    }

    /// Broadcasting `self + other`.
    pub fn add(&self, other: &Ten64) -> Result<Ten64> {
        cpu::zip_with(self, other, "add", |a, b| a + b)
    }

    /// Broadcasting `self - other`.
    pub fn sub(&self, other: &Ten64) -> Result<Ten64> {
        cpu::zip_with(self, other, "sub", |a, b| a - b)
    }

    /// Broadcasting `self * other`.
    pub fn mul(&self, other: &Ten64) -> Result<Ten64> {
        cpu::zip_with(self, other, "mul", |a, b| a * b)
    }

    /// Broadcasting `self / other`.
    pub fn div(&self, other: &Ten64) -> Result<Ten64> {
        cpu::zip_with(self, other, "div", |a, b| a / b)
    }

    /// Broadcasting elementwise equality, `1.0` where equal.
    pub fn equal(&self, other: &Ten64) -> Result<Ten64> {
        cpu::zip_with(self, other, "equal", |a, b| if a == b { 1.0 } else { 0.0 })
    }

    /// Applies `f` to every element.
    pub fn map(&self, f: impl Fn(f64) -> f64 + Sync + Send) -> Ten64 {
        cpu::map(self, f)
    }

    /// Clips every element into `[lo, hi]`.
    pub fn clip(&self, lo: f64, hi: f64) -> Ten64 {
        self.map(move |x| x.clamp(lo, hi))
    }

    /// Rounds half to even.
    pub fn round(&self) -> Ten64 {
        self.map(f64::round_ties_even)
    }

    /// Sum along `axis`.
    pub fn sum_axis(&self, axis: usize, keepdims: bool) -> Result<Ten64> {
        cpu::reduce_axis(self, axis, keepdims, "sum_axis", |lane| lane.iter().sum())
    }

    /// Mean along `axis`.
    pub fn mean_axis(&self, axis: usize, keepdims: bool) -> Result<Ten64> {
        cpu::reduce_axis(self, axis, keepdims, "mean_axis", |lane| {
            lane.iter().sum::<f64>() / lane.len() as f64
        })
    }

    /// Maximum along `axis`.
    pub fn max_axis(&self, axis: usize, keepdims: bool) -> Result<Ten64> {
        cpu::reduce_axis(self, axis, keepdims, "max_axis", |lane| {
            lane.iter().copied().fold(f64::NEG_INFINITY, f64::max)
        })
    }

    /// Index of the first maximum along `axis`, as `f64`.
    pub fn argmax_axis(&self, axis: usize, keepdims: bool) -> Result<Ten64> {
        cpu::reduce_axis(self, axis, keepdims, "argmax_axis", cpu::argmax)
    }

    /// Mean over every axis after the batch axis, giving shape `[batch]`.
    ///
    /// # Errors
    /// Fails on rank-0 tensors.
    pub fn mean_trailing(&self) -> Result<Ten64> {
        let batch = *self.shape.first().ok_or(LayerError::ShapeMismatch {
            op: "mean_trailing",
            lhs: self.shape.clone(),
            rhs: Vec::new(),
        })?;
        let rows = Tensor::new(vec![batch, self.len() / batch.max(1)], self.data.clone());
        rows.mean_axis(1, false)
    }

    /// Appends a trailing singleton axis.
    pub fn expand_last(mut self) -> Ten64 {
        self.shape.push(1);
        self
    }

    /// Removes the trailing axis when it has size 1; otherwise returns `self` unchanged.
    pub fn squeeze_last(mut self) -> Ten64 {
        if self.shape.last() == Some(&1) {
            self.shape.pop();
        }
        self
    }

    /// Appends singleton axes until the tensor has `rank` axes, so it lines up
    /// with a higher-rank tensor on its leading dimensions.
    pub fn align_leading(mut self, rank: usize) -> Ten64 {
        while self.rank() < rank {
            self.shape.push(1);
        }
        self
    }

    /// Columns `[start, end)` of the last axis.
    pub fn slice_last(&self, start: usize, end: usize) -> Result<Ten64> {
        cpu::slice_last(self, start, end)
    }
}

/// A container pairing a value with its gradient (used in autograd).
///
/// Typically used as `WithGrad<Ten64>`.
#[derive(Debug, Clone)]
pub struct WithGrad<T> {
    pub value: T,
    pub grad: T,
}

impl WithGrad<Ten64> {
    /// Wraps `value` with a zeroed gradient of the same shape.
    pub fn new(value: Ten64) -> Self {
        let grad = Ten64::zeros_like(&value);
        Self { value, grad }
    }
}

/// Defines a tensor from nested literal arrays.
///
/// Supports arbitrary dimensionality as long as sublists are uniform in shape.
///
/// # Example
/// ```
/// use metric_layers::tensor;
/// let t = tensor!([[1.0, 2.0], [3.0, 4.0]]);
/// assert_eq!(t.shape, vec![2, 2]);
/// ```
#[macro_export]
macro_rules! tensor {
    ($lit:literal) => {
        $crate::tensors::Tensor::new(Vec::<usize>::new(), vec![$lit])
    };

    ([ $( $inner:tt ),+ $(,)? ]) => {{
        let children = vec![ $( $crate::tensor!($inner) ),+ ];
        let first_shape = &children[0].shape;
        assert!(children.iter().all(|c| c.shape == *first_shape),
            "ragged tensor literal (rows have mismatched shapes)");
        let mut shape = vec![children.len()];
        shape.extend_from_slice(first_shape);
        let mut data = Vec::with_capacity(children.len() * children[0].data.len());
        for c in children { data.extend(c.data); }
        $crate::tensors::Tensor::new(shape, data)
    }};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn squeeze_only_drops_singleton() {
        let t = Tensor::new(vec![2, 1], vec![1.0, 2.0]).squeeze_last();
        assert_eq!(t.shape, vec![2]);
        let t = Tensor::new(vec![2, 3], vec![0.0; 6]).squeeze_last();
        assert_eq!(t.shape, vec![2, 3]);
    }

    #[test]
    fn dim_accepts_negative_axes() {
        let t = Ten64::zeros(vec![4, 3, 2]);
        assert_eq!(t.dim(-1), Some(2));
        assert_eq!(t.dim(1), Some(3));
        assert_eq!(t.dim(3), None);
        assert_eq!(t.dim(-4), None);
    }

    #[test]
    fn struct_literal_with_bad_shape_fails_validation() {
        let t = Tensor { shape: vec![3], data: vec![1.0, 2.0] };
        assert_eq!(t.check(), Err(LayerError::InvalidTensor));
        assert_eq!(t.validated(), Err(LayerError::InvalidTensor));
    }

    #[test]
    fn bool_mask_casts_to_float() {
        let m = Tensor::new(vec![3], vec![true, false, true]).cast();
        assert_eq!(m.data, vec![1.0, 0.0, 1.0]);
    }

    #[test]
    fn mean_trailing_collapses_all_but_batch() {
        let t = Tensor::new(vec![2, 2, 2], vec![1.0, 1.0, 1.0, 1.0, 2.0, 4.0, 6.0, 8.0]);
        assert_eq!(t.mean_trailing().unwrap().data, vec![1.0, 5.0]);
    }
}
