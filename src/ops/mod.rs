//! # Tensor Kernels
//!
//! Forward kernels behind the methods on [`Ten64`](crate::tensors::Ten64)
//! and the differentiable ops in [`backprop`](crate::backprop).
//!
//! ## Submodules
//!
//! - [`cpu`]: Multi-threaded CPU kernels (the only backend)
//!
//! ## Extending
//!
//! To add an operation:
//!
//! 1. Implement the kernel in `cpu`
//! 2. Expose it as a `Ten64` method or a `backprop` op
//! 3. Keep shape checks next to the kernel so every caller gets them

pub mod cpu;
