//! Global numeric configuration.
//!
//! Holds the fuzz factor (`epsilon`) that metrics add to denominators and use
//! as clipping bounds. It is stored globally as the bit pattern of an `f64` in
//! an `AtomicU64`, so it can be read from kernels running on any thread.
//!
//! # Example
//!
//! ```
//! use metric_layers::config::{epsilon, set_epsilon, DEFAULT_EPSILON};
//!
//! set_epsilon(1e-6).unwrap();
//! assert_eq!(epsilon(), 1e-6);
//! set_epsilon(DEFAULT_EPSILON).unwrap();
//! ```

use crate::error::{LayerError, Result};
use core::sync::atomic::{AtomicU64, Ordering};

/// Fuzz factor used unless overridden.
pub const DEFAULT_EPSILON: f64 = 1e-7;

static GLOBAL_EPSILON: AtomicU64 = AtomicU64::new(DEFAULT_EPSILON.to_bits());

/// Returns the current fuzz factor.
pub fn epsilon() -> f64 {
    f64::from_bits(GLOBAL_EPSILON.load(Ordering::Acquire))
}

/// Sets the fuzz factor used by every metric.
///
/// # Errors
/// Fails with [`LayerError::InvalidConfig`] unless `value` is finite and strictly positive.
pub fn set_epsilon(value: f64) -> Result<()> {
    if !value.is_finite() || value <= 0.0 {
        return Err(LayerError::InvalidConfig(format!(
            "epsilon must be finite and positive, got {value}"
        )));
    }
    GLOBAL_EPSILON.store(value.to_bits(), Ordering::Release);
    tracing::debug!(epsilon = value, "updated global epsilon");
    Ok(())
}
