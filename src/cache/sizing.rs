//! Footprint estimation for cached values.
//!
//! The estimate is the byte length of the value's JSON encoding. Values that
//! refuse to serialize are charged a fixed default size instead.

use serde::Serialize;
use tracing::debug;

/// Approximates the memory footprint of cached values.
#[derive(Debug, Clone)]
pub struct SizeEstimator {
    default_estimate: usize,
}

impl SizeEstimator {
    pub fn new(default_estimate: usize) -> Self {
        Self { default_estimate }
    }

    /// Estimated size of `value` in bytes.
    pub fn estimate<T: Serialize + ?Sized>(&self, value: &T) -> usize {
        match serde_json::to_vec(value) {
            Ok(encoded) => encoded.len(),
            Err(e) => {
                debug!(
                    error = %e,
                    fallback = self.default_estimate,
                    "Size estimate fell back to default"
                );
                self.default_estimate
            }
        }
    }
}

impl Default for SizeEstimator {
    fn default() -> Self {
        Self::new(1024)
    }
}
