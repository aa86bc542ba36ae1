use serde::Deserialize;
use thiserror::Error;
use tracing::warn;

use crate::link::Dimension;

/// How finite samples outside a dimension's valid range are handled.
///
/// Non-finite samples are always rejected.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum InputPolicy {
    /// Replace the sample with the nearest boundary.
    #[default]
    Clamp,
    /// Drop the sample and keep the previous value.
    Reject,
}

#[derive(Debug, Clone, Copy, Error, PartialEq)]
pub enum InputError {
    #[error("{dimension} sample {value} is not a finite number")]
    NotFinite { dimension: Dimension, value: f64 },
    #[error("{dimension} sample {value} is outside [{min}, {max}]")]
    OutOfRange { dimension: Dimension, value: f64, min: f64, max: f64 },
}

impl InputPolicy {
    /// Returns the value to store for a `dimension` sample, or why it must be dropped.
    pub fn sanitize(self, dimension: Dimension, value: f64) -> Result<f64, InputError> {
        if !value.is_finite() {
            return Err(InputError::NotFinite { dimension, value });
        }

        let (min, max) = dimension.valid_range();
        if (min..=max).contains(&value) {
            return Ok(value);
        }

        match self {
            Self::Clamp => {
                let clamped = value.clamp(min, max);
                warn!(%dimension, value, clamped, "sample out of range, clamping");
                Ok(clamped)
            }
            Self::Reject => Err(InputError::OutOfRange { dimension, value, min, max }),
        }
    }
}
