//! Observation types and output probability distributions for Strata HMMs.
//!
//! Provides three reference observation/distribution pairings that implement
//! the capability traits from `strata-core`:
//!
//! - **Integer symbols** — [`ObservationInteger`] scored by [`OpdfInteger`]
//! - **Real values** — [`ObservationReal`] scored by [`OpdfGaussian`]
//! - **Real vectors** — [`ObservationVector`] scored by [`OpdfDiagGaussian`]
//!
//! Every distribution also implements [`GenerativeOpdf`] so models can be
//! sampled.

pub mod discrete;
pub mod gaussian;
pub mod generate;
pub mod observation;

pub use discrete::{OpdfInteger, OpdfIntegerFactory};
pub use gaussian::{OpdfDiagGaussian, OpdfDiagGaussianFactory, OpdfGaussian, OpdfGaussianFactory};
pub use generate::GenerativeOpdf;
pub use observation::{
    CentroidInteger, CentroidReal, CentroidVector, ObservationInteger, ObservationReal,
    ObservationVector,
};

use strata_core::{Result, StrataError};

/// Check the shape of a weighted fit and return the total weight.
///
/// Rejects empty input, a weight vector of the wrong length, negative or
/// non-finite weights, and a zero total.
pub(crate) fn total_weight(n_observations: usize, weights: &[f64]) -> Result<f64> {
    if n_observations == 0 {
        return Err(StrataError::InvalidInput(
            "cannot fit a distribution to zero observations".into(),
        ));
    }
    if weights.len() != n_observations {
        return Err(StrataError::DimensionMismatch {
            expected: n_observations,
            found: weights.len(),
        });
    }
    if let Some(w) = weights.iter().find(|w| !w.is_finite() || **w < 0.0) {
        return Err(StrataError::InvalidInput(format!(
            "weights must be finite and non-negative, got {w}"
        )));
    }
    let total: f64 = weights.iter().sum();
    if total <= 0.0 {
        return Err(StrataError::InvalidInput("weights sum to zero".into()));
    }
    Ok(total)
}
