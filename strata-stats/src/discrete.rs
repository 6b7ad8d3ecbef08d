//! Discrete output distribution over integer symbols.

use rand::Rng;
use strata_core::{Opdf, OpdfFactory, Result, StrataError};

use crate::generate::{sample_discrete, GenerativeOpdf};
use crate::observation::ObservationInteger;

/// Categorical distribution over the symbols `0..nb_entries`.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct OpdfInteger {
    probabilities: Vec<f64>,
}

impl OpdfInteger {
    /// Uniform distribution over `nb_entries` symbols.
    ///
    /// # Errors
    ///
    /// Returns an error if `nb_entries` is zero.
    pub fn new(nb_entries: usize) -> Result<Self> {
        if nb_entries == 0 {
            return Err(StrataError::InvalidInput("nb_entries must be > 0".into()));
        }
        Ok(Self {
            probabilities: vec![1.0 / nb_entries as f64; nb_entries],
        })
    }

    /// Distribution with explicit symbol probabilities.
    ///
    /// # Errors
    ///
    /// Returns an error if the vector is empty, holds values outside
    /// `[0, 1]`, or does not sum to approximately 1.0 (tolerance 1e-6).
    pub fn from_probabilities(probabilities: Vec<f64>) -> Result<Self> {
        if probabilities.is_empty() {
            return Err(StrataError::InvalidInput(
                "probability vector is empty".into(),
            ));
        }
        if let Some((i, p)) = probabilities
            .iter()
            .enumerate()
            .find(|(_, p)| !(0.0..=1.0).contains(*p))
        {
            return Err(StrataError::InvalidInput(format!(
                "probability[{i}] = {p} is outside [0, 1]"
            )));
        }
        let sum: f64 = probabilities.iter().sum();
        if (sum - 1.0).abs() > 1e-6 {
            return Err(StrataError::InvalidInput(format!(
                "probabilities sum to {sum}, expected ~1.0"
            )));
        }
        Ok(Self { probabilities })
    }

    /// Number of symbols.
    pub fn nb_entries(&self) -> usize {
        self.probabilities.len()
    }

    /// Symbol probabilities.
    pub fn probabilities(&self) -> &[f64] {
        &self.probabilities
    }
}

impl Opdf<ObservationInteger> for OpdfInteger {
    /// Out-of-range symbols have probability 0.
    fn probability(&self, observation: &ObservationInteger) -> f64 {
        self.probabilities.get(observation.0).copied().unwrap_or(0.0)
    }

    fn fit(&mut self, observations: &[&ObservationInteger]) -> Result<()> {
        let weights = vec![1.0; observations.len()];
        self.fit_weighted(observations, &weights)
    }

    fn fit_weighted(&mut self, observations: &[&ObservationInteger], weights: &[f64]) -> Result<()> {
        let total = crate::total_weight(observations.len(), weights)?;
        let n = self.probabilities.len();

        let mut counts = vec![0.0; n];
        for (o, &w) in observations.iter().zip(weights) {
            if o.0 >= n {
                return Err(StrataError::InvalidInput(format!(
                    "symbol {} out of range (nb_entries = {n})",
                    o.0
                )));
            }
            counts[o.0] += w;
        }
        for c in &mut counts {
            *c /= total;
        }
        self.probabilities = counts;
        Ok(())
    }
}

impl GenerativeOpdf<ObservationInteger> for OpdfInteger {
    fn generate<R: Rng + ?Sized>(&self, rng: &mut R) -> ObservationInteger {
        ObservationInteger(sample_discrete(&self.probabilities, rng))
    }
}

/// Factory for uniform [`OpdfInteger`] distributions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct OpdfIntegerFactory {
    nb_entries: usize,
}

impl OpdfIntegerFactory {
    /// # Errors
    ///
    /// Returns an error if `nb_entries` is zero.
    pub fn new(nb_entries: usize) -> Result<Self> {
        if nb_entries == 0 {
            return Err(StrataError::InvalidInput("nb_entries must be > 0".into()));
        }
        Ok(Self { nb_entries })
    }
}

impl OpdfFactory<OpdfInteger> for OpdfIntegerFactory {
    fn factor(&self) -> OpdfInteger {
        OpdfInteger {
            probabilities: vec![1.0 / self.nb_entries as f64; self.nb_entries],
        }
    }
}
