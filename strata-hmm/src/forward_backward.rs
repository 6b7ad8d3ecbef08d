//! Forward-Backward algorithm.
//!
//! [`ForwardBackwardCalculator`] works with plain probabilities, exactly as
//! the recurrences are written:
//!
//! ```text
//! alpha[0][i] = pi[i] * b_i(o_0)
//! alpha[t][j] = b_j(o_t) * sum_i alpha[t-1][i] * a[i][j]
//! beta[T-1][i] = 1
//! beta[t][i]   = sum_j beta[t+1][j] * a[i][j] * b_j(o_{t+1})
//! ```
//!
//! Long sequences underflow to zero. [`ScaledForwardBackwardCalculator`]
//! normalises every time step and reports the log-likelihood instead.

use strata_core::{Opdf, Result};

use crate::model::{validate_sequence, Hmm};

/// Which tables a forward-backward run computes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Computation {
    /// Forward variables only.
    Alpha,
    /// Backward variables only.
    Beta,
    /// Both tables.
    Both,
}

impl Computation {
    fn alpha(self) -> bool {
        matches!(self, Computation::Alpha | Computation::Both)
    }

    fn beta(self) -> bool {
        matches!(self, Computation::Beta | Computation::Both)
    }
}

/// `b[t][i]`: output probability of observation `t` under state `i`.
fn emission_table<O, D: Opdf<O>>(sequence: &[O], hmm: &Hmm<D>) -> Vec<Vec<f64>> {
    sequence
        .iter()
        .map(|o| (0..hmm.nb_states()).map(|i| hmm.opdf(i).probability(o)).collect())
        .collect()
}

// ---------------------------------------------------------------------------
// Plain
// ---------------------------------------------------------------------------

/// Forward and/or backward tables of one sequence under a fixed model.
#[derive(Debug, Clone)]
pub struct ForwardBackwardCalculator {
    alpha: Option<Vec<Vec<f64>>>,
    beta: Option<Vec<Vec<f64>>>,
    probability: f64,
}

impl ForwardBackwardCalculator {
    /// Run the requested passes over `sequence`.
    ///
    /// # Errors
    ///
    /// Returns an error for an empty sequence.
    pub fn new<O, D: Opdf<O>>(
        sequence: &[O],
        hmm: &Hmm<D>,
        computation: Computation,
    ) -> Result<Self> {
        validate_sequence(sequence)?;
        let emission = emission_table(sequence, hmm);

        let alpha = computation.alpha().then(|| compute_alpha(hmm, &emission));
        let beta = computation.beta().then(|| compute_beta(hmm, &emission));

        let n = hmm.nb_states();
        let probability = match (&alpha, &beta) {
            (Some(alpha), _) => alpha[alpha.len() - 1].iter().sum(),
            (None, Some(beta)) => (0..n)
                .map(|i| hmm.pi(i) * emission[0][i] * beta[0][i])
                .sum(),
            (None, None) => unreachable!("every Computation selects at least one pass"),
        };

        Ok(Self {
            alpha,
            beta,
            probability,
        })
    }

    /// `alpha[t][i]`, if the forward pass was requested.
    pub fn alpha(&self, t: usize, i: usize) -> Option<f64> {
        self.alpha.as_ref().map(|a| a[t][i])
    }

    /// `beta[t][i]`, if the backward pass was requested.
    pub fn beta(&self, t: usize, i: usize) -> Option<f64> {
        self.beta.as_ref().map(|b| b[t][i])
    }

    pub fn alpha_table(&self) -> Option<&[Vec<f64>]> {
        self.alpha.as_deref()
    }

    pub fn beta_table(&self) -> Option<&[Vec<f64>]> {
        self.beta.as_deref()
    }

    /// `P(O | model)`.
    pub fn probability(&self) -> f64 {
        self.probability
    }
}

fn compute_alpha<D>(hmm: &Hmm<D>, emission: &[Vec<f64>]) -> Vec<Vec<f64>> {
    let n = hmm.nb_states();
    let t_len = emission.len();
    let mut alpha = vec![vec![0.0; n]; t_len];

    for i in 0..n {
        alpha[0][i] = hmm.pi(i) * emission[0][i];
    }
    for t in 1..t_len {
        for j in 0..n {
            let sum: f64 = (0..n).map(|i| alpha[t - 1][i] * hmm.aij(i, j)).sum();
            alpha[t][j] = sum * emission[t][j];
        }
    }
    alpha
}

fn compute_beta<D>(hmm: &Hmm<D>, emission: &[Vec<f64>]) -> Vec<Vec<f64>> {
    let n = hmm.nb_states();
    let t_len = emission.len();
    let mut beta = vec![vec![0.0; n]; t_len];

    beta[t_len - 1] = vec![1.0; n];
    for t in (0..t_len - 1).rev() {
        for i in 0..n {
            beta[t][i] = (0..n)
                .map(|j| beta[t + 1][j] * hmm.aij(i, j) * emission[t + 1][j])
                .sum();
        }
    }
    beta
}

// ---------------------------------------------------------------------------
// Scaled
// ---------------------------------------------------------------------------

/// Forward-backward with per-step normalisation.
///
/// Each forward row is divided by its sum `c_t`, so `sum_i alpha[t][i] = 1`
/// and `ln P(O | model) = sum_t ln c_t`. Backward rows are divided by the
/// same factors. The forward pass always runs because the factors come from
/// it; `computation` only controls whether the backward table is built.
#[derive(Debug, Clone)]
pub struct ScaledForwardBackwardCalculator {
    alpha: Vec<Vec<f64>>,
    beta: Option<Vec<Vec<f64>>>,
    scaling: Vec<f64>,
    ln_probability: f64,
}

impl ScaledForwardBackwardCalculator {
    /// # Errors
    ///
    /// Returns an error for an empty sequence.
    pub fn new<O, D: Opdf<O>>(
        sequence: &[O],
        hmm: &Hmm<D>,
        computation: Computation,
    ) -> Result<Self> {
        validate_sequence(sequence)?;
        let emission = emission_table(sequence, hmm);
        let n = hmm.nb_states();
        let t_len = sequence.len();

        let mut alpha = vec![vec![0.0; n]; t_len];
        let mut scaling = vec![0.0; t_len];
        for t in 0..t_len {
            for j in 0..n {
                alpha[t][j] = if t == 0 {
                    hmm.pi(j) * emission[0][j]
                } else {
                    (0..n).map(|i| alpha[t - 1][i] * hmm.aij(i, j)).sum::<f64>() * emission[t][j]
                };
            }
            scaling[t] = alpha[t].iter().sum();
            if scaling[t] > 0.0 {
                for a in &mut alpha[t] {
                    *a /= scaling[t];
                }
            }
        }

        let beta = computation.beta().then(|| {
            let mut beta = vec![vec![0.0; n]; t_len];
            beta[t_len - 1] = vec![1.0; n];
            for t in (0..t_len - 1).rev() {
                for i in 0..n {
                    let sum: f64 = (0..n)
                        .map(|j| beta[t + 1][j] * hmm.aij(i, j) * emission[t + 1][j])
                        .sum();
                    beta[t][i] = if scaling[t + 1] > 0.0 {
                        sum / scaling[t + 1]
                    } else {
                        sum
                    };
                }
            }
            beta
        });

        let ln_probability = scaling.iter().map(|c| c.ln()).sum();

        Ok(Self {
            alpha,
            beta,
            scaling,
            ln_probability,
        })
    }

    /// Normalised forward table.
    pub fn alpha_table(&self) -> &[Vec<f64>] {
        &self.alpha
    }

    /// Backward table scaled by the forward factors, if requested.
    pub fn beta_table(&self) -> Option<&[Vec<f64>]> {
        self.beta.as_deref()
    }

    /// Per-step scaling factors `c_t`.
    pub fn scaling_factors(&self) -> &[f64] {
        &self.scaling
    }

    /// `ln P(O | model)`; negative infinity when the sequence is impossible.
    pub fn ln_probability(&self) -> f64 {
        self.ln_probability
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_stats::{ObservationInteger, OpdfInteger};

    fn coin_hmm() -> Hmm<OpdfInteger> {
        Hmm::from_parts(
            vec![0.6, 0.4],
            vec![0.7, 0.3, 0.4, 0.6],
            vec![
                OpdfInteger::from_probabilities(vec![0.9, 0.1]).unwrap(),
                OpdfInteger::from_probabilities(vec![0.2, 0.8]).unwrap(),
            ],
        )
        .unwrap()
    }

    fn obs(symbols: &[usize]) -> Vec<ObservationInteger> {
        symbols.iter().map(|&s| ObservationInteger(s)).collect()
    }

    #[test]
    fn single_observation_probability() {
        let hmm = coin_hmm();
        let fb = ForwardBackwardCalculator::new(&obs(&[0]), &hmm, Computation::Alpha).unwrap();
        let expected = 0.6 * 0.9 + 0.4 * 0.2;
        assert!((fb.probability() - expected).abs() < 1e-12);
        assert!(fb.beta_table().is_none());
        assert_eq!(fb.alpha(0, 0), Some(0.6 * 0.9));
    }

    #[test]
    fn two_step_probability_by_enumeration() {
        let hmm = coin_hmm();
        let seq = obs(&[0, 1]);
        let fb = ForwardBackwardCalculator::new(&seq, &hmm, Computation::Both).unwrap();

        let b = |i: usize, s: usize| hmm.opdf(i).probability(&ObservationInteger(s));
        let mut expected = 0.0;
        for i in 0..2 {
            for j in 0..2 {
                expected += hmm.pi(i) * b(i, 0) * hmm.aij(i, j) * b(j, 1);
            }
        }
        assert!((fb.probability() - expected).abs() < 1e-12);
    }

    #[test]
    fn forward_and_backward_likelihoods_agree() {
        let hmm = coin_hmm();
        let seq = obs(&[0, 1, 1, 0, 0, 1, 0]);
        let fwd = ForwardBackwardCalculator::new(&seq, &hmm, Computation::Alpha).unwrap();
        let bwd = ForwardBackwardCalculator::new(&seq, &hmm, Computation::Beta).unwrap();
        assert!(fwd.alpha_table().is_some());
        assert!(bwd.alpha_table().is_none());
        assert!((fwd.probability() - bwd.probability()).abs() < 1e-15);
    }

    #[test]
    fn alpha_beta_product_is_constant_over_time() {
        let hmm = coin_hmm();
        let seq = obs(&[1, 0, 0, 1]);
        let fb = ForwardBackwardCalculator::new(&seq, &hmm, Computation::Both).unwrap();
        for t in 0..seq.len() {
            let p: f64 = (0..2)
                .map(|i| fb.alpha(t, i).unwrap() * fb.beta(t, i).unwrap())
                .sum();
            assert!((p - fb.probability()).abs() < 1e-12, "t={t}");
        }
    }

    #[test]
    fn scaled_matches_plain() {
        let hmm = coin_hmm();
        let seq = obs(&[0, 1, 1, 0, 1]);
        let plain = ForwardBackwardCalculator::new(&seq, &hmm, Computation::Both).unwrap();
        let scaled = ScaledForwardBackwardCalculator::new(&seq, &hmm, Computation::Both).unwrap();
        assert!((plain.probability().ln() - scaled.ln_probability()).abs() < 1e-10);
        for row in scaled.alpha_table() {
            assert!((row.iter().sum::<f64>() - 1.0).abs() < 1e-12);
        }
        assert_eq!(scaled.scaling_factors().len(), seq.len());

        // scaled alpha * scaled beta is the posterior
        let alpha = scaled.alpha_table();
        let beta = scaled.beta_table().unwrap();
        for t in 0..seq.len() {
            let s: f64 = (0..2).map(|i| alpha[t][i] * beta[t][i]).sum();
            assert!((s - 1.0).abs() < 1e-9, "t={t}");
        }
    }

    #[test]
    fn scaled_survives_long_sequences() {
        let hmm = coin_hmm();
        let seq = obs(&[0, 1].repeat(1000));
        let plain = ForwardBackwardCalculator::new(&seq, &hmm, Computation::Alpha).unwrap();
        let scaled = ScaledForwardBackwardCalculator::new(&seq, &hmm, Computation::Alpha).unwrap();
        assert_eq!(plain.probability(), 0.0);
        assert!(scaled.ln_probability().is_finite());
        assert!(scaled.ln_probability() < 0.0);
    }

    #[test]
    fn impossible_sequence_has_zero_probability() {
        let hmm = Hmm::from_parts(
            vec![1.0],
            vec![1.0],
            vec![OpdfInteger::from_probabilities(vec![1.0, 0.0]).unwrap()],
        )
        .unwrap();
        let seq = obs(&[0, 1]);
        let fb = ForwardBackwardCalculator::new(&seq, &hmm, Computation::Alpha).unwrap();
        assert_eq!(fb.probability(), 0.0);
        let scaled = ScaledForwardBackwardCalculator::new(&seq, &hmm, Computation::Alpha).unwrap();
        assert_eq!(scaled.ln_probability(), f64::NEG_INFINITY);
    }

    #[test]
    fn empty_sequence_is_rejected() {
        let hmm = coin_hmm();
        assert!(ForwardBackwardCalculator::new(&obs(&[]), &hmm, Computation::Both).is_err());
        assert!(ScaledForwardBackwardCalculator::new(&obs(&[]), &hmm, Computation::Both).is_err());
    }
}
