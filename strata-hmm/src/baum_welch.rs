//! Baum-Welch (soft-assignment EM) re-estimation.
//!
//! Every iteration runs forward-backward over each sequence, derives the
//! expected transition counts (`xi`) and state occupancies (`gamma`), and
//! re-estimates the initial probabilities, the transition matrix and the
//! output distributions from them.

use strata_core::{Opdf, Result, StrataError};
use tracing::{debug, warn, Level};

use crate::forward_backward::{Computation, ForwardBackwardCalculator};
use crate::model::{validate_sequences, Hmm};
use crate::MaybeSync;

/// Configuration for [`BaumWelchLearner`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BaumWelchConfig {
    /// Iterations run by [`BaumWelchLearner::learn`].
    pub nb_iterations: usize,
}

impl Default for BaumWelchConfig {
    fn default() -> Self {
        Self { nb_iterations: 9 }
    }
}

/// Expected counts gathered from one sequence.
struct SequenceStatistics {
    /// `sum_t xi[t][i][j]`, row-major `n * n`.
    xi_sum: Vec<f64>,
    /// `gamma[t][i]` for every time step.
    gamma: Vec<Vec<f64>>,
}

/// Refines an HMM by Baum-Welch re-estimation.
///
/// Learners never touch their input model: each iteration re-estimates into
/// a clone. A fixed number of iterations is run; there is no convergence
/// test.
#[derive(Debug, Clone, Copy, Default)]
pub struct BaumWelchLearner {
    config: BaumWelchConfig,
}

impl BaumWelchLearner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(mut self, config: BaumWelchConfig) -> Self {
        self.config = config;
        self
    }

    pub fn nb_iterations(&self) -> usize {
        self.config.nb_iterations
    }

    /// Run [`iterate`](Self::iterate) `nb_iterations` times starting from
    /// `initial`. Zero iterations return a copy of `initial`.
    ///
    /// # Errors
    ///
    /// Returns an error for an empty sequence set or an empty sequence, and
    /// propagates errors from [`iterate`](Self::iterate).
    pub fn learn<O, D>(&self, initial: &Hmm<D>, sequences: &[Vec<O>]) -> Result<Hmm<D>>
    where
        O: MaybeSync,
        D: Opdf<O> + MaybeSync,
    {
        validate_sequences(sequences)?;
        let mut hmm = initial.clone();
        for iteration in 0..self.config.nb_iterations {
            hmm = self.iterate(&hmm, sequences)?;
            if tracing::enabled!(Level::DEBUG) {
                let ln_likelihood = hmm.ln_probability_all(sequences)?;
                debug!(iteration, ln_likelihood, "baum-welch iteration");
            }
        }
        Ok(hmm)
    }

    /// One re-estimation step. Returns the updated model; `hmm` is only read.
    ///
    /// Transition rows of states never occupied before the last time step
    /// are kept, as are the output distributions of states with zero total
    /// occupancy.
    ///
    /// # Errors
    ///
    /// - `InvalidInput` for an empty sequence set or an empty sequence
    /// - `Numerical` if a sequence has zero likelihood under `hmm`
    /// - errors from fitting the output distributions
    pub fn iterate<O, D>(&self, hmm: &Hmm<D>, sequences: &[Vec<O>]) -> Result<Hmm<D>>
    where
        O: MaybeSync,
        D: Opdf<O> + MaybeSync,
    {
        validate_sequences(sequences)?;

        #[cfg(feature = "parallel")]
        let statistics: Vec<SequenceStatistics> = {
            use rayon::prelude::*;
            sequences
                .par_iter()
                .enumerate()
                .map(|(s, seq)| sequence_statistics(hmm, seq, s))
                .collect::<Result<_>>()?
        };
        #[cfg(not(feature = "parallel"))]
        let statistics: Vec<SequenceStatistics> = sequences
            .iter()
            .enumerate()
            .map(|(s, seq)| sequence_statistics(hmm, seq, s))
            .collect::<Result<_>>()?;

        reestimate(hmm, sequences, &statistics)
    }
}

/// Fold per-sequence statistics, in sequence order, into a re-estimated
/// copy of `hmm`.
fn reestimate<O, D: Opdf<O>>(
    hmm: &Hmm<D>,
    sequences: &[Vec<O>],
    statistics: &[SequenceStatistics],
) -> Result<Hmm<D>> {
    let n = hmm.nb_states();
    let mut aij_num = vec![0.0; n * n];
    let mut aij_den = vec![0.0; n];
    let mut pi = vec![0.0; n];
    for stats in statistics {
        for (num, xi) in aij_num.iter_mut().zip(&stats.xi_sum) {
            *num += xi;
        }
        let t_len = stats.gamma.len();
        for row in &stats.gamma[..t_len - 1] {
            for (den, g) in aij_den.iter_mut().zip(row) {
                *den += g;
            }
        }
        for (p, g) in pi.iter_mut().zip(&stats.gamma[0]) {
            *p += g;
        }
    }

    let mut next = hmm.clone();
    let nb_sequences = sequences.len() as f64;
    for i in 0..n {
        next.set_pi(i, pi[i] / nb_sequences);
        if aij_den[i] > 0.0 {
            for j in 0..n {
                next.set_aij(i, j, aij_num[i * n + j] / aij_den[i]);
            }
        }
    }

    let observations: Vec<&O> = sequences.iter().flatten().collect();
    for i in 0..n {
        let mut weights: Vec<f64> = statistics
            .iter()
            .flat_map(|stats| stats.gamma.iter().map(move |row| row[i]))
            .collect();
        let total: f64 = weights.iter().sum();
        if total > 0.0 {
            for w in &mut weights {
                *w /= total;
            }
            next.opdf_mut(i).fit_weighted(&observations, &weights)?;
        } else {
            warn!(state = i, "state has zero occupancy, keeping its output distribution");
        }
    }

    Ok(next)
}

/// Forward-backward statistics of sequence `index`.
fn sequence_statistics<O, D: Opdf<O>>(
    hmm: &Hmm<D>,
    sequence: &[O],
    index: usize,
) -> Result<SequenceStatistics> {
    let fb = ForwardBackwardCalculator::new(sequence, hmm, Computation::Both)?;
    let probability = fb.probability();
    if !(probability > 0.0) {
        return Err(StrataError::Numerical(format!(
            "sequence {index} has zero likelihood under the current model"
        )));
    }
    let (Some(alpha), Some(beta)) = (fb.alpha_table(), fb.beta_table()) else {
        return Err(StrataError::Other(
            "forward-backward did not produce both tables".into(),
        ));
    };

    let n = hmm.nb_states();
    let t_len = sequence.len();
    let mut xi_sum = vec![0.0; n * n];
    let mut gamma = vec![vec![0.0; n]; t_len];

    if t_len == 1 {
        for i in 0..n {
            gamma[0][i] = alpha[0][i] * beta[0][i] / probability;
        }
        return Ok(SequenceStatistics { xi_sum, gamma });
    }

    for t in 0..t_len - 1 {
        let emission: Vec<f64> = (0..n)
            .map(|j| hmm.opdf(j).probability(&sequence[t + 1]))
            .collect();
        for i in 0..n {
            for j in 0..n {
                let xi = alpha[t][i] * hmm.aij(i, j) * emission[j] * beta[t + 1][j] / probability;
                xi_sum[i * n + j] += xi;
                gamma[t][i] += xi;
                if t == t_len - 2 {
                    gamma[t_len - 1][j] += xi;
                }
            }
        }
    }

    Ok(SequenceStatistics { xi_sum, gamma })
}
