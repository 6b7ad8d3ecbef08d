//! Viterbi decoding in the negative-log domain.

use strata_core::{Opdf, Result};

use crate::model::{validate_sequence, Hmm};

/// Most probable hidden-state path of one sequence under a fixed model.
///
/// `delta[t][i]` is the cost (negative natural log probability) of the best
/// path ending in state `i` at time `t`, and `psy[t][i]` its predecessor.
/// Ties always go to the lowest state index. Zero probabilities become
/// infinite costs, so an impossible sequence decodes to state 0 throughout
/// with a log-probability of negative infinity.
#[derive(Debug, Clone)]
pub struct ViterbiCalculator {
    delta: Vec<Vec<f64>>,
    psy: Vec<Vec<usize>>,
    state_sequence: Vec<usize>,
    ln_probability: f64,
}

impl ViterbiCalculator {
    /// # Errors
    ///
    /// Returns an error for an empty sequence.
    pub fn new<O, D: Opdf<O>>(sequence: &[O], hmm: &Hmm<D>) -> Result<Self> {
        validate_sequence(sequence)?;

        let n = hmm.nb_states();
        let t_len = sequence.len();
        let mut delta = vec![vec![0.0; n]; t_len];
        let mut psy = vec![vec![0usize; n]; t_len];

        for i in 0..n {
            delta[0][i] = -hmm.pi(i).ln() - hmm.opdf(i).probability(&sequence[0]).ln();
        }

        for t in 1..t_len {
            let o = &sequence[t];
            for j in 0..n {
                let mut min_delta = f64::INFINITY;
                let mut min_psy = 0;
                for i in 0..n {
                    let d = delta[t - 1][i] - hmm.aij(i, j).ln();
                    if d < min_delta {
                        min_delta = d;
                        min_psy = i;
                    }
                }
                delta[t][j] = min_delta - hmm.opdf(j).probability(o).ln();
                psy[t][j] = min_psy;
            }
        }

        let mut best_cost = f64::INFINITY;
        let mut best_final = 0;
        for (i, &d) in delta[t_len - 1].iter().enumerate() {
            if d < best_cost {
                best_cost = d;
                best_final = i;
            }
        }

        let mut state_sequence = vec![0usize; t_len];
        state_sequence[t_len - 1] = best_final;
        for t in (0..t_len - 1).rev() {
            state_sequence[t] = psy[t + 1][state_sequence[t + 1]];
        }

        Ok(Self {
            delta,
            psy,
            state_sequence,
            ln_probability: -best_cost,
        })
    }

    /// Best state for every observation.
    pub fn state_sequence(&self) -> &[usize] {
        &self.state_sequence
    }

    pub fn into_state_sequence(self) -> Vec<usize> {
        self.state_sequence
    }

    /// Natural log of the probability of the best path jointly with the
    /// observations.
    pub fn ln_probability(&self) -> f64 {
        self.ln_probability
    }

    /// Cost table `delta[t][i]`.
    pub fn delta(&self) -> &[Vec<f64>] {
        &self.delta
    }

    /// Back-pointer table `psy[t][i]`.
    pub fn psy(&self) -> &[Vec<usize>] {
        &self.psy
    }
}
