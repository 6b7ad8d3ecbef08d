//! The Hidden Markov Model value the learners produce and consume.

use strata_core::{Opdf, OpdfFactory, Result, StrataError, Summarizable};

use crate::forward_backward::{Computation, ForwardBackwardCalculator, ScaledForwardBackwardCalculator};
use crate::viterbi::ViterbiCalculator;

/// Tolerance used when validating that probability vectors sum to one.
const STOCHASTIC_TOL: f64 = 1e-6;

/// A Hidden Markov Model with one output distribution per state.
///
/// `D` is the output probability distribution (opdf) family; any type
/// implementing [`Opdf`] for the observation type can be used. Cloning an
/// `Hmm` is a deep copy of every parameter.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Hmm<D> {
    /// Number of hidden states.
    nb_states: usize,
    /// Initial state probabilities pi[i] (length `nb_states`).
    pi: Vec<f64>,
    /// Transition matrix A[i][j] = P(state_j | state_i), stored row-major
    /// as `Vec<f64>` of size `nb_states * nb_states`.
    a: Vec<f64>,
    /// One output distribution per state.
    opdfs: Vec<D>,
}

impl<D> Hmm<D> {
    /// Create a model with uniform initial and transition probabilities and
    /// every opdf built by `factory`.
    ///
    /// # Errors
    ///
    /// Returns an error if `nb_states` is zero.
    pub fn new<F: OpdfFactory<D>>(nb_states: usize, factory: &F) -> Result<Self> {
        if nb_states == 0 {
            return Err(StrataError::InvalidInput("nb_states must be > 0".into()));
        }
        let p = 1.0 / nb_states as f64;
        Ok(Self {
            nb_states,
            pi: vec![p; nb_states],
            a: vec![p; nb_states * nb_states],
            opdfs: (0..nb_states).map(|_| factory.factor()).collect(),
        })
    }

    /// Create a model from explicit parameters after validating dimensions
    /// and probability constraints.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - `pi` is empty
    /// - `a` or `opdfs` do not match the number of states
    /// - any probability is outside `[0, 1]`
    /// - `pi` or a row of `a` does not sum to approximately 1.0 (tolerance 1e-6)
    pub fn from_parts(pi: Vec<f64>, a: Vec<f64>, opdfs: Vec<D>) -> Result<Self> {
        let nb_states = pi.len();
        if nb_states == 0 {
            return Err(StrataError::InvalidInput("nb_states must be > 0".into()));
        }
        if a.len() != nb_states * nb_states {
            return Err(StrataError::InvalidInput(format!(
                "transition length {} != nb_states*nb_states {}",
                a.len(),
                nb_states * nb_states
            )));
        }
        if opdfs.len() != nb_states {
            return Err(StrataError::InvalidInput(format!(
                "{} opdfs for {} states",
                opdfs.len(),
                nb_states
            )));
        }
        if let Some(p) = pi.iter().chain(&a).find(|p| !(0.0..=1.0).contains(*p)) {
            return Err(StrataError::InvalidInput(format!(
                "probability {p} is outside [0, 1]"
            )));
        }

        let pi_sum: f64 = pi.iter().sum();
        if (pi_sum - 1.0).abs() > STOCHASTIC_TOL {
            return Err(StrataError::InvalidInput(format!(
                "initial probabilities sum to {pi_sum}, expected ~1.0"
            )));
        }
        for (i, row) in a.chunks(nb_states).enumerate() {
            let row_sum: f64 = row.iter().sum();
            if (row_sum - 1.0).abs() > STOCHASTIC_TOL {
                return Err(StrataError::InvalidInput(format!(
                    "transition row {i} sums to {row_sum}, expected ~1.0"
                )));
            }
        }

        Ok(Self {
            nb_states,
            pi,
            a,
            opdfs,
        })
    }

    /// Number of hidden states.
    pub fn nb_states(&self) -> usize {
        self.nb_states
    }

    pub fn pi(&self, i: usize) -> f64 {
        self.pi[i]
    }

    pub fn set_pi(&mut self, i: usize, value: f64) {
        self.pi[i] = value;
    }

    /// Probability of moving from state `i` to state `j`.
    pub fn aij(&self, i: usize, j: usize) -> f64 {
        self.a[i * self.nb_states + j]
    }

    pub fn set_aij(&mut self, i: usize, j: usize, value: f64) {
        self.a[i * self.nb_states + j] = value;
    }

    pub fn opdf(&self, i: usize) -> &D {
        &self.opdfs[i]
    }

    pub fn opdf_mut(&mut self, i: usize) -> &mut D {
        &mut self.opdfs[i]
    }

    pub fn set_opdf(&mut self, i: usize, opdf: D) {
        self.opdfs[i] = opdf;
    }

    /// Initial state probabilities.
    pub fn initial(&self) -> &[f64] {
        &self.pi
    }

    /// Row-major transition matrix.
    pub fn transition(&self) -> &[f64] {
        &self.a
    }

    /// Outgoing transition probabilities of state `i`.
    pub fn transition_row(&self, i: usize) -> &[f64] {
        &self.a[i * self.nb_states..(i + 1) * self.nb_states]
    }

    pub fn opdfs(&self) -> &[D] {
        &self.opdfs
    }

    /// Probability of `sequence` under this model, by the forward algorithm.
    ///
    /// Plain probability arithmetic; long sequences underflow to zero. Use
    /// [`ln_probability`](Self::ln_probability) to score those.
    ///
    /// # Errors
    ///
    /// Returns an error for an empty sequence.
    pub fn probability<O>(&self, sequence: &[O]) -> Result<f64>
    where
        D: Opdf<O>,
    {
        Ok(ForwardBackwardCalculator::new(sequence, self, Computation::Alpha)?.probability())
    }

    /// Natural log of the probability of `sequence`, computed with scaled
    /// forward variables so it stays finite on long sequences.
    ///
    /// # Errors
    ///
    /// Returns an error for an empty sequence.
    pub fn ln_probability<O>(&self, sequence: &[O]) -> Result<f64>
    where
        D: Opdf<O>,
    {
        Ok(ScaledForwardBackwardCalculator::new(sequence, self, Computation::Alpha)?.ln_probability())
    }

    /// Sum of [`ln_probability`](Self::ln_probability) over several
    /// independent sequences.
    ///
    /// # Errors
    ///
    /// Returns an error if any sequence is empty.
    pub fn ln_probability_all<O>(&self, sequences: &[Vec<O>]) -> Result<f64>
    where
        D: Opdf<O>,
    {
        sequences
            .iter()
            .map(|s| self.ln_probability(s))
            .sum()
    }

    /// Most likely hidden-state path for `sequence` (Viterbi).
    ///
    /// # Errors
    ///
    /// Returns an error for an empty sequence.
    pub fn most_likely_state_sequence<O>(&self, sequence: &[O]) -> Result<Vec<usize>>
    where
        D: Opdf<O>,
    {
        Ok(ViterbiCalculator::new(sequence, self)?.into_state_sequence())
    }
}

impl<D> Summarizable for Hmm<D> {
    fn summary(&self) -> String {
        let pi: Vec<String> = self.pi.iter().map(|p| format!("{p:.3}")).collect();
        format!("HMM: {} states, pi=[{}]", self.nb_states, pi.join(", "))
    }
}

/// Reject empty observation sequences.
pub(crate) fn validate_sequence<O>(sequence: &[O]) -> Result<()> {
    if sequence.is_empty() {
        return Err(StrataError::InvalidInput(
            "observation sequence is empty".into(),
        ));
    }
    Ok(())
}

/// Reject an empty sequence set or any empty sequence in it.
pub(crate) fn validate_sequences<O>(sequences: &[Vec<O>]) -> Result<()> {
    if sequences.is_empty() {
        return Err(StrataError::InvalidInput("no observation sequences".into()));
    }
    for (s, seq) in sequences.iter().enumerate() {
        if seq.is_empty() {
            return Err(StrataError::InvalidInput(format!(
                "observation sequence {s} is empty"
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_stats::{ObservationInteger, OpdfInteger, OpdfIntegerFactory};

    fn coin_hmm() -> Hmm<OpdfInteger> {
        Hmm::from_parts(
            vec![0.5, 0.5],
            vec![
                0.9, 0.1, // fair -> fair, loaded
                0.2, 0.8, // loaded -> fair, loaded
            ],
            vec![
                OpdfInteger::from_probabilities(vec![0.5, 0.5]).unwrap(),
                OpdfInteger::from_probabilities(vec![0.8, 0.2]).unwrap(),
            ],
        )
        .unwrap()
    }

    #[test]
    fn new_is_uniform() {
        let hmm = Hmm::new(4, &OpdfIntegerFactory::new(2).unwrap()).unwrap();
        assert_eq!(hmm.nb_states(), 4);
        assert!(hmm.initial().iter().all(|&p| (p - 0.25).abs() < 1e-12));
        assert!(hmm.transition().iter().all(|&p| (p - 0.25).abs() < 1e-12));
        assert_eq!(hmm.opdfs().len(), 4);
    }

    #[test]
    fn new_rejects_zero_states() {
        assert!(Hmm::new(0, &OpdfIntegerFactory::new(2).unwrap()).is_err());
    }

    #[test]
    fn accessors_are_row_major() {
        let mut hmm = coin_hmm();
        assert_eq!(hmm.aij(0, 1), 0.1);
        assert_eq!(hmm.aij(1, 0), 0.2);
        assert_eq!(hmm.transition_row(1), &[0.2, 0.8]);
        hmm.set_aij(1, 0, 0.3);
        hmm.set_pi(0, 0.7);
        assert_eq!(hmm.aij(1, 0), 0.3);
        assert_eq!(hmm.pi(0), 0.7);
    }

    #[test]
    fn clone_is_independent() {
        let hmm = coin_hmm();
        let mut copy = hmm.clone();
        copy.set_pi(0, 1.0);
        copy.set_opdf(0, OpdfInteger::from_probabilities(vec![1.0, 0.0]).unwrap());
        assert_eq!(hmm.pi(0), 0.5);
        assert_eq!(hmm.opdf(0).probabilities(), &[0.5, 0.5]);
    }

    #[test]
    fn from_parts_validates() {
        let opdfs = || vec![OpdfInteger::new(2).unwrap(), OpdfInteger::new(2).unwrap()];
        assert!(Hmm::<OpdfInteger>::from_parts(vec![], vec![], vec![]).is_err());
        assert!(Hmm::from_parts(vec![0.5, 0.5], vec![0.5; 3], opdfs()).is_err());
        assert!(Hmm::from_parts(vec![0.3, 0.3], vec![0.5; 4], opdfs()).is_err());
        assert!(Hmm::from_parts(vec![0.5, 0.5], vec![0.9, 0.9, 0.5, 0.5], opdfs()).is_err());
        assert!(Hmm::from_parts(vec![1.5, -0.5], vec![0.5; 4], opdfs()).is_err());
        assert!(Hmm::from_parts(vec![0.5, 0.5], vec![0.5; 4], vec![OpdfInteger::new(2).unwrap()]).is_err());
        assert!(Hmm::from_parts(vec![0.5, 0.5], vec![0.5; 4], opdfs()).is_ok());
    }

    #[test]
    fn probability_and_ln_probability_agree() {
        let hmm = coin_hmm();
        let obs: Vec<ObservationInteger> = [0, 0, 1, 0, 1].iter().map(|&s| ObservationInteger(s)).collect();
        let p = hmm.probability(&obs).unwrap();
        let lp = hmm.ln_probability(&obs).unwrap();
        assert!(p > 0.0 && p < 1.0);
        assert!((p.ln() - lp).abs() < 1e-9);
    }

    #[test]
    fn ln_probability_all_sums_sequences() {
        let hmm = coin_hmm();
        let a: Vec<ObservationInteger> = vec![ObservationInteger(0), ObservationInteger(1)];
        let b: Vec<ObservationInteger> = vec![ObservationInteger(1)];
        let total = hmm.ln_probability_all(&[a.clone(), b.clone()]).unwrap();
        let expected = hmm.ln_probability(&a).unwrap() + hmm.ln_probability(&b).unwrap();
        assert!((total - expected).abs() < 1e-12);
    }

    #[test]
    fn empty_sequences_are_rejected() {
        let hmm = coin_hmm();
        let empty: Vec<ObservationInteger> = vec![];
        assert!(hmm.probability(&empty).is_err());
        assert!(hmm.ln_probability(&empty).is_err());
        assert!(hmm.most_likely_state_sequence(&empty).is_err());
        assert!(validate_sequences::<ObservationInteger>(&[]).is_err());
        assert!(validate_sequences(&[vec![ObservationInteger(0)], vec![]]).is_err());
    }

    #[test]
    fn summary_mentions_states() {
        assert_eq!(coin_hmm().summary(), "HMM: 2 states, pi=[0.500, 0.500]");
    }
}
