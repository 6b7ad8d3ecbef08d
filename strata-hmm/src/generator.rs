//! Sampling state and observation sequences from a model.

use rand::Rng;
use strata_core::{Result, StrataError};
use strata_stats::generate::sample_discrete;
use strata_stats::GenerativeOpdf;

use crate::model::Hmm;

/// Draws sequences from a fixed HMM.
#[derive(Debug, Clone)]
pub struct MarkovGenerator<'a, D> {
    hmm: &'a Hmm<D>,
}

impl<'a, D> MarkovGenerator<'a, D> {
    pub fn new(hmm: &'a Hmm<D>) -> Self {
        Self { hmm }
    }

    /// A hidden-state path of length `len`: the first state from `pi`, each
    /// following one from the previous state's transition row.
    ///
    /// # Errors
    ///
    /// Returns an error if `len` is zero.
    pub fn state_sequence<R: Rng + ?Sized>(&self, len: usize, rng: &mut R) -> Result<Vec<usize>> {
        check_len(len)?;
        let mut states = Vec::with_capacity(len);
        let mut state = sample_discrete(self.hmm.initial(), rng);
        states.push(state);
        for _ in 1..len {
            state = sample_discrete(self.hmm.transition_row(state), rng);
            states.push(state);
        }
        Ok(states)
    }

    /// `len` observations, each drawn from the output distribution of a
    /// sampled hidden state.
    ///
    /// # Errors
    ///
    /// Returns an error if `len` is zero.
    pub fn observation_sequence<O, R>(&self, len: usize, rng: &mut R) -> Result<Vec<O>>
    where
        D: GenerativeOpdf<O>,
        R: Rng + ?Sized,
    {
        Ok(self.generate(len, rng)?.1)
    }

    /// A hidden-state path together with the observations it emitted.
    ///
    /// # Errors
    ///
    /// Returns an error if `len` is zero.
    pub fn generate<O, R>(&self, len: usize, rng: &mut R) -> Result<(Vec<usize>, Vec<O>)>
    where
        D: GenerativeOpdf<O>,
        R: Rng + ?Sized,
    {
        let states = self.state_sequence(len, rng)?;
        let observations = states
            .iter()
            .map(|&s| self.hmm.opdf(s).generate(rng))
            .collect();
        Ok((states, observations))
    }
}

fn check_len(len: usize) -> Result<()> {
    if len == 0 {
        return Err(StrataError::InvalidInput(
            "sequence length must be > 0".into(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use strata_stats::{ObservationInteger, ObservationReal, OpdfGaussian, OpdfInteger};

    fn alternating_hmm() -> Hmm<OpdfInteger> {
        Hmm::from_parts(
            vec![1.0, 0.0],
            vec![0.0, 1.0, 1.0, 0.0],
            vec![
                OpdfInteger::from_probabilities(vec![1.0, 0.0]).unwrap(),
                OpdfInteger::from_probabilities(vec![0.0, 1.0]).unwrap(),
            ],
        )
        .unwrap()
    }

    #[test]
    fn deterministic_model_is_reproduced() {
        let hmm = alternating_hmm();
        let mut rng = StdRng::seed_from_u64(1);
        let (states, obs): (Vec<usize>, Vec<ObservationInteger>) =
            MarkovGenerator::new(&hmm).generate(5, &mut rng).unwrap();
        assert_eq!(states, vec![0, 1, 0, 1, 0]);
        let symbols: Vec<usize> = obs.iter().map(|o| o.0).collect();
        assert_eq!(symbols, states);
    }

    #[test]
    fn requested_length_is_honoured() {
        let hmm = Hmm::from_parts(
            vec![0.3, 0.7],
            vec![0.6, 0.4, 0.2, 0.8],
            vec![OpdfGaussian::default(), OpdfGaussian::new(5.0, 2.0).unwrap()],
        )
        .unwrap();
        let generator = MarkovGenerator::new(&hmm);
        let mut rng = StdRng::seed_from_u64(3);
        let obs: Vec<ObservationReal> = generator.observation_sequence(17, &mut rng).unwrap();
        assert_eq!(obs.len(), 17);
        assert_eq!(generator.state_sequence(1, &mut rng).unwrap().len(), 1);
    }

    #[test]
    fn same_seed_same_sequence() {
        let hmm = Hmm::from_parts(
            vec![0.5, 0.5],
            vec![0.5; 4],
            vec![
                OpdfInteger::from_probabilities(vec![0.2, 0.8]).unwrap(),
                OpdfInteger::from_probabilities(vec![0.7, 0.3]).unwrap(),
            ],
        )
        .unwrap();
        let generator = MarkovGenerator::new(&hmm);
        let a: Vec<ObservationInteger> = generator
            .observation_sequence(30, &mut StdRng::seed_from_u64(9))
            .unwrap();
        let b: Vec<ObservationInteger> = generator
            .observation_sequence(30, &mut StdRng::seed_from_u64(9))
            .unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn transition_frequencies_follow_the_model() {
        let hmm = Hmm::from_parts(
            vec![1.0, 0.0],
            vec![0.8, 0.2, 0.4, 0.6],
            vec![OpdfGaussian::default(), OpdfGaussian::default()],
        )
        .unwrap();
        let mut rng = StdRng::seed_from_u64(11);
        let states = MarkovGenerator::new(&hmm)
            .state_sequence(20_000, &mut rng)
            .unwrap();
        let from_zero: Vec<&[usize]> = states.windows(2).filter(|w| w[0] == 0).collect();
        let stay = from_zero.iter().filter(|w| w[1] == 0).count() as f64;
        let freq = stay / from_zero.len() as f64;
        assert!((freq - 0.8).abs() < 0.03, "stay frequency {freq}");
    }

    #[test]
    fn zero_length_is_rejected() {
        let hmm = alternating_hmm();
        let generator = MarkovGenerator::new(&hmm);
        let mut rng = StdRng::seed_from_u64(0);
        assert!(generator.state_sequence(0, &mut rng).is_err());
        assert!(generator
            .observation_sequence::<ObservationInteger, _>(0, &mut rng)
            .is_err());
    }
}
