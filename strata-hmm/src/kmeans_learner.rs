//! K-means model initialisation with Viterbi relabelling.
//!
//! Observations are first clustered into `nb_states` groups; each group
//! becomes a state. A model is estimated from the hard assignment, every
//! sequence is decoded with Viterbi, and observations whose decoded state
//! differs from their cluster are moved. This repeats until no observation
//! moves (a hard-assignment EM).

use strata_core::{Observation, Opdf, OpdfFactory, Result, StrataError, Summarizable};
use tracing::{debug, trace, warn};

use crate::cluster::{ClusterSet, ObsId};
use crate::model::{validate_sequences, Hmm};
use crate::viterbi::ViterbiCalculator;

/// Configuration for [`KMeansLearner`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct KMeansConfig {
    /// Upper bound on [`KMeansLearner::iterate`] calls made by
    /// [`KMeansLearner::learn`].
    pub max_iterations: usize,
}

impl Default for KMeansConfig {
    fn default() -> Self {
        Self {
            max_iterations: 1000,
        }
    }
}

/// Result of [`KMeansLearner::learn`].
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct KMeansFit<D> {
    /// Model estimated in the last iteration.
    pub hmm: Hmm<D>,
    /// Number of iterations run.
    pub iterations: usize,
    /// Whether the last iteration moved no observation. `false` means the
    /// iteration cap was hit first.
    pub converged: bool,
}

impl<D> Summarizable for KMeansFit<D> {
    fn summary(&self) -> String {
        format!(
            "KMeans HMM: {} states, iterations={}, converged={}",
            self.hmm.nb_states(),
            self.iterations,
            self.converged,
        )
    }
}

/// Builds an initial HMM from observation sequences by k-means clustering.
pub struct KMeansLearner<'a, O: Observation, F> {
    nb_states: usize,
    factory: F,
    sequences: &'a [Vec<O>],
    observations: Vec<&'a O>,
    clusters: ClusterSet<O::Centroid>,
    config: KMeansConfig,
    terminated: bool,
    iterations: usize,
}

impl<'a, O: Observation, F> KMeansLearner<'a, O, F> {
    /// Cluster the observations of `sequences` into `nb_states` groups.
    ///
    /// # Errors
    ///
    /// Returns an error if `nb_states` is zero, `sequences` is empty, or any
    /// sequence is empty.
    pub fn new(nb_states: usize, factory: F, sequences: &'a [Vec<O>]) -> Result<Self> {
        if nb_states == 0 {
            return Err(StrataError::InvalidInput("nb_states must be > 0".into()));
        }
        validate_sequences(sequences)?;

        let observations: Vec<&'a O> = sequences.iter().flatten().collect();
        let clusters = ClusterSet::new(nb_states, &observations)?;

        Ok(Self {
            nb_states,
            factory,
            sequences,
            observations,
            clusters,
            config: KMeansConfig::default(),
            terminated: false,
            iterations: 0,
        })
    }

    pub fn with_config(mut self, config: KMeansConfig) -> Self {
        self.config = config;
        self
    }

    pub fn nb_states(&self) -> usize {
        self.nb_states
    }

    /// Whether the last iteration moved no observation.
    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    /// Number of iterations run so far.
    pub fn iterations(&self) -> usize {
        self.iterations
    }

    /// Current clustering.
    pub fn clusters(&self) -> &ClusterSet<O::Centroid> {
        &self.clusters
    }

    /// Run a single k-means iteration and return the model it estimated.
    ///
    /// # Errors
    ///
    /// Propagates errors from fitting the output distributions.
    pub fn iterate<D>(&mut self) -> Result<Hmm<D>>
    where
        D: Opdf<O>,
        F: OpdfFactory<D>,
    {
        let mut hmm = Hmm::new(self.nb_states, &self.factory)?;
        self.learn_pi(&mut hmm);
        self.learn_aij(&mut hmm);
        self.learn_opdf(&mut hmm)?;

        let moved = self.optimize_cluster(&hmm)?;
        self.terminated = moved == 0;
        self.iterations += 1;
        debug!(iteration = self.iterations, moved, "k-means iteration");

        Ok(hmm)
    }

    /// Iterate until an iteration moves no observation or the iteration cap
    /// is reached.
    ///
    /// # Errors
    ///
    /// Returns an error if `max_iterations` is zero, and propagates errors
    /// from [`iterate`](Self::iterate).
    pub fn learn<D>(&mut self) -> Result<KMeansFit<D>>
    where
        D: Opdf<O>,
        F: OpdfFactory<D>,
    {
        if self.config.max_iterations == 0 {
            return Err(StrataError::InvalidInput(
                "max_iterations must be > 0".into(),
            ));
        }

        let start = self.iterations;
        loop {
            let hmm = self.iterate()?;
            let iterations = self.iterations - start;
            if self.terminated || iterations >= self.config.max_iterations {
                if !self.terminated {
                    warn!(
                        iterations,
                        "k-means learner stopped at the iteration cap without converging"
                    );
                }
                return Ok(KMeansFit {
                    hmm,
                    iterations,
                    converged: self.terminated,
                });
            }
        }
    }

    /// Initial probabilities: share of sequences starting in each cluster.
    fn learn_pi<D>(&self, hmm: &mut Hmm<D>) {
        let mut counts = vec![0.0; self.nb_states];
        let mut offset = 0;
        for seq in self.sequences {
            if let Some(c) = self.clusters.cluster_of(ObsId::new(offset)) {
                counts[c] += 1.0;
            }
            offset += seq.len();
        }
        let nb_sequences = self.sequences.len() as f64;
        for (i, count) in counts.into_iter().enumerate() {
            hmm.set_pi(i, count / nb_sequences);
        }
    }

    /// Transition probabilities: normalised counts of consecutive cluster
    /// pairs. States never left get a uniform row.
    fn learn_aij<D>(&self, hmm: &mut Hmm<D>) {
        let n = self.nb_states;
        let mut counts = vec![0.0; n * n];
        let mut offset = 0;
        for seq in self.sequences {
            for t in 1..seq.len() {
                let from = self.clusters.cluster_of(ObsId::new(offset + t - 1));
                let to = self.clusters.cluster_of(ObsId::new(offset + t));
                if let (Some(from), Some(to)) = (from, to) {
                    counts[from * n + to] += 1.0;
                }
            }
            offset += seq.len();
        }

        for i in 0..n {
            let row = &counts[i * n..(i + 1) * n];
            let sum: f64 = row.iter().sum();
            for j in 0..n {
                let p = if sum == 0.0 { 1.0 / n as f64 } else { row[j] / sum };
                hmm.set_aij(i, j, p);
            }
        }
    }

    /// Output distributions: fitted to each cluster; empty clusters get a
    /// fresh default distribution.
    fn learn_opdf<D>(&self, hmm: &mut Hmm<D>) -> Result<()>
    where
        D: Opdf<O>,
        F: OpdfFactory<D>,
    {
        for i in 0..self.nb_states {
            let members = self.clusters.observations(i, &self.observations);
            if members.is_empty() {
                hmm.set_opdf(i, self.factory.factor());
            } else {
                hmm.opdf_mut(i).fit(&members)?;
            }
        }
        Ok(())
    }

    /// Move every observation to the state Viterbi decodes it as. Returns the
    /// number of observations moved.
    fn optimize_cluster<D>(&mut self, hmm: &Hmm<D>) -> Result<usize>
    where
        D: Opdf<O>,
    {
        let mut moved = 0;
        let mut offset = 0;
        for seq in self.sequences {
            let viterbi = ViterbiCalculator::new(seq, hmm)?;
            for (t, &state) in viterbi.state_sequence().iter().enumerate() {
                let id = ObsId::new(offset + t);
                if !self.clusters.is_in_cluster(id, state) {
                    trace!(observation = id.index(), state, "moving observation");
                    self.clusters.move_to(id, state, &self.observations)?;
                    moved += 1;
                }
            }
            offset += seq.len();
        }
        Ok(moved)
    }
}
