//! Hidden Markov Model estimation for the Strata crates.
//!
//! - **Model** — [`Hmm`], generic over its output distribution family
//! - **Clustering** — [`KMeansCalculator`] and [`ClusterSet`] over observation handles
//! - **Inference** — [`ForwardBackwardCalculator`], [`ScaledForwardBackwardCalculator`]
//!   and [`ViterbiCalculator`]
//! - **Learning** — [`KMeansLearner`] for an initial model, [`BaumWelchLearner`]
//!   to refine it
//! - **Simulation** — [`MarkovGenerator`]
//!
//! # Example
//!
//! ```
//! use strata_hmm::{BaumWelchLearner, KMeansLearner};
//! use strata_stats::{ObservationInteger, OpdfInteger, OpdfIntegerFactory};
//!
//! let sequences: Vec<Vec<ObservationInteger>> = vec![
//!     [0, 0, 1, 0, 1, 1, 1, 0].iter().map(|&s| ObservationInteger(s)).collect(),
//!     [1, 1, 1, 0, 0, 0, 1].iter().map(|&s| ObservationInteger(s)).collect(),
//! ];
//!
//! let factory = OpdfIntegerFactory::new(2)?;
//! let initial = KMeansLearner::new(2, factory, &sequences)?
//!     .learn::<OpdfInteger>()?
//!     .hmm;
//! let hmm = BaumWelchLearner::new().learn(&initial, &sequences)?;
//!
//! assert!(hmm.ln_probability_all(&sequences)? >= initial.ln_probability_all(&sequences)? - 1e-9);
//! let path = hmm.most_likely_state_sequence(&sequences[0])?;
//! assert_eq!(path.len(), sequences[0].len());
//! # Ok::<(), strata_core::StrataError>(())
//! ```
//!
//! # Features
//!
//! - `serde` — `Serialize`/`Deserialize` on the model, configs and distributions
//! - `parallel` — per-sequence Baum-Welch statistics computed with rayon

pub mod baum_welch;
pub mod cluster;
pub mod forward_backward;
pub mod generator;
pub mod kmeans_learner;
pub mod model;
pub mod viterbi;

pub use baum_welch::{BaumWelchConfig, BaumWelchLearner};
pub use cluster::{Cluster, ClusterSet, KMeansCalculator, ObsId, MAX_RELAXATION_SCANS};
pub use forward_backward::{Computation, ForwardBackwardCalculator, ScaledForwardBackwardCalculator};
pub use generator::MarkovGenerator;
pub use kmeans_learner::{KMeansConfig, KMeansFit, KMeansLearner};
pub use model::Hmm;
pub use viterbi::ViterbiCalculator;

/// `Sync` when the `parallel` feature is enabled, no bound otherwise.
#[cfg(feature = "parallel")]
pub trait MaybeSync: Sync {}
#[cfg(feature = "parallel")]
impl<T: Sync + ?Sized> MaybeSync for T {}

/// `Sync` when the `parallel` feature is enabled, no bound otherwise.
#[cfg(not(feature = "parallel"))]
pub trait MaybeSync {}
#[cfg(not(feature = "parallel"))]
impl<T: ?Sized> MaybeSync for T {}
