//! Core trait definitions for the Strata crates.
//!
//! These traits are the capability sets the estimation engine in
//! `strata-hmm` is written against. Observation types, their centroids and
//! output probability distributions (opdfs) live in `strata-stats`, but any
//! caller type implementing these traits can be clustered and learned.

/// A value that can be clustered and scored by an output distribution.
pub trait Observation: Clone {
    /// The running summary a cluster keeps for observations of this type.
    type Centroid: Centroid<Self>;

    /// A centroid representing this observation alone.
    fn factor(&self) -> Self::Centroid;
}

/// The representative point of a cluster of observations.
///
/// Re-evaluation is pure: the new centroid is computed from the current
/// one, the number of members *before* the change, and the element being
/// added or removed.
pub trait Centroid<O>: Clone {
    /// Distance between this centroid and `observation` (non-negative).
    fn distance(&self, observation: &O) -> f64;

    /// Centroid after appending `added` to a cluster of `nb_members`.
    fn reeval_add(&self, added: &O, nb_members: usize) -> Self;

    /// Centroid after dropping `removed` from a cluster of `nb_members`.
    ///
    /// `nb_members` still counts `removed` and is at least two.
    fn reeval_remove(&self, removed: &O, nb_members: usize) -> Self;
}

/// An output probability distribution attached to a hidden state.
pub trait Opdf<O>: Clone {
    /// Probability (or density) of `observation` under this distribution.
    fn probability(&self, observation: &O) -> f64;

    /// Re-estimate the parameters from `observations`, all weighted equally.
    fn fit(&mut self, observations: &[&O]) -> crate::Result<()>;

    /// Re-estimate the parameters from weighted `observations`.
    ///
    /// `weights` has one non-negative entry per observation and need not sum
    /// to one.
    fn fit_weighted(&mut self, observations: &[&O], weights: &[f64]) -> crate::Result<()>;
}

/// Builds default-initialised output distributions.
pub trait OpdfFactory<D> {
    /// A fresh distribution.
    fn factor(&self) -> D;
}

impl<D, F: OpdfFactory<D> + ?Sized> OpdfFactory<D> for &F {
    fn factor(&self) -> D {
        (**self).factor()
    }
}

/// A type that can produce a summary of its contents.
pub trait Summarizable {
    /// A one-line summary suitable for display.
    fn summary(&self) -> String;
}
