//! Observation types and their cluster centroids.
//!
//! Each observation type pairs with a centroid that keeps a running mean of
//! its cluster. Re-evaluation only needs the old mean and the old member
//! count, so adding or removing an element is O(dimension).

use strata_core::{Centroid, Observation};

// ---------------------------------------------------------------------------
// Integer symbols
// ---------------------------------------------------------------------------

/// A discrete symbol in `0..n`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ObservationInteger(pub usize);

/// Mean of a cluster of integer symbols.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CentroidInteger {
    pub value: f64,
}

impl Observation for ObservationInteger {
    type Centroid = CentroidInteger;

    fn factor(&self) -> CentroidInteger {
        CentroidInteger {
            value: self.0 as f64,
        }
    }
}

impl Centroid<ObservationInteger> for CentroidInteger {
    fn distance(&self, observation: &ObservationInteger) -> f64 {
        (self.value - observation.0 as f64).abs()
    }

    fn reeval_add(&self, added: &ObservationInteger, nb_members: usize) -> Self {
        Self {
            value: mean_after_add(self.value, nb_members, added.0 as f64),
        }
    }

    fn reeval_remove(&self, removed: &ObservationInteger, nb_members: usize) -> Self {
        Self {
            value: mean_after_remove(self.value, nb_members, removed.0 as f64),
        }
    }
}

// ---------------------------------------------------------------------------
// Real values
// ---------------------------------------------------------------------------

/// A scalar real-valued observation.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ObservationReal(pub f64);

/// Mean of a cluster of real values.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CentroidReal {
    pub value: f64,
}

impl Observation for ObservationReal {
    type Centroid = CentroidReal;

    fn factor(&self) -> CentroidReal {
        CentroidReal { value: self.0 }
    }
}

impl Centroid<ObservationReal> for CentroidReal {
    fn distance(&self, observation: &ObservationReal) -> f64 {
        (self.value - observation.0).abs()
    }

    fn reeval_add(&self, added: &ObservationReal, nb_members: usize) -> Self {
        Self {
            value: mean_after_add(self.value, nb_members, added.0),
        }
    }

    fn reeval_remove(&self, removed: &ObservationReal, nb_members: usize) -> Self {
        Self {
            value: mean_after_remove(self.value, nb_members, removed.0),
        }
    }
}

// ---------------------------------------------------------------------------
// Real vectors
// ---------------------------------------------------------------------------

/// A fixed-dimension real vector observation.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ObservationVector(pub Vec<f64>);

impl ObservationVector {
    /// Number of components.
    pub fn dimension(&self) -> usize {
        self.0.len()
    }
}

/// Component-wise mean of a cluster of vectors.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CentroidVector {
    pub values: Vec<f64>,
}

impl Observation for ObservationVector {
    type Centroid = CentroidVector;

    fn factor(&self) -> CentroidVector {
        CentroidVector {
            values: self.0.clone(),
        }
    }
}

impl Centroid<ObservationVector> for CentroidVector {
    /// Euclidean distance. Vectors of a different dimension are infinitely
    /// far away, so they are never chosen as nearest.
    fn distance(&self, observation: &ObservationVector) -> f64 {
        if self.values.len() != observation.0.len() {
            return f64::INFINITY;
        }
        self.values
            .iter()
            .zip(&observation.0)
            .map(|(c, x)| (c - x).powi(2))
            .sum::<f64>()
            .sqrt()
    }

    fn reeval_add(&self, added: &ObservationVector, nb_members: usize) -> Self {
        Self {
            values: self
                .values
                .iter()
                .zip(&added.0)
                .map(|(&m, &x)| mean_after_add(m, nb_members, x))
                .collect(),
        }
    }

    fn reeval_remove(&self, removed: &ObservationVector, nb_members: usize) -> Self {
        Self {
            values: self
                .values
                .iter()
                .zip(&removed.0)
                .map(|(&m, &x)| mean_after_remove(m, nb_members, x))
                .collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// Running mean helpers
// ---------------------------------------------------------------------------

/// Mean of `n + 1` values given the mean of the first `n` and the new one.
fn mean_after_add(mean: f64, n: usize, added: f64) -> f64 {
    let n = n as f64;
    (mean * n + added) / (n + 1.0)
}

/// Mean of `n - 1` values given the mean of `n` and the one leaving.
fn mean_after_remove(mean: f64, n: usize, removed: f64) -> f64 {
    if n <= 1 {
        return mean;
    }
    let n = n as f64;
    (mean * n - removed) / (n - 1.0)
}
