//! Centroid clustering of observations for k-means model initialisation.
//!
//! Observations are referred to by [`ObsId`] handles (their position in the
//! flattened list the caller supplies), so equal-valued observations stay
//! distinct. Every operation takes that list as `&[&O]`.

use strata_core::{Centroid, Observation, Result, StrataError};
use tracing::warn;

/// Upper bound on full relaxation scans in [`KMeansCalculator`].
pub const MAX_RELAXATION_SCANS: usize = 1000;

/// Handle of an observation inside the flattened observation list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObsId(usize);

impl ObsId {
    pub fn new(index: usize) -> Self {
        Self(index)
    }

    pub fn index(self) -> usize {
        self.0
    }
}

// ---------------------------------------------------------------------------
// Cluster
// ---------------------------------------------------------------------------

/// An ordered group of observations and their centroid.
///
/// The centroid is `None` exactly when the cluster is empty.
#[derive(Debug, Clone)]
pub struct Cluster<C> {
    elements: Vec<ObsId>,
    centroid: Option<C>,
}

impl<C> Default for Cluster<C> {
    fn default() -> Self {
        Self {
            elements: Vec::new(),
            centroid: None,
        }
    }
}

impl<C> Cluster<C> {
    /// An empty cluster with no centroid.
    pub fn new() -> Self {
        Self::default()
    }

    /// A cluster holding `id` alone.
    pub fn seeded<O>(id: ObsId, observations: &[&O]) -> Self
    where
        O: Observation<Centroid = C>,
        C: Centroid<O>,
    {
        Self {
            elements: vec![id],
            centroid: Some(observations[id.0].factor()),
        }
    }

    pub fn elements(&self) -> &[ObsId] {
        &self.elements
    }

    pub fn centroid(&self) -> Option<&C> {
        self.centroid.as_ref()
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Resolve the member handles against `observations`.
    pub fn members<'o, O>(&self, observations: &[&'o O]) -> Vec<&'o O> {
        self.elements.iter().map(|id| observations[id.0]).collect()
    }

    /// Append `id`, re-evaluating the centroid against the current member
    /// count first.
    pub fn add<O>(&mut self, id: ObsId, observations: &[&O])
    where
        O: Observation<Centroid = C>,
        C: Centroid<O>,
    {
        let o = observations[id.0];
        self.centroid = Some(match &self.centroid {
            None => o.factor(),
            Some(c) => c.reeval_add(o, self.elements.len()),
        });
        self.elements.push(id);
    }

    /// Remove the element at `position`, re-evaluating the centroid against
    /// the member count before removal. Removing the last element clears the
    /// centroid.
    ///
    /// # Panics
    ///
    /// Panics if `position` is out of bounds.
    pub fn remove_at<O>(&mut self, position: usize, observations: &[&O]) -> ObsId
    where
        O: Observation<Centroid = C>,
        C: Centroid<O>,
    {
        let id = self.elements[position];
        if self.elements.len() == 1 {
            self.centroid = None;
        } else if let Some(c) = &self.centroid {
            self.centroid = Some(c.reeval_remove(observations[id.0], self.elements.len()));
        }
        self.elements.remove(position)
    }

    /// Remove `id` if it is a member. Returns whether it was.
    pub fn remove<O>(&mut self, id: ObsId, observations: &[&O]) -> bool
    where
        O: Observation<Centroid = C>,
        C: Centroid<O>,
    {
        match self.elements.iter().position(|&e| e == id) {
            Some(position) => {
                self.remove_at(position, observations);
                true
            }
            None => false,
        }
    }
}

/// Index of the cluster whose centroid is nearest to `o`.
///
/// Linear scan with strict `<`, so the lowest index wins ties. Empty
/// clusters are skipped; `None` only when every cluster is empty.
fn nearest_cluster<O, C>(clusters: &[Cluster<C>], o: &O) -> Option<usize>
where
    C: Centroid<O>,
{
    let mut best: Option<(usize, f64)> = None;
    for (i, cluster) in clusters.iter().enumerate() {
        let Some(centroid) = cluster.centroid() else {
            continue;
        };
        let d = centroid.distance(o);
        match best {
            Some((_, best_d)) if !(d < best_d) => {}
            _ => best = Some((i, d)),
        }
    }
    best.map(|(i, _)| i)
}

// ---------------------------------------------------------------------------
// K-means
// ---------------------------------------------------------------------------

/// Greedy-then-relocate k-means partition of a flat observation list.
///
/// 1. **Seed**: scan in order; an observation at distance exactly zero from
///    an existing centroid joins that cluster, any other seeds a new one,
///    while more observations remain than clusters still to seed.
/// 2. **Fill**: remaining clusters get one observation each, then are
///    created empty once observations run out.
/// 3. **Assign**: every remaining observation joins its nearest cluster.
/// 4. **Relax**: elements not sitting exactly on their centroid move to
///    their nearest cluster, until a full scan moves nothing.
#[derive(Debug, Clone)]
pub struct KMeansCalculator<C> {
    clusters: Vec<Cluster<C>>,
}

impl<C> KMeansCalculator<C> {
    /// Partition `observations` into `k` clusters.
    ///
    /// # Errors
    ///
    /// Returns an error if `k` is zero.
    pub fn new<O>(k: usize, observations: &[&O]) -> Result<Self>
    where
        O: Observation<Centroid = C>,
        C: Centroid<O>,
    {
        if k == 0 {
            return Err(StrataError::InvalidInput("k must be > 0".into()));
        }
        let n = observations.len();
        let mut clusters: Vec<Cluster<C>> = Vec::with_capacity(k);
        let mut next = 0;

        // Seed
        while next < n && clusters.len() < k && n - next > k - clusters.len() {
            let id = ObsId(next);
            let o = observations[next];
            next += 1;

            let duplicate = clusters
                .iter()
                .position(|c| c.centroid().is_some_and(|centroid| centroid.distance(o) == 0.0));
            match duplicate {
                Some(i) => clusters[i].add(id, observations),
                None => clusters.push(Cluster::seeded(id, observations)),
            }
        }

        // Fill
        while clusters.len() < k && next < n {
            clusters.push(Cluster::seeded(ObsId(next), observations));
            next += 1;
        }
        while clusters.len() < k {
            clusters.push(Cluster::new());
        }

        // Assign
        for index in next..n {
            let target = nearest_cluster(&clusters, observations[index]).unwrap_or(0);
            clusters[target].add(ObsId(index), observations);
        }

        let mut calculator = Self { clusters };
        calculator.relax(observations);
        Ok(calculator)
    }

    /// Run relaxation scans until one moves nothing, or
    /// [`MAX_RELAXATION_SCANS`] is reached. Returns the number of elements
    /// moved; zero for a partition that was already stable.
    pub fn relax<O>(&mut self, observations: &[&O]) -> usize
    where
        O: Observation<Centroid = C>,
        C: Centroid<O>,
    {
        let mut total_moves = 0;
        for _ in 0..MAX_RELAXATION_SCANS {
            let moves = self.relax_scan(observations);
            total_moves += moves;
            if moves == 0 {
                return total_moves;
            }
        }
        warn!(
            scans = MAX_RELAXATION_SCANS,
            "k-means relaxation did not reach a fixed point, keeping current partition"
        );
        total_moves
    }

    fn relax_scan<O>(&mut self, observations: &[&O]) -> usize
    where
        O: Observation<Centroid = C>,
        C: Centroid<O>,
    {
        let mut moves = 0;
        for ci in 0..self.clusters.len() {
            let mut j = 0;
            while j < self.clusters[ci].len() {
                let id = self.clusters[ci].elements[j];
                let o = observations[id.0];
                let off_centre = self.clusters[ci]
                    .centroid()
                    .is_some_and(|c| c.distance(o) > 0.0);
                if off_centre {
                    if let Some(target) = nearest_cluster(&self.clusters, o) {
                        if target != ci {
                            self.clusters[target].add(id, observations);
                            self.clusters[ci].remove_at(j, observations);
                            moves += 1;
                            // the next element has shifted into position j
                            continue;
                        }
                    }
                }
                j += 1;
            }
        }
        moves
    }

    pub fn nb_clusters(&self) -> usize {
        self.clusters.len()
    }

    /// Member handles of cluster `index`.
    pub fn cluster(&self, index: usize) -> &[ObsId] {
        self.clusters[index].elements()
    }

    pub fn clusters(&self) -> &[Cluster<C>] {
        &self.clusters
    }

    pub fn into_clusters(self) -> Vec<Cluster<C>> {
        self.clusters
    }
}

// ---------------------------------------------------------------------------
// ClusterSet
// ---------------------------------------------------------------------------

/// A k-means partition plus the observation → cluster mapping, supporting
/// reassignment.
#[derive(Debug, Clone)]
pub struct ClusterSet<C> {
    clusters: Vec<Cluster<C>>,
    assignment: Vec<Option<usize>>,
}

impl<C> ClusterSet<C> {
    /// Partition `observations` into `k` clusters with [`KMeansCalculator`].
    ///
    /// # Errors
    ///
    /// Returns an error if `k` is zero.
    pub fn new<O>(k: usize, observations: &[&O]) -> Result<Self>
    where
        O: Observation<Centroid = C>,
        C: Centroid<O>,
    {
        let clusters = KMeansCalculator::new(k, observations)?.into_clusters();
        let mut assignment = vec![None; observations.len()];
        for (i, cluster) in clusters.iter().enumerate() {
            for id in cluster.elements() {
                assignment[id.0] = Some(i);
            }
        }
        Ok(Self {
            clusters,
            assignment,
        })
    }

    pub fn nb_clusters(&self) -> usize {
        self.clusters.len()
    }

    /// Member handles of cluster `index`.
    pub fn cluster(&self, index: usize) -> &[ObsId] {
        self.clusters[index].elements()
    }

    pub fn clusters(&self) -> &[Cluster<C>] {
        &self.clusters
    }

    /// Centroid of cluster `index`, `None` while it is empty.
    pub fn centroid(&self, index: usize) -> Option<&C> {
        self.clusters[index].centroid()
    }

    /// Observations currently in cluster `index`.
    pub fn observations<'o, O>(&self, index: usize, observations: &[&'o O]) -> Vec<&'o O> {
        self.clusters[index].members(observations)
    }

    /// Current cluster of `id`; `None` only between a `remove` and the
    /// matching `put`.
    pub fn cluster_of(&self, id: ObsId) -> Option<usize> {
        self.assignment[id.0]
    }

    pub fn is_in_cluster(&self, id: ObsId, cluster: usize) -> bool {
        self.cluster_of(id) == Some(cluster)
    }

    /// Record `id` as belonging to `cluster` and append it there.
    pub fn put<O>(&mut self, id: ObsId, cluster: usize, observations: &[&O])
    where
        O: Observation<Centroid = C>,
        C: Centroid<O>,
    {
        self.assignment[id.0] = Some(cluster);
        self.clusters[cluster].add(id, observations);
    }

    /// Drop `id` from `cluster`, updating that cluster's centroid.
    ///
    /// # Errors
    ///
    /// Returns an error if `id` is not a member of `cluster`.
    pub fn remove<O>(&mut self, id: ObsId, cluster: usize, observations: &[&O]) -> Result<()>
    where
        O: Observation<Centroid = C>,
        C: Centroid<O>,
    {
        if !self.clusters[cluster].remove(id, observations) {
            return Err(StrataError::InvalidInput(format!(
                "observation {} is not in cluster {cluster}",
                id.0
            )));
        }
        self.assignment[id.0] = None;
        Ok(())
    }

    /// Move `id` from its current cluster to `cluster` (remove, then put).
    ///
    /// # Errors
    ///
    /// Returns an error if the mapping and the cluster contents disagree.
    pub fn move_to<O>(&mut self, id: ObsId, cluster: usize, observations: &[&O]) -> Result<()>
    where
        O: Observation<Centroid = C>,
        C: Centroid<O>,
    {
        if let Some(current) = self.cluster_of(id) {
            if current == cluster {
                return Ok(());
            }
            self.remove(id, current, observations)?;
        }
        self.put(id, cluster, observations);
        Ok(())
    }
}
