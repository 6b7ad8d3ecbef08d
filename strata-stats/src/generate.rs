//! Sampling from output distributions.

use rand::Rng;

/// An output distribution that can draw observations.
pub trait GenerativeOpdf<O> {
    /// Draw one observation.
    fn generate<R: Rng + ?Sized>(&self, rng: &mut R) -> O;
}

/// Draw an index from a discrete distribution by inverse CDF.
///
/// Falls back to the last index when rounding leaves the cumulative sum
/// just below one.
pub fn sample_discrete<R: Rng + ?Sized>(probabilities: &[f64], rng: &mut R) -> usize {
    let u: f64 = rng.gen();
    let mut cumsum = 0.0;
    for (i, &p) in probabilities.iter().enumerate() {
        cumsum += p;
        if u < cumsum {
            return i;
        }
    }
    probabilities.len().saturating_sub(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn sample_discrete_respects_point_mass() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..100 {
            assert_eq!(sample_discrete(&[0.0, 1.0, 0.0], &mut rng), 1);
        }
    }

    #[test]
    fn sample_discrete_frequencies() {
        let mut rng = StdRng::seed_from_u64(42);
        let mut counts = [0usize; 2];
        for _ in 0..10_000 {
            counts[sample_discrete(&[0.25, 0.75], &mut rng)] += 1;
        }
        let frac = counts[1] as f64 / 10_000.0;
        assert!((frac - 0.75).abs() < 0.03, "got {frac}");
    }
}
