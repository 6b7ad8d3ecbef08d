//! Gaussian output distributions for real-valued observations.

use core::f64::consts::PI;

use rand::Rng;
use rand_distr::StandardNormal;
use strata_core::{Opdf, OpdfFactory, Result, StrataError};

use crate::generate::GenerativeOpdf;
use crate::observation::{ObservationReal, ObservationVector};

/// Lower bound applied to every fitted variance so a cluster of identical
/// values still yields a proper density.
pub const MIN_VARIANCE: f64 = 1e-6;

fn normal_pdf(x: f64, mean: f64, variance: f64) -> f64 {
    let diff = x - mean;
    (-diff * diff / (2.0 * variance)).exp() / (2.0 * PI * variance).sqrt()
}

// ---------------------------------------------------------------------------
// Univariate
// ---------------------------------------------------------------------------

/// Univariate normal distribution `N(mean, variance)`.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct OpdfGaussian {
    mean: f64,
    variance: f64,
}

impl OpdfGaussian {
    /// # Errors
    ///
    /// Returns an error if `mean` is not finite or `variance` is not a
    /// positive finite number.
    pub fn new(mean: f64, variance: f64) -> Result<Self> {
        if !mean.is_finite() {
            return Err(StrataError::InvalidInput(format!(
                "mean must be finite, got {mean}"
            )));
        }
        if !(variance.is_finite() && variance > 0.0) {
            return Err(StrataError::InvalidInput(format!(
                "variance must be > 0, got {variance}"
            )));
        }
        Ok(Self { mean, variance })
    }

    pub fn mean(&self) -> f64 {
        self.mean
    }

    pub fn variance(&self) -> f64 {
        self.variance
    }
}

impl Default for OpdfGaussian {
    fn default() -> Self {
        Self {
            mean: 0.0,
            variance: 1.0,
        }
    }
}

impl Opdf<ObservationReal> for OpdfGaussian {
    fn probability(&self, observation: &ObservationReal) -> f64 {
        normal_pdf(observation.0, self.mean, self.variance)
    }

    fn fit(&mut self, observations: &[&ObservationReal]) -> Result<()> {
        let weights = vec![1.0; observations.len()];
        self.fit_weighted(observations, &weights)
    }

    fn fit_weighted(&mut self, observations: &[&ObservationReal], weights: &[f64]) -> Result<()> {
        let total = crate::total_weight(observations.len(), weights)?;

        let mean = observations
            .iter()
            .zip(weights)
            .map(|(o, w)| w * o.0)
            .sum::<f64>()
            / total;
        let variance = observations
            .iter()
            .zip(weights)
            .map(|(o, w)| w * (o.0 - mean).powi(2))
            .sum::<f64>()
            / total;

        self.mean = mean;
        self.variance = variance.max(MIN_VARIANCE);
        Ok(())
    }
}

impl GenerativeOpdf<ObservationReal> for OpdfGaussian {
    fn generate<R: Rng + ?Sized>(&self, rng: &mut R) -> ObservationReal {
        ObservationReal(self.mean + self.variance.sqrt() * rng.sample::<f64, _>(StandardNormal))
    }
}

/// Factory for standard normal [`OpdfGaussian`] distributions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct OpdfGaussianFactory;

impl OpdfFactory<OpdfGaussian> for OpdfGaussianFactory {
    fn factor(&self) -> OpdfGaussian {
        OpdfGaussian::default()
    }
}

// ---------------------------------------------------------------------------
// Multivariate, diagonal covariance
// ---------------------------------------------------------------------------

/// Multivariate normal distribution with a diagonal covariance matrix.
///
/// The density factorises over components, so each dimension is fitted
/// independently.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct OpdfDiagGaussian {
    means: Vec<f64>,
    variances: Vec<f64>,
}

impl OpdfDiagGaussian {
    /// # Errors
    ///
    /// Returns an error if the vectors are empty, differ in length, or a
    /// variance is not positive.
    pub fn new(means: Vec<f64>, variances: Vec<f64>) -> Result<Self> {
        if means.is_empty() {
            return Err(StrataError::InvalidInput("dimension must be > 0".into()));
        }
        if means.len() != variances.len() {
            return Err(StrataError::DimensionMismatch {
                expected: means.len(),
                found: variances.len(),
            });
        }
        if let Some(v) = variances.iter().find(|v| !(v.is_finite() && **v > 0.0)) {
            return Err(StrataError::InvalidInput(format!(
                "variance must be > 0, got {v}"
            )));
        }
        Ok(Self { means, variances })
    }

    /// Standard normal in `dimension` components.
    ///
    /// # Errors
    ///
    /// Returns an error if `dimension` is zero.
    pub fn standard(dimension: usize) -> Result<Self> {
        Self::new(vec![0.0; dimension], vec![1.0; dimension])
    }

    pub fn dimension(&self) -> usize {
        self.means.len()
    }

    pub fn means(&self) -> &[f64] {
        &self.means
    }

    pub fn variances(&self) -> &[f64] {
        &self.variances
    }
}

impl Opdf<ObservationVector> for OpdfDiagGaussian {
    /// Vectors of the wrong dimension have density 0.
    fn probability(&self, observation: &ObservationVector) -> f64 {
        if observation.dimension() != self.dimension() {
            return 0.0;
        }
        observation
            .0
            .iter()
            .zip(self.means.iter().zip(&self.variances))
            .map(|(&x, (&m, &v))| normal_pdf(x, m, v))
            .product()
    }

    fn fit(&mut self, observations: &[&ObservationVector]) -> Result<()> {
        let weights = vec![1.0; observations.len()];
        self.fit_weighted(observations, &weights)
    }

    fn fit_weighted(&mut self, observations: &[&ObservationVector], weights: &[f64]) -> Result<()> {
        let total = crate::total_weight(observations.len(), weights)?;
        let d = self.dimension();
        if let Some(o) = observations.iter().find(|o| o.dimension() != d) {
            return Err(StrataError::DimensionMismatch {
                expected: d,
                found: o.dimension(),
            });
        }

        let mut means = vec![0.0; d];
        for (o, &w) in observations.iter().zip(weights) {
            for (m, x) in means.iter_mut().zip(&o.0) {
                *m += w * x;
            }
        }
        for m in &mut means {
            *m /= total;
        }

        let mut variances = vec![0.0; d];
        for (o, &w) in observations.iter().zip(weights) {
            for ((v, x), m) in variances.iter_mut().zip(&o.0).zip(&means) {
                *v += w * (x - m).powi(2);
            }
        }
        for v in &mut variances {
            *v = (*v / total).max(MIN_VARIANCE);
        }

        self.means = means;
        self.variances = variances;
        Ok(())
    }
}

impl GenerativeOpdf<ObservationVector> for OpdfDiagGaussian {
    fn generate<R: Rng + ?Sized>(&self, rng: &mut R) -> ObservationVector {
        ObservationVector(
            self.means
                .iter()
                .zip(&self.variances)
                .map(|(m, v)| m + v.sqrt() * rng.sample::<f64, _>(StandardNormal))
                .collect(),
        )
    }
}

/// Factory for standard normal [`OpdfDiagGaussian`] distributions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct OpdfDiagGaussianFactory {
    dimension: usize,
}

impl OpdfDiagGaussianFactory {
    /// # Errors
    ///
    /// Returns an error if `dimension` is zero.
    pub fn new(dimension: usize) -> Result<Self> {
        if dimension == 0 {
            return Err(StrataError::InvalidInput("dimension must be > 0".into()));
        }
        Ok(Self { dimension })
    }
}

impl OpdfFactory<OpdfDiagGaussian> for OpdfDiagGaussianFactory {
    fn factor(&self) -> OpdfDiagGaussian {
        OpdfDiagGaussian {
            means: vec![0.0; self.dimension],
            variances: vec![1.0; self.dimension],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn density_peaks_at_mean() {
        let g = OpdfGaussian::default();
        let at_mean = g.probability(&ObservationReal(0.0));
        assert!((at_mean - 1.0 / (2.0 * PI).sqrt()).abs() < 1e-12);
        assert!(at_mean > g.probability(&ObservationReal(1.0)));
    }

    #[test]
    fn fit_recovers_mean_and_variance() {
        let obs: Vec<ObservationReal> = [1.0, 2.0, 3.0, 4.0].iter().map(|&x| ObservationReal(x)).collect();
        let refs: Vec<&ObservationReal> = obs.iter().collect();
        let mut g = OpdfGaussianFactory.factor();
        g.fit(&refs).unwrap();
        assert!((g.mean() - 2.5).abs() < 1e-12);
        assert!((g.variance() - 1.25).abs() < 1e-12);
    }

    #[test]
    fn weighted_fit_ignores_zero_weight() {
        let obs = [ObservationReal(1.0), ObservationReal(100.0)];
        let refs: Vec<&ObservationReal> = obs.iter().collect();
        let mut g = OpdfGaussian::default();
        g.fit_weighted(&refs, &[1.0, 0.0]).unwrap();
        assert!((g.mean() - 1.0).abs() < 1e-12);
        assert_eq!(g.variance(), MIN_VARIANCE);
    }

    #[test]
    fn identical_values_get_variance_floor() {
        let obs = [ObservationReal(3.0); 3];
        let refs: Vec<&ObservationReal> = obs.iter().collect();
        let mut g = OpdfGaussian::default();
        g.fit(&refs).unwrap();
        assert_eq!(g.variance(), MIN_VARIANCE);
        assert!(g.probability(&ObservationReal(3.0)).is_finite());
    }

    #[test]
    fn constructor_validates() {
        assert!(OpdfGaussian::new(0.0, 0.0).is_err());
        assert!(OpdfGaussian::new(f64::NAN, 1.0).is_err());
        assert!(OpdfDiagGaussian::new(vec![], vec![]).is_err());
        assert!(OpdfDiagGaussian::new(vec![0.0], vec![1.0, 1.0]).is_err());
        assert!(OpdfDiagGaussianFactory::new(0).is_err());
    }

    #[test]
    fn diag_density_factorises() {
        let g = OpdfDiagGaussian::standard(2).unwrap();
        let p = g.probability(&ObservationVector(vec![0.0, 1.0]));
        let expected = normal_pdf(0.0, 0.0, 1.0) * normal_pdf(1.0, 0.0, 1.0);
        assert!((p - expected).abs() < 1e-12);
        assert_eq!(g.probability(&ObservationVector(vec![0.0])), 0.0);
    }

    #[test]
    fn diag_fit_per_component() {
        let obs = vec![
            ObservationVector(vec![0.0, 10.0]),
            ObservationVector(vec![2.0, 10.0]),
        ];
        let refs: Vec<&ObservationVector> = obs.iter().collect();
        let mut g = OpdfDiagGaussianFactory::new(2).unwrap().factor();
        g.fit(&refs).unwrap();
        assert_eq!(g.means(), &[1.0, 10.0]);
        assert!((g.variances()[0] - 1.0).abs() < 1e-12);
        assert_eq!(g.variances()[1], MIN_VARIANCE);
    }

    #[test]
    fn diag_fit_rejects_dimension_mismatch() {
        let obs = vec![ObservationVector(vec![0.0, 1.0, 2.0])];
        let refs: Vec<&ObservationVector> = obs.iter().collect();
        let mut g = OpdfDiagGaussian::standard(2).unwrap();
        assert!(matches!(
            g.fit(&refs),
            Err(StrataError::DimensionMismatch { expected: 2, found: 3 })
        ));
    }

    #[test]
    fn samples_follow_parameters() {
        let g = OpdfGaussian::new(5.0, 4.0).unwrap();
        let mut rng = StdRng::seed_from_u64(3);
        let n = 20_000;
        let xs: Vec<f64> = (0..n).map(|_| g.generate(&mut rng).0).collect();
        let mean = xs.iter().sum::<f64>() / n as f64;
        let var = xs.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n as f64;
        assert!((mean - 5.0).abs() < 0.1, "mean {mean}");
        assert!((var - 4.0).abs() < 0.2, "variance {var}");

        let v = OpdfDiagGaussian::new(vec![1.0, -1.0], vec![0.01, 0.01]).unwrap();
        let x = v.generate(&mut rng);
        assert_eq!(x.dimension(), 2);
        assert!((x.0[0] - 1.0).abs() < 1.0);
    }

    #[test]
    fn diag_samples_follow_parameters() {
        let g = OpdfDiagGaussian::new(vec![-2.0, 3.0], vec![0.25, 9.0]).unwrap();
        let mut rng = StdRng::seed_from_u64(17);
        let n = 20_000;
        let xs: Vec<ObservationVector> = (0..n).map(|_| g.generate(&mut rng)).collect();
        for (d, (&m, &v)) in g.means().iter().zip(g.variances()).enumerate() {
            let mean = xs.iter().map(|x| x.0[d]).sum::<f64>() / n as f64;
            let var = xs.iter().map(|x| (x.0[d] - mean).powi(2)).sum::<f64>() / n as f64;
            assert!((mean - m).abs() < 0.1, "dimension {d} mean {mean}");
            assert!((var - v).abs() < 0.05 * v, "dimension {d} variance {var}");
        }
    }
}
