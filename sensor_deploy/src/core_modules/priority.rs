// THEORY:
// The priority oracle turns "which pixels would this footprint own" into a single
// placement value. It is the only place where color, clustering and coverage meet.
//
// Algorithm:
// 1.  **Accumulate**: While a footprint pass walks its pixels, a
//     `ColorAccumulator` keeps running sums and sums of squares per channel. No
//     per-pixel vectors are collected; the pass is a single sweep.
// 2.  **Describe**: With n > 1 samples the accumulator yields the mean and the
//     Bessel-corrected standard deviation per channel. The concatenated
//     (mean ∥ std) vector has the same shape as a region's clustering features.
// 3.  **Classify**: The clustering collaborator maps that vector to its nearest
//     cluster.
// 4.  **Scale**: priority = cluster weight × (n / cell pixel count). A footprint
//     that only reaches half of its pixels is worth half as much.
//
// Fewer than two samples cannot produce a standard deviation, and such a
// placement is worthless anyway, so the oracle answers with the `USELESS`
// sentinel instead of an error.
//
// A collaborator that answers `nearest_cluster` with an index outside its own
// clustering is a fault, not a worthless footprint. The oracle cannot fail
// mid-pass, so the model records the first such index and the area surfaces it
// as `ClusterLabelOutOfRange` once the run returns.

use super::pixel::pixel::{Pixel, Raster};
use crate::error::{ClusterFailure, DeployError, Result};
use std::sync::OnceLock;

/// Number of features per sample: three channel means then three deviations.
pub const FEATURE_LEN: usize = 6;

/// The clustering capability the engine consumes.
///
/// Implementations must be deterministic for identical inputs (or seeded) so
/// that deployments are reproducible.
pub trait Cluster {
    /// Partitions `samples` into `k` clusters and returns one label per sample,
    /// in sample order.
    fn cluster(&mut self, samples: &[Vec<f64>], k: usize) -> std::result::Result<Vec<usize>, ClusterFailure>;

    /// Index of the cluster closest to `sample`.
    fn nearest_cluster(&self, sample: &[f64]) -> usize;
}

/// Index of the centre closest to `sample` by Euclidean distance. Ties keep the
/// lower index.
pub fn nearest_centroid(centres: &[Vec<f64>], sample: &[f64]) -> usize {
    let mut best_index = 0;
    let mut best_distance = f64::INFINITY;
    for (index, centre) in centres.iter().enumerate() {
        let distance: f64 = centre
            .iter()
            .zip(sample)
            .map(|(c, s)| (c - s).powi(2))
            .sum();
        if distance < best_distance {
            best_distance = distance;
            best_index = index;
        }
    }
    best_index
}

/// A `Cluster` over a fixed set of centres: every sample joins its nearest centre.
#[derive(Debug, Clone, PartialEq)]
pub struct CentroidClassifier {
    centres: Vec<Vec<f64>>,
}

impl CentroidClassifier {
    pub fn new(centres: Vec<Vec<f64>>) -> Self {
        Self { centres }
    }

    pub fn centres(&self) -> &[Vec<f64>] {
        &self.centres
    }
}

impl Cluster for CentroidClassifier {
    fn cluster(&mut self, samples: &[Vec<f64>], k: usize) -> std::result::Result<Vec<usize>, ClusterFailure> {
        if k != self.centres.len() {
            return Err(format!("classifier holds {} centres, {k} requested", self.centres.len()).into());
        }
        Ok(samples
            .iter()
            .map(|sample| nearest_centroid(&self.centres, sample))
            .collect())
    }

    fn nearest_cluster(&self, sample: &[f64]) -> usize {
        nearest_centroid(&self.centres, sample)
    }
}

/// Running per-channel statistics over a set of pixels.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ColorAccumulator {
    sum: [f64; 3],
    sum_sq: [f64; 3],
    count: usize,
}

impl ColorAccumulator {
    #[inline]
    pub fn add(&mut self, pixel: &Pixel) {
        for (channel, value) in pixel.channels().into_iter().enumerate() {
            self.sum[channel] += value;
            self.sum_sq[channel] += value * value;
        }
        self.count += 1;
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn mean(&self) -> [f64; 3] {
        if self.count == 0 {
            return [0.0; 3];
        }
        let n = self.count as f64;
        self.sum.map(|s| s / n)
    }

    /// Bessel-corrected standard deviation, `None` below two samples.
    pub fn sample_std_dev(&self) -> Option<[f64; 3]> {
        if self.count < 2 {
            return None;
        }
        Some(self.deviation(self.count as f64 - 1.0))
    }

    /// Population standard deviation, used for region statistics.
    pub fn population_std_dev(&self) -> [f64; 3] {
        if self.count == 0 {
            return [0.0; 3];
        }
        self.deviation(self.count as f64)
    }

    fn deviation(&self, denominator: f64) -> [f64; 3] {
        let n = self.count as f64;
        let mut out = [0.0; 3];
        for channel in 0..3 {
            let sum = self.sum[channel];
            // Rounding can push a zero variance slightly negative.
            let variance = ((self.sum_sq[channel] - sum * sum / n) / denominator).max(0.0);
            out[channel] = variance.sqrt();
        }
        out
    }
}

/// Concatenates mean and deviation into a clustering feature vector.
pub fn feature_vector(mean: [f64; 3], std_dev: [f64; 3]) -> Vec<f64> {
    let mut features = Vec::with_capacity(FEATURE_LEN);
    features.extend_from_slice(&mean);
    features.extend_from_slice(&std_dev);
    features
}

/// The result of a priority computation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriorityEstimate {
    pub priority: f64,
    /// Nearest cluster, `None` for an unplaceable footprint.
    pub cluster: Option<usize>,
}

impl PriorityEstimate {
    /// Footprint off the area or with fewer than two claimable pixels.
    pub const USELESS: PriorityEstimate = PriorityEstimate {
        priority: 0.0,
        cluster: None,
    };

    pub fn is_useless(&self) -> bool {
        self.priority == 0.0
    }
}

/// A clustering collaborator together with the weight of each of its clusters.
pub struct ClusterModel {
    clusterer: Box<dyn Cluster + Send>,
    priorities: Vec<f64>,
    /// First out-of-range answer of `nearest_cluster`.
    fault: OnceLock<usize>,
}

impl ClusterModel {
    /// Wraps a clusterer that produced `cluster_count` clusters; all weights
    /// start at zero.
    pub fn new(clusterer: Box<dyn Cluster + Send>, cluster_count: usize) -> Self {
        Self {
            clusterer,
            priorities: vec![0.0; cluster_count],
            fault: OnceLock::new(),
        }
    }

    pub fn cluster_count(&self) -> usize {
        self.priorities.len()
    }

    pub fn priorities(&self) -> &[f64] {
        &self.priorities
    }

    pub fn priority_of(&self, cluster: usize) -> Option<f64> {
        self.priorities.get(cluster).copied()
    }

    pub fn set_priority(&mut self, cluster: usize, weight: f64) -> Result<()> {
        if !weight.is_finite() || weight < 0.0 {
            return Err(DeployError::invalid(format!(
                "cluster priority must be finite and non-negative, got {weight}"
            )));
        }
        let cluster_count = self.priorities.len();
        let slot = self
            .priorities
            .get_mut(cluster)
            .ok_or(DeployError::UnknownCluster {
                cluster,
                cluster_count,
            })?;
        *slot = weight;
        Ok(())
    }

    /// Nearest cluster of `sample`, or `None` when the collaborator answers
    /// outside `0..cluster_count`. The first such answer is kept as a fault.
    pub fn nearest_cluster(&self, sample: &[f64]) -> Option<usize> {
        let cluster = self.clusterer.nearest_cluster(sample);
        if cluster < self.priorities.len() {
            return Some(cluster);
        }
        if self.fault.set(cluster).is_ok() {
            tracing::warn!(
                cluster,
                cluster_count = self.priorities.len(),
                "clusterer answered outside its clustering"
            );
        }
        None
    }

    /// Fails with `ClusterLabelOutOfRange` once the collaborator has answered
    /// out of range. The fault lasts until clustering runs again.
    pub fn check(&self) -> Result<()> {
        match self.fault.get() {
            Some(&label) => Err(DeployError::ClusterLabelOutOfRange {
                label,
                cluster_count: self.priorities.len(),
            }),
            None => Ok(()),
        }
    }
}

/// Read-only view used by every footprint pass to turn statistics into priority.
#[derive(Clone, Copy)]
pub struct PriorityOracle<'a> {
    pub raster: &'a Raster,
    pub clusters: &'a ClusterModel,
    /// Pixel count of a full region cell.
    pub footprint_area: usize,
}

impl<'a> PriorityOracle<'a> {
    pub fn new(raster: &'a Raster, clusters: &'a ClusterModel, footprint_area: usize) -> Self {
        Self {
            raster,
            clusters,
            footprint_area,
        }
    }

    #[inline]
    pub fn pixel(&self, index: usize) -> &Pixel {
        self.raster.at(index)
    }

    /// Converts accumulated statistics into a priority.
    pub fn estimate(&self, stats: &ColorAccumulator) -> PriorityEstimate {
        let Some(std_dev) = stats.sample_std_dev() else {
            return PriorityEstimate::USELESS;
        };
        if self.footprint_area == 0 {
            return PriorityEstimate::USELESS;
        }
        let features = feature_vector(stats.mean(), std_dev);
        let Some(cluster) = self.clusters.nearest_cluster(&features) else {
            return PriorityEstimate::USELESS;
        };
        let weight = self.clusters.priorities()[cluster];
        let ratio = stats.count() as f64 / self.footprint_area as f64;
        PriorityEstimate {
            priority: weight * ratio,
            cluster: Some(cluster),
        }
    }
}
