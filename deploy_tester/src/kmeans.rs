// THEORY:
// A small deterministic k-means used as the clustering collaborator of the
// driver. Centres are seeded farthest-first (the darkest sample, then whichever
// sample is farthest from every centre chosen so far) and refined with Lloyd
// iterations until no label changes. No randomness is involved, so the same
// image always yields the same clustering.

use sensor_deploy::{ClusterFailure, Cluster, nearest_centroid};

pub struct KMeans {
    max_iterations: usize,
    centres: Vec<Vec<f64>>,
}

fn distance_squared(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y).powi(2)).sum()
}

impl KMeans {
    pub fn new(max_iterations: usize) -> Self {
        Self {
            max_iterations,
            centres: Vec::new(),
        }
    }

    pub fn centres(&self) -> &[Vec<f64>] {
        &self.centres
    }

    fn seed(samples: &[Vec<f64>], k: usize) -> Vec<Vec<f64>> {
        let darkest = samples
            .iter()
            .enumerate()
            .min_by(|a, b| a.1.iter().sum::<f64>().total_cmp(&b.1.iter().sum::<f64>()))
            .map_or(0, |(i, _)| i);
        let mut centres = vec![samples[darkest].clone()];
        while centres.len() < k {
            let farthest = samples
                .iter()
                .enumerate()
                .map(|(i, s)| {
                    let nearest = centres
                        .iter()
                        .map(|c| distance_squared(c, s))
                        .fold(f64::INFINITY, f64::min);
                    (i, nearest)
                })
                .max_by(|a, b| a.1.total_cmp(&b.1))
                .map_or(0, |(i, _)| i);
            centres.push(samples[farthest].clone());
        }
        centres
    }
}

impl Cluster for KMeans {
    fn cluster(&mut self, samples: &[Vec<f64>], k: usize) -> Result<Vec<usize>, ClusterFailure> {
        if k == 0 || k > samples.len() {
            return Err(format!("cannot form {k} clusters from {} samples", samples.len()).into());
        }
        let dimension = samples[0].len();
        if samples.iter().any(|s| s.len() != dimension) {
            return Err("samples have inconsistent dimensions".into());
        }

        let mut centres = Self::seed(samples, k);
        let mut labels: Vec<usize> = samples.iter().map(|s| nearest_centroid(&centres, s)).collect();
        for iteration in 0..self.max_iterations {
            let mut sums = vec![vec![0.0; dimension]; k];
            let mut counts = vec![0usize; k];
            for (sample, &label) in samples.iter().zip(&labels) {
                counts[label] += 1;
                for (sum, value) in sums[label].iter_mut().zip(sample) {
                    *sum += value;
                }
            }
            for ((centre, sum), count) in centres.iter_mut().zip(sums).zip(&counts) {
                // An emptied cluster keeps its previous centre.
                if *count > 0 {
                    *centre = sum.into_iter().map(|s| s / *count as f64).collect();
                }
            }

            let next: Vec<usize> = samples.iter().map(|s| nearest_centroid(&centres, s)).collect();
            if next == labels {
                tracing::debug!(iteration, "k-means converged");
                break;
            }
            labels = next;
        }

        self.centres = centres;
        Ok(labels)
    }

    fn nearest_cluster(&self, sample: &[f64]) -> usize {
        nearest_centroid(&self.centres, sample)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blob(centre: f64, spread: f64) -> Vec<Vec<f64>> {
        (0..5)
            .map(|i| vec![centre + spread * i as f64, centre, centre, 1.0, 1.0, 1.0])
            .collect()
    }

    #[test]
    fn separates_well_spaced_blobs() {
        let mut samples = blob(10.0, 1.0);
        samples.extend(blob(120.0, 1.0));
        samples.extend(blob(240.0, 1.0));
        let mut kmeans = KMeans::new(50);
        let labels = kmeans.cluster(&samples, 3).expect("enough samples");

        for group in labels.chunks(5) {
            assert!(group.iter().all(|l| *l == group[0]));
        }
        assert_ne!(labels[0], labels[5]);
        assert_ne!(labels[5], labels[10]);
        assert_eq!(kmeans.nearest_cluster(&samples[12]), labels[12]);
        assert_eq!(kmeans.centres().len(), 3);
    }

    #[test]
    fn rejects_impossible_requests() {
        let mut kmeans = KMeans::new(10);
        assert!(kmeans.cluster(&blob(0.0, 1.0), 0).is_err());
        assert!(kmeans.cluster(&blob(0.0, 1.0), 6).is_err());
    }
}
