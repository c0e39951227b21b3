// THEORY:
// Every caller-visible failure of the deployment engine is one variant of
// `DeployError`. Parameter problems are caught before any state is touched, so an
// `Err` never leaves a half-mutated `SensorArea` behind. Two conditions that look
// like failures are deliberately absent from this enum: a footprint that covers
// fewer than two pixels yields the `PriorityEstimate::USELESS` sentinel, and an
// exhausted greedy candidate pool switches to the fill-remaining placer.

use crate::sensor_area::DeploymentReport;
use thiserror::Error;

/// Error type returned by a clustering collaborator.
pub type ClusterFailure = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors raised by the deployment engine.
#[derive(Debug, Error)]
pub enum DeployError {
    /// A configuration or call parameter is outside its valid range.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// The imported image does not match the configured area.
    #[error("image size mismatch: expected {expected:?}, got {actual:?}")]
    ImageSizeMismatch {
        /// Configured (width, height).
        expected: (u32, u32),
        /// Image (width, height).
        actual: (u32, u32),
    },

    /// An operation needs pixel data but no image was imported.
    #[error("no image has been imported into the sensor area")]
    MissingImage,

    /// An operation needs cluster priorities but clustering has not run.
    #[error("regions have not been clustered yet")]
    NotClustered,

    /// A cluster index outside the current clustering.
    #[error("unknown cluster {cluster} (cluster count is {cluster_count})")]
    UnknownCluster {
        /// Requested cluster.
        cluster: usize,
        /// Number of clusters available.
        cluster_count: usize,
    },

    /// The clustering collaborator reported a failure.
    #[error("clustering collaborator failed")]
    Clustering(#[source] ClusterFailure),

    /// The clustering collaborator returned the wrong number of labels.
    #[error("clustering returned {actual} labels for {expected} samples")]
    ClusterLabelCount {
        /// Number of samples handed to the collaborator.
        expected: usize,
        /// Number of labels it returned.
        actual: usize,
    },

    /// The clustering collaborator returned a label outside `0..k`.
    #[error("clustering returned label {label} but only {cluster_count} clusters exist")]
    ClusterLabelOutOfRange {
        /// Offending label.
        label: usize,
        /// Requested cluster count.
        cluster_count: usize,
    },

    /// An optimizer was asked to refine an empty deployment.
    #[error("there are no deployed sensors to optimize")]
    NoSensors,

    /// Random placement hit the caller's retry cap.
    #[error("random placement gave up after {attempts} attempts ({placed} of {requested} sensors placed)")]
    RetryBudgetExhausted {
        /// Sensors placed before giving up.
        placed: usize,
        /// Sensors requested.
        requested: usize,
        /// Fallback draws performed.
        attempts: u64,
    },

    /// A worker job failed after earlier jobs of the same task had already
    /// changed the area.
    #[error("deployment job failed after {} completed jobs", completed.len())]
    JobFailed {
        /// Reports of the jobs that finished before the failure.
        completed: Vec<DeploymentReport>,
        #[source]
        source: Box<DeployError>,
    },

    /// The background worker is gone.
    #[error("deployment worker is not running")]
    WorkerUnavailable,
}

impl DeployError {
    /// Creates an invalid parameter error.
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidParameter(message.into())
    }
}

/// Result alias used throughout the engine.
pub type Result<T> = std::result::Result<T, DeployError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_carry_their_context() {
        let err = DeployError::ImageSizeMismatch {
            expected: (8, 8),
            actual: (4, 8),
        };
        assert_eq!(
            err.to_string(),
            "image size mismatch: expected (8, 8), got (4, 8)"
        );
        assert_eq!(
            DeployError::invalid("radius must be positive").to_string(),
            "invalid parameter: radius must be positive"
        );
    }

    #[test]
    fn collaborator_failures_keep_their_source() {
        let source: ClusterFailure = "centroids diverged".into();
        let err = DeployError::Clustering(source);
        let inner = std::error::Error::source(&err).map(|e| e.to_string());
        assert_eq!(inner.as_deref(), Some("centroids diverged"));
    }
}
