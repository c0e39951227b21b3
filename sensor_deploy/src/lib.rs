// THEORY:
// This file is the entry point of the `sensor_deploy` library crate, a
// coverage-aware engine that places a fixed number of disk-shaped sensors over
// a prioritized area.
//
// The public face is `SensorArea`: construct it from an `AreaConfig`, import an
// image, cluster its regions through any `Cluster` implementation, assign
// cluster weights, then run a strategy (`deploy_greedy`, `deploy_random`,
// `deploy_genetic`) and optionally refine it with `anneal`. `DeploymentWorker`
// runs the same jobs on a background thread and streams `DeploymentEvent`s.
// The building blocks in `core_modules` (geometry, ledger, priority oracle,
// adjacency) stay public for callers that want to inspect a deployment.

pub mod config;
pub mod core_modules;
pub mod deployment;
pub mod error;
pub mod notify;
pub mod optimization;
pub mod sensor_area;
pub mod worker;

pub use config::{AnnealingConfig, AreaConfig, GeneticConfig};
pub use core_modules::geometry::Position;
pub use core_modules::pixel::pixel::PixelSource;
pub use core_modules::priority::{CentroidClassifier, Cluster, nearest_centroid};
pub use error::{ClusterFailure, DeployError, Result};
pub use notify::{CancelToken, ChannelNotifier, DeploymentEvent, Notifier, NullNotifier, Strategy, TracingNotifier};
pub use sensor_area::{DeploymentReport, SensorArea};
pub use worker::{DeploymentJob, DeploymentWorker};
