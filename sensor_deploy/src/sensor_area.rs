// THEORY:
// `SensorArea` is the top-level owner of the engine's mutable state: the region
// grid, the imported raster, the clustering model, the coverage ledger and the
// active sensor list. Every strategy and optimizer runs as a method on it, and
// each one leaves the ledger consistent with the sensor list when it returns.
//
// Preparation happens in three explicit steps before any deployment can run:
// 1.  `import_image` copies the pixels and fills in each region's color signature.
// 2.  `run_clustering` hands the region signatures to the clustering collaborator
//     and records one cluster per region.
// 3.  `set_cluster_priority` gives each cluster its weight; region priorities
//     follow as weight × area ratio.
//
// Strategies borrow the pieces they need at once through `AreaView`, which
// splits the area into a read-only priority oracle and the mutable ledger,
// sensors and random source.

use crate::config::AreaConfig;
use crate::core_modules::components;
use crate::core_modules::geometry::{Geometry, Position};
use crate::core_modules::ledger::CoverageLedger;
use crate::core_modules::pixel::pixel::{PixelSource, Raster};
use crate::core_modules::priority::{Cluster, ClusterModel, PriorityOracle};
use crate::core_modules::region::{Region, build_regions};
use crate::core_modules::sensor::{Sensor, SensorId};
use crate::error::{DeployError, Result};
use crate::notify::{CancelToken, DeploymentEvent, Notifier, Strategy, TracingNotifier};
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::Serialize;
use std::sync::Arc;

/// Summary of a finished strategy or optimizer run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeploymentReport {
    pub strategy: Strategy,
    /// Sensors in the area when the run ended.
    pub placed: usize,
    /// Sum of the stored sensor priorities.
    pub total_priority: f64,
    /// Total priority per connected component of the adjacency graph.
    pub mean_component_priority: f64,
    /// Steps or generations performed.
    pub iterations: u64,
    pub cancelled: bool,
}

/// The deployment engine.
pub struct SensorArea {
    config: AreaConfig,
    geometry: Arc<Geometry>,
    regions: Vec<Region>,
    raster: Option<Raster>,
    clusters: Option<ClusterModel>,
    ledger: CoverageLedger,
    sensors: Vec<Sensor>,
    rng: StdRng,
    notifier: Box<dyn Notifier + Send>,
    cancel: CancelToken,
}

/// Simultaneous borrows of everything a strategy touches.
pub(crate) struct AreaView<'a> {
    pub geometry: &'a Geometry,
    pub regions: &'a [Region],
    pub oracle: PriorityOracle<'a>,
    pub ledger: &'a mut CoverageLedger,
    pub sensors: &'a mut Vec<Sensor>,
    pub rng: &'a mut StdRng,
    pub notifier: &'a dyn Notifier,
    pub cancel: &'a CancelToken,
}

impl AreaView<'_> {
    /// Appends a sensor with the next id, claiming its pixels and scoring them.
    pub fn place_scored(&mut self, position: Position, strategy: Strategy) -> &Sensor {
        let id = self.sensors.len() as SensorId;
        let estimate = self.ledger.cover_and_priority(position, id, &self.oracle);
        let mut sensor = Sensor::new(id, position);
        sensor.priority = estimate.priority;
        sensor.cluster = estimate.cluster;
        self.push(sensor, strategy)
    }

    /// Appends an already scored sensor, claiming its pixels.
    pub fn place_with_priority(
        &mut self,
        position: Position,
        priority: f64,
        cluster: Option<usize>,
        strategy: Strategy,
    ) -> &Sensor {
        let id = self.sensors.len() as SensorId;
        self.ledger.cover(position, id);
        let mut sensor = Sensor::new(id, position);
        sensor.priority = priority;
        sensor.cluster = cluster;
        self.push(sensor, strategy)
    }

    fn push(&mut self, sensor: Sensor, strategy: Strategy) -> &Sensor {
        self.notifier.notify(&DeploymentEvent::SensorPlaced {
            strategy,
            id: sensor.id,
            position: sensor.position,
            priority: sensor.priority,
        });
        self.sensors.push(sensor);
        &self.sensors[self.sensors.len() - 1]
    }

    pub fn total_priority(&self) -> f64 {
        self.sensors.iter().map(|s| s.priority).sum()
    }

    /// Rebuilds adjacency, emits `Completed` and packages the report.
    pub fn finish(&mut self, strategy: Strategy, iterations: u64, cancelled: bool) -> DeploymentReport {
        components::rebuild_adjacency(self.sensors, self.geometry.adjacency_threshold());
        let total_priority = self.total_priority();
        self.notifier.notify(&DeploymentEvent::Completed {
            strategy,
            total_priority,
            cancelled,
        });
        DeploymentReport {
            strategy,
            placed: self.sensors.len(),
            total_priority,
            mean_component_priority: components::mean_component_priority(self.sensors),
            iterations,
            cancelled,
        }
    }
}

impl SensorArea {
    /// Validates the configuration and lays out the region grid.
    pub fn new(config: AreaConfig) -> Result<Self> {
        let geometry = Arc::new(Geometry::new(&config)?);
        let regions = build_regions(&geometry);
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        tracing::debug!(
            width = config.width,
            height = config.height,
            radius = config.radius,
            regions = regions.len(),
            "sensor area initialized"
        );
        Ok(Self {
            ledger: CoverageLedger::new(Arc::clone(&geometry)),
            config,
            geometry,
            regions,
            raster: None,
            clusters: None,
            sensors: Vec::new(),
            rng,
            notifier: Box::new(TracingNotifier),
            cancel: CancelToken::new(),
        })
    }

    pub fn with_notifier(mut self, notifier: impl Notifier + Send + 'static) -> Self {
        self.set_notifier(notifier);
        self
    }

    pub fn set_notifier(&mut self, notifier: impl Notifier + Send + 'static) {
        self.notifier = Box::new(notifier);
    }

    /// The token polled between steps of every run.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn config(&self) -> &AreaConfig {
        &self.config
    }

    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    pub fn regions(&self) -> &[Region] {
        &self.regions
    }

    pub fn sensors(&self) -> &[Sensor] {
        &self.sensors
    }

    pub fn ledger(&self) -> &CoverageLedger {
        &self.ledger
    }

    pub fn cluster_priorities(&self) -> Option<&[f64]> {
        self.clusters.as_ref().map(|c| c.priorities())
    }

    pub fn total_priority(&self) -> f64 {
        self.sensors.iter().map(|s| s.priority).sum()
    }

    pub fn mean_component_priority(&self) -> f64 {
        components::mean_component_priority(&self.sensors)
    }

    /// Copies the image and recomputes every region's color signature.
    pub fn import_image<S: PixelSource + ?Sized>(&mut self, source: &S) -> Result<()> {
        let expected = (self.config.width, self.config.height);
        let actual = source.dimensions();
        if actual != expected {
            return Err(DeployError::ImageSizeMismatch { expected, actual });
        }
        let raster = Raster::from_source(source);
        for region in &mut self.regions {
            region.import_statistics(&self.geometry, &raster);
        }
        self.raster = Some(raster);
        tracing::info!(regions = self.regions.len(), "image imported");
        Ok(())
    }

    /// Clusters the regions into `cluster_count` groups and resets every cluster
    /// weight to zero. Returns the label of each region.
    pub fn run_clustering(
        &mut self,
        mut clusterer: Box<dyn Cluster + Send>,
        cluster_count: usize,
    ) -> Result<Vec<usize>> {
        if cluster_count == 0 || cluster_count >= self.regions.len() {
            return Err(DeployError::invalid(format!(
                "cluster count must lie in 1..{}, got {cluster_count}",
                self.regions.len()
            )));
        }
        if self.raster.is_none() {
            return Err(DeployError::MissingImage);
        }

        let samples: Vec<Vec<f64>> = self.regions.iter().map(Region::features).collect();
        let labels = clusterer
            .cluster(&samples, cluster_count)
            .map_err(DeployError::Clustering)?;
        if labels.len() != samples.len() {
            return Err(DeployError::ClusterLabelCount {
                expected: samples.len(),
                actual: labels.len(),
            });
        }
        if let Some(&label) = labels.iter().find(|&&l| l >= cluster_count) {
            return Err(DeployError::ClusterLabelOutOfRange {
                label,
                cluster_count,
            });
        }

        for (region, &label) in self.regions.iter_mut().zip(&labels) {
            region.cluster = Some(label);
            region.priority = 0.0;
        }
        self.clusters = Some(ClusterModel::new(clusterer, cluster_count));
        tracing::info!(cluster_count, "regions clustered");
        Ok(labels)
    }

    /// Sets a cluster's weight and the priority of every region in it.
    pub fn set_cluster_priority(&mut self, cluster: usize, weight: f64) -> Result<()> {
        let model = self.clusters.as_mut().ok_or(DeployError::NotClustered)?;
        model.set_priority(cluster, weight)?;
        for region in self.regions.iter_mut().filter(|r| r.cluster == Some(cluster)) {
            region.priority = weight * region.area_ratio;
        }
        Ok(())
    }

    /// Sets every cluster weight at once. The slice length must match the
    /// cluster count; nothing changes if any weight is rejected.
    pub fn set_cluster_priorities(&mut self, weights: &[f64]) -> Result<()> {
        let model = self.clusters.as_ref().ok_or(DeployError::NotClustered)?;
        if weights.len() != model.cluster_count() {
            return Err(DeployError::invalid(format!(
                "expected {} cluster priorities, got {}",
                model.cluster_count(),
                weights.len()
            )));
        }
        if let Some(bad) = weights.iter().find(|w| !w.is_finite() || **w < 0.0) {
            return Err(DeployError::invalid(format!(
                "cluster priority must be finite and non-negative, got {bad}"
            )));
        }
        for (cluster, &weight) in weights.iter().enumerate() {
            self.set_cluster_priority(cluster, weight)?;
        }
        Ok(())
    }

    /// Removes every sensor and releases all pixels.
    pub fn clear_deployment(&mut self) {
        self.ledger.clear();
        self.sensors.clear();
    }

    /// Places one sensor by hand at `position` with the next free id.
    pub fn add_sensor(&mut self, position: Position) -> Result<&Sensor> {
        let mut view = self.view()?;
        let id = view.place_scored(position, Strategy::Manual).id;
        components::rebuild_adjacency(&mut self.sensors, self.geometry.adjacency_threshold());
        self.check_clusters()?;
        Ok(&self.sensors[id as usize])
    }

    /// Read-only priority of a sensor at `position` over currently unowned pixels.
    pub fn peek_priority(&self, position: Position) -> Result<f64> {
        let oracle = self.oracle()?;
        let priority = self.ledger.peek_priority(position, &oracle).priority;
        self.check_clusters()?;
        Ok(priority)
    }

    /// Re-covers every sensor in id order so that each stored priority matches the
    /// current coverage.
    pub fn refresh_priorities(&mut self) -> Result<()> {
        let mut view = self.view()?;
        view.ledger.clear();
        for sensor in view.sensors.iter_mut() {
            let estimate = view
                .ledger
                .cover_and_priority(sensor.position, sensor.id, &view.oracle);
            sensor.priority = estimate.priority;
            sensor.cluster = estimate.cluster;
        }
        self.check_clusters()
    }

    /// Greedy and genetic candidate positions: every region centre followed by
    /// every grid-line intersection.
    pub fn candidate_positions(&self) -> Vec<Position> {
        self.regions
            .iter()
            .map(|r| r.center)
            .chain(self.geometry.intersection_points())
            .collect()
    }

    /// Surfaces a clusterer that answered outside its own clustering. Every run
    /// that scores footprints calls this before returning; the sensors placed by
    /// that run stay in the area.
    pub(crate) fn check_clusters(&self) -> Result<()> {
        match &self.clusters {
            Some(model) => model.check(),
            None => Ok(()),
        }
    }

    fn oracle(&self) -> Result<PriorityOracle<'_>> {
        let raster = self.raster.as_ref().ok_or(DeployError::MissingImage)?;
        let clusters = self.clusters.as_ref().ok_or(DeployError::NotClustered)?;
        Ok(PriorityOracle::new(raster, clusters, self.geometry.footprint_area()))
    }

    /// Splits the area into the borrows a strategy needs.
    pub(crate) fn view(&mut self) -> Result<AreaView<'_>> {
        let raster = self.raster.as_ref().ok_or(DeployError::MissingImage)?;
        let clusters = self.clusters.as_ref().ok_or(DeployError::NotClustered)?;
        clusters.check()?;
        Ok(AreaView {
            geometry: &self.geometry,
            regions: &self.regions,
            oracle: PriorityOracle::new(raster, clusters, self.geometry.footprint_area()),
            ledger: &mut self.ledger,
            sensors: &mut self.sensors,
            rng: &mut self.rng,
            notifier: self.notifier.as_ref(),
            cancel: &self.cancel,
        })
    }
}
