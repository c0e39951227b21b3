// THEORY:
// Construction strategies take an empty deployment to a complete one.
//
// Greedy priority queue:
// 1.  **Seed**: one candidate per region centre and one per grid-line
//     intersection, scored against the empty ledger. Zero-priority candidates are
//     dropped and the pool is sorted ascending, so the best candidate is last.
// 2.  **Place**: pop the last candidate and materialize it with the next id.
// 3.  **Rescore**: every remaining candidate within one grid edge of the new
//     sensor lost some of its claimable pixels; it is re-scored read-only, zero
//     scores are dropped and the pool is re-sorted. The sort is stable, so equal
//     priorities keep their previous relative order.
// 4.  **Exhaustion**: if the pool empties before the sensor count is reached, the
//     remaining slots are handed to the fill-remaining placer.
//
// Fill remaining: each leftover sensor is dropped next to an existing sensor,
// cycling through anchors from the highest priority down, displaced on each axis
// by R/2 ± R/4 pixels in a random direction. These sensors are kept even when
// they score zero, so the requested count is always met.
//
// Random: region centres with a nonzero region priority are drawn without
// replacement; a draw is placed only if it scores above zero. Once the regions
// run out, uniform draws over the whole area continue until every sensor is
// placed. That fallback can loop for a long time on a mostly worthless map, so
// `AreaConfig::random_retry_limit` optionally bounds it.

use crate::core_modules::components;
use crate::core_modules::geometry::Position;
use crate::error::{DeployError, Result};
use crate::notify::Strategy;
use crate::sensor_area::{AreaView, DeploymentReport, SensorArea};
use rand::Rng;
use rand::seq::SliceRandom;
use std::cmp::Ordering;

/// A virtual sensor in the greedy pool.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Candidate {
    position: Position,
    priority: f64,
    cluster: Option<usize>,
}

fn by_priority(a: &Candidate, b: &Candidate) -> Ordering {
    a.priority.total_cmp(&b.priority)
}

impl AreaView<'_> {
    fn score(&self, position: Position) -> Candidate {
        let estimate = self.ledger.peek_priority(position, &self.oracle);
        Candidate {
            position,
            priority: estimate.priority,
            cluster: estimate.cluster,
        }
    }

    /// Places `count` sensors next to existing ones. Returns the number placed,
    /// which is short of `count` only on cancellation.
    pub(crate) fn fill_remaining(&mut self, count: usize) -> usize {
        if count == 0 {
            return 0;
        }
        let mut anchors: Vec<(Position, f64)> = if self.sensors.is_empty() {
            self.regions.iter().map(|r| (r.center, r.priority)).collect()
        } else {
            self.sensors.iter().map(|s| (s.position, s.priority)).collect()
        };
        // Stable descending sort keeps lower ids first among equal priorities.
        anchors.sort_by(|a, b| b.1.total_cmp(&a.1));
        tracing::warn!(count, anchors = anchors.len(), "candidate pool exhausted, filling remaining sensors");

        let radius = self.geometry.radius() as f64;
        let (half, quarter) = (radius / 2.0, radius / 4.0);
        for placed in 0..count {
            if self.cancel.is_cancelled() {
                return placed;
            }
            let (anchor, _) = anchors[placed % anchors.len()];
            let mut jitter = || {
                let magnitude = (half + quarter * self.rng.random_range(-1.0..=1.0)).round() as i32;
                if self.rng.random_bool(0.5) { magnitude } else { -magnitude }
            };
            let (dx, dy) = (jitter(), jitter());
            self.place_scored(anchor.offset(dx, dy), Strategy::FillRemaining);
        }
        count
    }
}

impl SensorArea {
    /// Greedy priority-queue placement of `sensor_count` sensors, replacing any
    /// current deployment.
    pub fn deploy_greedy(&mut self) -> Result<DeploymentReport> {
        self.clear_deployment();
        let candidates = self.candidate_positions();
        let requested = self.config().sensor_count;
        let mut view = self.view()?;

        let mut pool: Vec<Candidate> = candidates
            .into_iter()
            .map(|position| view.score(position))
            .filter(|c| c.priority != 0.0)
            .collect();
        pool.sort_by(by_priority);
        tracing::info!(requested, candidates = pool.len(), "greedy deployment started");

        let threshold = view.geometry.adjacency_threshold();
        let mut cancelled = false;
        while view.sensors.len() < requested {
            if view.cancel.is_cancelled() {
                cancelled = true;
                break;
            }
            let Some(best) = pool.pop() else {
                let remaining = requested - view.sensors.len();
                cancelled = view.fill_remaining(remaining) < remaining;
                break;
            };
            view.place_with_priority(best.position, best.priority, best.cluster, Strategy::Greedy);

            for candidate in pool
                .iter_mut()
                .filter(|c| c.position.distance_squared(best.position) <= threshold)
            {
                *candidate = view.score(candidate.position);
            }
            pool.retain(|c| c.priority != 0.0);
            pool.sort_by(by_priority);
        }

        let iterations = view.sensors.len() as u64;
        let report = view.finish(Strategy::Greedy, iterations, cancelled);
        self.check_clusters()?;
        Ok(report)
    }

    /// Random placement of `sensor_count` sensors, replacing any current
    /// deployment.
    ///
    /// Fails with `RetryBudgetExhausted` when `random_retry_limit` is set and the
    /// uniform fallback uses it up; the sensors placed so far stay in the area.
    pub fn deploy_random(&mut self) -> Result<DeploymentReport> {
        self.clear_deployment();
        let requested = self.config().sensor_count;
        let retry_limit = self.config().random_retry_limit;
        let mut view = self.view()?;

        let mut centres: Vec<Position> = view
            .regions
            .iter()
            .filter(|r| r.priority != 0.0)
            .map(|r| r.center)
            .collect();
        centres.shuffle(&mut *view.rng);
        tracing::info!(requested, regions = centres.len(), "random deployment started");

        let mut cancelled = false;
        let mut draws: u64 = 0;
        while view.sensors.len() < requested {
            if view.cancel.is_cancelled() {
                cancelled = true;
                break;
            }
            let position = match centres.pop() {
                Some(centre) => centre,
                None => {
                    if retry_limit.is_some_and(|limit| draws >= limit) {
                        components::rebuild_adjacency(view.sensors, view.geometry.adjacency_threshold());
                        return Err(DeployError::RetryBudgetExhausted {
                            placed: view.sensors.len(),
                            requested,
                            attempts: draws,
                        });
                    }
                    draws += 1;
                    let x = view.rng.random_range(0..=view.geometry.width() as i32);
                    let y = view.rng.random_range(0..=view.geometry.height() as i32);
                    Position::new(x, y)
                }
            };

            let candidate = view.score(position);
            if candidate.priority == 0.0 {
                // Every draw scores zero once the clusterer has faulted.
                if view.oracle.clusters.check().is_err() {
                    break;
                }
                tracing::trace!(x = position.x, y = position.y, "worthless draw rejected");
                continue;
            }
            view.place_with_priority(position, candidate.priority, candidate.cluster, Strategy::Random);
        }

        let iterations = view.sensors.len() as u64 + draws;
        let report = view.finish(Strategy::Random, iterations, cancelled);
        self.check_clusters()?;
        Ok(report)
    }

    /// Adds `count` sensors around the current deployment with the
    /// fill-remaining placer.
    pub fn fill_remaining(&mut self, count: usize) -> Result<DeploymentReport> {
        let mut view = self.view()?;
        let placed = view.fill_remaining(count);
        let report = view.finish(Strategy::FillRemaining, placed as u64, placed < count);
        self.check_clusters()?;
        Ok(report)
    }

    /// Sensor positions, for callers that only need the layout.
    pub fn sensor_positions(&self) -> Vec<Position> {
        self.sensors().iter().map(|s| s.position).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AreaConfig;
    use crate::sensor_area::test_support::*;
    use approx::assert_relative_eq;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use rand::seq::index;

    fn region_index_of(area: &SensorArea, position: Position) -> usize {
        let edge = area.geometry().grid_edge();
        let columns = area.geometry().column_count() as usize;
        (position.y / edge) as usize * columns + (position.x / edge) as usize
    }

    #[test]
    fn greedy_starts_in_the_most_valuable_region() {
        let mut area = small_area(3, 11);
        let report = area.deploy_greedy().expect("prepared");
        assert_eq!(report.placed, 3);
        assert!(!report.cancelled);

        let first = &area.sensors()[0];
        assert_eq!(first.id, 0);
        assert_eq!(first.cluster, Some(0));
        let region = &area.regions()[region_index_of(&area, first.position)];
        assert_eq!(region.cluster, Some(0));
        assert_relative_eq!(first.priority, 0.75);
        assert_ledger_consistent(&area);
        assert_relative_eq!(report.total_priority, area.total_priority());
    }

    #[test]
    fn greedy_beats_random_region_centres_on_average() {
        let mut area = small_area(3, 5);
        let greedy = area.deploy_greedy().expect("prepared").total_priority;

        let centres: Vec<Position> = area.regions().iter().map(|r| r.center).collect();
        let mut rng = StdRng::seed_from_u64(99);
        let trials = 200;
        let mut sum = 0.0;
        for _ in 0..trials {
            area.clear_deployment();
            for i in index::sample(&mut rng, centres.len(), 3).into_iter() {
                area.add_sensor(centres[i]).expect("prepared");
            }
            sum += area.total_priority();
        }
        let random_mean = sum / trials as f64;
        assert!(greedy >= random_mean, "greedy {greedy} < random mean {random_mean}");
    }

    #[test]
    fn exhausted_pool_fills_the_remaining_slots() {
        // Only the top-left quadrant is worth anything.
        let config = AreaConfig::new(8, 8, 1, 30).with_seed(4);
        let mut area = painted_area(config, [1.0, 0.0, 0.0], |column, row| {
            if column < 2 && row < 2 { RED } else { BLUE }
        });
        let report = area.deploy_greedy().expect("prepared");
        assert_eq!(report.placed, 30);
        let ids: Vec<u32> = area.sensors().iter().map(|s| s.id).collect();
        assert_eq!(ids, (0..30).collect::<Vec<u32>>());
        assert_ledger_consistent(&area);
    }

    #[test]
    fn fill_remaining_jitters_within_bounds() {
        let mut area = small_area(3, 8);
        area.add_sensor(Position::new(3, 3)).expect("prepared");
        // R/2 ± R/4 rounds to 0 or 1 at radius 1.
        let report = area.fill_remaining(5).expect("prepared");
        assert_eq!(report.placed, 6);
        assert_eq!(report.strategy, Strategy::FillRemaining);
        for sensor in &area.sensors()[1..] {
            assert!((sensor.position.x - 3).abs() <= 1);
            assert!((sensor.position.y - 3).abs() <= 1);
        }
        assert_ledger_consistent(&area);
    }

    #[test]
    fn random_deployment_places_only_valuable_sensors() {
        let mut area = small_area(5, 21);
        let report = area.deploy_random().expect("prepared");
        assert_eq!(report.placed, 5);
        assert!(area.sensors().iter().all(|s| s.priority > 0.0));
        let ids: Vec<u32> = area.sensors().iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![0, 1, 2, 3, 4]);
        assert_ledger_consistent(&area);
    }

    #[test]
    fn random_fallback_honours_the_retry_limit() {
        let mut config = AreaConfig::new(8, 8, 1, 40).with_seed(2);
        config.random_retry_limit = Some(50);
        let mut area = painted_area(config, [1.0, 0.5, 0.1], |_, _| BLUE);
        let err = area.deploy_random().unwrap_err();
        match err {
            DeployError::RetryBudgetExhausted {
                placed,
                requested,
                attempts,
            } => {
                assert_eq!(requested, 40);
                assert_eq!(attempts, 50);
                assert!(placed >= 16 && placed < 40);
            }
            other => panic!("unexpected error {other}"),
        }
        assert_ledger_consistent(&area);
    }

    #[test]
    fn same_seed_same_deployment() {
        let mut a = small_area(4, 17);
        let mut b = small_area(4, 17);
        a.deploy_random().expect("prepared");
        b.deploy_random().expect("prepared");
        assert_eq!(a.sensor_positions(), b.sensor_positions());
    }

    #[test]
    fn cancelled_greedy_stops_consistently() {
        let mut area = small_area(3, 11);
        area.cancel_token().cancel();
        let report = area.deploy_greedy().expect("prepared");
        assert!(report.cancelled);
        assert_eq!(report.placed, 0);
        assert_eq!(area.ledger().covered_pixels(), 0);
    }
}
