// THEORY:
// Simulated annealing refines an existing deployment one sensor at a time.
//
// Objective: total priority divided by the number of connected components of
// the adjacency graph. Spreading sensors into many islands is penalized, so the
// search prefers deployments that cover valuable ground without fragmenting.
//
// Each step:
// 1.  **Pick**: one sensor uniformly at random.
// 2.  **Move**: with the ledger journal open, release its pixels, shift it by
//     round(move_scale · T · R · U(-1, 1)) on each axis (kept within one radius
//     of the area), and re-link it in the adjacency graph.
// 3.  **Re-score**: cover-and-score the moved sensor, then every sensor adjacent
//     to its old or new position in ascending id order. Ascending order
//     guarantees that each released pixel goes back to the smallest covering id.
// 4.  **Decide**: accept when the objective did not drop, otherwise accept with
//     probability exp(magnification · delta / T).
// 5.  **Undo**: a rejected move replays the journal backwards and restores the
//     saved positions, priorities, clusters and neighbor lists, leaving the area
//     bit-identical to its pre-move state.
//
// Temperature starts at `initial_temperature`, is multiplied by `cooling_rate`
// after each step and the run ends once it reaches `final_temperature`.

use crate::core_modules::components;
use crate::core_modules::geometry::Position;
use crate::core_modules::sensor::SensorId;
use crate::error::{DeployError, Result};
use crate::notify::{DeploymentEvent, Strategy};
use crate::sensor_area::{AreaView, DeploymentReport, SensorArea};
use rand::Rng;

/// Pre-move state of one sensor touched by a proposal.
#[derive(Debug, Clone)]
struct SavedSensor {
    index: usize,
    priority: f64,
    cluster: Option<usize>,
    neighbors: Vec<SensorId>,
}

/// Everything needed to take a proposed move back.
#[derive(Debug)]
pub(crate) struct MoveProposal {
    index: usize,
    from: Position,
    to: Position,
    saved: Vec<SavedSensor>,
}

impl AreaView<'_> {
    fn save(&self, index: usize) -> SavedSensor {
        let sensor = &self.sensors[index];
        SavedSensor {
            index,
            priority: sensor.priority,
            cluster: sensor.cluster,
            neighbors: sensor.neighbors.clone(),
        }
    }

    /// Moves sensor `index` by `(dx, dy)`, clamped to the band within one radius
    /// of the area, and re-scores everything it touches. The ledger journal
    /// stays open until `accept_move` or `reject_move`.
    pub(crate) fn propose_move(&mut self, index: usize, dx: i32, dy: i32) -> MoveProposal {
        let threshold = self.geometry.adjacency_threshold();
        let id = self.sensors[index].id;
        let from = self.sensors[index].position;
        let to = self.geometry.clamp_to_reach(from.offset(dx, dy));

        let old_neighbors: Vec<usize> = self.sensors[index].neighbors.iter().map(|&n| n as usize).collect();
        let new_neighbors = components::neighbors_within(self.sensors, to, threshold, Some(index));
        let mut affected: Vec<usize> = old_neighbors.iter().chain(&new_neighbors).copied().collect();
        affected.sort_unstable();
        affected.dedup();

        let mut saved = Vec::with_capacity(affected.len() + 1);
        saved.push(self.save(index));
        saved.extend(affected.iter().map(|&i| self.save(i)));

        self.ledger.begin_journal();
        self.ledger.uncover(from, id);

        for &neighbor in &old_neighbors {
            self.sensors[neighbor].unlink(id);
        }
        self.sensors[index].neighbors.clear();
        for &neighbor in &new_neighbors {
            let neighbor_id = self.sensors[neighbor].id;
            self.sensors[neighbor].link(id);
            self.sensors[index].link(neighbor_id);
        }
        self.sensors[index].position = to;

        for target in std::iter::once(index).chain(affected.iter().copied()) {
            let sensor = &mut self.sensors[target];
            let estimate = self.ledger.cover_and_priority(sensor.position, sensor.id, &self.oracle);
            sensor.priority = estimate.priority;
            sensor.cluster = estimate.cluster;
        }

        MoveProposal { index, from, to, saved }
    }

    pub(crate) fn accept_move(&mut self, _proposal: MoveProposal) {
        self.ledger.commit_journal();
    }

    /// Restores the area to its state before `propose_move`.
    pub(crate) fn reject_move(&mut self, proposal: MoveProposal) {
        self.ledger.rollback_journal();
        self.sensors[proposal.index].position = proposal.from;
        for saved in proposal.saved {
            let sensor = &mut self.sensors[saved.index];
            sensor.priority = saved.priority;
            sensor.cluster = saved.cluster;
            sensor.neighbors = saved.neighbors;
        }
    }
}

impl SensorArea {
    /// Refines the current deployment with simulated annealing.
    pub fn anneal(&mut self) -> Result<DeploymentReport> {
        if self.sensors().is_empty() {
            return Err(DeployError::NoSensors);
        }
        // Stored priorities may predate later coverage changes.
        self.refresh_priorities()?;
        let schedule = self.config().annealing.clone();
        let mut view = self.view()?;

        let threshold = view.geometry.adjacency_threshold();
        components::rebuild_adjacency(view.sensors, threshold);
        let mut current = components::mean_component_priority(view.sensors);
        let radius = view.geometry.radius() as f64;
        tracing::info!(
            sensors = view.sensors.len(),
            steps = schedule.step_budget(),
            mean_priority = current,
            "annealing started"
        );

        let mut temperature = schedule.initial_temperature;
        let mut step: u64 = 0;
        let mut cancelled = false;
        while temperature > schedule.final_temperature {
            if view.cancel.is_cancelled() {
                cancelled = true;
                break;
            }
            let index = view.rng.random_range(0..view.sensors.len());
            let amplitude = schedule.move_scale * temperature * radius;
            let dx = (amplitude * view.rng.random_range(-1.0..=1.0)).round() as i32;
            let dy = (amplitude * view.rng.random_range(-1.0..=1.0)).round() as i32;

            let proposal = view.propose_move(index, dx, dy);
            let candidate = components::mean_component_priority(view.sensors);
            let delta = candidate - current;
            let accepted = delta >= 0.0
                || (schedule.acceptance_magnification * delta / temperature).exp() > view.rng.random::<f64>();

            let (id, from, to) = (view.sensors[index].id, proposal.from, proposal.to);
            if accepted {
                current = candidate;
                view.accept_move(proposal);
            } else {
                view.reject_move(proposal);
            }

            view.notifier.notify(&DeploymentEvent::AnnealingStep {
                step,
                id,
                from,
                to,
                priority: view.sensors[index].priority,
                accepted,
                mean_priority: current,
                temperature,
            });
            temperature *= schedule.cooling_rate;
            step += 1;
        }

        tracing::info!(steps = step, mean_priority = current, "annealing finished");
        let report = view.finish(Strategy::Annealing, step, cancelled);
        self.check_clusters()?;
        Ok(report)
    }
}
