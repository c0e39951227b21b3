// THEORY:
// Sensors whose centres lie within one grid edge of each other can contend for
// pixels; the annealing optimizer uses this relation both to limit re-scoring to
// the sensors a move can affect and to measure how fragmented a deployment is.
//
// - `neighbors_within`: linear scan for every sensor close to a position.
// - `rebuild_adjacency`: fills each sensor's neighbor list from scratch.
// - `count_components`: breadth-first search over the neighbor lists, with a
//   visited vector indexed by sensor index. Each sensor and each edge is visited
//   once, so the count is O(V + E).

use super::geometry::Position;
use super::sensor::Sensor;
use std::collections::VecDeque;

/// Indices of sensors within `threshold` squared distance of `position`,
/// ascending, skipping `exclude`.
pub fn neighbors_within(
    sensors: &[Sensor],
    position: Position,
    threshold: i64,
    exclude: Option<usize>,
) -> Vec<usize> {
    sensors
        .iter()
        .enumerate()
        .filter(|(index, sensor)| {
            Some(*index) != exclude && sensor.position.distance_squared(position) <= threshold
        })
        .map(|(index, _)| index)
        .collect()
}

/// Recomputes every sensor's neighbor list. Sensor ids must equal their indices.
pub fn rebuild_adjacency(sensors: &mut [Sensor], threshold: i64) {
    for sensor in sensors.iter_mut() {
        sensor.neighbors.clear();
    }
    for i in 0..sensors.len() {
        for j in (i + 1)..sensors.len() {
            if sensors[i].position.distance_squared(sensors[j].position) <= threshold {
                let (id_i, id_j) = (sensors[i].id, sensors[j].id);
                sensors[i].neighbors.push(id_j);
                sensors[j].neighbors.push(id_i);
            }
        }
    }
    for sensor in sensors.iter_mut() {
        sensor.neighbors.sort_unstable();
    }
}

/// Number of connected components of the neighbor graph.
pub fn count_components(sensors: &[Sensor]) -> usize {
    let mut visited = vec![false; sensors.len()];
    let mut queue: VecDeque<usize> = VecDeque::new();
    let mut components = 0;

    for start in 0..sensors.len() {
        if visited[start] {
            continue;
        }
        components += 1;
        visited[start] = true;
        queue.push_back(start);

        while let Some(current) = queue.pop_front() {
            for &neighbor in &sensors[current].neighbors {
                let index = neighbor as usize;
                if index < sensors.len() && !visited[index] {
                    visited[index] = true;
                    queue.push_back(index);
                }
            }
        }
    }
    components
}

/// Total priority divided by the number of connected components, 0 when empty.
pub fn mean_component_priority(sensors: &[Sensor]) -> f64 {
    let components = count_components(sensors);
    if components == 0 {
        return 0.0;
    }
    let total: f64 = sensors.iter().map(|s| s.priority).sum();
    total / components as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_modules::sensor::SensorId;
    use approx::assert_relative_eq;

    fn sensors_at(points: &[(i32, i32)]) -> Vec<Sensor> {
        points
            .iter()
            .enumerate()
            .map(|(i, &(x, y))| Sensor::new(i as SensorId, Position::new(x, y)))
            .collect()
    }

    #[test]
    fn chains_and_islands() {
        // edge 4 -> threshold 16
        let mut sensors = sensors_at(&[(0, 0), (4, 0), (8, 0), (30, 30), (50, 50), (53, 50)]);
        rebuild_adjacency(&mut sensors, 16);
        assert_eq!(sensors[1].neighbors, vec![0, 2]);
        assert!(sensors[3].neighbors.is_empty());
        assert_eq!(count_components(&sensors), 3);
    }

    #[test]
    fn threshold_is_inclusive() {
        let sensors = sensors_at(&[(0, 0), (4, 0), (5, 0)]);
        let found = neighbors_within(&sensors, Position::new(0, 0), 16, Some(0));
        assert_eq!(found, vec![1]);
    }

    #[test]
    fn mean_priority_per_component() {
        let mut sensors = sensors_at(&[(0, 0), (2, 0), (40, 40)]);
        sensors[0].priority = 1.0;
        sensors[1].priority = 0.5;
        sensors[2].priority = 0.5;
        rebuild_adjacency(&mut sensors, 16);
        assert_relative_eq!(mean_component_priority(&sensors), 1.0);
        assert_eq!(mean_component_priority(&[]), 0.0);
    }
}
