// THEORY:
// A `Sensor` is a placed disk. Its id doubles as its rank in ownership
// resolution (smaller ids win contested pixels) and as its index in the owning
// `SensorArea`, since ids are handed out contiguously at placement time.
//
// The stored `priority` is a snapshot: it reflects the ledger at the moment the
// sensor was last scored. Anything that changes coverage afterwards makes it
// stale until `SensorArea::refresh_priorities` (or an optimizer step) re-scores it.

use super::geometry::Position;
use serde::Serialize;

pub type SensorId = u32;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Sensor {
    pub id: SensorId,
    pub position: Position,
    pub priority: f64,
    /// Cluster of the pixels the sensor claimed when last scored.
    pub cluster: Option<usize>,
    /// Ids of sensors within adjacency distance, sorted ascending. Maintained by
    /// the annealing optimizer; other strategies rebuild it when they finish.
    pub neighbors: Vec<SensorId>,
}

impl Sensor {
    pub fn new(id: SensorId, position: Position) -> Self {
        Self {
            id,
            position,
            priority: 0.0,
            cluster: None,
            neighbors: Vec::new(),
        }
    }

    /// Inserts `id` into the sorted neighbor list if missing.
    pub fn link(&mut self, id: SensorId) {
        if let Err(slot) = self.neighbors.binary_search(&id) {
            self.neighbors.insert(slot, id);
        }
    }

    /// Removes `id` from the neighbor list if present.
    pub fn unlink(&mut self, id: SensorId) {
        if let Ok(slot) = self.neighbors.binary_search(&id) {
            self.neighbors.remove(slot);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn neighbor_list_stays_sorted_and_unique() {
        let mut s = Sensor::new(0, Position::new(1, 1));
        for id in [5, 2, 9, 2, 5] {
            s.link(id);
        }
        assert_eq!(s.neighbors, vec![2, 5, 9]);
        s.unlink(5);
        s.unlink(7);
        assert_eq!(s.neighbors, vec![2, 9]);
    }
}
