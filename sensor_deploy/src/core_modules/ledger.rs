// THEORY:
// The `CoverageLedger` is the engine's single source of truth about who sees what.
// It is a row-major matrix with one owner slot per pixel: `None` when no sensor
// covers the pixel, otherwise the id of the sensor that claimed it.
//
// Ownership rule: a pass by sensor `id` claims a pixel when the pixel is unowned,
// already owned by `id`, or owned by a larger id. The smallest id therefore always
// wins a contested pixel, whatever order sensors are covered in. Because the rule
// also accepts the sensor's own pixels, every pass is idempotent and a sensor that
// is re-scored in place sees its complete effective coverage.
//
// Passes:
// - `cover`: claim only.
// - `uncover`: release pixels owned by exactly this id; other owners are untouched.
// - `cover_and_priority`: the fused hot path. One sweep over the disk offsets both
//   claims pixels and feeds their colors to a `ColorAccumulator`, so placement
//   never has to scan a footprint twice.
// - `peek_priority`: read-only scoring over pixels nobody owns yet.
//
// Journal: while a journal is open, every write records the slot's previous owner.
// `rollback_journal` replays the records backwards and restores the matrix
// exactly; the annealing optimizer relies on this to undo a rejected move.

use super::geometry::{Geometry, Position};
use super::priority::{ColorAccumulator, PriorityEstimate, PriorityOracle};
use super::sensor::SensorId;
use std::sync::Arc;

/// Per-pixel ownership map of a deployment area.
#[derive(Debug, Clone)]
pub struct CoverageLedger {
    geometry: Arc<Geometry>,
    owners: Vec<Option<SensorId>>,
    journal: Option<Vec<(usize, Option<SensorId>)>>,
}

impl PartialEq for CoverageLedger {
    fn eq(&self, other: &Self) -> bool {
        self.owners == other.owners
    }
}

#[inline]
fn claims(current: Option<SensorId>, id: SensorId) -> bool {
    match current {
        None => true,
        Some(owner) => id <= owner,
    }
}

impl CoverageLedger {
    /// Creates an all-unowned ledger sized to the geometry.
    pub fn new(geometry: Arc<Geometry>) -> Self {
        let size = geometry.width() as usize * geometry.height() as usize;
        Self {
            geometry,
            owners: vec![None; size],
            journal: None,
        }
    }

    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    /// Owner of `(x, y)`; `None` when unowned or outside the area.
    pub fn owner(&self, x: i32, y: i32) -> Option<SensorId> {
        self.geometry.index_of(x, y).and_then(|i| self.owners[i])
    }

    /// Raw row-major owner slots.
    pub fn owners(&self) -> &[Option<SensorId>] {
        &self.owners
    }

    /// Number of pixels currently owned by `id`.
    pub fn owned_by(&self, id: SensorId) -> usize {
        self.owners.iter().filter(|o| **o == Some(id)).count()
    }

    /// Number of pixels owned by any sensor.
    pub fn covered_pixels(&self) -> usize {
        self.owners.iter().filter(|o| o.is_some()).count()
    }

    #[inline]
    fn write(&mut self, index: usize, owner: Option<SensorId>) {
        let previous = self.owners[index];
        if previous == owner {
            return;
        }
        if let Some(journal) = self.journal.as_mut() {
            journal.push((index, previous));
        }
        self.owners[index] = owner;
    }

    /// Claims every in-area disk pixel around `center` that `id` may own.
    pub fn cover(&mut self, center: Position, id: SensorId) {
        let geometry = Arc::clone(&self.geometry);
        for index in geometry.sensor_pixels(center) {
            if claims(self.owners[index], id) {
                self.write(index, Some(id));
            }
        }
    }

    /// Releases every disk pixel around `center` owned by exactly `id`.
    pub fn uncover(&mut self, center: Position, id: SensorId) {
        let geometry = Arc::clone(&self.geometry);
        for index in geometry.sensor_pixels(center) {
            if self.owners[index] == Some(id) {
                self.write(index, None);
            }
        }
    }

    /// Claims pixels like `cover` and scores the claimed pixels in the same sweep.
    pub fn cover_and_priority(
        &mut self,
        center: Position,
        id: SensorId,
        oracle: &PriorityOracle<'_>,
    ) -> PriorityEstimate {
        let geometry = Arc::clone(&self.geometry);
        let mut stats = ColorAccumulator::default();
        for index in geometry.sensor_pixels(center) {
            if claims(self.owners[index], id) {
                stats.add(oracle.pixel(index));
                self.write(index, Some(id));
            }
        }
        oracle.estimate(&stats)
    }

    /// Scores the currently unowned disk pixels around `center` without claiming them.
    pub fn peek_priority(&self, center: Position, oracle: &PriorityOracle<'_>) -> PriorityEstimate {
        let mut stats = ColorAccumulator::default();
        for index in self.geometry.sensor_pixels(center) {
            if self.owners[index].is_none() {
                stats.add(oracle.pixel(index));
            }
        }
        oracle.estimate(&stats)
    }

    /// Resets every pixel to unowned and discards any open journal.
    pub fn clear(&mut self) {
        self.owners.fill(None);
        self.journal = None;
    }

    /// Starts recording writes. An already open journal is discarded.
    pub fn begin_journal(&mut self) {
        self.journal = Some(Vec::new());
    }

    /// Stops recording and keeps every write made since `begin_journal`.
    pub fn commit_journal(&mut self) {
        self.journal = None;
    }

    /// Stops recording and restores every slot written since `begin_journal`.
    pub fn rollback_journal(&mut self) {
        if let Some(journal) = self.journal.take() {
            for (index, previous) in journal.into_iter().rev() {
                self.owners[index] = previous;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AreaConfig;

    fn ledger(width: u32, height: u32, radius: u32) -> CoverageLedger {
        let geometry = Geometry::new(&AreaConfig::new(width, height, radius, 1)).expect("valid");
        CoverageLedger::new(Arc::new(geometry))
    }

    fn assert_owned_by_placed(ledger: &CoverageLedger, placed: &[SensorId]) {
        for owner in ledger.owners().iter().flatten() {
            assert!(placed.contains(owner), "pixel owned by removed sensor {owner}");
        }
    }

    #[test]
    fn cover_is_idempotent() {
        let mut once = ledger(20, 20, 3);
        once.cover(Position::new(7, 9), 4);
        let mut twice = once.clone();
        twice.cover(Position::new(7, 9), 4);
        assert_eq!(once, twice);
        assert_eq!(once.owned_by(4), once.geometry().sensor_offsets().len());
    }

    #[test]
    fn smaller_id_wins_in_either_order() {
        let a = Position::new(8, 8);
        let b = Position::new(10, 8);
        let mut forward = ledger(20, 20, 3);
        forward.cover(a, 3);
        forward.cover(b, 7);
        let mut backward = ledger(20, 20, 3);
        backward.cover(b, 7);
        backward.cover(a, 3);
        assert_eq!(forward, backward);
        assert_eq!(forward.owner(9, 8), Some(3));
    }

    #[test]
    fn uncover_never_clobbers_other_owners() {
        let mut l = ledger(20, 20, 3);
        l.cover(Position::new(8, 8), 3);
        l.cover(Position::new(10, 8), 7);
        let owned_by_three = l.owned_by(3);
        l.uncover(Position::new(10, 8), 7);
        assert_eq!(l.owned_by(7), 0);
        assert_eq!(l.owned_by(3), owned_by_three);
        // Releasing with a stranger's id is a no-op.
        l.uncover(Position::new(8, 8), 9);
        assert_eq!(l.owned_by(3), owned_by_three);
    }

    #[test]
    fn owners_stay_within_the_active_set() {
        let mut l = ledger(30, 30, 4);
        let mut placed: Vec<SensorId> = Vec::new();
        let positions = [(5, 5), (9, 6), (12, 12), (2, 20), (28, 28), (10, 10)];
        for (id, (x, y)) in positions.iter().enumerate() {
            l.cover(Position::new(*x, *y), id as SensorId);
            placed.push(id as SensorId);
            assert_owned_by_placed(&l, &placed);
        }
        for remove in [1usize, 4, 0] {
            let (x, y) = positions[remove];
            l.uncover(Position::new(x, y), remove as SensorId);
            placed.retain(|id| *id != remove as SensorId);
            assert_owned_by_placed(&l, &placed);
        }
        l.clear();
        assert_eq!(l.covered_pixels(), 0);
    }

    #[test]
    fn rollback_restores_the_exact_matrix() {
        let mut l = ledger(20, 20, 3);
        l.cover(Position::new(5, 5), 0);
        l.cover(Position::new(9, 5), 2);
        let before = l.clone();
        l.begin_journal();
        l.uncover(Position::new(5, 5), 0);
        l.cover(Position::new(8, 6), 0);
        l.cover(Position::new(9, 5), 2);
        assert_ne!(l, before);
        l.rollback_journal();
        assert_eq!(l, before);
    }

    #[test]
    fn footprint_outside_area_touches_nothing() {
        let mut l = ledger(10, 10, 2);
        l.cover(Position::new(-10, -10), 0);
        assert_eq!(l.covered_pixels(), 0);
    }
}
