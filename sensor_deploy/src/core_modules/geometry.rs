// THEORY:
// `Geometry` is everything that can be derived from the radius and the area size
// alone, computed exactly once. The two offset lists are the workhorses of the
// engine: every cover, uncover and priority pass walks a precomputed list of
// (dx, dy) offsets instead of scanning a bounding box with a distance check.
//
// - Sensor footprint: the disk of radius R, sampled on the half-open square
//   [-R, R) x [-R, R) and kept where dx² + dy² <= R².
// - Region footprint: the full square cell [-R, R) x [-R, R), 4R² offsets. Its
//   length is the denominator of every coverage ratio, so a sensor can reach at
//   most roughly pi/4 of a cell's weight.

use crate::config::AreaConfig;
use crate::error::Result;
use serde::{Deserialize, Serialize};

/// An integer pixel position. May lie outside the area (annealing jitter can
/// push a sensor over the edge); footprint passes clip per offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

impl Position {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Returns the position moved by `(dx, dy)`.
    pub fn offset(self, dx: i32, dy: i32) -> Self {
        Self {
            x: self.x.saturating_add(dx),
            y: self.y.saturating_add(dy),
        }
    }

    /// Squared Euclidean distance, widened and saturating at `i64::MAX`.
    pub fn distance_squared(self, other: Position) -> i64 {
        let dx = self.x as i64 - other.x as i64;
        let dy = self.y as i64 - other.y as i64;
        dx.saturating_mul(dx).saturating_add(dy.saturating_mul(dy))
    }
}

/// Derived, read-only layout of a deployment area.
#[derive(Debug, Clone)]
pub struct Geometry {
    width: u32,
    height: u32,
    radius: i32,
    grid_edge: i32,
    row_count: u32,
    column_count: u32,
    sensor_offsets: Vec<(i32, i32)>,
    region_offsets: Vec<(i32, i32)>,
}

impl Geometry {
    /// Validates the configuration and derives the layout.
    pub fn new(config: &AreaConfig) -> Result<Self> {
        config.validate()?;
        let radius = config.radius as i32;
        let grid_edge = radius * 2;

        let mut sensor_offsets = Vec::new();
        let mut region_offsets = Vec::with_capacity((grid_edge * grid_edge) as usize);
        let radius_sq = (radius as i64) * (radius as i64);
        for dx in -radius..radius {
            for dy in -radius..radius {
                region_offsets.push((dx, dy));
                if (dx as i64) * (dx as i64) + (dy as i64) * (dy as i64) <= radius_sq {
                    sensor_offsets.push((dx, dy));
                }
            }
        }

        Ok(Self {
            width: config.width,
            height: config.height,
            radius,
            grid_edge,
            row_count: config.height.div_ceil(grid_edge as u32),
            column_count: config.width.div_ceil(grid_edge as u32),
            sensor_offsets,
            region_offsets,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn radius(&self) -> i32 {
        self.radius
    }

    /// Edge length of a region cell, `2 * radius`.
    pub fn grid_edge(&self) -> i32 {
        self.grid_edge
    }

    /// Squared adjacency threshold between two sensor centres.
    pub fn adjacency_threshold(&self) -> i64 {
        (self.grid_edge as i64) * (self.grid_edge as i64)
    }

    pub fn row_count(&self) -> u32 {
        self.row_count
    }

    pub fn column_count(&self) -> u32 {
        self.column_count
    }

    pub fn region_count(&self) -> usize {
        (self.row_count * self.column_count) as usize
    }

    pub fn sensor_offsets(&self) -> &[(i32, i32)] {
        &self.sensor_offsets
    }

    pub fn region_offsets(&self) -> &[(i32, i32)] {
        &self.region_offsets
    }

    /// Pixel count of a full region cell, the coverage ratio denominator.
    pub fn footprint_area(&self) -> usize {
        self.region_offsets.len()
    }

    /// Row-major pixel index of `(x, y)`, or `None` outside the area.
    #[inline]
    pub fn index_of(&self, x: i32, y: i32) -> Option<usize> {
        if x < 0 || y < 0 || x >= self.width as i32 || y >= self.height as i32 {
            return None;
        }
        Some(y as usize * self.width as usize + x as usize)
    }

    fn offset_index(&self, center: Position, (dx, dy): (i32, i32)) -> Option<usize> {
        self.index_of(center.x.checked_add(dx)?, center.y.checked_add(dy)?)
    }

    /// Row-major indices of the in-area pixels of a sensor disk at `center`.
    pub fn sensor_pixels(&self, center: Position) -> impl Iterator<Item = usize> + '_ {
        self.sensor_offsets
            .iter()
            .filter_map(move |&offset| self.offset_index(center, offset))
    }

    /// Row-major indices of the in-area pixels of a region cell at `center`.
    pub fn region_pixels(&self, center: Position) -> impl Iterator<Item = usize> + '_ {
        self.region_offsets
            .iter()
            .filter_map(move |&offset| self.offset_index(center, offset))
    }

    /// Clamps `position` into the area grown by one radius on every side, the
    /// furthest a sensor can sit and still reach a pixel.
    pub fn clamp_to_reach(&self, position: Position) -> Position {
        Position {
            x: position.x.clamp(-self.radius, self.width as i32 - 1 + self.radius),
            y: position.y.clamp(-self.radius, self.height as i32 - 1 + self.radius),
        }
    }

    /// Grid-line intersections from (0, 0) to (width, height), both inclusive,
    /// column by column.
    pub fn intersection_points(&self) -> Vec<Position> {
        let step = self.grid_edge as usize;
        let mut points = Vec::new();
        for x in (0..=self.width as i32).step_by(step) {
            for y in (0..=self.height as i32).step_by(step) {
                points.push(Position::new(x, y));
            }
        }
        points
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn geometry(width: u32, height: u32, radius: u32) -> Geometry {
        Geometry::new(&AreaConfig::new(width, height, radius, 1)).expect("valid geometry")
    }

    #[test]
    fn unit_radius_footprints() {
        let g = geometry(8, 8, 1);
        assert_eq!(g.grid_edge(), 2);
        assert_eq!(g.footprint_area(), 4);
        let mut disk = g.sensor_offsets().to_vec();
        disk.sort();
        assert_eq!(disk, vec![(-1, 0), (0, -1), (0, 0)]);
    }

    #[test]
    fn disk_is_inside_cell() {
        let g = geometry(100, 100, 6);
        assert_eq!(g.footprint_area(), 144);
        assert!(g.sensor_offsets().len() < g.footprint_area());
        assert!(
            g.sensor_offsets()
                .iter()
                .all(|o| g.region_offsets().contains(o))
        );
    }

    #[test]
    fn partial_rows_and_columns_round_up() {
        let g = geometry(10, 7, 2);
        assert_eq!(g.column_count(), 3);
        assert_eq!(g.row_count(), 2);
        assert_eq!(g.region_count(), 6);
    }

    #[test]
    fn footprints_clip_at_the_border() {
        let g = geometry(8, 8, 1);
        assert_eq!(g.sensor_pixels(Position::new(0, 0)).count(), 1);
        assert_eq!(g.sensor_pixels(Position::new(4, 4)).count(), 3);
        assert_eq!(g.sensor_pixels(Position::new(-5, 20)).count(), 0);
    }

    #[test]
    fn extreme_positions_do_not_overflow() {
        let g = geometry(8, 8, 1);
        let far = Position::new(i32::MAX, i32::MIN);
        assert_eq!(g.sensor_pixels(far).count(), 0);
        assert_eq!(g.region_pixels(Position::new(i32::MIN, i32::MAX)).count(), 0);
        assert_eq!(far.distance_squared(Position::new(i32::MIN, i32::MAX)), i64::MAX);
    }

    #[test]
    fn reach_clamp_keeps_the_border_band() {
        let g = geometry(8, 6, 2);
        assert_eq!(g.clamp_to_reach(Position::new(i32::MAX, i32::MIN)), Position::new(9, -2));
        assert_eq!(g.clamp_to_reach(Position::new(-100, 100)), Position::new(-2, 7));
        assert_eq!(g.clamp_to_reach(Position::new(3, 4)), Position::new(3, 4));
    }

    #[test]
    fn intersections_include_the_far_edges() {
        let g = geometry(8, 4, 1);
        let points = g.intersection_points();
        assert_eq!(points.len(), 5 * 3);
        assert!(points.contains(&Position::new(8, 4)));
    }
}
