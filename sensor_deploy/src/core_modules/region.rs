// THEORY:
// The `region` module partitions the area into square cells of edge 2R, the unit
// of clustering and of priority seeding. It plays the role a chunk grid plays in
// a frame analyzer: pixels are pooled per cell into a compact color signature
// (per-channel mean and standard deviation) that the clustering collaborator can
// work with.
//
// Lifecycle:
// 1.  **Layout** (`build_regions`): computed once from the `Geometry`. Cells are
//     numbered row-major; each remembers its centre and the fraction of a full
//     cell that actually lies inside the area (1.0 everywhere except the last
//     row/column when the area is not a multiple of the edge).
// 2.  **Statistics** (`Region::import_statistics`): refreshed when an image is
//     imported.
// 3.  **Classification**: cluster id and priority are written by the owning
//     `SensorArea` when clustering runs or a cluster weight changes.

use super::geometry::{Geometry, Position};
use super::pixel::pixel::Raster;
use super::priority::{ColorAccumulator, feature_vector};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Region {
    /// Row-major cell index.
    pub id: usize,
    pub center: Position,
    /// In-area fraction of the cell, 1.0 for interior cells.
    pub area_ratio: f64,
    pub cluster: Option<usize>,
    /// Cluster weight × area ratio; 0 until a weight is assigned.
    pub priority: f64,
    pub color_mean: [f64; 3],
    pub color_std_dev: [f64; 3],
}

impl Region {
    /// Clustering features: (mean ∥ standard deviation).
    pub fn features(&self) -> Vec<f64> {
        feature_vector(self.color_mean, self.color_std_dev)
    }

    /// Recomputes the color signature from the in-area pixels of the cell.
    pub fn import_statistics(&mut self, geometry: &Geometry, raster: &Raster) {
        let mut stats = ColorAccumulator::default();
        for index in geometry.region_pixels(self.center) {
            stats.add(raster.at(index));
        }
        if stats.count() > 0 {
            self.color_mean = stats.mean();
            self.color_std_dev = stats.population_std_dev();
        }
    }
}

/// Lays out every cell of the area with its centre and area ratio.
pub fn build_regions(geometry: &Geometry) -> Vec<Region> {
    let radius = geometry.radius();
    let edge = geometry.grid_edge();
    let width = geometry.width() as i32;
    let height = geometry.height() as i32;
    let columns = geometry.column_count();

    let mut regions = Vec::with_capacity(geometry.region_count());
    for row in 0..geometry.row_count() {
        for column in 0..columns {
            let id = (row * columns + column) as usize;
            let center = Position::new(column as i32 * edge + radius, row as i32 * edge + radius);

            let x_size = if center.x + radius <= width {
                edge
            } else {
                width - center.x + radius
            };
            let y_size = if center.y + radius <= height {
                edge
            } else {
                height - center.y + radius
            };
            let area_ratio = if x_size == edge && y_size == edge {
                1.0
            } else {
                (x_size * y_size) as f64 / (edge * edge) as f64
            };

            regions.push(Region {
                id,
                center,
                area_ratio,
                cluster: None,
                priority: 0.0,
                color_mean: [0.0; 3],
                color_std_dev: [0.0; 3],
            });
        }
    }
    regions
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AreaConfig;
    use approx::assert_relative_eq;
    use image::RgbaImage;

    fn geometry(width: u32, height: u32, radius: u32) -> Geometry {
        Geometry::new(&AreaConfig::new(width, height, radius, 1)).expect("valid")
    }

    #[test]
    fn interior_cells_are_whole() {
        let regions = build_regions(&geometry(8, 8, 1));
        assert_eq!(regions.len(), 16);
        assert!(regions.iter().all(|r| r.area_ratio == 1.0));
        assert_eq!(regions[5].center, Position::new(3, 3));
        assert_eq!(regions[5].id, 5);
    }

    #[test]
    fn boundary_cells_carry_fractional_area() {
        // edge 4: columns cover 0..4, 4..8, 8..12 (only 8..10 inside)
        let g = geometry(10, 6, 2);
        let regions = build_regions(&g);
        assert_eq!(regions.len(), 6);
        assert_relative_eq!(regions[0].area_ratio, 1.0);
        assert_relative_eq!(regions[2].area_ratio, 0.5);
        assert_relative_eq!(regions[3].area_ratio, 0.5);
        assert_relative_eq!(regions[5].area_ratio, 0.25);
        let in_area: f64 = regions.iter().map(|r| r.area_ratio * 16.0).sum();
        assert_relative_eq!(in_area, 60.0);
    }

    #[test]
    fn statistics_use_population_deviation() {
        let g = geometry(4, 2, 1);
        // left cell: two columns of 10 and 30; right cell: flat 200
        let image = RgbaImage::from_fn(4, 2, |x, _| match x {
            0 => image::Rgba([10, 0, 0, 255]),
            1 => image::Rgba([30, 0, 0, 255]),
            _ => image::Rgba([200, 200, 200, 255]),
        });
        let raster = Raster::from_source(&image);
        let mut regions = build_regions(&g);
        for region in &mut regions {
            region.import_statistics(&g, &raster);
        }
        assert_relative_eq!(regions[0].color_mean[0], 20.0);
        assert_relative_eq!(regions[0].color_std_dev[0], 10.0);
        assert_eq!(regions[1].features(), vec![200.0, 200.0, 200.0, 0.0, 0.0, 0.0]);
    }
}
