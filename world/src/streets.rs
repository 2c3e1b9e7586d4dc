//! Orthogonal street grid used to snap points onto the road network.

use std::f32::consts::FRAC_PI_2;

use ambient_traffic_core::{StreetPoint, Vec3};

/// Manhattan street layout with roads every `block_length` units along both axes.
///
/// Roads run along `x = k * block_length` (northbound) and `y = k * block_length`
/// (eastbound). Points further than `extent` from the origin on either axis are
/// considered off the map and cannot be snapped.
#[derive(Clone, Debug)]
pub(crate) struct StreetGrid {
    block_length: f32,
    extent: f32,
}

impl StreetGrid {
    pub(crate) const fn new(block_length: f32, extent: f32) -> Self {
        Self {
            block_length,
            extent,
        }
    }

    /// Snaps the point onto the closest road, keeping its height.
    pub(crate) fn snap(&self, point: Vec3) -> Option<StreetPoint> {
        if self.block_length <= 0.0 {
            return None;
        }
        if point.x.abs() > self.extent || point.y.abs() > self.extent {
            return None;
        }

        let nearest_x = (point.x / self.block_length).round() * self.block_length;
        let nearest_y = (point.y / self.block_length).round() * self.block_length;

        if (point.x - nearest_x).abs() <= (point.y - nearest_y).abs() {
            Some(StreetPoint::new(
                Vec3::new(nearest_x, point.y, point.z),
                FRAC_PI_2,
            ))
        } else {
            Some(StreetPoint::new(Vec3::new(point.x, nearest_y, point.z), 0.0))
        }
    }

    pub(crate) const fn extent(&self) -> f32 {
        self.extent
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snaps_to_closest_vertical_road() {
        let grid = StreetGrid::new(100.0, 1_000.0);
        let snapped = grid.snap(Vec3::new(210.0, 150.0, 0.0)).expect("on map");

        assert_eq!(snapped.position, Vec3::new(200.0, 150.0, 0.0));
        assert!((snapped.heading - FRAC_PI_2).abs() < f32::EPSILON);
    }

    #[test]
    fn snaps_to_closest_horizontal_road() {
        let grid = StreetGrid::new(100.0, 1_000.0);
        let snapped = grid.snap(Vec3::new(150.0, 395.0, 2.0)).expect("on map");

        assert_eq!(snapped.position, Vec3::new(150.0, 400.0, 2.0));
        assert_eq!(snapped.heading, 0.0);
    }

    #[test]
    fn rejects_points_beyond_extent() {
        let grid = StreetGrid::new(100.0, 1_000.0);
        assert!(grid.snap(Vec3::new(1_500.0, 0.0, 0.0)).is_none());
    }
}
