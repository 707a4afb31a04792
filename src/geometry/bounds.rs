use glam::Vec3;

/// Axis-aligned bounding box in scan coordinates (meters)
#[derive(Debug, Clone, Copy)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    /// An empty box that any real point will expand
    pub fn empty() -> Self {
        Self {
            min: Vec3::splat(f32::MAX),
            max: Vec3::splat(f32::MIN),
        }
    }

    /// Expand the box to include a point
    pub fn include(&mut self, point: Vec3) {
        self.min = self.min.min(point);
        self.max = self.max.max(point);
    }

    /// Grow the box around its center by a multiplier
    ///
    /// The importer inflates the scan bounds so voxel grids built over them
    /// have slack around boundary points.
    pub fn inflated(&self, factor: f32) -> Self {
        let center = (self.min + self.max) / 2.0;
        Self {
            min: center + (self.min - center) * factor,
            max: center + (self.max - center) * factor,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.min.x <= self.max.x && self.min.y <= self.max.y && self.min.z <= self.max.z
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_include_and_validity() {
        let mut bounds = Aabb::empty();
        assert!(!bounds.is_valid());

        bounds.include(Vec3::new(-1.0, 0.0, 2.0));
        bounds.include(Vec3::new(3.0, 4.0, -2.0));
        assert!(bounds.is_valid());
        assert_eq!(bounds.min, Vec3::new(-1.0, 0.0, -2.0));
        assert_eq!(bounds.max, Vec3::new(3.0, 4.0, 2.0));
    }

    #[test]
    fn test_inflated_keeps_center() {
        let mut bounds = Aabb::empty();
        bounds.include(Vec3::ZERO);
        bounds.include(Vec3::new(2.0, 2.0, 2.0));

        let grown = bounds.inflated(1.25);
        assert!(grown.min.distance(Vec3::splat(-0.25)) < 1e-6);
        assert!(grown.max.distance(Vec3::splat(2.25)) < 1e-6);
    }
}
