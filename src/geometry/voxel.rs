use glam::Vec3;

use super::Aabb;

/// Uniform voxel grid used to accelerate radius queries over scan points
///
/// Entries keep their position alongside a payload so a query can do the
/// exact distance check after the coarse cell lookup.
#[derive(Debug)]
pub struct VoxelGrid<T> {
    cell_size: f32,
    min: Vec3,
    dims: [usize; 3],
    cells: Vec<Vec<(Vec3, T)>>,
}

impl<T> VoxelGrid<T> {
    /// Create a grid covering `bounds` with cubic cells of `cell_size`
    pub fn new(cell_size: f32, bounds: &Aabb) -> Self {
        let cell_size = cell_size.max(1e-4);
        let extent = (bounds.max - bounds.min).max(Vec3::splat(cell_size));
        let dims = [
            (extent.x / cell_size).ceil() as usize + 1,
            (extent.y / cell_size).ceil() as usize + 1,
            (extent.z / cell_size).ceil() as usize + 1,
        ];
        let cells = (0..dims[0] * dims[1] * dims[2]).map(|_| Vec::new()).collect();
        Self {
            cell_size,
            min: bounds.min,
            dims,
            cells,
        }
    }

    fn coords(&self, position: Vec3) -> [usize; 3] {
        let relative = (position - self.min) / self.cell_size;
        [
            (relative.x.max(0.0) as usize).min(self.dims[0] - 1),
            (relative.y.max(0.0) as usize).min(self.dims[1] - 1),
            (relative.z.max(0.0) as usize).min(self.dims[2] - 1),
        ]
    }

    fn index(&self, coords: [usize; 3]) -> usize {
        (coords[0] * self.dims[1] + coords[1]) * self.dims[2] + coords[2]
    }

    /// Insert an item at a position; positions outside the bounds clamp to
    /// the nearest boundary cell
    pub fn push(&mut self, position: Vec3, item: T) {
        let index = self.index(self.coords(position));
        self.cells[index].push((position, item));
    }

    /// Visit every entry within `radius` of `position`
    pub fn for_each_in_radius(&self, position: Vec3, radius: f32, mut visit: impl FnMut(Vec3, &T)) {
        let lo = self.coords(position - Vec3::splat(radius));
        let hi = self.coords(position + Vec3::splat(radius));
        for x in lo[0]..=hi[0] {
            for y in lo[1]..=hi[1] {
                for z in lo[2]..=hi[2] {
                    for (entry_position, item) in &self.cells[self.index([x, y, z])] {
                        if entry_position.distance(position) > radius {
                            continue;
                        }
                        visit(*entry_position, item);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_bounds() -> Aabb {
        let mut bounds = Aabb::empty();
        bounds.include(Vec3::ZERO);
        bounds.include(Vec3::splat(1.0));
        bounds
    }

    #[test]
    fn test_radius_query_filters_by_distance() {
        let mut grid = VoxelGrid::new(0.2, &unit_bounds());
        grid.push(Vec3::new(0.1, 0.1, 0.1), 0usize);
        grid.push(Vec3::new(0.9, 0.9, 0.9), 1usize);

        let mut found = Vec::new();
        grid.for_each_in_radius(Vec3::new(0.1, 0.1, 0.1), 0.2, |_, &item| found.push(item));
        assert_eq!(found, vec![0]);
    }

    #[test]
    fn test_out_of_bounds_positions_clamp() {
        let mut grid = VoxelGrid::new(0.2, &unit_bounds());
        grid.push(Vec3::splat(2.0), 7usize);

        let mut found = Vec::new();
        grid.for_each_in_radius(Vec3::splat(2.0), 0.1, |_, &item| found.push(item));
        assert_eq!(found, vec![7]);
    }

    #[test]
    fn test_neighbors_across_cells() {
        let mut grid = VoxelGrid::new(0.1, &unit_bounds());
        grid.push(Vec3::new(0.09, 0.5, 0.5), 0usize);
        grid.push(Vec3::new(0.11, 0.5, 0.5), 1usize);

        let mut count = 0;
        grid.for_each_in_radius(Vec3::new(0.1, 0.5, 0.5), 0.05, |_, _| count += 1);
        assert_eq!(count, 2);
    }
}
