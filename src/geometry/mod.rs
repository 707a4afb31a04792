pub mod bezier;
pub mod bounds;
pub mod voxel;

pub use bezier::BezierCurve;
pub use bounds::Aabb;
pub use voxel::VoxelGrid;
