use glam::Vec3;

use crate::geometry::{Aabb, BezierCurve};

pub type PointHandle = usize;
pub type BranchHandle = usize;
pub type TreePartHandle = usize;

/// A scan point that was not attributed to any branch
///
/// Scatter points carry no structure of their own; the connectivity pass
/// links them to each other and to nearby branch endpoints so gaps between
/// scanned branches can be bridged through them.
#[derive(Debug, Clone, Default)]
pub struct ScatteredPoint {
    pub handle: PointHandle,
    pub position: Vec3,
    pub neighbors: Vec<PointHandle>,
    /// Branch ends reachable from this point within the search radius
    pub neighbor_branch_ends: Vec<BranchHandle>,
}

/// A scan point attributed to a tree part, later bound to a skeleton node
#[derive(Debug, Clone)]
pub struct AllocatedPoint {
    pub handle: PointHandle,
    pub position: Vec3,
    pub tree_part: TreePartHandle,
    pub branch: Option<BranchHandle>,
    pub node: Option<crate::skeleton::NodeHandle>,
    pub skeleton_index: Option<usize>,
}

/// A branch segment recovered by the scanner, stored as a cubic Bezier
#[derive(Debug, Clone)]
pub struct ScannedBranch {
    pub handle: BranchHandle,
    pub tree_part: TreePartHandle,
    pub curve: BezierCurve,
    pub start_thickness: f32,
    pub end_thickness: f32,
    /// Scatter points near the (shortened) branch start
    pub start_neighbors: Vec<PointHandle>,
    /// Candidate parent branch ends discovered by the connectivity pass
    pub neighbor_branch_ends: Vec<BranchHandle>,
    pub parent: Option<BranchHandle>,
    pub children: Vec<BranchHandle>,
}

impl ScannedBranch {
    pub fn new(
        handle: BranchHandle,
        tree_part: TreePartHandle,
        curve: BezierCurve,
        start_thickness: f32,
        end_thickness: f32,
    ) -> Self {
        Self {
            handle,
            tree_part,
            curve,
            start_thickness,
            end_thickness,
            start_neighbors: Vec::new(),
            neighbor_branch_ends: Vec::new(),
            parent: None,
            children: Vec::new(),
        }
    }
}

/// A cluster of branches and points the scanner attributed to one region
#[derive(Debug, Clone, Default)]
pub struct TreePart {
    pub handle: TreePartHandle,
    pub allocated_points: Vec<PointHandle>,
    pub branches: Vec<BranchHandle>,
}

/// The imported scan: everything the YAML file describes, in meters,
/// rebased so the lowest branch endpoint sits at y = 0
#[derive(Debug)]
pub struct PointCloud {
    pub scattered_points: Vec<ScatteredPoint>,
    pub allocated_points: Vec<AllocatedPoint>,
    pub branches: Vec<ScannedBranch>,
    pub tree_parts: Vec<TreePart>,
    /// Scan AABB, inflated so boundary points get grid slack
    pub bounds: Aabb,
}
