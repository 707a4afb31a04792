use glam::{Vec2, Vec3};
use serde::Deserialize;
use std::collections::{HashSet, VecDeque};
use thiserror::Error;

use crate::domain::{BranchHandle, PointCloud};
use crate::geometry::BezierCurve;

pub type NodeHandle = usize;

/// Tuning for turning the connectivity graph into internode skeletons
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReconstructionSettings {
    /// Target length of one skeleton internode (meters); must be positive
    pub internode_length: f32,
    /// Branches starting at or below this height become tree roots
    pub min_height: f32,
    /// Root candidates closer than this in the ground plane merge
    pub max_tree_distance: f32,
    /// Fraction trimmed off both curve ends before chaining
    pub branch_shortening: f32,
    /// Apply `min_thickness` as a floor on node thickness
    pub override_thickness: bool,
    pub min_thickness: f32,
    /// Skeletons below this node count are dropped when several trees exist
    pub minimum_node_count: usize,
}

impl Default for ReconstructionSettings {
    fn default() -> Self {
        Self {
            internode_length: 0.03,
            min_height: 0.05,
            max_tree_distance: 0.01,
            branch_shortening: 0.3,
            override_thickness: true,
            min_thickness: 0.003,
            minimum_node_count: 20,
        }
    }
}

#[derive(Debug, Error)]
pub enum ReconstructError {
    #[error("internode length must be a positive number of meters, got {internode_length}")]
    InvalidInternodeLength { internode_length: f32 },
    #[error("no branch starts at or below {min_height} m; nothing to use as a tree root")]
    NoRoots { min_height: f32 },
}

/// Spatial state of one internode
#[derive(Debug, Clone, Copy)]
pub struct NodeInfo {
    pub global_position: Vec3,
    /// Unit direction of the internode segment
    pub direction: Vec3,
    /// Parallel-transported up vector, orthogonal to `direction`
    pub up: Vec3,
    pub length: f32,
    pub thickness: f32,
}

impl Default for NodeInfo {
    fn default() -> Self {
        Self {
            global_position: Vec3::ZERO,
            direction: Vec3::Y,
            up: Vec3::Z,
            length: 0.0,
            thickness: 0.0,
        }
    }
}

/// Reconstruction payload of one internode
#[derive(Debug, Clone, Default)]
pub struct NodeData {
    pub branch: Option<BranchHandle>,
    pub allocated_points: Vec<crate::domain::PointHandle>,
}

#[derive(Debug, Clone)]
pub struct SkeletonNode {
    pub handle: NodeHandle,
    pub parent: Option<NodeHandle>,
    pub children: Vec<NodeHandle>,
    pub info: NodeInfo,
    pub data: NodeData,
}

/// One reconstructed tree: internodes linked parent-to-children, rooted at
/// node 0
#[derive(Debug, Default)]
pub struct Skeleton {
    nodes: Vec<SkeletonNode>,
    sorted: Vec<NodeHandle>,
}

impl Skeleton {
    /// A skeleton starts with a single root node
    pub fn new() -> Self {
        let root = SkeletonNode {
            handle: 0,
            parent: None,
            children: Vec::new(),
            info: NodeInfo::default(),
            data: NodeData::default(),
        };
        Self {
            nodes: vec![root],
            sorted: Vec::new(),
        }
    }

    /// Append a child node under `parent` and return its handle
    pub fn extend(&mut self, parent: NodeHandle) -> NodeHandle {
        let handle = self.nodes.len();
        self.nodes.push(SkeletonNode {
            handle,
            parent: Some(parent),
            children: Vec::new(),
            info: NodeInfo::default(),
            data: NodeData::default(),
        });
        self.nodes[parent].children.push(handle);
        handle
    }

    pub fn node(&self, handle: NodeHandle) -> &SkeletonNode {
        &self.nodes[handle]
    }

    pub fn node_mut(&mut self, handle: NodeHandle) -> &mut SkeletonNode {
        &mut self.nodes[handle]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Recompute the breadth-first traversal order from the root
    pub fn sort(&mut self) {
        self.sorted.clear();
        let mut queue = VecDeque::from([0]);
        while let Some(handle) = queue.pop_front() {
            self.sorted.push(handle);
            queue.extend(self.nodes[handle].children.iter().copied());
        }
    }

    /// Root-first traversal order; valid after `sort`
    pub fn sorted_handles(&self) -> &[NodeHandle] {
        &self.sorted
    }
}

/// A scanned branch being stitched into a skeleton
///
/// Connection branches synthesized between a parent end and a child start
/// also take this form, which is why it is separate from `ScannedBranch`.
#[derive(Debug, Clone)]
struct OperatingBranch {
    handle: BranchHandle,
    curve: BezierCurve,
    start_thickness: f32,
    end_thickness: f32,
    parent: Option<BranchHandle>,
    children: Vec<BranchHandle>,
    skeleton_index: Option<usize>,
    chain_node_handles: Vec<NodeHandle>,
}

/// Write curve samples into the chain nodes of a branch
fn apply_curve(skeleton: &mut Skeleton, branch: &OperatingBranch) {
    let chain_len = branch.chain_node_handles.len();
    for (i, &handle) in branch.chain_node_handles.iter().enumerate() {
        let t = i as f32 / chain_len as f32;
        let t_next = (i + 1) as f32 / chain_len as f32;
        let position = branch.curve.point(t);
        let next = branch.curve.point(t_next);

        let node = skeleton.node_mut(handle);
        node.info.global_position = position;
        node.info.length = position.distance(next);
        node.info.direction = (next - position).normalize_or(Vec3::Y);
        node.info.thickness = branch.start_thickness
            + (branch.end_thickness - branch.start_thickness) * t;
        node.data.branch = Some(branch.handle);
    }
}

fn chain_node_count(curve_length: f32, internode_length: f32) -> usize {
    ((curve_length / internode_length) as usize).max(2)
}

/// Build reconstruction skeletons from a connected point cloud
///
/// Consumes the parent/child edges left by the connectivity pass: picks the
/// root branches, grows one skeleton per root breadth-first, orients and
/// thickens the nodes, then binds each allocated point to its nearest node.
pub fn build_tree_structure(
    cloud: &mut PointCloud,
    settings: &ReconstructionSettings,
) -> Result<Vec<Skeleton>, ReconstructError> {
    // A non-positive internode length would make every chain unbounded.
    if !settings.internode_length.is_finite() || settings.internode_length <= 0.0 {
        return Err(ReconstructError::InvalidInternodeLength {
            internode_length: settings.internode_length,
        });
    }

    let mut operating: Vec<OperatingBranch> = cloud
        .branches
        .iter()
        .map(|branch| OperatingBranch {
            handle: branch.handle,
            curve: branch.curve,
            start_thickness: branch.start_thickness,
            end_thickness: branch.end_thickness,
            parent: branch.parent,
            children: branch.children.clone(),
            skeleton_index: None,
            chain_node_handles: Vec::new(),
        })
        .collect();

    // Shorten every curve and collect root candidates. Roots that start
    // within `max_tree_distance` of each other in the ground plane merge,
    // keeping the lower start.
    let mut root_handles: Vec<BranchHandle> = Vec::new();
    for index in 0..operating.len() {
        let original = operating[index].curve;
        let start = original.p0;
        let shortened_p0 = original.point(settings.branch_shortening);
        let shortened_p3 = original.point(1.0 - settings.branch_shortening);
        let shortened_length = shortened_p0.distance(shortened_p3);

        let mut p0 = shortened_p0;
        if start.y <= settings.min_height {
            let mut add = true;
            for root in root_handles.iter_mut() {
                let root_start = operating[*root].curve.p0;
                let planar = Vec2::new(root_start.x, root_start.z)
                    .distance(Vec2::new(start.x, start.z));
                if planar < settings.max_tree_distance {
                    add = false;
                    if root_start.y > start.y {
                        *root = operating[index].handle;
                        break;
                    }
                }
            }
            if add {
                root_handles.push(operating[index].handle);
            }
            p0 = start;
        }
        let p1 = shortened_p0
            + original.axis(settings.branch_shortening) * shortened_length * 0.25;
        let p2 = shortened_p3
            - original.axis(1.0 - settings.branch_shortening) * shortened_length * 0.25;
        operating[index].curve = BezierCurve::new(p0, p1, p2, shortened_p3);
    }

    if root_handles.is_empty() {
        return Err(ReconstructError::NoRoots {
            min_height: settings.min_height,
        });
    }

    let mut skeletons = Vec::new();
    let mut visited: HashSet<BranchHandle> = root_handles.iter().copied().collect();

    for &root_handle in &root_handles {
        let skeleton_index = skeletons.len();
        let mut skeleton = Skeleton::new();
        let mut queue = VecDeque::from([root_handle]);

        while let Some(processing) = queue.pop_front() {
            for &child in &operating[processing].children.clone() {
                if visited.insert(child) {
                    queue.push_back(child);
                }
            }

            let mut prev_node;
            if processing == root_handle {
                prev_node = 0;
                operating[processing].chain_node_handles.push(0);
            } else {
                // Bridge the gap from the parent's end to this branch's
                // start with a synthesized connection branch.
                let parent_handle = operating[processing]
                    .parent
                    .expect("non-root branch reached without a parent");
                let connection_handle = operating.len();

                let p0 = operating[parent_handle].curve.p3;
                let p3 = operating[processing].curve.p0;
                let mut connection = OperatingBranch {
                    handle: connection_handle,
                    curve: BezierCurve::new(p0, p0.lerp(p3, 0.25), p0.lerp(p3, 0.75), p3),
                    start_thickness: operating[parent_handle].end_thickness,
                    end_thickness: operating[processing].start_thickness,
                    parent: Some(parent_handle),
                    children: vec![processing],
                    skeleton_index: Some(skeleton_index),
                    chain_node_handles: Vec::new(),
                };
                operating[processing].parent = Some(connection_handle);
                for child in operating[parent_handle].children.iter_mut() {
                    if *child == processing {
                        *child = connection_handle;
                        break;
                    }
                }

                prev_node = *operating[parent_handle]
                    .chain_node_handles
                    .last()
                    .expect("parent branch processed before its children");
                let connection_count =
                    chain_node_count(connection.curve.length(), settings.internode_length);
                for _ in 0..connection_count {
                    prev_node = skeleton.extend(prev_node);
                    connection.chain_node_handles.push(prev_node);
                }
                apply_curve(&mut skeleton, &connection);
                operating.push(connection);

                prev_node = skeleton.extend(prev_node);
                operating[processing].chain_node_handles.push(prev_node);
            }

            operating[processing].skeleton_index = Some(skeleton_index);
            let count = chain_node_count(
                operating[processing].curve.length(),
                settings.internode_length,
            );
            for _ in 1..count {
                prev_node = skeleton.extend(prev_node);
                operating[processing].chain_node_handles.push(prev_node);
            }
            let branch = operating[processing].clone();
            apply_curve(&mut skeleton, &branch);
        }

        skeleton.sort();
        orient_nodes(&mut skeleton);
        propagate_thickness(&mut skeleton, settings);
        skeletons.push(skeleton);
    }

    // Small fragments are noise when a real tree was also found.
    let mut index_map: Vec<Option<usize>> = Vec::with_capacity(skeletons.len());
    if skeletons.len() > 1 {
        let mut kept = Vec::new();
        for skeleton in skeletons {
            if skeleton.len() >= settings.minimum_node_count {
                index_map.push(Some(kept.len()));
                kept.push(skeleton);
            } else {
                index_map.push(None);
            }
        }
        skeletons = kept;
    } else {
        index_map.push(Some(0));
    }
    for branch in operating.iter_mut() {
        branch.skeleton_index = branch
            .skeleton_index
            .and_then(|old| index_map.get(old).copied().flatten());
    }

    allocate_points(cloud, &operating, &mut skeletons);

    Ok(skeletons)
}

/// Orient every node: the root looks along its own direction, every other
/// node parallel-transports its parent's up vector so ring frames do not
/// twist along a branch
fn orient_nodes(skeleton: &mut Skeleton) {
    let handles: Vec<NodeHandle> = skeleton.sorted_handles().to_vec();
    for handle in handles {
        let (direction, parent_up) = {
            let node = skeleton.node(handle);
            let parent_up = match node.parent {
                Some(parent) => skeleton.node(parent).info.up,
                None => Vec3::NEG_Z,
            };
            (node.info.direction, parent_up)
        };
        let regulated = direction.cross(parent_up).cross(direction);
        let up = match regulated.try_normalize() {
            Some(up) => up,
            None => direction.any_orthonormal_vector(),
        };
        skeleton.node_mut(handle).info.up = up;
    }
}

/// Back-propagate thickness so a parent is never thinner than its children,
/// then apply the configured floor
fn propagate_thickness(skeleton: &mut Skeleton, settings: &ReconstructionSettings) {
    let handles: Vec<NodeHandle> = skeleton.sorted_handles().to_vec();
    for &handle in handles.iter().rev() {
        let max_child = skeleton.node(handle).children.iter().fold(0.0f32, |acc, &child| {
            acc.max(skeleton.node(child).info.thickness)
        });
        let node = skeleton.node_mut(handle);
        node.info.thickness = node.info.thickness.max(max_child);
        if settings.override_thickness {
            node.info.thickness = node.info.thickness.max(settings.min_thickness);
        }
    }
}

/// Bind each allocated point to the nearest chain node among its tree
/// part's branches
fn allocate_points(
    cloud: &mut PointCloud,
    operating: &[OperatingBranch],
    skeletons: &mut [Skeleton],
) {
    for point in &mut cloud.allocated_points {
        let part = &cloud.tree_parts[point.tree_part];
        let mut best: Option<(f32, NodeHandle, BranchHandle, usize)> = None;
        for &branch_handle in &part.branches {
            let branch = &operating[branch_handle];
            let Some(skeleton_index) = branch.skeleton_index else {
                continue;
            };
            for &node_handle in &branch.chain_node_handles {
                let node_position =
                    skeletons[skeleton_index].node(node_handle).info.global_position;
                let distance = node_position.distance(point.position);
                if best.is_none_or(|(best_distance, ..)| distance < best_distance) {
                    best = Some((distance, node_handle, branch_handle, skeleton_index));
                }
            }
        }
        if let Some((_, node_handle, branch_handle, skeleton_index)) = best {
            point.node = Some(node_handle);
            point.branch = Some(branch_handle);
            point.skeleton_index = Some(skeleton_index);
            skeletons[skeleton_index]
                .node_mut(node_handle)
                .data
                .allocated_points
                .push(point.handle);
        }
    }
}
