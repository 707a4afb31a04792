use glam::Vec3;
use serde::Deserialize;
use std::collections::HashSet;
use thiserror::Error;

use crate::domain::{BranchHandle, PointCloud, PointHandle};
use crate::geometry::VoxelGrid;

/// Hard cap on scatter links; past this the scan is considered degenerate
const MAX_SCATTER_CONNECTIONS: usize = 1_000_000;

/// Tuning for the connectivity pass that links scatter points and branch
/// endpoints into one traversable graph
///
/// Distances are meters in rebased scan space, angles in degrees.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConnectivityGraphSettings {
    /// Max length of a scatter-to-scatter link
    pub scatter_points_connection_max_length: f32,
    /// Max length of a scatter-to-branch-end link
    pub scatter_point_branch_connection_max_length: f32,
    /// Initial radius of the branch-end-to-branch-end search
    pub edge_length: f32,
    /// Radius increment per unsuccessful search round
    pub edge_extend_step: f32,
    /// Max number of search rounds per branch end
    pub max_timeout: u32,
    /// Reject candidates outside this angle from the branch axis
    pub absolute_angle_limit: f32,
    /// Candidates within this fraction of the branch length skip the
    /// force-connection angle check
    pub force_connection_ratio: f32,
    /// Looser angle limit applied beyond the force-connection distance
    pub force_connection_angle_limit: f32,
    /// Fraction trimmed off both curve ends before endpoint searches
    pub branch_shortening: f32,
}

impl Default for ConnectivityGraphSettings {
    fn default() -> Self {
        Self {
            scatter_points_connection_max_length: 0.05,
            scatter_point_branch_connection_max_length: 0.1,
            edge_length: 0.1,
            edge_extend_step: 0.05,
            max_timeout: 60,
            absolute_angle_limit: 60.0,
            force_connection_ratio: 0.0,
            force_connection_angle_limit: 135.0,
            branch_shortening: 0.15,
        }
    }
}

#[derive(Debug, Error)]
pub enum GraphError {
    #[error("too many scatter point connections (over {MAX_SCATTER_CONNECTIONS}); scan looks degenerate")]
    TooManyConnections,
}

/// Link counts for reporting
#[derive(Debug, Default, Clone, Copy)]
pub struct GraphSummary {
    pub scatter_links: usize,
    pub branch_candidate_links: usize,
    pub parent_links: usize,
}

#[derive(Debug, Clone, Copy)]
struct BranchEnd {
    handle: BranchHandle,
    is_start: bool,
}

fn angle_cos(degrees: f32) -> f32 {
    degrees.to_radians().cos()
}

/// Establish the connectivity graph over an imported scan
///
/// Fills in scatter neighborhoods, branch endpoint neighborhoods and, via
/// direct search plus flood fill through scatter points, the candidate
/// parent set of every branch. Finishes by picking each branch's parent as
/// the candidate whose end lies closest to the branch start.
pub fn establish_connectivity_graph(
    cloud: &mut PointCloud,
    settings: &ConnectivityGraphSettings,
) -> Result<GraphSummary, GraphError> {
    let mut summary = GraphSummary::default();
    let cell_size = 2.0 * settings.edge_length;

    let mut point_grid: VoxelGrid<PointHandle> = VoxelGrid::new(cell_size, &cloud.bounds);
    let mut branch_grid: VoxelGrid<BranchEnd> = VoxelGrid::new(cell_size, &cloud.bounds);

    for point in &mut cloud.allocated_points {
        point.branch = None;
        point.node = None;
        point.skeleton_index = None;
    }
    for point in &mut cloud.scattered_points {
        point.neighbors.clear();
        point.neighbor_branch_ends.clear();
        point_grid.push(point.position, point.handle);
    }
    for branch in &mut cloud.branches {
        branch.start_neighbors.clear();
        branch.neighbor_branch_ends.clear();
        branch.parent = None;
        branch.children.clear();

        let shortened_p0 = branch.curve.point(settings.branch_shortening);
        let shortened_p3 = branch.curve.point(1.0 - settings.branch_shortening);
        branch_grid.push(
            shortened_p0,
            BranchEnd {
                handle: branch.handle,
                is_start: true,
            },
        );
        branch_grid.push(
            shortened_p3,
            BranchEnd {
                handle: branch.handle,
                is_start: false,
            },
        );
    }

    // Scatter-to-scatter neighborhoods.
    for index in 0..cloud.scattered_points.len() {
        if summary.scatter_links > MAX_SCATTER_CONNECTIONS {
            return Err(GraphError::TooManyConnections);
        }
        let point = &cloud.scattered_points[index];
        let mut new_neighbors = Vec::new();
        point_grid.for_each_in_radius(
            point.position,
            settings.scatter_points_connection_max_length,
            |_, &other| {
                if other == point.handle
                    || point.neighbors.contains(&other)
                    || new_neighbors.contains(&other)
                {
                    return;
                }
                new_neighbors.push(other);
            },
        );
        for other in new_neighbors {
            cloud.scattered_points[index].neighbors.push(other);
            cloud.scattered_points[other].neighbors.push(index);
            summary.scatter_links += 1;
        }
    }

    let absolute_limit = angle_cos(settings.absolute_angle_limit);
    let force_limit = angle_cos(settings.force_connection_angle_limit);

    // Branch endpoint neighborhoods and direct branch-to-branch candidates.
    for index in 0..cloud.branches.len() {
        let handle = cloud.branches[index].handle;
        let curve = cloud.branches[index].curve;
        let shortened_p0 = curve.point(settings.branch_shortening);
        let shortened_p3 = curve.point(1.0 - settings.branch_shortening);
        let branch_length = shortened_p0.distance(shortened_p3);

        // Scatter points near the branch start.
        let mut start_neighbors = Vec::new();
        point_grid.for_each_in_radius(
            shortened_p0,
            settings.scatter_point_branch_connection_max_length,
            |_, &point| {
                if !cloud.branches[index].start_neighbors.contains(&point)
                    && !start_neighbors.contains(&point)
                {
                    start_neighbors.push(point);
                }
            },
        );
        cloud.branches[index].start_neighbors.extend(start_neighbors);

        // Register this branch on scatter points near its end.
        let mut end_neighbors = Vec::new();
        point_grid.for_each_in_radius(
            shortened_p3,
            settings.scatter_point_branch_connection_max_length,
            |_, &point| {
                if !cloud.scattered_points[point].neighbor_branch_ends.contains(&handle) {
                    end_neighbors.push(point);
                }
            },
        );
        for point in end_neighbors {
            cloud.scattered_points[point].neighbor_branch_ends.push(handle);
        }

        // Search upward from the branch start for candidate parent ends,
        // widening the radius until something passes the angle gate.
        let backward = (shortened_p0 - shortened_p3).normalize_or(-Vec3::Y);
        let mut radius = settings.edge_length;
        let mut found = false;
        let mut timeout = 0;
        while !found && timeout < settings.max_timeout {
            let mut candidates = Vec::new();
            branch_grid.for_each_in_radius(shortened_p0, radius, |position, end| {
                if end.is_start || end.handle == handle {
                    return;
                }
                let towards = (position - shortened_p0).normalize_or(Vec3::ZERO);
                let alignment = towards.dot(backward);
                if alignment < absolute_limit {
                    return;
                }
                if position.distance(shortened_p0) > settings.force_connection_ratio * branch_length
                    && alignment < force_limit
                {
                    return;
                }
                if cloud.branches[index].neighbor_branch_ends.contains(&end.handle)
                    || candidates.contains(&end.handle)
                {
                    return;
                }
                candidates.push(end.handle);
            });
            if !candidates.is_empty() {
                found = true;
                summary.branch_candidate_links += candidates.len();
                cloud.branches[index].neighbor_branch_ends.extend(candidates);
            }
            radius += settings.edge_extend_step;
            timeout += 1;
        }

        // Mirror search from the branch end for candidate child starts.
        let forward = (shortened_p3 - shortened_p0).normalize_or(Vec3::Y);
        let mut radius = settings.edge_length;
        let mut found = false;
        let mut timeout = 0;
        while !found && timeout < settings.max_timeout {
            let mut candidates = Vec::new();
            branch_grid.for_each_in_radius(shortened_p3, radius, |position, end| {
                if !end.is_start || end.handle == handle {
                    return;
                }
                let towards = (position - shortened_p3).normalize_or(Vec3::ZERO);
                let alignment = towards.dot(forward);
                if alignment < absolute_limit {
                    return;
                }
                if position.distance(shortened_p3) > settings.force_connection_ratio * branch_length
                    && alignment < force_limit
                {
                    return;
                }
                if cloud.branches[end.handle].neighbor_branch_ends.contains(&handle)
                    || candidates.contains(&end.handle)
                {
                    return;
                }
                candidates.push(end.handle);
            });
            if !candidates.is_empty() {
                found = true;
                summary.branch_candidate_links += candidates.len();
                for child in candidates {
                    cloud.branches[child].neighbor_branch_ends.push(handle);
                }
            }
            radius += settings.edge_extend_step;
            timeout += 1;
        }
    }

    // Flood fill through scatter points: a branch can reach a parent end
    // indirectly through a chain of scatter links.
    for index in 0..cloud.branches.len() {
        let curve = cloud.branches[index].curve;
        let shortened_p0 = curve.point(settings.branch_shortening);
        let shortened_p3 = curve.point(1.0 - settings.branch_shortening);
        let backward = (shortened_p0 - shortened_p3).normalize_or(-Vec3::Y);

        let mut visited: HashSet<PointHandle> =
            cloud.branches[index].start_neighbors.iter().copied().collect();
        let mut processing: Vec<PointHandle> = cloud.branches[index].start_neighbors.clone();
        let mut reached = Vec::new();

        while let Some(current) = processing.pop() {
            let neighbors = cloud.scattered_points[current].neighbors.clone();
            for neighbor in neighbors {
                if !visited.insert(neighbor) {
                    continue;
                }
                for &end in &cloud.scattered_points[neighbor].neighbor_branch_ends {
                    if end == cloud.branches[index].handle
                        || cloud.branches[index].neighbor_branch_ends.contains(&end)
                        || reached.contains(&end)
                    {
                        continue;
                    }
                    let other_end =
                        cloud.branches[end].curve.point(1.0 - settings.branch_shortening);
                    let towards = (other_end - shortened_p0).normalize_or(Vec3::ZERO);
                    if towards.dot(backward) < absolute_limit {
                        continue;
                    }
                    reached.push(end);
                }
                processing.push(neighbor);
            }
        }
        summary.branch_candidate_links += reached.len();
        cloud.branches[index].neighbor_branch_ends.extend(reached);
    }

    // Parent selection: closest candidate end to the branch start wins.
    for index in 0..cloud.branches.len() {
        let start = cloud.branches[index].curve.p0;
        let Some(best) = cloud.branches[index]
            .neighbor_branch_ends
            .iter()
            .copied()
            .min_by(|&a, &b| {
                let da = cloud.branches[a].curve.p3.distance(start);
                let db = cloud.branches[b].curve.p3.distance(start);
                da.total_cmp(&db)
            })
        else {
            continue;
        };

        let handle = cloud.branches[index].handle;
        cloud.branches[best].children.push(handle);
        cloud.branches[index].parent = Some(best);
        // Drop the reverse candidate so the parent cannot pick its child.
        cloud.branches[best].neighbor_branch_ends.retain(|&h| h != handle);
        summary.parent_links += 1;
    }

    Ok(summary)
}
