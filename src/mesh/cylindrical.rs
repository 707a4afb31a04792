use serde::Deserialize;

use super::Mesh;
use crate::skeleton::Skeleton;

/// Tuning for the cylindrical branch mesh generator
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TreeMeshGeneratorSettings {
    /// Generate branch geometry at all
    pub enable_branch: bool,
    /// Vertices per ring around a branch
    pub radial_segments: usize,
    /// Floor on the ring radius so twig tips stay printable
    pub min_ring_radius: f32,
    /// Fixed ring radius instead of the reconstructed thickness
    pub override_radius: Option<f32>,
}

impl Default for TreeMeshGeneratorSettings {
    fn default() -> Self {
        Self {
            enable_branch: true,
            radial_segments: 12,
            min_ring_radius: 0.0015,
            override_radius: None,
        }
    }
}

/// Generate the branch surface of one skeleton
///
/// Each node contributes a ring of vertices in the plane orthogonal to its
/// direction, oriented by the parallel-transported up vector so rings do
/// not twist along a branch. Adjacent rings are stitched with quads; the
/// root is capped with a fan and every tip closes into a cone at the end
/// of its internode.
pub fn generate_branch_mesh(skeleton: &Skeleton, settings: &TreeMeshGeneratorSettings) -> Mesh {
    let mut mesh = Mesh::new();
    if !settings.enable_branch || skeleton.is_empty() {
        return mesh;
    }

    let segments = settings.radial_segments.max(3);
    let mut ring_start = vec![0u32; skeleton.len()];

    for &handle in skeleton.sorted_handles() {
        let info = skeleton.node(handle).info;
        let radius = settings
            .override_radius
            .unwrap_or(info.thickness)
            .max(settings.min_ring_radius);

        let right = info.direction.cross(info.up);
        ring_start[handle] = mesh.vertex_count() as u32;
        for k in 0..segments {
            let theta = std::f32::consts::TAU * k as f32 / segments as f32;
            let offset = (info.up * theta.cos() + right * theta.sin()) * radius;
            mesh.push_vertex(info.global_position + offset);
        }

        if let Some(parent) = skeleton.node(handle).parent {
            let parent_ring = ring_start[parent];
            let ring = ring_start[handle];
            for k in 0..segments as u32 {
                let next = (k + 1) % segments as u32;
                mesh.push_quad(parent_ring + k, parent_ring + next, ring + next, ring + k);
            }
        }
    }

    // Root cap, facing away from the trunk.
    let root = skeleton.node(0);
    let root_center = mesh.push_vertex(root.info.global_position);
    for k in 0..segments as u32 {
        let next = (k + 1) % segments as u32;
        mesh.push_triangle(root_center, ring_start[0] + next, ring_start[0] + k);
    }

    // Tip cones at the far end of every leaf internode.
    for &handle in skeleton.sorted_handles() {
        let node = skeleton.node(handle);
        if !node.children.is_empty() {
            continue;
        }
        let tip = node.info.global_position + node.info.direction * node.info.length;
        let tip_center = mesh.push_vertex(tip);
        for k in 0..segments as u32 {
            let next = (k + 1) % segments as u32;
            mesh.push_triangle(tip_center, ring_start[handle] + k, ring_start[handle] + next);
        }
    }

    mesh
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::skeleton::NodeHandle;
    use glam::Vec3;

    fn vertical_skeleton(node_count: usize) -> Skeleton {
        let mut skeleton = Skeleton::new();
        let mut prev: NodeHandle = 0;
        for _ in 1..node_count {
            prev = skeleton.extend(prev);
        }
        skeleton.sort();
        for (i, &handle) in skeleton.sorted_handles().to_vec().iter().enumerate() {
            let node = skeleton.node_mut(handle);
            node.info.global_position = Vec3::new(0.0, i as f32 * 0.1, 0.0);
            node.info.direction = Vec3::Y;
            node.info.up = Vec3::Z;
            node.info.length = 0.1;
            node.info.thickness = 0.05;
        }
        skeleton
    }

    #[test]
    fn test_vertex_and_triangle_counts() {
        let skeleton = vertical_skeleton(3);
        let settings = TreeMeshGeneratorSettings {
            radial_segments: 8,
            ..Default::default()
        };
        let mesh = generate_branch_mesh(&skeleton, &settings);

        // 3 rings + root center + tip center.
        assert_eq!(mesh.vertex_count(), 3 * 8 + 2);
        // 2 stitched segments (16 tris each) + 2 fans (8 tris each).
        assert_eq!(mesh.triangle_count(), 2 * 16 + 2 * 8);
    }

    #[test]
    fn test_disabled_branch_mesh_is_empty() {
        let skeleton = vertical_skeleton(3);
        let settings = TreeMeshGeneratorSettings {
            enable_branch: false,
            ..Default::default()
        };
        assert!(generate_branch_mesh(&skeleton, &settings).is_empty());
    }

    #[test]
    fn test_ring_radius_floor() {
        let mut skeleton = vertical_skeleton(2);
        for &handle in skeleton.sorted_handles().to_vec().iter() {
            skeleton.node_mut(handle).info.thickness = 0.0;
        }
        let settings = TreeMeshGeneratorSettings::default();
        let mesh = generate_branch_mesh(&skeleton, &settings);

        let ring_vertex = mesh.positions[0];
        let center = Vec3::ZERO;
        assert!((ring_vertex.distance(center) - settings.min_ring_radius).abs() < 1e-6);
    }

    #[test]
    fn test_override_radius_wins() {
        let skeleton = vertical_skeleton(2);
        let settings = TreeMeshGeneratorSettings {
            override_radius: Some(0.2),
            ..Default::default()
        };
        let mesh = generate_branch_mesh(&skeleton, &settings);
        assert!((mesh.positions[0].distance(Vec3::ZERO) - 0.2).abs() < 1e-6);
    }
}
