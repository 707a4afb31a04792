use glam::Vec3;
use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

use crate::domain::{AllocatedPoint, PointCloud, ScannedBranch, ScatteredPoint, TreePart};
use crate::geometry::{Aabb, BezierCurve};

/// Scale applied to every imported position and radius
///
/// Scanner output is in decimeters; the pipeline works in meters.
pub const DEFAULT_IMPORT_SCALE: f32 = 0.1;

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("failed to read scan file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse scan YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// On-disk YAML schema of a tree scan
///
/// ```yaml
/// Tree:
///   Scatter Points: [[x, y, z], ...]
///   Tree Parts:
///     - Branches:
///         - Start Pos: [x, y, z]
///           End Pos: [x, y, z]
///           Start Dir: [x, y, z]
///           End Dir: [x, y, z]
///           Start Radius: r
///           End Radius: r
///       Allocated Points: [[x, y, z], ...]
/// ```
#[derive(Debug, Deserialize)]
struct ScanFile {
    #[serde(rename = "Tree")]
    tree: TreeSection,
}

#[derive(Debug, Deserialize)]
struct TreeSection {
    #[serde(rename = "Scatter Points", default)]
    scatter_points: Vec<[f32; 3]>,
    #[serde(rename = "Tree Parts", default)]
    tree_parts: Vec<TreePartRecord>,
}

#[derive(Debug, Deserialize)]
struct TreePartRecord {
    #[serde(rename = "Branches", default)]
    branches: Vec<BranchRecord>,
    #[serde(rename = "Allocated Points", default)]
    allocated_points: Vec<[f32; 3]>,
}

#[derive(Debug, Deserialize)]
struct BranchRecord {
    #[serde(rename = "Start Pos")]
    start_pos: [f32; 3],
    #[serde(rename = "End Pos")]
    end_pos: [f32; 3],
    #[serde(rename = "Start Dir")]
    start_dir: [f32; 3],
    #[serde(rename = "End Dir")]
    end_dir: [f32; 3],
    #[serde(rename = "Start Radius")]
    start_radius: f32,
    #[serde(rename = "End Radius")]
    end_radius: f32,
}

fn vec3(raw: [f32; 3]) -> Vec3 {
    Vec3::from_array(raw)
}

/// Turn a branch record into a Bezier curve oriented bottom-up
///
/// Control points sit at 30% of the chord length along the recorded tangent
/// directions. Degenerate directions fall back to points interpolated along
/// the chord so no NaN ever enters the pipeline.
fn build_branch_curve(record: &BranchRecord, scale: f32) -> (BezierCurve, f32, f32) {
    let p0 = vec3(record.start_pos) * scale;
    let p3 = vec3(record.end_pos) * scale;
    let control_length = p0.distance(p3) * 0.3;

    let p1 = match vec3(record.start_dir).try_normalize() {
        Some(dir) => p0 + dir * control_length,
        None => p0.lerp(p3, 0.25),
    };
    let p2 = match vec3(record.end_dir).try_normalize() {
        Some(dir) => p3 - dir * control_length,
        None => p0.lerp(p3, 0.75),
    };

    let mut curve = BezierCurve::new(p0, p1, p2, p3);
    let mut start_thickness = record.start_radius * scale;
    let mut end_thickness = record.end_radius * scale;

    // Keep the lower endpoint as the start so growth runs upward.
    if curve.p0.y >= curve.p3.y {
        curve = BezierCurve::new(curve.p3, curve.p2, curve.p1, curve.p0);
        std::mem::swap(&mut start_thickness, &mut end_thickness);
    }

    (curve, start_thickness, end_thickness)
}

/// Import a YAML tree scan into the in-memory point cloud
///
/// Applies the import scale, rebases everything so the lowest branch
/// endpoint sits at y = 0, and computes the inflated scan bounds.
pub fn import_graph(path: &Path, scale: f32) -> Result<PointCloud, ScanError> {
    let contents = std::fs::read_to_string(path).map_err(|source| ScanError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let scan: ScanFile = serde_yaml::from_str(&contents)?;

    let mut scattered_points: Vec<ScatteredPoint> = scan
        .tree
        .scatter_points
        .iter()
        .enumerate()
        .map(|(handle, &raw)| ScatteredPoint {
            handle,
            position: vec3(raw) * scale,
            ..Default::default()
        })
        .collect();

    let mut branches = Vec::new();
    let mut allocated_points = Vec::new();
    let mut tree_parts = Vec::new();

    for record in &scan.tree.tree_parts {
        let part_handle = tree_parts.len();
        let mut part = TreePart {
            handle: part_handle,
            ..Default::default()
        };
        for branch_record in &record.branches {
            let (curve, start_thickness, end_thickness) =
                build_branch_curve(branch_record, scale);
            let handle = branches.len();
            part.branches.push(handle);
            branches.push(ScannedBranch::new(
                handle,
                part_handle,
                curve,
                start_thickness,
                end_thickness,
            ));
        }
        for &raw in &record.allocated_points {
            let handle = allocated_points.len();
            part.allocated_points.push(handle);
            allocated_points.push(AllocatedPoint {
                handle,
                position: vec3(raw) * scale,
                tree_part: part_handle,
                branch: None,
                node: None,
                skeleton_index: None,
            });
        }
        tree_parts.push(part);
    }

    let min_height = branches
        .iter()
        .flat_map(|branch| [branch.curve.p0.y, branch.curve.p3.y])
        .fold(f32::MAX, f32::min);
    let min_height = if branches.is_empty() { 0.0 } else { min_height };
    let rebase = Vec3::new(0.0, min_height, 0.0);

    let mut bounds = Aabb::empty();
    for point in &mut scattered_points {
        point.position -= rebase;
        bounds.include(point.position);
    }
    for point in &mut allocated_points {
        point.position -= rebase;
        bounds.include(point.position);
    }
    for branch in &mut branches {
        branch.curve.p0 -= rebase;
        branch.curve.p1 -= rebase;
        branch.curve.p2 -= rebase;
        branch.curve.p3 -= rebase;
        bounds.include(branch.curve.p0);
        bounds.include(branch.curve.p3);
    }

    Ok(PointCloud {
        scattered_points,
        allocated_points,
        branches,
        tree_parts,
        bounds: bounds.inflated(1.25),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const SAMPLE: &str = r#"
Tree:
  Scatter Points:
    - [0.1, 5.0, 0.0]
    - [0.0, 6.0, 0.2]
  Tree Parts:
    - Branches:
        - Start Pos: [0.0, 1.0, 0.0]
          End Pos: [0.0, 5.0, 0.0]
          Start Dir: [0.0, 1.0, 0.0]
          End Dir: [0.0, 1.0, 0.0]
          Start Radius: 0.5
          End Radius: 0.3
      Allocated Points:
        - [0.0, 3.0, 0.1]
"#;

    fn write_sample(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_import_scales_and_rebases() {
        let file = write_sample(SAMPLE);
        let cloud = import_graph(file.path(), 0.1).unwrap();

        assert_eq!(cloud.scattered_points.len(), 2);
        assert_eq!(cloud.branches.len(), 1);
        assert_eq!(cloud.allocated_points.len(), 1);

        // Lowest branch endpoint (1.0 * 0.1) becomes y = 0.
        let branch = &cloud.branches[0];
        assert!(branch.curve.p0.y.abs() < 1e-6);
        assert!((branch.curve.p3.y - 0.4).abs() < 1e-6);
        assert!((branch.start_thickness - 0.05).abs() < 1e-6);

        // Scatter points shift by the same rebase.
        assert!((cloud.scattered_points[0].position.y - 0.4).abs() < 1e-6);
    }

    #[test]
    fn test_import_flips_descending_branch() {
        let flipped = SAMPLE
            .replace("Start Pos: [0.0, 1.0, 0.0]", "Start Pos: [0.0, 5.0, 0.0]")
            .replace("End Pos: [0.0, 5.0, 0.0]", "End Pos: [0.0, 1.0, 0.0]");
        let file = write_sample(&flipped);
        let cloud = import_graph(file.path(), 0.1).unwrap();

        let branch = &cloud.branches[0];
        assert!(branch.curve.p0.y < branch.curve.p3.y);
        // Thickness swaps with the endpoints.
        assert!((branch.start_thickness - 0.03).abs() < 1e-6);
    }

    #[test]
    fn test_import_degenerate_direction_stays_finite() {
        let degenerate = SAMPLE.replace("Start Dir: [0.0, 1.0, 0.0]", "Start Dir: [0.0, 0.0, 0.0]");
        let file = write_sample(&degenerate);
        let cloud = import_graph(file.path(), 0.1).unwrap();

        let curve = &cloud.branches[0].curve;
        assert!(curve.p1.is_finite());
        assert!(curve.p2.is_finite());
    }

    #[test]
    fn test_import_missing_file_is_io_error() {
        let result = import_graph(Path::new("/nonexistent/scan.yml"), 0.1);
        assert!(matches!(result, Err(ScanError::Io { .. })));
    }
}
