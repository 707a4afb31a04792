//! treemesh - Reconstruct 3D tree meshes from scanned branch-graph YAML files

pub mod config;
pub mod domain;
pub mod geometry;
pub mod graph;
pub mod mesh;
pub mod project;
pub mod scan;
pub mod skeleton;

use anyhow::{Context, Result, bail};
use std::path::Path;

use graph::{ConnectivityGraphSettings, GraphSummary};
use mesh::TreeMeshGeneratorSettings;
use skeleton::ReconstructionSettings;

/// Counters from one conversion run
#[derive(Debug, Clone, Copy)]
pub struct ConversionReport {
    pub scatter_points: usize,
    pub branches: usize,
    pub graph: GraphSummary,
    pub skeletons: usize,
    pub vertices: usize,
    pub triangles: usize,
}

/// Convert a YAML tree scan into a Wavefront OBJ mesh file
///
/// Runs the full pipeline: import, connectivity graph, skeleton building,
/// cylindrical mesh generation, OBJ output. The output file is only created
/// once reconstruction has succeeded, and replaces any previous file at
/// `mesh_path`.
pub fn yaml_to_mesh(
    yaml_path: &Path,
    graph_settings: &ConnectivityGraphSettings,
    reconstruction_settings: &ReconstructionSettings,
    mesh_settings: &TreeMeshGeneratorSettings,
    mesh_path: &Path,
) -> Result<ConversionReport> {
    let mut cloud = scan::import_graph(yaml_path, scan::DEFAULT_IMPORT_SCALE)
        .context("Failed to import tree scan")?;

    let summary = graph::establish_connectivity_graph(&mut cloud, graph_settings)
        .context("Failed to establish connectivity graph")?;

    let skeletons = skeleton::build_tree_structure(&mut cloud, reconstruction_settings)
        .context("Failed to build tree structure")?;

    let meshes: Vec<mesh::Mesh> = skeletons
        .iter()
        .map(|skeleton| mesh::generate_branch_mesh(skeleton, mesh_settings))
        .collect();
    if meshes.iter().all(|mesh| mesh.is_empty()) {
        bail!("Reconstruction produced no geometry");
    }

    mesh::write_obj(mesh_path, &meshes).context("Failed to write OBJ file")?;

    Ok(ConversionReport {
        scatter_points: cloud.scattered_points.len(),
        branches: cloud.branches.len(),
        graph: summary,
        skeletons: skeletons.len(),
        vertices: meshes.iter().map(|m| m.vertex_count()).sum(),
        triangles: meshes.iter().map(|m| m.triangle_count()).sum(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    const SAMPLE_SCAN: &str = r#"
Tree:
  Scatter Points:
    - [0.3, 4.5, 0.0]
    - [0.5, 5.0, 0.1]
  Tree Parts:
    - Branches:
        - Start Pos: [0.0, 0.0, 0.0]
          End Pos: [0.0, 4.0, 0.0]
          Start Dir: [0.0, 1.0, 0.0]
          End Dir: [0.0, 1.0, 0.0]
          Start Radius: 0.5
          End Radius: 0.3
        - Start Pos: [0.2, 4.2, 0.0]
          End Pos: [1.0, 8.0, 0.0]
          Start Dir: [0.2, 1.0, 0.0]
          End Dir: [0.2, 1.0, 0.0]
          Start Radius: 0.25
          End Radius: 0.1
      Allocated Points:
        - [0.1, 2.0, 0.0]
        - [0.4, 6.0, 0.0]
"#;

    fn convert(scan: &str, dir: &std::path::Path) -> (std::path::PathBuf, Result<ConversionReport>) {
        let yaml_path = dir.join("scan.yml");
        fs::write(&yaml_path, scan).unwrap();
        let mesh_path = dir.join("out.obj");
        let report = yaml_to_mesh(
            &yaml_path,
            &ConnectivityGraphSettings::default(),
            &ReconstructionSettings::default(),
            &TreeMeshGeneratorSettings::default(),
            &mesh_path,
        );
        (mesh_path, report)
    }

    #[test]
    fn test_valid_scan_produces_obj_at_given_path() {
        let dir = tempdir().unwrap();
        let (mesh_path, report) = convert(SAMPLE_SCAN, dir.path());
        let report = report.unwrap();

        assert!(mesh_path.exists());
        assert_eq!(report.skeletons, 1);
        assert_eq!(report.branches, 2);
        assert!(report.triangles > 0);

        let contents = fs::read_to_string(&mesh_path).unwrap();
        assert!(contents.contains("o tree_0"));
        assert!(contents.contains("\nv "));
        assert!(contents.contains("\nf "));
    }

    #[test]
    fn test_rerun_overwrites_previous_output() {
        let dir = tempdir().unwrap();
        let (mesh_path, first) = convert(SAMPLE_SCAN, dir.path());
        first.unwrap();
        let first_len = fs::metadata(&mesh_path).unwrap().len();

        let (_, second) = convert(SAMPLE_SCAN, dir.path());
        second.unwrap();
        assert_eq!(fs::metadata(&mesh_path).unwrap().len(), first_len);
    }

    #[test]
    fn test_missing_input_fails_before_output_exists() {
        let dir = tempdir().unwrap();
        let mesh_path = dir.path().join("out.obj");
        let result = yaml_to_mesh(
            &dir.path().join("nonexistent.yml"),
            &ConnectivityGraphSettings::default(),
            &ReconstructionSettings::default(),
            &TreeMeshGeneratorSettings::default(),
            &mesh_path,
        );

        assert!(result.is_err());
        assert!(!mesh_path.exists());
    }

    #[test]
    fn test_branchless_scan_reports_missing_root() {
        let scan = r#"
Tree:
  Tree Parts:
    - Branches: []
      Allocated Points: []
"#;
        let dir = tempdir().unwrap();
        let (mesh_path, result) = convert(scan, dir.path());
        assert!(result.is_err());
        assert!(!mesh_path.exists());
    }
}

