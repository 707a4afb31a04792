use serde::Deserialize;
use std::path::PathBuf;

use crate::graph::ConnectivityGraphSettings;
use crate::mesh::TreeMeshGeneratorSettings;
use crate::skeleton::ReconstructionSettings;

fn default_scale() -> f32 {
    crate::scan::DEFAULT_IMPORT_SCALE
}
fn default_verbose() -> bool {
    false
}

/// Optional TOML configuration file
///
/// CLI arguments take precedence over everything here; the three settings
/// tables fall back to their reconstruction defaults when absent.
///
/// ```toml
/// scale = 0.1
/// output = "walnut.obj"
///
/// [graph]
/// edge_length = 0.15
///
/// [reconstruction]
/// internode_length = 0.05
///
/// [mesh]
/// radial_segments = 16
/// ```
#[derive(Debug, Deserialize, Default)]
pub struct FileConfig {
    #[serde(default)]
    pub input: Option<PathBuf>,
    #[serde(default)]
    pub output: Option<PathBuf>,
    #[serde(default)]
    pub project: Option<PathBuf>,
    #[serde(default = "default_scale")]
    pub scale: f32,
    #[serde(default = "default_verbose")]
    pub verbose: bool,
    #[serde(default)]
    pub graph: Option<ConnectivityGraphSettings>,
    #[serde(default)]
    pub reconstruction: Option<ReconstructionSettings>,
    #[serde(default)]
    pub mesh: Option<TreeMeshGeneratorSettings>,
}

impl FileConfig {
    /// Load the first parseable config file from the search paths
    pub fn load() -> Option<Self> {
        for path in get_config_paths() {
            if path.exists()
                && let Ok(contents) = std::fs::read_to_string(&path)
            {
                match toml::from_str(&contents) {
                    Ok(config) => return Some(config),
                    Err(e) => {
                        eprintln!("Warning: Failed to parse config file {:?}: {}", path, e);
                    }
                }
            }
        }
        None
    }
}

fn get_config_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();

    paths.push(PathBuf::from("treemesh.toml"));
    paths.push(PathBuf::from(".treemesh.toml"));

    if let Some(config_dir) = dirs::config_dir() {
        paths.push(config_dir.join("treemesh").join("config.toml"));
        paths.push(config_dir.join("treemesh.toml"));
    }

    if let Some(home) = dirs::home_dir() {
        paths.push(home.join(".treemesh.toml"));
        paths.push(home.join(".config").join("treemesh").join("config.toml"));
    }

    paths
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config: FileConfig = toml::from_str("").unwrap();
        assert_eq!(config.scale, 0.1);
        assert!(!config.verbose);
        assert!(config.graph.is_none());
    }

    #[test]
    fn test_partial_settings_table() {
        let config: FileConfig = toml::from_str(
            r#"
            output = "walnut.obj"

            [graph]
            edge_length = 0.2

            [mesh]
            radial_segments = 16
            "#,
        )
        .unwrap();

        assert_eq!(config.output, Some(PathBuf::from("walnut.obj")));
        let graph = config.graph.unwrap();
        assert_eq!(graph.edge_length, 0.2);
        // Untouched fields keep their defaults.
        assert_eq!(graph.max_timeout, 60);
        assert_eq!(config.mesh.unwrap().radial_segments, 16);
    }

    #[test]
    fn test_unknown_settings_key_is_rejected() {
        let result: Result<FileConfig, _> = toml::from_str(
            r#"
            [reconstruction]
            internode_lenght = 0.05
            "#,
        );
        assert!(result.is_err());
    }
}
