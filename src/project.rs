use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// A headless reconstruction session bound to a project scratch directory
///
/// The original scanner toolchain keeps per-project state on disk; batch
/// conversions run against a throwaway project under the working
/// directory. Starting the session creates that directory if needed.
#[derive(Debug)]
pub struct Session {
    project_path: PathBuf,
}

impl Session {
    /// Start a session with no window or editor attached
    pub fn start_windowless(project_path: &Path) -> Result<Self> {
        std::fs::create_dir_all(project_path).with_context(|| {
            format!(
                "Failed to create project directory: {}",
                project_path.display()
            )
        })?;
        Ok(Self {
            project_path: project_path.to_path_buf(),
        })
    }

    /// Default project location: `Temp/treemesh.proj` under the cwd
    pub fn default_project_path() -> Result<PathBuf> {
        let cwd = std::env::current_dir().context("Failed to resolve current directory")?;
        Ok(cwd.join("Temp").join("treemesh.proj"))
    }

    pub fn project_path(&self) -> &Path {
        &self.project_path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_start_creates_project_directory() {
        let dir = tempdir().unwrap();
        let project = dir.path().join("Temp").join("treemesh.proj");

        let session = Session::start_windowless(&project).unwrap();
        assert!(project.is_dir());
        assert_eq!(session.project_path(), project);
    }

    #[test]
    fn test_start_is_idempotent() {
        let dir = tempdir().unwrap();
        let project = dir.path().join("proj");

        Session::start_windowless(&project).unwrap();
        Session::start_windowless(&project).unwrap();
        assert!(project.is_dir());
    }
}
