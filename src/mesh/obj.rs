use anyhow::{Context, Result};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use super::Mesh;

/// Write meshes to a Wavefront OBJ file, one named object per mesh
///
/// OBJ is plain text: `v x y z` vertex lines followed by `f a b c` face
/// lines with 1-based indices. Face indices are offset so all meshes share
/// one vertex namespace. An existing file at `path` is truncated.
pub fn write_obj(path: &Path, meshes: &[Mesh]) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("Failed to create OBJ file: {}", path.display()))?;
    let mut writer = BufWriter::new(file);

    writeln!(writer, "# treemesh reconstruction")?;

    let mut offset = 1usize;
    for (index, mesh) in meshes.iter().enumerate() {
        writeln!(writer, "o tree_{}", index)?;
        for position in &mesh.positions {
            writeln!(writer, "v {} {} {}", position.x, position.y, position.z)?;
        }
        for triangle in &mesh.triangles {
            writeln!(
                writer,
                "f {} {} {}",
                offset + triangle[0] as usize,
                offset + triangle[1] as usize,
                offset + triangle[2] as usize
            )?;
        }
        offset += mesh.positions.len();
    }

    writer.flush()?;
    Ok(())
}
