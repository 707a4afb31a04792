pub mod cylindrical;
pub mod obj;

pub use cylindrical::{TreeMeshGeneratorSettings, generate_branch_mesh};
pub use obj::write_obj;

use glam::Vec3;

/// An indexed triangle mesh
#[derive(Debug, Default, Clone)]
pub struct Mesh {
    pub positions: Vec<Vec3>,
    /// Counter-clockwise triangles indexing into `positions`
    pub triangles: Vec<[u32; 3]>,
}

impl Mesh {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a vertex and return its index
    pub fn push_vertex(&mut self, position: Vec3) -> u32 {
        self.positions.push(position);
        (self.positions.len() - 1) as u32
    }

    pub fn push_triangle(&mut self, a: u32, b: u32, c: u32) {
        self.triangles.push([a, b, c]);
    }

    /// Add a quad as two triangles, vertices in counter-clockwise order
    pub fn push_quad(&mut self, a: u32, b: u32, c: u32, d: u32) {
        self.push_triangle(a, b, c);
        self.push_triangle(a, c, d);
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.triangles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.triangles.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_quad_makes_two_triangles() {
        let mut mesh = Mesh::new();
        let a = mesh.push_vertex(Vec3::ZERO);
        let b = mesh.push_vertex(Vec3::X);
        let c = mesh.push_vertex(Vec3::new(1.0, 1.0, 0.0));
        let d = mesh.push_vertex(Vec3::Y);
        mesh.push_quad(a, b, c, d);

        assert_eq!(mesh.vertex_count(), 4);
        assert_eq!(mesh.triangle_count(), 2);
    }
}
