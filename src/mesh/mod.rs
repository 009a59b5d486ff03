//! Polygon mesh storage and topology tables.
//!
//! Base meshes are mostly quads and auxiliary meshes mix quads and triangles,
//! so [`PolyMesh`] keeps faces as plain vertex-index polygons. Connectivity
//! queries go through [`AdjacencyTables`], which are built once per topology.
//!
//! ```
//! use drape::mesh::PolyMesh;
//! use nalgebra::Point3;
//!
//! let positions = vec![
//!     Point3::new(0.0, 0.0, 0.0),
//!     Point3::new(1.0, 0.0, 0.0),
//!     Point3::new(1.0, 1.0, 0.0),
//!     Point3::new(0.0, 1.0, 0.0),
//! ];
//! let mesh = PolyMesh::new(positions, vec![vec![0, 1, 2, 3]]).unwrap();
//! let tables = mesh.adjacency();
//! assert_eq!(tables.vertex_faces(2), &[0]);
//! ```

mod adjacency;

pub use adjacency::AdjacencyTables;

use nalgebra::Point3;

use crate::error::{DrapeError, Result};

/// A mesh made of vertex positions and polygon faces.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PolyMesh {
    positions: Vec<Point3<f64>>,
    faces: Vec<Vec<usize>>,
}

impl PolyMesh {
    /// Create a mesh, checking that every face index is a valid vertex.
    pub fn new(positions: Vec<Point3<f64>>, faces: Vec<Vec<usize>>) -> Result<Self> {
        for face in &faces {
            if let Some(&bad) = face.iter().find(|&&v| v >= positions.len()) {
                return Err(DrapeError::IndexOutOfRange {
                    what: "face vertex",
                    index: bad,
                    count: positions.len(),
                });
            }
        }
        Ok(Self { positions, faces })
    }

    /// A point cloud with no faces.
    pub fn from_positions(positions: Vec<Point3<f64>>) -> Self {
        Self {
            positions,
            faces: Vec::new(),
        }
    }

    #[inline]
    pub fn num_vertices(&self) -> usize {
        self.positions.len()
    }

    #[inline]
    pub fn num_faces(&self) -> usize {
        self.faces.len()
    }

    pub fn positions(&self) -> &[Point3<f64>] {
        &self.positions
    }

    /// Mutable access to positions. Topology is unaffected.
    pub fn positions_mut(&mut self) -> &mut [Point3<f64>] {
        &mut self.positions
    }

    pub fn faces(&self) -> &[Vec<usize>] {
        &self.faces
    }

    /// Build vertex/face adjacency for this mesh.
    pub fn adjacency(&self) -> AdjacencyTables {
        AdjacencyTables::from_faces_unchecked(self.positions.len(), &self.faces, true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_bad_face_index() {
        let positions = vec![Point3::origin(); 3];
        let err = PolyMesh::new(positions, vec![vec![0, 1, 3]]).unwrap_err();
        assert!(matches!(
            err,
            DrapeError::IndexOutOfRange { index: 3, count: 3, .. }
        ));
    }
}
