//! Vertex-to-face and face-to-vertex lookup tables.

use rayon::prelude::*;

use crate::error::{DrapeError, Result};

/// Precomputed connectivity for one mesh topology.
///
/// Both directions store sorted, duplicate-free index lists. Tables must be
/// rebuilt whenever the topology they describe changes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AdjacencyTables {
    vertex_to_faces: Vec<Vec<usize>>,
    face_to_vertices: Vec<Vec<usize>>,
}

impl AdjacencyTables {
    /// Build tables for `num_vertices` vertices and the given polygon faces.
    ///
    /// Returns an error if a face references a vertex `>= num_vertices`.
    pub fn from_faces(num_vertices: usize, faces: &[Vec<usize>]) -> Result<Self> {
        for face in faces {
            if let Some(&bad) = face.iter().find(|&&v| v >= num_vertices) {
                return Err(DrapeError::IndexOutOfRange {
                    what: "face vertex",
                    index: bad,
                    count: num_vertices,
                });
            }
        }
        Ok(Self::from_faces_unchecked(num_vertices, faces, true))
    }

    /// Build tables from faces already known to be valid.
    pub(crate) fn from_faces_unchecked(
        num_vertices: usize,
        faces: &[Vec<usize>],
        parallel: bool,
    ) -> Self {
        let normalize = |face: &Vec<usize>| {
            let mut verts = face.clone();
            verts.sort_unstable();
            verts.dedup();
            verts
        };

        let face_to_vertices: Vec<Vec<usize>> = if parallel {
            faces.par_iter().map(normalize).collect()
        } else {
            faces.iter().map(normalize).collect()
        };

        // Faces are visited in order, so each list comes out sorted.
        let mut vertex_to_faces = vec![Vec::new(); num_vertices];
        for (face_index, verts) in face_to_vertices.iter().enumerate() {
            for &v in verts {
                vertex_to_faces[v].push(face_index);
            }
        }

        Self {
            vertex_to_faces,
            face_to_vertices,
        }
    }

    #[inline]
    pub fn num_vertices(&self) -> usize {
        self.vertex_to_faces.len()
    }

    #[inline]
    pub fn num_faces(&self) -> usize {
        self.face_to_vertices.len()
    }

    /// Faces touching a vertex. Unknown vertices touch no faces.
    #[inline]
    pub fn vertex_faces(&self, vertex: usize) -> &[usize] {
        self.vertex_to_faces
            .get(vertex)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Vertices of a face. Unknown faces have no vertices.
    #[inline]
    pub fn face_vertices(&self, face: usize) -> &[usize] {
        self.face_to_vertices
            .get(face)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_two_quads() {
        // 0--1--2
        // |  |  |
        // 3--4--5
        let faces = vec![vec![0, 1, 4, 3], vec![1, 2, 5, 4]];
        let tables = AdjacencyTables::from_faces(6, &faces).unwrap();

        assert_eq!(tables.num_faces(), 2);
        assert_eq!(tables.vertex_faces(1), &[0, 1]);
        assert_eq!(tables.vertex_faces(3), &[0]);
        assert_eq!(tables.face_vertices(0), &[0, 1, 3, 4]);
        assert!(tables.vertex_faces(99).is_empty());
    }

    #[test]
    fn test_sequential_matches_parallel() {
        let faces = vec![vec![0, 1, 2], vec![2, 1, 3], vec![3, 4, 2]];
        let a = AdjacencyTables::from_faces_unchecked(5, &faces, true);
        let b = AdjacencyTables::from_faces_unchecked(5, &faces, false);
        assert_eq!(a, b);
    }

    #[test]
    fn test_invalid_vertex() {
        assert!(AdjacencyTables::from_faces(2, &[vec![0, 1, 2]]).is_err());
    }
}
