//! Conservative vertex masking.
//!
//! Removing an arbitrary vertex set from a mesh can leave faces with some
//! corners deleted and some kept. [`conservative_mask`] shrinks a candidate set
//! until every face it touches is covered completely:
//!
//! 1. collect the faces touching any candidate vertex;
//! 2. mark a face *partial* if one of its vertices is not a candidate;
//! 3. drop every candidate that belongs to a partial face.
//!
//! The result depends only on the candidate set and the tables, not on the
//! order candidates are given in.
//!
//! # Example
//!
//! ```
//! use std::collections::BTreeSet;
//! use drape::mask::{conservative_mask, MaskOptions};
//! use drape::mesh::AdjacencyTables;
//!
//! // Two quads sharing the edge 1-4.
//! let faces = vec![vec![0, 1, 4, 3], vec![1, 2, 5, 4]];
//! let tables = AdjacencyTables::from_faces(6, &faces).unwrap();
//!
//! let candidates: BTreeSet<usize> = [0, 1, 3, 4].into_iter().collect();
//! let safe = conservative_mask(&candidates, &tables, &MaskOptions::default());
//! assert!(safe.is_empty());
//! ```

mod delete_group;

pub use delete_group::{build_delete_group, DeleteGroupOptions};

use std::collections::BTreeSet;

use rayon::prelude::*;

use crate::mesh::AdjacencyTables;

/// Options for [`conservative_mask`].
#[derive(Debug, Clone)]
pub struct MaskOptions {
    /// Whether to use parallel execution (default: true).
    pub parallel: bool,
}

impl Default for MaskOptions {
    fn default() -> Self {
        Self { parallel: true }
    }
}

impl MaskOptions {
    /// Set whether to use parallel execution.
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Create options for single-threaded execution.
    pub fn sequential(mut self) -> Self {
        self.parallel = false;
        self
    }
}

/// Reduce `candidates` so that no face is left partially covered.
///
/// Candidates that touch no face are kept.
pub fn conservative_mask(
    candidates: &BTreeSet<usize>,
    tables: &AdjacencyTables,
    options: &MaskOptions,
) -> BTreeSet<usize> {
    let relevant_faces: BTreeSet<usize> = candidates
        .iter()
        .flat_map(|&v| tables.vertex_faces(v).iter().copied())
        .collect();

    let is_partial =
        |&face: &usize| tables.face_vertices(face).iter().any(|v| !candidates.contains(v));

    let partial_faces: Vec<usize> = if options.parallel {
        relevant_faces.par_iter().copied().filter(is_partial).collect()
    } else {
        relevant_faces.iter().copied().filter(is_partial).collect()
    };

    let excluded: BTreeSet<usize> = partial_faces
        .iter()
        .flat_map(|&f| tables.face_vertices(f).iter().copied())
        .collect();

    let safe: BTreeSet<usize> = candidates.difference(&excluded).copied().collect();

    log::debug!(
        "Mask: {} candidates, {} relevant faces, {} partial faces, {} kept",
        candidates.len(),
        relevant_faces.len(),
        partial_faces.len(),
        safe.len()
    );

    safe
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A grid of `n x n` quads with `(n + 1)^2` vertices, row-major.
    fn quad_grid(n: usize) -> AdjacencyTables {
        let mut faces = Vec::with_capacity(n * n);
        for j in 0..n {
            for i in 0..n {
                let v00 = j * (n + 1) + i;
                let v01 = v00 + (n + 1);
                faces.push(vec![v00, v00 + 1, v01 + 1, v01]);
            }
        }
        AdjacencyTables::from_faces((n + 1) * (n + 1), &faces).unwrap()
    }

    fn set(items: &[usize]) -> BTreeSet<usize> {
        items.iter().copied().collect()
    }

    #[test]
    fn test_single_face_on_grid_loses_shared_vertices() {
        // 3x3 grid, centre quad is face 4 with vertices 5, 6, 9, 10.
        // Every one of them is shared with a neighbouring face that keeps
        // other vertices, so nothing survives.
        let tables = quad_grid(3);
        let safe = conservative_mask(&set(&[5, 6, 9, 10]), &tables, &MaskOptions::default());
        assert!(safe.is_empty());
    }

    #[test]
    fn test_partial_neighbour_removes_its_vertices_only() {
        // 2x1 strip:
        // 3--4--5
        // |  |  |
        // 0--1--2
        let faces = vec![vec![0, 1, 4, 3], vec![1, 2, 5, 4]];
        let tables = AdjacencyTables::from_faces(6, &faces).unwrap();

        // Face 0 fully covered plus vertex 2. Face 1 is partial (5 missing),
        // which takes 1, 2 and 4 out.
        let safe = conservative_mask(&set(&[0, 1, 2, 3, 4]), &tables, &MaskOptions::default());
        assert_eq!(safe, set(&[0, 3]));
    }

    #[test]
    fn test_enclosed_set_is_unchanged() {
        let tables = quad_grid(2);
        let all: BTreeSet<usize> = (0..9).collect();
        assert_eq!(conservative_mask(&all, &tables, &MaskOptions::default()), all);
    }

    #[test]
    fn test_interior_block_of_faces() {
        // 4x4 grid; the inner 2x2 block of faces uses vertices 6..=8, 11..=13, 16..=18.
        // Only the centre vertex 12 is not on a face that leaves the block.
        let tables = quad_grid(4);
        let block = set(&[6, 7, 8, 11, 12, 13, 16, 17, 18]);
        let safe = conservative_mask(&block, &tables, &MaskOptions::default());
        assert_eq!(safe, set(&[12]));
    }

    #[test]
    fn test_isolated_candidates_survive() {
        let tables = quad_grid(1);
        assert_eq!(
            conservative_mask(&set(&[99]), &tables, &MaskOptions::default()),
            set(&[99])
        );
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let tables = quad_grid(12);
        let candidates: BTreeSet<usize> = (0..169).filter(|v| v % 3 != 0).collect();
        let a = conservative_mask(&candidates, &tables, &MaskOptions::default());
        let b = conservative_mask(&candidates, &tables, &MaskOptions::default().sequential());
        assert_eq!(a, b);
    }
}
