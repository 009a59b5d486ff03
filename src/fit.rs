//! Barycentric fitting of auxiliary meshes onto a base mesh.
//!
//! Every auxiliary vertex is rebuilt from its [`VertexRef`]: the barycentric
//! combination of three base-mesh vertices plus an offset, where the offset is
//! scaled per axis so clothes follow the current proportions of the body.
//!
//! # Scale normalisation
//!
//! Each declared scale anchor measures the distance between two base-mesh
//! vertices along one world axis and divides it by the reference distance from
//! the authoring mesh. Axes without an anchor use the caller's fallback scale.
//!
//! # Example
//!
//! ```
//! use drape::fit::{fit_positions, FitOptions};
//! use drape::mhclo::CorrespondenceDocument;
//! use nalgebra::Point3;
//!
//! let doc = CorrespondenceDocument::parse_str(
//!     "obj_file a.obj\nverts 0\n0 1 2 0.5 0.5 0.0 0.0 0.0 0.0\n",
//!     "/",
//! ).unwrap();
//! let base = vec![
//!     Point3::new(0.0, 0.0, 0.0),
//!     Point3::new(2.0, 0.0, 0.0),
//!     Point3::new(0.0, 2.0, 0.0),
//! ];
//! let mut aux = vec![Point3::origin()];
//!
//! fit_positions(&doc, &base, &mut aux, &FitOptions::default()).unwrap();
//! assert_eq!(aux[0], Point3::new(1.0, 0.0, 0.0));
//! ```

use nalgebra::{Point3, Vector3};
use rayon::prelude::*;

use crate::error::{DrapeError, Result};
use crate::mesh::PolyMesh;
use crate::mhclo::axis::{sizes_to_world, Axis};
use crate::mhclo::{CorrespondenceDocument, VertexRef};

/// Options for [`fit_positions`].
#[derive(Debug, Clone)]
pub struct FitOptions {
    /// Size factor for axes that have no scale anchor.
    pub fallback_scale: f64,

    /// Whether to use parallel execution (default: true).
    pub parallel: bool,
}

impl Default for FitOptions {
    fn default() -> Self {
        Self {
            fallback_scale: 1.0,
            parallel: true,
        }
    }
}

impl FitOptions {
    /// Set the fallback scale factor.
    pub fn with_fallback_scale(mut self, scale: f64) -> Self {
        self.fallback_scale = scale;
        self
    }

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

/// Summary of a fit.
#[derive(Debug, Clone, PartialEq)]
pub struct FitReport {
    /// Size factor per file axis (`x_scale`, `y_scale`, `z_scale` order).
    pub sizes: [f64; 3],
    /// Number of auxiliary vertices that were written.
    pub fitted: usize,
    /// Auxiliary vertices left untouched because a source index was out of range.
    pub skipped: Vec<usize>,
}

/// Compute the size factor for each file axis from the live base mesh.
///
/// Fails if any declared anchor references a vertex outside `base`.
pub fn axis_sizes(
    doc: &CorrespondenceDocument,
    base: &[Point3<f64>],
    fallback_scale: f64,
) -> Result<[f64; 3]> {
    let anchors = doc.scale_anchors();
    if !anchors.is_complete() && !anchors.is_empty() {
        log::warn!("Document declares only some scale anchors; the rest use the fallback scale");
    }

    let mut sizes = [fallback_scale; 3];
    for axis in Axis::ALL {
        let Some(anchor) = anchors.get(axis) else {
            continue;
        };
        for index in [anchor.index_a, anchor.index_b] {
            if index >= base.len() {
                return Err(DrapeError::IndexOutOfRange {
                    what: axis.scale_key(),
                    index,
                    count: base.len(),
                });
            }
        }
        let component = axis.world_component();
        let distance = (base[anchor.index_a][component] - base[anchor.index_b][component]).abs();
        sizes[axis.index()] = distance / anchor.divisor;
    }

    log::debug!("Axis sizes: {:?}", sizes);
    Ok(sizes)
}

/// Rebuild auxiliary vertex positions from the base mesh.
///
/// `base` must be a flattened snapshot of the deformed base mesh. Positions in
/// `aux` are overwritten in place, index for index with the document's vertex
/// references.
///
/// An out-of-range scale anchor fails the whole fit before anything is
/// written. An out-of-range vertex reference only skips that vertex, which
/// keeps its previous position and is listed in the returned report.
pub fn fit_positions(
    doc: &CorrespondenceDocument,
    base: &[Point3<f64>],
    aux: &mut [Point3<f64>],
    options: &FitOptions,
) -> Result<FitReport> {
    let sizes = axis_sizes(doc, base, options.fallback_scale)?;
    let scale = sizes_to_world(sizes);

    let refs = doc.vertex_refs();
    if refs.len() != aux.len() {
        log::warn!(
            "Document has {} vertex references but the mesh has {} vertices",
            refs.len(),
            aux.len()
        );
    }
    let count = refs.len().min(aux.len());

    let skipped: Vec<usize> = if options.parallel {
        aux[..count]
            .par_iter_mut()
            .zip(refs[..count].par_iter())
            .enumerate()
            .filter_map(|(i, (position, vertex))| place(i, position, vertex, base, &scale))
            .collect()
    } else {
        aux[..count]
            .iter_mut()
            .zip(refs[..count].iter())
            .enumerate()
            .filter_map(|(i, (position, vertex))| place(i, position, vertex, base, &scale))
            .collect()
    };

    if !skipped.is_empty() {
        log::warn!(
            "Skipped {} vertices whose references fall outside the base mesh",
            skipped.len()
        );
    }

    Ok(FitReport {
        sizes,
        fitted: count - skipped.len(),
        skipped,
    })
}

/// Fit an auxiliary mesh onto a base mesh, both given as [`PolyMesh`].
pub fn fit_mesh(
    doc: &CorrespondenceDocument,
    base: &PolyMesh,
    aux: &mut PolyMesh,
    options: &FitOptions,
) -> Result<FitReport> {
    fit_positions(doc, base.positions(), aux.positions_mut(), options)
}

/// Write one fitted position. Returns the index back if it had to be skipped.
#[inline]
fn place(
    index: usize,
    position: &mut Point3<f64>,
    vertex: &VertexRef,
    base: &[Point3<f64>],
    scale: &Vector3<f64>,
) -> Option<usize> {
    if vertex.max_source() >= base.len() {
        log::debug!("Vertex {} references {} outside the base mesh", index, vertex.max_source());
        return Some(index);
    }

    let blended: Vector3<f64> = vertex
        .sources()
        .map(|(source, weight)| base[source].coords * weight)
        .sum();
    *position = Point3::from(blended + vertex.offset.component_mul(scale));
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_mesh() -> Vec<Point3<f64>> {
        vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(4.0, 0.0, 0.0),
            Point3::new(0.0, 6.0, 0.0),
            Point3::new(0.0, 0.0, 8.0),
        ]
    }

    fn parse(text: &str) -> CorrespondenceDocument {
        CorrespondenceDocument::parse_str(text, "/").unwrap()
    }

    #[test]
    fn test_barycentric_combination() {
        let doc = parse("obj_file a.obj\nverts 0\n0 1 2 0.25 0.25 0.5 0 0 0\n3\n");
        let mut aux = vec![Point3::origin(); 2];
        let report = fit_positions(&doc, &base_mesh(), &mut aux, &FitOptions::default()).unwrap();

        assert_eq!(report.fitted, 2);
        assert!(report.skipped.is_empty());
        assert!((aux[0] - Point3::new(1.0, 3.0, 0.0)).norm() < 1e-12);
        assert_eq!(aux[1], Point3::new(0.0, 0.0, 8.0));
    }

    #[test]
    fn test_fallback_scale_applies_to_offset() {
        // File offset (1, 2, 3) lands on world (1, -3, 2).
        let doc = parse("obj_file a.obj\nverts 0\n0 0 0 1 0 0 1 2 3\n");
        let mut aux = vec![Point3::origin()];
        let options = FitOptions::default().with_fallback_scale(0.5).sequential();
        let report = fit_positions(&doc, &base_mesh(), &mut aux, &options).unwrap();

        assert_eq!(report.sizes, [0.5; 3]);
        assert_eq!(aux[0], Point3::new(0.5, -1.5, 1.0));
    }

    #[test]
    fn test_anchor_sizes_read_remapped_axes() {
        // x reads world X (0..4 => 4), y reads world Z (0..8 => 8), z reads world Y (0..6 => 6).
        let doc = parse(
            "obj_file a.obj\nx_scale 0 1 2.0\ny_scale 0 3 4.0\nz_scale 0 2 3.0\n\
             verts 0\n0 0 0 1 0 0 1 1 1\n",
        );
        let mut aux = vec![Point3::origin()];
        let report = fit_positions(&doc, &base_mesh(), &mut aux, &FitOptions::default()).unwrap();

        assert_eq!(report.sizes, [2.0, 2.0, 2.0]);
        // world offset (1, -1, 1) scaled by (size_x, size_z, size_y)
        assert_eq!(aux[0], Point3::new(2.0, -2.0, 2.0));
    }

    #[test]
    fn test_anchor_out_of_range_leaves_positions_untouched() {
        let doc = parse(
            "obj_file a.obj\nx_scale 0 99 1.0\ny_scale 0 1 1.0\nz_scale 0 1 1.0\nverts 0\n1\n2\n",
        );
        let original = vec![Point3::new(7.0, 7.0, 7.0), Point3::new(-1.0, 0.0, 1.0)];
        let mut aux = original.clone();

        let err = fit_positions(&doc, &base_mesh(), &mut aux, &FitOptions::default()).unwrap_err();
        assert!(matches!(
            err,
            DrapeError::IndexOutOfRange { index: 99, count: 4, .. }
        ));
        assert_eq!(aux, original);
    }

    #[test]
    fn test_out_of_range_reference_is_skipped() {
        let doc = parse("obj_file a.obj\nverts 0\n1\n0 1 42 0.3 0.3 0.4 0 0 0\n2\n");
        let mut aux = vec![Point3::new(9.0, 9.0, 9.0); 3];
        let report = fit_positions(&doc, &base_mesh(), &mut aux, &FitOptions::default()).unwrap();

        assert_eq!(report.skipped, vec![1]);
        assert_eq!(report.fitted, 2);
        assert_eq!(aux[0], Point3::new(4.0, 0.0, 0.0));
        assert_eq!(aux[1], Point3::new(9.0, 9.0, 9.0));
        assert_eq!(aux[2], Point3::new(0.0, 6.0, 0.0));
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let mut text = String::from("obj_file a.obj\nverts 0\n");
        for i in 0..200 {
            text.push_str(&format!("{} {} {} 0.2 0.3 0.5 0.1 0.2 0.3\n", i % 4, (i + 1) % 4, (i + 2) % 4));
        }
        let doc = parse(&text);
        let mut a = vec![Point3::origin(); 200];
        let mut b = a.clone();
        fit_positions(&doc, &base_mesh(), &mut a, &FitOptions::default()).unwrap();
        fit_positions(&doc, &base_mesh(), &mut b, &FitOptions::default().sequential()).unwrap();
        assert_eq!(a, b);
    }
}
