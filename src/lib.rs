//! # Drape
//!
//! Fit auxiliary meshes (clothes, hair, eyebrows, proxies) onto a deformable
//! base mesh and give them the base mesh's skinning weights.
//!
//! The link between the two meshes is an MHCLO correspondence document: every
//! auxiliary vertex is tied to three base-mesh vertices with barycentric
//! weights and a residual offset. The document may also list base-mesh
//! vertices the auxiliary mesh covers, so they can be hidden.
//!
//! ## Features
//!
//! - **MHCLO parsing**: line-oriented documents read by an explicit state machine
//! - **Barycentric fitting**: per-axis offset scaling driven by measurement anchors
//! - **Weight transfer**: blended bone-group weights with a negligible-weight threshold
//! - **Conservative masking**: delete sets shrunk so no face is left half hidden
//! - **Weights files**: JSON weight documents with nuke, fill and patch edits
//! - **Mesh I/O**: OBJ and PLY polygon meshes
//!
//! ## Quick Start
//!
//! ```no_run
//! use drape::prelude::*;
//!
//! let doc = CorrespondenceDocument::load("shirt.mhclo").unwrap();
//! let base = drape::io::load("base.obj").unwrap();
//! let mut shirt = drape::io::load("shirt.obj").unwrap();
//!
//! let report = fit_mesh(&doc, &base, &mut shirt, &FitOptions::default()).unwrap();
//! println!("Fitted {} vertices", report.fitted);
//!
//! drape::io::save(&shirt, "fitted_shirt.obj").unwrap();
//! ```
//!
//! ## Masking Hidden Vertices
//!
//! ```
//! use drape::prelude::*;
//! use nalgebra::Point3;
//!
//! // 3--4--5
//! // |  |  |
//! // 0--1--2
//! let positions = (0..6)
//!     .map(|i| Point3::new((i % 3) as f64, 0.0, (i / 3) as f64))
//!     .collect();
//! let base = PolyMesh::new(positions, vec![vec![0, 1, 4, 3], vec![1, 2, 5, 4]]).unwrap();
//!
//! let doc = CorrespondenceDocument::parse_str("obj_file a.obj\ndelete_verts\n0 - 4\n", "/").unwrap();
//! let group = build_delete_group(
//!     &doc,
//!     base.num_vertices(),
//!     &base.adjacency(),
//!     &DeleteGroupOptions::default(),
//! )
//! .unwrap();
//!
//! // Vertices 1 and 4 also belong to the right quad, which stays visible.
//! assert_eq!(group.vertices().collect::<Vec<_>>(), vec![0, 3]);
//! ```

#![warn(clippy::all)]

pub mod context;
pub mod error;
pub mod fit;
pub mod host;
pub mod io;
pub mod mask;
pub mod mesh;
pub mod mhclo;
pub mod weights;

/// Prelude module for convenient imports.
///
/// ```
/// use drape::prelude::*;
/// ```
pub mod prelude {
    pub use crate::context::DrapeContext;
    pub use crate::error::{DrapeError, ParseWarning, Result};
    pub use crate::fit::{fit_mesh, fit_positions, FitOptions, FitReport};
    pub use crate::host::{HostMesh, MemoryMesh, Skeleton};
    pub use crate::mask::{build_delete_group, conservative_mask, DeleteGroupOptions, MaskOptions};
    pub use crate::mesh::{AdjacencyTables, PolyMesh};
    pub use crate::mhclo::{CorrespondenceDocument, VertexRef};
    pub use crate::weights::{
        transfer_weights, BoneWeights, TransferOptions, VertexWeightGroup, WeightsDocument,
    };
}

// Re-export nalgebra types for convenience
pub use nalgebra;
