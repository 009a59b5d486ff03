//! Long-lived state shared across fitting calls.
//!
//! A [`DrapeContext`] owns every cache the library uses: adjacency tables per
//! base-mesh topology, parsed correspondence documents per file, and the
//! mesh-metadata configuration. It is passed by reference to whatever needs
//! it; nothing is cached globally.

use std::collections::hash_map::Entry;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{DrapeError, Result};
use crate::mesh::AdjacencyTables;
use crate::mhclo::CorrespondenceDocument;

/// Vertex index bounds of one body part on the base mesh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct BodyPartDimensions {
    pub xmin: usize,
    pub xmax: usize,
    #[serde(default)]
    pub ymin: Option<usize>,
    #[serde(default)]
    pub ymax: Option<usize>,
    #[serde(default)]
    pub zmin: Option<usize>,
    #[serde(default)]
    pub zmax: Option<usize>,
}

/// Base-mesh metadata configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct MeshMetadata {
    /// Measurement vertices keyed by body part name.
    #[serde(default)]
    pub dimensions: BTreeMap<String, BodyPartDimensions>,
}

impl MeshMetadata {
    /// Read a metadata file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = fs::read_to_string(path.as_ref())?;
        Ok(serde_json::from_str(&text)?)
    }

    /// The body part whose x bounds are exactly the given anchor vertices.
    pub fn body_part_for(&self, index_a: usize, index_b: usize) -> Option<&str> {
        self.dimensions
            .iter()
            .find(|(_, dims)| dims.xmin == index_a && dims.xmax == index_b)
            .map(|(name, _)| name.as_str())
    }
}

#[derive(Debug)]
struct CachedTables {
    revision: u64,
    tables: AdjacencyTables,
}

/// Caches owned by the host for the lifetime of a session.
#[derive(Debug, Default)]
pub struct DrapeContext {
    adjacency: HashMap<String, CachedTables>,
    documents: HashMap<PathBuf, CorrespondenceDocument>,
    metadata_path: Option<PathBuf>,
    metadata: Option<MeshMetadata>,
}

impl DrapeContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use the metadata file at `path`, loaded on first use.
    pub fn with_metadata_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.metadata_path = Some(path.into());
        self.metadata = None;
        self
    }

    /// Use an already loaded metadata table.
    pub fn with_metadata(mut self, metadata: MeshMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Adjacency tables for the mesh identified by `key`.
    ///
    /// Tables are rebuilt with `build` when none are cached or the cached
    /// ones belong to a different topology `revision`. A failed build leaves
    /// the cache without an entry for `key`.
    pub fn adjacency<F>(&mut self, key: &str, revision: u64, build: F) -> Result<&AdjacencyTables>
    where
        F: FnOnce() -> Result<AdjacencyTables>,
    {
        match self.adjacency.entry(key.to_string()) {
            Entry::Occupied(mut entry) => {
                if entry.get().revision != revision {
                    log::debug!("Topology of {} changed, rebuilding adjacency", key);
                    match build() {
                        Ok(tables) => {
                            entry.insert(CachedTables { revision, tables });
                        }
                        Err(e) => {
                            entry.remove();
                            return Err(e);
                        }
                    }
                }
                Ok(&entry.into_mut().tables)
            }
            Entry::Vacant(entry) => {
                log::debug!("Building adjacency for {}", key);
                let tables = build()?;
                Ok(&entry.insert(CachedTables { revision, tables }).tables)
            }
        }
    }

    /// Forget cached tables for a mesh.
    pub fn invalidate_adjacency(&mut self, key: &str) {
        self.adjacency.remove(key);
    }

    /// A parsed document, loaded once per path.
    pub fn document<P: AsRef<Path>>(&mut self, path: P) -> Result<&CorrespondenceDocument> {
        let path = fs::canonicalize(path.as_ref())?;
        match self.documents.entry(path) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(entry) => {
                let doc = CorrespondenceDocument::load(entry.key())?;
                Ok(entry.insert(doc))
            }
        }
    }

    /// Forget every cached document.
    pub fn clear_documents(&mut self) {
        self.documents.clear();
    }

    /// The mesh-metadata table, loading it on first use.
    pub fn mesh_metadata(&mut self) -> Result<&MeshMetadata> {
        let metadata = match self.metadata.take() {
            Some(metadata) => metadata,
            None => {
                let path = self.metadata_path.as_ref().ok_or_else(|| {
                    DrapeError::invalid_param("metadata_path", "(none)", "no mesh metadata configured")
                })?;
                log::debug!("Loading mesh metadata from {}", path.display());
                MeshMetadata::load(path)?
            }
        };
        Ok(self.metadata.insert(metadata))
    }

    /// The body part a document was authored against, judged by its x-scale anchor.
    pub fn detect_body_part(&mut self, doc: &CorrespondenceDocument) -> Result<Option<String>> {
        let Some(anchor) = doc.scale_anchors().x else {
            return Ok(None);
        };
        let metadata = self.mesh_metadata()?;
        Ok(metadata
            .body_part_for(anchor.index_a, anchor.index_b)
            .map(str::to_string))
    }
}
