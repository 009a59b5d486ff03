//! Vertex weight groups and skinning-weight transfer.
//!
//! - [`VertexWeightGroup`]: a named sparse vertex → weight map
//! - [`BoneWeights`]: per-vertex group memberships of a base mesh
//! - [`transfer`]: propagate bone weights from the base mesh to an auxiliary mesh
//! - [`file`]: the JSON weights interchange format and its patch operations

pub mod file;
pub mod transfer;

use std::collections::{BTreeMap, BTreeSet};

use crate::error::{DrapeError, Result};

pub use file::WeightsDocument;
pub use transfer::{project_group, transfer_weights, TransferOptions, WeightBlend};

/// A named sparse mapping from vertex index to a weight in `(0, 1]`.
///
/// Empty groups only exist when asked for explicitly through
/// [`VertexWeightGroup::placeholder`], for example so that a mask can refer to
/// a group before it has members.
#[derive(Debug, Clone, PartialEq)]
pub struct VertexWeightGroup {
    name: String,
    entries: BTreeMap<usize, f64>,
}

impl VertexWeightGroup {
    /// An empty group meant to be filled by the caller.
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self {
            name: name.into(),
            entries: BTreeMap::new(),
        }
    }

    /// An explicitly empty group that other steps may reference.
    pub fn placeholder<S: Into<String>>(name: S) -> Self {
        Self::new(name)
    }

    /// A group where every listed vertex has the same weight.
    pub fn uniform<S, I>(name: S, vertices: I, weight: f64) -> Result<Self>
    where
        S: Into<String>,
        I: IntoIterator<Item = usize>,
    {
        let mut group = Self::new(name);
        for v in vertices {
            group.insert(v, weight)?;
        }
        Ok(group)
    }

    /// Set the weight of one vertex, replacing any previous value.
    pub fn insert(&mut self, vertex: usize, weight: f64) -> Result<()> {
        if !(weight > 0.0 && weight <= 1.0) {
            return Err(DrapeError::invalid_param(
                "weight",
                weight,
                "vertex weights must lie in (0, 1]",
            ));
        }
        self.entries.insert(vertex, weight);
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn get(&self, vertex: usize) -> Option<f64> {
        self.entries.get(&vertex).copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in ascending vertex order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, f64)> + '_ {
        self.entries.iter().map(|(&v, &w)| (v, w))
    }

    /// Member vertex indices in ascending order.
    pub fn vertices(&self) -> impl Iterator<Item = usize> + '_ {
        self.entries.keys().copied()
    }
}

/// Bone-group memberships of every base-mesh vertex.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BoneWeights {
    memberships: Vec<Vec<(String, f64)>>,
    vertex_count: usize,
}

impl BoneWeights {
    /// Memberships for a mesh with no vertices yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Memberships for a mesh of known size.
    pub fn with_vertex_count(vertex_count: usize) -> Self {
        Self {
            memberships: vec![Vec::new(); vertex_count],
            vertex_count,
        }
    }

    /// Collect memberships from a set of groups.
    pub fn from_groups<'a, I>(groups: I) -> Self
    where
        I: IntoIterator<Item = &'a VertexWeightGroup>,
    {
        let mut weights = Self::new();
        for group in groups {
            for (v, w) in group.iter() {
                weights.add(v, group.name(), w);
            }
        }
        weights
    }

    /// Add one membership. Grows the vertex count if needed.
    pub fn add<S: Into<String>>(&mut self, vertex: usize, group: S, weight: f64) {
        if vertex >= self.memberships.len() {
            self.memberships.resize_with(vertex + 1, Vec::new);
        }
        self.vertex_count = self.vertex_count.max(vertex + 1);
        self.memberships[vertex].push((group.into(), weight));
    }

    /// Number of base-mesh vertices these memberships describe.
    pub fn vertex_count(&self) -> usize {
        self.vertex_count
    }

    /// Declare the true vertex count of the base mesh.
    ///
    /// Trailing vertices without groups are otherwise invisible.
    pub fn set_vertex_count(&mut self, vertex_count: usize) {
        self.vertex_count = self.vertex_count.max(vertex_count);
        if self.memberships.len() < self.vertex_count {
            self.memberships.resize_with(self.vertex_count, Vec::new);
        }
    }

    /// Groups a vertex belongs to, with their weights.
    pub fn groups_of(&self, vertex: usize) -> &[(String, f64)] {
        self.memberships
            .get(vertex)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// All group names that have at least one member.
    pub fn group_names(&self) -> BTreeSet<String> {
        self.memberships
            .iter()
            .flatten()
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// Vertices that belong to `group`.
    pub fn members_of(&self, group: &str) -> BTreeSet<usize> {
        self.memberships
            .iter()
            .enumerate()
            .filter(|(_, groups)| groups.iter().any(|(name, _)| name == group))
            .map(|(v, _)| v)
            .collect()
    }
}
