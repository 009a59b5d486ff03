//! Integration with a host 3D application.
//!
//! The library never owns scene state. A host exposes its mesh objects through
//! the narrow [`HostMesh`] trait and its armatures through [`Skeleton`]; the
//! functions here read snapshots from those, run the pure algorithms, and hand
//! the resulting positions and weight groups back.
//!
//! [`MemoryMesh`] is a self-contained implementation used by the command line
//! tool and by tests.

use std::collections::{BTreeMap, BTreeSet};

use nalgebra::Point3;

use crate::context::DrapeContext;
use crate::error::Result;
use crate::fit::{fit_positions, FitOptions, FitReport};
use crate::mask::{build_delete_group, DeleteGroupOptions};
use crate::mesh::{AdjacencyTables, PolyMesh};
use crate::mhclo::CorrespondenceDocument;
use crate::weights::{transfer_weights, BoneWeights, TransferOptions, VertexWeightGroup};

/// Opaque reference to a vertex group on a host mesh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GroupHandle(pub usize);

/// The operations the library needs from a host mesh object.
pub trait HostMesh {
    /// Stable identifier, used as the adjacency cache key.
    fn key(&self) -> &str;

    /// Bumped by the host whenever faces or vertex count change.
    fn topology_revision(&self) -> u64 {
        0
    }

    /// Number of vertices.
    fn vertex_count(&self) -> usize;

    /// Positions with every shape and pose deformation applied.
    fn flattened_positions(&self) -> Vec<Point3<f64>>;

    /// Undeformed local vertex coordinates.
    fn local_positions(&self) -> Vec<Point3<f64>>;

    /// Replace local vertex coordinates.
    fn set_local_positions(&mut self, positions: Vec<Point3<f64>>);

    /// Polygon faces as vertex index lists.
    fn polygons(&self) -> Vec<Vec<usize>>;

    /// Bone-group memberships of every vertex.
    fn bone_group_memberships(&self) -> BoneWeights;

    /// Handle of an existing vertex group.
    fn vertex_group(&self, name: &str) -> Option<GroupHandle>;

    /// Create a vertex group, or return the existing one of that name.
    fn create_vertex_group(&mut self, name: &str) -> GroupHandle;

    /// Remove a vertex group.
    fn remove_vertex_group(&mut self, group: GroupHandle);

    /// Add `indices` to a group with one shared weight.
    fn add_weighted_vertices(&mut self, group: GroupHandle, indices: &[usize], weight: f64);

    /// Whether a mask driven by the named group is already set up.
    fn has_mask_for(&self, _group_name: &str) -> bool {
        false
    }
}

/// Bone names of a host armature. Vertex groups share their bone's name.
pub trait Skeleton {
    fn bone_names(&self) -> BTreeSet<String>;
}

impl Skeleton for BTreeSet<String> {
    fn bone_names(&self) -> BTreeSet<String> {
        self.clone()
    }
}

impl Skeleton for [&str] {
    fn bone_names(&self) -> BTreeSet<String> {
        self.iter().map(|s| s.to_string()).collect()
    }
}

/// Move auxiliary vertices so they follow the current shape of the base mesh.
///
/// Only local coordinates are written. Matching the base mesh's transform
/// and parent is left to the host.
pub fn fit_clothes<B, C>(
    doc: &CorrespondenceDocument,
    base: &B,
    clothes: &mut C,
    options: &FitOptions,
) -> Result<FitReport>
where
    B: HostMesh + ?Sized,
    C: HostMesh + ?Sized,
{
    let snapshot = base.flattened_positions();
    let mut positions = clothes.local_positions();
    let report = fit_positions(doc, &snapshot, &mut positions, options)?;
    clothes.set_local_positions(positions);
    log::info!(
        "Fitted {} of {} vertices of {} onto {}",
        report.fitted,
        clothes.vertex_count(),
        clothes.key(),
        base.key()
    );
    Ok(report)
}

/// Copy skinning weights from the base mesh onto the clothes.
///
/// Returns the names of the groups created.
pub fn interpolate_weights<B, C, S>(
    doc: &CorrespondenceDocument,
    base: &B,
    skeleton: &S,
    clothes: &mut C,
    options: &TransferOptions,
) -> Vec<String>
where
    B: HostMesh + ?Sized,
    C: HostMesh + ?Sized,
    S: Skeleton + ?Sized,
{
    let mut memberships = base.bone_group_memberships();
    memberships.set_vertex_count(base.vertex_count());

    let groups = transfer_weights(doc, &memberships, &skeleton.bone_names(), options);
    for group in groups.values() {
        apply_group(clothes, group);
    }
    groups.into_keys().collect()
}

/// Write a weight group onto a host mesh, creating the group if needed.
pub fn apply_group<M: HostMesh + ?Sized>(mesh: &mut M, group: &VertexWeightGroup) -> GroupHandle {
    let handle = mesh.create_vertex_group(group.name());

    // One call per distinct weight keeps host round trips low.
    let mut by_weight: BTreeMap<u64, Vec<usize>> = BTreeMap::new();
    for (v, w) in group.iter() {
        by_weight.entry(w.to_bits()).or_default().push(v);
    }
    for (bits, indices) in by_weight {
        mesh.add_weighted_vertices(handle, &indices, f64::from_bits(bits));
    }
    handle
}

/// What [`update_delete_group`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteGroupOutcome {
    /// Name of the group on the base mesh.
    pub group_name: String,
    /// Vertices added to the group.
    pub vertices: usize,
    /// The host still has to set up a mask driven by this group.
    pub needs_mask_modifier: bool,
}

/// Create or update the delete group on a base mesh.
///
/// With `replace` set, an existing group of the same name is removed first.
/// Returns `None` when the options skip documents without a delete listing.
/// Fails if the host reports faces that reference missing vertices.
pub fn update_delete_group<B: HostMesh + ?Sized>(
    ctx: &mut DrapeContext,
    doc: &CorrespondenceDocument,
    base: &mut B,
    replace: bool,
    options: &DeleteGroupOptions,
) -> Result<Option<DeleteGroupOutcome>> {
    let vertex_count = base.vertex_count();
    let tables = ctx.adjacency(base.key(), base.topology_revision(), || {
        AdjacencyTables::from_faces(vertex_count, &base.polygons())
    })?;

    let Some(group) = build_delete_group(doc, vertex_count, tables, options) else {
        return Ok(None);
    };

    if replace && doc.has_delete_group() {
        if let Some(existing) = base.vertex_group(group.name()) {
            base.remove_vertex_group(existing);
        }
    }
    apply_group(base, &group);

    Ok(Some(DeleteGroupOutcome {
        group_name: group.name().to_string(),
        vertices: group.len(),
        needs_mask_modifier: !base.has_mask_for(group.name()),
    }))
}

/// An in-memory mesh object.
#[derive(Debug, Clone, Default)]
pub struct MemoryMesh {
    key: String,
    mesh: PolyMesh,
    deformed: Option<Vec<Point3<f64>>>,
    groups: Vec<Option<(String, BTreeMap<usize, f64>)>>,
    masks: BTreeSet<String>,
    revision: u64,
}

impl MemoryMesh {
    pub fn new<S: Into<String>>(key: S, mesh: PolyMesh) -> Self {
        Self {
            key: key.into(),
            mesh,
            ..Self::default()
        }
    }

    pub fn mesh(&self) -> &PolyMesh {
        &self.mesh
    }

    /// Provide deformed positions, standing in for applied shape keys and pose.
    pub fn set_deformed(&mut self, positions: Vec<Point3<f64>>) {
        self.deformed = Some(positions);
    }

    /// Load vertex groups, e.g. from a weights document.
    pub fn add_groups<'a, I>(&mut self, groups: I)
    where
        I: IntoIterator<Item = &'a VertexWeightGroup>,
    {
        for group in groups {
            apply_group(self, group);
        }
    }

    /// Record that a mask driven by `group_name` exists.
    pub fn add_mask(&mut self, group_name: &str) {
        self.masks.insert(group_name.to_string());
    }

    /// Replace the topology, bumping the revision.
    pub fn set_mesh(&mut self, mesh: PolyMesh) {
        self.mesh = mesh;
        self.deformed = None;
        self.revision += 1;
    }

    /// All live groups as weight groups, sorted by name.
    pub fn groups(&self) -> BTreeMap<String, VertexWeightGroup> {
        let mut out = BTreeMap::new();
        for (name, entries) in self.groups.iter().flatten() {
            let mut group = VertexWeightGroup::placeholder(name.as_str());
            for (&v, &w) in entries {
                let _ = group.insert(v, w);
            }
            out.insert(name.clone(), group);
        }
        out
    }
}

impl HostMesh for MemoryMesh {
    fn key(&self) -> &str {
        &self.key
    }

    fn topology_revision(&self) -> u64 {
        self.revision
    }

    fn vertex_count(&self) -> usize {
        self.mesh.num_vertices()
    }

    fn flattened_positions(&self) -> Vec<Point3<f64>> {
        self.deformed
            .clone()
            .unwrap_or_else(|| self.mesh.positions().to_vec())
    }

    fn local_positions(&self) -> Vec<Point3<f64>> {
        self.mesh.positions().to_vec()
    }

    fn set_local_positions(&mut self, positions: Vec<Point3<f64>>) {
        let target = self.mesh.positions_mut();
        let n = target.len().min(positions.len());
        target[..n].copy_from_slice(&positions[..n]);
    }

    fn polygons(&self) -> Vec<Vec<usize>> {
        self.mesh.faces().to_vec()
    }

    fn bone_group_memberships(&self) -> BoneWeights {
        let mut weights = BoneWeights::with_vertex_count(self.mesh.num_vertices());
        for (name, entries) in self.groups.iter().flatten() {
            for (&v, &w) in entries {
                weights.add(v, name.as_str(), w);
            }
        }
        weights
    }

    fn vertex_group(&self, name: &str) -> Option<GroupHandle> {
        self.groups
            .iter()
            .position(|g| matches!(g, Some((n, _)) if n == name))
            .map(GroupHandle)
    }

    fn create_vertex_group(&mut self, name: &str) -> GroupHandle {
        if let Some(handle) = self.vertex_group(name) {
            return handle;
        }
        self.groups.push(Some((name.to_string(), BTreeMap::new())));
        GroupHandle(self.groups.len() - 1)
    }

    fn remove_vertex_group(&mut self, group: GroupHandle) {
        if let Some(slot) = self.groups.get_mut(group.0) {
            *slot = None;
        }
    }

    fn add_weighted_vertices(&mut self, group: GroupHandle, indices: &[usize], weight: f64) {
        if let Some(Some((_, entries))) = self.groups.get_mut(group.0) {
            for &v in indices {
                entries.insert(v, weight);
            }
        }
    }

    fn has_mask_for(&self, group_name: &str) -> bool {
        self.masks.contains(group_name)
    }
}
