//! Delete-group assembly for a base mesh.

use crate::mesh::AdjacencyTables;
use crate::mhclo::CorrespondenceDocument;
use crate::weights::VertexWeightGroup;

use super::{conservative_mask, MaskOptions};

/// Options for [`build_delete_group`].
#[derive(Debug, Clone)]
pub struct DeleteGroupOptions {
    /// Group name to use instead of the document's own.
    pub group_name: Option<String>,

    /// Return nothing when the document has no delete listing (default: true).
    /// When false an empty placeholder group is produced instead.
    pub skip_if_empty: bool,

    /// Options for the mask filter.
    pub mask: MaskOptions,
}

impl Default for DeleteGroupOptions {
    fn default() -> Self {
        Self {
            group_name: None,
            skip_if_empty: true,
            mask: MaskOptions::default(),
        }
    }
}

impl DeleteGroupOptions {
    /// Override the group name.
    pub fn with_group_name<S: Into<String>>(mut self, name: S) -> Self {
        self.group_name = Some(name.into());
        self
    }

    /// Always produce a group, even without a delete listing.
    pub fn keep_empty(mut self) -> Self {
        self.skip_if_empty = false;
        self
    }
}

/// Build the base-mesh group of vertices hidden by an auxiliary mesh.
///
/// Delete indices beyond `base_vertex_count` are dropped first: they can name
/// helper geometry that the current base mesh no longer has. The rest pass
/// through [`conservative_mask`] and become a weight-1.0 group.
pub fn build_delete_group(
    doc: &CorrespondenceDocument,
    base_vertex_count: usize,
    tables: &AdjacencyTables,
    options: &DeleteGroupOptions,
) -> Option<VertexWeightGroup> {
    if options.skip_if_empty && (!doc.has_delete_group() || doc.delete_indices().is_empty()) {
        log::debug!("{} has no delete listing", doc.name());
        return None;
    }

    let name = options
        .group_name
        .clone()
        .unwrap_or_else(|| doc.delete_group_name().to_string());

    if !doc.has_delete_group() {
        return Some(VertexWeightGroup::placeholder(name));
    }

    let mut candidates = doc.delete_index_set();
    let before = candidates.len();
    candidates.retain(|&v| v < base_vertex_count);
    if candidates.len() < before {
        log::debug!(
            "Dropped {} delete indices outside the base mesh",
            before - candidates.len()
        );
    }

    let safe = conservative_mask(&candidates, tables, &options.mask);
    log::info!(
        "Delete group {}: {} of {} vertices are safe to hide",
        name,
        safe.len(),
        candidates.len()
    );

    let mut group = VertexWeightGroup::placeholder(name);
    for v in safe {
        let _ = group.insert(v, 1.0);
    }
    Some(group)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strip() -> AdjacencyTables {
        // 3--4--5
        // |  |  |
        // 0--1--2
        AdjacencyTables::from_faces(6, &[vec![0, 1, 4, 3], vec![1, 2, 5, 4]]).unwrap()
    }

    fn parse(text: &str) -> CorrespondenceDocument {
        CorrespondenceDocument::parse_str(text, "/").unwrap()
    }

    #[test]
    fn test_builds_masked_group() {
        let doc = parse("obj_file a.obj\ndelete_verts\n0 - 4 70\n");
        let group = build_delete_group(&doc, 6, &strip(), &DeleteGroupOptions::default()).unwrap();
        assert_eq!(group.name(), "Delete");
        assert_eq!(group.vertices().collect::<Vec<_>>(), vec![0, 3]);
        assert_eq!(group.get(0), Some(1.0));
    }

    #[test]
    fn test_skips_without_listing() {
        let doc = parse("obj_file a.obj\n");
        assert!(build_delete_group(&doc, 6, &strip(), &DeleteGroupOptions::default()).is_none());
    }

    #[test]
    fn test_placeholder_when_requested() {
        let doc = parse("obj_file a.obj\n");
        let options = DeleteGroupOptions::default()
            .keep_empty()
            .with_group_name("Delete.shoes");
        let group = build_delete_group(&doc, 6, &strip(), &options).unwrap();
        assert_eq!(group.name(), "Delete.shoes");
        assert!(group.is_empty());
    }
}
