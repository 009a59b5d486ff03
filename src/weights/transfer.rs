//! Skinning-weight transfer from a base mesh to an auxiliary mesh.
//!
//! For every auxiliary vertex the three source vertices named by its
//! [`VertexRef`](crate::mhclo::VertexRef) are visited. Each bone group a
//! source vertex belongs to contributes `group_weight * barycentric_weight`.
//! Per group the contributions are divided by the vertex's total barycentric
//! weight, never just summed, so a vertex whose three sources all sit in the
//! same group does not end up with triple weight, and a source with a small
//! barycentric share lends its groups only that share.
//!
//! # Example
//!
//! ```
//! use std::collections::BTreeSet;
//! use drape::mhclo::CorrespondenceDocument;
//! use drape::weights::{transfer_weights, BoneWeights, TransferOptions};
//!
//! let doc = CorrespondenceDocument::parse_str("obj_file a.obj\nverts 0\n0\n", "/").unwrap();
//! let mut base = BoneWeights::new();
//! base.add(0, "head", 1.0);
//! let skeleton: BTreeSet<String> = ["head".to_string()].into_iter().collect();
//!
//! let groups = transfer_weights(&doc, &base, &skeleton, &TransferOptions::default());
//! assert_eq!(groups["head"].get(0), Some(1.0));
//! ```

use std::collections::{BTreeMap, BTreeSet};

use rayon::prelude::*;

use super::{BoneWeights, VertexWeightGroup};
use crate::mhclo::{CorrespondenceDocument, VertexRef};

/// Weights below or equal to this are dropped.
pub const DEFAULT_THRESHOLD: f64 = 0.001;

/// How per-group contributions of the three sources are averaged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WeightBlend {
    /// Barycentric-weighted mean over all three sources:
    /// `Σ(group_weight·w) / Σ w`, where sources outside the group count as
    /// weight 0. Sources all at group weight `g` yield `g`.
    #[default]
    Weighted,
    /// Plain arithmetic mean of the `group_weight·w` products, as older
    /// exporters computed it. Scales results down by roughly the number of
    /// contributing sources.
    Mean,
}

/// Options for [`transfer_weights`].
#[derive(Debug, Clone)]
pub struct TransferOptions {
    /// Averages at or below this value are not emitted.
    pub threshold: f64,

    /// Averaging rule.
    pub blend: WeightBlend,

    /// Whether to use parallel execution (default: true).
    pub parallel: bool,
}

impl Default for TransferOptions {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            blend: WeightBlend::default(),
            parallel: true,
        }
    }
}

impl TransferOptions {
    /// Set the negligible-weight threshold.
    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold.max(0.0);
        self
    }

    /// Set the averaging rule.
    pub fn with_blend(mut self, blend: WeightBlend) -> Self {
        self.blend = blend;
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

/// Running totals for one group on one auxiliary vertex.
#[derive(Debug, Default, Clone, Copy)]
struct Accumulator {
    products: f64,
    count: usize,
}

impl Accumulator {
    /// `barycentric` is the summed barycentric weight of the vertex's sources.
    fn average(&self, blend: WeightBlend, barycentric: f64) -> f64 {
        match blend {
            WeightBlend::Weighted if barycentric > 0.0 => self.products / barycentric,
            WeightBlend::Weighted => 0.0,
            WeightBlend::Mean if self.count > 0 => self.products / self.count as f64,
            WeightBlend::Mean => 0.0,
        }
    }
}

/// Transfer bone-group weights from the base mesh to the auxiliary mesh.
///
/// Only groups named in `skeleton` are considered. Groups that receive no
/// weight above the threshold are left out of the result entirely.
/// Auxiliary vertices whose references leave the base mesh are skipped.
pub fn transfer_weights(
    doc: &CorrespondenceDocument,
    base: &BoneWeights,
    skeleton: &BTreeSet<String>,
    options: &TransferOptions,
) -> BTreeMap<String, VertexWeightGroup> {
    let refs = doc.vertex_refs();

    let per_vertex: Vec<Option<Vec<(&str, f64)>>> = if options.parallel {
        refs.par_iter()
            .map(|vertex| blend_vertex(vertex, base, skeleton, options))
            .collect()
    } else {
        refs.iter()
            .map(|vertex| blend_vertex(vertex, base, skeleton, options))
            .collect()
    };

    let mut groups: BTreeMap<String, VertexWeightGroup> = BTreeMap::new();
    let mut skipped = 0usize;
    for (index, weights) in per_vertex.into_iter().enumerate() {
        let Some(weights) = weights else {
            skipped += 1;
            continue;
        };
        for (name, weight) in weights {
            let group = groups
                .entry(name.to_string())
                .or_insert_with(|| VertexWeightGroup::new(name));
            // Clamped into (threshold, 1] so this cannot fail.
            let _ = group.insert(index, weight);
        }
    }

    if skipped > 0 {
        log::warn!(
            "Skipped {} vertices whose references fall outside the base mesh",
            skipped
        );
    }
    log::debug!(
        "Transferred weights into {} groups for {} vertices",
        groups.len(),
        refs.len()
    );

    groups.retain(|_, group| !group.is_empty());
    groups
}

fn blend_vertex<'a>(
    vertex: &VertexRef,
    base: &'a BoneWeights,
    skeleton: &BTreeSet<String>,
    options: &TransferOptions,
) -> Option<Vec<(&'a str, f64)>> {
    if vertex.max_source() >= base.vertex_count() {
        return None;
    }

    let barycentric_total: f64 = vertex.source_weights.iter().sum();
    let mut totals: BTreeMap<&'a str, Accumulator> = BTreeMap::new();
    for (source, barycentric) in vertex.sources() {
        for (name, group_weight) in base.groups_of(source) {
            if !skeleton.contains(name) {
                continue;
            }
            let total = totals.entry(name.as_str()).or_default();
            total.products += group_weight * barycentric;
            total.count += 1;
        }
    }

    Some(
        totals
            .into_iter()
            .map(|(name, total)| {
                let weight = total.average(options.blend, barycentric_total);
                (name, weight.min(1.0))
            })
            .filter(|&(_, weight)| weight > options.threshold)
            .collect(),
    )
}

/// Build a group on the auxiliary mesh from a group on the base mesh.
///
/// Every auxiliary vertex with at least one source in `base_members` joins
/// the group with weight 1.0. The group is returned even when empty, because
/// the caller asked for it by name.
pub fn project_group<S: Into<String>>(
    doc: &CorrespondenceDocument,
    base_members: &BTreeSet<usize>,
    name: S,
) -> VertexWeightGroup {
    let mut group = VertexWeightGroup::placeholder(name);
    for (index, vertex) in doc.vertex_refs().iter().enumerate() {
        if vertex.source_indices.iter().any(|s| base_members.contains(s)) {
            let _ = group.insert(index, 1.0);
        }
    }
    log::debug!("Projected {} vertices into {}", group.len(), group.name());
    group
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> CorrespondenceDocument {
        CorrespondenceDocument::parse_str(text, "/").unwrap()
    }

    fn skeleton(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_shared_group_is_averaged_not_summed() {
        let third = 1.0 / 3.0;
        let doc = parse(&format!(
            "obj_file a.obj\nverts 0\n0 1 2 {t} {t} {t} 0 0 0\n",
            t = third
        ));
        let mut base = BoneWeights::new();
        for v in 0..3 {
            base.add(v, "G", 0.5);
        }

        let groups = transfer_weights(&doc, &base, &skeleton(&["G"]), &TransferOptions::default());
        let weight = groups["G"].get(0).unwrap();
        assert!((weight - 0.5).abs() < 1e-9, "got {}", weight);
    }

    #[test]
    fn test_small_barycentric_share_gives_small_weight() {
        let doc = parse("obj_file a.obj\nverts 0\n0 1 2 0.98 0.02 0.0 0 0 0\n");
        let mut base = BoneWeights::new();
        base.add(0, "upperarm01.L", 1.0);
        base.add(1, "lowerarm01.L", 1.0);
        base.add(2, "hand.L", 1.0);

        let groups = transfer_weights(
            &doc,
            &base,
            &skeleton(&["upperarm01.L", "lowerarm01.L", "hand.L"]),
            &TransferOptions::default(),
        );
        assert!((groups["upperarm01.L"].get(0).unwrap() - 0.98).abs() < 1e-9);
        assert!((groups["lowerarm01.L"].get(0).unwrap() - 0.02).abs() < 1e-9);
        // Zero barycentric share contributes nothing.
        assert!(!groups.contains_key("hand.L"));
    }

    #[test]
    fn test_mean_blend_divides_by_contributions() {
        let doc = parse("obj_file a.obj\nverts 0\n0 1 2 0.5 0.5 0.0 0 0 0\n");
        let mut base = BoneWeights::new();
        base.add(0, "G", 1.0);
        base.add(1, "G", 1.0);
        base.add(2, "G", 1.0);

        let options = TransferOptions::default().with_blend(WeightBlend::Mean);
        let groups = transfer_weights(&doc, &base, &skeleton(&["G"]), &options);
        // (0.5 + 0.5 + 0.0) / 3
        assert!((groups["G"].get(0).unwrap() - 1.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_pass_through_keeps_source_weight() {
        let doc = parse("obj_file a.obj\nverts 0\n1\n");
        let mut base = BoneWeights::new();
        base.add(1, "upperarm01.L", 0.8);

        let groups = transfer_weights(
            &doc,
            &base,
            &skeleton(&["upperarm01.L"]),
            &TransferOptions::default(),
        );
        assert!((groups["upperarm01.L"].get(0).unwrap() - 0.8).abs() < 1e-12);
    }

    #[test]
    fn test_groups_outside_skeleton_and_below_threshold_are_omitted() {
        let doc = parse("obj_file a.obj\nverts 0\n0\n1\n");
        let mut base = BoneWeights::new();
        base.add(0, "spine", 1.0);
        base.add(0, "muscle", 1.0);
        base.add(1, "toe", 0.0005);

        let groups = transfer_weights(
            &doc,
            &base,
            &skeleton(&["spine", "toe", "head"]),
            &TransferOptions::default(),
        );
        assert_eq!(groups.keys().collect::<Vec<_>>(), vec!["spine"]);
        assert_eq!(groups["spine"].len(), 1);
    }

    #[test]
    fn test_out_of_range_vertex_is_skipped() {
        let doc = parse("obj_file a.obj\nverts 0\n0\n7\n");
        let mut base = BoneWeights::new();
        base.add(0, "spine", 1.0);

        let groups =
            transfer_weights(&doc, &base, &skeleton(&["spine"]), &TransferOptions::default());
        assert_eq!(groups["spine"].vertices().collect::<Vec<_>>(), vec![0]);
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let mut text = String::from("obj_file a.obj\nverts 0\n");
        for i in 0..100 {
            text.push_str(&format!("{} {} {} 0.2 0.3 0.5 0 0 0\n", i % 5, (i + 2) % 5, (i + 3) % 5));
        }
        let doc = parse(&text);
        let mut base = BoneWeights::new();
        for v in 0..5 {
            base.add(v, "a", 0.1 * (v + 1) as f64);
            if v % 2 == 0 {
                base.add(v, "b", 0.9);
            }
        }
        let names = skeleton(&["a", "b"]);
        let a = transfer_weights(&doc, &base, &names, &TransferOptions::default());
        let b = transfer_weights(&doc, &base, &names, &TransferOptions::default().sequential());
        assert_eq!(a, b);
    }

    #[test]
    fn test_project_group() {
        let doc = parse("obj_file a.obj\nverts 0\n0 1 2 0.3 0.3 0.4 0 0 0\n5\n2\n");
        let members: BTreeSet<usize> = [2, 9].into_iter().collect();
        let group = project_group(&doc, &members, "nipples");
        assert_eq!(group.vertices().collect::<Vec<_>>(), vec![0, 2]);
        assert_eq!(group.get(0), Some(1.0));
    }
}
