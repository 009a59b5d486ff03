//! The JSON weights interchange format.
//!
//! ```json
//! {
//!     "weights": {
//!         "<group>": [[vertex_index, weight], ...]
//!     }
//! }
//! ```
//!
//! Fields other than `weights` are carried through untouched. Numbers keep
//! the exact text they were read with. Documents are written with sorted keys
//! and four-space indentation, so reading and rewriting an unedited document
//! only normalises formatting.
//!
//! The three patch operations never modify the document they are called on;
//! they return an edited copy.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::Path;

use serde::Serialize;
use serde_json::{json, Map, Value};

use super::{BoneWeights, VertexWeightGroup};
use crate::error::{DrapeError, Result};

const WEIGHTS_KEY: &str = "weights";

/// A loaded weights document.
#[derive(Debug, Clone, PartialEq)]
pub struct WeightsDocument {
    root: Map<String, Value>,
}

impl WeightsDocument {
    /// Read a weights document from disk.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)?;
        let value: Value = serde_json::from_str(&text)?;
        Self::from_value(value).map_err(|e| match e {
            DrapeError::LoadError { message, .. } => DrapeError::LoadError {
                path: path.to_path_buf(),
                message,
            },
            other => other,
        })
    }

    /// Wrap a parsed JSON value. The value must be an object with a
    /// `weights` object inside.
    pub fn from_value(value: Value) -> Result<Self> {
        let Value::Object(root) = value else {
            return Err(malformed("document is not a JSON object"));
        };
        match root.get(WEIGHTS_KEY) {
            Some(Value::Object(_)) => Ok(Self { root }),
            Some(_) => Err(malformed("\"weights\" is not an object")),
            None => Err(malformed("document has no \"weights\" object")),
        }
    }

    /// Build a document holding the given groups and nothing else.
    pub fn from_groups<'a, I>(groups: I) -> Self
    where
        I: IntoIterator<Item = &'a VertexWeightGroup>,
    {
        let weights: Map<String, Value> = groups
            .into_iter()
            .map(|group| {
                let entries = group.iter().map(|(v, w)| json!([v, w])).collect();
                (group.name().to_string(), Value::Array(entries))
            })
            .collect();
        let mut root = Map::new();
        root.insert(WEIGHTS_KEY.to_string(), Value::Object(weights));
        Self { root }
    }

    fn weights(&self) -> &Map<String, Value> {
        match self.root.get(WEIGHTS_KEY) {
            Some(Value::Object(map)) => map,
            _ => unreachable!("checked on construction"),
        }
    }

    fn weights_mut(&mut self) -> &mut Map<String, Value> {
        match self.root.get_mut(WEIGHTS_KEY) {
            Some(Value::Object(map)) => map,
            _ => unreachable!("checked on construction"),
        }
    }

    /// Names of all groups, sorted.
    pub fn group_names(&self) -> Vec<&str> {
        self.weights().keys().map(String::as_str).collect()
    }

    /// Whether a group exists.
    pub fn has_group(&self, group: &str) -> bool {
        self.weights().contains_key(group)
    }

    /// Raw entry list of a group.
    pub fn group(&self, group: &str) -> Result<&Vec<Value>> {
        match self.weights().get(group) {
            Some(Value::Array(entries)) => Ok(entries),
            Some(_) => Err(malformed("group entries must be an array")),
            None => Err(missing(group)),
        }
    }

    /// Decoded `(vertex, weight)` entries of a group, in file order.
    pub fn entries(&self, group: &str) -> Result<Vec<(usize, f64)>> {
        self.group(group)?.iter().map(decode_entry).collect()
    }

    /// Copy with the group's entry list emptied.
    pub fn nuke(&self, group: &str) -> Result<Self> {
        let mut edited = self.clone();
        let entries = edited.group_entries_mut(group)?;
        entries.clear();
        log::info!("Emptied group {}", group);
        Ok(edited)
    }

    /// Copy with every weight in the group replaced by `value`.
    ///
    /// Vertex order and entry count are preserved.
    pub fn fill(&self, group: &str, value: f64) -> Result<Self> {
        let replacement = serde_json::Number::from_f64(value)
            .ok_or_else(|| DrapeError::invalid_param("value", value, "must be a finite number"))?;

        let mut edited = self.clone();
        let entries = edited.group_entries_mut(group)?;
        for entry in entries.iter_mut() {
            match entry {
                Value::Array(pair) if pair.len() >= 2 => {
                    pair[1] = Value::Number(replacement.clone());
                }
                _ => return Err(malformed("weight entries must be [vertex, weight] pairs")),
            }
        }
        log::info!("Filled {} entries of {} with {}", entries.len(), group, value);
        Ok(edited)
    }

    /// Copy with the group's entries taken from `source`, replacing what
    /// was there.
    pub fn patch(&self, group: &str, source: &WeightsDocument) -> Result<Self> {
        let mut edited = self.clone();
        // Destination first: a missing group there is the reported error.
        edited.group_entries_mut(group)?;
        let replacement = source.group(group)?.clone();
        let count = replacement.len();
        *edited.group_entries_mut(group)? = replacement;
        log::info!("Patched {} with {} entries", group, count);
        Ok(edited)
    }

    fn group_entries_mut(&mut self, group: &str) -> Result<&mut Vec<Value>> {
        match self.weights_mut().get_mut(group) {
            Some(Value::Array(entries)) => Ok(entries),
            Some(_) => Err(malformed("group entries must be an array")),
            None => Err(missing(group)),
        }
    }

    /// Decode all groups.
    pub fn to_groups(&self) -> Result<BTreeMap<String, VertexWeightGroup>> {
        let mut groups = BTreeMap::new();
        for name in self.group_names() {
            let mut group = VertexWeightGroup::new(name);
            for (v, w) in self.entries(name)? {
                // Zero weights are legal in files but carry no influence.
                if w > 0.0 {
                    group.insert(v, w.min(1.0))?;
                }
            }
            groups.insert(name.to_string(), group);
        }
        Ok(groups)
    }

    /// Per-vertex memberships for the weight transfer engine.
    pub fn to_bone_weights(&self) -> Result<BoneWeights> {
        let groups = self.to_groups()?;
        Ok(BoneWeights::from_groups(groups.values()))
    }

    /// Serialise with sorted keys and four-space indentation.
    pub fn to_string_pretty(&self) -> Result<String> {
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut buffer = Vec::new();
        let mut serializer = serde_json::Serializer::with_formatter(&mut buffer, formatter);
        self.root.serialize(&mut serializer)?;
        // serde_json only emits UTF-8.
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }

    /// Write the document to `path` atomically.
    ///
    /// The text goes to a temporary file in the destination directory which
    /// then replaces `path`, so a failed write leaves any previous file intact.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let text = self.to_string_pretty()?;

        let directory = match path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };
        let mut temp = tempfile::NamedTempFile::new_in(directory)?;
        temp.write_all(text.as_bytes())?;
        temp.flush()?;
        temp.persist(path).map_err(|e| DrapeError::SaveError {
            path: path.to_path_buf(),
            message: e.error.to_string(),
        })?;

        log::debug!("Wrote {}", path.display());
        Ok(())
    }
}

fn decode_entry(entry: &Value) -> Result<(usize, f64)> {
    let pair = entry
        .as_array()
        .filter(|pair| pair.len() >= 2)
        .ok_or_else(|| malformed("weight entries must be [vertex, weight] pairs"))?;
    let vertex = pair[0]
        .as_u64()
        .ok_or_else(|| malformed("vertex index must be a non-negative integer"))?;
    let weight = pair[1]
        .as_f64()
        .ok_or_else(|| malformed("weight must be a number"))?;
    Ok((vertex as usize, weight))
}

fn malformed(message: &str) -> DrapeError {
    DrapeError::LoadError {
        path: "<weights>".into(),
        message: message.to_string(),
    }
}

fn missing(group: &str) -> DrapeError {
    DrapeError::MissingGroup {
        group: group.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> WeightsDocument {
        WeightsDocument::from_value(json!({
            "name": "default",
            "version": 110,
            "weights": {
                "Delete": [[1, 1.0], [2, 1.0]],
                "spine01": [[4, 0.25], [3, 0.75]]
            }
        }))
        .unwrap()
    }

    #[test]
    fn test_nuke_empties_only_that_group() {
        let doc = sample();
        let nuked = doc.nuke("Delete").unwrap();

        assert!(nuked.group("Delete").unwrap().is_empty());
        assert_eq!(nuked.group("spine01").unwrap(), doc.group("spine01").unwrap());
        assert_eq!(nuked.root["name"], json!("default"));
        // The original is untouched.
        assert_eq!(doc.group("Delete").unwrap().len(), 2);

        let text = nuked.to_string_pretty().unwrap();
        assert!(text.contains("\"Delete\": []"));
    }

    #[test]
    fn test_fill_keeps_order_and_count() {
        let filled = sample().fill("spine01", 0.25).unwrap();
        assert_eq!(filled.entries("spine01").unwrap(), vec![(4, 0.25), (3, 0.25)]);
    }

    #[test]
    fn test_patch_copies_from_source() {
        let dest = sample();
        let source = WeightsDocument::from_value(json!({
            "weights": { "spine01": [[9, 0.5]] }
        }))
        .unwrap();

        let patched = dest.patch("spine01", &source).unwrap();
        assert_eq!(patched.entries("spine01").unwrap(), vec![(9, 0.5)]);
        assert_eq!(patched.entries("Delete").unwrap(), vec![(1, 1.0), (2, 1.0)]);
    }

    #[test]
    fn test_missing_group() {
        let doc = sample();
        assert!(matches!(doc.nuke("head"), Err(DrapeError::MissingGroup { .. })));
        assert!(matches!(doc.fill("head", 1.0), Err(DrapeError::MissingGroup { .. })));

        let source = WeightsDocument::from_value(json!({ "weights": { "head": [] } })).unwrap();
        assert!(matches!(
            doc.patch("head", &source),
            Err(DrapeError::MissingGroup { group }) if group == "head"
        ));
    }

    #[test]
    fn test_rejects_document_without_weights() {
        assert!(WeightsDocument::from_value(json!({ "name": "x" })).is_err());
        assert!(WeightsDocument::from_value(json!([1, 2])).is_err());
    }

    #[test]
    fn test_pretty_output_is_sorted_and_indented() {
        let text = sample().to_string_pretty().unwrap();
        let name = text.find("\"name\"").unwrap();
        let version = text.find("\"version\"").unwrap();
        let weights = text.find("\"weights\"").unwrap();
        assert!(name < version && version < weights);
        assert!(text.starts_with("{\n    \"name\": \"default\","));
    }

    #[test]
    fn test_unedited_rewrite_is_stable() {
        let dir = tempfile::tempdir().unwrap();
        let first = dir.path().join("first.json");
        let second = dir.path().join("second.json");

        sample().save(&first).unwrap();
        WeightsDocument::load(&first).unwrap().save(&second).unwrap();
        assert_eq!(
            fs::read_to_string(&first).unwrap(),
            fs::read_to_string(&second).unwrap()
        );
    }

    #[test]
    fn test_rewrite_keeps_number_text() {
        let text = "{\n    \"name\": \"default\",\n    \"weights\": {\n        \"Delete\": [\n            [\n                1,\n                1e-05\n            ],\n            [\n                2,\n                0.123456789012345678\n            ]\n        ],\n        \"spine01\": []\n    }\n}";
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("weights.json");
        let copy = dir.path().join("copy.json");
        fs::write(&source, text).unwrap();

        WeightsDocument::load(&source).unwrap().save(&copy).unwrap();
        assert_eq!(fs::read_to_string(&copy).unwrap(), text);
    }

    #[test]
    fn test_to_bone_weights() {
        let weights = sample().to_bone_weights().unwrap();
        assert_eq!(weights.vertex_count(), 5);
        assert_eq!(weights.groups_of(3), &[("spine01".to_string(), 0.75)]);
    }

    #[test]
    fn test_from_groups() {
        let group = VertexWeightGroup::uniform("Delete", [3, 1], 1.0).unwrap();
        let doc = WeightsDocument::from_groups([&group]);
        assert_eq!(doc.entries("Delete").unwrap(), vec![(1, 1.0), (3, 1.0)]);
    }
}
