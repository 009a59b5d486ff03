//! MHCLO correspondence documents.
//!
//! An MHCLO document ties every vertex of an auxiliary mesh (clothes, hair,
//! eyebrows...) to three base-mesh vertices with barycentric weights and a
//! residual offset. It may also list base-mesh vertices that the auxiliary
//! mesh hides and should therefore be masked.
//!
//! # Example
//!
//! ```
//! use drape::mhclo::CorrespondenceDocument;
//!
//! let text = "\
//! name shirt
//! obj_file shirt.obj
//! verts 0
//! 12
//! 3 4 5 0.2 0.3 0.5 1.0 2.0 3.0
//!
//! delete_verts
//! 10 - 13 20
//! ";
//!
//! let doc = CorrespondenceDocument::parse_str(text, "/assets/shirt").unwrap();
//! assert_eq!(doc.name(), "shirt");
//! assert_eq!(doc.vertex_refs().len(), 2);
//! assert_eq!(doc.delete_indices(), &[10, 11, 12, 13, 20]);
//! ```

pub mod axis;
pub mod parser;

use std::collections::BTreeSet;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

use nalgebra::Vector3;

use crate::error::{DrapeError, ParseWarning, Result};

pub use axis::Axis;
pub use parser::{step, Directive, Section};

/// Default name of the base-mesh group that masks hidden vertices.
pub const DEFAULT_DELETE_GROUP: &str = "Delete";

/// License tag recognised in a `# license` comment.
///
/// `Agpl` is detected from the literal token `apgl` that existing assets use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum License {
    /// Public domain dedication.
    #[default]
    Cc0,
    /// Creative Commons Attribution.
    CcBy,
    /// GNU Affero GPL.
    Agpl,
}

impl License {
    /// The tag string stored on assets.
    pub fn as_str(self) -> &'static str {
        match self {
            License::Cc0 => "CC0",
            License::CcBy => "CC-BY",
            License::Agpl => "AGPL",
        }
    }
}

impl std::fmt::Display for License {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Two base-mesh vertices whose distance along one axis, divided by
/// `divisor`, gives a size-normalisation factor for that axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScaleAnchor {
    /// First base-mesh vertex.
    pub index_a: usize,
    /// Second base-mesh vertex.
    pub index_b: usize,
    /// Reference distance in the authoring mesh.
    pub divisor: f64,
}

/// Optional scale anchors, one per file axis.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ScaleAnchors {
    /// Anchor declared by `x_scale`.
    pub x: Option<ScaleAnchor>,
    /// Anchor declared by `y_scale`.
    pub y: Option<ScaleAnchor>,
    /// Anchor declared by `z_scale`.
    pub z: Option<ScaleAnchor>,
}

impl ScaleAnchors {
    /// The anchor for a file axis, if declared.
    pub fn get(&self, axis: Axis) -> Option<&ScaleAnchor> {
        match axis {
            Axis::X => self.x.as_ref(),
            Axis::Y => self.y.as_ref(),
            Axis::Z => self.z.as_ref(),
        }
    }

    fn set(&mut self, axis: Axis, anchor: ScaleAnchor) {
        match axis {
            Axis::X => self.x = Some(anchor),
            Axis::Y => self.y = Some(anchor),
            Axis::Z => self.z = Some(anchor),
        }
    }

    /// Whether all three axes have anchors.
    pub fn is_complete(&self) -> bool {
        self.x.is_some() && self.y.is_some() && self.z.is_some()
    }

    /// Whether no axis has an anchor.
    pub fn is_empty(&self) -> bool {
        self.x.is_none() && self.y.is_none() && self.z.is_none()
    }
}

/// How one auxiliary vertex derives from the base mesh.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VertexRef {
    /// The three base-mesh vertices.
    pub source_indices: [usize; 3],
    /// Barycentric weights, summing to roughly one.
    pub source_weights: [f64; 3],
    /// Residual offset in world axes, before size normalisation.
    pub offset: Vector3<f64>,
}

impl VertexRef {
    /// A reference that copies one base-mesh vertex exactly.
    pub fn pass_through(index: usize) -> Self {
        Self {
            source_indices: [index; 3],
            source_weights: [1.0, 0.0, 0.0],
            offset: Vector3::zeros(),
        }
    }

    /// Largest referenced base-mesh index.
    #[inline]
    pub fn max_source(&self) -> usize {
        self.source_indices.iter().copied().max().unwrap_or(0)
    }

    /// Iterate `(source_index, barycentric_weight)` pairs.
    pub fn sources(&self) -> impl Iterator<Item = (usize, f64)> + '_ {
        self.source_indices
            .iter()
            .copied()
            .zip(self.source_weights.iter().copied())
    }
}

/// A parsed MHCLO document. Read-only once constructed.
#[derive(Debug, Clone, PartialEq)]
pub struct CorrespondenceDocument {
    source_mesh_path: Option<PathBuf>,
    material_path: Option<PathBuf>,
    scale_anchors: ScaleAnchors,
    vertex_refs: Vec<VertexRef>,
    delete_indices: Vec<usize>,
    has_delete_group: bool,
    first_vertex: usize,
    author: String,
    license: License,
    name: String,
    description: String,
    tags: BTreeSet<String>,
    z_depth: i32,
    uuid: Option<String>,
    delete_group_name: String,
    warnings: Vec<ParseWarning>,
}

impl Default for CorrespondenceDocument {
    fn default() -> Self {
        Self {
            source_mesh_path: None,
            material_path: None,
            scale_anchors: ScaleAnchors::default(),
            vertex_refs: Vec::new(),
            delete_indices: Vec::new(),
            has_delete_group: false,
            first_vertex: 0,
            author: "unknown".to_string(),
            license: License::Cc0,
            name: "imported_cloth".to_string(),
            description: "no description".to_string(),
            tags: BTreeSet::new(),
            z_depth: 50,
            uuid: None,
            delete_group_name: DEFAULT_DELETE_GROUP.to_string(),
            warnings: Vec::new(),
        }
    }
}

impl CorrespondenceDocument {
    /// Load and parse a document from disk.
    ///
    /// Invalid UTF-8 is replaced rather than rejected. Relative paths inside
    /// the document resolve against the directory containing the file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if path.as_os_str().is_empty() {
            return Err(DrapeError::invalid_param("path", "\"\"", "cannot load an empty file name"));
        }

        log::debug!("Parsing MHCLO document {}", path.display());
        let bytes = fs::read(path)?;
        let real = fs::canonicalize(path)?;
        let folder = real.parent().unwrap_or_else(|| Path::new(""));

        Self::parse_bytes(&bytes, path, folder)
    }

    /// Parse a document from a reader.
    pub fn parse_reader<R: Read, P: AsRef<Path>>(mut reader: R, base_dir: P) -> Result<Self> {
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes)?;
        Self::parse_bytes(&bytes, Path::new("<memory>"), base_dir.as_ref())
    }

    /// Parse a document held in memory.
    pub fn parse_str<P: AsRef<Path>>(text: &str, base_dir: P) -> Result<Self> {
        Self::parse_text(text, Path::new("<memory>"), base_dir.as_ref())
    }

    fn parse_bytes(bytes: &[u8], origin: &Path, base_dir: &Path) -> Result<Self> {
        let text = String::from_utf8_lossy(bytes);
        Self::parse_text(&text, origin, base_dir)
    }

    fn parse_text(text: &str, origin: &Path, base_dir: &Path) -> Result<Self> {
        let mut doc = Self::default();
        let mut section = Section::None;

        for (number, line) in text.lines().enumerate() {
            let (next, directive) = step(section, line).map_err(|message| DrapeError::Parse {
                path: origin.to_path_buf(),
                line: number + 1,
                message,
            })?;
            if let Some(directive) = directive {
                doc.apply(directive, base_dir);
            }
            section = next;
        }

        if doc.source_mesh_path.is_none() {
            log::warn!(
                "{}: reached end of document without finding an obj_file reference",
                origin.display()
            );
            doc.warnings.push(ParseWarning::MissingMeshReference);
        }

        log::debug!(
            "Parsed {} vertex references and {} delete indices",
            doc.vertex_refs.len(),
            doc.delete_indices.len()
        );

        Ok(doc)
    }

    fn apply(&mut self, directive: Directive, base_dir: &Path) {
        match directive {
            Directive::Author(author) => self.author = author,
            Directive::License(license) => self.license = license,
            Directive::Description(description) => self.description = description,
            Directive::Material(path) => self.material_path = Some(base_dir.join(path)),
            Directive::ObjFile(path) => self.source_mesh_path = Some(base_dir.join(path)),
            Directive::BeginVertices { first } => self.first_vertex = first,
            Directive::Scale(axis, anchor) => self.scale_anchors.set(axis, anchor),
            Directive::Name(name) => self.name = name,
            Directive::ZDepth(depth) => self.z_depth = depth,
            Directive::Uuid(uuid) => self.uuid = Some(uuid),
            Directive::Tag(tag) => {
                self.tags.insert(tag);
            }
            Directive::BeginDelete => self.has_delete_group = true,
            Directive::Vertex(vertex) => self.vertex_refs.push(vertex),
            Directive::Delete(indices) => self.delete_indices.extend(indices),
        }
    }

    /// Record whether the document covers an auxiliary mesh of `vertex_count` vertices.
    ///
    /// Returns the warning when the counts differ. The warning is also kept on
    /// the document.
    pub fn validate_vertex_count(&mut self, vertex_count: usize) -> Option<ParseWarning> {
        if vertex_count == self.vertex_refs.len() {
            return None;
        }
        let warning = ParseWarning::VertexCountMismatch {
            expected: vertex_count,
            actual: self.vertex_refs.len(),
        };
        log::warn!("{}", warning);
        self.warnings.push(warning.clone());
        Some(warning)
    }

    /// Path to the auxiliary geometry, resolved against the document folder.
    pub fn source_mesh_path(&self) -> Option<&Path> {
        self.source_mesh_path.as_deref()
    }

    /// Path to the material file, resolved against the document folder.
    pub fn material_path(&self) -> Option<&Path> {
        self.material_path.as_deref()
    }

    /// Declared scale anchors.
    pub fn scale_anchors(&self) -> &ScaleAnchors {
        &self.scale_anchors
    }

    /// One reference per auxiliary vertex, in auxiliary vertex order.
    pub fn vertex_refs(&self) -> &[VertexRef] {
        &self.vertex_refs
    }

    /// Base-mesh vertices to mask, in file order. May contain duplicates.
    pub fn delete_indices(&self) -> &[usize] {
        &self.delete_indices
    }

    /// Deduplicated delete indices.
    pub fn delete_index_set(&self) -> BTreeSet<usize> {
        self.delete_indices.iter().copied().collect()
    }

    /// Whether a `delete_verts` section was present.
    pub fn has_delete_group(&self) -> bool {
        self.has_delete_group
    }

    /// The `verts <n>` value. Informational only.
    pub fn first_vertex(&self) -> usize {
        self.first_vertex
    }

    pub fn author(&self) -> &str {
        &self.author
    }

    pub fn license(&self) -> License {
        self.license
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn tags(&self) -> &BTreeSet<String> {
        &self.tags
    }

    /// Tags joined with commas.
    pub fn tag_string(&self) -> String {
        self.tags.iter().cloned().collect::<Vec<_>>().join(",")
    }

    pub fn z_depth(&self) -> i32 {
        self.z_depth
    }

    pub fn uuid(&self) -> Option<&str> {
        self.uuid.as_deref()
    }

    pub fn delete_group_name(&self) -> &str {
        &self.delete_group_name
    }

    /// Warnings collected while parsing and validating.
    pub fn warnings(&self) -> &[ParseWarning] {
        &self.warnings
    }

    /// Metadata as `(property, value)` pairs for a host to store on an object.
    pub fn metadata_properties(&self) -> Vec<(&'static str, String)> {
        let mut properties = vec![
            ("author", self.author.clone()),
            ("delete_group", self.delete_group_name.clone()),
            ("description", self.description.clone()),
            ("license", self.license.to_string()),
            ("name", self.name.clone()),
            ("tag", self.tag_string()),
        ];
        if let Some(uuid) = &self.uuid {
            properties.push(("uuid", uuid.clone()));
        }
        properties.push(("z_depth", self.z_depth.to_string()));
        properties
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SHIRT: &str = "\
# author Jane
# license CC-BY 4.0
# description A plain shirt
name shirt
uuid 1234-abcd
tag Shirt
tag casual
z_depth 31
obj_file shirt.obj
material shirt.mhmat
x_scale 5399 11998 1.4800
y_scale 791 881 2.3298
z_scale 962 5320 1.9221
verts 0
12
3 4 5 0.2 0.3 0.5 1.0 2.0 3.0

delete_verts
10 - 13 20
";

    #[test]
    fn test_parse_full_document() {
        let doc = CorrespondenceDocument::parse_str(SHIRT, "/assets/shirt").unwrap();

        assert_eq!(doc.author(), "Jane");
        assert_eq!(doc.license(), License::CcBy);
        assert_eq!(doc.description(), "A plain shirt");
        assert_eq!(doc.name(), "shirt");
        assert_eq!(doc.uuid(), Some("1234-abcd"));
        assert_eq!(doc.tag_string(), "casual,shirt");
        assert_eq!(doc.z_depth(), 31);
        assert_eq!(doc.source_mesh_path(), Some(Path::new("/assets/shirt/shirt.obj")));
        assert_eq!(doc.material_path(), Some(Path::new("/assets/shirt/shirt.mhmat")));
        assert!(doc.scale_anchors().is_complete());
        assert_eq!(doc.scale_anchors().y.unwrap().index_b, 881);

        assert_eq!(doc.vertex_refs().len(), 2);
        assert_eq!(doc.vertex_refs()[0], VertexRef::pass_through(12));
        assert_eq!(doc.vertex_refs()[1].offset, Vector3::new(1.0, -3.0, 2.0));

        assert!(doc.has_delete_group());
        assert_eq!(
            doc.delete_index_set(),
            [10, 11, 12, 13, 20].into_iter().collect::<BTreeSet<_>>()
        );
        assert!(doc.warnings().is_empty());
    }

    #[test]
    fn test_defaults_and_missing_mesh_warning() {
        let doc = CorrespondenceDocument::parse_str("name hat\n", "/tmp").unwrap();
        assert_eq!(doc.author(), "unknown");
        assert_eq!(doc.license(), License::Cc0);
        assert_eq!(doc.z_depth(), 50);
        assert_eq!(doc.delete_group_name(), DEFAULT_DELETE_GROUP);
        assert!(!doc.has_delete_group());
        assert_eq!(doc.warnings(), &[ParseWarning::MissingMeshReference]);
    }

    #[test]
    fn test_vertex_indices_renumbered_from_zero() {
        let doc =
            CorrespondenceDocument::parse_str("obj_file a.obj\nverts 7\n1\n2\n3\n", "/").unwrap();
        assert_eq!(doc.first_vertex(), 7);
        assert_eq!(doc.vertex_refs().len(), 3);
        assert_eq!(doc.vertex_refs()[0].source_indices, [1, 1, 1]);
    }

    #[test]
    fn test_listing_terminator_is_processed() {
        let doc = CorrespondenceDocument::parse_str(
            "verts 0\n1\n2\nobj_file late.obj\n3\n",
            "/base",
        )
        .unwrap();
        // The trailing "3" arrives after the listing closed and is ignored.
        assert_eq!(doc.vertex_refs().len(), 2);
        assert_eq!(doc.source_mesh_path(), Some(Path::new("/base/late.obj")));
    }

    #[test]
    fn test_parse_error_reports_line() {
        let err = CorrespondenceDocument::parse_str("verts 0\n1\n1 2 3\n", "/").unwrap_err();
        match err {
            DrapeError::Parse { line, .. } => assert_eq!(line, 3),
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_invalid_utf8_is_tolerated() {
        let mut bytes = b"# author J\xffrgen\nobj_file a.obj\nverts 0\n4\n".to_vec();
        bytes.extend_from_slice(b"5\n");
        let doc = CorrespondenceDocument::parse_reader(&bytes[..], "/").unwrap();
        assert_eq!(doc.author(), "J\u{fffd}rgen");
        assert_eq!(doc.vertex_refs().len(), 2);
    }

    #[test]
    fn test_load_resolves_relative_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("boots.mhclo");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "obj_file boots.obj").unwrap();
        drop(file);

        let doc = CorrespondenceDocument::load(&path).unwrap();
        let expected = std::fs::canonicalize(dir.path()).unwrap().join("boots.obj");
        assert_eq!(doc.source_mesh_path(), Some(expected.as_path()));
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let err = CorrespondenceDocument::load("/definitely/not/here.mhclo").unwrap_err();
        assert!(matches!(err, DrapeError::Io(_)));
    }

    #[test]
    fn test_validate_vertex_count() {
        let mut doc = CorrespondenceDocument::parse_str("obj_file a.obj\nverts 0\n1\n", "/").unwrap();
        assert_eq!(doc.validate_vertex_count(1), None);
        assert_eq!(
            doc.validate_vertex_count(4),
            Some(ParseWarning::VertexCountMismatch {
                expected: 4,
                actual: 1
            })
        );
        assert_eq!(doc.warnings().len(), 1);
    }

    #[test]
    fn test_metadata_properties() {
        let doc = CorrespondenceDocument::parse_str(SHIRT, "/").unwrap();
        let props = doc.metadata_properties();
        assert!(props.contains(&("license", "CC-BY".to_string())));
        assert!(props.contains(&("z_depth", "31".to_string())));
        assert!(props.contains(&("uuid", "1234-abcd".to_string())));
    }
}
