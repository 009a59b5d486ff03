//! Line-oriented MHCLO grammar.
//!
//! Parsing is a finite-state machine over three [`Section`]s. [`step`] is a pure
//! transition function: given the current section and one line it returns the
//! next section and at most one [`Directive`] describing what the line adds to
//! the document. Applying directives is left to the caller.

use nalgebra::Vector3;

use super::axis::{file_to_world, Axis};
use super::{License, ScaleAnchor, VertexRef};

/// Parser state carried from one line to the next.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Section {
    /// Lines are interpreted as `key value...` pairs.
    #[default]
    None,
    /// Lines are vertex references following a `verts` key.
    VertexListing,
    /// Lines are vertex indices following a `delete_verts` key.
    DeleteListing,
}

/// A single document mutation produced by one line.
#[derive(Debug, Clone, PartialEq)]
pub enum Directive {
    /// `# author <name>`
    Author(String),
    /// `# license ...`
    License(License),
    /// `# description <words...>`
    Description(String),
    /// `material <path>`, unresolved.
    Material(String),
    /// `obj_file <path>`, unresolved.
    ObjFile(String),
    /// `verts <first>`
    BeginVertices {
        /// The declared first index. Vertices are always renumbered from zero.
        first: usize,
    },
    /// `x_scale|y_scale|z_scale <a> <b> <divisor>`
    Scale(Axis, ScaleAnchor),
    /// `name <token>`
    Name(String),
    /// `z_depth <int>`
    ZDepth(i32),
    /// `uuid <token>`
    Uuid(String),
    /// `tag <token>`, already lowercased.
    Tag(String),
    /// `delete_verts`
    BeginDelete,
    /// One entry of the vertex listing.
    Vertex(VertexRef),
    /// Indices from one line of the delete listing, ranges expanded.
    Delete(Vec<usize>),
}

/// Outcome of [`step`]: the next section and an optional mutation.
pub type Transition = (Section, Option<Directive>);

/// Advance the state machine by one line.
///
/// Errors are plain messages; the caller attaches the path and line number.
pub fn step(section: Section, line: &str) -> Result<Transition, String> {
    let words: Vec<&str> = line.split_whitespace().collect();

    let Some(&first) = words.first() else {
        return Ok((Section::None, None));
    };

    if first.starts_with('#') {
        return Ok((section, parse_comment(line, &words)));
    }

    if first == "material" {
        let path = argument(&words, 1, "material")?;
        return Ok((section, Some(Directive::Material(path.to_string()))));
    }

    // Ancient assets carry inline bone weights; they are ignored.
    if first.starts_with("vertexboneweights") {
        return Ok((section, None));
    }

    match section {
        Section::VertexListing if is_numeric(first) => {
            let vertex = parse_vertex(&words)?;
            Ok((Section::VertexListing, Some(Directive::Vertex(vertex))))
        }
        Section::DeleteListing if is_numeric(first) => {
            let indices = parse_delete(&words)?;
            Ok((Section::DeleteListing, Some(Directive::Delete(indices))))
        }
        _ => parse_key(&words),
    }
}

fn parse_comment(line: &str, words: &[&str]) -> Option<Directive> {
    if words.len() < 3 {
        return None;
    }

    let key = words[1].to_lowercase();
    if key.contains("author") {
        Some(Directive::Author(words[2].to_string()))
    } else if key.contains("license") {
        let lower = line.to_lowercase();
        if lower.contains("by") {
            Some(Directive::License(License::CcBy))
        } else if lower.contains("apgl") {
            Some(Directive::License(License::Agpl))
        } else {
            None
        }
    } else if key.contains("description") {
        Some(Directive::Description(words[2..].join(" ")))
    } else {
        None
    }
}

fn parse_key(words: &[&str]) -> Result<Transition, String> {
    let key = words[0];
    let directive = match key {
        "obj_file" => Directive::ObjFile(argument(words, 1, key)?.to_string()),
        "verts" => {
            // Without a count the key is inert.
            let Some(first) = words.get(1) else {
                return Ok((Section::None, None));
            };
            let first = parse_index(first)?;
            return Ok((Section::VertexListing, Some(Directive::BeginVertices { first })));
        }
        "x_scale" => Directive::Scale(Axis::X, parse_anchor(words)?),
        "y_scale" => Directive::Scale(Axis::Y, parse_anchor(words)?),
        "z_scale" => Directive::Scale(Axis::Z, parse_anchor(words)?),
        "name" => Directive::Name(argument(words, 1, key)?.to_string()),
        "z_depth" => {
            let value = argument(words, 1, key)?;
            let depth = value
                .parse::<i32>()
                .map_err(|_| format!("invalid z_depth '{}'", value))?;
            Directive::ZDepth(depth)
        }
        "uuid" => Directive::Uuid(argument(words, 1, key)?.to_string()),
        "tag" => Directive::Tag(argument(words, 1, key)?.to_lowercase()),
        "delete_verts" => return Ok((Section::DeleteListing, Some(Directive::BeginDelete))),
        _ => return Ok((Section::None, None)),
    };
    Ok((Section::None, Some(directive)))
}

fn parse_vertex(words: &[&str]) -> Result<VertexRef, String> {
    match words.len() {
        1 => Ok(VertexRef::pass_through(parse_index(words[0])?)),
        n if n >= 9 => {
            let source_indices = [
                parse_index(words[0])?,
                parse_index(words[1])?,
                parse_index(words[2])?,
            ];
            let source_weights = [
                parse_float(words[3])?,
                parse_float(words[4])?,
                parse_float(words[5])?,
            ];
            let offset: Vector3<f64> = file_to_world([
                parse_float(words[6])?,
                parse_float(words[7])?,
                parse_float(words[8])?,
            ]);
            Ok(VertexRef {
                source_indices,
                source_weights,
                offset,
            })
        }
        n => Err(format!(
            "vertex reference has {} fields, expected 1 or at least 9",
            n
        )),
    }
}

fn parse_delete(words: &[&str]) -> Result<Vec<usize>, String> {
    let mut indices = Vec::with_capacity(words.len());
    let mut previous: Option<usize> = None;
    let mut in_range = false;

    for &word in words {
        if word == "-" {
            in_range = true;
            continue;
        }
        let index = parse_index(word)?;
        match (in_range, previous) {
            (true, Some(start)) => indices.extend((start..=index).skip(1)),
            _ => indices.push(index),
        }
        in_range = false;
        previous = Some(index);
    }

    Ok(indices)
}

fn parse_anchor(words: &[&str]) -> Result<ScaleAnchor, String> {
    let key = words[0];
    let index_a = parse_index(argument(words, 1, key)?)?;
    let index_b = parse_index(argument(words, 2, key)?)?;
    let divisor = parse_float(argument(words, 3, key)?)?;
    if divisor == 0.0 || !divisor.is_finite() {
        return Err(format!("{} divisor must be a non-zero number", key));
    }
    Ok(ScaleAnchor {
        index_a,
        index_b,
        divisor,
    })
}

fn argument<'a>(words: &[&'a str], position: usize, key: &str) -> Result<&'a str, String> {
    words
        .get(position)
        .copied()
        .ok_or_else(|| format!("{} is missing argument {}", key, position))
}

fn parse_index(word: &str) -> Result<usize, String> {
    word.parse::<usize>()
        .map_err(|_| format!("invalid vertex index '{}'", word))
}

fn parse_float(word: &str) -> Result<f64, String> {
    word.parse::<f64>()
        .map_err(|_| format!("invalid number '{}'", word))
}

/// Matches a token made only of decimal digits.
fn is_numeric(word: &str) -> bool {
    !word.is_empty() && word.bytes().all(|b| b.is_ascii_digit())
}
