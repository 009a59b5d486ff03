//! Wavefront OBJ support.
//!
//! Only geometry is read: `v` positions and `f` polygons. Texture and normal
//! references in face corners (`v/vt/vn`) are accepted and dropped. Negative
//! (relative) indices are resolved against the vertices read so far.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use nalgebra::Point3;

use crate::error::{DrapeError, Result};
use crate::mesh::PolyMesh;

/// Load a mesh from an OBJ file.
pub fn load<P: AsRef<Path>>(path: P) -> Result<PolyMesh> {
    let path = path.as_ref();
    let reader = BufReader::new(File::open(path)?);
    read(reader).map_err(|e| match e {
        DrapeError::LoadError { message, .. } => DrapeError::LoadError {
            path: path.to_path_buf(),
            message,
        },
        other => other,
    })
}

/// Read OBJ geometry from any buffered reader.
pub fn read<R: BufRead>(reader: R) -> Result<PolyMesh> {
    let mut positions: Vec<Point3<f64>> = Vec::new();
    let mut faces: Vec<Vec<usize>> = Vec::new();

    for (number, line) in reader.lines().enumerate() {
        let line = line?;
        let mut words = line.split_whitespace();
        match words.next() {
            Some("v") => {
                let coords: Vec<f64> = words
                    .take(3)
                    .map(|w| w.parse::<f64>())
                    .collect::<std::result::Result<_, _>>()
                    .map_err(|e| load_error(number, e))?;
                if coords.len() != 3 {
                    return Err(load_error(number, "vertex needs three coordinates"));
                }
                positions.push(Point3::new(coords[0], coords[1], coords[2]));
            }
            Some("f") => {
                let mut face = Vec::new();
                for corner in words {
                    let index = corner.split('/').next().unwrap_or(corner);
                    let index: i64 = index.parse().map_err(|e| load_error(number, e))?;
                    let resolved = if index > 0 {
                        index - 1
                    } else {
                        positions.len() as i64 + index
                    };
                    if index == 0 || resolved < 0 {
                        return Err(load_error(number, format!("bad face index {}", index)));
                    }
                    face.push(resolved as usize);
                }
                if face.len() < 3 {
                    return Err(load_error(number, "face needs at least three vertices"));
                }
                faces.push(face);
            }
            _ => {}
        }
    }

    PolyMesh::new(positions, faces)
}

fn load_error<E: std::fmt::Display>(line: usize, error: E) -> DrapeError {
    DrapeError::LoadError {
        path: "<obj>".into(),
        message: format!("line {}: {}", line + 1, error),
    }
}

/// Save a mesh to an OBJ file.
pub fn save<P: AsRef<Path>>(mesh: &PolyMesh, path: P) -> Result<()> {
    let file = File::create(path.as_ref())?;
    let mut writer = BufWriter::new(file);
    write(mesh, &mut writer)?;
    writer.flush()?;
    Ok(())
}

/// Write OBJ geometry.
pub fn write<W: Write>(mesh: &PolyMesh, writer: &mut W) -> Result<()> {
    writeln!(writer, "# Generated by drape")?;
    for p in mesh.positions() {
        writeln!(writer, "v {} {} {}", p.x, p.y, p.z)?;
    }
    for face in mesh.faces() {
        write!(writer, "f")?;
        for &v in face {
            write!(writer, " {}", v + 1)?;
        }
        writeln!(writer)?;
    }
    Ok(())
}
