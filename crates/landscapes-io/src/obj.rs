// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Wavefront OBJ reader and writer
//!
//! This is the only place where 1-based external indices meet the 0-based
//! indices of [`Mesh`].

use std::fs;
use std::io::{BufWriter, Write};
use std::path::Path;

use landscapes_model::Mesh;
use memchr::{memchr, memchr_iter};
use nom::{
    branch::alt,
    bytes::complete::{take_while, take_while1},
    character::complete::char,
    combinator::{opt, recognize},
    multi::{many0, many1},
    sequence::{pair, preceded},
    IResult, Parser,
};

use crate::{FormatError, Result};

/// Material reference written as the `mtllib` / `usemtl` header
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MaterialRef {
    pub library: String,
    pub name: String,
}

impl MaterialRef {
    pub fn new(library: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            library: library.into(),
            name: name.into(),
        }
    }
}

/// OBJ output formatting
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ObjWriteOptions {
    /// Decimals for vertex coordinates
    pub position_precision: usize,
    /// Decimals for texture coordinates
    pub uv_precision: usize,
    /// Optional material header
    pub material: Option<MaterialRef>,
}

impl Default for ObjWriteOptions {
    fn default() -> Self {
        Self {
            position_precision: 3,
            uv_precision: 4,
            material: None,
        }
    }
}

impl ObjWriteOptions {
    /// Terrain tiles: centimeter heights and the shared terrain material
    pub fn terrain() -> Self {
        Self {
            uv_precision: 4,
            ..Self::default()
        }
        .with_position_precision(2)
        .with_material(MaterialRef::new("terrain.mtl", "material0"))
    }

    /// Buildings: millimeter coordinates, untextured
    pub fn buildings() -> Self {
        Self::default()
    }

    pub fn with_position_precision(mut self, precision: usize) -> Self {
        self.position_precision = precision;
        self
    }

    pub fn with_material(mut self, material: MaterialRef) -> Self {
        self.material = Some(material);
        self
    }
}

/// Serialize a mesh as OBJ
///
/// Emits `v` records, then `vt` records when the mesh has texture
/// coordinates, then one `f` record per triangle (`f a/a b/b c/c` with
/// texture coordinates, `f a b c` without).
pub fn write_obj<W: Write>(writer: W, mesh: &Mesh, options: &ObjWriteOptions) -> Result<()> {
    mesh.validate()?;
    let mut w = BufWriter::new(writer);

    if let Some(material) = &options.material {
        writeln!(w, "mtllib {}", material.library)?;
        writeln!(w, "usemtl {}", material.name)?;
    }

    let p = options.position_precision;
    for v in mesh.vertices() {
        writeln!(w, "v {:.*} {:.*} {:.*}", p, v[0], p, v[1], p, v[2])?;
    }

    let textured = mesh.has_uvs();
    if textured {
        let q = options.uv_precision;
        for uv in mesh.uvs.chunks_exact(2) {
            writeln!(w, "vt {:.*} {:.*}", q, uv[0], q, uv[1])?;
        }
    }

    for [a, b, c] in mesh.triangles() {
        let (a, b, c) = (a + 1, b + 1, c + 1);
        if textured {
            writeln!(w, "f {a}/{a} {b}/{b} {c}/{c}")?;
        } else {
            writeln!(w, "f {a} {b} {c}")?;
        }
    }

    w.flush()?;
    Ok(())
}

/// Serialize a mesh into an in-memory OBJ document
pub fn to_obj_string(mesh: &Mesh, options: &ObjWriteOptions) -> Result<String> {
    let mut buffer = Vec::new();
    write_obj(&mut buffer, mesh, options)?;
    String::from_utf8(buffer).map_err(|e| FormatError::obj(0, e.to_string()))
}

/// Read an OBJ file into a triangle mesh
pub fn read_obj(path: impl AsRef<Path>) -> Result<Mesh> {
    let content = fs::read_to_string(path)?;
    parse_obj(&content)
}

/// Parse an OBJ document
///
/// Polygons are fan-triangulated. Texture coordinates are kept only when
/// they pair one-to-one with vertices, which is how this crate writes them.
pub fn parse_obj(input: &str) -> Result<Mesh> {
    let mut positions: Vec<f64> = Vec::new();
    let mut uvs: Vec<f64> = Vec::new();
    let mut indices: Vec<u32> = Vec::new();
    let mut uv_paired = true;

    let bytes = input.as_bytes();
    let mut start = 0;
    let ends = memchr_iter(b'\n', bytes).chain(std::iter::once(bytes.len()));
    for (line_index, end) in ends.enumerate() {
        let line_no = line_index + 1;
        let raw = &input[start..end];
        start = end + 1;

        // Strip comments and surrounding whitespace
        let line = match memchr(b'#', raw.as_bytes()) {
            Some(hash) => &raw[..hash],
            None => raw,
        }
        .trim();
        if line.is_empty() {
            continue;
        }

        let (rest, record) =
            keyword(line).map_err(|_| FormatError::obj(line_no, "missing keyword"))?;
        match record {
            "v" => {
                let (tail, v) = vertex(rest).map_err(|_| {
                    FormatError::obj(line_no, format!("malformed vertex '{}'", line))
                })?;
                expect_end(line_no, tail)?;
                positions.extend_from_slice(&v);
            }
            "vt" => {
                let (tail, t) = tex_coord(rest).map_err(|_| {
                    FormatError::obj(line_no, format!("malformed texture coordinate '{}'", line))
                })?;
                expect_end(line_no, tail)?;
                uvs.extend_from_slice(&t);
            }
            "f" => {
                let (tail, corners) = face(rest)
                    .map_err(|_| FormatError::obj(line_no, format!("malformed face '{}'", line)))?;
                expect_end(line_no, tail)?;
                if corners.len() < 3 {
                    return Err(FormatError::obj(line_no, "face needs at least 3 vertices"));
                }

                let vertex_count = positions.len() / 3;
                let uv_count = uvs.len() / 2;
                let mut resolved = Vec::with_capacity(corners.len());
                for (v, t) in corners {
                    let vi = resolve_index(v, vertex_count).ok_or_else(|| {
                        FormatError::obj(line_no, format!("vertex index {} out of range", v))
                    })?;
                    match t {
                        Some(t) => {
                            let ti = resolve_index(t, uv_count).ok_or_else(|| {
                                let message = format!("texture index {} out of range", t);
                                FormatError::obj(line_no, message)
                            })?;
                            uv_paired &= ti == vi;
                        }
                        None => uv_paired = false,
                    }
                    resolved.push(vi as u32);
                }

                for i in 1..resolved.len() - 1 {
                    indices.extend_from_slice(&[resolved[0], resolved[i], resolved[i + 1]]);
                }
            }
            // vn, o, g, s, mtllib, usemtl, ...
            _ => {}
        }
    }

    let keep_uvs = !uvs.is_empty() && uv_paired && uvs.len() / 2 == positions.len() / 3;
    if !uvs.is_empty() && !keep_uvs {
        log::debug!("dropping {} texture coordinates not paired with vertices", uvs.len() / 2);
    }

    let mesh = Mesh {
        positions,
        uvs: if keep_uvs { uvs } else { Vec::new() },
        indices,
    };
    mesh.validate()?;
    Ok(mesh)
}

/// Fail when a record has input left after its last field
fn expect_end(line_no: usize, tail: &str) -> Result<()> {
    if tail.trim().is_empty() {
        Ok(())
    } else {
        Err(FormatError::obj(
            line_no,
            format!("unexpected trailing input '{}'", tail.trim()),
        ))
    }
}

/// Map a 1-based or negative (relative) OBJ index to a 0-based one
fn resolve_index(index: i64, count: usize) -> Option<usize> {
    let resolved = if index > 0 {
        index - 1
    } else if index < 0 {
        count as i64 + index
    } else {
        return None;
    };
    (0..count as i64)
        .contains(&resolved)
        .then_some(resolved as usize)
}

// ============================================================================
// Parsing Primitives
// ============================================================================

fn keyword(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| !c.is_whitespace()).parse(input)
}

fn separator(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| c == ' ' || c == '\t').parse(input)
}

fn digits(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| c.is_ascii_digit()).parse(input)
}

/// Parse a decimal number: `1`, `1.`, `1.5`, `.5`, with optional sign and exponent
fn float(input: &str) -> IResult<&str, f64> {
    let (input, _) = opt(char('+')).parse(input)?;
    let (rest, text) = recognize((
        opt(char('-')),
        alt((
            recognize(pair(
                digits,
                opt(pair(char('.'), take_while(|c: char| c.is_ascii_digit()))),
            )),
            recognize(pair(char('.'), digits)),
        )),
        opt((
            alt((char('e'), char('E'))),
            opt(alt((char('+'), char('-')))),
            digits,
        )),
    ))
    .parse(input)?;

    // Use lexical-core for fast parsing
    match lexical_core::parse::<f64>(text.as_bytes()) {
        Ok(value) => Ok((rest, value)),
        Err(_) => Err(nom::Err::Error(nom::error::Error::new(
            input,
            nom::error::ErrorKind::Float,
        ))),
    }
}

/// Parse a signed integer index
fn index(input: &str) -> IResult<&str, i64> {
    let (rest, text) = recognize(pair(opt(char('-')), digits)).parse(input)?;
    match lexical_core::parse::<i64>(text.as_bytes()) {
        Ok(value) => Ok((rest, value)),
        Err(_) => Err(nom::Err::Error(nom::error::Error::new(
            input,
            nom::error::ErrorKind::Digit,
        ))),
    }
}

/// `x y z [w | r g b]`; extra components are read and ignored
fn vertex(input: &str) -> IResult<&str, [f64; 3]> {
    let (input, (x, y, z)) = (
        preceded(separator, float),
        preceded(separator, float),
        preceded(separator, float),
    )
        .parse(input)?;
    let (input, _) = many0(preceded(separator, float)).parse(input)?;
    Ok((input, [x, y, z]))
}

/// `u v [w]`
fn tex_coord(input: &str) -> IResult<&str, [f64; 2]> {
    let (input, (u, v)) = (preceded(separator, float), preceded(separator, float)).parse(input)?;
    let (input, _) = opt(preceded(separator, float)).parse(input)?;
    Ok((input, [u, v]))
}

/// `v`, `v/t`, `v/t/n` or `v//n`
fn face_vertex(input: &str) -> IResult<&str, (i64, Option<i64>)> {
    let (input, v) = index(input)?;
    let (input, rest) = opt(preceded(
        char('/'),
        pair(opt(index), opt(preceded(char('/'), opt(index)))),
    ))
    .parse(input)?;
    Ok((input, (v, rest.and_then(|(t, _)| t))))
}

fn face(input: &str) -> IResult<&str, Vec<(i64, Option<i64>)>> {
    many1(preceded(separator, face_vertex)).parse(input)
}
