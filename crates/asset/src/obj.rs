//! OBJ parser producing named groups of raw attribute streams.
//!
//! Supported statements: `v x y z [r g b]`, `vt u [v]`, `vn x y z`,
//! `f` with `p`, `p/t`, `p//n` and `p/t/n` elements (1-based, negative
//! values are relative), `g`/`o` group markers and `#` comments. Anything
//! else (`s`, `usemtl`, `mtllib`, `l`, ...) is ignored.

use std::{
    collections::HashMap,
    fs::File,
    io::{self, BufRead, BufReader},
    path::Path,
};

use corelib::{CoreError, CoreResult, Vec3};

use crate::group::ObjGroup;

/// Name of the group that collects geometry appearing before any `g`/`o` marker.
pub const DEFAULT_GROUP_NAME: &str = "default";

const WHITE: [f32; 4] = [1.0, 1.0, 1.0, 1.0];

/// A parsed model: groups in the order they first appear in the source.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ObjModel {
    groups: Vec<ObjGroup>,
}

impl ObjModel {
    /// Load an OBJ model from a file path.
    pub fn load(path: impl AsRef<Path>, generate_normals: bool) -> CoreResult<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let model = Self::parse(BufReader::new(file), generate_normals)?;
        log::info!(
            "Loaded OBJ {}: {} group(s)",
            path.display(),
            model.groups.len()
        );
        Ok(model)
    }

    /// Convenience helper to parse an OBJ string literal.
    pub fn parse_str(contents: &str, generate_normals: bool) -> CoreResult<Self> {
        Self::parse(io::Cursor::new(contents), generate_normals)
    }

    /// Parse a whole source in one pass. No partial model is returned on error.
    ///
    /// With `generate_normals`, groups whose source has no normals get smooth
    /// per-vertex normals computed from their triangles.
    pub fn parse<R: BufRead>(reader: R, generate_normals: bool) -> CoreResult<Self> {
        let mut parser = Parser::default();
        for (line_no, raw) in reader.split(b'\n').enumerate() {
            let raw = raw?;
            let line_no = line_no + 1;
            // Comments may hold any encoding; only the statement must be UTF-8.
            let code = match raw.iter().position(|&b| b == b'#') {
                Some(at) => &raw[..at],
                None => &raw[..],
            };
            let line = std::str::from_utf8(code)
                .map_err(|_| CoreError::parse(line_no, "invalid UTF-8"))?;
            parser.parse_line(line.trim(), line_no)?;
        }
        let groups = parser.finish(generate_normals);
        log::debug!(
            "Parsed OBJ: {} group(s), {} vertices total",
            groups.len(),
            groups.iter().map(|g| g.vertex_count() as usize).sum::<usize>()
        );
        Ok(Self { groups })
    }

    pub fn groups(&self) -> &[ObjGroup] {
        &self.groups
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn group_for_name(&self, name: &str) -> Option<&ObjGroup> {
        self.groups.iter().find(|g| g.name() == name)
    }

    pub fn group_at_index(&self, index: usize) -> CoreResult<&ObjGroup> {
        self.groups.get(index).ok_or(CoreError::OutOfRange {
            index,
            len: self.groups.len(),
        })
    }

    pub fn into_groups(self) -> Vec<ObjGroup> {
        self.groups
    }
}

/// (position, texcoord, normal) indices into the global attribute tables.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
struct Key(usize, Option<usize>, Option<usize>);

struct GroupBuilder {
    name: String,
    implicit: bool,
    unique: HashMap<Key, u32>,
    vertices: Vec<Key>,
    indices: Vec<u32>,
}

impl GroupBuilder {
    fn new(name: String, implicit: bool) -> Self {
        Self {
            name,
            implicit,
            unique: HashMap::new(),
            vertices: Vec::new(),
            indices: Vec::new(),
        }
    }

    fn vertex_for(&mut self, key: Key, line_no: usize) -> CoreResult<u32> {
        if let Some(&idx) = self.unique.get(&key) {
            return Ok(idx);
        }
        let idx = u32::try_from(self.vertices.len())
            .map_err(|_| CoreError::parse(line_no, "too many vertices in group"))?;
        self.vertices.push(key);
        self.unique.insert(key, idx);
        Ok(idx)
    }
}

#[derive(Default)]
struct Parser {
    positions: Vec<[f32; 3]>,
    colors: Vec<Option<[f32; 3]>>,
    texcoords: Vec<[f32; 2]>,
    normals: Vec<[f32; 3]>,
    groups: Vec<GroupBuilder>,
    by_name: HashMap<String, usize>,
    current: Option<usize>,
}

impl Parser {
    /// `trimmed` must already have any `#` comment removed.
    fn parse_line(&mut self, trimmed: &str, line_no: usize) -> CoreResult<()> {
        if trimmed.is_empty() {
            return Ok(());
        }

        let mut parts = trimmed.split_whitespace();
        let Some(tag) = parts.next() else {
            return Ok(());
        };

        match tag {
            "v" => {
                let x = parse_f32(parts.next(), line_no, "x coordinate")?;
                let y = parse_f32(parts.next(), line_no, "y coordinate")?;
                let z = parse_f32(parts.next(), line_no, "z coordinate")?;
                let rest: Vec<&str> = parts.collect();
                let color = match rest.len() {
                    // Optional w component; validated but unused.
                    0 | 1 => {
                        if let Some(w) = rest.first() {
                            parse_f32(Some(w), line_no, "w coordinate")?;
                        }
                        None
                    }
                    3 => Some([
                        parse_f32(Some(rest[0]), line_no, "red component")?,
                        parse_f32(Some(rest[1]), line_no, "green component")?,
                        parse_f32(Some(rest[2]), line_no, "blue component")?,
                    ]),
                    n => {
                        return Err(CoreError::parse(
                            line_no,
                            format!("vertex has {} trailing values, expected 0, 1 or 3", n),
                        ));
                    }
                };
                self.positions.push([x, y, z]);
                self.colors.push(color);
            }
            "vt" => {
                let u = parse_f32(parts.next(), line_no, "u coordinate")?;
                let v = match parts.next() {
                    Some(token) => parse_f32(Some(token), line_no, "v coordinate")?,
                    None => 0.0,
                };
                self.texcoords.push([u, v]);
            }
            "vn" => {
                let nx = parse_f32(parts.next(), line_no, "nx coordinate")?;
                let ny = parse_f32(parts.next(), line_no, "ny coordinate")?;
                let nz = parse_f32(parts.next(), line_no, "nz coordinate")?;
                self.normals.push([nx, ny, nz]);
            }
            "g" | "o" => {
                let name = parts.collect::<Vec<_>>().join(" ");
                if name.is_empty() {
                    return Err(CoreError::parse(
                        line_no,
                        format!("'{}' statement without a group name", tag),
                    ));
                }
                self.switch_group(name);
            }
            "f" => {
                let mut face_keys: Vec<Key> = Vec::new();
                for part in parts {
                    let (vi, vti, vni) = parse_face_vertex(
                        part,
                        self.positions.len(),
                        self.texcoords.len(),
                        self.normals.len(),
                        line_no,
                    )?;
                    face_keys.push(Key(vi, vti, vni));
                }

                let group = self.current_group();
                let mut face_indices: Vec<u32> = Vec::with_capacity(face_keys.len());
                for key in face_keys {
                    face_indices.push(group.vertex_for(key, line_no)?);
                }

                if face_indices.len() < 3 {
                    return Ok(());
                }
                // Triangulate fan
                for tri in 1..(face_indices.len() - 1) {
                    group.indices.push(face_indices[0]);
                    group.indices.push(face_indices[tri]);
                    group.indices.push(face_indices[tri + 1]);
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn switch_group(&mut self, name: String) {
        if let Some(&idx) = self.by_name.get(&name) {
            self.groups[idx].implicit = false;
            self.current = Some(idx);
            return;
        }
        self.by_name.insert(name.clone(), self.groups.len());
        self.current = Some(self.groups.len());
        self.groups.push(GroupBuilder::new(name, false));
    }

    fn current_group(&mut self) -> &mut GroupBuilder {
        let idx = match self.current {
            Some(idx) => idx,
            None => {
                let idx = self.groups.len();
                self.by_name.insert(DEFAULT_GROUP_NAME.to_string(), idx);
                self.groups
                    .push(GroupBuilder::new(DEFAULT_GROUP_NAME.to_string(), true));
                self.current = Some(idx);
                idx
            }
        };
        &mut self.groups[idx]
    }

    fn finish(self, generate_normals: bool) -> Vec<ObjGroup> {
        let Parser {
            positions,
            colors,
            texcoords,
            normals,
            groups,
            ..
        } = self;

        groups
            .into_iter()
            .filter(|b| !(b.implicit && b.vertices.is_empty()))
            .map(|b| {
                let mut group = ObjGroup::new(b.name);

                group.set_positions(
                    b.vertices
                        .iter()
                        .map(|k| {
                            let [x, y, z] = positions[k.0];
                            [x, y, z, 1.0]
                        })
                        .collect(),
                );

                let has_normals = b.vertices.iter().any(|k| k.2.is_some());
                let group_normals = if has_normals {
                    Some(
                        b.vertices
                            .iter()
                            .map(|k| match k.2 {
                                Some(n) => {
                                    let [x, y, z] = normals[n];
                                    [x, y, z, 0.0]
                                }
                                None => [0.0; 4],
                            })
                            .collect(),
                    )
                } else if generate_normals && !b.vertices.is_empty() {
                    Some(generate_vertex_normals(&positions, &b.vertices, &b.indices))
                } else {
                    None
                };
                group.set_normals(group_normals);

                let has_texcoords = b.vertices.iter().any(|k| k.1.is_some());
                group.set_texcoords(has_texcoords.then(|| {
                    b.vertices
                        .iter()
                        .map(|k| k.1.map_or([0.0, 0.0], |t| texcoords[t]))
                        .collect()
                }));

                let has_colors = b.vertices.iter().any(|k| colors[k.0].is_some());
                group.set_colors(has_colors.then(|| {
                    b.vertices
                        .iter()
                        .map(|k| colors[k.0].map_or(WHITE, |[r, g, bl]| [r, g, bl, 1.0]))
                        .collect()
                }));

                group.set_indices(b.indices);
                group
            })
            .collect()
    }
}

/// Smooth normals: every triangle adds its unit face normal
/// `(pb - pa) x (pc - pa)` to its three corners, accumulated per source
/// position so vertices split by texcoords still share a normal. Vertices
/// without (non-degenerate) incident triangles get the zero vector.
fn generate_vertex_normals(
    positions: &[[f32; 3]],
    vertices: &[Key],
    indices: &[u32],
) -> Vec<[f32; 4]> {
    let mut accum: HashMap<usize, Vec3> = HashMap::new();

    for tri in indices.chunks_exact(3) {
        let corners = [
            vertices[tri[0] as usize].0,
            vertices[tri[1] as usize].0,
            vertices[tri[2] as usize].0,
        ];
        let [a, b, c] = corners.map(|p| Vec3::from_array(positions[p]));
        let face = (b - a).cross(c - a).normalize_or_zero();
        for p in corners {
            *accum.entry(p).or_insert(Vec3::ZERO) += face;
        }
    }

    vertices
        .iter()
        .map(|k| {
            let n = accum
                .get(&k.0)
                .map_or(Vec3::ZERO, |sum| sum.normalize_or_zero());
            [n.x, n.y, n.z, 0.0]
        })
        .collect()
}

fn parse_f32(value: Option<&str>, line_no: usize, what: &str) -> CoreResult<f32> {
    let token = value.ok_or_else(|| CoreError::parse(line_no, format!("missing {}", what)))?;
    token.parse::<f32>().map_err(|_| {
        CoreError::parse(line_no, format!("failed to parse {} from '{}'", what, token))
    })
}

fn parse_face_vertex(
    token: &str,
    pos_count: usize,
    tex_count: usize,
    norm_count: usize,
    line_no: usize,
) -> CoreResult<(usize, Option<usize>, Option<usize>)> {
    let mut split = token.split('/');
    let pos = split
        .next()
        .filter(|p| !p.is_empty())
        .ok_or_else(|| CoreError::parse(line_no, format!("malformed face element '{}'", token)))?;
    let pos_idx = resolve_index(pos, pos_count, line_no)?;

    let tex_idx = match split.next() {
        Some(value) if !value.is_empty() => Some(resolve_index(value, tex_count, line_no)?),
        _ => None,
    };

    let norm_idx = match split.next() {
        Some(value) if !value.is_empty() => Some(resolve_index(value, norm_count, line_no)?),
        _ => None,
    };

    Ok((pos_idx, tex_idx, norm_idx))
}

fn resolve_index(token: &str, len: usize, line_no: usize) -> CoreResult<usize> {
    let raw = token
        .parse::<i64>()
        .map_err(|_| CoreError::parse(line_no, format!("invalid index '{}'", token)))?;
    if raw == 0 {
        return Err(CoreError::parse(line_no, "OBJ indices are 1-based; found 0"));
    }

    let idx = if raw > 0 {
        raw - 1
    } else {
        len as i64 + raw
    };

    if idx < 0 || idx as usize >= len {
        return Err(CoreError::parse(
            line_no,
            format!("index {} resolved out of bounds (len={})", raw, len),
        ));
    }

    Ok(idx as usize)
}
