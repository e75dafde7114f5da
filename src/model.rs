use std::collections::HashMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use glam::Vec3;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::displacement::Part;

/// GPU ready mesh buffers for one part.
///
/// Vertices are laid out as `position.xyz` followed by `normal.xyz`, with
/// positions relative to the part's rest position.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PartMesh {
    pub vertices: Vec<f32>,
    pub indices: Vec<u32>,
}

impl PartMesh {
    /// Radius of the smallest origin-centred sphere containing the mesh.
    pub fn bounding_radius(&self) -> f32 {
        self.vertices
            .chunks_exact(6)
            .map(|chunk| Vec3::new(chunk[0], chunk[1], chunk[2]).length())
            .fold(0.0, f32::max)
    }
}

/// Errors produced while parsing an OBJ model.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("model does not define any geometry")]
    Empty,
    #[error("line {line}: {message}")]
    Parse { line: usize, message: String },
    #[error("vertex index {index} out of range")]
    Index { index: i32 },
}

impl ModelError {
    fn parse(line: usize, message: impl Into<String>) -> Self {
        Self::Parse {
            line,
            message: message.into(),
        }
    }
}

/// Loads a segmented OBJ model and hands the resulting parts to a callback.
///
/// Loading is the only fallible boundary in the system; the caller is
/// expected to log the error and keep running without a model.
pub fn load_model<P, S, E>(path: P, on_success: S, on_error: E)
where
    P: AsRef<Path>,
    S: FnOnce(Vec<Part>),
    E: FnOnce(anyhow::Error),
{
    match load_parts(path.as_ref()) {
        Ok(parts) => on_success(parts),
        Err(err) => on_error(err),
    }
}

/// Reads an OBJ file from disk and splits it into displaceable parts.
pub fn load_parts(path: &Path) -> Result<Vec<Part>> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("unable to read model {}", path.display()))?;
    let parts = parse_obj_parts(&data)
        .with_context(|| format!("invalid model {}", path.display()))?;
    Ok(parts)
}

/// Parses OBJ text into one [`Part`] per `o`/`g` group.
///
/// Each group's rest position is the centroid of the vertices it references;
/// the vertex data is re-based onto that centroid so the part transform owns
/// placement. Geometry that appears before the first group marker forms an
/// implicit `body` part.
pub fn parse_obj_parts(data: &str) -> Result<Vec<Part>, ModelError> {
    let mut positions = Vec::new();
    let mut normals = Vec::new();
    let mut groups: Vec<Group> = Vec::new();

    for (line_no, line) in data.lines().enumerate() {
        let line_no = line_no + 1;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let mut tokens = trimmed.split_whitespace();
        let Some(tag) = tokens.next() else {
            continue;
        };
        match tag {
            "v" => positions.push(parse_vec3(tokens, line_no)?),
            "vn" => normals.push(parse_vec3(tokens, line_no)?),
            "o" | "g" => {
                let name = tokens.next().unwrap_or("part").to_string();
                groups.push(Group::new(name));
            }
            "f" => {
                let polygon = parse_face(tokens, line_no)?;
                if groups.is_empty() {
                    groups.push(Group::new("body"));
                }
                triangulate_face(&polygon, &mut groups.last_mut().unwrap().faces);
            }
            _ => {}
        }
    }

    if positions.is_empty() {
        return Err(ModelError::Empty);
    }

    let mut parts = Vec::new();
    for group in &groups {
        if group.faces.is_empty() {
            continue;
        }
        let (rest_position, mesh) = build_part_mesh(&positions, &normals, group)?;
        parts.push(Part::new(group.name.clone(), rest_position, mesh));
    }

    if parts.is_empty() {
        return Err(ModelError::Empty);
    }
    Ok(parts)
}

#[derive(Debug)]
struct Group {
    name: String,
    faces: Vec<[FaceIndex; 3]>,
}

impl Group {
    fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            faces: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct FaceIndex {
    v: i32,
    vn: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct VertexKey {
    position: usize,
    normal: Option<usize>,
}

fn parse_vec3<'a>(
    mut tokens: impl Iterator<Item = &'a str>,
    line_no: usize,
) -> Result<Vec3, ModelError> {
    let mut component = || -> Result<f32, ModelError> {
        tokens
            .next()
            .ok_or_else(|| ModelError::parse(line_no, "missing vector component"))?
            .parse::<f32>()
            .map_err(|err| ModelError::parse(line_no, format!("bad vector component: {err}")))
    };
    let x = component()?;
    let y = component()?;
    let z = component()?;
    Ok(Vec3::new(x, y, z))
}

fn parse_face<'a>(
    tokens: impl Iterator<Item = &'a str>,
    line_no: usize,
) -> Result<Vec<FaceIndex>, ModelError> {
    let mut indices = Vec::new();
    for token in tokens {
        let mut segments = token.split('/');
        let v = segments
            .next()
            .ok_or_else(|| ModelError::parse(line_no, "missing vertex index"))?
            .parse::<i32>()
            .map_err(|err| ModelError::parse(line_no, format!("bad vertex index: {err}")))?;
        // Texture coordinates are skipped; normals are optional.
        let vn = match segments.nth(1).filter(|s| !s.is_empty()) {
            None => 0,
            Some(index) => index
                .parse::<i32>()
                .map_err(|err| ModelError::parse(line_no, format!("bad normal index: {err}")))?,
        };
        indices.push(FaceIndex { v, vn });
    }
    if indices.len() < 3 {
        return Err(ModelError::parse(
            line_no,
            "faces must reference at least 3 vertices",
        ));
    }
    Ok(indices)
}

fn triangulate_face(polygon: &[FaceIndex], faces: &mut Vec<[FaceIndex; 3]>) {
    for i in 1..(polygon.len() - 1) {
        faces.push([polygon[0], polygon[i], polygon[i + 1]]);
    }
}

fn build_part_mesh(
    positions: &[Vec3],
    normals: &[Vec3],
    group: &Group,
) -> Result<(Vec3, PartMesh), ModelError> {
    let mut lookup: HashMap<VertexKey, u32> = HashMap::new();
    let mut vertices = Vec::new();
    let mut indices = Vec::new();

    for face in &group.faces {
        for idx in face {
            let position =
                fix_index(idx.v, positions.len()).ok_or(ModelError::Index { index: idx.v })?;
            let normal = fix_index(idx.vn, normals.len());
            let key = VertexKey { position, normal };
            let next_index = (vertices.len() / 6) as u32;
            let entry = lookup.entry(key).or_insert_with(|| {
                let position = positions[position];
                vertices.extend_from_slice(&[position.x, position.y, position.z]);
                let normal = normal.map(|i| normals[i]).unwrap_or(Vec3::ZERO);
                vertices.extend_from_slice(&[normal.x, normal.y, normal.z]);
                next_index
            });
            indices.push(*entry);
        }
    }

    let mut mesh = PartMesh { vertices, indices };
    let centroid = rebase_to_centroid(&mut mesh);
    if needs_normals(&mesh.vertices) {
        compute_normals(&mut mesh);
    }
    Ok((centroid, mesh))
}

fn fix_index(index: i32, len: usize) -> Option<usize> {
    if index > 0 {
        let zero_based = index as usize - 1;
        (zero_based < len).then_some(zero_based)
    } else if index < 0 {
        let abs = (-index) as usize;
        (abs <= len).then_some(len - abs)
    } else {
        None
    }
}

/// Shifts the mesh so its vertex centroid sits at the origin and returns the
/// centroid, which becomes the part's rest position.
fn rebase_to_centroid(mesh: &mut PartMesh) -> Vec3 {
    let count = (mesh.vertices.len() / 6) as f32;
    if count == 0.0 {
        return Vec3::ZERO;
    }
    let mut sum = Vec3::ZERO;
    for chunk in mesh.vertices.chunks_exact(6) {
        sum += Vec3::new(chunk[0], chunk[1], chunk[2]);
    }
    let centroid = sum / count;
    for chunk in mesh.vertices.chunks_exact_mut(6) {
        chunk[0] -= centroid.x;
        chunk[1] -= centroid.y;
        chunk[2] -= centroid.z;
    }
    centroid
}

fn needs_normals(vertices: &[f32]) -> bool {
    vertices
        .chunks_exact(6)
        .any(|chunk| chunk[3] == 0.0 && chunk[4] == 0.0 && chunk[5] == 0.0)
}

/// Fills in face-averaged normals for the vertices that have none; authored
/// normals are left untouched.
fn compute_normals(mesh: &mut PartMesh) {
    let vertex_count = mesh.vertices.len() / 6;
    let missing: Vec<bool> = mesh
        .vertices
        .chunks_exact(6)
        .map(|chunk| chunk[3] == 0.0 && chunk[4] == 0.0 && chunk[5] == 0.0)
        .collect();
    let mut accum = vec![Vec3::ZERO; vertex_count];

    for triangle in mesh.indices.chunks_exact(3) {
        let i0 = triangle[0] as usize;
        let i1 = triangle[1] as usize;
        let i2 = triangle[2] as usize;
        let p0 = Vec3::from_slice(&mesh.vertices[i0 * 6..i0 * 6 + 3]);
        let p1 = Vec3::from_slice(&mesh.vertices[i1 * 6..i1 * 6 + 3]);
        let p2 = Vec3::from_slice(&mesh.vertices[i2 * 6..i2 * 6 + 3]);
        let normal = (p1 - p0).cross(p2 - p0);
        if normal.length_squared() > f32::EPSILON {
            let normal = normal.normalize();
            accum[i0] += normal;
            accum[i1] += normal;
            accum[i2] += normal;
        }
    }

    for (i, normal) in accum.into_iter().enumerate() {
        if !missing[i] {
            continue;
        }
        let normal = normal.normalize_or_zero();
        mesh.vertices[i * 6 + 3] = normal.x;
        mesh.vertices[i * 6 + 4] = normal.y;
        mesh.vertices[i * 6 + 5] = normal.z;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TWO_SHARDS: &str = "\
o left
v -2 0 0
v -1 0 0
v -2 1 0
f 1 2 3
o right
v 2 0 0
v 3 0 0
v 2 1 0
f 4 5 6
";

    #[test]
    fn groups_become_parts_with_centroid_rest_positions() {
        let parts = parse_obj_parts(TWO_SHARDS).unwrap();
        assert_eq!(parts.len(), 2);

        let left = &parts[0];
        assert_eq!(left.name, "left");
        let expected = Vec3::new(-5.0 / 3.0, 1.0 / 3.0, 0.0);
        assert!((left.rest_position - expected).length() < 1e-5);
        assert_eq!(left.current_position, left.rest_position);
        assert!((left.direction.length() - 1.0).abs() < 1e-5);

        // Vertices are re-based: their centroid is the origin.
        let mut sum = Vec3::ZERO;
        for chunk in left.mesh.vertices.chunks_exact(6) {
            sum += Vec3::new(chunk[0], chunk[1], chunk[2]);
        }
        assert!(sum.length() < 1e-5);
        assert!(left.bounding_radius > 0.0);
    }

    #[test]
    fn ungrouped_geometry_forms_a_body_part() {
        let obj = "\nv 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\n";
        let parts = parse_obj_parts(obj).unwrap();
        assert_eq!(parts.len(), 1);
        assert_eq!(parts[0].name, "body");
        assert_eq!(parts[0].mesh.indices, vec![0, 1, 2]);
    }

    #[test]
    fn missing_normals_are_computed() {
        let obj = "\nv 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\n";
        let parts = parse_obj_parts(obj).unwrap();
        for chunk in parts[0].mesh.vertices.chunks_exact(6) {
            let normal = Vec3::new(chunk[3], chunk[4], chunk[5]);
            assert!((normal.length() - 1.0).abs() < 1e-5);
        }
    }

    #[test]
    fn authored_normals_survive_the_recompute() {
        let obj = "\nv 0 0 0\nv 1 0 0\nv 0 1 0\nvn 0 0 -1\nf 1//1 2 3\n";
        let parts = parse_obj_parts(obj).unwrap();
        let vertices = &parts[0].mesh.vertices;
        // The first vertex keeps its authored normal; the others are filled
        // in from the face winding.
        assert_eq!(vertices[3..6], [0.0, 0.0, -1.0]);
        let computed = Vec3::new(vertices[9], vertices[10], vertices[11]);
        assert!((computed - Vec3::new(0.0, 0.0, 1.0)).length() < 1e-5);
    }

    #[test]
    fn bad_normal_index_is_an_error() {
        let err = parse_obj_parts("v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1/1/x 2 3\n").unwrap_err();
        assert!(err.to_string().contains("bad normal index"));
        assert!(err.to_string().contains("line 4"));
    }

    #[test]
    fn quads_are_triangulated() {
        let obj = "\nv 0 0 0\nv 1 0 0\nv 1 1 0\nv 0 1 0\nf 1 2 3 4\n";
        let parts = parse_obj_parts(obj).unwrap();
        assert_eq!(parts[0].mesh.indices.len(), 6);
    }

    #[test]
    fn negative_indices_resolve_from_the_end() {
        let obj = "\nv 0 0 0\nv 1 0 0\nv 0 1 0\nf -3 -2 -1\n";
        let parts = parse_obj_parts(obj).unwrap();
        assert_eq!(parts[0].mesh.indices, vec![0, 1, 2]);
    }

    #[test]
    fn empty_models_are_rejected() {
        assert!(matches!(parse_obj_parts(""), Err(ModelError::Empty)));
        assert!(matches!(
            parse_obj_parts("o ghost\n"),
            Err(ModelError::Empty)
        ));
    }

    #[test]
    fn bad_vertex_reports_its_line() {
        let err = parse_obj_parts("v 0 zero 0\n").unwrap_err();
        assert!(err.to_string().contains("line 1"));
    }

    #[test]
    fn load_model_reports_missing_files_through_the_error_callback() {
        let mut failed = false;
        load_model(
            Path::new("/nonexistent/shards.obj"),
            |_| panic!("load should fail"),
            |_| failed = true,
        );
        assert!(failed);
    }
}
