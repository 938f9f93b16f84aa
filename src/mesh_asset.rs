//! Mesh asset loading for the floating model.
//!
//! OBJ geometry and its MTL material library are parsed with `tobj`. Each
//! vertex carries the id of the material used by the last face that touched
//! it, indexing into a dense material array in library declaration order.
//!
//! ## Normal Handling
//!
//! OBJ normals are ignored. Every triangle contributes its unit face normal to
//! each of its three vertices and the sums are left as they are: a vertex
//! shared by several faces ends up with a longer vector. The model shader
//! normalises after transforming.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{anyhow, bail, Context, Result};

use crate::gpu::geometry::ModelVertex;

/// Capacity of the model material uniform array.
pub const MAX_MATERIALS: usize = 16;

/// Floats per packed material: Ka(4) Kd(4) Ks(4) Ns + padding(4).
pub const MATERIAL_STRIDE: usize = 16;

/// Phong material parsed from an MTL library.
#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    pub name: String,
    pub ambient: [f32; 3],
    pub diffuse: [f32; 3],
    pub specular: [f32; 3],
    pub shininess: f32,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            name: String::new(),
            ambient: [0.0; 3],
            diffuse: [0.0; 3],
            specular: [0.0; 3],
            shininess: 1.0,
        }
    }
}

impl From<&tobj::Material> for Material {
    fn from(m: &tobj::Material) -> Self {
        let defaults = Material::default();
        Self {
            name: m.name.clone(),
            ambient: m.ambient.unwrap_or(defaults.ambient),
            diffuse: m.diffuse.unwrap_or(defaults.diffuse),
            specular: m.specular.unwrap_or(defaults.specular),
            shininess: m.shininess.unwrap_or(defaults.shininess),
        }
    }
}

/// Flatten materials into the uniform layout, 16 floats each.
///
/// Colours sit at offsets 0, 4 and 8 with their fourth component set to 1.0;
/// shininess is at offset 12.
pub fn pack_material_uniforms(materials: &[Material]) -> Vec<f32> {
    let mut packed = vec![0.0f32; materials.len() * MATERIAL_STRIDE];
    for (block, material) in packed.chunks_exact_mut(MATERIAL_STRIDE).zip(materials) {
        block[0..3].copy_from_slice(&material.ambient);
        block[3] = 1.0;
        block[4..7].copy_from_slice(&material.diffuse);
        block[7] = 1.0;
        block[8..11].copy_from_slice(&material.specular);
        block[11] = 1.0;
        block[12] = material.shininess;
    }
    packed
}

/// Axis-aligned bounding box for a mesh.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min: [f32; 3],
    pub max: [f32; 3],
}

impl Default for BoundingBox {
    fn default() -> Self {
        Self { min: [0.0; 3], max: [0.0; 3] }
    }
}

impl BoundingBox {
    pub fn from_positions(positions: &[[f32; 3]]) -> Self {
        if positions.is_empty() {
            return Self::default();
        }

        let mut min = [f32::MAX; 3];
        let mut max = [f32::MIN; 3];

        for p in positions {
            for i in 0..3 {
                min[i] = min[i].min(p[i]);
                max[i] = max[i].max(p[i]);
            }
        }

        Self { min, max }
    }

    pub fn center(&self) -> [f32; 3] {
        [
            (self.min[0] + self.max[0]) * 0.5,
            (self.min[1] + self.max[1]) * 0.5,
            (self.min[2] + self.max[2]) * 0.5,
        ]
    }

    /// Half of the largest side.
    pub fn radius(&self) -> f32 {
        let size = [
            self.max[0] - self.min[0],
            self.max[1] - self.min[1],
            self.max[2] - self.min[2],
        ];
        size[0].max(size[1]).max(size[2]) * 0.5
    }
}

/// A loaded mesh with per-vertex material ids.
#[derive(Debug, Clone)]
pub struct MeshAsset {
    pub id: String,
    pub positions: Vec<[f32; 3]>,
    pub normals: Vec<[f32; 3]>,
    pub indices: Vec<u32>,
    pub material_ids: Vec<u32>,
    pub materials: Vec<Material>,
    pub bounds: BoundingBox,
}

fn load_options() -> tobj::LoadOptions {
    tobj::LoadOptions {
        triangulate: true,
        single_index: false,
        ..Default::default()
    }
}

impl MeshAsset {
    /// Load an OBJ file; its `mtllib` is resolved relative to the OBJ.
    pub fn load(path: &Path) -> Result<Self> {
        let (models, materials) = tobj::load_obj(path, &load_options())
            .with_context(|| format!("Failed to load mesh {}", path.display()))?;

        let materials = materials.unwrap_or_else(|e| {
            log::warn!("No usable material library for {}: {}", path.display(), e);
            Vec::new()
        });

        let id = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "mesh".to_string());

        Self::from_models(id, &models, &materials)
    }

    /// Parse in-memory OBJ and (optional) MTL text.
    pub fn from_obj_mtl(id: impl Into<String>, obj_content: &str, mtl_content: Option<&str>) -> Result<Self> {
        let mut cursor = std::io::Cursor::new(obj_content.as_bytes());

        let (models, materials) = tobj::load_obj_buf(&mut cursor, &load_options(), |_| match mtl_content {
            Some(mtl) => tobj::load_mtl_buf(&mut std::io::Cursor::new(mtl.as_bytes())),
            None => Ok((Vec::new(), HashMap::new())),
        })
        .map_err(|e| anyhow!("Failed to parse OBJ: {}", e))?;

        let materials = materials.map_err(|e| anyhow!("Failed to parse MTL: {}", e))?;

        Self::from_models(id.into(), &models, &materials)
    }

    fn from_models(id: String, models: &[tobj::Model], materials: &[tobj::Material]) -> Result<Self> {
        let mut positions: Vec<[f32; 3]> = Vec::new();
        let mut indices: Vec<u32> = Vec::new();
        let mut material_ids: Vec<u32> = Vec::new();

        for model in models {
            let mesh = &model.mesh;
            if mesh.positions.is_empty() {
                continue;
            }

            let base = positions.len() as u32;
            let vertex_count = mesh.positions.len() / 3;
            positions.extend(mesh.positions.chunks_exact(3).map(|p| [p[0], p[1], p[2]]));
            material_ids.resize(positions.len(), 0);

            let material = mesh.material_id.unwrap_or(0) as u32;
            for &idx in &mesh.indices {
                if idx as usize >= vertex_count {
                    bail!("{}: face index {} out of range ({} vertices)", model.name, idx, vertex_count);
                }
                let global = base + idx;
                indices.push(global);
                material_ids[global as usize] = material;
            }
        }

        if positions.is_empty() {
            bail!("{}: OBJ contains no vertices", id);
        }

        let normals = compute_vertex_normals(&positions, &indices);
        let bounds = BoundingBox::from_positions(&positions);
        let materials: Vec<Material> = materials.iter().map(Material::from).collect();

        log::info!(
            "Loaded mesh '{}': {} vertices, {} triangles, {} materials",
            id,
            positions.len(),
            indices.len() / 3,
            materials.len()
        );

        Ok(Self {
            id,
            positions,
            normals,
            indices,
            material_ids,
            materials,
            bounds,
        })
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Interleave into GPU vertices.
    pub fn vertices(&self) -> Vec<ModelVertex> {
        self.positions
            .iter()
            .zip(&self.normals)
            .zip(&self.material_ids)
            .map(|((position, normal), &material_id)| ModelVertex {
                position: *position,
                normal: *normal,
                material_id,
            })
            .collect()
    }

    /// Packed material uniforms, truncated to [`MAX_MATERIALS`].
    pub fn material_uniforms(&self) -> Vec<f32> {
        if self.materials.len() > MAX_MATERIALS {
            log::warn!(
                "Mesh '{}' has {} materials; only the first {} are used",
                self.id,
                self.materials.len(),
                MAX_MATERIALS
            );
        }
        let used = self.materials.len().min(MAX_MATERIALS);
        pack_material_uniforms(&self.materials[..used])
    }
}

/// Accumulate unit face normals onto each vertex of the face.
fn compute_vertex_normals(positions: &[[f32; 3]], indices: &[u32]) -> Vec<[f32; 3]> {
    let mut normals = vec![[0.0f32; 3]; positions.len()];

    for tri in indices.chunks_exact(3) {
        let p0 = glam::Vec3::from(positions[tri[0] as usize]);
        let p1 = glam::Vec3::from(positions[tri[1] as usize]);
        let p2 = glam::Vec3::from(positions[tri[2] as usize]);

        // Degenerate faces contribute nothing.
        let face = (p1 - p0).cross(p2 - p0).normalize_or_zero();

        for &idx in tri {
            let n = &mut normals[idx as usize];
            n[0] += face.x;
            n[1] += face.y;
            n[2] += face.z;
        }
    }

    normals
}

#[cfg(test)]
mod tests {
    use super::*;

    const QUAD_OBJ: &str = "mtllib duck.mtl
v 0 0 0
v 1 0 0
v 1 0 1
v 0 0 1
v 0 1 0
usemtl body
f 1 3 2
f 1 4 3
usemtl beak
f 1 2 5
";

    const QUAD_MTL: &str = "newmtl body
Ka 0.1 0.2 0.3
Kd 0.4 0.5 0.6
Ks 0.7 0.8 0.9
Ns 32
newmtl beak
Kd 1 0.5 0
";

    #[test]
    fn test_obj_parsing() {
        let asset = MeshAsset::from_obj_mtl("quad", QUAD_OBJ, Some(QUAD_MTL)).unwrap();
        assert_eq!(asset.triangle_count(), 3);
        assert_eq!(asset.normals.len(), asset.positions.len());
        assert_eq!(asset.material_ids.len(), asset.positions.len());
        assert_eq!(asset.materials.len(), 2);
        assert_eq!(asset.materials[0].name, "body");
        assert_eq!(asset.materials[1].name, "beak");
    }

    #[test]
    fn test_missing_material_fields_default() {
        let asset = MeshAsset::from_obj_mtl("quad", QUAD_OBJ, Some(QUAD_MTL)).unwrap();
        let beak = &asset.materials[1];
        assert_eq!(beak.ambient, [0.0; 3]);
        assert_eq!(beak.specular, [0.0; 3]);
        assert_eq!(beak.shininess, 1.0);
        assert_eq!(beak.diffuse, [1.0, 0.5, 0.0]);
    }

    #[test]
    fn test_obj_without_mtl_has_no_materials() {
        let asset = MeshAsset::from_obj_mtl("tri", "v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\n", None).unwrap();
        assert!(asset.materials.is_empty());
        assert!(asset.material_uniforms().is_empty());
        assert!(asset.material_ids.iter().all(|&m| m == 0));
    }

    #[test]
    fn test_empty_obj_is_error() {
        assert!(MeshAsset::from_obj_mtl("empty", "# nothing\n", None).is_err());
    }

    #[test]
    fn test_normals_accumulate_without_renormalising() {
        // Two coplanar triangles sharing an edge: shared vertices get length 2.
        let obj = "v 0 0 0\nv 1 0 0\nv 1 1 0\nv 0 1 0\nf 1 2 3\nf 1 3 4\n";
        let asset = MeshAsset::from_obj_mtl("pair", obj, None).unwrap();

        let shared = asset.positions.iter().position(|p| *p == [0.0, 0.0, 0.0]).unwrap();
        let lone = asset.positions.iter().position(|p| *p == [1.0, 0.0, 0.0]).unwrap();
        assert!((asset.normals[shared][2] - 2.0).abs() < 1e-6);
        assert!((asset.normals[lone][2] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_pack_two_materials() {
        let materials = vec![
            Material {
                name: "a".into(),
                ambient: [0.1, 0.2, 0.3],
                diffuse: [0.4, 0.5, 0.6],
                specular: [0.7, 0.8, 0.9],
                shininess: 32.0,
            },
            Material {
                name: "b".into(),
                diffuse: [1.0, 0.5, 0.0],
                ..Default::default()
            },
        ];

        let packed = pack_material_uniforms(&materials);
        assert_eq!(packed.len(), 32);

        assert_eq!(&packed[0..4], &[0.1, 0.2, 0.3, 1.0]);
        assert_eq!(&packed[4..8], &[0.4, 0.5, 0.6, 1.0]);
        assert_eq!(&packed[8..12], &[0.7, 0.8, 0.9, 1.0]);
        assert_eq!(packed[12], 32.0);

        assert_eq!(&packed[16..20], &[0.0, 0.0, 0.0, 1.0]);
        assert_eq!(&packed[20..24], &[1.0, 0.5, 0.0, 1.0]);
        assert_eq!(packed[28], 1.0);
    }

    #[test]
    fn test_material_uniforms_truncate() {
        let mut asset = MeshAsset::from_obj_mtl("tri", "v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\n", None).unwrap();
        asset.materials = vec![Material::default(); MAX_MATERIALS + 3];
        assert_eq!(asset.material_uniforms().len(), MAX_MATERIALS * MATERIAL_STRIDE);
    }

    #[test]
    fn test_bounds() {
        let bounds = BoundingBox::from_positions(&[[-1.0, 0.0, 0.0], [1.0, 4.0, 0.0]]);
        assert_eq!(bounds.center(), [0.0, 2.0, 0.0]);
        assert_eq!(bounds.radius(), 2.0);
    }

    #[test]
    fn test_vertices_interleave() {
        let asset = MeshAsset::from_obj_mtl("quad", QUAD_OBJ, Some(QUAD_MTL)).unwrap();
        let vertices = asset.vertices();
        assert_eq!(vertices.len(), asset.positions.len());
        assert!(vertices.iter().any(|v| v.material_id == 1));
    }
}
