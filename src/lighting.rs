//! Point light and water surface material uniforms.
//!
//! Both structs are bound together in the light/material group shared by the
//! floor, refraction, surface and model pipelines.

use bytemuck::{Pod, Zeroable};

use crate::config::{LightConfig, SurfaceMaterialConfig};

// ============================================================================
// GPU Uniforms
// ============================================================================

/// GPU-ready point light.
///
/// Total size: 80 bytes (16-byte aligned).
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct LightUniforms {
    pub global_ambient: [f32; 4], // offset 0
    pub ambient: [f32; 4],        // offset 16
    pub diffuse: [f32; 4],        // offset 32
    pub specular: [f32; 4],       // offset 48
    /// World-space position, w = 1.
    pub position: [f32; 4], // offset 64
}

impl LightUniforms {
    pub fn from_config(config: &LightConfig) -> Self {
        let grey = |v: f32| [v, v, v, 1.0];
        let [x, y, z] = config.position;
        Self {
            global_ambient: grey(config.global_ambient),
            ambient: grey(config.ambient),
            diffuse: grey(config.diffuse),
            specular: grey(config.specular),
            position: [x, y, z, 1.0],
        }
    }
}

impl Default for LightUniforms {
    fn default() -> Self {
        Self::from_config(&LightConfig::default())
    }
}

/// GPU-ready Phong material for the water surface and floor.
///
/// Total size: 64 bytes.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct SurfaceMaterialUniforms {
    pub ambient: [f32; 4],  // offset 0
    pub diffuse: [f32; 4],  // offset 16
    pub specular: [f32; 4], // offset 32
    pub shininess: f32,     // offset 48
    pub _padding: [f32; 3],
}

impl SurfaceMaterialUniforms {
    pub fn from_config(config: &SurfaceMaterialConfig) -> Self {
        Self {
            ambient: config.ambient,
            diffuse: config.diffuse,
            specular: config.specular,
            shininess: config.shininess,
            _padding: [0.0; 3],
        }
    }
}

impl Default for SurfaceMaterialUniforms {
    fn default() -> Self {
        Self::from_config(&SurfaceMaterialConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::mem::{offset_of, size_of};

    #[test]
    fn test_uniform_sizes() {
        assert_eq!(size_of::<LightUniforms>(), 80);
        assert_eq!(size_of::<SurfaceMaterialUniforms>(), 64);
    }

    #[test]
    fn test_light_field_offsets() {
        assert_eq!(offset_of!(LightUniforms, global_ambient), 0);
        assert_eq!(offset_of!(LightUniforms, ambient), 16);
        assert_eq!(offset_of!(LightUniforms, diffuse), 32);
        assert_eq!(offset_of!(LightUniforms, specular), 48);
        assert_eq!(offset_of!(LightUniforms, position), 64);
        assert_eq!(offset_of!(SurfaceMaterialUniforms, shininess), 48);
    }

    #[test]
    fn test_default_light() {
        let light = LightUniforms::default();
        assert_eq!(light.position, [-10.0, 10.0, -50.0, 1.0]);
        assert_eq!(light.global_ambient, [0.7, 0.7, 0.7, 1.0]);
        assert_eq!(light.ambient, [0.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_default_surface_material() {
        let material = SurfaceMaterialUniforms::default();
        assert_eq!(material.ambient, [0.5, 0.6, 0.8, 1.0]);
        assert_eq!(material.diffuse, [0.8, 0.9, 1.0, 1.0]);
        assert_eq!(material.shininess, 250.0);
    }
}
