//! Scene configuration.
//!
//! Every field has a default, so an empty JSON object describes the stock
//! water scene. Keys are camelCase on disk.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

fn default_noise_size() -> u32 {
    256
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NoiseConfig {
    /// Edge length of the cubic noise volume.
    pub size: u32,
    /// Fixed seed for the random field. None draws from the thread RNG.
    pub seed: Option<u64>,
}

impl Default for NoiseConfig {
    fn default() -> Self {
        Self {
            size: default_noise_size(),
            seed: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AssetConfig {
    /// OBJ file for the floating model. Its `mtllib` is resolved next to it.
    pub mesh: Option<PathBuf>,
    /// Directory holding `xp, xn, yp, yn, zp, zn` face images.
    pub skybox_dir: Option<PathBuf>,
    /// Directory overriding the built-in WGSL sources.
    pub shader_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CameraConfig {
    /// Vertical field of view in radians.
    pub fov_y: f32,
    pub near: f32,
    pub far: f32,
    /// Horizontal distance from the origin.
    pub distance: f32,
    /// Height above the water plane.
    pub height: f32,
    /// Orbit speed in radians per second while a direction is held.
    pub orbit_speed: f32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            fov_y: 2.0 * std::f32::consts::PI / 5.0,
            near: 1.0,
            far: 3000.0,
            distance: 40.0,
            height: 12.0,
            orbit_speed: 0.5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WaterConfig {
    /// Height of the floor plane below the surface.
    pub floor_depth: f32,
    /// Apparent-depth divisor for the refraction pass.
    pub refractive_index: f32,
    /// Depth lookup increment per second of wall-clock time.
    pub depth_lookup_rate: f32,
    /// Half-extent of the skybox cube.
    pub skybox_scale: f32,
}

impl Default for WaterConfig {
    fn default() -> Self {
        Self {
            floor_depth: -10.0,
            refractive_index: 1.333,
            depth_lookup_rate: 0.000125,
            skybox_scale: 1000.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LightConfig {
    pub position: [f32; 3],
    pub global_ambient: f32,
    pub ambient: f32,
    pub diffuse: f32,
    pub specular: f32,
}

impl Default for LightConfig {
    fn default() -> Self {
        Self {
            position: [-10.0, 10.0, -50.0],
            global_ambient: 0.7,
            ambient: 0.0,
            diffuse: 1.0,
            specular: 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SurfaceMaterialConfig {
    pub ambient: [f32; 4],
    pub diffuse: [f32; 4],
    pub specular: [f32; 4],
    pub shininess: f32,
}

impl Default for SurfaceMaterialConfig {
    fn default() -> Self {
        Self {
            ambient: [0.5, 0.6, 0.8, 1.0],
            diffuse: [0.8, 0.9, 1.0, 1.0],
            specular: [1.0, 1.0, 1.0, 1.0],
            shininess: 250.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ModelConfig {
    pub scale: f32,
    /// Vertical bob amplitude in world units.
    pub bob_amplitude: f32,
    /// Bob cycles per second.
    pub bob_frequency: f32,
    /// Peak roll in radians.
    pub tilt: f32,
    /// Rest rotation about the (1, 1, 0) axis in radians.
    pub rest_rotation: f32,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            scale: 1.0,
            bob_amplitude: 0.3,
            bob_frequency: 0.4,
            tilt: 0.08,
            rest_rotation: 1.5,
        }
    }
}

/// Top-level scene configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SceneConfig {
    pub noise: NoiseConfig,
    pub assets: AssetConfig,
    pub camera: CameraConfig,
    pub water: WaterConfig,
    pub light: LightConfig,
    pub surface_material: SurfaceMaterialConfig,
    pub model: ModelConfig,
}

impl SceneConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Failed to parse scene config")
    }

    /// Load from a JSON file. Relative asset paths are resolved against the
    /// file's directory.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read scene config {}", path.display()))?;
        let mut config = Self::from_json(&contents)
            .with_context(|| format!("Invalid scene config {}", path.display()))?;

        if let Some(base) = path.parent() {
            config.assets.resolve_relative_to(base);
        }
        Ok(config)
    }
}

impl AssetConfig {
    fn resolve_relative_to(&mut self, base: &Path) {
        for slot in [&mut self.mesh, &mut self.skybox_dir, &mut self.shader_dir] {
            if let Some(p) = slot.as_mut() {
                if p.is_relative() {
                    *p = base.join(&*p);
                }
            }
        }
    }
}
