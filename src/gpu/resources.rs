//! Long-lived GPU objects for the water scene.
//!
//! Everything here is created once by [`build_static_resources`]. Targets that
//! depend on the window size live in the compositor instead.

use std::time::Duration;

use anyhow::{Context, Result};
use bytemuck::{Pod, Zeroable};
use wgpu::util::DeviceExt;

use crate::config::SceneConfig;
use crate::gpu::geometry;
use crate::gpu::layouts::{self, BindLayouts, MODEL_MATERIALS_SIZE};
use crate::gpu::pipeline;
use crate::gpu::shaders::{self, ShaderSources};
use crate::gpu::targets::OFFSCREEN_FORMAT;
use crate::gpu::textures::{self, CubemapImages, GpuTexture};
use crate::lighting::{LightUniforms, SurfaceMaterialUniforms};
use crate::mesh_asset::MeshAsset;
use crate::noise::NoiseVolume;
use crate::scene::ScenePass;

/// Size of the procedural sky faces when no skybox directory is configured.
const PROCEDURAL_SKY_SIZE: u32 = 256;

/// Shared per-frame scalars (16 bytes).
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct FrameUniforms {
    pub depth_lookup: f32,
    pub time: f32,
    pub _padding: [f32; 2],
}

/// CPU-side inputs gathered before any GPU object exists.
pub struct SceneAssets {
    pub noise: NoiseVolume,
    pub sky: CubemapImages,
    pub mesh: Option<MeshAsset>,
    pub shaders: ShaderSources,
    pub light: LightUniforms,
    pub surface_material: SurfaceMaterialUniforms,
}

impl SceneAssets {
    /// Generate the noise volume and read every asset named by `config`.
    ///
    /// A configured mesh, skybox or shader directory that cannot be read is
    /// an error; unconfigured ones fall back to built-ins.
    pub fn load(config: &SceneConfig) -> Result<Self> {
        let noise = generate_noise(config);

        let sky = match &config.assets.skybox_dir {
            Some(dir) => CubemapImages::load_dir(dir)?,
            None => CubemapImages::procedural(PROCEDURAL_SKY_SIZE),
        };

        let mesh = match &config.assets.mesh {
            Some(path) => Some(MeshAsset::load(path)?),
            None => {
                log::info!("No mesh configured; model pass will draw nothing");
                None
            }
        };

        let shaders = match &config.assets.shader_dir {
            Some(dir) => ShaderSources::from_dir(dir)?,
            None => ShaderSources::builtin(),
        };

        Ok(Self::with_parts(config, noise, sky, mesh, shaders))
    }

    /// Assemble from pre-loaded parts (used where files are not reachable).
    pub fn with_parts(
        config: &SceneConfig,
        noise: NoiseVolume,
        sky: CubemapImages,
        mesh: Option<MeshAsset>,
        shaders: ShaderSources,
    ) -> Self {
        Self {
            noise,
            sky,
            mesh,
            shaders,
            light: LightUniforms::from_config(&config.light),
            surface_material: SurfaceMaterialUniforms::from_config(&config.surface_material),
        }
    }
}

/// Generate the configured noise volume, logging how long it took.
pub fn generate_noise(config: &SceneConfig) -> NoiseVolume {
    let size = config.noise.size.max(1) as usize;
    let timer = Timer::start();
    let volume = match config.noise.seed {
        Some(seed) => NoiseVolume::generate_seeded(size, size, size, seed),
        None => NoiseVolume::generate(size, size, size),
    };
    log::info!("Generated {}^3 noise volume in {:.2?}", size, timer.elapsed());
    volume
}

/// Wall-clock timer that degrades to zero where `Instant` is unavailable.
struct Timer {
    #[cfg(not(target_arch = "wasm32"))]
    start: std::time::Instant,
}

impl Timer {
    fn start() -> Self {
        Self {
            #[cfg(not(target_arch = "wasm32"))]
            start: std::time::Instant::now(),
        }
    }

    fn elapsed(&self) -> Duration {
        #[cfg(not(target_arch = "wasm32"))]
        {
            self.start.elapsed()
        }
        #[cfg(target_arch = "wasm32")]
        {
            Duration::ZERO
        }
    }
}

pub struct IndexedGeometry {
    pub vertex_buffer: wgpu::Buffer,
    pub index_buffer: wgpu::Buffer,
    pub index_format: wgpu::IndexFormat,
    pub num_indices: u32,
}

/// Model and normal matrix buffers plus the matrix bind group for one pass.
pub struct PassBuffers {
    pub model_buffer: wgpu::Buffer,
    pub normal_buffer: wgpu::Buffer,
    pub matrix_bind_group: wgpu::BindGroup,
}

pub struct ScenePipelines {
    pub skybox: wgpu::RenderPipeline,
    pub reflection: wgpu::RenderPipeline,
    pub floor: wgpu::RenderPipeline,
    pub refraction: wgpu::RenderPipeline,
    pub surface: wgpu::RenderPipeline,
    pub model: wgpu::RenderPipeline,
}

pub struct ResourceSet {
    pub layouts: BindLayouts,
    pub pipelines: ScenePipelines,

    pub skybox: IndexedGeometry,
    pub plane: IndexedGeometry,
    pub model: Option<IndexedGeometry>,

    // Written once per frame, read by every pass.
    pub view_buffer: wgpu::Buffer,
    pub projection_buffer: wgpu::Buffer,
    pub frame_buffer: wgpu::Buffer,

    pub passes: Vec<PassBuffers>,

    pub light_buffer: wgpu::Buffer,
    pub surface_material_buffer: wgpu::Buffer,
    pub light_material_bind_group: wgpu::BindGroup,

    pub model_material_buffer: wgpu::Buffer,
    pub model_material_bind_group: wgpu::BindGroup,

    pub noise_texture: GpuTexture,
    pub cubemap: GpuTexture,
    pub repeat_sampler: wgpu::Sampler,
    pub clamp_sampler: wgpu::Sampler,
    pub cubemap_bind_group: wgpu::BindGroup,
    pub noise_bind_group: wgpu::BindGroup,
}

fn uniform_buffer(device: &wgpu::Device, label: &str, contents: &[u8]) -> wgpu::Buffer {
    device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some(label),
        contents,
        usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
    })
}

fn identity_matrix_buffer(device: &wgpu::Device, label: &str) -> wgpu::Buffer {
    uniform_buffer(device, label, bytemuck::cast_slice(&glam::Mat4::IDENTITY.to_cols_array()))
}

/// Build every static GPU object: geometry, uniform buffers, textures,
/// layouts, pipelines and bind groups.
///
/// Fails if a shader does not compile.
pub async fn build_static_resources(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    surface_format: wgpu::TextureFormat,
    assets: &SceneAssets,
) -> Result<ResourceSet> {
    // === Shader + Pipeline Setup ===

    let modules = shaders::create_shader_modules(device, &assets.shaders)
        .await
        .context("Failed to build scene shaders")?;

    let layouts = layouts::create_bind_layouts(device);
    let pipeline_layouts = layouts::create_pipeline_layouts(device, &layouts);

    let pipelines = ScenePipelines {
        skybox: pipeline::create_skybox_pipeline(
            device,
            &pipeline_layouts.skybox,
            &modules.skybox,
            surface_format,
            "Skybox Pipeline",
        ),
        reflection: pipeline::create_skybox_pipeline(
            device,
            &pipeline_layouts.skybox,
            &modules.skybox,
            OFFSCREEN_FORMAT,
            "Skybox Reflection Pipeline",
        ),
        floor: pipeline::create_floor_pipeline(
            device,
            &pipeline_layouts.floor,
            &modules.floor,
            surface_format,
            "Floor Pipeline",
        ),
        refraction: pipeline::create_floor_pipeline(
            device,
            &pipeline_layouts.floor,
            &modules.floor,
            OFFSCREEN_FORMAT,
            "Floor Refraction Pipeline",
        ),
        surface: pipeline::create_surface_pipeline(device, &pipeline_layouts.surface, &modules.surface, surface_format),
        model: pipeline::create_model_pipeline(device, &pipeline_layouts.model, &modules.model, surface_format),
    };

    // === Geometry Setup ===

    let (sky_vertices, sky_indices) = geometry::create_skybox_geometry();
    let skybox = IndexedGeometry {
        vertex_buffer: device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Skybox Vertex Buffer"),
            contents: bytemuck::cast_slice(&sky_vertices),
            usage: wgpu::BufferUsages::VERTEX,
        }),
        index_buffer: device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Skybox Index Buffer"),
            contents: bytemuck::cast_slice(&sky_indices),
            usage: wgpu::BufferUsages::INDEX,
        }),
        index_format: wgpu::IndexFormat::Uint16,
        num_indices: sky_indices.len() as u32,
    };

    let (plane_vertices, plane_indices) = geometry::create_plane_geometry();
    let plane = IndexedGeometry {
        vertex_buffer: device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Plane Vertex Buffer"),
            contents: bytemuck::cast_slice(&plane_vertices),
            usage: wgpu::BufferUsages::VERTEX,
        }),
        index_buffer: device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Plane Index Buffer"),
            contents: bytemuck::cast_slice(&plane_indices),
            usage: wgpu::BufferUsages::INDEX,
        }),
        index_format: wgpu::IndexFormat::Uint16,
        num_indices: plane_indices.len() as u32,
    };

    let model = assets.mesh.as_ref().map(|mesh| IndexedGeometry {
        vertex_buffer: device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("Model Vertex Buffer: {}", mesh.id)),
            contents: bytemuck::cast_slice(&mesh.vertices()),
            usage: wgpu::BufferUsages::VERTEX,
        }),
        index_buffer: device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("Model Index Buffer: {}", mesh.id)),
            contents: bytemuck::cast_slice(&mesh.indices),
            usage: wgpu::BufferUsages::INDEX,
        }),
        index_format: wgpu::IndexFormat::Uint32,
        num_indices: mesh.indices.len() as u32,
    });

    // === Uniform Setup ===

    let view_buffer = identity_matrix_buffer(device, "View Matrix Buffer");
    let projection_buffer = identity_matrix_buffer(device, "Projection Matrix Buffer");
    let frame_buffer = uniform_buffer(device, "Frame Uniform Buffer", bytemuck::bytes_of(&FrameUniforms::default()));

    let passes = ScenePass::ORDER
        .iter()
        .map(|pass| {
            let model_buffer = identity_matrix_buffer(device, &format!("{} Model Matrix", pass.label()));
            let normal_buffer = identity_matrix_buffer(device, &format!("{} Normal Matrix", pass.label()));
            let matrix_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some(&format!("{} Matrix Bind Group", pass.label())),
                layout: &layouts.matrix,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: model_buffer.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: view_buffer.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 2,
                        resource: projection_buffer.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 3,
                        resource: normal_buffer.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 4,
                        resource: frame_buffer.as_entire_binding(),
                    },
                ],
            });
            PassBuffers {
                model_buffer,
                normal_buffer,
                matrix_bind_group,
            }
        })
        .collect();

    let light_buffer = uniform_buffer(device, "Light Buffer", bytemuck::bytes_of(&assets.light));
    let surface_material_buffer = uniform_buffer(
        device,
        "Surface Material Buffer",
        bytemuck::bytes_of(&assets.surface_material),
    );
    let light_material_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("Light Material Bind Group"),
        layout: &layouts.light_material,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: light_buffer.as_entire_binding(),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: surface_material_buffer.as_entire_binding(),
            },
        ],
    });

    let model_material_buffer = device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("Model Material Buffer"),
        size: MODEL_MATERIALS_SIZE,
        usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    });
    if let Some(mesh) = &assets.mesh {
        let packed = mesh.material_uniforms();
        // Zero materials leaves the buffer zeroed.
        if !packed.is_empty() {
            queue.write_buffer(&model_material_buffer, 0, bytemuck::cast_slice(&packed));
        }
    }
    let model_material_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("Model Material Bind Group"),
        layout: &layouts.model_materials,
        entries: &[wgpu::BindGroupEntry {
            binding: 0,
            resource: model_material_buffer.as_entire_binding(),
        }],
    });

    // === Texture Setup ===

    textures::check_volume_extent(assets.noise.dimensions(), device.limits().max_texture_dimension_3d)
        .context("Noise volume does not fit on this device")?;
    let noise_texture = textures::create_noise_texture(device, queue, &assets.noise);
    let cubemap = textures::create_cubemap_texture(device, queue, &assets.sky);
    let repeat_sampler = textures::create_repeat_sampler(device, "Noise Sampler");
    let clamp_sampler = textures::create_clamp_sampler(device, "Skybox Sampler");

    let cubemap_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("Cubemap Bind Group"),
        layout: &layouts.cubemap,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::Sampler(&clamp_sampler),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::TextureView(&cubemap.view),
            },
        ],
    });

    let noise_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("Noise Bind Group"),
        layout: &layouts.noise,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::Sampler(&repeat_sampler),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::TextureView(&noise_texture.view),
            },
        ],
    });

    log::info!(
        "Built static resources ({} passes, model: {})",
        ScenePass::ORDER.len(),
        assets.mesh.as_ref().map_or("none", |m| m.id.as_str())
    );

    Ok(ResourceSet {
        layouts,
        pipelines,
        skybox,
        plane,
        model,
        view_buffer,
        projection_buffer,
        frame_buffer,
        passes,
        light_buffer,
        surface_material_buffer,
        light_material_bind_group,
        model_material_buffer,
        model_material_bind_group,
        noise_texture,
        cubemap,
        repeat_sampler,
        clamp_sampler,
        cubemap_bind_group,
        noise_bind_group,
    })
}

impl ResourceSet {
    pub fn pass(&self, pass: ScenePass) -> &PassBuffers {
        &self.passes[pass.index()]
    }

    /// Bind the noise volume and both offscreen colour targets for the
    /// surface pass. Rebuilt whenever the targets are recreated.
    pub fn create_surface_bind_group(
        &self,
        device: &wgpu::Device,
        reflection: &wgpu::TextureView,
        refraction: &wgpu::TextureView,
    ) -> wgpu::BindGroup {
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Surface Texture Bind Group"),
            layout: &self.layouts.surface,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::Sampler(&self.repeat_sampler),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(&self.noise_texture.view),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::TextureView(reflection),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: wgpu::BindingResource::TextureView(refraction),
                },
            ],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_uniform_size() {
        assert_eq!(std::mem::size_of::<FrameUniforms>() as u64, layouts::FRAME_UNIFORM_SIZE);
    }

    #[test]
    fn test_generate_noise_respects_config() {
        let mut config = SceneConfig::default();
        config.noise.size = 4;
        config.noise.seed = Some(5);
        let a = generate_noise(&config);
        let b = generate_noise(&config);
        assert_eq!(a.len(), 64);
        assert_eq!(a.values(), b.values());
    }

    #[test]
    fn test_assets_load_defaults_without_files() {
        let mut config = SceneConfig::default();
        config.noise.size = 2;
        let assets = SceneAssets::load(&config).unwrap();
        assert!(assets.mesh.is_none());
        assert_eq!(assets.sky.size(), PROCEDURAL_SKY_SIZE);
        assert_eq!(assets.surface_material.shininess, 250.0);
    }

    #[test]
    fn test_missing_configured_mesh_is_fatal() {
        let mut config = SceneConfig::default();
        config.noise.size = 2;
        config.assets.mesh = Some("/no/such/duck.obj".into());
        assert!(SceneAssets::load(&config).is_err());
    }
}
