//! Bind group and pipeline layouts shared by the water scene pipelines.
//!
//! Group indices per pipeline:
//!
//! | pipeline              | 0               | 1              | 2      |
//! |-----------------------|-----------------|----------------|--------|
//! | skybox / reflection   | cubemap         | matrix         |        |
//! | floor / refraction    | noise           | light+material | matrix |
//! | water surface         | surface         | light+material | matrix |
//! | model                 | model materials | light+material | matrix |

use std::num::NonZeroU64;

use crate::lighting::{LightUniforms, SurfaceMaterialUniforms};
use crate::mesh_asset::{MATERIAL_STRIDE, MAX_MATERIALS};

/// Size of one 4x4 matrix uniform.
pub const MATRIX_SIZE: u64 = 64;

/// Size of the per-frame uniform (depth lookup + padding).
pub const FRAME_UNIFORM_SIZE: u64 = 16;

/// Byte size of the model material array.
pub const MODEL_MATERIALS_SIZE: u64 = (MAX_MATERIALS * MATERIAL_STRIDE * 4) as u64;

pub struct BindLayouts {
    pub cubemap: wgpu::BindGroupLayout,
    pub noise: wgpu::BindGroupLayout,
    pub surface: wgpu::BindGroupLayout,
    pub light_material: wgpu::BindGroupLayout,
    pub model_materials: wgpu::BindGroupLayout,
    pub matrix: wgpu::BindGroupLayout,
}

pub struct PipelineLayouts {
    pub skybox: wgpu::PipelineLayout,
    pub floor: wgpu::PipelineLayout,
    pub surface: wgpu::PipelineLayout,
    pub model: wgpu::PipelineLayout,
}

fn sampler_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
        count: None,
    }
}

fn texture_entry(binding: u32, view_dimension: wgpu::TextureViewDimension) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Texture {
            sample_type: wgpu::TextureSampleType::Float { filterable: true },
            view_dimension,
            multisampled: false,
        },
        count: None,
    }
}

fn uniform_entry(binding: u32, visibility: wgpu::ShaderStages, size: u64) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: NonZeroU64::new(size),
        },
        count: None,
    }
}

pub fn create_bind_layouts(device: &wgpu::Device) -> BindLayouts {
    let cubemap = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("cubemap_bind_group_layout"),
        entries: &[
            sampler_entry(0),
            texture_entry(1, wgpu::TextureViewDimension::Cube),
        ],
    });

    let noise = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("noise_bind_group_layout"),
        entries: &[
            sampler_entry(0),
            texture_entry(1, wgpu::TextureViewDimension::D3),
        ],
    });

    let surface = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("surface_bind_group_layout"),
        entries: &[
            sampler_entry(0),
            texture_entry(1, wgpu::TextureViewDimension::D3),
            texture_entry(2, wgpu::TextureViewDimension::D2), // reflection
            texture_entry(3, wgpu::TextureViewDimension::D2), // refraction
        ],
    });

    let light_material = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("light_material_bind_group_layout"),
        entries: &[
            uniform_entry(0, wgpu::ShaderStages::FRAGMENT, std::mem::size_of::<LightUniforms>() as u64),
            uniform_entry(1, wgpu::ShaderStages::FRAGMENT, std::mem::size_of::<SurfaceMaterialUniforms>() as u64),
        ],
    });

    let model_materials = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("model_materials_bind_group_layout"),
        entries: &[uniform_entry(0, wgpu::ShaderStages::FRAGMENT, MODEL_MATERIALS_SIZE)],
    });

    // model, view, projection, normal, frame
    let vf = wgpu::ShaderStages::VERTEX_FRAGMENT;
    let matrix = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("matrix_bind_group_layout"),
        entries: &[
            uniform_entry(0, vf, MATRIX_SIZE),
            uniform_entry(1, vf, MATRIX_SIZE),
            uniform_entry(2, vf, MATRIX_SIZE),
            uniform_entry(3, vf, MATRIX_SIZE),
            uniform_entry(4, vf, FRAME_UNIFORM_SIZE),
        ],
    });

    BindLayouts {
        cubemap,
        noise,
        surface,
        light_material,
        model_materials,
        matrix,
    }
}

pub fn create_pipeline_layouts(device: &wgpu::Device, layouts: &BindLayouts) -> PipelineLayouts {
    let skybox = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("Skybox Pipeline Layout"),
        bind_group_layouts: &[&layouts.cubemap, &layouts.matrix],
        push_constant_ranges: &[],
    });

    let floor = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("Floor Pipeline Layout"),
        bind_group_layouts: &[&layouts.noise, &layouts.light_material, &layouts.matrix],
        push_constant_ranges: &[],
    });

    let surface = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("Surface Pipeline Layout"),
        bind_group_layouts: &[&layouts.surface, &layouts.light_material, &layouts.matrix],
        push_constant_ranges: &[],
    });

    let model = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("Model Pipeline Layout"),
        bind_group_layouts: &[&layouts.model_materials, &layouts.light_material, &layouts.matrix],
        push_constant_ranges: &[],
    });

    PipelineLayouts {
        skybox,
        floor,
        surface,
        model,
    }
}
