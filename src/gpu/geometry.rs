use bytemuck::{Pod, Zeroable};

/// Half-extent of the floor and water planes.
pub const PLANE_HALF_EXTENT: f32 = 128.0;

/// Position-only vertex for the skybox cube.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct SkyboxVertex {
    pub position: [f32; 3],
}

impl SkyboxVertex {
    pub fn desc<'a>() -> wgpu::VertexBufferLayout<'a> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<SkyboxVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &[wgpu::VertexAttribute {
                offset: 0,
                shader_location: 0,
                format: wgpu::VertexFormat::Float32x3,
            }],
        }
    }
}

/// Floor / water plane vertex.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct PlaneVertex {
    pub position: [f32; 3],
    pub uv: [f32; 2],
    pub normal: [f32; 3],
}

impl PlaneVertex {
    const fn new(position: [f32; 3], uv: [f32; 2]) -> Self {
        Self {
            position,
            uv,
            normal: [0.0, 1.0, 0.0],
        }
    }

    pub fn desc<'a>() -> wgpu::VertexBufferLayout<'a> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<PlaneVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &[
                wgpu::VertexAttribute {
                    offset: 0,
                    shader_location: 0,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: 12,
                    shader_location: 1,
                    format: wgpu::VertexFormat::Float32x2,
                },
                wgpu::VertexAttribute {
                    offset: 20,
                    shader_location: 2,
                    format: wgpu::VertexFormat::Float32x3,
                },
            ],
        }
    }
}

/// Loaded mesh vertex with a per-vertex material index.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct ModelVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub material_id: u32,
}

impl ModelVertex {
    pub fn desc<'a>() -> wgpu::VertexBufferLayout<'a> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<ModelVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &[
                wgpu::VertexAttribute {
                    offset: 0,
                    shader_location: 0,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: 12,
                    shader_location: 1,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: 24,
                    shader_location: 2,
                    format: wgpu::VertexFormat::Uint32,
                },
            ],
        }
    }
}

/// Unit skybox cube (corners at ±1). Faces wind inwards.
pub fn create_skybox_geometry() -> (Vec<SkyboxVertex>, Vec<u16>) {
    let corners = [
        [-1.0, -1.0, -1.0],
        [1.0, -1.0, -1.0],
        [1.0, 1.0, -1.0],
        [-1.0, 1.0, -1.0],
        [-1.0, -1.0, 1.0],
        [1.0, -1.0, 1.0],
        [1.0, 1.0, 1.0],
        [-1.0, 1.0, 1.0],
    ];
    let vertices = corners.iter().map(|&position| SkyboxVertex { position }).collect();

    let indices = vec![
        0, 1, 2, 2, 3, 0, // Back (Z-)
        5, 4, 7, 7, 6, 5, // Front (Z+)
        4, 0, 3, 3, 7, 4, // Left (X-)
        1, 5, 6, 6, 2, 1, // Right (X+)
        3, 2, 6, 6, 7, 3, // Top (Y+)
        4, 5, 1, 1, 0, 4, // Bottom (Y-)
    ];

    (vertices, indices)
}

/// Plane at y = 0 spanning ±[`PLANE_HALF_EXTENT`], facing up.
pub fn create_plane_geometry() -> (Vec<PlaneVertex>, Vec<u16>) {
    let e = PLANE_HALF_EXTENT;
    let vertices = vec![
        PlaneVertex::new([-e, 0.0, -e], [0.0, 0.0]),
        PlaneVertex::new([-e, 0.0, e], [0.0, 1.0]),
        PlaneVertex::new([e, 0.0, -e], [1.0, 0.0]),
        PlaneVertex::new([e, 0.0, e], [1.0, 1.0]),
    ];

    let indices = vec![
        0, 1, 2, // First triangle
        2, 1, 3, // Second triangle
    ];

    (vertices, indices)
}
