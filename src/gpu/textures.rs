//! Static textures: the 3D noise volume and the skybox cubemap.

use std::path::Path;

use anyhow::{ensure, Context, Result};
use image::RgbaImage;

use crate::noise::NoiseVolume;

/// Face file stems in cube layer order (+X, -X, +Y, -Y, +Z, -Z).
pub const CUBE_FACES: [&str; 6] = ["xp", "xn", "yp", "yn", "zp", "zn"];

const FACE_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

pub struct GpuTexture {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
}

/// Fail unless every edge of a `width x height x depth` volume is non-zero and
/// fits within `max_dimension` (the device's `max_texture_dimension_3d`).
pub fn check_volume_extent(dimensions: (usize, usize, usize), max_dimension: u32) -> Result<()> {
    let (width, height, depth) = dimensions;
    for (axis, edge) in [("width", width), ("height", height), ("depth", depth)] {
        ensure!(edge > 0, "Noise volume {} is zero", axis);
        ensure!(
            edge <= max_dimension as usize,
            "Noise volume {} {} exceeds the device's 3D texture limit of {}",
            axis,
            edge,
            max_dimension
        );
    }
    Ok(())
}

/// Upload the noise volume as a 3D RGBA8 texture.
pub fn create_noise_texture(device: &wgpu::Device, queue: &wgpu::Queue, volume: &NoiseVolume) -> GpuTexture {
    let (width, height, depth) = volume.dimensions();
    let size = wgpu::Extent3d {
        width: width as u32,
        height: height as u32,
        depth_or_array_layers: depth as u32,
    };

    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("Noise Texture"),
        size,
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D3,
        format: wgpu::TextureFormat::Rgba8Unorm,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });

    queue.write_texture(
        wgpu::ImageCopyTexture {
            texture: &texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        &volume.to_rgba8(),
        wgpu::ImageDataLayout {
            offset: 0,
            bytes_per_row: Some(4 * size.width),
            rows_per_image: Some(size.height),
        },
        size,
    );

    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    GpuTexture { texture, view }
}

/// Six square faces of equal size.
#[derive(Debug, Clone)]
pub struct CubemapImages {
    pub faces: [RgbaImage; 6],
}

impl CubemapImages {
    pub fn size(&self) -> u32 {
        self.faces[0].width()
    }

    fn validate(&self) -> Result<()> {
        let size = self.size();
        ensure!(size > 0, "Cubemap faces are empty");
        for (face, name) in self.faces.iter().zip(CUBE_FACES) {
            ensure!(
                face.width() == size && face.height() == size,
                "Cubemap face '{}' is {}x{}, expected {}x{}",
                name,
                face.width(),
                face.height(),
                size,
                size
            );
        }
        Ok(())
    }

    /// Load `xp, xn, yp, yn, zp, zn` images (jpg or png) from `dir`.
    pub fn load_dir(dir: &Path) -> Result<Self> {
        let mut faces = Vec::with_capacity(6);
        for name in CUBE_FACES {
            let path = FACE_EXTENSIONS
                .iter()
                .map(|ext| dir.join(format!("{}.{}", name, ext)))
                .find(|p| p.exists())
                .with_context(|| format!("Skybox face '{}' not found in {}", name, dir.display()))?;

            let face = image::open(&path)
                .with_context(|| format!("Failed to decode skybox face {}", path.display()))?
                .to_rgba8();
            faces.push(face);
        }

        let faces: [RgbaImage; 6] = faces
            .try_into()
            .map_err(|_| anyhow::anyhow!("Expected six skybox faces"))?;
        let images = Self { faces };
        images.validate()?;
        log::info!("Loaded skybox from {} ({}px faces)", dir.display(), images.size());
        Ok(images)
    }

    /// Vertical gradient sky: horizon haze to deep blue overhead, dark below.
    pub fn procedural(size: u32) -> Self {
        let size = size.max(1);
        let faces = std::array::from_fn(|layer| {
            RgbaImage::from_fn(size, size, |x, y| {
                let dir = face_direction(layer, x, y, size);
                sky_color(dir[1] / (dir[0] * dir[0] + dir[1] * dir[1] + dir[2] * dir[2]).sqrt())
            })
        });
        Self { faces }
    }
}

/// Direction through texel centre `(x, y)` of cube layer `layer`.
fn face_direction(layer: usize, x: u32, y: u32, size: u32) -> [f32; 3] {
    let u = 2.0 * (x as f32 + 0.5) / size as f32 - 1.0;
    let v = 2.0 * (y as f32 + 0.5) / size as f32 - 1.0;
    match layer {
        0 => [1.0, -v, -u],
        1 => [-1.0, -v, u],
        2 => [u, 1.0, v],
        3 => [u, -1.0, -v],
        4 => [u, -v, 1.0],
        _ => [-u, -v, -1.0],
    }
}

fn sky_color(elevation: f32) -> image::Rgba<u8> {
    let lerp = |a: f32, b: f32, t: f32| a + (b - a) * t;
    let (r, g, b) = if elevation >= 0.0 {
        let t = elevation.sqrt();
        (lerp(0.85, 0.20, t), lerp(0.90, 0.45, t), lerp(0.95, 0.85, t))
    } else {
        let t = (-elevation).sqrt();
        (lerp(0.60, 0.10, t), lerp(0.70, 0.15, t), lerp(0.75, 0.25, t))
    };
    image::Rgba([(r * 255.0) as u8, (g * 255.0) as u8, (b * 255.0) as u8, 255])
}

/// Upload six faces into a layered texture viewed as a cube.
pub fn create_cubemap_texture(device: &wgpu::Device, queue: &wgpu::Queue, images: &CubemapImages) -> GpuTexture {
    let size = images.size();
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("Skybox Cubemap"),
        size: wgpu::Extent3d {
            width: size,
            height: size,
            depth_or_array_layers: 6,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: wgpu::TextureFormat::Rgba8UnormSrgb,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });

    for (layer, face) in images.faces.iter().enumerate() {
        queue.write_texture(
            wgpu::ImageCopyTexture {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d {
                    x: 0,
                    y: 0,
                    z: layer as u32,
                },
                aspect: wgpu::TextureAspect::All,
            },
            face.as_raw(),
            wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(4 * size),
                rows_per_image: Some(size),
            },
            wgpu::Extent3d {
                width: size,
                height: size,
                depth_or_array_layers: 1,
            },
        );
    }

    let view = texture.create_view(&wgpu::TextureViewDescriptor {
        label: Some("Skybox Cube View"),
        dimension: Some(wgpu::TextureViewDimension::Cube),
        ..Default::default()
    });
    GpuTexture { texture, view }
}

/// Trilinear sampler that wraps in every direction (noise lookups).
pub fn create_repeat_sampler(device: &wgpu::Device, label: &str) -> wgpu::Sampler {
    device.create_sampler(&wgpu::SamplerDescriptor {
        label: Some(label),
        address_mode_u: wgpu::AddressMode::Repeat,
        address_mode_v: wgpu::AddressMode::Repeat,
        address_mode_w: wgpu::AddressMode::Repeat,
        mag_filter: wgpu::FilterMode::Linear,
        min_filter: wgpu::FilterMode::Linear,
        mipmap_filter: wgpu::FilterMode::Nearest,
        ..Default::default()
    })
}

/// Linear sampler clamped to the edge (cubemap).
pub fn create_clamp_sampler(device: &wgpu::Device, label: &str) -> wgpu::Sampler {
    device.create_sampler(&wgpu::SamplerDescriptor {
        label: Some(label),
        address_mode_u: wgpu::AddressMode::ClampToEdge,
        address_mode_v: wgpu::AddressMode::ClampToEdge,
        address_mode_w: wgpu::AddressMode::ClampToEdge,
        mag_filter: wgpu::FilterMode::Linear,
        min_filter: wgpu::FilterMode::Linear,
        mipmap_filter: wgpu::FilterMode::Nearest,
        ..Default::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_volume_extent_within_limit() {
        assert!(check_volume_extent((256, 256, 256), 256).is_ok());
        assert!(check_volume_extent((64, 64, 64), 2048).is_ok());
    }

    #[test]
    fn test_volume_extent_over_limit_is_error() {
        let err = check_volume_extent((300, 300, 300), 256).unwrap_err();
        assert!(err.to_string().contains("300"));
        assert!(check_volume_extent((8, 8, 257), 256).is_err());
        assert!(check_volume_extent((0, 8, 8), 256).is_err());
    }

    #[test]
    fn test_procedural_sky_shape() {
        let sky = CubemapImages::procedural(8);
        assert_eq!(sky.size(), 8);
        assert!(sky.validate().is_ok());
    }

    #[test]
    fn test_procedural_sky_is_brighter_above_than_below() {
        let sky = CubemapImages::procedural(4);
        let top = sky.faces[2].get_pixel(2, 2);
        let bottom = sky.faces[3].get_pixel(2, 2);
        assert!(top[2] > bottom[2]);
    }

    #[test]
    fn test_face_directions_point_along_axes() {
        // Centre texel of each face (odd size so it is exact).
        let expected = [
            [1.0, 0.0, 0.0],
            [-1.0, 0.0, 0.0],
            [0.0, 1.0, 0.0],
            [0.0, -1.0, 0.0],
            [0.0, 0.0, 1.0],
            [0.0, 0.0, -1.0],
        ];
        for (layer, axis) in expected.iter().enumerate() {
            let d = face_direction(layer, 1, 1, 3);
            for i in 0..3 {
                assert!((d[i] - axis[i]).abs() < 1e-6, "layer {} -> {:?}", layer, d);
            }
        }
    }

    #[test]
    fn test_mismatched_faces_rejected() {
        let mut sky = CubemapImages::procedural(4);
        sky.faces[5] = RgbaImage::new(2, 2);
        assert!(sky.validate().is_err());
    }

    #[test]
    fn test_missing_skybox_dir_is_error() {
        assert!(CubemapImages::load_dir(Path::new("/no/such/skybox")).is_err());
    }
}
