use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};

use crate::config::SceneConfig;
use crate::gpu::compositor::FrameCompositor;
use crate::gpu::resources::{generate_noise, SceneAssets};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Options shared by every command that builds a scene.
#[derive(Args, Debug, Clone)]
struct SceneArgs {
    /// Scene config JSON
    #[arg(long)]
    config: Option<PathBuf>,

    /// OBJ mesh to float on the water (overrides config)
    #[arg(long)]
    mesh: Option<PathBuf>,

    /// Edge length of the noise volume (overrides config)
    #[arg(long)]
    noise_size: Option<u32>,

    /// Seed for the noise field (overrides config)
    #[arg(long)]
    seed: Option<u64>,
}

impl SceneArgs {
    fn load(&self) -> Result<SceneConfig> {
        let mut config = match &self.config {
            Some(path) => SceneConfig::load(path)?,
            None => SceneConfig::default(),
        };
        if let Some(mesh) = &self.mesh {
            config.assets.mesh = Some(mesh.clone());
        }
        if let Some(size) = self.noise_size {
            config.noise.size = size;
        }
        if self.seed.is_some() {
            config.noise.seed = self.seed;
        }
        Ok(config)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Open a window and animate the scene
    Run {
        #[command(flatten)]
        scene: SceneArgs,

        /// Window width
        #[arg(long, default_value_t = 1280)]
        width: u32,

        /// Window height
        #[arg(long, default_value_t = 720)]
        height: u32,
    },
    /// Render frames to disk
    Render {
        #[command(flatten)]
        scene: SceneArgs,

        /// Output directory for frames
        #[arg(long)]
        out: PathBuf,

        /// Frames per second
        #[arg(long, default_value_t = 60.0)]
        fps: f32,

        /// Number of frames to render
        #[arg(long, default_value_t = 120)]
        frames: usize,

        /// Camera orbit direction while rendering (-1, 0 or 1)
        #[arg(long, default_value_t = 0.0, allow_hyphen_values = true)]
        orbit: f32,

        /// Output width
        #[arg(long, default_value_t = 800)]
        width: u32,

        /// Output height
        #[arg(long, default_value_t = 600)]
        height: u32,
    },
    /// Generate a noise volume and write one slice as a greyscale PNG
    Noise {
        #[command(flatten)]
        scene: SceneArgs,

        /// Slice index along z
        #[arg(long, default_value_t = 0)]
        slice: usize,

        /// Output PNG path
        #[arg(long)]
        out: PathBuf,
    },
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run { scene, width, height } => {
            crate::app::run(scene.load()?, width, height)?;
        }
        Commands::Render {
            scene,
            out,
            fps,
            frames,
            orbit,
            width,
            height,
        } => {
            pollster::block_on(render_offline(scene.load()?, out, fps, frames, orbit, width, height))?;
        }
        Commands::Noise { scene, slice, out } => {
            write_noise_slice(&scene.load()?, slice, &out)?;
        }
    }
    Ok(())
}

/// Ask `adapter` for a device with its own limits.
pub(crate) async fn request_device(adapter: &wgpu::Adapter) -> Result<(wgpu::Device, wgpu::Queue)> {
    log::info!("Using adapter: {}", adapter.get_info().name);
    adapter
        .request_device(
            &wgpu::DeviceDescriptor {
                label: Some("Water Scene Device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default().using_resolution(adapter.limits()),
                memory_hints: Default::default(),
            },
            None,
        )
        .await
        .context("Failed to create device")
}

fn write_noise_slice(config: &SceneConfig, slice: usize, out: &std::path::Path) -> Result<()> {
    let volume = generate_noise(config);
    let (width, height, _) = volume.dimensions();
    image::save_buffer(
        out,
        &volume.slice_luma(slice),
        width as u32,
        height as u32,
        image::ColorType::L8,
    )
    .with_context(|| format!("Failed to write {}", out.display()))?;
    println!("Wrote noise slice {} to {:?}", slice, out);
    Ok(())
}

async fn render_offline(
    config: SceneConfig,
    out_dir: PathBuf,
    fps: f32,
    total_frames: usize,
    orbit: f32,
    width: u32,
    height: u32,
) -> Result<()> {
    anyhow::ensure!(width > 0 && height > 0, "Output size must be non-zero");
    anyhow::ensure!(fps > 0.0, "fps must be positive");
    let dt = 1.0 / fps;

    std::fs::create_dir_all(&out_dir)?;

    let assets = SceneAssets::load(&config)?;

    // WGPU Init
    let instance = wgpu::Instance::new(wgpu::InstanceDescriptor::default());
    let adapter = instance
        .request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: None, // Headless
            force_fallback_adapter: false,
        })
        .await
        .ok_or_else(|| anyhow::anyhow!("No adapter found"))?;

    let (device, queue) = request_device(&adapter).await?;

    let texture_desc = wgpu::TextureDescriptor {
        label: Some("Target Texture"),
        size: wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: wgpu::TextureFormat::Rgba8UnormSrgb,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
        view_formats: &[],
    };

    let texture = device.create_texture(&texture_desc);
    let texture_view = texture.create_view(&wgpu::TextureViewDescriptor::default());

    // Rows are padded to COPY_BYTES_PER_ROW_ALIGNMENT for the readback copy.
    let unpadded_bytes_per_row = 4 * width;
    let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
    let padded_bytes_per_row = unpadded_bytes_per_row.div_ceil(align) * align;

    let output_buffer = device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("Output Buffer"),
        size: (padded_bytes_per_row * height) as wgpu::BufferAddress,
        usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
        mapped_at_creation: false,
    });

    let mut compositor = FrameCompositor::new(device, queue, texture_desc.format, width, height, &config, &assets).await?;
    compositor.set_direction(orbit);

    println!("Rendering {} frames to {:?}...", total_frames, out_dir);

    for i in 0..total_frames {
        compositor.tick(dt);
        compositor.render(&texture_view);

        let mut encoder = compositor
            .device()
            .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some("Readback Encoder") });

        encoder.copy_texture_to_buffer(
            wgpu::ImageCopyTexture {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::ImageCopyBuffer {
                buffer: &output_buffer,
                layout: wgpu::ImageDataLayout {
                    offset: 0,
                    bytes_per_row: Some(padded_bytes_per_row),
                    rows_per_image: Some(height),
                },
            },
            texture_desc.size,
        );
        compositor.queue().submit(Some(encoder.finish()));

        let buffer_slice = output_buffer.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        buffer_slice.map_async(wgpu::MapMode::Read, move |v| {
            let _ = tx.send(v);
        });
        compositor.device().poll(wgpu::Maintain::Wait);
        rx.recv()
            .context("Readback channel closed")?
            .context("Failed to map readback buffer")?;

        let data = buffer_slice.get_mapped_range();

        let mut unpadded_data = Vec::with_capacity((unpadded_bytes_per_row * height) as usize);
        for row in 0..height {
            let start = (row * padded_bytes_per_row) as usize;
            let end = start + unpadded_bytes_per_row as usize;
            unpadded_data.extend_from_slice(&data[start..end]);
        }

        let frame_path = out_dir.join(format!("frame_{:05}.png", i));
        image::save_buffer(&frame_path, &unpadded_data, width, height, image::ColorType::Rgba8)?;

        drop(data);
        output_buffer.unmap();

        if i % 60 == 0 {
            print!(".");
            use std::io::Write;
            std::io::stdout().flush()?;
        }
    }
    println!("\nDone.");

    Ok(())
}
