//! Native windowed front end.
//!
//! Resizes re-render immediately from inside the event handler, while redraw
//! requests drive the animation. Both go through one [`FrameGate`] so a
//! resize that lands mid-frame is applied at the start of the next one.

use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use winit::application::ApplicationHandler;
use winit::event::{ElementState, KeyEvent, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::{Window, WindowId};

use crate::config::SceneConfig;
use crate::frame_gate::FrameGate;
use crate::gpu::compositor::FrameCompositor;
use crate::gpu::resources::SceneAssets;

struct GpuContext {
    window: Arc<Window>,
    surface: wgpu::Surface<'static>,
    surface_config: wgpu::SurfaceConfiguration,
    compositor: FrameCompositor,
}

impl GpuContext {
    async fn new(window: Arc<Window>, config: &SceneConfig, assets: &SceneAssets) -> Result<Self> {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor::default());
        let surface = instance
            .create_surface(window.clone())
            .context("Failed to create surface")?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .ok_or_else(|| anyhow::anyhow!("Failed to find an appropriate adapter"))?;

        let (device, queue) = crate::cli::request_device(&adapter).await?;

        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .copied()
            .find(|f| f.is_srgb())
            .or_else(|| surface_caps.formats.first().copied())
            .context("Surface reports no formats")?;

        let size = window.inner_size();
        let surface_config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::AutoVsync,
            alpha_mode: surface_caps
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &surface_config);

        let compositor = FrameCompositor::new(
            device,
            queue,
            surface_format,
            size.width,
            size.height,
            config,
            assets,
        )
        .await?;

        Ok(Self {
            window,
            surface,
            surface_config,
            compositor,
        })
    }

    fn resize(&mut self, width: u32, height: u32) {
        self.compositor.resize(width, height);
        if self.compositor.is_hidden() {
            return;
        }
        let (width, height) = self.compositor.size();
        self.surface_config.width = width;
        self.surface_config.height = height;
        self.surface.configure(self.compositor.device(), &self.surface_config);
    }

    fn render(&mut self) {
        if self.compositor.is_hidden() {
            return;
        }
        match self.surface.get_current_texture() {
            Ok(output) => {
                let view = output.texture.create_view(&wgpu::TextureViewDescriptor::default());
                self.compositor.render(&view);
                output.present();
            }
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                self.surface.configure(self.compositor.device(), &self.surface_config);
            }
            Err(wgpu::SurfaceError::OutOfMemory) => {
                log::error!("Surface out of memory");
            }
            Err(e) => {
                log::warn!("Surface error: {:?}", e);
            }
        }
    }
}

struct AppRunner {
    config: SceneConfig,
    assets: SceneAssets,
    initial_size: (u32, u32),
    gpu: Option<GpuContext>,
    gate: FrameGate,
    last_frame: Instant,
    error: Option<anyhow::Error>,
}

impl AppRunner {
    /// Run one frame through the gate. `dt` of zero re-renders without
    /// advancing the animation.
    fn frame(&mut self, dt: f32) {
        let Some(gpu) = self.gpu.as_mut() else {
            return;
        };
        let Some(ticket) = self.gate.begin() else {
            return;
        };
        if let Some((width, height)) = ticket.resize {
            gpu.resize(width, height);
        }
        gpu.compositor.tick(dt);
        gpu.render();
    }

    fn handle_key(&mut self, event: &KeyEvent) {
        let Some(gpu) = self.gpu.as_mut() else {
            return;
        };
        let PhysicalKey::Code(code) = event.physical_key else {
            return;
        };
        let pressed = event.state == ElementState::Pressed;
        let direction = match code {
            KeyCode::ArrowLeft => -1.0,
            KeyCode::ArrowRight => 1.0,
            _ => return,
        };
        if pressed {
            gpu.compositor.set_direction(direction);
        } else if gpu.compositor.camera().direction() == direction {
            gpu.compositor.set_direction(0.0);
        }
    }
}

impl ApplicationHandler for AppRunner {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.gpu.is_some() {
            return;
        }

        let (width, height) = self.initial_size;
        let attributes = Window::default_attributes()
            .with_title("Water Scene")
            .with_inner_size(winit::dpi::PhysicalSize::new(width, height));

        let window = match event_loop.create_window(attributes) {
            Ok(window) => Arc::new(window),
            Err(e) => {
                self.error = Some(anyhow::Error::new(e).context("Failed to create window"));
                event_loop.exit();
                return;
            }
        };

        log::info!("Initializing renderer...");
        match pollster::block_on(GpuContext::new(window.clone(), &self.config, &self.assets)) {
            Ok(gpu) => {
                self.gpu = Some(gpu);
                self.last_frame = Instant::now();
                window.request_redraw();
            }
            Err(e) => {
                log::error!("Fatal renderer error: {e:#}");
                self.error = Some(e);
                event_loop.exit();
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _window_id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => event_loop.exit(),
            WindowEvent::Resized(size) => {
                self.gate.defer_resize(size.width, size.height);
                // Redraw straight away rather than waiting for the next tick.
                self.frame(0.0);
            }
            WindowEvent::KeyboardInput { event, .. } => self.handle_key(&event),
            WindowEvent::RedrawRequested => {
                let now = Instant::now();
                let dt = now.duration_since(self.last_frame).as_secs_f32();
                self.last_frame = now;
                self.frame(dt);
                if let Some(gpu) = &self.gpu {
                    gpu.window.request_redraw();
                }
            }
            _ => {}
        }
    }
}

/// Open a window and animate the scene until it is closed.
pub fn run(config: SceneConfig, width: u32, height: u32) -> Result<()> {
    let assets = SceneAssets::load(&config)?;

    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut runner = AppRunner {
        config,
        assets,
        initial_size: (width.max(1), height.max(1)),
        gpu: None,
        gate: FrameGate::new(),
        last_frame: Instant::now(),
        error: None,
    };
    event_loop.run_app(&mut runner)?;

    match runner.error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}
