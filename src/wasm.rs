use std::cell::RefCell;
use std::rc::Rc;

use wasm_bindgen::prelude::*;
use web_sys::HtmlCanvasElement;

use crate::config::SceneConfig;
use crate::frame_gate::FrameGate;
use crate::gpu::compositor::FrameCompositor;
use crate::gpu::resources::{generate_noise, SceneAssets};
use crate::gpu::shaders::ShaderSources;
use crate::gpu::textures::CubemapImages;
use crate::mesh_asset::MeshAsset;

/// Sky face size used in the browser, where no skybox directory exists.
const WEB_SKY_SIZE: u32 = 256;

/// Smaller default volume for the browser; generation is synchronous.
const WEB_NOISE_SIZE: u32 = 64;

#[wasm_bindgen]
pub struct WaterScene {
    inner: Rc<RefCell<SceneContext>>,
    gate: Rc<FrameGate>,
}

struct SceneContext {
    compositor: FrameCompositor,
    surface: wgpu::Surface<'static>,
    config: wgpu::SurfaceConfiguration,
}

impl SceneContext {
    fn apply_resize(&mut self, width: u32, height: u32) {
        self.compositor.resize(width, height);
        if self.compositor.is_hidden() {
            return;
        }
        let (width, height) = self.compositor.size();
        self.config.width = width;
        self.config.height = height;
        self.surface.configure(self.compositor.device(), &self.config);
    }
}

#[wasm_bindgen]
pub fn init_panic_hook() {
    console_error_panic_hook::set_once();
    let _ = console_log::init_with_level(log::Level::Info);
}

#[wasm_bindgen]
impl WaterScene {
    #[wasm_bindgen(constructor)]
    pub fn new() -> Result<WaterScene, JsValue> {
        Err(JsValue::from_str("Use create_water_scene async constructor"))
    }

    /// Advance by `dt` seconds and draw one frame.
    ///
    /// Returns false if the frame was skipped: another frame is still being
    /// recorded, or the canvas has no area.
    pub fn render(&self, dt: f32) -> bool {
        let Some(ticket) = self.gate.begin() else {
            return false;
        };
        let Ok(mut inner) = self.inner.try_borrow_mut() else {
            if let Some((width, height)) = ticket.resize {
                self.gate.defer_resize(width, height);
            }
            return false;
        };
        let ctx = &mut *inner;

        if let Some((width, height)) = ticket.resize {
            ctx.apply_resize(width, height);
        }
        ctx.compositor.tick(dt);
        if ctx.compositor.is_hidden() {
            return false;
        }

        match ctx.surface.get_current_texture() {
            Ok(output) => {
                let view = output.texture.create_view(&wgpu::TextureViewDescriptor::default());
                let drawn = ctx.compositor.render(&view);
                output.present();
                drawn
            }
            Err(wgpu::SurfaceError::Lost) => {
                ctx.surface.configure(ctx.compositor.device(), &ctx.config);
                false
            }
            Err(wgpu::SurfaceError::OutOfMemory) => {
                log::error!("Surface out of memory");
                false
            }
            Err(e) => {
                log::warn!("Surface error: {:?}", e);
                false
            }
        }
    }

    /// New canvas size in pixels. Re-renders immediately unless a frame is
    /// already in flight, in which case the size is applied by the next one.
    pub fn resize(&self, width: u32, height: u32) {
        self.gate.defer_resize(width, height);
        self.render(0.0);
    }

    /// Orbit direction: -1, 0 or 1.
    pub fn set_direction(&self, direction: f32) {
        if let Ok(mut inner) = self.inner.try_borrow_mut() {
            inner.compositor.set_direction(direction);
        }
    }

    pub fn depth_lookup(&self) -> f32 {
        self.inner
            .try_borrow()
            .map(|inner| inner.compositor.depth_lookup())
            .unwrap_or_default()
    }

    /// Frames refused because another was still being recorded.
    pub fn skipped_frames(&self) -> f64 {
        self.gate.skipped_frames() as f64
    }
}

/// Build the water scene on `canvas`. `obj` and `mtl` carry the model's
/// OBJ and MTL text; without `obj` the scene has no floating model.
/// `config_json` is a scene config; without it a smaller noise volume is used.
#[wasm_bindgen]
pub async fn create_water_scene(
    canvas: HtmlCanvasElement,
    obj: Option<String>,
    mtl: Option<String>,
    config_json: Option<String>,
) -> Result<WaterScene, JsValue> {
    init_panic_hook();

    let to_js = |e: anyhow::Error| JsValue::from_str(&format!("{:#}", e));

    let scene_config = match config_json {
        Some(json) => SceneConfig::from_json(&json).map_err(to_js)?,
        None => {
            let mut config = SceneConfig::default();
            config.noise.size = WEB_NOISE_SIZE;
            config
        }
    };

    let mesh = match obj {
        Some(obj) => Some(MeshAsset::from_obj_mtl("model", &obj, mtl.as_deref()).map_err(to_js)?),
        None => None,
    };
    let assets = SceneAssets::with_parts(
        &scene_config,
        generate_noise(&scene_config),
        CubemapImages::procedural(WEB_SKY_SIZE),
        mesh,
        ShaderSources::builtin(),
    );

    let instance = wgpu::Instance::new(wgpu::InstanceDescriptor::default());

    let target = wgpu::SurfaceTarget::Canvas(canvas.clone());
    let surface = instance
        .create_surface(target)
        .map_err(|e| JsValue::from_str(&format!("Failed to create surface: {}", e)))?;

    let adapter = instance
        .request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::None,
            compatible_surface: Some(&surface),
            force_fallback_adapter: false,
        })
        .await
        .ok_or_else(|| JsValue::from_str("Failed to find an appropriate adapter"))?;

    let (device, queue) = adapter
        .request_device(
            &wgpu::DeviceDescriptor {
                label: None,
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::downlevel_webgl2_defaults(),
                memory_hints: Default::default(),
            },
            None,
        )
        .await
        .map_err(|e| JsValue::from_str(&format!("Failed to create device: {}", e)))?;

    let surface_caps = surface.get_capabilities(&adapter);
    let surface_format = surface_caps
        .formats
        .iter()
        .copied()
        .find(|f: &wgpu::TextureFormat| f.is_srgb())
        .or_else(|| surface_caps.formats.first().copied())
        .ok_or_else(|| JsValue::from_str("Surface reports no formats"))?;

    let config = wgpu::SurfaceConfiguration {
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        format: surface_format,
        width: canvas.width().max(1),
        height: canvas.height().max(1),
        present_mode: wgpu::PresentMode::Fifo,
        alpha_mode: surface_caps
            .alpha_modes
            .first()
            .copied()
            .unwrap_or(wgpu::CompositeAlphaMode::Auto),
        view_formats: vec![],
        desired_maximum_frame_latency: 2,
    };
    surface.configure(&device, &config);

    let compositor = FrameCompositor::new(
        device,
        queue,
        config.format,
        canvas.width(),
        canvas.height(),
        &scene_config,
        &assets,
    )
    .await
    .map_err(to_js)?;

    Ok(WaterScene {
        inner: Rc::new(RefCell::new(SceneContext {
            compositor,
            surface,
            config,
        })),
        gate: Rc::new(FrameGate::new()),
    })
}
