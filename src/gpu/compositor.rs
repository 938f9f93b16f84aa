//! Per-frame orchestration of the six scene passes.

use std::iter;

use anyhow::Result;
use glam::Mat4;

use crate::camera::OrbitCamera;
use crate::config::SceneConfig;
use crate::gpu::resources::{build_static_resources, FrameUniforms, IndexedGeometry, ResourceSet, SceneAssets};
use crate::gpu::targets::{clamp_extent, DepthTarget, LazyTarget, OffscreenTarget};
use crate::scene::{DepthLookup, FramePlan, PassTarget, ScenePass, SceneParams};
use crate::transform_stack::TransformStack;

const CLEAR_COLOR: wgpu::Color = wgpu::Color {
    r: 0.0,
    g: 0.0,
    b: 0.0,
    a: 1.0,
};

/// Surface bind group and the target generations it was built against.
struct SurfaceBinding {
    reflection_generation: u64,
    refraction_generation: u64,
    bind_group: wgpu::BindGroup,
}

pub struct FrameCompositor {
    device: wgpu::Device,
    queue: wgpu::Queue,
    resources: ResourceSet,

    stack: TransformStack,
    camera: OrbitCamera,
    depth_lookup: DepthLookup,
    params: SceneParams,
    elapsed: f32,

    size: (u32, u32),
    hidden: bool,
    max_dimension: u32,

    // === Resize-dependent targets ===
    depth: LazyTarget<DepthTarget>,
    reflection: LazyTarget<OffscreenTarget>,
    refraction: LazyTarget<OffscreenTarget>,
    surface_binding: Option<SurfaceBinding>,

    frames: u64,
}

impl FrameCompositor {
    /// Build static resources and wrap them for per-frame use.
    ///
    /// Fails if a shader does not compile; nothing else at this point is
    /// recoverable either.
    pub async fn new(
        device: wgpu::Device,
        queue: wgpu::Queue,
        format: wgpu::TextureFormat,
        width: u32,
        height: u32,
        config: &SceneConfig,
        assets: &SceneAssets,
    ) -> Result<Self> {
        let resources = build_static_resources(&device, &queue, format, assets).await?;

        let mut params = SceneParams::from_config(config);
        if let Some(mesh) = &assets.mesh {
            params.model_center = glam::Vec3::from(mesh.bounds.center());
        }

        let max_dimension = device.limits().max_texture_dimension_2d;

        let mut compositor = Self {
            device,
            queue,
            resources,
            stack: TransformStack::new(),
            camera: OrbitCamera::new(&config.camera),
            depth_lookup: DepthLookup::new(config.water.depth_lookup_rate),
            params,
            elapsed: 0.0,
            size: (1, 1),
            hidden: false,
            max_dimension,
            depth: LazyTarget::new(),
            reflection: LazyTarget::new(),
            refraction: LazyTarget::new(),
            surface_binding: None,
            frames: 0,
        };
        compositor.resize(width, height);
        Ok(compositor)
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    /// Record a new canvas size. Targets are reallocated lazily by the next
    /// frame. A zero dimension hides the scene until a real size arrives.
    pub fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            log::debug!("Canvas is {}x{}; skipping frames until visible", width, height);
            self.hidden = true;
            return;
        }
        self.hidden = false;
        self.size = clamp_extent(width, height, self.max_dimension);
        log::debug!("Compositor resized to {}x{}", self.size.0, self.size.1);
    }

    /// Advance animation and camera by `dt` seconds of wall-clock time.
    pub fn tick(&mut self, dt: f32) {
        let dt = dt.max(0.0);
        self.elapsed += dt;
        self.depth_lookup.advance(dt);
        self.camera.update(dt);
    }

    /// Orbit direction from user input: -1, 0 or 1.
    pub fn set_direction(&mut self, direction: f32) {
        self.camera.set_direction(direction);
    }

    pub fn size(&self) -> (u32, u32) {
        self.size
    }

    pub fn is_hidden(&self) -> bool {
        self.hidden
    }

    pub fn camera(&self) -> &OrbitCamera {
        &self.camera
    }

    pub fn depth_lookup(&self) -> f32 {
        self.depth_lookup.value()
    }

    /// Saved matrices on the transform stack. Zero between frames.
    pub fn stack_depth(&self) -> usize {
        self.stack.depth()
    }

    pub fn frames_rendered(&self) -> u64 {
        self.frames
    }

    /// Bring every resize-dependent target to the current size and rebuild
    /// the surface bind group if either offscreen target was replaced.
    fn ensure_targets(&mut self) {
        let (width, height) = self.size;
        let device = &self.device;

        self.depth.ensure(width, height, |w, h| DepthTarget::new(device, w, h));
        self.reflection
            .ensure(width, height, |w, h| OffscreenTarget::new(device, "Reflection Target", w, h));
        self.refraction
            .ensure(width, height, |w, h| OffscreenTarget::new(device, "Refraction Target", w, h));

        let reflection_generation = self.reflection.generation();
        let refraction_generation = self.refraction.generation();
        let bound = self
            .surface_binding
            .as_ref()
            .map(|binding| (binding.reflection_generation, binding.refraction_generation));
        if !needs_rebind(bound, reflection_generation, refraction_generation) {
            return;
        }

        if let (Some(reflection), Some(refraction)) = (self.reflection.get(), self.refraction.get()) {
            let bind_group =
                self.resources
                    .create_surface_bind_group(&self.device, &reflection.color_view, &refraction.color_view);
            self.surface_binding = Some(SurfaceBinding {
                reflection_generation,
                refraction_generation,
                bind_group,
            });
        }
    }

    /// Write the shared and per-pass uniforms for this frame. Runs before
    /// any pass is recorded so every pass sees the same values.
    fn write_uniforms(&mut self) {
        let (width, height) = self.size;
        let aspect = width as f32 / height as f32;

        let view = self.camera.view_matrix();
        let projection = self.camera.projection_matrix(aspect);
        let frame = FrameUniforms {
            depth_lookup: self.depth_lookup.value(),
            time: self.elapsed,
            _padding: [0.0; 2],
        };

        self.queue
            .write_buffer(&self.resources.view_buffer, 0, bytemuck::cast_slice(&view.to_cols_array()));
        self.queue.write_buffer(
            &self.resources.projection_buffer,
            0,
            bytemuck::cast_slice(&projection.to_cols_array()),
        );
        self.queue
            .write_buffer(&self.resources.frame_buffer, 0, bytemuck::bytes_of(&frame));

        let plan = FramePlan::build(&mut self.stack, &self.params, self.elapsed);
        for transforms in plan.passes() {
            let buffers = self.resources.pass(transforms.pass);
            write_matrix(&self.queue, &buffers.model_buffer, transforms.model);
            write_matrix(&self.queue, &buffers.normal_buffer, transforms.normal);
        }
    }

    /// Record and submit one frame into `view`.
    ///
    /// Returns `false` when the frame was skipped because the canvas has no
    /// area. Submission failures are not observed here.
    pub fn render(&mut self, view: &wgpu::TextureView) -> bool {
        if self.hidden {
            return false;
        }

        self.write_uniforms();

        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Water Scene Encoder"),
        });

        for pass in ScenePass::ORDER {
            // Checked before every pass, not once per frame.
            self.ensure_targets();
            self.record_pass(&mut encoder, view, pass);
        }

        self.queue.submit(iter::once(encoder.finish()));
        self.frames += 1;
        true
    }

    fn record_pass(&self, encoder: &mut wgpu::CommandEncoder, swapchain: &wgpu::TextureView, pass: ScenePass) {
        let (color_view, depth_view) = match pass.target() {
            PassTarget::Swapchain => match self.depth.get() {
                Some(depth) => (swapchain, &depth.view),
                None => return,
            },
            PassTarget::Reflection => match self.reflection.get() {
                Some(target) => (&target.color_view, &target.depth_view),
                None => return,
            },
            PassTarget::Refraction => match self.refraction.get() {
                Some(target) => (&target.color_view, &target.depth_view),
                None => return,
            },
        };

        // The skybox opens the swapchain; offscreen passes start clean.
        let clear = matches!(pass, ScenePass::Skybox) || pass.target() != PassTarget::Swapchain;
        let (color_load, depth_load) = if clear {
            (wgpu::LoadOp::Clear(CLEAR_COLOR), wgpu::LoadOp::Clear(1.0))
        } else {
            (wgpu::LoadOp::Load, wgpu::LoadOp::Load)
        };

        let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some(pass.label()),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: color_view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: color_load,
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: depth_view,
                depth_ops: Some(wgpu::Operations {
                    load: depth_load,
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
        });

        let res = &self.resources;
        let matrices = &res.pass(pass).matrix_bind_group;

        match pass {
            ScenePass::Skybox | ScenePass::Reflection => {
                let pipeline = if pass == ScenePass::Skybox {
                    &res.pipelines.skybox
                } else {
                    &res.pipelines.reflection
                };
                render_pass.set_pipeline(pipeline);
                render_pass.set_bind_group(0, &res.cubemap_bind_group, &[]);
                render_pass.set_bind_group(1, matrices, &[]);
                draw_indexed(&mut render_pass, &res.skybox);
            }
            ScenePass::Floor | ScenePass::Refraction => {
                let pipeline = if pass == ScenePass::Floor {
                    &res.pipelines.floor
                } else {
                    &res.pipelines.refraction
                };
                render_pass.set_pipeline(pipeline);
                render_pass.set_bind_group(0, &res.noise_bind_group, &[]);
                render_pass.set_bind_group(1, &res.light_material_bind_group, &[]);
                render_pass.set_bind_group(2, matrices, &[]);
                draw_indexed(&mut render_pass, &res.plane);
            }
            ScenePass::Surface => {
                let Some(binding) = &self.surface_binding else {
                    log::warn!("Surface textures not bound; skipping water surface");
                    return;
                };
                render_pass.set_pipeline(&res.pipelines.surface);
                render_pass.set_bind_group(0, &binding.bind_group, &[]);
                render_pass.set_bind_group(1, &res.light_material_bind_group, &[]);
                render_pass.set_bind_group(2, matrices, &[]);
                draw_indexed(&mut render_pass, &res.plane);
            }
            ScenePass::Model => {
                let Some(model) = &res.model else {
                    return;
                };
                render_pass.set_pipeline(&res.pipelines.model);
                render_pass.set_bind_group(0, &res.model_material_bind_group, &[]);
                render_pass.set_bind_group(1, &res.light_material_bind_group, &[]);
                render_pass.set_bind_group(2, matrices, &[]);
                draw_indexed(&mut render_pass, model);
            }
        }
    }
}

/// Whether a surface bind group built against `bound` generations is stale.
/// `None` means no bind group exists yet.
fn needs_rebind(bound: Option<(u64, u64)>, reflection_generation: u64, refraction_generation: u64) -> bool {
    bound != Some((reflection_generation, refraction_generation))
}

fn write_matrix(queue: &wgpu::Queue, buffer: &wgpu::Buffer, matrix: Mat4) {
    queue.write_buffer(buffer, 0, bytemuck::cast_slice(&matrix.to_cols_array()));
}

fn draw_indexed(render_pass: &mut wgpu::RenderPass<'_>, geometry: &IndexedGeometry) {
    render_pass.set_vertex_buffer(0, geometry.vertex_buffer.slice(..));
    render_pass.set_index_buffer(geometry.index_buffer.slice(..), geometry.index_format);
    render_pass.draw_indexed(0..geometry.num_indices, 0, 0..1);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::targets::SizedTarget;

    struct FakeTarget {
        size: (u32, u32),
    }

    impl SizedTarget for FakeTarget {
        fn extent(&self) -> (u32, u32) {
            self.size
        }

        fn destroy(&mut self) {}
    }

    fn generations(reflection: &LazyTarget<FakeTarget>, refraction: &LazyTarget<FakeTarget>) -> (u64, u64) {
        (reflection.generation(), refraction.generation())
    }

    #[test]
    fn test_first_frame_needs_bind_group() {
        assert!(needs_rebind(None, 0, 0));
        assert!(needs_rebind(None, 1, 1));
    }

    #[test]
    fn test_rebind_follows_resize() {
        let mut reflection = LazyTarget::new();
        let mut refraction = LazyTarget::new();
        let create = |w, h| FakeTarget { size: (w, h) };

        reflection.ensure(800, 600, create);
        refraction.ensure(800, 600, create);
        let (refl, refr) = generations(&reflection, &refraction);
        assert!(needs_rebind(None, refl, refr));
        let bound = Some((refl, refr));

        // Same size on the next pass: the bind group is still valid.
        reflection.ensure(800, 600, create);
        refraction.ensure(800, 600, create);
        let (refl, refr) = generations(&reflection, &refraction);
        assert!(!needs_rebind(bound, refl, refr));

        // Resize between passes replaces both views.
        reflection.ensure(400, 300, create);
        refraction.ensure(400, 300, create);
        let (refl, refr) = generations(&reflection, &refraction);
        assert!(needs_rebind(bound, refl, refr));
        assert_eq!(reflection.get().map(|t| t.size), Some((400, 300)));

        let bound = Some((refl, refr));
        refraction.ensure(400, 300, create);
        let (refl, refr) = generations(&reflection, &refraction);
        assert!(!needs_rebind(bound, refl, refr));
    }

    #[test]
    fn test_rebind_when_only_one_target_changes() {
        assert!(needs_rebind(Some((2, 2)), 3, 2));
        assert!(needs_rebind(Some((2, 2)), 2, 3));
        assert!(!needs_rebind(Some((2, 2)), 2, 2));
    }
}
