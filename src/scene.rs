//! Per-frame pass sequence and model transforms.
//!
//! A [`FramePlan`] is built on the CPU before any GPU work is recorded. Every
//! pass composes its model matrix inside its own [`StackScope`], so the
//! transform stack leaves each pass at the depth it entered with.
//!
//! [`StackScope`]: crate::transform_stack::StackScope

use glam::{Mat4, Vec3};

use crate::config::SceneConfig;
use crate::transform_stack::TransformStack;

/// Where a pass writes its colour output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassTarget {
    Swapchain,
    Reflection,
    Refraction,
}

/// The fixed pass sequence of one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScenePass {
    Skybox,
    Floor,
    Reflection,
    Refraction,
    Surface,
    Model,
}

impl ScenePass {
    /// Recording order. Reflection and refraction precede the surface pass
    /// that samples them.
    pub const ORDER: [ScenePass; 6] = [
        ScenePass::Skybox,
        ScenePass::Floor,
        ScenePass::Reflection,
        ScenePass::Refraction,
        ScenePass::Surface,
        ScenePass::Model,
    ];

    pub fn label(self) -> &'static str {
        match self {
            ScenePass::Skybox => "Skybox Pass",
            ScenePass::Floor => "Floor Pass",
            ScenePass::Reflection => "Reflection Pass",
            ScenePass::Refraction => "Refraction Pass",
            ScenePass::Surface => "Water Surface Pass",
            ScenePass::Model => "Model Pass",
        }
    }

    pub fn target(self) -> PassTarget {
        match self {
            ScenePass::Reflection => PassTarget::Reflection,
            ScenePass::Refraction => PassTarget::Refraction,
            _ => PassTarget::Swapchain,
        }
    }

    /// Index into per-pass resource arrays.
    pub fn index(self) -> usize {
        self as usize
    }
}

/// Model and normal matrix for one pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PassTransforms {
    pub pass: ScenePass,
    pub model: Mat4,
    pub normal: Mat4,
}

impl PassTransforms {
    fn new(pass: ScenePass, model: Mat4) -> Self {
        Self {
            pass,
            model,
            normal: normal_matrix(model),
        }
    }
}

/// Inverse-transpose of `model`. Exactly singular matrices fall back to identity.
pub fn normal_matrix(model: Mat4) -> Mat4 {
    if model.determinant() == 0.0 {
        return Mat4::IDENTITY;
    }
    let inverse = model.inverse();
    if !inverse.is_finite() {
        return Mat4::IDENTITY;
    }
    inverse.transpose()
}

/// Static placement of the scene's pieces.
#[derive(Debug, Clone, PartialEq)]
pub struct SceneParams {
    pub floor_depth: f32,
    pub refractive_index: f32,
    pub skybox_scale: f32,
    pub model_scale: f32,
    pub bob_amplitude: f32,
    pub bob_frequency: f32,
    pub tilt: f32,
    pub rest_rotation: f32,
    /// Mesh bounds centre, moved to the origin before the model transform.
    pub model_center: Vec3,
}

impl SceneParams {
    pub fn from_config(config: &SceneConfig) -> Self {
        Self {
            floor_depth: config.water.floor_depth,
            refractive_index: config.water.refractive_index,
            skybox_scale: config.water.skybox_scale,
            model_scale: config.model.scale,
            bob_amplitude: config.model.bob_amplitude,
            bob_frequency: config.model.bob_frequency,
            tilt: config.model.tilt,
            rest_rotation: config.model.rest_rotation,
            model_center: Vec3::ZERO,
        }
    }
}

impl Default for SceneParams {
    fn default() -> Self {
        Self::from_config(&SceneConfig::default())
    }
}

/// Monotonic depth lookup value fed to the water shaders.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DepthLookup {
    value: f32,
    rate: f32,
}

impl DepthLookup {
    pub fn new(rate: f32) -> Self {
        Self { value: 0.0, rate }
    }

    /// Add `elapsed * rate`. Negative elapsed times are ignored.
    pub fn advance(&mut self, elapsed: f32) -> f32 {
        self.value += elapsed.max(0.0) * self.rate;
        self.value
    }

    pub fn value(&self) -> f32 {
        self.value
    }
}

/// Transforms for all six passes of one frame, in recording order.
#[derive(Debug, Clone)]
pub struct FramePlan {
    passes: [PassTransforms; 6],
}

impl FramePlan {
    /// Compose every pass's model matrix on `stack` at animation time `time`.
    pub fn build(stack: &mut TransformStack, params: &SceneParams, time: f32) -> Self {
        let passes = ScenePass::ORDER.map(|pass| {
            let mut scope = stack.scope();
            match pass {
                ScenePass::Skybox => {
                    scope.scale(Vec3::splat(params.skybox_scale));
                }
                ScenePass::Floor => {
                    scope.translate(Vec3::new(0.0, params.floor_depth, 0.0));
                }
                ScenePass::Reflection => {
                    // Mirror about the water plane.
                    scope
                        .scale(Vec3::new(1.0, -1.0, 1.0))
                        .scale(Vec3::splat(params.skybox_scale));
                }
                ScenePass::Refraction => {
                    // Apparent depth shrinks by the refractive index.
                    scope
                        .scale(Vec3::new(1.0, 1.0 / params.refractive_index, 1.0))
                        .translate(Vec3::new(0.0, params.floor_depth, 0.0));
                }
                ScenePass::Surface => {}
                ScenePass::Model => {
                    let phase = time * params.bob_frequency * std::f32::consts::TAU;
                    scope
                        .translate(Vec3::new(0.0, params.bob_amplitude * phase.sin(), 0.0))
                        .rotate_z(params.tilt * phase.cos())
                        .rotate(Vec3::new(1.0, 1.0, 0.0), params.rest_rotation)
                        .scale(Vec3::splat(params.model_scale))
                        .translate(-params.model_center);
                }
            }
            PassTransforms::new(pass, scope.get())
        });

        Self { passes }
    }

    pub fn passes(&self) -> &[PassTransforms] {
        &self.passes
    }

    pub fn get(&self, pass: ScenePass) -> &PassTransforms {
        &self.passes[pass.index()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normal_matrix_keeps_rotation_at_small_scale() {
        let rotation = Mat4::from_rotation_x(1.0);
        let model = rotation * Mat4::from_scale(Vec3::splat(0.004));
        let normal = normal_matrix(model);
        assert!(!normal.abs_diff_eq(Mat4::IDENTITY, 1e-3));

        // Uniform scale only changes length; the direction follows the rotation.
        let n = normal.transform_vector3(Vec3::Y).normalize();
        let expected = rotation.transform_vector3(Vec3::Y);
        assert!(n.abs_diff_eq(expected, 1e-4), "{:?} vs {:?}", n, expected);
    }

    #[test]
    fn test_normal_matrix_singular_is_identity() {
        let flat = Mat4::from_scale(Vec3::new(1.0, 0.0, 1.0));
        assert_eq!(normal_matrix(flat), Mat4::IDENTITY);
    }

    #[test]
    fn test_small_model_scale_keeps_model_normal() {
        let mut config = SceneConfig::default();
        config.model.scale = 0.004;
        let params = SceneParams::from_config(&config);
        let plan = FramePlan::build(&mut TransformStack::new(), &params, 0.0);
        assert!(!plan.get(ScenePass::Model).normal.abs_diff_eq(Mat4::IDENTITY, 1e-3));
    }

    #[test]
    fn test_order_matches_indices() {
        for (i, pass) in ScenePass::ORDER.iter().enumerate() {
            assert_eq!(pass.index(), i);
        }
    }

    #[test]
    fn test_offscreen_passes_precede_surface() {
        let pos = |p| ScenePass::ORDER.iter().position(|&q| q == p).unwrap();
        assert!(pos(ScenePass::Reflection) < pos(ScenePass::Surface));
        assert!(pos(ScenePass::Refraction) < pos(ScenePass::Surface));
        assert_eq!(ScenePass::Reflection.target(), PassTarget::Reflection);
        assert_eq!(ScenePass::Model.target(), PassTarget::Swapchain);
    }

    #[test]
    fn test_plan_leaves_stack_depth_unchanged() {
        let mut stack = TransformStack::new();
        stack.save();
        stack.translate(Vec3::new(3.0, 0.0, 0.0));
        let before = stack.get();

        let plan = FramePlan::build(&mut stack, &SceneParams::default(), 1.25);

        assert_eq!(plan.passes().len(), 6);
        assert_eq!(stack.depth(), 1);
        assert_eq!(stack.get(), before);
    }

    #[test]
    fn test_floor_sits_at_floor_depth() {
        let mut stack = TransformStack::new();
        let params = SceneParams::default();
        let plan = FramePlan::build(&mut stack, &params, 0.0);
        let p = plan.get(ScenePass::Floor).model.transform_point3(Vec3::ZERO);
        assert_eq!(p.y, params.floor_depth);
    }

    #[test]
    fn test_refraction_floor_appears_shallower() {
        let mut stack = TransformStack::new();
        let params = SceneParams::default();
        let plan = FramePlan::build(&mut stack, &params, 0.0);
        let p = plan.get(ScenePass::Refraction).model.transform_point3(Vec3::ZERO);
        assert!((p.y - params.floor_depth / params.refractive_index).abs() < 1e-5);
        assert!(p.y > params.floor_depth);
    }

    #[test]
    fn test_reflection_mirrors_sky() {
        let mut stack = TransformStack::new();
        let plan = FramePlan::build(&mut stack, &SceneParams::default(), 0.0);
        let up = plan.get(ScenePass::Reflection).model.transform_point3(Vec3::Y);
        assert!(up.y < 0.0);
        let sky = plan.get(ScenePass::Skybox).model.transform_point3(Vec3::Y);
        assert!(sky.y > 0.0);
    }

    #[test]
    fn test_normal_matrix_is_inverse_transpose() {
        let model = Mat4::from_scale(Vec3::new(2.0, 0.5, 1.0));
        let normal = normal_matrix(model);
        let expected = Mat4::from_scale(Vec3::new(0.5, 2.0, 1.0));
        assert!(normal.abs_diff_eq(expected, 1e-6));
        assert_eq!(normal_matrix(Mat4::ZERO), Mat4::IDENTITY);
    }

    #[test]
    fn test_model_bobs_over_time() {
        let mut stack = TransformStack::new();
        let params = SceneParams::default();
        let quarter = 0.25 / params.bob_frequency;
        let at_rest = FramePlan::build(&mut stack, &params, 0.0);
        let raised = FramePlan::build(&mut stack, &params, quarter);
        let y0 = at_rest.get(ScenePass::Model).model.transform_point3(Vec3::ZERO).y;
        let y1 = raised.get(ScenePass::Model).model.transform_point3(Vec3::ZERO).y;
        assert!((y1 - y0 - params.bob_amplitude).abs() < 1e-4);
    }

    #[test]
    fn test_depth_lookup_is_monotonic() {
        let mut lookup = DepthLookup::new(0.000125);
        let a = lookup.advance(1.0);
        let b = lookup.advance(0.5);
        let c = lookup.advance(-3.0);
        assert!((a - 0.000125).abs() < 1e-9);
        assert!(b > a);
        assert_eq!(c, b);
    }
}
