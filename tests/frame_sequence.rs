//! Frame sequencing without a GPU: pass order, transform stack balance,
//! resize-safe targets and model materials.
//!
//! Run with: cargo test --test frame_sequence

use std::cell::RefCell;
use std::rc::Rc;

use glam::Vec3;
use water_scene::config::SceneConfig;
use water_scene::frame_gate::FrameGate;
use water_scene::gpu::targets::{LazyTarget, SizedTarget};
use water_scene::mesh_asset::{MeshAsset, MATERIAL_STRIDE};
use water_scene::scene::{FramePlan, PassTarget, ScenePass, SceneParams};
use water_scene::transform_stack::TransformStack;

const DUCK_OBJ: &str = "mtllib duck.mtl
v -1 0 -1
v 1 0 -1
v 1 0 1
v -1 0 1
v 0 2 0
usemtl body
f 1 3 2
f 1 4 3
usemtl beak
f 1 2 5
";

const DUCK_MTL: &str = "newmtl body
Ka 0.2 0.2 0
Kd 1 0.9 0
Ks 0.5 0.5 0.5
Ns 20
newmtl beak
Ka 0.3 0.1 0
Kd 1 0.4 0
Ks 0.1 0.1 0.1
Ns 5
";

#[test]
fn test_offscreen_passes_precede_surface() {
    let position = |pass| ScenePass::ORDER.iter().position(|p| *p == pass).unwrap();
    assert!(position(ScenePass::Reflection) < position(ScenePass::Surface));
    assert!(position(ScenePass::Refraction) < position(ScenePass::Surface));
    assert_eq!(ScenePass::ORDER[0], ScenePass::Skybox);
    assert_eq!(ScenePass::ORDER[5], ScenePass::Model);
    assert_eq!(ScenePass::Reflection.target(), PassTarget::Reflection);
    assert_eq!(ScenePass::Refraction.target(), PassTarget::Refraction);
}

#[test]
fn test_many_frames_leave_stack_balanced() {
    let params = SceneParams::from_config(&SceneConfig::default());
    let mut stack = TransformStack::new();
    stack.translate(Vec3::new(1.0, 2.0, 3.0));
    let before = stack.get();

    for frame in 0..100 {
        let plan = FramePlan::build(&mut stack, &params, frame as f32 / 60.0);
        assert_eq!(plan.passes().len(), 6);
        assert_eq!(stack.depth(), 0);
        assert_eq!(stack.get(), before);
    }
}

struct RecordingTarget {
    extent: (u32, u32),
    log: Rc<RefCell<Vec<String>>>,
}

impl SizedTarget for RecordingTarget {
    fn extent(&self) -> (u32, u32) {
        self.extent
    }

    fn destroy(&mut self) {
        self.log
            .borrow_mut()
            .push(format!("destroy {}x{}", self.extent.0, self.extent.1));
    }
}

#[test]
fn test_resize_mid_sequence_replaces_targets() {
    let log = Rc::new(RefCell::new(Vec::new()));
    let mut depth = LazyTarget::new();
    let mut size = (800, 600);

    // Passes check the target before each swapchain pass; the resize lands
    // between the floor and surface passes.
    for pass in ScenePass::ORDER {
        if pass == ScenePass::Surface {
            size = (400, 300);
        }
        let target = depth.ensure(size.0, size.1, |w, h| {
            log.borrow_mut().push(format!("create {}x{}", w, h));
            RecordingTarget {
                extent: (w, h),
                log: log.clone(),
            }
        });
        assert_eq!(target.extent(), size);
    }

    assert_eq!(
        *log.borrow(),
        vec!["create 800x600", "destroy 800x600", "create 400x300"]
    );
}

#[test]
fn test_resize_during_frame_is_applied_next_frame() {
    let gate = FrameGate::new();
    let frame = gate.begin().unwrap();
    assert!(frame.resize.is_none());

    gate.defer_resize(800, 600);
    gate.defer_resize(400, 300);
    assert!(gate.begin().is_none());
    drop(frame);

    let next = gate.begin().unwrap();
    assert_eq!(next.resize, Some((400, 300)));
}

#[test]
fn test_two_materials_pack_to_thirty_two_floats() {
    let mesh = MeshAsset::from_obj_mtl("duck", DUCK_OBJ, Some(DUCK_MTL)).unwrap();
    let packed = mesh.material_uniforms();
    assert_eq!(packed.len(), 2 * MATERIAL_STRIDE);

    assert_eq!(&packed[0..4], &[0.2, 0.2, 0.0, 1.0]);
    assert_eq!(&packed[4..8], &[1.0, 0.9, 0.0, 1.0]);
    assert_eq!(packed[12], 20.0);

    let beak = &packed[MATERIAL_STRIDE..];
    assert_eq!(&beak[4..8], &[1.0, 0.4, 0.0, 1.0]);
    assert_eq!(beak[12], 5.0);

    let ids: Vec<u32> = mesh.vertices().iter().map(|v| v.material_id).collect();
    assert!(ids.iter().all(|id| *id < 2));
    assert!(ids.contains(&1));
}
