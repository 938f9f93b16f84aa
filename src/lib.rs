pub mod config;
pub mod noise;
pub mod transform_stack;
pub mod camera;
pub mod lighting;
pub mod mesh_asset;
pub mod scene;
pub mod frame_gate;
pub mod gpu;

#[cfg(not(target_arch = "wasm32"))]
pub mod cli;
#[cfg(not(target_arch = "wasm32"))]
pub mod app;

#[cfg(target_arch = "wasm32")]
pub mod wasm;
