pub mod geometry;
pub mod layouts;
pub mod pipeline;
pub mod shaders;
pub mod textures;
pub mod targets;
pub mod resources;
pub mod compositor;
