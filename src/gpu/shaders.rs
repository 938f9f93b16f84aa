//! WGSL sources and checked shader module creation.

use std::borrow::Cow;
use std::path::Path;

use anyhow::{bail, Context, Result};

pub const SKYBOX_FILE: &str = "shader_skybox.wgsl";
pub const FLOOR_FILE: &str = "shader_floor.wgsl";
pub const SURFACE_FILE: &str = "shader_water_surface.wgsl";
pub const MODEL_FILE: &str = "shader_model.wgsl";

/// WGSL text for the four scene programs.
#[derive(Debug, Clone)]
pub struct ShaderSources {
    pub skybox: Cow<'static, str>,
    pub floor: Cow<'static, str>,
    pub surface: Cow<'static, str>,
    pub model: Cow<'static, str>,
}

impl Default for ShaderSources {
    fn default() -> Self {
        Self::builtin()
    }
}

impl ShaderSources {
    /// Sources compiled into the binary.
    pub fn builtin() -> Self {
        Self {
            skybox: Cow::Borrowed(include_str!("shader_skybox.wgsl")),
            floor: Cow::Borrowed(include_str!("shader_floor.wgsl")),
            surface: Cow::Borrowed(include_str!("shader_water_surface.wgsl")),
            model: Cow::Borrowed(include_str!("shader_model.wgsl")),
        }
    }

    /// Read overrides from `dir`. Files that are absent keep the built-in source.
    pub fn from_dir(dir: &Path) -> Result<Self> {
        if !dir.is_dir() {
            bail!("Shader directory {} does not exist", dir.display());
        }

        let mut sources = Self::builtin();
        for (file, slot) in [
            (SKYBOX_FILE, &mut sources.skybox),
            (FLOOR_FILE, &mut sources.floor),
            (SURFACE_FILE, &mut sources.surface),
            (MODEL_FILE, &mut sources.model),
        ] {
            let path = dir.join(file);
            if path.exists() {
                let text = std::fs::read_to_string(&path)
                    .with_context(|| format!("Failed to read shader {}", path.display()))?;
                log::info!("Using shader override {}", path.display());
                *slot = Cow::Owned(text);
            }
        }
        Ok(sources)
    }
}

pub struct ShaderModules {
    pub skybox: wgpu::ShaderModule,
    pub floor: wgpu::ShaderModule,
    pub surface: wgpu::ShaderModule,
    pub model: wgpu::ShaderModule,
}

/// Create a module inside a validation error scope so a bad shader surfaces
/// as an error instead of an uncaptured device error.
pub async fn create_checked_module(device: &wgpu::Device, label: &str, source: &str) -> Result<wgpu::ShaderModule> {
    device.push_error_scope(wgpu::ErrorFilter::Validation);
    let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(label),
        source: wgpu::ShaderSource::Wgsl(Cow::Borrowed(source)),
    });
    if let Some(err) = device.pop_error_scope().await {
        bail!("Shader '{}' failed to compile: {}", label, err);
    }
    log::info!("Created shader module '{}'", label);
    Ok(module)
}

pub async fn create_shader_modules(device: &wgpu::Device, sources: &ShaderSources) -> Result<ShaderModules> {
    Ok(ShaderModules {
        skybox: create_checked_module(device, "skybox", &sources.skybox).await?,
        floor: create_checked_module(device, "floor", &sources.floor).await?,
        surface: create_checked_module(device, "water_surface", &sources.surface).await?,
        model: create_checked_module(device, "model", &sources.model).await?,
    })
}
