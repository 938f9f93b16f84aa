//! Resize-dependent render targets.
//!
//! A [`LazyTarget`] holds at most one target and recreates it whenever the
//! requested extent differs from the one it has. The stale target is always
//! destroyed before the replacement is created.

/// Offscreen colour format for the reflection and refraction targets.
pub const OFFSCREEN_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth24Plus;

/// A GPU target with a fixed extent that can be released explicitly.
pub trait SizedTarget {
    fn extent(&self) -> (u32, u32);
    fn destroy(&mut self);
}

/// Clamp a requested size into `[1, max_dimension]` on both axes.
pub fn clamp_extent(width: u32, height: u32, max_dimension: u32) -> (u32, u32) {
    let max_dimension = max_dimension.max(1);
    (width.clamp(1, max_dimension), height.clamp(1, max_dimension))
}

#[derive(Debug)]
pub struct LazyTarget<T> {
    slot: Option<T>,
    generation: u64,
}

impl<T> Default for LazyTarget<T> {
    fn default() -> Self {
        Self {
            slot: None,
            generation: 0,
        }
    }
}

impl<T: SizedTarget> LazyTarget<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return a target of exactly `width x height`, destroying and replacing
    /// the current one if its extent differs.
    pub fn ensure<F>(&mut self, width: u32, height: u32, create: F) -> &T
    where
        F: FnOnce(u32, u32) -> T,
    {
        let stale = self
            .slot
            .as_ref()
            .map_or(true, |target| target.extent() != (width, height));

        if stale {
            if let Some(mut old) = self.slot.take() {
                let (w, h) = old.extent();
                log::debug!("Destroying {}x{} target before resize to {}x{}", w, h, width, height);
                old.destroy();
            }
            self.generation += 1;
        }

        self.slot.get_or_insert_with(|| create(width, height))
    }

    pub fn get(&self) -> Option<&T> {
        self.slot.as_ref()
    }

    /// Bumped every time the target is recreated.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn extent(&self) -> Option<(u32, u32)> {
        self.slot.as_ref().map(SizedTarget::extent)
    }
}

// ============================================================================
// wgpu targets
// ============================================================================

fn create_depth_texture(device: &wgpu::Device, label: &str, width: u32, height: u32) -> wgpu::Texture {
    device.create_texture(&wgpu::TextureDescriptor {
        label: Some(label),
        size: wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: DEPTH_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        view_formats: &[],
    })
}

/// Depth buffer matching the swapchain.
pub struct DepthTarget {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
}

impl DepthTarget {
    pub fn new(device: &wgpu::Device, width: u32, height: u32) -> Self {
        let texture = create_depth_texture(device, "Swapchain Depth Texture", width, height);
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self { texture, view }
    }
}

impl SizedTarget for DepthTarget {
    fn extent(&self) -> (u32, u32) {
        (self.texture.width(), self.texture.height())
    }

    fn destroy(&mut self) {
        self.texture.destroy();
    }
}

/// Colour + depth target rendered offscreen and sampled by the surface pass.
pub struct OffscreenTarget {
    pub color: wgpu::Texture,
    pub color_view: wgpu::TextureView,
    pub depth: wgpu::Texture,
    pub depth_view: wgpu::TextureView,
}

impl OffscreenTarget {
    pub fn new(device: &wgpu::Device, label: &str, width: u32, height: u32) -> Self {
        let color = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: OFFSCREEN_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        });
        let depth = create_depth_texture(device, &format!("{} Depth", label), width, height);

        let color_view = color.create_view(&wgpu::TextureViewDescriptor::default());
        let depth_view = depth.create_view(&wgpu::TextureViewDescriptor::default());

        Self {
            color,
            color_view,
            depth,
            depth_view,
        }
    }
}

impl SizedTarget for OffscreenTarget {
    fn extent(&self) -> (u32, u32) {
        (self.color.width(), self.color.height())
    }

    fn destroy(&mut self) {
        self.color.destroy();
        self.depth.destroy();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    struct MockTarget {
        extent: (u32, u32),
        log: Rc<RefCell<Vec<String>>>,
    }

    impl SizedTarget for MockTarget {
        fn extent(&self) -> (u32, u32) {
            self.extent
        }

        fn destroy(&mut self) {
            self.log
                .borrow_mut()
                .push(format!("destroy {}x{}", self.extent.0, self.extent.1));
        }
    }

    fn create(log: &Rc<RefCell<Vec<String>>>) -> impl FnOnce(u32, u32) -> MockTarget + '_ {
        move |w, h| {
            log.borrow_mut().push(format!("create {}x{}", w, h));
            MockTarget {
                extent: (w, h),
                log: log.clone(),
            }
        }
    }

    #[test]
    fn test_first_ensure_creates() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut target = LazyTarget::new();
        assert_eq!(target.ensure(800, 600, create(&log)).extent(), (800, 600));
        assert_eq!(*log.borrow(), vec!["create 800x600"]);
        assert_eq!(target.generation(), 1);
    }

    #[test]
    fn test_same_size_reuses() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut target = LazyTarget::new();
        target.ensure(800, 600, create(&log));
        target.ensure(800, 600, create(&log));
        assert_eq!(log.borrow().len(), 1);
        assert_eq!(target.generation(), 1);
    }

    #[test]
    fn test_resize_destroys_before_create() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut target = LazyTarget::new();
        target.ensure(800, 600, create(&log));
        let resized = target.ensure(400, 300, create(&log));
        assert_eq!(resized.extent(), (400, 300));
        assert_eq!(
            *log.borrow(),
            vec!["create 800x600", "destroy 800x600", "create 400x300"]
        );
        assert_eq!(target.generation(), 2);
        assert_eq!(target.extent(), Some((400, 300)));
    }

    #[test]
    fn test_clamp_extent() {
        assert_eq!(clamp_extent(0, 0, 8192), (1, 1));
        assert_eq!(clamp_extent(10000, 300, 8192), (8192, 300));
        assert_eq!(clamp_extent(640, 480, 0), (1, 1));
    }
}
