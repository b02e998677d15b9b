use std::sync::Arc;

use ash::vk;
use helion_rhi::{
    VkHandle,
    device::Device,
    image::{Image, ImageView},
    memory::DeviceMemory,
};

/// Returns the aspects defined by a format.
///
/// The stencil aspect is derived from the format definition itself
/// rather than from a position in the format enumeration, so adding
/// or reordering depth formats cannot silently change view creation.
pub fn format_aspects(format: vk::Format) -> vk::ImageAspectFlags {
    match format {
        vk::Format::D16_UNORM | vk::Format::X8_D24_UNORM_PACK32 | vk::Format::D32_SFLOAT => {
            vk::ImageAspectFlags::DEPTH
        }
        vk::Format::D16_UNORM_S8_UINT
        | vk::Format::D24_UNORM_S8_UINT
        | vk::Format::D32_SFLOAT_S8_UINT => {
            vk::ImageAspectFlags::DEPTH | vk::ImageAspectFlags::STENCIL
        }
        vk::Format::S8_UINT => vk::ImageAspectFlags::STENCIL,
        _ => vk::ImageAspectFlags::COLOR,
    }
}

/// The three live resources of a target.
///
/// Either all three exist or none do. Fields are declared view-first
/// so both `destroy` and drop release them in view -> image -> memory
/// order. Generic over the resource types so the bookkeeping can be
/// exercised with plain droppable values.
struct TargetResources<V, I, M> {
    view: Option<V>,
    image: Option<I>,
    memory: Option<M>,
}

impl<V, I, M> Default for TargetResources<V, I, M> {
    fn default() -> Self {
        Self {
            view: None,
            image: None,
            memory: None,
        }
    }
}

impl<V, I, M> TargetResources<V, I, M> {
    /// Releases the view, image and memory, in that order.
    ///
    /// Safe to call on a never-created or already-destroyed triple.
    fn destroy(&mut self) {
        self.view = None;
        self.image = None;
        self.memory = None;
    }

    /// Installs a fresh triple, destroying any previous one first.
    fn install(&mut self, view: V, image: I, memory: M) {
        self.destroy();
        self.view = Some(view);
        self.image = Some(image);
        self.memory = Some(memory);
    }

    fn is_valid(&self) -> bool {
        self.view.is_some() && self.image.is_some() && self.memory.is_some()
    }
}

/// A device-resident attachment: image, backing memory and view.
pub struct RenderTarget {
    format: vk::Format,
    extent: vk::Extent2D,
    resources: TargetResources<ImageView, Image, DeviceMemory>,
}

impl Default for RenderTarget {
    fn default() -> Self {
        Self {
            format: vk::Format::UNDEFINED,
            extent: vk::Extent2D::default(),
            resources: TargetResources::default(),
        }
    }
}

impl RenderTarget {
    /// Releases the view, image and memory, in that order.
    ///
    /// Safe to call on a never-created or already-destroyed target.
    pub fn destroy(&mut self) {
        self.resources.destroy();
    }

    pub fn is_valid(&self) -> bool {
        self.resources.is_valid()
    }

    /// Recreates this target as a color attachment usable as a
    /// transfer source. Any previous incarnation is fully destroyed
    /// first.
    pub fn recreate_color(&mut self, device: &Arc<Device>, extent: vk::Extent2D, format: vk::Format) {
        self.recreate(
            device,
            extent,
            format,
            vk::ImageUsageFlags::COLOR_ATTACHMENT | vk::ImageUsageFlags::TRANSFER_SRC,
        );
    }

    /// Recreates this target as a depth/stencil attachment usable as
    /// a transfer source.
    pub fn recreate_depth(&mut self, device: &Arc<Device>, extent: vk::Extent2D, format: vk::Format) {
        self.recreate(
            device,
            extent,
            format,
            vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT | vk::ImageUsageFlags::TRANSFER_SRC,
        );
    }

    fn recreate(
        &mut self,
        device: &Arc<Device>,
        extent: vk::Extent2D,
        format: vk::Format,
        usage: vk::ImageUsageFlags,
    ) {
        self.destroy();

        let image_create_info = vk::ImageCreateInfo::default()
            .image_type(vk::ImageType::TYPE_2D)
            .format(format)
            .extent(vk::Extent3D {
                width: extent.width,
                height: extent.height,
                depth: 1,
            })
            .mip_levels(1)
            .array_layers(1)
            .samples(vk::SampleCountFlags::TYPE_1)
            .tiling(vk::ImageTiling::OPTIMAL)
            .usage(usage);

        let image = Image::new(Arc::clone(device), &image_create_info);

        let memory = DeviceMemory::allocate(
            Arc::clone(device),
            image.memory_requirements(),
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
        );
        image.bind_memory(&memory);

        let view_create_info = vk::ImageViewCreateInfo::default()
            .image(image.vk_handle())
            .view_type(vk::ImageViewType::TYPE_2D)
            .format(format)
            .subresource_range(vk::ImageSubresourceRange {
                aspect_mask: format_aspects(format),
                base_mip_level: 0,
                level_count: 1,
                base_array_layer: 0,
                layer_count: 1,
            });

        let view = ImageView::new(Arc::clone(device), &view_create_info);

        self.format = format;
        self.extent = extent;
        self.resources.install(view, image, memory);
    }

    pub fn format(&self) -> vk::Format {
        self.format
    }

    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    /// The image handle. Panics if the target has not been created.
    pub fn image(&self) -> vk::Image {
        self.resources
            .image
            .as_ref()
            .expect("render target not created")
            .vk_handle()
    }

    /// The view handle. Panics if the target has not been created.
    pub fn view(&self) -> vk::ImageView {
        self.resources
            .view
            .as_ref()
            .expect("render target not created")
            .vk_handle()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{cell::RefCell, rc::Rc};

    struct DropRecorder {
        label: &'static str,
        log: Rc<RefCell<Vec<&'static str>>>,
    }

    impl Drop for DropRecorder {
        fn drop(&mut self) {
            self.log.borrow_mut().push(self.label);
        }
    }

    fn recorder(
        label: &'static str,
        log: &Rc<RefCell<Vec<&'static str>>>,
    ) -> DropRecorder {
        DropRecorder {
            label,
            log: Rc::clone(log),
        }
    }

    #[test]
    fn reinstall_releases_the_previous_triple_in_order() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut resources = TargetResources::default();

        resources.install(
            recorder("view0", &log),
            recorder("image0", &log),
            recorder("memory0", &log),
        );
        assert!(resources.is_valid());
        assert!(log.borrow().is_empty());

        resources.install(
            recorder("view1", &log),
            recorder("image1", &log),
            recorder("memory1", &log),
        );
        assert_eq!(*log.borrow(), ["view0", "image0", "memory0"]);
        assert!(resources.is_valid());
    }

    #[test]
    fn repeated_recreation_leaves_exactly_one_triple_alive() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut resources = TargetResources::default();

        for _ in 0..5 {
            resources.install(
                recorder("view", &log),
                recorder("image", &log),
                recorder("memory", &log),
            );
        }

        // Four triples released, the fifth still live.
        assert_eq!(log.borrow().len(), 12);
        assert!(resources.is_valid());

        resources.destroy();
        assert_eq!(log.borrow().len(), 15);
        assert_eq!(&log.borrow()[12..], &["view", "image", "memory"]);
        assert!(!resources.is_valid());
    }

    #[test]
    fn destroy_of_never_created_target_is_a_noop() {
        let mut target = RenderTarget::default();
        assert!(!target.is_valid());

        target.destroy();
        target.destroy();
        assert!(!target.is_valid());
    }

    #[test]
    fn pure_depth_formats_have_no_stencil_aspect() {
        for format in [
            vk::Format::D16_UNORM,
            vk::Format::X8_D24_UNORM_PACK32,
            vk::Format::D32_SFLOAT,
        ] {
            assert_eq!(format_aspects(format), vk::ImageAspectFlags::DEPTH);
        }
    }

    #[test]
    fn combined_formats_have_depth_and_stencil_aspects() {
        for format in [
            vk::Format::D16_UNORM_S8_UINT,
            vk::Format::D24_UNORM_S8_UINT,
            vk::Format::D32_SFLOAT_S8_UINT,
        ] {
            assert_eq!(
                format_aspects(format),
                vk::ImageAspectFlags::DEPTH | vk::ImageAspectFlags::STENCIL
            );
        }
    }

    #[test]
    fn color_formats_have_color_aspect() {
        assert_eq!(
            format_aspects(vk::Format::B8G8R8A8_UNORM),
            vk::ImageAspectFlags::COLOR
        );
    }
}
