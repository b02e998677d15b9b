use std::sync::Arc;

use ash::vk;

use crate::{AshHandle, DebugWrapper, VkHandle, device::Device, memory::DeviceMemory};

/// An owned image handle without backing memory.
///
/// Binding memory is a separate step so the caller controls the
/// requirements query / memory-type selection / bind sequence.
pub struct Image {
    device: Arc<Device>,
    image: DebugWrapper<vk::Image>,
}

impl Image {
    pub fn new(device: Arc<Device>, create_info: &vk::ImageCreateInfo) -> Self {
        let image = unsafe { device.ash_handle().create_image(create_info, None) }.unwrap();

        Self {
            device,
            image: DebugWrapper(image),
        }
    }

    pub fn memory_requirements(&self) -> vk::MemoryRequirements {
        unsafe {
            self.device
                .ash_handle()
                .get_image_memory_requirements(self.image.0)
        }
    }

    /// Binds `memory` at offset zero.
    pub fn bind_memory(&self, memory: &DeviceMemory) {
        unsafe {
            self.device
                .ash_handle()
                .bind_image_memory(self.image.0, memory.vk_handle(), 0)
                .unwrap();
        }
    }

    /// Returns the layout of a subresource of a linearly tiled image,
    /// including its row pitch.
    pub fn subresource_layout(&self, subresource: vk::ImageSubresource) -> vk::SubresourceLayout {
        unsafe {
            self.device
                .ash_handle()
                .get_image_subresource_layout(self.image.0, subresource)
        }
    }

    pub fn device(&self) -> &Arc<Device> {
        &self.device
    }
}

impl VkHandle for Image {
    type Handle = vk::Image;

    fn vk_handle(&self) -> Self::Handle {
        self.image.0
    }
}

impl Drop for Image {
    fn drop(&mut self) {
        unsafe {
            self.device.ash_handle().destroy_image(self.image.0, None);
        }
    }
}

pub struct ImageView {
    device: Arc<Device>,
    image_view: DebugWrapper<vk::ImageView>,
}

impl ImageView {
    pub fn new(device: Arc<Device>, create_info: &vk::ImageViewCreateInfo) -> Self {
        let image_view =
            unsafe { device.ash_handle().create_image_view(create_info, None) }.unwrap();

        Self {
            device,
            image_view: DebugWrapper(image_view),
        }
    }
}

impl VkHandle for ImageView {
    type Handle = vk::ImageView;

    fn vk_handle(&self) -> Self::Handle {
        self.image_view.0
    }
}

impl Drop for ImageView {
    fn drop(&mut self) {
        unsafe {
            self.device
                .ash_handle()
                .destroy_image_view(self.image_view.0, None);
        }
    }
}
