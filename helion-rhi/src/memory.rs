use std::sync::Arc;

use ash::vk;

use crate::{AshHandle, DebugWrapper, VkHandle, device::Device};

/// First-match scan of the physical device memory-type table.
///
/// `type_bits` comes from the resource's memory requirements; the
/// winning type must also carry every flag in `properties`.
pub fn find_memory_type_index(
    memory_properties: &vk::PhysicalDeviceMemoryProperties,
    type_bits: u32,
    properties: vk::MemoryPropertyFlags,
) -> Option<u32> {
    memory_properties.memory_types[..memory_properties.memory_type_count as usize]
        .iter()
        .enumerate()
        .find(|(index, memory_type)| {
            type_bits & (1 << index) != 0 && memory_type.property_flags.contains(properties)
        })
        .map(|(index, _)| index as u32)
}

/// An owned device memory allocation.
///
/// The allocation is freed on drop; any image or buffer bound to it
/// must be destroyed first.
pub struct DeviceMemory {
    device: Arc<Device>,
    memory: DebugWrapper<vk::DeviceMemory>,
    size: vk::DeviceSize,
}

impl DeviceMemory {
    /// Allocates memory satisfying `requirements` with the requested
    /// property flags.
    ///
    /// No qualifying memory type means the device cannot run this
    /// workload at all; that is a fatal configuration error.
    pub fn allocate(
        device: Arc<Device>,
        requirements: vk::MemoryRequirements,
        properties: vk::MemoryPropertyFlags,
    ) -> Self {
        let memory_properties = device.physical_device().memory_properties();

        let Some(memory_type_index) = find_memory_type_index(
            &memory_properties,
            requirements.memory_type_bits,
            properties,
        ) else {
            log::error!("unable to find memory type for properties {properties:?}");
            panic!("no suitable memory type");
        };

        let allocate_info = vk::MemoryAllocateInfo::default()
            .allocation_size(requirements.size)
            .memory_type_index(memory_type_index);

        let memory = unsafe { device.ash_handle().allocate_memory(&allocate_info, None) }.unwrap();

        Self {
            device,
            memory: DebugWrapper(memory),
            size: requirements.size,
        }
    }

    pub fn size(&self) -> vk::DeviceSize {
        self.size
    }

    /// Maps the whole allocation and returns the host pointer.
    ///
    /// Only valid for host-visible memory. The mapping is released
    /// with [`unmap`](Self::unmap).
    pub fn map(&self) -> *const u8 {
        unsafe {
            self.device
                .ash_handle()
                .map_memory(self.memory.0, 0, vk::WHOLE_SIZE, vk::MemoryMapFlags::empty())
                .unwrap() as *const u8
        }
    }

    pub fn unmap(&self) {
        unsafe {
            self.device.ash_handle().unmap_memory(self.memory.0);
        }
    }
}

impl VkHandle for DeviceMemory {
    type Handle = vk::DeviceMemory;

    fn vk_handle(&self) -> Self::Handle {
        self.memory.0
    }
}

impl Drop for DeviceMemory {
    fn drop(&mut self) {
        unsafe {
            self.device.ash_handle().free_memory(self.memory.0, None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory_properties(types: &[(vk::MemoryPropertyFlags, u32)]) -> vk::PhysicalDeviceMemoryProperties {
        let mut properties = vk::PhysicalDeviceMemoryProperties::default();
        properties.memory_type_count = types.len() as u32;
        for (index, (flags, heap_index)) in types.iter().enumerate() {
            properties.memory_types[index] = vk::MemoryType {
                property_flags: *flags,
                heap_index: *heap_index,
            };
        }
        properties
    }

    #[test]
    fn picks_first_matching_type() {
        let properties = memory_properties(&[
            (vk::MemoryPropertyFlags::HOST_VISIBLE, 0),
            (vk::MemoryPropertyFlags::DEVICE_LOCAL, 0),
            (vk::MemoryPropertyFlags::DEVICE_LOCAL, 1),
        ]);

        let index = find_memory_type_index(
            &properties,
            0b111,
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
        );
        assert_eq!(index, Some(1));
    }

    #[test]
    fn respects_type_bits() {
        let properties = memory_properties(&[
            (vk::MemoryPropertyFlags::DEVICE_LOCAL, 0),
            (vk::MemoryPropertyFlags::DEVICE_LOCAL, 0),
        ]);

        // Type 0 is excluded by the requirements mask.
        let index = find_memory_type_index(
            &properties,
            0b10,
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
        );
        assert_eq!(index, Some(1));
    }

    #[test]
    fn requires_all_requested_flags() {
        let properties = memory_properties(&[
            (vk::MemoryPropertyFlags::HOST_VISIBLE, 0),
            (
                vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
                0,
            ),
        ]);

        let index = find_memory_type_index(
            &properties,
            0b11,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
        );
        assert_eq!(index, Some(1));
    }

    #[test]
    fn none_when_nothing_qualifies() {
        let properties = memory_properties(&[(vk::MemoryPropertyFlags::HOST_VISIBLE, 0)]);

        let index = find_memory_type_index(
            &properties,
            0b1,
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
        );
        assert_eq!(index, None);
    }
}
