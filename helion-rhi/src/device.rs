use std::{cell::OnceCell, sync::Arc};

use ash::vk;
use smallvec::SmallVec;

use crate::{AshHandle, VkHandle, instance::Instance};

/// Device-level extensions the ray-tracing harness cares about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DeviceExtensions {
    pub khr_acceleration_structure: bool,
    pub khr_ray_tracing_pipeline: bool,
    pub khr_ray_query: bool,
    pub khr_deferred_host_operations: bool,
    pub khr_buffer_device_address: bool,
    pub khr_shader_clock: bool,
}

impl DeviceExtensions {
    const TABLE: [&'static std::ffi::CStr; 6] = [
        ash::khr::acceleration_structure::NAME,
        ash::khr::ray_tracing_pipeline::NAME,
        ash::khr::ray_query::NAME,
        ash::khr::deferred_host_operations::NAME,
        ash::khr::buffer_device_address::NAME,
        ash::khr::shader_clock::NAME,
    ];

    fn fields(&self) -> [bool; 6] {
        [
            self.khr_acceleration_structure,
            self.khr_ray_tracing_pipeline,
            self.khr_ray_query,
            self.khr_deferred_host_operations,
            self.khr_buffer_device_address,
            self.khr_shader_clock,
        ]
    }

    pub fn from_iter<'a>(names: impl Iterator<Item = &'a std::ffi::CStr>) -> Self {
        let mut result = Self::default();
        for name in names {
            if name == ash::khr::acceleration_structure::NAME {
                result.khr_acceleration_structure = true;
            } else if name == ash::khr::ray_tracing_pipeline::NAME {
                result.khr_ray_tracing_pipeline = true;
            } else if name == ash::khr::ray_query::NAME {
                result.khr_ray_query = true;
            } else if name == ash::khr::deferred_host_operations::NAME {
                result.khr_deferred_host_operations = true;
            } else if name == ash::khr::buffer_device_address::NAME {
                result.khr_buffer_device_address = true;
            } else if name == ash::khr::shader_clock::NAME {
                result.khr_shader_clock = true;
            }
        }
        result
    }

    pub fn iter_c_ptrs(&self) -> impl Iterator<Item = *const i8> {
        Self::TABLE
            .into_iter()
            .zip(self.fields())
            .filter_map(|(name, enabled)| enabled.then_some(name.as_ptr()))
    }

    /// Keeps only the extensions that are also in `supported`.
    pub fn intersection(&self, supported: &Self) -> Self {
        Self {
            khr_acceleration_structure: self.khr_acceleration_structure
                && supported.khr_acceleration_structure,
            khr_ray_tracing_pipeline: self.khr_ray_tracing_pipeline
                && supported.khr_ray_tracing_pipeline,
            khr_ray_query: self.khr_ray_query && supported.khr_ray_query,
            khr_deferred_host_operations: self.khr_deferred_host_operations
                && supported.khr_deferred_host_operations,
            khr_buffer_device_address: self.khr_buffer_device_address
                && supported.khr_buffer_device_address,
            khr_shader_clock: self.khr_shader_clock && supported.khr_shader_clock,
        }
    }
}

pub struct PhysicalDevice {
    instance: Arc<Instance>,
    physical_device: vk::PhysicalDevice,
    device_name: OnceCell<String>,
    extensions: OnceCell<DeviceExtensions>,
}

impl VkHandle for PhysicalDevice {
    type Handle = vk::PhysicalDevice;

    fn vk_handle(&self) -> Self::Handle {
        self.physical_device
    }
}

impl PhysicalDevice {
    pub fn from_raw(instance: Arc<Instance>, physical_device: vk::PhysicalDevice) -> Arc<Self> {
        Arc::new(Self {
            instance,
            physical_device,
            device_name: Default::default(),
            extensions: Default::default(),
        })
    }

    pub fn instance(&self) -> &Arc<Instance> {
        &self.instance
    }

    /// Returns the device name reported by the driver.
    pub fn name(&self) -> &str {
        self.device_name.get_or_init(|| {
            let properties = unsafe {
                self.instance
                    .ash_handle()
                    .get_physical_device_properties(self.physical_device)
            };

            properties
                .device_name_as_c_str()
                .ok()
                .map(|s| s.to_string_lossy().to_string())
                .unwrap_or_else(|| "<unknown>".into())
        })
    }

    /// Returns the extensions supported by the physical device.
    pub fn extensions(&self) -> &DeviceExtensions {
        self.extensions.get_or_init(|| {
            let properties = unsafe {
                self.instance
                    .ash_handle()
                    .enumerate_device_extension_properties(self.physical_device)
                    .unwrap_or_default()
            };

            let names = properties
                .iter()
                .filter_map(|extension| extension.extension_name_as_c_str().ok());

            DeviceExtensions::from_iter(names)
        })
    }

    pub fn memory_properties(&self) -> vk::PhysicalDeviceMemoryProperties {
        unsafe {
            self.instance
                .ash_handle()
                .get_physical_device_memory_properties(self.physical_device)
        }
    }

    pub fn format_properties(&self, format: vk::Format) -> vk::FormatProperties {
        unsafe {
            self.instance
                .ash_handle()
                .get_physical_device_format_properties(self.physical_device, format)
        }
    }

    pub fn queue_family_properties(&self) -> SmallVec<[vk::QueueFamilyProperties; 8]> {
        let properties = unsafe {
            self.instance
                .ash_handle()
                .get_physical_device_queue_family_properties(self.physical_device)
        };

        properties.into_iter().collect()
    }

    /// Returns the index of the first queue family supporting graphics
    /// and compute, if any.
    pub fn find_graphics_queue_family(&self) -> Option<u32> {
        self.queue_family_properties()
            .iter()
            .position(|family| {
                family
                    .queue_flags
                    .contains(vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE)
            })
            .map(|index| index as u32)
    }
}

pub struct DeviceCreateInfo {
    pub queue_family_index: u32,
    pub extensions: DeviceExtensions,
}

pub struct Device {
    instance: Arc<Instance>,
    physical_device: Arc<PhysicalDevice>,
    device: ash::Device,
    enabled_extensions: DeviceExtensions,
}

impl AshHandle for Device {
    type Handle = ash::Device;

    fn ash_handle(&self) -> &Self::Handle {
        &self.device
    }
}

impl Device {
    /// Creates a logical device with the ray-tracing feature chain
    /// wired for whichever of the requested extensions are enabled.
    pub fn new(physical_device: Arc<PhysicalDevice>, create_info: DeviceCreateInfo) -> Arc<Self> {
        let instance = Arc::clone(physical_device.instance());
        let extensions = create_info
            .extensions
            .intersection(physical_device.extensions());

        let queue_priorities = [1.0];
        let queue_create_infos = [vk::DeviceQueueCreateInfo::default()
            .queue_family_index(create_info.queue_family_index)
            .queue_priorities(&queue_priorities)];

        let enabled_extension_names = extensions.iter_c_ptrs().collect::<Vec<_>>();

        let mut vulkan12_features = vk::PhysicalDeviceVulkan12Features::default()
            .buffer_device_address(extensions.khr_buffer_device_address);
        let mut accel_features = vk::PhysicalDeviceAccelerationStructureFeaturesKHR::default()
            .acceleration_structure(extensions.khr_acceleration_structure);
        let mut rt_pipeline_features = vk::PhysicalDeviceRayTracingPipelineFeaturesKHR::default()
            .ray_tracing_pipeline(extensions.khr_ray_tracing_pipeline);
        let mut ray_query_features =
            vk::PhysicalDeviceRayQueryFeaturesKHR::default().ray_query(extensions.khr_ray_query);

        let mut vk_create_info = vk::DeviceCreateInfo::default()
            .queue_create_infos(&queue_create_infos)
            .enabled_extension_names(&enabled_extension_names)
            .push_next(&mut vulkan12_features);

        if extensions.khr_acceleration_structure {
            vk_create_info = vk_create_info.push_next(&mut accel_features);
        }
        if extensions.khr_ray_tracing_pipeline {
            vk_create_info = vk_create_info.push_next(&mut rt_pipeline_features);
        }
        if extensions.khr_ray_query {
            vk_create_info = vk_create_info.push_next(&mut ray_query_features);
        }

        log::debug!(
            "creating device on {} (ray query: {})",
            physical_device.name(),
            extensions.khr_ray_query
        );

        let device = unsafe {
            instance.ash_handle().create_device(
                physical_device.vk_handle(),
                &vk_create_info,
                None,
            )
        }
        .unwrap();

        Arc::new(Self {
            instance,
            physical_device,
            device,
            enabled_extensions: extensions,
        })
    }

    /// Returns the instance associated with the device.
    pub fn instance(&self) -> &Arc<Instance> {
        &self.instance
    }

    /// Returns the physical device associated with the device.
    pub fn physical_device(&self) -> &Arc<PhysicalDevice> {
        &self.physical_device
    }

    /// Returns the extensions the device was created with.
    pub fn enabled_extensions(&self) -> &DeviceExtensions {
        &self.enabled_extensions
    }

    pub fn get_queue(&self, queue_family_index: u32, queue_index: u32) -> vk::Queue {
        unsafe { self.device.get_device_queue(queue_family_index, queue_index) }
    }

    /// Blocks until all work submitted to the device has finished.
    pub fn wait_idle(&self) {
        unsafe {
            self.device.device_wait_idle().unwrap();
        }
    }
}

impl Drop for Device {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_device(None);
        }
    }
}
