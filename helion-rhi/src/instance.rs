use std::{cell::OnceCell, sync::Arc};

use ash::vk;
use smallvec::SmallVec;

use crate::{AshHandle, device::PhysicalDevice};

/// Instance-level extensions the harness can request.
///
/// Headless rendering needs no surface extensions; debug utils is the
/// only optional one and is skipped when the loader does not offer it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct InstanceExtensions {
    pub ext_debug_utils: bool,
}

impl InstanceExtensions {
    pub fn iter_c_ptrs(&self) -> impl Iterator<Item = *const i8> {
        [(ash::ext::debug_utils::NAME, self.ext_debug_utils)]
            .into_iter()
            .filter_map(|(name, enabled)| enabled.then_some(name.as_ptr()))
    }
}

pub struct Library {
    pub(crate) entry: ash::Entry,
}

impl Library {
    pub fn new() -> Arc<Library> {
        let entry = unsafe { ash::Entry::load() }.expect("failed to load vulkan library");
        Arc::new(Library { entry })
    }

    /// Returns the instance extensions the loader actually supports
    /// among the requested set.
    pub fn supported_extensions(&self, requested: InstanceExtensions) -> InstanceExtensions {
        let properties = unsafe {
            self.entry
                .enumerate_instance_extension_properties(None)
                .unwrap_or_default()
        };

        let mut supported = InstanceExtensions::default();
        for property in &properties {
            if let Ok(name) = property.extension_name_as_c_str() {
                if name == ash::ext::debug_utils::NAME {
                    supported.ext_debug_utils = requested.ext_debug_utils;
                }
            }
        }

        supported
    }
}

pub struct Instance {
    library: Arc<Library>,
    instance: ash::Instance,
    physical_devices: OnceCell<SmallVec<[Arc<PhysicalDevice>; 2]>>,
}

impl Instance {
    pub fn new(library: Arc<Library>, extensions: InstanceExtensions) -> Arc<Self> {
        let application_info = vk::ApplicationInfo::default()
            .application_name(c"Helion")
            .application_version(vk::API_VERSION_1_0)
            .api_version(vk::API_VERSION_1_2)
            .engine_name(c"Helion");

        let enabled_extensions = extensions.iter_c_ptrs().collect::<Vec<_>>();

        let create_info = vk::InstanceCreateInfo::default()
            .application_info(&application_info)
            .enabled_extension_names(&enabled_extensions);

        log::debug!("creating vulkan instance");
        let instance = unsafe { library.entry.create_instance(&create_info, None) }.unwrap();

        Arc::new(Self {
            library,
            instance,
            physical_devices: Default::default(),
        })
    }

    pub fn enumerate_physical_devices(
        self: &Arc<Self>,
    ) -> impl ExactSizeIterator<Item = Arc<PhysicalDevice>> {
        let physical_devices = self.physical_devices.get_or_init(|| {
            let physical_devices = unsafe { self.instance.enumerate_physical_devices() }.unwrap();

            physical_devices
                .into_iter()
                .map(|physical_device| PhysicalDevice::from_raw(Arc::clone(self), physical_device))
                .collect()
        });

        physical_devices.iter().cloned()
    }

    /// Returns the library (entry) associated with this instance.
    pub fn library(&self) -> &Arc<Library> {
        &self.library
    }
}

impl AshHandle for Instance {
    type Handle = ash::Instance;

    fn ash_handle(&self) -> &Self::Handle {
        &self.instance
    }
}
