use std::ops::Deref;

pub mod command;
pub mod device;
pub mod image;
pub mod instance;
pub mod memory;
pub mod queue;
pub mod sync;

/// A trait for objects that wrap Vulkan handles.
pub trait VkHandle {
    type Handle: ash::vk::Handle;

    /// Returns the Vulkan handle of the object.
    fn vk_handle(&self) -> Self::Handle;
}

/// A trait for objects that wrap Ash handles.
pub trait AshHandle {
    type Handle;

    fn ash_handle(&self) -> &Self::Handle;
}

/// Wraps a raw Vulkan handle so it debug-prints as a hex address.
pub struct DebugWrapper<T: ash::vk::Handle>(pub T);

impl<T> Deref for DebugWrapper<T>
where
    T: ash::vk::Handle,
{
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<T> std::fmt::Debug for DebugWrapper<T>
where
    T: ash::vk::Handle + Copy,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "0x{:X}", self.0.as_raw())
    }
}
