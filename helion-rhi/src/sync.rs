use std::sync::Arc;

use ash::vk;

use crate::{AshHandle, DebugWrapper, VkHandle, device::Device};

pub struct Fence {
    device: Arc<Device>,
    fence: DebugWrapper<vk::Fence>,
}

impl Fence {
    /// Creates a new fence in the unsignaled state.
    pub fn unsignaled(device: Arc<Device>) -> Self {
        let create_info = vk::FenceCreateInfo::default();

        let fence = unsafe { device.ash_handle().create_fence(&create_info, None) }.unwrap();

        Self {
            device,
            fence: DebugWrapper(fence),
        }
    }

    /// Waits for the fence to be signaled.
    /// Returns true if the fence was signaled, false if the wait timed out.
    pub fn wait(&self, timeout: u64) -> bool {
        unsafe {
            match self
                .device
                .ash_handle()
                .wait_for_fences(&[self.fence.0], true, timeout)
            {
                Ok(()) => true,
                Err(vk::Result::TIMEOUT) => false,
                Err(e) => panic!("wait_for_fences failed: {e:?}"),
            }
        }
    }

    /// Resets the fence to the unsignaled state.
    pub fn reset(&self) {
        unsafe {
            self.device
                .ash_handle()
                .reset_fences(&[self.fence.0])
                .unwrap();
        }
    }
}

impl VkHandle for Fence {
    type Handle = vk::Fence;

    fn vk_handle(&self) -> Self::Handle {
        self.fence.0
    }
}

impl Drop for Fence {
    fn drop(&mut self) {
        unsafe {
            self.device.ash_handle().destroy_fence(self.fence.0, None);
        }
    }
}
