use std::sync::Arc;

use ash::vk;

use crate::{AshHandle, DebugWrapper, VkHandle, device::Device, sync::Fence};

pub struct Queue {
    device: Arc<Device>,
    queue: DebugWrapper<vk::Queue>,
}

impl Queue {
    pub fn new(device: Arc<Device>, queue: vk::Queue) -> Self {
        Self {
            device,
            queue: DebugWrapper(queue),
        }
    }

    pub fn device(&self) -> &Arc<Device> {
        &self.device
    }

    /// Submits a single command buffer, optionally signaling a fence.
    pub fn submit(&self, command_buffer: vk::CommandBuffer, fence: Option<&Fence>) {
        let command_buffers = [command_buffer];
        let submit_info = vk::SubmitInfo::default().command_buffers(&command_buffers);

        let fence_handle = fence.map(|f| f.vk_handle()).unwrap_or(vk::Fence::null());

        unsafe {
            self.device
                .ash_handle()
                .queue_submit(self.queue.0, &[submit_info], fence_handle)
                .unwrap();
        }
    }

    /// Submits a single command buffer and blocks until it has
    /// executed, using a fence dedicated to this submission.
    pub fn submit_and_wait(&self, command_buffer: vk::CommandBuffer) {
        let fence = Fence::unsignaled(Arc::clone(&self.device));
        self.submit(command_buffer, Some(&fence));
        fence.wait(u64::MAX);
    }

    /// Blocks until all work submitted to this queue has finished.
    pub fn wait_idle(&self) {
        unsafe {
            self.device
                .ash_handle()
                .queue_wait_idle(self.queue.0)
                .unwrap();
        }
    }
}

impl VkHandle for Queue {
    type Handle = vk::Queue;

    fn vk_handle(&self) -> Self::Handle {
        self.queue.0
    }
}
