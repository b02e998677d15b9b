use std::sync::Arc;

use ash::vk;

use crate::{AshHandle, DebugWrapper, VkHandle, device::Device};

pub struct CommandPool {
    device: Arc<Device>,
    pool: DebugWrapper<vk::CommandPool>,
}

impl CommandPool {
    /// Creates a new reset-capable command pool.
    pub fn new(device: Arc<Device>, queue_family_index: u32) -> Arc<Self> {
        let create_info = vk::CommandPoolCreateInfo::default()
            .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER)
            .queue_family_index(queue_family_index);

        let pool = unsafe {
            device
                .ash_handle()
                .create_command_pool(&create_info, None)
                .unwrap()
        };

        Arc::new(Self {
            device,
            pool: DebugWrapper(pool),
        })
    }

    /// Allocates a primary command buffer from this pool.
    ///
    /// The buffer is freed back to the pool when dropped, so replacing
    /// an old buffer with a fresh allocation cannot leak.
    pub fn allocate(self: &Arc<Self>) -> CommandBuffer {
        let allocate_info = vk::CommandBufferAllocateInfo::default()
            .command_pool(self.pool.0)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(1);

        let command_buffers = unsafe {
            self.device
                .ash_handle()
                .allocate_command_buffers(&allocate_info)
                .unwrap()
        };

        CommandBuffer {
            device: Arc::clone(&self.device),
            pool: Arc::clone(self),
            command_buffer: DebugWrapper(command_buffers[0]),
        }
    }

    pub fn device(&self) -> &Arc<Device> {
        &self.device
    }
}

impl VkHandle for CommandPool {
    type Handle = vk::CommandPool;

    fn vk_handle(&self) -> Self::Handle {
        self.pool.0
    }
}

impl Drop for CommandPool {
    fn drop(&mut self) {
        unsafe {
            self.device
                .ash_handle()
                .destroy_command_pool(self.pool.0, None);
        }
    }
}

pub struct CommandBuffer {
    device: Arc<Device>,
    pool: Arc<CommandPool>,
    command_buffer: DebugWrapper<vk::CommandBuffer>,
}

impl CommandBuffer {
    /// Begins recording commands into the command buffer.
    pub fn begin(&self, flags: vk::CommandBufferUsageFlags) {
        let begin_info = vk::CommandBufferBeginInfo::default().flags(flags);

        unsafe {
            self.device
                .ash_handle()
                .begin_command_buffer(self.command_buffer.0, &begin_info)
                .unwrap();
        }
    }

    /// Ends recording commands into the command buffer.
    pub fn end(&self) {
        unsafe {
            self.device
                .ash_handle()
                .end_command_buffer(self.command_buffer.0)
                .unwrap();
        }
    }

    pub fn device(&self) -> &Arc<Device> {
        &self.device
    }
}

impl VkHandle for CommandBuffer {
    type Handle = vk::CommandBuffer;

    fn vk_handle(&self) -> Self::Handle {
        self.command_buffer.0
    }
}

impl Drop for CommandBuffer {
    fn drop(&mut self) {
        unsafe {
            self.device
                .ash_handle()
                .free_command_buffers(self.pool.vk_handle(), &[self.command_buffer.0]);
        }
    }
}
