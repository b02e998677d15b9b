use std::sync::Arc;

use ash::vk;
use helion_rhi::{
    AshHandle, VkHandle,
    command::{CommandBuffer, CommandPool},
    device::Device,
    queue::Queue,
};

use crate::target::RenderTarget;

/// Depth formats probed when the caller does not pick one, best first.
pub const DEPTH_FORMAT_CANDIDATES: [vk::Format; 3] = [
    vk::Format::D24_UNORM_S8_UINT,
    vk::Format::D32_SFLOAT_S8_UINT,
    vk::Format::D16_UNORM_S8_UINT,
];

/// Picks the first candidate whose optimal-tiling features include
/// depth/stencil attachment support.
///
/// `format_features` abstracts the physical-device query so the
/// selection rule itself stays device-independent.
pub fn select_depth_format(
    candidates: &[vk::Format],
    format_features: impl Fn(vk::Format) -> vk::FormatFeatureFlags,
) -> Option<vk::Format> {
    let required = vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT;
    candidates
        .iter()
        .copied()
        .find(|&format| format_features(format).contains(required))
}

pub struct HeadlessContextCreateInfo {
    pub device: Arc<Device>,
    pub queue_family_index: u32,
    pub size: vk::Extent2D,
    pub color_format: vk::Format,
    /// When `None`, the best supported depth format is probed.
    pub depth_format: Option<vk::Format>,
    /// Elides render pass and framebuffer objects; attachment info is
    /// then supplied per draw.
    pub use_dynamic_rendering: bool,
}

/// The headless device/queue context and command engine.
///
/// Owns the render targets, render pass, framebuffer, pipeline cache
/// and the persistent per-frame command buffer. Every submission path
/// here is synchronous; nothing overlaps frames.
pub struct HeadlessContext {
    device: Arc<Device>,
    queue: Queue,
    queue_family_index: u32,
    command_pool: Arc<CommandPool>,
    pipeline_cache: vk::PipelineCache,
    size: vk::Extent2D,
    color_format: vk::Format,
    depth_format: vk::Format,
    pub(crate) color: RenderTarget,
    pub(crate) depth: RenderTarget,
    pub(crate) render_pass: vk::RenderPass,
    pub(crate) framebuffer: vk::Framebuffer,
    command_buffer: Option<CommandBuffer>,
    use_dynamic_rendering: bool,
}

impl HeadlessContext {
    /// Resolves the queue and creates the command pool and pipeline
    /// cache. Fatal when no depth format candidate qualifies.
    pub fn setup(create_info: HeadlessContextCreateInfo) -> Self {
        let device = create_info.device;
        let queue_family_index = create_info.queue_family_index;

        let queue = Queue::new(
            Arc::clone(&device),
            device.get_queue(queue_family_index, 0),
        );
        let command_pool = CommandPool::new(Arc::clone(&device), queue_family_index);

        let cache_create_info = vk::PipelineCacheCreateInfo::default();
        let pipeline_cache = unsafe {
            device
                .ash_handle()
                .create_pipeline_cache(&cache_create_info, None)
        }
        .unwrap();

        let depth_format = match create_info.depth_format {
            Some(format) => format,
            None => {
                let physical_device = Arc::clone(device.physical_device());
                match select_depth_format(&DEPTH_FORMAT_CANDIDATES, |format| {
                    physical_device.format_properties(format).optimal_tiling_features
                }) {
                    Some(format) => format,
                    None => {
                        log::error!("no supported depth/stencil attachment format");
                        panic!("no valid depth format");
                    }
                }
            }
        };

        log::info!(
            "headless context: {}x{}, color {:?}, depth {:?}",
            create_info.size.width,
            create_info.size.height,
            create_info.color_format,
            depth_format
        );

        Self {
            device,
            queue,
            queue_family_index,
            command_pool,
            pipeline_cache,
            size: create_info.size,
            color_format: create_info.color_format,
            depth_format,
            color: RenderTarget::default(),
            depth: RenderTarget::default(),
            render_pass: vk::RenderPass::null(),
            framebuffer: vk::Framebuffer::null(),
            command_buffer: None,
            use_dynamic_rendering: create_info.use_dynamic_rendering,
        }
    }

    /// (Re)creates the color attachment at the output resolution.
    pub fn create_color_target(&mut self) {
        let (size, format) = (self.size, self.color_format);
        self.color.recreate_color(&self.device, size, format);
    }

    /// (Re)creates the depth attachment at the output resolution.
    pub fn create_depth_target(&mut self) {
        let (size, format) = (self.size, self.depth_format);
        self.depth.recreate_depth(&self.device, size, format);
    }

    /// Re-arms the persistent per-frame command buffer.
    ///
    /// The previous buffer, if any, is freed before a new one is
    /// allocated. Recording begins immediately, without the
    /// one-time-submit flag: the buffer is meant to be recorded on
    /// every run of the harness.
    pub fn create_command_buffer(&mut self) {
        self.command_buffer = None;

        let command_buffer = self.command_pool.allocate();
        command_buffer.begin(vk::CommandBufferUsageFlags::empty());
        self.command_buffer = Some(command_buffer);
    }

    /// The persistent per-frame command buffer.
    ///
    /// Panics if `create_command_buffer` has not been called.
    pub fn command_buffer(&self) -> vk::CommandBuffer {
        self.command_buffer
            .as_ref()
            .expect("command buffer not created")
            .vk_handle()
    }

    /// Closes recording on the persistent per-frame command buffer.
    ///
    /// Panics if `create_command_buffer` has not been called.
    pub fn end_command_buffer(&self) {
        self.command_buffer
            .as_ref()
            .expect("command buffer not created")
            .end();
    }

    /// Submits one command buffer and blocks until it has executed.
    pub fn submit_work(&self, command_buffer: vk::CommandBuffer) {
        self.queue.submit_and_wait(command_buffer);
    }

    /// Records one isolated operation into a transient command buffer
    /// and submits it synchronously. The buffer is freed afterwards.
    pub fn transient_commands(&self, record: impl FnOnce(vk::CommandBuffer)) {
        let command_buffer = self.command_pool.allocate();
        command_buffer.begin(vk::CommandBufferUsageFlags::empty());
        record(command_buffer.vk_handle());
        command_buffer.end();
        self.queue.submit_and_wait(command_buffer.vk_handle());
    }

    /// Emits a full-extent viewport and scissor.
    pub fn set_viewport(&self, command_buffer: vk::CommandBuffer) {
        let viewport = vk::Viewport {
            x: 0.0,
            y: 0.0,
            width: self.size.width as f32,
            height: self.size.height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        };
        let scissor = vk::Rect2D {
            offset: vk::Offset2D::default(),
            extent: self.size,
        };

        unsafe {
            self.device
                .ash_handle()
                .cmd_set_viewport(command_buffer, 0, &[viewport]);
            self.device
                .ash_handle()
                .cmd_set_scissor(command_buffer, 0, &[scissor]);
        }
    }

    pub fn device(&self) -> &Arc<Device> {
        &self.device
    }

    pub fn queue(&self) -> &Queue {
        &self.queue
    }

    pub fn queue_family_index(&self) -> u32 {
        self.queue_family_index
    }

    pub fn command_pool(&self) -> &Arc<CommandPool> {
        &self.command_pool
    }

    pub fn pipeline_cache(&self) -> vk::PipelineCache {
        self.pipeline_cache
    }

    pub fn size(&self) -> vk::Extent2D {
        self.size
    }

    pub fn color_format(&self) -> vk::Format {
        self.color_format
    }

    pub fn depth_format(&self) -> vk::Format {
        self.depth_format
    }

    pub fn color_image(&self) -> vk::Image {
        self.color.image()
    }

    pub fn depth_view(&self) -> vk::ImageView {
        self.depth.view()
    }

    pub fn render_pass(&self) -> vk::RenderPass {
        self.render_pass
    }

    pub fn framebuffer(&self) -> vk::Framebuffer {
        self.framebuffer
    }

    pub fn use_dynamic_rendering(&self) -> bool {
        self.use_dynamic_rendering
    }

    /// Tears everything down. Waits for the device to go idle first so
    /// nothing is destroyed while referenced by in-flight work.
    pub fn destroy(&mut self) {
        self.device.wait_idle();

        unsafe {
            if !self.use_dynamic_rendering && self.render_pass != vk::RenderPass::null() {
                self.device
                    .ash_handle()
                    .destroy_render_pass(self.render_pass, None);
                self.render_pass = vk::RenderPass::null();
            }
            if self.framebuffer != vk::Framebuffer::null() {
                self.device
                    .ash_handle()
                    .destroy_framebuffer(self.framebuffer, None);
                self.framebuffer = vk::Framebuffer::null();
            }
            self.device
                .ash_handle()
                .destroy_pipeline_cache(self.pipeline_cache, None);
            self.pipeline_cache = vk::PipelineCache::null();
        }

        self.depth.destroy();
        self.color.destroy();

        // Dropping the persistent buffer frees it back to the pool;
        // the pool itself goes with the context.
        self.command_buffer = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn features_of(
        table: &HashMap<vk::Format, vk::FormatFeatureFlags>,
    ) -> impl Fn(vk::Format) -> vk::FormatFeatureFlags + '_ {
        move |format| table.get(&format).copied().unwrap_or_default()
    }

    #[test]
    fn probe_picks_first_supported_candidate() {
        let mut table = HashMap::new();
        table.insert(
            vk::Format::D32_SFLOAT_S8_UINT,
            vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT,
        );
        table.insert(
            vk::Format::D16_UNORM_S8_UINT,
            vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT,
        );

        let format = select_depth_format(&DEPTH_FORMAT_CANDIDATES, features_of(&table));
        assert_eq!(format, Some(vk::Format::D32_SFLOAT_S8_UINT));
    }

    #[test]
    fn probe_respects_priority_order() {
        let mut table = HashMap::new();
        for candidate in DEPTH_FORMAT_CANDIDATES {
            table.insert(candidate, vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT);
        }

        let format = select_depth_format(&DEPTH_FORMAT_CANDIDATES, features_of(&table));
        assert_eq!(format, Some(vk::Format::D24_UNORM_S8_UINT));
    }

    #[test]
    fn probe_ignores_formats_with_other_features() {
        let mut table = HashMap::new();
        table.insert(
            vk::Format::D24_UNORM_S8_UINT,
            vk::FormatFeatureFlags::SAMPLED_IMAGE,
        );
        table.insert(
            vk::Format::D16_UNORM_S8_UINT,
            vk::FormatFeatureFlags::SAMPLED_IMAGE
                | vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT,
        );

        let format = select_depth_format(&DEPTH_FORMAT_CANDIDATES, features_of(&table));
        assert_eq!(format, Some(vk::Format::D16_UNORM_S8_UINT));
    }

    #[test]
    fn probe_fails_when_nothing_qualifies() {
        let table = HashMap::new();
        let format = select_depth_format(&DEPTH_FORMAT_CANDIDATES, features_of(&table));
        assert_eq!(format, None);
    }
}
