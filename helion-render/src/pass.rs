use ash::vk;
use helion_rhi::AshHandle;

use crate::context::HeadlessContext;

impl HeadlessContext {
    /// Builds the fixed-function render pass: one subpass over a color
    /// and a depth attachment.
    ///
    /// The color attachment ends the pass ready for transfer reads so
    /// the capture copy needs no extra transition. Both external
    /// dependencies are scoped by region.
    ///
    /// No-op in dynamic-rendering mode.
    pub fn create_render_pass(&mut self) {
        if self.use_dynamic_rendering() {
            return;
        }

        if self.render_pass != vk::RenderPass::null() {
            unsafe {
                self.device()
                    .ash_handle()
                    .destroy_render_pass(self.render_pass, None);
            }
        }

        let attachments = [
            vk::AttachmentDescription::default()
                .format(self.color_format())
                .samples(vk::SampleCountFlags::TYPE_1)
                .load_op(vk::AttachmentLoadOp::CLEAR)
                .store_op(vk::AttachmentStoreOp::STORE)
                .initial_layout(vk::ImageLayout::UNDEFINED)
                .final_layout(vk::ImageLayout::TRANSFER_SRC_OPTIMAL),
            vk::AttachmentDescription::default()
                .format(self.depth_format())
                .samples(vk::SampleCountFlags::TYPE_1)
                .load_op(vk::AttachmentLoadOp::CLEAR)
                .stencil_load_op(vk::AttachmentLoadOp::CLEAR)
                .initial_layout(vk::ImageLayout::UNDEFINED)
                .final_layout(vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL),
        ];

        let color_reference = [vk::AttachmentReference {
            attachment: 0,
            layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
        }];
        let depth_reference = vk::AttachmentReference {
            attachment: 1,
            layout: vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
        };

        let subpass = [vk::SubpassDescription::default()
            .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
            .color_attachments(&color_reference)
            .depth_stencil_attachment(&depth_reference)];

        // Order all prior external work before our color writes, and
        // our color writes before any subsequent external read.
        let dependencies = [
            vk::SubpassDependency {
                src_subpass: vk::SUBPASS_EXTERNAL,
                dst_subpass: 0,
                src_stage_mask: vk::PipelineStageFlags::BOTTOM_OF_PIPE,
                dst_stage_mask: vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
                src_access_mask: vk::AccessFlags::MEMORY_READ,
                dst_access_mask: vk::AccessFlags::COLOR_ATTACHMENT_READ
                    | vk::AccessFlags::COLOR_ATTACHMENT_WRITE,
                dependency_flags: vk::DependencyFlags::BY_REGION,
            },
            vk::SubpassDependency {
                src_subpass: 0,
                dst_subpass: vk::SUBPASS_EXTERNAL,
                src_stage_mask: vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
                dst_stage_mask: vk::PipelineStageFlags::BOTTOM_OF_PIPE,
                src_access_mask: vk::AccessFlags::COLOR_ATTACHMENT_READ
                    | vk::AccessFlags::COLOR_ATTACHMENT_WRITE,
                dst_access_mask: vk::AccessFlags::MEMORY_READ,
                dependency_flags: vk::DependencyFlags::BY_REGION,
            },
        ];

        let create_info = vk::RenderPassCreateInfo::default()
            .attachments(&attachments)
            .subpasses(&subpass)
            .dependencies(&dependencies);

        self.render_pass = unsafe {
            self.device()
                .ash_handle()
                .create_render_pass(&create_info, None)
        }
        .unwrap();
    }

    /// Rebuilds the framebuffer over the current color and depth
    /// views. Must be called after both targets and the render pass
    /// exist; any previous framebuffer is destroyed first.
    ///
    /// No-op in dynamic-rendering mode.
    pub fn create_framebuffer(&mut self) {
        if self.use_dynamic_rendering() {
            return;
        }

        if self.framebuffer != vk::Framebuffer::null() {
            unsafe {
                self.device()
                    .ash_handle()
                    .destroy_framebuffer(self.framebuffer, None);
            }
        }

        let attachments = [self.color.view(), self.depth.view()];
        let size = self.size();

        let create_info = vk::FramebufferCreateInfo::default()
            .render_pass(self.render_pass)
            .attachments(&attachments)
            .width(size.width)
            .height(size.height)
            .layers(1);

        self.framebuffer = unsafe {
            self.device()
                .ash_handle()
                .create_framebuffer(&create_info, None)
        }
        .unwrap();
    }
}
