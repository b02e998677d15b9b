use std::sync::Arc;

use ash::vk;
use helion_rhi::{AshHandle, device::Device};

/// The tonemap/composite stage.
///
/// Owns the descriptor layout/set pair exposing the ray-tracing
/// output image to both the backends and the fullscreen tonemap
/// draw. The graphics pipeline itself comes from the shader toolchain
/// via [`install_pipeline`](Self::install_pipeline).
#[derive(Default)]
pub struct Offscreen {
    device: Option<Arc<Device>>,
    pipeline_layout: vk::PipelineLayout,
    pipeline: vk::Pipeline,
    descriptor_set_layout: vk::DescriptorSetLayout,
    descriptor_set: vk::DescriptorSet,
}

impl Offscreen {
    pub fn setup(&mut self, device: &Arc<Device>) {
        self.device = Some(Arc::clone(device));
    }

    /// Builds the pipeline layout over the stage's descriptor layout.
    pub fn create(&mut self) {
        let device = Arc::clone(self.device());

        let set_layouts = [self.descriptor_set_layout];
        let create_info = vk::PipelineLayoutCreateInfo::default().set_layouts(&set_layouts);

        self.pipeline_layout = unsafe {
            device
                .ash_handle()
                .create_pipeline_layout(&create_info, None)
        }
        .unwrap();
    }

    /// Adopts a compiled tonemap pipeline; released on `destroy`.
    pub fn install_pipeline(&mut self, pipeline: vk::Pipeline) {
        self.pipeline = pipeline;
    }

    /// Whether a tonemap pipeline has been installed.
    pub fn is_ready(&self) -> bool {
        self.pipeline != vk::Pipeline::null()
    }

    pub fn descriptor_set_layout(&self) -> vk::DescriptorSetLayout {
        self.descriptor_set_layout
    }

    pub fn descriptor_set(&self) -> vk::DescriptorSet {
        self.descriptor_set
    }

    /// Records the fullscreen tonemap draw over the accumulated
    /// output image. Nothing is recorded until a pipeline has been
    /// installed.
    pub fn run(&self, command_buffer: vk::CommandBuffer) {
        if !self.is_ready() {
            return;
        }
        let device = self.device();

        unsafe {
            device.ash_handle().cmd_bind_pipeline(
                command_buffer,
                vk::PipelineBindPoint::GRAPHICS,
                self.pipeline,
            );
            device.ash_handle().cmd_bind_descriptor_sets(
                command_buffer,
                vk::PipelineBindPoint::GRAPHICS,
                self.pipeline_layout,
                0,
                &[self.descriptor_set],
                &[],
            );
            device.ash_handle().cmd_draw(command_buffer, 3, 1, 0, 0);
        }
    }

    pub fn destroy(&mut self) {
        let Some(device) = self.device.clone() else {
            return;
        };

        unsafe {
            if self.pipeline != vk::Pipeline::null() {
                device.ash_handle().destroy_pipeline(self.pipeline, None);
                self.pipeline = vk::Pipeline::null();
            }
            if self.pipeline_layout != vk::PipelineLayout::null() {
                device
                    .ash_handle()
                    .destroy_pipeline_layout(self.pipeline_layout, None);
                self.pipeline_layout = vk::PipelineLayout::null();
            }
        }
    }

    fn device(&self) -> &Arc<Device> {
        self.device.as_ref().expect("offscreen stage not set up")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ash::vk::Handle;

    #[test]
    fn run_without_pipeline_records_nothing() {
        // Must return before touching the device, which is absent here.
        let offscreen = Offscreen::default();
        offscreen.run(vk::CommandBuffer::null());
    }

    #[test]
    fn installed_pipeline_makes_the_stage_ready() {
        let mut offscreen = Offscreen::default();
        assert!(!offscreen.is_ready());

        offscreen.install_pipeline(vk::Pipeline::from_raw(0x1));
        assert!(offscreen.is_ready());
    }

    #[test]
    fn destroy_without_setup_is_a_noop() {
        let mut offscreen = Offscreen::default();
        offscreen.destroy();
        offscreen.destroy();
    }
}
