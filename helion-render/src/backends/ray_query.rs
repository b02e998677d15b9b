use std::sync::Arc;

use ash::vk;
use helion_rhi::{AshHandle, device::Device};

use crate::{profiler::Profiler, renderer::Renderer, scene::Scene, state::RtxState};

const WORKGROUP_SIZE: u32 = 8;

/// Backend tracing rays inline from a compute shader with
/// VK_KHR_ray_query.
///
/// The compute pipeline comes from the shader toolchain via
/// [`install_pipeline`](Self::install_pipeline).
#[derive(Default)]
pub struct RayQuery {
    device: Option<Arc<Device>>,
    pipeline_layout: vk::PipelineLayout,
    pipeline: vk::Pipeline,
    push: RtxState,
}

impl RayQuery {
    /// Adopts a compiled compute pipeline; released on `destroy`.
    pub fn install_pipeline(&mut self, pipeline: vk::Pipeline) {
        self.pipeline = pipeline;
    }

    fn device(&self) -> &Arc<Device> {
        self.device.as_ref().expect("backend not set up")
    }
}

impl Renderer for RayQuery {
    fn setup(&mut self, device: &Arc<Device>, _queue_family_index: u32) {
        self.device = Some(Arc::clone(device));
    }

    fn create(
        &mut self,
        size: vk::Extent2D,
        descriptor_set_layouts: &[vk::DescriptorSetLayout],
        _scene: &Scene,
    ) {
        let device = Arc::clone(self.device());

        let push_constant_ranges = [vk::PushConstantRange {
            stage_flags: vk::ShaderStageFlags::COMPUTE,
            offset: 0,
            size: std::mem::size_of::<RtxState>() as u32,
        }];

        let layout_create_info = vk::PipelineLayoutCreateInfo::default()
            .set_layouts(descriptor_set_layouts)
            .push_constant_ranges(&push_constant_ranges);

        self.pipeline_layout = unsafe {
            device
                .ash_handle()
                .create_pipeline_layout(&layout_create_info, None)
        }
        .unwrap();

        log::debug!(
            "ray query backend created at {}x{}",
            size.width,
            size.height
        );
    }

    fn set_push_constants(&mut self, state: RtxState) {
        self.push = state;
    }

    fn run(
        &mut self,
        command_buffer: vk::CommandBuffer,
        size: vk::Extent2D,
        profiler: &mut Profiler,
        descriptor_sets: &[vk::DescriptorSet],
    ) {
        let _section = profiler.time_section("ray query");
        let device = Arc::clone(self.device());

        unsafe {
            device.ash_handle().cmd_push_constants(
                command_buffer,
                self.pipeline_layout,
                vk::ShaderStageFlags::COMPUTE,
                0,
                bytemuck::bytes_of(&self.push),
            );

            if self.pipeline == vk::Pipeline::null() {
                return;
            }

            device.ash_handle().cmd_bind_pipeline(
                command_buffer,
                vk::PipelineBindPoint::COMPUTE,
                self.pipeline,
            );
            device.ash_handle().cmd_bind_descriptor_sets(
                command_buffer,
                vk::PipelineBindPoint::COMPUTE,
                self.pipeline_layout,
                0,
                descriptor_sets,
                &[],
            );
            device.ash_handle().cmd_dispatch(
                command_buffer,
                size.width.div_ceil(WORKGROUP_SIZE),
                size.height.div_ceil(WORKGROUP_SIZE),
                1,
            );
        }
    }

    fn destroy(&mut self) {
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

    fn name(&self) -> &'static str {
        "inline ray-query ray tracing"
    }
}
