use std::sync::Arc;

use ash::vk;
use helion_rhi::{AshHandle, device::Device};

use crate::{profiler::Profiler, renderer::Renderer, scene::Scene, state::RtxState};

/// Shader-binding-table regions for a ray-tracing pipeline dispatch.
#[derive(Default, Clone, Copy)]
pub struct ShaderBindingTable {
    pub raygen: vk::StridedDeviceAddressRegionKHR,
    pub miss: vk::StridedDeviceAddressRegionKHR,
    pub hit: vk::StridedDeviceAddressRegionKHR,
    pub callable: vk::StridedDeviceAddressRegionKHR,
}

/// Backend dispatching through a VK_KHR_ray_tracing_pipeline
/// pipeline.
///
/// The pipeline and shader-binding table come from the shader
/// toolchain via [`install_pipeline`](Self::install_pipeline); this
/// type owns their lifetime and the dispatch recording.
#[derive(Default)]
pub struct RtxPipeline {
    device: Option<Arc<Device>>,
    pipeline_layout: vk::PipelineLayout,
    pipeline: vk::Pipeline,
    sbt: ShaderBindingTable,
    push: RtxState,
}

impl RtxPipeline {
    const PUSH_STAGES: vk::ShaderStageFlags = vk::ShaderStageFlags::from_raw(
        vk::ShaderStageFlags::RAYGEN_KHR.as_raw()
            | vk::ShaderStageFlags::CLOSEST_HIT_KHR.as_raw()
            | vk::ShaderStageFlags::ANY_HIT_KHR.as_raw()
            | vk::ShaderStageFlags::MISS_KHR.as_raw(),
    );

    /// Adopts a compiled ray-tracing pipeline and its binding table.
    /// Ownership transfers to this backend; both are released on
    /// `destroy`.
    pub fn install_pipeline(&mut self, pipeline: vk::Pipeline, sbt: ShaderBindingTable) {
        self.pipeline = pipeline;
        self.sbt = sbt;
    }

    fn device(&self) -> &Arc<Device> {
        self.device.as_ref().expect("backend not set up")
    }
}

impl Renderer for RtxPipeline {
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
            stage_flags: Self::PUSH_STAGES,
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
            "rtx pipeline backend created at {}x{}",
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
        let _section = profiler.time_section("rtx pipeline");
        let device = Arc::clone(self.device());

        unsafe {
            device.ash_handle().cmd_push_constants(
                command_buffer,
                self.pipeline_layout,
                Self::PUSH_STAGES,
                0,
                bytemuck::bytes_of(&self.push),
            );

            if self.pipeline == vk::Pipeline::null() {
                // No compiled pipeline installed; nothing to trace.
                return;
            }

            device.ash_handle().cmd_bind_pipeline(
                command_buffer,
                vk::PipelineBindPoint::RAY_TRACING_KHR,
                self.pipeline,
            );
            device.ash_handle().cmd_bind_descriptor_sets(
                command_buffer,
                vk::PipelineBindPoint::RAY_TRACING_KHR,
                self.pipeline_layout,
                0,
                descriptor_sets,
                &[],
            );

            let loader = ash::khr::ray_tracing_pipeline::Device::new(
                device.instance().ash_handle(),
                device.ash_handle(),
            );
            loader.cmd_trace_rays(
                command_buffer,
                &self.sbt.raygen,
                &self.sbt.miss,
                &self.sbt.hit,
                &self.sbt.callable,
                size.width,
                size.height,
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
        "pipeline-based ray tracing"
    }
}
