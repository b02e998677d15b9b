use std::{path::Path, sync::Arc};

use ash::vk;

use crate::{
    accel::AccelStructure,
    capture::{self, CaptureError},
    context::HeadlessContext,
    environment::HdrEnvironment,
    offscreen::Offscreen,
    profiler::Profiler,
    renderer::{RenderMethod, RendererSwitch},
    scene::{AssetError, Scene},
    state::FrameState,
};

/// Samples hardware counters (temperature, clocks, utilization) once
/// per frame. Purely observational; rendering proceeds identically
/// with or without one installed.
pub trait HardwareMonitor {
    fn refresh(&mut self);
}

/// Firefly suppression scales with the total energy of the
/// environment map.
fn firefly_clamp_threshold(environment_integral: f32) -> f32 {
    environment_integral * 4.0
}

fn method_supported(method: RenderMethod, support_ray_query: bool) -> bool {
    method != RenderMethod::RayQuery || support_ray_query
}

/// The path-tracing harness: owns the headless context, the scene and
/// environment assets, the acceleration structures and the backend
/// switch, and drives them through one or more progressive frames.
pub struct SampleApp {
    context: HeadlessContext,
    scene: Scene,
    accel: AccelStructure,
    skydome: HdrEnvironment,
    offscreen: Offscreen,
    renderers: RendererSwitch,
    frame: FrameState,
    profiler: Profiler,
    monitor: Option<Box<dyn HardwareMonitor>>,
    support_ray_query: bool,
}

impl SampleApp {
    pub fn new(
        context: HeadlessContext,
        mut renderers: RendererSwitch,
        support_ray_query: bool,
    ) -> Self {
        let device = Arc::clone(context.device());
        let queue_family_index = context.queue_family_index();

        renderers.setup(&device, queue_family_index);

        let mut accel = AccelStructure::default();
        accel.setup(&device, queue_family_index);

        let mut offscreen = Offscreen::default();
        offscreen.setup(&device);
        offscreen.create();

        Self {
            context,
            scene: Scene::default(),
            accel,
            skydome: HdrEnvironment::default(),
            offscreen,
            renderers,
            frame: FrameState::default(),
            profiler: Profiler::default(),
            monitor: None,
            support_ray_query,
        }
    }

    /// Installs an optional hardware monitor, refreshed once per
    /// rendered frame.
    pub fn set_hardware_monitor(&mut self, monitor: Option<Box<dyn HardwareMonitor>>) {
        self.monitor = monitor;
    }

    /// Loads the scene and builds its acceleration structures, then
    /// restarts accumulation.
    pub fn load_scene(&mut self, path: &Path) -> Result<(), AssetError> {
        self.scene.load(path)?;
        self.accel.create(
            &self.scene,
            self.scene.vertex_buffers(),
            self.scene.index_buffers(),
        );
        self.frame.reset_frame();
        Ok(())
    }

    /// Loads the HDR environment and derives the firefly clamp from
    /// its integral.
    pub fn load_environment_hdr(&mut self, path: &Path) -> Result<(), AssetError> {
        self.skydome.load_environment(path)?;
        self.frame.rtx.firefly_clamp_threshold =
            firefly_clamp_threshold(self.skydome.integral());
        Ok(())
    }

    /// Selects the rendering backend, draining the device and tearing
    /// down the previous backend first when one is active.
    ///
    /// Falls back to leaving the current backend in place when the
    /// device cannot run the requested method.
    pub fn create_render(&mut self, method: RenderMethod) {
        if !method_supported(method, self.support_ray_query) {
            log::warn!("{method:?} is not supported by this device, keeping current renderer");
            return;
        }

        let descriptor_set_layouts = [
            self.accel.descriptor_set_layout(),
            self.scene.descriptor_set_layout(),
            self.skydome.descriptor_set_layout(),
            self.offscreen.descriptor_set_layout(),
        ];

        let device = Arc::clone(self.context.device());
        self.renderers.create_render(
            method,
            move || device.wait_idle(),
            self.context.size(),
            &descriptor_set_layouts,
            &self.scene,
        );
    }

    /// Records the per-frame camera uniform update into the persistent
    /// command buffer.
    pub fn update_uniform_buffer(&mut self) {
        let extent = self.frame.render_region.extent;
        let aspect_ratio = extent.width as f32 / extent.height.max(1) as f32;
        self.scene
            .update_camera(self.context.command_buffer(), aspect_ratio);
    }

    /// Records one progressive frame into `command_buffer`.
    ///
    /// Advances the frame counter first; once the sample budget is
    /// reached nothing further is recorded.
    pub fn render_scene(&mut self, command_buffer: vk::CommandBuffer) {
        if let Some(monitor) = &mut self.monitor {
            monitor.refresh();
        }

        self.frame.rtx.frame += 1;
        if self.frame.is_done() {
            return;
        }

        let render_size = self.frame.render_extent();
        let full_size = self.context.size();
        self.frame.rtx.size = [full_size.width, full_size.height];

        let descriptor_sets = [
            self.accel.descriptor_set(),
            self.scene.descriptor_set(),
            self.skydome.descriptor_set(),
            self.offscreen.descriptor_set(),
        ];

        let renderer = self.renderers.active();
        renderer.set_push_constants(self.frame.rtx);
        renderer.run(
            command_buffer,
            render_size,
            &mut self.profiler,
            &descriptor_sets,
        );
    }

    /// Records the post pass at full output resolution: viewport,
    /// scissor and the fullscreen tonemap draw of the accumulated
    /// image.
    pub fn draw_post(&mut self, command_buffer: vk::CommandBuffer) {
        let _section = self.profiler.time_section("post");
        self.context.set_viewport(command_buffer);
        self.offscreen.run(command_buffer);
    }

    /// Exports the color target as a binary PPM. Call only after the
    /// submitted frame has fully executed.
    pub fn dump_image(&self, path: &Path) -> Result<(), CaptureError> {
        capture::dump_image(&self.context, path)
    }

    pub fn context(&self) -> &HeadlessContext {
        &self.context
    }

    pub fn context_mut(&mut self) -> &mut HeadlessContext {
        &mut self.context
    }

    pub fn frame(&self) -> &FrameState {
        &self.frame
    }

    pub fn frame_mut(&mut self) -> &mut FrameState {
        &mut self.frame
    }

    pub fn profiler_mut(&mut self) -> &mut Profiler {
        &mut self.profiler
    }

    /// The tonemap/composite stage, for installing the compiled post
    /// pipeline.
    pub fn offscreen_mut(&mut self) -> &mut Offscreen {
        &mut self.offscreen
    }

    pub fn active_method(&self) -> Option<RenderMethod> {
        self.renderers.active_method()
    }

    /// Tears down everything GPU-side in reverse creation order.
    pub fn destroy_resources(&mut self) {
        self.context.device().wait_idle();

        self.renderers.destroy_active();
        self.offscreen.destroy();
        self.accel.destroy();
        self.context.destroy();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn firefly_clamp_tracks_environment_energy() {
        assert_eq!(firefly_clamp_threshold(1.0), 4.0);
        assert_eq!(firefly_clamp_threshold(0.25), 1.0);
    }

    #[test]
    fn ray_query_requires_device_support() {
        assert!(method_supported(RenderMethod::RtxPipeline, false));
        assert!(method_supported(RenderMethod::RtxPipeline, true));
        assert!(!method_supported(RenderMethod::RayQuery, false));
        assert!(method_supported(RenderMethod::RayQuery, true));
    }
}
