use std::sync::Arc;

use ash::vk;
use helion_rhi::device::Device;

use crate::{profiler::Profiler, scene::Scene, state::RtxState};

/// A swappable ray-tracing backend.
///
/// Backends are interchangeable from the orchestrator's point of
/// view; construction and destruction happen only through
/// [`RendererSwitch`].
pub trait Renderer {
    fn setup(&mut self, device: &Arc<Device>, queue_family_index: u32);

    fn create(
        &mut self,
        size: vk::Extent2D,
        descriptor_set_layouts: &[vk::DescriptorSetLayout],
        scene: &Scene,
    );

    fn set_push_constants(&mut self, state: RtxState);

    fn run(
        &mut self,
        command_buffer: vk::CommandBuffer,
        size: vk::Extent2D,
        profiler: &mut Profiler,
        descriptor_sets: &[vk::DescriptorSet],
    );

    fn destroy(&mut self);

    fn name(&self) -> &'static str;
}

/// The closed set of backend kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderMethod {
    RtxPipeline = 0,
    RayQuery = 1,
}

/// Holds every backend and tracks which one is active.
///
/// Exactly one backend is constructed at a time; switching destroys
/// the previous backend before the new one is created, and never
/// while the device is executing prior work.
pub struct RendererSwitch {
    renderers: [Box<dyn Renderer>; 2],
    active: Option<RenderMethod>,
}

impl RendererSwitch {
    pub fn new(rtx_pipeline: Box<dyn Renderer>, ray_query: Box<dyn Renderer>) -> Self {
        Self {
            renderers: [rtx_pipeline, ray_query],
            active: None,
        }
    }

    pub fn setup(&mut self, device: &Arc<Device>, queue_family_index: u32) {
        for renderer in &mut self.renderers {
            renderer.setup(device, queue_family_index);
        }
    }

    pub fn active_method(&self) -> Option<RenderMethod> {
        self.active
    }

    /// The active backend. Panics if no method has been selected.
    pub fn active(&mut self) -> &mut dyn Renderer {
        let method = self.active.expect("no renderer selected");
        &mut *self.renderers[method as usize]
    }

    /// Switches to `method`.
    ///
    /// A no-op when `method` is already active. Otherwise the device
    /// is drained via `wait_idle`, the previous backend (if any) is
    /// destroyed, and only then is the new one created.
    pub fn create_render(
        &mut self,
        method: RenderMethod,
        wait_idle: impl FnOnce(),
        size: vk::Extent2D,
        descriptor_set_layouts: &[vk::DescriptorSetLayout],
        scene: &Scene,
    ) {
        if self.active == Some(method) {
            return;
        }

        log::info!(
            "switching renderer from {:?} to {:?}",
            self.active,
            method
        );

        if let Some(previous) = self.active {
            wait_idle();
            self.renderers[previous as usize].destroy();
        }
        self.active = Some(method);
        self.renderers[method as usize].create(size, descriptor_set_layouts, scene);
    }

    /// Destroys the active backend, if any, without selecting a new
    /// one. The caller must have drained the device first.
    pub fn destroy_active(&mut self) {
        if let Some(method) = self.active.take() {
            self.renderers[method as usize].destroy();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{cell::RefCell, rc::Rc};

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Event {
        WaitIdle,
        Create(&'static str),
        Destroy(&'static str),
    }

    struct Recorder {
        name: &'static str,
        log: Rc<RefCell<Vec<Event>>>,
        alive: bool,
    }

    impl Renderer for Recorder {
        fn setup(&mut self, _device: &Arc<Device>, _queue_family_index: u32) {}

        fn create(
            &mut self,
            _size: vk::Extent2D,
            _layouts: &[vk::DescriptorSetLayout],
            _scene: &Scene,
        ) {
            assert!(!self.alive, "backend created twice");
            self.alive = true;
            self.log.borrow_mut().push(Event::Create(self.name));
        }

        fn set_push_constants(&mut self, _state: RtxState) {}

        fn run(
            &mut self,
            _command_buffer: vk::CommandBuffer,
            _size: vk::Extent2D,
            _profiler: &mut Profiler,
            _descriptor_sets: &[vk::DescriptorSet],
        ) {
            assert!(self.alive, "run on a destroyed backend");
        }

        fn destroy(&mut self) {
            self.alive = false;
            self.log.borrow_mut().push(Event::Destroy(self.name));
        }

        fn name(&self) -> &'static str {
            self.name
        }
    }

    fn switch_with_log() -> (RendererSwitch, Rc<RefCell<Vec<Event>>>) {
        let log = Rc::new(RefCell::new(Vec::new()));
        let switch = RendererSwitch::new(
            Box::new(Recorder {
                name: "rtx",
                log: Rc::clone(&log),
                alive: false,
            }),
            Box::new(Recorder {
                name: "query",
                log: Rc::clone(&log),
                alive: false,
            }),
        );
        (switch, log)
    }

    fn select(switch: &mut RendererSwitch, log: &Rc<RefCell<Vec<Event>>>, method: RenderMethod) {
        let wait_log = Rc::clone(log);
        switch.create_render(
            method,
            move || wait_log.borrow_mut().push(Event::WaitIdle),
            vk::Extent2D {
                width: 64,
                height: 64,
            },
            &[],
            &Scene::default(),
        );
    }

    #[test]
    fn first_selection_creates_without_waiting() {
        let (mut switch, log) = switch_with_log();

        select(&mut switch, &log, RenderMethod::RtxPipeline);

        assert_eq!(*log.borrow(), vec![Event::Create("rtx")]);
        assert_eq!(switch.active_method(), Some(RenderMethod::RtxPipeline));
    }

    #[test]
    fn same_method_is_a_noop() {
        let (mut switch, log) = switch_with_log();

        select(&mut switch, &log, RenderMethod::RtxPipeline);
        select(&mut switch, &log, RenderMethod::RtxPipeline);

        assert_eq!(*log.borrow(), vec![Event::Create("rtx")]);
    }

    #[test]
    fn switch_drains_then_destroys_then_creates() {
        let (mut switch, log) = switch_with_log();

        select(&mut switch, &log, RenderMethod::RtxPipeline);
        select(&mut switch, &log, RenderMethod::RayQuery);

        assert_eq!(
            *log.borrow(),
            vec![
                Event::Create("rtx"),
                Event::WaitIdle,
                Event::Destroy("rtx"),
                Event::Create("query"),
            ]
        );
        assert_eq!(switch.active_method(), Some(RenderMethod::RayQuery));
    }

    #[test]
    fn destroy_active_clears_selection() {
        let (mut switch, log) = switch_with_log();

        select(&mut switch, &log, RenderMethod::RayQuery);
        switch.destroy_active();

        assert_eq!(switch.active_method(), None);
        assert_eq!(
            *log.borrow(),
            vec![Event::Create("query"), Event::Destroy("query")]
        );
    }
}
