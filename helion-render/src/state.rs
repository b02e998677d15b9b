use ash::vk;
use bytemuck::{Pod, Zeroable};

/// Frame counter value that restarts progressive accumulation.
pub const RESET_FRAME: i32 = -1;

/// Push-constant block shared with the ray-tracing shaders.
///
/// Layout matches the shader-side declaration; keep field order and
/// padding in sync.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct RtxState {
    pub frame: i32,
    pub max_depth: u32,
    pub max_samples: u32,
    pub firefly_clamp_threshold: f32,
    pub hdr_multiplier: f32,
    pub debugging_mode: u32,
    pub pbr_mode: u32,
    pub _pad0: u32,
    pub size: [u32; 2],
    pub min_heatmap: u32,
    pub max_heatmap: u32,
}

impl Default for RtxState {
    fn default() -> Self {
        Self {
            frame: 0,
            max_depth: 10,
            max_samples: 1,
            firefly_clamp_threshold: 1.0,
            hdr_multiplier: 1.0,
            debugging_mode: 0,
            pbr_mode: 0,
            _pad0: 0,
            size: [0, 0],
            min_heatmap: 0,
            max_heatmap: 65000,
        }
    }
}

/// Host-side per-frame settings: the push-constant state plus the
/// render region and descaling controls.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameState {
    pub rtx: RtxState,
    pub render_region: vk::Rect2D,
    pub max_frames: i32,
    pub descaling: bool,
    pub descaling_level: u32,
}

impl Default for FrameState {
    fn default() -> Self {
        Self {
            rtx: RtxState::default(),
            render_region: vk::Rect2D::default(),
            max_frames: 100_000,
            descaling: false,
            descaling_level: 1,
        }
    }
}

impl FrameState {
    /// Restarts progressive accumulation on the next frame.
    pub fn reset_frame(&mut self) {
        self.rtx.frame = RESET_FRAME;
    }

    /// Sets the region of the output the renderer writes to.
    ///
    /// Accumulation restarts only when the region actually changes.
    pub fn set_render_region(&mut self, region: vk::Rect2D) {
        if self.render_region != region {
            self.reset_frame();
        }
        self.render_region = region;
    }

    /// Sets the per-frame sample budget the shaders accumulate. Goes
    /// out in the push-constant block; the frame cutoff is separate.
    pub fn set_sample_budget(&mut self, samples: u32) {
        self.rtx.max_samples = samples;
    }

    /// The extent the backend renders at, after descaling.
    pub fn render_extent(&self) -> vk::Extent2D {
        let extent = self.render_region.extent;
        if self.descaling {
            vk::Extent2D {
                width: extent.width / self.descaling_level,
                height: extent.height / self.descaling_level,
            }
        } else {
            extent
        }
    }

    /// Whether the requested sample budget has been reached.
    pub fn is_done(&self) -> bool {
        self.rtx.frame >= self.max_frames
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn region(x: i32, y: i32, width: u32, height: u32) -> vk::Rect2D {
        vk::Rect2D {
            offset: vk::Offset2D { x, y },
            extent: vk::Extent2D { width, height },
        }
    }

    #[test]
    fn changed_region_resets_frame() {
        let mut state = FrameState::default();
        state.rtx.frame = 42;

        state.set_render_region(region(0, 0, 640, 480));
        assert_eq!(state.rtx.frame, RESET_FRAME);
        assert_eq!(state.render_region, region(0, 0, 640, 480));
    }

    #[test]
    fn unchanged_region_keeps_frame() {
        let mut state = FrameState::default();
        state.set_render_region(region(0, 0, 640, 480));

        state.rtx.frame = 7;
        state.set_render_region(region(0, 0, 640, 480));
        assert_eq!(state.rtx.frame, 7);
    }

    #[test]
    fn offset_change_alone_resets_frame() {
        let mut state = FrameState::default();
        state.set_render_region(region(0, 0, 640, 480));

        state.rtx.frame = 7;
        state.set_render_region(region(16, 0, 640, 480));
        assert_eq!(state.rtx.frame, RESET_FRAME);
    }

    #[test]
    fn sample_budget_feeds_push_constants_not_frame_cutoff() {
        let mut state = FrameState::default();
        state.set_sample_budget(64);

        assert_eq!(state.rtx.max_samples, 64);
        assert_eq!(state.max_frames, 100_000);
    }

    #[test]
    fn descaling_divides_render_extent() {
        let mut state = FrameState::default();
        state.set_render_region(region(0, 0, 640, 480));
        state.descaling = true;
        state.descaling_level = 2;

        assert_eq!(
            state.render_extent(),
            vk::Extent2D {
                width: 320,
                height: 240
            }
        );
    }
}
