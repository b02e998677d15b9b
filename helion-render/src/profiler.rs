use std::time::Instant;

/// Wall-clock section timer for the per-frame pipeline.
///
/// Submission is synchronous in this harness, so host-side timing
/// around a section brackets the GPU work it submitted.
#[derive(Default)]
pub struct Profiler {
    frame_start: Option<Instant>,
}

impl Profiler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin_frame(&mut self) {
        self.frame_start = Some(Instant::now());
    }

    pub fn end_frame(&mut self) {
        if let Some(start) = self.frame_start.take() {
            log::info!("frame: {:.2} ms", start.elapsed().as_secs_f64() * 1e3);
        }
    }

    /// Times a named section; the elapsed time is logged when the
    /// returned guard drops.
    pub fn time_section(&mut self, name: &'static str) -> Section {
        Section {
            name,
            start: Instant::now(),
        }
    }
}

pub struct Section {
    name: &'static str,
    start: Instant,
}

impl Drop for Section {
    fn drop(&mut self) {
        log::debug!(
            "{}: {:.2} ms",
            self.name,
            self.start.elapsed().as_secs_f64() * 1e3
        );
    }
}
