pub mod accel;
pub mod backends;
pub mod capture;
pub mod context;
pub mod environment;
pub mod offscreen;
pub mod pass;
pub mod profiler;
pub mod renderer;
pub mod sample;
pub mod scene;
pub mod state;
pub mod target;
