//! # easl-render
//!
//! Runs compiled EASL shaders in a window and swaps in new pipelines on
//! reload. The runner is generic over a `GraphicsDevice`; the wgpu backend
//! and the winit window loop live in `gpu` and `window`.

pub mod config;
pub mod gpu;
pub mod runner;
pub mod window;

pub use config::{resolve_triangles, RunConfig, RunOptions, TRIANGLES_CONSTANT};
pub use gpu::WgpuDevice;
pub use runner::{FrameUniforms, GraphicsDevice, PipelineHandle, Runner};
pub use window::run_window;
