//! Pipeline lifecycle and hot reload.
//!
//! The active pipeline lives behind a single `Arc` that the render loop
//! snapshots once per frame. Reloads build a complete replacement outside
//! the lock and then swap the reference, so a frame only ever sees the old
//! pipeline or the new one.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use easl_core::{ContentHash, EaslError, EaslResult, RunSettings};
use easl_lang::CompiledShader;
use parking_lot::{Mutex, RwLock};

use crate::config::{RunConfig, RunOptions};

/// Values bound to the two built-in uniforms each frame.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct FrameUniforms {
    pub resolution: [f32; 2],
    pub time: f32,
    pub _pad: f32,
}

/// The graphics capability the runner drives.
///
/// The runner serializes every call into the device, so a pipeline build on
/// a watcher thread never overlaps a frame. Backends whose error reporting
/// is device-wide (wgpu error scopes) rely on that.
pub trait GraphicsDevice: Send + Sync {
    type Pipeline: Send + Sync;

    /// Build a render pipeline from WGSL text bound to the given entries.
    fn create_pipeline(&self, wgsl: &str, config: &RunConfig) -> EaslResult<Self::Pipeline>;

    /// Draw one frame. With no pipeline the frame is only cleared.
    fn draw(&self, pipeline: Option<&Self::Pipeline>, vertex_count: u32, uniforms: &FrameUniforms) -> EaslResult<()>;

    fn resize(&self, _width: u32, _height: u32) {}
}

/// A built pipeline and the parameters it was built with.
pub struct PipelineHandle<P> {
    pub pipeline: P,
    pub config: RunConfig,
    pub source_hash: ContentHash,
    /// Increases by one for every successful install.
    pub generation: u64,
}

pub struct Runner<D: GraphicsDevice> {
    device: D,
    settings: RunSettings,
    active: RwLock<Option<Arc<PipelineHandle<D::Pipeline>>>>,
    /// Held for the duration of every device call.
    device_lock: Mutex<()>,
    alive: AtomicBool,
    generation: AtomicU64,
    started: Instant,
}

impl<D: GraphicsDevice> Runner<D> {
    pub fn new(device: D, settings: RunSettings) -> Self {
        Self {
            device,
            settings,
            active: RwLock::new(None),
            device_lock: Mutex::new(()),
            alive: AtomicBool::new(true),
            generation: AtomicU64::new(0),
            started: Instant::now(),
        }
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn settings(&self) -> &RunSettings {
        &self.settings
    }

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    /// Build and install the first pipeline.
    pub fn initialize(&self, shader: &CompiledShader, options: &RunOptions) -> EaslResult<u64> {
        let generation = self.install(shader, options)?;
        tracing::info!("pipeline initialized (generation {})", generation);
        Ok(generation)
    }

    /// Replace the active pipeline with one built from `shader`.
    ///
    /// On any failure the previous pipeline stays active.
    pub fn reload(&self, shader: &CompiledShader, options: &RunOptions) -> EaslResult<u64> {
        match self.install(shader, options) {
            Ok(generation) => {
                tracing::info!("pipeline swapped (generation {})", generation);
                Ok(generation)
            }
            Err(err) => {
                tracing::warn!("reload rejected, keeping previous pipeline: {}", err);
                Err(err)
            }
        }
    }

    fn install(&self, shader: &CompiledShader, options: &RunOptions) -> EaslResult<u64> {
        if !self.is_alive() {
            return Err(EaslError::runner("runner has shut down"));
        }
        let config = options.resolve(shader, &self.settings)?;
        let pipeline = {
            let _device = self.device_lock.lock();
            self.device.create_pipeline(&shader.wgsl, &config)?
        };

        let mut slot = self.active.write();
        // Checked under the swap lock so shutdown cannot interleave.
        if !self.is_alive() {
            return Err(EaslError::runner("runner shut down while the pipeline was being built"));
        }
        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        *slot = Some(Arc::new(PipelineHandle {
            pipeline,
            config,
            source_hash: shader.source_hash,
            generation,
        }));
        Ok(generation)
    }

    /// Snapshot of the pipeline currently in use.
    pub fn current(&self) -> Option<Arc<PipelineHandle<D::Pipeline>>> {
        self.active.read().clone()
    }

    pub fn elapsed_seconds(&self) -> f32 {
        self.started.elapsed().as_secs_f32()
    }

    /// Render one frame with the current pipeline snapshot.
    pub fn frame(&self, width: u32, height: u32) -> EaslResult<()> {
        if !self.is_alive() {
            return Ok(());
        }
        let handle = self.current();
        let uniforms = FrameUniforms {
            resolution: [width as f32, height as f32],
            time: self.elapsed_seconds(),
            _pad: 0.0,
        };
        let _device = self.device_lock.lock();
        match &handle {
            Some(handle) => self
                .device
                .draw(Some(&handle.pipeline), handle.config.vertex_count(), &uniforms),
            None => self.device.draw(None, 0, &uniforms),
        }
    }

    /// Forward a window resize to the device.
    pub fn resize(&self, width: u32, height: u32) {
        let _device = self.device_lock.lock();
        self.device.resize(width, height);
    }

    /// Stop accepting reloads and release the active pipeline.
    pub fn shutdown(&self) {
        let mut slot = self.active.write();
        self.alive.store(false, Ordering::Release);
        *slot = None;
        tracing::debug!("runner shut down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct RecordingDevice {
        draws: Mutex<Vec<(Option<String>, u32)>>,
    }

    impl GraphicsDevice for RecordingDevice {
        type Pipeline = String;

        fn create_pipeline(&self, wgsl: &str, config: &RunConfig) -> EaslResult<String> {
            Ok(format!("{}:{}:{}", config.entries.vertex, config.entries.fragment, wgsl.len()))
        }

        fn draw(&self, pipeline: Option<&String>, vertex_count: u32, _uniforms: &FrameUniforms) -> EaslResult<()> {
            self.draws.lock().push((pipeline.cloned(), vertex_count));
            Ok(())
        }
    }

    const SHADER: &str = "(def triangles: u32 2)\n\
                          (defn vertex vert [] vec4f (vec4f 0.0 0.0 0.0 1.0))\n\
                          (defn fragment frag [] vec4f (vec4f 1.0 0.0 0.0 1.0))";

    #[test]
    fn test_frame_without_pipeline_clears() {
        let runner = Runner::new(RecordingDevice::default(), RunSettings::default());
        runner.frame(10, 10).unwrap();
        assert_eq!(runner.device().draws.lock()[0], (None, 0));
    }

    #[test]
    fn test_initialize_then_draw() {
        let runner = Runner::new(RecordingDevice::default(), RunSettings::default());
        let shader = easl_lang::compile(SHADER).unwrap();
        assert_eq!(runner.initialize(&shader, &RunOptions::default()).unwrap(), 1);
        runner.frame(640, 480).unwrap();
        let draws = runner.device().draws.lock();
        assert_eq!(draws[0].1, 6);
        assert!(draws[0].0.as_deref().unwrap().starts_with("vert:frag:"));
    }

    #[test]
    fn test_reload_after_shutdown_refused() {
        let runner = Runner::new(RecordingDevice::default(), RunSettings::default());
        let shader = easl_lang::compile(SHADER).unwrap();
        runner.initialize(&shader, &RunOptions::default()).unwrap();
        runner.shutdown();
        assert!(runner.current().is_none());
        assert!(matches!(
            runner.reload(&shader, &RunOptions::default()),
            Err(EaslError::Runner(_))
        ));
    }

    #[test]
    fn test_uniforms_layout() {
        assert_eq!(std::mem::size_of::<FrameUniforms>(), 16);
    }
}
