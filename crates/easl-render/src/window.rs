//! Window shell around the runner.

use std::sync::Arc;

use easl_core::{EaslError, EaslResult, RunSettings};
use easl_lang::CompiledShader;
use winit::application::ApplicationHandler;
use winit::dpi::{LogicalSize, PhysicalSize};
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, EventLoop};
use winit::window::{Window, WindowAttributes, WindowId};

use crate::config::RunOptions;
use crate::gpu::WgpuDevice;
use crate::runner::Runner;

type StartHook = Box<dyn FnOnce(Arc<Runner<WgpuDevice>>)>;

struct App {
    settings: RunSettings,
    shader: CompiledShader,
    options: RunOptions,
    on_start: Option<StartHook>,
    window: Option<Arc<Window>>,
    runner: Option<Arc<Runner<WgpuDevice>>>,
    error: Option<EaslError>,
}

impl App {
    fn start(&mut self, event_loop: &ActiveEventLoop) -> EaslResult<()> {
        let attributes = WindowAttributes::default()
            .with_title(self.settings.window_title.clone())
            .with_inner_size(LogicalSize::new(self.settings.width, self.settings.height));
        let window = event_loop
            .create_window(attributes)
            .map(Arc::new)
            .map_err(|e| EaslError::runner(format!("failed to create window: {}", e)))?;

        let device = WgpuDevice::new(window.clone(), &self.settings)?;
        let runner = Arc::new(Runner::new(device, self.settings.clone()));
        runner.initialize(&self.shader, &self.options)?;

        if let Some(hook) = self.on_start.take() {
            hook(runner.clone());
        }
        self.window = Some(window);
        self.runner = Some(runner);
        Ok(())
    }

    fn stop(&mut self, event_loop: &ActiveEventLoop) {
        if let Some(runner) = &self.runner {
            runner.shutdown();
        }
        event_loop.exit();
    }

    fn redraw(&mut self, event_loop: &ActiveEventLoop) {
        let (Some(window), Some(runner)) = (&self.window, &self.runner) else {
            return;
        };
        let PhysicalSize { width, height } = window.inner_size();
        if let Err(e) = runner.frame(width, height) {
            tracing::error!("frame failed: {}", e);
            self.error = Some(e);
            self.stop(event_loop);
        }
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }
        if let Err(e) = self.start(event_loop) {
            self.error = Some(e);
            self.stop(event_loop);
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, window_id: WindowId, event: WindowEvent) {
        if self.window.as_ref().map(|w| w.id()) != Some(window_id) {
            return;
        }
        match event {
            WindowEvent::CloseRequested => self.stop(event_loop),
            WindowEvent::Resized(size) => {
                if let Some(runner) = &self.runner {
                    runner.resize(size.width, size.height);
                }
            }
            WindowEvent::RedrawRequested => self.redraw(event_loop),
            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(window) = &self.window {
            window.request_redraw();
        }
    }
}

/// Open a window and render `shader` until the window is closed.
///
/// `on_start` receives the runner once the first pipeline is installed; a
/// watcher can hold on to it and call `Runner::reload`. The runner is shut
/// down before this returns.
pub fn run_window(
    settings: RunSettings,
    shader: CompiledShader,
    options: RunOptions,
    on_start: impl FnOnce(Arc<Runner<WgpuDevice>>) + 'static,
) -> EaslResult<()> {
    let event_loop = EventLoop::new().map_err(|e| EaslError::runner(format!("failed to create event loop: {}", e)))?;
    let mut app = App {
        settings,
        shader,
        options,
        on_start: Some(Box::new(on_start)),
        window: None,
        runner: None,
        error: None,
    };
    event_loop
        .run_app(&mut app)
        .map_err(|e| EaslError::runner(format!("event loop failed: {}", e)))?;

    if let Some(runner) = &app.runner {
        runner.shutdown();
    }
    match app.error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}
