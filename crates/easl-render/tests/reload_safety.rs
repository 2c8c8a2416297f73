use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use easl_core::{EaslError, EaslResult, RunSettings};
use easl_lang::{compile, CompiledShader};
use easl_render::{FrameUniforms, GraphicsDevice, RunConfig, RunOptions, Runner};
use parking_lot::Mutex;

/// Headless device whose pipelines are the WGSL text they were built from.
/// Shaders containing `fail_pipeline` are rejected, as a driver would reject
/// invalid WGSL.
#[derive(Default)]
struct MockDevice {
    built: AtomicUsize,
    frames: Mutex<Vec<(String, u32)>>,
}

impl GraphicsDevice for MockDevice {
    type Pipeline = String;

    fn create_pipeline(&self, wgsl: &str, _config: &RunConfig) -> EaslResult<String> {
        if wgsl.contains("fail_pipeline") {
            return Err(EaslError::runner("driver rejected shader"));
        }
        self.built.fetch_add(1, Ordering::SeqCst);
        Ok(wgsl.to_string())
    }

    fn draw(&self, pipeline: Option<&String>, vertex_count: u32, _uniforms: &FrameUniforms) -> EaslResult<()> {
        if let Some(pipeline) = pipeline {
            self.frames.lock().push((pipeline.clone(), vertex_count));
        }
        Ok(())
    }
}

fn shader(color: &str) -> CompiledShader {
    let src = format!(
        "(defn vertex vert [] vec4f (vec4f 0.0 0.0 0.0 1.0))\n\
         (defn fragment frag [] vec4f (vec4f {} 1.0))",
        color
    );
    compile(&src).unwrap()
}

fn runner() -> Runner<MockDevice> {
    Runner::new(MockDevice::default(), RunSettings::default())
}

#[test]
fn test_good_bad_good_sequence() {
    let runner = runner();
    let options = RunOptions::default();
    let first = shader("1.0 0.0 0.0");
    runner.initialize(&first, &options).unwrap();

    // A source that fails to compile never reaches the runner.
    assert!(compile("(defn fragment frag [] vec4f (vec4f 1.0 true))").is_err());

    // A compiled shader whose pipeline cannot be built is rejected.
    let mut bad = shader("0.0 1.0 0.0");
    bad.wgsl.push_str("\n// fail_pipeline\n");
    assert!(runner.reload(&bad, &options).is_err());
    let active = runner.current().unwrap();
    assert_eq!(active.pipeline, first.wgsl);
    assert_eq!(active.generation, 1);

    runner.frame(100, 100).unwrap();
    assert_eq!(runner.device().frames.lock().last().unwrap().0, first.wgsl);

    let third = shader("0.0 0.0 1.0");
    assert_eq!(runner.reload(&third, &options).unwrap(), 2);
    assert_eq!(runner.current().unwrap().pipeline, third.wgsl);
    assert_eq!(runner.current().unwrap().source_hash, third.source_hash);
}

#[test]
fn test_config_error_keeps_previous_pipeline() {
    let runner = runner();
    let good = shader("1.0 1.0 1.0");
    runner.initialize(&good, &RunOptions::default()).unwrap();

    let zero = RunOptions {
        triangles: Some(0),
        ..Default::default()
    };
    assert!(matches!(runner.reload(&good, &zero), Err(EaslError::Config(_))));
    assert_eq!(runner.current().unwrap().generation, 1);
}

#[test]
fn test_triangle_precedence_reaches_draw() {
    let src = "(def triangles: u32 5)\n\
               (defn vertex vert [] vec4f (vec4f 0.0 0.0 0.0 1.0))\n\
               (defn fragment main [] vec4f (vec4f 1.0 1.0 1.0 1.0))";
    let compiled = compile(src).unwrap();

    let runner = runner();
    runner.initialize(&compiled, &RunOptions::default()).unwrap();
    assert_eq!(runner.current().unwrap().config.triangles, 5);
    runner.frame(1, 1).unwrap();
    assert_eq!(runner.device().frames.lock()[0].1, 15);

    let explicit = RunOptions {
        triangles: Some(10),
        ..Default::default()
    };
    runner.reload(&compiled, &explicit).unwrap();
    assert_eq!(runner.current().unwrap().config.triangles, 10);
}

#[test]
fn test_frames_see_whole_pipelines_during_reloads() {
    let runner = Arc::new(runner());
    let shaders: Vec<CompiledShader> = ["1.0 0.0 0.0", "0.0 1.0 0.0", "0.0 0.0 1.0"]
        .iter()
        .map(|c| shader(c))
        .collect();
    let valid: Vec<String> = shaders.iter().map(|s| s.wgsl.clone()).collect();
    runner.initialize(&shaders[0], &RunOptions::default()).unwrap();

    let reloader = {
        let runner = runner.clone();
        thread::spawn(move || {
            for i in 0..200 {
                let _ = runner.reload(&shaders[i % shaders.len()], &RunOptions::default());
            }
        })
    };
    for _ in 0..200 {
        runner.frame(64, 64).unwrap();
    }
    reloader.join().unwrap();

    for (pipeline, count) in runner.device().frames.lock().iter() {
        assert!(valid.contains(pipeline));
        assert_eq!(*count, 3);
    }
}

#[test]
fn test_shutdown_stops_reloads_and_frames() {
    let runner = runner();
    let good = shader("1.0 1.0 1.0");
    runner.initialize(&good, &RunOptions::default()).unwrap();
    runner.shutdown();
    assert!(!runner.is_alive());
    assert!(runner.reload(&good, &RunOptions::default()).is_err());
    runner.frame(10, 10).unwrap();
    assert!(runner.device().frames.lock().is_empty());
    assert_eq!(runner.device().built.load(Ordering::SeqCst), 1);
}

/// Counts device calls that start while another one is still running.
#[derive(Default)]
struct OverlapDevice {
    busy: AtomicBool,
    overlaps: AtomicUsize,
    calls: AtomicUsize,
}

impl OverlapDevice {
    fn enter(&self) {
        if self.busy.swap(true, Ordering::SeqCst) {
            self.overlaps.fetch_add(1, Ordering::SeqCst);
        }
        self.calls.fetch_add(1, Ordering::SeqCst);
        thread::sleep(Duration::from_micros(200));
        self.busy.store(false, Ordering::SeqCst);
    }
}

impl GraphicsDevice for OverlapDevice {
    type Pipeline = ();

    fn create_pipeline(&self, _wgsl: &str, _config: &RunConfig) -> EaslResult<()> {
        self.enter();
        Ok(())
    }

    fn draw(&self, _pipeline: Option<&()>, _vertex_count: u32, _uniforms: &FrameUniforms) -> EaslResult<()> {
        self.enter();
        Ok(())
    }

    fn resize(&self, _width: u32, _height: u32) {
        self.enter();
    }
}

#[test]
fn test_device_calls_never_overlap() {
    let runner = Arc::new(Runner::new(OverlapDevice::default(), RunSettings::default()));
    let good = shader("0.5 0.5 0.5");
    runner.initialize(&good, &RunOptions::default()).unwrap();

    let reloader = {
        let runner = runner.clone();
        thread::spawn(move || {
            for _ in 0..50 {
                runner.reload(&good, &RunOptions::default()).unwrap();
            }
        })
    };
    let resizer = {
        let runner = runner.clone();
        thread::spawn(move || {
            for i in 0..50 {
                runner.resize(100 + i, 100);
            }
        })
    };
    for _ in 0..50 {
        runner.frame(64, 64).unwrap();
    }
    reloader.join().unwrap();
    resizer.join().unwrap();

    let device = runner.device();
    assert_eq!(device.calls.load(Ordering::SeqCst), 1 + 50 + 50 + 50);
    assert_eq!(device.overlaps.load(Ordering::SeqCst), 0);
}
