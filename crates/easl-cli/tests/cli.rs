use std::path::PathBuf;
use std::process::{Command, Output};

const VALID: &str = "(defn vertex vert [] vec4f (vec4f 0.0 0.0 0.0 1.0))\n\
                     (defn fragment frag [] vec4f (vec4f 1.0 0.0 0.0 1.0))\n";

fn easl(args: &[&str]) -> Output {
    let bin = std::env::var("CARGO_BIN_EXE_easl").unwrap_or_else(|_| {
        PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .join("../../target/debug/easl")
            .to_string_lossy()
            .to_string()
    });
    Command::new(bin)
        .args(args)
        .env("RUST_LOG", "warn")
        .output()
        .expect("failed to spawn easl")
}

fn scratch(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("easl_cli_{}", name));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

fn arg(path: &std::path::Path) -> String {
    path.to_string_lossy().to_string()
}

#[test]
fn compile_writes_wgsl_next_to_source() {
    let dir = scratch("compile");
    let src = dir.join("red.easl");
    std::fs::write(&src, VALID).unwrap();

    let output = easl(&["compile", &arg(&src)]);
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));

    let wgsl = std::fs::read_to_string(dir.join("red.wgsl")).unwrap();
    assert!(wgsl.contains("@vertex"));
    assert!(wgsl.contains("@fragment"));
}

#[test]
fn compile_directory_mirrors_into_output() {
    let dir = scratch("compile_dir");
    std::fs::create_dir_all(dir.join("src/nested")).unwrap();
    std::fs::write(dir.join("src/a.easl"), VALID).unwrap();
    std::fs::write(dir.join("src/nested/b.easl"), VALID).unwrap();

    let output = easl(&["compile", &arg(&dir.join("src")), "-o", &arg(&dir.join("out"))]);
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    assert!(dir.join("out/a.wgsl").is_file());
    assert!(dir.join("out/nested/b.wgsl").is_file());
}

#[test]
fn compile_failure_reports_and_writes_nothing() {
    let dir = scratch("compile_fail");
    let src = dir.join("bad.easl");
    std::fs::write(&src, "(defn fragment frag [] vec4f (vec4f 1.0 true))\n").unwrap();

    let output = easl(&["compile", &arg(&src)]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("error:"), "stderr: {stderr}");
    assert!(stderr.contains("bad.easl:1:"), "stderr: {stderr}");
    assert!(!dir.join("bad.wgsl").exists());
}

#[test]
fn check_never_writes_output() {
    let dir = scratch("check");
    let src = dir.join("ok.easl");
    std::fs::write(&src, VALID).unwrap();

    let output = easl(&["check", &arg(&src)]);
    assert!(output.status.success());
    assert!(!dir.join("ok.wgsl").exists());

    std::fs::write(&src, "(def x: f32 true)\n").unwrap();
    let output = easl(&["check", &arg(&src)]);
    assert!(!output.status.success());
}

#[test]
fn format_rewrites_in_place_and_is_stable() {
    let dir = scratch("format");
    let src = dir.join("messy.easl");
    std::fs::write(&src, "(defn   fragment frag [ ] vec4f\n\n      (vec4f 1.0 0.0   0.0 1.0))").unwrap();

    let output = easl(&["format", &arg(&src)]);
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    let first = std::fs::read_to_string(&src).unwrap();
    assert!(first.starts_with("(defn fragment frag [] vec4f"));

    let output = easl(&["format", &arg(&src)]);
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("unchanged"));
    assert_eq!(std::fs::read_to_string(&src).unwrap(), first);
}

#[test]
fn format_refuses_unparseable_source() {
    let dir = scratch("format_fail");
    let src = dir.join("broken.easl");
    let text = "(defn fragment frag [] vec4f (vec4f 1.0\n";
    std::fs::write(&src, text).unwrap();

    let output = easl(&["format", &arg(&src)]);
    assert!(!output.status.success());
    assert_eq!(std::fs::read_to_string(&src).unwrap(), text);
}

#[test]
fn missing_input_fails() {
    let output = easl(&["check", "/definitely/not/here.easl"]);
    assert!(!output.status.success());
}
