use easl_core::ContentHash;
use easl_lang::{compile, format_source, Compiler, DiagnosticSeverity, EntrySelection};

const GRADIENT: &str = r#"
; Full-screen gradient driven by the time uniform.
(def triangles: u32 2)

(struct Varyings
  position: vec4f
  uv: vec2f)

(defn corner [i: u32] vec2f
  (let [x (f32 (% (+ i (/ i 3u)) 2u))
        y (f32 (% (/ (+ i 1u) 3u) 2u))]
    (vec2f x y)))

(defn vertex vert [i: u32] Varyings
  (let [uv (corner i)]
    (Varyings (vec4f (- (* 2.0 (.x uv)) 1.0) (- (* 2.0 (.y uv)) 1.0) 0.0 1.0) uv)))

(defn fragment frag [v: Varyings] vec4f
  (let [t (* 0.5 (+ 1.0 (sin time)))
        c (mix (vec3f 0.1 0.2 0.8) (vec3f 1.0 0.6 0.1) (.x (.uv v)))]
    (vec4f (* c t) 1.0)))
"#;

#[test]
fn test_compile_is_deterministic() {
    let first = compile(GRADIENT).unwrap();
    let second = compile(GRADIENT).unwrap();
    assert_eq!(
        ContentHash::of_text(&first.wgsl),
        ContentHash::of_text(&second.wgsl)
    );
}

#[test]
fn test_generated_wgsl_shape() {
    let shader = compile(GRADIENT).unwrap();
    let wgsl = &shader.wgsl;
    assert!(wgsl.contains("@group(0) @binding(0) var<uniform> resolution: vec2f;"));
    assert!(wgsl.contains("@group(0) @binding(1) var<uniform> time: f32;"));
    assert!(wgsl.contains("@builtin(position) position: vec4f"));
    assert!(wgsl.contains("@location(0) uv: vec2f"));
    assert!(wgsl.contains("@vertex"));
    assert!(wgsl.contains("@fragment"));
    assert!(wgsl.contains("@builtin(vertex_index)"));
}

#[test]
fn test_program_info_reports_triangles() {
    let shader = compile(GRADIENT).unwrap();
    let triangles = shader.info.constant("triangles").unwrap();
    assert_eq!(triangles.ty.to_string(), "u32");
    assert_eq!(triangles.value, Some(easl_lang::ConstValue::Int(2)));
}

#[test]
fn test_format_is_idempotent_and_preserves_meaning() {
    let formatted = format_source(GRADIENT).unwrap();
    assert_eq!(format_source(&formatted).unwrap(), formatted);
    assert_eq!(compile(&formatted).unwrap().wgsl, compile(GRADIENT).unwrap().wgsl);
    assert!(formatted.contains("; Full-screen gradient"));
}

#[test]
fn test_type_errors_do_not_cascade() {
    // One bad operand; the enclosing let, vec4f and function must stay quiet.
    let src = r#"
(defn vertex vert [] vec4f (vec4f 0.0 0.0 0.0 1.0))
(defn fragment frag [] vec4f
  (let [a (+ 1.0 true)
        b (* a 2.0)]
    (vec4f b b b 1.0)))
"#;
    let diags = compile(src).unwrap_err();
    let errors: Vec<_> = diags.iter().filter(|d| d.is_error()).collect();
    assert_eq!(errors.len(), 1, "{:?}", diags);
    assert_eq!(errors[0].span.line, 4);
}

#[test]
fn test_parse_error_recovery_keeps_later_forms() {
    let src = "(def a f32 1.0)\n(def b: f32 (+ 1.0 true))\n(def c: i32 ())";
    let diags = compile(src).unwrap_err();
    let lines: Vec<usize> = diags.iter().filter(|d| d.is_error()).map(|d| d.span.line).collect();
    assert!(lines.contains(&1));
    assert!(lines.contains(&2));
    assert!(lines.contains(&3));
}

#[test]
fn test_ambiguous_fragment_needs_selection() {
    let src = format!("{}\n(defn fragment other [] vec4f (vec4f 1.0 1.0 1.0 1.0))", GRADIENT);
    let compiler = Compiler::new().with_entry_selection(EntrySelection::default());
    let diags = compiler.compile(&src).unwrap_err();
    assert!(diags.iter().any(|d| d.message.contains("multiple fragment entry points")));

    let compiler = Compiler::new().with_entry_selection(EntrySelection {
        vertex: None,
        fragment: Some("other".to_string()),
    });
    let shader = compiler.compile(&src).unwrap();
    assert_eq!(shader.entries.unwrap().fragment, "other");
}

#[test]
fn test_failed_compile_never_yields_output() {
    let unit = Compiler::new().compile_unit("(defn fragment frag [] vec4f (vec3f 1.0 1.0 1.0))");
    assert!(unit.output.is_none());
    assert!(unit
        .diagnostics
        .iter()
        .any(|d| d.severity == DiagnosticSeverity::Error));
}

#[test]
fn test_recursion_rejected() {
    let src = r#"
(defn ping [x: f32] f32 (pong x))
(defn pong [x: f32] f32 (ping x))
(defn vertex vert [] vec4f (vec4f 0.0 0.0 0.0 1.0))
(defn fragment frag [] vec4f (vec4f (ping 1.0) 0.0 0.0 1.0))
"#;
    let diags = compile(src).unwrap_err();
    assert!(diags.iter().any(|d| d.message.contains("recursive call cycle")));
}

#[test]
fn test_recompile_after_fix() {
    let broken = "(defn vertex vert [] vec4f (vec4f 0.0 0.0 0.0))\n(defn fragment frag [] vec4f (vec4f 1.0))";
    assert!(compile(broken).is_err());
    let fixed = "(defn vertex vert [] vec4f (vec4f 0.0 0.0 0.0 1.0))\n(defn fragment frag [] vec4f (vec4f 1.0))";
    let shader = compile(fixed).unwrap();
    assert!(shader.wgsl.contains("vec4f(1.0f)"));
}

#[test]
fn test_deep_nesting_is_rejected_without_overflow() {
    let deep = |n: usize| {
        format!(
            "(defn vertex vert [] vec4f (vec4f 0.0 0.0 0.0 1.0))\n\
             (defn fragment frag [] vec4f (vec4f {}1.0{} 0.0 0.0 1.0))",
            "(+ 1.0 ".repeat(n),
            ")".repeat(n)
        )
    };

    assert!(compile(&deep(40)).is_ok());

    let diagnostics = compile(&deep(10_000)).unwrap_err();
    assert!(diagnostics
        .iter()
        .any(|d| d.severity == DiagnosticSeverity::Error && d.message.contains("nested deeper")));
    assert!(format_source(&deep(10_000)).is_err());
}
