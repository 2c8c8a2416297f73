mod files;
mod watch;

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use easl_core::{ContentHash, EaslConfig};
use easl_lang::{format_source, CompiledShader, Compiler, Diagnostic};
use easl_render::{run_window, RunOptions, Runner, WgpuDevice};

use crate::watch::{CompileOutcome, ContentTracker, ReloadHandler, WatchMessage};

#[derive(Parser)]
#[command(
    name = "easl",
    version,
    about = "EASL: a Lisp-syntax shading language compiled to WGSL",
    long_about = "EASL compiles a small, statically typed, Lisp-syntax shading language to WGSL.\nCompile, check and format sources, or run a shader live in a window with hot reload."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile .easl files to WGSL
    Compile {
        /// Source file or directory
        #[arg()]
        input: PathBuf,

        /// Output file, or output directory for a directory input
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Recompile when sources change
        #[arg(short, long)]
        watch: bool,
    },

    /// Report diagnostics without writing anything
    Check {
        /// Source file or directory
        #[arg()]
        input: PathBuf,
    },

    /// Rewrite sources in canonical layout
    Format {
        /// Source file or directory
        #[arg()]
        input: PathBuf,

        /// Write here instead of rewriting in place
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Run a shader in a window
    Run {
        /// Source file
        #[arg()]
        input: PathBuf,

        /// Fragment entry point to use when several are declared
        #[arg(short, long)]
        fragment: Option<String>,

        /// Vertex entry point to use when several are declared
        #[arg(short, long)]
        vertex: Option<String>,

        /// Triangle count; overrides the shader's `triangles` constant
        #[arg(short, long)]
        triangles: Option<u32>,

        /// Reload the shader when the file changes
        #[arg(short, long)]
        watch: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cwd = std::env::current_dir().context("failed to read current directory")?;
    let config = EaslConfig::discover(&cwd).context("failed to load easl.toml")?;

    match cli.command {
        Commands::Compile { input, output, watch } => cmd_compile(&input, output.as_deref(), watch, &config),
        Commands::Check { input } => cmd_check(&input, &config),
        Commands::Format { input, output } => cmd_format(&input, output.as_deref(), &config),
        Commands::Run {
            input,
            fragment,
            vertex,
            triangles,
            watch,
        } => {
            let options = RunOptions {
                vertex,
                fragment,
                triangles,
            };
            cmd_run(&input, options, watch, &config)
        }
    }
}

fn read_source(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("failed to read file: {}", path.display()))
}

fn report(path: &Path, source: &str, diagnostics: &[Diagnostic]) {
    let name = path.display().to_string();
    for diagnostic in diagnostics {
        eprint!("{}", diagnostic.render(&name, source));
    }
}

/// Compile one file and write its WGSL. Returns the source hash on success.
fn compile_file(path: &Path, input: &Path, output: Option<&Path>, config: &EaslConfig) -> Result<Option<ContentHash>> {
    let source = read_source(path)?;
    let started = Instant::now();
    match Compiler::new().compile(&source) {
        Ok(shader) => {
            report(path, &source, &shader.warnings);
            let dest = files::output_path(path, input, output, Some(&config.compile.target_extension));
            files::write_output(&dest, &shader.wgsl)?;
            println!(
                "   ✓ {} → {} ({:.1?})",
                path.display(),
                dest.display(),
                started.elapsed()
            );
            Ok(Some(shader.source_hash))
        }
        Err(diagnostics) => {
            report(path, &source, &diagnostics);
            println!("   ✗ {}", path.display());
            Ok(None)
        }
    }
}

fn cmd_compile(input: &Path, output: Option<&Path>, watch: bool, config: &EaslConfig) -> Result<()> {
    let sources = files::collect_sources(input, &config.compile.source_extension)?;
    println!("Compiling {} file(s)", sources.len());

    // Watch events carry canonical paths, so the tracker is keyed by them.
    let mut tracker = ContentTracker::default();
    let mut failures = 0;
    for path in &sources {
        match compile_file(path, input, output, config)? {
            Some(hash) => {
                if let Ok(canonical) = path.canonicalize() {
                    tracker.record(&canonical, hash);
                }
            }
            None => failures += 1,
        }
    }

    if !watch {
        if failures > 0 {
            anyhow::bail!("Failed to compile {} file(s)", failures);
        }
        return Ok(());
    }

    let root = input
        .canonicalize()
        .with_context(|| format!("failed to resolve {}", input.display()))?;
    let output = match output {
        Some(output) if output.is_relative() => Some(std::env::current_dir()?.join(output)),
        other => other.map(Path::to_path_buf),
    };
    let mut handler = CompileWatch {
        root,
        output,
        config,
        tracker,
        staged: Vec::new(),
    };

    let (tx, rx) = mpsc::channel();
    let _watcher = watch::start_watcher(&handler.root, tx)?;
    println!("Watching {} for changes (Ctrl+C to stop)", input.display());
    watch::watch_loop(&rx, Duration::from_millis(config.watch.debounce_ms), &mut handler);
    Ok(())
}

struct Staged {
    source: PathBuf,
    hash: ContentHash,
    dest: PathBuf,
    wgsl: String,
}

/// `compile --watch`: recompile changed files and write their output.
struct CompileWatch<'a> {
    root: PathBuf,
    output: Option<PathBuf>,
    config: &'a EaslConfig,
    tracker: ContentTracker,
    staged: Vec<Staged>,
}

impl ReloadHandler for CompileWatch<'_> {
    fn is_relevant(&self, path: &Path) -> bool {
        if self.root.is_dir() {
            files::has_extension(path, &self.config.compile.source_extension)
        } else {
            path == self.root
        }
    }

    fn compile(&mut self, paths: &BTreeSet<PathBuf>) -> CompileOutcome {
        self.staged.clear();
        let mut failed = false;
        for path in paths {
            // Removed or unreadable files are picked up again on their next change.
            let Ok(source) = std::fs::read_to_string(path) else {
                continue;
            };
            if !self.tracker.is_changed(path, &source) {
                continue;
            }
            println!("Recompiling {}", path.display());
            match Compiler::new().compile(&source) {
                Ok(shader) => {
                    report(path, &source, &shader.warnings);
                    self.staged.push(Staged {
                        source: path.clone(),
                        hash: shader.source_hash,
                        dest: files::output_path(
                            path,
                            &self.root,
                            self.output.as_deref(),
                            Some(&self.config.compile.target_extension),
                        ),
                        wgsl: shader.wgsl,
                    });
                }
                Err(diagnostics) => {
                    report(path, &source, &diagnostics);
                    println!("   ✗ {}", path.display());
                    failed = true;
                }
            }
        }
        if failed {
            CompileOutcome::Failed
        } else if self.staged.is_empty() {
            CompileOutcome::Unchanged
        } else {
            CompileOutcome::Ready
        }
    }

    fn apply(&mut self) -> bool {
        let mut ok = true;
        for staged in self.staged.drain(..) {
            match files::write_output(&staged.dest, &staged.wgsl) {
                Ok(()) => {
                    println!("   ✓ {} → {}", staged.source.display(), staged.dest.display());
                    self.tracker.record(&staged.source, staged.hash);
                }
                Err(e) => {
                    eprintln!("   ✗ {:#}", e);
                    ok = false;
                }
            }
        }
        ok
    }
}

fn cmd_check(input: &Path, config: &EaslConfig) -> Result<()> {
    let sources = files::collect_sources(input, &config.compile.source_extension)?;
    let mut failures = 0;
    for path in &sources {
        let source = read_source(path)?;
        let diagnostics = Compiler::new().check(&source);
        report(path, &source, &diagnostics);
        if easl_lang::diagnostic::has_errors(&diagnostics) {
            println!("   ✗ {}", path.display());
            failures += 1;
        } else {
            println!("   ✓ {}", path.display());
        }
    }
    if failures > 0 {
        anyhow::bail!("{} of {} file(s) have errors", failures, sources.len());
    }
    println!("No errors found.");
    Ok(())
}

fn cmd_format(input: &Path, output: Option<&Path>, config: &EaslConfig) -> Result<()> {
    let sources = files::collect_sources(input, &config.compile.source_extension)?;
    let mut failures = 0;
    for path in &sources {
        let source = read_source(path)?;
        match format_source(&source) {
            Ok(formatted) => {
                let dest = files::output_path(path, input, output, None);
                if dest == *path && formatted == source {
                    println!("   ✓ {} (unchanged)", path.display());
                    continue;
                }
                files::write_output(&dest, &formatted)?;
                println!("   ✓ Formatted {}", dest.display());
            }
            Err(diagnostics) => {
                report(path, &source, &diagnostics);
                println!("   ✗ {}", path.display());
                failures += 1;
            }
        }
    }
    if failures > 0 {
        anyhow::bail!("Failed to format {} file(s)", failures);
    }
    Ok(())
}

fn cmd_run(input: &Path, options: RunOptions, watch: bool, config: &EaslConfig) -> Result<()> {
    let source = read_source(input)?;
    let compiler = Compiler::new().with_entry_selection(options.selection());
    let shader = match compiler.compile(&source) {
        Ok(shader) => shader,
        Err(diagnostics) => {
            report(input, &source, &diagnostics);
            anyhow::bail!("Failed to compile {}", input.display());
        }
    };
    report(input, &source, &shader.warnings);

    let run_config = options.resolve(&shader, &config.run)?;
    println!(
        "Running {} (vertex '{}', fragment '{}', {} triangle(s))",
        input.display(),
        run_config.entries.vertex,
        run_config.entries.fragment,
        run_config.triangles
    );

    if !watch {
        run_window(config.run.clone(), shader, options, |_| {})?;
        return Ok(());
    }

    let path = input
        .canonicalize()
        .with_context(|| format!("failed to resolve {}", input.display()))?;
    let (tx, rx) = mpsc::channel();
    let _watcher = watch::start_watcher(&path, tx.clone())?;
    let (runner_tx, runner_rx) = mpsc::channel::<Arc<Runner<WgpuDevice>>>();

    let debounce = Duration::from_millis(config.watch.debounce_ms);
    let mut tracker = ContentTracker::default();
    tracker.record(&path, shader.source_hash);
    let worker = {
        let options = options.clone();
        std::thread::spawn(move || {
            // The window sends the runner once its first pipeline is up.
            let Ok(runner) = runner_rx.recv() else {
                return;
            };
            let mut handler = RunWatch {
                path,
                compiler,
                options,
                runner,
                tracker,
                staged: None,
            };
            watch::watch_loop(&rx, debounce, &mut handler);
        })
    };
    println!("Watching {} for changes", input.display());

    let result = run_window(config.run.clone(), shader, options, move |runner| {
        watch::send_or_log(&runner_tx, runner, "runner handoff");
    });

    watch::send_or_log(&tx, WatchMessage::Shutdown, "watcher shutdown");
    if worker.join().is_err() {
        tracing::error!("watcher thread panicked");
    }
    result?;
    Ok(())
}

/// `run --watch`: recompile the shader and hand it to the runner.
struct RunWatch {
    path: PathBuf,
    compiler: Compiler,
    options: RunOptions,
    runner: Arc<Runner<WgpuDevice>>,
    tracker: ContentTracker,
    staged: Option<CompiledShader>,
}

impl ReloadHandler for RunWatch {
    fn is_relevant(&self, path: &Path) -> bool {
        path == self.path
    }

    fn compile(&mut self, _paths: &BTreeSet<PathBuf>) -> CompileOutcome {
        self.staged = None;
        let Ok(source) = std::fs::read_to_string(&self.path) else {
            return CompileOutcome::Unchanged;
        };
        if !self.tracker.is_changed(&self.path, &source) {
            return CompileOutcome::Unchanged;
        }
        println!("Recompiling {}", self.path.display());
        match self.compiler.compile(&source) {
            Ok(shader) => {
                report(&self.path, &source, &shader.warnings);
                self.staged = Some(shader);
                CompileOutcome::Ready
            }
            Err(diagnostics) => {
                report(&self.path, &source, &diagnostics);
                println!("   ✗ Keeping the previous shader");
                CompileOutcome::Failed
            }
        }
    }

    fn apply(&mut self) -> bool {
        let Some(shader) = self.staged.take() else {
            return false;
        };
        match self.runner.reload(&shader, &self.options) {
            Ok(generation) => {
                self.tracker.record(&self.path, shader.source_hash);
                println!("   ✓ Reloaded (generation {})", generation);
                true
            }
            Err(e) => {
                eprintln!("   ✗ Reload rejected: {}", e);
                false
            }
        }
    }
}
