//! File watching and the reload state machine shared by `compile --watch`
//! and `run --watch`.

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{Receiver, Sender, TryRecvError};
use std::time::Duration;

use easl_core::{ContentHash, EaslError, EaslResult};
use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};

/// Messages delivered to the watch loop.
#[derive(Debug)]
pub enum WatchMessage {
    Fs(notify::Result<notify::Event>),
    Shutdown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReloadState {
    Idle,
    Compiling,
    Applying,
    Failed,
}

/// Reload lifecycle with change coalescing.
///
/// At most one compile runs at a time. Changes seen while compiling or
/// applying set a single pending flag, which yields exactly one follow-up
/// compile however many changes arrived.
#[derive(Debug)]
pub struct ReloadController {
    state: ReloadState,
    /// State to return to when a compile turns out to be a no-op.
    settled: ReloadState,
    pending: bool,
}

impl Default for ReloadController {
    fn default() -> Self {
        Self::new()
    }
}

impl ReloadController {
    pub fn new() -> Self {
        Self {
            state: ReloadState::Idle,
            settled: ReloadState::Idle,
            pending: false,
        }
    }

    pub fn state(&self) -> ReloadState {
        self.state
    }

    /// Record a change. Returns true when a compile should start now.
    pub fn on_change(&mut self) -> bool {
        match self.state {
            ReloadState::Idle | ReloadState::Failed => {
                self.settled = self.state;
                self.state = ReloadState::Compiling;
                true
            }
            ReloadState::Compiling | ReloadState::Applying => {
                self.pending = true;
                false
            }
        }
    }

    pub fn compile_succeeded(&mut self) {
        debug_assert_eq!(self.state, ReloadState::Compiling);
        self.state = ReloadState::Applying;
    }

    pub fn compile_failed(&mut self) {
        self.state = ReloadState::Failed;
    }

    /// The change left the content as it was; nothing to apply.
    pub fn compile_skipped(&mut self) {
        self.state = self.settled;
    }

    /// Applying finished. A rejected result leaves the controller Failed.
    pub fn applied(&mut self, accepted: bool) {
        self.state = if accepted {
            ReloadState::Idle
        } else {
            ReloadState::Failed
        };
    }

    /// Start the follow-up compile if changes arrived meanwhile.
    pub fn start_pending(&mut self) -> bool {
        if !self.pending {
            return false;
        }
        self.pending = false;
        self.on_change()
    }
}

/// Result of compiling one batch of changed paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompileOutcome {
    Ready,
    Failed,
    Unchanged,
}

/// What a watch session does with changes.
pub trait ReloadHandler {
    fn is_relevant(&self, path: &Path) -> bool;

    /// Compile the changed paths and stage the results. Diagnostics are
    /// reported by the handler.
    fn compile(&mut self, paths: &BTreeSet<PathBuf>) -> CompileOutcome;

    /// Hand staged results on. Returns false if they were rejected.
    fn apply(&mut self) -> bool;
}

/// Remembers the last content seen per path so that saves that change
/// nothing are skipped.
#[derive(Debug, Default)]
pub struct ContentTracker {
    hashes: HashMap<PathBuf, ContentHash>,
}

impl ContentTracker {
    pub fn is_changed(&self, path: &Path, text: &str) -> bool {
        self.hashes.get(path) != Some(&ContentHash::of_text(text))
    }

    pub fn record(&mut self, path: &Path, hash: ContentHash) {
        self.hashes.insert(path.to_path_buf(), hash);
    }
}

/// Send `message`, logging instead of failing when the receiving side is
/// gone. Returns whether the message was delivered.
pub fn send_or_log<T>(tx: &Sender<T>, message: T, what: &str) -> bool {
    match tx.send(message) {
        Ok(()) => true,
        Err(_) => {
            tracing::debug!("{} not delivered: receiver has exited", what);
            false
        }
    }
}

/// Start a filesystem watcher feeding `tx`.
///
/// A directory is watched recursively. A file is watched through its parent
/// directory, since editors often save by replacing the file.
pub fn start_watcher(target: &Path, tx: Sender<WatchMessage>) -> EaslResult<RecommendedWatcher> {
    let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
        send_or_log(&tx, WatchMessage::Fs(res), "file event");
    })
    .map_err(|e| EaslError::watch(format!("failed to create file watcher: {}", e)))?;

    let (path, mode) = if target.is_dir() {
        (target, RecursiveMode::Recursive)
    } else {
        (target.parent().unwrap_or(Path::new(".")), RecursiveMode::NonRecursive)
    };
    watcher
        .watch(path, mode)
        .map_err(|e| EaslError::watch(format!("failed to watch {}: {}", path.display(), e)))?;
    Ok(watcher)
}

fn is_change(kind: &EventKind) -> bool {
    matches!(kind, EventKind::Modify(_) | EventKind::Create(_) | EventKind::Remove(_))
}

/// Drain messages without blocking. Returns whether shutdown was requested
/// and whether any relevant change arrived.
fn drain<H: ReloadHandler>(rx: &Receiver<WatchMessage>, handler: &H, changed: &mut BTreeSet<PathBuf>) -> (bool, bool) {
    let mut added = false;
    loop {
        match rx.try_recv() {
            Ok(WatchMessage::Shutdown) | Err(TryRecvError::Disconnected) => return (true, added),
            Ok(WatchMessage::Fs(res)) => added |= collect(res, handler, changed),
            Err(TryRecvError::Empty) => return (false, added),
        }
    }
}

/// Add relevant paths from one notification. Returns true if any was added.
fn collect<H: ReloadHandler>(
    res: notify::Result<notify::Event>,
    handler: &H,
    changed: &mut BTreeSet<PathBuf>,
) -> bool {
    match res {
        Ok(event) if is_change(&event.kind) => {
            let before = changed.len();
            changed.extend(event.paths.into_iter().filter(|p| handler.is_relevant(p)));
            changed.len() > before
        }
        Ok(_) => false,
        Err(e) => {
            tracing::error!("watch error: {}", e);
            false
        }
    }
}

/// Block on `rx` and run reload cycles until shutdown.
pub fn watch_loop<H: ReloadHandler>(rx: &Receiver<WatchMessage>, debounce: Duration, handler: &mut H) -> ReloadController {
    let mut controller = ReloadController::new();
    let mut changed = BTreeSet::new();

    loop {
        match rx.recv() {
            Ok(WatchMessage::Shutdown) | Err(_) => break,
            Ok(WatchMessage::Fs(res)) => {
                collect(res, handler, &mut changed);
            }
        }

        // Let a burst of events from one save settle into one batch.
        if !debounce.is_zero() {
            std::thread::sleep(debounce);
        }
        let (mut shutdown, _) = drain(rx, handler, &mut changed);
        if shutdown {
            break;
        }
        if changed.is_empty() || !controller.on_change() {
            continue;
        }

        loop {
            let batch = std::mem::take(&mut changed);
            tracing::debug!("compiling {} changed file(s)", batch.len());
            let outcome = handler.compile(&batch);
            let (stop, added) = drain(rx, handler, &mut changed);
            shutdown = stop;
            if added {
                controller.on_change();
            }

            match outcome {
                CompileOutcome::Ready => {
                    controller.compile_succeeded();
                    if shutdown {
                        break;
                    }
                    let accepted = handler.apply();
                    controller.applied(accepted);
                }
                CompileOutcome::Failed => controller.compile_failed(),
                CompileOutcome::Unchanged => controller.compile_skipped(),
            }
            if shutdown || !controller.start_pending() {
                break;
            }
        }
        if shutdown {
            break;
        }
    }
    controller
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc::channel;

    #[test]
    fn test_send_or_log_reports_delivery() {
        let (tx, rx) = channel();
        assert!(send_or_log(&tx, WatchMessage::Shutdown, "shutdown"));
        assert!(matches!(rx.try_recv(), Ok(WatchMessage::Shutdown)));

        drop(rx);
        assert!(!send_or_log(&tx, WatchMessage::Shutdown, "shutdown"));
    }

    #[test]
    fn test_success_cycle() {
        let mut c = ReloadController::new();
        assert!(c.on_change());
        assert_eq!(c.state(), ReloadState::Compiling);
        c.compile_succeeded();
        assert_eq!(c.state(), ReloadState::Applying);
        c.applied(true);
        assert_eq!(c.state(), ReloadState::Idle);
    }

    #[test]
    fn test_failure_then_recovery() {
        let mut c = ReloadController::new();
        c.on_change();
        c.compile_failed();
        assert_eq!(c.state(), ReloadState::Failed);
        assert!(c.on_change());
        c.compile_succeeded();
        c.applied(true);
        assert_eq!(c.state(), ReloadState::Idle);
    }

    #[test]
    fn test_changes_during_compile_coalesce() {
        let mut c = ReloadController::new();
        c.on_change();
        assert!(!c.on_change());
        assert!(!c.on_change());
        assert!(!c.on_change());
        c.compile_succeeded();
        c.applied(true);
        assert!(c.start_pending());
        assert_eq!(c.state(), ReloadState::Compiling);
        c.compile_succeeded();
        c.applied(true);
        assert!(!c.start_pending());
    }

    #[test]
    fn test_unchanged_keeps_failed_state() {
        let mut c = ReloadController::new();
        c.on_change();
        c.compile_failed();
        c.on_change();
        c.compile_skipped();
        assert_eq!(c.state(), ReloadState::Failed);
    }

    #[test]
    fn test_content_tracker() {
        let mut tracker = ContentTracker::default();
        let path = Path::new("a.easl");
        assert!(tracker.is_changed(path, "x"));
        tracker.record(path, ContentHash::of_text("x"));
        assert!(!tracker.is_changed(path, "x"));
        assert!(tracker.is_changed(path, "y"));
    }

    /// Records batches and, on the first compile, queues more changes as if
    /// the file was saved again while compiling.
    struct ScriptedHandler {
        tx: Sender<WatchMessage>,
        batches: Vec<usize>,
        applied: usize,
        fail_first: bool,
    }

    fn modify(path: &str) -> WatchMessage {
        let event = notify::Event::new(EventKind::Modify(notify::event::ModifyKind::Any))
            .add_path(PathBuf::from(path));
        WatchMessage::Fs(Ok(event))
    }

    impl ReloadHandler for ScriptedHandler {
        fn is_relevant(&self, path: &Path) -> bool {
            path.extension().and_then(|e| e.to_str()) == Some("easl")
        }

        fn compile(&mut self, paths: &BTreeSet<PathBuf>) -> CompileOutcome {
            self.batches.push(paths.len());
            if self.batches.len() == 1 {
                for _ in 0..3 {
                    let _ = self.tx.send(modify("/w/a.easl"));
                }
                if self.fail_first {
                    return CompileOutcome::Failed;
                }
            }
            CompileOutcome::Ready
        }

        fn apply(&mut self) -> bool {
            self.applied += 1;
            true
        }
    }

    #[test]
    fn test_watch_loop_runs_one_follow_up() {
        let (tx, rx) = channel();
        let mut handler = ScriptedHandler {
            tx: tx.clone(),
            batches: Vec::new(),
            applied: 0,
            fail_first: false,
        };
        tx.send(modify("/w/a.easl")).unwrap();
        tx.send(modify("/w/notes.txt")).unwrap();
        tx.send(modify("/w/b.easl")).unwrap();

        let sender = tx.clone();
        let shutdown = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(200));
            let _ = sender.send(WatchMessage::Shutdown);
        });
        let controller = watch_loop(&rx, Duration::ZERO, &mut handler);
        shutdown.join().unwrap();

        assert_eq!(handler.batches, vec![2, 1]);
        assert_eq!(handler.applied, 2);
        assert_eq!(controller.state(), ReloadState::Idle);
    }

    #[test]
    fn test_watch_loop_recovers_after_failure() {
        let (tx, rx) = channel();
        let mut handler = ScriptedHandler {
            tx: tx.clone(),
            batches: Vec::new(),
            applied: 0,
            fail_first: true,
        };
        tx.send(modify("/w/a.easl")).unwrap();
        let sender = tx.clone();
        let shutdown = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(200));
            let _ = sender.send(WatchMessage::Shutdown);
        });
        let controller = watch_loop(&rx, Duration::ZERO, &mut handler);
        shutdown.join().unwrap();

        assert_eq!(handler.batches, vec![1, 1]);
        assert_eq!(handler.applied, 1);
        assert_eq!(controller.state(), ReloadState::Idle);
    }

    #[test]
    fn test_shutdown_ends_wait() {
        let (tx, rx) = channel();
        let mut handler = ScriptedHandler {
            tx: tx.clone(),
            batches: Vec::new(),
            applied: 0,
            fail_first: false,
        };
        tx.send(WatchMessage::Shutdown).unwrap();
        watch_loop(&rx, Duration::ZERO, &mut handler);
        assert!(handler.batches.is_empty());
    }
}
