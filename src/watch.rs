//! Watch mode for automatic rebuilds on file changes
//!
//! Provides file system watching with debouncing for `sitepack build --watch`.
//! Changes bump the build generation, so an in-flight build that is
//! overtaken by a newer change discards its results instead of writing.

use notify::{PollWatcher, RecommendedWatcher, RecursiveMode, Watcher};
use notify_debouncer_mini::{
    new_debouncer, new_debouncer_opt, DebounceEventResult, DebouncedEventKind, Debouncer,
};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{channel, Sender};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, warn};

use crate::build::{BuildError, BuildGeneration, BuildPipeline, BuildResult};
use crate::config::CONFIG_FILE_NAME;
use crate::descriptor::PipelineDescriptor;

/// Error during watch mode
#[derive(Debug, Error)]
pub enum WatchError {
    #[error("Failed to initialize file watcher: {0}")]
    WatcherInit(notify::Error),
    #[error("Failed to watch path: {0}")]
    WatchPath(notify::Error),
    #[error("Watch channel error: {0}")]
    ChannelError(String),
    #[error("Project root not found: {}", .0.display())]
    RootNotFound(PathBuf),
}

/// Tracks files with errors across build iterations for recovery detection
#[derive(Debug, Default)]
pub struct ErrorTracker {
    files_with_errors: HashSet<PathBuf>,
}

impl ErrorTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the outcome of a build, returning files that stopped failing.
    pub fn update(&mut self, failed: Option<&Path>) -> Vec<PathBuf> {
        let current: HashSet<PathBuf> = failed.map(Path::to_path_buf).into_iter().collect();

        let mut fixed: Vec<PathBuf> = self.files_with_errors.difference(&current).cloned().collect();
        fixed.sort();

        self.files_with_errors = current;
        fixed
    }

    pub fn has_errors(&self) -> bool {
        !self.files_with_errors.is_empty()
    }

    pub fn error_count(&self) -> usize {
        self.files_with_errors.len()
    }
}

/// Options for watch mode
#[derive(Debug, Clone)]
pub struct WatchOptions {
    /// Clear terminal between rebuilds (only when stdout is a terminal)
    pub clear_screen: bool,
    pub verbose: bool,
}

impl Default for WatchOptions {
    fn default() -> Self {
        Self { clear_screen: true, verbose: false }
    }
}

/// A running filesystem watcher. Dropping it stops watching.
pub enum ActiveWatcher {
    Native(Debouncer<RecommendedWatcher>),
    Poll(Debouncer<PollWatcher>),
}

impl ActiveWatcher {
    pub fn is_polling(&self) -> bool {
        matches!(self, ActiveWatcher::Poll(_))
    }
}

/// Start watching the descriptor root recursively.
///
/// Uses native notifications when the poll interval is zero and a
/// polling watcher otherwise. Debounced batches are passed to `handler`.
pub fn spawn_watcher<F>(descriptor: &PipelineDescriptor, handler: F) -> Result<ActiveWatcher, WatchError>
where
    F: FnMut(DebounceEventResult) + Send + 'static,
{
    let root = descriptor.root();
    if !root.is_dir() {
        return Err(WatchError::RootNotFound(root.to_path_buf()));
    }

    let policy = descriptor.watch_policy();
    if policy.uses_polling() {
        let config = notify_debouncer_mini::Config::default()
            .with_timeout(policy.debounce())
            .with_notify_config(
                notify::Config::default().with_poll_interval(Duration::from_millis(policy.poll_interval_ms())),
            );
        let mut debouncer =
            new_debouncer_opt::<_, PollWatcher>(config, handler).map_err(WatchError::WatcherInit)?;
        debouncer.watcher().watch(root, RecursiveMode::Recursive).map_err(WatchError::WatchPath)?;
        Ok(ActiveWatcher::Poll(debouncer))
    } else {
        let mut debouncer = new_debouncer(policy.debounce(), handler).map_err(WatchError::WatcherInit)?;
        debouncer.watcher().watch(root, RecursiveMode::Recursive).map_err(WatchError::WatchPath)?;
        Ok(ActiveWatcher::Native(debouncer))
    }
}

/// Changed paths that should trigger a rebuild.
///
/// Drops excluded paths and anything under the public root, since the
/// build's own writes land there.
pub fn relevant_changes<'a, I>(descriptor: &PipelineDescriptor, paths: I) -> Vec<PathBuf>
where
    I: IntoIterator<Item = &'a Path>,
{
    let public = descriptor.output().root();
    let mut changed: Vec<PathBuf> = paths
        .into_iter()
        .filter(|path| descriptor.should_watch(path) && !path.starts_with(public))
        .filter(|path| !is_temp_artifact(path))
        .map(Path::to_path_buf)
        .collect();
    changed.sort();
    changed.dedup();
    changed
}

fn is_temp_artifact(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with('.') && n.ends_with(".tmp"))
}

/// Messages the watch loop reacts to.
#[derive(Debug)]
enum Signal {
    /// Debounced paths reported by the watcher
    Changed(Vec<PathBuf>),
    /// The watcher reported an error; watching continues
    WatchFailed(String),
    /// A rebuild thread finished
    Finished { generation: u64, result: Result<BuildResult, BuildError>, duration: Duration },
}

impl Signal {
    fn from_events(events: DebounceEventResult) -> Self {
        match events {
            Ok(events) => Signal::Changed(
                events
                    .into_iter()
                    .filter(|e| matches!(e.kind, DebouncedEventKind::Any | DebouncedEventKind::AnyContinuous))
                    .map(|e| e.path)
                    .collect(),
            ),
            Err(error) => Signal::WatchFailed(error.to_string()),
        }
    }
}

/// What the session did with one signal.
#[derive(Debug, PartialEq, Eq)]
enum Outcome {
    /// Nothing relevant changed
    Ignored,
    /// A rebuild was started for these paths
    Rebuilding(Vec<PathBuf>),
    /// A watcher error was reported
    WatchError,
    /// A finished build was stale or superseded
    Discarded,
    /// A current build finished and was reported
    Reported { success: bool, fixed: Vec<PathBuf> },
}

/// State of one `--watch` session between signals.
struct WatchSession {
    pipeline: BuildPipeline,
    descriptor: Arc<PipelineDescriptor>,
    generation: BuildGeneration,
    errors: ErrorTracker,
    tx: Sender<Signal>,
    clear: bool,
    verbose: bool,
}

impl WatchSession {
    fn new(pipeline: BuildPipeline, tx: Sender<Signal>, clear: bool, verbose: bool) -> Self {
        let descriptor = pipeline.context().shared_descriptor();
        Self { pipeline, descriptor, generation: BuildGeneration::new(), errors: ErrorTracker::new(), tx, clear, verbose }
    }

    /// Start a build for a new generation, superseding any in flight.
    fn rebuild(&self) {
        println!("[{}] Building...", timestamp());
        let ticket = self.generation.advance();
        let pipeline = self.pipeline.clone();
        let tx = self.tx.clone();

        thread::spawn(move || {
            let start = Instant::now();
            let result = pipeline.build_with(&ticket);
            let _ = tx.send(Signal::Finished { generation: ticket.generation(), result, duration: start.elapsed() });
        });
    }

    fn handle(&mut self, signal: Signal) -> Outcome {
        match signal {
            Signal::Changed(paths) => {
                let changed = relevant_changes(&self.descriptor, paths.iter().map(PathBuf::as_path));
                if changed.is_empty() {
                    return Outcome::Ignored;
                }
                self.pipeline.invalidate(&changed);

                if self.clear {
                    clear_screen();
                }
                for path in &changed {
                    println!("[{}] Changed: {}", timestamp(), self.descriptor.display_path(path).display());
                    if path.file_name().is_some_and(|n| n == CONFIG_FILE_NAME) {
                        println!("[{}] {} changed; restart to apply it", timestamp(), CONFIG_FILE_NAME);
                    }
                }

                self.rebuild();
                Outcome::Rebuilding(changed)
            }
            Signal::WatchFailed(error) => {
                warn!(%error, "watch error");
                eprintln!("[{}] Watch error: {}", timestamp(), error);
                eprintln!("[{}] Continuing to watch...", timestamp());
                Outcome::WatchError
            }
            Signal::Finished { generation, result, duration } => {
                if generation != self.generation.current() || matches!(result, Err(BuildError::Superseded)) {
                    debug!(generation, "discarding superseded build");
                    return Outcome::Discarded;
                }

                let failed = result.as_ref().err().and_then(|e| e.file().map(Path::to_path_buf));
                let fixed = self.errors.update(failed.as_deref());
                print_build_result(&result, &fixed, duration, self.verbose);
                println!("[{}] Watching {} for changes...", timestamp(), self.descriptor.root().display());
                Outcome::Reported { success: result.is_ok(), fixed }
            }
        }
    }
}

/// Clear the terminal screen
fn clear_screen() {
    print!("\x1B[2J\x1B[1;1H");
}

/// Format duration for display
fn format_duration(duration: Duration) -> String {
    let millis = duration.as_millis();
    if millis < 1000 {
        format!("{}ms", millis)
    } else {
        format!("{:.2}s", duration.as_secs_f64())
    }
}

/// Get current timestamp for logging
fn timestamp() -> String {
    use std::time::SystemTime;
    let now = SystemTime::now().duration_since(SystemTime::UNIX_EPOCH).unwrap_or_default();
    let secs = now.as_secs() % 86400;
    format!("{:02}:{:02}:{:02}", secs / 3600, (secs / 60) % 60, secs % 60)
}

/// Watch for file changes and rebuild automatically.
///
/// Blocks until interrupted. Build failures are reported and watching
/// continues; only watcher setup and channel failures end the session.
///
/// # Example
/// ```ignore
/// let pipeline = BuildPipeline::new(context);
/// watch_and_rebuild(pipeline, WatchOptions::default())?;
/// ```
pub fn watch_and_rebuild(pipeline: BuildPipeline, options: WatchOptions) -> Result<(), WatchError> {
    let descriptor = pipeline.context().shared_descriptor();
    let clear = options.clear_screen && atty::is(atty::Stream::Stdout);

    let (tx, rx) = channel::<Signal>();
    let watcher_tx = tx.clone();
    let watcher = spawn_watcher(&descriptor, move |events| {
        let _ = watcher_tx.send(Signal::from_events(events));
    })?;
    debug!(polling = watcher.is_polling(), root = %descriptor.root().display(), "watcher started");

    let mut session = WatchSession::new(pipeline, tx, clear, options.verbose);
    if clear {
        clear_screen();
    }
    session.rebuild();

    loop {
        let signal = rx.recv().map_err(|e| WatchError::ChannelError(e.to_string()))?;
        session.handle(signal);
    }
}

/// Print build result to console with fixed file notifications
fn print_build_result(
    result: &Result<BuildResult, BuildError>,
    fixed_files: &[PathBuf],
    duration: Duration,
    verbose: bool,
) {
    for fixed in fixed_files {
        println!("[{}] Fixed: {}", timestamp(), fixed.display());
    }

    match result {
        Ok(result) => {
            println!(
                "[{}] Build complete ({}) - Bundles: {} | Modules: {} | Cached: {}",
                timestamp(),
                format_duration(duration),
                result.bundles.len(),
                result.module_count(),
                result.cached_count()
            );
            if verbose {
                println!("{}", result.summary());
            }
        }
        Err(error) => {
            println!("[{}] Build failed ({})", timestamp(), format_duration(duration));
            eprintln!("[{}] Error: {}", timestamp(), error);
        }
    }
}
