//! Which paths the watcher observes and how it detects changes.

use glob::{MatchOptions, Pattern, PatternError};
use std::path::{Component, Path};
use std::time::Duration;

#[derive(Debug, Clone)]
enum Exclusion {
    /// Any path component equal to this name
    Segment(String),
    /// A glob matched against the root-relative path
    Glob(Pattern),
}

/// Exclusions plus the change detection mode.
#[derive(Debug, Clone)]
pub struct WatchPolicy {
    ignored: Vec<Exclusion>,
    poll_interval_ms: u64,
    debounce_ms: u64,
}

impl Default for WatchPolicy {
    fn default() -> Self {
        Self {
            ignored: vec![Exclusion::Segment("node_modules".to_string())],
            poll_interval_ms: 0,
            debounce_ms: 100,
        }
    }
}

impl WatchPolicy {
    /// Build a policy from exclusion patterns.
    ///
    /// A pattern without glob metacharacters excludes every path that has
    /// a component with that exact name. Anything else is a glob.
    pub fn new(ignored: &[String], poll_interval_ms: u64, debounce_ms: u64) -> Result<Self, PatternError> {
        let ignored = ignored
            .iter()
            .map(|p| {
                if is_glob(p) {
                    Pattern::new(p).map(Exclusion::Glob)
                } else {
                    Ok(Exclusion::Segment(p.trim_matches('/').to_string()))
                }
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { ignored, poll_interval_ms, debounce_ms })
    }

    /// False when `path` falls under an exclusion.
    pub fn should_watch(&self, root: &Path, path: &Path) -> bool {
        let relative = path.strip_prefix(root).unwrap_or(path);
        let options = MatchOptions { require_literal_separator: true, ..MatchOptions::new() };

        !self.ignored.iter().any(|exclusion| match exclusion {
            Exclusion::Segment(name) => relative
                .components()
                .any(|c| matches!(c, Component::Normal(part) if part.to_str() == Some(name.as_str()))),
            Exclusion::Glob(pattern) => pattern.matches_path_with(relative, options),
        })
    }

    /// Zero means native change notifications.
    pub fn poll_interval_ms(&self) -> u64 {
        self.poll_interval_ms
    }

    /// Whether the watcher should fall back to timer-based polling.
    pub fn uses_polling(&self) -> bool {
        self.poll_interval_ms > 0
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

fn is_glob(pattern: &str) -> bool {
    pattern.contains(&['*', '?', '[', ']'][..])
}
