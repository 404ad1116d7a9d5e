//! Pipeline descriptor: the immutable description of a build.
//!
//! A [`PipelineDescriptor`] fully determines, for any file reachable from
//! an entry point, which transform chain applies and where each artifact
//! is written. It is built once at startup, never mutated, and shared by
//! reference with every worker.
//!
//! # Example
//!
//! ```ignore
//! use sitepack::descriptor::{Mode, PipelineDescriptor};
//!
//! let descriptor = PipelineDescriptor::builder("/site")
//!     .entry("src/index.tsx")
//!     .mode(Mode::Development)
//!     .build()?;
//!
//! let rule = descriptor.resolve_rule(Path::new("src/app.scss"))?;
//! println!("{} -> {}", rule.kind(), rule.chain());
//! ```

pub mod error;
pub mod output;
pub mod resolve;
pub mod rule;
pub mod watch_policy;

pub use error::ConfigurationError;
pub use output::{OutputKind, OutputLayout, OutputTarget};
pub use resolve::ResolutionPolicy;
pub use rule::{MatchRule, OptionValue, RuleKind, StepOptions, TransformChain, TransformStep};
pub use watch_policy::WatchPolicy;

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Bundling mode. Gates transform options, never rule selection.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Production,
    Development,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Production => write!(f, "production"),
            Mode::Development => write!(f, "development"),
        }
    }
}

/// A root module and the bundle it produces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryPoint {
    /// Bundle name substituted for `[name]` in output templates
    pub name: String,
    /// Path relative to the descriptor root
    pub path: PathBuf,
}

/// Error assembling a descriptor.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DescriptorError {
    #[error("at least one entry point is required")]
    NoEntries,
    #[error("at least one rule is required")]
    NoRules,
    #[error("entry name '{0}' is used more than once")]
    DuplicateEntryName(String),
    #[error("{0} and {1} bundles would be written to the same file '{2}'")]
    OutputCollision(OutputKind, OutputKind, String),
}

/// Immutable description of the asset pipeline.
#[derive(Debug, Clone)]
pub struct PipelineDescriptor {
    root: PathBuf,
    entries: Vec<EntryPoint>,
    rules: Vec<MatchRule>,
    resolution: ResolutionPolicy,
    output: OutputLayout,
    watch: WatchPolicy,
    mode: Mode,
    source_maps: bool,
}

impl PipelineDescriptor {
    /// Start a descriptor rooted at `root` (where entries and sources live).
    pub fn builder(root: impl Into<PathBuf>) -> DescriptorBuilder {
        DescriptorBuilder::new(root.into())
    }

    /// Project root entry paths are resolved against.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Entry points in declaration order.
    pub fn entries(&self) -> &[EntryPoint] {
        &self.entries
    }

    /// Rules in declaration order.
    pub fn rules(&self) -> &[MatchRule] {
        &self.rules
    }

    pub fn resolution(&self) -> &ResolutionPolicy {
        &self.resolution
    }

    pub fn output(&self) -> &OutputLayout {
        &self.output
    }

    pub fn watch_policy(&self) -> &WatchPolicy {
        &self.watch
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Whether the script bundle gets a source map.
    pub fn source_maps_enabled(&self) -> bool {
        self.source_maps
    }

    /// Whether transforms minify their output.
    pub fn minify_enabled(&self) -> bool {
        self.mode == Mode::Production
    }

    /// Absolute location of an entry point.
    pub fn entry_path(&self, entry: &EntryPoint) -> PathBuf {
        resolve::normalize(&self.root.join(&entry.path))
    }

    /// Find the first rule whose test matches `path`.
    pub fn resolve_rule(&self, path: &Path) -> Result<&MatchRule, ConfigurationError> {
        self.resolve_rule_index(path).map(|index| &self.rules[index])
    }

    /// Like [`resolve_rule`](Self::resolve_rule), returning the rule's position.
    pub fn resolve_rule_index(&self, path: &Path) -> Result<usize, ConfigurationError> {
        let relative = path.strip_prefix(&self.root).unwrap_or(path);
        self.rules
            .iter()
            .position(|rule| rule.matches(relative))
            .ok_or_else(|| ConfigurationError::UnmatchedFileType { path: relative.to_path_buf() })
    }

    /// Resolve an import specifier relative to the importing module's directory.
    pub fn resolve_import_path(
        &self,
        specifier: &str,
        from_dir: &Path,
    ) -> Result<PathBuf, ConfigurationError> {
        self.resolution.resolve(&self.root, specifier, from_dir)
    }

    /// Where the artifact of `kind` for `bundle_name` is written.
    pub fn output_path_for(&self, kind: OutputKind, bundle_name: &str) -> PathBuf {
        self.output.path_for(kind, bundle_name)
    }

    /// False for paths under an excluded tree.
    pub fn should_watch(&self, path: &Path) -> bool {
        self.watch.should_watch(&self.root, path)
    }

    /// Zero means native change notifications.
    pub fn poll_interval_ms(&self) -> u64 {
        self.watch.poll_interval_ms()
    }

    /// A path relative to the root, for reporting.
    pub fn display_path(&self, path: &Path) -> PathBuf {
        path.strip_prefix(&self.root).map(Path::to_path_buf).unwrap_or_else(|_| path.to_path_buf())
    }
}

/// Rules equivalent to a TypeScript + SCSS setup.
pub fn default_rules() -> Vec<MatchRule> {
    let script = TransformChain::new(vec![TransformStep::new("typescript")]);
    let json = TransformChain::new(vec![TransformStep::new("json")]);
    // `css` reprints the stylesheet, so a map embedded by `sass` would not survive it.
    let style = TransformChain::new(vec![TransformStep::new("sass"), TransformStep::new("css")]);

    // The patterns are literals known to compile.
    vec![
        MatchRule::script(r"\.(tsx?|js)$", script).expect("valid script pattern"),
        MatchRule::script(r"\.json$", json).expect("valid json pattern"),
        MatchRule::style(r"\.scss$", style).expect("valid style pattern"),
    ]
}

/// Name given to the entry at `index` when it has no explicit name.
pub fn default_entry_name(bundle_name: &str, index: usize) -> String {
    if index == 0 {
        bundle_name.to_string()
    } else {
        format!("{}-{}", bundle_name, index)
    }
}

/// Builder for [`PipelineDescriptor`].
#[derive(Debug, Clone)]
pub struct DescriptorBuilder {
    root: PathBuf,
    entries: Vec<(Option<String>, PathBuf)>,
    rules: Option<Vec<MatchRule>>,
    resolution: ResolutionPolicy,
    output: Option<OutputLayout>,
    watch: WatchPolicy,
    mode: Mode,
    source_maps: Option<bool>,
    bundle_name: String,
}

impl DescriptorBuilder {
    fn new(root: PathBuf) -> Self {
        Self {
            root,
            entries: Vec::new(),
            rules: None,
            resolution: ResolutionPolicy::default(),
            output: None,
            watch: WatchPolicy::default(),
            mode: Mode::default(),
            source_maps: None,
            bundle_name: "general".to_string(),
        }
    }

    /// Add an entry named by its position.
    pub fn entry(mut self, path: impl Into<PathBuf>) -> Self {
        self.entries.push((None, path.into()));
        self
    }

    /// Add an explicitly named entry.
    pub fn named_entry(mut self, name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        self.entries.push((Some(name.into()), path.into()));
        self
    }

    /// Replace the default rules.
    pub fn rules(mut self, rules: Vec<MatchRule>) -> Self {
        self.rules = Some(rules);
        self
    }

    pub fn resolution(mut self, resolution: ResolutionPolicy) -> Self {
        self.resolution = resolution;
        self
    }

    /// Replace the default output layout (`<root>/public`).
    pub fn output(mut self, output: OutputLayout) -> Self {
        self.output = Some(output);
        self
    }

    pub fn watch(mut self, watch: WatchPolicy) -> Self {
        self.watch = watch;
        self
    }

    pub fn mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    /// Force source maps on or off; otherwise development mode enables them.
    pub fn source_maps(mut self, enabled: Option<bool>) -> Self {
        self.source_maps = enabled;
        self
    }

    /// Base name for unnamed entries.
    pub fn bundle_name(mut self, name: impl Into<String>) -> Self {
        self.bundle_name = name.into();
        self
    }

    pub fn build(self) -> Result<PipelineDescriptor, DescriptorError> {
        if self.entries.is_empty() {
            return Err(DescriptorError::NoEntries);
        }

        let mut seen = HashSet::new();
        let mut entries = Vec::with_capacity(self.entries.len());
        for (index, (name, path)) in self.entries.into_iter().enumerate() {
            let name = name.unwrap_or_else(|| default_entry_name(&self.bundle_name, index));
            if !seen.insert(name.clone()) {
                return Err(DescriptorError::DuplicateEntryName(name));
            }
            entries.push(EntryPoint { name, path });
        }

        let rules = self.rules.unwrap_or_else(default_rules);
        if rules.is_empty() {
            return Err(DescriptorError::NoRules);
        }

        let output = self.output.unwrap_or_else(|| OutputLayout::with_defaults(self.root.join("public")));
        check_disjoint_outputs(&output, &entries)?;

        let source_maps = self.source_maps.unwrap_or(self.mode == Mode::Development);

        Ok(PipelineDescriptor {
            root: self.root,
            entries,
            rules,
            resolution: self.resolution,
            output,
            watch: self.watch,
            mode: self.mode,
            source_maps,
        })
    }
}

/// Every artifact of every bundle must land on its own file.
fn check_disjoint_outputs(output: &OutputLayout, entries: &[EntryPoint]) -> Result<(), DescriptorError> {
    let kinds = [OutputKind::ScriptBundle, OutputKind::StyleBundle, OutputKind::MapFile];
    let mut claimed: Vec<(String, OutputKind)> = Vec::new();

    for entry in entries {
        for kind in kinds {
            let path = output.relative_path_for(kind, &entry.name);
            if let Some((_, other)) = claimed.iter().find(|(p, _)| *p == path) {
                return Err(DescriptorError::OutputCollision(*other, kind, path));
            }
            claimed.push((path, kind));
        }
    }
    Ok(())
}
