//! Configuration schema types for `sitepack.toml`
//!
//! Defines the structure and validation rules for a sitepack project.

use crate::descriptor::output::{
    validate_template, DEFAULT_MAP_TEMPLATE, DEFAULT_SCRIPT_TEMPLATE, DEFAULT_STYLE_TEMPLATE,
};
use crate::descriptor::resolve::{DEFAULT_EXTENSIONS, DEFAULT_MODULE_DIR};
use crate::descriptor::{default_rules, Mode, RuleKind, StepOptions, TransformStep};
use crate::transform::CommandSpec;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;

/// Processor names available without a `[processors]` entry.
pub const BUILTIN_PROCESSORS: &[&str] = &["typescript", "sass", "json", "css"];

/// Project metadata section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    #[serde(default = "default_name")]
    pub name: String,
    /// Directory entry paths resolve against
    #[serde(default = "default_root")]
    pub root: PathBuf,
    /// Output root for every bundle
    #[serde(default = "default_public")]
    pub public: PathBuf,
    #[serde(default)]
    pub mode: Mode,
    /// Source maps on/off; absent means "on in development only"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_maps: Option<bool>,
    /// Name given to unnamed entries
    #[serde(default = "default_bundle_name")]
    pub bundle_name: String,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            root: default_root(),
            public: default_public(),
            mode: Mode::default(),
            source_maps: None,
            bundle_name: default_bundle_name(),
        }
    }
}

fn default_name() -> String {
    "site".to_string()
}

fn default_root() -> PathBuf {
    PathBuf::from(".")
}

fn default_public() -> PathBuf {
    PathBuf::from("public")
}

fn default_bundle_name() -> String {
    "general".to_string()
}

/// One `[[entry]]` table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryConfig {
    pub path: PathBuf,
    /// Bundle name; defaults from `project.bundle_name`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

fn default_entries() -> Vec<EntryConfig> {
    vec![EntryConfig { path: PathBuf::from("src/index.tsx"), name: None }]
}

/// Output path templates
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_script_template")]
    pub script: String,
    #[serde(default = "default_style_template")]
    pub style: String,
    #[serde(default = "default_map_template")]
    pub map: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            script: default_script_template(),
            style: default_style_template(),
            map: default_map_template(),
        }
    }
}

fn default_script_template() -> String {
    DEFAULT_SCRIPT_TEMPLATE.to_string()
}

fn default_style_template() -> String {
    DEFAULT_STYLE_TEMPLATE.to_string()
}

fn default_map_template() -> String {
    DEFAULT_MAP_TEMPLATE.to_string()
}

/// A chain step: either a bare processor name or a table with options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StepConfig {
    Name(String),
    Detailed {
        processor: String,
        #[serde(default)]
        options: StepOptions,
    },
}

impl StepConfig {
    pub fn processor(&self) -> &str {
        match self {
            StepConfig::Name(name) => name,
            StepConfig::Detailed { processor, .. } => processor,
        }
    }

    pub fn to_step(&self) -> TransformStep {
        match self {
            StepConfig::Name(name) => TransformStep::new(name.clone()),
            StepConfig::Detailed { processor, options } => {
                TransformStep::with_options(processor.clone(), options.clone())
            }
        }
    }
}

/// One `[[rules]]` table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleConfig {
    pub kind: RuleKind,
    /// Regular expression matched against the root-relative path
    pub test: String,
    pub chain: Vec<StepConfig>,
}

impl From<&TransformStep> for StepConfig {
    fn from(step: &TransformStep) -> Self {
        if step.options().is_empty() {
            StepConfig::Name(step.processor().to_string())
        } else {
            StepConfig::Detailed { processor: step.processor().to_string(), options: step.options().clone() }
        }
    }
}

fn default_rule_configs() -> Vec<RuleConfig> {
    default_rules()
        .iter()
        .map(|rule| RuleConfig {
            kind: rule.kind(),
            test: rule.test().to_string(),
            chain: rule.chain().steps().iter().map(StepConfig::from).collect(),
        })
        .collect()
}

/// Import resolution settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolveConfig {
    /// Tried in order for extensionless imports
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,
    /// Directories searched for bare specifiers
    #[serde(default = "default_modules")]
    pub modules: Vec<PathBuf>,
}

impl Default for ResolveConfig {
    fn default() -> Self {
        Self { extensions: default_extensions(), modules: default_modules() }
    }
}

fn default_extensions() -> Vec<String> {
    DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect()
}

fn default_modules() -> Vec<PathBuf> {
    vec![PathBuf::from(DEFAULT_MODULE_DIR)]
}

/// Watch mode configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchConfig {
    /// Excluded path segments or globs
    #[serde(default = "default_ignored")]
    pub ignored: Vec<String>,
    /// Polling interval; 0 selects native notifications
    #[serde(default = "default_poll_ms")]
    pub poll_ms: u64,
    /// Debounce delay in milliseconds
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
    /// Clear terminal between rebuilds
    #[serde(default = "default_true")]
    pub clear_screen: bool,
}

fn default_ignored() -> Vec<String> {
    vec!["node_modules".to_string()]
}

fn default_poll_ms() -> u64 {
    1000
}

fn default_debounce_ms() -> u64 {
    100
}

fn default_true() -> bool {
    true
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            ignored: default_ignored(),
            poll_ms: default_poll_ms(),
            debounce_ms: default_debounce_ms(),
            clear_screen: true,
        }
    }
}

/// An external tool registered as a processor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandConfig {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub source_map_args: Vec<String>,
    #[serde(default)]
    pub minify_args: Vec<String>,
}

impl From<&CommandConfig> for CommandSpec {
    fn from(config: &CommandConfig) -> Self {
        CommandSpec {
            program: config.program.clone(),
            args: config.args.clone(),
            source_map_args: config.source_map_args.clone(),
            minify_args: config.minify_args.clone(),
        }
    }
}

/// Complete sitepack.toml configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SitepackConfig {
    #[serde(default)]
    pub project: ProjectConfig,
    #[serde(default = "default_entries", rename = "entry")]
    pub entries: Vec<EntryConfig>,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default = "default_rule_configs")]
    pub rules: Vec<RuleConfig>,
    #[serde(default)]
    pub resolve: ResolveConfig,
    #[serde(default)]
    pub watch: WatchConfig,
    /// Command processors, keyed by the name chains use
    #[serde(default)]
    pub processors: BTreeMap<String, CommandConfig>,
}

impl Default for SitepackConfig {
    fn default() -> Self {
        Self {
            project: ProjectConfig::default(),
            entries: default_entries(),
            output: OutputConfig::default(),
            rules: default_rule_configs(),
            resolve: ResolveConfig::default(),
            watch: WatchConfig::default(),
            processors: BTreeMap::new(),
        }
    }
}

/// Configuration validation error
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigValidationError {
    /// Path to the invalid field (e.g., "rules[1].test")
    pub field: String,
    pub message: String,
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "sitepack.toml: '{}' {}", self.field, self.message)
    }
}

impl SitepackConfig {
    /// Validate the configuration and return every problem found
    pub fn validate(&self) -> Vec<ConfigValidationError> {
        let mut errors = Vec::new();
        let mut push = |field: String, message: String| {
            errors.push(ConfigValidationError { field, message });
        };

        if self.project.name.trim().is_empty() {
            push("project.name".into(), "must be a non-empty string".into());
        }
        if self.project.bundle_name.trim().is_empty() || self.project.bundle_name.contains('/') {
            push("project.bundle_name".into(), "must be a non-empty name without '/'".into());
        }

        if self.entries.is_empty() {
            push("entry".into(), "must contain at least one entry point".into());
        }
        let mut names = HashSet::new();
        for (i, entry) in self.entries.iter().enumerate() {
            if entry.path.as_os_str().is_empty() {
                push(format!("entry[{}].path", i), "must be a non-empty path".into());
            }
            let name = entry
                .name
                .clone()
                .unwrap_or_else(|| crate::descriptor::default_entry_name(&self.project.bundle_name, i));
            if name.is_empty() || name.contains('/') {
                push(format!("entry[{}].name", i), "must be a non-empty name without '/'".into());
            } else if !names.insert(name.clone()) {
                push(format!("entry[{}].name", i), format!("duplicates bundle name '{}'", name));
            }
        }

        for (field, template, allow_file) in [
            ("output.script", &self.output.script, false),
            ("output.style", &self.output.style, false),
            ("output.map", &self.output.map, true),
        ] {
            if let Err(message) = validate_template(template, allow_file) {
                push(field.into(), message);
            }
        }
        if self.output.script == self.output.style {
            push("output.style".into(), "must differ from output.script".into());
        }

        if self.rules.is_empty() {
            push("rules".into(), "must contain at least one rule".into());
        }
        for (i, rule) in self.rules.iter().enumerate() {
            if let Err(e) = regex::Regex::new(&rule.test) {
                push(format!("rules[{}].test", i), format!("is not a valid regular expression: {}", e));
            }
            if rule.chain.is_empty() {
                push(format!("rules[{}].chain", i), "must name at least one processor".into());
            }
            for (j, step) in rule.chain.iter().enumerate() {
                let name = step.processor();
                if !BUILTIN_PROCESSORS.contains(&name) && !self.processors.contains_key(name) {
                    push(format!("rules[{}].chain[{}]", i, j), format!("unknown processor '{}'", name));
                }
            }
        }

        for (i, ext) in self.resolve.extensions.iter().enumerate() {
            if !ext.starts_with('.') || ext.len() < 2 {
                push(format!("resolve.extensions[{}]", i), "must start with '.'".into());
            }
        }

        for (i, pattern) in self.watch.ignored.iter().enumerate() {
            if let Err(e) = glob::Pattern::new(pattern) {
                push(format!("watch.ignored[{}]", i), format!("is not a valid pattern: {}", e));
            }
        }
        if self.watch.debounce_ms == 0 {
            push("watch.debounce_ms".into(), "must be a positive integer".into());
        }

        for (name, command) in &self.processors {
            if command.program.trim().is_empty() {
                push(format!("processors.{}.program", name), "must be a non-empty string".into());
            }
        }

        errors
    }

    /// Check if validation passed
    pub fn is_valid(&self) -> bool {
        self.validate().is_empty()
    }

    /// Configured command processors in name order
    pub fn commands(&self) -> Vec<(String, CommandSpec)> {
        self.processors.iter().map(|(name, c)| (name.clone(), CommandSpec::from(c))).collect()
    }
}
