//! Configuration loading and discovery for `sitepack.toml`
//!
//! Provides functions to find, load, merge and turn configuration into a
//! [`PipelineDescriptor`].

use super::schema::SitepackConfig;
use crate::descriptor::{
    DescriptorError, MatchRule, Mode, OutputLayout, PipelineDescriptor, ResolutionPolicy,
    TransformChain, WatchPolicy,
};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// File name looked up by [`find_config`].
pub const CONFIG_FILE_NAME: &str = "sitepack.toml";

/// Configuration loading error
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// File I/O error
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),
    /// TOML parsing error
    #[error("Failed to parse sitepack.toml: {0}")]
    Parse(#[from] toml::de::Error),
    /// Validation error
    #[error("Config validation failed:\n{}", .0.iter().map(|e| format!("  - {}", e)).collect::<Vec<_>>().join("\n"))]
    Validation(Vec<String>),
    /// The validated settings do not form a usable pipeline
    #[error("Invalid pipeline: {0}")]
    Descriptor(#[from] DescriptorError),
}

/// CLI arguments that can override config values
#[derive(Debug, Default, Clone)]
pub struct CliOverrides {
    /// Override the public output root
    pub out: Option<PathBuf>,
    pub mode: Option<Mode>,
    pub source_maps: Option<bool>,
    /// Override the watch polling interval
    pub poll_ms: Option<u64>,
}

/// Find sitepack.toml by walking up from the current working directory.
pub fn find_config() -> Option<PathBuf> {
    env::current_dir().ok().and_then(find_config_from)
}

/// Find sitepack.toml by walking up from a specific directory.
pub fn find_config_from(start: PathBuf) -> Option<PathBuf> {
    let mut current = start;

    loop {
        let config_path = current.join(CONFIG_FILE_NAME);
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            return None;
        }
    }
}

/// Load configuration from a sitepack.toml file.
///
/// If a path is provided, loads from that file. Otherwise, uses
/// [`find_config`] to locate one. If none is found, returns the defaults.
///
/// # Example
/// ```ignore
/// let config = load_config(None)?;
/// let config = load_config(Some(Path::new("site/sitepack.toml")))?;
/// ```
pub fn load_config(path: Option<&Path>) -> Result<SitepackConfig, ConfigError> {
    let config_path = match path {
        Some(p) => Some(p.to_path_buf()),
        None => find_config(),
    };

    match config_path {
        Some(p) => load_config_file(&p),
        None => Ok(default_config()),
    }
}

fn load_config_file(path: &Path) -> Result<SitepackConfig, ConfigError> {
    let contents = fs::read_to_string(path)?;
    let config: SitepackConfig = toml::from_str(&contents)?;
    check(&config)?;
    Ok(config)
}

fn check(config: &SitepackConfig) -> Result<(), ConfigError> {
    let errors = config.validate();
    if errors.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::Validation(errors.into_iter().map(|e| e.to_string()).collect()))
    }
}

/// Configuration used when no sitepack.toml is found.
///
/// The project name is taken from the current directory.
pub fn default_config() -> SitepackConfig {
    let mut config = SitepackConfig::default();
    if let Some(name) =
        env::current_dir().ok().and_then(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
    {
        config.project.name = name;
    }
    config
}

/// Merge CLI overrides into a configuration.
///
/// CLI arguments take precedence over config file values.
pub fn merge_cli_overrides(config: &mut SitepackConfig, overrides: &CliOverrides) {
    if let Some(ref out) = overrides.out {
        config.project.public = out.clone();
    }
    if let Some(mode) = overrides.mode {
        config.project.mode = mode;
    }
    if overrides.source_maps.is_some() {
        config.project.source_maps = overrides.source_maps;
    }
    if let Some(poll_ms) = overrides.poll_ms {
        config.watch.poll_ms = poll_ms;
    }
}

/// Get the project root directory from a config file path.
pub fn project_root(config_path: &Path) -> Option<&Path> {
    config_path.parent()
}

/// Resolve a path relative to the project root.
///
/// If the path is absolute, returns it unchanged.
pub fn resolve_path(project_root: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        project_root.join(path)
    }
}

/// Build the immutable pipeline description from a configuration.
///
/// `project_root` is the directory holding sitepack.toml; `project.root`
/// and `project.public` are resolved against it.
pub fn build_descriptor(
    config: &SitepackConfig,
    project_root: &Path,
) -> Result<PipelineDescriptor, ConfigError> {
    check(config)?;

    let root = crate::descriptor::resolve::normalize(&resolve_path(project_root, &config.project.root));
    let public = crate::descriptor::resolve::normalize(&resolve_path(project_root, &config.project.public));

    let mut rules = Vec::with_capacity(config.rules.len());
    for (i, rule) in config.rules.iter().enumerate() {
        let chain = TransformChain::new(rule.chain.iter().map(|s| s.to_step()).collect());
        let rule = MatchRule::new(rule.kind, &rule.test, chain)
            .map_err(|e| ConfigError::Validation(vec![format!("rules[{}].test: {}", i, e)]))?;
        rules.push(rule);
    }

    let watch = WatchPolicy::new(&config.watch.ignored, config.watch.poll_ms, config.watch.debounce_ms)
        .map_err(|e| ConfigError::Validation(vec![format!("watch.ignored: {}", e)]))?;

    let mut builder = PipelineDescriptor::builder(root)
        .bundle_name(config.project.bundle_name.clone())
        .rules(rules)
        .resolution(ResolutionPolicy::new(config.resolve.extensions.clone(), config.resolve.modules.clone()))
        .output(OutputLayout::new(
            public,
            config.output.script.clone(),
            config.output.style.clone(),
            config.output.map.clone(),
        ))
        .watch(watch)
        .mode(config.project.mode)
        .source_maps(config.project.source_maps);

    for entry in &config.entries {
        builder = match &entry.name {
            Some(name) => builder.named_entry(name.clone(), entry.path.clone()),
            None => builder.entry(entry.path.clone()),
        };
    }

    Ok(builder.build()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{OutputKind, RuleKind};
    use std::fs::File;
    use std::io::Write;
    use tempfile::TempDir;

    fn write_config(dir: &Path, contents: &str) -> PathBuf {
        let config_path = dir.join(CONFIG_FILE_NAME);
        File::create(&config_path)
            .expect("should create config file")
            .write_all(contents.as_bytes())
            .expect("should write config content");
        config_path
    }

    #[test]
    fn test_find_config_in_current_dir() {
        let temp = TempDir::new().expect("should create temp dir");
        let config_path = write_config(temp.path(), "[project]\nname = \"test\"");

        let found = find_config_from(temp.path().to_path_buf());
        assert_eq!(found, Some(config_path));
    }

    #[test]
    fn test_find_config_in_parent_dir() {
        let temp = TempDir::new().expect("should create temp dir");
        let config_path = write_config(temp.path(), "[project]\nname = \"test\"");

        let subdir = temp.path().join("src").join("components");
        fs::create_dir_all(&subdir).expect("should create subdirectories");

        let found = find_config_from(subdir);
        assert_eq!(found, Some(config_path));
    }

    #[test]
    fn test_load_config_from_file() {
        let temp = TempDir::new().expect("should create temp dir");
        let config_path = write_config(
            temp.path(),
            r#"
[project]
name = "docs"
mode = "development"

[[entry]]
path = "src/app.ts"
"#,
        );

        let config = load_config(Some(&config_path)).expect("should load valid config");
        assert_eq!(config.project.name, "docs");
        assert_eq!(config.project.mode, Mode::Development);
        assert_eq!(config.entries[0].path, PathBuf::from("src/app.ts"));
    }

    #[test]
    fn test_load_config_explicit_missing_file_errors() {
        let temp = TempDir::new().expect("should create temp dir");
        let result = load_config(Some(&temp.path().join("nonexistent.toml")));
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }

    #[test]
    fn test_load_config_invalid_toml() {
        let temp = TempDir::new().expect("should create temp dir");
        let config_path = write_config(temp.path(), "this is not valid toml {{{");

        let result = load_config(Some(&config_path));
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_load_config_validation_error() {
        let temp = TempDir::new().expect("should create temp dir");
        let config_path = write_config(temp.path(), "[project]\nname = \"\"\n\n[watch]\ndebounce_ms = 0\n");

        match load_config(Some(&config_path)) {
            Err(ConfigError::Validation(errors)) => assert_eq!(errors.len(), 2),
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_merge_cli_overrides() {
        let mut config = default_config();
        let overrides = CliOverrides {
            out: Some(PathBuf::from("dist")),
            mode: Some(Mode::Development),
            source_maps: Some(false),
            poll_ms: Some(0),
        };

        merge_cli_overrides(&mut config, &overrides);
        assert_eq!(config.project.public, PathBuf::from("dist"));
        assert_eq!(config.project.mode, Mode::Development);
        assert_eq!(config.project.source_maps, Some(false));
        assert_eq!(config.watch.poll_ms, 0);
    }

    #[test]
    fn test_merge_cli_overrides_empty_keeps_config() {
        let mut config = default_config();
        config.project.source_maps = Some(true);
        merge_cli_overrides(&mut config, &CliOverrides::default());
        assert_eq!(config.project.source_maps, Some(true));
        assert_eq!(config.watch.poll_ms, 1000);
    }

    #[test]
    fn test_resolve_path() {
        let root = Path::new("/project");
        assert_eq!(resolve_path(root, Path::new("/other/path")), PathBuf::from("/other/path"));
        assert_eq!(resolve_path(root, Path::new("public")), PathBuf::from("/project/public"));
    }

    #[test]
    fn test_project_root() {
        let config_path = Path::new("/project/sitepack.toml");
        assert_eq!(project_root(config_path), Some(Path::new("/project")));
    }

    #[test]
    fn test_build_descriptor_defaults() {
        let descriptor = build_descriptor(&SitepackConfig::default(), Path::new("/site")).unwrap();
        assert_eq!(descriptor.root(), Path::new("/site"));
        assert_eq!(descriptor.entries()[0].name, "general");
        assert_eq!(descriptor.entries()[0].path, PathBuf::from("src/index.tsx"));
        assert_eq!(
            descriptor.output_path_for(OutputKind::ScriptBundle, "general"),
            PathBuf::from("/site/public/js/general.js")
        );
        assert_eq!(descriptor.poll_interval_ms(), 1000);
        assert!(!descriptor.should_watch(Path::new("/site/node_modules/x/index.js")));
        assert_eq!(descriptor.resolve_rule(Path::new("src/app.scss")).unwrap().kind(), RuleKind::Style);
        assert!(descriptor.minify_enabled());
    }

    #[test]
    fn test_build_descriptor_rejects_invalid() {
        let mut config = SitepackConfig::default();
        config.rules[0].test = "(".to_string();
        assert!(matches!(
            build_descriptor(&config, Path::new("/site")),
            Err(ConfigError::Validation(_))
        ));
    }
}
