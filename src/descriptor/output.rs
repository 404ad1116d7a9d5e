//! Output path templates.

use std::fmt;
use std::path::{Component, Path, PathBuf};

/// Kind of artifact written by a build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutputKind {
    ScriptBundle,
    StyleBundle,
    MapFile,
}

impl fmt::Display for OutputKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputKind::ScriptBundle => write!(f, "script"),
            OutputKind::StyleBundle => write!(f, "style"),
            OutputKind::MapFile => write!(f, "map"),
        }
    }
}

/// A kind paired with its path template.
///
/// Templates are relative to the public root. `[name]` expands to the
/// bundle name; the map template may also use `[file]`, the expanded
/// script bundle path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputTarget {
    pub kind: OutputKind,
    pub template: String,
}

/// The public root plus one template per output kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLayout {
    root: PathBuf,
    script: OutputTarget,
    style: OutputTarget,
    map: OutputTarget,
}

impl OutputLayout {
    pub fn new(
        root: impl Into<PathBuf>,
        script: impl Into<String>,
        style: impl Into<String>,
        map: impl Into<String>,
    ) -> Self {
        Self {
            root: root.into(),
            script: OutputTarget { kind: OutputKind::ScriptBundle, template: script.into() },
            style: OutputTarget { kind: OutputKind::StyleBundle, template: style.into() },
            map: OutputTarget { kind: OutputKind::MapFile, template: map.into() },
        }
    }

    /// Layout with the default `js/[name].js`, `css/[name].css`, `[file].map` templates.
    pub fn with_defaults(root: impl Into<PathBuf>) -> Self {
        Self::new(root, DEFAULT_SCRIPT_TEMPLATE, DEFAULT_STYLE_TEMPLATE, DEFAULT_MAP_TEMPLATE)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Expanded path relative to the public root.
    pub fn relative_path_for(&self, kind: OutputKind, bundle_name: &str) -> String {
        match kind {
            OutputKind::ScriptBundle => expand(&self.script.template, bundle_name, None),
            OutputKind::StyleBundle => expand(&self.style.template, bundle_name, None),
            OutputKind::MapFile => {
                let file = expand(&self.script.template, bundle_name, None);
                expand(&self.map.template, bundle_name, Some(&file))
            }
        }
    }

    /// Expanded absolute output path.
    pub fn path_for(&self, kind: OutputKind, bundle_name: &str) -> PathBuf {
        self.root.join(self.relative_path_for(kind, bundle_name))
    }

    /// The map location as referenced from the script bundle.
    pub fn map_url_for(&self, bundle_name: &str) -> String {
        let script = PathBuf::from(self.relative_path_for(OutputKind::ScriptBundle, bundle_name));
        let map = PathBuf::from(self.relative_path_for(OutputKind::MapFile, bundle_name));
        let from = script.parent().unwrap_or_else(|| Path::new(""));
        relative_url(from, &map)
    }
}

pub const DEFAULT_SCRIPT_TEMPLATE: &str = "js/[name].js";
pub const DEFAULT_STYLE_TEMPLATE: &str = "css/[name].css";
pub const DEFAULT_MAP_TEMPLATE: &str = "[file].map";

fn expand(template: &str, name: &str, file: Option<&str>) -> String {
    let expanded = template.replace("[name]", name);
    match file {
        Some(file) => expanded.replace("[file]", file),
        None => expanded,
    }
}

/// Check that a template stays inside the public root.
pub fn validate_template(template: &str, allow_file: bool) -> Result<(), String> {
    if template.trim().is_empty() {
        return Err("must not be empty".to_string());
    }
    if !allow_file && template.contains("[file]") {
        return Err("only the map template may use [file]".to_string());
    }
    let path = Path::new(template);
    if path.is_absolute() {
        return Err("must be relative to the public root".to_string());
    }
    if path.components().any(|c| matches!(c, Component::ParentDir)) {
        return Err("must not escape the public root".to_string());
    }
    if template.ends_with('/') {
        return Err("must name a file".to_string());
    }
    Ok(())
}

/// Forward-slash relative reference from directory `from` to file `to`.
fn relative_url(from: &Path, to: &Path) -> String {
    let from: Vec<_> = from.components().collect();
    let to_parts: Vec<_> = to.components().collect();
    let common = from.iter().zip(to_parts.iter()).take_while(|(a, b)| a == b).count();

    let mut parts: Vec<String> = Vec::new();
    for _ in common..from.len() {
        parts.push("..".to_string());
    }
    for part in &to_parts[common..] {
        parts.push(part.as_os_str().to_string_lossy().into_owned());
    }
    parts.join("/")
}
