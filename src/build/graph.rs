//! Dependency graph discovery.
//!
//! Starting at an entry point, every reachable module is read, matched to
//! a rule and, for script sources, scanned for import specifiers. The walk
//! is a depth-first preorder, so discovery order is stable for a given tree.

use crate::build::cache::content_hash;
use crate::build::BuildError;
use crate::descriptor::rule::slash_path;
use crate::descriptor::{ConfigurationError, EntryPoint, PipelineDescriptor, RuleKind};
use regex::Regex;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// One module reached from an entry.
#[derive(Debug, Clone)]
pub struct ModuleNode {
    /// Root-relative path with forward slashes
    pub id: String,
    /// Absolute path on disk
    pub path: PathBuf,
    /// Index of the matched rule
    pub rule: usize,
    pub kind: RuleKind,
    pub source: String,
    pub hash: u64,
    /// `(specifier as written, resolved module id)` in source order
    pub dependencies: Vec<(String, String)>,
}

/// Modules reachable from one entry, in discovery order.
#[derive(Debug, Clone)]
pub struct ModuleGraph {
    entry: String,
    modules: Vec<ModuleNode>,
    index: HashMap<String, usize>,
}

impl ModuleGraph {
    /// Walk the graph from `entry`.
    ///
    /// Fails on the first module that matches no rule or import that does
    /// not resolve.
    pub fn discover(descriptor: &PipelineDescriptor, entry: &EntryPoint) -> Result<Self, BuildError> {
        let entry_path = descriptor.entry_path(entry);
        if !entry_path.is_file() {
            return Err(BuildError::Configuration {
                file: entry.path.clone(),
                source: ConfigurationError::MissingEntry { path: entry.path.clone() },
            });
        }

        let mut walker = Walker { descriptor, modules: Vec::new(), index: HashMap::new() };
        let entry_id = walker.visit(&entry_path)?;

        Ok(Self { entry: entry_id, modules: walker.modules, index: walker.index })
    }

    /// Id of the entry module.
    pub fn entry(&self) -> &str {
        &self.entry
    }

    pub fn modules(&self) -> &[ModuleNode] {
        &self.modules
    }

    pub fn get(&self, id: &str) -> Option<&ModuleNode> {
        self.index.get(id).map(|&i| &self.modules[i])
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}

struct Walker<'a> {
    descriptor: &'a PipelineDescriptor,
    modules: Vec<ModuleNode>,
    index: HashMap<String, usize>,
}

impl Walker<'_> {
    fn visit(&mut self, path: &Path) -> Result<String, BuildError> {
        let relative = self.descriptor.display_path(path);
        let id = slash_path(&relative);
        if self.index.contains_key(&id) {
            return Ok(id);
        }

        let rule = self
            .descriptor
            .resolve_rule_index(path)
            .map_err(|source| BuildError::Configuration { file: relative.clone(), source })?;
        let kind = self.descriptor.rules()[rule].kind();

        let source = fs::read_to_string(path)
            .map_err(|source| BuildError::Read { path: relative.clone(), source })?;

        let specifiers = if kind == RuleKind::Script && !is_json(path) {
            scan_imports(&source)
        } else {
            Vec::new()
        };

        let position = self.modules.len();
        self.index.insert(id.clone(), position);
        self.modules.push(ModuleNode {
            id: id.clone(),
            path: path.to_path_buf(),
            rule,
            kind,
            hash: content_hash(source.as_bytes()),
            source,
            dependencies: Vec::new(),
        });

        let from_dir = path.parent().unwrap_or(self.descriptor.root());
        let mut dependencies = Vec::with_capacity(specifiers.len());
        for specifier in specifiers {
            let resolved = self
                .descriptor
                .resolve_import_path(&specifier, from_dir)
                .map_err(|source| BuildError::Configuration { file: relative.clone(), source })?;
            let dep_id = self.visit(&resolved)?;
            dependencies.push((specifier, dep_id));
        }
        self.modules[position].dependencies = dependencies;

        Ok(id)
    }
}

pub(crate) fn is_json(path: &Path) -> bool {
    path.extension().is_some_and(|e| e.eq_ignore_ascii_case("json"))
}

/// Blank out `//` and `/* */` comments, leaving string and template
/// literals intact. Newlines inside block comments are kept.
fn strip_comments(source: &str) -> String {
    let mut out = String::with_capacity(source.len());
    let mut chars = source.chars().peekable();
    let mut quote: Option<char> = None;

    while let Some(c) = chars.next() {
        if let Some(q) = quote {
            out.push(c);
            if c == '\\' {
                if let Some(escaped) = chars.next() {
                    out.push(escaped);
                }
            } else if c == q || (c == '\n' && q != '`') {
                quote = None;
            }
            continue;
        }

        match c {
            '\'' | '"' | '`' => {
                quote = Some(c);
                out.push(c);
            }
            '/' if chars.peek() == Some(&'/') => {
                while chars.peek().is_some_and(|&next| next != '\n') {
                    chars.next();
                }
                out.push(' ');
            }
            '/' if chars.peek() == Some(&'*') => {
                chars.next();
                let mut prev = '\0';
                for next in chars.by_ref() {
                    if next == '\n' {
                        out.push('\n');
                    }
                    if prev == '*' && next == '/' {
                        break;
                    }
                    prev = next;
                }
                out.push(' ');
            }
            _ => out.push(c),
        }
    }
    out
}

fn static_import_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r#"(?:^|[^\w$.])(?:import|export)(\s+type\b)?\s*(?:[\w*{}\s,$]+?\s*from\s*)?["']([^"'\n]+)["']"#,
        )
        .expect("import pattern is valid")
    })
}

fn call_import_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?:^|[^\w$.])(?:require|import)\s*\(\s*["']([^"'\n]+)["']\s*\)"#)
            .expect("require pattern is valid")
    })
}

/// Import specifiers in source order, without duplicates.
///
/// Recognizes `import … from`, bare `import '…'`, `export … from`,
/// `require('…')` and `import('…')`. Type-only imports are skipped since
/// they vanish after compilation.
pub fn scan_imports(source: &str) -> Vec<String> {
    let code = strip_comments(source);

    let mut found: Vec<(usize, String)> = Vec::new();
    for caps in static_import_regex().captures_iter(&code) {
        if caps.get(1).is_some() {
            continue;
        }
        if let Some(m) = caps.get(2) {
            found.push((m.start(), m.as_str().to_string()));
        }
    }
    for caps in call_import_regex().captures_iter(&code) {
        if let Some(m) = caps.get(1) {
            found.push((m.start(), m.as_str().to_string()));
        }
    }
    found.sort_by_key(|(start, _)| *start);

    let mut specifiers: Vec<String> = Vec::with_capacity(found.len());
    for (_, specifier) in found {
        if !specifiers.contains(&specifier) {
            specifiers.push(specifier);
        }
    }
    specifiers
}
