//! Check command: rule and import diagnostics for individual files

use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use crate::build::graph::{is_json, scan_imports};
use crate::config::CliOverrides;
use crate::descriptor::resolve::normalize;
use crate::descriptor::rule::slash_path;
use crate::descriptor::{PipelineDescriptor, RuleKind};

use super::{expand_source_paths, load_project, EXIT_ERROR, EXIT_INVALID_ARGS, EXIT_SUCCESS};

/// How one import specifier resolved.
#[derive(Debug, Serialize)]
pub struct ImportReport {
    pub specifier: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Diagnostics for one file.
#[derive(Debug, Serialize)]
pub struct FileReport {
    pub file: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<RuleKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rule: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chain: Option<String>,
    pub imports: Vec<ImportReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl FileReport {
    pub fn is_ok(&self) -> bool {
        self.error.is_none() && self.imports.iter().all(|i| i.error.is_none())
    }
}

/// Resolve a file's rule and, for script modules, each of its imports.
pub fn check_file(descriptor: &PipelineDescriptor, path: &Path) -> FileReport {
    let file = slash_path(&descriptor.display_path(path));
    let mut report =
        FileReport { file, kind: None, rule: None, chain: None, imports: Vec::new(), error: None };

    let rule = match descriptor.resolve_rule(path) {
        Ok(rule) => rule,
        Err(e) => {
            report.error = Some(e.to_string());
            return report;
        }
    };
    report.kind = Some(rule.kind());
    report.rule = Some(rule.test().to_string());
    report.chain = Some(rule.chain().to_string());

    if rule.kind() != RuleKind::Script || is_json(path) {
        return report;
    }

    let source = match fs::read_to_string(path) {
        Ok(source) => source,
        Err(e) => {
            report.error = Some(format!("failed to read: {}", e));
            return report;
        }
    };

    let from_dir = path.parent().unwrap_or(descriptor.root());
    for specifier in scan_imports(&source) {
        let import = match descriptor.resolve_import_path(&specifier, from_dir) {
            Ok(resolved) => ImportReport {
                specifier,
                resolved: Some(slash_path(&descriptor.display_path(&resolved))),
                error: None,
            },
            Err(e) => ImportReport { specifier, resolved: None, error: Some(e.to_string()) },
        };
        report.imports.push(import);
    }

    report
}

fn format_report_text(report: &FileReport) -> String {
    let mut lines = Vec::new();
    match (&report.kind, &report.rule, &report.chain) {
        (Some(kind), Some(rule), Some(chain)) => {
            lines.push(format!("{}: {} rule /{}/ -> {}", report.file, kind, rule, chain));
        }
        _ => lines.push(format!("{}:", report.file)),
    }
    if let Some(error) = &report.error {
        lines.push(format!("  error: {}", error));
    }
    for import in &report.imports {
        match (&import.resolved, &import.error) {
            (Some(resolved), _) => lines.push(format!("  import '{}' -> {}", import.specifier, resolved)),
            (None, Some(error)) => lines.push(format!("  import '{}' -> error: {}", import.specifier, error)),
            (None, None) => {}
        }
    }
    lines.join("\n")
}

/// Execute the check command
pub fn run_check(files: &[PathBuf], config_path: Option<&Path>, json: bool, verbose: bool) -> ExitCode {
    let project = match load_project(config_path, &CliOverrides::default(), verbose) {
        Ok(project) => project,
        Err(e) => {
            eprintln!("Error loading config: {}", e);
            return ExitCode::from(EXIT_ERROR);
        }
    };
    let descriptor = &project.descriptor;

    let cwd = std::env::current_dir().unwrap_or_default();
    let mut paths = Vec::new();
    for file in files {
        let absolute = normalize(&cwd.join(file));
        if !absolute.exists() {
            eprintln!("Error: File not found: {}", file.display());
            return ExitCode::from(EXIT_INVALID_ARGS);
        }
        paths.extend(expand_source_paths(&absolute));
    }

    if paths.is_empty() {
        eprintln!("Error: No files to check");
        return ExitCode::from(EXIT_INVALID_ARGS);
    }

    let reports: Vec<FileReport> = paths.iter().map(|p| check_file(descriptor, p)).collect();
    let all_ok = reports.iter().all(FileReport::is_ok);

    if json {
        match serde_json::to_string_pretty(&reports) {
            Ok(text) => println!("{}", text),
            Err(e) => {
                eprintln!("Error: {}", e);
                return ExitCode::from(EXIT_ERROR);
            }
        }
    } else {
        for report in &reports {
            println!("{}", format_report_text(report));
        }
    }

    if all_ok {
        ExitCode::from(EXIT_SUCCESS)
    } else {
        ExitCode::from(EXIT_ERROR)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn project(files: &[(&str, &str)]) -> (TempDir, PipelineDescriptor) {
        let temp = TempDir::new().unwrap();
        for (path, contents) in files {
            let full = temp.path().join(path);
            fs::create_dir_all(full.parent().unwrap()).unwrap();
            fs::write(full, contents).unwrap();
        }
        let descriptor = PipelineDescriptor::builder(temp.path()).entry("src/index.tsx").build().unwrap();
        (temp, descriptor)
    }

    #[test]
    fn test_check_script_imports() {
        let (temp, descriptor) = project(&[
            ("src/index.tsx", "import App from './App';\nimport './Missing';\n"),
            ("src/App.tsx", "export default 1;\n"),
        ]);

        let report = check_file(&descriptor, &temp.path().join("src/index.tsx"));
        assert_eq!(report.file, "src/index.tsx");
        assert_eq!(report.kind, Some(RuleKind::Script));
        assert_eq!(report.chain.as_deref(), Some("typescript"));
        assert_eq!(report.imports.len(), 2);
        assert_eq!(report.imports[0].resolved.as_deref(), Some("src/App.tsx"));
        assert!(report.imports[1].error.as_deref().unwrap().contains("src/Missing"));
        assert!(!report.is_ok());
    }

    #[test]
    fn test_check_style_is_leaf() {
        let (temp, descriptor) = project(&[("src/app.scss", "@import 'nothing';\n")]);

        let report = check_file(&descriptor, &temp.path().join("src/app.scss"));
        assert_eq!(report.kind, Some(RuleKind::Style));
        assert!(report.imports.is_empty());
        assert!(report.is_ok());

        let text = format_report_text(&report);
        assert!(text.starts_with("src/app.scss: style rule"));
    }

    #[test]
    fn test_check_unmatched_file() {
        let (temp, descriptor) = project(&[("src/readme.md", "# hi\n")]);

        let report = check_file(&descriptor, &temp.path().join("src/readme.md"));
        assert!(report.kind.is_none());
        assert!(report.error.as_deref().unwrap().contains("unmatched file type"));
        assert!(format_report_text(&report).contains("error:"));
    }

    #[test]
    fn test_report_json_shape() {
        let (temp, descriptor) = project(&[("src/data.json", "{}")]);

        let report = check_file(&descriptor, &temp.path().join("src/data.json"));
        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["file"], "src/data.json");
        assert_eq!(value["kind"], "script");
        assert!(value.get("error").is_none());
    }
}
