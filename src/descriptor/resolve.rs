//! Import resolution policy.
//!
//! Resolves an import specifier to a file on disk by trying the exact
//! path, then each policy extension in order, then directory index files.
//! Bare specifiers (`react`, `lodash/fp`) are looked up in module
//! directories from the importer's directory up to the project root.

use super::ConfigurationError;
use std::ffi::OsString;
use std::fs;
use std::path::{Component, Path, PathBuf};

/// Extensions tried for extensionless imports when none are configured.
pub const DEFAULT_EXTENSIONS: &[&str] = &[".ts", ".tsx", ".js", ".json", ".scss"];

/// Directory searched for bare specifiers when none are configured.
pub const DEFAULT_MODULE_DIR: &str = "node_modules";

/// Ordered extensions tried for extensionless imports, plus module directories.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolutionPolicy {
    extensions: Vec<String>,
    modules: Vec<PathBuf>,
}

impl Default for ResolutionPolicy {
    fn default() -> Self {
        Self::new(
            DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
            vec![PathBuf::from(DEFAULT_MODULE_DIR)],
        )
    }
}

impl ResolutionPolicy {
    pub fn new(extensions: Vec<String>, modules: Vec<PathBuf>) -> Self {
        Self { extensions, modules }
    }

    /// Extensions in precedence order.
    pub fn extensions(&self) -> &[String] {
        &self.extensions
    }

    pub fn modules(&self) -> &[PathBuf] {
        &self.modules
    }

    /// Resolve `specifier` as written in a module located in `from_dir`.
    ///
    /// `root` bounds the module-directory walk for bare specifiers and is
    /// used to report the failed request relative to the project.
    pub fn resolve(
        &self,
        root: &Path,
        specifier: &str,
        from_dir: &Path,
    ) -> Result<PathBuf, ConfigurationError> {
        let found = if is_relative_specifier(specifier) {
            self.resolve_file_or_dir(&normalize(&from_dir.join(specifier)))
        } else {
            self.resolve_bare(root, specifier, from_dir)
        };

        found.ok_or_else(|| ConfigurationError::UnresolvedImport {
            specifier: specifier.to_string(),
            request: requested_path(root, specifier, from_dir),
        })
    }

    /// Try `base` itself, `base` + each extension, then `base/index` + each extension.
    fn resolve_file_or_dir(&self, base: &Path) -> Option<PathBuf> {
        if base.is_file() {
            return Some(base.to_path_buf());
        }

        for ext in &self.extensions {
            let candidate = with_appended_extension(base, ext);
            if candidate.is_file() {
                return Some(candidate);
            }
        }

        if base.is_dir() {
            for ext in &self.extensions {
                let candidate = base.join(format!("index{}", ext));
                if candidate.is_file() {
                    return Some(candidate);
                }
            }
        }

        None
    }

    fn resolve_bare(&self, root: &Path, specifier: &str, from_dir: &Path) -> Option<PathBuf> {
        let mut dir = Some(from_dir);
        while let Some(current) = dir {
            for modules in &self.modules {
                let base = current.join(modules).join(specifier);
                if let Some(found) = self.resolve_package(&base) {
                    return Some(normalize(&found));
                }
            }

            if current == root || !current.starts_with(root) {
                break;
            }
            dir = current.parent();
        }
        None
    }

    /// Honor a package.json `main` field before the usual file/dir lookup.
    fn resolve_package(&self, base: &Path) -> Option<PathBuf> {
        let manifest = base.join("package.json");
        if manifest.is_file() {
            if let Some(main) = read_package_main(&manifest) {
                if let Some(found) = self.resolve_file_or_dir(&base.join(main)) {
                    return Some(found);
                }
            }
        }
        self.resolve_file_or_dir(base)
    }
}

fn read_package_main(manifest: &Path) -> Option<String> {
    let contents = fs::read_to_string(manifest).ok()?;
    let value: serde_json::Value = serde_json::from_str(&contents).ok()?;
    value.get("main")?.as_str().map(|s| s.to_string())
}

/// Whether a specifier is path-like rather than a package name.
pub fn is_relative_specifier(specifier: &str) -> bool {
    specifier == "."
        || specifier == ".."
        || specifier.starts_with("./")
        || specifier.starts_with("../")
        || Path::new(specifier).is_absolute()
}

/// Append an extension without replacing an existing one (`a.config` -> `a.config.ts`).
fn with_appended_extension(base: &Path, ext: &str) -> PathBuf {
    let mut name = OsString::from(base.as_os_str());
    name.push(ext);
    PathBuf::from(name)
}

fn requested_path(root: &Path, specifier: &str, from_dir: &Path) -> PathBuf {
    if !is_relative_specifier(specifier) {
        return PathBuf::from(specifier);
    }
    let full = normalize(&from_dir.join(specifier));
    match full.strip_prefix(root) {
        Ok(relative) => relative.to_path_buf(),
        Err(_) => full,
    }
}

/// Lexically normalize a path, dropping `.` and folding `..`.
pub fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if matches!(out.components().next_back(), Some(Component::Normal(_))) {
                    out.pop();
                } else {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use tempfile::TempDir;

    fn touch(root: &Path, rel: &str) -> PathBuf {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        File::create(&path).unwrap();
        path
    }

    #[test]
    fn test_ts_beats_js() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        let ts = touch(root, "src/foo.ts");
        touch(root, "src/foo.js");

        let policy = ResolutionPolicy::default();
        let found = policy.resolve(root, "./foo", &root.join("src")).unwrap();
        assert_eq!(found, ts);
    }

    #[test]
    fn test_policy_order_decides_precedence() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        touch(root, "src/foo.ts");
        let js = touch(root, "src/foo.js");

        let policy = ResolutionPolicy::new(vec![".js".into(), ".ts".into()], vec![]);
        let found = policy.resolve(root, "./foo", &root.join("src")).unwrap();
        assert_eq!(found, js);
    }

    #[test]
    fn test_unresolved_reports_request() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        fs::create_dir_all(root.join("src")).unwrap();

        let policy = ResolutionPolicy::default();
        let err = policy.resolve(root, "./Missing", &root.join("src")).unwrap_err();
        assert_eq!(
            err,
            ConfigurationError::UnresolvedImport {
                specifier: "./Missing".to_string(),
                request: PathBuf::from("src/Missing"),
            }
        );
    }

    #[test]
    fn test_exact_file_wins() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        let scss = touch(root, "src/app.scss");
        touch(root, "src/app.scss.ts");

        let policy = ResolutionPolicy::default();
        let found = policy.resolve(root, "./app.scss", &root.join("src")).unwrap();
        assert_eq!(found, scss);
    }

    #[test]
    fn test_directory_index() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        let index = touch(root, "src/components/index.tsx");

        let policy = ResolutionPolicy::default();
        let found = policy.resolve(root, "./components", &root.join("src")).unwrap();
        assert_eq!(found, index);
    }

    #[test]
    fn test_parent_relative_import() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        let util = touch(root, "src/util.ts");
        fs::create_dir_all(root.join("src/pages")).unwrap();

        let policy = ResolutionPolicy::default();
        let found = policy.resolve(root, "../util", &root.join("src/pages")).unwrap();
        assert_eq!(found, util);
    }

    #[test]
    fn test_bare_specifier_with_package_main() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        fs::create_dir_all(root.join("node_modules/tiny/lib")).unwrap();
        fs::write(root.join("node_modules/tiny/package.json"), r#"{"main": "lib/tiny"}"#).unwrap();
        let main = touch(root, "node_modules/tiny/lib/tiny.js");
        fs::create_dir_all(root.join("src")).unwrap();

        let policy = ResolutionPolicy::default();
        let found = policy.resolve(root, "tiny", &root.join("src")).unwrap();
        assert_eq!(found, main);
    }

    #[test]
    fn test_bare_specifier_missing() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        fs::create_dir_all(root.join("src")).unwrap();

        let policy = ResolutionPolicy::default();
        let err = policy.resolve(root, "left-pad", &root.join("src")).unwrap_err();
        assert!(matches!(
            err,
            ConfigurationError::UnresolvedImport { ref request, .. } if request == Path::new("left-pad")
        ));
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize(Path::new("/a/b/./c/../d")), PathBuf::from("/a/b/d"));
        assert_eq!(normalize(Path::new("src/./x")), PathBuf::from("src/x"));
        assert_eq!(normalize(Path::new("../x")), PathBuf::from("../x"));
    }

    #[test]
    fn test_is_relative_specifier() {
        assert!(is_relative_specifier("./a"));
        assert!(is_relative_specifier("../a"));
        assert!(!is_relative_specifier("react"));
        assert!(!is_relative_specifier("@scope/pkg"));
    }
}
