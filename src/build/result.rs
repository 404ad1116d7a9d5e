//! Build result types.
//!
//! Contains types for representing the outcome of a successful build.
//! Failures are reported through [`BuildError`](crate::build::BuildError).

use crate::descriptor::OutputKind;
use std::path::PathBuf;
use std::time::Duration;

/// One artifact written (or planned, in a dry run).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenArtifact {
    pub kind: OutputKind,
    pub path: PathBuf,
    pub bytes: usize,
}

/// Result of building a single entry's bundles.
#[derive(Debug, Clone)]
pub struct BundleResult {
    /// Bundle name (`[name]` in templates)
    pub name: String,
    /// Modules reached from the entry
    pub modules: usize,
    /// Modules whose chain ran in this build
    pub transformed: usize,
    /// Modules served from the transform cache
    pub cached: usize,
    /// Artifacts in write order
    pub artifacts: Vec<WrittenArtifact>,
}

impl BundleResult {
    pub fn artifact(&self, kind: OutputKind) -> Option<&WrittenArtifact> {
        self.artifacts.iter().find(|a| a.kind == kind)
    }
}

/// Result of a complete build run.
#[derive(Debug, Default)]
pub struct BuildResult {
    /// Results for each entry, in declaration order
    pub bundles: Vec<BundleResult>,
    /// Total build duration
    pub total_duration: Duration,
    /// Nothing was written
    pub dry_run: bool,
}

impl BuildResult {
    /// Create a new empty build result.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_bundle(&mut self, bundle: BundleResult) {
        self.bundles.push(bundle);
    }

    /// Set the total duration.
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.total_duration = duration;
        self
    }

    /// Every artifact path, in write order.
    pub fn all_outputs(&self) -> Vec<&PathBuf> {
        self.bundles.iter().flat_map(|b| b.artifacts.iter().map(|a| &a.path)).collect()
    }

    pub fn module_count(&self) -> usize {
        self.bundles.iter().map(|b| b.modules).sum()
    }

    pub fn cached_count(&self) -> usize {
        self.bundles.iter().map(|b| b.cached).sum()
    }

    /// Format a summary of the build result.
    pub fn summary(&self) -> String {
        let mut lines = Vec::new();

        let verb = if self.dry_run { "Planned" } else { "Built" };
        lines.push(format!(
            "{} {} bundle(s) from {} module(s) ({} cached) in {:?}",
            verb,
            self.bundles.len(),
            self.module_count(),
            self.cached_count(),
            self.total_duration
        ));

        for bundle in &self.bundles {
            for artifact in &bundle.artifacts {
                lines.push(format!(
                    "  {} [{}] {} ({} bytes)",
                    bundle.name,
                    artifact.kind,
                    artifact.path.display(),
                    artifact.bytes
                ));
            }
        }

        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bundle(name: &str) -> BundleResult {
        BundleResult {
            name: name.to_string(),
            modules: 3,
            transformed: 2,
            cached: 1,
            artifacts: vec![
                WrittenArtifact { kind: OutputKind::ScriptBundle, path: PathBuf::from("public/js/a.js"), bytes: 10 },
                WrittenArtifact { kind: OutputKind::StyleBundle, path: PathBuf::from("public/css/a.css"), bytes: 0 },
            ],
        }
    }

    #[test]
    fn test_counts_and_outputs() {
        let mut result = BuildResult::new();
        result.add_bundle(bundle("general"));
        result.add_bundle(bundle("admin"));

        assert_eq!(result.module_count(), 6);
        assert_eq!(result.cached_count(), 2);
        assert_eq!(result.all_outputs().len(), 4);
        assert!(result.bundles[0].artifact(OutputKind::MapFile).is_none());
    }

    #[test]
    fn test_summary() {
        let mut result = BuildResult::new();
        result.add_bundle(bundle("general"));

        let summary = result.with_duration(Duration::from_millis(100)).summary();
        assert!(summary.starts_with("Built 1 bundle(s) from 3 module(s) (1 cached)"));
        assert!(summary.contains("general [script] public/js/a.js (10 bytes)"));
    }

    #[test]
    fn test_dry_run_summary() {
        let result = BuildResult { dry_run: true, ..Default::default() };
        assert!(result.summary().starts_with("Planned"));
    }
}
