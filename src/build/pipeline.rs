//! Build pipeline orchestration.
//!
//! A build runs in three phases:
//!
//! 1. **Discover**: walk each entry's dependency graph, resolving rules
//!    and imports. The first resolution failure aborts the build.
//! 2. **Transform**: run every module through its rule's chain on the
//!    rayon pool, reusing cached outputs where nothing changed.
//! 3. **Write**: assemble every bundle in memory, then write artifacts
//!    atomically. Nothing is written unless all bundles assembled.
//!
//! Clones share one write lock, so two builds never interleave their
//! artifacts and the last build to pass its supersession check wins.

use crate::build::bundle::{assemble_script, assemble_style, MapOptions};
use crate::build::cache::{content_hash, SharedCache, TransformCache};
use crate::build::generation::BuildTicket;
use crate::build::graph::{ModuleGraph, ModuleNode};
use crate::build::write::write_atomic;
use crate::build::{
    BuildContext, BuildError, BuildResult, BundleResult, TransformError, WrittenArtifact,
};
use crate::descriptor::{EntryPoint, OutputKind, RuleKind};
use crate::transform::TransformInput;
use rayon::prelude::*;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tracing::{debug, info};

/// Build pipeline for executing builds.
///
/// Cloning shares the transform cache and the write lock, so a watch
/// session can hand a clone to each rebuild thread.
#[derive(Debug, Clone)]
pub struct BuildPipeline {
    context: BuildContext,
    cache: SharedCache,
    write_lock: Arc<Mutex<()>>,
    /// Whether to do a dry run (don't write artifacts)
    dry_run: bool,
}

/// A bundle assembled in memory, waiting to be written.
struct PendingBundle {
    name: String,
    modules: usize,
    transformed: usize,
    cached: usize,
    artifacts: Vec<(OutputKind, PathBuf, String)>,
}

impl BuildPipeline {
    /// Create a new build pipeline.
    pub fn new(context: BuildContext) -> Self {
        Self { context, cache: TransformCache::shared(), write_lock: Arc::new(Mutex::new(())), dry_run: false }
    }

    /// Set dry-run mode (don't write anything).
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Share an existing transform cache.
    pub fn with_cache(mut self, cache: SharedCache) -> Self {
        self.cache = cache;
        self
    }

    pub fn context(&self) -> &BuildContext {
        &self.context
    }

    pub fn cache(&self) -> &SharedCache {
        &self.cache
    }

    /// Drop cached outputs made stale by changes to `paths`.
    ///
    /// Style processors read partials that never enter the module graph, so
    /// a change to any file that is not a script module drops every cached
    /// style output along with the changed paths' own entries.
    pub fn invalidate(&self, paths: &[PathBuf]) -> usize {
        let descriptor = self.context.descriptor();
        let mut cache = self.lock_cache();

        let mut dropped = paths.iter().filter(|path| cache.invalidate(path)).count();
        let styles_stale = paths.iter().any(|path| {
            !matches!(descriptor.resolve_rule(path), Ok(rule) if rule.kind() == RuleKind::Script)
        });
        if styles_stale {
            dropped += cache.invalidate_kind(RuleKind::Style);
        }

        debug!(changed = paths.len(), dropped, styles_stale, "invalidated transform cache");
        dropped
    }

    /// Run a one-shot build.
    pub fn build(&self) -> Result<BuildResult, BuildError> {
        self.build_with(&BuildTicket::detached())
    }

    /// Run a build that gives up once `ticket` is superseded.
    pub fn build_with(&self, ticket: &BuildTicket) -> Result<BuildResult, BuildError> {
        let start = Instant::now();
        let descriptor = self.context.descriptor();

        let mut pending = Vec::with_capacity(descriptor.entries().len());
        for entry in descriptor.entries() {
            pending.push(self.assemble_entry(entry, ticket)?);
        }

        let _writing = self.write_lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if ticket.is_superseded() {
            debug!(generation = ticket.generation(), "build superseded before write");
            return Err(BuildError::Superseded);
        }

        let mut result = BuildResult { dry_run: self.dry_run, ..BuildResult::new() };
        for bundle in pending {
            result.add_bundle(self.write_bundle(bundle)?);
        }

        result.total_duration = start.elapsed();
        Ok(result)
    }

    fn assemble_entry(&self, entry: &EntryPoint, ticket: &BuildTicket) -> Result<PendingBundle, BuildError> {
        let descriptor = self.context.descriptor();

        let graph = ModuleGraph::discover(descriptor, entry)?;
        debug!(bundle = %entry.name, modules = graph.len(), "discovered module graph");
        if ticket.is_superseded() {
            return Err(BuildError::Superseded);
        }

        let (outputs, cached) = self.transform_graph(&graph)?;
        if ticket.is_superseded() {
            return Err(BuildError::Superseded);
        }

        let output = descriptor.output();
        let script_path = output.path_for(OutputKind::ScriptBundle, &entry.name);
        let map = descriptor.source_maps_enabled().then(|| MapOptions {
            file: script_path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default(),
            url: output.map_url_for(&entry.name),
        });

        let script = assemble_script(&graph, &outputs, map.as_ref())
            .map_err(|source| BuildError::Assemble { name: entry.name.clone(), source })?;
        let style = assemble_style(&graph, &outputs, !descriptor.minify_enabled());

        let mut artifacts = vec![(OutputKind::ScriptBundle, script_path, script.code)];
        if let Some(map) = script.map {
            artifacts.push((OutputKind::MapFile, output.path_for(OutputKind::MapFile, &entry.name), map));
        }
        artifacts.push((OutputKind::StyleBundle, output.path_for(OutputKind::StyleBundle, &entry.name), style));

        Ok(PendingBundle {
            name: entry.name.clone(),
            modules: graph.len(),
            transformed: graph.len() - cached,
            cached,
            artifacts,
        })
    }

    /// Compiled output for every module, indexed like `graph.modules()`.
    fn transform_graph(&self, graph: &ModuleGraph) -> Result<(Vec<Arc<str>>, usize), BuildError> {
        let results: Vec<Result<(Arc<str>, bool), TransformError>> =
            graph.modules().par_iter().map(|module| self.transform_module(module)).collect();

        let mut outputs = Vec::with_capacity(results.len());
        let mut cached = 0;
        for result in results {
            let (output, hit) = result?;
            if hit {
                cached += 1;
            }
            outputs.push(output);
        }
        Ok((outputs, cached))
    }

    /// Run one module through its chain. The flag is true on a cache hit.
    fn transform_module(&self, module: &ModuleNode) -> Result<(Arc<str>, bool), TransformError> {
        let descriptor = self.context.descriptor();
        let rule = &descriptor.rules()[module.rule];
        let chain = rule.chain();
        let fingerprint = content_hash(
            format!("{}|{}|{}|{}", module.rule, chain, descriptor.mode(), descriptor.source_maps_enabled())
                .as_bytes(),
        );

        if let Some(output) = self.lock_cache().get(&module.path, module.hash, fingerprint) {
            debug!(module = %module.id, "transform cache hit");
            return Ok((output, true));
        }

        let mut current = module.source.clone();
        for step in chain.steps() {
            let failure = |message: String| TransformError {
                file: PathBuf::from(&module.id),
                step: step.to_string(),
                message,
            };

            let processor = self
                .context
                .processor(step)
                .ok_or_else(|| failure(format!("processor '{}' is not registered", step.processor())))?;
            let ctx = self.context.step_context(step);
            let input = TransformInput { path: &module.path, source: &current };

            debug!(module = %module.id, step = %step, "transform");
            current = processor.process(&input, &ctx).map_err(|e| failure(e.0))?;
        }

        let output: Arc<str> = Arc::from(current);
        self.lock_cache().insert(module.path.clone(), rule.kind(), module.hash, fingerprint, Arc::clone(&output));
        Ok((output, false))
    }

    fn lock_cache(&self) -> std::sync::MutexGuard<'_, TransformCache> {
        // A panicking transform cannot leave an entry half-written.
        self.cache.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write_bundle(&self, bundle: PendingBundle) -> Result<BundleResult, BuildError> {
        let mut artifacts = Vec::with_capacity(bundle.artifacts.len());
        for (kind, path, contents) in bundle.artifacts {
            if !self.dry_run {
                write_atomic(&path, contents.as_bytes())?;
            }
            artifacts.push(WrittenArtifact { kind, path, bytes: contents.len() });
        }

        info!(
            bundle = %bundle.name,
            modules = bundle.modules,
            cached = bundle.cached,
            dry_run = self.dry_run,
            "bundle written"
        );

        Ok(BundleResult {
            name: bundle.name,
            modules: bundle.modules,
            transformed: bundle.transformed,
            cached: bundle.cached,
            artifacts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build::BuildGeneration;
    use crate::descriptor::{Mode, PipelineDescriptor};
    use crate::transform::{Processor, ProcessorRegistry, ToolError, TransformContext};
    use std::fs;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    /// Passes source through, counting invocations.
    struct Passthrough {
        name: &'static str,
        calls: Arc<AtomicUsize>,
    }

    impl Processor for Passthrough {
        fn name(&self) -> &str {
            self.name
        }

        fn process(&self, input: &TransformInput<'_>, _ctx: &TransformContext) -> Result<String, ToolError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if input.source.contains("SYNTAX ERROR") {
                return Err(ToolError::new("unexpected token"));
            }
            Ok(input.source.to_string())
        }
    }

    /// Inlines `@import 'name';` lines from `_name.scss` next to the file.
    struct InlinePartials;

    impl Processor for InlinePartials {
        fn name(&self) -> &str {
            "sass"
        }

        fn process(&self, input: &TransformInput<'_>, _ctx: &TransformContext) -> Result<String, ToolError> {
            let dir = input.path.parent().unwrap();
            let mut out = String::new();
            for line in input.source.lines() {
                match line.trim().strip_prefix("@import '").and_then(|rest| rest.strip_suffix("';")) {
                    Some(name) => {
                        let partial = fs::read_to_string(dir.join(format!("_{}.scss", name)))
                            .map_err(|e| ToolError::new(e.to_string()))?;
                        out.push_str(&partial);
                    }
                    None => {
                        out.push_str(line);
                        out.push('\n');
                    }
                }
            }
            Ok(out)
        }
    }

    fn project(files: &[(&str, &str)]) -> TempDir {
        let temp = TempDir::new().unwrap();
        for (path, contents) in files {
            let full = temp.path().join(path);
            fs::create_dir_all(full.parent().unwrap()).unwrap();
            fs::write(full, contents).unwrap();
        }
        temp
    }

    fn pipeline(root: &Path, mode: Mode) -> (BuildPipeline, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut registry = ProcessorRegistry::with_builtins();
        registry.register(Passthrough { name: "typescript", calls: Arc::clone(&calls) });
        registry.register(Passthrough { name: "sass", calls: Arc::clone(&calls) });

        let descriptor = PipelineDescriptor::builder(root).entry("src/index.tsx").mode(mode).build().unwrap();
        let context = BuildContext::new(descriptor, registry).unwrap();
        (BuildPipeline::new(context), calls)
    }

    #[test]
    fn test_writes_script_map_and_style() {
        let temp = project(&[
            ("src/index.tsx", "import './app.scss';\nexport const x = 1;\n"),
            ("src/app.scss", ".a { color: red; }\n"),
        ]);
        let (pipeline, _) = pipeline(temp.path(), Mode::Development);
        let result = pipeline.build().unwrap();

        let kinds: Vec<OutputKind> = result.bundles[0].artifacts.iter().map(|a| a.kind).collect();
        assert_eq!(kinds, vec![OutputKind::ScriptBundle, OutputKind::MapFile, OutputKind::StyleBundle]);
        assert!(temp.path().join("public/js/general.js").is_file());
        assert!(temp.path().join("public/js/general.js.map").is_file());

        let css = fs::read_to_string(temp.path().join("public/css/general.css")).unwrap();
        assert!(css.starts_with("/* src/app.scss */\n"));
        assert!(css.contains("color: red"));
    }

    #[test]
    fn test_production_has_no_map_and_empty_style_is_written() {
        let temp = project(&[("src/index.tsx", "export const x = 1;\n")]);
        let (pipeline, _) = pipeline(temp.path(), Mode::Production);
        pipeline.build().unwrap();

        assert!(temp.path().join("public/js/general.js").is_file());
        assert!(!temp.path().join("public/js/general.js.map").exists());
        assert_eq!(fs::read_to_string(temp.path().join("public/css/general.css")).unwrap(), "");
    }

    #[test]
    fn test_transform_failure_writes_nothing() {
        let temp = project(&[
            ("src/index.tsx", "import './broken';\n"),
            ("src/broken.ts", "SYNTAX ERROR\n"),
        ]);
        let (pipeline, _) = pipeline(temp.path(), Mode::Production);
        let err = pipeline.build().unwrap_err();

        match err {
            BuildError::Transform(e) => {
                assert_eq!(e.file, PathBuf::from("src/broken.ts"));
                assert_eq!(e.step, "typescript");
                assert_eq!(e.message, "unexpected token");
            }
            other => panic!("expected transform error, got {:?}", other),
        }
        assert!(!temp.path().join("public").exists());
    }

    #[test]
    fn test_cache_reuses_unchanged_modules() {
        let temp = project(&[
            ("src/index.tsx", "import { a } from './a';\n"),
            ("src/a.ts", "export const a = 1;\n"),
        ]);
        let (pipeline, calls) = pipeline(temp.path(), Mode::Production);

        pipeline.build().unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        fs::write(temp.path().join("src/a.ts"), "export const a = 2;\n").unwrap();
        let result = pipeline.build().unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(result.cached_count(), 1);
    }

    #[test]
    fn test_superseded_build_writes_nothing() {
        let temp = project(&[("src/index.tsx", "export const x = 1;\n")]);
        let (pipeline, _) = pipeline(temp.path(), Mode::Production);

        let generation = BuildGeneration::new();
        let ticket = generation.advance();
        generation.advance();

        assert!(pipeline.build_with(&ticket).unwrap_err().is_superseded());
        assert!(!temp.path().join("public").exists());
    }

    #[test]
    fn test_dry_run() {
        let temp = project(&[("src/index.tsx", "export const x = 1;\n")]);
        let (pipeline, _) = pipeline(temp.path(), Mode::Production);
        let result = pipeline.with_dry_run(true).build().unwrap();

        assert!(result.dry_run);
        assert_eq!(result.all_outputs().len(), 2);
        assert!(!temp.path().join("public").exists());
    }

    #[test]
    fn test_partial_change_recompiles_styles() {
        let temp = project(&[
            ("src/index.tsx", "import './app.scss';\nexport const x = 1;\n"),
            ("src/app.scss", "@import 'theme';\n.a { color: var(--accent); }\n"),
            ("src/_theme.scss", ":root { --accent: red; }\n"),
        ]);
        let calls = Arc::new(AtomicUsize::new(0));
        let mut registry = ProcessorRegistry::with_builtins();
        registry.register(Passthrough { name: "typescript", calls: Arc::clone(&calls) });
        registry.register(InlinePartials);
        let descriptor =
            PipelineDescriptor::builder(temp.path()).entry("src/index.tsx").mode(Mode::Production).build().unwrap();
        let pipeline = BuildPipeline::new(BuildContext::new(descriptor, registry).unwrap());

        pipeline.build().unwrap();
        let css_path = temp.path().join("public/css/general.css");
        assert!(fs::read_to_string(&css_path).unwrap().contains("red"));

        let theme = temp.path().join("src/_theme.scss");
        fs::write(&theme, ":root { --accent: green; }\n").unwrap();
        assert_eq!(pipeline.invalidate(&[theme]), 1);

        let result = pipeline.build().unwrap();
        let css = fs::read_to_string(&css_path).unwrap();
        assert!(css.contains("green"), "{}", css);
        assert!(!css.contains("red"));
        // The script module did not change and stays cached.
        assert_eq!(result.cached_count(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_script_change_keeps_cached_styles() {
        let temp = project(&[
            ("src/index.tsx", "import './app.scss';\nexport const x = 1;\n"),
            ("src/app.scss", ".a { color: red; }\n"),
        ]);
        let (pipeline, calls) = pipeline(temp.path(), Mode::Production);
        pipeline.build().unwrap();

        let index = temp.path().join("src/index.tsx");
        fs::write(&index, "import './app.scss';\nexport const x = 2;\n").unwrap();
        assert_eq!(pipeline.invalidate(&[index]), 1);

        let result = pipeline.build().unwrap();
        assert_eq!(result.cached_count(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_concurrent_builds_leave_complete_artifacts() {
        let body = format!("export const data = '{}';\n", "x".repeat(256 * 1024));
        let temp = project(&[
            ("src/index.tsx", "import './app.scss';\nimport './data';\n"),
            ("src/data.ts", body.as_str()),
            ("src/app.scss", ".a { color: red; }\n"),
        ]);
        let (pipeline, _) = pipeline(temp.path(), Mode::Development);

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let pipeline = pipeline.clone();
                std::thread::spawn(move || (0..5).all(|_| pipeline.build().is_ok()))
            })
            .collect();
        for handle in handles {
            assert!(handle.join().unwrap());
        }

        let expected = pipeline.with_dry_run(true).build().unwrap();
        for artifact in expected.bundles.iter().flat_map(|b| &b.artifacts) {
            let written = fs::read(&artifact.path).unwrap();
            assert_eq!(written.len(), artifact.bytes, "{}", artifact.path.display());
        }
        let leftovers: Vec<_> = fs::read_dir(temp.path().join("public/js"))
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }
}
