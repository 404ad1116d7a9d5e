//! Criterion benchmarks for sitepack critical paths
//!
//! Benchmarks the operations run once per module on every rebuild:
//! - Rules: first-match rule lookup
//! - Resolution: extension probing for import specifiers
//! - Scanner: import extraction from script sources
//! - Cache: content hashing

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use sitepack::build::cache::content_hash;
use sitepack::build::graph::scan_imports;
use sitepack::descriptor::PipelineDescriptor;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

// =============================================================================
// Test Data Generators
// =============================================================================

/// Generate a module with `n` imports surrounded by ordinary code
fn make_module(n: usize) -> String {
    let mut source = String::new();
    for i in 0..n {
        source.push_str(&format!("import {{ item{} }} from './components/Item{}';\n", i, i));
    }
    source.push_str("import './styles/app.scss';\n");
    for i in 0..n {
        source.push_str(&format!(
            "// render item {}\nexport const view{} = () => item{}({{ index: {} }});\n",
            i, i, i, i
        ));
    }
    source.push_str("const lazy = () => import('./lazy');\n");
    source
}

/// A project tree where `./foo` exists only as `foo.scss`, the last extension tried
fn make_resolution_tree() -> (TempDir, PipelineDescriptor) {
    let temp = TempDir::new().expect("temp dir");
    let src = temp.path().join("src");
    fs::create_dir_all(src.join("widgets")).expect("src dir");
    fs::write(src.join("app.ts"), "").expect("app.ts");
    fs::write(src.join("foo.scss"), "").expect("foo.scss");
    fs::write(src.join("widgets/index.tsx"), "").expect("widgets/index.tsx");

    let descriptor = PipelineDescriptor::builder(temp.path())
        .entry("src/index.tsx")
        .build()
        .expect("descriptor");
    (temp, descriptor)
}

// =============================================================================
// Rule Benchmarks
// =============================================================================

fn bench_rules(c: &mut Criterion) {
    let mut group = c.benchmark_group("rules");
    let descriptor = PipelineDescriptor::builder("/site").entry("src/index.tsx").build().expect("descriptor");

    let paths: Vec<PathBuf> = ["src/index.tsx", "src/data/config.json", "src/styles/app.scss", "src/logo.svg"]
        .iter()
        .map(|p| Path::new("/site").join(p))
        .collect();

    for path in &paths {
        let label = path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
        group.bench_with_input(BenchmarkId::new("resolve_rule", label), path, |b, path| {
            b.iter(|| descriptor.resolve_rule_index(black_box(path)))
        });
    }

    group.finish();
}

// =============================================================================
// Resolution Benchmarks
// =============================================================================

fn bench_resolution(c: &mut Criterion) {
    let mut group = c.benchmark_group("resolution");
    let (temp, descriptor) = make_resolution_tree();
    let src = temp.path().join("src");

    group.bench_function("first_extension", |b| {
        b.iter(|| descriptor.resolve_import_path(black_box("./app"), &src))
    });

    group.bench_function("last_extension", |b| {
        b.iter(|| descriptor.resolve_import_path(black_box("./foo"), &src))
    });

    group.bench_function("directory_index", |b| {
        b.iter(|| descriptor.resolve_import_path(black_box("./widgets"), &src))
    });

    group.bench_function("unresolved", |b| {
        b.iter(|| descriptor.resolve_import_path(black_box("./Missing"), &src))
    });

    group.finish();
}

// =============================================================================
// Scanner Benchmarks
// =============================================================================

fn bench_scanner(c: &mut Criterion) {
    let mut group = c.benchmark_group("scanner");

    for size in [4, 32, 256].iter() {
        let source = make_module(*size);
        group.throughput(Throughput::Bytes(source.len() as u64));
        group.bench_with_input(BenchmarkId::new("scan_imports", size), &source, |b, source| {
            b.iter(|| scan_imports(black_box(source)))
        });
    }

    group.finish();
}

// =============================================================================
// Cache Benchmarks
// =============================================================================

fn bench_hash(c: &mut Criterion) {
    let mut group = c.benchmark_group("cache");
    let source = make_module(256);

    group.throughput(Throughput::Bytes(source.len() as u64));
    group.bench_function("content_hash", |b| b.iter(|| content_hash(black_box(source.as_bytes()))));

    group.finish();
}

// =============================================================================
// Criterion Configuration
// =============================================================================

criterion_group!(benches, bench_rules, bench_resolution, bench_scanner, bench_hash);

criterion_main!(benches);
