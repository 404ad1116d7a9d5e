//! Bundle assembly.
//!
//! The script bundle is a module table wrapped in a small CommonJS-style
//! loader. Each script module becomes a function taking `module`,
//! `exports` and `require`, paired with a table mapping the specifiers it
//! imports to module ids. Style modules stay in the table as empty stubs
//! so `import './app.scss'` still resolves at runtime; their CSS goes to
//! the style bundle instead.

use crate::build::graph::ModuleGraph;
use crate::build::sourcemap::SourceMapBuilder;
use crate::descriptor::RuleKind;
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::sync::Arc;

const RUNTIME_PRELUDE: &[&str] = &[
    "(function (modules, entry) {",
    "  var cache = {};",
    "  function load(id) {",
    "    if (cache[id]) return cache[id].exports;",
    "    var record = modules[id];",
    "    var module = (cache[id] = { exports: {} });",
    "    record[0].call(module.exports, module, module.exports, function (specifier) {",
    "      var target = record[1][specifier];",
    "      if (target === undefined) throw new Error(\"Cannot find module '\" + specifier + \"' from '\" + id + \"'\");",
    "      return load(target);",
    "    });",
    "    return module.exports;",
    "  }",
    "  load(entry);",
    "})({",
];

/// An assembled script bundle and its optional map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptBundle {
    pub code: String,
    /// Serialized v3 source map
    pub map: Option<String>,
}

/// Source map settings for [`assemble_script`].
#[derive(Debug, Clone)]
pub struct MapOptions {
    /// Bundle file name recorded in the map's `file` field
    pub file: String,
    /// Reference written into the `sourceMappingURL` comment
    pub url: String,
}

/// Build the script bundle from a graph and each module's compiled output.
///
/// `outputs` is indexed like `graph.modules()`.
pub fn assemble_script(
    graph: &ModuleGraph,
    outputs: &[Arc<str>],
    map: Option<&MapOptions>,
) -> Result<ScriptBundle, serde_json::Error> {
    let mut code = String::new();
    let mut builder = map.map(|m| SourceMapBuilder::new(m.file.clone()));

    for line in RUNTIME_PRELUDE {
        push_line(&mut code, line);
        if let Some(b) = builder.as_mut() {
            b.unmapped_line();
        }
    }

    for (module, output) in graph.modules().iter().zip(outputs) {
        let deps: BTreeMap<&str, &str> =
            module.dependencies.iter().map(|(spec, id)| (spec.as_str(), id.as_str())).collect();

        push_line(&mut code, &format!("{}: [function (module, exports, require) {{", serde_json::to_string(&module.id)?));
        if let Some(b) = builder.as_mut() {
            b.unmapped_line();
        }

        if module.kind == RuleKind::Script {
            let source_index = builder.as_mut().map(|b| b.add_source(module.id.clone(), module.source.clone()));
            let last_source_line = module.source.lines().count().saturating_sub(1);

            for (i, line) in output.lines().enumerate() {
                push_line(&mut code, line);
                if let (Some(b), Some(source)) = (builder.as_mut(), source_index) {
                    b.mapped_line(source, i.min(last_source_line));
                }
            }
        }

        push_line(&mut code, &format!("}}, {}],", serde_json::to_string(&deps)?));
        if let Some(b) = builder.as_mut() {
            b.unmapped_line();
        }
    }

    let _ = write!(code, "}}, {});", serde_json::to_string(graph.entry())?);
    code.push('\n');

    let map = match (builder, map) {
        (Some(builder), Some(options)) => {
            let _ = writeln!(code, "//# sourceMappingURL={}", options.url);
            Some(builder.finish().to_json()?)
        }
        _ => None,
    };

    Ok(ScriptBundle { code, map })
}

/// Concatenate compiled stylesheets in discovery order.
///
/// With `annotate`, each block is preceded by a comment naming its module.
pub fn assemble_style(graph: &ModuleGraph, outputs: &[Arc<str>], annotate: bool) -> String {
    let mut css = String::new();
    for (module, output) in graph.modules().iter().zip(outputs) {
        if module.kind != RuleKind::Style {
            continue;
        }
        if annotate {
            let _ = writeln!(css, "/* {} */", module.id);
        }
        css.push_str(output);
        if !output.is_empty() && !output.ends_with('\n') {
            css.push('\n');
        }
    }
    css
}

fn push_line(code: &mut String, line: &str) {
    code.push_str(line);
    code.push('\n');
}
