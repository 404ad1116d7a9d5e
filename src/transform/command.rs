//! Processors backed by an external program.
//!
//! The module source is piped to the program's stdin and its stdout is
//! taken as the transformed output. Arguments may contain placeholders:
//!
//! | Placeholder | Expands to                              |
//! |-------------|-----------------------------------------|
//! | `[path]`    | absolute path of the module             |
//! | `[ext]`     | extension without the dot (`tsx`)       |
//! | `[dir]`     | directory containing the module         |

use super::{Processor, ToolError, TransformContext, TransformInput};
use std::io::Write;
use std::path::Path;
use std::process::{Command, Stdio};
use std::thread;

/// How to invoke an external tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    /// Appended when the effective `source_map` option is on
    pub source_map_args: Vec<String>,
    /// Appended when minifying
    pub minify_args: Vec<String>,
}

impl CommandSpec {
    /// esbuild invoked as a single-file TypeScript/JSX compiler.
    pub fn typescript() -> Self {
        Self {
            program: "esbuild".to_string(),
            args: strings(&["--loader=[ext]", "--format=cjs", "--sourcefile=[path]"]),
            source_map_args: strings(&["--sourcemap=inline"]),
            minify_args: strings(&["--minify"]),
        }
    }

    /// Dart Sass reading from stdin.
    pub fn sass() -> Self {
        Self {
            program: "sass".to_string(),
            args: strings(&["--stdin", "--load-path=[dir]"]),
            source_map_args: strings(&["--embed-source-map"]),
            minify_args: strings(&["--style=compressed"]),
        }
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// A [`Processor`] that shells out to [`CommandSpec::program`].
#[derive(Debug, Clone)]
pub struct CommandProcessor {
    name: String,
    spec: CommandSpec,
}

impl CommandProcessor {
    pub fn new(name: impl Into<String>, spec: CommandSpec) -> Self {
        Self { name: name.into(), spec }
    }

    pub fn spec(&self) -> &CommandSpec {
        &self.spec
    }

    /// The full argument list for one invocation, placeholders expanded.
    pub fn arguments(&self, path: &Path, ctx: &TransformContext) -> Vec<String> {
        let mut args: Vec<&String> = self.spec.args.iter().collect();
        if ctx.source_map {
            args.extend(&self.spec.source_map_args);
        }
        if ctx.minify {
            args.extend(&self.spec.minify_args);
        }
        args.into_iter().map(|arg| expand_placeholders(arg, path)).collect()
    }
}

impl Processor for CommandProcessor {
    fn name(&self) -> &str {
        &self.name
    }

    fn process(&self, input: &TransformInput<'_>, ctx: &TransformContext) -> Result<String, ToolError> {
        let args = self.arguments(input.path, ctx);

        let mut child = Command::new(&self.spec.program)
            .args(&args)
            .current_dir(&ctx.root)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| ToolError::new(format!("failed to run `{}`: {}", self.spec.program, e)))?;

        // Tools may write stdout before draining stdin.
        let writer = child.stdin.take().map(|mut stdin| {
            let source = input.source.to_owned();
            thread::spawn(move || stdin.write_all(source.as_bytes()))
        });

        let output = child
            .wait_with_output()
            .map_err(|e| ToolError::new(format!("failed to wait for `{}`: {}", self.spec.program, e)))?;

        if let Some(writer) = writer {
            match writer.join() {
                Ok(Ok(())) => {}
                // Broken pipe from a failed tool; report the exit status instead.
                Ok(Err(_)) if !output.status.success() => {}
                Ok(Err(e)) => {
                    return Err(ToolError::new(format!(
                        "failed to write to `{}`: {}",
                        self.spec.program, e
                    )))
                }
                Err(_) => {
                    return Err(ToolError::new(format!("stdin writer for `{}` panicked", self.spec.program)))
                }
            }
        }

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let message = if stderr.trim().is_empty() {
                format!("`{}` exited with {}", self.spec.program, output.status)
            } else {
                stderr.into_owned()
            };
            return Err(ToolError::new(message));
        }

        String::from_utf8(output.stdout)
            .map_err(|_| ToolError::new(format!("`{}` produced non-UTF-8 output", self.spec.program)))
    }
}

fn expand_placeholders(arg: &str, path: &Path) -> String {
    if !arg.contains('[') {
        return arg.to_string();
    }
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    let dir = path.parent().map(|d| d.to_string_lossy().into_owned()).unwrap_or_default();
    arg.replace("[path]", &path.to_string_lossy()).replace("[ext]", ext).replace("[dir]", &dir)
}
