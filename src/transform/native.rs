//! Processors implemented in-process.

use super::{Processor, ToolError, TransformContext, TransformInput};
use lightningcss::stylesheet::{ParserOptions, PrinterOptions, StyleSheet};

/// Wraps a JSON document as `module.exports = <json>;`.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonProcessor;

impl Processor for JsonProcessor {
    fn name(&self) -> &str {
        "json"
    }

    fn recognized_options(&self) -> &[&str] {
        &[]
    }

    fn process(&self, input: &TransformInput<'_>, _ctx: &TransformContext) -> Result<String, ToolError> {
        let value: serde_json::Value = serde_json::from_str(input.source).map_err(|e| {
            ToolError::new(format!("invalid JSON at {}:{}: {}", e.line(), e.column(), e))
        })?;
        let json = serde_json::to_string(&value).map_err(|e| ToolError::new(e.to_string()))?;
        Ok(format!("module.exports = {};\n", json))
    }
}

/// Parses and reprints CSS, minifying when the mode asks for it.
#[derive(Debug, Clone, Copy, Default)]
pub struct CssProcessor;

impl Processor for CssProcessor {
    fn name(&self) -> &str {
        "css"
    }

    fn process(&self, input: &TransformInput<'_>, ctx: &TransformContext) -> Result<String, ToolError> {
        let options = ParserOptions {
            filename: input.path.to_string_lossy().into_owned(),
            ..ParserOptions::default()
        };
        let stylesheet = StyleSheet::parse(input.source, options).map_err(|e| {
            let location = e
                .loc
                .as_ref()
                .map(|loc| format!(" at {}:{}", loc.line + 1, loc.column))
                .unwrap_or_default();
            ToolError::new(format!("{}{}", e.kind, location))
        })?;

        let printed = stylesheet
            .to_css(PrinterOptions { minify: ctx.minify, ..PrinterOptions::default() })
            .map_err(|e| ToolError::new(e.kind.to_string()))?;

        let mut code = printed.code;
        if !code.is_empty() && !code.ends_with('\n') {
            code.push('\n');
        }
        Ok(code)
    }
}
