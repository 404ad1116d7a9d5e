//! Source map v3 generation for script bundles.
//!
//! Each line of a module's compiled output is mapped to the same line of
//! its original source (column 0). This is line-granular, which is what
//! browsers need to attribute stack frames to source files.

use serde::Serialize;

const BASE64: &[u8; 64] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";

/// Append the base64 VLQ encoding of `value`.
pub fn encode_vlq(out: &mut String, value: i64) {
    let mut vlq: u64 = if value < 0 { ((-value as u64) << 1) | 1 } else { (value as u64) << 1 };
    loop {
        let mut digit = (vlq & 0b11111) as usize;
        vlq >>= 5;
        if vlq > 0 {
            digit |= 0b100000;
        }
        out.push(BASE64[digit] as char);
        if vlq == 0 {
            break;
        }
    }
}

/// Serialized form of a v3 source map.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SourceMap {
    pub version: u8,
    pub file: String,
    pub sources: Vec<String>,
    pub sources_content: Vec<String>,
    pub names: Vec<String>,
    pub mappings: String,
}

impl SourceMap {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Accumulates mappings while the bundle is written line by line.
#[derive(Debug)]
pub struct SourceMapBuilder {
    file: String,
    sources: Vec<String>,
    sources_content: Vec<String>,
    mappings: String,
    line_count: usize,
    prev_source: i64,
    prev_line: i64,
}

impl SourceMapBuilder {
    /// `file` is the bundle's file name as it appears next to the map.
    pub fn new(file: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            sources: Vec::new(),
            sources_content: Vec::new(),
            mappings: String::new(),
            line_count: 0,
            prev_source: 0,
            prev_line: 0,
        }
    }

    /// Register a source file; returns its index.
    pub fn add_source(&mut self, name: impl Into<String>, content: impl Into<String>) -> usize {
        self.sources.push(name.into());
        self.sources_content.push(content.into());
        self.sources.len() - 1
    }

    /// A generated line with no original position.
    pub fn unmapped_line(&mut self) {
        self.next_line();
    }

    /// A generated line that corresponds to `line` (0-based) of `source`.
    pub fn mapped_line(&mut self, source: usize, line: usize) {
        self.next_line();
        // Segment: generated column, source index, original line, original column.
        // Generated column resets on each line, the rest are deltas.
        encode_vlq(&mut self.mappings, 0);
        encode_vlq(&mut self.mappings, source as i64 - self.prev_source);
        encode_vlq(&mut self.mappings, line as i64 - self.prev_line);
        encode_vlq(&mut self.mappings, 0);
        self.prev_source = source as i64;
        self.prev_line = line as i64;
    }

    fn next_line(&mut self) {
        if self.line_count > 0 {
            self.mappings.push(';');
        }
        self.line_count += 1;
    }

    pub fn finish(self) -> SourceMap {
        SourceMap {
            version: 3,
            file: self.file,
            sources: self.sources,
            sources_content: self.sources_content,
            names: Vec::new(),
            mappings: self.mappings,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vlq(value: i64) -> String {
        let mut out = String::new();
        encode_vlq(&mut out, value);
        out
    }

    #[test]
    fn test_vlq() {
        assert_eq!(vlq(0), "A");
        assert_eq!(vlq(1), "C");
        assert_eq!(vlq(-1), "D");
        assert_eq!(vlq(15), "e");
        assert_eq!(vlq(16), "gB");
        assert_eq!(vlq(-16), "hB");
    }

    #[test]
    fn test_mappings() {
        let mut builder = SourceMapBuilder::new("general.js");
        let a = builder.add_source("src/a.ts", "one\ntwo\n");
        builder.unmapped_line();
        builder.mapped_line(a, 0);
        builder.mapped_line(a, 1);
        let b = builder.add_source("src/b.ts", "x\n");
        builder.mapped_line(b, 0);

        let map = builder.finish();
        assert_eq!(map.mappings, ";AAAA;AACA;ACDA");
        assert_eq!(map.sources, vec!["src/a.ts", "src/b.ts"]);
    }

    #[test]
    fn test_json_shape() {
        let mut builder = SourceMapBuilder::new("general.js");
        let a = builder.add_source("src/a.ts", "a");
        builder.mapped_line(a, 0);
        let json = builder.finish().to_json().unwrap();
        assert_eq!(
            json,
            r#"{"version":3,"file":"general.js","sources":["src/a.ts"],"sourcesContent":["a"],"names":[],"mappings":"AAAA"}"#
        );
    }
}
