//! Match rules and the transform chains bound to them.
//!
//! A rule pairs a path test with an ordered chain of named transform
//! steps. Rules are evaluated in declaration order and the first whose
//! test matches wins.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

/// Which bundle a matched file contributes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleKind {
    /// Compiled into the script bundle
    Script,
    /// Compiled into the style bundle
    Style,
}

impl fmt::Display for RuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleKind::Script => write!(f, "script"),
            RuleKind::Style => write!(f, "style"),
        }
    }
}

/// A single option value passed to a transform step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OptionValue {
    Bool(bool),
    Integer(i64),
    String(String),
}

impl fmt::Display for OptionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptionValue::Bool(b) => write!(f, "{}", b),
            OptionValue::Integer(i) => write!(f, "{}", i),
            OptionValue::String(s) => write!(f, "{:?}", s),
        }
    }
}

/// Options for one transform step, keyed by option name.
pub type StepOptions = BTreeMap<String, OptionValue>;

/// A named external or built-in processor plus its options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformStep {
    processor: String,
    options: StepOptions,
}

impl TransformStep {
    /// A step with no options.
    pub fn new(processor: impl Into<String>) -> Self {
        Self { processor: processor.into(), options: StepOptions::new() }
    }

    /// Set an option on this step.
    pub fn with_option(mut self, name: impl Into<String>, value: OptionValue) -> Self {
        self.options.insert(name.into(), value);
        self
    }

    /// A step with a full options mapping.
    pub fn with_options(processor: impl Into<String>, options: StepOptions) -> Self {
        Self { processor: processor.into(), options }
    }

    pub fn processor(&self) -> &str {
        &self.processor
    }

    pub fn options(&self) -> &StepOptions {
        &self.options
    }

    /// Read a boolean option, `None` if absent or not a boolean.
    pub fn bool_option(&self, name: &str) -> Option<bool> {
        match self.options.get(name) {
            Some(OptionValue::Bool(b)) => Some(*b),
            _ => None,
        }
    }
}

impl fmt::Display for TransformStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.processor)?;
        if !self.options.is_empty() {
            let opts: Vec<String> =
                self.options.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
            write!(f, "({})", opts.join(", "))?;
        }
        Ok(())
    }
}

/// Ordered transform steps.
///
/// Steps run in declaration order: the first step receives the raw source
/// and each following step receives the previous step's output.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransformChain {
    steps: Vec<TransformStep>,
}

impl TransformChain {
    pub fn new(steps: Vec<TransformStep>) -> Self {
        Self { steps }
    }

    pub fn steps(&self) -> &[TransformStep] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Processor names in application order.
    pub fn names(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.processor()).collect()
    }
}

impl fmt::Display for TransformChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.steps.iter().map(|s| s.to_string()).collect();
        write!(f, "{}", parts.join(" -> "))
    }
}

/// The test and chain shared by every rule variant.
#[derive(Debug, Clone)]
pub struct RuleSpec {
    test: Regex,
    chain: TransformChain,
}

/// A binding from a path test to a transform chain.
#[derive(Debug, Clone)]
pub enum MatchRule {
    Script(RuleSpec),
    Style(RuleSpec),
}

impl MatchRule {
    /// Build a rule of the given kind from a regular expression source.
    pub fn new(kind: RuleKind, test: &str, chain: TransformChain) -> Result<Self, regex::Error> {
        let spec = RuleSpec { test: Regex::new(test)?, chain };
        Ok(match kind {
            RuleKind::Script => MatchRule::Script(spec),
            RuleKind::Style => MatchRule::Style(spec),
        })
    }

    pub fn script(test: &str, chain: TransformChain) -> Result<Self, regex::Error> {
        Self::new(RuleKind::Script, test, chain)
    }

    pub fn style(test: &str, chain: TransformChain) -> Result<Self, regex::Error> {
        Self::new(RuleKind::Style, test, chain)
    }

    fn spec(&self) -> &RuleSpec {
        match self {
            MatchRule::Script(spec) | MatchRule::Style(spec) => spec,
        }
    }

    pub fn kind(&self) -> RuleKind {
        match self {
            MatchRule::Script(_) => RuleKind::Script,
            MatchRule::Style(_) => RuleKind::Style,
        }
    }

    /// The regular expression source of this rule's test.
    pub fn test(&self) -> &str {
        self.spec().test.as_str()
    }

    pub fn chain(&self) -> &TransformChain {
        &self.spec().chain
    }

    /// Whether the rule's test matches the given path.
    ///
    /// Paths are compared with forward slashes on every platform.
    pub fn matches(&self, path: &Path) -> bool {
        self.spec().test.is_match(&slash_path(path))
    }
}

/// Render a path with forward slashes.
pub fn slash_path(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}
