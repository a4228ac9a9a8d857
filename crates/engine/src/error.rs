//! Structured error kinds for resolution, normalization, and tool invocation.
//!
//! Callers match on these to tell "fix the placeholder" apart from "the tool is
//! broken"; none of them collapse into opaque strings.

use std::fmt;

use thiserror::Error;

/// Why a ledger lookup for `step<N>` produced nothing.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LedgerLookupError {
    /// No entry carries `step<N>` or index `N - 1`.
    #[error("no ledger entry for step{step}")]
    NoEntry { step: usize },
    /// The entry was skipped and no earlier successful entry can stand in for it.
    #[error("step{step} was skipped and no earlier successful step precedes index {skipped_index}")]
    SkippedWithoutFallback { step: usize, skipped_index: usize },
}

/// Failure to turn one placeholder into a value.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ResolutionError {
    /// The referenced step has no usable ledger entry, including after skip fallback.
    #[error("step result not found for {placeholder}: {source}")]
    StepResultNotFound {
        placeholder: String,
        #[source]
        source: LedgerLookupError,
    },
    /// The step exists but the field path and every alias resolved to nothing.
    #[error(
        "{placeholder} not found in output of step{step} ({tool_name}); available fields: {}",
        describe_fields(.available_fields)
    )]
    PlaceholderNotFound {
        placeholder: String,
        step: usize,
        tool_name: String,
        available_fields: Vec<String>,
    },
}

impl ResolutionError {
    /// Placeholder text that failed, delimiters included.
    pub fn placeholder(&self) -> &str {
        match self {
            Self::StepResultNotFound { placeholder, .. } | Self::PlaceholderNotFound { placeholder, .. } => placeholder,
        }
    }
}

fn describe_fields(fields: &[String]) -> String {
    if fields.is_empty() {
        "none".to_string()
    } else {
        fields.join(", ")
    }
}

/// One hop in the argument structure leading to a failing leaf.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContextSegment {
    Key(String),
    Index(usize),
}

/// A step's arguments could not be resolved; carries where in the structure it failed.
#[derive(Debug, Clone, Error, PartialEq)]
#[error("could not normalize input for '{tool_name}' at {}: {source}", ContextPath(.context_path))]
pub struct NormalizationError {
    pub tool_name: String,
    /// Root-to-leaf path of object keys and array indices.
    pub context_path: Vec<ContextSegment>,
    #[source]
    pub source: ResolutionError,
}

impl NormalizationError {
    /// Error raised at the failing leaf itself.
    pub fn at_leaf(tool_name: impl Into<String>, source: ResolutionError) -> Self {
        Self {
            tool_name: tool_name.into(),
            context_path: Vec::new(),
            source,
        }
    }

    /// Re-raises the error one level up, recording the key or index it came through.
    pub fn within(mut self, segment: ContextSegment) -> Self {
        self.context_path.insert(0, segment);
        self
    }

    /// Renders the context path as `filters[2].value`; `<root>` when empty.
    pub fn context_path_display(&self) -> String {
        ContextPath(&self.context_path).to_string()
    }
}

struct ContextPath<'a>(&'a [ContextSegment]);

impl fmt::Display for ContextPath<'_> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return formatter.write_str("<root>");
        }
        for (position, segment) in self.0.iter().enumerate() {
            match segment {
                ContextSegment::Key(key) if position == 0 => write!(formatter, "{key}")?,
                ContextSegment::Key(key) => write!(formatter, ".{key}")?,
                ContextSegment::Index(index) => write!(formatter, "[{index}]")?,
            }
        }
        Ok(())
    }
}

/// Tool invocation failures surfaced by a [`crate::executor::ToolInvoker`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ToolError {
    #[error("tool '{tool_name}' failed: {message}")]
    Invocation { tool_name: String, message: String },

    #[error("tool '{tool_name}' is not available")]
    Unknown { tool_name: String },

    #[error("tool '{tool_name}' returned an error result: {message}")]
    ErrorResult { tool_name: String, message: String },
}

impl ToolError {
    /// Create an invocation error.
    pub fn invocation(tool_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Invocation {
            tool_name: tool_name.into(),
            message: message.into(),
        }
    }

    /// Create an unknown-tool error.
    pub fn unknown(tool_name: impl Into<String>) -> Self {
        Self::Unknown { tool_name: tool_name.into() }
    }

    /// Create an error for a result flagged `isError`.
    pub fn error_result(tool_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ErrorResult {
            tool_name: tool_name.into(),
            message: message.into(),
        }
    }
}
