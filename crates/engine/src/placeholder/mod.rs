//! # Step Placeholders
//!
//! Step arguments reference earlier step outputs through `{{...}}` expressions.
//! This module owns the syntax; [`resolver`] evaluates parsed expressions
//! against the ledger and [`render`] decides how resolved values are spliced
//! back into strings.
//!
//! ## Syntax
//!
//! - `{{step<N>}}` - the whole (unwrapped) output of step `N`
//! - `{{step<N>.<field>}}` - direct access into the unwrapped output
//! - `{{step<N>.output.<field>}}` / `{{step<N>.result.<field>}}` - explicit source,
//!   same lookup as direct access
//! - `{{step<N>.tool_result.<field>}}` - the raw tool result without `.result`
//!   unwrapping or alias fallbacks
//!
//! `<field>` is a dotted path with optional bracket indices, e.g.
//! `results[0].link`. Whitespace directly inside the braces is ignored.
//!
//! ## Usage
//!
//! ```rust
//! use stepweave_engine::placeholder::{PlaceholderExpr, ResultSource, scan_placeholders};
//!
//! let found = scan_placeholders("Top hit: {{step1.results[0].link}}");
//! assert_eq!(found.len(), 1);
//! assert_eq!(
//!     found[0].expr,
//!     PlaceholderExpr::DirectAccess { step: 1, path: Some("results[0].link".into()) }
//! );
//!
//! let explicit = PlaceholderExpr::parse("{{ step2.tool_result.status }}");
//! assert_eq!(
//!     explicit,
//!     Some(PlaceholderExpr::ExplicitSource {
//!         step: 2,
//!         source: ResultSource::ToolResult,
//!         path: Some("status".into()),
//!     })
//! );
//! ```

pub mod render;
pub mod resolver;

use std::fmt;
use std::ops::Range;

use once_cell::sync::Lazy;
use regex::Regex;

pub use render::{Resolved, stringify_value};
pub use resolver::PlaceholderResolver;

/// Captures `(stepNum, part1, part2)`.
static PLACEHOLDER_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{\{\s*step(\d+)(?:\.([^.}\s]+))?(?:\.([^}\s]+))?\s*\}\}").expect("placeholder pattern compiles"));

/// Which view of a step's record an explicit-source placeholder reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultSource {
    Output,
    Result,
    ToolResult,
}

impl ResultSource {
    fn from_segment(segment: &str) -> Option<Self> {
        match segment {
            "output" => Some(Self::Output),
            "result" => Some(Self::Result),
            "tool_result" => Some(Self::ToolResult),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Output => "output",
            Self::Result => "result",
            Self::ToolResult => "tool_result",
        }
    }
}

/// Parsed placeholder expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaceholderExpr {
    /// `{{stepN}}` or `{{stepN.field.path}}`.
    DirectAccess { step: usize, path: Option<String> },
    /// `{{stepN.output.path}}`, `{{stepN.result.path}}`, `{{stepN.tool_result.path}}`.
    ExplicitSource {
        step: usize,
        source: ResultSource,
        path: Option<String>,
    },
}

impl PlaceholderExpr {
    /// Parses text that is exactly one placeholder, surrounding whitespace allowed.
    pub fn parse(text: &str) -> Option<Self> {
        let trimmed = text.trim();
        let captures = PLACEHOLDER_PATTERN.captures(trimmed)?;
        let whole = captures.get(0)?;
        if whole.start() != 0 || whole.end() != trimmed.len() {
            return None;
        }
        Self::from_captures(&captures)
    }

    /// Referenced 1-based step number.
    pub fn step(&self) -> usize {
        match self {
            Self::DirectAccess { step, .. } | Self::ExplicitSource { step, .. } => *step,
        }
    }

    /// Field path below the selected source, if any.
    pub fn path(&self) -> Option<&str> {
        match self {
            Self::DirectAccess { path, .. } | Self::ExplicitSource { path, .. } => path.as_deref(),
        }
    }

    fn from_captures(captures: &regex::Captures<'_>) -> Option<Self> {
        // Digits too long for usize still name a step; saturate so lookup reports it missing.
        let step = captures.get(1)?.as_str().parse::<usize>().unwrap_or(usize::MAX);
        let part1 = captures.get(2).map(|part| part.as_str());
        let part2 = captures.get(3).map(|part| part.as_str().to_string());

        let Some(part1) = part1 else {
            return Some(Self::DirectAccess { step, path: None });
        };
        if let Some(source) = ResultSource::from_segment(part1) {
            return Some(Self::ExplicitSource { step, source, path: part2 });
        }
        let path = match part2 {
            Some(rest) => format!("{part1}.{rest}"),
            None => part1.to_string(),
        };
        Some(Self::DirectAccess { step, path: Some(path) })
    }
}

impl fmt::Display for PlaceholderExpr {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{{{{step{}", self.step())?;
        if let Self::ExplicitSource { source, .. } = self {
            write!(formatter, ".{}", source.as_str())?;
        }
        if let Some(path) = self.path() {
            write!(formatter, ".{path}")?;
        }
        write!(formatter, "}}}}")
    }
}

/// One placeholder occurrence inside a larger string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaceholderMatch {
    /// Byte range of the full `{{...}}` text.
    pub range: Range<usize>,
    /// Matched text, delimiters included.
    pub text: String,
    pub expr: PlaceholderExpr,
}

/// Finds every placeholder in `input`, left to right.
pub fn scan_placeholders(input: &str) -> Vec<PlaceholderMatch> {
    PLACEHOLDER_PATTERN
        .captures_iter(input)
        .filter_map(|captures| {
            let whole = captures.get(0)?;
            let expr = PlaceholderExpr::from_captures(&captures)?;
            Some(PlaceholderMatch {
                range: whole.range(),
                text: whole.as_str().to_string(),
                expr,
            })
        })
        .collect()
}

/// Cheap pre-check used before scanning.
pub fn contains_placeholder(input: &str) -> bool {
    input.contains("{{") && PLACEHOLDER_PATTERN.is_match(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_whole_step_reference() {
        assert_eq!(PlaceholderExpr::parse("{{step3}}"), Some(PlaceholderExpr::DirectAccess { step: 3, path: None }));
    }

    #[test]
    fn parses_direct_access_paths() {
        assert_eq!(
            PlaceholderExpr::parse("{{step1.value}}"),
            Some(PlaceholderExpr::DirectAccess {
                step: 1,
                path: Some("value".into())
            })
        );
        assert_eq!(
            PlaceholderExpr::parse("{{ step1.results[0].link }}"),
            Some(PlaceholderExpr::DirectAccess {
                step: 1,
                path: Some("results[0].link".into())
            })
        );
    }

    #[test]
    fn parses_explicit_sources() {
        assert_eq!(
            PlaceholderExpr::parse("{{step2.output.items[1]}}"),
            Some(PlaceholderExpr::ExplicitSource {
                step: 2,
                source: ResultSource::Output,
                path: Some("items[1]".into())
            })
        );
        assert_eq!(
            PlaceholderExpr::parse("{{step2.result}}"),
            Some(PlaceholderExpr::ExplicitSource {
                step: 2,
                source: ResultSource::Result,
                path: None
            })
        );
    }

    #[test]
    fn rejects_non_placeholders() {
        assert_eq!(PlaceholderExpr::parse("{{stepx}}"), None);
        assert_eq!(PlaceholderExpr::parse("prefix {{step1}}"), None);
        assert_eq!(PlaceholderExpr::parse("{{ inputs.name }}"), None);
    }

    #[test]
    fn oversized_step_numbers_still_match() {
        let found = scan_placeholders("x {{step99999999999999999999999.a}}");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].text, "{{step99999999999999999999999.a}}");
        assert_eq!(found[0].expr.step(), usize::MAX);
    }

    #[test]
    fn scans_multiple_matches_in_order() {
        let found = scan_placeholders("{{step1.a}} and {{step2}} then {{step1.output.b.c}}");
        assert_eq!(found.len(), 3);
        assert_eq!(found[0].text, "{{step1.a}}");
        assert_eq!(found[1].expr.step(), 2);
        assert_eq!(found[2].expr.path(), Some("b.c"));
        assert_eq!(found[0].range, 0..11);
    }

    #[test]
    fn display_round_trips_canonical_text() {
        let expr = PlaceholderExpr::parse("{{ step4.tool_result.a[0] }}").expect("parses");
        assert_eq!(expr.to_string(), "{{step4.tool_result.a[0]}}");
    }

    #[test]
    fn contains_placeholder_ignores_other_braces() {
        assert!(contains_placeholder("x {{step1}}"));
        assert!(!contains_placeholder("{\"a\": {\"b\": 1}}"));
        assert!(!contains_placeholder("{{ env.HOME }}"));
    }
}
