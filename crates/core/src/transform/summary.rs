//! Optional JSON summary printed by the transform tool on stdout.
//!
//! The tool may end its run with a line such as
//!
//! ```json
//! {"success": true, "original_pdf": "/data/out/<id>/original.pdf", "digital_pdf": "/data/out/<id>/digital.pdf"}
//! ```
//!
//! Progress logging usually precedes it, so the whole of stdout is tried
//! first and then the trailing lines that open a JSON object, either alone
//! or through to the end of stdout when the summary is pretty-printed. Stdout without
//! any JSON is [`SummaryParse::Absent`], which is not an error: artifact
//! resolution then uses the fixed file names.

use serde::Deserialize;

/// How many object-opening lines, counted from the end, are tried.
const MAX_SUMMARY_CANDIDATES: usize = 16;

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct TransformSummary {
    #[serde(default)]
    pub success: Option<bool>,
    #[serde(default, alias = "originalPdf")]
    pub original_pdf: Option<String>,
    #[serde(default, alias = "digitalPdf")]
    pub digital_pdf: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SummaryParse {
    Parsed(TransformSummary),
    /// Stdout contained no JSON at all.
    Absent,
    /// Stdout contained something shaped like JSON that did not parse.
    Malformed(String),
}

pub fn parse_summary(stdout: &str) -> SummaryParse {
    let trimmed = stdout.trim();
    if trimmed.is_empty() {
        return SummaryParse::Absent;
    }

    if let Ok(value) = serde_json::from_str::<serde_json::Value>(trimmed) {
        return from_value(value);
    }

    // Lines opening a JSON object, newest first. Each is tried on its own and
    // then through to the end of stdout, which covers pretty-printed output.
    let starts: Vec<usize> = std::iter::once(0)
        .chain(trimmed.match_indices('\n').map(|(i, _)| i + 1))
        .collect();
    let mut first_error = None;
    for &start in starts
        .iter()
        .rev()
        .filter(|&&start| {
            trimmed[start..]
                .lines()
                .next()
                .is_some_and(|line| line.trim_start().starts_with('{'))
        })
        .take(MAX_SUMMARY_CANDIDATES)
    {
        let tail = &trimmed[start..];
        let line = tail.lines().next().unwrap_or(tail);
        let parsed = serde_json::from_str::<serde_json::Value>(line)
            .or_else(|_| serde_json::from_str::<serde_json::Value>(tail));
        match parsed {
            Ok(value) => return from_value(value),
            Err(e) => {
                first_error.get_or_insert(e);
            }
        }
    }

    match first_error {
        Some(e) => SummaryParse::Malformed(format!("invalid summary: {e}")),
        None => SummaryParse::Absent,
    }
}

fn from_value(value: serde_json::Value) -> SummaryParse {
    if !value.is_object() {
        return SummaryParse::Malformed("summary is not a JSON object".to_string());
    }
    match serde_json::from_value(value) {
        Ok(summary) => SummaryParse::Parsed(summary),
        Err(e) => SummaryParse::Malformed(format!("unexpected summary shape: {e}")),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
