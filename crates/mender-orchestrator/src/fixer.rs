//! Failure classification for the fixing stage
//!
//! Keyword and pattern matching only: the log is scanned for well-known
//! error names in a fixed precedence, and for the first `line N` marker.

use mender_core::BugType;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// Line number used when the log carries no `line N` marker
const DEFAULT_LINE: u32 = 1;

/// Keywords checked in precedence order; first hit wins
const KEYWORDS: &[(&[&str], BugType)] = &[
    (&["SyntaxError"], BugType::Syntax),
    (&["IndentationError"], BugType::Indentation),
    (&["ImportError", "ModuleNotFoundError"], BugType::Import),
    (&["AssertionError"], BugType::Logic),
    (&["TypeError"], BugType::TypeError),
];

static LINE_PATTERN: OnceLock<Option<Regex>> = OnceLock::new();

fn line_pattern() -> Option<&'static Regex> {
    LINE_PATTERN
        .get_or_init(|| Regex::new(r"line (\d+)").ok())
        .as_ref()
}

/// Classify a test log by the first matching error keyword
pub fn classify_error(log: &str) -> BugType {
    KEYWORDS
        .iter()
        .find(|(needles, _)| needles.iter().any(|needle| log.contains(needle)))
        .map(|(_, bug_type)| *bug_type)
        .unwrap_or(BugType::Unknown)
}

/// Extract the first `line N` number from a log, defaulting to 1
pub fn extract_line_number(log: &str) -> u32 {
    line_pattern()
        .and_then(|re| re.captures(log))
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
        .unwrap_or(DEFAULT_LINE)
}

/// Pick the file to fix.
///
/// Always the first test file: the log is not used to locate the failing
/// file. `None` means analysis found no test files at all.
pub fn select_target(test_files: &[PathBuf]) -> Option<&Path> {
    test_files.first().map(PathBuf::as_path)
}
