//! Fix prompt construction and response cleanup

use mender_core::Language;

/// System prompt sent with every fix request
pub const SYSTEM_PROMPT: &str = "You are an expert software engineer who repairs failing test suites. \
You receive one source file and the output of its failing test run. \
Reply with the complete corrected file and nothing else: no explanations, no markdown.";

/// Longest tail of the test log included in a prompt
const MAX_LOG_CHARS: usize = 8000;

/// Build the user message for one fix
pub fn build_fix_prompt(file_content: &str, error_log: &str, language: Language) -> String {
    format!(
        "Fix the following {language} code based on the error log.\n\n\
         Error log:\n{log}\n\n\
         Code:\n{code}\n\n\
         Return ONLY the fixed code, no explanations.",
        language = language,
        log = log_tail(error_log),
        code = file_content,
    )
}

/// Keep the end of long logs, where the failure summary lives
fn log_tail(log: &str) -> &str {
    if log.len() <= MAX_LOG_CHARS {
        return log;
    }
    let mut start = log.len() - MAX_LOG_CHARS;
    while !log.is_char_boundary(start) {
        start += 1;
    }
    &log[start..]
}

/// Strip a surrounding markdown code fence if the model added one anyway.
///
/// Returns `None` for a blank response.
pub fn extract_code(response: &str) -> Option<String> {
    let trimmed = response.trim();
    if trimmed.is_empty() {
        return None;
    }

    let code = match trimmed.strip_prefix("```") {
        Some(fenced) => {
            // Drop the info string (```python) on the opening line
            let body = fenced.split_once('\n').map(|(_, rest)| rest).unwrap_or("");
            body.trim_end().strip_suffix("```").unwrap_or(body)
        }
        None => trimmed,
    };

    if code.trim().is_empty() {
        return None;
    }

    let mut code = code.trim_end().to_string();
    code.push('\n');
    Some(code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_contains_inputs() {
        let prompt = build_fix_prompt("x = 1", "SyntaxError at line 1", Language::Python);
        assert!(prompt.starts_with("Fix the following python code"));
        assert!(prompt.contains("SyntaxError at line 1"));
        assert!(prompt.contains("x = 1"));
        assert!(prompt.ends_with("Return ONLY the fixed code, no explanations."));
    }

    #[test]
    fn test_long_log_keeps_tail() {
        let log = format!("{}FAILED test_x", "a".repeat(MAX_LOG_CHARS * 2));
        let prompt = build_fix_prompt("", &log, Language::JavaScript);
        assert!(prompt.contains("FAILED test_x"));
        assert!(prompt.len() < MAX_LOG_CHARS + 200);
    }

    #[test]
    fn test_extract_plain_code() {
        assert_eq!(
            extract_code("def f():\n    return 1\n\n").as_deref(),
            Some("def f():\n    return 1\n")
        );
    }

    #[test]
    fn test_extract_fenced_code() {
        let response = "```python\nimport os\nprint(os.sep)\n```";
        assert_eq!(
            extract_code(response).as_deref(),
            Some("import os\nprint(os.sep)\n")
        );
    }

    #[test]
    fn test_extract_blank() {
        assert_eq!(extract_code("   \n"), None);
        assert_eq!(extract_code("```\n```"), None);
    }
}
