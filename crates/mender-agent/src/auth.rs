//! API key lookup

use mender_core::{MenderError, Result};
use std::env;

/// Read the API key from the configured environment variable.
///
/// Blank values count as missing.
pub fn api_key(env_var: &str) -> Result<String> {
    match env::var(env_var) {
        Ok(key) if !key.trim().is_empty() => {
            tracing::debug!("Using API key from {}", env_var);
            Ok(key)
        }
        _ => Err(MenderError::Auth(format!(
            "No API key found. Set {}=sk-ant-api03-... to enable fix generation",
            env_var
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Each test uses its own variable name so they can run in parallel
    #[test]
    fn test_key_present() {
        env::set_var("MENDER_TEST_KEY_PRESENT", "sk-test");
        assert_eq!(api_key("MENDER_TEST_KEY_PRESENT").unwrap(), "sk-test");
        env::remove_var("MENDER_TEST_KEY_PRESENT");
    }

    #[test]
    fn test_key_missing() {
        env::remove_var("MENDER_TEST_KEY_MISSING");
        let result = api_key("MENDER_TEST_KEY_MISSING");
        assert!(matches!(result, Err(MenderError::Auth(_))));
    }

    #[test]
    fn test_key_blank() {
        env::set_var("MENDER_TEST_KEY_BLANK", "   ");
        assert!(api_key("MENDER_TEST_KEY_BLANK").is_err());
        env::remove_var("MENDER_TEST_KEY_BLANK");
    }
}
