//! `major.minor` extraction from free-form version strings.
//!
//! Browsers print things like `Google Chrome 62.0.3202.94` and kernels report
//! `4.15.0-20-generic`. Declared platforms only pin `major.minor`, so both
//! sides are reduced to the first `N.N` token before comparing.

use lazy_static::lazy_static;
use regex::Regex;

use crate::error::{RunError, RunResult};

lazy_static! {
    /// 1-3 digits, a literal dot, 1-3 digits.
    static ref MAJOR_MINOR: Regex = Regex::new(r"[0-9]{1,3}\.[0-9]{1,3}").unwrap();
}

/// Returns the first `major.minor` token in `input`.
pub fn major_minor(input: &str) -> RunResult<String> {
    MAJOR_MINOR
        .find(input)
        .map(|m| m.as_str().to_string())
        .ok_or_else(|| RunError::Format {
            input: input.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_browser_version_output() {
        assert_eq!(major_minor("Google Chrome 62.0.3202.94").unwrap(), "62.0");
        assert_eq!(major_minor("Mozilla Firefox 56.0.2").unwrap(), "56.0");
    }

    #[test]
    fn test_kernel_release() {
        assert_eq!(major_minor("4.15.0-20-generic").unwrap(), "4.15");
        assert_eq!(major_minor("10.0").unwrap(), "10.0");
    }

    #[test]
    fn test_no_token_fails() {
        assert!(matches!(major_minor(""), Err(RunError::Format { .. })));
        assert!(matches!(major_minor("unknown"), Err(RunError::Format { .. })));
        assert!(matches!(major_minor("62"), Err(RunError::Format { .. })));
    }

    proptest! {
        #[test]
        fn prop_embedded_token_is_returned(
            prefix in "[a-zA-Z ]{0,12}",
            major in 0u32..1000,
            minor in 0u32..1000,
            suffix in "[a-zA-Z -]{0,12}",
        ) {
            let token = format!("{major}.{minor}");
            let input = format!("{prefix}{token}{suffix}");
            prop_assert_eq!(major_minor(&input).unwrap(), token);
        }

        #[test]
        fn prop_digitless_input_fails(input in "[a-zA-Z .-]{0,24}") {
            prop_assert!(major_minor(&input).is_err());
        }
    }
}
