//! Environment variable expansion for configuration strings.

use crate::ConfigError;

/// Expand `${VAR}` and `${VAR:-default}` references in `value`.
///
/// `field` is the dotted config path reported when a variable is unset.
pub(crate) fn expand_env(value: &str, field: &str) -> Result<String, ConfigError> {
    shellexpand::env(value)
        .map(std::borrow::Cow::into_owned)
        .map_err(|e| ConfigError::EnvVar {
            field: field.to_owned(),
            message: format!("${{{}}} not set", e.var_name),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_literal_is_unchanged() {
        assert_eq!(
            expand_env("https://api.github.com", "github.api_url").unwrap(),
            "https://api.github.com"
        );
    }

    #[test]
    fn test_default_is_used_when_unset() {
        // SAFETY: test runs single-threaded per test function
        unsafe {
            std::env::remove_var("LODE_EXPAND_UNSET");
        }

        assert_eq!(
            expand_env("${LODE_EXPAND_UNSET:-fallback}", "github.token").unwrap(),
            "fallback"
        );
    }

    #[test]
    fn test_missing_variable_names_field() {
        // SAFETY: test runs single-threaded per test function
        unsafe {
            std::env::remove_var("LODE_EXPAND_MISSING");
        }

        let err = expand_env("${LODE_EXPAND_MISSING}", "github.token").unwrap_err();

        assert!(err.to_string().contains("LODE_EXPAND_MISSING"));
        assert!(err.to_string().contains("github.token"));
    }
}
