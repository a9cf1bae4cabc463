use lazy_static::lazy_static;
use regex::{Captures, Regex};

lazy_static! {
    static ref BRACED_VAR: Regex = Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").unwrap();
}

/// Expand `${VAR}` references from the process environment.
///
/// Only the braced form is recognised so that a literal `$` inside a
/// password survives untouched. Unset variables expand to an empty string.
pub fn expand_env_vars(value: &str) -> String {
    if !value.contains("${") {
        return value.to_string();
    }

    BRACED_VAR
        .replace_all(value, |caps: &Captures| {
            std::env::var(&caps[1]).unwrap_or_default()
        })
        .into_owned()
}

/// Whether `value` still references an environment variable.
pub fn has_env_reference(value: &str) -> bool {
    BRACED_VAR.is_match(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    #[test]
    fn test_expand_braced_vars() {
        env::set_var("INDIGO_TEST_SFTP_PASS", "s3cret");
        assert_eq!(expand_env_vars("${INDIGO_TEST_SFTP_PASS}"), "s3cret");
        assert_eq!(
            expand_env_vars("prefix-${INDIGO_TEST_SFTP_PASS}-suffix"),
            "prefix-s3cret-suffix"
        );
        env::remove_var("INDIGO_TEST_SFTP_PASS");
    }

    #[test]
    fn test_unset_var_expands_to_empty() {
        env::remove_var("INDIGO_TEST_DEFINITELY_UNSET");
        assert_eq!(expand_env_vars("/data/${INDIGO_TEST_DEFINITELY_UNSET}"), "/data/");
    }

    #[test]
    fn test_bare_dollar_is_literal() {
        assert_eq!(expand_env_vars("pa$$word"), "pa$$word");
        assert_eq!(expand_env_vars("$HOME/keys"), "$HOME/keys");
        assert!(!has_env_reference("pa$$word"));
        assert!(has_env_reference("${HOME}/keys"));
    }
}
