//! Identifier guard for SQL interpolation.
//!
//! Table and column names are interpolated into statements as plain strings.
//! That is acceptable only because task specs are build-time, trusted data;
//! this guard enforces the boundary so the substitution path can never be
//! extended to runtime-untrusted input.

use crate::errors::ConfigError;
use regex::Regex;
use std::sync::OnceLock;

#[allow(clippy::expect_used)]
fn ident_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("identifier pattern compiles"))
}

/// Validates a single table or column identifier.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidIdentifier`] when the name is empty or
/// contains anything beyond `[A-Za-z0-9_]` with a non-digit first character.
pub fn validate_identifier(name: &str) -> Result<(), ConfigError> {
    if ident_pattern().is_match(name) {
        Ok(())
    } else {
        Err(ConfigError::InvalidIdentifier {
            identifier: name.to_owned(),
        })
    }
}

/// Validates every identifier in a collection, failing on the first bad one.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidIdentifier`] for the first rejected name.
pub fn validate_identifiers<'a>(
    names: impl IntoIterator<Item = &'a str>,
) -> Result<(), ConfigError> {
    for name in names {
        validate_identifier(name)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_plain_identifiers() {
        assert!(validate_identifier("staging_events").is_ok());
        assert!(validate_identifier("_hidden").is_ok());
        assert!(validate_identifier("Time2").is_ok());
    }

    #[test]
    fn test_rejects_injection_shaped_names() {
        assert!(validate_identifier("users; DROP TABLE users").is_err());
        assert!(validate_identifier("users--").is_err());
        assert!(validate_identifier("").is_err());
        assert!(validate_identifier("1table").is_err());
        assert!(validate_identifier("a.b").is_err());
    }

    #[test]
    fn test_validate_identifiers_reports_first_offender() {
        let err = validate_identifiers(["ok", "not ok", "also bad"]).unwrap_err();
        assert_eq!(
            err,
            ConfigError::InvalidIdentifier {
                identifier: "not ok".into()
            }
        );
    }
}
