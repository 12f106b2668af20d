//! Validation helpers for DTOs.

use time::{Date, format_description::well_known::Iso8601, macros::format_description};
use validator::ValidationError;

/// Longest display name accepted, in characters.
pub const MAX_DISPLAY_NAME_CHARS: usize = 40;

/// Validates that a display name has visible characters and stays short.
pub fn validate_display_name(name: &str) -> Result<(), ValidationError> {
    if name.trim().is_empty() {
        let mut err = ValidationError::new("display_name_blank");
        err.message = Some("Display name must not be blank".into());
        return Err(err);
    }

    let length = name.trim().chars().count();
    if length > MAX_DISPLAY_NAME_CHARS {
        let mut err = ValidationError::new("display_name_length");
        err.message = Some(
            format!("Display name must be at most {MAX_DISPLAY_NAME_CHARS} characters (got {length})")
                .into(),
        );
        return Err(err);
    }

    Ok(())
}

/// Parse an anniversary typed as `DD/MM/YYYY`, or as an ISO `YYYY-MM-DD` date.
///
/// # Examples
///
/// ```ignore
/// parse_anniversary("14/02/2024") // Some(2024-02-14)
/// parse_anniversary("2024-02-14") // Some(2024-02-14)
/// parse_anniversary("31/02/2024") // None - no such day
/// ```
pub fn parse_anniversary(raw: &str) -> Option<Date> {
    let raw = raw.trim();
    Date::parse(raw, format_description!("[day]/[month]/[year]"))
        .or_else(|_| Date::parse(raw, &Iso8601::DATE))
        .ok()
}

/// Validates that an anniversary can be parsed by [`parse_anniversary`].
pub fn validate_anniversary(raw: &str) -> Result<(), ValidationError> {
    if parse_anniversary(raw).is_some() {
        return Ok(());
    }

    let mut err = ValidationError::new("anniversary_format");
    err.message = Some("Anniversary must be a valid date written DD/MM/YYYY".into());
    Err(err)
}

#[cfg(test)]
mod tests {
    use time::macros::date;

    use super::*;

    #[test]
    fn test_validate_display_name() {
        assert!(validate_display_name("Ana").is_ok());
        assert!(validate_display_name("  Ben  ").is_ok());
        assert!(validate_display_name("").is_err());
        assert!(validate_display_name("   ").is_err());
        assert!(validate_display_name(&"x".repeat(41)).is_err());
        assert!(validate_display_name(&"é".repeat(40)).is_ok());
    }

    #[test]
    fn test_parse_anniversary_formats() {
        assert_eq!(parse_anniversary("14/02/2024"), Some(date!(2024 - 02 - 14)));
        assert_eq!(parse_anniversary(" 2024-02-14 "), Some(date!(2024 - 02 - 14)));
        assert_eq!(parse_anniversary("29/02/2024"), Some(date!(2024 - 02 - 29)));
    }

    #[test]
    fn test_parse_anniversary_rejects_impossible_dates() {
        assert_eq!(parse_anniversary("31/02/2024"), None); // no such day
        assert_eq!(parse_anniversary("02/14/2024"), None); // month first
        assert_eq!(parse_anniversary("14-02-2024"), None); // wrong separator
        assert_eq!(parse_anniversary(""), None);
        assert!(validate_anniversary("yesterday").is_err());
    }
}
