//! Destination normalization: phone numbers to WhatsApp chat ids.

use crate::error::SessionError;

/// Suffix of individual (non-group) chat ids.
pub const CONTACT_SUFFIX: &str = "@c.us";

/// Normalize a destination into the transport's chat id form.
///
/// Non-digits are stripped and `country_code` is prefixed when the digits do
/// not already start with it. Destinations that already contain `@` are
/// transport chat ids and pass through unchanged.
pub fn normalize_destination(destination: &str, country_code: &str) -> Result<String, SessionError> {
    let trimmed = destination.trim();
    if trimmed.contains('@') {
        return Ok(trimmed.to_string());
    }

    let digits: String = trimmed.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return Err(SessionError::InvalidDestination(destination.to_string()));
    }

    let number = if digits.starts_with(country_code) {
        digits
    } else {
        format!("{country_code}{digits}")
    };

    Ok(format!("{number}{CONTACT_SUFFIX}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_equivalent_forms_normalize_identically() {
        let expected = "5548999999999@c.us";
        assert_eq!(normalize_destination("48999999999", "55").unwrap(), expected);
        assert_eq!(normalize_destination("+55 48 99999-9999", "55").unwrap(), expected);
        assert_eq!(normalize_destination("5548999999999", "55").unwrap(), expected);
    }

    #[test]
    fn test_country_code_present_once() {
        let id = normalize_destination("(55) 55 5555-5555", "55").unwrap();
        assert_eq!(id, "555555555555@c.us");
        assert!(!normalize_destination("48999999999", "55").unwrap().starts_with("5555"));
    }

    #[test]
    fn test_other_country_code() {
        assert_eq!(
            normalize_destination("912 345 678", "351").unwrap(),
            "351912345678@c.us"
        );
    }

    #[test]
    fn test_chat_id_passes_through() {
        assert_eq!(
            normalize_destination("120363025@g.us", "55").unwrap(),
            "120363025@g.us"
        );
        assert_eq!(
            normalize_destination(" 5548999999999@c.us ", "55").unwrap(),
            "5548999999999@c.us"
        );
    }

    #[test]
    fn test_no_digits_is_invalid() {
        let err = normalize_destination("call me", "55").unwrap_err();
        assert!(matches!(err, SessionError::InvalidDestination(_)));
        assert!(normalize_destination("", "55").is_err());
    }
}
