//! Client form validation and normalisation

use crate::error::{DashboardError, DashboardResult};
use crate::store::ClientPatch;
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    // local@domain.tld with no whitespace and a single @
    Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern is valid")
});

pub const REQUIRED_FIELDS_MESSAGE: &str = "Name, email, and company are required.";
pub const INVALID_EMAIL_MESSAGE: &str = "Please enter a valid email address.";

/// Client fields as entered in the edit form
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClientFields {
    pub name: String,
    pub email: String,
    pub company: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub website: String,
}

pub fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}

/// Reject missing required fields or a malformed email
pub fn validate_client_fields(fields: &ClientFields) -> DashboardResult<()> {
    if fields.name.trim().is_empty()
        || fields.email.trim().is_empty()
        || fields.company.trim().is_empty()
    {
        return Err(DashboardError::Validation(REQUIRED_FIELDS_MESSAGE.to_string()));
    }
    if !is_valid_email(fields.email.trim()) {
        return Err(DashboardError::Validation(INVALID_EMAIL_MESSAGE.to_string()));
    }
    Ok(())
}

/// Trim every field, lowercase the email and turn blank optionals into `None`
pub fn normalize_client_fields(fields: &ClientFields, now: DateTime<Utc>) -> ClientPatch {
    let optional = |value: &str| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    };
    ClientPatch {
        name: fields.name.trim().to_string(),
        email: fields.email.trim().to_lowercase(),
        company: fields.company.trim().to_string(),
        phone: optional(&fields.phone),
        website: optional(&fields.website),
        updated_at: now,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(name: &str, email: &str, company: &str) -> ClientFields {
        ClientFields {
            name: name.into(),
            email: email.into(),
            company: company.into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_email_pattern() {
        assert!(is_valid_email("wile@acme.test"));
        assert!(is_valid_email("a.b+c@sub.domain.io"));
        assert!(!is_valid_email("not-an-email"));
        assert!(!is_valid_email("missing@tld"));
        assert!(!is_valid_email("two@@ats.com"));
        assert!(!is_valid_email("spa ce@acme.test"));
    }

    #[test]
    fn test_required_fields() {
        for f in [
            fields("", "wile@acme.test", "Acme"),
            fields("Wile", "  ", "Acme"),
            fields("Wile", "wile@acme.test", "\t"),
        ] {
            let err = validate_client_fields(&f).unwrap_err();
            assert_eq!(err, DashboardError::Validation(REQUIRED_FIELDS_MESSAGE.into()));
        }
    }

    #[test]
    fn test_malformed_email() {
        let err = validate_client_fields(&fields("Wile", "wile-at-acme", "Acme")).unwrap_err();
        assert_eq!(err, DashboardError::Validation(INVALID_EMAIL_MESSAGE.into()));
    }

    #[test]
    fn test_surrounding_whitespace_is_accepted() {
        assert!(validate_client_fields(&fields(" Wile ", " wile@acme.test ", " Acme ")).is_ok());
    }

    #[test]
    fn test_normalize() {
        let now = Utc::now();
        let mut input = fields("  Wile Coyote ", " Wile@ACME.test", " Acme Corp ");
        input.phone = "   ".into();
        input.website = " https://acme.test ".into();

        let patch = normalize_client_fields(&input, now);
        assert_eq!(patch.name, "Wile Coyote");
        assert_eq!(patch.email, "wile@acme.test");
        assert_eq!(patch.company, "Acme Corp");
        assert_eq!(patch.phone, None);
        assert_eq!(patch.website.as_deref(), Some("https://acme.test"));
        assert_eq!(patch.updated_at, now);
    }
}
