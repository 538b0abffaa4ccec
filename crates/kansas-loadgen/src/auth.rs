//! ---
//! kansas_section: "02-load-scenarios"
//! kansas_subsection: "module"
//! kansas_type: "source"
//! kansas_scope: "code"
//! kansas_description: "Launch-time credentials and the Basic authentication header."
//! kansas_version: "v0.1.0"
//! kansas_owner: "tbd"
//! ---
use std::fmt;

use base64::{engine::general_purpose, Engine as _};

pub const AUTHORIZATION: &str = "Authorization";

/// Email and API key pair supplied at launch.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    email: String,
    api_key: String,
}

impl Credentials {
    /// Build credentials only when both parts are present and non-empty.
    pub fn from_parts(email: Option<String>, api_key: Option<String>) -> Option<Self> {
        match (email, api_key) {
            (Some(email), Some(api_key)) if !email.is_empty() && !api_key.is_empty() => {
                Some(Self { email, api_key })
            }
            _ => None,
        }
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    /// `Basic base64(email:api_key)`.
    pub fn authorization(&self) -> String {
        let raw = format!("{}:{}", self.email, self.api_key);
        format!("Basic {}", general_purpose::STANDARD.encode(raw))
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("api_key", &"<redacted>")
            .finish()
    }
}

/// Headers sent with every request of a user: a single `Authorization`
/// header with credentials, nothing otherwise.
pub fn auth_headers(credentials: Option<&Credentials>) -> Vec<(String, String)> {
    credentials
        .map(|credentials| vec![(AUTHORIZATION.to_owned(), credentials.authorization())])
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_matches_known_encoding() {
        let credentials =
            Credentials::from_parts(Some("a@b.com".into()), Some("KEY".into())).unwrap();
        assert_eq!(credentials.authorization(), "Basic YUBiLmNvbTpLRVk=");
        assert_eq!(
            auth_headers(Some(&credentials)),
            vec![("Authorization".to_owned(), "Basic YUBiLmNvbTpLRVk=".to_owned())]
        );
    }

    #[test]
    fn both_parts_are_required() {
        assert!(Credentials::from_parts(Some("a@b.com".into()), None).is_none());
        assert!(Credentials::from_parts(None, Some("KEY".into())).is_none());
        assert!(Credentials::from_parts(Some(String::new()), Some("KEY".into())).is_none());
        assert!(Credentials::from_parts(None, None).is_none());
        assert!(auth_headers(None).is_empty());
    }

    #[test]
    fn debug_output_hides_api_key() {
        let credentials =
            Credentials::from_parts(Some("a@b.com".into()), Some("s3cret".into())).unwrap();
        let rendered = format!("{credentials:?}");
        assert!(rendered.contains("a@b.com"));
        assert!(!rendered.contains("s3cret"));
    }
}
