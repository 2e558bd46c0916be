//! Secret record types and write-side validation.
//!
//! A secret is one credential entry owned by exactly one user: plaintext
//! metadata (name, URL, description, tags) plus two protected fields
//! stored as envelopes (`encoded_secret`, `encoded_username`).  Envelope
//! bytes use custom serde helpers so they serialize as base64 strings in
//! JSON rather than raw byte arrays.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::{Result, SafekeepError};

/// Maximum length of a secret name, in characters.
pub const MAX_NAME_LEN: usize = 128;

/// Maximum length of the URL field, in characters.
pub const MAX_URL_LEN: usize = 256;

/// Maximum length of the description field, in characters.
pub const MAX_DESCRIPTION_LEN: usize = 512;

/// Maximum plaintext size of the credential value, in bytes.
pub const MAX_SECRET_LEN: usize = 4096;

/// Maximum plaintext size of the associated username, in bytes.
pub const MAX_USERNAME_LEN: usize = 1024;

/// A stored secret row: plaintext metadata plus the two envelopes.
///
/// An empty envelope means the field was never set; nothing was
/// encrypted for it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecretRecord {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub url: String,
    pub description: String,
    pub tags: Vec<String>,

    /// Envelope for the credential value (may be empty).
    #[serde(serialize_with = "base64_encode", deserialize_with = "base64_decode")]
    pub encoded_secret: Vec<u8>,

    /// Envelope for the associated username (may be empty).
    #[serde(serialize_with = "base64_encode", deserialize_with = "base64_decode")]
    pub encoded_username: Vec<u8>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Plaintext input for creating or updating a secret.
///
/// Carries the values exactly as the user typed them; the service
/// validates and encrypts before anything reaches the record store.
#[derive(Debug, Clone, Default)]
pub struct SecretDraft {
    pub name: String,
    pub url: String,
    pub description: String,
    pub tags: Vec<String>,
    pub username: String,
    pub password: String,
}

impl SecretDraft {
    /// Check all field constraints.
    ///
    /// Runs before any key fetch or cryptographic operation, so a
    /// rejected draft never touches the AEAD primitive.
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() || self.name.chars().count() > MAX_NAME_LEN {
            return Err(SafekeepError::Validation(format!(
                "name must be between 1 and {MAX_NAME_LEN} characters"
            )));
        }

        if self.url.chars().count() > MAX_URL_LEN {
            return Err(SafekeepError::Validation(format!(
                "url must not exceed {MAX_URL_LEN} characters"
            )));
        }

        if self.description.chars().count() > MAX_DESCRIPTION_LEN {
            return Err(SafekeepError::Validation(format!(
                "description must not exceed {MAX_DESCRIPTION_LEN} characters"
            )));
        }

        if self.password.len() > MAX_SECRET_LEN {
            return Err(SafekeepError::Validation(format!(
                "secret value must not exceed {MAX_SECRET_LEN} bytes"
            )));
        }

        if self.username.len() > MAX_USERNAME_LEN {
            return Err(SafekeepError::Validation(format!(
                "username must not exceed {MAX_USERNAME_LEN} bytes"
            )));
        }

        if self.tags.is_empty() {
            return Err(SafekeepError::Validation(
                "at least one tag is required".to_string(),
            ));
        }

        Ok(())
    }
}

/// Lightweight listing entry for index views.
///
/// List views never expose envelopes or plaintext values, only what is
/// needed to render a row and link to the full record.
#[derive(Debug, Clone, Serialize)]
pub struct SecretListing {
    pub id: String,
    pub name: String,
    pub tags: Vec<String>,
}

/// A single secret with its protected fields decrypted.
///
/// Produced only by single-record reads and never by listings.
#[derive(Debug, Clone)]
pub struct RevealedSecret {
    pub id: String,
    pub name: String,
    pub url: String,
    pub description: String,
    pub tags: Vec<String>,
    pub username: String,
    pub password: String,
}

/// One entry of an export bundle.
///
/// Carries the revealed plaintext values plus the original envelope
/// bytes, so a bundle can be re-imported without needing the key that
/// produced it.  The bundle itself is not re-encrypted here; the caller
/// wraps it in its own protection before it leaves the system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportItem {
    pub name: String,
    pub url: String,
    pub description: String,
    pub tags: Vec<String>,
    pub username: String,
    pub password: String,

    #[serde(serialize_with = "base64_encode", deserialize_with = "base64_decode")]
    pub encoded_secret: Vec<u8>,

    #[serde(serialize_with = "base64_encode", deserialize_with = "base64_decode")]
    pub encoded_username: Vec<u8>,
}

pub(crate) fn base64_encode<S>(data: &[u8], serializer: S) -> std::result::Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    let encoded = BASE64.encode(data);
    serializer.serialize_str(&encoded)
}

pub(crate) fn base64_decode<'de, D>(deserializer: D) -> std::result::Result<Vec<u8>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    BASE64.decode(&s).map_err(serde::de::Error::custom)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft() -> SecretDraft {
        SecretDraft {
            name: "gitea".to_string(),
            url: "https://git.example.com".to_string(),
            description: String::new(),
            tags: vec!["dev".to_string()],
            username: "bob".to_string(),
            password: "p@ss".to_string(),
        }
    }

    #[test]
    fn valid_draft_passes() {
        assert!(draft().validate().is_ok());
    }

    #[test]
    fn empty_name_rejected() {
        let mut d = draft();
        d.name = String::new();
        assert!(matches!(
            d.validate(),
            Err(SafekeepError::Validation(_))
        ));
    }

    #[test]
    fn overlong_name_rejected() {
        let mut d = draft();
        d.name = "x".repeat(MAX_NAME_LEN + 1);
        assert!(d.validate().is_err());
    }

    #[test]
    fn overlong_secret_rejected() {
        let mut d = draft();
        d.password = "x".repeat(MAX_SECRET_LEN + 1);
        assert!(d.validate().is_err());
    }

    #[test]
    fn overlong_username_rejected() {
        let mut d = draft();
        d.username = "x".repeat(MAX_USERNAME_LEN + 1);
        assert!(d.validate().is_err());
    }

    #[test]
    fn missing_tags_rejected() {
        let mut d = draft();
        d.tags.clear();
        assert!(d.validate().is_err());
    }

    #[test]
    fn empty_values_are_allowed() {
        let mut d = draft();
        d.username = String::new();
        d.password = String::new();
        assert!(d.validate().is_ok());
    }

    #[test]
    fn export_item_envelopes_serialize_as_base64() {
        let item = ExportItem {
            name: "n".to_string(),
            url: String::new(),
            description: String::new(),
            tags: vec!["t".to_string()],
            username: "u".to_string(),
            password: "p".to_string(),
            encoded_secret: vec![1, 2, 3],
            encoded_username: Vec::new(),
        };

        let json = serde_json::to_string(&item).unwrap();
        assert!(json.contains(&BASE64.encode([1u8, 2, 3])));

        let back: ExportItem = serde_json::from_str(&json).unwrap();
        assert_eq!(back.encoded_secret, vec![1, 2, 3]);
        assert!(back.encoded_username.is_empty());
    }
}
