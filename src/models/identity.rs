use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

use crate::models::Contact;

/// An identity fragment submitted for reconciliation.
///
/// Accepts `phoneNumber` (the wire name) or `phone`; numeric phone input is
/// coerced to its decimal string form, and JSON null is treated as absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentifyRequest {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(
        default,
        alias = "phoneNumber",
        rename(serialize = "phoneNumber"),
        deserialize_with = "phone_as_string"
    )]
    pub phone: Option<String>,
}

/// Request rejected before the engine runs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("invalid email format: {0}")]
    InvalidEmail(String),
    #[error("at least one of email or phoneNumber must be provided")]
    MissingIdentifiers,
}

impl IdentifyRequest {
    pub fn new(email: Option<String>, phone: Option<String>) -> Self {
        Self { email, phone }
    }

    /// Trim both fields and drop empty values, then check what remains.
    /// The engine assumes already-normalized input, so every caller goes
    /// through here first.
    pub fn normalize_and_validate(&mut self) -> Result<(), ValidationError> {
        self.email = normalize_field(self.email.take());
        self.phone = normalize_field(self.phone.take());

        if let Some(ref email) = self.email {
            if !is_valid_email(email) {
                return Err(ValidationError::InvalidEmail(email.clone()));
            }
        }

        if self.email.is_none() && self.phone.is_none() {
            return Err(ValidationError::MissingIdentifiers);
        }

        Ok(())
    }
}

fn normalize_field(value: Option<String>) -> Option<String> {
    let value = value?;
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn is_valid_email(email: &str) -> bool {
    let parts: Vec<&str> = email.split('@').collect();
    if parts.len() != 2 {
        return false;
    }
    let (local, domain) = (parts[0], parts[1]);
    !local.is_empty() && !domain.is_empty() && domain.contains('.')
}

fn phone_as_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    match value {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(serde_json::Value::String(s)) => Ok(Some(s)),
        Some(serde_json::Value::Number(n)) => Ok(Some(n.to_string())),
        Some(other) => Err(serde::de::Error::custom(format!(
            "phoneNumber must be a string or number, got {}",
            other
        ))),
    }
}

/// The externally-visible view of one cluster: every identifier known to
/// belong to the person, plus id metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsolidatedContact {
    pub primary_id: i64,
    pub emails: Vec<String>,
    pub phones: Vec<String>,
    pub secondary_ids: Vec<i64>,
}

impl ConsolidatedContact {
    /// View of a cluster containing exactly one freshly-created primary.
    pub fn single(contact: &Contact) -> Self {
        Self {
            primary_id: contact.id,
            emails: contact.email.iter().cloned().collect(),
            phones: contact.phone.iter().cloned().collect(),
            secondary_ids: Vec::new(),
        }
    }
}
