use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single contact row. Each row holds one (email, phone) observation;
/// rows sharing an identifier are linked into a cluster anchored by the
/// cluster's oldest row, its primary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    pub id: i64,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub link_precedence: LinkPrecedence,
    /// Id of the cluster primary. Set if and only if this row is secondary.
    pub linked_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkPrecedence {
    Primary,
    Secondary,
}

impl LinkPrecedence {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Primary => "primary",
            Self::Secondary => "secondary",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "secondary" => Self::Secondary,
            _ => Self::Primary,
        }
    }
}

impl Contact {
    pub fn is_primary(&self) -> bool {
        self.link_precedence == LinkPrecedence::Primary
    }

    /// Id of the primary anchoring this contact's cluster.
    /// None for a secondary whose link is missing (invalid state).
    pub fn cluster_primary_id(&self) -> Option<i64> {
        match self.link_precedence {
            LinkPrecedence::Primary => Some(self.id),
            LinkPrecedence::Secondary => self.linked_id,
        }
    }
}

/// Fields for a contact to be inserted; the store assigns id and timestamps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewContact {
    pub email: Option<String>,
    pub phone: Option<String>,
    pub link_precedence: LinkPrecedence,
    pub linked_id: Option<i64>,
}

impl NewContact {
    /// A new cluster anchor, created when nothing matches the request.
    pub fn primary(email: Option<&str>, phone: Option<&str>) -> Self {
        Self {
            email: email.map(String::from),
            phone: phone.map(String::from),
            link_precedence: LinkPrecedence::Primary,
            linked_id: None,
        }
    }

    /// New information attached to an existing cluster.
    pub fn secondary(email: Option<&str>, phone: Option<&str>, primary_id: i64) -> Self {
        Self {
            email: email.map(String::from),
            phone: phone.map(String::from),
            link_precedence: LinkPrecedence::Secondary,
            linked_id: Some(primary_id),
        }
    }
}
