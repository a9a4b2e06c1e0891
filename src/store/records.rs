use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// How a user proves who they are.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Credential {
    /// Email + password account; holds the Argon2 PHC string.
    Local {
        #[serde(rename = "passwordHash")]
        password_hash: String,
    },
    /// Account created from an OAuth profile.
    External {
        #[serde(rename = "externalId")]
        external_id: String,
    },
}

/// User record. Never hard-deleted; moderation only flips flags or appends.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub username: String,
    pub email: Option<String>,
    pub credential: Credential,
    pub avatar: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub last_login: Option<OffsetDateTime>,
    #[serde(default)]
    pub suspended: bool,
    #[serde(default)]
    pub vip: bool,
    /// Ids of `Warning` records, oldest first.
    #[serde(default)]
    pub warnings: Vec<String>,
}

impl User {
    pub fn is_local(&self) -> bool {
        matches!(self.credential, Credential::Local { .. })
    }

    pub fn password_hash(&self) -> Option<&str> {
        match &self.credential {
            Credential::Local { password_hash } => Some(password_hash),
            Credential::External { .. } => None,
        }
    }

    pub fn external_id(&self) -> Option<&str> {
        match &self.credential {
            Credential::External { external_id } => Some(external_id),
            Credential::Local { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: String,
    pub name: String,
    pub owner_id: String,
    /// Serialized editor payload, stored as-is.
    pub code: String,
    pub domain: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(default)]
    pub is_public: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum WarningStatus {
    Active,
    Resolved,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Warning {
    pub id: String,
    pub user_id: String,
    pub reason: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub status: WarningStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Gift {
    pub id: String,
    pub user_id: String,
    pub gift_type: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl Gift {
    pub const VIP: &'static str = "vip";

    pub fn grants_vip(&self) -> bool {
        self.gift_type == Self::VIP
    }
}

/// User-submitted report. Only listed and persisted; nothing writes these yet.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub id: String,
    #[serde(default)]
    pub reporter_id: Option<String>,
    #[serde(default)]
    pub target_id: Option<String>,
    #[serde(default)]
    pub reason: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// Anything stored in a `Collection` is keyed by its own id.
pub trait Record {
    fn id(&self) -> &str;
}

macro_rules! impl_record {
    ($($ty:ty),* $(,)?) => {
        $(impl Record for $ty {
            fn id(&self) -> &str {
                &self.id
            }
        })*
    };
}

impl_record!(User, Project, Warning, Gift, Report);
