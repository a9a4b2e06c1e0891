use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::store::records::User;

#[derive(Debug, Deserialize)]
pub struct UnlockRequest {
    pub code: String,
}

#[derive(Debug, Deserialize)]
pub struct WarnRequest {
    pub reason: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GiftRequest {
    pub gift_type: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ActionResponse {
    pub success: bool,
    pub message: &'static str,
}

impl ActionResponse {
    pub fn ok(message: &'static str) -> Self {
        Self {
            success: true,
            message,
        }
    }
}

/// User as shown to operators: moderation state, no credential material.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminUserView {
    pub id: String,
    pub username: String,
    pub email: Option<String>,
    pub external_id: Option<String>,
    pub avatar: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_login: Option<OffsetDateTime>,
    pub suspended: bool,
    pub vip: bool,
    pub warnings: Vec<String>,
}

impl From<&User> for AdminUserView {
    fn from(u: &User) -> Self {
        Self {
            id: u.id.clone(),
            username: u.username.clone(),
            email: u.email.clone(),
            external_id: u.external_id().map(str::to_owned),
            avatar: u.avatar.clone(),
            created_at: u.created_at,
            last_login: u.last_login,
            suspended: u.suspended,
            vip: u.vip,
            warnings: u.warnings.clone(),
        }
    }
}

/// A record joined with its user's name.
#[derive(Debug, Serialize)]
pub struct WithUsername<T> {
    #[serde(flatten)]
    pub record: T,
    pub username: String,
}

#[derive(Debug, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Analytics {
    pub total_users: usize,
    pub total_projects: usize,
    pub total_warnings: usize,
    pub total_gifts: usize,
    pub active_users: usize,
    pub suspended_users: usize,
    pub vip_users: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminConfigView {
    pub max_projects_per_user: usize,
    pub discord_auth: bool,
    pub registration_open: bool,
}
