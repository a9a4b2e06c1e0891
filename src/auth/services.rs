//! Identity resolution: local and external enrollment, local authentication,
//! and session-to-user lookup.

use lazy_static::lazy_static;
use regex::Regex;
use time::OffsetDateTime;
use tracing::{info, warn};

use super::discord::ExternalProfile;
use super::password::{hash_password_async, verify_password_async};
use crate::{
    error::AppError,
    policy,
    state::AppState,
    store::{
        new_id,
        records::{Credential, User},
        Store,
    },
};

const MAX_USERNAME_CHARS: usize = 32;
const MIN_PASSWORD_CHARS: usize = 6;

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Current record for a session's user id. A dangling id resolves to nothing.
pub fn resolve_user(store: &Store, user_id: &str) -> Option<User> {
    store.read().users.get(user_id).cloned()
}

pub async fn register_local(
    state: &AppState,
    username: &str,
    email: &str,
    password: &str,
) -> Result<User, AppError> {
    let username = username.trim();
    let email = normalize_email(email);

    let username_chars = username.chars().count();
    if username_chars == 0 || username_chars > MAX_USERNAME_CHARS {
        return Err(AppError::Validation(format!(
            "username must be 1-{MAX_USERNAME_CHARS} characters"
        )));
    }
    if !is_valid_email(&email) {
        return Err(AppError::Validation("invalid email".into()));
    }
    if password.chars().count() < MIN_PASSWORD_CHARS {
        return Err(AppError::Validation(format!(
            "password must be at least {MIN_PASSWORD_CHARS} characters"
        )));
    }

    // Cheap rejection before paying for the hash.
    if state.store.read().find_local_by_email(&email).is_some() {
        warn!(email = %email, "email already registered");
        return Err(AppError::DuplicateEmail);
    }

    let password_hash = hash_password_async(password.to_owned()).await?;

    let user = {
        let mut db = state.store.write();
        // Another registration may have won while we were hashing.
        if db.find_local_by_email(&email).is_some() {
            warn!(email = %email, "email registered concurrently");
            return Err(AppError::DuplicateEmail);
        }
        let now = OffsetDateTime::now_utc();
        let user = User {
            id: new_id(),
            username: username.to_owned(),
            email: Some(email),
            credential: Credential::Local { password_hash },
            avatar: None,
            created_at: now,
            last_login: Some(now),
            suspended: false,
            vip: false,
            warnings: Vec::new(),
        };
        db.users.upsert(user.clone());
        user
    };

    state.persistence.flush().await;
    info!(user_id = %user.id, "user registered");
    Ok(user)
}

pub async fn authenticate_local(
    state: &AppState,
    email: &str,
    password: &str,
) -> Result<User, AppError> {
    let email = normalize_email(email);
    let user = state
        .store
        .read()
        .find_local_by_email(&email)
        .cloned()
        .ok_or_else(|| {
            warn!(email = %email, "login unknown email");
            AppError::NotFound("user")
        })?;

    // Suspension wins over the password check so a suspended account never
    // learns whether its password was right.
    if let Err(e) = policy::ensure_not_suspended(&user) {
        warn!(user_id = %user.id, "login attempt on suspended account");
        return Err(e);
    }

    let hash = user
        .password_hash()
        .ok_or(AppError::BadCredential)?
        .to_owned();
    if !verify_password_async(password.to_owned(), hash).await? {
        warn!(user_id = %user.id, "login invalid password");
        return Err(AppError::BadCredential);
    }

    let now = OffsetDateTime::now_utc();
    let user = state
        .store
        .write()
        .users
        .get_mut(&user.id)
        .map(|u| {
            u.last_login = Some(now);
            u.clone()
        })
        .ok_or(AppError::NotFound("user"))?;

    info!(user_id = %user.id, "user logged in");
    Ok(user)
}

/// Match an external profile to a user, refreshing or creating as needed.
/// Suspension is not checked here; callers gate on it before binding a session.
pub async fn enroll_external(state: &AppState, profile: ExternalProfile) -> User {
    let now = OffsetDateTime::now_utc();
    let (user, created) = {
        let mut db = state.store.write();
        let existing = db
            .find_by_external_id(&profile.external_id)
            .map(|u| u.id.clone());
        match existing.and_then(|id| db.users.get_mut(&id)) {
            Some(user) => {
                user.username = profile.username;
                user.avatar = profile.avatar;
                user.last_login = Some(now);
                (user.clone(), false)
            }
            None => {
                let user = User {
                    id: new_id(),
                    username: profile.username,
                    email: profile.email.map(|e| normalize_email(&e)),
                    credential: Credential::External {
                        external_id: profile.external_id,
                    },
                    avatar: profile.avatar,
                    created_at: now,
                    last_login: Some(now),
                    suspended: false,
                    vip: false,
                    warnings: Vec::new(),
                };
                db.users.upsert(user.clone());
                (user, true)
            }
        }
    };

    if created {
        state.persistence.flush().await;
        info!(user_id = %user.id, "external user enrolled");
    } else {
        info!(user_id = %user.id, "external user refreshed");
    }
    user
}
