//! Access predicates. Each one is a hard gate: anything other than a clear
//! pass is a failure.

use crate::{
    auth::session::Session,
    error::AppError,
    store::records::{Project, User},
};

/// The caller may touch `project` only if they own it.
pub fn ensure_owner(user_id: &str, project: &Project) -> Result<(), AppError> {
    if project.owner_id == user_id {
        Ok(())
    } else {
        Err(AppError::Forbidden)
    }
}

/// Admin scope depends on session state alone, not on who is logged in.
pub fn ensure_admin(session: Option<&Session>) -> Result<(), AppError> {
    match session {
        Some(s) if s.is_admin => Ok(()),
        _ => Err(AppError::Forbidden),
    }
}

pub fn ensure_not_suspended(user: &User) -> Result<(), AppError> {
    if user.suspended {
        Err(AppError::Suspended)
    } else {
        Ok(())
    }
}

/// Compare a supplied admin code against the configured one without
/// short-circuiting on the first differing byte.
pub fn admin_code_matches(expected: &str, supplied: &str) -> bool {
    let (a, b) = (expected.as_bytes(), supplied.as_bytes());
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
