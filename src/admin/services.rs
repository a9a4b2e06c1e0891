use time::OffsetDateTime;
use tracing::{info, warn};

use super::dto::{AdminConfigView, AdminUserView, Analytics, WithUsername};
use crate::{
    error::AppError,
    policy,
    projects::services::MAX_PROJECTS_PER_OWNER,
    state::AppState,
    store::{
        new_id,
        records::{Gift, Project, Report, User, Warning, WarningStatus},
        Collections, Store,
    },
};

const UNKNOWN_USER: &str = "unknown user";

/// Set the session's admin flag when `code` matches. A wrong code leaves the
/// session untouched. Returns the session token to hand back to the client.
pub fn unlock(state: &AppState, token: Option<&str>, code: &str) -> Result<String, AppError> {
    if !policy::admin_code_matches(&state.config.admin_access_code, code) {
        warn!("wrong admin access code");
        return Err(AppError::Forbidden);
    }
    let token = state.sessions.update(token, |s| s.is_admin = true);
    info!("admin session unlocked");
    Ok(token)
}

fn with_user<F>(store: &Store, user_id: &str, f: F) -> Result<User, AppError>
where
    F: FnOnce(&mut Collections, &str) -> Result<(), AppError>,
{
    let mut db = store.write();
    if db.users.get(user_id).is_none() {
        return Err(AppError::NotFound("user"));
    }
    f(&mut *db, user_id)?;
    db.users
        .get(user_id)
        .cloned()
        .ok_or(AppError::NotFound("user"))
}

pub async fn set_suspended(state: &AppState, user_id: &str, suspended: bool) -> Result<User, AppError> {
    let user = with_user(&state.store, user_id, |db, id| {
        if let Some(u) = db.users.get_mut(id) {
            u.suspended = suspended;
        }
        Ok(())
    })?;
    state.persistence.flush().await;
    info!(%user_id, suspended, "suspension changed");
    Ok(user)
}

pub async fn warn_user(state: &AppState, user_id: &str, reason: &str) -> Result<Warning, AppError> {
    let reason = reason.trim();
    if reason.is_empty() {
        return Err(AppError::Validation("reason is required".into()));
    }

    let warning = Warning {
        id: new_id(),
        user_id: user_id.to_owned(),
        reason: reason.to_owned(),
        created_at: OffsetDateTime::now_utc(),
        status: WarningStatus::Active,
    };
    with_user(&state.store, user_id, |db, id| {
        db.warnings.upsert(warning.clone());
        if let Some(u) = db.users.get_mut(id) {
            u.warnings.push(warning.id.clone());
        }
        Ok(())
    })?;
    state.persistence.flush().await;
    info!(%user_id, warning_id = %warning.id, "user warned");
    Ok(warning)
}

pub async fn grant_gift(
    state: &AppState,
    user_id: &str,
    gift_type: &str,
    description: Option<String>,
) -> Result<Gift, AppError> {
    let gift_type = gift_type.trim();
    if gift_type.is_empty() {
        return Err(AppError::Validation("giftType is required".into()));
    }

    let gift = Gift {
        id: new_id(),
        user_id: user_id.to_owned(),
        gift_type: gift_type.to_owned(),
        description,
        created_at: OffsetDateTime::now_utc(),
    };
    with_user(&state.store, user_id, |db, id| {
        db.gifts.upsert(gift.clone());
        if gift.grants_vip() {
            if let Some(u) = db.users.get_mut(id) {
                u.vip = true;
            }
        }
        Ok(())
    })?;
    state.persistence.flush().await;
    info!(%user_id, gift_id = %gift.id, gift_type = %gift.gift_type, "gift granted");
    Ok(gift)
}

pub fn list_users(store: &Store) -> Vec<AdminUserView> {
    store.read().users.values().map(AdminUserView::from).collect()
}

fn join_username<T, F>(db: &Collections, records: impl Iterator<Item = T>, owner: F) -> Vec<WithUsername<T>>
where
    F: Fn(&T) -> &str,
{
    records
        .map(|record| {
            let username = db
                .username_of(owner(&record))
                .unwrap_or(UNKNOWN_USER)
                .to_owned();
            WithUsername { record, username }
        })
        .collect()
}

pub fn list_warnings(store: &Store) -> Vec<WithUsername<Warning>> {
    let db = store.read();
    join_username(&db, db.warnings.values().cloned(), |w| &w.user_id)
}

pub fn list_gifts(store: &Store) -> Vec<WithUsername<Gift>> {
    let db = store.read();
    join_username(&db, db.gifts.values().cloned(), |g| &g.user_id)
}

pub fn list_projects(store: &Store) -> Vec<WithUsername<Project>> {
    let db = store.read();
    join_username(&db, db.projects.values().cloned(), |p| &p.owner_id)
}

pub fn list_reports(store: &Store) -> Vec<Report> {
    store.read().reports.values().cloned().collect()
}

pub fn analytics(store: &Store) -> Analytics {
    let db = store.read();
    let suspended_users = db.users.values().filter(|u| u.suspended).count();
    Analytics {
        total_users: db.users.len(),
        total_projects: db.projects.len(),
        total_warnings: db.warnings.len(),
        total_gifts: db.gifts.len(),
        active_users: db.users.len() - suspended_users,
        suspended_users,
        vip_users: db.users.values().filter(|u| u.vip).count(),
    }
}

pub fn config_view(state: &AppState) -> AdminConfigView {
    AdminConfigView {
        max_projects_per_user: MAX_PROJECTS_PER_OWNER,
        discord_auth: state.identity.is_some(),
        registration_open: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{auth::services::register_local, projects::services::create_project};

    async fn seeded() -> (AppState, User) {
        let state = AppState::fake();
        let user = register_local(&state, "ana", "ana@example.com", "secret1")
            .await
            .unwrap();
        (state, user)
    }

    #[tokio::test]
    async fn wrong_code_does_not_touch_session() {
        let (state, _) = seeded().await;
        let token = state.sessions.update(None, |_| {});

        assert!(matches!(unlock(&state, Some(&token), "nope"), Err(AppError::Forbidden)));
        assert!(!state.sessions.get(&token).unwrap().is_admin);

        let same = unlock(&state, Some(&token), "test-code").unwrap();
        assert_eq!(same, token);
        assert!(state.sessions.get(&token).unwrap().is_admin);
    }

    #[tokio::test]
    async fn suspend_and_unsuspend_round_trip() {
        let (state, user) = seeded().await;
        assert!(set_suspended(&state, &user.id, true).await.unwrap().suspended);
        assert_eq!(analytics(&state.store).suspended_users, 1);
        assert!(!set_suspended(&state, &user.id, false).await.unwrap().suspended);
        assert_eq!(analytics(&state.store).active_users, 1);
    }

    #[tokio::test]
    async fn actions_on_unknown_user_are_not_found() {
        let (state, _) = seeded().await;
        assert!(matches!(
            set_suspended(&state, "ghost", true).await,
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            warn_user(&state, "ghost", "spam").await,
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            grant_gift(&state, "ghost", "vip", None).await,
            Err(AppError::NotFound(_))
        ));
        assert!(state.store.read().warnings.is_empty());
        assert!(state.store.read().gifts.is_empty());
    }

    #[tokio::test]
    async fn warnings_are_stored_by_reference() {
        let (state, user) = seeded().await;
        let w = warn_user(&state, &user.id, "  spam links ").await.unwrap();
        assert_eq!(w.reason, "spam links");
        assert_eq!(w.status, WarningStatus::Active);

        let db = state.store.read();
        assert_eq!(db.users.get(&user.id).unwrap().warnings, vec![w.id.clone()]);
        assert!(db.warnings.get(&w.id).is_some());
    }

    #[tokio::test]
    async fn vip_gift_bumps_vip_count_by_one() {
        let (state, user) = seeded().await;
        let before = analytics(&state.store).vip_users;

        grant_gift(&state, &user.id, "badge", Some("early adopter".into()))
            .await
            .unwrap();
        assert_eq!(analytics(&state.store).vip_users, before);

        grant_gift(&state, &user.id, "vip", None).await.unwrap();
        let after = analytics(&state.store);
        assert_eq!(after.vip_users, before + 1);
        assert_eq!(after.total_gifts, 2);
    }

    #[tokio::test]
    async fn joined_listings_fall_back_for_missing_users() {
        let (state, user) = seeded().await;
        create_project(&state.store, &user.id, "mine", String::new(), "example.test").unwrap();
        create_project(&state.store, "ghost", "orphan", String::new(), "example.test").unwrap();

        let rows = list_projects(&state.store);
        let names: Vec<_> = rows.iter().map(|r| r.username.as_str()).collect();
        assert_eq!(names, ["ana", UNKNOWN_USER]);
    }

    #[tokio::test]
    async fn moderation_is_flushed_eagerly() {
        let (state, user) = seeded().await;
        set_suspended(&state, &user.id, true).await.unwrap();

        let fresh = std::sync::Arc::new(Store::new());
        crate::store::persist::Persistence::new(state.persistence.dir(), fresh.clone()).load();
        assert!(fresh.read().users.get(&user.id).unwrap().suspended);
        std::fs::remove_dir_all(state.persistence.dir()).ok();
    }
}
