use time::OffsetDateTime;
use tracing::{info, warn};

use crate::{
    error::AppError,
    policy,
    store::{new_id, records::Project, Store},
};

/// Hard cap on projects held by one owner.
pub const MAX_PROJECTS_PER_OWNER: usize = 30;

/// `<name lowercased, outside [a-z0-9] stripped>-<id>.<suffix>`
pub fn project_domain(name: &str, id: &str, suffix: &str) -> String {
    let slug: String = name
        .to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
        .collect();
    format!("{slug}-{id}.{suffix}")
}

pub fn list_projects(store: &Store, owner_id: &str) -> Vec<Project> {
    store
        .read()
        .projects_owned_by(owner_id)
        .take(MAX_PROJECTS_PER_OWNER)
        .cloned()
        .collect()
}

pub fn get_project(store: &Store, user_id: &str, project_id: &str) -> Result<Project, AppError> {
    let db = store.read();
    let project = db
        .projects
        .get(project_id)
        .ok_or(AppError::NotFound("project"))?;
    policy::ensure_owner(user_id, project)?;
    Ok(project.clone())
}

/// Count, check and insert under one write lock.
pub fn create_project(
    store: &Store,
    owner_id: &str,
    name: &str,
    code: String,
    domain_suffix: &str,
) -> Result<Project, AppError> {
    if name.trim().is_empty() {
        return Err(AppError::Validation("project name is required".into()));
    }

    let mut db = store.write();
    let owned = db.projects_owned_by(owner_id).count();
    if owned >= MAX_PROJECTS_PER_OWNER {
        warn!(%owner_id, owned, "project quota exceeded");
        return Err(AppError::QuotaExceeded(MAX_PROJECTS_PER_OWNER));
    }

    let id = new_id();
    let project = Project {
        domain: project_domain(name, &id, domain_suffix),
        id,
        name: name.to_owned(),
        owner_id: owner_id.to_owned(),
        code,
        created_at: OffsetDateTime::now_utc(),
        is_public: false,
    };
    db.projects.upsert(project.clone());
    info!(project_id = %project.id, %owner_id, "project created");
    Ok(project)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fill(store: &Store, owner: &str, n: usize) {
        for i in 0..n {
            create_project(store, owner, &format!("p{i}"), String::new(), "example.test").unwrap();
        }
    }

    #[test]
    fn domain_slug_strips_everything_outside_ascii_alnum() {
        assert_eq!(
            project_domain("My Cool_Site! v2", "abc", "example.test"),
            "mycoolsitev2-abc.example.test"
        );
        assert_eq!(project_domain("Café", "1", "x.io"), "caf-1.x.io");
    }

    #[test]
    fn quota_admits_thirtieth_project_and_rejects_the_next() {
        let store = Store::new();
        fill(&store, "u1", MAX_PROJECTS_PER_OWNER - 1);

        create_project(&store, "u1", "last", String::new(), "example.test").unwrap();
        assert_eq!(store.read().projects_owned_by("u1").count(), MAX_PROJECTS_PER_OWNER);

        let err = create_project(&store, "u1", "extra", String::new(), "example.test").unwrap_err();
        assert!(matches!(err, AppError::QuotaExceeded(30)));
        assert_eq!(store.read().projects.len(), MAX_PROJECTS_PER_OWNER);
    }

    #[test]
    fn quota_is_per_owner() {
        let store = Store::new();
        fill(&store, "u1", MAX_PROJECTS_PER_OWNER);
        assert!(create_project(&store, "u2", "mine", String::new(), "example.test").is_ok());
    }

    #[test]
    fn new_project_defaults() {
        let store = Store::new();
        let p = create_project(&store, "u1", "Demo", "<p>x</p>".into(), "example.test").unwrap();
        assert!(!p.is_public);
        assert_eq!(p.owner_id, "u1");
        assert_eq!(p.domain, format!("demo-{}.example.test", p.id));
    }

    #[test]
    fn blank_name_is_rejected() {
        let store = Store::new();
        assert!(matches!(
            create_project(&store, "u1", "   ", String::new(), "example.test"),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn get_project_checks_existence_then_ownership() {
        let store = Store::new();
        let p = create_project(&store, "u1", "Demo", String::new(), "example.test").unwrap();

        assert_eq!(get_project(&store, "u1", &p.id).unwrap().id, p.id);
        assert!(matches!(get_project(&store, "u2", &p.id), Err(AppError::Forbidden)));
        assert!(matches!(get_project(&store, "u1", "nope"), Err(AppError::NotFound(_))));
    }

    #[test]
    fn listing_only_returns_own_projects() {
        let store = Store::new();
        fill(&store, "u1", 2);
        fill(&store, "u2", 3);
        let mine = list_projects(&store, "u1");
        assert_eq!(mine.len(), 2);
        assert!(mine.iter().all(|p| p.owner_id == "u1"));
    }
}
