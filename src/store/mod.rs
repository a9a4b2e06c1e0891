//! In-memory record store: five keyed collections behind one lock.

use std::collections::HashMap;

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub mod persist;
pub mod records;

use records::{Gift, Project, Record, Report, User, Warning};

/// Id-keyed records kept in insertion order.
#[derive(Debug, Clone)]
pub struct Collection<T> {
    entries: Vec<(String, T)>,
    index: HashMap<String, usize>,
}

impl<T> Default for Collection<T> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            index: HashMap::new(),
        }
    }
}

impl<T: Record> Collection<T> {
    /// Insert or replace by the record's own id. A replaced record keeps its position.
    pub fn upsert(&mut self, record: T) {
        let id = record.id().to_string();
        self.put(id, record);
    }
}

impl<T> Collection<T> {
    pub(crate) fn put(&mut self, id: String, record: T) {
        match self.index.get(&id) {
            Some(&pos) => self.entries[pos].1 = record,
            None => {
                self.index.insert(id.clone(), self.entries.len());
                self.entries.push((id, record));
            }
        }
    }

    pub fn get(&self, id: &str) -> Option<&T> {
        self.index.get(id).map(|&pos| &self.entries[pos].1)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut T> {
        self.index.get(id).map(|&pos| &mut self.entries[pos].1)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn values(&self) -> impl Iterator<Item = &T> {
        self.entries.iter().map(|(_, v)| v)
    }

    pub fn entries(&self) -> &[(String, T)] {
        &self.entries
    }
}

impl<T: Clone> Collection<T> {
    fn to_pairs(&self) -> Vec<(String, T)> {
        self.entries.clone()
    }
}

/// The five collections.
#[derive(Debug, Default)]
pub struct Collections {
    pub users: Collection<User>,
    pub projects: Collection<Project>,
    pub warnings: Collection<Warning>,
    pub gifts: Collection<Gift>,
    pub reports: Collection<Report>,
}

impl Collections {
    /// Local accounts only; external accounts may share an email.
    pub fn find_local_by_email(&self, email: &str) -> Option<&User> {
        self.users
            .values()
            .find(|u| u.is_local() && u.email.as_deref() == Some(email))
    }

    pub fn find_by_external_id(&self, external_id: &str) -> Option<&User> {
        self.users
            .values()
            .find(|u| u.external_id() == Some(external_id))
    }

    pub fn projects_owned_by(&self, owner_id: &str) -> impl Iterator<Item = &Project> {
        let owner_id = owner_id.to_string();
        self.projects
            .values()
            .filter(move |p| p.owner_id == owner_id)
    }

    pub fn username_of(&self, user_id: &str) -> Option<&str> {
        self.users.get(user_id).map(|u| u.username.as_str())
    }
}

/// Point-in-time copy of every collection as `[id, record]` pairs, the on-disk shape.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Snapshot {
    pub users: Vec<(String, User)>,
    pub projects: Vec<(String, Project)>,
    pub warnings: Vec<(String, Warning)>,
    pub gifts: Vec<(String, Gift)>,
    pub reports: Vec<(String, Report)>,
}

#[derive(Debug, Default)]
pub struct Store {
    inner: RwLock<Collections>,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn read(&self) -> RwLockReadGuard<'_, Collections> {
        self.inner.read()
    }

    pub fn write(&self) -> RwLockWriteGuard<'_, Collections> {
        self.inner.write()
    }

    pub fn snapshot(&self) -> Snapshot {
        let db = self.inner.read();
        Snapshot {
            users: db.users.to_pairs(),
            projects: db.projects.to_pairs(),
            warnings: db.warnings.to_pairs(),
            gifts: db.gifts.to_pairs(),
            reports: db.reports.to_pairs(),
        }
    }
}

/// Fresh opaque record id.
pub fn new_id() -> String {
    Uuid::new_v4().simple().to_string()
}
