//! Server-side sessions keyed by an opaque cookie token.

use std::{collections::HashMap, sync::Arc, time::Duration};

use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use parking_lot::Mutex;
use rand::{distributions::Alphanumeric, Rng};
use time::OffsetDateTime;
use tracing::debug;

pub const SESSION_COOKIE: &str = "spv_session";
const TOKEN_LEN: usize = 48;

#[derive(Debug, Clone)]
pub struct Session {
    pub user_id: Option<String>,
    /// Set by the shared admin code; unrelated to `user_id`.
    pub is_admin: bool,
    /// Pending OAuth `state` parameter.
    pub oauth_state: Option<String>,
    pub expires_at: OffsetDateTime,
}

impl Session {
    fn is_expired(&self, now: OffsetDateTime) -> bool {
        self.expires_at <= now
    }
}

#[derive(Clone)]
pub struct SessionStore {
    sessions: Arc<Mutex<HashMap<String, Session>>>,
    ttl: Duration,
    secure_cookie: bool,
}

impl SessionStore {
    pub fn new(ttl: Duration, secure_cookie: bool) -> Self {
        Self {
            sessions: Arc::default(),
            ttl,
            secure_cookie,
        }
    }

    /// Live session for `token`; expired entries are dropped on sight.
    pub fn get(&self, token: &str) -> Option<Session> {
        let mut sessions = self.sessions.lock();
        if sessions.get(token)?.is_expired(OffsetDateTime::now_utc()) {
            sessions.remove(token);
            return None;
        }
        sessions.get(token).cloned()
    }

    /// Apply `f` to the session behind `token`, creating a fresh one when the
    /// token is absent, unknown or expired. Returns the token in use.
    pub fn update<F>(&self, token: Option<&str>, f: F) -> String
    where
        F: FnOnce(&mut Session),
    {
        let now = OffsetDateTime::now_utc();
        let mut sessions = self.sessions.lock();
        let live = token.filter(|t| sessions.get(*t).is_some_and(|s| !s.is_expired(now)));
        let token = match live {
            Some(t) => t.to_string(),
            None => {
                let t = new_token();
                sessions.insert(
                    t.clone(),
                    Session {
                        user_id: None,
                        is_admin: false,
                        oauth_state: None,
                        expires_at: now + self.ttl,
                    },
                );
                t
            }
        };
        if let Some(session) = sessions.get_mut(&token) {
            f(session);
        }
        token
    }

    /// Replace the session behind `token` with one under a new token, carrying
    /// the admin flag over. Used whenever a user identity gets bound.
    pub fn rotate<F>(&self, token: Option<&str>, f: F) -> String
    where
        F: FnOnce(&mut Session),
    {
        let carried_admin = token
            .and_then(|t| self.sessions.lock().remove(t))
            .filter(|s| !s.is_expired(OffsetDateTime::now_utc()))
            .is_some_and(|s| s.is_admin);
        self.update(None, |s| {
            s.is_admin = carried_admin;
            f(s);
        })
    }

    pub fn destroy(&self, token: &str) {
        self.sessions.lock().remove(token);
    }

    pub fn purge_expired(&self) -> usize {
        let now = OffsetDateTime::now_utc();
        let mut sessions = self.sessions.lock();
        let before = sessions.len();
        sessions.retain(|_, s| !s.is_expired(now));
        let purged = before - sessions.len();
        if purged > 0 {
            debug!(purged, "expired sessions purged");
        }
        purged
    }

    pub fn spawn_sweeper(&self, period: Duration) -> tokio::task::JoinHandle<()> {
        let this = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                ticker.tick().await;
                this.purge_expired();
            }
        })
    }

    pub fn cookie(&self, token: String) -> Cookie<'static> {
        Cookie::build((SESSION_COOKIE, token))
            .path("/")
            .http_only(true)
            .secure(self.secure_cookie)
            .same_site(SameSite::Lax)
            .max_age(time::Duration::seconds(self.ttl.as_secs() as i64))
            .build()
    }

    pub fn set_cookie(&self, jar: CookieJar, token: String) -> CookieJar {
        jar.add(self.cookie(token))
    }

    pub fn clear_cookie(&self, jar: CookieJar) -> CookieJar {
        let expired = Cookie::build((SESSION_COOKIE, ""))
            .path("/")
            .http_only(true)
            .secure(self.secure_cookie)
            .same_site(SameSite::Lax)
            .max_age(time::Duration::ZERO)
            .build();
        jar.add(expired)
    }
}

pub fn token_from(jar: &CookieJar) -> Option<String> {
    jar.get(SESSION_COOKIE).map(|c| c.value().to_owned())
}

pub(crate) fn new_token() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(TOKEN_LEN)
        .map(char::from)
        .collect()
}
