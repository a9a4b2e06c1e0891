use std::sync::Arc;

use crate::auth::discord::{DiscordProvider, IdentityProvider};
use crate::auth::session::SessionStore;
use crate::config::AppConfig;
use crate::rate_limit::RateLimiter;
use crate::store::{persist::Persistence, Store};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<Store>,
    pub persistence: Persistence,
    pub sessions: SessionStore,
    pub config: Arc<AppConfig>,
    /// `None` when no external provider is configured.
    pub identity: Option<Arc<dyn IdentityProvider>>,
    pub limiter: RateLimiter,
}

impl AppState {
    /// Build from the environment and load the last snapshot from disk.
    pub fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);
        let identity = config
            .discord
            .clone()
            .map(|d| Arc::new(DiscordProvider::new(d)) as Arc<dyn IdentityProvider>);
        let state = Self::from_parts(config, identity);
        state.persistence.load();
        Ok(state)
    }

    pub fn from_parts(config: Arc<AppConfig>, identity: Option<Arc<dyn IdentityProvider>>) -> Self {
        let store = Arc::new(Store::new());
        Self {
            persistence: Persistence::new(config.data_dir.clone(), store.clone()),
            sessions: SessionStore::new(config.session_ttl, config.cookie_secure),
            limiter: RateLimiter::new(&config.rate_limit),
            store,
            config,
            identity,
        }
    }

    #[cfg(test)]
    pub fn fake() -> Self {
        use crate::auth::discord::ExternalProfile;
        use crate::config::RateLimitConfig;
        use async_trait::async_trait;
        use std::time::Duration;

        /// Accepts any code except "bad"; the code doubles as the external id.
        struct FakeIdentity;
        #[async_trait]
        impl IdentityProvider for FakeIdentity {
            fn authorize_url(&self, state: &str) -> anyhow::Result<String> {
                Ok(format!("https://id.test/authorize?state={state}"))
            }
            async fn exchange(&self, code: &str) -> anyhow::Result<ExternalProfile> {
                anyhow::ensure!(code != "bad", "code rejected");
                Ok(ExternalProfile {
                    external_id: code.into(),
                    username: format!("user-{code}"),
                    email: None,
                    avatar: Some(format!("avatar-{code}")),
                })
            }
        }

        let data_dir = std::env::temp_dir().join(format!("spvisual-test-{}", crate::store::new_id()));
        let config = Arc::new(AppConfig {
            host: "127.0.0.1".into(),
            port: 0,
            data_dir,
            public_dir: "public".into(),
            flush_interval: Duration::from_secs(30),
            admin_access_code: "test-code".into(),
            session_ttl: Duration::from_secs(60 * 60),
            cookie_secure: false,
            project_domain_suffix: "example.test".into(),
            rate_limit: RateLimitConfig {
                max_requests: 10_000,
                window: Duration::from_secs(60),
            },
            discord: None,
        });
        Self::from_parts(config, Some(Arc::new(FakeIdentity)))
    }
}
