/// Application context and dependency injection
use crate::{
    account::AccountManager,
    admin::AdminRoleManager,
    appeal::AppealManager,
    config::ServerConfig,
    content::ContentStore,
    db,
    error::AppResult,
    moderation::ModerationManager,
    post_tags::PostTagManager,
    relationship::RelationshipStore,
};
use sqlx::SqlitePool;
use std::sync::Arc;

/// Application context holding all shared services
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<ServerConfig>,
    pub db: SqlitePool,
    pub accounts: Arc<AccountManager>,
    pub content: Arc<ContentStore>,
    pub relationships: Arc<RelationshipStore>,
    pub moderation: Arc<ModerationManager>,
    pub appeals: Arc<AppealManager>,
    pub post_tags: Arc<PostTagManager>,
    pub admin_roles: Arc<AdminRoleManager>,
}

impl AppContext {
    /// Create a new application context from configuration
    pub async fn new(config: ServerConfig) -> AppResult<Self> {
        config.validate()?;

        let pool =
            db::create_pool(&config.storage.core_db, db::DatabaseOptions::default()).await?;
        db::run_migrations(&pool).await?;
        db::test_connection(&pool).await?;

        Ok(Self::from_pool(config, pool))
    }

    /// Wire managers onto an existing pool (tests use an in-memory pool)
    pub fn from_pool(config: ServerConfig, pool: SqlitePool) -> Self {
        Self {
            config: Arc::new(config),
            accounts: Arc::new(AccountManager::new(pool.clone())),
            content: Arc::new(ContentStore::new(pool.clone())),
            relationships: Arc::new(RelationshipStore::new(pool.clone())),
            moderation: Arc::new(ModerationManager::new(pool.clone())),
            appeals: Arc::new(AppealManager::new(pool.clone())),
            post_tags: Arc::new(PostTagManager::new(pool.clone())),
            admin_roles: Arc::new(AdminRoleManager::new(pool.clone())),
            db: pool,
        }
    }

    /// Get service URL
    pub fn service_url(&self) -> String {
        format!(
            "http://{}:{}",
            self.config.service.hostname, self.config.service.port
        )
    }
}
