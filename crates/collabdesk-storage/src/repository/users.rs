//! User repository

use crate::db::DatabasePool;
use crate::models::User;
use async_trait::async_trait;
use collabdesk_common::types::UserId;
use collabdesk_common::{Error, Result};
use uuid::Uuid;

/// User repository trait
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn create(&self, email: &str, name: Option<&str>) -> Result<User>;
    async fn get(&self, id: UserId) -> Result<Option<User>>;
    async fn get_by_email(&self, email: &str) -> Result<Option<User>>;
}

/// Database user repository
pub struct DbUserRepository {
    pool: DatabasePool,
}

impl DbUserRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }

    /// Find a user by email, creating it when missing
    pub async fn get_or_create(&self, email: &str, name: Option<&str>) -> Result<User> {
        if let Some(user) = self.get_by_email(email).await? {
            return Ok(user);
        }
        self.create(email, name).await
    }
}

#[async_trait]
impl UserRepository for DbUserRepository {
    async fn create(&self, email: &str, name: Option<&str>) -> Result<User> {
        sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (id, email, name)
            VALUES ($1, $2, $3)
            RETURNING *
            "#,
        )
        .bind(Uuid::now_v7())
        .bind(email.trim().to_lowercase())
        .bind(name)
        .fetch_one(self.pool.pool())
        .await
        .map_err(|e| Error::Database(e.to_string()))
    }

    async fn get(&self, id: UserId) -> Result<Option<User>> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool.pool())
            .await
            .map_err(|e| Error::Database(e.to_string()))
    }

    async fn get_by_email(&self, email: &str) -> Result<Option<User>> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = $1")
            .bind(email.trim().to_lowercase())
            .fetch_optional(self.pool.pool())
            .await
            .map_err(|e| Error::Database(e.to_string()))
    }
}
