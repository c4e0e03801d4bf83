//! API key repository

use crate::db::DatabasePool;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use collabdesk_common::types::UserId;
use collabdesk_common::{Error, Result};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// API key ID type
pub type ApiKeyId = Uuid;

/// API key model
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ApiKey {
    pub id: ApiKeyId,
    pub user_id: UserId,
    pub name: String,
    pub key_hash: String,
    pub key_prefix: String,
    pub scopes: serde_json::Value,
    pub expires_at: Option<DateTime<Utc>>,
    pub last_used_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl ApiKey {
    /// Check if the API key has expired
    pub fn is_expired(&self) -> bool {
        if let Some(expires_at) = self.expires_at {
            expires_at < Utc::now()
        } else {
            false
        }
    }

    /// Get scopes as a vector
    pub fn scopes_vec(&self) -> Vec<String> {
        serde_json::from_value(self.scopes.clone()).unwrap_or_default()
    }

    /// Check if the API key has a specific scope
    pub fn has_scope(&self, scope: &str) -> bool {
        let scopes = self.scopes_vec();
        scopes.iter().any(|s| s == "*" || s == scope)
    }
}

/// New API key input; the plaintext key never reaches storage
#[derive(Debug, Clone)]
pub struct CreateApiKey {
    pub user_id: UserId,
    pub name: String,
    pub key_hash: String,
    pub key_prefix: String,
    pub scopes: Vec<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

/// API key repository trait
#[async_trait]
pub trait ApiKeyRepository: Send + Sync {
    /// Store a new hashed key
    async fn create(&self, input: CreateApiKey) -> Result<ApiKey>;

    /// Find API keys by their prefix (for initial lookup)
    async fn find_by_prefix(&self, prefix: &str) -> Result<Vec<ApiKey>>;

    /// Get an API key by ID
    async fn get(&self, id: ApiKeyId) -> Result<Option<ApiKey>>;

    /// Update last_used_at timestamp
    async fn update_last_used(&self, id: ApiKeyId) -> Result<()>;
}

/// Database API key repository
pub struct DbApiKeyRepository {
    pool: DatabasePool,
}

impl DbApiKeyRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ApiKeyRepository for DbApiKeyRepository {
    async fn create(&self, input: CreateApiKey) -> Result<ApiKey> {
        let scopes = serde_json::to_value(&input.scopes)
            .map_err(|e| Error::Internal(format!("Failed to encode scopes: {}", e)))?;

        sqlx::query_as::<_, ApiKey>(
            r#"
            INSERT INTO api_keys (id, user_id, name, key_hash, key_prefix, scopes, expires_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id, user_id, name, key_hash, key_prefix, scopes,
                      expires_at, last_used_at, created_at
            "#,
        )
        .bind(Uuid::now_v7())
        .bind(input.user_id)
        .bind(&input.name)
        .bind(&input.key_hash)
        .bind(&input.key_prefix)
        .bind(&scopes)
        .bind(input.expires_at)
        .fetch_one(self.pool.pool())
        .await
        .map_err(|e| Error::Database(e.to_string()))
    }

    async fn find_by_prefix(&self, prefix: &str) -> Result<Vec<ApiKey>> {
        sqlx::query_as::<_, ApiKey>(
            r#"
            SELECT id, user_id, name, key_hash, key_prefix, scopes,
                   expires_at, last_used_at, created_at
            FROM api_keys
            WHERE key_prefix = $1
              AND (expires_at IS NULL OR expires_at > NOW())
            LIMIT 10
            "#,
        )
        .bind(prefix)
        .fetch_all(self.pool.pool())
        .await
        .map_err(|e| Error::Database(e.to_string()))
    }

    async fn get(&self, id: ApiKeyId) -> Result<Option<ApiKey>> {
        sqlx::query_as::<_, ApiKey>(
            r#"
            SELECT id, user_id, name, key_hash, key_prefix, scopes,
                   expires_at, last_used_at, created_at
            FROM api_keys
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(self.pool.pool())
        .await
        .map_err(|e| Error::Database(e.to_string()))
    }

    async fn update_last_used(&self, id: ApiKeyId) -> Result<()> {
        sqlx::query("UPDATE api_keys SET last_used_at = NOW() WHERE id = $1")
            .bind(id)
            .execute(self.pool.pool())
            .await
            .map_err(|e| Error::Database(e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(scopes: serde_json::Value, expires_at: Option<DateTime<Utc>>) -> ApiKey {
        ApiKey {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            name: "dashboard".to_string(),
            key_hash: String::new(),
            key_prefix: "cdk_abcd".to_string(),
            scopes,
            expires_at,
            last_used_at: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_wildcard_scope() {
        let k = key(serde_json::json!(["*"]), None);
        assert!(k.has_scope("campaigns:send"));
    }

    #[test]
    fn test_explicit_scope() {
        let k = key(serde_json::json!(["campaigns:read"]), None);
        assert!(k.has_scope("campaigns:read"));
        assert!(!k.has_scope("campaigns:send"));
    }

    #[test]
    fn test_expiry() {
        let past = Utc::now() - chrono::Duration::minutes(5);
        assert!(key(serde_json::json!([]), Some(past)).is_expired());
        assert!(!key(serde_json::json!([]), None).is_expired());
    }
}
