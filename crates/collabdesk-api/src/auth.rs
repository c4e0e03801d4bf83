//! Authentication module

use argon2::password_hash::rand_core::{OsRng, RngCore};
use argon2::password_hash::{PasswordHasher, SaltString};
use argon2::{Argon2, PasswordHash, PasswordVerifier};
use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::Response,
};
use collabdesk_common::types::UserId;
use collabdesk_common::{Error, Result};
use collabdesk_core::DispatchEngine;
use collabdesk_storage::repository::api_keys::ApiKey;
use collabdesk_storage::{ApiKeyRepository, ApiKeyRepositoryTrait, CreateApiKey, DatabasePool};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::{debug, error, warn};
use uuid::Uuid;

/// Prefix of every issued key
const KEY_PREFIX: &str = "cdk_";

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub db_pool: DatabasePool,
    pub engine: Arc<DispatchEngine>,
}

/// Authenticated context extracted from API key
#[derive(Debug, Clone)]
pub struct AuthContext {
    /// The user every read and write of this request is scoped to
    pub user_id: UserId,
    /// Scopes granted to this API key
    pub scopes: Vec<String>,
    /// API key ID for audit logging
    pub api_key_id: Uuid,
}

impl AuthContext {
    /// Check if the authenticated context has a specific scope
    pub fn has_scope(&self, scope: &str) -> bool {
        self.scopes.iter().any(|s| s == "*" || s == scope)
    }
}

/// Extract API key from request
pub fn extract_api_key(req: &Request) -> Option<&str> {
    // Check Authorization header
    if let Some(auth) = req.headers().get("authorization") {
        if let Ok(auth_str) = auth.to_str() {
            if let Some(key) = auth_str.strip_prefix("Bearer ") {
                return Some(key.trim());
            }
        }
    }

    // Check X-API-Key header
    if let Some(key) = req.headers().get("x-api-key") {
        if let Ok(key_str) = key.to_str() {
            return Some(key_str.trim());
        }
    }

    None
}

/// Extract the prefix from an API key (first 8 characters)
fn extract_key_prefix(api_key: &str) -> Option<&str> {
    api_key.get(..8)
}

/// Hash an API key for comparison
fn hash_api_key(api_key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(api_key.as_bytes());
    let result = hasher.finalize();
    hex::encode(result)
}

/// Verify an API key against a stored hash.
///
/// Supports both Argon2 hashes (`$argon2...`) and legacy SHA-256 hex hashes.
fn verify_api_key(api_key: &str, stored_hash: &str) -> bool {
    if stored_hash.starts_with("$argon2") {
        return PasswordHash::new(stored_hash)
            .ok()
            .and_then(|parsed_hash| {
                Argon2::default()
                    .verify_password(api_key.as_bytes(), &parsed_hash)
                    .ok()
            })
            .is_some();
    }

    hash_api_key(api_key) == stored_hash
}

/// A freshly generated key: the plaintext is shown once, only the hash is stored
#[derive(Debug)]
pub struct GeneratedKey {
    pub plaintext: String,
    pub prefix: String,
    pub hash: String,
}

/// Generate a random API key and its Argon2 hash
pub fn generate_api_key() -> Result<GeneratedKey> {
    let mut secret = [0u8; 24];
    OsRng.fill_bytes(&mut secret);
    let plaintext = format!("{}{}", KEY_PREFIX, hex::encode(secret));

    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(plaintext.as_bytes(), &salt)
        .map_err(|e| Error::Internal(format!("Failed to hash API key: {}", e)))?
        .to_string();

    let prefix = plaintext[..8].to_string();

    Ok(GeneratedKey {
        plaintext,
        prefix,
        hash,
    })
}

/// Create and store a new API key for a user, returning the plaintext key
pub async fn issue_api_key(
    db_pool: &DatabasePool,
    user_id: UserId,
    name: &str,
    scopes: Vec<String>,
) -> Result<(String, ApiKey)> {
    let generated = generate_api_key()?;
    let repo = ApiKeyRepository::new(db_pool.clone());

    let stored = repo
        .create(CreateApiKey {
            user_id,
            name: name.to_string(),
            key_hash: generated.hash,
            key_prefix: generated.prefix,
            scopes,
            expires_at: None,
        })
        .await?;

    Ok((generated.plaintext, stored))
}

/// Validate an API key against the database
async fn validate_api_key(db_pool: &DatabasePool, api_key: &str) -> std::result::Result<ApiKey, StatusCode> {
    let prefix = extract_key_prefix(api_key).ok_or_else(|| {
        warn!("API key too short");
        StatusCode::UNAUTHORIZED
    })?;

    let repo = ApiKeyRepository::new(db_pool.clone());

    // Find potential matches by prefix
    let candidates = repo.find_by_prefix(prefix).await.map_err(|e| {
        error!("Database error while looking up API key: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    if candidates.is_empty() {
        warn!("No API key found with prefix: {}", prefix);
        return Err(StatusCode::UNAUTHORIZED);
    }

    for candidate in candidates {
        if verify_api_key(api_key, &candidate.key_hash) {
            if candidate.is_expired() {
                warn!("API key {} has expired", candidate.id);
                return Err(StatusCode::UNAUTHORIZED);
            }

            // Fire and forget, auth does not fail on this
            let repo_clone = ApiKeyRepository::new(db_pool.clone());
            let key_id = candidate.id;
            tokio::spawn(async move {
                if let Err(e) = repo_clone.update_last_used(key_id).await {
                    error!("Failed to update API key last_used_at: {}", e);
                }
            });

            debug!(
                "API key {} authenticated for user {}",
                candidate.id, candidate.user_id
            );
            return Ok(candidate);
        }
    }

    warn!("API key hash mismatch for prefix: {}", prefix);
    Err(StatusCode::UNAUTHORIZED)
}

/// Authentication middleware
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> std::result::Result<Response, StatusCode> {
    let api_key = extract_api_key(&request).ok_or_else(|| {
        warn!("Missing API key in request to {}", request.uri().path());
        StatusCode::UNAUTHORIZED
    })?;

    let validated_key = validate_api_key(&state.db_pool, api_key).await?;

    let auth_context = AuthContext {
        user_id: validated_key.user_id,
        scopes: validated_key.scopes_vec(),
        api_key_id: validated_key.id,
    };

    request.extensions_mut().insert(auth_context);

    Ok(next.run(request).await)
}

/// Check if the authenticated key has a specific scope
pub fn require_scope(auth_context: &AuthContext, scope: &str) -> std::result::Result<(), StatusCode> {
    if !auth_context.has_scope(scope) {
        warn!(
            "Scope access denied: API key {} lacks scope '{}'",
            auth_context.api_key_id, scope
        );
        return Err(StatusCode::FORBIDDEN);
    }
    Ok(())
}
