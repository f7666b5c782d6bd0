//! Admin accounts and token authentication.
//!
//! Passwords are hashed with Argon2 on a blocking thread so the runtime is
//! never stalled. A successful login issues an opaque bearer token that the
//! client sends back in the `Authorization` header.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use smallspider_core::{SpiderError, SpiderResult};

use crate::db::recover;

/// An account that may sign in to the admin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[allow(clippy::struct_excessive_bools)]
pub struct AdminUser {
    /// Primary key, referenced by `owner` fields.
    pub id: u64,
    /// Login name.
    pub username: String,
    /// Whether the account may use the admin.
    pub is_staff: bool,
    /// Whether the account bypasses permission checks.
    pub is_superuser: bool,
    /// Inactive accounts cannot log in.
    pub is_active: bool,
    /// Timestamp of the last successful login.
    pub last_login: Option<DateTime<Utc>>,
    #[serde(skip)]
    password_hash: String,
}

impl AdminUser {
    /// Creates an active staff account without a usable password.
    pub fn new(id: u64, username: impl Into<String>) -> Self {
        Self {
            id,
            username: username.into(),
            is_staff: true,
            is_superuser: false,
            is_active: true,
            last_login: None,
            password_hash: String::new(),
        }
    }

    /// Returns `true` if the account may use the admin.
    pub const fn can_access_admin(&self) -> bool {
        self.is_active && self.is_staff
    }
}

/// Hashes a password with Argon2id and a random salt.
pub async fn make_password(password: &str) -> SpiderResult<String> {
    let password = password.to_string();
    tokio::task::spawn_blocking(move || {
        use argon2::password_hash::{rand_core::OsRng, PasswordHasher as _, SaltString};
        use argon2::Argon2;

        let salt = SaltString::generate(&mut OsRng);
        let hash = Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| SpiderError::Internal(format!("Argon2 hash error: {e}")))?;
        Ok(hash.to_string())
    })
    .await
    .map_err(|e| SpiderError::Internal(format!("Task join error: {e}")))?
}

/// Checks a password against an encoded Argon2 hash.
///
/// An empty or malformed hash never matches.
pub async fn check_password(password: &str, encoded: &str) -> SpiderResult<bool> {
    if encoded.is_empty() {
        return Ok(false);
    }
    let password = password.to_string();
    let encoded = encoded.to_string();
    tokio::task::spawn_blocking(move || {
        use argon2::password_hash::{PasswordHash, PasswordVerifier as _};
        use argon2::Argon2;

        let Ok(parsed) = PasswordHash::new(&encoded) else {
            return false;
        };
        Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok()
    })
    .await
    .map_err(|e| SpiderError::Internal(format!("Task join error: {e}")))
}

/// The registry of admin accounts and their live tokens.
///
/// Clones share the same accounts and tokens.
#[derive(Debug, Clone, Default)]
pub struct UserRegistry {
    users: Arc<RwLock<HashMap<u64, AdminUser>>>,
    tokens: Arc<RwLock<HashMap<String, u64>>>,
    next_id: Arc<AtomicU64>,
}

impl UserRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an account with a hashed password.
    ///
    /// # Errors
    ///
    /// Returns [`SpiderError::BadRequest`] if the username is empty or taken.
    pub async fn create_user(
        &self,
        username: &str,
        password: &str,
        is_staff: bool,
        is_superuser: bool,
    ) -> SpiderResult<AdminUser> {
        if username.trim().is_empty() {
            return Err(SpiderError::BadRequest("username must not be empty".to_string()));
        }
        if self.find_by_username(username).is_some() {
            return Err(SpiderError::BadRequest(format!(
                "user '{username}' already exists"
            )));
        }

        let hash = make_password(password).await?;
        let mut users = recover(self.users.write());
        if users.values().any(|u| u.username == username) {
            return Err(SpiderError::BadRequest(format!(
                "user '{username}' already exists"
            )));
        }
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let user = AdminUser {
            is_staff,
            is_superuser,
            password_hash: hash,
            ..AdminUser::new(id, username)
        };
        users.insert(id, user.clone());
        drop(users);
        tracing::info!(user = username, id, "admin user created");
        Ok(user)
    }

    /// Returns the account with the given primary key.
    pub fn get(&self, id: u64) -> Option<AdminUser> {
        recover(self.users.read()).get(&id).cloned()
    }

    /// Returns every account ordered by primary key.
    pub fn all(&self) -> Vec<AdminUser> {
        let mut users: Vec<AdminUser> = recover(self.users.read()).values().cloned().collect();
        users.sort_by_key(|u| u.id);
        users
    }

    fn find_by_username(&self, username: &str) -> Option<AdminUser> {
        recover(self.users.read())
            .values()
            .find(|u| u.username == username)
            .cloned()
    }

    /// Verifies credentials, returning the account on success.
    ///
    /// Unknown users, wrong passwords and inactive accounts all yield `None`.
    pub async fn authenticate(
        &self,
        username: &str,
        password: &str,
    ) -> SpiderResult<Option<AdminUser>> {
        let Some(user) = self.find_by_username(username) else {
            return Ok(None);
        };
        if !user.is_active || !check_password(password, &user.password_hash).await? {
            return Ok(None);
        }
        let now = Utc::now();
        if let Some(stored) = recover(self.users.write()).get_mut(&user.id) {
            stored.last_login = Some(now);
        }
        Ok(Some(AdminUser {
            last_login: Some(now),
            ..user
        }))
    }

    /// Issues a new bearer token for the account.
    pub fn issue_token(&self, user: &AdminUser) -> String {
        let token = uuid::Uuid::new_v4().simple().to_string();
        recover(self.tokens.write()).insert(token.clone(), user.id);
        token
    }

    /// Resolves a bearer token to its account.
    pub fn user_for_token(&self, token: &str) -> Option<AdminUser> {
        let id = recover(self.tokens.read()).get(token).copied()?;
        self.get(id)
    }

    /// Invalidates a token. Returns `false` if it was not live.
    pub fn revoke_token(&self, token: &str) -> bool {
        recover(self.tokens.write()).remove(token).is_some()
    }
}

/// Extracts the token from an `Authorization: Bearer <token>` header value.
pub fn bearer_token(header: &str) -> Option<&str> {
    let (scheme, token) = header.trim().split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}
