use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::OffsetDateTime;
use tokio::sync::Mutex;
use tracing::info;
use uuid::Uuid;

use crate::auth::dto::PublicUser;
use crate::auth::password::{hash_password, verify_password};
use crate::storage::{DocumentStore, StoreError};

/// Name of the shared credentials document.
const USERS_DOC: &str = "users.json";

/// A user as persisted on disk. The hash never leaves this module except
/// through `find_by_email`, which only the login path consumes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub name: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("user with this email already exists")]
    Duplicate,

    #[error("password hashing failed: {0}")]
    Hash(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Persists user records in one shared JSON document.
///
/// Reads are lock-free; `create` serializes its read-modify-persist cycle
/// under a store-wide mutex so two racing registrations cannot both pass
/// the duplicate check.
#[derive(Clone)]
pub struct CredentialStore {
    docs: Arc<dyn DocumentStore>,
    write_lock: Arc<Mutex<()>>,
}

impl CredentialStore {
    pub fn new(docs: Arc<dyn DocumentStore>) -> Self {
        Self {
            docs,
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    async fn read_all(&self) -> Result<Vec<UserRecord>, StoreError> {
        let bytes = match self.docs.load(USERS_DOC).await? {
            Some(bytes) => bytes,
            None => return Ok(Vec::new()),
        };
        serde_json::from_slice(&bytes).map_err(|e| StoreError::Corrupt {
            doc: USERS_DOC.to_string(),
            source: e,
        })
    }

    async fn write_all(&self, users: &[UserRecord]) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec_pretty(users).map_err(|e| StoreError::Encode {
            doc: USERS_DOC.to_string(),
            source: e,
        })?;
        self.docs.persist(USERS_DOC, bytes).await
    }

    /// Find a user by (already lowercased) email, hash included.
    pub async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>, StoreError> {
        let users = self.read_all().await?;
        Ok(users.into_iter().find(|u| u.email == email))
    }

    /// Find a user by id, as the public view.
    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<PublicUser>, StoreError> {
        let users = self.read_all().await?;
        Ok(users.into_iter().find(|u| u.id == id).map(PublicUser::from))
    }

    /// Register a new user. The email must already be trimmed+lowercased.
    pub async fn create(
        &self,
        email: &str,
        password: &str,
        name: Option<String>,
    ) -> Result<PublicUser, CredentialError> {
        let _guard = self.write_lock.lock().await;

        let mut users = self.read_all().await?;
        if users.iter().any(|u| u.email == email) {
            return Err(CredentialError::Duplicate);
        }

        let password_hash =
            hash_password(password).map_err(|e| CredentialError::Hash(e.to_string()))?;

        let name = name
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| email.split('@').next().unwrap_or(email).to_string());

        let user = UserRecord {
            id: Uuid::new_v4(),
            email: email.to_string(),
            password_hash,
            name,
            created_at: OffsetDateTime::now_utc(),
        };

        users.push(user.clone());
        self.write_all(&users).await?;

        info!(user_id = %user.id, email = %user.email, "user created");
        Ok(PublicUser::from(user))
    }

    /// Check email+password, returning the public view on a match.
    ///
    /// Unknown email and wrong password are indistinguishable to the caller.
    pub async fn verify_credentials(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Option<PublicUser>, StoreError> {
        let Some(user) = self.find_by_email(email).await? else {
            return Ok(None);
        };
        if !verify_password(password, &user.password_hash) {
            return Ok(None);
        }
        Ok(Some(PublicUser::from(user)))
    }
}
