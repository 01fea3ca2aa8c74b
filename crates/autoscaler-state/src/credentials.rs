//! Custom-metrics credentials kept in the broker's own database.
//!
//! Only salted SHA-256 digests are stored. The plaintext username and
//! password leave the broker exactly once, in the bind response.

use async_trait::async_trait;
use autoscaler_core::Credential;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::debug;
use uuid::Uuid;

use crate::contracts::CredentialStore;
use crate::error::StoreResult;
use crate::store::StateStore;
use crate::tables::CREDENTIALS;

/// The persisted form of a credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredCredential {
    pub app_id: String,
    pub username_hash: String,
    pub password_hash: String,
    pub salt: String,
}

fn digest(salt: &str, secret: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(secret.as_bytes());
    hex::encode(hasher.finalize())
}

impl StoredCredential {
    fn seal(app_id: &str, credential: &Credential) -> Self {
        let salt = Uuid::new_v4().simple().to_string();
        Self {
            app_id: app_id.to_string(),
            username_hash: digest(&salt, &credential.username),
            password_hash: digest(&salt, &credential.password),
            salt,
        }
    }

    pub fn matches(&self, credential: &Credential) -> bool {
        self.username_hash == digest(&self.salt, &credential.username)
            && self.password_hash == digest(&self.salt, &credential.password)
    }
}

/// The default credential helper, persisting into a [`StateStore`].
#[derive(Clone)]
pub struct DbCredentialStore {
    store: StateStore,
}

impl DbCredentialStore {
    pub fn new(store: StateStore) -> Self {
        Self { store }
    }
}

#[async_trait]
impl CredentialStore for DbCredentialStore {
    async fn create(&self, app_id: &str) -> StoreResult<Credential> {
        let credential = Credential {
            username: Uuid::new_v4().to_string(),
            password: Uuid::new_v4().to_string(),
        };
        let sealed = StoredCredential::seal(app_id, &credential);
        self.store.put_record(CREDENTIALS, app_id, &sealed)?;
        debug!(%app_id, "credential issued");
        Ok(credential)
    }

    async fn delete(&self, app_id: &str) -> StoreResult<()> {
        let existed = self.store.remove_record(CREDENTIALS, app_id)?;
        debug!(%app_id, existed, "credential revoked");
        Ok(())
    }

    async fn get(&self, app_id: &str) -> StoreResult<Option<StoredCredential>> {
        Ok(self.store.get_record(CREDENTIALS, app_id)?)
    }

    async fn validate(&self, app_id: &str, credential: &Credential) -> StoreResult<bool> {
        Ok(self
            .get(app_id)
            .await?
            .is_some_and(|stored| stored.matches(credential)))
    }
}
