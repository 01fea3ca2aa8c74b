//! Store contracts consumed by the broker.
//!
//! Each contract reports absent, duplicate and conflicting records through
//! [`StoreError`] variants. Implementations must make create operations
//! atomic create-if-absent so concurrent requests for the same id resolve to
//! exactly one winner.

use async_trait::async_trait;
use autoscaler_core::{AppPolicy, Credential, ScalingPolicy, ServiceBinding, ServiceInstance};

use crate::credentials::StoredCredential;
use crate::error::StoreResult;

/// Persistence of service instances and their bindings.
#[async_trait]
pub trait BindingStore: Send + Sync {
    /// `AlreadyExists` when an identical instance is present, `Conflict` when
    /// the id is taken with different parameters.
    async fn create_service_instance(&self, instance: &ServiceInstance) -> StoreResult<()>;
    async fn update_service_instance(&self, instance: &ServiceInstance) -> StoreResult<()>;
    async fn delete_service_instance(&self, instance_id: &str) -> StoreResult<()>;
    async fn get_service_instance(&self, instance_id: &str) -> StoreResult<ServiceInstance>;

    /// `AlreadyExists` when the binding id or the app is already bound.
    async fn create_service_binding(&self, binding: &ServiceBinding) -> StoreResult<()>;
    async fn delete_service_binding(&self, binding_id: &str) -> StoreResult<()>;
    async fn delete_service_binding_by_app_id(&self, app_id: &str) -> StoreResult<()>;
    async fn get_app_id_by_binding_id(&self, binding_id: &str) -> StoreResult<String>;
    async fn get_binding_ids_by_instance_id(&self, instance_id: &str) -> StoreResult<Vec<String>>;
    async fn get_app_ids_by_instance_id(&self, instance_id: &str) -> StoreResult<Vec<String>>;
}

/// Persistence of per-app scaling policies.
#[async_trait]
pub trait PolicyStore: Send + Sync {
    async fn save_app_policy(
        &self,
        app_id: &str,
        policy: &ScalingPolicy,
        guid: &str,
    ) -> StoreResult<()>;
    async fn get_app_policy(&self, app_id: &str) -> StoreResult<Option<AppPolicy>>;
    /// Deleting an absent policy succeeds.
    async fn delete_policy(&self, app_id: &str) -> StoreResult<()>;
    /// Deletes every policy carrying `guid`; returns the affected app ids.
    async fn delete_policies_by_policy_guid(&self, guid: &str) -> StoreResult<Vec<String>>;
    /// Writes `policy` for each app in `app_ids` whose current policy guid is
    /// `old_guid` (`None` matches apps without a policy). Returns the app ids
    /// that were written.
    async fn set_or_update_default_app_policy(
        &self,
        app_ids: &[String],
        old_guid: Option<&str>,
        policy: &ScalingPolicy,
        new_guid: &str,
    ) -> StoreResult<Vec<String>>;
}

/// Issues and revokes custom-metrics credentials.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Issue a fresh credential, replacing any previous one for the app.
    async fn create(&self, app_id: &str) -> StoreResult<Credential>;
    /// Deleting an absent credential succeeds.
    async fn delete(&self, app_id: &str) -> StoreResult<()>;
    async fn get(&self, app_id: &str) -> StoreResult<Option<StoredCredential>>;
    async fn validate(&self, app_id: &str, credential: &Credential) -> StoreResult<bool>;
}
