//! StateStore — redb-backed persistence for the autoscaler broker.
//!
//! Implements [`BindingStore`] and [`PolicyStore`] over JSON-serialized
//! records. The store supports both on-disk and in-memory backends (the
//! latter for testing).

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use autoscaler_core::{AppPolicy, ScalingPolicy, ServiceBinding, ServiceInstance};
use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::contracts::{BindingStore, PolicyStore};
use crate::error::{StateError, StateResult, StoreError, StoreResult};
use crate::tables::*;

/// Convert any `Display` error into a `StateError` variant via a closure factory.
macro_rules! map_err {
    ($variant:ident) => {
        |e| StateError::$variant(e.to_string())
    };
}

pub(crate) use map_err;

pub(crate) type JsonTable = TableDefinition<'static, &'static str, &'static [u8]>;

pub(crate) fn decode<T: DeserializeOwned>(bytes: &[u8]) -> StateResult<T> {
    serde_json::from_slice(bytes).map_err(map_err!(Deserialize))
}

pub(crate) fn encode<T: Serialize>(value: &T) -> StateResult<Vec<u8>> {
    serde_json::to_vec(value).map_err(map_err!(Serialize))
}

/// Thread-safe broker store backed by redb.
#[derive(Clone)]
pub struct StateStore {
    db: Arc<Database>,
}

impl StateStore {
    /// Open (or create) a persistent store at the given path.
    pub fn open(path: &Path) -> StateResult<Self> {
        let db = Database::create(path).map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!(?path, "state store opened");
        Ok(store)
    }

    /// Create an ephemeral in-memory store (for testing).
    pub fn open_in_memory() -> StateResult<Self> {
        let backend = redb::backends::InMemoryBackend::new();
        let db = Database::builder()
            .create_with_backend(backend)
            .map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!("in-memory state store opened");
        Ok(store)
    }

    fn ensure_tables(&self) -> StateResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        // Opening a table in a write transaction creates it if absent.
        txn.open_table(SERVICE_INSTANCES).map_err(map_err!(Table))?;
        txn.open_table(SERVICE_BINDINGS).map_err(map_err!(Table))?;
        txn.open_table(APP_POLICIES).map_err(map_err!(Table))?;
        txn.open_table(CREDENTIALS).map_err(map_err!(Table))?;
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    // ── Generic record access ──────────────────────────────────────

    pub(crate) fn get_record<T: DeserializeOwned>(
        &self,
        def: JsonTable,
        key: &str,
    ) -> StateResult<Option<T>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(def).map_err(map_err!(Table))?;
        match table.get(key).map_err(map_err!(Read))? {
            Some(guard) => Ok(Some(decode(guard.value())?)),
            None => Ok(None),
        }
    }

    pub(crate) fn list_records<T: DeserializeOwned>(&self, def: JsonTable) -> StateResult<Vec<T>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(def).map_err(map_err!(Table))?;
        let mut results = Vec::new();
        for entry in table.iter().map_err(map_err!(Read))? {
            let (_, value) = entry.map_err(map_err!(Read))?;
            results.push(decode(value.value())?);
        }
        Ok(results)
    }

    pub(crate) fn put_record<T: Serialize>(
        &self,
        def: JsonTable,
        key: &str,
        record: &T,
    ) -> StateResult<()> {
        let value = encode(record)?;
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(def).map_err(map_err!(Table))?;
            table.insert(key, value.as_slice()).map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    /// Returns true if the record existed.
    pub(crate) fn remove_record(&self, def: JsonTable, key: &str) -> StateResult<bool> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let existed;
        {
            let mut table = txn.open_table(def).map_err(map_err!(Table))?;
            existed = table.remove(key).map_err(map_err!(Write))?.is_some();
        }
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(existed)
    }

    /// A single binding record, if present.
    pub fn service_binding(&self, binding_id: &str) -> StateResult<Option<ServiceBinding>> {
        self.get_record(SERVICE_BINDINGS, binding_id)
    }

    fn bindings_for_instance(&self, instance_id: &str) -> StateResult<Vec<ServiceBinding>> {
        let bindings: Vec<ServiceBinding> = self.list_records(SERVICE_BINDINGS)?;
        Ok(bindings
            .into_iter()
            .filter(|b| b.instance_id == instance_id)
            .collect())
    }
}

// ── Service instances & bindings ───────────────────────────────

#[async_trait]
impl BindingStore for StateStore {
    async fn create_service_instance(&self, instance: &ServiceInstance) -> StoreResult<()> {
        let key = instance.instance_id.as_str();
        let value = encode(instance)?;
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let outcome = {
            let mut table = txn.open_table(SERVICE_INSTANCES).map_err(map_err!(Table))?;
            let existing: Option<ServiceInstance> = match table.get(key).map_err(map_err!(Read))? {
                Some(guard) => Some(decode(guard.value())?),
                None => None,
            };
            match existing {
                Some(current) if current.same_parameters(instance) => {
                    Err(StoreError::AlreadyExists(format!("service instance {key}")))
                }
                Some(_) => Err(StoreError::Conflict(format!("service instance {key}"))),
                None => {
                    table.insert(key, value.as_slice()).map_err(map_err!(Write))?;
                    Ok(())
                }
            }
        };
        if outcome.is_ok() {
            txn.commit().map_err(map_err!(Transaction))?;
            debug!(instance_id = %key, "service instance stored");
        } else {
            txn.abort().map_err(map_err!(Transaction))?;
        }
        outcome
    }

    async fn update_service_instance(&self, instance: &ServiceInstance) -> StoreResult<()> {
        let key = instance.instance_id.as_str();
        let value = encode(instance)?;
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let exists = {
            let mut table = txn.open_table(SERVICE_INSTANCES).map_err(map_err!(Table))?;
            let exists = table.get(key).map_err(map_err!(Read))?.is_some();
            if exists {
                table.insert(key, value.as_slice()).map_err(map_err!(Write))?;
            }
            exists
        };
        if !exists {
            txn.abort().map_err(map_err!(Transaction))?;
            return Err(StoreError::DoesNotExist(format!("service instance {key}")));
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(instance_id = %key, "service instance updated");
        Ok(())
    }

    async fn delete_service_instance(&self, instance_id: &str) -> StoreResult<()> {
        if !self.remove_record(SERVICE_INSTANCES, instance_id)? {
            return Err(StoreError::DoesNotExist(format!(
                "service instance {instance_id}"
            )));
        }
        debug!(%instance_id, "service instance deleted");
        Ok(())
    }

    async fn get_service_instance(&self, instance_id: &str) -> StoreResult<ServiceInstance> {
        self.get_record(SERVICE_INSTANCES, instance_id)?
            .ok_or_else(|| StoreError::DoesNotExist(format!("service instance {instance_id}")))
    }

    async fn create_service_binding(&self, binding: &ServiceBinding) -> StoreResult<()> {
        let key = binding.binding_id.as_str();
        let value = encode(binding)?;
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let outcome = {
            let mut table = txn.open_table(SERVICE_BINDINGS).map_err(map_err!(Table))?;
            let mut taken = false;
            for entry in table.iter().map_err(map_err!(Read))? {
                let (id, raw) = entry.map_err(map_err!(Read))?;
                let existing: ServiceBinding = decode(raw.value())?;
                if id.value() == key || existing.app_id == binding.app_id {
                    taken = true;
                    break;
                }
            }
            if taken {
                Err(StoreError::AlreadyExists(format!(
                    "service binding for app {}",
                    binding.app_id
                )))
            } else {
                table.insert(key, value.as_slice()).map_err(map_err!(Write))?;
                Ok(())
            }
        };
        if outcome.is_ok() {
            txn.commit().map_err(map_err!(Transaction))?;
            debug!(binding_id = %key, app_id = %binding.app_id, "service binding stored");
        } else {
            txn.abort().map_err(map_err!(Transaction))?;
        }
        outcome
    }

    async fn delete_service_binding(&self, binding_id: &str) -> StoreResult<()> {
        if !self.remove_record(SERVICE_BINDINGS, binding_id)? {
            return Err(StoreError::DoesNotExist(format!(
                "service binding {binding_id}"
            )));
        }
        debug!(%binding_id, "service binding deleted");
        Ok(())
    }

    async fn delete_service_binding_by_app_id(&self, app_id: &str) -> StoreResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let mut matched = Vec::new();
        {
            let mut table = txn.open_table(SERVICE_BINDINGS).map_err(map_err!(Table))?;
            for entry in table.iter().map_err(map_err!(Read))? {
                let (id, raw) = entry.map_err(map_err!(Read))?;
                let binding: ServiceBinding = decode(raw.value())?;
                if binding.app_id == app_id {
                    matched.push(id.value().to_string());
                }
            }
            for binding_id in &matched {
                table.remove(binding_id.as_str()).map_err(map_err!(Write))?;
            }
        }
        if matched.is_empty() {
            txn.abort().map_err(map_err!(Transaction))?;
            return Err(StoreError::DoesNotExist(format!(
                "service binding for app {app_id}"
            )));
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(%app_id, removed = matched.len(), "service bindings deleted by app");
        Ok(())
    }

    async fn get_app_id_by_binding_id(&self, binding_id: &str) -> StoreResult<String> {
        self.get_record::<ServiceBinding>(SERVICE_BINDINGS, binding_id)?
            .map(|b| b.app_id)
            .ok_or_else(|| StoreError::DoesNotExist(format!("service binding {binding_id}")))
    }

    async fn get_binding_ids_by_instance_id(&self, instance_id: &str) -> StoreResult<Vec<String>> {
        Ok(self
            .bindings_for_instance(instance_id)?
            .into_iter()
            .map(|b| b.binding_id)
            .collect())
    }

    async fn get_app_ids_by_instance_id(&self, instance_id: &str) -> StoreResult<Vec<String>> {
        Ok(self
            .bindings_for_instance(instance_id)?
            .into_iter()
            .map(|b| b.app_id)
            .collect())
    }
}

// ── App policies ───────────────────────────────────────────────

#[async_trait]
impl PolicyStore for StateStore {
    async fn save_app_policy(
        &self,
        app_id: &str,
        policy: &ScalingPolicy,
        guid: &str,
    ) -> StoreResult<()> {
        let record = AppPolicy {
            app_id: app_id.to_string(),
            policy: policy.definition(),
            guid: guid.to_string(),
        };
        self.put_record(APP_POLICIES, app_id, &record)?;
        debug!(%app_id, %guid, "app policy stored");
        Ok(())
    }

    async fn get_app_policy(&self, app_id: &str) -> StoreResult<Option<AppPolicy>> {
        Ok(self.get_record(APP_POLICIES, app_id)?)
    }

    async fn delete_policy(&self, app_id: &str) -> StoreResult<()> {
        let existed = self.remove_record(APP_POLICIES, app_id)?;
        debug!(%app_id, existed, "app policy deleted");
        Ok(())
    }

    async fn delete_policies_by_policy_guid(&self, guid: &str) -> StoreResult<Vec<String>> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let mut deleted = Vec::new();
        {
            let mut table = txn.open_table(APP_POLICIES).map_err(map_err!(Table))?;
            for entry in table.iter().map_err(map_err!(Read))? {
                let (_, raw) = entry.map_err(map_err!(Read))?;
                let record: AppPolicy = decode(raw.value())?;
                if record.guid == guid {
                    deleted.push(record.app_id);
                }
            }
            for app_id in &deleted {
                table.remove(app_id.as_str()).map_err(map_err!(Write))?;
            }
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(%guid, count = deleted.len(), "app policies deleted by guid");
        Ok(deleted)
    }

    async fn set_or_update_default_app_policy(
        &self,
        app_ids: &[String],
        old_guid: Option<&str>,
        policy: &ScalingPolicy,
        new_guid: &str,
    ) -> StoreResult<Vec<String>> {
        let definition = policy.definition();
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let mut updated = Vec::new();
        {
            let mut table = txn.open_table(APP_POLICIES).map_err(map_err!(Table))?;
            for app_id in app_ids {
                let current: Option<AppPolicy> =
                    match table.get(app_id.as_str()).map_err(map_err!(Read))? {
                        Some(guard) => Some(decode(guard.value())?),
                        None => None,
                    };
                if current.as_ref().map(|p| p.guid.as_str()) != old_guid {
                    continue;
                }
                let record = AppPolicy {
                    app_id: app_id.clone(),
                    policy: definition.clone(),
                    guid: new_guid.to_string(),
                };
                let value = encode(&record)?;
                table
                    .insert(app_id.as_str(), value.as_slice())
                    .map_err(map_err!(Write))?;
                updated.push(app_id.clone());
            }
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(%new_guid, count = updated.len(), "default policy applied");
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_instance(id: &str) -> ServiceInstance {
        ServiceInstance {
            instance_id: id.to_string(),
            org_id: "org-1".to_string(),
            space_id: "space-1".to_string(),
            default_policy: None,
            default_policy_guid: None,
        }
    }

    fn test_binding(id: &str, instance_id: &str, app_id: &str) -> ServiceBinding {
        ServiceBinding {
            binding_id: id.to_string(),
            instance_id: instance_id.to_string(),
            app_id: app_id.to_string(),
            custom_metrics_strategy: "same_app".to_string(),
        }
    }

    fn test_policy(max: i64) -> ScalingPolicy {
        serde_json::from_value(serde_json::json!({
            "instance_min_count": 1,
            "instance_max_count": max,
            "scaling_rules": [
                {"metric_type": "memoryused", "threshold": 30, "operator": "<", "adjustment": "-1"}
            ]
        }))
        .unwrap()
    }

    // ── Service instances ──────────────────────────────────────────

    #[tokio::test]
    async fn instance_create_and_get() {
        let store = StateStore::open_in_memory().unwrap();
        let instance = test_instance("inst-1");
        store.create_service_instance(&instance).await.unwrap();

        let fetched = store.get_service_instance("inst-1").await.unwrap();
        assert_eq!(fetched, instance);
    }

    #[tokio::test]
    async fn instance_create_twice_is_already_exists() {
        let store = StateStore::open_in_memory().unwrap();
        store.create_service_instance(&test_instance("inst-1")).await.unwrap();

        let err = store
            .create_service_instance(&test_instance("inst-1"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::AlreadyExists(_)));
    }

    #[tokio::test]
    async fn instance_create_with_other_space_conflicts() {
        let store = StateStore::open_in_memory().unwrap();
        store.create_service_instance(&test_instance("inst-1")).await.unwrap();

        let mut other = test_instance("inst-1");
        other.space_id = "space-2".to_string();
        let err = store.create_service_instance(&other).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
        // The existing record is untouched.
        let fetched = store.get_service_instance("inst-1").await.unwrap();
        assert_eq!(fetched.space_id, "space-1");
    }

    #[tokio::test]
    async fn instance_missing() {
        let store = StateStore::open_in_memory().unwrap();
        assert!(store.get_service_instance("nope").await.unwrap_err().is_does_not_exist());
        assert!(store.delete_service_instance("nope").await.unwrap_err().is_does_not_exist());
        assert!(
            store
                .update_service_instance(&test_instance("nope"))
                .await
                .unwrap_err()
                .is_does_not_exist()
        );
    }

    #[tokio::test]
    async fn instance_update_replaces_default_policy() {
        let store = StateStore::open_in_memory().unwrap();
        store.create_service_instance(&test_instance("inst-1")).await.unwrap();

        let mut updated = test_instance("inst-1");
        updated.default_policy = Some(test_policy(3));
        updated.default_policy_guid = Some("guid-1".to_string());
        store.update_service_instance(&updated).await.unwrap();

        let fetched = store.get_service_instance("inst-1").await.unwrap();
        assert_eq!(fetched.default_policy_guid.as_deref(), Some("guid-1"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn instance_update_racing_delete_never_resurrects() {
        let store = StateStore::open_in_memory().unwrap();
        store.create_service_instance(&test_instance("inst-1")).await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..32 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                let _ = store.update_service_instance(&test_instance("inst-1")).await;
            }));
        }
        let deleter = store.clone();
        handles.push(tokio::spawn(async move {
            deleter.delete_service_instance("inst-1").await.unwrap();
        }));
        for handle in handles {
            handle.await.unwrap();
        }

        assert!(store.get_service_instance("inst-1").await.unwrap_err().is_does_not_exist());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_delete_by_app_succeeds_once() {
        let store = StateStore::open_in_memory().unwrap();
        store.create_service_binding(&test_binding("b1", "inst-1", "app-1")).await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..8 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store.delete_service_binding_by_app_id("app-1").await.is_ok()
            }));
        }
        let mut succeeded = 0;
        for handle in handles {
            if handle.await.unwrap() {
                succeeded += 1;
            }
        }
        assert_eq!(succeeded, 1);
        assert!(store.get_binding_ids_by_instance_id("inst-1").await.unwrap().is_empty());
    }

    // ── Service bindings ───────────────────────────────────────────

    #[tokio::test]
    async fn binding_lookup_by_instance() {
        let store = StateStore::open_in_memory().unwrap();
        store.create_service_binding(&test_binding("b1", "inst-1", "app-1")).await.unwrap();
        store.create_service_binding(&test_binding("b2", "inst-1", "app-2")).await.unwrap();
        store.create_service_binding(&test_binding("b3", "inst-2", "app-3")).await.unwrap();

        let mut ids = store.get_binding_ids_by_instance_id("inst-1").await.unwrap();
        ids.sort();
        assert_eq!(ids, vec!["b1", "b2"]);

        let mut apps = store.get_app_ids_by_instance_id("inst-1").await.unwrap();
        apps.sort();
        assert_eq!(apps, vec!["app-1", "app-2"]);

        assert_eq!(store.get_app_id_by_binding_id("b3").await.unwrap(), "app-3");
    }

    #[tokio::test]
    async fn binding_same_app_twice_is_already_exists() {
        let store = StateStore::open_in_memory().unwrap();
        store.create_service_binding(&test_binding("b1", "inst-1", "app-1")).await.unwrap();

        let err = store
            .create_service_binding(&test_binding("b2", "inst-2", "app-1"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::AlreadyExists(_)));
    }

    #[tokio::test]
    async fn binding_delete_and_delete_by_app() {
        let store = StateStore::open_in_memory().unwrap();
        store.create_service_binding(&test_binding("b1", "inst-1", "app-1")).await.unwrap();
        store.create_service_binding(&test_binding("b2", "inst-1", "app-2")).await.unwrap();

        store.delete_service_binding("b1").await.unwrap();
        assert!(store.delete_service_binding("b1").await.unwrap_err().is_does_not_exist());

        store.delete_service_binding_by_app_id("app-2").await.unwrap();
        assert!(
            store
                .delete_service_binding_by_app_id("app-2")
                .await
                .unwrap_err()
                .is_does_not_exist()
        );
        assert!(store.get_binding_ids_by_instance_id("inst-1").await.unwrap().is_empty());
    }

    // ── App policies ───────────────────────────────────────────────

    #[tokio::test]
    async fn policy_save_get_delete() {
        let store = StateStore::open_in_memory().unwrap();
        store.save_app_policy("app-1", &test_policy(4), "g1").await.unwrap();

        let fetched = store.get_app_policy("app-1").await.unwrap().unwrap();
        assert_eq!(fetched.guid, "g1");
        assert_eq!(fetched.policy.instance_max_count, 4);

        store.delete_policy("app-1").await.unwrap();
        assert!(store.get_app_policy("app-1").await.unwrap().is_none());
        // Absent policies delete cleanly.
        store.delete_policy("app-1").await.unwrap();
    }

    #[tokio::test]
    async fn policy_delete_by_guid_only_touches_matching() {
        let store = StateStore::open_in_memory().unwrap();
        store.save_app_policy("app-a", &test_policy(4), "G").await.unwrap();
        store.save_app_policy("app-b", &test_policy(5), "H").await.unwrap();

        let deleted = store.delete_policies_by_policy_guid("G").await.unwrap();
        assert_eq!(deleted, vec!["app-a"]);
        assert!(store.get_app_policy("app-a").await.unwrap().is_none());
        assert_eq!(store.get_app_policy("app-b").await.unwrap().unwrap().guid, "H");
    }

    #[tokio::test]
    async fn default_policy_skips_overridden_apps() {
        let store = StateStore::open_in_memory().unwrap();
        store.save_app_policy("app-a", &test_policy(4), "G").await.unwrap();
        store.save_app_policy("app-b", &test_policy(5), "H").await.unwrap();

        let apps = vec!["app-a".to_string(), "app-b".to_string(), "app-c".to_string()];
        let updated = store
            .set_or_update_default_app_policy(&apps, Some("G"), &test_policy(9), "G2")
            .await
            .unwrap();
        assert_eq!(updated, vec!["app-a"]);
        assert_eq!(store.get_app_policy("app-a").await.unwrap().unwrap().guid, "G2");
        assert_eq!(store.get_app_policy("app-b").await.unwrap().unwrap().guid, "H");
        assert!(store.get_app_policy("app-c").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn default_policy_without_previous_fills_unpoliced_apps() {
        let store = StateStore::open_in_memory().unwrap();
        store.save_app_policy("app-b", &test_policy(5), "H").await.unwrap();

        let apps = vec!["app-a".to_string(), "app-b".to_string()];
        let updated = store
            .set_or_update_default_app_policy(&apps, None, &test_policy(9), "G")
            .await
            .unwrap();
        assert_eq!(updated, vec!["app-a"]);
    }

    #[tokio::test]
    async fn saved_policy_drops_binding_fields() {
        let store = StateStore::open_in_memory().unwrap();
        let mut policy = test_policy(4);
        policy.credential_type = Some(autoscaler_core::CredentialType::X509);
        store.save_app_policy("app-1", &policy, "g").await.unwrap();

        let fetched = store.get_app_policy("app-1").await.unwrap().unwrap();
        assert!(fetched.policy.credential_type.is_none());
    }

    // ── Persistence (on-disk) ──────────────────────────────────────

    #[tokio::test]
    async fn persistence_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("broker.redb");

        {
            let store = StateStore::open(&db_path).unwrap();
            store.create_service_instance(&test_instance("inst-1")).await.unwrap();
        }

        // Reopen the same database file.
        let store = StateStore::open(&db_path).unwrap();
        let instance = store.get_service_instance("inst-1").await.unwrap();
        assert_eq!(instance.org_id, "org-1");
    }
}
