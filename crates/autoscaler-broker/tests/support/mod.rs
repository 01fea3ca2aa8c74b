//! Shared harness: a broker over an in-memory store with switchable faults.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use autoscaler_broker::{
    BindDetails, Broker, BrokerSettings, ProvisionDetails, Stores, UpdateDetails,
};
use autoscaler_core::config::{MetricsForwarderConfig, ScalingRulesConfig};
use autoscaler_core::{
    AppPolicy, Catalog, Credential, CredentialType, PlanCheckConfig, PlanDefinition,
    ScalingPolicy, ServiceBinding, ServiceInstance,
};
use autoscaler_policy::{PlanChecker, PolicyValidator};
use autoscaler_scheduler::{SchedulerClient, SchedulerError, SchedulerResult};
use autoscaler_state::{
    BindingStore, CredentialStore, DbCredentialStore, PolicyStore, StateError, StateStore,
    StoreError, StoreResult, StoredCredential,
};
use serde_json::{Value, json};

pub const SERVICE_ID: &str = "autoscaler-guid";
pub const FREE_PLAN: &str = "autoscaler-free-plan-id";
pub const STANDARD_PLAN: &str = "autoscaler-standard-plan-id";
pub const FIXED_PLAN: &str = "autoscaler-fixed-plan-id";
pub const ORG: &str = "org-guid";
pub const SPACE: &str = "space-guid";
pub const METRICS_URL: &str = "https://metrics.example.com";
pub const METRICS_MTLS_URL: &str = "https://mtls-metrics.example.com";

/// Switches that make the next matching call fail.
#[derive(Default)]
pub struct Faults {
    pub credential_create: AtomicBool,
    pub policy_save: AtomicBool,
    pub binding_lookup: AtomicBool,
    pub schedule_delete: AtomicBool,
    pub schedule_sync: AtomicBool,
    pub instance_update: AtomicBool,
    /// Count of successful store mutations.
    pub mutations: AtomicUsize,
}

impl Faults {
    fn trip(flag: &AtomicBool) -> StoreResult<()> {
        if flag.load(Ordering::SeqCst) {
            return Err(StoreError::Backend(StateError::Write("injected fault".into())));
        }
        Ok(())
    }

    fn mutated(&self) {
        self.mutations.fetch_add(1, Ordering::SeqCst);
    }

    pub fn mutation_count(&self) -> usize {
        self.mutations.load(Ordering::SeqCst)
    }
}

/// Delegates to a real [`StateStore`], counting mutations and honouring
/// [`Faults`].
pub struct FaultyStore {
    inner: StateStore,
    faults: Arc<Faults>,
}

#[async_trait]
impl BindingStore for FaultyStore {
    async fn create_service_instance(&self, instance: &ServiceInstance) -> StoreResult<()> {
        self.inner.create_service_instance(instance).await?;
        self.faults.mutated();
        Ok(())
    }

    async fn update_service_instance(&self, instance: &ServiceInstance) -> StoreResult<()> {
        Faults::trip(&self.faults.instance_update)?;
        self.inner.update_service_instance(instance).await?;
        self.faults.mutated();
        Ok(())
    }

    async fn delete_service_instance(&self, instance_id: &str) -> StoreResult<()> {
        self.inner.delete_service_instance(instance_id).await?;
        self.faults.mutated();
        Ok(())
    }

    async fn get_service_instance(&self, instance_id: &str) -> StoreResult<ServiceInstance> {
        self.inner.get_service_instance(instance_id).await
    }

    async fn create_service_binding(&self, binding: &ServiceBinding) -> StoreResult<()> {
        self.inner.create_service_binding(binding).await?;
        self.faults.mutated();
        Ok(())
    }

    async fn delete_service_binding(&self, binding_id: &str) -> StoreResult<()> {
        self.inner.delete_service_binding(binding_id).await?;
        self.faults.mutated();
        Ok(())
    }

    async fn delete_service_binding_by_app_id(&self, app_id: &str) -> StoreResult<()> {
        self.inner.delete_service_binding_by_app_id(app_id).await?;
        self.faults.mutated();
        Ok(())
    }

    async fn get_app_id_by_binding_id(&self, binding_id: &str) -> StoreResult<String> {
        Faults::trip(&self.faults.binding_lookup)?;
        self.inner.get_app_id_by_binding_id(binding_id).await
    }

    async fn get_binding_ids_by_instance_id(&self, instance_id: &str) -> StoreResult<Vec<String>> {
        self.inner.get_binding_ids_by_instance_id(instance_id).await
    }

    async fn get_app_ids_by_instance_id(&self, instance_id: &str) -> StoreResult<Vec<String>> {
        self.inner.get_app_ids_by_instance_id(instance_id).await
    }
}

#[async_trait]
impl PolicyStore for FaultyStore {
    async fn save_app_policy(
        &self,
        app_id: &str,
        policy: &ScalingPolicy,
        guid: &str,
    ) -> StoreResult<()> {
        Faults::trip(&self.faults.policy_save)?;
        self.inner.save_app_policy(app_id, policy, guid).await?;
        self.faults.mutated();
        Ok(())
    }

    async fn get_app_policy(&self, app_id: &str) -> StoreResult<Option<AppPolicy>> {
        self.inner.get_app_policy(app_id).await
    }

    async fn delete_policy(&self, app_id: &str) -> StoreResult<()> {
        self.inner.delete_policy(app_id).await?;
        self.faults.mutated();
        Ok(())
    }

    async fn delete_policies_by_policy_guid(&self, guid: &str) -> StoreResult<Vec<String>> {
        let deleted = self.inner.delete_policies_by_policy_guid(guid).await?;
        self.faults.mutated();
        Ok(deleted)
    }

    async fn set_or_update_default_app_policy(
        &self,
        app_ids: &[String],
        old_guid: Option<&str>,
        policy: &ScalingPolicy,
        new_guid: &str,
    ) -> StoreResult<Vec<String>> {
        let written = self
            .inner
            .set_or_update_default_app_policy(app_ids, old_guid, policy, new_guid)
            .await?;
        self.faults.mutated();
        Ok(written)
    }
}

pub struct FaultyCredentials {
    inner: DbCredentialStore,
    faults: Arc<Faults>,
}

#[async_trait]
impl CredentialStore for FaultyCredentials {
    async fn create(&self, app_id: &str) -> StoreResult<Credential> {
        Faults::trip(&self.faults.credential_create)?;
        let credential = self.inner.create(app_id).await?;
        self.faults.mutated();
        Ok(credential)
    }

    async fn delete(&self, app_id: &str) -> StoreResult<()> {
        self.inner.delete(app_id).await?;
        self.faults.mutated();
        Ok(())
    }

    async fn get(&self, app_id: &str) -> StoreResult<Option<StoredCredential>> {
        self.inner.get(app_id).await
    }

    async fn validate(&self, app_id: &str, credential: &Credential) -> StoreResult<bool> {
        self.inner.validate(app_id, credential).await
    }
}

/// Keeps the last synchronised schedule per app.
pub struct RecordingScheduler {
    faults: Arc<Faults>,
    pub schedules: Mutex<HashMap<String, String>>,
    pub deletes: Mutex<Vec<String>>,
}

#[async_trait]
impl SchedulerClient for RecordingScheduler {
    async fn create_or_update_schedule(
        &self,
        app_id: &str,
        _policy: &ScalingPolicy,
        guid: &str,
    ) -> SchedulerResult<()> {
        if self.faults.schedule_sync.load(Ordering::SeqCst) {
            return Err(SchedulerError::Upsert("injected fault".into()));
        }
        self.schedules
            .lock()
            .unwrap()
            .insert(app_id.to_string(), guid.to_string());
        Ok(())
    }

    async fn delete_schedule(&self, app_id: &str) -> SchedulerResult<()> {
        if self.faults.schedule_delete.load(Ordering::SeqCst) {
            return Err(SchedulerError::Delete("injected fault".into()));
        }
        self.schedules.lock().unwrap().remove(app_id);
        self.deletes.lock().unwrap().push(app_id.to_string());
        Ok(())
    }
}

pub struct Harness {
    pub broker: Broker,
    pub store: StateStore,
    pub credentials: DbCredentialStore,
    pub scheduler: Arc<RecordingScheduler>,
    pub faults: Arc<Faults>,
}

pub fn catalog() -> Catalog {
    Catalog::from_json(
        &json!({
            "services": [{
                "id": SERVICE_ID,
                "name": "autoscaler",
                "bindable": true,
                "plans": [
                    {"id": FREE_PLAN, "name": "autoscaler-free-plan"},
                    {"id": STANDARD_PLAN, "name": "autoscaler-standard-plan"},
                    {"id": FIXED_PLAN, "name": "autoscaler-fixed-plan"}
                ]
            }]
        })
        .to_string(),
    )
    .unwrap()
}

fn plan(rules: usize, schedules: usize, updateable: bool) -> PlanDefinition {
    PlanDefinition {
        plan_check_enabled: true,
        schedules_count: schedules,
        scaling_rules_count: rules,
        plan_updateable: updateable,
    }
}

pub fn plan_check() -> PlanCheckConfig {
    let mut plan_definitions = HashMap::new();
    plan_definitions.insert(FREE_PLAN.to_string(), plan(1, 1, true));
    plan_definitions.insert(STANDARD_PLAN.to_string(), plan(10, 10, true));
    plan_definitions.insert(FIXED_PLAN.to_string(), plan(10, 10, false));
    PlanCheckConfig { plan_definitions }
}

impl Harness {
    pub fn new() -> Self {
        Self::with_redirect("https://dashboard.example.com")
    }

    pub fn with_redirect(redirect: &str) -> Self {
        let store = StateStore::open_in_memory().unwrap();
        let credentials = DbCredentialStore::new(store.clone());
        let faults = Arc::new(Faults::default());
        let scheduler = Arc::new(RecordingScheduler {
            faults: faults.clone(),
            schedules: Mutex::new(HashMap::new()),
            deletes: Mutex::new(Vec::new()),
        });
        let state = Arc::new(FaultyStore {
            inner: store.clone(),
            faults: faults.clone(),
        });
        let stores = Stores {
            bindings: state.clone(),
            policies: state,
            credentials: Arc::new(FaultyCredentials {
                inner: credentials.clone(),
                faults: faults.clone(),
            }),
        };
        let broker = Broker::new(
            stores,
            scheduler.clone(),
            PolicyValidator::new(ScalingRulesConfig::default()).unwrap(),
            PlanChecker::new(Some(plan_check())),
            catalog(),
            BrokerSettings {
                dashboard_redirect_uri: redirect.to_string(),
                default_credential_type: CredentialType::BindingSecret,
                metrics_forwarder: MetricsForwarderConfig {
                    url: METRICS_URL.to_string(),
                    mtls_url: Some(METRICS_MTLS_URL.to_string()),
                },
            },
        );
        Self {
            broker,
            store,
            credentials,
            scheduler,
            faults,
        }
    }

    pub fn fail(&self, flag: impl Fn(&Faults) -> &AtomicBool) {
        flag(&self.faults).store(true, Ordering::SeqCst);
    }

    pub async fn provision(&self, instance_id: &str, default_policy: Option<Value>) {
        let parameters = default_policy.map(|policy| json!({"default_policy": policy}));
        self.broker
            .provision(instance_id, provision_details(FREE_PLAN, parameters))
            .await
            .unwrap();
    }

    pub async fn bind(&self, instance_id: &str, binding_id: &str, app_id: &str) {
        self.broker
            .bind(instance_id, binding_id, bind_details(app_id, None))
            .await
            .unwrap();
    }

    pub async fn policy_guid(&self, app_id: &str) -> Option<String> {
        self.store
            .get_app_policy(app_id)
            .await
            .unwrap()
            .map(|policy| policy.guid)
    }
}

pub fn provision_details(plan_id: &str, parameters: Option<Value>) -> ProvisionDetails {
    ProvisionDetails {
        service_id: SERVICE_ID.to_string(),
        plan_id: plan_id.to_string(),
        organization_guid: ORG.to_string(),
        space_guid: SPACE.to_string(),
        parameters,
    }
}

pub fn bind_details(app_id: &str, parameters: Option<Value>) -> BindDetails {
    BindDetails {
        service_id: SERVICE_ID.to_string(),
        plan_id: FREE_PLAN.to_string(),
        app_guid: Some(app_id.to_string()),
        bind_resource: None,
        parameters,
    }
}

pub fn update_details(
    plan_id: Option<&str>,
    previous_plan_id: &str,
    parameters: Option<Value>,
) -> UpdateDetails {
    serde_json::from_value(json!({
        "service_id": SERVICE_ID,
        "plan_id": plan_id,
        "parameters": parameters,
        "previous_values": {"plan_id": previous_plan_id}
    }))
    .unwrap()
}

pub fn rule(metric: &str, threshold: i64) -> Value {
    json!({"metric_type": metric, "threshold": threshold, "operator": ">", "adjustment": "+1"})
}

/// A policy with `rules` memoryused rules.
pub fn policy_with_rules(rules: usize) -> Value {
    let scaling_rules: Vec<Value> = (0..rules).map(|i| rule("memoryused", 10 + i as i64)).collect();
    json!({"instance_min_count": 1, "instance_max_count": 4, "scaling_rules": scaling_rules})
}

pub fn policy() -> Value {
    policy_with_rules(1)
}
