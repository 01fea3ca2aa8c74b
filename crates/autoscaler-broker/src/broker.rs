//! Instance and binding lifecycle.
//!
//! Every operation validates caller input completely before its first
//! mutation. Multi-step mutations register compensations in a [`Saga`] so a
//! failed bind leaves no partial state behind. Scheduler synchronisation is
//! best-effort: failures are logged and the operation still succeeds.

use std::sync::Arc;

use autoscaler_core::config::MetricsForwarderConfig;
use autoscaler_core::{
    BindingConfiguration, Catalog, CredentialType, STRATEGY_BOUND_APP, STRATEGY_SAME_APP,
    ScalingPolicy, ServiceBinding, ServiceInstance,
};
use autoscaler_policy::{PlanChecker, PlanVerdict, PolicyValidator, ValidatedPolicy};
use autoscaler_scheduler::{SchedulerClient, SchedulerError};
use autoscaler_state::{BindingStore, CredentialStore, PolicyStore, StoreError};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::error::{BrokerError, BrokerResult};
use crate::models::{
    BindDetails, BindResult, BindingCredentials, CustomMetricsCredentials, ProvisionDetails,
    ProvisionResult, UpdateDetails,
};
use crate::saga::Saga;

const GET_INSTANCE_UNSUPPORTED: &str = "error: get-instance is not implemented and this endpoint should not have been called as all broker operations are synchronous";
const LAST_OPERATION_UNSUPPORTED: &str = "error: last-operation is not implemented and this endpoint should not have been called as all broker operations are synchronous";
const GET_BINDING_UNSUPPORTED: &str = "error: get-binding is not implemented and this endpoint should not have been called as all broker operations are synchronous";
const LAST_BINDING_OPERATION_UNSUPPORTED: &str = "error: last-binding-operation is not implemented and this endpoint should not have been called as all broker operations are synchronous";

/// Bind parameters that configure the binding rather than the policy.
const BINDING_KEYS: [&str; 2] = ["credential-type", "configuration"];

/// Deployment-specific values the broker echoes to callers.
#[derive(Debug, Clone)]
pub struct BrokerSettings {
    pub dashboard_redirect_uri: String,
    pub default_credential_type: CredentialType,
    pub metrics_forwarder: MetricsForwarderConfig,
}

/// The store contracts the broker mutates.
#[derive(Clone)]
pub struct Stores {
    pub bindings: Arc<dyn BindingStore>,
    pub policies: Arc<dyn PolicyStore>,
    pub credentials: Arc<dyn CredentialStore>,
}

pub struct Broker {
    stores: Stores,
    scheduler: Arc<dyn SchedulerClient>,
    validator: PolicyValidator,
    plan_checker: PlanChecker,
    catalog: Catalog,
    settings: BrokerSettings,
}

/// Failure of the shared unbind chain.
#[derive(Debug, Error)]
enum UnbindError {
    #[error("binding does not exist")]
    BindingDoesNotExist,
    #[error("looking up binding: {0}")]
    Lookup(StoreError),
    #[error("deleting policy: {0}")]
    DeletePolicy(StoreError),
    #[error("deleting schedule: {0}")]
    DeleteSchedule(SchedulerError),
    #[error("deleting binding: {0}")]
    DeleteBinding(StoreError),
    #[error("deleting credential: {0}")]
    DeleteCredential(StoreError),
}

enum DefaultPolicyChange {
    Unchanged,
    Remove,
    Set { policy: ScalingPolicy, guid: String },
}

#[derive(Debug, Default, Deserialize)]
struct InstanceParameters {
    #[serde(default)]
    default_policy: Option<Value>,
}

fn require(value: &str, field: &'static str) -> BrokerResult<()> {
    if value.is_empty() {
        return Err(BrokerError::MissingField(field));
    }
    Ok(())
}

/// Raw parameters as an object; absent or null parameters are empty.
fn params_object(raw: Option<&Value>) -> BrokerResult<Map<String, Value>> {
    match raw {
        None | Some(Value::Null) => Ok(Map::new()),
        Some(Value::Object(map)) => Ok(map.clone()),
        Some(_) => Err(BrokerError::RawParamsInvalid),
    }
}

fn parse_params<T: DeserializeOwned + Default>(raw: Option<&Value>) -> BrokerResult<T> {
    let map = params_object(raw)?;
    if map.is_empty() {
        return Ok(T::default());
    }
    serde_json::from_value(Value::Object(map)).map_err(|_| BrokerError::RawParamsInvalid)
}

fn metrics_strategy(configuration: Option<&BindingConfiguration>) -> BrokerResult<String> {
    match configuration.map(BindingConfiguration::allow_from) {
        None => Ok(STRATEGY_SAME_APP.to_string()),
        Some(strategy @ (STRATEGY_BOUND_APP | STRATEGY_SAME_APP)) => Ok(strategy.to_string()),
        Some(_) => Err(BrokerError::InvalidMetricsStrategy),
    }
}

fn credential_type(value: Option<&Value>, default: CredentialType) -> BrokerResult<CredentialType> {
    match value {
        None | Some(Value::Null) => Ok(default),
        Some(Value::String(s)) => s.parse().map_err(|_| BrokerError::InvalidCredentialType),
        Some(_) => Err(BrokerError::InvalidCredentialType),
    }
}

impl Broker {
    pub fn new(
        stores: Stores,
        scheduler: Arc<dyn SchedulerClient>,
        validator: PolicyValidator,
        plan_checker: PlanChecker,
        catalog: Catalog,
        settings: BrokerSettings,
    ) -> Self {
        Self {
            stores,
            scheduler,
            validator,
            plan_checker,
            catalog,
            settings,
        }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    // ── Instances ──────────────────────────────────────────────────

    pub async fn provision(
        &self,
        instance_id: &str,
        details: ProvisionDetails,
    ) -> BrokerResult<ProvisionResult> {
        info!(%instance_id, plan_id = %details.plan_id, "provision requested");
        require(instance_id, "instance id")?;
        require(&details.organization_guid, "organization_guid")?;
        require(&details.space_guid, "space_guid")?;
        require(&details.plan_id, "plan_id")?;
        self.require_plan(&details.service_id, &details.plan_id)?;

        let params: InstanceParameters = parse_params(details.parameters.as_ref())?;
        let mut instance = ServiceInstance {
            instance_id: instance_id.to_string(),
            org_id: details.organization_guid,
            space_id: details.space_guid,
            default_policy: None,
            default_policy_guid: None,
        };
        if let Some(doc) = params.default_policy.filter(|doc| !doc.is_null()) {
            let validated = self.validate_policy(&doc, &details.plan_id)?;
            instance.default_policy = Some(validated.policy.definition());
            instance.default_policy_guid = Some(Uuid::new_v4().to_string());
        }

        let dashboard_url = self.dashboard_url(instance_id);
        match self.stores.bindings.create_service_instance(&instance).await {
            Ok(()) => {
                info!(%instance_id, "service instance provisioned");
                Ok(ProvisionResult {
                    dashboard_url,
                    already_existed: false,
                })
            }
            Err(StoreError::AlreadyExists(_)) => {
                debug!(%instance_id, "identical service instance already provisioned");
                Ok(ProvisionResult {
                    dashboard_url,
                    already_existed: true,
                })
            }
            Err(StoreError::Conflict(_)) => Err(BrokerError::InstanceAlreadyExists),
            Err(e) => {
                error!(%instance_id, error = %e, "failed to create service instance");
                Err(BrokerError::internal(
                    "error creating service instance",
                    "create-service-instance",
                ))
            }
        }
    }

    pub async fn deprovision(&self, instance_id: &str) -> BrokerResult<()> {
        info!(%instance_id, "deprovision requested");
        let failed = || {
            BrokerError::internal("error deleting service instance", "delete-service-instance")
        };

        let binding_ids = self
            .stores
            .bindings
            .get_binding_ids_by_instance_id(instance_id)
            .await
            .map_err(|e| {
                error!(%instance_id, error = %e, "failed to list bindings");
                failed()
            })?;

        for binding_id in &binding_ids {
            match self.delete_binding(binding_id).await {
                Ok(()) | Err(UnbindError::BindingDoesNotExist) => {}
                Err(e) => {
                    error!(%instance_id, %binding_id, error = %e, "failed to delete binding");
                    return Err(failed());
                }
            }
        }

        match self.stores.bindings.delete_service_instance(instance_id).await {
            Ok(()) => {
                info!(%instance_id, bindings = binding_ids.len(), "service instance deprovisioned");
                Ok(())
            }
            Err(StoreError::DoesNotExist(_)) => Err(BrokerError::InstanceGone),
            Err(e) => {
                error!(%instance_id, error = %e, "failed to delete service instance");
                Err(failed())
            }
        }
    }

    pub async fn update(&self, instance_id: &str, details: UpdateDetails) -> BrokerResult<()> {
        info!(%instance_id, "update requested");
        let failed = || {
            BrokerError::internal("error updating service instance", "update-service-instance")
        };

        let instance = match self.stores.bindings.get_service_instance(instance_id).await {
            Ok(instance) => instance,
            Err(StoreError::DoesNotExist(_)) => return Err(BrokerError::InstanceNotFound),
            Err(e) => {
                error!(%instance_id, error = %e, "failed to read service instance");
                return Err(failed());
            }
        };

        let previous_plan = details
            .previous_values
            .plan_id
            .filter(|plan| !plan.is_empty());
        let requested_plan = details.plan_id.filter(|plan| !plan.is_empty());

        let (plan_changed, plan_id) = match requested_plan {
            Some(plan_id) => {
                self.require_plan(&details.service_id, &plan_id)?;
                let changed = previous_plan.as_deref() != Some(plan_id.as_str());
                if changed && let Some(previous) = &previous_plan {
                    match self.plan_checker.is_plan_updatable(previous) {
                        Ok(true) => {}
                        Ok(false) => return Err(BrokerError::PlanChangeNotSupported),
                        Err(e) => {
                            error!(%instance_id, error = %e, "failed to check plan updatability");
                            return Err(failed());
                        }
                    }
                }
                (changed, plan_id)
            }
            None => (false, previous_plan.unwrap_or_default()),
        };

        let params: InstanceParameters = parse_params(details.parameters.as_ref())?;
        let change = match params.default_policy {
            None | Some(Value::Null) => DefaultPolicyChange::Unchanged,
            Some(Value::Object(map)) if map.is_empty() => {
                if instance.default_policy.is_some() {
                    DefaultPolicyChange::Remove
                } else {
                    DefaultPolicyChange::Unchanged
                }
            }
            Some(doc) => {
                let validated = self.validate_policy(&doc, &plan_id)?;
                DefaultPolicyChange::Set {
                    policy: validated.policy.definition(),
                    guid: Uuid::new_v4().to_string(),
                }
            }
        };

        if !plan_changed && matches!(change, DefaultPolicyChange::Unchanged) {
            debug!(%instance_id, "update requested no changes");
            return Ok(());
        }

        let app_ids = self
            .stores
            .bindings
            .get_app_ids_by_instance_id(instance_id)
            .await
            .map_err(|e| {
                error!(%instance_id, error = %e, "failed to list bound apps");
                failed()
            })?;

        if plan_changed {
            for app_id in &app_ids {
                let existing = self.stores.policies.get_app_policy(app_id).await.map_err(|e| {
                    error!(%app_id, error = %e, "failed to read app policy");
                    failed()
                })?;
                if let Some(existing) = existing {
                    self.check_plan(&existing.policy, &plan_id)?;
                }
            }
        }

        let default_changed = !matches!(change, DefaultPolicyChange::Unchanged);
        let mut updated = instance.clone();
        match change {
            DefaultPolicyChange::Unchanged => {}
            DefaultPolicyChange::Remove => {
                let old_guid = instance.default_policy_guid.as_deref().unwrap_or_default();
                let affected = self
                    .stores
                    .policies
                    .delete_policies_by_policy_guid(old_guid)
                    .await
                    .map_err(|e| {
                        error!(%instance_id, error = %e, "failed to delete default policies");
                        failed()
                    })?;
                for app_id in &affected {
                    self.remove_schedule(app_id).await;
                }
                info!(%instance_id, apps = affected.len(), "default policy removed");
                updated.default_policy = None;
                updated.default_policy_guid = None;
            }
            DefaultPolicyChange::Set { policy, guid } => {
                let affected = self
                    .stores
                    .policies
                    .set_or_update_default_app_policy(
                        &app_ids,
                        instance.default_policy_guid.as_deref(),
                        &policy,
                        &guid,
                    )
                    .await
                    .map_err(|e| {
                        error!(%instance_id, error = %e, "failed to apply default policy");
                        failed()
                    })?;
                for app_id in &affected {
                    self.sync_schedule(app_id, &policy, &guid).await;
                }
                info!(%instance_id, apps = affected.len(), %guid, "default policy applied");
                updated.default_policy = Some(policy);
                updated.default_policy_guid = Some(guid);
            }
        }

        // The plan is carried per binding; only a default policy change touches the instance.
        if default_changed {
            self.stores
                .bindings
                .update_service_instance(&updated)
                .await
                .map_err(|e| {
                    error!(%instance_id, error = %e, "failed to update service instance");
                    failed()
                })?;
        }
        info!(%instance_id, plan_changed, default_changed, "service instance updated");
        Ok(())
    }

    pub async fn get_instance(&self, _instance_id: &str) -> BrokerResult<()> {
        Err(BrokerError::Unsupported(GET_INSTANCE_UNSUPPORTED))
    }

    pub async fn last_operation(&self, _instance_id: &str) -> BrokerResult<()> {
        Err(BrokerError::Unsupported(LAST_OPERATION_UNSUPPORTED))
    }

    // ── Bindings ───────────────────────────────────────────────────

    pub async fn bind(
        &self,
        instance_id: &str,
        binding_id: &str,
        details: BindDetails,
    ) -> BrokerResult<BindResult> {
        info!(%instance_id, %binding_id, "bind requested");
        let failed = || {
            BrokerError::internal("error creating service binding", "create-service-binding")
        };

        let Some(app_id) = details.app_id().map(str::to_string) else {
            return Err(BrokerError::RequiresApp);
        };
        let params = params_object(details.parameters.as_ref())?;
        let credential_type = credential_type(
            params.get("credential-type"),
            self.settings.default_credential_type,
        )?;

        let instance = match self.stores.bindings.get_service_instance(instance_id).await {
            Ok(instance) => instance,
            Err(StoreError::DoesNotExist(_)) => return Err(BrokerError::InstanceNotFound),
            Err(e) => {
                error!(%instance_id, error = %e, "failed to read service instance");
                return Err(failed());
            }
        };

        let explicit = params
            .keys()
            .any(|key| !BINDING_KEYS.contains(&key.as_str()));
        let (policy, guid, strategy) = if explicit {
            let validated = self.validate_policy(&Value::Object(params), &details.plan_id)?;
            let strategy = metrics_strategy(validated.policy.configuration.as_ref())?;
            (
                Some(validated.policy.definition()),
                Some(Uuid::new_v4().to_string()),
                strategy,
            )
        } else {
            let configuration = match params.get("configuration") {
                None | Some(Value::Null) => None,
                Some(doc) => Some(
                    serde_json::from_value::<BindingConfiguration>(doc.clone())
                        .map_err(|_| BrokerError::RawParamsInvalid)?,
                ),
            };
            (
                instance.default_policy.clone(),
                instance.default_policy_guid.clone(),
                metrics_strategy(configuration.as_ref())?,
            )
        };

        self.release_app(instance_id, &app_id).await?;

        let binding = ServiceBinding {
            binding_id: binding_id.to_string(),
            instance_id: instance_id.to_string(),
            app_id: app_id.clone(),
            custom_metrics_strategy: strategy,
        };
        match self.stores.bindings.create_service_binding(&binding).await {
            Ok(()) => {}
            Err(StoreError::AlreadyExists(_)) => return Err(BrokerError::BindingAlreadyExists),
            Err(e) => {
                error!(%instance_id, %binding_id, error = %e, "failed to create service binding");
                return Err(failed());
            }
        }

        let mut saga = Saga::new("bind");
        {
            let bindings = self.stores.bindings.clone();
            let binding_id = binding_id.to_string();
            saga.push("delete service binding", move || async move {
                bindings.delete_service_binding(&binding_id).await?;
                Ok::<_, anyhow::Error>(())
            });
        }

        let credential = match credential_type {
            CredentialType::BindingSecret => match self.stores.credentials.create(&app_id).await {
                Ok(credential) => {
                    let credentials = self.stores.credentials.clone();
                    let app_id = app_id.clone();
                    saga.push("delete credential", move || async move {
                        credentials.delete(&app_id).await?;
                        Ok::<_, anyhow::Error>(())
                    });
                    Some(credential)
                }
                Err(e) => {
                    error!(%app_id, error = %e, "failed to create credential");
                    saga.compensate().await;
                    return Err(failed());
                }
            },
            CredentialType::X509 => None,
        };

        if let Some(policy) = &policy
            && let Some(guid) = &guid
        {
            if let Err(e) = self.stores.policies.save_app_policy(&app_id, policy, guid).await {
                error!(%app_id, error = %e, "failed to save app policy");
                saga.compensate().await;
                return Err(failed());
            }
            self.sync_schedule(&app_id, policy, guid).await;
        }

        info!(
            %instance_id,
            %binding_id,
            %app_id,
            credential_type = %credential_type,
            with_policy = policy.is_some(),
            "service binding created"
        );

        let forwarder = &self.settings.metrics_forwarder;
        let custom_metrics = match credential {
            Some(credential) => CustomMetricsCredentials {
                credential: Some(credential),
                url: Some(forwarder.url.clone()),
                mtls_url: forwarder.mtls_url.clone(),
            },
            None => CustomMetricsCredentials {
                credential: None,
                url: None,
                mtls_url: forwarder.mtls_url.clone(),
            },
        };
        Ok(BindResult {
            credentials: BindingCredentials { custom_metrics },
        })
    }

    pub async fn unbind(&self, instance_id: &str, binding_id: &str) -> BrokerResult<()> {
        info!(%instance_id, %binding_id, "unbind requested");
        match self.delete_binding(binding_id).await {
            Ok(()) => {
                info!(%instance_id, %binding_id, "service binding deleted");
                Ok(())
            }
            Err(UnbindError::BindingDoesNotExist) => Err(BrokerError::BindingGone),
            Err(e) => {
                error!(%instance_id, %binding_id, error = %e, "unbind failed");
                Err(BrokerError::internal("unbind failed", "unbind"))
            }
        }
    }

    pub async fn get_binding(&self, _instance_id: &str, _binding_id: &str) -> BrokerResult<()> {
        Err(BrokerError::Unsupported(GET_BINDING_UNSUPPORTED))
    }

    pub async fn last_binding_operation(
        &self,
        _instance_id: &str,
        _binding_id: &str,
    ) -> BrokerResult<()> {
        Err(BrokerError::Unsupported(LAST_BINDING_OPERATION_UNSUPPORTED))
    }

    // ── Internals ──────────────────────────────────────────────────

    fn dashboard_url(&self, instance_id: &str) -> String {
        let redirect = &self.settings.dashboard_redirect_uri;
        if redirect.is_empty() {
            return String::new();
        }
        format!("{redirect}/manage/{instance_id}")
    }

    fn require_plan(&self, service_id: &str, plan_id: &str) -> BrokerResult<()> {
        let service = self
            .catalog
            .service(service_id)
            .ok_or_else(|| BrokerError::UnknownService(service_id.to_string()))?;
        if service.plan(plan_id).is_none() {
            return Err(BrokerError::UnknownPlan(plan_id.to_string()));
        }
        Ok(())
    }

    fn validate_policy(&self, doc: &Value, plan_id: &str) -> BrokerResult<ValidatedPolicy> {
        let validated = self
            .validator
            .validate(&doc.to_string())
            .map_err(BrokerError::InvalidPolicy)?;
        self.check_plan(&validated.policy, plan_id)?;
        Ok(validated)
    }

    fn check_plan(&self, policy: &ScalingPolicy, plan_id: &str) -> BrokerResult<()> {
        match self.plan_checker.check_plan(policy, plan_id) {
            Ok(PlanVerdict::Adheres) => Ok(()),
            Ok(PlanVerdict::Exceeds(message)) => Err(BrokerError::PlanViolation(message)),
            Err(e) => {
                error!(%plan_id, error = %e, "failed to check policy against plan");
                Err(BrokerError::internal("error validating policy", "validate-policy"))
            }
        }
    }

    /// Remove every binding of `app_id` on this instance, so a repeated or
    /// retried bind starts from a clean slate.
    async fn release_app(&self, instance_id: &str, app_id: &str) -> BrokerResult<()> {
        let failed = || {
            BrokerError::internal("error creating service binding", "create-service-binding")
        };

        let binding_ids = self
            .stores
            .bindings
            .get_binding_ids_by_instance_id(instance_id)
            .await
            .map_err(|e| {
                error!(%instance_id, error = %e, "failed to list bindings");
                failed()
            })?;

        for binding_id in &binding_ids {
            let bound_app = match self.stores.bindings.get_app_id_by_binding_id(binding_id).await {
                Ok(bound_app) => bound_app,
                Err(StoreError::DoesNotExist(_)) => continue,
                Err(e) => {
                    error!(%binding_id, error = %e, "failed to read binding");
                    return Err(failed());
                }
            };
            if bound_app != app_id {
                continue;
            }
            warn!(%instance_id, %app_id, %binding_id, "app already bound, removing previous binding");
            match self.delete_binding(binding_id).await {
                Ok(()) | Err(UnbindError::BindingDoesNotExist) => {}
                Err(e) => {
                    error!(%binding_id, error = %e, "failed to remove previous binding");
                    return Err(failed());
                }
            }
        }
        Ok(())
    }

    /// The unbind chain shared by unbind, deprovision and bind.
    async fn delete_binding(&self, binding_id: &str) -> Result<(), UnbindError> {
        let app_id = match self.stores.bindings.get_app_id_by_binding_id(binding_id).await {
            Ok(app_id) => app_id,
            Err(StoreError::DoesNotExist(_)) => return Err(UnbindError::BindingDoesNotExist),
            Err(e) => return Err(UnbindError::Lookup(e)),
        };

        self.stores
            .policies
            .delete_policy(&app_id)
            .await
            .map_err(UnbindError::DeletePolicy)?;
        self.scheduler
            .delete_schedule(&app_id)
            .await
            .map_err(UnbindError::DeleteSchedule)?;

        match self.stores.bindings.delete_service_binding(binding_id).await {
            Ok(()) => {}
            Err(StoreError::DoesNotExist(_)) => return Err(UnbindError::BindingDoesNotExist),
            Err(e) => return Err(UnbindError::DeleteBinding(e)),
        }

        self.stores
            .credentials
            .delete(&app_id)
            .await
            .map_err(UnbindError::DeleteCredential)?;
        debug!(%binding_id, %app_id, "binding released");
        Ok(())
    }

    async fn sync_schedule(&self, app_id: &str, policy: &ScalingPolicy, guid: &str) {
        if let Err(e) = self
            .scheduler
            .create_or_update_schedule(app_id, policy, guid)
            .await
        {
            warn!(%app_id, %guid, error = %e, "failed to synchronise schedules");
        }
    }

    async fn remove_schedule(&self, app_id: &str) {
        if let Err(e) = self.scheduler.delete_schedule(app_id).await {
            warn!(%app_id, error = %e, "failed to delete schedules");
        }
    }
}
