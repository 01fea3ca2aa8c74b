//! Request and response shapes of the broker lifecycle operations.

use autoscaler_core::Credential;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Body of a provision request.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProvisionDetails {
    #[serde(default)]
    pub service_id: String,
    #[serde(default)]
    pub plan_id: String,
    #[serde(default)]
    pub organization_guid: String,
    #[serde(default)]
    pub space_guid: String,
    /// Raw user parameters; an object with an optional `default_policy`.
    #[serde(default)]
    pub parameters: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProvisionResult {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub dashboard_url: String,
    /// An identical instance was already present.
    #[serde(skip)]
    pub already_existed: bool,
}

/// Body of an update request.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateDetails {
    #[serde(default)]
    pub service_id: String,
    #[serde(default)]
    pub plan_id: Option<String>,
    #[serde(default)]
    pub parameters: Option<Value>,
    #[serde(default)]
    pub previous_values: PreviousValues,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PreviousValues {
    #[serde(default)]
    pub plan_id: Option<String>,
}

/// Body of a bind request.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BindDetails {
    #[serde(default)]
    pub service_id: String,
    #[serde(default)]
    pub plan_id: String,
    #[serde(default)]
    pub app_guid: Option<String>,
    #[serde(default)]
    pub bind_resource: Option<BindResource>,
    /// Raw user parameters: a scaling policy, optionally with
    /// `credential-type` and `configuration` members.
    #[serde(default)]
    pub parameters: Option<Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BindResource {
    #[serde(default)]
    pub app_guid: Option<String>,
}

impl BindDetails {
    /// The bound application, from `app_guid` or `bind_resource.app_guid`.
    pub fn app_id(&self) -> Option<&str> {
        self.app_guid
            .as_deref()
            .or_else(|| self.bind_resource.as_ref()?.app_guid.as_deref())
            .filter(|id| !id.is_empty())
    }
}

/// `{"credentials":{"custom_metrics":{...}}}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BindResult {
    pub credentials: BindingCredentials,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BindingCredentials {
    pub custom_metrics: CustomMetricsCredentials,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CustomMetricsCredentials {
    #[serde(flatten)]
    pub credential: Option<Credential>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mtls_url: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn app_id_falls_back_to_bind_resource() {
        let details: BindDetails =
            serde_json::from_value(json!({"bind_resource": {"app_guid": "app-1"}})).unwrap();
        assert_eq!(details.app_id(), Some("app-1"));

        let details: BindDetails = serde_json::from_value(json!({"app_guid": ""})).unwrap();
        assert_eq!(details.app_id(), None);
    }

    #[test]
    fn x509_credentials_carry_only_mtls_url() {
        let result = BindResult {
            credentials: BindingCredentials {
                custom_metrics: CustomMetricsCredentials {
                    credential: None,
                    url: None,
                    mtls_url: Some("https://mtls.example".into()),
                },
            },
        };
        assert_eq!(
            serde_json::to_value(&result).unwrap(),
            json!({"credentials": {"custom_metrics": {"mtls_url": "https://mtls.example"}}})
        );
    }

    #[test]
    fn secret_credentials_are_flattened() {
        let result = CustomMetricsCredentials {
            credential: Some(Credential {
                username: "u".into(),
                password: "p".into(),
            }),
            url: Some("https://metrics.example".into()),
            mtls_url: None,
        };
        assert_eq!(
            serde_json::to_value(&result).unwrap(),
            json!({"username": "u", "password": "p", "url": "https://metrics.example"})
        );
    }
}
