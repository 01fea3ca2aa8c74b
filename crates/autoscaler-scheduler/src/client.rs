//! HTTP client for the external scheduler service.
//!
//! | Call | Request | Success |
//! |---|---|---|
//! | create/update | `PUT {url}/v1/apps/{app_id}/schedules?guid={guid}` | 200, 204 |
//! | delete | `DELETE {url}/v1/apps/{app_id}/schedules` | 200, 204, 404 |

use std::time::Duration;

use async_trait::async_trait;
use autoscaler_core::ScalingPolicy;
use autoscaler_core::config::SchedulerConfig;
use reqwest::{Client, StatusCode};
use tracing::{debug, warn};

use crate::error::{SchedulerError, SchedulerResult};

/// Keeps the scheduler's view of an app's schedules in step with its policy.
#[async_trait]
pub trait SchedulerClient: Send + Sync {
    async fn create_or_update_schedule(
        &self,
        app_id: &str,
        policy: &ScalingPolicy,
        guid: &str,
    ) -> SchedulerResult<()>;

    /// Deleting schedules the scheduler does not know about succeeds.
    async fn delete_schedule(&self, app_id: &str) -> SchedulerResult<()>;
}

#[derive(Clone)]
pub struct HttpSchedulerClient {
    client: Client,
    base_url: String,
}

impl HttpSchedulerClient {
    pub fn new(config: &SchedulerConfig) -> SchedulerResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self::with_client(client, &config.url))
    }

    pub fn with_client(client: Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn schedules_url(&self, app_id: &str) -> String {
        format!("{}/v1/apps/{app_id}/schedules", self.base_url)
    }
}

#[async_trait]
impl SchedulerClient for HttpSchedulerClient {
    #[tracing::instrument(skip(self, policy), err)]
    async fn create_or_update_schedule(
        &self,
        app_id: &str,
        policy: &ScalingPolicy,
        guid: &str,
    ) -> SchedulerResult<()> {
        let resp = self
            .client
            .put(self.schedules_url(app_id))
            .query(&[("guid", guid)])
            .json(&policy.definition())
            .send()
            .await?;

        let status = resp.status();
        match status {
            StatusCode::OK | StatusCode::NO_CONTENT => {
                debug!(%app_id, "schedules synchronized");
                Ok(())
            }
            StatusCode::BAD_REQUEST => {
                let body = resp.text().await.unwrap_or_default();
                Err(SchedulerError::Validation(body))
            }
            _ => {
                let body = resp.text().await.unwrap_or_default();
                warn!(%app_id, %status, "scheduler rejected schedule update");
                Err(SchedulerError::Upsert(body))
            }
        }
    }

    #[tracing::instrument(skip(self), err)]
    async fn delete_schedule(&self, app_id: &str) -> SchedulerResult<()> {
        let resp = self.client.delete(self.schedules_url(app_id)).send().await?;

        let status = resp.status();
        match status {
            StatusCode::OK | StatusCode::NO_CONTENT | StatusCode::NOT_FOUND => {
                debug!(%app_id, %status, "schedules deleted");
                Ok(())
            }
            _ => {
                let body = resp.text().await.unwrap_or_default();
                warn!(%app_id, %status, "scheduler rejected schedule deletion");
                Err(SchedulerError::Delete(body))
            }
        }
    }
}
