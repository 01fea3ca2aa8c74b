//! Broker API handlers.
//!
//! Each handler delegates to [`Broker`](autoscaler_broker::Broker) and
//! renders failures through [`ApiError`].

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use serde_json::json;
use tracing::{debug, error};

use autoscaler_broker::{BindDetails, BrokerError, ProvisionDetails, UpdateDetails};
use autoscaler_core::Catalog;
use autoscaler_policy::ValidationError;

use crate::ApiState;

/// Error body for every failed broker call.
#[derive(Serialize)]
struct ErrorBody<'a> {
    code: &'a str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    errors: Option<&'a [ValidationError]>,
}

/// A broker failure rendered as an HTTP response.
#[derive(Debug)]
pub struct ApiError(pub BrokerError);

impl From<BrokerError> for ApiError {
    fn from(err: BrokerError) -> Self {
        ApiError(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        debug!(error = %rejection, "rejected request body");
        ApiError(BrokerError::RawParamsInvalid)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let err = self.0;
        let status =
            StatusCode::from_u16(err.status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            error!(code = err.code(), "broker request failed");
        } else {
            debug!(code = err.code(), %status, message = %err, "broker request rejected");
        }
        let body = ErrorBody {
            code: err.code(),
            message: err.message(),
            errors: err.validation_errors().map(|errors| errors.errors()),
        };
        (status, Json(body)).into_response()
    }
}

type ApiResult = Result<Response, ApiError>;

fn empty_ok() -> Response {
    (StatusCode::OK, Json(json!({}))).into_response()
}

// ── Catalog ────────────────────────────────────────────────────

/// GET /v2/catalog
pub async fn catalog(State(state): State<ApiState>) -> Json<Catalog> {
    Json(state.broker.catalog().clone())
}

// ── Instances ──────────────────────────────────────────────────

/// PUT /v2/service_instances/:instance_id
pub async fn provision(
    State(state): State<ApiState>,
    Path(instance_id): Path<String>,
    body: Result<Json<ProvisionDetails>, JsonRejection>,
) -> ApiResult {
    let Json(details) = body?;
    let result = state.broker.provision(&instance_id, details).await?;
    let status = if result.already_existed {
        StatusCode::OK
    } else {
        StatusCode::CREATED
    };
    Ok((status, Json(result)).into_response())
}

/// PATCH /v2/service_instances/:instance_id
pub async fn update(
    State(state): State<ApiState>,
    Path(instance_id): Path<String>,
    body: Result<Json<UpdateDetails>, JsonRejection>,
) -> ApiResult {
    let Json(details) = body?;
    state.broker.update(&instance_id, details).await?;
    Ok(empty_ok())
}

/// DELETE /v2/service_instances/:instance_id
pub async fn deprovision(
    State(state): State<ApiState>,
    Path(instance_id): Path<String>,
) -> ApiResult {
    state.broker.deprovision(&instance_id).await?;
    Ok(empty_ok())
}

/// GET /v2/service_instances/:instance_id
pub async fn get_instance(
    State(state): State<ApiState>,
    Path(instance_id): Path<String>,
) -> ApiResult {
    state.broker.get_instance(&instance_id).await?;
    Ok(empty_ok())
}

/// GET /v2/service_instances/:instance_id/last_operation
pub async fn last_operation(
    State(state): State<ApiState>,
    Path(instance_id): Path<String>,
) -> ApiResult {
    state.broker.last_operation(&instance_id).await?;
    Ok(empty_ok())
}

// ── Bindings ───────────────────────────────────────────────────

/// PUT /v2/service_instances/:instance_id/service_bindings/:binding_id
pub async fn bind(
    State(state): State<ApiState>,
    Path((instance_id, binding_id)): Path<(String, String)>,
    body: Result<Json<BindDetails>, JsonRejection>,
) -> ApiResult {
    let Json(details) = body?;
    let result = state.broker.bind(&instance_id, &binding_id, details).await?;
    Ok((StatusCode::CREATED, Json(result)).into_response())
}

/// DELETE /v2/service_instances/:instance_id/service_bindings/:binding_id
pub async fn unbind(
    State(state): State<ApiState>,
    Path((instance_id, binding_id)): Path<(String, String)>,
) -> ApiResult {
    state.broker.unbind(&instance_id, &binding_id).await?;
    Ok(empty_ok())
}

/// GET /v2/service_instances/:instance_id/service_bindings/:binding_id
pub async fn get_binding(
    State(state): State<ApiState>,
    Path((instance_id, binding_id)): Path<(String, String)>,
) -> ApiResult {
    state.broker.get_binding(&instance_id, &binding_id).await?;
    Ok(empty_ok())
}

/// GET /v2/service_instances/:instance_id/service_bindings/:binding_id/last_operation
pub async fn last_binding_operation(
    State(state): State<ApiState>,
    Path((instance_id, binding_id)): Path<(String, String)>,
) -> ApiResult {
    state
        .broker
        .last_binding_operation(&instance_id, &binding_id)
        .await?;
    Ok(empty_ok())
}
