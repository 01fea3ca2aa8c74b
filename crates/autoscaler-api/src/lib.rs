//! autoscaler-api — REST API for the autoscaler service broker.
//!
//! Provides axum route handlers that translate broker requests into
//! [`Broker`] calls and broker failures into JSON error bodies.
//!
//! # API Routes
//!
//! | Method | Path | Description |
//! |---|---|---|
//! | GET | `/v2/catalog` | Service catalog |
//! | PUT | `/v2/service_instances/{id}` | Provision an instance |
//! | PATCH | `/v2/service_instances/{id}` | Update plan or default policy |
//! | DELETE | `/v2/service_instances/{id}` | Deprovision an instance |
//! | GET | `/v2/service_instances/{id}` | Unsupported |
//! | GET | `/v2/service_instances/{id}/last_operation` | Unsupported |
//! | PUT | `/v2/service_instances/{id}/service_bindings/{bid}` | Bind an app |
//! | DELETE | `/v2/service_instances/{id}/service_bindings/{bid}` | Unbind an app |
//! | GET | `/v2/service_instances/{id}/service_bindings/{bid}` | Unsupported |
//! | GET | `/v2/service_instances/{id}/service_bindings/{bid}/last_operation` | Unsupported |

pub mod handlers;

use std::sync::Arc;

use autoscaler_broker::Broker;
use axum::Router;
use axum::routing::get;

/// Shared state for API handlers.
#[derive(Clone)]
pub struct ApiState {
    pub broker: Arc<Broker>,
}

/// Build the complete `/v2` broker router.
pub fn build_router(broker: Arc<Broker>) -> Router {
    let state = ApiState { broker };

    let routes = Router::new()
        .route("/catalog", get(handlers::catalog))
        .route(
            "/service_instances/{instance_id}",
            get(handlers::get_instance)
                .put(handlers::provision)
                .patch(handlers::update)
                .delete(handlers::deprovision),
        )
        .route(
            "/service_instances/{instance_id}/last_operation",
            get(handlers::last_operation),
        )
        .route(
            "/service_instances/{instance_id}/service_bindings/{binding_id}",
            get(handlers::get_binding)
                .put(handlers::bind)
                .delete(handlers::unbind),
        )
        .route(
            "/service_instances/{instance_id}/service_bindings/{binding_id}/last_operation",
            get(handlers::last_binding_operation),
        )
        .with_state(state);

    Router::new().nest("/v2", routes)
}
