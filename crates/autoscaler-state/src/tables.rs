//! redb table definitions for the broker store.
//!
//! Each table uses `&str` keys and `&[u8]` values (JSON-serialized domain types).

use redb::TableDefinition;

/// Service instances keyed by `{instance_id}`.
pub const SERVICE_INSTANCES: TableDefinition<&str, &[u8]> =
    TableDefinition::new("service_instances");

/// Service bindings keyed by `{binding_id}`.
pub const SERVICE_BINDINGS: TableDefinition<&str, &[u8]> =
    TableDefinition::new("service_bindings");

/// App policies keyed by `{app_id}`.
pub const APP_POLICIES: TableDefinition<&str, &[u8]> = TableDefinition::new("app_policies");

/// Hashed custom-metrics credentials keyed by `{app_id}`.
pub const CREDENTIALS: TableDefinition<&str, &[u8]> = TableDefinition::new("credentials");
