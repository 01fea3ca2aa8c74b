//! autoscaler-state — persistence for the autoscaler broker.
//!
//! Defines the store contracts the broker depends on ([`BindingStore`],
//! [`PolicyStore`], [`CredentialStore`]) and an embedded implementation of
//! all three backed by [redb](https://docs.rs/redb).
//!
//! # Architecture
//!
//! All records are JSON-serialized into redb's `&[u8]` value columns. Every
//! create-if-absent check runs inside the same write transaction as the
//! insert; redb serializes write transactions, so duplicate creates for one
//! id always resolve to a single winner.
//!
//! The `StateStore` is `Clone` + `Send` + `Sync` (backed by `Arc<Database>`)
//! and can be shared across async tasks.

pub mod contracts;
pub mod credentials;
pub mod error;
pub mod store;
pub mod tables;

pub use contracts::{BindingStore, CredentialStore, PolicyStore};
pub use credentials::{DbCredentialStore, StoredCredential};
pub use error::{StateError, StateResult, StoreError, StoreResult};
pub use store::StateStore;
