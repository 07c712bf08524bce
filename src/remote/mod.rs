//! Remote store module: the JSON/HTTP audio backend.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────┐
//! │                RemoteStore (trait)                     │
//! │                                                       │
//! │   ┌────────────────────┐     ┌──────────────────┐     │
//! │   │ CredentialProvider │────▶│    HttpStore     │     │
//! │   │ - StaticToken      │     │ - reqwest client │     │
//! │   │ - TokenFile        │     │ - classify()     │     │
//! │   └────────────────────┘     └────────┬─────────┘     │
//! │                                       │               │
//! │                                       ▼               │
//! │                      dto.rs  JSON ⇄ AudioEntity       │
//! └───────────────────────────────────────────────────────┘
//! ```

pub mod credentials;
pub mod dto;
pub mod http;
pub mod store;

#[cfg(test)]
pub mod mock;

// ── Public re-exports ──────────────────────────────────────────────────────

pub use credentials::{Anonymous, CredentialProvider, StaticToken, TokenFile};
pub use http::{classify, HttpStore, Operation};
pub use store::{RemoteStore, StoreError, UploadPayload};

// test-only re-export so the reconcile tests can build a store in one line.
#[cfg(test)]
pub use mock::MockStore;
