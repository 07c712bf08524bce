//! Reconciliation of local edits with the remote store.
//!
//! ```text
//!   UI intent ──▶ ReconciliationController ──▶ RemoteStore
//!                     │        ▲
//!                     ▼        │ refetch on failure
//!                 Workspace ───┘
//!                 ├─ SegmentStore
//!                 └─ PlaylistSequencer
//! ```
//!
//! The controller applies every change locally first, then confirms it
//! remotely; on failure the local state is replaced by the server's.

pub mod controller;
pub mod workspace;

pub use controller::{Notification, ReconcileError, ReconciliationController, SharedWorkspace};
pub use workspace::Workspace;
