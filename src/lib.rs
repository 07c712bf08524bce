//! Talenta audio workspace. Record, arrange and publish the segments of an
//! audio entry against the Talenta REST API.
//!
//! ```text
//! recorder ──Blob──▶ reconcile::Workspace ◀──▶ remote::RemoteStore
//!                     ├─ segment::SegmentStore
//!                     └─ playlist::PlaylistSequencer ──▶ MediaPlayer
//! ```

pub mod config;
pub mod playlist;
pub mod reconcile;
pub mod recorder;
pub mod remote;
pub mod segment;
