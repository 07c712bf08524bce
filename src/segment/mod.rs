//! Audio entity data model and the ordered segment store.
//!
//! ```text
//! AudioEntity ── MainTrack            (playback position 0)
//!            └── SegmentStore
//!                  ├─ Segment order=0  (playback position 1)
//!                  ├─ Segment order=1  (playback position 2)
//!                  └─ …
//! ```
//!
//! A [`Segment`] is either *pending* (a local blob with a preview URL) or
//! *persisted* (a remote id + URL).

pub mod model;
pub mod store;

pub use model::{
    AudioEntity, AudioMetadata, AudioStatus, EntityId, MainTrack, MetadataUpdate, Provenance,
    Segment, SegmentId, SegmentSource,
};
pub use store::{IndexOutOfRange, SegmentStore};
