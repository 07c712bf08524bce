//! Domain types: the audio entity, its main track and its segments.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::recorder::Blob;

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

/// Opaque identifier of an audio entity, as issued by the remote store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(pub String);

/// Remote identifier of a persisted segment.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SegmentId(pub String);

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for SegmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EntityId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<&str> for SegmentId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

// ---------------------------------------------------------------------------
// AudioStatus
// ---------------------------------------------------------------------------

/// Publication lifecycle of an audio entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioStatus {
    #[default]
    Draft,
    Published,
}

impl AudioStatus {
    pub fn label(&self) -> &'static str {
        match self {
            AudioStatus::Draft => "draft",
            AudioStatus::Published => "published",
        }
    }
}

// ---------------------------------------------------------------------------
// Provenance
// ---------------------------------------------------------------------------

/// How a segment came into existence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provenance {
    #[default]
    Recorded,
    Uploaded,
}

// ---------------------------------------------------------------------------
// Segment
// ---------------------------------------------------------------------------

/// Where a segment's audio can be played from.
#[derive(Debug, Clone, PartialEq)]
pub enum SegmentSource {
    /// Exists only locally; `preview_url` resolves to `blob` until revoked.
    Pending {
        local_id: Uuid,
        blob: Blob,
        preview_url: String,
    },
    /// Stored remotely under `id`.
    Persisted { id: SegmentId, url: String },
}

/// One appended audio unit in an entity's playlist.
///
/// `order` is owned by [`SegmentStore`](super::SegmentStore); values set by
/// the constructors are overwritten on insertion.
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    pub source: SegmentSource,
    pub order: usize,
    pub provenance: Provenance,
}

impl Segment {
    /// A freshly recorded or selected segment that has not been uploaded.
    pub fn pending(blob: Blob, preview_url: impl Into<String>, provenance: Provenance) -> Self {
        Self {
            source: SegmentSource::Pending {
                local_id: Uuid::new_v4(),
                blob,
                preview_url: preview_url.into(),
            },
            order: 0,
            provenance,
        }
    }

    /// A segment the remote store already knows about.
    pub fn persisted(id: SegmentId, url: impl Into<String>, provenance: Provenance) -> Self {
        Self {
            source: SegmentSource::Persisted {
                id,
                url: url.into(),
            },
            order: 0,
            provenance,
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self.source, SegmentSource::Pending { .. })
    }

    pub fn remote_id(&self) -> Option<&SegmentId> {
        match &self.source {
            SegmentSource::Persisted { id, .. } => Some(id),
            SegmentSource::Pending { .. } => None,
        }
    }

    pub fn local_id(&self) -> Option<Uuid> {
        match &self.source {
            SegmentSource::Pending { local_id, .. } => Some(*local_id),
            SegmentSource::Persisted { .. } => None,
        }
    }

    /// URL a media element should load for this segment.
    pub fn playable_url(&self) -> &str {
        match &self.source {
            SegmentSource::Pending { preview_url, .. } => preview_url,
            SegmentSource::Persisted { url, .. } => url,
        }
    }
}

// ---------------------------------------------------------------------------
// AudioEntity
// ---------------------------------------------------------------------------

/// The original recorded/uploaded file; always first in playback order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MainTrack {
    pub url: String,
}

/// Editable descriptive fields of an audio entity.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AudioMetadata {
    pub title: String,
    pub description: String,
    pub tags: BTreeSet<String>,
    pub category: Option<String>,
}

/// Top-level audio content item as returned by the remote store.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioEntity {
    pub id: EntityId,
    pub metadata: AudioMetadata,
    pub status: AudioStatus,
    pub main_track: MainTrack,
    /// Remote order; `order` fields are dense from 0.
    pub segments: Vec<Segment>,
}

/// Partial metadata change; `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MetadataUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<BTreeSet<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

impl MetadataUpdate {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.tags.is_none()
            && self.category.is_none()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recorder::MimeType;

    #[test]
    fn pending_segment_has_no_remote_id() {
        let blob = Blob::new(vec![1, 2, 3], MimeType::Unspecified);
        let seg = Segment::pending(blob, "blob:talenta/x", Provenance::Recorded);
        assert!(seg.is_pending());
        assert!(seg.remote_id().is_none());
        assert!(seg.local_id().is_some());
        assert_eq!(seg.playable_url(), "blob:talenta/x");
    }

    #[test]
    fn persisted_segment_plays_remote_url() {
        let seg = Segment::persisted("s1".into(), "http://cdn/s1.webm", Provenance::Uploaded);
        assert!(!seg.is_pending());
        assert_eq!(seg.remote_id(), Some(&SegmentId::from("s1")));
        assert_eq!(seg.playable_url(), "http://cdn/s1.webm");
    }

    #[test]
    fn status_serializes_lowercase() {
        let json = serde_json::to_string(&AudioStatus::Published).unwrap();
        assert_eq!(json, "\"published\"");
    }

    #[test]
    fn metadata_update_skips_unset_fields() {
        let update = MetadataUpdate {
            title: Some("Episode 1".into()),
            ..MetadataUpdate::default()
        };
        let json = serde_json::to_value(&update).unwrap();
        assert_eq!(json, serde_json::json!({ "title": "Episode 1" }));
        assert!(MetadataUpdate::default().is_empty());
    }
}
