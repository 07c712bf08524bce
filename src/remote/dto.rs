//! JSON wire shapes of the audio API and their conversion to domain types.
//!
//! The server uses document-store ids (`_id`) and sometimes wraps a single
//! record as `{ "audio": { … } }`; both forms are accepted.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::segment::{
    AudioEntity, AudioMetadata, AudioStatus, EntityId, MainTrack, Provenance, Segment, SegmentId,
    SegmentStore,
};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SegmentDto {
    #[serde(alias = "_id")]
    pub id: String,
    #[serde(alias = "fileUrl", alias = "audioUrl")]
    pub url: String,
    #[serde(default)]
    pub order: Option<usize>,
    #[serde(default, alias = "source")]
    pub provenance: Provenance,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioDto {
    #[serde(alias = "_id")]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub status: AudioStatus,
    #[serde(alias = "fileUrl", alias = "url")]
    pub audio_url: String,
    #[serde(default)]
    pub segments: Vec<SegmentDto>,
}

/// `{ "audio": {...} }` or a bare record.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum AudioEnvelope {
    Wrapped { audio: AudioDto },
    Bare(AudioDto),
}

/// `{ "segments": [...] }` or a bare array.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum SegmentsEnvelope {
    Wrapped { segments: Vec<SegmentDto> },
    Bare(Vec<SegmentDto>),
}

/// Body of a failed request, when the server sends one.
#[derive(Debug, Default, Deserialize)]
pub struct ErrorBody {
    #[serde(default, alias = "error")]
    pub message: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReorderRequest<'a> {
    pub segment_ids: Vec<&'a str>,
}

#[derive(Debug, Serialize)]
pub struct PublishRequest {
    pub status: AudioStatus,
    pub merge: bool,
}

// ---------------------------------------------------------------------------
// Conversions
// ---------------------------------------------------------------------------

impl From<SegmentDto> for Segment {
    fn from(dto: SegmentDto) -> Self {
        Segment::persisted(SegmentId(dto.id), dto.url, dto.provenance)
    }
}

impl From<AudioEnvelope> for AudioDto {
    fn from(envelope: AudioEnvelope) -> Self {
        match envelope {
            AudioEnvelope::Wrapped { audio } => audio,
            AudioEnvelope::Bare(audio) => audio,
        }
    }
}

impl From<SegmentsEnvelope> for Vec<SegmentDto> {
    fn from(envelope: SegmentsEnvelope) -> Self {
        match envelope {
            SegmentsEnvelope::Wrapped { segments } => segments,
            SegmentsEnvelope::Bare(segments) => segments,
        }
    }
}

impl From<AudioDto> for AudioEntity {
    fn from(dto: AudioDto) -> Self {
        let mut segments = dto.segments;
        // stable: segments without an order keep their array position
        segments.sort_by_key(|s| s.order.unwrap_or(usize::MAX));
        let store = SegmentStore::from_segments(segments.into_iter().map(Segment::from).collect());

        AudioEntity {
            id: EntityId(dto.id),
            metadata: AudioMetadata {
                title: dto.title,
                description: dto.description,
                tags: dto.tags.into_iter().collect::<BTreeSet<_>>(),
                category: dto.category.filter(|c| !c.is_empty()),
            },
            status: dto.status,
            main_track: MainTrack { url: dto.audio_url },
            segments: store.snapshot(),
        }
    }
}
