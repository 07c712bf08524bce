//! In-memory [`RemoteStore`] double for tests.
//!
//! Behaves like a well-formed server (reorders, deletes and uploads are
//! applied to the stored entity) and can be scripted to fail a given
//! operation or to hold mutating calls until a gate is opened.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::Notify;

use crate::segment::{
    AudioEntity, AudioMetadata, AudioStatus, EntityId, MainTrack, MetadataUpdate, Provenance,
    Segment, SegmentId, SegmentStore,
};

use super::http::Operation;
use super::store::{RemoteStore, StoreError, UploadPayload};

#[derive(Default)]
struct MockState {
    entities: HashMap<EntityId, AudioEntity>,
    failures: HashMap<Operation, StoreError>,
    calls: Vec<Operation>,
    uploaded: usize,
}

#[derive(Default)]
pub struct MockStore {
    state: Mutex<MockState>,
    gate: Option<Arc<Notify>>,
}

impl MockStore {
    /// A store holding one draft entity `id` with persisted segments `ids`.
    pub fn with_entity(id: &str, ids: &[&str]) -> Self {
        let store = Self::default();
        store.insert(entity(id, ids));
        store
    }

    /// Mutating calls wait for `gate.notify_one()` before completing.
    pub fn gated(mut self, gate: Arc<Notify>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn insert(&self, entity: AudioEntity) {
        self.lock().entities.insert(entity.id.clone(), entity);
    }

    /// Every subsequent `op` call fails with `error`.
    pub fn fail(&self, op: Operation, error: StoreError) {
        self.lock().failures.insert(op, error);
    }

    pub fn heal(&self, op: Operation) {
        self.lock().failures.remove(&op);
    }

    pub fn calls(&self) -> Vec<Operation> {
        self.lock().calls.clone()
    }

    pub fn count(&self, op: Operation) -> usize {
        self.lock().calls.iter().filter(|c| **c == op).count()
    }

    pub fn remote_order(&self, id: &str) -> Vec<String> {
        self.lock()
            .entities
            .get(&EntityId::from(id))
            .map(|e| {
                e.segments
                    .iter()
                    .filter_map(|s| s.remote_id().map(|r| r.0.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockState> {
        self.state.lock().unwrap()
    }

    async fn enter(&self, op: Operation) -> Result<(), StoreError> {
        self.lock().calls.push(op);
        if op != Operation::Fetch {
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
        }
        match self.lock().failures.get(&op) {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    fn with_entity_mut<T>(
        &self,
        id: &EntityId,
        f: impl FnOnce(&mut AudioEntity) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let mut state = self.lock();
        let entity = state
            .entities
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(format!("audio {id}")))?;
        f(entity)
    }
}

/// Draft entity `id` with persisted segments `ids` at `http://cdn/<id>`.
pub fn entity(id: &str, ids: &[&str]) -> AudioEntity {
    let segments = ids
        .iter()
        .map(|s| Segment::persisted((*s).into(), format!("http://cdn/{s}"), Provenance::Recorded))
        .collect();
    AudioEntity {
        id: EntityId::from(id),
        metadata: AudioMetadata {
            title: format!("Audio {id}"),
            ..AudioMetadata::default()
        },
        status: AudioStatus::Draft,
        main_track: MainTrack {
            url: format!("http://cdn/{id}/main"),
        },
        segments: SegmentStore::from_segments(segments).snapshot(),
    }
}

#[async_trait]
impl RemoteStore for MockStore {
    async fn fetch_audio(&self, id: &EntityId) -> Result<AudioEntity, StoreError> {
        self.enter(Operation::Fetch).await?;
        self.with_entity_mut(id, |e| Ok(e.clone()))
    }

    async fn update_metadata(
        &self,
        id: &EntityId,
        update: &MetadataUpdate,
    ) -> Result<AudioEntity, StoreError> {
        self.enter(Operation::UpdateMetadata).await?;
        self.with_entity_mut(id, |e| {
            if let Some(title) = &update.title {
                e.metadata.title = title.clone();
            }
            if let Some(description) = &update.description {
                e.metadata.description = description.clone();
            }
            if let Some(tags) = &update.tags {
                e.metadata.tags = tags.clone();
            }
            if let Some(category) = &update.category {
                e.metadata.category = Some(category.clone());
            }
            Ok(e.clone())
        })
    }

    async fn upload_segments(
        &self,
        id: &EntityId,
        payloads: &[UploadPayload],
    ) -> Result<Vec<Segment>, StoreError> {
        self.enter(Operation::Upload).await?;
        let first = {
            let mut state = self.lock();
            let first = state.uploaded;
            state.uploaded += payloads.len();
            first
        };
        self.with_entity_mut(id, |e| {
            let created: Vec<Segment> = payloads
                .iter()
                .enumerate()
                .map(|(i, p)| {
                    let sid = format!("up-{}", first + i + 1);
                    Segment::persisted(SegmentId(sid.clone()), format!("http://cdn/{sid}"), p.provenance)
                })
                .collect();
            let mut store = SegmentStore::from_segments(e.segments.clone());
            for segment in &created {
                store.append(segment.clone());
            }
            e.segments = store.snapshot();
            Ok(created)
        })
    }

    async fn reorder_segments(&self, id: &EntityId, order: &[SegmentId]) -> Result<(), StoreError> {
        self.enter(Operation::Reorder).await?;
        self.with_entity_mut(id, |e| {
            let mut reordered = Vec::with_capacity(order.len());
            for sid in order {
                let seg = e
                    .segments
                    .iter()
                    .find(|s| s.remote_id() == Some(sid))
                    .ok_or_else(|| StoreError::Conflict(format!("unknown segment {sid}")))?;
                reordered.push(seg.clone());
            }
            if reordered.len() != e.segments.len() {
                return Err(StoreError::Conflict("order is missing segments".into()));
            }
            e.segments = SegmentStore::from_segments(reordered).snapshot();
            Ok(())
        })
    }

    async fn delete_segment(&self, id: &EntityId, segment: &SegmentId) -> Result<(), StoreError> {
        self.enter(Operation::Delete).await?;
        self.with_entity_mut(id, |e| {
            let mut store = SegmentStore::from_segments(e.segments.clone());
            let index = store
                .position_of_remote(segment)
                .ok_or_else(|| StoreError::NotFound(format!("segment {segment}")))?;
            store
                .remove(index)
                .map_err(|err| StoreError::NotFound(err.to_string()))?;
            e.segments = store.snapshot();
            Ok(())
        })
    }

    async fn publish(&self, id: &EntityId, _merge: bool) -> Result<AudioEntity, StoreError> {
        self.enter(Operation::Publish).await?;
        self.with_entity_mut(id, |e| {
            e.status = AudioStatus::Published;
            Ok(e.clone())
        })
    }
}
