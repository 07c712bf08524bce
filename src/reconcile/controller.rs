//! `ReconciliationController`: optimistic local edits, confirmed remotely.
//!
//! # Flow of a structural change
//!
//! ```text
//! reorder / delete
//!   │ validate ──────────────── InvalidReorderRange / NotFound (nothing changed)
//!   │ snapshot + apply locally   cursor → 0, Idle
//!   │ remote call (timeout) ──ok──▶ done
//!   └─────────────────────────fail─▶ refetch ──ok──▶ adopt remote order
//!                                        └──fail─▶ restore snapshot
//!                                     ReorderFailed / DeleteFailed
//! ```
//!
//! At most one remote mutation runs per controller (one controller per
//! entity). A second call while one is outstanding fails fast with
//! [`ReconcileError::Busy`]; nothing is queued.

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use thiserror::Error;
use tokio::sync::{broadcast, Mutex as FlightLock, MutexGuard as FlightGuard};
use uuid::Uuid;

use crate::config::AppConfig;
use crate::playlist::MediaPlayer;
use crate::recorder::{Blob, PreviewUrls};
use crate::remote::{RemoteStore, StoreError, UploadPayload};
use crate::segment::{
    AudioStatus, EntityId, MetadataUpdate, Provenance, Segment, SegmentId, SegmentSource,
};

use super::workspace::Workspace;

pub type SharedWorkspace = Arc<Mutex<Workspace>>;

// ---------------------------------------------------------------------------
// ReconcileError
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReconcileError {
    #[error("cannot move segment {from} to {to}: both must be saved segments within 0..{len}")]
    InvalidReorderRange { from: usize, to: usize, len: usize },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("another change is still being saved; try again in a moment")]
    Busy,

    #[error("could not save the new order ({0}); the saved order was restored")]
    ReorderFailed(StoreError),

    #[error("could not delete the segment ({0}); it was restored")]
    DeleteFailed(StoreError),

    #[error("upload failed ({0}); the segment is kept as not yet saved")]
    UploadFailed(StoreError),

    #[error("publishing failed: {0}")]
    MergeFailed(String),

    #[error("invalid details: {0}")]
    ValidationError(String),

    #[error("the server did not answer in time")]
    Timeout,

    #[error("could not load the audio: {0}")]
    Fetch(StoreError),
}

// ---------------------------------------------------------------------------
// Notification
// ---------------------------------------------------------------------------

/// Published after every controller operation, successful or not.
#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    Reloaded,
    Reordered { from: usize, to: usize },
    Deleted(SegmentId),
    PendingAdded(Uuid),
    PendingDiscarded(Uuid),
    Persisted { local_id: Uuid, id: SegmentId },
    MetadataSaved,
    Published { merge: bool },
    /// Local state was replaced after a failed optimistic change.
    RolledBack,
    Failed(ReconcileError),
}

// ---------------------------------------------------------------------------
// ReconciliationController
// ---------------------------------------------------------------------------

pub struct ReconciliationController {
    remote: Arc<dyn RemoteStore>,
    workspace: SharedWorkspace,
    in_flight: FlightLock<()>,
    timeout: Duration,
    notifications: broadcast::Sender<Notification>,
}

impl ReconciliationController {
    pub fn new(remote: Arc<dyn RemoteStore>, workspace: Workspace, timeout: Duration) -> Self {
        let (notifications, _) = broadcast::channel(64);
        Self {
            remote,
            workspace: Arc::new(Mutex::new(workspace)),
            in_flight: FlightLock::new(()),
            timeout,
            notifications,
        }
    }

    /// Load entity `id` and wrap it in a controller configured from `config`.
    pub async fn open(
        remote: Arc<dyn RemoteStore>,
        id: &EntityId,
        player: Box<dyn MediaPlayer>,
        previews: PreviewUrls,
        config: &AppConfig,
    ) -> Result<Self, ReconcileError> {
        let timeout = config.api.timeout();
        let loading = Workspace::load(&*remote, id, player, previews, &config.playback);
        let workspace = match tokio::time::timeout(timeout, loading).await {
            Ok(Ok(ws)) => ws,
            Ok(Err(StoreError::NotFound(what))) => return Err(ReconcileError::NotFound(what)),
            Ok(Err(StoreError::Timeout)) | Err(_) => return Err(ReconcileError::Timeout),
            Ok(Err(e)) => return Err(ReconcileError::Fetch(e)),
        };
        Ok(Self::new(remote, workspace, timeout))
    }

    pub fn workspace(&self) -> SharedWorkspace {
        Arc::clone(&self.workspace)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.notifications.subscribe()
    }

    pub fn snapshot(&self) -> Vec<Segment> {
        self.lock().snapshot()
    }

    /// `true` while a remote mutation is outstanding.
    pub fn is_busy(&self) -> bool {
        self.in_flight.try_lock().is_err()
    }

    // -----------------------------------------------------------------------
    // Reorder / delete
    // -----------------------------------------------------------------------

    /// Swap the segments at `from` and `to` and save the new order.
    pub async fn reorder(&self, from: usize, to: usize) -> Result<(), ReconcileError> {
        let _flight = self.begin()?;

        let (id, before, order) = {
            let mut ws = self.lock();
            let store = ws.segments();
            let reorderable = |i: usize| store.get(i).is_some_and(|s| !s.is_pending());
            if !reorderable(from) || !reorderable(to) {
                let len = store.len();
                return Err(self.fail(ReconcileError::InvalidReorderRange { from, to, len }));
            }
            if from == to {
                return Ok(());
            }
            let before = ws.snapshot();
            if let Err(e) = ws.swap(from, to) {
                return Err(self.fail(ReconcileError::InvalidReorderRange { from, to, len: e.len }));
            }
            (ws.id().clone(), before, ws.segments().persisted_ids())
        };

        match self.call(self.remote.reorder_segments(&id, &order)).await {
            Ok(()) => {
                log::info!("reconcile: moved segment {from} ↔ {to} in {id}");
                self.notify(Notification::Reordered { from, to });
                Ok(())
            }
            Err(e) => {
                log::warn!("reconcile: reorder of {id} rejected: {e}");
                self.rollback(&id, before).await;
                Err(self.fail(ReconcileError::ReorderFailed(e)))
            }
        }
    }

    /// Remove the stored segment `segment` and confirm with the server.
    pub async fn delete(&self, segment: &SegmentId) -> Result<(), ReconcileError> {
        let _flight = self.begin()?;

        let (id, before) = {
            let mut ws = self.lock();
            let before = ws.snapshot();
            if ws.remove_persisted(segment).is_none() {
                return Err(self.fail(ReconcileError::NotFound(format!("segment {segment}"))));
            }
            (ws.id().clone(), before)
        };

        match self.call(self.remote.delete_segment(&id, segment)).await {
            Ok(()) => {
                log::info!("reconcile: deleted segment {segment} from {id}");
                self.notify(Notification::Deleted(segment.clone()));
                Ok(())
            }
            Err(e) => {
                log::warn!("reconcile: delete of {segment} rejected: {e}");
                self.rollback(&id, before).await;
                Err(self.fail(ReconcileError::DeleteFailed(e)))
            }
        }
    }

    /// Re-establish the remote state after a failed optimistic change.
    async fn rollback(&self, id: &EntityId, before: Vec<Segment>) {
        match self.call(self.remote.fetch_audio(id)).await {
            Ok(entity) => self.lock().apply_remote(entity),
            Err(e) => {
                log::warn!("reconcile: refetch of {id} failed ({e}); restoring previous order");
                self.lock().restore(before);
            }
        }
        self.notify(Notification::RolledBack);
    }

    /// Replace local state with a fresh fetch.
    pub async fn reload(&self) -> Result<(), ReconcileError> {
        let _flight = self.begin()?;
        let id = self.entity_id();
        match self.call(self.remote.fetch_audio(&id)).await {
            Ok(entity) => {
                self.lock().apply_remote(entity);
                self.notify(Notification::Reloaded);
                Ok(())
            }
            Err(StoreError::NotFound(what)) => Err(self.fail(ReconcileError::NotFound(what))),
            Err(StoreError::Timeout) => Err(self.fail(ReconcileError::Timeout)),
            Err(e) => Err(self.fail(ReconcileError::Fetch(e))),
        }
    }

    // -----------------------------------------------------------------------
    // Pending segments
    // -----------------------------------------------------------------------

    /// Show a new recording or selected file immediately, before saving it.
    pub fn add_pending(&self, blob: Blob, preview_url: String, provenance: Provenance) -> Uuid {
        let local_id = self.lock().add_pending(blob, preview_url, provenance);
        self.notify(Notification::PendingAdded(local_id));
        local_id
    }

    /// Like [`add_pending`](Self::add_pending), creating the preview URL.
    pub fn add_blob(&self, blob: Blob, provenance: Provenance) -> Uuid {
        let local_id = self.lock().add_blob(blob, provenance);
        self.notify(Notification::PendingAdded(local_id));
        local_id
    }

    /// Forget an unsaved segment without contacting the server.
    pub fn discard_pending(&self, local_id: Uuid) -> Result<(), ReconcileError> {
        if self.lock().discard_pending(local_id).is_none() {
            return Err(self.fail(ReconcileError::NotFound(format!("pending segment {local_id}"))));
        }
        self.notify(Notification::PendingDiscarded(local_id));
        Ok(())
    }

    /// Upload one pending segment and swap it in place for the stored one.
    pub async fn persist_pending(&self, local_id: Uuid) -> Result<SegmentId, ReconcileError> {
        let _flight = self.begin()?;
        let payload = {
            let ws = self.lock();
            let segment = ws
                .segments()
                .position_of_local(local_id)
                .and_then(|i| ws.segments().get(i));
            match segment.and_then(|s| payload_for(local_id, s)) {
                Some(payload) => payload,
                None => {
                    return Err(self.fail(ReconcileError::NotFound(format!(
                        "pending segment {local_id}"
                    ))))
                }
            }
        };
        let mut ids = self.upload(vec![(local_id, payload)]).await?;
        ids.pop()
            .ok_or_else(|| self.fail(ReconcileError::UploadFailed(StoreError::Parse("no segment returned".into()))))
    }

    /// Upload every pending segment in one request. Returns the new ids in
    /// playlist order.
    pub async fn persist_all_pending(&self) -> Result<Vec<SegmentId>, ReconcileError> {
        let _flight = self.begin()?;
        let batch: Vec<(Uuid, UploadPayload)> = {
            let ws = self.lock();
            ws.segments()
                .pending()
                .filter_map(|s| {
                    let local_id = s.local_id()?;
                    Some((local_id, payload_for(local_id, s)?))
                })
                .collect()
        };
        if batch.is_empty() {
            return Ok(Vec::new());
        }
        self.upload(batch).await
    }

    async fn upload(&self, batch: Vec<(Uuid, UploadPayload)>) -> Result<Vec<SegmentId>, ReconcileError> {
        let id = self.entity_id();
        let (local_ids, payloads): (Vec<Uuid>, Vec<UploadPayload>) = batch.into_iter().unzip();

        let created = match self.call(self.remote.upload_segments(&id, &payloads)).await {
            Ok(created) => created,
            Err(e) => {
                log::warn!("reconcile: upload of {} segment(s) to {id} failed: {e}", payloads.len());
                return Err(self.fail(ReconcileError::UploadFailed(e)));
            }
        };

        let mut ids = Vec::with_capacity(created.len());
        {
            let mut ws = self.lock();
            for (local_id, segment) in local_ids.iter().zip(created) {
                if let Some(remote_id) = segment.remote_id() {
                    ids.push(remote_id.clone());
                }
                ws.mark_persisted(*local_id, segment);
            }
        }
        for (local_id, remote_id) in local_ids.into_iter().zip(ids.iter().cloned()) {
            self.notify(Notification::Persisted {
                local_id,
                id: remote_id,
            });
        }
        log::info!("reconcile: saved {} segment(s) to {id}", ids.len());
        Ok(ids)
    }

    // -----------------------------------------------------------------------
    // Metadata / publish
    // -----------------------------------------------------------------------

    pub async fn update_metadata(&self, update: MetadataUpdate) -> Result<(), ReconcileError> {
        if update.title.as_deref().is_some_and(|t| t.trim().is_empty()) {
            return Err(self.fail(ReconcileError::ValidationError("title must not be empty".into())));
        }
        if update.is_empty() {
            return Ok(());
        }

        let _flight = self.begin()?;
        let id = self.entity_id();
        match self.call(self.remote.update_metadata(&id, &update)).await {
            Ok(entity) => {
                self.lock().apply_metadata(entity.metadata, entity.status);
                log::info!("reconcile: saved details of {id}");
                self.notify(Notification::MetadataSaved);
                Ok(())
            }
            Err(StoreError::Validation(msg)) => Err(self.fail(ReconcileError::ValidationError(msg))),
            Err(StoreError::NotFound(what)) => Err(self.fail(ReconcileError::NotFound(what))),
            Err(StoreError::Timeout) => Err(self.fail(ReconcileError::Timeout)),
            Err(e) => Err(self.fail(ReconcileError::ValidationError(e.to_string()))),
        }
    }

    /// Ask the server to publish, optionally merging all tracks into one.
    /// Confirmation is the caller's job.
    pub async fn publish(&self, merge: bool) -> Result<(), ReconcileError> {
        let _flight = self.begin()?;
        let id = self.entity_id();
        match self.call(self.remote.publish(&id, merge)).await {
            Ok(mut entity) => {
                entity.status = AudioStatus::Published;
                self.lock().apply_remote(entity);
                log::info!("reconcile: published {id} (merge: {merge})");
                self.notify(Notification::Published { merge });
                Ok(())
            }
            Err(StoreError::MergeFailed(msg)) => Err(self.fail(ReconcileError::MergeFailed(msg))),
            Err(StoreError::NotFound(what)) => Err(self.fail(ReconcileError::NotFound(what))),
            Err(StoreError::Timeout) => Err(self.fail(ReconcileError::Timeout)),
            Err(e) => Err(self.fail(ReconcileError::MergeFailed(e.to_string()))),
        }
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    fn begin(&self) -> Result<FlightGuard<'_, ()>, ReconcileError> {
        self.in_flight.try_lock().map_err(|_| {
            log::debug!("reconcile: rejected, another change is in flight");
            ReconcileError::Busy
        })
    }

    async fn call<T>(&self, request: impl Future<Output = Result<T, StoreError>>) -> Result<T, StoreError> {
        match tokio::time::timeout(self.timeout, request).await {
            Ok(result) => result,
            Err(_) => {
                log::warn!("reconcile: remote call timed out after {:?}", self.timeout);
                Err(StoreError::Timeout)
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, Workspace> {
        self.workspace.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn entity_id(&self) -> EntityId {
        self.lock().id().clone()
    }

    fn notify(&self, notification: Notification) {
        let _ = self.notifications.send(notification);
    }

    fn fail(&self, error: ReconcileError) -> ReconcileError {
        self.notify(Notification::Failed(error.clone()));
        error
    }
}

fn payload_for(local_id: Uuid, segment: &Segment) -> Option<UploadPayload> {
    match &segment.source {
        SegmentSource::Pending { blob, .. } => Some(UploadPayload::new(
            &format!("segment-{local_id}"),
            blob.clone(),
            segment.provenance,
        )),
        SegmentSource::Persisted { .. } => None,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
