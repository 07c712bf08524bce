//! Per-entity editing workspace: everything the UI renders for one audio
//! entity, kept consistent in one place.
//!
//! The workspace owns the [`SegmentStore`] and the [`PlaylistSequencer`] and
//! makes sure the sequencer's source list is rebuilt after every change to
//! the segment list:
//!
//! | Change | Sequencer |
//! |---|---|
//! | append pending, pending → persisted | `refresh_sources` (playback continues) |
//! | swap, remove, rollback, remote reload | `reset_sources` (stop, index 0, Idle) |

use uuid::Uuid;

use crate::config::PlaybackConfig;
use crate::playlist::{MediaPlayer, PlaylistSequencer};
use crate::recorder::{Blob, PreviewUrls};
use crate::remote::{RemoteStore, StoreError};
use crate::segment::{
    AudioEntity, AudioMetadata, AudioStatus, EntityId, IndexOutOfRange, MainTrack, Provenance,
    Segment, SegmentId, SegmentSource, SegmentStore,
};

pub struct Workspace {
    id: EntityId,
    metadata: AudioMetadata,
    status: AudioStatus,
    main_track: MainTrack,
    segments: SegmentStore,
    sequencer: PlaylistSequencer,
    previews: PreviewUrls,
}

impl Workspace {
    pub fn new(
        entity: AudioEntity,
        player: Box<dyn MediaPlayer>,
        previews: PreviewUrls,
        playback: &PlaybackConfig,
    ) -> Self {
        let segments = SegmentStore::from_segments(entity.segments);
        let sequencer = PlaylistSequencer::new(
            player,
            entity.main_track.url.clone(),
            &segments.snapshot(),
            playback.autoplay_next,
        );
        Self {
            id: entity.id,
            metadata: entity.metadata,
            status: entity.status,
            main_track: entity.main_track,
            segments,
            sequencer,
            previews,
        }
    }

    /// Fetch `id` from the remote store and build a workspace around it.
    pub async fn load(
        remote: &dyn RemoteStore,
        id: &EntityId,
        player: Box<dyn MediaPlayer>,
        previews: PreviewUrls,
        playback: &PlaybackConfig,
    ) -> Result<Self, StoreError> {
        let entity = remote.fetch_audio(id).await?;
        log::info!(
            "reconcile: loaded {id} ({} segments, {})",
            entity.segments.len(),
            entity.status.label()
        );
        Ok(Self::new(entity, player, previews, playback))
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn id(&self) -> &EntityId {
        &self.id
    }

    pub fn metadata(&self) -> &AudioMetadata {
        &self.metadata
    }

    pub fn status(&self) -> AudioStatus {
        self.status
    }

    pub fn main_track(&self) -> &MainTrack {
        &self.main_track
    }

    pub fn segments(&self) -> &SegmentStore {
        &self.segments
    }

    pub fn snapshot(&self) -> Vec<Segment> {
        self.segments.snapshot()
    }

    pub fn sequencer(&self) -> &PlaylistSequencer {
        &self.sequencer
    }

    /// Playback commands and media events go straight to the sequencer.
    pub fn sequencer_mut(&mut self) -> &mut PlaylistSequencer {
        &mut self.sequencer
    }

    pub fn previews(&self) -> &PreviewUrls {
        &self.previews
    }

    // -----------------------------------------------------------------------
    // Local-only changes
    // -----------------------------------------------------------------------

    /// Append a pending segment whose preview URL already exists.
    pub fn add_pending(&mut self, blob: Blob, preview_url: String, provenance: Provenance) -> Uuid {
        let segment = Segment::pending(blob, preview_url, provenance);
        let local_id = segment.local_id().unwrap_or_else(Uuid::nil);
        let index = self.segments.append(segment);
        self.sequencer.refresh_sources(&self.segments.snapshot());
        log::debug!("reconcile: pending segment {local_id} at {index}");
        local_id
    }

    /// Append a pending segment for `blob`, creating its preview URL.
    pub fn add_blob(&mut self, blob: Blob, provenance: Provenance) -> Uuid {
        let preview_url = self.previews.create(&blob);
        self.add_pending(blob, preview_url, provenance)
    }

    /// Drop a pending segment and revoke its preview URL.
    pub fn discard_pending(&mut self, local_id: Uuid) -> Option<Segment> {
        let index = self.segments.position_of_local(local_id)?;
        let removed = self.segments.remove(index).ok()?;
        self.revoke_preview(&removed);
        self.sequencer.reset_sources(&self.segments.snapshot());
        Some(removed)
    }

    // -----------------------------------------------------------------------
    // Changes driven by the controller
    // -----------------------------------------------------------------------

    pub(crate) fn swap(&mut self, a: usize, b: usize) -> Result<(), IndexOutOfRange> {
        self.segments.swap(a, b)?;
        self.sequencer.reset_sources(&self.segments.snapshot());
        Ok(())
    }

    pub(crate) fn remove_persisted(&mut self, id: &SegmentId) -> Option<Segment> {
        let index = self.segments.position_of_remote(id)?;
        let removed = self.segments.remove(index).ok()?;
        self.sequencer.reset_sources(&self.segments.snapshot());
        Some(removed)
    }

    /// Swap the pending segment `local_id` for its stored counterpart at the
    /// same position. If it was discarded meanwhile, the stored segment is
    /// appended so the list still mirrors the server.
    pub(crate) fn mark_persisted(&mut self, local_id: Uuid, persisted: Segment) {
        match self.segments.position_of_local(local_id) {
            Some(index) => {
                if let Ok(old) = self.segments.replace_at(index, persisted) {
                    self.revoke_preview(&old);
                }
            }
            None => {
                log::warn!("reconcile: segment {local_id} was discarded during upload; keeping the stored copy");
                self.segments.append(persisted);
            }
        }
        self.sequencer.refresh_sources(&self.segments.snapshot());
    }

    /// Adopt the authoritative remote state. Pending segments are not known
    /// remotely and stay at the end of the list.
    pub(crate) fn apply_remote(&mut self, entity: AudioEntity) {
        let pending: Vec<Segment> = self.segments.pending().cloned().collect();
        let mut segments = entity.segments;
        segments.extend(pending);
        self.segments.replace_all(segments);

        self.metadata = entity.metadata;
        self.status = entity.status;
        if entity.main_track != self.main_track {
            self.main_track = entity.main_track;
            self.sequencer
                .reset_main(self.main_track.url.clone(), &self.segments.snapshot());
        } else {
            self.sequencer.reset_sources(&self.segments.snapshot());
        }
    }

    pub(crate) fn apply_metadata(&mut self, metadata: AudioMetadata, status: AudioStatus) {
        self.metadata = metadata;
        self.status = status;
    }

    /// Put back the stored segments of a snapshot taken before an optimistic
    /// change. Pending segments are taken from the current list, not the
    /// snapshot, and go to the end as in [`apply_remote`](Self::apply_remote).
    pub(crate) fn restore(&mut self, before: Vec<Segment>) {
        let pending: Vec<Segment> = self.segments.pending().cloned().collect();
        let mut segments: Vec<Segment> = before.into_iter().filter(|s| !s.is_pending()).collect();
        segments.extend(pending);
        self.segments.replace_all(segments);
        self.sequencer.reset_sources(&self.segments.snapshot());
    }

    fn revoke_preview(&self, segment: &Segment) {
        if let SegmentSource::Pending { preview_url, .. } = &segment.source {
            self.previews.revoke(preview_url);
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::playlist::player::testing::ScriptedPlayer;
    use crate::playlist::PlaybackState;
    use crate::recorder::MimeType;
    use crate::remote::mock::entity;

    fn workspace(ids: &[&str]) -> Workspace {
        Workspace::new(
            entity("a1", ids),
            Box::new(ScriptedPlayer::default()),
            PreviewUrls::new(),
            &PlaybackConfig::default(),
        )
    }

    fn wav(bytes: &[u8]) -> Blob {
        Blob::new(bytes.to_vec(), MimeType::named("audio/wav"))
    }

    fn remote_ids(ws: &Workspace) -> Vec<String> {
        ws.segments()
            .persisted_ids()
            .into_iter()
            .map(|id| id.0)
            .collect()
    }

    #[test]
    fn new_builds_playlist_from_entity() {
        let ws = workspace(&["s1", "s2"]);
        assert_eq!(ws.id(), &EntityId::from("a1"));
        assert_eq!(ws.sequencer().sources().len(), 3);
        assert_eq!(ws.sequencer().sources()[0].url, "http://cdn/a1/main");
    }

    #[test]
    fn pending_is_visible_and_playback_continues() {
        let mut ws = workspace(&["s1"]);
        ws.sequencer_mut().play_at(1).unwrap();

        let local = ws.add_blob(wav(&[1, 2]), Provenance::Recorded);

        let last = ws.segments().get(1).unwrap();
        assert_eq!(last.local_id(), Some(local));
        assert!(PreviewUrls::is_preview_url(last.playable_url()));
        assert_eq!(ws.sequencer().sources().len(), 3);
        assert_eq!(ws.sequencer().state(), PlaybackState::Playing);
        assert_eq!(ws.sequencer().cursor().index, 1);
    }

    #[test]
    fn discard_revokes_preview() {
        let mut ws = workspace(&["s1"]);
        let local = ws.add_blob(wav(&[1]), Provenance::Uploaded);
        assert_eq!(ws.previews().live(), 1);

        let removed = ws.discard_pending(local).unwrap();
        assert!(removed.is_pending());
        assert_eq!(ws.previews().live(), 0);
        assert_eq!(ws.segments().len(), 1);
        assert!(ws.discard_pending(local).is_none());
    }

    #[test]
    fn mark_persisted_keeps_position() {
        let mut ws = workspace(&["s1"]);
        let local = ws.add_blob(wav(&[1]), Provenance::Recorded);
        ws.add_blob(wav(&[2]), Provenance::Recorded);

        ws.mark_persisted(
            local,
            Segment::persisted("s9".into(), "http://cdn/s9", Provenance::Recorded),
        );

        assert_eq!(ws.segments().position_of_remote(&"s9".into()), Some(1));
        assert_eq!(ws.segments().get(1).unwrap().order, 1);
        assert_eq!(ws.previews().live(), 1);
        assert_eq!(ws.sequencer().sources()[2].url, "http://cdn/s9");
    }

    #[test]
    fn apply_remote_keeps_pending_at_end() {
        let mut ws = workspace(&["s1", "s2"]);
        let local = ws.add_blob(wav(&[1]), Provenance::Recorded);
        ws.sequencer_mut().play_at(2).unwrap();

        ws.apply_remote(entity("a1", &["s2", "s1"]));

        assert_eq!(remote_ids(&ws), vec!["s2", "s1"]);
        assert_eq!(ws.segments().get(2).unwrap().local_id(), Some(local));
        assert_eq!(ws.sequencer().state(), PlaybackState::Idle);
        assert_eq!(ws.sequencer().cursor().index, 0);
    }

    #[test]
    fn apply_remote_switches_main_track() {
        let mut ws = workspace(&["s1"]);
        let mut merged = entity("a1", &[]);
        merged.main_track.url = "http://cdn/a1/merged".into();

        ws.apply_remote(merged);

        assert_eq!(ws.main_track().url, "http://cdn/a1/merged");
        assert_eq!(ws.sequencer().sources().len(), 1);
        assert_eq!(ws.sequencer().sources()[0].url, "http://cdn/a1/merged");
    }

    #[test]
    fn restore_keeps_pending_added_later() {
        let mut ws = workspace(&["s1", "s2"]);
        let before = ws.snapshot();
        ws.swap(0, 1).unwrap();
        let local = ws.add_blob(wav(&[3]), Provenance::Recorded);

        ws.restore(before);

        assert_eq!(remote_ids(&ws), vec!["s1", "s2"]);
        assert_eq!(ws.segments().get(2).unwrap().local_id(), Some(local));
    }

    #[test]
    fn restore_drops_pending_discarded_since_snapshot() {
        let mut ws = workspace(&["s1", "s2"]);
        let kept = ws.add_blob(wav(&[1]), Provenance::Recorded);
        let gone = ws.add_blob(wav(&[2]), Provenance::Recorded);
        let before = ws.snapshot();
        ws.swap(0, 1).unwrap();
        ws.discard_pending(gone).unwrap();

        ws.restore(before);

        assert_eq!(remote_ids(&ws), vec!["s1", "s2"]);
        assert_eq!(ws.segments().len(), 3);
        assert_eq!(ws.segments().position_of_local(kept), Some(2));
        assert_eq!(ws.segments().position_of_local(gone), None);
        assert_eq!(ws.previews().live(), 1);
        assert_eq!(ws.sequencer().sources().len(), 4);
    }
}
