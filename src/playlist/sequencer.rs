//! Playlist sequencer: ordered, gapless playback over
//! `[MainTrack, ...segments]`.
//!
//! # State machine
//!
//! ```text
//! Idle / Paused ──play()──────────▶ Playing      (load failure ─▶ Idle + PlaybackError)
//! Playing ───────pause()──────────▶ Paused
//! Playing ───────on_track_ended()─▶ Ended
//! Ended ── next source exists ────▶ Playing      (start failure ─▶ Idle, index 0 + PlaybackAdvanceError)
//! Ended ── last source ───────────▶ Idle, index 0
//! ```
//!
//! Any structural change to the segment list goes through
//! [`reset_sources`](PlaylistSequencer::reset_sources), which stops playback
//! and puts the cursor back on index 0.

use thiserror::Error;
use tokio::sync::broadcast;

use crate::segment::Segment;

use super::player::{MediaError, MediaPlayer};

// ---------------------------------------------------------------------------
// PlaybackState
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaybackState {
    #[default]
    Idle,
    Playing,
    Paused,
    Ended,
}

impl PlaybackState {
    pub fn label(&self) -> &'static str {
        match self {
            PlaybackState::Idle => "Idle",
            PlaybackState::Playing => "Playing",
            PlaybackState::Paused => "Paused",
            PlaybackState::Ended => "Ended",
        }
    }
}

// ---------------------------------------------------------------------------
// PlaybackCursor
// ---------------------------------------------------------------------------

/// Position within the source list.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PlaybackCursor {
    pub index: usize,
    /// Seconds into the current source.
    pub time: f64,
    /// Duration of the current source once the media element reports it.
    pub duration: Option<f64>,
}

// ---------------------------------------------------------------------------
// PlaylistEntry
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryKind {
    Main,
    Segment { order: usize, pending: bool },
}

/// One playable source in the sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaylistEntry {
    pub url: String,
    pub kind: EntryKind,
}

impl PlaylistEntry {
    fn from_segment(segment: &Segment) -> Self {
        Self {
            url: segment.playable_url().to_string(),
            kind: EntryKind::Segment {
                order: segment.order,
                pending: segment.is_pending(),
            },
        }
    }
}

// ---------------------------------------------------------------------------
// PlaylistError / PlaybackEvent
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlaylistError {
    #[error("could not play track {index}: {reason}")]
    Playback { index: usize, reason: String },

    #[error("could not continue to track {index}: {reason}")]
    PlaybackAdvance { index: usize, reason: String },

    #[error("track {index} does not exist (playlist has {len} tracks)")]
    IndexOutOfRange { index: usize, len: usize },
}

/// Published on every transition so a UI can follow along.
#[derive(Debug, Clone, PartialEq)]
pub enum PlaybackEvent {
    StateChanged(PlaybackState),
    CursorMoved(usize),
    Error(PlaylistError),
}

// ---------------------------------------------------------------------------
// PlaylistSequencer
// ---------------------------------------------------------------------------

pub struct PlaylistSequencer {
    player: Box<dyn MediaPlayer>,
    main_url: String,
    sources: Vec<PlaylistEntry>,
    state: PlaybackState,
    cursor: PlaybackCursor,
    autoplay_next: bool,
    events: broadcast::Sender<PlaybackEvent>,
}

impl PlaylistSequencer {
    pub fn new(
        player: Box<dyn MediaPlayer>,
        main_url: impl Into<String>,
        segments: &[Segment],
        autoplay_next: bool,
    ) -> Self {
        let (events, _) = broadcast::channel(64);
        let main_url = main_url.into();
        Self {
            player,
            sources: build_sources(&main_url, segments),
            main_url,
            state: PlaybackState::Idle,
            cursor: PlaybackCursor::default(),
            autoplay_next,
            events,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PlaybackEvent> {
        self.events.subscribe()
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn cursor(&self) -> PlaybackCursor {
        self.cursor
    }

    /// `[MainTrack, ...segments]`.
    pub fn sources(&self) -> &[PlaylistEntry] {
        &self.sources
    }

    pub fn current(&self) -> Option<&PlaylistEntry> {
        self.sources.get(self.cursor.index)
    }

    // -----------------------------------------------------------------------
    // Commands
    // -----------------------------------------------------------------------

    /// Start or resume playback at the cursor.
    pub fn play(&mut self) -> Result<(), PlaylistError> {
        let index = self.cursor.index;
        let attempt = match self.state {
            PlaybackState::Playing => return Ok(()),
            PlaybackState::Paused => self.player.resume(),
            PlaybackState::Idle | PlaybackState::Ended => {
                let url = match self.sources.get(index) {
                    Some(entry) => entry.url.clone(),
                    None => return Err(self.out_of_range(index)),
                };
                self.cursor.time = 0.0;
                self.player.play_source(&url)
            }
        };

        match attempt {
            Ok(()) => {
                self.set_state(PlaybackState::Playing);
                Ok(())
            }
            Err(MediaError(reason)) => {
                self.player.stop();
                self.set_state(PlaybackState::Idle);
                Err(self.report(PlaylistError::Playback { index, reason }))
            }
        }
    }

    /// Jump to `index` and play it.
    pub fn play_at(&mut self, index: usize) -> Result<(), PlaylistError> {
        if index >= self.sources.len() {
            return Err(self.out_of_range(index));
        }
        if self.state != PlaybackState::Idle {
            self.player.stop();
            self.set_state(PlaybackState::Idle);
        }
        self.move_cursor(index);
        self.play()
    }

    pub fn pause(&mut self) {
        if self.state == PlaybackState::Playing {
            self.player.pause();
            self.set_state(PlaybackState::Paused);
        }
    }

    /// Reposition within the current source, clamped to `[0, duration]`.
    /// Until the duration is reported, seeking cannot go past the current
    /// position.
    pub fn seek(&mut self, secs: f64) -> f64 {
        let upper = self.cursor.duration.unwrap_or(self.cursor.time);
        let target = if secs.is_nan() { 0.0 } else { secs.clamp(0.0, upper) };
        self.cursor.time = target;
        self.player.seek(target);
        target
    }

    /// Stop playback and return to the first source.
    pub fn stop(&mut self) {
        if self.state != PlaybackState::Idle {
            self.player.stop();
        }
        self.set_state(PlaybackState::Idle);
        self.move_cursor(0);
    }

    // -----------------------------------------------------------------------
    // Source list maintenance
    // -----------------------------------------------------------------------

    /// Rebuild the list after a reorder, delete or rollback.
    pub fn reset_sources(&mut self, segments: &[Segment]) {
        self.stop();
        self.sources = build_sources(&self.main_url, segments);
        log::debug!("playlist: sources reset ({} tracks)", self.sources.len());
    }

    /// Like [`reset_sources`](Self::reset_sources), with a new main track
    /// (e.g. the consolidated file produced by a merge).
    pub fn reset_main(&mut self, main_url: impl Into<String>, segments: &[Segment]) {
        self.main_url = main_url.into();
        self.reset_sources(segments);
    }

    /// Pick up appended segments or a pending segment that became persisted.
    /// Positions of existing entries are unchanged, so playback continues.
    pub fn refresh_sources(&mut self, segments: &[Segment]) {
        self.sources = build_sources(&self.main_url, segments);
        if self.cursor.index >= self.sources.len() {
            self.stop();
        }
    }

    // -----------------------------------------------------------------------
    // Media events
    // -----------------------------------------------------------------------

    pub fn on_time_update(&mut self, secs: f64) {
        self.cursor.time = secs.max(0.0);
    }

    pub fn on_duration(&mut self, secs: f64) {
        if secs.is_finite() && secs >= 0.0 {
            self.cursor.duration = Some(secs);
        }
    }

    /// The current source reached its natural end.
    pub fn on_track_ended(&mut self) -> Result<(), PlaylistError> {
        if self.state != PlaybackState::Playing {
            return Ok(());
        }
        self.set_state(PlaybackState::Ended);

        let next = self.cursor.index + 1;
        if !self.autoplay_next || next >= self.sources.len() {
            self.set_state(PlaybackState::Idle);
            self.move_cursor(0);
            return Ok(());
        }

        self.move_cursor(next);
        let url = self.sources[next].url.clone();
        match self.player.play_source(&url) {
            Ok(()) => {
                self.set_state(PlaybackState::Playing);
                Ok(())
            }
            Err(MediaError(reason)) => {
                log::warn!("playlist: could not advance to track {next}: {reason}");
                self.player.stop();
                self.set_state(PlaybackState::Idle);
                self.move_cursor(0);
                Err(self.report(PlaylistError::PlaybackAdvance { index: next, reason }))
            }
        }
    }

    /// The media element failed while playing or loading.
    pub fn on_media_error(&mut self, reason: impl Into<String>) -> PlaylistError {
        let index = self.cursor.index;
        self.player.stop();
        self.set_state(PlaybackState::Idle);
        self.report(PlaylistError::Playback {
            index,
            reason: reason.into(),
        })
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    fn set_state(&mut self, state: PlaybackState) {
        if self.state != state {
            log::debug!("playlist: {} → {}", self.state.label(), state.label());
            self.state = state;
            let _ = self.events.send(PlaybackEvent::StateChanged(state));
        }
    }

    fn move_cursor(&mut self, index: usize) {
        let moved = self.cursor.index != index;
        self.cursor = PlaybackCursor {
            index,
            time: 0.0,
            duration: None,
        };
        if moved {
            let _ = self.events.send(PlaybackEvent::CursorMoved(index));
        }
    }

    fn out_of_range(&self, index: usize) -> PlaylistError {
        PlaylistError::IndexOutOfRange {
            index,
            len: self.sources.len(),
        }
    }

    fn report(&self, error: PlaylistError) -> PlaylistError {
        let _ = self.events.send(PlaybackEvent::Error(error.clone()));
        error
    }
}

fn build_sources(main_url: &str, segments: &[Segment]) -> Vec<PlaylistEntry> {
    std::iter::once(PlaylistEntry {
        url: main_url.to_string(),
        kind: EntryKind::Main,
    })
    .chain(segments.iter().map(PlaylistEntry::from_segment))
    .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
