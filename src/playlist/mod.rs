//! Playlist sequencing over an audio entity's main track and segments.
//!
//! [`PlaylistSequencer`] owns the [`PlaybackCursor`] and drives a
//! [`MediaPlayer`]; it never touches the segment store directly; callers
//! hand it fresh snapshots through `reset_sources` / `refresh_sources`.

pub mod player;
pub mod sequencer;

pub use player::{MediaError, MediaPlayer, SilentPlayer};
pub use sequencer::{
    EntryKind, PlaybackCursor, PlaybackEvent, PlaybackState, PlaylistEntry, PlaylistError,
    PlaylistSequencer,
};
