//! Media element seam used by the sequencer.
//!
//! The sequencer issues commands through [`MediaPlayer`]; asynchronous media
//! events (time updates, duration, natural end, decode errors) are fed back by
//! whoever owns the element via the `on_*` methods of
//! [`PlaylistSequencer`](super::PlaylistSequencer).

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct MediaError(pub String);

impl MediaError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self(reason.into())
    }
}

pub trait MediaPlayer: Send {
    /// Load `url` and start playing it from the beginning.
    fn play_source(&mut self, url: &str) -> Result<(), MediaError>;

    /// Continue the currently loaded source.
    fn resume(&mut self) -> Result<(), MediaError>;

    fn pause(&mut self);

    fn seek(&mut self, secs: f64);

    /// Stop and unload the current source.
    fn stop(&mut self);
}

/// A player that accepts every command and produces no sound.
///
/// Used where playback is driven elsewhere, e.g. the command-line front end
/// that only prints the playlist.
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentPlayer;

impl MediaPlayer for SilentPlayer {
    fn play_source(&mut self, url: &str) -> Result<(), MediaError> {
        log::debug!("playlist: silent player asked to play {url}");
        Ok(())
    }

    fn resume(&mut self) -> Result<(), MediaError> {
        Ok(())
    }

    fn pause(&mut self) {}

    fn seek(&mut self, _secs: f64) {}

    fn stop(&mut self) {}
}

// ---------------------------------------------------------------------------
// ScriptedPlayer  (test-only)
// ---------------------------------------------------------------------------

#[cfg(test)]
pub mod testing {
    use std::sync::{Arc, Mutex};

    use super::{MediaError, MediaPlayer};

    /// Records every command; fails to load any URL in `broken`.
    #[derive(Default)]
    pub struct ScriptedPlayer {
        broken: Vec<String>,
        log: Arc<Mutex<Vec<String>>>,
    }

    impl ScriptedPlayer {
        pub fn failing_on(urls: &[&str]) -> Self {
            Self {
                broken: urls.iter().map(|u| u.to_string()).collect(),
                log: Arc::default(),
            }
        }

        pub fn log(&self) -> Arc<Mutex<Vec<String>>> {
            Arc::clone(&self.log)
        }

        fn push(&self, entry: String) {
            self.log.lock().unwrap().push(entry);
        }
    }

    impl MediaPlayer for ScriptedPlayer {
        fn play_source(&mut self, url: &str) -> Result<(), MediaError> {
            if self.broken.iter().any(|b| b == url) {
                self.push(format!("fail {url}"));
                return Err(MediaError::new(format!("cannot load {url}")));
            }
            self.push(format!("play {url}"));
            Ok(())
        }

        fn resume(&mut self) -> Result<(), MediaError> {
            self.push("resume".into());
            Ok(())
        }

        fn pause(&mut self) {
            self.push("pause".into());
        }

        fn seek(&mut self, secs: f64) {
            self.push(format!("seek {secs}"));
        }

        fn stop(&mut self) {
            self.push("stop".into());
        }
    }
}
