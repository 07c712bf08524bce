//! Recording lifecycle on top of a pluggable capture backend.
//!
//! ```text
//! start() ──acquire mic──▶ RecordingSession
//!    tick() every chunk interval ──▶ chunk appended, elapsed += interval
//! stop()  ──last chunk, release mic, finalize──▶ FinishedRecording (+ preview URL)
//! discard() ──release mic, revoke preview──▶ nothing emitted
//! ```
//!
//! The microphone is held by at most one session; a second `start()` while a
//! session is active fails with [`RecorderError::Busy`].

use std::time::Duration;

use thiserror::Error;

use crate::config::RecorderConfig;

use super::blob::{negotiate_mime, Blob, MimeType, PreviewUrls};

// ---------------------------------------------------------------------------
// RecorderError
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecorderError {
    #[error("microphone access was denied: {0}")]
    PermissionDenied(String),

    #[error("no audio capture device is available: {0}")]
    DeviceUnavailable(String),

    #[error("a recording is already in progress")]
    Busy,

    #[error("no recording is in progress")]
    NotRecording,

    #[error("failed to encode recording: {0}")]
    Encode(String),

    #[error("audio backend error: {0}")]
    Backend(String),
}

// ---------------------------------------------------------------------------
// Capture seams
// ---------------------------------------------------------------------------

/// An acquired microphone stream.
pub trait CaptureDevice {
    /// Hand over the audio captured since the previous call (may be empty).
    fn take_chunk(&mut self) -> Result<Vec<u8>, RecorderError>;

    /// Assemble collected chunks into one payload of the negotiated type.
    fn finalize(&self, chunks: Vec<Vec<u8>>) -> Result<Vec<u8>, RecorderError> {
        Ok(chunks.concat())
    }

    /// Stop the hardware stream. Must be idempotent.
    fn release(&mut self);
}

/// Source of [`CaptureDevice`]s.
pub trait CaptureBackend {
    fn is_type_supported(&self, mime: &str) -> bool;

    /// Request microphone access and begin capturing in `mime`.
    fn acquire(&self, mime: &MimeType) -> Result<Box<dyn CaptureDevice>, RecorderError>;
}

// ---------------------------------------------------------------------------
// RecordingSession
// ---------------------------------------------------------------------------

/// Chunks and elapsed time of one in-progress recording.
pub struct RecordingSession {
    device: Box<dyn CaptureDevice>,
    mime: MimeType,
    chunks: Vec<Vec<u8>>,
    elapsed: Duration,
}

impl RecordingSession {
    fn new(device: Box<dyn CaptureDevice>, mime: MimeType) -> Self {
        Self {
            device,
            mime,
            chunks: Vec::new(),
            elapsed: Duration::ZERO,
        }
    }

    fn collect(&mut self) -> Result<(), RecorderError> {
        let chunk = self.device.take_chunk()?;
        if !chunk.is_empty() {
            self.chunks.push(chunk);
        }
        Ok(())
    }

    pub fn mime(&self) -> &MimeType {
        &self.mime
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }
}

impl Drop for RecordingSession {
    fn drop(&mut self) {
        self.device.release();
    }
}

// ---------------------------------------------------------------------------
// FinishedRecording
// ---------------------------------------------------------------------------

/// Output of [`Recorder::stop`].
#[derive(Debug, Clone, PartialEq)]
pub struct FinishedRecording {
    pub blob: Blob,
    pub preview_url: String,
    pub elapsed: Duration,
}

// ---------------------------------------------------------------------------
// Recorder
// ---------------------------------------------------------------------------

pub struct Recorder<B: CaptureBackend> {
    backend: B,
    config: RecorderConfig,
    previews: PreviewUrls,
    session: Option<RecordingSession>,
    clip: Option<FinishedRecording>,
}

impl<B: CaptureBackend> Recorder<B> {
    pub fn new(backend: B, config: RecorderConfig, previews: PreviewUrls) -> Self {
        Self {
            backend,
            config,
            previews,
            session: None,
            clip: None,
        }
    }

    /// Acquire the microphone and begin a new session.
    ///
    /// A previously finished clip that was never taken is discarded.
    pub fn start(&mut self) -> Result<(), RecorderError> {
        if self.session.is_some() {
            return Err(RecorderError::Busy);
        }
        self.drop_clip();

        let mime = negotiate_mime(&self.config.mime_candidates, |m| {
            self.backend.is_type_supported(m)
        });
        let device = self.backend.acquire(&mime).map_err(|e| {
            log::warn!("recorder: could not start: {e}");
            e
        })?;

        log::info!("recorder: started ({mime})");
        self.session = Some(RecordingSession::new(device, mime));
        Ok(())
    }

    /// Collect one chunk and advance the elapsed counter by one interval.
    ///
    /// Ticks beyond `max_recording_secs` are ignored.
    pub fn tick(&mut self) -> Result<Duration, RecorderError> {
        let interval = self.config.chunk_interval();
        let limit = Duration::from_secs(self.config.max_recording_secs);
        let session = self.session.as_mut().ok_or(RecorderError::NotRecording)?;

        if session.elapsed >= limit {
            return Ok(session.elapsed);
        }
        session.collect()?;
        session.elapsed += interval;
        Ok(session.elapsed)
    }

    /// Finalize the session into one blob and release the microphone.
    pub fn stop(&mut self) -> Result<FinishedRecording, RecorderError> {
        let mut session = self.session.take().ok_or(RecorderError::NotRecording)?;

        if let Err(e) = session.collect() {
            log::warn!("recorder: final chunk lost: {e}");
        }
        session.device.release();

        let chunks = std::mem::take(&mut session.chunks);
        let bytes = session.device.finalize(chunks)?;
        let blob = Blob::new(bytes, session.mime.clone());
        let preview_url = self.previews.create(&blob);

        let clip = FinishedRecording {
            blob,
            preview_url,
            elapsed: session.elapsed,
        };
        log::info!(
            "recorder: stopped after {:.1}s ({} bytes, {})",
            clip.elapsed.as_secs_f64(),
            clip.blob.len(),
            clip.blob.mime()
        );
        self.clip = Some(clip.clone());
        Ok(clip)
    }

    /// Abandon the active session and/or the finished clip.
    pub fn discard(&mut self) {
        if self.session.take().is_some() {
            log::info!("recorder: session discarded");
        }
        self.drop_clip();
    }

    /// Hand the finished clip (and its preview URL) over to the caller.
    pub fn take_clip(&mut self) -> Option<FinishedRecording> {
        self.clip.take()
    }

    pub fn clip(&self) -> Option<&FinishedRecording> {
        self.clip.as_ref()
    }

    pub fn is_recording(&self) -> bool {
        self.session.is_some()
    }

    pub fn session(&self) -> Option<&RecordingSession> {
        self.session.as_ref()
    }

    pub fn elapsed(&self) -> Duration {
        self.session
            .as_ref()
            .map(RecordingSession::elapsed)
            .unwrap_or(Duration::ZERO)
    }

    pub fn chunk_interval(&self) -> Duration {
        self.config.chunk_interval()
    }

    fn drop_clip(&mut self) {
        if let Some(clip) = self.clip.take() {
            self.previews.revoke(&clip.preview_url);
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Default)]
    struct DeviceUsage {
        acquired: usize,
        released: usize,
        live: bool,
    }

    struct FakeDevice {
        usage: Rc<RefCell<DeviceUsage>>,
        next: u8,
    }

    impl CaptureDevice for FakeDevice {
        fn take_chunk(&mut self) -> Result<Vec<u8>, RecorderError> {
            self.next += 1;
            Ok(vec![self.next; 4])
        }

        fn release(&mut self) {
            let mut usage = self.usage.borrow_mut();
            if usage.live {
                usage.live = false;
                usage.released += 1;
            }
        }
    }

    struct FakeBackend {
        usage: Rc<RefCell<DeviceUsage>>,
        supported: Vec<&'static str>,
        fail: Option<RecorderError>,
    }

    impl FakeBackend {
        fn new(supported: Vec<&'static str>) -> Self {
            Self {
                usage: Rc::default(),
                supported,
                fail: None,
            }
        }
    }

    impl CaptureBackend for FakeBackend {
        fn is_type_supported(&self, mime: &str) -> bool {
            self.supported.contains(&mime)
        }

        fn acquire(&self, _mime: &MimeType) -> Result<Box<dyn CaptureDevice>, RecorderError> {
            if let Some(e) = &self.fail {
                return Err(e.clone());
            }
            let mut usage = self.usage.borrow_mut();
            usage.acquired += 1;
            usage.live = true;
            Ok(Box::new(FakeDevice {
                usage: Rc::clone(&self.usage),
                next: 0,
            }))
        }
    }

    fn recorder(backend: FakeBackend) -> (Recorder<FakeBackend>, PreviewUrls) {
        let previews = PreviewUrls::new();
        let rec = Recorder::new(backend, RecorderConfig::default(), previews.clone());
        (rec, previews)
    }

    #[test]
    fn three_ticks_produce_one_blob_and_release_the_mic() {
        let backend = FakeBackend::new(vec!["audio/webm;codecs=opus"]);
        let usage = Rc::clone(&backend.usage);
        let (mut rec, previews) = recorder(backend);

        rec.start().unwrap();
        for _ in 0..3 {
            rec.tick().unwrap();
        }
        let clip = rec.stop().unwrap();

        assert_eq!(clip.elapsed, Duration::from_secs(3));
        assert_eq!(clip.blob.mime(), &MimeType::named("audio/webm;codecs=opus"));
        // three ticks + the flush on stop
        assert_eq!(clip.blob.len(), 16);
        assert_eq!(previews.resolve(&clip.preview_url), Some(clip.blob.clone()));
        assert!(!rec.is_recording());

        let usage = usage.borrow();
        assert_eq!(usage.acquired, 1);
        assert_eq!(usage.released, 1);
        assert!(!usage.live);
    }

    #[test]
    fn falls_back_to_unspecified_mime() {
        let (mut rec, _) = recorder(FakeBackend::new(vec![]));
        rec.start().unwrap();
        assert_eq!(rec.session().unwrap().mime(), &MimeType::Unspecified);
    }

    #[test]
    fn permission_denied_leaves_nothing_active() {
        let mut backend = FakeBackend::new(vec!["audio/wav"]);
        backend.fail = Some(RecorderError::PermissionDenied("user said no".into()));
        let (mut rec, _) = recorder(backend);

        assert!(matches!(rec.start(), Err(RecorderError::PermissionDenied(_))));
        assert!(!rec.is_recording());
        assert_eq!(rec.tick(), Err(RecorderError::NotRecording));
    }

    #[test]
    fn second_start_while_recording_is_busy() {
        let (mut rec, _) = recorder(FakeBackend::new(vec!["audio/wav"]));
        rec.start().unwrap();
        assert_eq!(rec.start(), Err(RecorderError::Busy));
    }

    #[test]
    fn discard_releases_mic_and_emits_nothing() {
        let backend = FakeBackend::new(vec!["audio/wav"]);
        let usage = Rc::clone(&backend.usage);
        let (mut rec, previews) = recorder(backend);

        rec.start().unwrap();
        rec.tick().unwrap();
        rec.discard();

        assert!(!rec.is_recording());
        assert!(rec.clip().is_none());
        assert_eq!(previews.live(), 0);
        assert_eq!(usage.borrow().released, 1);
    }

    #[test]
    fn new_start_revokes_untaken_clip() {
        let (mut rec, previews) = recorder(FakeBackend::new(vec!["audio/wav"]));
        rec.start().unwrap();
        rec.stop().unwrap();
        assert_eq!(previews.live(), 1);

        rec.start().unwrap();
        assert_eq!(previews.live(), 0);
    }

    #[test]
    fn taken_clip_keeps_its_preview() {
        let (mut rec, previews) = recorder(FakeBackend::new(vec!["audio/wav"]));
        rec.start().unwrap();
        rec.stop().unwrap();
        let clip = rec.take_clip().unwrap();

        rec.discard();
        assert!(previews.resolve(&clip.preview_url).is_some());
    }

    #[test]
    fn ticks_past_the_limit_are_ignored() {
        let mut config = RecorderConfig::default();
        config.max_recording_secs = 2;
        let mut rec = Recorder::new(FakeBackend::new(vec![]), config, PreviewUrls::new());

        rec.start().unwrap();
        for _ in 0..5 {
            rec.tick().unwrap();
        }
        assert_eq!(rec.elapsed(), Duration::from_secs(2));
        assert_eq!(rec.session().unwrap().chunk_count(), 2);
    }
}
