//! Recorder adapter: microphone capture → chunks → one finalized blob.
//!
//! # Pipeline
//!
//! ```text
//! CaptureBackend::acquire ─▶ CaptureDevice ─(take_chunk every interval)─▶ RecordingSession
//!                                            └─(stop)─▶ finalize ─▶ Blob + preview URL
//! ```
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use talenta_audio::config::RecorderConfig;
//! use talenta_audio::recorder::{CpalBackend, PreviewUrls, Recorder};
//!
//! let mut recorder = Recorder::new(CpalBackend::new(), RecorderConfig::default(), PreviewUrls::new());
//! recorder.start().unwrap();
//! for _ in 0..3 {
//!     std::thread::sleep(recorder.chunk_interval());
//!     recorder.tick().unwrap();
//! }
//! let clip = recorder.stop().unwrap();
//! println!("{} bytes of {}", clip.blob.len(), clip.blob.mime());
//! ```

pub mod blob;
pub mod capture;
pub mod session;

pub use blob::{negotiate_mime, Blob, MimeType, PreviewUrls};
pub use capture::CpalBackend;
pub use session::{
    CaptureBackend, CaptureDevice, FinishedRecording, Recorder, RecorderError, RecordingSession,
};
