//! Finalized audio payloads, their MIME tags, and local preview URLs.
//!
//! [`PreviewUrls`] plays the role of the browser's object-URL table: a local
//! blob gets a `blob:talenta/<uuid>` URL that the playlist can load until the
//! URL is revoked.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};

use uuid::Uuid;

// ---------------------------------------------------------------------------
// MimeType
// ---------------------------------------------------------------------------

/// Encoding tag attached to a finalized recording.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum MimeType {
    /// A concrete type such as `audio/webm;codecs=opus`.
    Named(String),
    /// No candidate encoding was supported by the capture backend.
    #[default]
    Unspecified,
}

impl MimeType {
    pub fn named(s: impl Into<String>) -> Self {
        MimeType::Named(s.into())
    }

    /// Value for an HTTP `Content-Type` header.
    pub fn content_type(&self) -> &str {
        match self {
            MimeType::Named(s) => s,
            MimeType::Unspecified => "application/octet-stream",
        }
    }

    /// The type without parameters, e.g. `audio/webm` for
    /// `audio/webm;codecs=opus`.
    pub fn essence(&self) -> Option<&str> {
        match self {
            MimeType::Named(s) => Some(s.split(';').next().unwrap_or(s).trim()),
            MimeType::Unspecified => None,
        }
    }

    /// File extension used when a payload is written to disk or uploaded.
    pub fn file_extension(&self) -> &'static str {
        match self.essence() {
            Some("audio/webm") => "webm",
            Some("audio/ogg") => "ogg",
            Some("audio/mp4") => "m4a",
            Some("audio/mpeg") => "mp3",
            Some("audio/wav") | Some("audio/x-wav") | Some("audio/wave") => "wav",
            _ => "bin",
        }
    }

    /// Guess a type from a file name, for files picked from disk.
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_ascii_lowercase().as_str() {
            "webm" => MimeType::named("audio/webm"),
            "ogg" | "opus" => MimeType::named("audio/ogg"),
            "m4a" | "mp4" => MimeType::named("audio/mp4"),
            "mp3" => MimeType::named("audio/mpeg"),
            "wav" => MimeType::named("audio/wav"),
            _ => MimeType::Unspecified,
        }
    }
}

impl fmt::Display for MimeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MimeType::Named(s) => f.write_str(s),
            MimeType::Unspecified => f.write_str("unspecified"),
        }
    }
}

/// Pick the first of `candidates` accepted by `is_supported`.
///
/// ```
/// use talenta_audio::recorder::{negotiate_mime, MimeType};
///
/// let candidates = vec!["audio/webm;codecs=opus".to_string(), "audio/wav".to_string()];
/// assert_eq!(negotiate_mime(&candidates, |m| m == "audio/wav"), MimeType::named("audio/wav"));
/// assert_eq!(negotiate_mime(&candidates, |_| false), MimeType::Unspecified);
/// ```
pub fn negotiate_mime(candidates: &[String], is_supported: impl Fn(&str) -> bool) -> MimeType {
    candidates
        .iter()
        .find(|c| is_supported(c))
        .map(|c| MimeType::Named(c.clone()))
        .unwrap_or(MimeType::Unspecified)
}

// ---------------------------------------------------------------------------
// Blob
// ---------------------------------------------------------------------------

/// Immutable binary payload plus its MIME tag. Cheap to clone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Blob {
    bytes: Arc<[u8]>,
    mime: MimeType,
}

impl Blob {
    pub fn new(bytes: Vec<u8>, mime: MimeType) -> Self {
        Self {
            bytes: bytes.into(),
            mime,
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn mime(&self) -> &MimeType {
        &self.mime
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

// ---------------------------------------------------------------------------
// PreviewUrls
// ---------------------------------------------------------------------------

/// Registry of live preview URLs. Clones share the same table.
#[derive(Debug, Clone, Default)]
pub struct PreviewUrls {
    inner: Arc<Mutex<HashMap<String, Blob>>>,
}

impl PreviewUrls {
    pub const SCHEME: &'static str = "blob:talenta/";

    pub fn new() -> Self {
        Self::default()
    }

    /// Register `blob` and return a URL that resolves to it.
    pub fn create(&self, blob: &Blob) -> String {
        let url = format!("{}{}", Self::SCHEME, Uuid::new_v4());
        self.table().insert(url.clone(), blob.clone());
        url
    }

    /// Forget `url`. Returns `false` when it was not live.
    pub fn revoke(&self, url: &str) -> bool {
        let removed = self.table().remove(url).is_some();
        if removed {
            log::debug!("preview: revoked {url}");
        }
        removed
    }

    pub fn resolve(&self, url: &str) -> Option<Blob> {
        self.table().get(url).cloned()
    }

    /// Number of URLs not yet revoked.
    pub fn live(&self) -> usize {
        self.table().len()
    }

    pub fn is_preview_url(url: &str) -> bool {
        url.starts_with(Self::SCHEME)
    }

    fn table(&self) -> std::sync::MutexGuard<'_, HashMap<String, Blob>> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn essence_strips_parameters() {
        let mime = MimeType::named("audio/webm;codecs=opus");
        assert_eq!(mime.essence(), Some("audio/webm"));
        assert_eq!(mime.file_extension(), "webm");
        assert_eq!(mime.content_type(), "audio/webm;codecs=opus");
    }

    #[test]
    fn unspecified_falls_back_to_octet_stream() {
        let mime = MimeType::Unspecified;
        assert_eq!(mime.content_type(), "application/octet-stream");
        assert_eq!(mime.file_extension(), "bin");
        assert_eq!(mime.to_string(), "unspecified");
    }

    #[test]
    fn negotiation_respects_candidate_order() {
        let candidates: Vec<String> = ["audio/webm;codecs=opus", "audio/webm", "audio/ogg;codecs=opus"]
            .iter()
            .map(|s| s.to_string())
            .collect();

        let picked = negotiate_mime(&candidates, |m| m.starts_with("audio/webm"));
        assert_eq!(picked, MimeType::named("audio/webm;codecs=opus"));

        let picked = negotiate_mime(&candidates, |m| m.starts_with("audio/ogg"));
        assert_eq!(picked, MimeType::named("audio/ogg;codecs=opus"));
    }

    #[test]
    fn extension_guess() {
        assert_eq!(MimeType::from_extension("WAV"), MimeType::named("audio/wav"));
        assert_eq!(MimeType::from_extension("txt"), MimeType::Unspecified);
    }

    #[test]
    fn preview_urls_create_resolve_revoke() {
        let urls = PreviewUrls::new();
        let blob = Blob::new(vec![1, 2, 3], MimeType::named("audio/wav"));

        let url = urls.create(&blob);
        assert!(PreviewUrls::is_preview_url(&url));
        assert_eq!(urls.resolve(&url), Some(blob));
        assert_eq!(urls.live(), 1);

        assert!(urls.revoke(&url));
        assert!(!urls.revoke(&url));
        assert_eq!(urls.live(), 0);
        assert!(urls.resolve(&url).is_none());
    }

    #[test]
    fn clones_share_the_table() {
        let urls = PreviewUrls::new();
        let other = urls.clone();
        let url = urls.create(&Blob::new(vec![0], MimeType::Unspecified));
        assert!(other.revoke(&url));
        assert_eq!(urls.live(), 0);
    }
}
