//! `HttpStore`: [`RemoteStore`] over the JSON/HTTP audio API.
//!
//! | Operation | Request |
//! |---|---|
//! | fetch | `GET    {base}/audio/{id}` |
//! | update metadata | `PUT    {base}/audio/{id}` |
//! | upload segments | `POST   {base}/audio/{id}/segments` (multipart, one `segments` part per file) |
//! | reorder | `PUT    {base}/audio/{id}/segments/reorder` |
//! | delete segment | `DELETE {base}/audio/{id}/segments/{segment}` |
//! | publish | `PATCH  {base}/audio/{id}/publish` |
//!
//! All connection details come from [`ApiConfig`]; the bearer token comes
//! from the injected [`CredentialProvider`] and is attached only when one is
//! available.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{multipart, RequestBuilder, Response, StatusCode};

use crate::config::ApiConfig;
use crate::segment::{AudioEntity, AudioStatus, EntityId, MetadataUpdate, Segment, SegmentId};

use super::credentials::CredentialProvider;
use super::dto::{AudioDto, AudioEnvelope, ErrorBody, PublishRequest, ReorderRequest, SegmentDto, SegmentsEnvelope};
use super::store::{RemoteStore, StoreError, UploadPayload};

// ---------------------------------------------------------------------------
// Operation
// ---------------------------------------------------------------------------

/// Which call failed; decides how a rejection status is classified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Fetch,
    UpdateMetadata,
    Upload,
    Reorder,
    Delete,
    Publish,
}

/// Map a non-success HTTP status to a [`StoreError`].
pub fn classify(op: Operation, status: StatusCode, message: String) -> StoreError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => StoreError::Unauthorized,
        StatusCode::NOT_FOUND => StoreError::NotFound(message),
        StatusCode::CONFLICT => StoreError::Conflict(message),
        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => StoreError::Timeout,
        _ => match op {
            Operation::Upload => StoreError::UploadRejected(message),
            Operation::Publish => StoreError::MergeFailed(message),
            Operation::Reorder if status.is_client_error() => StoreError::Conflict(message),
            _ if status.is_client_error() => StoreError::Validation(message),
            _ => StoreError::Request(format!("server returned {status}: {message}")),
        },
    }
}

// ---------------------------------------------------------------------------
// HttpStore
// ---------------------------------------------------------------------------

pub struct HttpStore {
    client: reqwest::Client,
    base_url: String,
    credentials: Arc<dyn CredentialProvider>,
}

impl HttpStore {
    /// Build an `HttpStore` from application config.
    ///
    /// The client carries the per-request timeout from `config.timeout_secs`;
    /// a default client is used if the builder fails.
    pub fn from_config(config: &ApiConfig, credentials: Arc<dyn CredentialProvider>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            credentials,
        }
    }

    pub fn audio_url(&self, id: &EntityId) -> String {
        format!("{}/audio/{}", self.base_url, id)
    }

    fn segments_url(&self, id: &EntityId) -> String {
        format!("{}/segments", self.audio_url(id))
    }

    fn authorize(&self, req: RequestBuilder) -> RequestBuilder {
        match self.credentials.bearer_token() {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    async fn send(&self, op: Operation, req: RequestBuilder) -> Result<Response, StoreError> {
        let response = self.authorize(req).send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorBody>(&body)
            .ok()
            .and_then(|b| b.message)
            .unwrap_or_else(|| status.canonical_reason().unwrap_or("request failed").to_string());
        log::warn!("remote: {op:?} failed with {status}: {message}");
        Err(classify(op, status, message))
    }

    async fn entity(response: Response) -> Result<AudioEntity, StoreError> {
        let envelope: AudioEnvelope = response
            .json()
            .await
            .map_err(|e| StoreError::Parse(e.to_string()))?;
        Ok(AudioEntity::from(AudioDto::from(envelope)))
    }
}

#[async_trait]
impl RemoteStore for HttpStore {
    async fn fetch_audio(&self, id: &EntityId) -> Result<AudioEntity, StoreError> {
        let response = self
            .send(Operation::Fetch, self.client.get(self.audio_url(id)))
            .await?;
        Self::entity(response).await
    }

    async fn update_metadata(
        &self,
        id: &EntityId,
        update: &MetadataUpdate,
    ) -> Result<AudioEntity, StoreError> {
        let req = self.client.put(self.audio_url(id)).json(update);
        let response = self.send(Operation::UpdateMetadata, req).await?;
        Self::entity(response).await
    }

    async fn upload_segments(
        &self,
        id: &EntityId,
        payloads: &[UploadPayload],
    ) -> Result<Vec<Segment>, StoreError> {
        let mut form = multipart::Form::new();
        for payload in payloads {
            let part = multipart::Part::bytes(payload.blob.bytes().to_vec())
                .file_name(payload.file_name.clone())
                .mime_str(payload.blob.mime().content_type())
                .map_err(|e| StoreError::UploadRejected(e.to_string()))?;
            form = form.part("segments", part);
            let provenance = serde_json::to_value(payload.provenance)
                .ok()
                .and_then(|v| v.as_str().map(str::to_string))
                .unwrap_or_default();
            form = form.text("sources", provenance);
        }

        let req = self.client.post(self.segments_url(id)).multipart(form);
        let response = self.send(Operation::Upload, req).await?;
        let envelope: SegmentsEnvelope = response
            .json()
            .await
            .map_err(|e| StoreError::Parse(e.to_string()))?;

        let created: Vec<SegmentDto> = envelope.into();
        if created.len() != payloads.len() {
            return Err(StoreError::Parse(format!(
                "uploaded {} segments but server returned {}",
                payloads.len(),
                created.len()
            )));
        }
        log::info!("remote: uploaded {} segment(s) to {id}", created.len());
        Ok(created.into_iter().map(Segment::from).collect())
    }

    async fn reorder_segments(&self, id: &EntityId, order: &[SegmentId]) -> Result<(), StoreError> {
        let body = ReorderRequest {
            segment_ids: order.iter().map(|s| s.0.as_str()).collect(),
        };
        let req = self
            .client
            .put(format!("{}/reorder", self.segments_url(id)))
            .json(&body);
        self.send(Operation::Reorder, req).await?;
        Ok(())
    }

    async fn delete_segment(&self, id: &EntityId, segment: &SegmentId) -> Result<(), StoreError> {
        let req = self
            .client
            .delete(format!("{}/{}", self.segments_url(id), segment));
        self.send(Operation::Delete, req).await?;
        Ok(())
    }

    async fn publish(&self, id: &EntityId, merge: bool) -> Result<AudioEntity, StoreError> {
        let body = PublishRequest {
            status: AudioStatus::Published,
            merge,
        };
        let req = self
            .client
            .patch(format!("{}/publish", self.audio_url(id)))
            .json(&body);
        let response = self.send(Operation::Publish, req).await?;
        Self::entity(response).await
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
