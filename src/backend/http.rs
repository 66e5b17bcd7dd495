//! HTTP backend built on `reqwest`.

use super::data_types::{
    ArtistId, ArtistProfile, BlobReference, GatewayConfiguration, MediaCard, MediaId, MediaItem,
    MediaItemInput, SessionId, SessionStatus, ShoppingItem,
};
use super::{Backend, ProgressFn};
use crate::config::BackendConfig;
use crate::error::{Error, Result, TransferErrorKind};
use crate::media::MediaCategory;
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Client, RequestBuilder, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

/// Header carrying the client-computed content digest of an upload.
pub const CONTENT_DIGEST_HEADER: &str = "x-content-sha256";

/// Backend reached over HTTP.
#[derive(Clone)]
pub struct HttpBackend {
    client: Client,
    base_url: Url,
    auth_token: Option<String>,
    chunk_size: usize,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CheckoutRequest<'a> {
    items: &'a [ShoppingItem],
    success_url: &'a str,
    cancel_url: &'a str,
}

#[derive(Serialize)]
struct FromUrlRequest<'a> {
    url: &'a str,
}

#[derive(Serialize)]
struct CredentialRequest<'a> {
    token: &'a str,
}

#[derive(Deserialize)]
struct PublishResponse {
    id: MediaId,
}

#[derive(Deserialize)]
struct FlagResponse {
    value: bool,
}

impl HttpBackend {
    /// Create a backend client from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL is not an absolute http(s) URL or
    /// the HTTP client cannot be built.
    pub fn new(config: &BackendConfig, chunk_size: usize) -> Result<Self> {
        let base_url = Url::parse(&config.base_url)
            .map_err(|e| Error::Config(format!("invalid backend URL {}: {e}", config.base_url)))?;
        if base_url.cannot_be_a_base() {
            return Err(Error::Config(format!(
                "backend URL {} cannot carry paths",
                config.base_url
            )));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| Error::Config(format!("failed to create HTTP client: {e}")))?;

        info!("HTTP backend targeting {}", config.base_url);

        Ok(Self {
            client,
            base_url,
            auth_token: config.auth_token.clone(),
            chunk_size: chunk_size.max(1),
        })
    }

    /// Build an endpoint URL under the base path.
    ///
    /// Each segment is percent-encoded on its own, so an id can never add
    /// path levels, a query or a fragment.
    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        if let Some(bad) = segments
            .iter()
            .find(|s| s.is_empty() || **s == "." || **s == "..")
        {
            return Err(Error::Validation(format!("invalid path segment {bad:?}")));
        }
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| Error::Config("backend URL cannot carry paths".into()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match self.auth_token {
            Some(ref token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response> {
        let response = self
            .authorized(request)
            .send()
            .await
            .map_err(|e| Error::Backend(format!("request failed: {e}")))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "unknown error".to_string());
        Err(Error::Backend(format!("request failed with status {status}: {body}")))
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T> {
        debug!("GET {url}");
        let path = url.path().to_string();
        let response = self.send(self.client.get(url)).await?;
        response
            .json()
            .await
            .map_err(|e| Error::Backend(format!("failed to decode {path}: {e}")))
    }

    async fn get_optional<T: DeserializeOwned>(&self, url: Url) -> Result<Option<T>> {
        debug!("GET {url}");
        let path = url.path().to_string();
        let response = self
            .authorized(self.client.get(url))
            .send()
            .await
            .map_err(|e| Error::Backend(format!("request failed: {e}")))?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = response
            .error_for_status()
            .map_err(|e| Error::Backend(e.to_string()))?;
        response
            .json()
            .await
            .map(Some)
            .map_err(|e| Error::Backend(format!("failed to decode {path}: {e}")))
    }
}

#[async_trait]
impl Backend for HttpBackend {
    async fn store_blob_bytes(&self, bytes: Bytes, progress: ProgressFn) -> Result<BlobReference> {
        use sha2::{Digest, Sha256};

        let total = bytes.len();
        let digest = hex::encode(Sha256::digest(&bytes));
        debug!("Uploading blob ({total} bytes, sha256 {digest})");

        let chunk_size = self.chunk_size;
        let chunks: Vec<Bytes> = (0..total)
            .step_by(chunk_size)
            .map(|start| bytes.slice(start..(start + chunk_size).min(total)))
            .collect();

        let mut sent = 0usize;
        let body_stream = futures::stream::iter(chunks.into_iter().map(move |chunk| {
            sent += chunk.len();
            let pct = (sent * 100 / total.max(1)).min(100);
            progress(u8::try_from(pct).unwrap_or(100));
            Ok::<Bytes, std::io::Error>(chunk)
        }));

        let request = self
            .client
            .post(self.endpoint(&["blobs"])?)
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .header(reqwest::header::CONTENT_LENGTH, total)
            .header(CONTENT_DIGEST_HEADER, &digest)
            .body(reqwest::Body::wrap_stream(body_stream));

        let response = self.authorized(request).send().await.map_err(|e| {
            Error::transfer(TransferErrorKind::Network, format!("upload failed: {e}"))
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::transfer(
                TransferErrorKind::Rejected,
                format!("storage returned {status}: {body}"),
            ));
        }

        response.json().await.map_err(|e| {
            Error::transfer(
                TransferErrorKind::Network,
                format!("invalid storage acknowledgement: {e}"),
            )
        })
    }

    async fn store_blob_from_url(&self, url: &str) -> Result<BlobReference> {
        let request = self
            .client
            .post(self.endpoint(&["blobs", "from-url"])?)
            .json(&FromUrlRequest { url });
        let response = self.send(request).await.map_err(|e| {
            Error::transfer(TransferErrorKind::Rejected, e.to_string())
        })?;
        response.json().await.map_err(|e| {
            Error::transfer(
                TransferErrorKind::Network,
                format!("invalid storage acknowledgement: {e}"),
            )
        })
    }

    async fn create_checkout_session(
        &self,
        items: &[ShoppingItem],
        success_url: &str,
        cancel_url: &str,
    ) -> Result<String> {
        let request = self
            .client
            .post(self.endpoint(&["checkout", "sessions"])?)
            .json(&CheckoutRequest {
                items,
                success_url,
                cancel_url,
            });
        let response = self.send(request).await?;
        response
            .text()
            .await
            .map_err(|e| Error::Backend(format!("failed to read session envelope: {e}")))
    }

    async fn get_session_status(&self, session_id: &SessionId) -> Result<SessionStatus> {
        self.get_json(self.endpoint(&["checkout", "sessions", session_id.as_str()])?)
            .await
    }

    async fn is_donations_enabled(&self, artist: &ArtistId) -> Result<bool> {
        let flag: FlagResponse = self
            .get_json(self.endpoint(&["artists", artist.as_str(), "donations-enabled"])?)
            .await?;
        Ok(flag.value)
    }

    async fn is_gateway_configured(&self) -> Result<bool> {
        let flag: FlagResponse = self.get_json(self.endpoint(&["gateway", "configured"])?).await?;
        Ok(flag.value)
    }

    async fn set_gateway_configuration(&self, config: &GatewayConfiguration) -> Result<()> {
        let url = self.endpoint(&["gateway", "configuration"])?;
        self.send(self.client.put(url).json(config)).await?;
        Ok(())
    }

    async fn attach_payment_credential(&self, token: &str) -> Result<()> {
        let request = self
            .client
            .put(self.endpoint(&["artists", "me", "credential"])?)
            .json(&CredentialRequest { token });
        self.send(request).await?;
        Ok(())
    }

    async fn detach_payment_credential(&self) -> Result<()> {
        let url = self.endpoint(&["artists", "me", "credential"])?;
        self.send(self.client.delete(url)).await?;
        Ok(())
    }

    async fn publish_media(&self, input: &MediaItemInput) -> Result<MediaId> {
        let url = self.endpoint(&["media"])?;
        let response = self.send(self.client.post(url).json(input)).await?;
        let published: PublishResponse = response
            .json()
            .await
            .map_err(|e| Error::Backend(format!("failed to decode publish response: {e}")))?;
        Ok(published.id)
    }

    async fn delete_media(&self, media_id: &MediaId) -> Result<()> {
        let url = self.endpoint(&["media", media_id.as_str()])?;
        self.send(self.client.delete(url)).await?;
        Ok(())
    }

    async fn list_media(&self) -> Result<Vec<MediaItem>> {
        self.get_json(self.endpoint(&["media"])?).await
    }

    async fn media_by_artist(&self, artist: &ArtistId) -> Result<Vec<MediaItem>> {
        self.get_json(self.endpoint(&["artists", artist.as_str(), "media"])?)
            .await
    }

    async fn media_by_category(&self, category: MediaCategory) -> Result<Vec<MediaItem>> {
        let mut url = self.endpoint(&["media"])?;
        url.query_pairs_mut().append_pair("category", category.slug());
        self.get_json(url).await
    }

    async fn media_card(&self, media_id: &MediaId) -> Result<Option<MediaCard>> {
        self.get_optional(self.endpoint(&["media", media_id.as_str(), "card"])?)
            .await
    }

    async fn media_cards(&self) -> Result<Vec<MediaCard>> {
        self.get_json(self.endpoint(&["media", "cards"])?).await
    }

    async fn caller_artist(&self) -> Result<Option<ArtistProfile>> {
        self.get_optional(self.endpoint(&["artists", "me"])?).await
    }

    async fn artist(&self, artist: &ArtistId) -> Result<Option<ArtistProfile>> {
        self.get_optional(self.endpoint(&["artists", artist.as_str()])?)
            .await
    }

    async fn onboard_artist(&self, profile: &ArtistProfile) -> Result<()> {
        let url = self.endpoint(&["artists"])?;
        self.send(self.client.post(url).json(profile)).await?;
        Ok(())
    }

    async fn update_artist(&self, profile: &ArtistProfile) -> Result<()> {
        let url = self.endpoint(&["artists", "me"])?;
        self.send(self.client.put(url).json(profile)).await?;
        Ok(())
    }
}
