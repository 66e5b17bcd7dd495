//! Blob upload service.
//!
//! Turns local bytes into a durable [`BlobReference`]:
//!
//! ```text
//! bytes ──► size policy ──► backend slot ──► store_blob_bytes ──► digest check ──► reference
//!              │                 │                  │                  │
//!          Validation   BackendUnavailable   Transfer(Network/   Transfer(Integrity
//!                                             Rejected/Cancelled)   Mismatch)
//! ```
//!
//! Progress from the transport is clamped by [`MonotonicProgress`] before it
//! reaches observers. A reference is returned only after storage acknowledged
//! content whose length and SHA-256 match the input.

mod progress;

pub use progress::{
    ClosureObserver, MonotonicProgress, NoopObserver, ProgressFanout, UploadObserver,
};
pub use tokio_util::sync::CancellationToken;

use crate::backend::{BackendSlot, BlobReference, ProgressFn};
use crate::config::UploadConfig;
use crate::error::{Error, Result, TransferErrorKind};
use crate::event::{ClientEvent, ClientEventsSender};
use bytes::Bytes;
use parking_lot::{Mutex, RwLock};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Size class of an uploaded asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetClass {
    /// Profile picture.
    Avatar,
    /// Published media file.
    Media,
}

/// Lifecycle of an upload task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadState {
    /// Transfer in progress.
    Active,
    /// Storage acknowledged the blob.
    Succeeded(BlobReference),
    /// Transfer failed.
    Failed(TransferErrorKind),
    /// Transfer was cancelled.
    Cancelled,
}

impl UploadState {
    /// Whether the task reached a final state.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Active)
    }
}

/// Snapshot of one upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadTask {
    /// Task identifier.
    pub id: u64,
    /// Source length in bytes.
    pub len: usize,
    /// Size class.
    pub class: AssetClass,
    /// Last reported percentage.
    pub progress: u8,
    /// Current state.
    pub state: UploadState,
}

/// Registry of upload tasks, for rendering per-file progress.
#[derive(Clone, Default)]
pub struct UploadRegistry {
    tasks: Arc<Mutex<BTreeMap<u64, UploadTask>>>,
}

impl UploadRegistry {
    /// Snapshot of one task.
    #[must_use]
    pub fn get(&self, id: u64) -> Option<UploadTask> {
        self.tasks.lock().get(&id).cloned()
    }

    /// Snapshot of every task, oldest first.
    #[must_use]
    pub fn snapshot(&self) -> Vec<UploadTask> {
        self.tasks.lock().values().cloned().collect()
    }

    /// Number of tasks still transferring.
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.tasks
            .lock()
            .values()
            .filter(|t| !t.state.is_terminal())
            .count()
    }

    /// Forget finished tasks. Returns how many were removed.
    pub fn prune_finished(&self) -> usize {
        let mut tasks = self.tasks.lock();
        let before = tasks.len();
        tasks.retain(|_, t| !t.state.is_terminal());
        before - tasks.len()
    }

    fn insert(&self, task: UploadTask) {
        self.tasks.lock().insert(task.id, task);
    }

    fn update(&self, id: u64, f: impl FnOnce(&mut UploadTask)) {
        if let Some(task) = self.tasks.lock().get_mut(&id) {
            f(task);
        }
    }
}

/// Upload statistics for monitoring.
#[derive(Debug, Default, Clone)]
pub struct UploadStats {
    /// Uploads started.
    pub started: u64,
    /// Uploads acknowledged by storage.
    pub succeeded: u64,
    /// Uploads that failed.
    pub failed: u64,
    /// Uploads cancelled by the caller.
    pub cancelled: u64,
    /// Bytes acknowledged by storage.
    pub bytes_uploaded: u64,
}

/// One entry of a batch upload.
pub struct UploadRequest {
    /// File contents.
    pub bytes: Bytes,
    /// Size class.
    pub class: AssetClass,
    /// Observer for this file.
    pub observer: Arc<dyn UploadObserver>,
}

impl UploadRequest {
    /// A media upload without observer.
    pub fn media(bytes: impl Into<Bytes>) -> Self {
        Self {
            bytes: bytes.into(),
            class: AssetClass::Media,
            observer: Arc::new(NoopObserver),
        }
    }

    /// Attach an observer.
    #[must_use]
    pub fn observed(mut self, observer: Arc<dyn UploadObserver>) -> Self {
        self.observer = observer;
        self
    }
}

/// Keeps the registry and event channel in step with one task.
struct TaskObserver {
    task_id: u64,
    registry: UploadRegistry,
    events: Option<ClientEventsSender>,
}

impl UploadObserver for TaskObserver {
    fn on_progress(&self, percent: u8) {
        self.registry.update(self.task_id, |t| t.progress = percent);
        if let Some(ref events) = self.events {
            let _ = events.send(ClientEvent::UploadProgress {
                task_id: self.task_id,
                percent,
            });
        }
    }
}

/// Uploads blobs through the backend.
#[derive(Clone)]
pub struct BlobUploadService {
    backend: BackendSlot,
    config: UploadConfig,
    registry: UploadRegistry,
    next_id: Arc<AtomicU64>,
    stats: Arc<RwLock<UploadStats>>,
    events: Option<ClientEventsSender>,
}

impl BlobUploadService {
    /// Create an upload service.
    #[must_use]
    pub fn new(backend: BackendSlot, config: UploadConfig) -> Self {
        debug!(
            "Upload service created (max_avatar_bytes={}, max_media_bytes={:?})",
            config.max_avatar_bytes, config.max_media_bytes
        );
        Self {
            backend,
            config,
            registry: UploadRegistry::default(),
            next_id: Arc::new(AtomicU64::new(1)),
            stats: Arc::new(RwLock::new(UploadStats::default())),
            events: None,
        }
    }

    /// Publish progress and completion events on `events`.
    #[must_use]
    pub fn with_events(mut self, events: ClientEventsSender) -> Self {
        self.events = Some(events);
        self
    }

    /// Task registry.
    #[must_use]
    pub fn registry(&self) -> &UploadRegistry {
        &self.registry
    }

    /// Current statistics.
    #[must_use]
    pub fn stats(&self) -> UploadStats {
        self.stats.read().clone()
    }

    /// Size ceiling for a class, `None` when unlimited.
    #[must_use]
    pub fn limit_for(&self, class: AssetClass) -> Option<usize> {
        match class {
            AssetClass::Avatar => Some(self.config.max_avatar_bytes),
            AssetClass::Media => self.config.max_media_bytes,
        }
    }

    /// Check the local size policy.
    ///
    /// # Errors
    ///
    /// Returns a validation error for empty input or input above the ceiling.
    pub fn check_size(&self, len: usize, class: AssetClass) -> Result<()> {
        if len == 0 {
            return Err(Error::Validation("file is empty".into()));
        }
        match self.limit_for(class) {
            Some(limit) if len > limit => Err(Error::Validation(format!(
                "file is {len} bytes; the limit is {} MiB",
                limit / (1024 * 1024)
            ))),
            _ => Ok(()),
        }
    }

    /// Upload a media file.
    ///
    /// # Errors
    ///
    /// See [`upload_with_cancel`](Self::upload_with_cancel).
    pub async fn upload(
        &self,
        bytes: Bytes,
        observer: Arc<dyn UploadObserver>,
    ) -> Result<BlobReference> {
        self.upload_with_cancel(bytes, AssetClass::Media, observer, &CancellationToken::new())
            .await
    }

    /// Upload bytes, honouring `cancel`.
    ///
    /// # Errors
    ///
    /// - `Validation` if the input is empty or above the class ceiling.
    /// - `BackendUnavailable` if no backend is connected.
    /// - `Transfer` if storage fails, the acknowledgement does not match the
    ///   input, or the token is cancelled.
    pub async fn upload_with_cancel(
        &self,
        bytes: Bytes,
        class: AssetClass,
        observer: Arc<dyn UploadObserver>,
        cancel: &CancellationToken,
    ) -> Result<BlobReference> {
        self.check_size(bytes.len(), class)?;
        let backend = self.backend.get()?;

        let len = bytes.len();
        let task_id = self.begin_task(len, class);
        let tracker = self.tracker(task_id, &observer);
        let transport_progress: ProgressFn = {
            let tracker = Arc::clone(&tracker);
            Arc::new(move |raw| {
                tracker.advance(raw);
            })
        };

        let expected_digest = hex::encode(Sha256::digest(&bytes));

        let outcome = tokio::select! {
            biased;
            () = cancel.cancelled() => Err(Error::transfer(
                TransferErrorKind::Cancelled,
                "upload cancelled",
            )),
            stored = backend.store_blob_bytes(bytes, transport_progress) => stored,
        };

        let outcome = outcome.and_then(|reference| {
            verify_acknowledgement(&reference, len, &expected_digest)?;
            Ok(reference)
        });
        self.finish_task(task_id, &tracker, observer.as_ref(), outcome)
    }

    /// Upload several files concurrently.
    ///
    /// Each file has its own task and progress. Results are returned in input
    /// order; completion order is unspecified.
    pub async fn upload_batch(&self, requests: Vec<UploadRequest>) -> Vec<Result<BlobReference>> {
        info!("Starting batch upload of {} files", requests.len());
        let uploads = requests.into_iter().map(|request| async move {
            let cancel = CancellationToken::new();
            self.upload_with_cancel(request.bytes, request.class, request.observer, &cancel)
                .await
        });
        futures::future::join_all(uploads).await
    }

    /// Ask storage to ingest content from a URL.
    ///
    /// The fetch is tracked as a media task like any other upload; storage
    /// reports no progress, so observers see a single 100 on success.
    ///
    /// # Errors
    ///
    /// - `Validation` for a URL that is not absolute http(s).
    /// - `BackendUnavailable` if no backend is connected.
    /// - `Transfer` if storage refuses or acknowledges without a key or URL.
    pub async fn upload_from_url(
        &self,
        url: &str,
        observer: Arc<dyn UploadObserver>,
    ) -> Result<BlobReference> {
        let parsed = reqwest::Url::parse(url)
            .map_err(|e| Error::Validation(format!("invalid blob URL {url}: {e}")))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(Error::Validation(format!(
                "blob URL must be http or https, got {}",
                parsed.scheme()
            )));
        }
        let backend = self.backend.get()?;

        let task_id = self.begin_task(0, AssetClass::Media);
        let tracker = self.tracker(task_id, &observer);
        let outcome = backend
            .store_blob_from_url(parsed.as_str())
            .await
            .and_then(|reference| {
                verify_remote_acknowledgement(&reference)?;
                Ok(reference)
            });
        self.finish_task(task_id, &tracker, observer.as_ref(), outcome)
    }

    fn begin_task(&self, len: usize, class: AssetClass) -> u64 {
        let task_id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.registry.insert(UploadTask {
            id: task_id,
            len,
            class,
            progress: 0,
            state: UploadState::Active,
        });
        self.stats.write().started += 1;
        debug!("Upload task {task_id} started ({len} bytes, {class:?})");
        task_id
    }

    fn tracker(
        &self,
        task_id: u64,
        observer: &Arc<dyn UploadObserver>,
    ) -> Arc<MonotonicProgress> {
        let fanout = ProgressFanout::new()
            .with(Arc::new(TaskObserver {
                task_id,
                registry: self.registry.clone(),
                events: self.events.clone(),
            }))
            .with(Arc::clone(observer));
        Arc::new(MonotonicProgress::new(Arc::new(fanout)))
    }

    fn finish_task(
        &self,
        task_id: u64,
        tracker: &MonotonicProgress,
        observer: &dyn UploadObserver,
        outcome: Result<BlobReference>,
    ) -> Result<BlobReference> {
        match outcome {
            Ok(reference) => {
                tracker.finish();
                observer.on_complete(&reference);
                self.registry.update(task_id, |t| {
                    t.state = UploadState::Succeeded(reference.clone());
                });
                {
                    let mut stats = self.stats.write();
                    stats.succeeded += 1;
                    stats.bytes_uploaded += reference.size;
                }
                self.emit_finished(task_id, true);
                info!("Upload task {task_id} stored as {}", reference.key);
                Ok(reference)
            }
            Err(e) => {
                let kind = match e {
                    Error::Transfer(kind, _) => kind,
                    _ => TransferErrorKind::Network,
                };
                observer.on_error(kind);
                self.registry.update(task_id, |t| {
                    t.state = if kind == TransferErrorKind::Cancelled {
                        UploadState::Cancelled
                    } else {
                        UploadState::Failed(kind)
                    };
                });
                {
                    let mut stats = self.stats.write();
                    if kind == TransferErrorKind::Cancelled {
                        stats.cancelled += 1;
                    } else {
                        stats.failed += 1;
                    }
                }
                self.emit_finished(task_id, false);
                warn!("Upload task {task_id} failed: {e}");
                Err(match e {
                    Error::Transfer(..) => e,
                    other => Error::transfer(kind, other.to_string()),
                })
            }
        }
    }

    fn emit_finished(&self, task_id: u64, succeeded: bool) {
        if let Some(ref events) = self.events {
            let _ = events.send(ClientEvent::UploadFinished { task_id, succeeded });
        }
    }
}

fn verify_acknowledgement(reference: &BlobReference, len: usize, digest: &str) -> Result<()> {
    if reference.size != len as u64 {
        return Err(Error::transfer(
            TransferErrorKind::IntegrityMismatch,
            format!("storage acknowledged {} bytes, sent {len}", reference.size),
        ));
    }
    if !reference.sha256.eq_ignore_ascii_case(digest) {
        return Err(Error::transfer(
            TransferErrorKind::IntegrityMismatch,
            "storage acknowledged different content",
        ));
    }
    Ok(())
}

fn verify_remote_acknowledgement(reference: &BlobReference) -> Result<()> {
    if reference.key.trim().is_empty() || reference.url.trim().is_empty() {
        return Err(Error::transfer(
            TransferErrorKind::Rejected,
            "storage acknowledged the URL without a key or location",
        ));
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;

    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<u8>>,
        completed: Mutex<Option<BlobReference>>,
        errors: Mutex<Vec<TransferErrorKind>>,
    }

    impl UploadObserver for Recorder {
        fn on_progress(&self, percent: u8) {
            self.seen.lock().push(percent);
        }

        fn on_complete(&self, reference: &BlobReference) {
            *self.completed.lock() = Some(reference.clone());
        }

        fn on_error(&self, kind: TransferErrorKind) {
            self.errors.lock().push(kind);
        }
    }

    fn service() -> (BlobUploadService, MemoryBackend) {
        let backend = MemoryBackend::new();
        let slot = BackendSlot::connected(Arc::new(backend.clone()));
        (BlobUploadService::new(slot, UploadConfig::default()), backend)
    }

    #[tokio::test]
    async fn test_upload_returns_identical_content() {
        let (service, backend) = service();
        let recorder = Arc::new(Recorder::default());
        let bytes = Bytes::from(vec![7u8; 4096]);

        let reference = service.upload(bytes.clone(), recorder.clone()).await.unwrap();

        assert_eq!(backend.blob_bytes(&reference.key), Some(bytes));
        assert_eq!(recorder.completed.lock().as_ref(), Some(&reference));
        assert_eq!(recorder.seen.lock().last(), Some(&100));
        assert_eq!(service.stats().succeeded, 1);
    }

    #[tokio::test]
    async fn test_scrambled_transport_progress_is_monotonic() {
        let (service, backend) = service();
        backend.script_progress(vec![30, 10, 30, 80, 50, 100, 90]);
        let recorder = Arc::new(Recorder::default());

        let reference = service
            .upload(Bytes::from_static(b"riff"), recorder.clone())
            .await
            .unwrap();

        assert_eq!(*recorder.seen.lock(), vec![30, 80, 99, 100]);
        let task = service.registry().snapshot().pop().unwrap();
        assert_eq!(task.progress, 100);
        assert_eq!(task.state, UploadState::Succeeded(reference));
    }

    #[tokio::test]
    async fn test_oversized_avatar_rejected_before_network() {
        let (service, backend) = service();
        let bytes = Bytes::from(vec![0u8; 5 * 1024 * 1024 + 1]);

        let result = service
            .upload_with_cancel(
                bytes,
                AssetClass::Avatar,
                Arc::new(NoopObserver),
                &CancellationToken::new(),
            )
            .await;

        assert!(matches!(result, Err(Error::Validation(_))));
        assert_eq!(backend.call_count(), 0);
        assert!(service.registry().snapshot().is_empty());
    }

    #[tokio::test]
    async fn test_avatar_at_limit_is_accepted() {
        let (service, _backend) = service();
        let bytes = Bytes::from(vec![1u8; 5 * 1024 * 1024]);
        let result = service
            .upload_with_cancel(
                bytes,
                AssetClass::Avatar,
                Arc::new(NoopObserver),
                &CancellationToken::new(),
            )
            .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_empty_input_rejected() {
        let (service, backend) = service();
        let result = service.upload(Bytes::new(), Arc::new(NoopObserver)).await;
        assert!(matches!(result, Err(Error::Validation(_))));
        assert_eq!(backend.call_count(), 0);
    }

    #[tokio::test]
    async fn test_storage_failure_yields_no_reference() {
        let (service, backend) = service();
        backend.fail_next_upload(TransferErrorKind::Rejected);
        let recorder = Arc::new(Recorder::default());

        let result = service
            .upload(Bytes::from_static(b"take one"), recorder.clone())
            .await;

        assert!(matches!(result, Err(Error::Transfer(TransferErrorKind::Rejected, _))));
        assert!(recorder.completed.lock().is_none());
        assert_eq!(*recorder.errors.lock(), vec![TransferErrorKind::Rejected]);
        assert_eq!(backend.blob_count(), 0);
        let task = service.registry().snapshot().pop().unwrap();
        assert_eq!(task.state, UploadState::Failed(TransferErrorKind::Rejected));
    }

    #[tokio::test]
    async fn test_mismatched_acknowledgement_is_rejected() {
        let (service, backend) = service();
        backend.corrupt_next_ack();

        let result = service
            .upload(Bytes::from_static(b"chorus"), Arc::new(NoopObserver))
            .await;

        assert!(matches!(
            result,
            Err(Error::Transfer(TransferErrorKind::IntegrityMismatch, _))
        ));
    }

    #[tokio::test]
    async fn test_cancelled_upload() {
        let (service, _backend) = service();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = service
            .upload_with_cancel(
                Bytes::from_static(b"bridge"),
                AssetClass::Media,
                Arc::new(NoopObserver),
                &cancel,
            )
            .await;

        assert!(matches!(result, Err(Error::Transfer(TransferErrorKind::Cancelled, _))));
        let task = service.registry().snapshot().pop().unwrap();
        assert_eq!(task.state, UploadState::Cancelled);
        assert_eq!(service.stats().cancelled, 1);
    }

    #[tokio::test]
    async fn test_unavailable_backend_is_not_attempted() {
        let service = BlobUploadService::new(BackendSlot::empty(), UploadConfig::default());
        let result = service
            .upload(Bytes::from_static(b"verse"), Arc::new(NoopObserver))
            .await;
        assert!(matches!(result, Err(Error::BackendUnavailable)));
        assert!(service.registry().snapshot().is_empty());
    }

    #[tokio::test]
    async fn test_batch_uploads_have_independent_tasks() {
        let (service, backend) = service();
        let first = Arc::new(Recorder::default());
        let second = Arc::new(Recorder::default());

        let results = service
            .upload_batch(vec![
                UploadRequest::media(vec![1u8; 100]).observed(first.clone()),
                UploadRequest::media(Vec::<u8>::new()),
                UploadRequest::media(vec![2u8; 300]).observed(second.clone()),
            ])
            .await;

        assert_eq!(results.len(), 3);
        assert!(results[0].is_ok());
        assert!(matches!(results[1], Err(Error::Validation(_))));
        assert!(results[2].is_ok());
        assert_eq!(backend.blob_count(), 2);
        assert_eq!(first.seen.lock().last(), Some(&100));
        assert_eq!(second.seen.lock().last(), Some(&100));
        assert_eq!(service.registry().snapshot().len(), 2);
        assert_eq!(service.registry().prune_finished(), 2);
    }

    #[tokio::test]
    async fn test_cancel_during_transfer() {
        let (service, backend) = service();
        backend.script_progress(vec![10, 20, 30, 40, 50, 60]);
        let cancel = CancellationToken::new();
        let observer = {
            let cancel = cancel.clone();
            Arc::new(ClosureObserver(move |percent: u8| {
                if percent >= 20 {
                    cancel.cancel();
                }
            }))
        };

        let result = service
            .upload_with_cancel(
                Bytes::from_static(b"outro"),
                AssetClass::Media,
                observer,
                &cancel,
            )
            .await;

        assert!(matches!(result, Err(Error::Transfer(TransferErrorKind::Cancelled, _))));
        assert_eq!(backend.blob_count(), 0);
        let task = service.registry().snapshot().pop().unwrap();
        assert_eq!(task.state, UploadState::Cancelled);
        assert!(task.progress < 100);
    }

    #[tokio::test]
    async fn test_upload_from_url_requires_absolute_url() {
        let (service, backend) = service();
        assert!(matches!(
            service
                .upload_from_url("/assets/avatar.png", Arc::new(NoopObserver))
                .await,
            Err(Error::Validation(_))
        ));
        assert!(matches!(
            service
                .upload_from_url("file:///etc/passwd", Arc::new(NoopObserver))
                .await,
            Err(Error::Validation(_))
        ));
        assert_eq!(backend.call_count(), 0);
        assert!(service.registry().snapshot().is_empty());
    }

    #[tokio::test]
    async fn test_upload_from_url_is_tracked() {
        let (service, backend) = service();
        let recorder = Arc::new(Recorder::default());

        let reference = service
            .upload_from_url("https://cdn.example.com/avatar.png", recorder.clone())
            .await
            .unwrap();

        assert_eq!(reference.direct_url(), "https://cdn.example.com/avatar.png");
        assert!(backend.blob_bytes(&reference.key).is_some());
        assert_eq!(*recorder.seen.lock(), vec![100]);
        assert_eq!(recorder.completed.lock().as_ref(), Some(&reference));
        let task = service.registry().snapshot().pop().unwrap();
        assert_eq!(task.state, UploadState::Succeeded(reference));
        assert_eq!(service.stats().succeeded, 1);
    }

    #[tokio::test]
    async fn test_upload_from_url_failure_is_a_transfer_error() {
        let (service, backend) = service();
        backend.fail_next_upload(TransferErrorKind::Rejected);
        let recorder = Arc::new(Recorder::default());

        let result = service
            .upload_from_url("https://cdn.example.com/missing.mp3", recorder.clone())
            .await;

        assert!(matches!(result, Err(Error::Transfer(TransferErrorKind::Rejected, _))));
        assert_eq!(*recorder.errors.lock(), vec![TransferErrorKind::Rejected]);
        let task = service.registry().snapshot().pop().unwrap();
        assert_eq!(task.state, UploadState::Failed(TransferErrorKind::Rejected));
        assert_eq!(service.stats().failed, 1);
    }

    #[test]
    fn test_remote_acknowledgement_needs_key_and_url() {
        let reference = BlobReference {
            key: String::new(),
            url: "https://cdn.example.com/a.png".into(),
            size: 0,
            sha256: String::new(),
        };
        assert!(matches!(
            verify_remote_acknowledgement(&reference),
            Err(Error::Transfer(TransferErrorKind::Rejected, _))
        ));
        let reference = BlobReference {
            key: "blob-1".into(),
            ..reference
        };
        assert!(verify_remote_acknowledgement(&reference).is_ok());
    }
}
