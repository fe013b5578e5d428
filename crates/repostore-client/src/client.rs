//! Repository client.
//!
//! Orchestrates the cache, rate limit tracker, pending queue and retry
//! executor behind file-level operations:
//! - `fetch_file` / `get_file_at_revision` decode file contents
//! - `save_file` / `delete_file` write with the current digest
//! - `get_file_history` lists commits touching a path
//! - `get_diff` classifies a file between two revisions
//!
//! Not-found is a normal outcome for reads, history and deletes.

use std::sync::Arc;

use reqwest::Method;
use tokio::sync::RwLock;
use tracing::{debug, info, info_span, warn, Instrument};

use repostore_models::{
    CommitResult, ContentsWriteResponse, DeleteContentsRequest, DeleteResult, FileContent,
    FileDiff, FileEnvelope, HistoryEntry, PutContentsRequest, RemoteCommit, StoreEvent,
};

use crate::cache::FileCache;
use crate::codec;
use crate::config::StoreConfig;
use crate::credentials::{CredentialStore, MemoryCredentialStore, CREDENTIAL_KEY};
use crate::error::{parse_error_message, StoreError, StoreResult};
use crate::events::{EventSink, TracingSink};
use crate::queue::RequestQueue;
use crate::rate_limit::{QuotaState, RateLimitTracker};
use crate::retry::RetryExecutor;
use crate::transport::{HttpTransport, ReqwestTransport, StoreRequest, StoreResponse};

// =============================================================================
// Options
// =============================================================================

/// Options for `fetch_file`.
#[derive(Debug, Clone, Copy)]
pub struct FetchOptions {
    /// Consult and populate the cache.
    pub use_cache: bool,
    /// Skip the cache lookup but still populate it.
    pub force_fresh: bool,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            use_cache: true,
            force_fresh: false,
        }
    }
}

impl FetchOptions {
    /// Always hit the network, refreshing the cache.
    pub fn fresh() -> Self {
        Self {
            use_cache: true,
            force_fresh: true,
        }
    }

    /// Neither read nor populate the cache.
    pub fn uncached() -> Self {
        Self {
            use_cache: false,
            force_fresh: false,
        }
    }
}

/// Options for `save_file` and `delete_file`.
///
/// The written path is always invalidated; `clear_cache` additionally drops
/// every cached entry.
#[derive(Debug, Clone, Copy, Default)]
pub struct SaveOptions {
    pub clear_cache: bool,
}

// =============================================================================
// Builder
// =============================================================================

/// Builder for [`RepoClient`] with injectable collaborators.
pub struct RepoClientBuilder {
    config: StoreConfig,
    transport: Option<Arc<dyn HttpTransport>>,
    sink: Option<Arc<dyn EventSink>>,
    credentials: Option<Arc<dyn CredentialStore>>,
}

impl RepoClientBuilder {
    pub fn new(config: StoreConfig) -> Self {
        Self {
            config,
            transport: None,
            sink: None,
            credentials: None,
        }
    }

    pub fn transport(mut self, transport: Arc<dyn HttpTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn credentials(mut self, credentials: Arc<dyn CredentialStore>) -> Self {
        self.credentials = Some(credentials);
        self
    }

    pub async fn build(self) -> StoreResult<RepoClient> {
        let config = self.config;

        let transport = match self.transport {
            Some(transport) => transport,
            None => Arc::new(ReqwestTransport::new(&config)?),
        };
        let sink = self.sink.unwrap_or_else(|| Arc::new(TracingSink));
        let credentials = self
            .credentials
            .unwrap_or_else(|| Arc::new(MemoryCredentialStore::new()));

        let token = match config.token.clone() {
            Some(token) => Some(token),
            None => match credentials.load(CREDENTIAL_KEY).await {
                Ok(token) => token,
                Err(e) => {
                    warn!("Failed to load stored credential: {}", e);
                    None
                }
            },
        };

        let tracker = Arc::new(RateLimitTracker::new(
            config.rate_limit.clone(),
            Arc::clone(&sink),
        ));
        let executor = Arc::new(RetryExecutor::new(
            transport,
            Arc::clone(&tracker),
            Arc::clone(&sink),
            config.retry.clone(),
        ));
        let queue = Arc::new(RequestQueue::new(
            executor,
            Arc::clone(&tracker),
            config.queue.clone(),
        ));

        Ok(RepoClient {
            cache: Arc::new(FileCache::new(config.cache_ttl)),
            config: Arc::new(config),
            queue,
            tracker,
            sink,
            credentials,
            token: Arc::new(RwLock::new(token)),
        })
    }
}

// =============================================================================
// Client
// =============================================================================

/// File-level client for the remote contents API.
#[derive(Clone)]
pub struct RepoClient {
    config: Arc<StoreConfig>,
    queue: Arc<RequestQueue>,
    tracker: Arc<RateLimitTracker>,
    cache: Arc<FileCache>,
    sink: Arc<dyn EventSink>,
    credentials: Arc<dyn CredentialStore>,
    token: Arc<RwLock<Option<String>>>,
}

impl RepoClient {
    /// Create a client with the default HTTP transport and tracing sink.
    pub async fn new(config: StoreConfig) -> StoreResult<Self> {
        RepoClientBuilder::new(config).build().await
    }

    /// Create from environment variables.
    pub async fn from_env() -> StoreResult<Self> {
        Self::new(StoreConfig::from_env()).await
    }

    pub fn builder(config: StoreConfig) -> RepoClientBuilder {
        RepoClientBuilder::new(config)
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    // =========================================================================
    // Credential
    // =========================================================================

    /// Use and persist a new credential.
    pub async fn set_credential(&self, token: impl Into<String>) -> StoreResult<()> {
        let token = token.into();
        self.credentials.save(CREDENTIAL_KEY, &token).await?;
        *self.token.write().await = Some(token);
        info!("Credential updated");
        Ok(())
    }

    /// Forget the credential, e.g. after an auth failure.
    pub async fn clear_credential(&self) -> StoreResult<()> {
        *self.token.write().await = None;
        self.credentials.remove(CREDENTIAL_KEY).await
    }

    pub async fn has_credential(&self) -> bool {
        self.token.read().await.is_some()
    }

    // =========================================================================
    // State
    // =========================================================================

    pub async fn clear_cache(&self) {
        self.cache.clear().await;
    }

    /// Quota as last observed.
    pub async fn quota(&self) -> QuotaState {
        self.tracker.snapshot().await
    }

    /// Requests parked while throttled.
    pub async fn pending_requests(&self) -> usize {
        self.queue.len().await
    }

    // =========================================================================
    // Read Operations
    // =========================================================================

    /// Fetch and decode a file on the configured branch.
    ///
    /// Returns `None` when the file does not exist.
    pub async fn fetch_file(
        &self,
        path: &str,
        options: FetchOptions,
    ) -> StoreResult<Option<FileContent>> {
        self.run("fetch_file", path, async {
            if options.use_cache && !options.force_fresh {
                if let Some(hit) = self.cache.get(cache_key(path)).await {
                    return Ok(Some(hit));
                }
            }

            let Some(envelope) = self.read_envelope(path, &self.config.branch).await? else {
                debug!(path, "File not found");
                return Ok(None);
            };
            let content = self.decode_envelope(path, &envelope)?;

            if options.use_cache {
                self.cache.set(cache_key(path), content.clone(), None).await;
            }
            Ok(Some(content))
        })
        .await
    }

    /// Fetch a file as of a specific revision. Never cached.
    pub async fn get_file_at_revision(
        &self,
        path: &str,
        revision: &str,
    ) -> StoreResult<Option<FileContent>> {
        self.run("get_file_at_revision", path, self.read_at(path, revision))
            .await
    }

    /// Commits touching `path` on the configured branch, newest first.
    pub async fn get_file_history(&self, path: &str) -> StoreResult<Vec<HistoryEntry>> {
        self.run("get_file_history", path, async {
            let repo = self.config.require_repository()?;
            let url = format!(
                "{}/repos/{}/commits?path={}&sha={}",
                self.config.api_url,
                repo,
                urlencoding::encode(path.trim_start_matches('/')),
                urlencoding::encode(&self.config.branch)
            );

            let response = self.queue.submit(self.request(Method::GET, url).await).await?;
            match response.status {
                404 => Ok(Vec::new()),
                _ if response.is_success() => {
                    let commits: Vec<RemoteCommit> = response.json()?;
                    Ok(commits.into_iter().map(HistoryEntry::from).collect())
                }
                _ => Err(self.error_from_response(&response).await),
            }
        })
        .await
    }

    /// Compare a file between two revisions.
    ///
    /// Fails only when the file exists at neither revision.
    pub async fn get_diff(
        &self,
        path: &str,
        revision_a: &str,
        revision_b: &str,
    ) -> StoreResult<FileDiff> {
        self.run("get_diff", path, async {
            let (before, after) = tokio::try_join!(
                self.read_at(path, revision_a),
                self.read_at(path, revision_b)
            )?;

            FileDiff::between(path, revision_a, revision_b, before, after).ok_or_else(|| {
                StoreError::not_found(format!(
                    "{} at neither {} nor {}",
                    path, revision_a, revision_b
                ))
            })
        })
        .await
    }

    // =========================================================================
    // Write Operations
    // =========================================================================

    /// Create or overwrite a file on the configured branch.
    pub async fn save_file(
        &self,
        path: &str,
        content: &FileContent,
        message: &str,
        options: SaveOptions,
    ) -> StoreResult<CommitResult> {
        self.run("save_file", path, async {
            let token = self.require_credential("save_file", path).await?;
            let encoded = codec::encode_content(content)?;

            let existing = self.read_envelope(path, &self.config.branch).await?;
            let is_update = existing.is_some();

            let body = PutContentsRequest {
                message: message.to_string(),
                content: encoded,
                branch: self.config.branch.clone(),
                sha: existing.map(|e| e.sha),
            };
            let request = self
                .authorized(Method::PUT, self.contents_url(path, &self.config.branch)?, &token)
                .json(serde_json::to_value(&body)?);

            let response = self.queue.submit(request).await?;
            if !response.is_success() {
                return Err(self.error_from_response(&response).await);
            }
            let written: ContentsWriteResponse = response.json()?;

            self.after_mutation(path, options).await;
            info!(path, commit = %written.commit.sha, is_update, "File saved");
            self.sink.publish(StoreEvent::FileSaved {
                path: path.to_string(),
                commit_sha: written.commit.sha.clone(),
                is_update,
            });

            Ok(CommitResult {
                commit_sha: written.commit.sha,
                path: path.to_string(),
                is_update,
            })
        })
        .await
    }

    /// Delete a file. A file that does not exist yields `deleted: false`.
    pub async fn delete_file(
        &self,
        path: &str,
        message: &str,
        options: SaveOptions,
    ) -> StoreResult<DeleteResult> {
        self.run("delete_file", path, async {
            let token = self.require_credential("delete_file", path).await?;

            let Some(existing) = self.read_envelope(path, &self.config.branch).await? else {
                debug!(path, "Nothing to delete");
                return Ok(DeleteResult::not_found(path));
            };

            let body = DeleteContentsRequest {
                message: message.to_string(),
                sha: existing.sha,
                branch: self.config.branch.clone(),
            };
            let request = self
                .authorized(Method::DELETE, self.contents_url(path, &self.config.branch)?, &token)
                .json(serde_json::to_value(&body)?);

            let response = self.queue.submit(request).await?;
            if !response.is_success() {
                return Err(self.error_from_response(&response).await);
            }
            let written: ContentsWriteResponse = response.json()?;

            self.after_mutation(path, options).await;
            info!(path, commit = %written.commit.sha, "File deleted");
            self.sink.publish(StoreEvent::FileDeleted {
                path: path.to_string(),
                commit_sha: written.commit.sha.clone(),
            });

            Ok(DeleteResult {
                deleted: true,
                path: path.to_string(),
                commit_sha: Some(written.commit.sha),
            })
        })
        .await
    }

    // =========================================================================
    // Internal Helpers
    // =========================================================================

    /// Run an operation inside a span and publish its failure.
    async fn run<T, F>(&self, operation: &str, path: &str, fut: F) -> StoreResult<T>
    where
        F: std::future::Future<Output = StoreResult<T>>,
    {
        let span = info_span!("repostore_request", operation = %operation, path = %path);
        let result = fut.instrument(span).await;

        if let Err(e) = &result {
            // Already published as unauthorized.
            if !matches!(e, StoreError::Unauthorized(_)) {
                warn!(operation, path, "Operation failed: {}", e);
                self.sink.publish(StoreEvent::OperationFailed {
                    operation: operation.to_string(),
                    path: path.to_string(),
                    status: e.http_status(),
                    error: e.to_string(),
                });
            }
        }
        result
    }

    /// GET the contents envelope at `reference`; `None` on 404.
    async fn read_envelope(
        &self,
        path: &str,
        reference: &str,
    ) -> StoreResult<Option<FileEnvelope>> {
        let url = self.contents_url(path, reference)?;
        let response = self.queue.submit(self.request(Method::GET, url).await).await?;

        match response.status {
            404 => Ok(None),
            _ if response.is_success() => response.json().map(Some),
            _ => {
                let err = self.error_from_response(&response).await;
                self.sink.publish(StoreEvent::FileReadError {
                    path: path.to_string(),
                    status: Some(response.status),
                    error: err.to_string(),
                });
                Err(err)
            }
        }
    }

    /// Read and decode `path` at `reference` without publishing failure.
    async fn read_at(&self, path: &str, reference: &str) -> StoreResult<Option<FileContent>> {
        match self.read_envelope(path, reference).await? {
            Some(envelope) => self.decode_envelope(path, &envelope).map(Some),
            None => Ok(None),
        }
    }

    /// Classify a failed response. A 403 with the quota spent is rate limiting
    /// whatever the body says.
    async fn error_from_response(&self, response: &StoreResponse) -> StoreError {
        let message = parse_error_message(&response.body);
        if response.status == 403 && self.tracker.snapshot().await.remaining == Some(0) {
            return StoreError::RateLimited(message);
        }
        StoreError::from_http_status(response.status, message)
    }

    fn decode_envelope(&self, path: &str, envelope: &FileEnvelope) -> StoreResult<FileContent> {
        let decoded = match envelope.content.as_deref() {
            Some(encoded) => codec::decode_content(encoded),
            None => Err(StoreError::codec(format!(
                "{} has no inline content (directory or oversized file)",
                path
            ))),
        };

        if let Err(e) = &decoded {
            self.sink.publish(StoreEvent::FileReadError {
                path: path.to_string(),
                status: None,
                error: e.to_string(),
            });
        }
        decoded
    }

    async fn require_credential(&self, operation: &str, path: &str) -> StoreResult<String> {
        match self.token.read().await.clone() {
            Some(token) => Ok(token),
            None => {
                warn!(operation, path, "Write attempted without credential");
                self.sink.publish(StoreEvent::Unauthorized {
                    operation: operation.to_string(),
                    path: path.to_string(),
                });
                Err(StoreError::unauthorized(format!(
                    "{} requires a credential",
                    operation
                )))
            }
        }
    }

    async fn after_mutation(&self, path: &str, options: SaveOptions) {
        self.cache.invalidate(cache_key(path)).await;
        if options.clear_cache {
            self.cache.clear().await;
        }
    }

    fn contents_url(&self, path: &str, reference: &str) -> StoreResult<String> {
        let repo = self.config.require_repository()?;
        Ok(format!(
            "{}/repos/{}/contents/{}?ref={}",
            self.config.api_url,
            repo,
            encode_path(path),
            urlencoding::encode(reference)
        ))
    }

    /// Request carrying the current credential, if any.
    async fn request(&self, method: Method, url: String) -> StoreRequest {
        match self.token.read().await.as_deref() {
            Some(token) => self.authorized(method, url, token),
            None => StoreRequest::new(method, url).header("Accept", self.config.accept.as_str()),
        }
    }

    fn authorized(&self, method: Method, url: String, token: &str) -> StoreRequest {
        StoreRequest::new(method, url)
            .header("Accept", self.config.accept.as_str())
            .header("Authorization", format!("token {}", token))
    }
}

/// Percent-encode each path segment, keeping the separators.
pub(crate) fn encode_path(path: &str) -> String {
    path.trim_start_matches('/')
        .split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

/// Cache entries are keyed like the request path, without a leading slash.
fn cache_key(path: &str) -> &str {
    path.trim_start_matches('/')
}

// =============================================================================
// Tests
// =============================================================================
