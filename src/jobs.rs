//! Durable queue for requests answered asynchronously.
//!
//! A queued request is written as `<id>.json` under the queue directory; its
//! completion adds `<id>.done` holding the response body. A status read that
//! finds the job done forgets it.

use crate::error::JobError;
use crate::resolve::{Method, RequestContext};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Everything needed to replay a request later.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct JobRequest {
    pub method: String,
    pub path: String,
    #[serde(default)]
    pub query: Option<String>,
    #[serde(default)]
    pub params: BTreeMap<String, String>,
    #[serde(default)]
    pub form: BTreeMap<String, String>,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub page_size: u64,
}

impl JobRequest {
    pub fn from_context(ctx: &RequestContext) -> Self {
        JobRequest {
            method: ctx.method.to_string(),
            path: ctx.path.clone(),
            query: ctx.query.clone(),
            params: ctx.params.clone(),
            form: ctx.form.clone(),
            body: ctx.body.clone(),
            page_size: ctx.page_size,
        }
    }

    pub fn into_context(self) -> Result<RequestContext, crate::error::CoreError> {
        let method: Method = self.method.parse()?;
        let target = match &self.query {
            Some(q) => format!("{}?{}", self.path, q),
            None => self.path.clone(),
        };
        let mut ctx = RequestContext::new(method, &target)
            .with_params(self.params)
            .with_form(self.form)
            .with_page_size(self.page_size);
        ctx.body = self.body;
        Ok(ctx)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JobStatus {
    Pending,
    Done,
    NotFound,
}

impl JobStatus {
    /// Body text reported by the status endpoint.
    pub fn message(&self) -> &'static str {
        match self {
            JobStatus::Pending => "In progress...",
            JobStatus::Done => "Completed.",
            JobStatus::NotFound => "Not found.",
        }
    }
}

#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Persist the request; returns its job id.
    async fn enqueue(&self, job: &JobRequest) -> Result<String, JobError>;

    async fn status(&self, id: &str) -> Result<JobStatus, JobError>;

    async fn complete(&self, id: &str, outcome: &Value) -> Result<(), JobError>;

    /// Queued requests that have not completed yet, oldest first.
    async fn pending(&self) -> Result<Vec<(String, JobRequest)>, JobError>;
}

/// File-backed [`JobQueue`].
#[derive(Clone, Debug)]
pub struct FileJobQueue {
    dir: PathBuf,
}

impl FileJobQueue {
    pub async fn open(dir: impl AsRef<Path>) -> Result<Self, JobError> {
        let dir = dir.as_ref().to_path_buf();
        tokio::fs::create_dir_all(&dir).await?;
        Ok(FileJobQueue { dir })
    }

    fn request_path(&self, id: &uuid::Uuid) -> PathBuf {
        self.dir.join(format!("{}.json", id))
    }

    fn done_path(&self, id: &uuid::Uuid) -> PathBuf {
        self.dir.join(format!("{}.done", id))
    }
}

fn parse_id(id: &str) -> Result<uuid::Uuid, JobError> {
    uuid::Uuid::parse_str(id).map_err(|_| JobError::InvalidId(id.to_string()))
}

async fn exists(path: &Path) -> Result<bool, JobError> {
    match tokio::fs::metadata(path).await {
        Ok(_) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}

async fn remove_if_present(path: &Path) -> Result<(), JobError> {
    match tokio::fs::remove_file(path).await {
        Err(e) if e.kind() != ErrorKind::NotFound => Err(e.into()),
        _ => Ok(()),
    }
}

#[async_trait]
impl JobQueue for FileJobQueue {
    async fn enqueue(&self, job: &JobRequest) -> Result<String, JobError> {
        let id = uuid::Uuid::new_v4();
        let bytes = serde_json::to_vec(job)?;
        tokio::fs::write(self.request_path(&id), bytes).await?;
        tracing::debug!(job = %id, method = %job.method, path = %job.path, "job queued");
        Ok(id.to_string())
    }

    async fn status(&self, id: &str) -> Result<JobStatus, JobError> {
        let id = parse_id(id)?;
        if exists(&self.done_path(&id)).await? {
            remove_if_present(&self.done_path(&id)).await?;
            remove_if_present(&self.request_path(&id)).await?;
            return Ok(JobStatus::Done);
        }
        if exists(&self.request_path(&id)).await? {
            return Ok(JobStatus::Pending);
        }
        Ok(JobStatus::NotFound)
    }

    async fn complete(&self, id: &str, outcome: &Value) -> Result<(), JobError> {
        let id = parse_id(id)?;
        let bytes = serde_json::to_vec(outcome)?;
        tokio::fs::write(self.done_path(&id), bytes).await?;
        tracing::debug!(job = %id, "job completed");
        Ok(())
    }

    async fn pending(&self) -> Result<Vec<(String, JobRequest)>, JobError> {
        let mut found = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Some(id) = path
                .file_stem()
                .and_then(|s| s.to_str())
                .and_then(|s| uuid::Uuid::parse_str(s).ok())
            else {
                continue;
            };
            if exists(&self.done_path(&id)).await? {
                continue;
            }
            let modified = entry.metadata().await?.modified()?;
            let bytes = tokio::fs::read(&path).await?;
            match serde_json::from_slice::<JobRequest>(&bytes) {
                Ok(job) => found.push((modified, id.to_string(), job)),
                Err(e) => tracing::warn!(job = %id, error = %e, "skipping unreadable job"),
            }
        }
        found.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(&b.1)));
        Ok(found.into_iter().map(|(_, id, job)| (id, job)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request() -> JobRequest {
        let ctx = RequestContext::new(Method::Post, "/q2/v1/books?x=1").with_param("title", "Dune");
        JobRequest::from_context(&ctx)
    }

    #[tokio::test]
    async fn test_job_lifecycle() {
        let dir = tempfile::tempdir().unwrap();
        let queue = FileJobQueue::open(dir.path().join("jobs")).await.unwrap();
        let id = queue.enqueue(&request()).await.unwrap();

        assert_eq!(queue.status(&id).await.unwrap(), JobStatus::Pending);
        queue.complete(&id, &json!({"err": false})).await.unwrap();
        assert_eq!(queue.status(&id).await.unwrap(), JobStatus::Done);
        assert_eq!(queue.status(&id).await.unwrap(), JobStatus::NotFound);
    }

    #[tokio::test]
    async fn test_pending_skips_completed_jobs() {
        let dir = tempfile::tempdir().unwrap();
        let queue = FileJobQueue::open(dir.path()).await.unwrap();
        let first = queue.enqueue(&request()).await.unwrap();
        let second = queue.enqueue(&request()).await.unwrap();
        queue.complete(&first, &json!({"err": false})).await.unwrap();
        tokio::fs::write(dir.path().join("notes.json"), b"{}").await.unwrap();

        let pending = queue.pending().await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].0, second);
        assert_eq!(pending[0].1, request());
    }

    #[tokio::test]
    async fn test_invalid_id() {
        let dir = tempfile::tempdir().unwrap();
        let queue = FileJobQueue::open(dir.path()).await.unwrap();
        assert!(matches!(
            queue.status("../etc/passwd").await,
            Err(JobError::InvalidId(_))
        ));
    }

    #[test]
    fn test_request_roundtrip_to_context() {
        let ctx = request().into_context().unwrap();
        assert_eq!(ctx.method, Method::Post);
        assert_eq!(ctx.query.as_deref(), Some("x=1"));
        assert_eq!(ctx.uri.tables, vec!["books"]);
        assert_eq!(ctx.params.get("title").map(String::as_str), Some("Dune"));
    }
}
