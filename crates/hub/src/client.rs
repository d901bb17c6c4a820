//! REST client for the dataset hub.
//!
//! Publishing is two requests:
//! 1. `POST {base}/api/repos/create` creates the dataset repository.
//! 2. `POST {base}/api/datasets/{repo_id}/commit/main` commits the files as
//!    an NDJSON stream (one header line, one line per file, base64 content).

use base64::{engine::general_purpose, Engine as _};
use serde::{Deserialize, Serialize};

use crate::error::{classify_status, HubError, HubStep};

/// HTTP client for one hub deployment.
pub struct HubClient {
    client: reqwest::Client,
    base_url: String,
}

/// Where and how to publish.
#[derive(Debug, Clone)]
pub struct DatasetTarget {
    /// `name` or `namespace/name`.
    pub repo_id: String,
    pub token: String,
    pub private: bool,
    /// Treat an existing repository as success instead of a collision.
    pub exist_ok: bool,
}

/// One file to commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HubFile {
    pub path_in_repo: String,
    pub content: Vec<u8>,
}

/// Commit metadata returned by the hub.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitInfo {
    #[serde(rename = "commitUrl", default)]
    pub commit_url: Option<String>,
    #[serde(rename = "commitOid", default)]
    pub commit_oid: Option<String>,
}

/// Result of a successful push.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PushOutcome {
    pub repo_id: String,
    /// `false` when the repository already existed (`exist_ok`).
    pub created: bool,
    pub files: usize,
    pub commit: CommitInfo,
}

impl HubClient {
    /// Create a client for the hub at `base_url`, e.g. `https://huggingface.co`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    /// Create a client reusing an existing [`reqwest::Client`].
    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Create the dataset repository (if needed) and commit `files` to `main`.
    pub async fn push_jsonl(
        &self,
        target: &DatasetTarget,
        files: &[HubFile],
    ) -> Result<PushOutcome, HubError> {
        let created = self.create_repo(target).await?;
        let message = format!("Upload {} file(s) from annotation export", files.len());
        let commit = self
            .commit_files(&target.repo_id, &target.token, &message, files)
            .await?;

        tracing::info!(
            repo_id = %target.repo_id,
            created,
            files = files.len(),
            "Pushed export to dataset hub",
        );

        Ok(PushOutcome {
            repo_id: target.repo_id.clone(),
            created,
            files: files.len(),
            commit,
        })
    }

    /// Create the dataset repository. Returns `false` if it already existed
    /// and the target allows that.
    pub async fn create_repo(&self, target: &DatasetTarget) -> Result<bool, HubError> {
        let (organization, name) = split_repo_id(&target.repo_id)?;

        let mut body = serde_json::json!({
            "type": "dataset",
            "name": name,
            "private": target.private,
        });
        if let Some(org) = organization {
            body["organization"] = serde_json::Value::String(org.to_string());
        }

        let response = self
            .client
            .post(format!("{}/api/repos/create", self.base_url))
            .bearer_auth(&target.token)
            .json(&body)
            .send()
            .await?;

        let step = HubStep::CreateRepo {
            repo_id: &target.repo_id,
        };
        match Self::ensure_success(response, step).await {
            Ok(_) => Ok(true),
            Err(HubError::NameCollision { .. }) if target.exist_ok => {
                tracing::debug!(repo_id = %target.repo_id, "Dataset repository already exists");
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    /// Commit files to the `main` branch of an existing repository.
    pub async fn commit_files(
        &self,
        repo_id: &str,
        token: &str,
        message: &str,
        files: &[HubFile],
    ) -> Result<CommitInfo, HubError> {
        split_repo_id(repo_id)?;
        let payload = build_commit_payload(message, files)?;

        let response = self
            .client
            .post(format!("{}/api/datasets/{repo_id}/commit/main", self.base_url))
            .bearer_auth(token)
            .header(reqwest::header::CONTENT_TYPE, "application/x-ndjson")
            .body(payload)
            .send()
            .await?;

        let response = Self::ensure_success(response, HubStep::Commit).await?;
        let text = response.text().await?;
        if text.trim().is_empty() {
            return Ok(CommitInfo::default());
        }
        Ok(serde_json::from_str(&text)?)
    }

    // ---- private helpers ----

    /// Return the response unchanged on success, or the classified error
    /// with the body text on failure.
    async fn ensure_success(
        response: reqwest::Response,
        step: HubStep<'_>,
    ) -> Result<reqwest::Response, HubError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(classify_status(status.as_u16(), body, step));
        }
        Ok(response)
    }
}

/// Split `namespace/name` into its parts. A bare `name` has no namespace.
pub fn split_repo_id(repo_id: &str) -> Result<(Option<&str>, &str), HubError> {
    let valid_part = |s: &str| {
        !s.is_empty()
            && s
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
    };

    let (namespace, name) = match repo_id.split_once('/') {
        Some((ns, name)) => (Some(ns), name),
        None => (None, repo_id),
    };

    if !valid_part(name) || namespace.is_some_and(|ns| !valid_part(ns)) {
        return Err(HubError::InvalidRepoId(repo_id.to_string()));
    }
    Ok((namespace, name))
}

/// Build the NDJSON commit body: a header line, then one line per file.
pub fn build_commit_payload(message: &str, files: &[HubFile]) -> Result<String, HubError> {
    let mut lines = Vec::with_capacity(files.len() + 1);
    lines.push(serde_json::to_string(&serde_json::json!({
        "key": "header",
        "value": { "summary": message, "description": "" },
    }))?);
    for file in files {
        lines.push(serde_json::to_string(&serde_json::json!({
            "key": "file",
            "value": {
                "path": file.path_in_repo,
                "encoding": "base64",
                "content": general_purpose::STANDARD.encode(&file.content),
            },
        }))?);
    }
    Ok(lines.join("\n"))
}
