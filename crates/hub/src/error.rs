/// Errors from the dataset hub client.
#[derive(Debug, thiserror::Error)]
pub enum HubError {
    /// The HTTP request itself failed (network, DNS, TLS, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The hub rejected the access token (401 or 403).
    #[error("Hub rejected the access token")]
    InvalidToken,

    /// A dataset repository with this id already exists.
    #[error("Dataset repository '{repo_id}' already exists")]
    NameCollision { repo_id: String },

    /// The repository id is not of the form `name` or `namespace/name`.
    #[error("Invalid dataset repository id '{0}'")]
    InvalidRepoId(String),

    /// The commit payload could not be encoded.
    #[error("Failed to encode commit payload: {0}")]
    Encode(#[from] serde_json::Error),

    /// The hub returned any other non-2xx status code.
    #[error("Hub API error ({status}): {body}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },
}

/// Which request a failed status belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HubStep<'a> {
    /// Repository creation; a conflict names the colliding repository.
    CreateRepo { repo_id: &'a str },
    Commit,
}

/// Map a non-2xx status to the matching error.
pub fn classify_status(status: u16, body: String, step: HubStep<'_>) -> HubError {
    match (status, step) {
        (401 | 403, _) => HubError::InvalidToken,
        (409, HubStep::CreateRepo { repo_id }) => HubError::NameCollision {
            repo_id: repo_id.to_string(),
        },
        _ => HubError::Api { status, body },
    }
}
