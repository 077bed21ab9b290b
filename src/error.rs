use thiserror::Error;

/// Errors reported by the GitHub data provider.
///
/// The provider only ever hands back a message string from `gh`; these
/// variants carry enough context to turn that into a status line.
#[derive(Debug, Error)]
pub enum GhError {
    #[error("not authenticated with gh CLI: {0}")]
    NotAuthenticated(String),

    #[error("failed to execute gh: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("gh {command} failed: {stderr}")]
    Command { command: String, stderr: String },

    /// A per-repository action (archive, delete, ...) was rejected.
    #[error("failed to {verb} {repo}: {stderr}")]
    Action {
        verb: &'static str,
        repo: String,
        stderr: String,
    },

    #[error("failed to parse gh response: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("no data in GraphQL response")]
    MissingData,
}
