use crate::error::GhError;
use crate::repo::Repo;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::future::Future;
use std::process::Stdio;
use tokio::process::Command;

/// Remote operations the orchestrator needs from GitHub.
///
/// Every call either returns its value or fails with the message `gh`
/// reported. Implementations must be cheap to share across tasks.
pub trait Provider: Send + Sync + 'static {
    fn check_auth(&self) -> impl Future<Output = Result<(), GhError>> + Send;

    fn current_user(&self) -> impl Future<Output = Result<String, GhError>> + Send;

    /// Every repository owned by the viewer. Pages until exhausted; partial
    /// results are never returned.
    fn list_repos(&self) -> impl Future<Output = Result<Vec<Repo>, GhError>> + Send;

    fn archive(&self, full_name: &str) -> impl Future<Output = Result<(), GhError>> + Send;

    fn unarchive(&self, full_name: &str) -> impl Future<Output = Result<(), GhError>> + Send;

    fn delete(&self, full_name: &str) -> impl Future<Output = Result<(), GhError>> + Send;

    fn open_in_browser(&self, full_name: &str) -> impl Future<Output = Result<(), GhError>> + Send;
}

const REPOS_QUERY: &str = r#"
query($cursor: String) {
  viewer {
    repositories(first: 100, after: $cursor, ownerAffiliations: [OWNER]) {
      pageInfo {
        hasNextPage
        endCursor
      }
      nodes {
        name
        nameWithOwner
        description
        url
        sshUrl
        isPrivate
        isArchived
        isFork
        isTemplate
        stargazerCount
        forkCount
        issues(states: OPEN) { totalCount }
        primaryLanguage { name }
        createdAt
        updatedAt
        pushedAt
        diskUsage
      }
    }
  }
}
"#;

// GraphQL response types
#[derive(Debug, Deserialize)]
struct GraphQLResponse {
    data: Option<GraphQLData>,
}

#[derive(Debug, Deserialize)]
struct GraphQLData {
    viewer: Viewer,
}

#[derive(Debug, Deserialize)]
struct Viewer {
    repositories: RepositoryConnection,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RepositoryConnection {
    page_info: PageInfo,
    nodes: Vec<RepositoryNode>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PageInfo {
    has_next_page: bool,
    end_cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RepositoryNode {
    name: String,
    name_with_owner: String,
    description: Option<String>,
    url: String,
    ssh_url: String,
    is_private: bool,
    is_archived: bool,
    is_fork: bool,
    is_template: bool,
    stargazer_count: u32,
    fork_count: u32,
    issues: TotalCount,
    primary_language: Option<Language>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    // null for repositories that were never pushed to
    pushed_at: Option<DateTime<Utc>>,
    disk_usage: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TotalCount {
    total_count: u32,
}

#[derive(Debug, Deserialize)]
struct Language {
    name: String,
}

impl From<RepositoryNode> for Repo {
    fn from(node: RepositoryNode) -> Self {
        Repo {
            name: node.name,
            full_name: node.name_with_owner,
            description: node.description.unwrap_or_default(),
            url: node.url,
            ssh_url: node.ssh_url,
            is_private: node.is_private,
            is_archived: node.is_archived,
            is_fork: node.is_fork,
            is_template: node.is_template,
            stargazer_count: node.stargazer_count,
            fork_count: node.fork_count,
            open_issues: node.issues.total_count,
            primary_language: node.primary_language.map(|l| l.name),
            created_at: node.created_at,
            updated_at: node.updated_at,
            pushed_at: node.pushed_at.unwrap_or(node.created_at),
            disk_usage: node.disk_usage.unwrap_or(0),
            selected: false,
        }
    }
}

/// One page of the viewer's repositories.
#[derive(Debug)]
pub struct RepoPage {
    pub repos: Vec<Repo>,
    /// Cursor for the following page, `None` on the last page.
    pub next_cursor: Option<String>,
}

pub fn parse_repo_page(raw: &[u8]) -> Result<RepoPage, GhError> {
    let response: GraphQLResponse = serde_json::from_slice(raw)?;
    let connection = response.data.ok_or(GhError::MissingData)?.viewer.repositories;

    let next_cursor = if connection.page_info.has_next_page {
        connection.page_info.end_cursor
    } else {
        None
    };

    Ok(RepoPage {
        repos: connection.nodes.into_iter().map(Repo::from).collect(),
        next_cursor,
    })
}

/// `Provider` backed by the GitHub CLI.
#[derive(Debug, Default, Clone)]
pub struct GhCli;

impl GhCli {
    pub fn new() -> Self {
        Self
    }
}

async fn run_gh(args: &[&str]) -> Result<Vec<u8>, GhError> {
    tracing::debug!(args = ?args, "running gh");
    let output = Command::new("gh").args(args).output().await?;

    if !output.status.success() {
        return Err(GhError::Command {
            command: args.iter().take(2).copied().collect::<Vec<_>>().join(" "),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    Ok(output.stdout)
}

async fn repo_action(verb: &'static str, repo: &str, args: &[&str]) -> Result<(), GhError> {
    match run_gh(args).await {
        Ok(_) => Ok(()),
        Err(GhError::Command { stderr, .. }) => Err(GhError::Action {
            verb,
            repo: repo.to_string(),
            stderr,
        }),
        Err(e) => Err(e),
    }
}

impl Provider for GhCli {
    async fn check_auth(&self) -> Result<(), GhError> {
        match run_gh(&["auth", "status"]).await {
            Ok(_) => Ok(()),
            Err(GhError::Command { stderr, .. }) => Err(GhError::NotAuthenticated(stderr)),
            Err(e) => Err(e),
        }
    }

    async fn current_user(&self) -> Result<String, GhError> {
        let stdout = run_gh(&["api", "user", "--jq", ".login"]).await?;
        Ok(String::from_utf8_lossy(&stdout).trim().to_string())
    }

    async fn list_repos(&self) -> Result<Vec<Repo>, GhError> {
        let query_arg = format!("query={}", REPOS_QUERY);
        let mut all = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let cursor_arg = cursor.as_ref().map(|c| format!("cursor={}", c));
            let mut args = vec!["api", "graphql", "-f", query_arg.as_str()];
            if let Some(ref arg) = cursor_arg {
                args.push("-f");
                args.push(arg);
            }

            let stdout = run_gh(&args).await?;
            let page = parse_repo_page(&stdout)?;
            tracing::debug!(count = page.repos.len(), "fetched repository page");
            all.extend(page.repos);

            match page.next_cursor {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }

        tracing::info!(count = all.len(), "listed repositories");
        Ok(all)
    }

    async fn archive(&self, full_name: &str) -> Result<(), GhError> {
        repo_action("archive", full_name, &["repo", "archive", full_name, "--yes"]).await
    }

    async fn unarchive(&self, full_name: &str) -> Result<(), GhError> {
        repo_action("unarchive", full_name, &["repo", "unarchive", full_name, "--yes"]).await
    }

    async fn delete(&self, full_name: &str) -> Result<(), GhError> {
        repo_action("delete", full_name, &["repo", "delete", full_name, "--yes"]).await
    }

    async fn open_in_browser(&self, full_name: &str) -> Result<(), GhError> {
        // Output would land on the terminal the TUI owns
        let status = Command::new("gh")
            .args(["repo", "view", full_name, "--web"])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await?;

        if !status.success() {
            return Err(GhError::Action {
                verb: "open",
                repo: full_name.to_string(),
                stderr: format!("gh exited with {}", status),
            });
        }
        Ok(())
    }
}
