use crate::app::Action;
use crate::cache::Cache;
use crate::error::GhError;
use crate::github::Provider;
use crate::repo::Repo;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;

/// Outcome of one finished operation, folded into `App` exactly once.
#[derive(Debug, Clone, PartialEq)]
pub enum OpResult {
    /// Initial load from the API, or a forced refresh
    Loaded { username: String, repos: Vec<Repo> },
    CacheLoaded {
        username: String,
        repos: Vec<Repo>,
        fresh: bool,
    },
    BackgroundRefreshed { repos: Vec<Repo> },
    Failed(String),
    Archived(String),
    Unarchived(String),
    Deleted(String),
    Notice(String),
}

impl OpResult {
    pub fn kind(&self) -> &'static str {
        match self {
            OpResult::Loaded { .. } => "loaded",
            OpResult::CacheLoaded { .. } => "cache_loaded",
            OpResult::BackgroundRefreshed { .. } => "background_refreshed",
            OpResult::Failed(_) => "failed",
            OpResult::Archived(_) => "archived",
            OpResult::Unarchived(_) => "unarchived",
            OpResult::Deleted(_) => "deleted",
            OpResult::Notice(_) => "notice",
        }
    }
}

/// Runs `Action`s off the UI loop and reports back over one channel.
///
/// Every dispatched action gets its own task. Tasks share nothing but the
/// provider and cache handles, so they may finish in any order.
pub struct Orchestrator<P> {
    provider: Arc<P>,
    cache: Arc<Cache>,
    tx: UnboundedSender<OpResult>,
    use_cache: bool,
}

impl<P: Provider> Orchestrator<P> {
    pub fn new(provider: P, cache: Cache, tx: UnboundedSender<OpResult>, use_cache: bool) -> Self {
        Self {
            provider: Arc::new(provider),
            cache: Arc::new(cache),
            tx,
            use_cache,
        }
    }

    pub fn dispatch(&self, action: Action) {
        tracing::debug!(?action, "dispatching");
        let provider = Arc::clone(&self.provider);
        let cache = Arc::clone(&self.cache);
        let tx = self.tx.clone();
        let use_cache = self.use_cache;

        tokio::spawn(async move {
            let result = match action {
                Action::StartupLoad => Some(startup_load(&*provider, &cache, use_cache).await),
                Action::BackgroundRefresh { username } => {
                    background_refresh(&*provider, &cache, &username).await
                }
                Action::ForceRefresh => Some(force_refresh(&*provider, &cache).await),
                Action::Archive(name) => Some(match provider.archive(&name).await {
                    Ok(()) => OpResult::Archived(name),
                    Err(e) => failed(e),
                }),
                Action::Unarchive(name) => Some(match provider.unarchive(&name).await {
                    Ok(()) => OpResult::Unarchived(name),
                    Err(e) => failed(e),
                }),
                Action::Delete(name) => Some(match provider.delete(&name).await {
                    Ok(()) => OpResult::Deleted(name),
                    Err(e) => failed(e),
                }),
                Action::OpenInBrowser(name) => {
                    let _ = tx.send(OpResult::Notice("Opening in browser...".to_string()));
                    if let Err(e) = provider.open_in_browser(&name).await {
                        tracing::warn!(repo = %name, error = %e, "open in browser failed");
                    }
                    None
                }
            };

            if let Some(result) = result {
                // A closed channel means the UI has already exited
                let _ = tx.send(result);
            }
        });
    }
}

fn failed(err: GhError) -> OpResult {
    tracing::warn!(error = %err, "operation failed");
    OpResult::Failed(err.to_string())
}

async fn save_best_effort(cache: &Cache, username: &str, repos: &[Repo]) {
    if let Err(e) = cache.save(username, repos).await {
        tracing::warn!(error = %e, "failed to save repo cache");
    }
}

/// Authenticate, then serve from cache if possible, else from the API.
async fn startup_load<P: Provider>(provider: &P, cache: &Cache, use_cache: bool) -> OpResult {
    if let Err(e) = provider.check_auth().await {
        return failed(e);
    }

    let username = match provider.current_user().await {
        Ok(username) => username,
        Err(e) => return failed(e),
    };

    if use_cache {
        match cache.load(&username).await {
            Ok(Some(hit)) => {
                return OpResult::CacheLoaded {
                    username,
                    repos: hit.repos,
                    fresh: hit.fresh,
                }
            }
            Ok(None) => {}
            Err(e) => tracing::warn!(error = %e, "cache unreadable, fetching"),
        }
    }

    match provider.list_repos().await {
        Ok(repos) => {
            save_best_effort(cache, &username, &repos).await;
            OpResult::Loaded { username, repos }
        }
        Err(e) => failed(e),
    }
}

/// Unsolicited refresh after a stale cache hit. Failures produce no result.
async fn background_refresh<P: Provider>(
    provider: &P,
    cache: &Cache,
    username: &str,
) -> Option<OpResult> {
    match provider.list_repos().await {
        Ok(repos) => {
            save_best_effort(cache, username, &repos).await;
            Some(OpResult::BackgroundRefreshed { repos })
        }
        Err(e) => {
            tracing::debug!(error = %e, "background refresh failed");
            None
        }
    }
}

async fn force_refresh<P: Provider>(provider: &P, cache: &Cache) -> OpResult {
    let username = match provider.current_user().await {
        Ok(username) => username,
        Err(e) => return failed(e),
    };

    match provider.list_repos().await {
        Ok(repos) => {
            save_best_effort(cache, &username, &repos).await;
            OpResult::Loaded { username, repos }
        }
        Err(e) => failed(e),
    }
}
