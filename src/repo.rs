use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Inactivity thresholds (in days) cycled by the `5` key. 0 disables the filter.
pub const INACTIVE_DAY_OPTIONS: [u32; 6] = [0, 30, 90, 180, 365, 730];

/// A GitHub repository as loaded from the API or the cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Repo {
    pub name: String,
    #[serde(rename = "nameWithOwner")]
    pub full_name: String,
    #[serde(default)]
    pub description: String,
    pub url: String,
    pub ssh_url: String,
    pub is_private: bool,
    pub is_archived: bool,
    pub is_fork: bool,
    pub is_template: bool,
    pub stargazer_count: u32,
    pub fork_count: u32,
    pub open_issues: u32,
    #[serde(default)]
    pub primary_language: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub pushed_at: DateTime<Utc>,
    /// Size in KB
    pub disk_usage: u64,
    // Multi-select state, never persisted
    #[serde(skip)]
    pub selected: bool,
}

impl Repo {
    pub fn days_since_push(&self, now: DateTime<Utc>) -> i64 {
        (now - self.pushed_at).num_days()
    }

    pub fn size_string(&self) -> String {
        let kb = self.disk_usage;
        if kb < 1024 {
            return format!("{} KB", kb);
        }
        let mb = kb as f64 / 1024.0;
        if mb < 1024.0 {
            return format!("{:.1} MB", mb);
        }
        format!("{:.2} GB", mb / 1024.0)
    }

    pub fn visibility_label(&self) -> &'static str {
        if self.is_private {
            "Private"
        } else {
            "Public"
        }
    }

    pub fn status_label(&self) -> String {
        let mut parts = Vec::new();
        if self.is_archived {
            parts.push("Archived");
        }
        if self.is_fork {
            parts.push("Fork");
        }
        if self.is_template {
            parts.push("Template");
        }
        if parts.is_empty() {
            "-".to_string()
        } else {
            parts.join(", ")
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortField {
    Name,
    Updated,
    Created,
    Stars,
    Forks,
    Size,
}

impl SortField {
    pub fn next(self) -> Self {
        match self {
            SortField::Name => SortField::Updated,
            SortField::Updated => SortField::Created,
            SortField::Created => SortField::Stars,
            SortField::Stars => SortField::Forks,
            SortField::Forks => SortField::Size,
            SortField::Size => SortField::Name,
        }
    }

    fn compare(self, a: &Repo, b: &Repo) -> Ordering {
        match self {
            SortField::Name => a.name.cmp(&b.name),
            SortField::Updated => a.updated_at.cmp(&b.updated_at),
            SortField::Created => a.created_at.cmp(&b.created_at),
            SortField::Stars => a.stargazer_count.cmp(&b.stargazer_count),
            SortField::Forks => a.fork_count.cmp(&b.fork_count),
            SortField::Size => a.disk_usage.cmp(&b.disk_usage),
        }
    }
}

impl fmt::Display for SortField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SortField::Name => "Name",
            SortField::Updated => "Last Updated",
            SortField::Created => "Created",
            SortField::Stars => "Stars",
            SortField::Forks => "Forks",
            SortField::Size => "Size",
        };
        f.write_str(label)
    }
}

/// Filter and sort criteria for the repository list.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterOptions {
    pub show_archived: bool,
    pub show_private: bool,
    pub show_public: bool,
    pub show_forks: bool,
    pub language: Option<String>,
    pub min_stars: Option<u32>,
    pub max_stars: Option<u32>,
    /// Only keep repos not pushed to in this many days (0 = off)
    pub inactive_for_days: u32,
    pub search_query: String,
    pub sort_by: SortField,
    pub sort_desc: bool,
}

impl Default for FilterOptions {
    fn default() -> Self {
        Self {
            show_archived: false,
            show_private: true,
            show_public: true,
            show_forks: true,
            language: None,
            min_stars: None,
            max_stars: None,
            inactive_for_days: 0,
            search_query: String::new(),
            sort_by: SortField::Updated,
            sort_desc: true,
        }
    }
}

impl FilterOptions {
    /// Whether a single repo passes every predicate. `cutoff` is the
    /// inactivity boundary, `None` when the inactivity filter is off.
    fn matches(&self, repo: &Repo, cutoff: Option<DateTime<Utc>>, query: &str) -> bool {
        if repo.is_archived && !self.show_archived {
            return false;
        }

        // Both toggles off hides everything
        if repo.is_private && !self.show_private {
            return false;
        }
        if !repo.is_private && !self.show_public {
            return false;
        }

        if repo.is_fork && !self.show_forks {
            return false;
        }

        if let Some(ref lang) = self.language {
            let matches_lang = repo
                .primary_language
                .as_deref()
                .map(|l| l.eq_ignore_ascii_case(lang))
                .unwrap_or(false);
            if !matches_lang {
                return false;
            }
        }

        if self.min_stars.is_some_and(|min| repo.stargazer_count < min) {
            return false;
        }
        if self.max_stars.is_some_and(|max| repo.stargazer_count > max) {
            return false;
        }

        if let Some(cutoff) = cutoff {
            if repo.pushed_at > cutoff {
                return false;
            }
        }

        if !query.is_empty()
            && !repo.name.to_lowercase().contains(query)
            && !repo.description.to_lowercase().contains(query)
        {
            return false;
        }

        true
    }
}

/// Indices of the repos passing `opts`, in input order.
pub fn filter_indices(repos: &[Repo], opts: &FilterOptions, now: DateTime<Utc>) -> Vec<usize> {
    let cutoff = (opts.inactive_for_days > 0)
        .then(|| now - TimeDelta::days(i64::from(opts.inactive_for_days)));
    let query = opts.search_query.to_lowercase();

    repos
        .iter()
        .enumerate()
        .filter(|(_, r)| opts.matches(r, cutoff, &query))
        .map(|(idx, _)| idx)
        .collect()
}

/// Stable sort of a view (indices into `repos`). Equal keys keep their
/// relative order in both directions.
pub fn sort_indices(repos: &[Repo], indices: &mut [usize], field: SortField, desc: bool) {
    indices.sort_by(|&a, &b| {
        let ord = field.compare(&repos[a], &repos[b]);
        if desc {
            ord.reverse()
        } else {
            ord
        }
    });
}

pub fn next_inactive_days(current: u32) -> u32 {
    INACTIVE_DAY_OPTIONS
        .iter()
        .position(|&d| d == current)
        .map(|i| INACTIVE_DAY_OPTIONS[(i + 1) % INACTIVE_DAY_OPTIONS.len()])
        .unwrap_or(0)
}
