use crate::orchestrator::OpResult;
use crate::repo::{self, FilterOptions, Repo};
use chrono::Utc;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use std::collections::HashSet;

/// Rows drawn around the repository table: title, filter summary, table
/// borders and header, status line and key hints. Search entry adds one.
const CHROME_ROWS: usize = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    List,
    Filter,
    Detail,
    ConfirmArchive,
    ConfirmDelete,
    Help,
}

/// Asynchronous work requested by a key press or a fold.
///
/// The event loop hands these to the orchestrator; none of them are awaited
/// by the state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    StartupLoad,
    BackgroundRefresh { username: String },
    ForceRefresh,
    Archive(String),
    Unarchive(String),
    Delete(String),
    OpenInBrowser(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusMessage {
    pub text: String,
    pub is_error: bool,
}

pub struct App {
    pub username: Option<String>,

    // Data
    pub repos: Vec<Repo>,
    /// Filtered and sorted view, as indices into `repos`
    pub visible: Vec<usize>,
    pub filter_opts: FilterOptions,
    default_filter: FilterOptions,

    // Selection
    pub cursor: usize,
    pub offset: usize,
    /// Repo the Detail screen was opened on, by `full_name`
    detail_target: Option<String>,

    // UI state
    pub screen: Screen,
    pub searching: bool,
    pub loading: bool,
    /// Set once any load has succeeded
    pub loaded: bool,
    pub fatal_error: Option<String>,
    pub message: Option<StatusMessage>,
    pub viewport_height: u16,
    pub should_quit: bool,
}

impl App {
    pub fn new(filter_opts: FilterOptions) -> Self {
        Self {
            username: None,
            repos: Vec::new(),
            visible: Vec::new(),
            default_filter: filter_opts.clone(),
            filter_opts,
            cursor: 0,
            offset: 0,
            detail_target: None,
            screen: Screen::List,
            searching: false,
            loading: true,
            loaded: false,
            fatal_error: None,
            message: None,
            viewport_height: 24,
            should_quit: false,
        }
    }

    pub fn set_viewport_height(&mut self, height: u16) {
        self.viewport_height = height;
        self.adjust_offset();
    }

    pub fn visible_rows(&self) -> usize {
        let chrome = CHROME_ROWS + usize::from(self.searching);
        (self.viewport_height as usize).saturating_sub(chrome).max(1)
    }

    pub fn visible_repos(&self) -> impl Iterator<Item = &Repo> + '_ {
        self.visible.iter().map(|&idx| &self.repos[idx])
    }

    pub fn current_repo(&self) -> Option<&Repo> {
        self.current_index().map(|idx| &self.repos[idx])
    }

    fn current_index(&self) -> Option<usize> {
        self.visible.get(self.cursor).copied()
    }

    /// The repo shown on the Detail screen, while it is still in the view.
    pub fn detail_repo(&self) -> Option<&Repo> {
        self.detail_index().map(|idx| &self.repos[idx])
    }

    fn detail_index(&self) -> Option<usize> {
        let target = self.detail_target.as_deref()?;
        self.visible
            .iter()
            .copied()
            .find(|&idx| self.repos[idx].full_name == target)
    }

    pub fn selected_count(&self) -> usize {
        self.repos.iter().filter(|r| r.selected).count()
    }

    /// Repos the archive confirmation acts on
    pub fn archive_targets(&self) -> Vec<&Repo> {
        self.repos
            .iter()
            .filter(|r| r.selected && !r.is_archived)
            .collect()
    }

    /// Repos the delete confirmation acts on
    pub fn delete_targets(&self) -> Vec<&Repo> {
        self.repos.iter().filter(|r| r.selected).collect()
    }

    fn set_info(&mut self, text: impl Into<String>) {
        self.message = Some(StatusMessage {
            text: text.into(),
            is_error: false,
        });
    }

    fn set_error(&mut self, text: impl Into<String>) {
        self.message = Some(StatusMessage {
            text: text.into(),
            is_error: true,
        });
    }

    // Key handling

    pub fn handle_key(&mut self, key: KeyEvent) -> Vec<Action> {
        let ctrl_c =
            key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL);

        // Startup failed: nothing to do but leave
        if self.fatal_error.is_some() {
            if ctrl_c || matches!(key.code, KeyCode::Char('q') | KeyCode::Esc) {
                self.should_quit = true;
            }
            return Vec::new();
        }

        let quit_key = ctrl_c || key.code == KeyCode::Char('q');
        if self.screen == Screen::List && !self.searching && quit_key {
            self.should_quit = true;
            return Vec::new();
        }
        if ctrl_c {
            return Vec::new();
        }

        match self.screen {
            Screen::List => self.handle_list_key(key),
            Screen::Filter => self.handle_filter_key(key),
            Screen::Detail => self.handle_detail_key(key),
            Screen::ConfirmArchive | Screen::ConfirmDelete => self.handle_confirm_key(key),
            Screen::Help => {
                if matches!(key.code, KeyCode::Esc | KeyCode::Char('q') | KeyCode::Char('?')) {
                    self.screen = Screen::List;
                }
                Vec::new()
            }
        }
    }

    fn handle_list_key(&mut self, key: KeyEvent) -> Vec<Action> {
        if self.searching {
            self.handle_search_key(key);
            return Vec::new();
        }

        match key.code {
            KeyCode::Up | KeyCode::Char('k') => self.previous(),
            KeyCode::Down | KeyCode::Char('j') => self.next(),
            KeyCode::PageUp => self.page_up(),
            KeyCode::PageDown => self.page_down(),
            KeyCode::Home | KeyCode::Char('g') => self.first(),
            KeyCode::End | KeyCode::Char('G') => self.last(),
            KeyCode::Esc => self.message = None,

            KeyCode::Char('/') => {
                self.searching = true;
                self.adjust_offset();
            }
            KeyCode::Char('f') => self.screen = Screen::Filter,
            KeyCode::Char('?') => self.screen = Screen::Help,
            KeyCode::Enter | KeyCode::Char('l') => {
                if let Some(repo) = self.current_repo() {
                    self.detail_target = Some(repo.full_name.clone());
                    self.screen = Screen::Detail;
                }
            }

            KeyCode::Char(' ') | KeyCode::Char('x') => self.toggle_current(),
            KeyCode::Char('A') => self.select_all_visible(),
            KeyCode::Char('D') => self.deselect_all(),
            KeyCode::Char('a') => self.start_confirm(Screen::ConfirmArchive),
            KeyCode::Char('d') => self.start_confirm(Screen::ConfirmDelete),

            KeyCode::Char('o') => {
                if let Some(repo) = self.current_repo() {
                    return vec![Action::OpenInBrowser(repo.full_name.clone())];
                }
            }
            KeyCode::Char('r') => {
                self.set_info("Refreshing repositories...");
                return vec![Action::ForceRefresh];
            }

            KeyCode::Char(c) => {
                self.apply_option_key(c);
            }
            _ => {}
        }
        Vec::new()
    }

    fn handle_search_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Enter | KeyCode::Esc => self.searching = false,
            KeyCode::Backspace => {
                self.filter_opts.search_query.pop();
                self.apply_filters();
            }
            KeyCode::Char(c) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.filter_opts.search_query.push(c);
                self.apply_filters();
            }
            _ => {}
        }
    }

    fn handle_filter_key(&mut self, key: KeyEvent) -> Vec<Action> {
        match key.code {
            KeyCode::Esc | KeyCode::Char('f') | KeyCode::Char('q') => self.screen = Screen::List,
            KeyCode::Char('r') => {
                self.filter_opts = self.default_filter.clone();
                self.apply_filters();
            }
            KeyCode::Char(c) => {
                self.apply_option_key(c);
            }
            _ => {}
        }
        Vec::new()
    }

    fn handle_detail_key(&mut self, key: KeyEvent) -> Vec<Action> {
        match key.code {
            KeyCode::Esc | KeyCode::Char('h') | KeyCode::Char('q') => self.return_to_list(),
            KeyCode::Char('o') => {
                if let Some(repo) = self.detail_repo() {
                    return vec![Action::OpenInBrowser(repo.full_name.clone())];
                }
            }
            KeyCode::Char('a') => {
                if let Some(idx) = self.detail_index() {
                    if !self.repos[idx].is_archived {
                        self.repos[idx].selected = true;
                        self.detail_target = None;
                        self.screen = Screen::ConfirmArchive;
                    }
                }
            }
            KeyCode::Char('u') => {
                if let Some(repo) = self.detail_repo().filter(|r| r.is_archived) {
                    let name = repo.full_name.clone();
                    self.set_info(format!("Unarchiving {}...", name));
                    return vec![Action::Unarchive(name)];
                }
            }
            _ => {}
        }
        Vec::new()
    }

    fn handle_confirm_key(&mut self, key: KeyEvent) -> Vec<Action> {
        match key.code {
            KeyCode::Char('y') | KeyCode::Char('Y') => {
                let archive = self.screen == Screen::ConfirmArchive;
                // Snapshot of the selection at confirmation time
                let actions: Vec<Action> = if archive {
                    self.archive_targets()
                        .into_iter()
                        .map(|r| Action::Archive(r.full_name.clone()))
                        .collect()
                } else {
                    self.delete_targets()
                        .into_iter()
                        .map(|r| Action::Delete(r.full_name.clone()))
                        .collect()
                };

                let n = actions.len();
                let verb = if archive { "Archiving" } else { "Deleting" };
                self.set_info(format!(
                    "{} {} {}...",
                    verb,
                    n,
                    pluralize(n, "repository", "repositories")
                ));
                tracing::info!(count = n, archive, "dispatching bulk action");

                self.screen = Screen::List;
                actions
            }
            KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc | KeyCode::Char('q') => {
                self.deselect_all();
                self.screen = Screen::List;
                Vec::new()
            }
            _ => Vec::new(),
        }
    }

    /// Filter toggles and sort keys shared by the list and filter panel
    fn apply_option_key(&mut self, c: char) -> bool {
        match c {
            '1' => self.filter_opts.show_archived = !self.filter_opts.show_archived,
            '2' => self.filter_opts.show_private = !self.filter_opts.show_private,
            '3' => self.filter_opts.show_public = !self.filter_opts.show_public,
            '4' => self.filter_opts.show_forks = !self.filter_opts.show_forks,
            '5' => {
                self.filter_opts.inactive_for_days =
                    repo::next_inactive_days(self.filter_opts.inactive_for_days)
            }
            's' => self.filter_opts.sort_by = self.filter_opts.sort_by.next(),
            'S' => self.filter_opts.sort_desc = !self.filter_opts.sort_desc,
            _ => return false,
        }
        self.apply_filters();
        true
    }

    // Navigation

    pub fn next(&mut self) {
        let count = self.visible.len();
        if count > 0 {
            self.cursor = (self.cursor + 1).min(count - 1);
            self.adjust_offset();
        }
    }

    pub fn previous(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
        self.adjust_offset();
    }

    fn page_up(&mut self) {
        self.cursor = self.cursor.saturating_sub(self.visible_rows());
        self.adjust_offset();
    }

    fn page_down(&mut self) {
        let max = self.visible.len().saturating_sub(1);
        self.cursor = (self.cursor + self.visible_rows()).min(max);
        self.adjust_offset();
    }

    fn first(&mut self) {
        self.cursor = 0;
        self.offset = 0;
    }

    fn last(&mut self) {
        self.cursor = self.visible.len().saturating_sub(1);
        self.adjust_offset();
    }

    fn adjust_offset(&mut self) {
        let rows = self.visible_rows();
        if self.cursor < self.offset {
            self.offset = self.cursor;
        }
        if self.cursor >= self.offset + rows {
            self.offset = self.cursor + 1 - rows;
        }
    }

    // Selection

    fn toggle_current(&mut self) {
        if let Some(idx) = self.current_index() {
            self.repos[idx].selected = !self.repos[idx].selected;
        }
    }

    fn select_all_visible(&mut self) {
        for &idx in &self.visible {
            if !self.repos[idx].is_archived {
                self.repos[idx].selected = true;
            }
        }
    }

    pub fn deselect_all(&mut self) {
        for repo in &mut self.repos {
            repo.selected = false;
        }
    }

    fn return_to_list(&mut self) {
        self.detail_target = None;
        self.screen = Screen::List;
    }

    /// Number of repos a confirmation screen would act on
    fn confirm_target_count(&self, screen: Screen) -> usize {
        match screen {
            Screen::ConfirmArchive => self.archive_targets().len(),
            Screen::ConfirmDelete => self.delete_targets().len(),
            _ => 0,
        }
    }

    /// Enter a confirmation screen, selecting the cursor row when nothing
    /// else is selected. Stays on the list when there is nothing to act on.
    fn start_confirm(&mut self, screen: Screen) {
        let mut auto_selected = None;
        if self.selected_count() == 0 {
            match self.current_index() {
                Some(idx) => {
                    self.repos[idx].selected = true;
                    auto_selected = Some(idx);
                }
                None => return,
            }
        }

        if self.confirm_target_count(screen) == 0 {
            if let Some(idx) = auto_selected {
                self.repos[idx].selected = false;
            }
            self.set_info("Nothing to archive: selected repositories are already archived");
            return;
        }
        self.screen = screen;
    }

    /// Drop back to the list when a fold removed what the current screen
    /// was showing.
    fn leave_stale_screen(&mut self) {
        let stale = match self.screen {
            Screen::Detail => self.detail_index().is_none(),
            Screen::ConfirmArchive | Screen::ConfirmDelete => {
                self.confirm_target_count(self.screen) == 0
            }
            _ => false,
        };
        if stale {
            self.return_to_list();
        }
    }

    /// Recompute the filtered view and keep the cursor inside it.
    pub fn apply_filters(&mut self) {
        let mut visible = repo::filter_indices(&self.repos, &self.filter_opts, Utc::now());
        repo::sort_indices(
            &self.repos,
            &mut visible,
            self.filter_opts.sort_by,
            self.filter_opts.sort_desc,
        );
        self.visible = visible;

        let max = self.visible.len().saturating_sub(1);
        if self.cursor > max {
            self.cursor = max;
        }
        self.adjust_offset();
    }

    // Folding operation results

    /// Apply one finished operation to the state. Returns follow-up work.
    pub fn fold(&mut self, result: OpResult) -> Vec<Action> {
        tracing::debug!(result = result.kind(), "folding result");
        let mut follow_up = Vec::new();
        match result {
            OpResult::Loaded { username, repos } => {
                self.replace_repos(username, repos);
                self.set_info(format!("Loaded {} repositories", self.repos.len()));
            }
            OpResult::CacheLoaded {
                username,
                repos,
                fresh,
            } => {
                self.replace_repos(username.clone(), repos);
                if fresh {
                    self.set_info(format!("Loaded {} repositories (cached)", self.repos.len()));
                } else {
                    self.set_info(format!(
                        "Loaded {} repositories (refreshing...)",
                        self.repos.len()
                    ));
                    follow_up.push(Action::BackgroundRefresh { username });
                }
            }
            OpResult::BackgroundRefreshed { repos } => {
                self.merge_refreshed(repos);
                self.set_info(format!("Refreshed {} repositories", self.repos.len()));
            }
            OpResult::Failed(err) => {
                self.loading = false;
                if self.loaded {
                    self.set_error(err);
                } else {
                    tracing::error!(error = %err, "startup failed");
                    self.fatal_error = Some(err);
                }
            }
            OpResult::Archived(name) => {
                if let Some(repo) = self.repos.iter_mut().find(|r| r.full_name == name) {
                    repo.is_archived = true;
                    repo.selected = false;
                    self.apply_filters();
                    self.set_info(format!("Archived: {}", name));
                }
            }
            OpResult::Unarchived(name) => {
                if let Some(repo) = self.repos.iter_mut().find(|r| r.full_name == name) {
                    repo.is_archived = false;
                    self.apply_filters();
                    self.set_info(format!("Unarchived: {}", name));
                }
            }
            OpResult::Deleted(name) => {
                if let Some(pos) = self.repos.iter().position(|r| r.full_name == name) {
                    self.repos.remove(pos);
                    self.apply_filters();
                    self.set_info(format!("Deleted: {}", name));
                }
            }
            OpResult::Notice(text) => self.set_info(text),
        }
        self.leave_stale_screen();
        follow_up
    }

    fn replace_repos(&mut self, username: String, repos: Vec<Repo>) {
        self.loading = false;
        self.loaded = true;
        self.fatal_error = None;
        self.username = Some(username);
        self.repos = repos;
        self.apply_filters();
    }

    /// Take a refreshed set wholesale, keeping selection for repos that are
    /// still present.
    fn merge_refreshed(&mut self, repos: Vec<Repo>) {
        let selected: HashSet<String> = self
            .repos
            .iter()
            .filter(|r| r.selected)
            .map(|r| r.full_name.clone())
            .collect();

        self.repos = repos;
        for repo in &mut self.repos {
            repo.selected = selected.contains(&repo.full_name);
        }
        self.apply_filters();
    }
}

pub fn pluralize<'a>(n: usize, singular: &'a str, plural: &'a str) -> &'a str {
    if n == 1 {
        singular
    } else {
        plural
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repo::fixtures::{arb_repos, repo};
    use proptest::prelude::*;

    fn key(c: char) -> KeyEvent {
        KeyEvent::new(KeyCode::Char(c), KeyModifiers::NONE)
    }

    fn code(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn loaded(repos: Vec<Repo>) -> App {
        let mut app = App::new(FilterOptions::default());
        app.fold(OpResult::Loaded {
            username: "octo".to_string(),
            repos,
        });
        app
    }

    fn abc() -> Vec<Repo> {
        let mut b = repo("B");
        b.is_archived = true;
        vec![repo("A"), b, repo("C")]
    }

    fn visible_names(app: &App) -> Vec<String> {
        app.visible_repos().map(|r| r.name.clone()).collect()
    }

    fn is_selected(app: &App, name: &str) -> bool {
        app.repos.iter().any(|r| r.name == name && r.selected)
    }

    fn assert_cursor_in_bounds(app: &App) {
        if app.visible.is_empty() {
            assert_eq!(app.cursor, 0);
        } else {
            assert!(app.cursor < app.visible.len());
        }
    }

    #[test]
    fn load_hides_archived_by_default() {
        let app = loaded(abc());
        assert!(!app.loading);
        assert_eq!(visible_names(&app), vec!["A", "C"]);
        assert_eq!(
            app.message.as_ref().map(|m| m.text.as_str()),
            Some("Loaded 3 repositories")
        );
    }

    #[test]
    fn archive_completed_updates_record_and_view() {
        let mut app = loaded(abc());
        app.handle_key(key(' '));
        assert!(is_selected(&app, "A"));

        app.fold(OpResult::Archived("octo/A".to_string()));

        let a = app.repos.iter().find(|r| r.name == "A").unwrap();
        assert!(a.is_archived);
        assert!(!a.selected);
        assert_eq!(visible_names(&app), vec!["C"]);
    }

    #[test]
    fn delete_completed_removes_and_clamps_cursor() {
        let mut app = loaded(vec![repo("A"), repo("B"), repo("C")]);
        app.handle_key(code(KeyCode::End));
        assert_eq!(app.cursor, 2);

        app.fold(OpResult::Deleted("octo/C".to_string()));
        assert_eq!(app.repos.len(), 2);
        assert_eq!(visible_names(&app), vec!["A", "B"]);
        assert_eq!(app.cursor, 1);

        app.fold(OpResult::Deleted("octo/A".to_string()));
        app.fold(OpResult::Deleted("octo/B".to_string()));
        assert!(app.visible.is_empty());
        assert_eq!(app.cursor, 0);
    }

    #[test]
    fn results_for_unknown_repos_are_noops() {
        let mut app = loaded(abc());
        app.message = None;
        app.fold(OpResult::Archived("octo/gone".to_string()));
        app.fold(OpResult::Deleted("octo/gone".to_string()));
        assert_eq!(app.repos.len(), 3);
        assert!(app.message.is_none());
    }

    #[test]
    fn stale_cache_schedules_background_refresh_that_keeps_selection() {
        let mut app = App::new(FilterOptions::default());
        let cached: Vec<Repo> = (0..10).map(|i| repo(&format!("r{}", i))).collect();
        let follow_up = app.fold(OpResult::CacheLoaded {
            username: "octo".to_string(),
            repos: cached,
            fresh: false,
        });
        assert_eq!(app.visible.len(), 10);
        assert_eq!(
            follow_up,
            vec![Action::BackgroundRefresh {
                username: "octo".to_string()
            }]
        );

        // select r3 and r7
        app.handle_key(code(KeyCode::Down));
        app.handle_key(code(KeyCode::Down));
        app.handle_key(code(KeyCode::Down));
        app.handle_key(key('x'));
        app.handle_key(code(KeyCode::End));
        app.handle_key(code(KeyCode::Up));
        app.handle_key(code(KeyCode::Up));
        app.handle_key(key('x'));
        assert!(is_selected(&app, "r3") && is_selected(&app, "r7"));

        // r7 disappears, r3 gets new metadata, two repos are new
        let mut refreshed: Vec<Repo> = (0..10)
            .filter(|&i| i != 7)
            .map(|i| repo(&format!("r{}", i)))
            .collect();
        refreshed[3].stargazer_count = 99;
        refreshed.push(repo("new1"));
        refreshed.push(repo("new2"));
        let follow_up = app.fold(OpResult::BackgroundRefreshed { repos: refreshed });

        assert!(follow_up.is_empty());
        assert_eq!(app.repos.len(), 11);
        let r3 = app.repos.iter().find(|r| r.name == "r3").unwrap();
        assert!(r3.selected);
        assert_eq!(r3.stargazer_count, 99);
        assert!(!is_selected(&app, "new1"));
        assert!(!is_selected(&app, "new2"));
        assert_eq!(app.selected_count(), 1);
    }

    #[test]
    fn fresh_cache_needs_no_follow_up() {
        let mut app = App::new(FilterOptions::default());
        let follow_up = app.fold(OpResult::CacheLoaded {
            username: "octo".to_string(),
            repos: abc(),
            fresh: true,
        });
        assert!(follow_up.is_empty());
        assert_eq!(app.username.as_deref(), Some("octo"));
    }

    #[test]
    fn failure_before_load_is_fatal_and_only_quit_works() {
        let mut app = App::new(FilterOptions::default());
        app.fold(OpResult::Failed("not authenticated".to_string()));
        assert_eq!(app.fatal_error.as_deref(), Some("not authenticated"));
        assert!(!app.loading);

        assert!(app.handle_key(key('r')).is_empty());
        assert!(!app.should_quit);
        app.handle_key(key('q'));
        assert!(app.should_quit);
    }

    #[test]
    fn failure_after_load_is_transient() {
        let mut app = loaded(abc());
        app.fold(OpResult::Failed("failed to delete octo/A: HTTP 403".to_string()));
        assert!(app.fatal_error.is_none());
        assert_eq!(app.repos.len(), 3);
        let msg = app.message.clone().unwrap();
        assert!(msg.is_error);

        app.handle_key(code(KeyCode::Esc));
        assert!(app.message.is_none());
    }

    #[test]
    fn confirm_archive_dispatches_one_action_per_unarchived_selection() {
        let mut app = loaded(abc());
        app.handle_key(key('1')); // show archived
        assert_eq!(visible_names(&app), vec!["A", "B", "C"]);
        for _ in 0..3 {
            app.handle_key(key('x'));
            app.handle_key(key('j'));
        }
        assert_eq!(app.selected_count(), 3);

        app.handle_key(key('a'));
        assert_eq!(app.screen, Screen::ConfirmArchive);
        let actions = app.handle_key(key('y'));
        assert_eq!(app.screen, Screen::List);
        assert_eq!(
            actions,
            vec![
                Action::Archive("octo/A".to_string()),
                Action::Archive("octo/C".to_string())
            ]
        );
    }

    #[test]
    fn confirm_delete_includes_archived_and_auto_selects_cursor() {
        let mut app = loaded(abc());
        app.handle_key(key('j'));
        app.handle_key(key('d'));
        assert_eq!(app.screen, Screen::ConfirmDelete);
        assert!(is_selected(&app, "C"));

        let actions = app.handle_key(key('y'));
        assert_eq!(actions, vec![Action::Delete("octo/C".to_string())]);
    }

    #[test]
    fn cancelling_confirmation_clears_selection() {
        let mut app = loaded(abc());
        app.handle_key(key('A'));
        assert_eq!(app.selected_count(), 2);
        app.handle_key(key('d'));
        assert_eq!(app.screen, Screen::ConfirmDelete);
        assert!(app.handle_key(code(KeyCode::Esc)).is_empty());
        assert_eq!(app.screen, Screen::List);
        assert_eq!(app.selected_count(), 0);
    }

    #[test]
    fn confirmation_needs_something_to_act_on() {
        let mut app = loaded(Vec::new());
        app.handle_key(key('a'));
        assert_eq!(app.screen, Screen::List);
        app.handle_key(code(KeyCode::Enter));
        assert_eq!(app.screen, Screen::List);
    }

    #[test]
    fn select_all_skips_archived_and_deselect_all_clears() {
        let mut app = loaded(abc());
        app.handle_key(key('1'));
        app.handle_key(key('A'));
        assert!(is_selected(&app, "A") && is_selected(&app, "C"));
        assert!(!is_selected(&app, "B"));
        app.handle_key(key('D'));
        assert_eq!(app.selected_count(), 0);
    }

    #[test]
    fn selection_follows_identity_across_resorts() {
        let mut app = loaded(vec![repo("b"), repo("a"), repo("c")]);
        app.handle_key(key('x')); // selects "b", first in input order
        app.handle_key(key('s')); // created
        app.handle_key(key('s')); // stars
        app.handle_key(key('s')); // forks
        app.handle_key(key('s')); // size
        app.handle_key(key('s')); // name
        app.handle_key(key('S')); // ascending
        assert_eq!(visible_names(&app), vec!["a", "b", "c"]);
        let flags: Vec<bool> = app.visible_repos().map(|r| r.selected).collect();
        assert_eq!(flags, vec![false, true, false]);
    }

    #[test]
    fn cursor_stays_in_bounds_through_filter_changes() {
        let mut repos: Vec<Repo> = (0..6).map(|i| repo(&format!("r{}", i))).collect();
        repos[4].is_private = true;
        repos[5].is_fork = true;
        let mut app = loaded(repos);
        app.handle_key(code(KeyCode::End));

        for c in ['4', '2', '3', '5', '3', '2', '4', '5', 's', 'S'] {
            app.handle_key(key(c));
            assert_cursor_in_bounds(&app);
        }
        app.fold(OpResult::BackgroundRefreshed {
            repos: vec![repo("only")],
        });
        assert_cursor_in_bounds(&app);
    }

    #[test]
    fn search_entry_captures_keys_including_q() {
        let mut app = loaded(vec![repo("quux"), repo("other")]);
        app.handle_key(key('/'));
        assert!(app.searching);
        app.handle_key(key('q'));
        assert!(!app.should_quit);
        assert_eq!(app.filter_opts.search_query, "q");
        assert_eq!(visible_names(&app), vec!["quux"]);

        app.handle_key(code(KeyCode::Backspace));
        assert_eq!(app.visible.len(), 2);
        app.handle_key(key('o'));
        app.handle_key(code(KeyCode::Enter));
        assert!(!app.searching);
        assert_eq!(app.filter_opts.search_query, "o");

        app.handle_key(key('q'));
        assert!(app.should_quit);
    }

    #[test]
    fn quit_only_from_list() {
        let mut app = loaded(abc());
        app.handle_key(key('?'));
        assert_eq!(app.screen, Screen::Help);
        app.handle_key(key('q'));
        assert!(!app.should_quit);
        assert_eq!(app.screen, Screen::List);

        app.handle_key(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL));
        assert!(app.should_quit);
    }

    #[test]
    fn screen_transitions() {
        let mut app = loaded(abc());

        app.handle_key(key('f'));
        assert_eq!(app.screen, Screen::Filter);
        app.handle_key(key('f'));
        assert_eq!(app.screen, Screen::List);

        app.handle_key(key('l'));
        assert_eq!(app.screen, Screen::Detail);
        app.handle_key(key('h'));
        assert_eq!(app.screen, Screen::List);

        app.handle_key(code(KeyCode::Enter));
        app.handle_key(key('a'));
        assert_eq!(app.screen, Screen::ConfirmArchive);
        assert!(is_selected(&app, "A"));
        app.handle_key(key('n'));
        assert_eq!(app.screen, Screen::List);

        app.handle_key(key('?'));
        app.handle_key(key('?'));
        assert_eq!(app.screen, Screen::List);
    }

    #[test]
    fn filter_panel_reset_restores_configured_defaults() {
        let defaults = FilterOptions {
            show_forks: false,
            ..FilterOptions::default()
        };
        let mut app = App::new(defaults.clone());
        app.handle_key(key('/'));
        app.handle_key(key('z'));
        app.handle_key(code(KeyCode::Esc));
        app.handle_key(key('f'));
        app.handle_key(key('4'));
        app.handle_key(key('5'));
        assert_eq!(app.filter_opts.inactive_for_days, 30);

        app.handle_key(key('r'));
        assert_eq!(app.filter_opts, defaults);
    }

    #[test]
    fn detail_actions() {
        let mut app = loaded(abc());
        app.handle_key(key('1'));
        app.handle_key(key('j')); // B, archived
        app.handle_key(code(KeyCode::Enter));

        assert_eq!(
            app.handle_key(key('o')),
            vec![Action::OpenInBrowser("octo/B".to_string())]
        );
        app.handle_key(key('a'));
        assert_eq!(app.screen, Screen::Detail);

        assert_eq!(
            app.handle_key(key('u')),
            vec![Action::Unarchive("octo/B".to_string())]
        );
        app.fold(OpResult::Unarchived("octo/B".to_string()));
        assert!(!app.current_repo().unwrap().is_archived);
    }

    #[test]
    fn force_refresh_replaces_set_and_drops_selection() {
        let mut app = loaded(abc());
        app.handle_key(key('x'));
        assert_eq!(app.handle_key(key('r')), vec![Action::ForceRefresh]);
        app.fold(OpResult::Loaded {
            username: "octo".to_string(),
            repos: abc(),
        });
        assert_eq!(app.selected_count(), 0);
    }

    #[test]
    fn paging_moves_by_visible_rows() {
        let repos: Vec<Repo> = (0..50).map(|i| repo(&format!("r{:02}", i))).collect();
        let mut app = loaded(repos);
        app.set_viewport_height(20);
        assert_eq!(app.visible_rows(), 13);

        app.handle_key(code(KeyCode::PageDown));
        assert_eq!(app.cursor, 13);
        assert_eq!(app.offset, 1);
        app.handle_key(code(KeyCode::End));
        assert_eq!(app.cursor, 49);
        assert_eq!(app.offset, 37);
        app.handle_key(code(KeyCode::PageUp));
        assert_eq!(app.cursor, 36);
        app.handle_key(key('g'));
        assert_eq!((app.cursor, app.offset), (0, 0));
    }

    #[test]
    fn search_line_takes_a_table_row() {
        let repos: Vec<Repo> = (0..30).map(|i| repo(&format!("r{:02}", i))).collect();
        let mut app = loaded(repos);
        app.set_viewport_height(20);
        app.handle_key(code(KeyCode::End));
        assert_eq!(app.offset, 17);

        app.handle_key(key('/'));
        assert_eq!(app.visible_rows(), 12);
        assert_eq!(app.offset, 18);
        app.handle_key(code(KeyCode::Esc));
        assert_eq!(app.visible_rows(), 13);
    }

    #[test]
    fn refresh_that_clears_selection_closes_confirmation() {
        let mut app = loaded(vec![repo("A"), repo("C")]);
        assert_eq!(app.handle_key(key('r')), vec![Action::ForceRefresh]);
        app.handle_key(key('a'));
        assert_eq!(app.screen, Screen::ConfirmArchive);

        app.fold(OpResult::Loaded {
            username: "octo".to_string(),
            repos: vec![repo("A"), repo("C")],
        });
        assert_eq!(app.screen, Screen::List);
        assert!(app.handle_key(key('y')).is_empty());
    }

    #[test]
    fn confirmation_closes_once_its_targets_are_gone() {
        let mut app = loaded(abc());
        app.handle_key(key('d'));
        assert_eq!(app.screen, Screen::ConfirmDelete);

        // deleted by an earlier batch while the dialog is open
        app.fold(OpResult::Deleted("octo/A".to_string()));
        assert_eq!(app.screen, Screen::List);
        assert_eq!(app.selected_count(), 0);
    }

    #[test]
    fn archive_on_archived_row_stays_on_list() {
        let mut app = loaded(abc());
        app.handle_key(key('1'));
        app.handle_key(key('j')); // B, archived
        app.handle_key(key('a'));
        assert_eq!(app.screen, Screen::List);
        assert_eq!(app.selected_count(), 0);

        // delete still acts on it
        app.handle_key(key('d'));
        assert_eq!(app.screen, Screen::ConfirmDelete);
        assert_eq!(app.delete_targets().len(), 1);
    }

    #[test]
    fn detail_follows_its_repo_not_the_cursor() {
        let mut app = loaded(vec![repo("A"), repo("B"), repo("C")]);
        app.handle_key(key('j'));
        app.handle_key(code(KeyCode::Enter));
        assert_eq!(app.screen, Screen::Detail);

        app.fold(OpResult::Deleted("octo/A".to_string()));
        assert_eq!(app.screen, Screen::Detail);
        assert_eq!(app.detail_repo().map(|r| r.name.as_str()), Some("B"));
        assert_eq!(
            app.handle_key(key('o')),
            vec![Action::OpenInBrowser("octo/B".to_string())]
        );

        app.handle_key(key('a'));
        assert_eq!(app.screen, Screen::ConfirmArchive);
        assert_eq!(app.archive_targets().len(), 1);
        assert_eq!(app.archive_targets()[0].name, "B");
    }

    #[test]
    fn detail_closes_when_its_repo_leaves_the_view() {
        let mut app = loaded(vec![repo("A"), repo("B")]);
        app.handle_key(code(KeyCode::Enter));
        app.fold(OpResult::Archived("octo/A".to_string()));
        assert_eq!(app.screen, Screen::List);
        assert!(app.detail_repo().is_none());
    }

    fn permutations<T: Clone>(items: &[T]) -> Vec<Vec<T>> {
        if items.len() <= 1 {
            return vec![items.to_vec()];
        }
        let mut out = Vec::new();
        for i in 0..items.len() {
            let mut rest = items.to_vec();
            let first = rest.remove(i);
            for mut tail in permutations(&rest) {
                tail.insert(0, first.clone());
                out.push(tail);
            }
        }
        out
    }

    #[test]
    fn bulk_results_fold_to_the_same_state_in_any_order() {
        let batch = vec![
            OpResult::Archived("octo/A".to_string()),
            OpResult::Deleted("octo/B".to_string()),
            OpResult::Failed("failed to delete octo/C: HTTP 403".to_string()),
        ];
        // what the server reports once the batch has gone through
        let mut refreshed = vec![repo("A"), repo("C"), repo("D")];
        refreshed[0].is_archived = true;
        let mut with_refresh = batch.clone();
        with_refresh.push(OpResult::BackgroundRefreshed { repos: refreshed });

        for results in [batch, with_refresh] {
            let orders = permutations(&results);
            let outcomes: Vec<(Vec<Repo>, Vec<usize>)> = orders
                .into_iter()
                .map(|order| {
                    let mut app = loaded(vec![repo("A"), repo("B"), repo("C"), repo("D")]);
                    app.handle_key(key('A'));
                    for result in order {
                        app.fold(result);
                    }
                    (app.repos.clone(), app.visible.clone())
                })
                .collect();

            let (repos, visible) = &outcomes[0];
            assert_eq!(visible_names_of(repos, visible), vec!["C", "D"]);
            assert!(repos.iter().any(|r| r.name == "A" && r.is_archived && !r.selected));
            assert!(repos.iter().all(|r| r.name != "B"));
            assert!(outcomes.iter().all(|o| o == &outcomes[0]));
        }
    }

    fn visible_names_of(repos: &[Repo], visible: &[usize]) -> Vec<String> {
        visible.iter().map(|&i| repos[i].name.clone()).collect()
    }

    #[test]
    fn archived_after_deleted_is_a_noop() {
        let mut app = loaded(abc());
        app.fold(OpResult::Deleted("octo/A".to_string()));
        app.fold(OpResult::Archived("octo/A".to_string()));
        assert_eq!(app.repos.len(), 2);
        assert!(app.repos.iter().all(|r| r.full_name != "octo/A"));
        assert_eq!(
            app.message.as_ref().map(|m| m.text.as_str()),
            Some("Deleted: octo/A")
        );
    }

    #[derive(Debug, Clone)]
    enum Step {
        Key(KeyEvent),
        Fold(OpResult),
    }

    fn key_strategy() -> impl Strategy<Value = KeyEvent> {
        let chars = vec![
            'j', 'k', 'g', 'G', 'x', ' ', 'A', 'D', 'a', 'd', 'u', 'y', 'n', 'f', 'h', 'l', '?',
            '/', 's', 'S', '1', '2', '3', '4', '5', 'r', 'o', 'c',
        ];
        let codes = vec![
            KeyCode::Enter,
            KeyCode::Esc,
            KeyCode::Backspace,
            KeyCode::Up,
            KeyCode::Down,
            KeyCode::PageUp,
            KeyCode::PageDown,
            KeyCode::Home,
            KeyCode::End,
        ];
        prop_oneof![
            4 => prop::sample::select(chars).prop_map(key),
            1 => prop::sample::select(codes).prop_map(code),
        ]
    }

    fn result_strategy() -> impl Strategy<Value = OpResult> {
        let name = || (0usize..12).prop_map(|i| format!("octo/r{}", i));
        prop_oneof![
            3 => name().prop_map(OpResult::Archived),
            1 => name().prop_map(OpResult::Unarchived),
            3 => name().prop_map(OpResult::Deleted),
            1 => Just(OpResult::Failed("HTTP 500".to_string())),
            1 => arb_repos(12).prop_map(|repos| OpResult::BackgroundRefreshed { repos }),
            1 => arb_repos(12).prop_map(|repos| OpResult::Loaded {
                username: "octo".to_string(),
                repos,
            }),
        ]
    }

    fn step_strategy() -> impl Strategy<Value = Step> {
        prop_oneof![
            3 => key_strategy().prop_map(Step::Key),
            1 => result_strategy().prop_map(Step::Fold),
        ]
    }

    fn check_invariants(app: &App) -> Result<(), TestCaseError> {
        if app.visible.is_empty() {
            prop_assert_eq!(app.cursor, 0);
        } else {
            prop_assert!(app.cursor < app.visible.len());
            prop_assert!(app.offset <= app.cursor);
            prop_assert!(app.cursor < app.offset + app.visible_rows());
        }

        let mut expected = repo::filter_indices(&app.repos, &app.filter_opts, Utc::now());
        repo::sort_indices(
            &app.repos,
            &mut expected,
            app.filter_opts.sort_by,
            app.filter_opts.sort_desc,
        );
        prop_assert_eq!(&app.visible, &expected);

        match app.screen {
            Screen::ConfirmArchive => prop_assert!(!app.archive_targets().is_empty()),
            Screen::ConfirmDelete => prop_assert!(!app.delete_targets().is_empty()),
            Screen::Detail => prop_assert!(app.detail_repo().is_some()),
            _ => {}
        }
        Ok(())
    }

    proptest! {
        /// Cursor, view and screen invariants hold after every key press and
        /// every folded result, in any interleaving.
        #[test]
        fn invariants_hold_for_any_step_sequence(
            initial in arb_repos(12),
            steps in prop::collection::vec(step_strategy(), 0..60)
        ) {
            let mut app = loaded(initial);
            app.set_viewport_height(12);
            check_invariants(&app)?;

            for step in steps {
                match step {
                    Step::Key(k) => {
                        app.handle_key(k);
                    }
                    Step::Fold(result) => {
                        app.fold(result);
                    }
                }
                check_invariants(&app)?;
            }
        }
    }
}
