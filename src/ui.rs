use crate::app::{pluralize, App, Screen};
use crate::repo::Repo;
use chrono::Utc;
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Clear, Paragraph, Row, Table, Wrap},
    Frame,
};

/// Names listed in a confirmation dialog before collapsing to "... and N more"
const CONFIRM_LIST_LIMIT: usize = 5;

pub fn draw(f: &mut Frame, app: &App) {
    if let Some(ref err) = app.fatal_error {
        draw_fatal(f, err);
        return;
    }
    if app.loading {
        let loading = Paragraph::new("\n  Loading repositories...")
            .style(Style::default().fg(Color::Cyan));
        f.render_widget(loading, f.area());
        return;
    }

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1), // Title bar
            Constraint::Length(1), // Sort / filter summary
            Constraint::Length(u16::from(app.searching)), // Search input
            Constraint::Min(0), // Repo table
            Constraint::Length(1), // Selection + status
            Constraint::Length(1), // Key hints
        ])
        .split(f.area());

    draw_title_bar(f, chunks[0], app);
    draw_filter_summary(f, chunks[1], app);
    if app.searching {
        let input = Line::from(vec![
            Span::styled(
                " / ",
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
            ),
            Span::raw(app.filter_opts.search_query.clone()),
            Span::styled("█", Style::default().fg(Color::Yellow)),
        ]);
        f.render_widget(Paragraph::new(input), chunks[2]);
    }
    draw_repos_table(f, chunks[3], app);
    draw_status_line(f, chunks[4], app);

    let hints =
        Paragraph::new(get_status_bar_text(app)).style(Style::default().fg(Color::DarkGray));
    f.render_widget(hints, chunks[5]);

    match app.screen {
        Screen::List => {}
        Screen::Filter => draw_filter_popup(f, app),
        Screen::Detail => draw_detail_popup(f, app),
        Screen::ConfirmArchive => draw_confirm_popup(f, app, false),
        Screen::ConfirmDelete => draw_confirm_popup(f, app, true),
        Screen::Help => draw_help_popup(f),
    }
}

fn draw_fatal(f: &mut Frame, err: &str) {
    let text = vec![
        Line::raw(""),
        Line::from(Span::styled(
            format!("  Error: {}", err),
            Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
        )),
        Line::raw(""),
        Line::from(Span::styled(
            "  Press q to quit.",
            Style::default().fg(Color::DarkGray),
        )),
    ];
    f.render_widget(Paragraph::new(text).wrap(Wrap { trim: false }), f.area());
}

fn draw_title_bar(f: &mut Frame, area: Rect, app: &App) {
    let title = Line::from(vec![
        Span::styled(
            " gh-repo-review ",
            Style::default().fg(Color::White).add_modifier(Modifier::BOLD),
        ),
        Span::raw("│ "),
        Span::styled(
            app.username.clone().unwrap_or_default(),
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        ),
        Span::raw(" │ "),
        Span::raw(format!("{} repos", app.visible.len())),
    ]);

    f.render_widget(Paragraph::new(title), area);
}

fn draw_filter_summary(f: &mut Frame, area: Rect, app: &App) {
    let opts = &app.filter_opts;
    let mut filters = Vec::new();
    if opts.show_archived {
        filters.push("archived".to_string());
    }
    if !opts.show_private {
        filters.push("no-private".to_string());
    }
    if !opts.show_public {
        filters.push("no-public".to_string());
    }
    if !opts.show_forks {
        filters.push("no-forks".to_string());
    }
    if let Some(ref lang) = opts.language {
        filters.push(format!("lang:{}", lang));
    }
    if opts.inactive_for_days > 0 {
        filters.push(format!(">{}d inactive", opts.inactive_for_days));
    }
    if !opts.search_query.is_empty() {
        filters.push(format!("search:{}", opts.search_query));
    }

    let mut line = format!(" Sort: {} {}", opts.sort_by, sort_arrow(opts.sort_desc));
    if !filters.is_empty() {
        line.push_str(" │ Filters: ");
        line.push_str(&filters.join(", "));
    }
    let summary = Paragraph::new(line).style(Style::default().fg(Color::DarkGray));
    f.render_widget(summary, area);
}

fn draw_repos_table(f: &mut Frame, area: Rect, app: &App) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray));

    let inner = block.inner(area);
    f.render_widget(block, area);

    if app.visible.is_empty() {
        let empty = Paragraph::new(vec![
            Line::raw("No repositories match the current filters."),
            Line::raw("Press 'f' to adjust filters or 'r' to reload."),
        ])
        .style(Style::default().fg(Color::DarkGray));
        f.render_widget(empty, inner);
        return;
    }

    let widths = [
        Constraint::Length(6),  // Cursor + checkbox
        Constraint::Min(24),    // Repository
        Constraint::Length(18), // Tags
        Constraint::Length(7),  // Stars
        Constraint::Length(7),  // Forks
        Constraint::Length(12), // Language
        Constraint::Length(7),  // Days since push
    ];

    let header = Row::new(vec![
        Cell::from(""),
        Cell::from("Repository").style(Style::default().add_modifier(Modifier::BOLD)),
        Cell::from("Tags").style(Style::default().add_modifier(Modifier::BOLD)),
        Cell::from("Stars").style(Style::default().add_modifier(Modifier::BOLD)),
        Cell::from("Forks").style(Style::default().add_modifier(Modifier::BOLD)),
        Cell::from("Lang").style(Style::default().add_modifier(Modifier::BOLD)),
        Cell::from("Push").style(Style::default().add_modifier(Modifier::BOLD)),
    ])
    .style(Style::default().fg(Color::Cyan))
    .height(1);

    let now = Utc::now();
    let rows: Vec<Row> = app
        .visible_repos()
        .enumerate()
        .skip(app.offset)
        .take(app.visible_rows())
        .map(|(idx, repo)| {
            let is_cursor = idx == app.cursor;
            let row_style = if is_cursor {
                Style::default().bg(Color::DarkGray)
            } else {
                Style::default()
            };

            Row::new(vec![
                Cell::from(format_marker(repo, is_cursor)),
                Cell::from(format_name(repo, is_cursor)),
                Cell::from(format_tags(repo)),
                Cell::from(format!("★ {}", repo.stargazer_count)),
                Cell::from(format!("⑂ {}", repo.fork_count)),
                Cell::from(format_language(repo)),
                Cell::from(format!("{}d", repo.days_since_push(now))),
            ])
            .style(row_style)
        })
        .collect();

    let table = Table::new(rows, widths).header(header);
    f.render_widget(table, inner);
}

fn draw_status_line(f: &mut Frame, area: Rect, app: &App) {
    let mut spans = Vec::new();

    let selected = app.selected_count();
    if selected > 0 {
        spans.push(Span::styled(
            format!(" {} {} selected ", selected, pluralize(selected, "repo", "repos")),
            Style::default().fg(Color::Green).add_modifier(Modifier::BOLD),
        ));
    }

    if let Some(ref msg) = app.message {
        let color = if msg.is_error { Color::Red } else { Color::Green };
        spans.push(Span::styled(format!(" {}", msg.text), Style::default().fg(color)));
    }

    f.render_widget(Paragraph::new(Line::from(spans)), area);
}

// Formatting helpers for the repos table
fn format_marker(repo: &Repo, is_cursor: bool) -> Line<'static> {
    let cursor = if is_cursor {
        Span::styled(">", Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD))
    } else {
        Span::raw(" ")
    };
    let checkbox = if repo.selected {
        Span::styled(" [✓]", Style::default().fg(Color::Green))
    } else {
        Span::styled(" [ ]", Style::default().fg(Color::DarkGray))
    };
    Line::from(vec![cursor, checkbox])
}

fn format_name(repo: &Repo, is_cursor: bool) -> Span<'static> {
    let style = if is_cursor {
        Style::default().add_modifier(Modifier::BOLD)
    } else if repo.is_archived {
        Style::default().fg(Color::DarkGray)
    } else {
        Style::default()
    };
    Span::styled(truncate(&repo.name, 40), style)
}

fn format_tags(repo: &Repo) -> Line<'static> {
    let mut spans = Vec::new();
    if repo.is_private {
        spans.push(Span::styled("private ", Style::default().fg(Color::Yellow)));
    }
    if repo.is_archived {
        spans.push(Span::styled("archived ", Style::default().fg(Color::Red)));
    }
    if repo.is_fork {
        spans.push(Span::styled("fork", Style::default().fg(Color::Magenta)));
    }
    Line::from(spans)
}

fn format_language(repo: &Repo) -> Span<'static> {
    match repo.primary_language {
        Some(ref lang) => {
            Span::styled(truncate(lang, 11), Style::default().fg(language_color(lang)))
        }
        None => Span::styled("—", Style::default().fg(Color::DarkGray)),
    }
}

fn language_color(lang: &str) -> Color {
    match lang.to_ascii_lowercase().as_str() {
        "rust" => Color::Rgb(222, 165, 132),
        "go" => Color::Cyan,
        "python" => Color::Blue,
        "javascript" => Color::Yellow,
        "typescript" => Color::LightBlue,
        "ruby" => Color::Red,
        "shell" => Color::Green,
        "c" | "c++" => Color::Gray,
        _ => Color::White,
    }
}

fn sort_arrow(desc: bool) -> &'static str {
    if desc {
        "↓"
    } else {
        "↑"
    }
}

// Utility functions
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max_len - 1).collect();
        format!("{}…", truncated)
    }
}

fn get_status_bar_text(app: &App) -> String {
    if app.searching {
        return " type to search │ Enter/Esc: done".to_string();
    }
    let hints = [
        "/: search",
        "f: filter",
        "space: select",
        "a: archive",
        "d: delete",
        "o: open",
        "r: reload",
        "?: help",
        "q: quit",
    ];
    format!(" {}", hints.join(" │ "))
}

fn popup_block(title: &str, color: Color) -> Block<'_> {
    Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_style(Style::default().fg(color))
}

fn key_span(key: &str) -> Span<'static> {
    Span::styled(
        key.to_string(),
        Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
    )
}

fn checkbox(enabled: bool) -> Span<'static> {
    if enabled {
        Span::styled("[✓]", Style::default().fg(Color::Green))
    } else {
        Span::styled("[ ]", Style::default().fg(Color::DarkGray))
    }
}

fn draw_filter_popup(f: &mut Frame, app: &App) {
    let area = centered_rect(50, 60, f.area());
    f.render_widget(Clear, area);
    let block = popup_block(" Filter Options ", Color::Cyan);
    let inner = block.inner(area);
    f.render_widget(block, area);

    let opts = &app.filter_opts;
    let mut lines = Vec::new();
    for (key, name, enabled) in [
        ("1", "Show Archived", opts.show_archived),
        ("2", "Show Private", opts.show_private),
        ("3", "Show Public", opts.show_public),
        ("4", "Show Forks", opts.show_forks),
    ] {
        lines.push(Line::from(vec![
            Span::raw("  "),
            key_span(key),
            Span::raw(" "),
            checkbox(enabled),
            Span::raw(format!(" {}", name)),
        ]));
    }

    lines.push(Line::raw(""));
    let inactive = if opts.inactive_for_days > 0 {
        format!("> {} days inactive", opts.inactive_for_days)
    } else {
        "All repos".to_string()
    };
    lines.push(Line::from(vec![
        Span::raw("  "),
        key_span("5"),
        Span::raw(format!(" Inactive: {}", inactive)),
    ]));

    lines.push(Line::raw(""));
    let direction = if opts.sort_desc { "↓ Desc" } else { "↑ Asc" };
    lines.push(Line::from(vec![
        Span::raw("  "),
        key_span("s"),
        Span::raw(format!(" Sort by: {}", opts.sort_by)),
    ]));
    lines.push(Line::from(vec![
        Span::raw("  "),
        key_span("S"),
        Span::raw(format!(" Direction: {}", direction)),
    ]));

    lines.push(Line::raw(""));
    lines.push(Line::from(vec![
        Span::raw("  "),
        key_span("r"),
        Span::raw(" Reset to defaults"),
    ]));
    lines.push(Line::raw(""));
    lines.push(Line::from(Span::styled(
        "  Press esc or f to return",
        Style::default().fg(Color::DarkGray),
    )));

    f.render_widget(Paragraph::new(lines), inner);
}

fn draw_detail_popup(f: &mut Frame, app: &App) {
    let area = centered_rect(70, 70, f.area());
    f.render_widget(Clear, area);

    let Some(repo) = app.detail_repo() else {
        let block = popup_block(" Details ", Color::Cyan);
        let inner = block.inner(area);
        f.render_widget(block, area);
        f.render_widget(Paragraph::new("No repository selected"), inner);
        return;
    };

    let title = format!(" {} ", repo.full_name);
    let block = popup_block(&title, Color::Cyan);
    let inner = block.inner(area);
    f.render_widget(block, area);

    let now = Utc::now();
    let mut lines = Vec::new();
    if !repo.description.is_empty() {
        lines.push(Line::from(Span::styled(
            repo.description.clone(),
            Style::default().add_modifier(Modifier::ITALIC),
        )));
        lines.push(Line::raw(""));
    }

    let info = [
        ("Visibility", repo.visibility_label().to_string()),
        ("Status", repo.status_label()),
        ("Language", repo.primary_language.clone().unwrap_or_default()),
        ("Stars", repo.stargazer_count.to_string()),
        ("Forks", repo.fork_count.to_string()),
        ("Open Issues", repo.open_issues.to_string()),
        ("Size", repo.size_string()),
        ("Created", repo.created_at.format("%b %d, %Y").to_string()),
        ("Last Updated", repo.updated_at.format("%b %d, %Y").to_string()),
        (
            "Last Push",
            format!(
                "{} ({} days ago)",
                repo.pushed_at.format("%b %d, %Y"),
                repo.days_since_push(now)
            ),
        ),
    ];
    for (label, value) in info {
        if value.is_empty() || value == "-" {
            continue;
        }
        lines.push(Line::from(vec![
            Span::styled(
                format!("  {:<14}", format!("{}:", label)),
                Style::default().fg(Color::DarkGray),
            ),
            Span::raw(value),
        ]));
    }

    lines.push(Line::raw(""));
    lines.push(Line::from(vec![
        Span::raw("  URL: "),
        Span::styled(repo.url.clone(), Style::default().fg(Color::DarkGray)),
    ]));
    lines.push(Line::from(vec![
        Span::raw("  SSH: "),
        Span::styled(repo.ssh_url.clone(), Style::default().fg(Color::DarkGray)),
    ]));
    lines.push(Line::raw(""));

    let mut actions = vec![key_span("o"), Span::raw(" Open in browser  ")];
    if repo.is_archived {
        actions.push(key_span("u"));
        actions.push(Span::raw(" Unarchive  "));
    } else {
        actions.push(key_span("a"));
        actions.push(Span::raw(" Archive  "));
    }
    actions.push(key_span("esc"));
    actions.push(Span::raw(" Back"));
    lines.push(Line::from(actions));

    f.render_widget(Paragraph::new(lines).wrap(Wrap { trim: false }), inner);
}

fn draw_confirm_popup(f: &mut Frame, app: &App, delete: bool) {
    let area = centered_rect(60, 50, f.area());
    f.render_widget(Clear, area);

    let (title, color, targets) = if delete {
        (" DANGER: Confirm Delete ", Color::Red, app.delete_targets())
    } else {
        (" Confirm Archive ", Color::Yellow, app.archive_targets())
    };
    let block = popup_block(title, color);
    let inner = block.inner(area);
    f.render_widget(block, area);

    let mut lines: Vec<Line> = targets
        .iter()
        .take(CONFIRM_LIST_LIMIT)
        .map(|r| Line::raw(format!("  • {}", r.full_name)))
        .collect();
    let count = targets.len();
    if count > CONFIRM_LIST_LIMIT {
        lines.push(Line::raw(format!("  ... and {} more", count - CONFIRM_LIST_LIMIT)));
    }
    lines.push(Line::raw(""));

    let noun = pluralize(count, "repository", "repositories");
    if delete {
        let danger = Style::default().fg(Color::Red).add_modifier(Modifier::BOLD);
        lines.push(Line::from(Span::styled(
            format!("PERMANENTLY DELETE {} {}?", count, noun),
            danger,
        )));
        lines.push(Line::from(Span::styled("This action CANNOT be undone!", danger)));
    } else {
        lines.push(Line::raw(format!("Archive {} {}?", count, noun)));
        lines.push(Line::raw("Archived repos are read-only but can be unarchived later."));
    }
    lines.push(Line::raw(""));

    let yes = if delete { " Yes, DELETE  " } else { " Yes, archive  " };
    lines.push(Line::from(vec![
        key_span("y"),
        Span::raw(yes),
        key_span("n"),
        Span::raw(" No, cancel"),
    ]));

    f.render_widget(Paragraph::new(lines).wrap(Wrap { trim: false }), inner);
}

fn draw_help_popup(f: &mut Frame) {
    let area = centered_rect(60, 80, f.area());
    f.render_widget(Clear, area);
    let block = popup_block(" Help ", Color::Cyan);
    let inner = block.inner(area);
    f.render_widget(block, area);

    let lines: Vec<Line> = get_help_content().iter().map(|l| help_line(l)).collect();
    f.render_widget(Paragraph::new(lines), inner);
}

/// Render one "KEY|DESCRIPTION|COLOR" help entry
fn help_line(entry: &str) -> Line<'static> {
    let mut parts = entry.splitn(3, '|');
    let key = parts.next().unwrap_or_default();
    let desc = parts.next().unwrap_or_default();
    let color = parts.next().unwrap_or_default();

    if key == "HEADER" {
        return Line::from(Span::styled(
            desc.to_string(),
            Style::default().fg(Color::White).add_modifier(Modifier::BOLD),
        ));
    }
    if key.is_empty() {
        return Line::from(Span::styled(
            desc.to_string(),
            Style::default().fg(Color::DarkGray),
        ));
    }

    let desc_style = match color {
        "cyan" => Style::default().fg(Color::Cyan),
        "yellow" => Style::default().fg(Color::Yellow),
        "green" => Style::default().fg(Color::Green),
        "red" => Style::default().fg(Color::Red),
        _ => Style::default(),
    };
    Line::from(vec![
        Span::styled(
            format!("  {:<12}", key),
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        ),
        Span::styled(desc.to_string(), desc_style),
    ])
}

// Help content lines - format: "KEY|DESCRIPTION|COLOR" where COLOR is optional
pub fn get_help_content() -> &'static [&'static str] {
    &[
        "HEADER|Navigation",
        "↑/k|Move up|",
        "↓/j|Move down|",
        "PgUp/PgDn|Page up/down|",
        "g/G|Go to top/bottom|",
        "Enter/l|View details|",
        "esc/h|Go back|",
        "",
        "HEADER|Search & Filter",
        "/|Search repositories|cyan",
        "f|Open filter panel|cyan",
        "s|Cycle sort field|",
        "S|Toggle sort direction|",
        "1-4|Toggle filter options|",
        "5|Cycle inactivity filter|",
        "",
        "HEADER|Selection",
        "Space/x|Toggle selection|green",
        "A|Select all visible|green",
        "D|Deselect all|",
        "",
        "HEADER|Actions",
        "a|Archive selected|yellow",
        "d|Delete selected (dangerous!)|red",
        "u|Unarchive (detail view)|",
        "o|Open in browser|",
        "r|Reload repositories|",
        "",
        "HEADER|General",
        "?|Show/hide help|",
        "q|Quit|",
        "",
        "|Press ? or esc to close|",
    ]
}

fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}
