use std::time::Instant;

use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph},
};

use crate::app::App;
use crate::types::Post;
use crate::ui::utils::{format_bytes, format_post_time, strip_html, truncate};

/// Comment lines shown per post in the thread view
const COMMENT_LINES: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThreadLayout {
    pub status_bar: Rect,
    pub loading_bar: Rect,
    pub posts: Rect,
    pub footer: Rect,
}

pub fn thread_layout(area: Rect) -> ThreadLayout {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1), // Status bar
            Constraint::Length(1), // Download progress
            Constraint::Min(0),    // Posts
            Constraint::Length(3), // Footer / notification
        ])
        .split(area);

    ThreadLayout {
        status_bar: chunks[0],
        loading_bar: chunks[1],
        posts: chunks[2],
        footer: chunks[3],
    }
}

/// Render the thread view
pub fn render(f: &mut Frame, app: &App) {
    let layout = thread_layout(f.size());

    render_status_bar(f, app, layout.status_bar);
    if app.loading_bar.is_active() {
        f.render_widget(&app.loading_bar, layout.loading_bar);
    }
    render_posts(f, app, layout.posts);
    render_footer(f, app, layout.footer);
}

fn render_status_bar(f: &mut Frame, app: &App, area: Rect) {
    let thread = app.presenter.thread();
    let theme = app.themes.current();
    let text = format!(
        " /{}/ No. {} | {} posts | {} removed | {}",
        thread.board,
        thread.no,
        app.presenter.visible_posts().len(),
        app.presenter.removed_count(),
        theme.name,
    );

    let style = match app.status_bar_color(Instant::now()) {
        Some(tint) => Style::default().bg(tint.into()).fg(Color::White),
        None => Style::default().fg(theme.accent.into()),
    };
    f.render_widget(Paragraph::new(text).style(style.add_modifier(Modifier::BOLD)), area);
}

fn render_posts(f: &mut Frame, app: &App, area: Rect) {
    let theme = app.themes.current();
    let width = area.width.saturating_sub(2) as usize;

    let items: Vec<ListItem> = app
        .presenter
        .visible_posts()
        .into_iter()
        .map(|post| ListItem::new(post_lines(post, width, theme.accent.into(), theme.text.into())))
        .collect();

    let list = List::new(items)
        .block(Block::default().title(" Thread ").borders(Borders::ALL))
        .highlight_style(Style::default().bg(Color::DarkGray));

    let mut state = ListState::default();
    state.select(app.presenter.selected_post().map(|_| app.presenter.selected_index()));
    f.render_stateful_widget(list, area, &mut state);
}

fn post_lines(post: &Post, width: usize, accent: Color, text: Color) -> Vec<Line<'static>> {
    let mut header = vec![
        Span::styled(format!("No. {}", post.no), Style::default().fg(accent).add_modifier(Modifier::BOLD)),
        Span::raw("  "),
        Span::raw(post.name.clone()),
        Span::raw("  "),
        Span::styled(format_post_time(post.time), Style::default().fg(Color::Gray)),
    ];
    if let Some(subject) = &post.subject {
        header.push(Span::raw("  "));
        header.push(Span::styled(subject.clone(), Style::default().add_modifier(Modifier::BOLD)));
    }

    let mut lines = vec![Line::from(header)];
    if let Some(image) = post.images.first() {
        let size = image.size.map(format_bytes).unwrap_or_default();
        let more = match post.images.len() {
            1 => String::new(),
            n => format!(" +{} more", n - 1),
        };
        lines.push(Line::from(Span::styled(
            truncate(&format!("🖼  {}{} {}{}", image.filename, image.extension, size, more), width),
            Style::default().fg(Color::Cyan),
        )));
    }

    let comment = strip_html(&post.comment);
    lines.extend(
        comment
            .lines()
            .filter(|line| !line.trim().is_empty())
            .take(COMMENT_LINES)
            .map(|line| Line::from(Span::styled(truncate(line, width), Style::default().fg(text)))),
    );
    lines.push(Line::default());
    lines
}

fn render_footer(f: &mut Frame, app: &App, area: Rect) {
    let content = match &app.notification {
        Some(message) => Line::from(Span::styled(message.clone(), Style::default().fg(Color::Yellow))),
        None => Line::from("q quit | ↑↓ move | x remove | R removed posts | d download | t theme"),
    };
    let footer = Paragraph::new(content).block(Block::default().borders(Borders::ALL));
    f.render_widget(footer, area);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::fixtures::post;

    #[test]
    fn layout_stacks_bars_above_posts() {
        let layout = thread_layout(Rect::new(0, 0, 80, 24));
        assert_eq!(layout.status_bar.y, 0);
        assert_eq!(layout.loading_bar.y, 1);
        assert_eq!(layout.posts.y, 2);
        assert_eq!(layout.footer.height, 3);
        assert_eq!(layout.footer.bottom(), 24);
    }

    #[test]
    fn post_lines_mention_images() {
        let lines = post_lines(&post(7, 2), 60, Color::Red, Color::White);
        let text: Vec<String> = lines
            .iter()
            .map(|l| l.spans.iter().map(|s| s.content.as_ref()).collect())
            .collect();
        assert!(text[0].starts_with("No. 7"));
        assert!(text[1].contains("file70.png"));
        assert!(text[1].contains("+1 more"));
        assert_eq!(text[2], "comment for 7");
    }
}
