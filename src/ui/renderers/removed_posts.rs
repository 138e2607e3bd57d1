use ratatui::{
    Frame,
    layout::{Alignment, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph},
};

use crate::app::App;
use crate::removed_posts::{ImageSlot, ROW_HEIGHT, RemovedPostRow, THUMBNAIL_COLUMNS};
use crate::ui::renderers::thread;
use crate::ui::utils::{centered_rect, truncate};
use crate::ui::widgets::thumbnail::ThumbnailView;

pub const SELECT_ALL_LABEL: &str = "[ Select all ]";
pub const RESTORE_LABEL: &str = "[ Restore ]";

/// Screen regions of the dialog, shared by drawing and mouse hit testing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DialogLayout {
    pub dialog: Rect,
    pub list: Rect,
    pub select_all: Rect,
    pub restore: Rect,
}

pub fn dialog_layout(area: Rect) -> DialogLayout {
    let dialog = centered_rect(80, 80, area);
    let inner = Block::default().borders(Borders::ALL).inner(dialog);

    // Last inner line holds the buttons, with one blank line above it
    let button_height = inner.height.min(1);
    let buttons_y = inner.bottom().saturating_sub(1);
    let list = Rect {
        height: inner.height.saturating_sub(2),
        ..inner
    };

    let select_all_width = (SELECT_ALL_LABEL.chars().count() as u16).min(inner.width);
    let restore_width = (RESTORE_LABEL.chars().count() as u16).min(inner.width.saturating_sub(select_all_width));

    DialogLayout {
        dialog,
        list,
        select_all: Rect::new(inner.x, buttons_y, select_all_width, button_height),
        restore: Rect::new(inner.right().saturating_sub(restore_width), buttons_y, restore_width, button_height),
    }
}

/// Render the removed posts dialog on top of the thread view
pub fn render(f: &mut Frame, app: &App) {
    thread::render(f, app);

    let Some(controller) = app.removed_posts.as_ref() else {
        return;
    };
    let accent: Color = app.themes.current().accent.into();
    let layout = dialog_layout(f.size());

    f.render_widget(Clear, layout.dialog);
    let block = Block::default()
        .title(format!(" Removed posts ({}) ", controller.len()))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(accent));
    f.render_widget(block, layout.dialog);

    if controller.is_empty() {
        f.render_widget(
            Paragraph::new("Nothing to restore").style(Style::default().fg(Color::Gray)),
            layout.list,
        );
    }

    for (line, index) in controller.visible_range().enumerate() {
        let y = layout.list.y + (line * ROW_HEIGHT) as u16;
        if y >= layout.list.bottom() {
            break;
        }
        let height = (ROW_HEIGHT as u16).min(layout.list.bottom() - y);
        let area = Rect::new(layout.list.x, y, layout.list.width, height);
        render_row(f, &controller.row_view(index), area, index == controller.cursor(), accent);
    }

    let restore_style = if controller.selected_post_nos().is_empty() {
        Style::default().fg(Color::DarkGray)
    } else {
        Style::default().fg(accent).add_modifier(Modifier::BOLD)
    };
    f.render_widget(Paragraph::new(SELECT_ALL_LABEL), layout.select_all);
    f.render_widget(Paragraph::new(RESTORE_LABEL).style(restore_style), layout.restore);
}

fn render_row(f: &mut Frame, row: &RemovedPostRow, area: Rect, focused: bool, accent: Color) {
    if focused {
        f.render_widget(Block::default().style(Style::default().bg(Color::DarkGray)), area);
    }

    let mut text_area = area;
    if row.image != ImageSlot::Hidden {
        let thumbnail_area = Rect {
            width: THUMBNAIL_COLUMNS.min(area.width),
            ..area
        };
        match &row.image {
            ImageSlot::Loaded(thumbnail) => f.render_widget(ThumbnailView::new(thumbnail), thumbnail_area),
            _ => f.render_widget(
                Paragraph::new("···").alignment(Alignment::Center).style(Style::default().fg(Color::Gray)),
                thumbnail_area,
            ),
        }
        let offset = (THUMBNAIL_COLUMNS + 1).min(area.width);
        text_area = Rect {
            x: area.x + offset,
            width: area.width - offset,
            ..area
        };
    }

    let width = text_area.width as usize;
    let checkbox = if row.checked { "[x]" } else { "[ ]" };
    let mut lines = vec![Line::from(vec![
        Span::styled(checkbox, Style::default().fg(accent)),
        Span::raw(" "),
        Span::styled(row.label.clone(), Style::default().add_modifier(Modifier::BOLD)),
    ])];
    lines.extend(
        row.comment
            .lines()
            .filter(|line| !line.trim().is_empty())
            .take(ROW_HEIGHT - 1)
            .map(|line| Line::from(truncate(line, width))),
    );
    f.render_widget(Paragraph::new(lines), text_area);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::testing::app;
    use crate::ui::utils::contains;
    use ratatui::{Terminal, backend::TestBackend, buffer::Buffer};
    use std::time::Instant;

    fn screen_text(buffer: &Buffer) -> String {
        let area = buffer.area;
        (area.top()..area.bottom())
            .map(|y| (area.left()..area.right()).map(|x| buffer.get(x, y).symbol()).collect::<String>())
            .collect::<Vec<_>>()
            .join("\n")
    }

    #[test]
    fn buttons_sit_below_list_inside_dialog() {
        let area = Rect::new(0, 0, 100, 40);
        let layout = dialog_layout(area);

        assert!(layout.list.bottom() < layout.select_all.y);
        assert_eq!(layout.select_all.y, layout.restore.y);
        assert!(layout.select_all.right() <= layout.restore.x);
        for rect in [layout.list, layout.select_all, layout.restore] {
            assert!(contains(layout.dialog, rect.x, rect.y));
            assert!(rect.right() <= layout.dialog.right());
        }
    }

    #[test]
    fn tiny_screens_do_not_underflow() {
        let layout = dialog_layout(Rect::new(0, 0, 3, 2));
        assert_eq!(layout.list.height, 0);
        assert!(layout.restore.width <= layout.dialog.width);
    }

    #[test]
    fn draws_rows_with_checkbox_state() {
        let mut app = app(&[2, 3], None);
        app.open_removed_posts(Instant::now());
        app.removed_posts.as_mut().unwrap().on_item_click(1);
        app.tick(Instant::now());

        let mut terminal = Terminal::new(TestBackend::new(100, 40)).unwrap();
        terminal.draw(|f| render(f, &app)).unwrap();
        let text = screen_text(terminal.backend().buffer());

        assert!(text.contains("Removed posts (2)"));
        assert!(text.contains("[ ] No. 2"));
        assert!(text.contains("[x] No. 3"));
        assert!(text.contains("comment for 3"));
        assert!(text.contains(SELECT_ALL_LABEL));
        assert!(text.contains(RESTORE_LABEL));
    }
}
