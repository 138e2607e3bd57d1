use std::time::Instant;

use crossterm::event::{KeyCode, MouseButton, MouseEvent, MouseEventKind};

use crate::app::App;
use crate::types::AppMode;
use crate::ui::renderers::removed_posts::dialog_layout;
use crate::ui::utils::contains;

/// Handle keyboard input events for all application modes.
/// Returns true when the application should exit.
pub fn handle_key_event(app: &mut App, key: KeyCode) -> bool {
    app.needs_redraw = true;
    match app.mode {
        AppMode::Thread => handle_thread_keys(app, key),
        AppMode::RemovedPosts => handle_removed_posts_keys(app, key),
    }
}

fn handle_thread_keys(app: &mut App, key: KeyCode) -> bool {
    match key {
        KeyCode::Char('q') => return true,
        KeyCode::Up | KeyCode::Char('k') => app.presenter.select_previous(),
        KeyCode::Down | KeyCode::Char('j') => app.presenter.select_next(),
        KeyCode::Char('x') => app.remove_selected_post(),
        KeyCode::Char('R') => app.open_removed_posts(Instant::now()),
        KeyCode::Char('d') => app.start_download(),
        KeyCode::Char('t') => app.cycle_theme(),
        _ => {}
    }
    false
}

fn handle_removed_posts_keys(app: &mut App, key: KeyCode) -> bool {
    let now = Instant::now();
    match key {
        KeyCode::Esc | KeyCode::Char('q') => app.removed_posts_back(now),
        KeyCode::Char('r') => app.restore_selected(now),
        _ => {
            let Some(controller) = app.removed_posts.as_mut() else {
                return false;
            };
            match key {
                KeyCode::Up | KeyCode::Char('k') => controller.move_cursor(-1),
                KeyCode::Down | KeyCode::Char('j') => controller.move_cursor(1),
                KeyCode::Char(' ') | KeyCode::Enter => controller.toggle_cursor(),
                KeyCode::Char('a') => controller.select_all(),
                _ => {}
            }
        }
    }
    false
}

/// Handle mouse clicks and wheel scrolling
pub fn handle_mouse_event(app: &mut App, mouse: MouseEvent) {
    match app.mode {
        AppMode::Thread => match mouse.kind {
            MouseEventKind::ScrollUp => app.presenter.select_previous(),
            MouseEventKind::ScrollDown => app.presenter.select_next(),
            _ => return,
        },
        AppMode::RemovedPosts => {
            if !handle_dialog_mouse(app, mouse) {
                return;
            }
        }
    }
    app.needs_redraw = true;
}

fn handle_dialog_mouse(app: &mut App, mouse: MouseEvent) -> bool {
    let layout = dialog_layout(app.screen);
    let (column, row) = (mouse.column, mouse.row);
    let now = Instant::now();

    match mouse.kind {
        MouseEventKind::Down(MouseButton::Left) => {
            if !contains(layout.dialog, column, row) {
                app.removed_posts_back(now);
            } else if contains(layout.restore, column, row) {
                app.restore_selected(now);
            } else if let Some(controller) = app.removed_posts.as_mut() {
                if contains(layout.select_all, column, row) {
                    controller.select_all();
                } else if contains(layout.list, column, row) {
                    if let Some(index) = controller.row_at_line((row - layout.list.y) as usize) {
                        controller.on_item_click(index);
                    }
                }
            }
            true
        }
        MouseEventKind::ScrollUp | MouseEventKind::ScrollDown if contains(layout.list, column, row) => {
            let delta = if mouse.kind == MouseEventKind::ScrollUp { -1 } else { 1 };
            if let Some(controller) = app.removed_posts.as_mut() {
                controller.scroll_by(delta);
            }
            true
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::testing::app;
    use crate::removed_posts::ROW_HEIGHT;
    use crossterm::event::KeyModifiers;

    fn click(column: u16, row: u16) -> MouseEvent {
        MouseEvent {
            kind: MouseEventKind::Down(MouseButton::Left),
            column,
            row,
            modifiers: KeyModifiers::NONE,
        }
    }

    fn open(hidden: &[u64]) -> App {
        let mut app = app(hidden, None);
        app.open_removed_posts(Instant::now());
        app.tick(Instant::now());
        app
    }

    #[test]
    fn thread_keys_navigate_and_remove() {
        let mut app = app(&[], None);
        assert!(!handle_key_event(&mut app, KeyCode::Down));
        assert_eq!(app.presenter.selected_index(), 1);
        handle_key_event(&mut app, KeyCode::Char('x'));
        assert_eq!(app.presenter.hidden_post_nos(), vec![2]);
        handle_key_event(&mut app, KeyCode::Char('R'));
        assert_eq!(app.mode, AppMode::RemovedPosts);
        assert!(!handle_key_event(&mut app, KeyCode::Char('q')));
        assert_eq!(app.mode, AppMode::Thread);
        assert!(handle_key_event(&mut app, KeyCode::Char('q')));
    }

    #[test]
    fn dialog_keys_check_and_restore() {
        let mut app = open(&[2, 3, 4]);
        handle_key_event(&mut app, KeyCode::Down);
        handle_key_event(&mut app, KeyCode::Char(' '));
        handle_key_event(&mut app, KeyCode::Char('r'));
        assert_eq!(app.mode, AppMode::Thread);
        assert_eq!(app.presenter.hidden_post_nos(), vec![2, 4]);
    }

    #[test]
    fn select_all_key_then_restore_everything() {
        let mut app = open(&[2, 3]);
        handle_key_event(&mut app, KeyCode::Char('a'));
        handle_key_event(&mut app, KeyCode::Char('r'));
        assert!(app.presenter.hidden_post_nos().is_empty());
    }

    #[test]
    fn clicking_rows_and_buttons() {
        let mut app = open(&[2, 3]);
        let layout = dialog_layout(app.screen);

        // Second line of the second row
        handle_mouse_event(&mut app, click(layout.list.x + 20, layout.list.y + ROW_HEIGHT as u16 + 1));
        assert_eq!(app.removed_posts.as_ref().unwrap().selected_post_nos(), vec![3]);

        // Below the last row: nothing to toggle
        handle_mouse_event(&mut app, click(layout.list.x + 20, layout.list.y + 3 * ROW_HEIGHT as u16));
        assert_eq!(app.removed_posts.as_ref().unwrap().selected_post_nos(), vec![3]);

        handle_mouse_event(&mut app, click(layout.restore.x, layout.restore.y));
        assert_eq!(app.mode, AppMode::Thread);
        assert_eq!(app.presenter.hidden_post_nos(), vec![2]);
    }

    #[test]
    fn clicking_outside_dismisses() {
        let mut app = open(&[2]);
        handle_mouse_event(&mut app, click(0, 0));
        assert_eq!(app.mode, AppMode::Thread);
        assert_eq!(app.presenter.hidden_post_nos(), vec![2]);
    }
}
