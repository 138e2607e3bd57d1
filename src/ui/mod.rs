pub mod input;
pub mod renderers;
pub mod status_bar;
pub mod terminal;
pub mod utils;
pub mod widgets;

use std::io;

use crate::app::App;
use crate::types::AppMode;

pub use terminal::{Tui, restore_terminal, setup_terminal};

/// Main UI rendering function that delegates to specific mode renderers
pub fn render_ui(app: &App, terminal: &mut Tui) -> Result<(), io::Error> {
    terminal.draw(|f| match app.mode {
        AppMode::Thread => renderers::thread::render(f, app),
        AppMode::RemovedPosts => renderers::removed_posts::render(f, app),
    })?;
    Ok(())
}
