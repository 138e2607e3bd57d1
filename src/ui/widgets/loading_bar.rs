use ratatui::{buffer::Buffer, layout::Rect, style::Color, widgets::Widget};
use tokio::sync::watch;

use crate::theme::{Rgb, Theme, ThemeEngine};

/// Smallest fill a chunk is drawn with, so a started chunk is always visible
pub const MIN_VISIBLE_PROGRESS: f32 = 0.1;
pub const MAX_PROGRESS: f32 = 1.0;

const EIGHTHS: [&str; 9] = [" ", "▏", "▎", "▍", "▌", "▋", "▊", "▉", "█"];

/// Horizontal extent of one chunk, in cells
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Segment {
    pub start: f32,
    pub end: f32,
}

/// Progress bar split into one equal-width segment per download chunk.
///
/// The bar follows the theme accent color for as long as it is attached to a
/// [`ThemeEngine`]; detaching drops the subscription.
#[derive(Debug)]
pub struct LoadingBar {
    chunks_count: Option<usize>,
    chunk_loading_progress: Vec<f32>,
    color: Color,
    theme_rx: Option<watch::Receiver<Theme>>,
    needs_redraw: bool,
}

impl LoadingBar {
    pub fn new(color: Color) -> Self {
        LoadingBar {
            chunks_count: None,
            chunk_loading_progress: Vec::new(),
            color,
            theme_rx: None,
            needs_redraw: false,
        }
    }

    pub fn attach(&mut self, themes: &ThemeEngine) {
        let rx = themes.subscribe();
        let accent = rx.borrow().accent;
        self.theme_rx = Some(rx);
        self.on_theme_changed(accent);
    }

    pub fn detach(&mut self) {
        self.theme_rx = None;
    }

    #[cfg(test)]
    pub fn is_attached(&self) -> bool {
        self.theme_rx.is_some()
    }

    /// Pick up a pending theme change. Returns true when the color changed.
    pub fn sync_theme(&mut self) -> bool {
        let Some(rx) = self.theme_rx.as_mut() else {
            return false;
        };
        if !rx.has_changed().unwrap_or(false) {
            return false;
        }
        let accent = rx.borrow_and_update().accent;
        self.on_theme_changed(accent);
        true
    }

    pub fn on_theme_changed(&mut self, accent: Rgb) {
        self.color = accent.into();
        self.needs_redraw = true;
    }

    #[cfg(test)]
    pub fn color(&self) -> Color {
        self.color
    }

    /// Store the latest per-chunk progress.
    ///
    /// A different number of values than before (or the first call) replaces
    /// the tracked state; otherwise values are updated in place. Every value is
    /// clamped to [`MIN_VISIBLE_PROGRESS`]..=[`MAX_PROGRESS`].
    pub fn set_progress(&mut self, updated_progress: &[f32]) {
        if self.chunks_count != Some(updated_progress.len()) {
            // Happens once per download, reallocating here is fine
            self.chunks_count = Some(updated_progress.len());
            self.chunk_loading_progress = vec![MIN_VISIBLE_PROGRESS; updated_progress.len()];
        }

        for (stored, &value) in self.chunk_loading_progress.iter_mut().zip(updated_progress) {
            *stored = clamp_progress(value);
        }

        self.needs_redraw = true;
    }

    #[cfg(test)]
    pub fn progress(&self) -> &[f32] {
        &self.chunk_loading_progress
    }

    #[cfg(test)]
    pub fn chunks_count(&self) -> Option<usize> {
        self.chunks_count
    }

    pub fn is_active(&self) -> bool {
        self.chunks_count.is_some()
    }

    /// Forget all chunk state once a download has finished
    pub fn reset(&mut self) {
        self.chunks_count = None;
        self.chunk_loading_progress.clear();
        self.needs_redraw = true;
    }

    pub fn take_redraw(&mut self) -> bool {
        std::mem::take(&mut self.needs_redraw)
    }

    /// Filled extent of every chunk for a bar `width` cells wide. Chunks start
    /// on whole cells, so completed chunks tile the bar without gaps.
    pub fn segments(&self, width: u16) -> Vec<Segment> {
        let count = match self.chunks_count {
            Some(count) if count > 0 => count,
            _ => return Vec::new(),
        };

        self.chunk_loading_progress
            .iter()
            .enumerate()
            .filter(|(_, progress)| **progress > 0.0)
            .map(|(index, progress)| {
                let (start, end) = chunk_cells(index, count, width);
                Segment {
                    start: start as f32,
                    end: start as f32 + (end - start) as f32 * progress,
                }
            })
            .collect()
    }
}

/// Clamp a raw progress value into the drawable range
pub fn clamp_progress(value: f32) -> f32 {
    if value.is_nan() {
        return MIN_VISIBLE_PROGRESS;
    }
    value.clamp(MIN_VISIBLE_PROGRESS, MAX_PROGRESS)
}

/// Cells `[start, end)` owned by chunk `index` of `count` in a bar `width` cells wide.
/// Neighbouring chunks share a boundary, so together they cover the whole bar.
fn chunk_cells(index: usize, count: usize, width: u16) -> (u16, u16) {
    let width = width as usize;
    ((index * width / count) as u16, ((index + 1) * width / count) as u16)
}

impl Widget for &LoadingBar {
    fn render(self, area: Rect, buf: &mut Buffer) {
        if area.width == 0 || area.height == 0 {
            return;
        }

        for segment in self.segments(area.width) {
            let start = segment.start as u16;
            let filled = segment.end - segment.start;
            let full = filled.floor() as u16;
            // Only the last cell of a chunk gets a partial glyph
            let eighths = ((filled - full as f32) * 8.0).round() as usize;

            let mut draw = |column: u16, symbol: &str| {
                for y in area.top()..area.bottom() {
                    buf.get_mut(area.x + column, y).set_symbol(symbol).set_fg(self.color);
                }
            };
            for column in start..start + full {
                draw(column, EIGHTHS[8]);
            }
            if eighths > 0 {
                draw(start + full, EIGHTHS[eighths.min(8)]);
            }
        }
    }
}
