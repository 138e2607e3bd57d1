use ratatui::{buffer::Buffer, layout::Rect, style::Color, widgets::Widget};

use crate::thumbnails::Thumbnail;

const UPPER_HALF: &str = "▀";

/// Draws a thumbnail with half blocks, two pixels per cell.
/// The image is centered horizontally and clipped to the area.
pub struct ThumbnailView<'a> {
    thumbnail: &'a Thumbnail,
}

impl<'a> ThumbnailView<'a> {
    pub fn new(thumbnail: &'a Thumbnail) -> Self {
        ThumbnailView { thumbnail }
    }
}

impl Widget for ThumbnailView<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let width = (self.thumbnail.width() as u16).min(area.width);
        let left = area.x + (area.width - width) / 2;

        for row in 0..area.height {
            for column in 0..width {
                let upper = self.thumbnail.pixel(column as u32, row as u32 * 2);
                let lower = self.thumbnail.pixel(column as u32, row as u32 * 2 + 1);
                if upper.is_none() && lower.is_none() {
                    continue;
                }
                let cell = buf.get_mut(left + column, area.y + row);
                cell.set_symbol(UPPER_HALF)
                    .set_fg(upper.map_or(Color::Reset, Color::from))
                    .set_bg(lower.map_or(Color::Reset, Color::from));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::theme::Rgb;

    #[test]
    fn pixels_pair_up_into_cells() {
        let red = Rgb(255, 0, 0);
        let blue = Rgb(0, 0, 255);
        // 2x3 image: red row, blue row, red row
        let thumbnail = Thumbnail::new(2, 3, vec![red, red, blue, blue, red, red]);
        let area = Rect::new(0, 0, 4, 2);
        let mut buf = Buffer::empty(area);

        ThumbnailView::new(&thumbnail).render(area, &mut buf);

        let top = buf.get(1, 0);
        assert_eq!(top.symbol(), UPPER_HALF);
        assert_eq!(top.fg, Color::Rgb(255, 0, 0));
        assert_eq!(top.bg, Color::Rgb(0, 0, 255));

        let bottom = buf.get(1, 1);
        assert_eq!(bottom.fg, Color::Rgb(255, 0, 0));
        assert_eq!(bottom.bg, Color::Reset);

        // Centered: column 0 stays empty
        assert_eq!(buf.get(0, 0).symbol(), " ");
    }

    #[test]
    fn wide_images_are_clipped() {
        let thumbnail = Thumbnail::new(10, 2, vec![Rgb(1, 2, 3); 20]);
        let area = Rect::new(0, 0, 4, 1);
        let mut buf = Buffer::empty(area);
        ThumbnailView::new(&thumbnail).render(area, &mut buf);
        assert!((0..4).all(|x| buf.get(x, 0).symbol() == UPPER_HALF));
    }
}
