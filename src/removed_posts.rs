use std::collections::HashMap;
use std::ops::Range;
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, error};

use crate::theme::Rgb;
use crate::thumbnails::{Thumbnail, ThumbnailLoader, ThumbnailRequest, ThumbnailRequests};
use crate::types::{Post, PostImage};
use crate::ui::status_bar::TintTransition;
use crate::ui::utils::strip_html;

/// Terminal lines taken by one row of the list
pub const ROW_HEIGHT: usize = 3;
/// Terminal columns reserved for a row's thumbnail
pub const THUMBNAIL_COLUMNS: u16 = 8;

/// Thumbnail size in pixels: one pixel per column, two per line (half blocks)
const THUMBNAIL_PIXELS: (u32, u32) = (THUMBNAIL_COLUMNS as u32, ROW_HEIGHT as u32 * 2);

/// One entry of the removed posts list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemovedPost {
    images: Vec<PostImage>,
    post_no: u64,
    comment: String,
    checked: bool,
}

impl RemovedPost {
    pub fn new(images: Vec<PostImage>, post_no: u64, comment: String, checked: bool) -> Self {
        RemovedPost {
            images,
            post_no,
            comment,
            checked,
        }
    }

    pub fn images(&self) -> &[PostImage] {
        &self.images
    }

    pub fn post_no(&self) -> u64 {
        self.post_no
    }

    pub fn comment(&self) -> &str {
        &self.comment
    }

    pub fn is_checked(&self) -> bool {
        self.checked
    }

    pub fn set_checked(&mut self, checked: bool) {
        self.checked = checked;
    }
}

impl From<&Post> for RemovedPost {
    fn from(post: &Post) -> Self {
        RemovedPost::new(post.images.clone(), post.no, post.comment.clone(), false)
    }
}

/// Receives the outcome of the dialog. Closing the dialog is up to the implementor.
pub trait RemovedPostsCallbacks {
    fn on_restore_clicked(&mut self, post_nos: Vec<u64>);
    fn pop(&mut self);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageSlot {
    Hidden,
    Loading,
    Loaded(Arc<Thumbnail>),
}

/// Everything the renderer needs to draw one row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemovedPostRow {
    pub label: String,
    pub comment: String,
    pub checked: bool,
    pub image: ImageSlot,
}

/// State of the "removed posts" dialog
pub struct RemovedPostsController {
    removed_posts: Vec<RemovedPost>,
    loader: Arc<dyn ThumbnailLoader>,
    thumbnails: Option<ThumbnailRequests>,
    images: HashMap<u64, ImageSlot>,
    cursor: usize,
    scroll: usize,
    visible_rows: usize,
    redisplay_count: u64,
    needs_redraw: bool,
    status_bar_previous: Option<Rgb>,
}

impl RemovedPostsController {
    pub fn new(loader: Arc<dyn ThumbnailLoader>) -> Self {
        RemovedPostsController {
            removed_posts: Vec::new(),
            loader,
            thumbnails: None,
            images: HashMap::new(),
            cursor: 0,
            scroll: 0,
            visible_rows: 1,
            redisplay_count: 0,
            needs_redraw: false,
            status_bar_previous: None,
        }
    }

    /// Remember the current status bar tint and darken it while the dialog is shown.
    /// Returns `None` when the previous tint was none, in which case nothing animates.
    pub fn on_create(&mut self, status_bar: Option<Rgb>, now: Instant) -> Option<TintTransition> {
        self.status_bar_previous = status_bar;
        status_bar.map(|tint| TintTransition::darken(tint, now))
    }

    /// Tear down the dialog: abort outstanding fetches and restore the tint
    pub fn stop_presenting(&mut self, now: Instant) -> Option<TintTransition> {
        if let Some(requests) = self.thumbnails.as_mut() {
            let cancelled = requests.cancel_all();
            debug!(cancelled, "Removed posts dialog closed");
        }
        self.status_bar_previous
            .map(|tint| TintTransition::lighten(tint, now))
    }

    pub fn on_back(&mut self, callbacks: &mut dyn RemovedPostsCallbacks) {
        callbacks.pop();
    }

    /// Replace the list with the given posts, all unchecked
    pub fn show_removed_posts(&mut self, posts: &[Post]) {
        let requests = self
            .thumbnails
            .get_or_insert_with(|| ThumbnailRequests::new(Arc::clone(&self.loader)));
        requests.cancel_all();

        self.removed_posts = posts.iter().map(RemovedPost::from).collect();
        self.images.clear();
        self.cursor = 0;
        self.scroll = 0;
        self.notify_data_set_changed();
    }

    #[cfg(test)]
    pub fn removed_posts(&self) -> &[RemovedPost] {
        &self.removed_posts
    }

    pub fn len(&self) -> usize {
        self.removed_posts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.removed_posts.is_empty()
    }

    /// Row or checkbox click
    pub fn on_item_click(&mut self, position: usize) {
        let Some(removed_post) = self.removed_posts.get_mut(position) else {
            return;
        };
        removed_post.set_checked(!removed_post.is_checked());
        self.cursor = position;
        self.notify_data_set_changed();
    }

    pub fn toggle_cursor(&mut self) {
        self.on_item_click(self.cursor);
    }

    /// Check every row if the first one is unchecked, otherwise uncheck every row
    pub fn select_all(&mut self) {
        let Some(first) = self.removed_posts.first() else {
            return;
        };
        let select = !first.is_checked();
        for removed_post in &mut self.removed_posts {
            removed_post.set_checked(select);
        }
        self.notify_data_set_changed();
    }

    pub fn selected_post_nos(&self) -> Vec<u64> {
        self.removed_posts
            .iter()
            .filter(|rp| rp.is_checked())
            .map(|rp| rp.post_no())
            .collect()
    }

    pub fn on_restore(&mut self, callbacks: &mut dyn RemovedPostsCallbacks) {
        let selected_posts = self.selected_post_nos();
        if selected_posts.is_empty() {
            return;
        }
        callbacks.on_restore_clicked(selected_posts);
    }

    /// View of the row at `position`.
    ///
    /// # Panics
    ///
    /// Panics when there is no backing record at `position`: the renderer and
    /// the list are out of sync.
    pub fn row_view(&self, position: usize) -> RemovedPostRow {
        let Some(removed_post) = self.removed_posts.get(position) else {
            panic!(
                "removed post is missing! position = {}, items count = {}",
                position,
                self.removed_posts.len()
            );
        };

        let image = if removed_post.images().is_empty() {
            ImageSlot::Hidden
        } else {
            self.images
                .get(&removed_post.post_no())
                .cloned()
                .unwrap_or(ImageSlot::Loading)
        };

        RemovedPostRow {
            label: format!("No. {}", removed_post.post_no()),
            comment: strip_html(removed_post.comment()),
            checked: removed_post.is_checked(),
            image,
        }
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    #[cfg(test)]
    pub fn scroll(&self) -> usize {
        self.scroll
    }

    pub fn move_cursor(&mut self, delta: isize) {
        if self.removed_posts.is_empty() {
            return;
        }
        let last = self.removed_posts.len() - 1;
        self.cursor = self.cursor.saturating_add_signed(delta).min(last);
        if self.cursor < self.scroll {
            self.scroll = self.cursor;
        } else if self.cursor >= self.scroll + self.visible_rows {
            self.scroll = self.cursor + 1 - self.visible_rows;
        }
        self.needs_redraw = true;
    }

    pub fn scroll_by(&mut self, delta: isize) {
        self.scroll = self.scroll.saturating_add_signed(delta);
        self.clamp_scroll();
        self.needs_redraw = true;
    }

    /// Index of the row drawn at `line` lines below the top of the list
    pub fn row_at_line(&self, line: usize) -> Option<usize> {
        let index = self.scroll + line / ROW_HEIGHT;
        (index < self.removed_posts.len() && line / ROW_HEIGHT < self.visible_rows).then_some(index)
    }

    pub fn visible_range(&self) -> Range<usize> {
        let end = (self.scroll + self.visible_rows).min(self.removed_posts.len());
        self.scroll.min(end)..end
    }

    /// Fit the list into `visible_rows` rows, fetch thumbnails for rows that
    /// came into view and abort fetches for rows that left it.
    pub fn update_viewport(&mut self, visible_rows: usize) {
        self.visible_rows = visible_rows.max(1);
        self.clamp_scroll();
        let visible = self.visible_range();

        let Some(requests) = self.thumbnails.as_mut() else {
            return;
        };

        for (index, removed_post) in self.removed_posts.iter().enumerate() {
            let post_no = removed_post.post_no();
            if visible.contains(&index) {
                // Only the first image of a post is ever shown
                let Some(image) = removed_post.images().first() else {
                    continue;
                };
                if self.images.contains_key(&post_no) {
                    continue;
                }
                let request = ThumbnailRequest {
                    url: image.thumbnail_url.clone(),
                    width: THUMBNAIL_PIXELS.0,
                    height: THUMBNAIL_PIXELS.1,
                };
                if requests.request(post_no, request) {
                    self.images.insert(post_no, ImageSlot::Loading);
                }
            } else if requests.cancel(post_no) {
                // Recycled row, fetch again when it scrolls back in
                self.images.remove(&post_no);
            }
        }
    }

    /// Apply finished thumbnail fetches. Returns true if any row changed.
    pub fn poll_thumbnails(&mut self) -> bool {
        let Some(requests) = self.thumbnails.as_mut() else {
            return false;
        };
        let finished = requests.drain();
        if finished.is_empty() {
            return false;
        }

        for (post_no, result) in finished {
            let slot = match result {
                Ok(thumbnail) => ImageSlot::Loaded(Arc::new(thumbnail)),
                Err(err) => {
                    error!(post_no, error = %err, "Error while trying to download post image");
                    ImageSlot::Hidden
                }
            };
            self.images.insert(post_no, slot);
        }
        self.notify_data_set_changed();
        true
    }

    #[cfg(test)]
    pub fn in_flight_thumbnails(&self) -> usize {
        self.thumbnails.as_ref().map_or(0, |r| r.in_flight_count())
    }

    #[cfg(test)]
    /// Number of full redisplays requested so far
    pub fn redisplay_count(&self) -> u64 {
        self.redisplay_count
    }

    pub fn take_redraw(&mut self) -> bool {
        std::mem::take(&mut self.needs_redraw)
    }

    fn notify_data_set_changed(&mut self) {
        self.redisplay_count += 1;
        self.needs_redraw = true;
    }

    fn clamp_scroll(&mut self) {
        let max_scroll = self.removed_posts.len().saturating_sub(self.visible_rows);
        self.scroll = self.scroll.min(max_scroll);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::thumbnails::testing::StaticLoader;
    use crate::types::fixtures::post;
    use std::time::Duration;

    #[derive(Default)]
    struct RecordingCallbacks {
        restored: Vec<Vec<u64>>,
        pops: usize,
    }

    impl RemovedPostsCallbacks for RecordingCallbacks {
        fn on_restore_clicked(&mut self, post_nos: Vec<u64>) {
            self.restored.push(post_nos);
        }

        fn pop(&mut self) {
            self.pops += 1;
        }
    }

    fn controller() -> RemovedPostsController {
        RemovedPostsController::new(Arc::new(StaticLoader::new(Duration::ZERO)))
    }

    fn checked(controller: &RemovedPostsController) -> Vec<bool> {
        controller.removed_posts().iter().map(|rp| rp.is_checked()).collect()
    }

    #[test]
    fn show_starts_unchecked_and_replaces_list() {
        let mut c = controller();
        c.show_removed_posts(&[post(1, 0), post(2, 1)]);
        assert_eq!(checked(&c), vec![false, false]);
        c.on_item_click(0);

        c.show_removed_posts(&[post(3, 0)]);
        assert_eq!(c.len(), 1);
        assert_eq!(c.removed_posts()[0].post_no(), 3);
        assert_eq!(checked(&c), vec![false]);
    }

    #[test]
    fn toggle_flips_only_that_row_and_redisplays_once() {
        let mut c = controller();
        c.show_removed_posts(&[post(1, 0), post(2, 0), post(3, 0)]);
        let before = c.redisplay_count();

        c.on_item_click(1);
        assert_eq!(checked(&c), vec![false, true, false]);
        assert_eq!(c.redisplay_count(), before + 1);

        c.on_item_click(1);
        assert_eq!(checked(&c), vec![false, false, false]);
        assert_eq!(c.redisplay_count(), before + 2);

        c.on_item_click(42);
        assert_eq!(c.redisplay_count(), before + 2);
    }

    #[test]
    fn select_all_follows_first_row() {
        let mut c = controller();
        c.show_removed_posts(&[post(1, 0), post(2, 0), post(3, 0)]);
        c.on_item_click(2);

        c.select_all();
        assert_eq!(checked(&c), vec![true, true, true]);

        c.on_item_click(1);
        c.select_all();
        assert_eq!(checked(&c), vec![false, false, false]);
    }

    #[test]
    fn select_all_twice_restores_uniform_state() {
        let mut c = controller();
        c.show_removed_posts(&[post(1, 0), post(2, 0)]);
        c.select_all();
        c.select_all();
        assert_eq!(checked(&c), vec![false, false]);
    }

    #[test]
    fn select_all_on_empty_list_is_noop() {
        let mut c = controller();
        c.show_removed_posts(&[]);
        let before = c.redisplay_count();
        c.select_all();
        c.select_all();
        assert!(c.is_empty());
        assert_eq!(c.redisplay_count(), before);
    }

    #[test]
    fn restore_with_nothing_checked_skips_callbacks() {
        let mut c = controller();
        c.show_removed_posts(&[post(5, 0), post(7, 0)]);
        let mut callbacks = RecordingCallbacks::default();
        c.on_restore(&mut callbacks);
        assert!(callbacks.restored.is_empty());
        assert_eq!(callbacks.pops, 0);
    }

    #[test]
    fn restore_forwards_checked_ids_in_list_order() {
        let mut c = controller();
        c.show_removed_posts(&[post(5, 0), post(7, 0), post(9, 0)]);
        c.on_item_click(2);
        c.on_item_click(0);

        let mut callbacks = RecordingCallbacks::default();
        c.on_restore(&mut callbacks);
        assert_eq!(callbacks.restored, vec![vec![5, 9]]);
    }

    #[test]
    fn back_only_pops() {
        let mut c = controller();
        c.show_removed_posts(&[post(5, 0)]);
        c.on_item_click(0);
        let mut callbacks = RecordingCallbacks::default();
        c.on_back(&mut callbacks);
        assert_eq!(callbacks.pops, 1);
        assert!(callbacks.restored.is_empty());
        assert_eq!(checked(&c), vec![true]);
    }

    #[test]
    fn row_view_uses_label_and_image_rules() {
        let mut c = controller();
        let mut with_markup = post(11, 2);
        with_markup.comment = "a&amp;b<br>c".to_string();
        c.show_removed_posts(&[post(10, 0), with_markup]);

        let row = c.row_view(0);
        assert_eq!(row.label, "No. 10");
        assert_eq!(row.image, ImageSlot::Hidden);
        assert!(!row.checked);

        let row = c.row_view(1);
        assert_eq!(row.comment, "a&b\nc");
        assert_eq!(row.image, ImageSlot::Loading);
    }

    #[test]
    #[should_panic(expected = "position = 3, items count = 1")]
    fn row_view_out_of_range_is_fatal() {
        let mut c = controller();
        c.show_removed_posts(&[post(1, 0)]);
        c.row_view(3);
    }

    #[test]
    fn status_bar_tint_is_skipped_when_previous_was_none() {
        let now = Instant::now();
        let mut c = controller();
        assert!(c.on_create(None, now).is_none());
        assert!(c.stop_presenting(now).is_none());

        let tint = Rgb(100, 40, 20);
        let open = c.on_create(Some(tint), now).unwrap();
        assert_eq!(open.from, tint);
        let close = c.stop_presenting(now).unwrap();
        assert_eq!(close.to, tint);
    }

    #[test]
    fn cursor_keeps_within_viewport() {
        let mut c = controller();
        let posts: Vec<_> = (1..=10).map(|no| post(no, 0)).collect();
        c.show_removed_posts(&posts);
        c.visible_rows = 3;

        c.move_cursor(4);
        assert_eq!(c.cursor(), 4);
        assert_eq!(c.scroll(), 2);
        assert_eq!(c.visible_range(), 2..5);

        c.move_cursor(-10);
        assert_eq!((c.cursor(), c.scroll()), (0, 0));

        c.move_cursor(100);
        assert_eq!((c.cursor(), c.scroll()), (9, 7));
        assert_eq!(c.row_at_line(0), Some(7));
        assert_eq!(c.row_at_line(ROW_HEIGHT * 2 + 1), Some(9));
        assert_eq!(c.row_at_line(ROW_HEIGHT * 3), None);
    }

    #[tokio::test]
    async fn only_visible_rows_with_images_are_fetched() {
        let mut c = controller();
        let posts = vec![post(1, 2), post(2, 0), post(3, 1), post(4, 1)];
        c.show_removed_posts(&posts);

        c.update_viewport(3);
        assert_eq!(c.in_flight_thumbnails(), 2);

        for _ in 0..200 {
            if c.poll_thumbnails() && c.in_flight_thumbnails() == 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert!(matches!(c.row_view(0).image, ImageSlot::Loaded(_)));
        assert_eq!(c.row_view(1).image, ImageSlot::Hidden);
        assert!(matches!(c.row_view(2).image, ImageSlot::Loaded(_)));
        assert_eq!(c.row_view(3).image, ImageSlot::Loading);
    }

    #[tokio::test]
    async fn only_the_first_image_of_a_post_is_requested() {
        let loader = Arc::new(StaticLoader::new(Duration::ZERO));
        let mut c = RemovedPostsController::new(Arc::clone(&loader) as Arc<dyn ThumbnailLoader>);
        let with_two_images = post(1, 2);
        c.show_removed_posts(std::slice::from_ref(&with_two_images));

        c.update_viewport(3);
        for _ in 0..200 {
            if c.poll_thumbnails() && c.in_flight_thumbnails() == 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        assert!(matches!(c.row_view(0).image, ImageSlot::Loaded(_)));
        assert_eq!(loader.requested(), vec![with_two_images.images[0].thumbnail_url.clone()]);
    }

    #[tokio::test]
    async fn failed_thumbnail_hides_slot() {
        let mut c = controller();
        let mut broken = post(1, 1);
        broken.images[0].thumbnail_url = "https://example.com/broken.jpg".to_string();
        c.show_removed_posts(&[broken]);
        c.update_viewport(1);

        for _ in 0..200 {
            if c.poll_thumbnails() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(c.row_view(0).image, ImageSlot::Hidden);
    }

    #[tokio::test]
    async fn scrolled_out_rows_are_cancelled() {
        let mut c = RemovedPostsController::new(Arc::new(StaticLoader::new(Duration::from_secs(5))));
        let posts: Vec<_> = (1..=4).map(|no| post(no, 1)).collect();
        c.show_removed_posts(&posts);

        c.update_viewport(2);
        assert_eq!(c.in_flight_thumbnails(), 2);

        c.scroll_by(2);
        c.update_viewport(2);
        assert_eq!(c.visible_range(), 2..4);
        assert_eq!(c.in_flight_thumbnails(), 2);
        assert_eq!(c.row_view(0).image, ImageSlot::Loading);

        c.stop_presenting(Instant::now());
        assert_eq!(c.in_flight_thumbnails(), 0);
    }
}
