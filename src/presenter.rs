use std::collections::HashSet;

use tracing::info;

use crate::removed_posts::RemovedPostsCallbacks;
use crate::source::Thread;
use crate::types::Post;

/// Owns the thread's posts and which of them the user removed
pub struct ThreadPresenter {
    thread: Thread,
    removed: HashSet<u64>,
    selected: usize,
}

impl ThreadPresenter {
    /// `hidden` holds previously removed post numbers; unknown numbers are ignored
    pub fn new(thread: Thread, hidden: &[u64]) -> Self {
        let known: HashSet<u64> = thread.posts.iter().map(|p| p.no).collect();
        let removed = hidden.iter().copied().filter(|no| known.contains(no)).collect();
        ThreadPresenter {
            thread,
            removed,
            selected: 0,
        }
    }

    /// Key used to persist removed posts, e.g. `g/100`
    pub fn thread_key(&self) -> String {
        format!("{}/{}", self.thread.board, self.thread.no)
    }

    pub fn thread(&self) -> &Thread {
        &self.thread
    }

    pub fn visible_posts(&self) -> Vec<&Post> {
        self.thread
            .posts
            .iter()
            .filter(|p| !self.removed.contains(&p.no))
            .collect()
    }

    /// Removed posts in thread order
    pub fn removed_posts(&self) -> Vec<Post> {
        self.thread
            .posts
            .iter()
            .filter(|p| self.removed.contains(&p.no))
            .cloned()
            .collect()
    }

    pub fn removed_count(&self) -> usize {
        self.removed.len()
    }

    pub fn hidden_post_nos(&self) -> Vec<u64> {
        let mut nos: Vec<u64> = self.removed.iter().copied().collect();
        nos.sort_unstable();
        nos
    }

    pub fn selected_index(&self) -> usize {
        self.selected
    }

    pub fn selected_post(&self) -> Option<&Post> {
        self.visible_posts().get(self.selected).copied()
    }

    pub fn select_next(&mut self) {
        let count = self.visible_posts().len();
        if self.selected + 1 < count {
            self.selected += 1;
        }
    }

    pub fn select_previous(&mut self) {
        self.selected = self.selected.saturating_sub(1);
    }

    pub fn remove_post(&mut self, no: u64) -> bool {
        if !self.thread.posts.iter().any(|p| p.no == no) || !self.removed.insert(no) {
            return false;
        }
        info!(post_no = no, "Post removed");
        self.clamp_selection();
        true
    }

    pub fn remove_selected(&mut self) -> Option<u64> {
        let no = self.selected_post()?.no;
        self.remove_post(no).then_some(no)
    }

    /// Put the given posts back into the thread view. Returns how many were restored.
    pub fn restore_posts(&mut self, post_nos: &[u64]) -> usize {
        let restored = post_nos.iter().filter(|no| self.removed.remove(*no)).count();
        info!(restored, requested = post_nos.len(), "Posts restored");
        restored
    }

    fn clamp_selection(&mut self) {
        let count = self.visible_posts().len();
        self.selected = self.selected.min(count.saturating_sub(1));
    }
}

/// Bridges the removed posts dialog to the presenter for one UI event
pub struct RemovedPostsHelper<'a> {
    presenter: &'a mut ThreadPresenter,
    close_requested: bool,
    restored: Option<usize>,
}

impl<'a> RemovedPostsHelper<'a> {
    pub fn new(presenter: &'a mut ThreadPresenter) -> Self {
        RemovedPostsHelper {
            presenter,
            close_requested: false,
            restored: None,
        }
    }

    pub fn close_requested(&self) -> bool {
        self.close_requested
    }

    /// Number of posts restored during this event, if a restore happened
    pub fn restored(&self) -> Option<usize> {
        self.restored
    }
}

impl RemovedPostsCallbacks for RemovedPostsHelper<'_> {
    fn on_restore_clicked(&mut self, post_nos: Vec<u64>) {
        self.restored = Some(self.presenter.restore_posts(&post_nos));
        self.close_requested = true;
    }

    fn pop(&mut self) {
        self.close_requested = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::fixtures::post;

    fn presenter(hidden: &[u64]) -> ThreadPresenter {
        let thread = Thread {
            board: "g".to_string(),
            no: 1,
            posts: (1..=5).map(|no| post(no, 0)).collect(),
        };
        ThreadPresenter::new(thread, hidden)
    }

    #[test]
    fn hidden_posts_are_filtered_and_unknown_ignored() {
        let p = presenter(&[2, 4, 99]);
        assert_eq!(p.hidden_post_nos(), vec![2, 4]);
        let visible: Vec<u64> = p.visible_posts().iter().map(|p| p.no).collect();
        assert_eq!(visible, vec![1, 3, 5]);
        let removed: Vec<u64> = p.removed_posts().iter().map(|p| p.no).collect();
        assert_eq!(removed, vec![2, 4]);
        assert_eq!(p.thread_key(), "g/1");
    }

    #[test]
    fn remove_selected_keeps_selection_in_range() {
        let mut p = presenter(&[]);
        for _ in 0..10 {
            p.select_next();
        }
        assert_eq!(p.selected_index(), 4);
        assert_eq!(p.remove_selected(), Some(5));
        assert_eq!(p.selected_index(), 3);
        assert!(!p.remove_post(5));
        assert!(!p.remove_post(42));
    }

    #[test]
    fn helper_restores_and_requests_close() {
        let mut p = presenter(&[2, 3]);
        {
            let mut helper = RemovedPostsHelper::new(&mut p);
            helper.on_restore_clicked(vec![3, 4]);
            assert!(helper.close_requested());
            assert_eq!(helper.restored(), Some(1));
        }
        assert_eq!(p.hidden_post_nos(), vec![2]);

        let mut helper = RemovedPostsHelper::new(&mut p);
        helper.pop();
        assert!(helper.close_requested());
        assert_eq!(helper.restored(), None);
    }
}
