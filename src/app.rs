use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use ratatui::layout::Rect;
use tokio::sync::mpsc::{self, error::TryRecvError};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::config::{SavedConfig, save_config_to};
use crate::download::{ChunkedDownloader, DownloadEvent, DownloadRequest};
use crate::presenter::{RemovedPostsHelper, ThreadPresenter};
use crate::removed_posts::{ROW_HEIGHT, RemovedPostsController};
use crate::theme::{Rgb, ThemeEngine};
use crate::thumbnails::ThumbnailLoader;
use crate::types::AppMode;
use crate::ui::renderers::removed_posts::dialog_layout;
use crate::ui::status_bar::TintTransition;
use crate::ui::utils::format_bytes;
use crate::ui::widgets::loading_bar::LoadingBar;

/// How long a notification stays in the footer
pub const NOTIFICATION_TIMEOUT: Duration = Duration::from_secs(5);

pub struct ActiveDownload {
    pub name: String,
    rx: mpsc::Receiver<DownloadEvent>,
    handle: JoinHandle<()>,
}

pub struct App {
    pub mode: AppMode,
    pub presenter: ThreadPresenter,
    pub themes: ThemeEngine,
    pub loading_bar: LoadingBar,
    pub removed_posts: Option<RemovedPostsController>,
    pub download: Option<ActiveDownload>,
    pub status_bar_transition: Option<TintTransition>,
    pub notification: Option<String>,
    pub notification_time: Option<Instant>,
    /// Size of the terminal, used to lay out the dialog outside of drawing
    pub screen: Rect,
    pub needs_redraw: bool,
    thumbnail_loader: Arc<dyn ThumbnailLoader>,
    downloader: ChunkedDownloader,
    config: SavedConfig,
    config_path: Option<PathBuf>,
    download_dir: PathBuf,
}

impl App {
    pub fn new(
        presenter: ThreadPresenter,
        themes: ThemeEngine,
        thumbnail_loader: Arc<dyn ThumbnailLoader>,
        downloader: ChunkedDownloader,
        config: SavedConfig,
        config_path: Option<PathBuf>,
        download_dir: PathBuf,
    ) -> Self {
        let mut loading_bar = LoadingBar::new(themes.accent());
        loading_bar.attach(&themes);

        App {
            mode: AppMode::Thread,
            presenter,
            themes,
            loading_bar,
            removed_posts: None,
            download: None,
            status_bar_transition: None,
            notification: None,
            notification_time: None,
            screen: Rect::default(),
            needs_redraw: true,
            thumbnail_loader,
            downloader,
            config,
            config_path,
            download_dir,
        }
    }

    pub fn notify(&mut self, message: impl Into<String>) {
        self.notification = Some(message.into());
        self.notification_time = Some(Instant::now());
        self.needs_redraw = true;
    }

    /// Color of the top status bar, following any running tint transition
    pub fn status_bar_color(&self, now: Instant) -> Option<Rgb> {
        match &self.status_bar_transition {
            Some(transition) => Some(transition.color_at(now)),
            None => self.themes.current().status_bar,
        }
    }

    pub fn open_removed_posts(&mut self, now: Instant) {
        let removed = self.presenter.removed_posts();
        if removed.is_empty() {
            self.notify("ℹ️  No removed posts in this thread");
            return;
        }

        let mut controller = RemovedPostsController::new(Arc::clone(&self.thumbnail_loader));
        self.status_bar_transition = controller.on_create(self.themes.current().status_bar, now);
        controller.show_removed_posts(&removed);
        controller.update_viewport(self.dialog_rows());
        self.removed_posts = Some(controller);
        self.mode = AppMode::RemovedPosts;
        self.needs_redraw = true;
    }

    pub fn close_removed_posts(&mut self, now: Instant) {
        if let Some(mut controller) = self.removed_posts.take() {
            self.status_bar_transition = controller.stop_presenting(now);
        }
        self.mode = AppMode::Thread;
        self.needs_redraw = true;
    }

    /// Back key or a click outside the dialog
    pub fn removed_posts_back(&mut self, now: Instant) {
        let Some(controller) = self.removed_posts.as_mut() else {
            return;
        };
        let mut helper = RemovedPostsHelper::new(&mut self.presenter);
        controller.on_back(&mut helper);
        if helper.close_requested() {
            self.close_removed_posts(now);
        }
    }

    pub fn restore_selected(&mut self, now: Instant) {
        let Some(controller) = self.removed_posts.as_mut() else {
            return;
        };
        let mut helper = RemovedPostsHelper::new(&mut self.presenter);
        controller.on_restore(&mut helper);
        let (close, restored) = (helper.close_requested(), helper.restored());

        if let Some(count) = restored {
            self.persist_hidden();
            self.notify(format!("♻️  Restored {} post(s)", count));
        }
        if close {
            self.close_removed_posts(now);
        }
    }

    pub fn remove_selected_post(&mut self) {
        if let Some(no) = self.presenter.remove_selected() {
            self.persist_hidden();
            self.notify(format!("🗑️  Removed No. {} (R to restore)", no));
        }
    }

    pub fn cycle_theme(&mut self) {
        let name = self.themes.cycle().name.clone();
        self.config.theme = Some(name.clone());
        self.persist();
        self.notify(format!("🎨 Theme: {}", name));
    }

    /// Download the first image of the selected post
    pub fn start_download(&mut self) {
        if let Some(active) = &self.download {
            let message = format!("⏳ Still downloading {}", active.name);
            self.notify(message);
            return;
        }
        let Some(image) = self.presenter.selected_post().and_then(|p| p.images.first()).cloned() else {
            self.notify("ℹ️  Selected post has no image");
            return;
        };

        let name = image.download_name();
        let request = DownloadRequest {
            url: image.image_url.clone(),
            destination: self.download_dir.join(&name),
            chunks: self.config.chunks,
        };
        info!(url = %request.url, chunks = request.chunks, "Starting download");

        let (tx, rx) = mpsc::channel(16);
        let handle = self.downloader.spawn(request, tx);
        self.download = Some(ActiveDownload { name: name.clone(), rx, handle });
        self.notify(format!("⬇️  Downloading {}", name));
    }

    /// Apply pending download events to the loading bar
    pub fn poll_download(&mut self) {
        let Some(active) = self.download.as_mut() else {
            return;
        };

        let mut finished = None;
        loop {
            match active.rx.try_recv() {
                Ok(DownloadEvent::Progress(progress)) => self.loading_bar.set_progress(&progress),
                Ok(event) => {
                    finished = Some(event);
                    break;
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    finished = Some(DownloadEvent::Failed("download task stopped".to_string()));
                    break;
                }
            }
        }

        let Some(event) = finished else {
            return;
        };
        self.download = None;
        self.loading_bar.reset();
        match event {
            DownloadEvent::Finished { path, bytes } => {
                self.notify(format!("✅ Saved {} ({})", path.display(), format_bytes(bytes)));
            }
            DownloadEvent::Failed(reason) => self.notify(format!("❌ Download failed: {}", reason)),
            DownloadEvent::Progress(_) => {}
        }
    }

    /// Periodic housekeeping, run by the event loop between input events
    pub fn tick(&mut self, now: Instant) {
        self.poll_download();

        if self.loading_bar.sync_theme() {
            self.needs_redraw = true;
        }

        let rows = self.dialog_rows();
        if let Some(controller) = self.removed_posts.as_mut() {
            controller.update_viewport(rows);
            controller.poll_thumbnails();
            if controller.take_redraw() {
                self.needs_redraw = true;
            }
        }

        if self.loading_bar.take_redraw() {
            self.needs_redraw = true;
        }

        if let Some(transition) = &self.status_bar_transition {
            if !transition.is_finished(now) {
                self.needs_redraw = true;
            } else if self.mode == AppMode::Thread {
                self.status_bar_transition = None;
            }
        }

        // Cleanup notifications that have been displayed for more than 5 seconds
        if let Some(time) = self.notification_time {
            if now.saturating_duration_since(time) > NOTIFICATION_TIMEOUT {
                self.notification = None;
                self.notification_time = None;
                self.needs_redraw = true;
            }
        }
    }

    pub fn take_redraw(&mut self) -> bool {
        std::mem::take(&mut self.needs_redraw)
    }

    /// Detach from the theme, stop background work and save state
    pub fn shutdown(&mut self) {
        self.close_removed_posts(Instant::now());
        self.loading_bar.detach();
        if let Some(active) = self.download.take() {
            active.handle.abort();
            warn!(name = %active.name, "Download aborted on exit");
        }
        self.persist();
    }

    /// Rows of the removed posts list that fit on the current screen
    fn dialog_rows(&self) -> usize {
        dialog_layout(self.screen).list.height as usize / ROW_HEIGHT
    }

    fn persist_hidden(&mut self) {
        let key = self.presenter.thread_key();
        self.config.set_hidden(&key, self.presenter.hidden_post_nos());
        self.persist();
    }

    fn persist(&self) {
        let Some(path) = &self.config_path else {
            return;
        };
        if let Err(e) = save_config_to(path, &self.config) {
            warn!(path = %path.display(), error = %e, "Failed to save configuration");
        }
    }

    #[cfg(test)]
    pub(crate) fn config(&self) -> &SavedConfig {
        &self.config
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::source::Thread;
    use crate::thumbnails::testing::StaticLoader;
    use crate::types::fixtures::post;

    /// Four posts without images in thread g/1, laid out on a 100x40 screen
    pub fn app(hidden: &[u64], config_path: Option<PathBuf>) -> App {
        let thread = Thread {
            board: "g".to_string(),
            no: 1,
            posts: (1..=4).map(|no| post(no, 0)).collect(),
        };
        let mut app = App::new(
            ThreadPresenter::new(thread, hidden),
            ThemeEngine::new(Some("Yotsuba")),
            Arc::new(StaticLoader::new(Duration::ZERO)),
            ChunkedDownloader::new(reqwest::Client::new()),
            SavedConfig::default(),
            config_path,
            PathBuf::from("/tmp/chantui-test"),
        );
        app.screen = Rect::new(0, 0, 100, 40);
        app
    }
}
