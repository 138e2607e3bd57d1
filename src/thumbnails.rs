use std::collections::HashMap;
use std::io;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use image::DynamicImage;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinHandle};
use tracing::debug;

use crate::theme::Rgb;

/// Decoded thumbnail, downscaled to the size requested by the row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Thumbnail {
    width: u32,
    height: u32,
    pixels: Vec<Rgb>,
}

impl Thumbnail {
    pub fn new(width: u32, height: u32, pixels: Vec<Rgb>) -> Self {
        debug_assert_eq!(pixels.len(), (width * height) as usize);
        Thumbnail { width, height, pixels }
    }

    /// Decode image bytes and shrink them to fit within `max_width` x `max_height`
    pub fn decode(bytes: &[u8], max_width: u32, max_height: u32) -> Result<Self, ThumbnailError> {
        let image = image::load_from_memory(bytes)?;
        Ok(Self::from_image(&image, max_width, max_height))
    }

    pub fn from_image(image: &DynamicImage, max_width: u32, max_height: u32) -> Self {
        let rgb = image
            .thumbnail(max_width.max(1), max_height.max(1))
            .to_rgb8();
        let pixels = rgb.pixels().map(|p| Rgb(p.0[0], p.0[1], p.0[2])).collect();
        Thumbnail::new(rgb.width(), rgb.height(), pixels)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    #[cfg(test)]
    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<Rgb> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.pixels.get((y * self.width + x) as usize).copied()
    }
}

/// What to fetch and how large the slot it will be shown in is, in pixels
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThumbnailRequest {
    pub url: String,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Error)]
pub enum ThumbnailError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("failed to read thumbnail: {0}")]
    Io(#[from] io::Error),
    #[error("failed to decode thumbnail: {0}")]
    Decode(#[from] image::ImageError),
    #[error("decoder task failed: {0}")]
    Task(#[from] JoinError),
}

/// Fetches thumbnails for rows of the removed posts list
pub trait ThumbnailLoader: Send + Sync {
    fn load<'a>(&'a self, request: &'a ThumbnailRequest) -> BoxFuture<'a, Result<Thumbnail, ThumbnailError>>;
}

/// Loads `http(s)://` URLs through reqwest and everything else from the local filesystem
pub struct HttpThumbnailLoader {
    client: reqwest::Client,
}

impl HttpThumbnailLoader {
    pub fn new(client: reqwest::Client) -> Self {
        HttpThumbnailLoader { client }
    }

    async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>, ThumbnailError> {
        if url.starts_with("http://") || url.starts_with("https://") {
            let response = self.client.get(url).send().await?.error_for_status()?;
            Ok(response.bytes().await?.to_vec())
        } else {
            let path = url.strip_prefix("file://").unwrap_or(url);
            Ok(tokio::fs::read(path).await?)
        }
    }
}

impl ThumbnailLoader for HttpThumbnailLoader {
    fn load<'a>(&'a self, request: &'a ThumbnailRequest) -> BoxFuture<'a, Result<Thumbnail, ThumbnailError>> {
        Box::pin(async move {
            let bytes = self.fetch_bytes(&request.url).await?;
            let (width, height) = (request.width, request.height);
            // Decoding is CPU bound, keep it off the runtime workers
            tokio::task::spawn_blocking(move || Thumbnail::decode(&bytes, width, height)).await?
        })
    }
}

/// A finished fetch, reported back to the UI loop
#[derive(Debug)]
pub struct ThumbnailEvent {
    pub post_no: u64,
    ticket: u64,
    pub result: Result<Thumbnail, ThumbnailError>,
}

struct InFlight {
    ticket: u64,
    handle: JoinHandle<()>,
}

/// At most one outstanding fetch per post, each abortable when its row goes away.
///
/// Every request gets a fresh ticket; results whose ticket no longer matches
/// the in-flight entry for that post are dropped by [`ThumbnailRequests::drain`].
pub struct ThumbnailRequests {
    loader: Arc<dyn ThumbnailLoader>,
    tx: mpsc::UnboundedSender<ThumbnailEvent>,
    rx: mpsc::UnboundedReceiver<ThumbnailEvent>,
    in_flight: HashMap<u64, InFlight>,
    next_ticket: u64,
}

impl ThumbnailRequests {
    pub fn new(loader: Arc<dyn ThumbnailLoader>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        ThumbnailRequests {
            loader,
            tx,
            rx,
            in_flight: HashMap::new(),
            next_ticket: 0,
        }
    }

    /// Start fetching for `post_no` unless a fetch is already running. Must be
    /// called from within a tokio runtime.
    pub fn request(&mut self, post_no: u64, request: ThumbnailRequest) -> bool {
        if self.in_flight.contains_key(&post_no) {
            return false;
        }

        self.next_ticket += 1;
        let ticket = self.next_ticket;
        let loader = Arc::clone(&self.loader);
        let tx = self.tx.clone();

        debug!(post_no, url = %request.url, "Requesting thumbnail");
        let handle = tokio::spawn(async move {
            let result = loader.load(&request).await;
            // Receiver gone means the list was torn down, nothing to report
            let _ = tx.send(ThumbnailEvent { post_no, ticket, result });
        });
        self.in_flight.insert(post_no, InFlight { ticket, handle });
        true
    }

    /// Abort the fetch for a recycled row
    pub fn cancel(&mut self, post_no: u64) -> bool {
        match self.in_flight.remove(&post_no) {
            Some(entry) => {
                entry.handle.abort();
                debug!(post_no, "Cancelled thumbnail request");
                true
            }
            None => false,
        }
    }

    pub fn cancel_all(&mut self) -> usize {
        let count = self.in_flight.len();
        for (_, entry) in self.in_flight.drain() {
            entry.handle.abort();
        }
        count
    }

    #[cfg(test)]
    pub fn is_in_flight(&self, post_no: u64) -> bool {
        self.in_flight.contains_key(&post_no)
    }

    pub fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }

    /// Collect finished fetches that are still wanted
    pub fn drain(&mut self) -> Vec<(u64, Result<Thumbnail, ThumbnailError>)> {
        let mut finished = Vec::new();
        while let Ok(event) = self.rx.try_recv() {
            let current = self
                .in_flight
                .get(&event.post_no)
                .is_some_and(|entry| entry.ticket == event.ticket);
            if !current {
                debug!(post_no = event.post_no, "Dropping stale thumbnail result");
                continue;
            }
            self.in_flight.remove(&event.post_no);
            finished.push((event.post_no, event.result));
        }
        finished
    }
}

impl Drop for ThumbnailRequests {
    fn drop(&mut self) {
        self.cancel_all();
    }
}
