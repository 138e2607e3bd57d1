use std::io::{self, SeekFrom};
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use futures_util::StreamExt;
use futures_util::future::try_join_all;
use reqwest::StatusCode;
use reqwest::header::{ACCEPT_RANGES, CONTENT_LENGTH, RANGE};
use thiserror::Error;
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncSeekExt, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// How often progress snapshots are published while chunks are transferring
pub const PROGRESS_INTERVAL: Duration = Duration::from_millis(100);
/// Chunks smaller than this are not worth a separate range request
pub const MIN_CHUNK_SIZE: u64 = 64 * 1024;

#[derive(Debug, Clone)]
pub struct DownloadRequest {
    pub url: String,
    pub destination: PathBuf,
    pub chunks: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DownloadEvent {
    /// Fraction done per chunk, index-aligned with chunk number
    Progress(Vec<f32>),
    Finished { path: PathBuf, bytes: u64 },
    Failed(String),
}

#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
    #[error("chunk {chunk}: unexpected status {status}")]
    Status { chunk: usize, status: StatusCode },
    #[error("chunk {chunk}: expected {expected} bytes, got {received}")]
    ShortChunk { chunk: usize, expected: u64, received: u64 },
}

/// What a HEAD request told us about the remote file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Probe {
    length: Option<u64>,
    accepts_ranges: bool,
}

/// Split `[0, len)` into at most `chunks` contiguous, non-empty ranges.
/// The last range absorbs the remainder.
pub fn chunk_ranges(len: u64, chunks: usize) -> Vec<Range<u64>> {
    if len == 0 {
        return Vec::new();
    }
    let chunks = (chunks.max(1) as u64).min(len);
    let size = len / chunks;

    (0..chunks)
        .map(|i| {
            let start = i * size;
            let end = if i == chunks - 1 { len } else { start + size };
            start..end
        })
        .collect()
}

/// Number of chunks to use for a file of `len` bytes
pub fn plan_chunks(len: u64, requested: usize) -> usize {
    let by_size = (len / MIN_CHUNK_SIZE).max(1);
    (requested.max(1) as u64).min(by_size) as usize
}

/// Fraction of every range that has been written so far
pub fn snapshot_progress(done: &[AtomicU64], ranges: &[Range<u64>]) -> Vec<f32> {
    done.iter()
        .zip(ranges)
        .map(|(done, range)| {
            let total = range.end - range.start;
            // Unknown length, nothing sensible to report until the transfer ends
            if total == 0 {
                return 0.0;
            }
            (done.load(Ordering::Relaxed) as f64 / total as f64).min(1.0) as f32
        })
        .collect()
}

/// Downloads a file as several parallel range requests
#[derive(Clone)]
pub struct ChunkedDownloader {
    client: reqwest::Client,
}

impl ChunkedDownloader {
    pub fn new(client: reqwest::Client) -> Self {
        ChunkedDownloader { client }
    }

    /// Run the download in the background, reporting through `tx`
    pub fn spawn(&self, request: DownloadRequest, tx: mpsc::Sender<DownloadEvent>) -> JoinHandle<()> {
        let client = self.client.clone();
        tokio::spawn(async move {
            let event = match run(&client, &request, &tx).await {
                Ok(bytes) => {
                    info!(url = %request.url, path = %request.destination.display(), bytes, "Download finished");
                    DownloadEvent::Finished {
                        path: request.destination.clone(),
                        bytes,
                    }
                }
                Err(e) => {
                    error!(url = %request.url, error = %e, "Download failed");
                    DownloadEvent::Failed(e.to_string())
                }
            };
            let _ = tx.send(event).await;
        })
    }
}

async fn run(client: &reqwest::Client, request: &DownloadRequest, tx: &mpsc::Sender<DownloadEvent>) -> Result<u64, DownloadError> {
    let probe = probe(client, &request.url).await?;
    let part = part_path(&request.destination);
    if let Some(parent) = request.destination.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    // Without a known length or range support everything goes through one plain GET
    let ranges: Vec<Option<Range<u64>>> = match probe {
        Probe { length: Some(len), accepts_ranges: true } => chunk_ranges(len, plan_chunks(len, request.chunks))
            .into_iter()
            .map(Some)
            .collect(),
        _ => {
            warn!(url = %request.url, ?probe, "Server does not support ranges, using a single chunk");
            vec![None]
        }
    };

    let file = File::create(&part).await?;
    if let Some(len) = probe.length.filter(|_| probe.accepts_ranges) {
        file.set_len(len).await?;
    }
    drop(file);

    match transfer(client, request, &part, probe, ranges, tx).await {
        Ok(received) => Ok(received),
        Err(e) => {
            if let Err(remove) = tokio::fs::remove_file(&part).await {
                warn!(path = %part.display(), error = %remove, "Failed to remove partial download");
            } else {
                warn!(path = %part.display(), error = %e, "Removed partial download");
            }
            Err(e)
        }
    }
}

/// Fetch every chunk into `part`, then move it to the destination
async fn transfer(
    client: &reqwest::Client,
    request: &DownloadRequest,
    part: &Path,
    probe: Probe,
    ranges: Vec<Option<Range<u64>>>,
    tx: &mpsc::Sender<DownloadEvent>,
) -> Result<u64, DownloadError> {
    let bounds: Vec<Range<u64>> = ranges
        .iter()
        .map(|r| r.clone().unwrap_or(0..probe.length.unwrap_or(0)))
        .collect();
    let done: Arc<Vec<AtomicU64>> = Arc::new(bounds.iter().map(|_| AtomicU64::new(0)).collect());
    debug!(url = %request.url, chunks = ranges.len(), "Starting chunked download");

    let transfers = try_join_all(ranges.iter().enumerate().map(|(index, range)| {
        fetch_chunk(client, &request.url, index, range.clone(), part, Arc::clone(&done))
    }));
    tokio::pin!(transfers);

    let mut ticker = tokio::time::interval(PROGRESS_INTERVAL);
    let received = loop {
        tokio::select! {
            result = &mut transfers => break result?.into_iter().sum::<u64>(),
            _ = ticker.tick() => {
                // A full channel just means the UI has not caught up yet
                let _ = tx.try_send(DownloadEvent::Progress(snapshot_progress(&done, &bounds)));
            }
        }
    };

    let _ = tx.try_send(DownloadEvent::Progress(vec![1.0; ranges.len()]));
    tokio::fs::rename(part, &request.destination).await?;
    Ok(received)
}

async fn probe(client: &reqwest::Client, url: &str) -> Result<Probe, DownloadError> {
    let response = client.head(url).send().await?;
    if !response.status().is_success() {
        // Some servers reject HEAD, fall back to a plain GET later
        return Ok(Probe { length: None, accepts_ranges: false });
    }
    let headers = response.headers();
    let length = headers
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok());
    let accepts_ranges = headers
        .get(ACCEPT_RANGES)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.eq_ignore_ascii_case("bytes"));
    Ok(Probe { length, accepts_ranges })
}

async fn fetch_chunk(
    client: &reqwest::Client,
    url: &str,
    index: usize,
    range: Option<Range<u64>>,
    part: &Path,
    done: Arc<Vec<AtomicU64>>,
) -> Result<u64, DownloadError> {
    let mut builder = client.get(url);
    if let Some(range) = &range {
        builder = builder.header(RANGE, format!("bytes={}-{}", range.start, range.end - 1));
    }
    let response = builder.send().await?;

    let expected_status = if range.is_some() { StatusCode::PARTIAL_CONTENT } else { StatusCode::OK };
    if response.status() != expected_status {
        return Err(DownloadError::Status { chunk: index, status: response.status() });
    }

    let mut file = OpenOptions::new().write(true).open(part).await?;
    file.seek(SeekFrom::Start(range.as_ref().map_or(0, |r| r.start))).await?;

    let mut received = 0u64;
    let mut stream = response.bytes_stream();
    while let Some(piece) = stream.next().await {
        let piece = piece?;
        file.write_all(&piece).await?;
        received += piece.len() as u64;
        done[index].fetch_add(piece.len() as u64, Ordering::Relaxed);
    }
    file.flush().await?;

    if let Some(range) = range {
        let expected = range.end - range.start;
        if received != expected {
            return Err(DownloadError::ShortChunk { chunk: index, expected, received });
        }
    }
    Ok(received)
}

fn part_path(destination: &Path) -> PathBuf {
    let mut name = destination.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".part");
    destination.with_file_name(name)
}
