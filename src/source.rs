use std::io;

use serde::Deserialize;
use thiserror::Error;
use tracing::info;

use crate::types::{Post, PostImage};

pub const DEFAULT_MEDIA_HOST: &str = "https://i.4cdn.org";

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("failed to fetch thread: {0}")]
    Http(#[from] reqwest::Error),
    #[error("failed to read thread file: {0}")]
    Io(#[from] io::Error),
    #[error("malformed thread JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("thread contains no posts")]
    Empty,
}

/// A loaded thread: the opening post plus its replies, in board order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Thread {
    pub board: String,
    pub no: u64,
    pub posts: Vec<Post>,
}

#[derive(Deserialize)]
struct ApiThread {
    posts: Vec<ApiPost>,
}

/// `tim` is a number on 4chan and a string on vichan boards
#[derive(Deserialize)]
#[serde(untagged)]
enum ApiTim {
    Number(u64),
    Text(String),
}

impl ApiTim {
    fn as_string(&self) -> String {
        match self {
            ApiTim::Number(n) => n.to_string(),
            ApiTim::Text(s) => s.clone(),
        }
    }
}

#[derive(Deserialize)]
struct ApiFile {
    tim: Option<ApiTim>,
    ext: Option<String>,
    filename: Option<String>,
    fsize: Option<u64>,
    w: Option<u32>,
    h: Option<u32>,
}

#[derive(Deserialize)]
struct ApiPost {
    no: u64,
    #[serde(default)]
    time: i64,
    name: Option<String>,
    sub: Option<String>,
    com: Option<String>,
    #[serde(flatten)]
    file: ApiFile,
    #[serde(default)]
    extra_files: Vec<ApiFile>,
}

/// Where thumbnails and full images of a board live
#[derive(Debug, Clone)]
pub struct MediaHost {
    base: String,
    board: String,
}

impl MediaHost {
    pub fn new(base: &str, board: &str) -> Self {
        MediaHost {
            base: base.trim_end_matches('/').to_string(),
            board: board.to_string(),
        }
    }

    pub fn thumbnail_url(&self, tim: &str) -> String {
        format!("{}/{}/{}s.jpg", self.base, self.board, tim)
    }

    pub fn image_url(&self, tim: &str, ext: &str) -> String {
        format!("{}/{}/{}{}", self.base, self.board, tim, ext)
    }

    fn image(&self, file: &ApiFile) -> Option<PostImage> {
        let tim = file.tim.as_ref()?.as_string();
        let ext = file.ext.clone()?;
        Some(PostImage {
            thumbnail_url: self.thumbnail_url(&tim),
            image_url: self.image_url(&tim, &ext),
            filename: file.filename.clone().unwrap_or_else(|| tim.clone()),
            extension: ext,
            size: file.fsize,
            width: file.w,
            height: file.h,
        })
    }
}

/// Parse a thread in the board JSON API layout
pub fn parse_thread(bytes: &[u8], media: &MediaHost) -> Result<Thread, SourceError> {
    let api: ApiThread = serde_json::from_slice(bytes)?;
    let posts: Vec<Post> = api
        .posts
        .into_iter()
        .map(|p| {
            let images = std::iter::once(&p.file)
                .chain(p.extra_files.iter())
                .filter_map(|file| media.image(file))
                .collect();
            Post {
                no: p.no,
                time: p.time,
                name: p.name.unwrap_or_else(|| "Anonymous".to_string()),
                subject: p.sub,
                comment: p.com.unwrap_or_default(),
                images,
            }
        })
        .collect();

    let no = posts.first().map(|p| p.no).ok_or(SourceError::Empty)?;
    Ok(Thread {
        board: media.board.clone(),
        no,
        posts,
    })
}

/// Load a thread from an `http(s)://` URL or a local JSON file
pub async fn load_thread(location: &str, media: &MediaHost, client: &reqwest::Client) -> Result<Thread, SourceError> {
    let bytes = if location.starts_with("http://") || location.starts_with("https://") {
        client
            .get(location)
            .send()
            .await?
            .error_for_status()?
            .bytes()
            .await?
            .to_vec()
    } else {
        tokio::fs::read(location).await?
    };

    let thread = parse_thread(&bytes, media)?;
    info!(board = %thread.board, thread = thread.no, posts = thread.posts.len(), "Thread loaded");
    Ok(thread)
}

#[cfg(test)]
mod tests {
    use super::*;

    const THREAD: &str = r#"{
        "posts": [
            {"no": 100, "time": 1700000000, "name": "Anonymous", "sub": "Desktop thread",
             "com": "Post your desktops", "tim": 1700000000123, "ext": ".png",
             "filename": "desktop", "fsize": 20480, "w": 1920, "h": 1080},
            {"no": 101, "time": 1700000060, "com": "&gt;&gt;100<br>nice"},
            {"no": 102, "time": 1700000120, "tim": "1700000120456", "ext": ".jpg",
             "extra_files": [{"tim": "1700000120457", "ext": ".webm", "filename": "clip"}]}
        ]
    }"#;

    fn media() -> MediaHost {
        MediaHost::new("https://i.4cdn.org/", "g")
    }

    #[test]
    fn parses_posts_and_images() {
        let thread = parse_thread(THREAD.as_bytes(), &media()).unwrap();
        assert_eq!(thread.no, 100);
        assert_eq!(thread.board, "g");
        assert_eq!(thread.posts.len(), 3);

        let op = &thread.posts[0];
        assert_eq!(op.subject.as_deref(), Some("Desktop thread"));
        assert_eq!(op.images.len(), 1);
        assert_eq!(op.images[0].thumbnail_url, "https://i.4cdn.org/g/1700000000123s.jpg");
        assert_eq!(op.images[0].image_url, "https://i.4cdn.org/g/1700000000123.png");
        assert_eq!(op.images[0].size, Some(20480));

        let reply = &thread.posts[1];
        assert_eq!(reply.name, "Anonymous");
        assert!(reply.images.is_empty());

        let multi = &thread.posts[2];
        assert_eq!(multi.images.len(), 2);
        assert_eq!(multi.images[0].filename, "1700000120456");
        assert_eq!(multi.images[1].image_url, "https://i.4cdn.org/g/1700000120457.webm");
    }

    #[test]
    fn empty_thread_is_an_error() {
        let err = parse_thread(br#"{"posts": []}"#, &media()).unwrap_err();
        assert!(matches!(err, SourceError::Empty));
        assert!(matches!(parse_thread(b"{", &media()), Err(SourceError::Json(_))));
    }

    #[tokio::test]
    async fn loads_from_local_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("thread.json");
        std::fs::write(&path, THREAD).unwrap();

        let client = reqwest::Client::new();
        let thread = load_thread(path.to_str().unwrap(), &media(), &client).await.unwrap();
        assert_eq!(thread.posts.len(), 3);
    }
}
