use serde::{Deserialize, Serialize};

/// A single attachment on a post
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostImage {
    pub thumbnail_url: String,
    pub image_url: String,
    pub filename: String,
    pub extension: String,
    pub size: Option<u64>,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

impl PostImage {
    /// File name used when saving the full image to disk. Always a single
    /// path component: the extension keeps only ASCII alphanumerics.
    pub fn download_name(&self) -> String {
        let stem: String = self
            .filename
            .chars()
            .map(|c| if c == '/' || c == '\\' || c.is_control() { '_' } else { c })
            .collect();
        let stem = if stem.trim().is_empty() || stem.chars().all(|c| c == '.') {
            "image".to_string()
        } else {
            stem
        };

        let extension: String = self.extension.chars().filter(|c| c.is_ascii_alphanumeric()).collect();
        if extension.is_empty() {
            stem
        } else {
            format!("{}.{}", stem, extension)
        }
    }
}

/// A post as shown in the thread view
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub no: u64,
    /// Unix timestamp in seconds
    pub time: i64,
    pub name: String,
    pub subject: Option<String>,
    /// Raw comment markup as served by the board API
    pub comment: String,
    pub images: Vec<PostImage>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppMode {
    Thread,
    RemovedPosts,
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::{Post, PostImage};

    pub fn image(tim: u64) -> PostImage {
        PostImage {
            thumbnail_url: format!("https://i.4cdn.org/g/{}s.jpg", tim),
            image_url: format!("https://i.4cdn.org/g/{}.png", tim),
            filename: format!("file{}", tim),
            extension: ".png".to_string(),
            size: Some(2048),
            width: Some(800),
            height: Some(600),
        }
    }

    pub fn post(no: u64, images: usize) -> Post {
        Post {
            no,
            time: 1_700_000_000 + no as i64,
            name: "Anonymous".to_string(),
            subject: None,
            comment: format!("comment for {}", no),
            images: (0..images as u64).map(|i| image(no * 10 + i)).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn download_name_replaces_path_separators() {
        let mut image = fixtures::image(1);
        image.filename = "../etc/passwd".to_string();
        assert_eq!(image.download_name(), ".._etc_passwd.png");

        image.filename = "   ".to_string();
        assert_eq!(image.download_name(), "image.png");
    }

    #[test]
    fn download_name_stays_inside_download_dir() {
        let mut image = fixtures::image(1);
        image.extension = "/../../../.bashrc".to_string();
        let name = image.download_name();
        assert_eq!(name, "file1.bashrc");

        let dir = std::path::Path::new("/home/u/Downloads/chantui");
        let joined = dir.join(&name);
        assert_eq!(joined.parent(), Some(dir));
        assert_eq!(joined.components().count(), dir.components().count() + 1);

        image.filename = "..".to_string();
        image.extension = String::new();
        assert_eq!(image.download_name(), "image");
    }
}
