pub mod scan;

use once_cell::sync::Lazy;
use regex::Regex;
use url::Url;

static RECOGNIZED_HOSTS: [&str; 3] = ["youtube.com", "youtube-nocookie.com", "youtu.be"];
static SHORT_LINK_HOST: &str = "youtu.be";

static EMBED_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"/embed/(?P<id>[a-zA-Z0-9_-]+)").unwrap());

/// A YouTube video found in a URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoReference {
    pub video_id: String,
}

impl VideoReference {
    pub fn from_url(url: &str) -> Option<Self> {
        if !is_recognized_host_url(url) {
            return None;
        }
        extract_video_id(url).map(|video_id| Self { video_id })
    }
}

/// Check if the string mentions one of the YouTube hosts anywhere
pub fn is_recognized_host_url(url: &str) -> bool {
    !url.is_empty() && RECOGNIZED_HOSTS.iter().any(|host| url.contains(host))
}

/// Extract the video ID from watch, embed and short links
pub fn extract_video_id(url: &str) -> Option<String> {
    let url = match Url::parse(url) {
        Ok(url) => url,
        Err(e) => {
            log::debug!("Error parsing URL {url:?}: {e}");
            return None;
        }
    };

    // youtube.com/watch?v=VIDEO_ID
    if let Some((_, id)) = url.query_pairs().find(|(k, _)| k == "v") {
        log::debug!("Found video ID from query param: {id}");
        return non_empty(id.into_owned());
    }

    // youtube.com/embed/VIDEO_ID
    if let Some(id) = EMBED_RE.captures(url.path()).and_then(|c| c.name("id")) {
        log::debug!("Found video ID from embed path: {}", id.as_str());
        return Some(id.as_str().to_owned());
    }

    // youtu.be/VIDEO_ID
    if url.host_str() == Some(SHORT_LINK_HOST) {
        let path = url.path().strip_prefix('/').unwrap_or(url.path());
        let id = path.split('?').next().unwrap_or_default();
        log::debug!("Found video ID from {SHORT_LINK_HOST}: {id}");
        return non_empty(id.to_owned());
    }

    log::debug!("No video ID found in {url}");
    None
}

fn non_empty(s: String) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}
