use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use url::Url;

use super::{extract_video_id, is_recognized_host_url, VideoReference};

static IFRAME_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)<iframe\b[^>]*>").unwrap());
static SRC_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?is)\ssrc\s*=\s*(?:"(?P<dq>[^"]*)"|'(?P<sq>[^']*)')"#).unwrap()
});
static ENTITY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"&(?:#(?P<dec>[0-9]+)|#[xX](?P<hex>[0-9a-fA-F]+)|(?P<name>amp|quot|apos|lt|gt));")
        .unwrap()
});
static DEFAULT_BASE: Lazy<Url> = Lazy::new(|| Url::parse("https://localhost/").unwrap());

/// A player embedded in a page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbeddedVideo {
    pub src: String,
    pub video: VideoReference,
}

/// Finds embedded YouTube players, remembering which ones were already reported
#[derive(Debug)]
pub struct PageScanner {
    base: Url,
    processed: HashSet<String>,
}

impl Default for PageScanner {
    fn default() -> Self {
        Self::with_base(DEFAULT_BASE.clone())
    }
}

impl PageScanner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Relative and protocol-relative srcs are resolved against `base`
    pub fn with_base(base: Url) -> Self {
        Self {
            base,
            processed: HashSet::new(),
        }
    }

    /// Scan a document and return the players not seen by a previous scan
    pub fn scan(&mut self, html: &str) -> Vec<EmbeddedVideo> {
        let sources: Vec<Option<String>> = IFRAME_RE
            .find_iter(html)
            .map(|tag| iframe_src(tag.as_str()).map(|src| self.resolve(&src)))
            .collect();
        log::debug!("Found {} total iframes on page", sources.len());

        let mut found = Vec::new();
        for (i, src) in sources.into_iter().enumerate() {
            let src = match src {
                Some(src) if !src.is_empty() => src,
                _ => {
                    log::debug!("Iframe {}: (no src)", i + 1);
                    continue;
                }
            };

            if self.processed.contains(&src) {
                log::debug!("Iframe {} already processed, skipping", i + 1);
                continue;
            }
            if !is_recognized_host_url(&src) {
                continue;
            }

            match extract_video_id(&src) {
                Some(video_id) => {
                    log::debug!("YouTube iframe with video ID: {video_id}");
                    self.processed.insert(src.clone());
                    found.push(EmbeddedVideo {
                        src,
                        video: VideoReference { video_id },
                    });
                }
                None => log::warn!("YouTube iframe found but could not extract video ID: {src}"),
            }
        }
        found
    }

    pub fn processed_count(&self) -> usize {
        self.processed.len()
    }

    fn resolve(&self, src: &str) -> String {
        if src.is_empty() {
            return String::new();
        }
        match Url::options().base_url(Some(&self.base)).parse(src) {
            Ok(url) => url.into(),
            Err(e) => {
                log::debug!("Could not resolve iframe src {src}: {e}");
                src.to_owned()
            }
        }
    }
}

fn iframe_src(tag: &str) -> Option<String> {
    let caps = SRC_RE.captures(tag)?;
    let value = caps.name("dq").or_else(|| caps.name("sq"))?;
    Some(decode_entities(value.as_str().trim()))
}

/// Decode the character references that show up in attribute values
fn decode_entities(value: &str) -> String {
    ENTITY_RE
        .replace_all(value, |caps: &Captures| {
            let decoded = if let Some(dec) = caps.name("dec") {
                dec.as_str().parse().ok().and_then(char::from_u32)
            } else if let Some(hex) = caps.name("hex") {
                u32::from_str_radix(hex.as_str(), 16)
                    .ok()
                    .and_then(char::from_u32)
            } else {
                match caps.name("name").map(|m| m.as_str()) {
                    Some("amp") => Some('&'),
                    Some("quot") => Some('"'),
                    Some("apos") => Some('\''),
                    Some("lt") => Some('<'),
                    Some("gt") => Some('>'),
                    _ => None,
                }
            };
            match decoded {
                Some(c) => c.to_string(),
                None => caps[0].to_owned(),
            }
        })
        .into_owned()
}
