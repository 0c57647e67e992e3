//! Supplementary video and document lookup for generated strategies.

use std::collections::HashSet;
use std::num::NonZeroU32;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use async_trait::async_trait;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use regex::Regex;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use super::search::{self, SearchResult};
use crate::core::config::MediaSettings;

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

#[derive(Debug, Error)]
pub enum MediaSearchError {
    #[error("media search is disabled")]
    Disabled,
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("{provider} returned HTTP {status}")]
    Status { provider: &'static str, status: u16 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoResult {
    pub id: String,
    pub title: String,
    pub thumbnail_url: String,
    pub link: String,
    pub channel: String,
    pub duration: String,
}

impl VideoResult {
    fn from_oembed(id: &str, meta: OEmbed) -> Self {
        Self {
            id: id.to_string(),
            title: meta.title.unwrap_or_else(|| "Unknown".to_string()),
            thumbnail_url: format!("https://img.youtube.com/vi/{}/hqdefault.jpg", id),
            link: format!("https://www.youtube.com/watch?v={}", id),
            channel: meta.author_name.unwrap_or_else(|| "Unknown".to_string()),
            duration: "Unknown".to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct OEmbed {
    title: Option<String>,
    author_name: Option<String>,
}

#[async_trait]
pub trait MediaSearch: Send + Sync {
    async fn search_videos(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<VideoResult>, MediaSearchError>;

    async fn search_documents(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<SearchResult>, MediaSearchError>;
}

/// Scrapes YouTube search results and resolves each id through oEmbed,
/// which only answers for embeddable videos.
pub struct WebMediaSearch {
    client: Client,
    settings: MediaSettings,
    oembed_limiter: Arc<DefaultDirectRateLimiter>,
}

impl WebMediaSearch {
    pub fn new(settings: MediaSettings, timeout: Duration) -> Result<Self, MediaSearchError> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()?;
        let per_second = NonZeroU32::new(settings.oembed_per_second).unwrap_or(NonZeroU32::MIN);
        Ok(Self {
            client,
            settings,
            oembed_limiter: Arc::new(RateLimiter::direct(Quota::per_second(per_second))),
        })
    }

    async fn resolve(&self, id: &str) -> Option<VideoResult> {
        self.oembed_limiter.until_ready().await;
        let url = format!(
            "https://www.youtube.com/oembed?url=https://www.youtube.com/watch?v={}&format=json",
            id
        );
        let response = match self.client.get(url).send().await {
            Ok(response) => response,
            Err(err) => {
                debug!(video_id = id, error = %err, "oEmbed request failed");
                return None;
            }
        };
        if !response.status().is_success() {
            debug!(video_id = id, status = %response.status(), "Skipping non-embeddable video");
            return None;
        }
        match response.json::<OEmbed>().await {
            Ok(meta) => Some(VideoResult::from_oembed(id, meta)),
            Err(err) => {
                debug!(video_id = id, error = %err, "Unreadable oEmbed payload");
                None
            }
        }
    }
}

#[async_trait]
impl MediaSearch for WebMediaSearch {
    async fn search_videos(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<VideoResult>, MediaSearchError> {
        if !self.settings.enabled {
            return Err(MediaSearchError::Disabled);
        }
        let url = format!(
            "https://www.youtube.com/results?search_query={}",
            urlencoding::encode(query)
        );
        let response = self
            .client
            .get(url)
            .header("Accept-Language", "en-US,en;q=0.9")
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(MediaSearchError::Status {
                provider: "youtube",
                status: response.status().as_u16(),
            });
        }
        let html = response.text().await?;
        let ids = extract_video_ids(&html);
        debug!(query, candidates = ids.len(), "YouTube results scraped");

        let mut videos = Vec::with_capacity(limit);
        for id in ids.iter().take(limit * 2) {
            if videos.len() >= limit {
                break;
            }
            if let Some(video) = self.resolve(id).await {
                videos.push(video);
            }
        }

        info!(query, found = videos.len(), "Video search finished");
        Ok(videos)
    }

    async fn search_documents(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<SearchResult>, MediaSearchError> {
        if !self.settings.enabled {
            return Err(MediaSearchError::Disabled);
        }
        let results = search::search_pdfs(&self.client, &self.settings, query, limit).await?;
        info!(query, found = results.len(), "Document search finished");
        Ok(results)
    }
}

fn video_id_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#""videoId":"([a-zA-Z0-9_-]{11})""#).ok())
        .as_ref()
}

/// Video ids in page order, first occurrence only.
pub fn extract_video_ids(html: &str) -> Vec<String> {
    let Some(re) = video_id_regex() else {
        return Vec::new();
    };
    let mut seen = HashSet::new();
    re.captures_iter(html)
        .map(|caps| caps[1].to_string())
        .filter(|id| seen.insert(id.clone()))
        .collect()
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    /// Returns canned results, or fails every call when `failing`.
    #[derive(Default)]
    pub struct StaticMediaSearch {
        pub videos: Vec<VideoResult>,
        pub documents: Vec<SearchResult>,
        pub failing: bool,
        pub queries: std::sync::Mutex<Vec<String>>,
        calls: AtomicUsize,
    }

    impl StaticMediaSearch {
        pub fn with_videos(videos: Vec<VideoResult>) -> Self {
            Self {
                videos,
                ..Default::default()
            }
        }

        pub fn failing() -> Self {
            Self {
                failing: true,
                ..Default::default()
            }
        }

        pub fn video_calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        pub fn seen_queries(&self) -> Vec<String> {
            self.queries.lock().map(|q| q.clone()).unwrap_or_default()
        }
    }

    pub fn video(id: &str) -> VideoResult {
        VideoResult::from_oembed(
            id,
            OEmbed {
                title: Some(format!("Video {}", id)),
                author_name: None,
            },
        )
    }

    #[async_trait]
    impl MediaSearch for StaticMediaSearch {
        async fn search_videos(
            &self,
            query: &str,
            limit: usize,
        ) -> Result<Vec<VideoResult>, MediaSearchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Ok(mut queries) = self.queries.lock() {
                queries.push(query.to_string());
            }
            if self.failing {
                return Err(MediaSearchError::Disabled);
            }
            Ok(self.videos.iter().take(limit).cloned().collect())
        }

        async fn search_documents(
            &self,
            _query: &str,
            limit: usize,
        ) -> Result<Vec<SearchResult>, MediaSearchError> {
            if self.failing {
                return Err(MediaSearchError::Disabled);
            }
            Ok(self.documents.iter().take(limit).cloned().collect())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn video_ids_are_deduplicated_in_order() {
        let html = r#"{"videoId":"abcdefghijk","x":1}{"videoId":"ZYXWVUTSRQ_"}{"videoId":"abcdefghijk"}{"videoId":"short"}"#;
        assert_eq!(extract_video_ids(html), vec!["abcdefghijk", "ZYXWVUTSRQ_"]);
    }

    #[test]
    fn oembed_metadata_fills_video_result() {
        let meta: OEmbed =
            serde_json::from_str(r#"{"title":"Fractions with roti","author_name":"Teach India"}"#)
                .unwrap();
        let video = VideoResult::from_oembed("abcdefghijk", meta);
        assert_eq!(video.title, "Fractions with roti");
        assert_eq!(video.channel, "Teach India");
        assert_eq!(video.thumbnail_url, "https://img.youtube.com/vi/abcdefghijk/hqdefault.jpg");
        assert_eq!(video.link, "https://www.youtube.com/watch?v=abcdefghijk");
        assert_eq!(video.duration, "Unknown");
    }

    #[test]
    fn missing_oembed_fields_default_to_unknown() {
        let meta: OEmbed = serde_json::from_str("{}").unwrap();
        let video = VideoResult::from_oembed("abcdefghijk", meta);
        assert_eq!(video.title, "Unknown");
        assert_eq!(video.channel, "Unknown");
    }

    #[tokio::test]
    async fn disabled_search_reports_error() {
        let mut settings = crate::core::config::Settings::default().media;
        settings.enabled = false;
        let search = WebMediaSearch::new(settings, Duration::from_secs(1)).unwrap();
        assert!(matches!(
            search.search_videos("fractions", 3).await,
            Err(MediaSearchError::Disabled)
        ));
    }
}
