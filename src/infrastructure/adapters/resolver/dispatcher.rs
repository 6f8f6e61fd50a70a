//! URL Dispatcher - 按 URL 类型分派到具体解析器

use async_trait::async_trait;
use reqwest::Url;

use super::http_audio::HttpAudioResolver;
use super::youtube_dl::{StreamSource, YoutubeDlResolver};
use crate::application::ports::{MediaResolverPort, SearchCandidate};
use crate::domain::track::{ResolutionError, Track};

/// URL 类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UrlKind {
    YoutubePlaylist,
    YoutubeVideo,
    SoundCloud,
    /// 其他地址按音频直链处理
    DirectAudio,
}

/// 是否为 URL（以 http 开头）
pub fn is_url(input: &str) -> bool {
    input.starts_with("http")
}

/// 判断 URL 类型，非 URL 返回 None
pub fn classify(url: &str) -> Option<UrlKind> {
    if !is_url(url) {
        return None;
    }

    let host = Url::parse(url)
        .ok()
        .and_then(|parsed| parsed.host_str().map(str::to_ascii_lowercase))
        .unwrap_or_default();

    let is_youtube = host == "youtu.be"
        || host.ends_with(".youtu.be")
        || host.starts_with("youtube.")
        || host.contains(".youtube.");
    if is_youtube {
        if url.contains("list=") {
            return Some(UrlKind::YoutubePlaylist);
        }
        return Some(UrlKind::YoutubeVideo);
    }

    if host == "soundcloud.com" || host.ends_with(".soundcloud.com") {
        return Some(UrlKind::SoundCloud);
    }

    Some(UrlKind::DirectAudio)
}

/// 规范化为 `https://www.youtube.com/playlist?list=<id>`
pub fn playlist_url(url: &str) -> Result<String, ResolutionError> {
    let parsed = Url::parse(url).map_err(|_| ResolutionError::InvalidUrl(url.to_string()))?;
    let list = parsed
        .query_pairs()
        .find(|(key, _)| key == "list")
        .map(|(_, value)| value.into_owned())
        .filter(|id| !id.is_empty())
        .ok_or_else(|| ResolutionError::InvalidUrl(url.to_string()))?;

    let mut fixed = Url::parse("https://www.youtube.com/playlist")
        .map_err(|_| ResolutionError::InvalidUrl(url.to_string()))?;
    fixed.query_pairs_mut().append_pair("list", &list);
    Ok(fixed.to_string())
}

/// 媒体解析分派器
pub struct UrlDispatcher {
    http: HttpAudioResolver,
    youtube_dl: YoutubeDlResolver,
}

impl UrlDispatcher {
    pub fn new(http: HttpAudioResolver, youtube_dl: YoutubeDlResolver) -> Self {
        Self { http, youtube_dl }
    }
}

#[async_trait]
impl MediaResolverPort for UrlDispatcher {
    async fn resolve_from_url(&self, url: &str, max: usize) -> Result<Vec<Track>, ResolutionError> {
        let Some(kind) = classify(url) else {
            return Err(ResolutionError::InvalidUrl(url.to_string()));
        };
        tracing::debug!(url = %url, kind = ?kind, "Dispatching url");

        match kind {
            UrlKind::YoutubePlaylist => self.resolve_from_playlist(url, max).await,
            UrlKind::YoutubeVideo => {
                let mut tracks = self.youtube_dl.fetch(url, url, 1, StreamSource::Pipe).await?;
                if tracks.is_empty() {
                    return Err(ResolutionError::Provider(format!("no media found at {}", url)));
                }
                tracks.truncate(1);
                Ok(tracks)
            }
            UrlKind::SoundCloud => {
                self.youtube_dl
                    .fetch(url, url, max, StreamSource::Direct)
                    .await
            }
            UrlKind::DirectAudio => Ok(vec![self.http.resolve(url).await?]),
        }
    }

    async fn resolve_from_search(
        &self,
        query: &str,
    ) -> Result<Vec<SearchCandidate>, ResolutionError> {
        self.youtube_dl.search(query).await
    }

    async fn resolve_from_playlist(
        &self,
        url: &str,
        max: usize,
    ) -> Result<Vec<Track>, ResolutionError> {
        let playlist = playlist_url(url)?;
        self.youtube_dl
            .fetch(&playlist, url, max, StreamSource::Pipe)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::adapters::resolver::{HttpAudioResolverConfig, YoutubeDlConfig};

    #[test]
    fn test_classify() {
        assert_eq!(
            classify("https://www.youtube.com/watch?v=abc&list=PL123"),
            Some(UrlKind::YoutubePlaylist)
        );
        assert_eq!(
            classify("https://www.youtube.com/watch?v=abc"),
            Some(UrlKind::YoutubeVideo)
        );
        assert_eq!(classify("https://youtu.be/abc"), Some(UrlKind::YoutubeVideo));
        assert_eq!(
            classify("https://m.youtube.com/watch?v=abc"),
            Some(UrlKind::YoutubeVideo)
        );
        assert_eq!(
            classify("https://soundcloud.com/artist/song"),
            Some(UrlKind::SoundCloud)
        );
        assert_eq!(
            classify("https://cdn.example.com/song.mp3"),
            Some(UrlKind::DirectAudio)
        );
        assert_eq!(classify("never gonna give you up"), None);
    }

    #[test]
    fn test_playlist_url() {
        assert_eq!(
            playlist_url("https://www.youtube.com/watch?v=abc&list=PL123&index=2").unwrap(),
            "https://www.youtube.com/playlist?list=PL123"
        );
        assert!(matches!(
            playlist_url("https://www.youtube.com/watch?v=abc"),
            Err(ResolutionError::InvalidUrl(_))
        ));
    }

    #[tokio::test]
    async fn test_non_url_is_rejected() {
        let dispatcher = UrlDispatcher::new(
            HttpAudioResolver::new(HttpAudioResolverConfig::default()).unwrap(),
            YoutubeDlResolver::new(YoutubeDlConfig::default()),
        );

        let result = dispatcher.resolve_from_url("lofi beats", 5).await;
        assert!(matches!(result, Err(ResolutionError::InvalidUrl(_))));
    }
}
