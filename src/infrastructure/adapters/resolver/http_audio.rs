//! HTTP Audio Resolver - 音频直链解析
//!
//! 请求直链，校验状态码与 MIME 类型，从响应头或 URL 推断标题

use reqwest::header::{ACCEPT, CONTENT_DISPOSITION, CONTENT_TYPE};
use reqwest::{Client, Url};
use std::time::Duration;

use crate::domain::track::{ResolutionError, Track, TrackInfo};
use crate::infrastructure::adapters::stream::fetch_with;

/// 直链解析配置
#[derive(Debug, Clone)]
pub struct HttpAudioResolverConfig {
    pub user_agent: String,
    pub default_thumbnail: String,
    /// 为空时使用 URL
    pub default_title: String,
    pub timeout_secs: u64,
}

impl Default for HttpAudioResolverConfig {
    fn default() -> Self {
        Self {
            user_agent: format!("jukebox/{}", env!("CARGO_PKG_VERSION")),
            default_thumbnail: String::new(),
            default_title: String::new(),
            timeout_secs: 30,
        }
    }
}

/// 音频直链解析器
pub struct HttpAudioResolver {
    client: Client,
    config: HttpAudioResolverConfig,
}

impl HttpAudioResolver {
    pub fn new(config: HttpAudioResolverConfig) -> Result<Self, ResolutionError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| ResolutionError::Network(e.to_string()))?;

        Ok(Self { client, config })
    }

    /// 解析直链为单首曲目
    ///
    /// 曲目的 url 为重定向后的最终地址，query 保留原始输入
    pub async fn resolve(&self, url: &str) -> Result<Track, ResolutionError> {
        tracing::debug!(url = %url, "Resolving direct audio url");

        let response = self
            .client
            .get(url)
            .header(ACCEPT, "audio/*")
            .send()
            .await
            .map_err(|e| {
                if e.is_builder() {
                    ResolutionError::InvalidUrl(url.to_string())
                } else {
                    ResolutionError::Network(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ResolutionError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let headers = response.headers();
        if let Some(mime) = headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok()) {
            if !mime.trim().to_ascii_lowercase().starts_with("audio/") {
                return Err(ResolutionError::UnsupportedMime {
                    url: url.to_string(),
                    mime: mime.to_string(),
                });
            }
        }

        let disposition = headers
            .get(CONTENT_DISPOSITION)
            .and_then(|v| v.to_str().ok());
        let title = derive_title(disposition, url, &self.config.default_title);
        let final_url = response.url().to_string();

        tracing::info!(url = %url, resolved = %final_url, title = %title, "Resolved direct audio");

        let info = TrackInfo::new(final_url.clone(), title)
            .with_thumbnail(self.config.default_thumbnail.clone())
            .with_query(url);
        Ok(Track::with_stream(info, fetch_with(self.client.clone(), final_url)))
    }
}

/// 标题推断顺序：Content-Disposition 文件名 → URL 路径最后一段 → 默认标题 → URL
pub(crate) fn derive_title(disposition: Option<&str>, url: &str, default_title: &str) -> String {
    if let Some(name) = disposition.and_then(disposition_filename) {
        return name;
    }

    let basename = Url::parse(url).ok().and_then(|parsed| {
        parsed
            .path_segments()
            .and_then(|mut segments| segments.next_back().map(str::to_string))
            .filter(|segment| !segment.is_empty())
    });
    if let Some(name) = basename {
        return name;
    }

    if !default_title.is_empty() {
        return default_title.to_string();
    }
    url.to_string()
}

/// 取出 `filename` 参数，去掉引号
fn disposition_filename(header: &str) -> Option<String> {
    header
        .split(';')
        .skip(1)
        .filter_map(|param| param.split_once('='))
        .find(|(key, _)| key.trim().eq_ignore_ascii_case("filename"))
        .map(|(_, value)| value.trim().trim_matches('"').to_string())
        .filter(|name| !name.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_title_from_content_disposition() {
        let title = derive_title(
            Some("attachment; filename=\"night drive.mp3\""),
            "https://cdn.example.com/download?id=42",
            "",
        );
        assert_eq!(title, "night drive.mp3");

        let title = derive_title(
            Some("inline; FILENAME=loop.ogg"),
            "https://cdn.example.com/x",
            "",
        );
        assert_eq!(title, "loop.ogg");
    }

    #[test]
    fn test_title_from_url_basename() {
        let title = derive_title(None, "https://cdn.example.com/music/track01.mp3?sig=abc", "");
        assert_eq!(title, "track01.mp3");

        // 没有 filename 参数时退回 URL
        let title = derive_title(Some("inline"), "https://cdn.example.com/a/b.flac", "");
        assert_eq!(title, "b.flac");
    }

    #[test]
    fn test_title_fallbacks() {
        assert_eq!(
            derive_title(None, "https://cdn.example.com/", "Untitled"),
            "Untitled"
        );
        assert_eq!(
            derive_title(None, "https://cdn.example.com/", ""),
            "https://cdn.example.com/"
        );
    }

    #[tokio::test]
    async fn test_unreachable_host_is_network_error() {
        let resolver = HttpAudioResolver::new(HttpAudioResolverConfig {
            timeout_secs: 2,
            ..Default::default()
        })
        .unwrap();

        let result = resolver.resolve("http://127.0.0.1:9/a.mp3").await;
        assert!(matches!(result, Err(ResolutionError::Network(_))));
    }
}
