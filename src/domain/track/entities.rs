//! Track Context - Entities

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;

use super::{MediaStream, ResolutionError, StreamHandle, StreamValue};

/// 曲目描述信息（来自解析服务）
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TrackInfo {
    pub url: String,
    pub title: String,
    pub thumbnail: String,
    pub duration: Option<Duration>,
    pub author: Option<String>,
    /// 用户的原始输入，未设置时与 url 相同
    pub query: Option<String>,
}

impl TrackInfo {
    pub fn new(url: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            title: title.into(),
            ..Default::default()
        }
    }

    pub fn with_thumbnail(mut self, thumbnail: impl Into<String>) -> Self {
        self.thumbnail = thumbnail.into();
        self
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = Some(duration);
        self
    }

    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = Some(query.into());
        self
    }
}

/// 可排队播放的曲目
///
/// 描述字段不可变（author 在入队时盖章），流句柄在克隆之间共享
#[derive(Debug, Clone)]
pub struct Track {
    url: String,
    title: String,
    thumbnail: String,
    duration: Option<Duration>,
    author: Option<String>,
    query: String,
    requested_at: Option<DateTime<Utc>>,
    stream: Arc<StreamHandle>,
}

impl Track {
    /// 流的来源由解析服务决定
    pub fn with_stream(info: TrackInfo, stream: StreamValue) -> Self {
        let query = info
            .query
            .filter(|q| !q.is_empty())
            .unwrap_or_else(|| info.url.clone());
        Self {
            url: info.url,
            title: info.title,
            thumbnail: info.thumbnail,
            duration: info.duration,
            author: info.author,
            query,
            requested_at: None,
            stream: Arc::new(StreamHandle::new(stream)),
        }
    }

    /// 校验必要字段
    pub fn validate(&self) -> Result<(), String> {
        if self.url.trim().is_empty() {
            return Err("track url cannot be empty".to_string());
        }
        if self.title.trim().is_empty() {
            return Err(format!("track {} has no title", self.url));
        }
        Ok(())
    }

    /// 入队时记录请求者和时间
    pub fn stamp_request(&mut self, requester: Option<&str>, at: DateTime<Utc>) {
        if let Some(requester) = requester {
            self.author = Some(requester.to_string());
        }
        self.requested_at = Some(at);
    }

    /// 解析媒体流（记忆化）
    pub async fn resolve_stream(&self, max_indirections: usize) -> Result<MediaStream, ResolutionError> {
        self.stream.resolve(max_indirections).await
    }

    pub fn stream_handle(&self) -> &StreamHandle {
        &self.stream
    }

    // Getters
    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn thumbnail(&self) -> &str {
        &self.thumbnail
    }

    pub fn duration(&self) -> Option<Duration> {
        self.duration
    }

    pub fn author(&self) -> Option<&str> {
        self.author.as_deref()
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn requested_at(&self) -> Option<DateTime<Utc>> {
        self.requested_at
    }

    /// 时长文本，如 `3:07` 或 `1:02:03`
    pub fn duration_label(&self) -> Option<String> {
        self.duration.map(format_duration)
    }
}

pub fn format_duration(duration: Duration) -> String {
    let total = duration.as_secs();
    let (hours, minutes, seconds) = (total / 3600, (total % 3600) / 60, total % 60);
    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{}:{:02}", minutes, seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lazy(info: TrackInfo) -> Track {
        let url = info.url.clone();
        Track::with_stream(
            info,
            StreamValue::thunk(move || StreamValue::ready(MediaStream::from_bytes(url, vec![]))),
        )
    }

    #[test]
    fn test_query_defaults_to_url() {
        let track = lazy(TrackInfo::new("https://example.com/a.mp3", "a.mp3"));
        assert_eq!(track.query(), "https://example.com/a.mp3");
        assert_eq!(track.stream_handle().state_name(), "thunk");

        let track = lazy(
            TrackInfo::new("https://example.com/a.mp3", "a.mp3").with_query("lofi beats"),
        );
        assert_eq!(track.query(), "lofi beats");
    }

    #[test]
    fn test_validate() {
        let ok = lazy(TrackInfo::new("https://example.com/a.mp3", "a.mp3"));
        assert!(ok.validate().is_ok());

        let no_url = lazy(TrackInfo::new("", "title"));
        assert!(no_url.validate().is_err());

        let no_title = lazy(TrackInfo::new("https://example.com/a.mp3", " "));
        assert!(no_title.validate().is_err());
    }

    #[test]
    fn test_stamp_request() {
        let mut track = lazy(TrackInfo::new("https://example.com/a.mp3", "a.mp3"));
        let now = Utc::now();
        track.stamp_request(Some("alice"), now);
        assert_eq!(track.author(), Some("alice"));
        assert_eq!(track.requested_at(), Some(now));

        track.stamp_request(None, now);
        assert_eq!(track.author(), Some("alice"));
    }

    #[test]
    fn test_duration_label() {
        assert_eq!(format_duration(Duration::from_secs(187)), "3:07");
        assert_eq!(format_duration(Duration::from_secs(3723)), "1:02:03");

        let track = lazy(
            TrackInfo::new("https://example.com/a.mp3", "a.mp3")
                .with_duration(Duration::from_secs(59)),
        );
        assert_eq!(track.duration_label().as_deref(), Some("0:59"));
    }

    #[tokio::test]
    async fn test_clones_share_stream() {
        let calls = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let counter = calls.clone();
        let track = Track::with_stream(
            TrackInfo::new("memory://a", "a"),
            StreamValue::thunk(move || {
                counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                StreamValue::ready(MediaStream::from_bytes("memory://a", vec![]))
            }),
        );
        let clone = track.clone();

        let first = track.resolve_stream(4).await.unwrap();
        let second = clone.resolve_stream(4).await.unwrap();
        assert!(first.ptr_eq(&second));
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 1);
    }
}
