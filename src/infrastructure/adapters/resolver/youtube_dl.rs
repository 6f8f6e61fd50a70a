//! youtube-dl Resolver - 通过 youtube-dl 获取元数据和音频流
//!
//! 元数据：`youtube-dl -j`，每行一个 JSON 对象
//! 音频流：`youtube-dl -f <format> -o - <url>`，读取 stdout

use serde::Deserialize;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

use crate::application::ports::SearchCandidate;
use crate::domain::track::{ResolutionError, StreamValue, Track, TrackInfo};
use crate::infrastructure::adapters::stream::{fetch_url, process_stream};

/// youtube-dl 配置
#[derive(Debug, Clone)]
pub struct YoutubeDlConfig {
    /// 可执行文件
    pub program: String,
    /// 格式选择
    pub format: String,
    pub retries: u32,
    pub search_result_count: usize,
    pub default_thumbnail: String,
}

impl Default for YoutubeDlConfig {
    fn default() -> Self {
        Self {
            program: "youtube-dl".to_string(),
            format: "bestaudio/best".to_string(),
            retries: 20,
            search_result_count: 5,
            default_thumbnail: String::new(),
        }
    }
}

/// 音频流的获取方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamSource {
    /// 由 youtube-dl 下载并输出到 stdout
    Pipe,
    /// 直接请求条目中的媒体地址
    Direct,
}

/// `youtube-dl -j` 输出的一个条目
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct YtdlEntry {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    thumbnail: Option<String>,
    /// 秒
    #[serde(default)]
    duration: Option<f64>,
    #[serde(default)]
    webpage_url: Option<String>,
    /// 媒体直链
    #[serde(default)]
    url: Option<String>,
}

impl YtdlEntry {
    fn page_url(&self) -> Option<String> {
        self.webpage_url.clone().or_else(|| {
            self.id
                .as_ref()
                .map(|id| format!("https://youtube.com/watch?v={}", id))
        })
    }
}

/// youtube-dl 解析器
pub struct YoutubeDlResolver {
    config: YoutubeDlConfig,
}

impl YoutubeDlResolver {
    pub fn new(config: YoutubeDlConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &YoutubeDlConfig {
        &self.config
    }

    /// 获取 `target` 对应的曲目（视频、播放列表或搜索），最多 `max` 首
    ///
    /// `query` 为用户原始输入
    pub async fn fetch(
        &self,
        target: &str,
        query: &str,
        max: usize,
        source: StreamSource,
    ) -> Result<Vec<Track>, ResolutionError> {
        let max = max.max(1);
        tracing::debug!(input = %target, max = max, "Fetching youtube-dl metadata");

        let output = Command::new(&self.config.program)
            .arg("-j")
            .arg("--playlist-end")
            .arg(max.to_string())
            .arg("--no-warnings")
            .arg(target)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| {
                ResolutionError::Process(format!("failed to run {}: {}", self.config.program, e))
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let tracks: Vec<Track> = parse_entries(&stdout)
            .into_iter()
            .take(max)
            .filter_map(|entry| self.entry_to_track(entry, query, source))
            .collect();

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            if tracks.is_empty() {
                return Err(ResolutionError::Process(format!(
                    "{} exited with {}: {}",
                    self.config.program,
                    output.status,
                    stderr.trim()
                )));
            }
            tracing::warn!(
                input = %target,
                status = %output.status,
                found = tracks.len(),
                error = %stderr.trim(),
                "youtube-dl failed part way, using partial results"
            );
        }

        tracing::info!(input = %target, found = tracks.len(), "Resolved via youtube-dl");
        Ok(tracks)
    }

    /// 关键字搜索
    pub async fn search(&self, query: &str) -> Result<Vec<SearchCandidate>, ResolutionError> {
        let count = self.config.search_result_count.max(1);
        let target = format!("ytsearch{}:{}", count, query);
        let tracks = self.fetch(&target, query, count, StreamSource::Pipe).await?;
        Ok(tracks.into_iter().map(SearchCandidate::new).collect())
    }

    fn entry_to_track(&self, entry: YtdlEntry, query: &str, source: StreamSource) -> Option<Track> {
        let Some(url) = entry.page_url() else {
            tracing::warn!(title = ?entry.title, "Skipping youtube-dl entry without url");
            return None;
        };

        let mut info = TrackInfo::new(url.clone(), entry.title.clone().unwrap_or_else(|| url.clone()))
            .with_thumbnail(
                entry
                    .thumbnail
                    .clone()
                    .unwrap_or_else(|| self.config.default_thumbnail.clone()),
            )
            .with_query(query);
        if let Some(duration) = entry
            .duration
            .and_then(|seconds| Duration::try_from_secs_f64(seconds).ok())
        {
            info = info.with_duration(duration);
        }

        let stream = match (source, entry.url) {
            (StreamSource::Direct, Some(media)) => fetch_url(media),
            _ => self.download_stream(&url),
        };
        Some(Track::with_stream(info, stream))
    }

    fn download_stream(&self, url: &str) -> StreamValue {
        process_stream(
            self.config.program.clone(),
            vec![
                "-f".to_string(),
                self.config.format.clone(),
                "--retries".to_string(),
                self.config.retries.to_string(),
                "--quiet".to_string(),
                "-o".to_string(),
                "-".to_string(),
                url.to_string(),
            ],
        )
    }
}

/// 逐行解析 JSON，无法解析的行被跳过
pub(crate) fn parse_entries(output: &str) -> Vec<YtdlEntry> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter_map(|line| match serde_json::from_str::<YtdlEntry>(line) {
            Ok(entry) => Some(entry),
            Err(e) => {
                tracing::warn!(error = %e, "Skipping unparsable youtube-dl line");
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const OUTPUT: &str = r#"
{"id": "dQw4w9WgXcQ", "title": "Never Gonna Give You Up", "thumbnail": "https://i.ytimg.com/vi/dQw4w9WgXcQ/hq.jpg", "duration": 212.0, "webpage_url": "https://www.youtube.com/watch?v=dQw4w9WgXcQ", "url": "https://r1.googlevideo.com/videoplayback?id=1"}
not json at all
{"id": "abc123", "title": "Second", "duration": 61}
"#;

    fn resolver() -> YoutubeDlResolver {
        YoutubeDlResolver::new(YoutubeDlConfig {
            default_thumbnail: "https://example.com/default.png".to_string(),
            ..Default::default()
        })
    }

    #[test]
    fn test_parse_entries_skips_bad_lines() {
        let entries = parse_entries(OUTPUT);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].id.as_deref(), Some("dQw4w9WgXcQ"));
        assert_eq!(entries[1].duration, Some(61.0));
    }

    #[test]
    fn test_entry_to_track() {
        let resolver = resolver();
        let mut entries = parse_entries(OUTPUT).into_iter();

        let first = resolver
            .entry_to_track(entries.next().unwrap(), "rick", StreamSource::Pipe)
            .unwrap();
        assert_eq!(first.url(), "https://www.youtube.com/watch?v=dQw4w9WgXcQ");
        assert_eq!(first.title(), "Never Gonna Give You Up");
        assert_eq!(first.duration_label().as_deref(), Some("3:32"));
        assert_eq!(first.query(), "rick");

        // 没有 webpage_url 时由 id 拼接，缩略图使用默认值
        let second = resolver
            .entry_to_track(entries.next().unwrap(), "rick", StreamSource::Pipe)
            .unwrap();
        assert_eq!(second.url(), "https://youtube.com/watch?v=abc123");
        assert_eq!(second.thumbnail(), "https://example.com/default.png");
    }

    #[test]
    fn test_entry_without_url_is_skipped() {
        let entry: YtdlEntry = serde_json::from_str(r#"{"title": "orphan"}"#).unwrap();
        assert!(resolver()
            .entry_to_track(entry, "orphan", StreamSource::Pipe)
            .is_none());
    }

    #[test]
    fn test_unrepresentable_duration_is_dropped() {
        let resolver = resolver();
        for raw in ["1e300", "-5", "1.8446744073709552e19"] {
            let json = format!(r#"{{"id": "big", "title": "Long", "duration": {}}}"#, raw);
            let entry: YtdlEntry = serde_json::from_str(&json).unwrap();

            let track = resolver
                .entry_to_track(entry, "long", StreamSource::Pipe)
                .unwrap();
            assert_eq!(track.duration(), None);
        }
    }

    #[tokio::test]
    async fn test_missing_program_is_process_error() {
        let resolver = YoutubeDlResolver::new(YoutubeDlConfig {
            program: "definitely-not-youtube-dl".to_string(),
            ..Default::default()
        });

        let result = resolver
            .fetch("https://youtu.be/abc", "https://youtu.be/abc", 1, StreamSource::Pipe)
            .await;
        assert!(matches!(result, Err(ResolutionError::Process(_))));
    }
}
