//! Media Resolver Port - 媒体解析服务抽象
//!
//! 将 URL 或搜索关键字转换为曲目，运行在会话串行器之外

use async_trait::async_trait;
use std::time::Duration;

use crate::domain::track::{ResolutionError, Track};

/// 搜索候选项，由调用方让用户选择
#[derive(Debug, Clone)]
pub struct SearchCandidate {
    pub title: String,
    pub url: String,
    pub duration: Option<Duration>,
    pub track: Track,
}

impl SearchCandidate {
    pub fn new(track: Track) -> Self {
        Self {
            title: track.title().to_string(),
            url: track.url().to_string(),
            duration: track.duration(),
            track,
        }
    }
}

/// Media Resolver Port
#[async_trait]
pub trait MediaResolverPort: Send + Sync {
    /// 按 URL 解析，可能展开为多首（播放列表），最多 `max` 首
    async fn resolve_from_url(&self, url: &str, max: usize) -> Result<Vec<Track>, ResolutionError>;

    /// 按关键字搜索，返回候选列表
    async fn resolve_from_search(&self, query: &str)
        -> Result<Vec<SearchCandidate>, ResolutionError>;

    /// 解析播放列表，最多 `max` 首
    async fn resolve_from_playlist(
        &self,
        url: &str,
        max: usize,
    ) -> Result<Vec<Track>, ResolutionError>;
}
