//! Configuration Types
//!
//! 定义所有配置结构体

use serde::Deserialize;
use std::time::Duration;

use crate::application::playback::{SessionSettings, DEFAULT_MAX_QUEUE_SIZE};
use crate::application::ports::{Bitrate, PlayOptions};
use crate::domain::playback::Volume;
use crate::domain::track::DEFAULT_MAX_INDIRECTIONS;

/// 应用主配置
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    /// 播放会话配置
    #[serde(default)]
    pub playback: PlaybackConfig,

    /// 媒体解析配置
    #[serde(default)]
    pub resolver: ResolverConfig,

    /// 音频输出配置
    #[serde(default)]
    pub transport: TransportConfig,

    /// 日志配置
    #[serde(default)]
    pub log: LogConfig,
}

/// 播放会话配置
#[derive(Debug, Clone, Deserialize)]
pub struct PlaybackConfig {
    /// 等待队列上限
    #[serde(default = "default_max_queue_size")]
    pub max_queue_size: usize,

    /// 每个音频包的发送次数
    #[serde(default = "default_passes")]
    pub passes: u8,

    /// 比特率，`auto` 或 kbps 数值
    #[serde(default = "default_bitrate")]
    pub bitrate: String,

    /// 新会话的初始音量 [0, 2]
    #[serde(default = "default_volume")]
    pub default_volume: f32,

    /// 流解析的最大解引用层数
    #[serde(default = "default_max_indirections")]
    pub max_indirections: usize,
}

fn default_max_queue_size() -> usize {
    DEFAULT_MAX_QUEUE_SIZE
}

fn default_passes() -> u8 {
    2
}

fn default_bitrate() -> String {
    "auto".to_string()
}

fn default_volume() -> f32 {
    1.0
}

fn default_max_indirections() -> usize {
    DEFAULT_MAX_INDIRECTIONS
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            max_queue_size: default_max_queue_size(),
            passes: default_passes(),
            bitrate: default_bitrate(),
            default_volume: default_volume(),
            max_indirections: default_max_indirections(),
        }
    }
}

impl PlaybackConfig {
    /// 转换为会话参数（已校验的配置上调用）
    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            max_queue_size: self.max_queue_size,
            play_options: PlayOptions {
                passes: self.passes,
                bitrate: self.bitrate.parse().unwrap_or(Bitrate::Auto),
            },
            default_volume: Volume::new(self.default_volume).unwrap_or_default(),
            max_indirections: self.max_indirections,
        }
    }
}

/// 媒体解析配置
#[derive(Debug, Clone, Deserialize)]
pub struct ResolverConfig {
    /// 搜索返回的候选数
    #[serde(default = "default_search_result_count")]
    pub search_result_count: usize,

    /// youtube-dl 可执行文件
    #[serde(default = "default_youtube_dl_path")]
    pub youtube_dl_path: String,

    /// youtube-dl 格式选择
    #[serde(default = "default_format")]
    pub format: String,

    /// youtube-dl 下载重试次数
    #[serde(default = "default_retries")]
    pub retries: u32,

    /// 直链请求使用的 User-Agent
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// 没有缩略图时使用的图片
    #[serde(default = "default_thumbnail")]
    pub default_thumbnail: String,

    /// 无法推断标题时使用的标题，为空时使用 URL
    #[serde(default)]
    pub default_title: String,

    /// HTTP 请求超时（秒）
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_search_result_count() -> usize {
    5
}

fn default_youtube_dl_path() -> String {
    "youtube-dl".to_string()
}

fn default_format() -> String {
    "bestaudio/best".to_string()
}

fn default_retries() -> u32 {
    20
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/61.0.3163.100 Safari/537.36".to_string()
}

fn default_thumbnail() -> String {
    "https://i.imgur.com/Ctq8sIH.png".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            search_result_count: default_search_result_count(),
            youtube_dl_path: default_youtube_dl_path(),
            format: default_format(),
            retries: default_retries(),
            user_agent: default_user_agent(),
            default_thumbnail: default_thumbnail(),
            default_title: String::new(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// 音频输出配置
#[derive(Debug, Clone, Deserialize)]
pub struct TransportConfig {
    /// 两个数据块之间的间隔（毫秒）
    #[serde(default = "default_chunk_interval_ms")]
    pub chunk_interval_ms: u64,
}

fn default_chunk_interval_ms() -> u64 {
    20
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            chunk_interval_ms: default_chunk_interval_ms(),
        }
    }
}

impl TransportConfig {
    pub fn chunk_interval(&self) -> Duration {
        Duration::from_millis(self.chunk_interval_ms)
    }
}

/// 日志配置
#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    /// 日志级别
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}
