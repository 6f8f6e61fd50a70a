//! Audio Transport Port - 音频输出通道抽象
//!
//! 定义加入/离开语音通道、绑定媒体流以及播放控制的接口，具体实现在 infrastructure/adapters 层

use async_trait::async_trait;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::domain::track::MediaStream;

/// Transport 错误
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    #[error("Failed to join voice channel {channel}: {reason}")]
    JoinFailed { channel: String, reason: String },

    #[error("Playback failed: {0}")]
    PlaybackFailed(String),

    #[error("Stream unavailable: {0}")]
    StreamUnavailable(String),

    #[error("Connection closed")]
    Disconnected,
}

/// 语音通道引用
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VoiceChannelRef(String);

impl VoiceChannelRef {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for VoiceChannelRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// 比特率
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bitrate {
    /// 由传输层决定
    Auto,
    /// 固定比特率（kbps）
    Kbps(u32),
}

impl FromStr for Bitrate {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("auto") {
            return Ok(Bitrate::Auto);
        }
        match s.parse::<u32>() {
            Ok(kbps) if kbps > 0 => Ok(Bitrate::Kbps(kbps)),
            _ => Err(format!("invalid bitrate: {}", s)),
        }
    }
}

impl std::fmt::Display for Bitrate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Bitrate::Auto => f.write_str("auto"),
            Bitrate::Kbps(kbps) => write!(f, "{}kbps", kbps),
        }
    }
}

/// 绑定媒体流时的参数
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlayOptions {
    /// 每个音频包发送次数（抗丢包）
    pub passes: u8,
    pub bitrate: Bitrate,
}

impl Default for PlayOptions {
    fn default() -> Self {
        Self {
            passes: 2,
            bitrate: Bitrate::Auto,
        }
    }
}

/// 播放事件
#[derive(Debug, Clone)]
pub enum PlaybackEvent {
    /// 流结束（自然结束或被 end 强制结束）
    Ended { reason: String },
    /// 播放过程中出错，不代表流已结束
    Error(TransportError),
}

/// 已绑定流的播放控制
pub trait PlaybackControl: Send + Sync {
    fn pause(&self);

    fn resume(&self);

    fn is_paused(&self) -> bool;

    /// 设置增益（已经过对数映射）
    fn set_gain(&self, gain: f32);

    /// 强制结束，随后会产生一个 `PlaybackEvent::Ended`
    fn end(&self, reason: &str);
}

/// 一次流绑定：控制句柄 + 事件接收端
pub struct PlaybackBinding {
    pub control: Arc<dyn PlaybackControl>,
    pub events: mpsc::Receiver<PlaybackEvent>,
}

/// 已加入的语音连接
#[async_trait]
pub trait VoiceConnection: Send + Sync {
    /// 绑定并开始播放媒体流
    async fn play(
        &self,
        stream: MediaStream,
        options: PlayOptions,
    ) -> Result<PlaybackBinding, TransportError>;

    /// 离开语音通道
    async fn leave(&self) -> Result<(), TransportError>;
}

/// Audio Transport Port
#[async_trait]
pub trait AudioTransportPort: Send + Sync {
    /// 加入语音通道
    async fn join(&self, channel: &VoiceChannelRef)
        -> Result<Arc<dyn VoiceConnection>, TransportError>;
}
