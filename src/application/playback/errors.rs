//! Playback Errors
//!
//! 播放会话操作的统一错误类型

use thiserror::Error;

use crate::application::ports::TransportError;
use crate::domain::track::ResolutionError;
use crate::infrastructure::memory::SerializerError;

/// 播放会话错误
#[derive(Debug, Error)]
pub enum PlaybackError {
    /// 队列已满，入队被拒绝，队列不变
    #[error("Max limit of {limit} already reached")]
    CapacityExceeded { limit: usize },

    /// 下标越界（位置 0 为当前曲目，1.. 为等待中的曲目）
    #[error("Index {index} is out of range (queue size {size})")]
    IndexOutOfRange { index: usize, size: usize },

    /// 入队前校验失败
    #[error("Invalid track: {0}")]
    InvalidTrack(String),

    /// 没有可播放的曲目
    #[error("The queue is empty")]
    QueueEmpty,

    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    /// 不支持的操作
    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    /// 会话已结束，需要通过注册表重新获取
    #[error("Session has finished")]
    SessionFinished,

    #[error(transparent)]
    Serializer(#[from] SerializerError),
}

impl PlaybackError {
    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::Unsupported(message.into())
    }
}
