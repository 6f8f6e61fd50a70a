//! Notifier Port - 文本通知通道抽象

use async_trait::async_trait;
use thiserror::Error;

/// Notifier 错误
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("Failed to deliver message: {0}")]
    Delivery(String),
}

/// Notifier Port
///
/// 会话用它发送状态消息（入队位置、正在播放、错误提示等）
#[async_trait]
pub trait NotifierPort: Send + Sync {
    async fn send(&self, text: &str) -> Result<(), NotifyError>;
}
