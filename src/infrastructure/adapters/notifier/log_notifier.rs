//! Log Notifier - 把会话消息写入日志

use async_trait::async_trait;

use crate::application::ports::{NotifierPort, NotifyError};

/// 日志通知器
pub struct LogNotifier {
    channel: String,
}

impl LogNotifier {
    pub fn new(channel: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
        }
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }
}

#[async_trait]
impl NotifierPort for LogNotifier {
    async fn send(&self, text: &str) -> Result<(), NotifyError> {
        tracing::info!(channel = %self.channel, "{}", text);
        Ok(())
    }
}
