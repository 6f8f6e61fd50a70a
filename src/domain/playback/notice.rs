//! Playback Context - Notices
//!
//! 会话发往文本通道的状态消息

use crate::domain::track::Track;

/// 状态消息
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// 入队成功
    Enqueued {
        title: String,
        position: usize,
        requester: Option<String>,
    },
    /// 队列已满
    QueueFull {
        limit: usize,
        requester: Option<String>,
    },
    /// 队列为空，无法播放
    QueueEmpty,
    /// 开始播放
    NowPlaying {
        title: String,
        url: String,
        duration: Option<String>,
        requester: Option<String>,
    },
    /// 恢复播放
    Resuming { title: String },
    /// 播放失败
    PlaybackFailed { title: String },
    /// 队列播完，离开
    Finished,
}

impl Notice {
    pub fn now_playing(track: &Track) -> Self {
        Notice::NowPlaying {
            title: track.title().to_string(),
            url: track.url().to_string(),
            duration: track.duration_label(),
            requester: track.author().map(str::to_string),
        }
    }
}

impl std::fmt::Display for Notice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Notice::Enqueued {
                title,
                position,
                requester: Some(requester),
            } => write!(f, "{} added **{}** to #{} in the queue.", requester, title, position),
            Notice::Enqueued { title, position, .. } => {
                write!(f, "Added **{}** to #{} in the queue.", title, position)
            }
            Notice::QueueFull {
                limit,
                requester: Some(requester),
            } => write!(f, "{}, the limit of {} is already reached.", requester, limit),
            Notice::QueueFull { limit, .. } => {
                write!(f, "The limit of {} is already reached.", limit)
            }
            Notice::QueueEmpty => write!(
                f,
                "The queue is empty! Use the `play` command to add songs to the queue!"
            ),
            Notice::NowPlaying {
                title,
                url,
                duration,
                requester,
            } => {
                write!(f, "Now Playing... **{}** <{}>", title, url)?;
                if let Some(duration) = duration {
                    write!(f, " [{}]", duration)?;
                }
                if let Some(requester) = requester {
                    write!(f, " requested by {}", requester)?;
                }
                Ok(())
            }
            Notice::Resuming { title } => write!(f, "Resuming **{}**...", title),
            Notice::PlaybackFailed { title } => write!(f, "Failed to play **{}**.", title),
            Notice::Finished => write!(f, "Finished playing all the queued songs, leaving..."),
        }
    }
}
