//! Playback Context - 播放限界上下文
//!
//! 职责:
//! - 播放状态与音量规则
//! - 会话状态消息

mod notice;
mod state;

pub use notice::Notice;
pub use state::{PlaybackState, Volume, MAX_VOLUME, MIN_VOLUME};
