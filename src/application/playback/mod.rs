//! Playback - 播放会话
//!
//! 单个会话的队列与播放状态机

mod errors;
mod session;

pub use errors::PlaybackError;
pub use session::{FinishedSignal, PlaybackSession, SessionSettings, DEFAULT_MAX_QUEUE_SIZE};
