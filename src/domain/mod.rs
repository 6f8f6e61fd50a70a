//! Domain Layer - 领域层
//!
//! 包含两个限界上下文:
//! - Track Context: 曲目与惰性媒体流
//! - Playback Context: 播放状态、音量与状态消息

pub mod playback;
pub mod track;
