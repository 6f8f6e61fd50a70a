//! 应用层 - 用例编排
//!
//! 包含：
//! - ports: 六边形架构端口定义（AudioTransport、Notifier、MediaResolver）
//! - playback: 播放会话（队列 + 状态机）

pub mod playback;
pub mod ports;

pub use playback::{PlaybackError, PlaybackSession, SessionSettings};

pub use ports::{
    AudioTransportPort, Bitrate, MediaResolverPort, NotifierPort, NotifyError, PlayOptions,
    PlaybackBinding, PlaybackControl, PlaybackEvent, SearchCandidate, TransportError,
    VoiceChannelRef, VoiceConnection,
};
