//! Application Ports - 出站端口定义
//!
//! 定义应用层与基础设施层的抽象接口

mod media_resolver;
mod notifier;
mod transport;

pub use media_resolver::{MediaResolverPort, SearchCandidate};
pub use notifier::{NotifierPort, NotifyError};
pub use transport::{
    AudioTransportPort, Bitrate, PlayOptions, PlaybackBinding, PlaybackControl, PlaybackEvent,
    TransportError, VoiceChannelRef, VoiceConnection,
};
