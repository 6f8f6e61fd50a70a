//! Media Resolvers
//!
//! MediaResolverPort 的实现：
//! - `UrlDispatcher`: 按 URL 类型分派
//! - `HttpAudioResolver`: 音频直链
//! - `YoutubeDlResolver`: YouTube / SoundCloud / 搜索

mod dispatcher;
mod http_audio;
mod youtube_dl;

pub use dispatcher::{classify, is_url, playlist_url, UrlDispatcher, UrlKind};
pub use http_audio::{HttpAudioResolver, HttpAudioResolverConfig};
pub use youtube_dl::{StreamSource, YoutubeDlConfig, YoutubeDlResolver};
