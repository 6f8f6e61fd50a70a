//! Track Context - 曲目限界上下文
//!
//! 职责:
//! - 曲目值对象（描述字段）
//! - 惰性、记忆化的媒体流句柄

mod entities;
mod errors;
mod stream;

pub use entities::{format_duration, Track, TrackInfo};
pub use errors::ResolutionError;
pub use stream::{
    resolve_value, ByteStream, MediaStream, Producer, StreamHandle, StreamValue,
    DEFAULT_MAX_INDIRECTIONS,
};
