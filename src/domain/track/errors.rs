//! Track Context - Errors

use thiserror::Error;

/// 媒体解析错误
///
/// 需要 `Clone`：解析结果（包括失败）会被缓存并返回给之后的每一个读取者
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolutionError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Response status is {status} for {url}")]
    Status { url: String, status: u16 },

    #[error("{url} returned invalid mime type {mime}")]
    UnsupportedMime { url: String, mime: String },

    #[error("Invalid url: {0}")]
    InvalidUrl(String),

    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Process error: {0}")]
    Process(String),

    #[error("Stream resolution exceeded {0} indirections")]
    TooManyIndirections(usize),
}
