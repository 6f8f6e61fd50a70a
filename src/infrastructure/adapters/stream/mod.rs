//! Stream Producers
//!
//! 曲目默认使用的媒体流生产者：HTTP 拉取、外部进程输出

mod http;
mod process;

pub use http::{fetch_url, fetch_with, open};
pub use process::{process_stream, spawn_stdout};
