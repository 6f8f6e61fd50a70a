//! Jukebox - 按会话排队的媒体播放系统
//!
//! 架构设计: DDD + Hexagonal Architecture
//!
//! 领域层 (domain/):
//! - Track Context: 曲目与惰性媒体流
//! - Playback Context: 播放状态、音量、状态消息
//!
//! 应用层 (application/):
//! - Ports: 端口定义（AudioTransport, Notifier, MediaResolver）
//! - Playback: 播放会话
//!
//! 基础设施层 (infrastructure/):
//! - Memory: TaskSerializer, SessionRegistry 内存实现
//! - Adapters: 媒体解析、音频输出、通知、流生产者

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use config::{load_config, AppConfig};
