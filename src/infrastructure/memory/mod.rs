//! Memory Layer - In-Memory State Management
//!
//! 会话内的任务串行器，以及按 key 管理播放会话的注册表

mod session_registry;
mod task_serializer;

pub use session_registry::SessionRegistry;
pub use task_serializer::{Completion, SerializerError, TaskSerializer};
