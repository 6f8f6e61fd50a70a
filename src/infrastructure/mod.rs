//! Infrastructure Layer - 基础设施层
//!
//! 提供所有端口的具体实现，以及会话的内存状态管理

pub mod adapters;
pub mod memory;

pub use memory::{SessionRegistry, TaskSerializer};
