//! Infrastructure Adapters
//!
//! 六边形架构的适配器实现

pub mod notifier;
pub mod resolver;
pub mod stream;
pub mod transport;

pub use notifier::*;
pub use resolver::*;
pub use transport::*;
