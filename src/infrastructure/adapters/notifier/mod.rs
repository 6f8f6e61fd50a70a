//! Notifiers
//!
//! NotifierPort 的实现

mod log_notifier;

pub use log_notifier::LogNotifier;
