//! Audio Transports
//!
//! AudioTransportPort 的实现

mod drain;

pub use drain::{DrainConnection, DrainControl, DrainTransport, DrainTransportConfig};
