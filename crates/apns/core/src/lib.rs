//! APNs Core Types
//!
//! Notifications, payload encoding, and gateway responses shared by the
//! push client and the dispatch loop.

mod environment;
mod notification;
mod payload;
mod response;

pub use environment::*;
pub use notification::*;
pub use payload::*;
pub use response::*;
