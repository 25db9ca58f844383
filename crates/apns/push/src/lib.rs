//! APNs Push Delivery
//!
//! Certificate-authenticated gateway client and the sequential dispatch loop
//! that feeds it from line-oriented input.

mod client;
mod dispatch;
mod traits;

pub use client::*;
pub use dispatch::*;
pub use traits::*;
