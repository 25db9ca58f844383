//! Push notification traits.

use apns_core::{Notification, Response};

use crate::TransportError;

/// Low-level push notification sender.
#[trait_variant::make(Send)]
pub trait Pusher: Send + Sync {
    /// Submit one notification and wait for the gateway's verdict.
    ///
    /// Gateway rejections come back as a [`Response`]; only a failed exchange
    /// is a [`TransportError`].
    async fn push(&self, notification: &Notification) -> Result<Response, TransportError>;
}
