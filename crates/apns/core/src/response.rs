//! Gateway responses.

/// Reason reported for a 200 reply without a body.
pub const SUCCESS_REASON: &str = "Success";

/// JSON body APNs returns alongside a non-200 status.
#[derive(Debug, Default, serde::Deserialize)]
pub struct ErrorBody {
    /// Error code, e.g. `BadDeviceToken`.
    pub reason: Option<String>,
    /// Epoch milliseconds at which the token stopped being valid (410 only).
    pub timestamp: Option<u64>,
}

/// The gateway's verdict on one notification.
///
/// A rejection is still a response: only a failed exchange is an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// HTTP status code.
    pub status: u16,
    /// Gateway error code, or `Success` when the notification was accepted.
    pub reason: String,
    /// `apns-id` header echoed by the gateway.
    pub apns_id: Option<String>,
    /// Epoch milliseconds the token became invalid, from the error body.
    pub timestamp: Option<u64>,
}

impl Response {
    /// Build a response from a status code and the raw reply body.
    ///
    /// `fallback` is used when the body carries no reason and the status is
    /// not 200.
    pub fn from_reply(
        status: u16,
        apns_id: Option<String>,
        body: &[u8],
        fallback: Option<&str>,
    ) -> Self {
        let parsed = if body.is_empty() {
            ErrorBody::default()
        } else {
            serde_json::from_slice::<ErrorBody>(body).unwrap_or_default()
        };

        let reason = match parsed.reason {
            Some(reason) if !reason.is_empty() => reason,
            _ if status == 200 => SUCCESS_REASON.to_owned(),
            _ => fallback.unwrap_or("Unknown").to_owned(),
        };

        Self {
            status,
            reason,
            apns_id,
            timestamp: parsed.timestamp,
        }
    }

    /// Check if the gateway accepted the notification.
    pub fn is_sent(&self) -> bool {
        self.status == 200
    }
}

impl std::fmt::Display for Response {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: '{}'", self.status, self.reason)
    }
}
