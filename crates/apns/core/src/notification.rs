//! Notification types.

use bytes::Bytes;

use crate::{EncodingError, Payload};

/// Delivery priority (`apns-priority`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    /// Deliver immediately.
    High,
    /// Deliver based on power considerations.
    Normal,
    /// Prioritize the device's power over all other factors.
    Low,
}

impl Priority {
    /// Header value.
    pub fn as_header(self) -> &'static str {
        match self {
            Self::High => "10",
            Self::Normal => "5",
            Self::Low => "1",
        }
    }
}

/// Longest `apns-collapse-id` the gateway accepts, in bytes.
pub const MAX_COLLAPSE_ID_LEN: usize = 64;

/// Notification type (`apns-push-type`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PushType {
    /// Alert, sound or badge shown to the user.
    Alert,
    /// Content delivered silently to the app.
    Background,
    /// Location query for a location push service extension.
    Location,
    /// VoIP call invitation.
    Voip,
    /// watchOS complication update.
    Complication,
    /// File provider change signal.
    Fileprovider,
    /// MDM wake-up.
    Mdm,
    /// Live Activity update.
    Liveactivity,
    /// Push to Talk channel update.
    Pushtotalk,
}

impl PushType {
    /// Header value.
    pub fn as_header(self) -> &'static str {
        match self {
            Self::Alert => "alert",
            Self::Background => "background",
            Self::Location => "location",
            Self::Voip => "voip",
            Self::Complication => "complication",
            Self::Fileprovider => "fileprovider",
            Self::Mdm => "mdm",
            Self::Liveactivity => "liveactivity",
            Self::Pushtotalk => "pushtotalk",
        }
    }
}

/// Unknown header enum value.
#[derive(Debug, thiserror::Error)]
#[error("unknown {kind} `{value}`")]
pub struct ParseHeaderError {
    kind: &'static str,
    value: String,
}

impl std::str::FromStr for Priority {
    type Err = ParseHeaderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "high" | "10" => Ok(Self::High),
            "normal" | "5" => Ok(Self::Normal),
            "low" | "1" => Ok(Self::Low),
            other => Err(ParseHeaderError {
                kind: "priority",
                value: other.to_owned(),
            }),
        }
    }
}

impl std::str::FromStr for PushType {
    type Err = ParseHeaderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let push_type = match s {
            "alert" => Self::Alert,
            "background" => Self::Background,
            "location" => Self::Location,
            "voip" => Self::Voip,
            "complication" => Self::Complication,
            "fileprovider" => Self::Fileprovider,
            "mdm" => Self::Mdm,
            "liveactivity" => Self::Liveactivity,
            "pushtotalk" => Self::Pushtotalk,
            other => {
                return Err(ParseHeaderError {
                    kind: "push type",
                    value: other.to_owned(),
                });
            }
        };
        Ok(push_type)
    }
}

/// Optional request headers shared by every notification in a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NotificationOptions {
    /// Canonical UUID identifying the notification.
    pub apns_id: Option<String>,
    /// Coalescing key, at most 64 bytes.
    pub collapse_id: Option<String>,
    /// UNIX epoch seconds after which the gateway stops retrying delivery.
    pub expiration: Option<u64>,
    /// Delivery priority; the gateway defaults to high.
    pub priority: Option<Priority>,
    /// Notification type; required by the gateway for watchOS and VoIP.
    pub push_type: Option<PushType>,
}

/// A single notification addressed to one device.
#[derive(Debug, Clone)]
pub struct Notification {
    /// Device token.
    pub device_token: String,
    /// Topic, typically the app's bundle ID.
    pub topic: String,
    /// Optional request headers.
    pub options: NotificationOptions,
    payload: Bytes,
}

impl Notification {
    /// Build a notification, encoding the payload once.
    pub fn new(
        device_token: impl Into<String>,
        topic: impl Into<String>,
        payload: &Payload,
    ) -> Result<Self, EncodingError> {
        Ok(Self {
            device_token: device_token.into(),
            topic: topic.into(),
            options: NotificationOptions::default(),
            payload: payload.encode()?,
        })
    }

    /// Attach optional request headers.
    pub fn with_options(mut self, options: NotificationOptions) -> Self {
        self.options = options;
        self
    }

    /// Encoded wire body.
    pub fn payload(&self) -> &Bytes {
        &self.payload
    }
}
