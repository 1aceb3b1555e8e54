use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// The status domain from spec.md §3. Append-only events carry one of
/// these; a Message's `status` always mirrors the latest event applied to
/// it (or `Send` if no event has landed yet).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum MessageStatus {
    RenderFailed,
    SendRequestFailed,
    SpamDetected,
    Send,
    Deferral,
    HardBounce,
    SoftBounce,
    Open,
    Click,
    Spam,
    Unsub,
    Reject,
    Scheduled,
    Buffered,
    Delivered,
    Expired,
    DeliveryFailed,
}

impl MessageStatus {
    /// A human label matching `Message.status_display` in the original
    /// implementation; used by the query API's message-detail/list views.
    pub fn display(self) -> &'static str {
        match self {
            Self::Send => "Sent",
            Self::Open => "Opened",
            Self::Click => "Opened & clicked on",
            Self::SoftBounce => "Bounced (retried)",
            Self::HardBounce => "Bounced",
            Self::RenderFailed => "render_failed",
            Self::SendRequestFailed => "send_request_failed",
            Self::SpamDetected => "spam_detected",
            Self::Deferral => "deferral",
            Self::Spam => "spam",
            Self::Unsub => "unsub",
            Self::Reject => "reject",
            Self::Scheduled => "scheduled",
            Self::Buffered => "buffered",
            Self::Delivered => "delivered",
            Self::Expired => "expired",
            Self::DeliveryFailed => "delivery_failed",
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn round_trips_through_serde() {
        let s = serde_json::to_string(&MessageStatus::HardBounce).unwrap();
        assert_eq!(s, "\"hard_bounce\"");
        let back: MessageStatus = serde_json::from_str(&s).unwrap();
        assert_eq!(back, MessageStatus::HardBounce);
    }
}
