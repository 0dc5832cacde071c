//! Push notification payloads
//!
//! Normalizes incoming push bodies into the notification that gets shown
//! and decides what a click on it does.

use serde::{Deserialize, Serialize};
use url::Url;

pub const DEFAULT_TITLE: &str = "Bharat AI";
pub const DEFAULT_ICON: &str = "/logo.png";
pub const DEFAULT_URL: &str = "/";
pub const NOTIFICATION_TAG: &str = "bharat-ai-notification";
pub const FALLBACK_BODY: &str = "You have a new notification";

/// Raw push body as sent by the notification endpoint
#[derive(Debug, Clone, Default, Deserialize)]
struct PushPayload {
    title: Option<String>,
    body: Option<String>,
    message: Option<String>,
    icon: Option<String>,
    badge: Option<String>,
    url: Option<String>,
    timestamp: Option<i64>,
}

/// Button shown on a notification
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NotificationAction {
    pub action: String,
    pub title: String,
}

/// Data carried with the notification for the click handler
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NotificationData {
    pub url: String,
    pub timestamp: i64,
}

/// Notification ready to display
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    pub icon: String,
    pub badge: String,
    pub tag: String,
    pub require_interaction: bool,
    pub actions: Vec<NotificationAction>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<NotificationData>,
}

impl Notification {
    /// Shown when a push body cannot be parsed
    pub fn fallback() -> Self {
        Self {
            title: DEFAULT_TITLE.to_string(),
            body: Some(FALLBACK_BODY.to_string()),
            icon: DEFAULT_ICON.to_string(),
            badge: DEFAULT_ICON.to_string(),
            tag: NOTIFICATION_TAG.to_string(),
            require_interaction: false,
            actions: Vec::new(),
            data: None,
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

/// Build the notification for a push body
///
/// Returns `None` for an empty body, which shows nothing.
///
/// # Arguments
///
/// * `body` - Raw push data
/// * `now_millis` - Timestamp used when the payload carries none
///
/// # Examples
///
/// ```
/// use bharat_ai::notify::normalize_push;
///
/// let n = normalize_push(br#"{"message": "Your answer is ready"}"#, 0).unwrap();
/// assert_eq!(n.title, "Bharat AI");
/// assert_eq!(n.body.as_deref(), Some("Your answer is ready"));
///
/// let fallback = normalize_push(b"not json", 0).unwrap();
/// assert_eq!(fallback.body.as_deref(), Some("You have a new notification"));
/// ```
pub fn normalize_push(body: &[u8], now_millis: i64) -> Option<Notification> {
    if body.is_empty() {
        tracing::debug!("No data in push event");
        return None;
    }

    let payload: PushPayload = match serde_json::from_slice(body) {
        Ok(payload) => payload,
        Err(e) => {
            tracing::warn!("Error parsing push data: {}", e);
            return Some(Notification::fallback());
        }
    };

    Some(Notification {
        title: non_empty(payload.title).unwrap_or_else(|| DEFAULT_TITLE.to_string()),
        body: non_empty(payload.body).or_else(|| non_empty(payload.message)),
        icon: non_empty(payload.icon).unwrap_or_else(|| DEFAULT_ICON.to_string()),
        badge: non_empty(payload.badge).unwrap_or_else(|| DEFAULT_ICON.to_string()),
        tag: NOTIFICATION_TAG.to_string(),
        require_interaction: true,
        actions: vec![
            NotificationAction {
                action: "open".to_string(),
                title: "Open App".to_string(),
            },
            NotificationAction {
                action: "close".to_string(),
                title: "Close".to_string(),
            },
        ],
        data: Some(NotificationData {
            url: non_empty(payload.url).unwrap_or_else(|| DEFAULT_URL.to_string()),
            timestamp: payload.timestamp.unwrap_or(now_millis),
        }),
    })
}

/// What a notification click does
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClickOutcome {
    /// The close button; nothing else happens
    Dismissed,
    /// An open window already shows the target; focus it
    Focus(Url),
    /// Open a new window at the target
    Open(Url),
}

/// Decide what a click on `notification` does
///
/// # Arguments
///
/// * `action` - Clicked action id; `None` for a click on the body
/// * `notification` - The clicked notification
/// * `origin` - Application origin relative urls resolve against
/// * `open_windows` - Urls of windows already open
pub fn handle_click(
    action: Option<&str>,
    notification: &Notification,
    origin: &Url,
    open_windows: &[Url],
) -> ClickOutcome {
    if action == Some("close") {
        return ClickOutcome::Dismissed;
    }

    let target = notification
        .data
        .as_ref()
        .map(|d| d.url.as_str())
        .unwrap_or(DEFAULT_URL);
    let url = match origin.join(target) {
        Ok(url) => url,
        Err(e) => {
            tracing::warn!("Invalid notification url {}: {}", target, e);
            origin.clone()
        }
    };

    if open_windows.contains(&url) {
        ClickOutcome::Focus(url)
    } else {
        ClickOutcome::Open(url)
    }
}
