//! Response-shape parsing for the webhook relay
//!
//! The relay answers with several JSON shapes depending on how its workflow
//! is wired: array-wrapped objects, `{output}`, `{text}`, `{message}`, a
//! legacy `{success, message}` envelope, or a bare JSON string. Each shape is
//! a variant of [`WebhookReply`], tried in declaration order.

use crate::providers::base::TokenUsage;
use serde_json::Value;

/// Message used when no known shape matches
pub const INVALID_FORMAT: &str = "Invalid response format from webhook";

/// One recognized reply shape, tried in declaration order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookReply {
    /// `{"output": "..."}` (agent node)
    Output(String),
    /// `{"text": "..."}`
    Text(String),
    /// `{"message": "..."}`
    Message(String),
    /// `{"success": true, "message": "..."}`
    ///
    /// Kept for precedence. Any body with a non-empty `message` already
    /// matched [`WebhookReply::Message`], so this never wins in practice.
    LegacySuccess(String),
    /// A bare JSON string
    Raw(String),
}

impl WebhookReply {
    /// Parse a relay body, unwrapping a leading array element first
    ///
    /// Returns `None` when no variant matches.
    ///
    /// # Examples
    ///
    /// ```
    /// use bharat_ai::providers::shapes::WebhookReply;
    /// use serde_json::json;
    ///
    /// let reply = WebhookReply::parse(&json!([{"output": "Namaste!"}])).unwrap();
    /// assert_eq!(reply, WebhookReply::Output("Namaste!".to_string()));
    ///
    /// let reply = WebhookReply::parse(&json!({"text": "a", "message": "b"})).unwrap();
    /// assert_eq!(reply.text(), "a");
    ///
    /// assert!(WebhookReply::parse(&json!({"status": "ok"})).is_none());
    /// ```
    pub fn parse(body: &Value) -> Option<Self> {
        let body = unwrap_array(body);

        if let Some(s) = truthy_str(body, "output") {
            return Some(Self::Output(s.to_string()));
        }
        if let Some(s) = truthy_str(body, "text") {
            return Some(Self::Text(s.to_string()));
        }
        if let Some(s) = truthy_str(body, "message") {
            return Some(Self::Message(s.to_string()));
        }
        if is_truthy(body.get("success")) {
            if let Some(s) = truthy_str(body, "message") {
                return Some(Self::LegacySuccess(s.to_string()));
            }
        }
        if let Value::String(s) = body {
            return Some(Self::Raw(s.clone()));
        }
        None
    }

    /// The reply text carried by the variant
    pub fn text(&self) -> &str {
        match self {
            Self::Output(s)
            | Self::Text(s)
            | Self::Message(s)
            | Self::LegacySuccess(s)
            | Self::Raw(s) => s,
        }
    }

    /// Consume the variant, returning its text
    pub fn into_text(self) -> String {
        match self {
            Self::Output(s)
            | Self::Text(s)
            | Self::Message(s)
            | Self::LegacySuccess(s)
            | Self::Raw(s) => s,
        }
    }
}

/// Token usage reported alongside a relay reply, zeros when absent
pub fn parse_usage(body: &Value) -> TokenUsage {
    unwrap_array(body)
        .get("usage")
        .and_then(|u| serde_json::from_value(u.clone()).ok())
        .unwrap_or_default()
}

/// Title candidate from a relay reply: `output`, `text`, `title`, `message`
///
/// Returns an empty string when none is present.
pub fn parse_title(body: &Value) -> String {
    let body = unwrap_array(body);
    ["output", "text", "title", "message"]
        .into_iter()
        .find_map(|key| truthy_str(body, key))
        .unwrap_or_default()
        .to_string()
}

/// `analysis` field of an image-analysis reply, trimmed
pub fn parse_analysis(body: &Value) -> Option<String> {
    truthy_str(unwrap_array(body), "analysis")
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn unwrap_array(body: &Value) -> &Value {
    match body {
        Value::Array(items) if !items.is_empty() => &items[0],
        other => other,
    }
}

fn truthy_str<'a>(body: &'a Value, key: &str) -> Option<&'a str> {
    body.get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
}

fn is_truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().map_or(false, |f| f != 0.0),
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(_)) | Some(Value::Object(_)) => true,
    }
}
