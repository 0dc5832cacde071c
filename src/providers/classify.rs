//! Failure taxonomy for response backends
//!
//! Every backend failure maps to exactly one [`ErrorType`]. Checks run in a
//! fixed priority order so a failure that matches several categories (say,
//! a 503 whose body mentions a quota) always lands in the same place.

use crate::providers::base::{BackendError, BackendErrorKind};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Category of a failed provider call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorType {
    /// Provider is overloaded; the only retryable category
    Overload,
    /// Credentials rejected or missing
    Auth,
    /// Rate limit or daily quota exhausted
    Quota,
    /// Provider refused the content
    Safety,
    /// Call exceeded its deadline
    Timeout,
    /// Provider unreachable
    Network,
    /// Anything else
    Unknown,
}

impl ErrorType {
    /// All categories in classification priority order
    pub const PRIORITY: [ErrorType; 7] = [
        ErrorType::Overload,
        ErrorType::Auth,
        ErrorType::Quota,
        ErrorType::Safety,
        ErrorType::Timeout,
        ErrorType::Network,
        ErrorType::Unknown,
    ];

    /// Wire name of the category
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Overload => "overload",
            Self::Auth => "auth",
            Self::Quota => "quota",
            Self::Safety => "safety",
            Self::Timeout => "timeout",
            Self::Network => "network",
            Self::Unknown => "unknown",
        }
    }

    /// Fixed user-facing text for the category
    ///
    /// Never contains provider diagnostics.
    pub const fn user_message(&self) -> &'static str {
        match self {
            Self::Overload => OVERLOAD_MESSAGE,
            Self::Auth => AUTH_MESSAGE,
            Self::Quota => QUOTA_MESSAGE,
            Self::Safety => SAFETY_MESSAGE,
            Self::Timeout => TIMEOUT_MESSAGE,
            Self::Network => NETWORK_MESSAGE,
            Self::Unknown => UNKNOWN_MESSAGE,
        }
    }

    fn matches(&self, error: &BackendError, detail: &str) -> bool {
        let has = |needle: &str| detail.contains(needle);
        match self {
            Self::Overload => error.status == Some(503) || has("503") || has("overloaded"),
            Self::Auth => {
                matches!(error.status, Some(401) | Some(403)) || has("api key") || has("401")
            }
            Self::Quota => error.status == Some(429) || has("quota") || has("429"),
            Self::Safety => {
                error.kind == BackendErrorKind::Blocked || has("safety") || has("blocked")
            }
            Self::Timeout => {
                error.kind == BackendErrorKind::Timeout
                    || has("timeout")
                    || has("timed out")
                    || has("etimedout")
            }
            Self::Network => {
                error.kind == BackendErrorKind::Connect
                    || has("network")
                    || has("econnrefused")
                    || has("connection refused")
            }
            Self::Unknown => true,
        }
    }
}

impl fmt::Display for ErrorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

const OVERLOAD_MESSAGE: &str = "🚦 **I'm Currently Experiencing High Traffic**\n\n\
Lots of people are chatting with me right now and I couldn't finish your request, \
even after trying several times.\n\n\
**What you can do:**\n\
* Wait 30-60 seconds and send your message again\n\
* Evenings in India are the busiest time, off-peak hours are faster\n\n\
This is temporary. Thank you for your patience! 🙏";

const AUTH_MESSAGE: &str = "⚠️ **Service Configuration Issue**\n\n\
I'm having a technical problem on my side. Please contact support if this keeps happening.";

const QUOTA_MESSAGE: &str = "📊 **Daily Usage Limit Reached**\n\n\
I've used up my processing capacity for now.\n\n\
**What you can do:**\n\
* Try again after midnight IST when capacity resets\n\
* Contact support if you need priority access";

const SAFETY_MESSAGE: &str = "🛡️ **Content Safety Notice**\n\n\
I couldn't process that message because of my safety guidelines. \
Please try rephrasing your question.";

const TIMEOUT_MESSAGE: &str = "⏱️ **Response Timeout**\n\n\
Your request took too long to process. Please try again with a shorter message \
or a smaller image.";

const NETWORK_MESSAGE: &str = "🌐 **Connection Problem**\n\n\
I couldn't reach the AI service. Please check your connection and try again.";

const UNKNOWN_MESSAGE: &str = "I apologize, but I'm experiencing some technical difficulties \
right now. Please try again in a moment.";

/// Classify a backend failure
///
/// Status codes and transport kinds are checked together with
/// case-insensitive markers in the diagnostic text, category by category in
/// [`ErrorType::PRIORITY`] order.
///
/// # Examples
///
/// ```
/// use bharat_ai::providers::{classify, BackendError, ErrorType};
///
/// let err = BackendError::status(503, "Service Unavailable");
/// assert_eq!(classify(&err), ErrorType::Overload);
///
/// let err = BackendError::status(400, "API key not valid");
/// assert_eq!(classify(&err), ErrorType::Auth);
/// ```
pub fn classify(error: &BackendError) -> ErrorType {
    let detail = error.detail.to_lowercase();
    ErrorType::PRIORITY
        .into_iter()
        .find(|category| category.matches(error, &detail))
        .unwrap_or(ErrorType::Unknown)
}
