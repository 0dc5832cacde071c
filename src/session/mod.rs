//! Client-side chat session
//!
//! A [`ChatSession`] drives one conversation view: it appends optimistic
//! user messages, reconciles them with the server's confirmed messages,
//! rolls back on failure and discards replies for a conversation the user
//! has already left.
//!
//! A send is split in two phases so callers can interleave other UI
//! actions while the request is in flight:
//!
//! 1. [`ChatSession::begin_send`] validates state, appends the temporary
//!    message and returns a [`PendingSend`].
//! 2. [`ChatSession::complete_send`] applies the server result.
//!
//! [`ChatSession::send`] runs both phases against a [`ChatApi`].

use crate::client::ChatApi;
use crate::error::{BharatError, Result};
use crate::models::{
    GenerateImageRequest, ImageRef, InlineImage, Message, Role, SendMessageRequest,
    SendMessageResponse,
};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

/// Session state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Sending,
    Reconciling,
    Error,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Sending => "sending",
            Self::Reconciling => "reconciling",
            Self::Error => "error",
        };
        write!(f, "{}", name)
    }
}

/// Which conversation the session is showing
///
/// `epoch` increases every time the user switches or starts a conversation;
/// a pending send remembers the epoch it started in.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionContext {
    pub chat_id: Option<String>,
    epoch: u64,
}

impl SessionContext {
    /// Context switch counter
    pub fn epoch(&self) -> u64 {
        self.epoch
    }
}

/// What the composer will send next
#[derive(Debug, Clone, Default, PartialEq)]
struct Composer {
    upload: Option<InlineImage>,
    image_mode: bool,
}

/// An in-flight send
#[derive(Debug, Clone)]
pub struct PendingSend {
    /// Request to post to `/chats`; `generated_image_url` is filled in
    /// after image generation when `generate_image` is set
    pub request: SendMessageRequest,
    /// Prompt to generate an image for before posting
    pub generate_image: Option<GenerateImageRequest>,
    epoch: u64,
    temp_ids: Vec<String>,
    rollback: Vec<Message>,
    composer: Composer,
}

/// Result of applying a server response
#[derive(Debug, Clone, PartialEq)]
pub enum SendOutcome {
    /// Messages were reconciled into the session
    Delivered(SendMessageResponse),
    /// The user moved to another conversation; the reply was dropped
    Discarded,
}

/// Client-side state of one conversation view
pub struct ChatSession {
    api: Arc<dyn ChatApi>,
    state: SessionState,
    context: SessionContext,
    messages: Vec<Message>,
    composer: Composer,
    last_error: Option<String>,
    bootstrapped: bool,
}

impl ChatSession {
    /// Create an idle session with no conversation
    pub fn new(api: Arc<dyn ChatApi>) -> Self {
        Self {
            api,
            state: SessionState::Idle,
            context: SessionContext::default(),
            messages: Vec::new(),
            composer: Composer::default(),
            last_error: None,
            bootstrapped: false,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn context(&self) -> &SessionContext {
        &self.context
    }

    pub fn chat_id(&self) -> Option<&str> {
        self.context.chat_id.as_deref()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// User-facing text of the last failure, while in [`SessionState::Error`]
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn is_image_mode(&self) -> bool {
        self.composer.image_mode
    }

    pub fn pending_upload(&self) -> Option<&InlineImage> {
        self.composer.upload.as_ref()
    }

    /// Start a fresh conversation
    ///
    /// Any in-flight reply becomes stale.
    pub fn new_conversation(&mut self) {
        self.switch_context(None, Vec::new());
    }

    /// Show an existing conversation with its loaded history
    pub fn open_conversation(&mut self, chat_id: impl Into<String>, messages: Vec<Message>) {
        self.switch_context(Some(chat_id.into()), messages);
    }

    /// Fetch and show an existing conversation
    ///
    /// # Errors
    ///
    /// Returns the API error; the session is unchanged
    pub async fn load_conversation(&mut self, chat_id: &str) -> Result<()> {
        let messages = self.api.get_chat(chat_id).await?;
        self.open_conversation(chat_id, messages);
        Ok(())
    }

    fn switch_context(&mut self, chat_id: Option<String>, messages: Vec<Message>) {
        self.context.epoch += 1;
        self.context.chat_id = chat_id;
        self.messages = messages;
        self.composer = Composer::default();
        self.state = SessionState::Idle;
        self.last_error = None;
        tracing::debug!(
            chat_id = ?self.context.chat_id,
            epoch = self.context.epoch,
            "Session context switched"
        );
    }

    /// Attach an image to the next message; leaves image-generation mode
    pub fn attach_image(&mut self, image: InlineImage) {
        self.composer.image_mode = false;
        self.composer.upload = Some(image);
    }

    /// Drop the pending upload
    pub fn clear_upload(&mut self) {
        self.composer.upload = None;
    }

    /// Make the next submission generate an image; drops the pending upload
    pub fn enter_image_mode(&mut self) {
        self.composer.upload = None;
        self.composer.image_mode = true;
    }

    pub fn exit_image_mode(&mut self) {
        self.composer.image_mode = false;
    }

    /// Leave [`SessionState::Error`] after the user has seen the failure
    pub fn acknowledge_error(&mut self) {
        if self.state == SessionState::Error {
            self.state = SessionState::Idle;
            self.last_error = None;
        }
    }

    /// First phase of a send
    ///
    /// Appends the optimistic user message and moves to
    /// [`SessionState::Sending`]. Image-generation mode is consumed here.
    ///
    /// # Errors
    ///
    /// Returns `SessionBusy` when not idle and `InvalidRequest` when there
    /// is nothing to send
    pub fn begin_send(&mut self, text: &str) -> Result<PendingSend> {
        if self.state != SessionState::Idle {
            return Err(BharatError::SessionBusy(format!(
                "cannot send while {}",
                self.state
            ))
            .into());
        }

        let text = text.trim();
        if text.is_empty() && self.composer.upload.is_none() {
            return Err(BharatError::InvalidRequest("Message is empty".to_string()).into());
        }
        if self.composer.image_mode && text.is_empty() {
            return Err(
                BharatError::InvalidRequest("Image prompt is empty".to_string()).into(),
            );
        }

        let rollback = self.messages.clone();
        let composer = std::mem::take(&mut self.composer);

        let image_ref = composer.upload.as_ref().map(|img| ImageRef {
            url: img.to_data_url(),
            mime_type: img.mime_type.clone(),
        });
        let user_message = Message::temporary(Role::User, text, image_ref);
        let temp_ids = vec![user_message.id.clone()];
        self.messages.push(user_message);

        let generate_image = composer.image_mode.then(|| GenerateImageRequest {
            prompt: text.to_string(),
            model: None,
            size: None,
        });

        let request = SendMessageRequest {
            message: text.to_string(),
            chat_id: self.context.chat_id.clone(),
            image_data: composer.upload.clone(),
            generated_image_url: None,
        };

        self.state = SessionState::Sending;
        tracing::debug!(
            chat_id = ?self.context.chat_id,
            image_generation = generate_image.is_some(),
            "Send started"
        );

        Ok(PendingSend {
            request,
            generate_image,
            epoch: self.context.epoch,
            temp_ids,
            rollback,
            composer,
        })
    }

    /// Second phase of a send
    ///
    /// On success the temporary message is replaced by the confirmed pair.
    /// On failure messages and composer are restored exactly to their
    /// pre-send state, the session enters [`SessionState::Error`] and the
    /// error is returned. Results for a conversation the user has left are
    /// discarded without touching the session.
    ///
    /// # Errors
    ///
    /// Returns the send error after rolling back
    pub fn complete_send(
        &mut self,
        pending: PendingSend,
        result: Result<SendMessageResponse>,
    ) -> Result<SendOutcome> {
        if pending.epoch != self.context.epoch {
            tracing::info!(
                sent_epoch = pending.epoch,
                current_epoch = self.context.epoch,
                "Discarding reply for a conversation that is no longer current"
            );
            return Ok(SendOutcome::Discarded);
        }

        match result {
            Ok(response) => {
                self.state = SessionState::Reconciling;
                self.reconcile(&pending.temp_ids, &response);
                if self.context.chat_id.is_none() {
                    self.context.chat_id = Some(response.chat_id.clone());
                }
                self.state = SessionState::Idle;
                Ok(SendOutcome::Delivered(response))
            }
            Err(err) => {
                self.messages = pending.rollback;
                self.composer = pending.composer;
                self.last_error = Some(user_facing(&err));
                self.state = SessionState::Error;
                tracing::warn!("Send failed, session rolled back: {}", err);
                Err(err)
            }
        }
    }

    fn reconcile(&mut self, temp_ids: &[String], response: &SendMessageResponse) {
        self.messages.retain(|m| !temp_ids.contains(&m.id));
        self.messages.push(response.user_message.clone());
        self.messages.push(response.assistant_message.clone());
        dedup_later_wins(&mut self.messages);
    }

    /// Send a message and apply the result
    ///
    /// In image-generation mode the image is generated first and the
    /// exchange is then recorded with its URL.
    ///
    /// # Errors
    ///
    /// Same as [`begin_send`](Self::begin_send) and
    /// [`complete_send`](Self::complete_send)
    pub async fn send(&mut self, text: &str) -> Result<SendOutcome> {
        let pending = self.begin_send(text)?;
        let result = dispatch(self.api.as_ref(), &pending).await;
        self.complete_send(pending, result)
    }

    /// Send an externally supplied first message, once per session
    ///
    /// Later calls return `Ok(None)` without sending.
    ///
    /// # Errors
    ///
    /// Same as [`send`](Self::send)
    pub async fn bootstrap(&mut self, initial_message: &str) -> Result<Option<SendOutcome>> {
        if self.bootstrapped {
            tracing::debug!("Bootstrap already ran; ignoring");
            return Ok(None);
        }
        self.bootstrapped = true;
        self.send(initial_message).await.map(Some)
    }
}

/// Perform the remote calls for a pending send
///
/// # Errors
///
/// Returns the first failing API call
pub async fn dispatch(api: &dyn ChatApi, pending: &PendingSend) -> Result<SendMessageResponse> {
    let mut request = pending.request.clone();
    if let Some(generate) = &pending.generate_image {
        let image = api.generate_image(generate).await?;
        request.generated_image_url = Some(image.url);
    }
    api.send_message(&request).await
}

/// Remove earlier duplicates by id, keeping each id's last occurrence
fn dedup_later_wins(messages: &mut Vec<Message>) {
    let mut seen = HashSet::new();
    let mut kept: Vec<Message> = messages
        .drain(..)
        .rev()
        .filter(|m| seen.insert(m.id.clone()))
        .collect();
    kept.reverse();
    *messages = kept;
}

fn user_facing(err: &anyhow::Error) -> String {
    match err.downcast_ref::<BharatError>() {
        Some(BharatError::ChatApi { message, .. }) => message.clone(),
        _ => err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::MockChatApi;
    use crate::models::GeneratedImage;

    fn confirmed(chat_id: &str, new: bool, question: &str, answer: &str) -> SendMessageResponse {
        SendMessageResponse {
            chat_id: chat_id.to_string(),
            chat_title: "Title".to_string(),
            is_new_chat: new,
            user_message: Message::new(Role::User, question),
            assistant_message: Message::new(Role::Assistant, answer),
            updated_at: None,
        }
    }

    fn overload_error() -> anyhow::Error {
        BharatError::ChatApi {
            status: 502,
            message: "High traffic".to_string(),
        }
        .into()
    }

    #[tokio::test]
    async fn test_send_reconciles_without_temp_ids() {
        let mut api = MockChatApi::new();
        api.expect_send_message()
            .withf(|req| req.chat_id.is_none() && req.message == "Hello")
            .times(1)
            .returning(|_| Ok(confirmed("c1", true, "Hello", "Hi there")));
        let mut session = ChatSession::new(Arc::new(api));

        let outcome = session.send("  Hello ").await.unwrap();
        assert!(matches!(outcome, SendOutcome::Delivered(_)));
        assert_eq!(session.state(), SessionState::Idle);
        assert_eq!(session.chat_id(), Some("c1"));
        assert_eq!(session.messages().len(), 2);
        assert!(session.messages().iter().all(|m| !m.is_temporary()));
    }

    #[test]
    fn test_begin_send_is_optimistic_and_exclusive() {
        let mut session = ChatSession::new(Arc::new(MockChatApi::new()));
        let pending = session.begin_send("Hello").unwrap();
        assert_eq!(session.state(), SessionState::Sending);
        assert_eq!(session.messages().len(), 1);
        assert!(session.messages()[0].is_temporary());
        assert_eq!(pending.request.message, "Hello");

        let err = session.begin_send("again").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<BharatError>(),
            Some(BharatError::SessionBusy(_))
        ));
    }

    #[test]
    fn test_empty_message_rejected() {
        let mut session = ChatSession::new(Arc::new(MockChatApi::new()));
        assert!(session.begin_send("   ").is_err());
        assert_eq!(session.state(), SessionState::Idle);
        assert!(session.messages().is_empty());
    }

    #[tokio::test]
    async fn test_failure_rolls_back_exactly() {
        let mut api = MockChatApi::new();
        api.expect_send_message()
            .times(1)
            .returning(|_| Err(overload_error()));
        let mut session = ChatSession::new(Arc::new(api));
        let history = vec![
            Message::new(Role::User, "q"),
            Message::new(Role::Assistant, "a"),
        ];
        session.open_conversation("c1", history.clone());
        session.attach_image(InlineImage {
            data: "aGk=".to_string(),
            mime_type: "image/png".to_string(),
        });

        let err = session.send("follow up").await.unwrap_err();
        assert!(err.to_string().contains("High traffic"));
        assert_eq!(session.messages(), history.as_slice());
        assert!(session.pending_upload().is_some());
        assert_eq!(session.state(), SessionState::Error);
        assert_eq!(session.last_error(), Some("High traffic"));

        assert!(session.begin_send("retry").is_err());
        session.acknowledge_error();
        assert_eq!(session.state(), SessionState::Idle);
        assert!(session.last_error().is_none());
    }

    #[test]
    fn test_stale_reply_is_discarded() {
        let mut session = ChatSession::new(Arc::new(MockChatApi::new()));
        session.open_conversation("c1", Vec::new());
        let pending = session.begin_send("question for c1").unwrap();

        session.open_conversation("c2", vec![Message::new(Role::User, "c2 history")]);
        let outcome = session
            .complete_send(pending, Ok(confirmed("c1", false, "question for c1", "answer")))
            .unwrap();

        assert_eq!(outcome, SendOutcome::Discarded);
        assert_eq!(session.chat_id(), Some("c2"));
        assert_eq!(session.messages().len(), 1);
        assert_eq!(session.messages()[0].content, "c2 history");
        assert_eq!(session.state(), SessionState::Idle);
    }

    #[test]
    fn test_stale_failure_does_not_roll_back_new_view() {
        let mut session = ChatSession::new(Arc::new(MockChatApi::new()));
        let pending = session.begin_send("first").unwrap();
        session.new_conversation();

        let outcome = session.complete_send(pending, Err(overload_error())).unwrap();
        assert_eq!(outcome, SendOutcome::Discarded);
        assert_eq!(session.state(), SessionState::Idle);
        assert!(session.messages().is_empty());
    }

    #[test]
    fn test_reconcile_dedups_later_wins() {
        let mut session = ChatSession::new(Arc::new(MockChatApi::new()));
        let response = confirmed("c1", false, "q", "a");
        let mut stale_copy = response.assistant_message.clone();
        stale_copy.content = "old text".to_string();
        session.open_conversation("c1", vec![stale_copy]);

        let pending = session.begin_send("q").unwrap();
        session.complete_send(pending, Ok(response.clone())).unwrap();

        let ids: Vec<&str> = session.messages().iter().map(|m| m.id.as_str()).collect();
        assert_eq!(
            ids,
            vec![
                response.user_message.id.as_str(),
                response.assistant_message.id.as_str()
            ]
        );
        assert_eq!(session.messages()[1].content, "a");
    }

    #[test]
    fn test_upload_and_image_mode_are_exclusive() {
        let mut session = ChatSession::new(Arc::new(MockChatApi::new()));
        let image = InlineImage {
            data: "aGk=".to_string(),
            mime_type: "image/png".to_string(),
        };

        session.attach_image(image.clone());
        session.enter_image_mode();
        assert!(session.is_image_mode());
        assert!(session.pending_upload().is_none());

        session.attach_image(image);
        assert!(!session.is_image_mode());
        assert!(session.pending_upload().is_some());
    }

    #[tokio::test]
    async fn test_image_mode_generates_then_records() {
        let mut api = MockChatApi::new();
        api.expect_generate_image()
            .withf(|req| req.prompt == "a peacock")
            .times(1)
            .returning(|_| {
                Ok(GeneratedImage {
                    url: "https://img.example.com/peacock.png".to_string(),
                })
            });
        api.expect_send_message()
            .withf(|req| {
                req.generated_image_url.as_deref() == Some("https://img.example.com/peacock.png")
            })
            .times(1)
            .returning(|_| Ok(confirmed("c1", true, "a peacock", "Here is your image")));
        let mut session = ChatSession::new(Arc::new(api));

        session.enter_image_mode();
        session.send("a peacock").await.unwrap();
        assert!(!session.is_image_mode());
        assert_eq!(session.messages().len(), 2);
    }

    #[tokio::test]
    async fn test_failed_generation_skips_record_and_restores_mode() {
        let mut api = MockChatApi::new();
        api.expect_generate_image()
            .times(1)
            .returning(|_| Err(BharatError::ChatApi { status: 503, message: "off".into() }.into()));
        api.expect_send_message().never();
        let mut session = ChatSession::new(Arc::new(api));

        session.enter_image_mode();
        assert!(session.send("a peacock").await.is_err());
        assert!(session.is_image_mode());
        assert!(session.messages().is_empty());
    }

    #[tokio::test]
    async fn test_bootstrap_runs_once() {
        let mut api = MockChatApi::new();
        api.expect_send_message()
            .times(1)
            .returning(|_| Ok(confirmed("c1", true, "from link", "reply")));
        let mut session = ChatSession::new(Arc::new(api));

        assert!(session.bootstrap("from link").await.unwrap().is_some());
        assert!(session.bootstrap("from link").await.unwrap().is_none());
        assert_eq!(session.messages().len(), 2);
    }

    #[tokio::test]
    async fn test_follow_up_carries_chat_id() {
        let mut api = MockChatApi::new();
        api.expect_send_message()
            .withf(|req| req.chat_id.is_none())
            .times(1)
            .returning(|_| Ok(confirmed("c1", true, "one", "r1")));
        api.expect_send_message()
            .withf(|req| req.chat_id.as_deref() == Some("c1"))
            .times(1)
            .returning(|_| Ok(confirmed("c1", false, "two", "r2")));
        let mut session = ChatSession::new(Arc::new(api));

        session.send("one").await.unwrap();
        session.send("two").await.unwrap();
        assert_eq!(session.messages().len(), 4);
    }
}
