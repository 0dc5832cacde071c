/*!
Command handlers for the CLI

This module provides command handlers invoked by the CLI entrypoint.

- `chat`     Interactive chat against the API server
- `serve`    The chat API server
- `provider` One-shot title generation and image analysis
- `updates`  Worker update watcher and push notification preview
- `history`  Stored conversations
*/

use crate::config::Config;
use crate::error::{BharatError, Result};
use crate::providers::base::sniff_mime_type;
use crate::providers::ImageData;
use std::path::Path;

// Special commands parser for the chat REPL
pub mod special_commands;

// Stored conversation commands
pub mod history;

/// Read an image file and detect its MIME type from its bytes
///
/// # Errors
///
/// Returns an I/O error if the file cannot be read, or `InvalidRequest`
/// if it is empty or not a supported image format
pub fn read_image_file(path: &Path) -> Result<ImageData> {
    let bytes = std::fs::read(path)?;
    if bytes.is_empty() {
        return Err(
            BharatError::InvalidRequest(format!("Image file is empty: {}", path.display())).into(),
        );
    }
    let mime_type = sniff_mime_type(&bytes).ok_or_else(|| {
        BharatError::InvalidRequest(format!("Unsupported image format: {}", path.display()))
    })?;
    tracing::debug!(path = %path.display(), mime_type, size = bytes.len(), "Read image file");
    Ok(ImageData::new(bytes, mime_type))
}

// Chat command handler
pub mod chat {
    //! Interactive chat mode handler.
    //!
    //! Connects to the API server, loads the conversation index and runs a
    //! readline loop that sends each line through a [`ChatSession`].

    use super::*;
    use crate::client::{ChatApi, HttpChatApi};
    use crate::commands::history::{is_yes, print_message, print_summary_table};
    use crate::commands::special_commands::{
        parse_special_command, print_help, ConversationRef, SpecialCommand,
    };
    use crate::models::InlineImage;
    use crate::session::{ChatSession, SendOutcome};
    use crate::store::ChatStore;
    use colored::Colorize;
    use rustyline::error::ReadlineError;
    use rustyline::DefaultEditor;
    use std::sync::Arc;

    /// Start interactive chat mode
    ///
    /// # Arguments
    ///
    /// * `config` - Global configuration (consumed)
    /// * `resume` - Conversation to open first
    /// * `message` - Message to send once before the prompt appears
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client or the line editor cannot be
    /// created, or if `resume` names an unknown conversation
    pub async fn run_chat(
        config: Config,
        resume: Option<String>,
        message: Option<String>,
    ) -> Result<()> {
        tracing::info!("Starting interactive chat mode");

        let http = HttpChatApi::new(&config.client)?;
        let base_url = http.base_url().to_string();
        let api: Arc<dyn ChatApi> = Arc::new(http);
        let mut store = ChatStore::new(Arc::clone(&api));
        let mut session = ChatSession::new(api);

        if let Err(e) = store.refresh().await {
            tracing::warn!("Could not load conversations from {}: {}", base_url, e);
        }

        if let Some(id) = resume {
            let messages = store.select(&id).await?;
            session.open_conversation(id, messages);
        }

        let mut rl = DefaultEditor::new()?;

        print_welcome_banner(&base_url, &store);
        for message in session.messages() {
            print_message(message);
        }

        if let Some(initial) = message {
            match session.bootstrap(&initial).await {
                Ok(Some(outcome)) => report_send(&mut session, &mut store, Ok(outcome)),
                Ok(None) => {}
                Err(e) => report_send(&mut session, &mut store, Err(e)),
            }
        }

        loop {
            match rl.readline(&format_prompt(&session)) {
                Ok(line) => {
                    let trimmed = line.trim();
                    if trimmed.is_empty() {
                        continue;
                    }

                    let command = match parse_special_command(trimmed) {
                        Ok(command) => command,
                        Err(e) => {
                            eprintln!("{}", e.to_string().red());
                            continue;
                        }
                    };

                    match command {
                        SpecialCommand::Exit => break,
                        SpecialCommand::None => {
                            rl.add_history_entry(trimmed)?;
                            let result = session.send(trimmed).await;
                            report_send(&mut session, &mut store, result);
                        }
                        other => {
                            if let Err(e) =
                                handle_command(other, &mut rl, &mut session, &mut store).await
                            {
                                eprintln!("{} {}", "Error:".red().bold(), e);
                            }
                        }
                    }
                }
                Err(ReadlineError::Interrupted) => {
                    println!("CTRL-C");
                    break;
                }
                Err(ReadlineError::Eof) => {
                    println!("CTRL-D");
                    break;
                }
                Err(err) => {
                    tracing::error!("Error: {:?}", err);
                    break;
                }
            }
        }

        Ok(())
    }

    async fn handle_command(
        command: SpecialCommand,
        rl: &mut DefaultEditor,
        session: &mut ChatSession,
        store: &mut ChatStore,
    ) -> Result<()> {
        match command {
            SpecialCommand::ToggleImageMode => {
                if session.is_image_mode() {
                    session.exit_image_mode();
                    println!("Image generation off\n");
                } else {
                    session.enter_image_mode();
                    println!(
                        "{}\n",
                        "Image generation on: your next message is the image prompt".magenta()
                    );
                }
            }
            SpecialCommand::Attach(path) => {
                let image = read_image_file(&path)?;
                session.attach_image(InlineImage {
                    data: image.to_base64(),
                    mime_type: image.mime_type.clone(),
                });
                println!(
                    "Attached {} ({})\n",
                    path.display().to_string().cyan(),
                    image.mime_type
                );
            }
            SpecialCommand::Detach => {
                session.clear_upload();
                println!("Attachment removed\n");
            }
            SpecialCommand::NewChat => {
                session.new_conversation();
                store.clear_current();
                println!("{}\n", "Started a new conversation".green());
            }
            SpecialCommand::List => {
                if let Err(e) = store.refresh().await {
                    tracing::warn!("Could not refresh conversations: {}", e);
                }
                if store.list().is_empty() {
                    println!("{}", "No conversation history found.".yellow());
                } else {
                    print_summary_table(store.list());
                }
            }
            SpecialCommand::Open(target) => {
                let id = resolve_ref(store, &target)?;
                let messages = store.select(&id).await?;
                session.open_conversation(id, messages);
                if let Some(summary) = store.current() {
                    println!("\n{}", summary.title.bold());
                }
                for message in session.messages() {
                    print_message(message);
                }
                println!();
            }
            SpecialCommand::Delete(target) => {
                let id = resolve_ref(store, &target)?;
                let title = store
                    .get(&id)
                    .map(|c| c.title.clone())
                    .ok_or_else(|| BharatError::ConversationNotFound(id.clone()))?;
                let answer = rl.readline(&format!("Delete '{}'? [y/N] ", title))?;
                let was_open = session.chat_id() == Some(id.as_str());

                if !store.delete(&id, |_| is_yes(&answer)).await? {
                    println!("{}", "Deletion cancelled.".yellow());
                    return Ok(());
                }
                println!("{}", format!("Deleted '{}'", title).green());

                if was_open {
                    follow_current(session, store).await;
                }
            }
            SpecialCommand::ShowStatus => print_status(session, store),
            SpecialCommand::Help => print_help(),
            SpecialCommand::Exit | SpecialCommand::None => {}
        }
        Ok(())
    }

    /// Show whatever the index made current after the open conversation
    /// was deleted
    async fn follow_current(session: &mut ChatSession, store: &mut ChatStore) {
        let Some(next) = store.current_id().map(str::to_string) else {
            session.new_conversation();
            return;
        };
        match store.select(&next).await {
            Ok(messages) => {
                session.open_conversation(next, messages);
                if let Some(summary) = store.current() {
                    println!("Now viewing '{}'\n", summary.title.cyan());
                }
            }
            Err(e) => {
                tracing::warn!("Could not open conversation {}: {}", next, e);
                store.clear_current();
                session.new_conversation();
            }
        }
    }

    fn resolve_ref(store: &ChatStore, target: &ConversationRef) -> Result<String> {
        match target {
            ConversationRef::Index(index) => {
                let summary = store
                    .list()
                    .get(index - 1)
                    .ok_or_else(|| BharatError::ConversationNotFound(format!("#{}", index)))?;
                Ok(summary.id.clone())
            }
            ConversationRef::Id(id) => Ok(id.clone()),
        }
    }

    fn report_send(session: &mut ChatSession, store: &mut ChatStore, result: Result<SendOutcome>) {
        match result {
            Ok(SendOutcome::Delivered(response)) => {
                store.record_exchange(&response);
                if response.is_new_chat {
                    println!("{}", format!("[{}]", response.chat_title).dimmed());
                }
                print_message(&response.assistant_message);
                println!();
            }
            Ok(SendOutcome::Discarded) => {
                tracing::debug!("Reply arrived for a conversation that is no longer open");
            }
            Err(e) => {
                let shown = session
                    .last_error()
                    .map(str::to_string)
                    .unwrap_or_else(|| e.to_string());
                eprintln!("{} {}", "Error:".red().bold(), shown);
                session.acknowledge_error();
            }
        }
    }

    fn format_prompt(session: &ChatSession) -> String {
        let marker = if session.is_image_mode() {
            format!("{} ", "[image]".magenta())
        } else if session.pending_upload().is_some() {
            format!("{} ", "[attached]".yellow())
        } else {
            String::new()
        };
        format!("{}{} ", marker, ">>".green().bold())
    }

    fn print_welcome_banner(base_url: &str, store: &ChatStore) {
        println!("\n{}", "Bharat AI".bold());
        println!("Connected to {}", base_url.cyan());
        println!("{} stored conversations", store.list().len());
        println!("Type {} for commands.\n", "/help".cyan());
    }

    fn print_status(session: &ChatSession, store: &ChatStore) {
        let title = match (session.chat_id(), store.current()) {
            (Some(id), Some(summary)) if summary.id == id => summary.title.clone(),
            (Some(id), _) => id.to_string(),
            (None, _) => "New conversation".to_string(),
        };
        let attachment = session
            .pending_upload()
            .map(|image| image.mime_type.clone())
            .unwrap_or_else(|| "none".to_string());

        println!("\n{}", "Session Status".bold());
        println!("  Conversation:  {}", title.cyan());
        println!("  Messages:      {}", session.messages().len());
        println!("  State:         {}", session.state());
        println!(
            "  Image mode:    {}",
            if session.is_image_mode() { "on" } else { "off" }
        );
        println!("  Attachment:    {}", attachment);
        println!("  Conversations: {}\n", store.list().len());
    }
}

// Server command handler
pub mod serve {
    use super::*;

    /// Run the chat API server until Ctrl-C
    ///
    /// # Arguments
    ///
    /// * `config` - Global configuration (consumed)
    /// * `bind` - Address override for `server.bind_addr`
    ///
    /// # Errors
    ///
    /// Returns error if the server cannot be built or bound
    pub async fn run_serve(mut config: Config, bind: Option<String>) -> Result<()> {
        if let Some(bind) = bind {
            config.server.bind_addr = bind;
        }
        crate::telemetry::init_metrics_exporter();
        crate::server::serve(&config).await
    }
}

// One-shot provider commands
pub mod provider {
    use super::*;
    use crate::providers::create_response_service;
    use colored::Colorize;

    /// Print a title for `message`
    ///
    /// Provider failures fall back to a title derived from the message.
    ///
    /// # Errors
    ///
    /// Returns error if the configured provider cannot be created
    pub async fn run_title(config: &Config, message: &str) -> Result<()> {
        let service = create_response_service(&config.provider)?;
        let title = service.generate_chat_title(message).await;
        println!("{}", title);
        Ok(())
    }

    /// Print the provider's description of an image file
    ///
    /// # Errors
    ///
    /// Returns error if the file is unreadable or not an image, or if the
    /// configured provider cannot be created
    pub async fn run_analyze(config: &Config, image: &Path, prompt: Option<&str>) -> Result<()> {
        let image = read_image_file(image)?;
        let service = create_response_service(&config.provider)?;
        let analysis = service.analyze_image(&image, prompt).await;
        if analysis.success {
            println!("{}", analysis.analysis);
        } else {
            if let Some(error) = &analysis.error {
                tracing::warn!("Image analysis failed: {}", error);
            }
            println!("{}", analysis.analysis.yellow());
        }
        Ok(())
    }
}

// Worker update and push notification commands
pub mod updates {
    use super::*;
    use crate::notify::{
        normalize_push, run_update_poller, HttpUpdateChecker, LifecycleEvent, UpdateLifecycle,
        WorkerState,
    };
    use colored::Colorize;
    use std::time::Duration;
    use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
    use tokio::sync::mpsc;
    use tokio_util::sync::CancellationToken;

    /// Poll the worker script and report new versions until Ctrl-C
    ///
    /// Each line read from stdin counts as the app regaining focus and
    /// triggers an immediate check.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when no script URL is available
    pub async fn run_watch_updates(
        config: &Config,
        script_url: Option<String>,
        interval: Option<u64>,
    ) -> Result<()> {
        let script_url = script_url
            .or_else(|| config.notify.script_url.clone())
            .ok_or_else(|| {
                BharatError::Config(
                    "No worker script URL; set notify.script_url or pass --script-url".to_string(),
                )
            })?;
        let interval = Duration::from_secs(
            interval
                .unwrap_or(config.notify.poll_interval_seconds)
                .max(1),
        );
        let checker = HttpUpdateChecker::new(script_url.clone())?;

        let (focus_tx, focus_rx) = mpsc::channel(4);
        let (update_tx, mut update_rx) = mpsc::channel(4);
        let cancellation = CancellationToken::new();

        let focus_task = tokio::spawn(async move {
            let mut lines = BufReader::new(tokio::io::stdin()).lines();
            while let Ok(Some(_)) = lines.next_line().await {
                if focus_tx.send(()).await.is_err() {
                    break;
                }
            }
        });

        let on_signal = cancellation.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                on_signal.cancel();
            }
        });

        println!(
            "Watching {} every {}s (press Enter to check now, Ctrl-C to stop)",
            script_url.cyan(),
            interval.as_secs()
        );

        let poller = run_update_poller(&checker, interval, focus_rx, update_tx, cancellation);
        tokio::pin!(poller);
        let mut lifecycle = UpdateLifecycle::new(true);

        let checks = loop {
            tokio::select! {
                checks = &mut poller => break checks,
                Some(update) = update_rx.recv() => {
                    lifecycle.on_worker_state(WorkerState::Installing);
                    if let Some(LifecycleEvent::UpdateAvailable) =
                        lifecycle.on_worker_state(WorkerState::InstalledWaiting)
                    {
                        println!(
                            "{} {} -> {}",
                            "New version available:".green().bold(),
                            short_digest(&update.previous),
                            short_digest(&update.current)
                        );
                    }
                }
            }
        };

        focus_task.abort();
        println!("Stopped after {} checks", checks);
        Ok(())
    }

    fn short_digest(digest: &str) -> &str {
        digest.get(..12).unwrap_or(digest)
    }

    /// Print the notification a push payload would produce, as JSON
    ///
    /// # Errors
    ///
    /// Returns error if stdin cannot be read
    pub async fn run_push_preview(payload: Option<String>) -> Result<()> {
        let body = match payload {
            Some(payload) => payload.into_bytes(),
            None => {
                let mut buffer = Vec::new();
                tokio::io::stdin().read_to_end(&mut buffer).await?;
                buffer
            }
        };

        let now_millis = chrono::Utc::now().timestamp_millis();
        match normalize_push(&body, now_millis) {
            Some(notification) => {
                println!("{}", serde_json::to_string_pretty(&notification)?);
            }
            None => println!("No notification"),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::temp_dir;

    const PNG_HEADER: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

    #[test]
    fn test_read_image_file_sniffs_png() {
        let dir = temp_dir();
        let path = dir.path().join("logo.bin");
        std::fs::write(&path, PNG_HEADER).unwrap();

        let image = read_image_file(&path).unwrap();
        assert_eq!(image.mime_type, "image/png");
        assert_eq!(image.bytes.len(), PNG_HEADER.len());
    }

    #[test]
    fn test_read_image_file_rejects_text() {
        let dir = temp_dir();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, "not an image").unwrap();

        let err = read_image_file(&path).unwrap_err();
        assert!(err.to_string().contains("Unsupported image format"));
    }

    #[test]
    fn test_read_image_file_rejects_empty() {
        let dir = temp_dir();
        let path = dir.path().join("empty.png");
        std::fs::write(&path, b"").unwrap();

        let err = read_image_file(&path).unwrap_err();
        assert!(err.to_string().contains("empty"));
    }

    #[tokio::test]
    async fn test_watch_updates_requires_script_url() {
        let config = Config::default();
        let err = updates::run_watch_updates(&config, None, None)
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<BharatError>(),
            Some(BharatError::Config(_))
        ));
    }
}
