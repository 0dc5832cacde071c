use async_trait::async_trait;
use bharat_ai::config::ImageGenerationConfig;
use bharat_ai::providers::retry::{is_overload, RetryPolicy};
use bharat_ai::providers::{
    BackendError, ChatBackend, ChatRequest, Completion, ImageData, ResponseService, TokenUsage,
};
use bharat_ai::server::{build_router, AppState, ImageGenerator};
use bharat_ai::storage::SqliteStorage;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

#[allow(dead_code)]
pub fn create_temp_storage() -> (SqliteStorage, TempDir) {
    let tmp = TempDir::new().expect("failed to create tempdir");
    let db_path = tmp.path().join("history.db");
    let storage =
        SqliteStorage::new_with_path(db_path).expect("failed to create sqlite storage with path");
    (storage, tmp)
}

/// Backend answering from a script, counting chat calls
pub struct ScriptedBackend {
    replies: Mutex<Vec<Result<Completion, BackendError>>>,
    title: String,
    calls: AtomicUsize,
    policy: fn() -> RetryPolicy<BackendError>,
}

#[allow(dead_code)]
impl ScriptedBackend {
    pub fn replying(replies: &[&str], title: &str) -> Self {
        Self {
            replies: Mutex::new(
                replies
                    .iter()
                    .rev()
                    .map(|text| {
                        Ok(Completion {
                            text: text.to_string(),
                            usage: TokenUsage::new(12, 8, 20),
                        })
                    })
                    .collect(),
            ),
            title: title.to_string(),
            calls: AtomicUsize::new(0),
            policy: RetryPolicy::never,
        }
    }

    /// Every chat call fails with 503 and is retried on the 3 x 2s schedule
    pub fn overloaded() -> Self {
        Self {
            replies: Mutex::new(Vec::new()),
            title: String::new(),
            calls: AtomicUsize::new(0),
            policy: RetryPolicy::overload_default,
        }
    }

    /// Every chat call fails with 503, retried 3 times at 1ms
    pub fn overloaded_fast() -> Self {
        Self {
            policy: || RetryPolicy::new(3, Duration::from_millis(1), is_overload),
            ..Self::overloaded()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChatBackend for ScriptedBackend {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn retry_policy(&self) -> RetryPolicy<BackendError> {
        (self.policy)()
    }

    async fn complete_chat(&self, _request: &ChatRequest) -> Result<Completion, BackendError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.replies
            .lock()
            .expect("script lock")
            .pop()
            .unwrap_or_else(|| Err(BackendError::status(503, "Service Unavailable")))
    }

    async fn complete_title(&self, _first_message: &str) -> Result<String, BackendError> {
        Ok(self.title.clone())
    }

    async fn describe_image(
        &self,
        _image: &ImageData,
        _prompt: Option<&str>,
    ) -> Result<String, BackendError> {
        Ok("A bowl of masala chai".to_string())
    }
}

/// A running chat API server on a random local port
#[allow(dead_code)]
pub struct TestServer {
    pub base_url: String,
    pub storage: SqliteStorage,
    _dir: TempDir,
    handle: tokio::task::JoinHandle<()>,
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[allow(dead_code)]
pub async fn spawn_server(backend: Arc<ScriptedBackend>) -> TestServer {
    let (storage, dir) = create_temp_storage();
    let state = AppState {
        service: ResponseService::new(backend),
        storage: storage.clone(),
        images: ImageGenerator::new(ImageGenerationConfig::default())
            .expect("image generator"),
    };

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind test listener");
    let addr = listener.local_addr().expect("listener address");
    let handle = tokio::spawn(async move {
        axum::serve(listener, build_router(state))
            .await
            .expect("test server");
    });

    TestServer {
        base_url: format!("http://{}", addr),
        storage,
        _dir: dir,
        handle,
    }
}
