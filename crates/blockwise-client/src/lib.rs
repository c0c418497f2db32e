use async_trait::async_trait;
use blockwise_core::{AppConfig, AuthSession, CompileBackend, SessionContext, SessionError};
use blockwise_observability::redact_bearer;
use blockwise_types::{
    ApiMessage, Chapter, ChapterChangeRequest, CompileRequest, CreateChapterRequest,
    CreateTaskRequest, Credentials, Language, SignInResponse, Task, TaskSummary,
};
use chrono::Utc;
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

const ERROR_BODY_PREVIEW: usize = 300;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Session(#[from] SessionError),

    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("backend returned {status}: {message}")]
    Status { status: u16, message: String },

    #[error("unexpected response body: {0}")]
    Decode(String),
}

impl ApiError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            ApiError::Transport(err) => err.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

/// Typed access to the backend. Authenticated calls read the bearer token
/// from the shared [`SessionContext`] at send time.
#[derive(Clone)]
pub struct ApiClient {
    base_url: String,
    compile_url: String,
    session_max_age: chrono::Duration,
    client: Client,
    session: SessionContext,
}

impl ApiClient {
    pub fn new(config: &AppConfig, session: SessionContext) -> Result<Self, ApiError> {
        let client = Client::builder().timeout(config.request_timeout()).build()?;
        Ok(Self {
            base_url: config.api_base(),
            compile_url: config.compile_base(),
            session_max_age: config.session_max_age(),
            client,
            session,
        })
    }

    /// Client for a single host, mostly for tests against a mock server.
    pub fn for_base_url(base_url: &str, session: SessionContext) -> Result<Self, ApiError> {
        let config = AppConfig {
            api_url: base_url.to_string(),
            request_timeout_secs: 10,
            ..AppConfig::default()
        };
        Self::new(&config, session)
    }

    pub fn session(&self) -> &SessionContext {
        &self.session
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Exchanges credentials for a bearer token and signs the shared context in.
    pub async fn sign_in(&self, credentials: &Credentials) -> Result<AuthSession, ApiError> {
        let url = format!("{}/api/auth/signin", self.base_url);
        let resp = self.client.post(&url).json(credentials).send().await?;
        let reply: SignInResponse = decode_json(resp).await?;
        let session = AuthSession::from_sign_in(
            credentials.email.clone(),
            reply,
            self.session_max_age,
            Utc::now(),
        );
        tracing::info!(
            user_id = session.user_id.as_str(),
            role = ?session.role,
            expires_at = %session.expires_at,
            "signed in"
        );
        self.session.sign_in(session.clone());
        Ok(session)
    }

    pub async fn sign_up(&self, credentials: &Credentials) -> Result<(), ApiError> {
        let url = format!("{}/api/auth/signup", self.base_url);
        let resp = self.client.post(&url).json(credentials).send().await?;
        ensure_success(resp).await?;
        Ok(())
    }

    pub fn sign_out(&self) -> Option<AuthSession> {
        self.session.sign_out()
    }

    pub async fn list_tasks(&self) -> Result<Vec<TaskSummary>, ApiError> {
        self.get_json("/api/tasks").await
    }

    pub async fn get_task(&self, task_id: i64) -> Result<Task, ApiError> {
        self.get_json(&format!("/api/tasks/{task_id}")).await
    }

    pub async fn list_chapters(&self) -> Result<Vec<Chapter>, ApiError> {
        self.get_json("/chapter/test").await
    }

    pub async fn chapter_tasks(&self, chapter_id: i64) -> Result<Vec<TaskSummary>, ApiError> {
        self.get_json(&format!("/chapter/{chapter_id}")).await
    }

    pub async fn create_task(&self, request: &CreateTaskRequest) -> Result<(), ApiError> {
        self.session.require_author()?;
        self.post_authorized("/api/create", request).await
    }

    pub async fn create_chapter(&self, request: &CreateChapterRequest) -> Result<(), ApiError> {
        self.session.require_author()?;
        self.post_authorized("/chapter/create", request).await
    }

    pub async fn change_chapter_assignment(
        &self,
        request: &ChapterChangeRequest,
    ) -> Result<(), ApiError> {
        self.session.require_author()?;
        self.post_authorized("/chapter/change", request).await
    }

    /// Posts code to the compile service and returns the raw body of a 2xx
    /// reply. Interpreting the body is the caller's job.
    pub async fn compile_code(
        &self,
        language: Language,
        request: &CompileRequest,
    ) -> Result<String, ApiError> {
        let url = format!("{}/compile/{}", self.compile_url, language.as_str());
        let mut req = self.client.post(&url).json(request);
        // The compile service does not require auth; pass it along when we have it.
        if let Ok(token) = self.session.bearer() {
            req = req.bearer_auth(token);
        }
        let resp = req.send().await?;
        let resp = ensure_success(resp).await?;
        Ok(resp.text().await?)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let url = format!("{}{}", self.base_url, path);
        let req = self.authorized(self.client.get(&url))?;
        let resp = req.send().await?;
        decode_json(resp).await
    }

    async fn post_authorized<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<(), ApiError> {
        let url = format!("{}{}", self.base_url, path);
        let req = self.authorized(self.client.post(&url).json(body))?;
        let resp = req.send().await?;
        ensure_success(resp).await?;
        Ok(())
    }

    fn authorized(&self, req: RequestBuilder) -> Result<RequestBuilder, ApiError> {
        let token = self.session.bearer()?;
        tracing::debug!(
            authorization = redact_bearer(&format!("Bearer {token}")).as_str(),
            "sending authorized request"
        );
        Ok(req.bearer_auth(token))
    }
}

#[async_trait]
impl CompileBackend for ApiClient {
    async fn compile(
        &self,
        language: Language,
        request: &CompileRequest,
    ) -> anyhow::Result<String> {
        Ok(self.compile_code(language, request).await?)
    }
}

async fn ensure_success(resp: Response) -> Result<Response, ApiError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(ApiError::Status {
        status: status.as_u16(),
        message: extract_message(&body)
            .unwrap_or_else(|| status_fallback(status.as_u16(), &body)),
    })
}

async fn decode_json<T: DeserializeOwned>(resp: Response) -> Result<T, ApiError> {
    let resp = ensure_success(resp).await?;
    let body = resp.text().await?;
    serde_json::from_str(&body).map_err(|err| {
        ApiError::Decode(format!(
            "{err} (body: {})",
            truncate_for_error(&body, ERROR_BODY_PREVIEW)
        ))
    })
}

fn extract_message(body: &str) -> Option<String> {
    serde_json::from_str::<ApiMessage>(body)
        .ok()
        .and_then(|m| m.message)
        .map(|m| m.trim().to_string())
        .filter(|m| !m.is_empty())
}

fn status_fallback(status: u16, body: &str) -> String {
    let body = body.trim();
    if body.is_empty() {
        format!("request failed with status {status}")
    } else {
        truncate_for_error(body, ERROR_BODY_PREVIEW)
    }
}

fn truncate_for_error(input: &str, max_chars: usize) -> String {
    if input.chars().count() <= max_chars {
        return input.to_string();
    }
    let truncated = input.chars().take(max_chars).collect::<String>();
    format!("{truncated}...")
}
