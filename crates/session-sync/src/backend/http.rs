//! HTTP session backend (feature-gated).

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::Serialize;
use session_sync_core::{
    BackendError, InitRequest, InitResponse, SessionBackend, SessionRecord, SyncConfig,
};

const INIT_PATH: &str = "/session/init";
const SYNC_PATH: &str = "/session/sync";

/// Backend that talks JSON over HTTP.
///
/// - `POST {base_url}/session/init` with an [`InitRequest`], answered by an
///   [`InitResponse`].
/// - `POST {base_url}/session/sync` with `{ "session": <record> }`; any 2xx
///   counts as success and the body is ignored.
#[derive(Clone)]
pub struct HttpBackend {
    client: Client,
    base_url: String,
    api_token: Option<String>,
}

#[derive(Serialize)]
struct SyncBody<'a> {
    session: &'a SessionRecord,
}

impl HttpBackend {
    /// Create a new HTTP backend.
    ///
    /// # Errors
    /// Returns error if `timeout` is zero or the HTTP client cannot be built.
    pub fn new(
        base_url: impl Into<String>,
        api_token: Option<String>,
        timeout: Duration,
    ) -> Result<Self, BackendError> {
        if timeout.is_zero() {
            return Err(BackendError::Internal(
                "request timeout must be greater than zero".to_string(),
            ));
        }
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BackendError::Internal(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_token,
        })
    }

    /// Create a backend from the URL, token and timeout in `config`.
    ///
    /// # Errors
    /// Returns error if no base URL is configured or the client cannot be built.
    pub fn from_config(config: &SyncConfig) -> Result<Self, BackendError> {
        let base_url = config
            .base_url
            .clone()
            .ok_or_else(|| BackendError::Internal("no backend URL configured".to_string()))?;
        Self::new(base_url, config.api_token.clone(), config.request_timeout())
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn post(&self, path: &str) -> RequestBuilder {
        let request = self.client.post(self.endpoint(path));
        match &self.api_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

fn transport_error(e: &reqwest::Error) -> BackendError {
    if e.is_decode() {
        BackendError::Decode(e.to_string())
    } else {
        BackendError::Unreachable(e.to_string())
    }
}

async fn check_status(response: Response) -> Result<Response, BackendError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = response.text().await.unwrap_or_default();
    Err(BackendError::Rejected {
        status: status.as_u16(),
        message,
    })
}

#[async_trait]
impl SessionBackend for HttpBackend {
    async fn init(&self, request: &InitRequest) -> Result<SessionRecord, BackendError> {
        let response = self
            .post(INIT_PATH)
            .json(request)
            .send()
            .await
            .map_err(|e| transport_error(&e))?;

        let body: InitResponse = check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| BackendError::Decode(e.to_string()))?;

        Ok(body.session)
    }

    async fn sync(&self, record: &SessionRecord) -> Result<(), BackendError> {
        let response = self
            .post(SYNC_PATH)
            .json(&SyncBody { session: record })
            .send()
            .await
            .map_err(|e| transport_error(&e))?;

        check_status(response).await?;
        Ok(())
    }
}
