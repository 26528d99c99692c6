use crate::monitor::SaveMonitor;
use reqwest::Method;
use serde::{Deserialize, Serialize};
use std::rc::Rc;

/// localStorage key the host app keeps its session token under.
pub(crate) const TOKEN_KEY: &str = "hulunote_token";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ApiErrorKind {
    Unauthorized,
    Network,
    Http,
    Parse,
}

#[derive(Clone, Debug)]
pub struct ApiError {
    pub kind: ApiErrorKind,
    pub status: Option<u16>,
    pub status_text: String,
    pub message: String,
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl ApiError {
    fn network(e: reqwest::Error) -> Self {
        Self {
            kind: ApiErrorKind::Network,
            status: None,
            status_text: String::new(),
            message: e.to_string(),
        }
    }

    fn parse(e: impl std::fmt::Display) -> Self {
        Self {
            kind: ApiErrorKind::Parse,
            status: None,
            status_text: String::new(),
            message: e.to_string(),
        }
    }

    fn http(status: reqwest::StatusCode, body: String) -> Self {
        let kind = if status.as_u16() == 401 {
            ApiErrorKind::Unauthorized
        } else {
            ApiErrorKind::Http
        };
        Self {
            kind,
            status: Some(status.as_u16()),
            status_text: status.canonical_reason().unwrap_or_default().to_string(),
            message: format!("Request failed ({status}): {body}"),
        }
    }
}

impl From<ApiError> for TransportError {
    fn from(e: ApiError) -> Self {
        Self {
            status: e.status,
            status_text: e.status_text,
            message: e.message,
        }
    }
}

pub(crate) type ApiResult<T> = Result<T, ApiError>;

/// One outgoing HTTP call as seen by the save monitor.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SaveRequest {
    pub url: String,
    pub method: Method,
    pub body: Option<String>,
}

impl SaveRequest {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method,
            body: None,
        }
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }
}

/// Error side of a transport call.
///
/// `status` is `None` (or `Some(0)`) when no HTTP response was obtained at all.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportError {
    pub status: Option<u16>,
    pub status_text: String,
    pub message: String,
}

impl TransportError {
    pub fn network(message: impl Into<String>) -> Self {
        Self {
            status: None,
            status_text: String::new(),
            message: message.into(),
        }
    }

    pub fn http(status: u16, status_text: impl Into<String>) -> Self {
        let status_text = status_text.into();
        Self {
            status: Some(status),
            message: format!("HTTP {status} {status_text}"),
            status_text,
        }
    }

    /// HTTP status if a response was actually received.
    pub fn http_status(&self) -> Option<u16> {
        self.status.filter(|s| *s != 0)
    }
}

pub type OnSuccess = Box<dyn FnOnce(String)>;
pub type OnError = Box<dyn FnOnce(TransportError)>;

/// Callback-style request primitive: returns immediately, exactly one callback fires later.
pub trait Transport {
    fn send(&self, request: SaveRequest, on_success: OnSuccess, on_error: OnError);
}

impl<T: Transport + ?Sized> Transport for Rc<T> {
    fn send(&self, request: SaveRequest, on_success: OnSuccess, on_error: OnError) {
        (**self).send(request, on_success, on_error)
    }
}

#[derive(Clone)]
pub struct ApiClient {
    pub(crate) base_url: String,
    pub(crate) token: Option<String>,
    monitor: Option<SaveMonitor>,
}

impl ApiClient {
    pub fn new(base_url: String) -> Self {
        Self {
            base_url,
            token: None,
            monitor: None,
        }
    }

    pub fn set_token(&mut self, token: String) {
        self.token = Some(token);
    }

    /// Mirrors the host app's session token from localStorage (cleared on logout).
    /// Without storage access the current token is kept.
    pub fn with_stored_token(mut self) -> Self {
        if let Some(storage) = web_sys::window().and_then(|w| w.local_storage().ok().flatten()) {
            self.token = storage.get_item(TOKEN_KEY).ok().flatten();
        }
        self
    }

    /// Route `save_note_data` through the monitor.
    pub fn with_monitor(mut self, monitor: SaveMonitor) -> Self {
        self.monitor = Some(monitor);
        self
    }

    fn with_auth_headers(
        mut req: reqwest::RequestBuilder,
        token: Option<String>,
    ) -> reqwest::RequestBuilder {
        if let Some(token) = token {
            req = req.header("Authorization", format!("Bearer {}", token));
        }
        req
    }

    pub(crate) fn url_for(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            return path.to_string();
        }
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    async fn execute(&self, request: &SaveRequest) -> ApiResult<String> {
        let client = reqwest::Client::new();
        let mut req = client.request(request.method.clone(), self.url_for(&request.url));
        req = Self::with_auth_headers(req, self.token.clone());

        if let Some(b) = &request.body {
            req = req
                .header("Content-Type", "application/json")
                .body(b.clone());
        }

        let res = req.send().await.map_err(ApiError::network)?;

        if res.status().is_success() {
            res.text().await.map_err(ApiError::parse)
        } else {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            Err(ApiError::http(status, body))
        }
    }

    /// `PUT api/notes/{id}/data`, monitored when a monitor is attached.
    pub async fn save_note_data(
        &self,
        note_id: &str,
        content: &str,
    ) -> Result<String, TransportError> {
        let body = serde_json::json!({ "content": content }).to_string();
        let request = SaveRequest::new(
            Method::PUT,
            format!("api/notes/{}/data", urlencoding::encode(note_id)),
        )
        .with_body(body);

        let fut = async { self.execute(&request).await.map_err(TransportError::from) };
        match &self.monitor {
            Some(monitor) => monitor.track(&request, fut).await,
            None => fut.await,
        }
    }
}

impl Transport for ApiClient {
    fn send(&self, request: SaveRequest, on_success: OnSuccess, on_error: OnError) {
        let client = self.clone();
        leptos::task::spawn_local(async move {
            match client.execute(&request).await {
                Ok(data) => on_success(data),
                Err(e) => {
                    log::debug!(target: "save_monitor", "{} {} failed: {e}", request.method, request.url);
                    on_error(e.into())
                }
            }
        });
    }
}
