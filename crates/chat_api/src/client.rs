use std::future::Future;
use std::sync::{atomic::AtomicBool, atomic::Ordering, Arc};
use std::time::Duration;

use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, USER_AGENT};
use reqwest::{Client, Response};

use crate::config::ChatApiConfig;
use crate::error::{parse_error_message, ChatApiError};
use crate::events::KnowledgeAreas;
use crate::payload::ChatRequest;
use crate::url::{areas_url, chat_url};

/// Optional cancellation signal shared across request and stream loops.
pub type CancellationSignal = Arc<AtomicBool>;

/// Raw response body fragments, in arrival order.
pub type FragmentStream = BoxStream<'static, Result<Vec<u8>, ChatApiError>>;

const CANCEL_POLL_INTERVAL: Duration = Duration::from_millis(25);
const EVENT_STREAM_MIME: &str = "text/event-stream";
const DEFAULT_USER_AGENT: &str = concat!("ragchat/", env!("CARGO_PKG_VERSION"));

/// Fetch capability the chat core depends on.
pub trait ChatTransport: Send + Sync {
    /// Send one message and hand back the streamed body.
    ///
    /// A non-success status must surface as an error before any fragment is read.
    fn open_chat_stream(
        &self,
        request: &ChatRequest,
        cancellation: Option<&CancellationSignal>,
    ) -> impl Future<Output = Result<FragmentStream, ChatApiError>> + Send;

    fn fetch_knowledge_areas(
        &self,
    ) -> impl Future<Output = Result<KnowledgeAreas, ChatApiError>> + Send;
}

#[derive(Debug)]
pub struct ChatApiClient {
    http: Client,
    config: ChatApiConfig,
}

impl ChatApiClient {
    pub fn new(config: ChatApiConfig) -> Result<Self, ChatApiError> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.connect_timeout {
            builder = builder.connect_timeout(timeout);
        }
        let http = builder.build().map_err(ChatApiError::from)?;
        Ok(Self { http, config })
    }

    pub fn config(&self) -> &ChatApiConfig {
        &self.config
    }

    pub fn chat_endpoint(&self) -> String {
        chat_url(&self.config.base_url)
    }

    pub fn areas_endpoint(&self) -> String {
        areas_url(&self.config.base_url)
    }

    pub fn build_headers(&self) -> Result<HeaderMap, ChatApiError> {
        let mut out = HeaderMap::new();
        let user_agent = self
            .config
            .user_agent
            .as_deref()
            .unwrap_or(DEFAULT_USER_AGENT);
        out.insert(
            USER_AGENT,
            HeaderValue::from_str(user_agent).map_err(|_| {
                ChatApiError::InvalidBaseUrl(format!("invalid user agent: {user_agent}"))
            })?,
        );

        for (key, value) in &self.config.extra_headers {
            out.insert(
                HeaderName::from_bytes(key.as_bytes()).map_err(|_| {
                    ChatApiError::InvalidBaseUrl(format!("invalid header key: {key}"))
                })?,
                HeaderValue::from_str(value).map_err(|_| {
                    ChatApiError::InvalidBaseUrl(format!("invalid header value for {key}"))
                })?,
            );
        }
        Ok(out)
    }

    pub fn build_chat_request(
        &self,
        request: &ChatRequest,
    ) -> Result<reqwest::RequestBuilder, ChatApiError> {
        let message = request.trimmed().ok_or(ChatApiError::EmptyMessage)?;
        let headers = self.build_headers()?;

        Ok(self
            .http
            .post(self.chat_endpoint())
            .headers(headers)
            .header(ACCEPT, EVENT_STREAM_MIME)
            .json(&ChatRequest::new(message)))
    }

    /// Single attempt; failures are returned to the caller, never retried.
    pub async fn send_chat(
        &self,
        request: &ChatRequest,
        cancellation: Option<&CancellationSignal>,
    ) -> Result<Response, ChatApiError> {
        let response = self.build_chat_request(request)?.send();
        let response = await_or_cancel(response, cancellation)
            .await?
            .map_err(ChatApiError::from)?;
        ensure_success(response, cancellation).await
    }
}

impl ChatTransport for ChatApiClient {
    async fn open_chat_stream(
        &self,
        request: &ChatRequest,
        cancellation: Option<&CancellationSignal>,
    ) -> Result<FragmentStream, ChatApiError> {
        let response = self.send_chat(request, cancellation).await?;
        tracing::debug!(
            target: "chat_api",
            status = %response.status(),
            "chat stream opened"
        );

        Ok(response
            .bytes_stream()
            .map(|fragment| {
                fragment
                    .map(|bytes| bytes.to_vec())
                    .map_err(ChatApiError::from)
            })
            .boxed())
    }

    async fn fetch_knowledge_areas(&self) -> Result<KnowledgeAreas, ChatApiError> {
        let response = self
            .http
            .get(self.areas_endpoint())
            .headers(self.build_headers()?)
            .send()
            .await?;
        let response = ensure_success(response, None).await?;
        Ok(response.json::<KnowledgeAreas>().await?)
    }
}

async fn ensure_success(
    response: Response,
    cancellation: Option<&CancellationSignal>,
) -> Result<Response, ChatApiError> {
    if response.status().is_success() {
        return Ok(response);
    }

    let status = response.status();
    let body = await_or_cancel(response.text(), cancellation)
        .await?
        .unwrap_or_default();
    Err(ChatApiError::Status(
        status,
        parse_error_message(status, &body),
    ))
}

pub fn is_cancelled(cancel: Option<&CancellationSignal>) -> bool {
    cancel.is_some_and(|token| token.load(Ordering::Acquire))
}

/// Await `future`, bailing out with [`ChatApiError::Cancelled`] once the signal is set.
pub async fn await_or_cancel<F>(
    future: F,
    cancellation: Option<&CancellationSignal>,
) -> Result<F::Output, ChatApiError>
where
    F: Future,
{
    if cancellation.is_none() {
        return Ok(future.await);
    }

    let mut future = Box::pin(future);

    loop {
        if is_cancelled(cancellation) {
            return Err(ChatApiError::Cancelled);
        }

        if let Ok(output) = tokio::time::timeout(CANCEL_POLL_INTERVAL, &mut future).await {
            if is_cancelled(cancellation) {
                return Err(ChatApiError::Cancelled);
            }
            return Ok(output);
        }
    }
}
