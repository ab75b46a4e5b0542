//! Streaming HTTP transport trait and reqwest-based implementation.

use std::pin::Pin;

use async_stream::try_stream;
use futures_core::Stream;
use futures_util::StreamExt;
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use serde_json::Value;

use crate::{ProviderError, ProviderFuture, SecretString, SseData, SseLineDecoder};

/// `data:` payloads of one upstream response, ending at `[DONE]` or EOF.
pub type SsePayloadStream<'a> =
    Pin<Box<dyn Stream<Item = Result<String, ProviderError>> + Send + 'a>>;

#[derive(Debug)]
pub enum StreamAuth {
    Bearer(SecretString),
    Header { name: String, value: SecretString },
}

#[derive(Debug)]
pub struct StreamRequest {
    pub path: String,
    pub auth: StreamAuth,
    pub headers: Vec<(String, String)>,
    pub body: Value,
}

pub trait StreamTransport: Send + Sync + std::fmt::Debug {
    /// Sends the request and resolves once response headers arrived.
    ///
    /// Non-2xx statuses are returned as `Err` without reading any events.
    fn open<'a>(
        &'a self,
        request: StreamRequest,
    ) -> ProviderFuture<'a, Result<SsePayloadStream<'a>, ProviderError>>;
}

#[derive(Debug, Clone)]
pub struct HttpStreamTransport {
    client: Client,
    base_url: String,
}

impl HttpStreamTransport {
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    async fn parse_error(response: Response) -> ProviderError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        let details = extract_error_details(&body);
        let message = details
            .as_ref()
            .and_then(|details| details.message.clone())
            .unwrap_or_else(|| format!("upstream request failed with status {status}"));

        if details.as_ref().is_some_and(ErrorDetails::is_not_found) {
            return ProviderError::not_found(message).with_status(StatusCode::NOT_FOUND.as_u16());
        }

        let error = match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                ProviderError::authentication(message)
            }
            StatusCode::TOO_MANY_REQUESTS => ProviderError::rate_limited(message),
            StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => {
                ProviderError::timeout(message)
            }
            StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
                ProviderError::invalid_request(message)
            }
            StatusCode::NOT_FOUND => ProviderError::not_found(message),
            StatusCode::SERVICE_UNAVAILABLE | StatusCode::BAD_GATEWAY => {
                ProviderError::unavailable(message)
            }
            _ => ProviderError::transport(message),
        };

        error.with_status(status.as_u16())
    }
}

impl StreamTransport for HttpStreamTransport {
    fn open<'a>(
        &'a self,
        request: StreamRequest,
    ) -> ProviderFuture<'a, Result<SsePayloadStream<'a>, ProviderError>> {
        Box::pin(async move {
            let mut builder = self
                .client
                .post(self.endpoint(&request.path))
                .header("accept", "text/event-stream")
                .json(&request.body);

            builder = match &request.auth {
                StreamAuth::Bearer(token) => builder.bearer_auth(token.expose()),
                StreamAuth::Header { name, value } => builder.header(name.as_str(), value.expose()),
            };

            for (name, value) in &request.headers {
                builder = builder.header(name.as_str(), value.as_str());
            }

            let response = builder.send().await.map_err(|err| {
                if err.is_timeout() {
                    ProviderError::timeout(err.to_string())
                } else {
                    ProviderError::transport(err.to_string())
                }
            })?;

            if !response.status().is_success() {
                return Err(Self::parse_error(response).await);
            }

            let stream = try_stream! {
                let mut bytes = response.bytes_stream();
                let mut decoder = SseLineDecoder::new();
                let mut done = false;

                while let Some(item) = bytes.next().await {
                    let chunk = item.map_err(|err| ProviderError::transport(err.to_string()))?;
                    for data in decoder.push(&chunk)? {
                        match data {
                            SseData::Payload(payload) => yield payload,
                            SseData::Done => {
                                done = true;
                                break;
                            }
                        }
                    }

                    if done {
                        break;
                    }
                }

                if !done {
                    if let Some(SseData::Payload(payload)) = decoder.finish()? {
                        yield payload;
                    }
                }
            };

            Ok(Box::pin(stream) as SsePayloadStream<'a>)
        })
    }
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ErrorDetails {
    pub(crate) message: Option<String>,
    pub(crate) code: Option<Value>,
    #[serde(rename = "type")]
    pub(crate) kind: Option<String>,
}

impl ErrorDetails {
    pub(crate) fn is_not_found(&self) -> bool {
        let code_not_found = self
            .code
            .as_ref()
            .and_then(Value::as_str)
            .is_some_and(|code| code.contains("not_found"));
        let kind_not_found = self
            .kind
            .as_deref()
            .is_some_and(|kind| kind.contains("not_found"));
        code_not_found || kind_not_found
    }
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: Option<ErrorDetails>,
    message: Option<String>,
}

/// Reads `error.message` (or a top-level `message`) out of an error body.
pub(crate) fn extract_error_details(body: &str) -> Option<ErrorDetails> {
    let envelope = serde_json::from_str::<ErrorEnvelope>(body).ok()?;
    match envelope.error {
        Some(mut details) => {
            if details.message.is_none() {
                details.message = envelope.message;
            }
            Some(details)
        }
        None => envelope.message.map(|message| ErrorDetails {
            message: Some(message),
            ..ErrorDetails::default()
        }),
    }
}
