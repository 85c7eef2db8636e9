//! Server-sent event plumbing shared by the streaming providers

use super::{LlmError, TextStream};
use eventsource_stream::Eventsource;
use futures::StreamExt;
use reqwest::{Client, RequestBuilder, Response};
use std::time::Duration;

/// Upper bound on one whole reply, stream included
const REQUEST_TIMEOUT: Duration = Duration::from_secs(300);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

pub(super) fn http_client() -> Result<Client, LlmError> {
    Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .connect_timeout(CONNECT_TIMEOUT)
        .build()
        .map_err(|e| LlmError::unknown(format!("Failed to create HTTP client: {e}")))
}

/// Send the request and fail on any non-success status before streaming
pub(super) async fn open(request: RequestBuilder) -> Result<Response, LlmError> {
    let response = request
        .send()
        .await
        .map_err(|e| LlmError::from_transport(&e))?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(LlmError::from_status(status, &body));
    }

    Ok(response)
}

/// Decode an SSE body into text deltas.
///
/// `parse` sees each event's `data` and returns `Ok(None)` for frames that
/// carry no text. The OpenAI-style `[DONE]` sentinel is swallowed here.
pub(super) fn text_stream<F>(response: Response, parse: F) -> TextStream
where
    F: Fn(&str) -> Result<Option<String>, LlmError> + Send + 'static,
{
    let events = response.bytes_stream().eventsource();

    let deltas = events.filter_map(move |event| {
        let item = match event {
            Ok(event) if event.data == "[DONE]" => None,
            Ok(event) => parse(&event.data).transpose(),
            Err(e) => Some(Err(LlmError::stream(format!("SSE error: {e}")))),
        };
        futures::future::ready(item)
    });

    Box::pin(deltas)
}
