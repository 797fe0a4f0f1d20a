//! Server-sent event decoding for natively streamed completions.
//!
//! The byte stream is buffered until a blank line closes an event; chunks may
//! split multi-byte characters so undecoded bytes are carried over.
use async_stream::try_stream;
use futures::stream::{BoxStream, Stream, StreamExt};
use serde_json::Value;

use super::base::DeltaStream;
use super::errors::{ProviderError, ProviderResult};

/// Abort a stream whose undelivered buffer grows past this size
const MAX_BUFFER: usize = 16 * 1024 * 1024;

/// Decode an SSE byte stream into the payloads of its `data:` fields.
///
/// Multiple `data:` lines in one event are joined with newlines. The stream
/// ends at a `[DONE]` payload or when the body ends.
pub fn sse_data<S, B, E>(body: S) -> BoxStream<'static, ProviderResult<String>>
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Into<ProviderError> + Send + 'static,
{
    let mut body = Box::pin(body);
    Box::pin(try_stream! {
        let mut buffer = String::new();
        let mut pending: Vec<u8> = Vec::new();

        'body: while let Some(chunk) = body.next().await {
            let chunk = chunk.map_err(|e| -> ProviderError { e.into() })?;
            pending.extend_from_slice(chunk.as_ref());
            decode_utf8(&mut pending, &mut buffer);

            if buffer.len() > MAX_BUFFER || pending.len() > MAX_BUFFER {
                Err::<(), _>(ProviderError::MalformedResponse(
                    "event stream buffer exceeded 16 MiB".to_string(),
                ))?;
            }

            while let Some(pos) = buffer.find("\n\n") {
                let event: String = buffer.drain(..pos + 2).collect();
                if let Some(data) = event_data(&event) {
                    if data == "[DONE]" {
                        break 'body;
                    }
                    yield data;
                }
            }
        }
    })
}

/// Move every complete character from `pending` into `buffer`, normalizing
/// CRLF line endings
fn decode_utf8(pending: &mut Vec<u8>, buffer: &mut String) {
    let (text, consumed) = match std::str::from_utf8(pending.as_slice()) {
        Ok(text) => (text.to_string(), pending.len()),
        Err(e) => {
            let valid = e.valid_up_to();
            let text = String::from_utf8_lossy(&pending[..valid]).into_owned();
            // an incomplete trailing sequence waits for the next chunk,
            // invalid bytes are dropped
            let skip = e.error_len().map(|len| valid + len).unwrap_or(valid);
            (text, skip)
        }
    };
    pending.drain(..consumed);
    buffer.push_str(&text.replace("\r\n", "\n"));
}

fn event_data(event: &str) -> Option<String> {
    let lines: Vec<&str> = event
        .lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .map(|data| data.strip_prefix(' ').unwrap_or(data))
        .collect();
    if lines.is_empty() {
        None
    } else {
        Some(lines.join("\n"))
    }
}

/// Text deltas from an OpenAI-compatible `stream: true` completion
pub fn openai_deltas(data: BoxStream<'static, ProviderResult<String>>) -> DeltaStream {
    let mut data = data;
    Box::pin(try_stream! {
        while let Some(payload) = data.next().await {
            let payload = payload?;
            let chunk: Value = serde_json::from_str(&payload)?;
            if let Some(error) = chunk.get("error") {
                Err::<(), _>(ProviderError::Api(error.to_string()))?;
            }
            if let Some(text) = chunk["choices"][0]["delta"]["content"].as_str() {
                if !text.is_empty() {
                    yield text.to_string();
                }
            }
        }
    })
}

/// Text deltas from an Anthropic streaming messages response
pub fn anthropic_deltas(data: BoxStream<'static, ProviderResult<String>>) -> DeltaStream {
    let mut data = data;
    Box::pin(try_stream! {
        while let Some(payload) = data.next().await {
            let payload = payload?;
            let event: Value = serde_json::from_str(&payload)?;
            match event["type"].as_str() {
                Some("content_block_delta") if event["delta"]["type"] == "text_delta" => {
                    if let Some(text) = event["delta"]["text"].as_str() {
                        yield text.to_string();
                    }
                }
                Some("error") => {
                    Err::<(), _>(ProviderError::Api(event["error"].to_string()))?;
                }
                Some("message_stop") => break,
                _ => {}
            }
        }
    })
}
