//! Shared SSE line-framing for adapters whose vendor dialect already
//! matches the unified `StreamFrame` shape (currently only OpenAI;
//! Ollama's NDJSON dialect needs real translation and has its own
//! parser in `adapters::ollama`).

use futures::Stream;
use futures::StreamExt;

use llm_gateway_core::{FrameStream, ProviderError, StreamFrame};

/// Reassembles an SSE byte stream into `data: ...` events and parses each
/// one as a `StreamFrame`, stopping at the `[DONE]` sentinel.
pub fn sse_frames(
    bytes: impl Stream<Item = reqwest::Result<bytes::Bytes>> + Send + 'static,
) -> FrameStream {
    Box::pin(async_stream::stream! {
        futures::pin_mut!(bytes);
        let mut buffer = String::new();

        while let Some(chunk) = bytes.next().await {
            let chunk = match chunk {
                Ok(c) => c,
                Err(e) => {
                    yield Err(ProviderError::new(502, "network_error", e.to_string()));
                    return;
                }
            };
            buffer.push_str(&String::from_utf8_lossy(&chunk));

            while let Some(pos) = buffer.find('\n') {
                let line = buffer[..pos].trim_end_matches('\r').to_string();
                buffer.drain(..=pos);

                let Some(data) = line.strip_prefix("data: ").or_else(|| line.strip_prefix("data:")) else {
                    continue;
                };
                let data = data.trim();
                if data.is_empty() {
                    continue;
                }
                if data == "[DONE]" {
                    return;
                }

                match serde_json::from_str::<StreamFrame>(data) {
                    Ok(frame) => yield Ok(frame),
                    Err(e) => {
                        yield Err(ProviderError::new(502, "invalid_response", e.to_string()));
                        return;
                    }
                }
            }
        }
    })
}
