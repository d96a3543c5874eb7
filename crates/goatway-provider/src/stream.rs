use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;

/// Upstream reasoning models can emit large tool-call deltas in a single
/// SSE line; the line buffer is allowed to grow well past a single network
/// read before a newline is found.
pub const MIN_LINE_BUFFER_CAPACITY: usize = 256 * 1024;

#[derive(Debug, Default, Clone)]
pub struct StreamAccumulator {
    pub model: Option<String>,
    pub prompt_tokens: Option<u64>,
    pub completion_tokens: Option<u64>,
    pub total_tokens: Option<u64>,
    pub finish_reason: Option<String>,
    pub content: String,
}

#[derive(Debug, Deserialize)]
struct ChatChunk {
    model: Option<String>,
    #[serde(default)]
    choices: Vec<ChunkChoice>,
    usage: Option<UsageChunk>,
}

#[derive(Debug, Deserialize)]
struct ChunkChoice {
    delta: Option<Delta>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Delta {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UsageChunk {
    prompt_tokens: Option<u64>,
    completion_tokens: Option<u64>,
    total_tokens: Option<u64>,
}

impl StreamAccumulator {
    /// Observes one upstream line. Non-`data:` lines and the terminal
    /// `[DONE]` marker are ignored; anything that doesn't parse as a chat
    /// chunk is ignored too — a single malformed line must never abort the
    /// pass-through of the rest of the stream.
    pub fn observe_line(&mut self, line: &str) {
        let Some(data) = line.strip_prefix("data: ") else {
            return;
        };
        if data.trim() == "[DONE]" {
            return;
        }
        let Ok(chunk) = serde_json::from_str::<ChatChunk>(data) else {
            return;
        };
        if let Some(model) = chunk.model {
            self.model = Some(model);
        }
        if let Some(usage) = chunk.usage {
            // Final chunks may carry usage; later values override earlier
            // (absent) ones, never the other way around.
            self.prompt_tokens = usage.prompt_tokens.or(self.prompt_tokens);
            self.completion_tokens = usage.completion_tokens.or(self.completion_tokens);
            self.total_tokens = usage.total_tokens.or(self.total_tokens);
        }
        for choice in chunk.choices {
            if let Some(reason) = choice.finish_reason {
                if !reason.is_empty() {
                    self.finish_reason = Some(reason);
                }
            }
            if let Some(delta) = choice.delta {
                if let Some(text) = delta.content {
                    self.content.push_str(&text);
                }
            }
        }
    }
}

/// Reads the upstream body line by line, writing each line (with its
/// newline) to the client immediately, and in parallel feeding it to a
/// `StreamAccumulator`. No mutex is held across any await point here — the
/// only state carried across iterations is the plain buffer and the
/// accumulator, both owned locally.
pub async fn pump_stream<S>(mut upstream: S, client_tx: mpsc::Sender<std::io::Result<Bytes>>) -> StreamAccumulator
where
    S: Stream<Item = reqwest::Result<Bytes>> + Unpin,
{
    let mut accumulator = StreamAccumulator::default();
    let mut buf: Vec<u8> = Vec::with_capacity(MIN_LINE_BUFFER_CAPACITY);

    while let Some(chunk) = upstream.next().await {
        let chunk = match chunk {
            Ok(c) => c,
            Err(e) => {
                tracing::warn!(error = %e, "upstream stream read failed mid-response");
                break;
            }
        };
        buf.extend_from_slice(&chunk);

        loop {
            let Some(pos) = buf.iter().position(|&b| b == b'\n') else {
                break;
            };
            let line_bytes: Vec<u8> = buf.drain(..=pos).collect();
            if client_tx.send(Ok(Bytes::from(line_bytes.clone()))).await.is_err() {
                // Client disconnected; stop writing but keep accumulating
                // isn't useful either — the request is over.
                return accumulator;
            }
            let line = String::from_utf8_lossy(&line_bytes);
            accumulator.observe_line(line.trim_end_matches(['\r', '\n']));
        }
    }

    if !buf.is_empty() {
        let line = String::from_utf8_lossy(&buf).to_string();
        let _ = client_tx.send(Ok(Bytes::from(buf))).await;
        accumulator.observe_line(line.trim_end_matches(['\r', '\n']));
    }

    accumulator
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accumulates_model_usage_and_content() {
        let mut acc = StreamAccumulator::default();
        acc.observe_line(r#"data: {"model":"x","choices":[{"delta":{"content":"He"}}]}"#);
        acc.observe_line(r#"data: {"choices":[{"delta":{"content":"llo"}}]}"#);
        acc.observe_line(
            r#"data: {"choices":[{"finish_reason":"stop"}],"usage":{"prompt_tokens":5,"completion_tokens":2,"total_tokens":7}}"#,
        );
        acc.observe_line("data: [DONE]");

        assert_eq!(acc.model.as_deref(), Some("x"));
        assert_eq!(acc.content, "Hello");
        assert_eq!(acc.finish_reason.as_deref(), Some("stop"));
        assert_eq!(acc.prompt_tokens, Some(5));
        assert_eq!(acc.completion_tokens, Some(2));
        assert_eq!(acc.total_tokens, Some(7));
    }

    #[test]
    fn malformed_line_is_ignored_not_fatal() {
        let mut acc = StreamAccumulator::default();
        acc.observe_line("data: not json at all");
        acc.observe_line(r#"data: {"model":"y","choices":[]}"#);
        assert_eq!(acc.model.as_deref(), Some("y"));
    }

    #[test]
    fn non_data_lines_are_ignored() {
        let mut acc = StreamAccumulator::default();
        acc.observe_line(": comment");
        acc.observe_line("event: message");
        assert!(acc.model.is_none());
    }

    #[tokio::test]
    async fn pump_forwards_lines_in_order_and_accumulates() {
        let lines = vec![
            Ok(Bytes::from_static(
                b"data: {\"model\":\"x\",\"choices\":[{\"delta\":{\"content\":\"He\"}}]}\n\n",
            )),
            Ok(Bytes::from_static(
                b"data: {\"choices\":[{\"finish_reason\":\"stop\"}],\"usage\":{\"prompt_tokens\":5,\"completion_tokens\":2,\"total_tokens\":7}}\n\n",
            )),
            Ok(Bytes::from_static(b"data: [DONE]\n\n")),
        ];
        let upstream = futures_util::stream::iter(lines);
        let (tx, mut rx) = mpsc::channel(16);

        let acc = pump_stream(upstream, tx).await;
        assert_eq!(acc.model.as_deref(), Some("x"));
        assert_eq!(acc.finish_reason.as_deref(), Some("stop"));

        let mut forwarded = Vec::new();
        while let Ok(chunk) = rx.try_recv() {
            forwarded.push(chunk.unwrap());
        }
        assert!(!forwarded.is_empty());
    }
}
