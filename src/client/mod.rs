//! Consumer side of `/api/stream`.
//!
//! [`StreamReassembler`] turns raw body reads back into a running string;
//! [`StreamClient`] drives it over HTTP with caller-controlled cancellation.

use log::{info, warn};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::model::StreamChunk;
use crate::stream::{data_payload, LineDecoder};

/// Shown when the server gives no specific reason.
pub const GENERIC_FAILURE: &str = "Error en la respuesta del servidor";

/// Rebuilds streamed text from arbitrary byte reads.
#[derive(Debug, Default)]
pub struct StreamReassembler {
    decoder: LineDecoder,
    text: String,
}

impl StreamReassembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one read. Returns the contents appended by the events it completed.
    ///
    /// Lines that do not parse are logged and skipped.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        let mut appended = Vec::new();

        for line in self.decoder.push(bytes) {
            let Some(payload) = data_payload(&line) else { continue };
            match serde_json::from_str::<StreamChunk>(payload) {
                Ok(chunk) => {
                    self.text.push_str(&chunk.content);
                    appended.push(chunk.content);
                }
                Err(e) => warn!("Error parsing chunk: {}", e),
            }
        }

        appended
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn into_text(self) -> String {
        self.text
    }
}

/// How a stream ended when it did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamOutcome {
    Completed(String),
    /// Cancelled by the caller; carries whatever arrived before.
    Cancelled(String),
}

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("message is empty")]
    EmptyMessage,

    #[error("server rejected the request with status {status}")]
    Rejected { status: u16, message: Option<String> },

    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("stream ended early: {source}")]
    Interrupted {
        partial: String,
        #[source]
        source: reqwest::Error,
    },
}

impl ClientError {
    /// Text suitable for showing to the person who sent the message.
    pub fn user_message(&self) -> &str {
        match self {
            ClientError::Rejected { message: Some(message), .. } => message.as_str(),
            _ => GENERIC_FAILURE,
        }
    }
}

#[derive(Serialize)]
struct OutgoingRequest<'a> {
    message: &'a str,
    #[serde(rename = "systemPrompt", skip_serializing_if = "Option::is_none")]
    system_prompt: Option<&'a str>,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

pub struct StreamClient {
    http: Client,
    endpoint: String,
}

impl StreamClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            http: Client::new(),
            endpoint: format!("{}/api/stream", base_url.trim_end_matches('/')),
        }
    }

    /// Send one message and hand each piece of text to `on_chunk` as it arrives.
    ///
    /// Cancelling `cancel` drops the connection and returns
    /// [`StreamOutcome::Cancelled`] rather than an error.
    pub async fn send<F>(
        &self,
        message: &str,
        system_prompt: Option<&str>,
        cancel: &CancellationToken,
        mut on_chunk: F,
    ) -> Result<StreamOutcome, ClientError>
    where
        F: FnMut(&str),
    {
        let message = message.trim();
        if message.is_empty() {
            return Err(ClientError::EmptyMessage);
        }

        let request = self
            .http
            .post(&self.endpoint)
            .json(&OutgoingRequest { message, system_prompt })
            .send();

        let mut response = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                info!("Request cancelled before the server answered");
                return Ok(StreamOutcome::Cancelled(String::new()));
            }
            response = request => response?,
        };

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.json::<ErrorBody>().await.ok().map(|body| body.error);
            return Err(ClientError::Rejected { status, message });
        }

        let mut reassembler = StreamReassembler::new();
        loop {
            let read = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    info!("Request cancelled mid-stream");
                    return Ok(StreamOutcome::Cancelled(reassembler.into_text()));
                }
                read = response.chunk() => read,
            };

            match read {
                Ok(Some(bytes)) => {
                    for content in reassembler.push(&bytes) {
                        on_chunk(&content);
                    }
                }
                Ok(None) => return Ok(StreamOutcome::Completed(reassembler.into_text())),
                Err(source) => {
                    return Err(ClientError::Interrupted {
                        partial: reassembler.into_text(),
                        source,
                    })
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reassembles_chunks_in_order() {
        let mut reassembler = StreamReassembler::new();
        let body = "data: {\"content\":\"Hola \"}\n\ndata: {\"content\":\"mun\"}\n\ndata: {\"content\":\"do\"}\n\n";
        let appended = reassembler.push(body.as_bytes());
        assert_eq!(appended, vec!["Hola ", "mun", "do"]);
        assert_eq!(reassembler.text(), "Hola mundo");
    }

    #[test]
    fn event_split_across_reads() {
        let mut reassembler = StreamReassembler::new();
        assert!(reassembler.push(b"data: {\"content\":\"Ho").is_empty());
        assert_eq!(reassembler.push(b"la\"}\n\n"), vec!["Hola"]);
        assert_eq!(reassembler.into_text(), "Hola");
    }

    #[test]
    fn malformed_line_is_skipped() {
        let mut reassembler = StreamReassembler::new();
        reassembler.push(b"data: {not json}\n\ndata: {\"content\":\"ok\"}\n\n");
        assert_eq!(reassembler.text(), "ok");
    }

    #[test]
    fn non_data_lines_are_ignored() {
        let mut reassembler = StreamReassembler::new();
        reassembler.push(b": keep-alive\nevent: ping\ndata: {\"content\":\"x\"}\n");
        assert_eq!(reassembler.text(), "x");
    }

    #[test]
    fn trailing_partial_line_is_not_applied() {
        let mut reassembler = StreamReassembler::new();
        reassembler.push(b"data: {\"content\":\"a\"}\n\ndata: {\"content\":\"b\"}");
        assert_eq!(reassembler.text(), "a");
    }

    #[test]
    fn user_message_prefers_server_reason() {
        let rejected = ClientError::Rejected {
            status: 400,
            message: Some("Mensaje requerido".to_string()),
        };
        assert_eq!(rejected.user_message(), "Mensaje requerido");

        let bare = ClientError::Rejected { status: 500, message: None };
        assert_eq!(bare.user_message(), GENERIC_FAILURE);
    }
}
