//! Relays provider chunks to the HTTP response as `data: ` events.
//!
//! Each chunk is encoded and handed to the response writer as soon as it is
//! pulled; nothing is queued in between, so the provider is only polled when
//! the client side has taken the previous event.
//!
//! When the client disconnects, actix drops the body stream, which drops the
//! [`RelayGuard`], which cancels the token handed to the provider stream.

use std::sync::Arc;

use bytes::Bytes;
use futures::{Stream, StreamExt};
use log::{debug, error, info};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::model::{ChatModel, Message};
use crate::stream::encode_event;

/// Mid-stream failure. The status line is already sent at this point, so the
/// only signal left is an aborted body; the message stays generic.
#[derive(Debug, thiserror::Error)]
#[error("Error interno del servidor")]
pub struct RelayError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RelayState {
    Idle,
    Streaming,
    Closed,
    Errored,
}

struct RelayGuard {
    request_id: Uuid,
    cancel: CancellationToken,
    state: RelayState,
}

impl RelayGuard {
    fn transition(&mut self, next: RelayState) {
        debug!("[{}] stream {:?} -> {:?}", self.request_id, self.state, next);
        self.state = next;
    }
}

impl Drop for RelayGuard {
    fn drop(&mut self) {
        if matches!(self.state, RelayState::Idle | RelayState::Streaming) {
            info!("[{}] client went away, cancelling provider stream", self.request_id);
        }
        self.cancel.cancel();
    }
}

/// Build the response body for one streamed exchange.
pub fn relay_events(
    model: Arc<dyn ChatModel>,
    messages: Vec<Message>,
    request_id: Uuid,
) -> impl Stream<Item = Result<Bytes, RelayError>> {
    let cancel = CancellationToken::new();

    async_stream::stream! {
        let mut guard = RelayGuard { request_id, cancel: cancel.clone(), state: RelayState::Idle };

        let mut upstream = match model.stream(messages, cancel.child_token()).await {
            Ok(upstream) => upstream,
            Err(e) => {
                error!("[{}] could not open provider stream: {}", request_id, e);
                guard.transition(RelayState::Errored);
                yield Err(RelayError);
                return;
            }
        };
        guard.transition(RelayState::Streaming);

        let mut sent = 0usize;
        while let Some(next) = upstream.next().await {
            let event = match next {
                Ok(chunk) => encode_event(&chunk).map_err(|e| e.to_string()),
                Err(e) => Err(e.to_string()),
            };

            match event {
                Ok(bytes) => {
                    sent += 1;
                    yield Ok(bytes);
                }
                Err(e) => {
                    error!("[{}] provider stream failed after {} chunks: {}", request_id, sent, e);
                    guard.transition(RelayState::Errored);
                    yield Err(RelayError);
                    return;
                }
            }
        }

        guard.transition(RelayState::Closed);
        info!("[{}] stream closed after {} chunks", request_id, sent);
    }
}
