//! Inbound message routing for a socket session.
//!
//! [`Router`] is the state shared between a [`Session`](super::session::Session)
//! and its background reader task: the write half, the pending-call table and
//! the two handler registries. The reader loop classifies each line and
//! routes it:
//!
//! - `Response` → resolves the pending call with the same id
//! - `Notification` → notification registry (fire-and-forget)
//! - `Request` → request registry; the reply is written from a spawned task
//! - malformed or unrecognized lines → logged and dropped
//!
//! A fault while handling one line never stops the loop.

use super::error::{ButlerError, Result};
use super::transport::{LineReader, LineWriter};
use butlerd_application::{
    Channel, Direction, Dispatch, HandlerFault, NotificationRegistry, PendingCalls,
    RequestRegistry, Resolution, SessionOptions, TrafficLogger,
};
use butlerd_domain::{
    ErrorCode, Message, RequestId, ResponseOutcome, SessionState, classify, encode_error,
    encode_result,
};
use serde_json::Value;
use std::sync::Arc;
use tokio::io::AsyncRead;
use tokio::sync::watch;
use tracing::{debug, info, trace, warn};

pub(crate) struct Router {
    writer: LineWriter,
    pub(crate) pending: PendingCalls,
    notifications: NotificationRegistry,
    requests: RequestRegistry,
    pub(crate) options: SessionOptions,
    traffic: Arc<dyn TrafficLogger>,
    state: watch::Sender<SessionState>,
}

impl Router {
    pub(crate) fn new(
        writer: LineWriter,
        notifications: NotificationRegistry,
        requests: RequestRegistry,
        options: SessionOptions,
        traffic: Arc<dyn TrafficLogger>,
    ) -> Self {
        let (state, _) = watch::channel(SessionState::Connected);
        Self {
            writer,
            pending: PendingCalls::new(),
            notifications,
            requests,
            options,
            traffic,
            state,
        }
    }

    pub(crate) fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    pub(crate) fn subscribe_state(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    pub(crate) fn mark_authenticated(&self) {
        self.state.send_if_modified(|state| {
            if *state == SessionState::Connected {
                *state = SessionState::Authenticated;
                true
            } else {
                false
            }
        });
    }

    pub(crate) fn mark_closed(&self) {
        self.state.send_if_modified(|state| {
            if state.is_closed() {
                false
            } else {
                *state = SessionState::Closed;
                true
            }
        });
    }

    /// Write one line to the socket.
    pub(crate) async fn send_line(&self, line: &str) -> Result<()> {
        if self.state().is_closed() {
            return Err(ButlerError::SessionClosed);
        }
        self.traffic.record(Channel::Socket, Direction::Outbound, line);
        trace!("→ {}", line);
        self.writer.write_line(line).await?;
        Ok(())
    }

    pub(crate) async fn shutdown_writer(&self) {
        if let Err(e) = self.writer.shutdown().await {
            debug!("Failed to shut down socket writer: {}", e);
        }
    }

    /// Read lines until the peer closes the socket.
    ///
    /// Pending calls are left as they are; callers rely on their own
    /// cancellation or deadline.
    pub(crate) async fn reader_loop<R>(self: Arc<Self>, mut reader: LineReader<R>)
    where
        R: AsyncRead + Unpin,
    {
        while let Some(line) = reader.next_line().await {
            self.traffic.record(Channel::Socket, Direction::Inbound, &line);
            trace!("← {}", line);
            self.route(&line);
        }

        if !self.pending.is_empty() {
            warn!(
                pending = self.pending.len(),
                "Socket closed with requests still pending"
            );
        }
        info!("Socket session closed");
        self.mark_closed();
    }

    fn route(self: &Arc<Self>, line: &str) {
        match classify(line) {
            Message::Response { id, outcome } => self.route_response(id, outcome),
            Message::Notification { method, params } => {
                match self.notifications.dispatch(&method, &params) {
                    Dispatch::Handled(()) => trace!(%method, "Notification handled"),
                    Dispatch::UnknownName => debug!(%method, "No handler for notification"),
                    Dispatch::Fault(fault) => {
                        warn!(%method, "Notification handler failed: {}", fault)
                    }
                }
            }
            Message::Request { method, id, params } => {
                match self.requests.dispatch(&method, &params) {
                    Dispatch::Handled(future) => {
                        let router = Arc::clone(self);
                        tokio::spawn(async move {
                            let outcome = future.await;
                            router.reply(&method, id, outcome).await;
                        });
                    }
                    Dispatch::Fault(fault) => {
                        let router = Arc::clone(self);
                        tokio::spawn(async move {
                            router.reply(&method, id, Err(fault)).await;
                        });
                    }
                    Dispatch::UnknownName => {
                        warn!(%method, %id, "No handler for inbound request");
                        if self.options.reply_method_not_found {
                            let router = Arc::clone(self);
                            tokio::spawn(async move {
                                router
                                    .reply_error(&method, &id, ErrorCode::MethodNotFound)
                                    .await;
                            });
                        }
                    }
                }
            }
            Message::Malformed(reason) => {
                warn!(%reason, line = %preview(line), "Discarding malformed message")
            }
            Message::Unrecognized => {
                warn!(line = %preview(line), "Discarding unrecognized message")
            }
        }
    }

    fn route_response(&self, id: RequestId, outcome: ResponseOutcome) {
        let outcome = match outcome {
            ResponseOutcome::Ok(result) => Ok(result),
            ResponseOutcome::Err(error) => Err(error),
        };
        match self.pending.resolve(&id, outcome) {
            Resolution::Delivered => trace!(%id, "Response delivered"),
            Resolution::Abandoned => debug!(%id, "Dropping response for abandoned request"),
            Resolution::Unknown => warn!(%id, "Response for unknown request id"),
        }
    }

    async fn reply(&self, method: &str, id: RequestId, outcome: std::result::Result<Value, HandlerFault>) {
        match outcome {
            Ok(result) => match encode_result(&result, &id) {
                Ok(line) => self.write_reply(method, &id, &line).await,
                Err(e) => {
                    warn!(%method, %id, "Failed to encode reply: {}", e);
                    self.reply_error(method, &id, ErrorCode::FailedToProcessRequest)
                        .await;
                }
            },
            Err(fault) => {
                warn!(%method, %id, "Request handler failed: {}", fault);
                let kind = if fault.is_decode() {
                    ErrorCode::InvalidParams
                } else {
                    ErrorCode::FailedToProcessRequest
                };
                self.reply_error(method, &id, kind).await;
            }
        }
    }

    async fn reply_error(&self, method: &str, id: &RequestId, kind: ErrorCode) {
        match encode_error(&kind.to_error_object(), id) {
            Ok(line) => self.write_reply(method, id, &line).await,
            Err(e) => warn!(%method, %id, "Failed to encode error reply: {}", e),
        }
    }

    async fn write_reply(&self, method: &str, id: &RequestId, line: &str) {
        if let Err(e) = self.send_line(line).await {
            warn!(%method, %id, "Failed to send reply: {}", e);
        }
    }
}

fn preview(line: &str) -> &str {
    const MAX: usize = 200;
    if line.len() <= MAX {
        return line;
    }
    let mut end = MAX;
    while !line.is_char_boundary(end) {
        end -= 1;
    }
    &line[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preview_truncates_on_char_boundary() {
        let line = "é".repeat(150);
        let cut = preview(&line);
        assert!(cut.len() <= 200);
        assert!(line.starts_with(cut));
    }

    #[test]
    fn short_lines_are_previewed_whole() {
        assert_eq!(preview("{}"), "{}");
    }
}
