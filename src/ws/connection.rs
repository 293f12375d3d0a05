//! Connection adapter around one WebSocket.
//!
//! Splits the duplex socket into a [`ConnectionReader`], which enforces the
//! size cap and the read-idle deadline, and a [`ConnectionWriter`], which
//! bounds every write. Both are generic over the underlying stream and sink
//! so they can be driven without a network.

use std::time::Duration;

use axum::body::Bytes;
use axum::extract::ws::{CloseFrame, Message, Utf8Bytes, WebSocket, close_code};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use tokio::time::Instant;

use crate::config::SessionLimits;
use crate::error::RelayError;

/// Splits an upgraded socket into its reader and writer halves.
pub fn split(
    socket: WebSocket,
    limits: &SessionLimits,
) -> (
    ConnectionReader<SplitStream<WebSocket>>,
    ConnectionWriter<SplitSink<WebSocket, Message>>,
) {
    let (sink, stream) = socket.split();
    (
        ConnectionReader::new(stream, limits),
        ConnectionWriter::new(sink, limits),
    )
}

/// Receiving half of a connection.
///
/// The read deadline starts at `pong_wait` from creation and is pushed
/// forward only when a pong arrives; application messages do not refresh it.
#[derive(Debug)]
pub struct ConnectionReader<S> {
    stream: S,
    pong_wait: Duration,
    max_message_size: usize,
    deadline: Instant,
}

impl<S> ConnectionReader<S>
where
    S: Stream<Item = Result<Message, axum::Error>> + Unpin,
{
    /// Wraps `stream` with the limits of a session.
    pub fn new(stream: S, limits: &SessionLimits) -> Self {
        Self {
            stream,
            pong_wait: limits.pong_wait,
            max_message_size: limits.max_message_size,
            deadline: Instant::now() + limits.pong_wait,
        }
    }

    /// Waits for the next text message.
    ///
    /// Pongs extend the deadline, pings and binary frames are skipped.
    ///
    /// # Errors
    ///
    /// - [`RelayError::ReadTimeout`] if the deadline passes first.
    /// - [`RelayError::MessageTooLarge`] if a message exceeds the cap.
    /// - [`RelayError::Closed`] on a close frame or end of stream.
    /// - [`RelayError::Transport`] on a socket error.
    pub async fn receive(&mut self) -> Result<Utf8Bytes, RelayError> {
        loop {
            let next = tokio::time::timeout_at(self.deadline, self.stream.next())
                .await
                .map_err(|_| RelayError::ReadTimeout(self.pong_wait))?;

            match next {
                Some(Ok(Message::Text(text))) => {
                    self.check_size(text.as_str().len())?;
                    return Ok(text);
                }
                Some(Ok(Message::Binary(data))) => {
                    self.check_size(data.len())?;
                    tracing::debug!(len = data.len(), "ignoring binary frame");
                }
                Some(Ok(Message::Pong(_))) => {
                    self.deadline = Instant::now() + self.pong_wait;
                }
                // The transport answers pings itself.
                Some(Ok(Message::Ping(_))) => {}
                Some(Ok(Message::Close(frame))) => {
                    tracing::debug!(?frame, "peer sent close frame");
                    return Err(RelayError::Closed);
                }
                Some(Err(e)) => return Err(RelayError::Transport(e)),
                None => return Err(RelayError::Closed),
            }
        }
    }

    /// Returns the instant at which an idle read fails.
    #[must_use]
    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    fn check_size(&self, size: usize) -> Result<(), RelayError> {
        if size > self.max_message_size {
            return Err(RelayError::MessageTooLarge {
                size,
                limit: self.max_message_size,
            });
        }
        Ok(())
    }
}

/// Sending half of a connection. Every write is bounded by `write_wait`.
#[derive(Debug)]
pub struct ConnectionWriter<K> {
    sink: K,
    write_wait: Duration,
}

impl<K> ConnectionWriter<K>
where
    K: Sink<Message, Error = axum::Error> + Unpin,
{
    /// Wraps `sink` with the write deadline of a session.
    pub fn new(sink: K, limits: &SessionLimits) -> Self {
        Self {
            sink,
            write_wait: limits.write_wait,
        }
    }

    /// Writes one text message.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::WriteTimeout`] or [`RelayError::Transport`].
    pub async fn send(&mut self, payload: Utf8Bytes) -> Result<(), RelayError> {
        self.write(Message::Text(payload)).await
    }

    /// Writes a liveness probe.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::WriteTimeout`] or [`RelayError::Transport`].
    pub async fn ping(&mut self) -> Result<(), RelayError> {
        self.write(Message::Ping(Bytes::new())).await
    }

    /// Writes a normal close frame.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::WriteTimeout`] or [`RelayError::Transport`].
    pub async fn close(&mut self) -> Result<(), RelayError> {
        self.write(Message::Close(Some(CloseFrame {
            code: close_code::NORMAL,
            reason: Utf8Bytes::from_static(""),
        })))
        .await
    }

    async fn write(&mut self, message: Message) -> Result<(), RelayError> {
        match tokio::time::timeout(self.write_wait, self.sink.send(message)).await {
            Ok(result) => result.map_err(RelayError::Transport),
            Err(_) => Err(RelayError::WriteTimeout(self.write_wait)),
        }
    }
}
