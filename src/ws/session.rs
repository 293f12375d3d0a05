//! Client session: one registered connection and its two loops.
//!
//! The inbound loop decodes position updates and forwards them to the hub.
//! The outbound loop drains the session's bounded queue to the socket and
//! pings the peer every ping interval, whatever else it writes. Whichever loop
//! ends first ends the session, and the session always deregisters itself
//! on the way out.

use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures_util::{Sink, Stream};
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};

use super::connection::{self, ConnectionReader, ConnectionWriter};
use super::messages::PositionUpdate;
use crate::config::SessionLimits;
use crate::domain::{ClientId, HubHandle, Payload};
use crate::error::RelayError;

/// State of one connected client.
#[derive(Debug)]
pub struct ClientSession {
    client_id: ClientId,
    hub: HubHandle,
    limits: SessionLimits,
}

impl ClientSession {
    /// Creates a session with a fresh identifier.
    #[must_use]
    pub fn new(hub: HubHandle, limits: SessionLimits) -> Self {
        Self {
            client_id: ClientId::new(),
            hub,
            limits,
        }
    }

    /// Returns the server-assigned identifier.
    #[must_use]
    pub fn client_id(&self) -> ClientId {
        self.client_id
    }

    /// Registers with the hub and serves `socket` until it goes away.
    pub async fn run(self, socket: WebSocket) {
        let (reader, writer) = connection::split(socket, &self.limits);
        self.run_with(reader, writer).await;
    }

    /// Same as [`ClientSession::run`] over an already split connection.
    pub async fn run_with<S, K>(self, reader: ConnectionReader<S>, writer: ConnectionWriter<K>)
    where
        S: Stream<Item = Result<Message, axum::Error>> + Unpin,
        K: Sink<Message, Error = axum::Error> + Unpin + Send + 'static,
    {
        let client_id = self.client_id;
        let (outbound_tx, outbound_rx) = mpsc::channel(self.limits.send_queue_capacity);
        if let Err(e) = self.hub.register(client_id, outbound_tx).await {
            tracing::warn!(%client_id, error = %e, "could not register session");
            return;
        }

        let mut write_task = tokio::spawn(write_loop(
            client_id,
            writer,
            outbound_rx,
            self.limits.ping_interval,
        ));

        let writer_finished = tokio::select! {
            reason = read_loop(client_id, reader, &self.hub) => {
                log_disconnect(client_id, &reason);
                false
            }
            result = &mut write_task => {
                match result {
                    Ok(Ok(())) => tracing::debug!(%client_id, "outbound queue closed by hub"),
                    Ok(Err(e)) => log_disconnect(client_id, &e),
                    Err(e) => tracing::warn!(%client_id, error = %e, "outbound loop panicked"),
                }
                true
            }
        };

        // No-op when the hub already evicted this session.
        if let Err(e) = self.hub.deregister(client_id).await {
            tracing::debug!(%client_id, error = %e, "deregistration skipped");
        }

        if !writer_finished {
            // The closed queue makes the writer flush a close frame; it may
            // first be finishing one pending write.
            let grace = self.limits.write_wait.saturating_mul(2);
            if tokio::time::timeout(grace, &mut write_task).await.is_err() {
                write_task.abort();
            }
        }
    }
}

/// Reads until the connection fails, forwarding every valid update.
///
/// Returns the reason the loop stopped.
async fn read_loop<S>(
    client_id: ClientId,
    mut reader: ConnectionReader<S>,
    hub: &HubHandle,
) -> RelayError
where
    S: Stream<Item = Result<Message, axum::Error>> + Unpin,
{
    loop {
        let text = match reader.receive().await {
            Ok(text) => text,
            Err(e) => return e,
        };

        let update = match PositionUpdate::decode(text.as_str()) {
            Ok(update) => update,
            Err(e) => {
                tracing::warn!(%client_id, error = %e, "dropping malformed position update");
                continue;
            }
        };

        tracing::debug!(%client_id, x = update.x, y = update.y, "position received");
        if let Err(e) = hub
            .update_position(client_id, update.into_position(client_id))
            .await
        {
            return e;
        }
    }
}

/// Drains the outbound queue, pinging the peer every `ping_interval`.
///
/// Pings go out on schedule even under steady traffic: the read deadline
/// only moves on pongs, so a skipped ping would drop a healthy peer.
///
/// Returns `Ok(())` after sending a close frame once the hub closes the
/// queue, or the first write error.
async fn write_loop<K>(
    client_id: ClientId,
    mut writer: ConnectionWriter<K>,
    mut outbound: mpsc::Receiver<Payload>,
    ping_interval: Duration,
) -> Result<(), RelayError>
where
    K: Sink<Message, Error = axum::Error> + Unpin,
{
    let mut ticker = tokio::time::interval_at(Instant::now() + ping_interval, ping_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            message = outbound.recv() => {
                let Some(payload) = message else {
                    tracing::debug!(%client_id, "outbound queue closed, sending close frame");
                    return writer.close().await;
                };
                writer.send(payload).await?;
            }
            _ = ticker.tick() => writer.ping().await?,
        }
    }
}

fn log_disconnect(client_id: ClientId, reason: &RelayError) {
    if reason.is_expected_disconnect() {
        tracing::debug!(%client_id, reason = %reason, "connection ended");
    } else {
        tracing::warn!(%client_id, error = %reason, "connection failed");
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use axum::extract::ws::{Utf8Bytes, close_code};

    use super::*;
    use crate::domain::{Hub, HubStats, Position};
    use crate::ws::connection::tests::{channel_sink, channel_stream, limits, stalled_sink};

    fn drain(written: &mut mpsc::UnboundedReceiver<Message>) -> Vec<Message> {
        let mut out = Vec::new();
        while let Ok(msg) = written.try_recv() {
            out.push(msg);
        }
        out
    }

    async fn stats(hub: &HubHandle) -> HubStats {
        let Ok(stats) = hub.stats().await else {
            panic!("hub stopped");
        };
        stats
    }

    #[tokio::test]
    async fn write_loop_forwards_payloads_then_closes() {
        let (sink, mut written) = channel_sink();
        let writer = ConnectionWriter::new(sink, &limits());
        let (tx, rx) = mpsc::channel(4);
        let Ok(()) = tx.send(Payload::from_static("[1]")).await else {
            panic!("queue closed");
        };
        let Ok(()) = tx.send(Payload::from_static("[2]")).await else {
            panic!("queue closed");
        };
        drop(tx);

        let result = write_loop(ClientId::new(), writer, rx, Duration::from_secs(5)).await;
        assert!(result.is_ok());

        let frames = drain(&mut written);
        assert_eq!(frames.len(), 3);
        assert!(matches!(frames.first(), Some(Message::Text(t)) if t.as_str() == "[1]"));
        assert!(matches!(frames.get(1), Some(Message::Text(t)) if t.as_str() == "[2]"));
        let Some(Message::Close(Some(frame))) = frames.get(2) else {
            panic!("expected close frame last");
        };
        assert_eq!(frame.code, close_code::NORMAL);
    }

    #[tokio::test(start_paused = true)]
    async fn write_loop_pings_on_schedule_under_traffic() {
        let (sink, mut written) = channel_sink();
        let writer = ConnectionWriter::new(sink, &limits());
        let (tx, rx) = mpsc::channel(4);
        let task = tokio::spawn(write_loop(ClientId::new(), writer, rx, Duration::from_secs(5)));

        // One payload per second never postpones the ping due at t=5.
        for _ in 0..6 {
            tokio::time::sleep(Duration::from_secs(1)).await;
            let Ok(()) = tx.send(Payload::from_static("[]")).await else {
                panic!("queue closed");
            };
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
        let frames = drain(&mut written);
        let pings = frames
            .iter()
            .filter(|frame| matches!(frame, Message::Ping(_)))
            .count();
        let texts = frames
            .iter()
            .filter(|frame| matches!(frame, Message::Text(_)))
            .count();
        assert_eq!(pings, 1);
        assert_eq!(texts, 6);

        drop(tx);
        assert!(matches!(task.await, Ok(Ok(()))));
    }

    #[tokio::test(start_paused = true)]
    async fn write_loop_gives_up_on_stalled_peer() {
        let writer = ConnectionWriter::new(stalled_sink(), &limits());
        let (tx, rx) = mpsc::channel(4);
        let Ok(()) = tx.send(Payload::from_static("[]")).await else {
            panic!("queue closed");
        };
        let result = write_loop(ClientId::new(), writer, rx, Duration::from_secs(5)).await;
        assert!(matches!(result, Err(RelayError::WriteTimeout(_))));
    }

    #[tokio::test]
    async fn session_forwards_updates_and_deregisters_on_close() {
        let hub = Hub::spawn(16);
        let (inbound, stream) = channel_stream();
        let (sink, mut written) = channel_sink();
        let session = ClientSession::new(hub.clone(), limits());
        let client_id = session.client_id();
        let task = tokio::spawn(session.run_with(
            ConnectionReader::new(stream, &limits()),
            ConnectionWriter::new(sink, &limits()),
        ));

        let _ = inbound.send(Message::Text(Utf8Bytes::from_static("garbage")));
        let _ = inbound.send(Message::Text(Utf8Bytes::from_static(
            r##"{"x":1,"y":2,"color":"#fff","clientId":"spoofed"}"##,
        )));

        // Wait for the update snapshot to be written back.
        let mut snapshot = None;
        while let Some(msg) = written.recv().await {
            if let Message::Text(text) = msg
                && text.as_str() != "[]"
            {
                snapshot = Some(text);
                break;
            }
        }
        let Some(snapshot) = snapshot else {
            panic!("no snapshot written");
        };
        let Ok(serde_json::Value::Array(items)) = serde_json::from_str(snapshot.as_str()) else {
            panic!("snapshot is not an array");
        };
        assert_eq!(items.len(), 1);
        let Some(entry) = items.first() else {
            panic!("empty snapshot");
        };
        assert_eq!(entry["clientId"], serde_json::json!(client_id.to_string()));
        assert_eq!(entry["x"], serde_json::json!(1.0));
        assert_eq!(entry["y"], serde_json::json!(2.0));

        drop(inbound);
        assert!(task.await.is_ok());
        assert_eq!(stats(&hub).await, HubStats::default());

        let frames = drain(&mut written);
        assert!(matches!(frames.last(), Some(Message::Close(Some(_)))));
    }

    #[tokio::test(start_paused = true)]
    async fn idle_session_is_deregistered_at_read_deadline() {
        let hub = Hub::spawn(16);
        let (_inbound, stream) = channel_stream();
        let (sink, _written) = channel_sink();
        let session = ClientSession::new(hub.clone(), limits());
        let started = Instant::now();

        session
            .run_with(
                ConnectionReader::new(stream, &limits()),
                ConnectionWriter::new(sink, &limits()),
            )
            .await;

        let elapsed = started.elapsed();
        assert!(elapsed >= limits().pong_wait);
        assert!(elapsed < limits().pong_wait + limits().ping_interval);
        assert_eq!(stats(&hub).await, HubStats::default());
    }

    #[tokio::test(start_paused = true)]
    async fn slow_session_is_evicted_and_shut_down() {
        let hub = Hub::spawn(64);
        let (_inbound, stream) = channel_stream();
        let session = ClientSession::new(hub.clone(), limits());
        let task = tokio::spawn(session.run_with(
            ConnectionReader::new(stream, &limits()),
            ConnectionWriter::new(stalled_sink(), &limits()),
        ));

        // Let the session register before flooding it.
        while stats(&hub).await.sessions == 0 {
            tokio::task::yield_now().await;
        }
        for _ in 0..=limits().send_queue_capacity + 1 {
            let Ok(()) = hub.broadcast(Payload::from_static("[]")).await else {
                panic!("hub stopped");
            };
        }
        assert_eq!(stats(&hub).await.sessions, 0);

        let Ok(()) = task.await else {
            panic!("session task failed");
        };
    }

    #[tokio::test(start_paused = true)]
    async fn busy_session_answering_pings_outlives_pong_wait() {
        let hub = Hub::spawn(64);
        let (inbound, stream) = channel_stream();
        let (sink, mut written) = channel_sink();
        let session = ClientSession::new(hub.clone(), limits());
        let task = tokio::spawn(session.run_with(
            ConnectionReader::new(stream, &limits()),
            ConnectionWriter::new(sink, &limits()),
        ));

        // Another member moving every second keeps snapshots flowing.
        let other = ClientId::new();
        let (other_tx, mut other_rx) = mpsc::channel(256);
        let Ok(()) = hub.register(other, other_tx).await else {
            panic!("hub stopped");
        };

        // Peer side: answer every ping with a pong.
        let peer_inbound = inbound.clone();
        let peer = tokio::spawn(async move {
            let mut pings = 0usize;
            while let Some(frame) = written.recv().await {
                if let Message::Ping(data) = frame {
                    pings += 1;
                    let _ = peer_inbound.send(Message::Pong(data));
                }
            }
            pings
        });

        let total = limits().pong_wait * 3;
        let mut elapsed = Duration::ZERO;
        let mut step = 0u32;
        while elapsed < total {
            tokio::time::sleep(Duration::from_secs(1)).await;
            elapsed += Duration::from_secs(1);
            step += 1;
            let _ = inbound.send(Message::Text(Utf8Bytes::from(format!(
                r#"{{"x":{step},"y":1}}"#
            ))));
            let Ok(()) = hub
                .update_position(other, Position::new(other, f64::from(step), 2.0, "red"))
                .await
            else {
                panic!("hub stopped");
            };
            while other_rx.try_recv().is_ok() {}
        }

        assert!(!task.is_finished());
        assert_eq!(
            stats(&hub).await,
            HubStats {
                sessions: 2,
                positions: 2
            }
        );

        let _ = inbound.send(Message::Close(None));
        let Ok(()) = task.await else {
            panic!("session task failed");
        };
        let Ok(pings) = peer.await else {
            panic!("peer task failed");
        };
        assert!(pings >= 5, "only {pings} pings sent");
    }
}
