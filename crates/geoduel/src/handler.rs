//! Per-connection handler: decode inbound events, flush the outbox.
//!
//! Each accepted connection gets its own Tokio task running this handler.
//! The flow is:
//!   1. Register an outbox with the engine's dispatcher
//!   2. Loop over three sources:
//!      - inbound frames → decode → `Engine::handle_event`
//!      - outbox events → wrap in an envelope → send
//!      - idle timer → close a connection silent for too long
//!   3. On exit, the guard runs `Engine::disconnect`

use std::sync::Arc;
use std::time::{Duration, Instant};

use geoduel_battle::QuestionSource;
use geoduel_protocol::{ClientEvent, Codec, Envelope, ServerEvent};
use geoduel_transport::{Connection, ConnectionId, WebSocketConnection};
use tokio::sync::mpsc;

use crate::GeoduelError;
use crate::engine::Engine;
use crate::server::ServerState;

/// A connection that sends nothing (heartbeats included) for this long is
/// closed.
pub(crate) const IDLE_TIMEOUT: Duration = Duration::from_secs(15);

/// Drop guard that disconnects the connection when the handler exits.
///
/// This ensures cleanup happens even if the handler panics. Since `Drop`
/// is synchronous, we spawn a fire-and-forget task for the async work.
struct ConnectionGuard<Q: QuestionSource> {
    conn_id: ConnectionId,
    engine: Arc<Engine<Q>>,
}

impl<Q: QuestionSource> Drop for ConnectionGuard<Q> {
    fn drop(&mut self) {
        let conn_id = self.conn_id;
        let engine = Arc::clone(&self.engine);
        tokio::spawn(async move {
            engine.disconnect(conn_id).await;
        });
    }
}

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection<Q, C>(
    conn: WebSocketConnection,
    state: Arc<ServerState<Q, C>>,
) -> Result<(), GeoduelError>
where
    Q: QuestionSource,
    C: Codec,
{
    let conn_id = conn.id();
    tracing::debug!(%conn_id, "handling new connection");

    let (tx, mut rx) = mpsc::unbounded_channel();
    state.engine.connect(conn_id, tx).await;
    let _guard = ConnectionGuard {
        conn_id,
        engine: Arc::clone(&state.engine),
    };

    let mut seq: u64 = 1;
    let start = Instant::now();
    let idle = tokio::time::sleep(IDLE_TIMEOUT);
    tokio::pin!(idle);

    loop {
        tokio::select! {
            inbound = conn.recv() => {
                let data = match inbound {
                    Ok(Some(data)) => data,
                    Ok(None) => {
                        tracing::info!(%conn_id, "connection closed cleanly");
                        break;
                    }
                    Err(e) => {
                        tracing::debug!(%conn_id, error = %e, "recv error");
                        break;
                    }
                };
                idle.as_mut().reset(tokio::time::Instant::now() + IDLE_TIMEOUT);

                let envelope: Envelope<ClientEvent> = match state.codec.decode(&data) {
                    Ok(env) => env,
                    Err(e) => {
                        tracing::debug!(%conn_id, error = %e, "failed to decode envelope");
                        send_error(
                            &conn,
                            &state.codec,
                            400,
                            &format!("invalid event: {e}"),
                            next_seq(&mut seq),
                            &start,
                        )
                        .await?;
                        continue;
                    }
                };
                state.engine.handle_event(conn_id, envelope.payload).await;
            }

            Some(event) = rx.recv() => {
                send_event(&conn, &state.codec, event, next_seq(&mut seq), &start).await?;
            }

            () = &mut idle => {
                tracing::info!(%conn_id, "connection timed out");
                break;
            }
        }
    }

    // _guard drops here → engine disconnect fires.
    Ok(())
}

async fn send_event(
    conn: &WebSocketConnection,
    codec: &impl Codec,
    payload: ServerEvent,
    seq: u64,
    start: &Instant,
) -> Result<(), GeoduelError> {
    let envelope = Envelope {
        seq,
        timestamp: start.elapsed().as_millis() as u64,
        payload,
    };
    let bytes = codec.encode(&envelope)?;
    conn.send(&bytes).await?;
    Ok(())
}

/// Sends an `error` event straight to the client, bypassing the outbox.
async fn send_error(
    conn: &WebSocketConnection,
    codec: &impl Codec,
    code: u16,
    message: &str,
    seq: u64,
    start: &Instant,
) -> Result<(), GeoduelError> {
    let payload = ServerEvent::Error {
        code,
        message: message.to_string(),
    };
    send_event(conn, codec, payload, seq, start).await
}

/// Increments and returns the next sequence number.
fn next_seq(seq: &mut u64) -> u64 {
    let current = *seq;
    *seq += 1;
    current
}
