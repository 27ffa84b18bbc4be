//! `GeoduelServer` builder and server loop.
//!
//! This is the entry point for running a Geoduel server. It ties
//! together all the layers: transport → protocol → engine, plus the
//! janitor that sweeps abandoned sessions.

use std::sync::Arc;
use std::time::Instant;

use geoduel_battle::QuestionSource;
use geoduel_janitor::SweepScheduler;
use geoduel_protocol::{Codec, JsonCodec};
use geoduel_transport::{Transport, WebSocketTransport};

use crate::engine::Engine;
use crate::handler::handle_connection;
use crate::{EngineConfig, GeoduelError};

/// Shared server state passed to each connection handler task.
pub(crate) struct ServerState<Q, C> {
    pub(crate) engine: Arc<Engine<Q>>,
    pub(crate) codec: C,
}

/// Builder for configuring and starting a Geoduel server.
///
/// # Example
///
/// ```rust,ignore
/// use geoduel::prelude::*;
///
/// let server = GeoduelServerBuilder::new()
///     .bind("0.0.0.0:8080")
///     .build(StaticQuestionSource::sample())
///     .await?;
/// server.run().await
/// ```
pub struct GeoduelServerBuilder {
    bind_addr: String,
    config: EngineConfig,
}

impl GeoduelServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
            config: EngineConfig::default(),
        }
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.bind_addr = addr.to_string();
        self
    }

    /// Sets the engine configuration.
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Binds the listener and builds the engine around `questions`.
    ///
    /// Uses `JsonCodec` and `WebSocketTransport`.
    pub async fn build<Q: QuestionSource>(
        self,
        questions: Q,
    ) -> Result<GeoduelServer<Q, JsonCodec>, GeoduelError> {
        let transport = WebSocketTransport::bind(&self.bind_addr).await?;

        let state = Arc::new(ServerState {
            engine: Engine::new(self.config, questions),
            codec: JsonCodec,
        });

        Ok(GeoduelServer { transport, state })
    }
}

impl Default for GeoduelServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound Geoduel server.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct GeoduelServer<Q, C> {
    transport: WebSocketTransport,
    state: Arc<ServerState<Q, C>>,
}

impl<Q, C> GeoduelServer<Q, C>
where
    Q: QuestionSource,
    C: Codec,
{
    /// Creates a new builder.
    pub fn builder() -> GeoduelServerBuilder {
        GeoduelServerBuilder::new()
    }

    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.transport.local_addr()
    }

    /// The engine behind this server, for in-process callers.
    pub fn engine(&self) -> &Arc<Engine<Q>> {
        &self.state.engine
    }

    /// Runs the janitor and the accept loop. Runs until the process is
    /// terminated.
    pub async fn run(mut self) -> Result<(), GeoduelError> {
        tracing::info!("Geoduel server running");

        let engine = Arc::clone(&self.state.engine);
        tokio::spawn(run_janitor(engine));

        loop {
            match self.transport.accept().await {
                Ok(conn) => {
                    let state = Arc::clone(&self.state);
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(conn, state).await {
                            tracing::debug!(error = %e, "connection ended with error");
                        }
                    });
                }
                Err(e) => {
                    tracing::error!(error = %e, "accept failed");
                }
            }
        }
    }
}

/// Sweeps overdue sessions on the configured schedule, forever.
async fn run_janitor<Q: QuestionSource>(engine: Arc<Engine<Q>>) {
    let mut scheduler = SweepScheduler::new(engine.config().sweep_config());
    if scheduler.is_disabled() {
        tracing::info!("session janitor disabled");
    }
    loop {
        scheduler.wait_for_sweep().await;
        let expired = engine.expire_overdue(Instant::now()).await;
        scheduler.record_sweep(expired);
    }
}
