//! # Servidor TCP
//! src/server/tcp.rs
//!
//! Arma el núcleo sobre sockets reales: un `TcpListener` como fuente de
//! conexiones, un pool fijo de workers y `StatsResponder` como handler.
//! El thread que llama a `run` se convierte en el dispatcher.

use crate::config::Config;
use crate::error::ServerError;
use crate::http::StatsResponder;
use crate::server::dispatcher::Dispatcher;
use crate::server::state::ServerState;
use crate::server::worker::WorkerPool;
use crate::stats::WorkerStatsSnapshot;
use std::io;
use std::net::{TcpListener, TcpStream};
use std::sync::Arc;
use tracing::info;

/// Servidor HTTP/1.0 con pool de workers
pub struct Server {
    config: Config,
}

impl Server {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Escucha en `host:port` y atiende conexiones para siempre
    pub fn run(&self) -> Result<(), ServerError> {
        self.config.validate()?;

        let address = self.config.address();
        let listener = TcpListener::bind(&address)?;
        info!(%address, "server listening");

        self.serve(listener.incoming())?;
        Ok(())
    }

    /// Atiende las conexiones de `incoming` y, cuando se terminan, espera a
    /// que los workers vacíen pending
    ///
    /// Retorna las estadísticas finales de cada worker.
    pub fn serve<I>(&self, incoming: I) -> Result<Vec<WorkerStatsSnapshot>, ServerError>
    where
        I: IntoIterator<Item = io::Result<TcpStream>>,
    {
        self.config.validate()?;

        let state: Arc<ServerState<TcpStream>> =
            ServerState::new(self.config.threads, self.config.queue_size)?;
        let handler = Arc::new(StatsResponder::new());
        let pool = WorkerPool::spawn(Arc::clone(&state), Arc::clone(&handler))?;
        info!(
            workers = pool.len(),
            queue_size = state.capacity(),
            policy = %self.config.schedalg,
            "worker pool ready"
        );

        let mut dispatcher = Dispatcher::new(Arc::clone(&state), handler, self.config.schedalg);
        dispatcher.run(incoming);

        state.shutdown();
        pool.join();

        info!(stats = %state.stats().to_json(), "server stopped");
        Ok(state.stats().snapshot())
    }
}
