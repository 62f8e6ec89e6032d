//! # HTTP Dispatch - Entry Point
//! src/main.rs
//!
//! Parsea los argumentos, inicializa el logging y deja el thread principal
//! como dispatcher.

use http_dispatch::config::Config;
use http_dispatch::server::Server;
use tracing::error;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "http_dispatch=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_thread_names(true))
        .init();

    // Argumentos inválidos o faltantes: clap imprime el uso y sale con código 2
    let config = Config::new();

    if let Err(e) = config.validate() {
        eprintln!("Usage: http_dispatch <PORT> <THREADS> <QUEUE_SIZE> <SCHEDALG>: {}", e);
        std::process::exit(1);
    }
    config.log_summary();

    let server = Server::new(config);

    // Iniciar el servidor (esto bloqueará el thread)
    if let Err(e) = server.run() {
        error!("fatal error: {}", e);
        std::process::exit(1);
    }
}
