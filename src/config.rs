//! # Configuración del Servidor
//! src/config.rs
//!
//! Cuatro argumentos posicionales, en este orden:
//!
//! ```bash
//! ./http_dispatch <PORT> <THREADS> <QUEUE_SIZE> <SCHEDALG>
//! ./http_dispatch 8080 4 16 dh
//! ```
//!
//! `SCHEDALG` es una de `block`, `random`, `dh`, `dt`, `bf`.
//! Si falta o sobra algo, clap imprime el uso y termina con código 2.
//!
//! ### Variables de entorno
//! ```bash
//! HTTP_HOST=0.0.0.0 ./http_dispatch 8080 4 16 block
//! RUST_LOG=debug ./http_dispatch 8080 4 16 random
//! ```

use crate::server::OverloadPolicy;
use clap::Parser;
use thiserror::Error;
use tracing::info;

/// Errores de validación de la configuración
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("worker threads must be >= 1")]
    NoWorkers,

    #[error("queue size must be >= 1")]
    EmptyQueue,
}

/// Configuración del servidor
#[derive(Debug, Clone, Parser)]
#[command(name = "http_dispatch")]
#[command(about = "Servidor HTTP/1.0 con pool de workers y políticas de sobrecarga")]
#[command(version = "0.1.0")]
pub struct Config {
    /// Puerto en el que escucha el servidor
    pub port: u16,

    /// Número de workers
    pub threads: usize,

    /// Capacidad total: conexiones esperando + en atención
    pub queue_size: usize,

    /// Política cuando la cola está llena
    #[arg(value_enum)]
    pub schedalg: OverloadPolicy,

    /// Host/IP en el que escucha
    #[arg(long, default_value = "127.0.0.1", env = "HTTP_HOST")]
    pub host: String,
}

impl Config {
    /// Parsea los argumentos de la línea de comandos
    pub fn new() -> Self {
        Config::parse()
    }

    /// Dirección completa para bind (host:port)
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.threads == 0 {
            return Err(ConfigError::NoWorkers);
        }
        if self.queue_size == 0 {
            return Err(ConfigError::EmptyQueue);
        }
        Ok(())
    }

    /// Registra un resumen de la configuración
    pub fn log_summary(&self) {
        info!(
            address = %self.address(),
            workers = self.threads,
            queue_size = self.queue_size,
            policy = %self.schedalg,
            "configuration"
        );
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8080,
            threads: 4,
            queue_size: 16,
            schedalg: OverloadPolicy::Block,
            host: "127.0.0.1".to_string(),
        }
    }
}
