//! # Errores del Servidor
//! src/error.rs

use crate::config::ConfigError;
use crate::queue::QueueError;
use thiserror::Error;

/// Errores que pueden detener el servidor
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    /// No se pudieron crear las colas
    #[error("cannot create queues: {0}")]
    Queue(#[from] QueueError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
