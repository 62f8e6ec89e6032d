//! # HTTP Dispatch
//! src/lib.rs
//!
//! Núcleo de admisión y despacho de un servidor HTTP/1.0 concurrente:
//! una cola acotada compartida entre un acceptor y un pool fijo de workers,
//! más las políticas que deciden qué hacer cuando la cola se llena.
//!
//! ## Arquitectura
//!
//! - `queue`: cola FIFO acotada con remoción por índice y búsqueda por valor
//! - `server`: estado compartido, dispatcher, workers y políticas de sobrecarga
//! - `stats`: contadores por worker
//! - `http`: request line, responses y el handler por defecto
//! - `config`: argumentos de línea de comandos
//!
//! ## Ejemplo de uso
//!
//! ```no_run
//! use http_dispatch::config::Config;
//! use http_dispatch::server::Server;
//!
//! let config = Config::default();
//! let server = Server::new(config);
//! server.run().expect("Error al iniciar servidor");
//! ```

pub mod config;
pub mod error;
pub mod http;
pub mod queue;
pub mod server;
pub mod stats;

pub use error::ServerError;
