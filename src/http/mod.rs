//! # Módulo HTTP
//! src/http/mod.rs
//!
//! Colaborador externo del núcleo: lo mínimo de HTTP/1.0 para que el
//! servidor sea usable desde un cliente real.
//!
//! - Parsing de la request line
//! - Construcción de responses
//! - `StatsResponder`: el `ConnectionHandler` que usan los workers

pub mod request;
pub mod responder;
pub mod response;
pub mod status;

// Re-exportamos los tipos principales para facilitar su uso
pub use request::{Method, ParseError, Request};
pub use responder::StatsResponder;
pub use response::Response;
pub use status::StatusCode;
